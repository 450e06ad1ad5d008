//! Array-concatenating throttle.
//!
//! The first push opens a window; everything pushed until the window closes
//! is delivered as one batch on the trailing edge. The buffer is driven by
//! its owner's event loop:
//!
//! ```ignore
//! tokio::select! {
//!     _ = sleep_until(buffer.deadline()) => handle(buffer.take()),
//!     event = events.recv() => buffer.push([event]),
//! }
//! ```

use std::time::Duration;

use tokio::time::{self, Instant};

#[derive(Debug)]
pub struct CombineBuffer<T> {
    window: Duration,
    pending: Vec<T>,
    deadline: Option<Instant>,
}

impl<T> CombineBuffer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Vec::new(),
            deadline: None,
        }
    }

    /// Appends items, opening a window when none is open. Pushing nothing
    /// does not open one.
    pub fn push<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        let before = self.pending.len();
        self.pending.extend(items);
        if self.deadline.is_none() && self.pending.len() > before {
            self.deadline = Some(Instant::now() + self.window);
        }
    }

    /// When the open window closes.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Takes the combined batch and closes the window.
    pub fn take(&mut self) -> Vec<T> {
        self.deadline = None;
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Sleeps until `deadline`; never completes for `None`.
pub async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
