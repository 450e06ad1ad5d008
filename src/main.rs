//! superdesk-live - follows the notification channel of a Superdesk server
//! and logs connection changes and server events until Ctrl-C.

use tokio::sync::broadcast;
use tracing::{info, warn};

use superdesk_live::application::NoticeLevel;
use superdesk_live::client::LiveClient;
use superdesk_live::config::AppConfig;
use superdesk_live::domain::notification::Notification;
use superdesk_live::ports::{NotificationBus, SessionProvider};
use superdesk_live::telemetry::init_logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_logging(&config.logging);

    let client = LiveClient::new(&config)?;
    if client.session().current().is_none() {
        warn!("No session configured (SUPERDESK__AUTH__TOKEN); the proxy stays idle");
    }

    let mut events = client.bus().subscribe();
    let mut notifier = client.connection_notifier();
    let proxy = client.spawn_proxy();
    info!(url = %config.server.websocket_url, "Following notifications");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            notice = notifier.next_notice() => match notice {
                Some(notice) if notice.level == NoticeLevel::Success => info!("{}", notice.text),
                Some(notice) => warn!("{}", notice.text),
                None => break,
            },
            event = events.recv() => match event {
                Ok(Notification::Server { message, .. }) => {
                    info!(event = %message.event, extra = %message.extra, "Server event");
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event log fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    info!("Shutting down");
    proxy.shutdown().await;
    Ok(())
}
