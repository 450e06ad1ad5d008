//! Application layer - services that coordinate the domain and the ports.
//!
//! - `request_queue` - prioritised, deduplicated, concurrency-limited requests
//! - `data_provider` - one query refetched when matching changes arrive
//! - `crud` - REST data API, incremental refresh and the CRUD manager
//! - `live_query` / `live_resources` - collections kept in step with changes
//! - `connection` - connection notices and reload decisions

pub mod connection;
pub mod crud;
pub mod data_provider;
mod live;
pub mod live_query;
pub mod live_resources;
pub mod request_queue;
pub mod throttle;

pub use connection::{ConnectionNotifier, NoticeLevel, ReloadWatcher, UserNotice};
pub use crud::{
    fetch_changed_resources, CrudFilters, CrudManager, CrudManagerConfig, CrudState, Reconciled,
    RestDataApi,
};
pub use data_provider::{DataProvider, DataProviderConfig, RequestFactory, ResponseHandler};
pub use live::{LiveConfig, LiveSnapshot, LiveState};
pub use live_query::LiveQuery;
pub use live_resources::{LiveResources, ResourceSet, ResourceSpec};
pub use request_queue::{EntryStatus, Priority, QueueRequest, Queued, RequestQueue};
pub use throttle::CombineBuffer;
