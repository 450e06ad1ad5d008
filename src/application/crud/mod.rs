//! CRUD helpers over Eve resources.
//!
//! - `RestDataApi` - `DataApi` over an `HttpTransport`
//! - `fetch_changed_resources` - incremental refresh of a cached list
//! - `CrudManager` - paged view of one resource with writes

mod fetch_changed;
mod manager;
mod rest_data_api;

pub use fetch_changed::{fetch_changed_resources, Reconciled};
pub use manager::{CrudFilters, CrudManager, CrudManagerConfig, CrudState};
pub use rest_data_api::RestDataApi;
