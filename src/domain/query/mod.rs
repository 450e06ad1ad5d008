//! Query module - the logical query model and its backend translations.
//!
//! - `filter` - `$and`/`$or` trees of field comparisons
//! - `descriptor` - filter + sort + paging for a list view
//! - `elastic` - translation to Elasticsearch request bodies
//! - `eve` - REST list parameters (`page`, `sort`, `where`, `max_results`)

mod descriptor;
mod elastic;
mod eve;
mod filter;

pub use descriptor::{QueryDescriptor, SortDirection, SortOption};
pub use elastic::{to_elastic_filter, to_elastic_query, ElasticQuery, ElasticQueryBody, FilteredQuery};
pub use eve::ListParams;
pub use filter::{Comparison, Filter};
