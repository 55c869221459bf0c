pub mod engine;
pub mod filter;
pub mod pagination;
pub mod predicate;
pub mod server;

pub use engine::{FacetQueryEngine, Facets, SearchResponse};
pub use filter::{parse_filters, AttributeFilter};
pub use pagination::{PageMeta, PageRequest};
pub use predicate::{Predicate, ValueGroup};
pub use server::{router, AppState, QueryServer};
