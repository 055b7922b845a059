pub mod loader;
pub mod types;

pub use loader::{load_catalog, parse_catalog};
pub use types::{ANY, CatalogDocument, CatalogEntry, CatalogError, CatalogResult, Preconditions, ProductState};
