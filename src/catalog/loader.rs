use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use super::types::{CatalogDocument, CatalogError, CatalogResult};

/// Read and parse a catalog file. The document is trusted: beyond JSON shape
/// nothing is validated, and duplicate ids are only reported.
pub fn load_catalog(path: impl AsRef<Path>) -> CatalogResult<CatalogDocument> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| CatalogError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let doc = parse_catalog(&text)?;
    debug!(path = %path.display(), templates = doc.templates.len(), "loaded catalog");
    Ok(doc)
}

/// Parse catalog JSON text
pub fn parse_catalog(text: &str) -> CatalogResult<CatalogDocument> {
    let doc: CatalogDocument = serde_json::from_str(text)?;
    for id in doc.duplicate_ids() {
        warn!(id, "catalog id appears more than once");
    }
    Ok(doc)
}
