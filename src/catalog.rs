//! Read-only product catalog used to enrich trade records.
//!
//! The catalog is built once, eagerly, before any enrichment request is
//! served, and is never mutated afterwards. Workers share it through an
//! [`Arc`], so lookups need no locking.
//!
//! Source format: CSV with a header row containing `product_id` and
//! `product_name` (extra columns are ignored). Duplicate ids keep the last
//! row seen.

use crate::error::{EnrichError, EnrichResult};
use crate::io::compression::open_reader;
use anyhow::{Context, anyhow, bail};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Placeholder product name for ids absent from the catalog.
pub const MISSING_PRODUCT_NAME: &str = "Missing Product Name";

pub const PRODUCT_ID_HEADER: &str = "product_id";
pub const PRODUCT_NAME_HEADER: &str = "product_name";

/// Immutable `product_id -> product_name` mapping.
///
/// Cloning is cheap: clones share the same underlying map.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    products: Arc<HashMap<String, String>>,
}

impl Catalog {
    /// Load the catalog from a file, decompressing it if needed.
    ///
    /// # Errors
    /// Any failure (missing file, I/O error, missing header column, short
    /// row) is reported as [`EnrichError::CatalogLoad`]; the service must not
    /// start without a catalog.
    pub fn load(path: impl AsRef<Path>) -> EnrichResult<Self> {
        let path = path.as_ref();
        let catalog = open_reader(path)
            .and_then(parse_catalog)
            .map(Self::from_map)
            .map_err(|e| {
                error!(path = %path.display(), "error loading product data: {e:#}");
                EnrichError::catalog(path, format!("{e:#}"))
            })?;
        info!(path = %path.display(), products = catalog.len(), "product catalog loaded");
        Ok(catalog)
    }

    /// Build a catalog from any CSV source.
    ///
    /// # Errors
    /// See [`Catalog::load`]; the error path is reported as `<reader>`.
    pub fn from_reader<R: Read>(reader: R) -> EnrichResult<Self> {
        parse_catalog(reader)
            .map(Self::from_map)
            .map_err(|e| EnrichError::catalog("<reader>", format!("{e:#}")))
    }

    /// Build a catalog from `(id, name)` pairs. Later pairs win on duplicate ids.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::from_map(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    fn from_map(products: HashMap<String, String>) -> Self {
        Self {
            products: Arc::new(products),
        }
    }

    #[must_use]
    pub fn product_name(&self, product_id: &str) -> Option<&str> {
        self.products.get(product_id).map(String::as_str)
    }

    /// Product name, or [`MISSING_PRODUCT_NAME`] when the id is unknown.
    #[must_use]
    pub fn name_or_missing(&self, product_id: &str) -> &str {
        self.product_name(product_id).unwrap_or(MISSING_PRODUCT_NAME)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

fn parse_catalog<R: Read>(reader: R) -> anyhow::Result<HashMap<String, String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers = rdr.headers().context("read catalog header")?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| anyhow!("missing required column `{name}`"))
    };
    let id_idx = column(PRODUCT_ID_HEADER)?;
    let name_idx = column(PRODUCT_NAME_HEADER)?;

    let mut products = HashMap::new();
    for (i, rec) in rdr.records().enumerate() {
        let rec = rec.with_context(|| format!("parse catalog record #{}", i + 1))?;
        let (Some(id), Some(name)) = (rec.get(id_idx), rec.get(name_idx)) else {
            bail!("catalog record #{} has {} fields", i + 1, rec.len());
        };
        products.insert(id.to_string(), name.to_string());
    }
    Ok(products)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_duplicate_wins() {
        let csv = "product_id,product_name\n1,Old\n2,Bonds\n1,New\n";
        let catalog = Catalog::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.product_name("1"), Some("New"));
    }

    #[test]
    fn column_order_is_free() {
        let csv = "product_name,extra,product_id\nTreasury Bills Domestic,x,1\n";
        let catalog = Catalog::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(catalog.name_or_missing("1"), "Treasury Bills Domestic");
        assert_eq!(catalog.name_or_missing("9"), MISSING_PRODUCT_NAME);
    }

    #[test]
    fn missing_column_is_fatal() {
        let err = Catalog::from_reader("id,name\n1,A\n".as_bytes()).unwrap_err();
        assert!(err.is_startup());
        assert!(err.to_string().contains("product_id"));
    }

    #[test]
    fn short_row_is_fatal() {
        let err = Catalog::from_reader("product_id,product_name\n1\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("record #1"));
    }
}
