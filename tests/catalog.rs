//! Catalog loading and service start-up.

use anyhow::Result;
use std::io::Write;
use trade_enrich::testing::*;
use trade_enrich::*;

#[test]
fn service_starts_from_catalog_file() -> Result<()> {
    let file = catalog_file(&sample_products())?;
    let config = EnrichConfig::new(file.path()).with_workers(2);

    let svc = TradeEnrichmentService::start(&config)?;

    assert_eq!(svc.catalog().len(), 4);
    assert_eq!(svc.catalog().product_name("3"), Some("REPO Domestic"));
    assert_eq!(svc.shutdown(), ShutdownOutcome::Drained);
    Ok(())
}

#[test]
fn unreadable_catalog_prevents_start() {
    let dir = tempfile::tempdir().unwrap();
    let config = EnrichConfig::new(dir.path().join("missing.csv"));

    let err = TradeEnrichmentService::start(&config).err().unwrap();

    assert_eq!(err.code(), ERROR_LOADING_PRODUCT_DATA);
    assert!(err.is_startup());
    let body = ErrorResponse::from(&err);
    assert_eq!(body.code, "ERROR_LOADING_PRODUCT_DATA");
    assert!(body.message.contains("missing.csv"));
}

#[test]
fn empty_catalog_file_is_fatal() -> Result<()> {
    let file = temp_file_with(b"", ".csv")?;

    let err = Catalog::load(file.path()).unwrap_err();

    assert_eq!(err.code(), ERROR_LOADING_PRODUCT_DATA);
    Ok(())
}

#[test]
fn catalog_with_wrong_headers_is_fatal() -> Result<()> {
    let file = temp_file_with(b"id,name\n1,Bills\n", ".csv")?;

    let err = Catalog::load(file.path()).unwrap_err();

    assert!(err.to_string().contains("product_id"));
    Ok(())
}

#[test]
fn invalid_config_is_rejected_before_loading() -> Result<()> {
    let file = catalog_file(&sample_products())?;
    let config = EnrichConfig::new(file.path()).with_batch_size(0);

    let err = TradeEnrichmentService::start(&config).err().unwrap();

    assert_eq!(err.code(), INVALID_CONFIGURATION);
    Ok(())
}

#[test]
fn duplicate_ids_keep_the_last_name() -> Result<()> {
    let file = catalog_file(&[("1", "Old Name"), ("2", "Bonds"), ("1", "New Name")])?;

    let catalog = Catalog::load(file.path())?;

    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.name_or_missing("1"), "New Name");
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzip_catalog_is_decompressed() -> Result<()> {
    let file = compressed_catalog_file(&sample_products(), ".csv.gz")?;

    let catalog = Catalog::load(file.path())?;

    assert_eq!(catalog.name_or_missing("1"), "Treasury Bills Domestic");
    Ok(())
}

#[cfg(feature = "compression-zstd")]
#[test]
fn zstd_catalog_without_extension_is_detected() -> Result<()> {
    let compressed = zstd::encode_all(catalog_csv(&sample_products()).as_bytes(), 0)?;
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(&compressed)?;
    file.flush()?;

    let catalog = Catalog::load(file.path())?;

    assert_eq!(catalog.len(), 4);
    Ok(())
}
