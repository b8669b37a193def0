//! End-to-end enrichment scenarios through the service boundary.

use anyhow::Result;
use std::sync::Arc;
use trade_enrich::testing::*;
use trade_enrich::*;

fn service(products: &[(&str, &str)]) -> Result<TradeEnrichmentService> {
    let pool = Arc::new(WorkerPool::new(4)?);
    let config = EnrichConfig::new("unused.csv").with_batch_size(2);
    Ok(TradeEnrichmentService::with_parts(
        Catalog::from_pairs(products.iter().copied()),
        pool,
        &config,
    ))
}

#[test]
fn two_valid_rows_produce_three_lines() -> Result<()> {
    let svc = service(&[("1", "Treasury Bills Domestic"), ("2", "Corporate Bonds Domestic")])?;
    let input = trade_csv(&[["20240101", "1", "EUR", "10.0"], ["20240101", "2", "EUR", "20.1"]]);

    let lines = svc.enrich_to_lines(input.as_bytes())?;

    assert_eq!(
        lines,
        [
            "date,product_id,product_name,currency,price",
            "20240101,1,Treasury Bills Domestic,EUR,10.0",
            "20240101,2,Corporate Bonds Domestic,EUR,20.1",
        ]
    );
    Ok(())
}

#[test]
fn invalid_date_is_dropped_silently() -> Result<()> {
    let svc = service(&sample_products())?;
    let input = trade_csv(&[
        ["2024-01-01", "1", "EUR", "10.0"],
        ["20240101", "2", "EUR", "20.1"],
        ["20240230", "3", "EUR", "30.0"],
        ["2024011", "4", "EUR", "40.0"],
    ]);

    let lines = svc.enrich_to_lines(input.as_bytes())?;

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1], "20240101,2,Corporate Bonds Domestic,EUR,20.1");
    Ok(())
}

#[test]
fn unknown_product_uses_placeholder() -> Result<()> {
    let svc = service(&[("2", "Corporate Bonds Domestic")])?;
    let input = trade_csv(&[["20240101", "1", "EUR", "10.0"]]);

    let mut out = Vec::new();
    let summary = svc.enrich_to_writer(input.as_bytes(), &mut out)?;

    assert_eq!(
        String::from_utf8(out)?,
        "date,product_id,product_name,currency,price\n20240101,1,Missing Product Name,EUR,10.0\n"
    );
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.missing_product, 1);
    Ok(())
}

#[test]
fn empty_input_yields_header_only() -> Result<()> {
    let svc = service(&sample_products())?;

    assert_eq!(svc.enrich_to_lines("".as_bytes())?, [OUTPUT_HEADER]);
    assert_eq!(svc.enrich_to_lines(trade_csv::<[&str; 4]>(&[]).as_bytes())?, [OUTPUT_HEADER]);
    Ok(())
}

#[test]
fn all_invalid_rows_yield_header_only() -> Result<()> {
    let svc = service(&sample_products())?;
    let input = trade_csv(&[["bad", "1", "EUR", "1"], ["20241301", "1", "EUR", "1"]]);

    let mut out = Vec::new();
    let summary = svc.enrich_to_writer(input.as_bytes(), &mut out)?;

    assert_eq!(String::from_utf8(out)?, format!("{OUTPUT_HEADER}\n"));
    assert_eq!(summary.rows_read, 2);
    assert_eq!(summary.skipped_invalid_date, 2);
    Ok(())
}

#[test]
fn malformed_rows_are_skipped_per_record() -> Result<()> {
    let svc = service(&sample_products())?;
    let input = "date,product_id,currency,price\n\
                 20240101,1,EUR\n\
                 20240102,2,EUR,2.0\n\
                 20240103,3,EUR,3.0,extra\n";

    let mut sink = VecSink::new();
    let summary = svc.enrich(input.as_bytes(), &mut sink)?;

    assert_eq!(sink.lines()[1..], ["20240102,2,Corporate Bonds Domestic,EUR,2.0"]);
    assert_eq!(summary.skipped_malformed, 2);
    Ok(())
}

#[test]
fn header_columns_may_be_reordered_or_extra() -> Result<()> {
    let svc = service(&sample_products())?;
    let input = "price,trader,currency,product_id,date\n10.0,alice,USD,3,20231231\n";

    let lines = svc.enrich_to_lines(input.as_bytes())?;

    assert_eq!(lines[1], "20231231,3,REPO Domestic,USD,10.0");
    Ok(())
}

#[test]
fn missing_required_column_skips_every_row() -> Result<()> {
    let svc = service(&sample_products())?;
    let input = "date,product_id,price\n20240101,1,10.0\n20240102,2,20.0\n";

    let mut sink = VecSink::new();
    let summary = svc.enrich(input.as_bytes(), &mut sink)?;

    assert_eq!(sink.into_lines(), [OUTPUT_HEADER]);
    assert_eq!(summary.skipped_malformed, 2);
    Ok(())
}

#[test]
fn fields_are_written_verbatim() -> Result<()> {
    let svc = service(&[("7", "Bonds, Corporate")])?;
    let input = "date,product_id,currency,price\n20240101,7,EUR,\"1,000.5\"\n";

    let lines = svc.enrich_to_lines(input.as_bytes())?;

    assert_eq!(lines[1], "20240101,7,Bonds, Corporate,EUR,1,000.5");
    Ok(())
}

#[test]
fn invalid_utf8_in_one_row_does_not_fail_the_request() -> Result<()> {
    let svc = service(&sample_products())?;
    let input: &[u8] = b"date,product_id,currency,price\n\
                         20240101,1,EUR,10.0\n\
                         20240101,2,EUR,2\xff\n\
                         2024\xff101,3,EUR,30.0\n\
                         20240101,3,EUR,30.0\n";

    let mut sink = VecSink::new();
    let summary = svc.enrich(input, &mut sink)?;

    assert_eq!(
        sink.lines()[1..],
        [
            "20240101,1,Treasury Bills Domestic,EUR,10.0",
            "20240101,2,Corporate Bonds Domestic,EUR,2\u{FFFD}",
            "20240101,3,REPO Domestic,EUR,30.0",
        ]
    );
    assert_eq!(summary.skipped_invalid_date, 1);
    Ok(())
}
