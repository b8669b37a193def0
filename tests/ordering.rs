//! Output order and row accounting across strategies and batch sizes.

use anyhow::Result;
use std::sync::Arc;
use trade_enrich::testing::*;
use trade_enrich::*;

fn service(strategy: Strategy, batch_size: usize, workers: usize) -> Result<TradeEnrichmentService> {
    let config = EnrichConfig::new("unused.csv")
        .with_batch_size(batch_size)
        .with_workers(workers)
        .with_strategy(strategy);
    let pool = Arc::new(WorkerPool::new(workers)?);
    Ok(TradeEnrichmentService::with_parts(sample_catalog(), pool, &config))
}

fn prices(lines: &[String]) -> Vec<String> {
    lines[1..]
        .iter()
        .map(|l| l.rsplit(',').next().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn batched_output_follows_input_order() -> Result<()> {
    let svc = service(Strategy::Batched, 16, 8)?;
    let input = generated_trades(1_000);

    let lines = svc.enrich_to_lines(input.as_bytes())?;

    assert_eq!(lines[0], OUTPUT_HEADER);
    assert_eq!(prices(&lines), generated_accepted_prices(1_000));
    Ok(())
}

#[test]
fn streaming_output_follows_input_order() -> Result<()> {
    let svc = service(Strategy::Streaming, 8, 8)?;
    let input = generated_trades(1_000);

    let lines = svc.enrich_to_lines(input.as_bytes())?;

    assert_eq!(prices(&lines), generated_accepted_prices(1_000));
    Ok(())
}

#[test]
fn strategies_produce_identical_output() -> Result<()> {
    let input = generated_trades(257);
    let batched = service(Strategy::Batched, 10, 3)?.enrich_to_lines(input.as_bytes())?;
    let streaming = service(Strategy::Streaming, 10, 3)?.enrich_to_lines(input.as_bytes())?;

    assert_eq!(batched, streaming);
    Ok(())
}

#[test]
fn partial_trailing_batch_is_processed() -> Result<()> {
    let svc = service(Strategy::Batched, 4, 2)?;
    let input = generated_trades(10);

    let mut sink = VecSink::new();
    let summary = svc.enrich(input.as_bytes(), &mut sink)?;

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.rows_read, 10);
    assert_eq!(prices(sink.lines()), generated_accepted_prices(10));
    Ok(())
}

#[test]
fn batch_size_one_and_larger_than_input() -> Result<()> {
    let input = generated_trades(20);
    for batch_size in [1, 20, 1_000] {
        let svc = service(Strategy::Batched, batch_size, 4)?;
        let lines = svc.enrich_to_lines(input.as_bytes())?;
        assert_eq!(prices(&lines), generated_accepted_prices(20), "batch_size {batch_size}");
    }
    Ok(())
}

#[test]
fn output_rows_equal_rows_with_valid_dates() -> Result<()> {
    for n in [0, 1, 6, 7, 50, 333] {
        for strategy in [Strategy::Batched, Strategy::Streaming] {
            let svc = service(strategy, 7, 4)?;
            let mut out = Vec::new();
            let summary = svc.enrich_to_writer(generated_trades(n).as_bytes(), &mut out)?;

            let expected = generated_accepted_prices(n).len();
            let written = String::from_utf8(out)?.lines().count();
            assert_eq!(written, expected + 1, "n {n} {strategy:?}");
            assert_eq!(summary.accepted as usize, expected);
            assert_eq!(summary.rows_read as usize, n);
            assert_eq!(summary.accepted + summary.skipped(), summary.rows_read);
        }
    }
    Ok(())
}

#[test]
fn pool_is_shared_across_requests() -> Result<()> {
    let svc = service(Strategy::Batched, 5, 2)?;
    let input = generated_trades(40);

    let first = svc.enrich_to_lines(input.as_bytes())?;
    let second = svc.enrich_to_lines(input.as_bytes())?;

    assert_eq!(first, second);
    assert_eq!(svc.pool().in_flight(), 0);
    assert!(svc.pool().is_accepting());
    Ok(())
}

#[cfg(feature = "metrics")]
#[test]
fn metrics_accumulate_over_requests() -> Result<()> {
    let svc = service(Strategy::Batched, 5, 2)?;
    svc.enrich_to_lines(generated_trades(10).as_bytes())?;
    svc.enrich_to_lines(generated_trades(10).as_bytes())?;

    let json = svc.metrics().to_json();
    assert_eq!(json["requests"], 2);
    assert_eq!(json["rows_read"], 20);
    assert_eq!(json["batches"], 4);
    Ok(())
}
