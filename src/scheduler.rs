//! Batch scheduler: fan records out to the worker pool and fan results back
//! in, in input order.
//!
//! Two strategies are available (see [`Strategy`]):
//!
//! - **Batched** reads up to `batch_size` rows, submits one task per row,
//!   waits for the whole batch (bounded by `batch_timeout`), then writes the
//!   accepted lines in batch order before reading further.
//! - **Streaming** submits each row as soon as it is parsed, keeping at most
//!   `max_in_flight` tasks outstanding. Results arrive in completion order
//!   and are re-sequenced by row index in a single writer, so the output
//!   order still equals the input order.
//!
//! In both modes skipped rows are dropped silently, while a task fault
//! (panic, cancellation) or a timeout aborts the whole request. After a
//! fault the scheduler stops submitting, drains whatever is still
//! outstanding, and then reports the first fault.

use crate::config::{EnrichConfig, Strategy};
use crate::enrich::{Enrichment, RecordEnricher};
use crate::error::{EnrichError, EnrichResult};
use crate::metrics::EnrichSummary;
use crate::pool::WorkerPool;
use crate::record::RawTrade;
use crate::writer::LineSink;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// `(row index within the unit, outcome or fault message)`
type TaskResult = (usize, Result<Enrichment, String>);

pub struct BatchScheduler {
    pool: Arc<WorkerPool>,
    batch_size: usize,
    batch_timeout: Duration,
    max_in_flight: usize,
}

impl BatchScheduler {
    pub fn new(pool: Arc<WorkerPool>, config: &EnrichConfig) -> Self {
        Self {
            pool,
            batch_size: config.batch_size.max(1),
            batch_timeout: config.batch_timeout,
            max_in_flight: config.in_flight_limit().max(1),
        }
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Enrich every row of `rows` and write the header plus accepted lines to `sink`.
    ///
    /// # Errors
    /// - [`EnrichError::ReadingTradeData`] if `rows` yields a read error;
    /// - [`EnrichError::TradeLineProcessing`] if a task faults or the pool
    ///   refuses work;
    /// - [`EnrichError::BatchTimeout`] if a unit does not finish in time;
    /// - [`EnrichError::WriteOutput`] if the sink fails.
    ///
    /// Output already handed to `sink` is not rolled back.
    pub fn run<I, S>(
        &self,
        strategy: Strategy,
        rows: I,
        enricher: Arc<dyn RecordEnricher>,
        sink: &mut S,
    ) -> EnrichResult<EnrichSummary>
    where
        I: IntoIterator<Item = EnrichResult<RawTrade>>,
        S: LineSink + ?Sized,
    {
        let started = Instant::now();
        let mut summary = EnrichSummary::default();
        sink.write_header()?;
        match strategy {
            Strategy::Batched => self.run_batched(rows, &enricher, sink, &mut summary)?,
            Strategy::Streaming => self.run_streaming(rows, &enricher, sink, &mut summary)?,
        }
        sink.finish()?;
        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    fn run_batched<I, S>(
        &self,
        rows: I,
        enricher: &Arc<dyn RecordEnricher>,
        sink: &mut S,
        summary: &mut EnrichSummary,
    ) -> EnrichResult<()>
    where
        I: IntoIterator<Item = EnrichResult<RawTrade>>,
        S: LineSink + ?Sized,
    {
        let mut batch = Vec::with_capacity(self.batch_size);
        for row in rows {
            batch.push(row?);
            if batch.len() == self.batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(self.batch_size));
                self.process_batch(full, enricher, sink, summary)?;
            }
        }
        if !batch.is_empty() {
            self.process_batch(batch, enricher, sink, summary)?;
        }
        Ok(())
    }

    fn process_batch<S>(
        &self,
        batch: Vec<RawTrade>,
        enricher: &Arc<dyn RecordEnricher>,
        sink: &mut S,
        summary: &mut EnrichSummary,
    ) -> EnrichResult<()>
    where
        S: LineSink + ?Sized,
    {
        let len = batch.len();
        debug!(batch = summary.batches + 1, len, "dispatching batch");
        let (tx, rx) = crossbeam_channel::bounded(len);
        let mut submitted = 0;
        let mut fault = None;
        for (idx, row) in batch.into_iter().enumerate() {
            if let Err(e) = self.submit(idx, row, enricher, tx.clone()) {
                fault = Some(e);
                break;
            }
            submitted += 1;
        }
        drop(tx);

        let deadline = Instant::now() + self.batch_timeout;
        let mut slots: Vec<Option<Enrichment>> = (0..submitted).map(|_| None).collect();
        for received in 0..submitted {
            let (idx, outcome) = self.recv(&rx, deadline, submitted - received)?;
            match outcome {
                Ok(enrichment) => slots[idx] = Some(enrichment),
                Err(msg) => {
                    error!(batch = summary.batches + 1, index = idx, "error processing trade line: {msg}");
                    fault.get_or_insert(EnrichError::TradeLineProcessing(msg));
                }
            }
        }
        if let Some(e) = fault {
            return Err(e);
        }

        for enrichment in slots.into_iter().flatten() {
            summary.record(&enrichment);
            if let Enrichment::Accepted(line) = &enrichment {
                sink.write_line(line)?;
            }
        }
        summary.batches += 1;
        Ok(())
    }

    fn run_streaming<I, S>(
        &self,
        rows: I,
        enricher: &Arc<dyn RecordEnricher>,
        sink: &mut S,
        summary: &mut EnrichSummary,
    ) -> EnrichResult<()>
    where
        I: IntoIterator<Item = EnrichResult<RawTrade>>,
        S: LineSink + ?Sized,
    {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut out = Resequencer::new(sink, summary);
        let mut submitted = 0usize;
        let mut completed = 0usize;
        let mut fault: Option<EnrichError> = None;

        for row in rows {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    fault = Some(e);
                    break;
                }
            };
            while submitted - completed >= self.max_in_flight {
                let deadline = Instant::now() + self.batch_timeout;
                let (idx, outcome) = self.recv(&rx, deadline, submitted - completed)?;
                completed += 1;
                out.accept(idx, outcome, &mut fault);
            }
            if fault.is_some() {
                break;
            }
            if let Err(e) = self.submit(submitted, row, enricher, tx.clone()) {
                fault = Some(e);
                break;
            }
            submitted += 1;
        }
        drop(tx);

        while completed < submitted {
            let deadline = Instant::now() + self.batch_timeout;
            let (idx, outcome) = self.recv(&rx, deadline, submitted - completed)?;
            completed += 1;
            out.accept(idx, outcome, &mut fault);
        }
        out.summary.batches += submitted as u64;
        match fault {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn submit(
        &self,
        idx: usize,
        row: RawTrade,
        enricher: &Arc<dyn RecordEnricher>,
        tx: Sender<TaskResult>,
    ) -> EnrichResult<()> {
        let enricher = Arc::clone(enricher);
        self.pool.spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| enricher.enrich(&row)))
                .map_err(|payload| panic_message(payload.as_ref()));
            // The scheduler may already have given up on this unit.
            let _ = tx.send((idx, outcome));
        })
    }

    fn recv(
        &self,
        rx: &Receiver<TaskResult>,
        deadline: Instant,
        pending: usize,
    ) -> EnrichResult<TaskResult> {
        rx.recv_deadline(deadline).map_err(|e| match e {
            RecvTimeoutError::Timeout => {
                error!(pending, timeout = ?self.batch_timeout, "trade lines did not complete in time");
                EnrichError::BatchTimeout {
                    pending,
                    timeout: self.batch_timeout,
                }
            }
            RecvTimeoutError::Disconnected => EnrichError::TradeLineProcessing(format!(
                "{pending} trade lines were cancelled before completing"
            )),
        })
    }
}

/// Single writer that releases results strictly in submission order.
struct Resequencer<'a, S: ?Sized> {
    sink: &'a mut S,
    summary: &'a mut EnrichSummary,
    pending: BTreeMap<usize, Enrichment>,
    next: usize,
}

impl<'a, S> Resequencer<'a, S>
where
    S: LineSink + ?Sized,
{
    fn new(sink: &'a mut S, summary: &'a mut EnrichSummary) -> Self {
        Self {
            sink,
            summary,
            pending: BTreeMap::new(),
            next: 0,
        }
    }

    /// Buffer one result and flush every result that is now in sequence.
    /// Once `fault` is set, results are only drained, never written.
    fn accept(&mut self, idx: usize, outcome: Result<Enrichment, String>, fault: &mut Option<EnrichError>) {
        let enrichment = match outcome {
            Ok(enrichment) => enrichment,
            Err(msg) => {
                error!(index = idx, "error processing trade line: {msg}");
                fault.get_or_insert(EnrichError::TradeLineProcessing(msg));
                return;
            }
        };
        if fault.is_some() {
            return;
        }
        self.pending.insert(idx, enrichment);
        while let Some(enrichment) = self.pending.remove(&self.next) {
            self.next += 1;
            self.summary.record(&enrichment);
            if let Enrichment::Accepted(line) = &enrichment
                && let Err(e) = self.sink.write_line(line)
            {
                *fault = Some(e);
                self.pending.clear();
                return;
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker task panicked".to_string())
}
