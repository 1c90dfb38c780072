//! Experiment Harness
//!
//! Load N key/value pairs with a chosen write strategy, time it, and
//! optionally read everything back and check it.
//!
//! ## Strategies
//! - `Map`: plain `HashMap`, the in-memory baseline
//! - `Direct`: one commit per write
//! - `Batched`: `BatchWriter` with a flush threshold
//! - `Coalesced`: bounded worker pool with a final barrier

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::coalescer::{Coalescer, CoalescerConfig};
use crate::config::Config;
use crate::error::{BatchError, Result};
use crate::flusher::FailurePolicy;
use crate::retry::RetryPolicy;
use crate::store::Store;
use crate::writer::BatchWriter;

/// Bucket used when none is given
pub const DEFAULT_BUCKET: &str = "MyBucket";

/// The entries an experiment writes
///
/// Entry `i` has key `i` in decimal and a value of that key repeated five
/// times: `"0" → "00000"`, `"12" → "1212121212"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Workload {
    pub count: usize,
}

impl Workload {
    pub fn new(count: usize) -> Self {
        Self { count }
    }

    pub fn key(&self, i: usize) -> Bytes {
        Bytes::from(i.to_string())
    }

    pub fn value(&self, i: usize) -> Bytes {
        Bytes::from(i.to_string().repeat(5))
    }

    pub fn entries(&self) -> impl Iterator<Item = (Bytes, Bytes)> + '_ {
        (0..self.count).map(move |i| (self.key(i), self.value(i)))
    }
}

/// How the workload is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Map,
    Direct,
    Batched { threshold: usize },
    Coalesced(CoalescerConfig),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Map => "map",
            Strategy::Direct => "direct",
            Strategy::Batched { .. } => "batched",
            Strategy::Coalesced(_) => "coalesced",
        }
    }
}

/// Outcome of the read-back check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub checked: u64,
    pub missing: u64,
    pub mismatched: u64,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.missing == 0 && self.mismatched == 0
    }
}

/// Measurements of one run
#[derive(Debug, Clone)]
pub struct ExperimentReport {
    pub strategy: Strategy,
    pub entries_written: u64,
    pub batches_committed: u64,
    pub write_elapsed: Duration,
    pub read_elapsed: Option<Duration>,
    pub verify: Option<VerifyReport>,
}

impl ExperimentReport {
    pub fn writes_per_sec(&self) -> f64 {
        let secs = self.write_elapsed.as_secs_f64();
        if secs == 0.0 {
            return f64::INFINITY;
        }
        self.entries_written as f64 / secs
    }
}

/// One configured run of the harness
#[derive(Debug, Clone)]
pub struct Experiment {
    pub workload: Workload,
    pub strategy: Strategy,
    pub bucket: Bytes,
    pub read_back: bool,
    pub verify: bool,
    pub retry: RetryPolicy,
    pub failure_policy: FailurePolicy,
}

impl Experiment {
    pub fn new(workload: Workload, strategy: Strategy) -> Self {
        Self {
            workload,
            strategy,
            bucket: Bytes::from_static(DEFAULT_BUCKET.as_bytes()),
            read_back: false,
            verify: false,
            retry: RetryPolicy::default(),
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn bucket(mut self, bucket: impl Into<Bytes>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Time a full read pass after writing
    pub fn read_back(mut self, enabled: bool) -> Self {
        self.read_back = enabled;
        self
    }

    /// Check every value after writing
    pub fn verify(mut self, enabled: bool) -> Self {
        self.verify = enabled;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Run the experiment against `store` (ignored by `Strategy::Map`)
    ///
    /// A failed write aborts the run with `BatchError::Aborted`, which
    /// records how many entries were already durably committed.
    pub fn run<S>(&self, store: &S) -> Result<ExperimentReport>
    where
        S: Store + Clone + 'static,
    {
        tracing::info!(
            "Running {} strategy: {} entries into bucket {}",
            self.strategy.name(),
            self.workload.count,
            String::from_utf8_lossy(&self.bucket)
        );

        let (entries_written, batches_committed, write_elapsed) = match self.strategy {
            Strategy::Map => return self.run_map(),
            Strategy::Direct => self.write_batched(store.clone(), 0)?,
            Strategy::Batched { threshold } => self.write_batched(store.clone(), threshold)?,
            Strategy::Coalesced(config) => self.write_coalesced(store.clone(), config)?,
        };

        tracing::info!(
            "Wrote {} entries in {} commits in {:?}",
            entries_written,
            batches_committed,
            write_elapsed
        );

        let mut report = ExperimentReport {
            strategy: self.strategy,
            entries_written,
            batches_committed,
            write_elapsed,
            read_elapsed: None,
            verify: None,
        };

        if self.read_back || self.verify {
            let started = Instant::now();
            let checked = verify(store, &self.bucket, &self.workload)?;
            self.record_read(&mut report, started.elapsed(), checked);
        }

        Ok(report)
    }

    fn run_map(&self) -> Result<ExperimentReport> {
        let started = Instant::now();
        let mut map: HashMap<Bytes, Bytes> = HashMap::with_capacity(self.workload.count);
        for (key, value) in self.workload.entries() {
            map.insert(key, value);
        }
        let write_elapsed = started.elapsed();

        let mut report = ExperimentReport {
            strategy: Strategy::Map,
            entries_written: map.len() as u64,
            batches_committed: 0,
            write_elapsed,
            read_elapsed: None,
            verify: None,
        };

        if self.read_back || self.verify {
            let started = Instant::now();
            let checked =
                verify_with(&self.workload, |key| Ok(map.get(key).map(|v| v.to_vec())))?;
            self.record_read(&mut report, started.elapsed(), checked);
        }

        Ok(report)
    }

    fn record_read(&self, report: &mut ExperimentReport, elapsed: Duration, checked: VerifyReport) {
        tracing::info!(
            "Read back {} entries in {:?} ({} missing, {} mismatched)",
            checked.checked,
            elapsed,
            checked.missing,
            checked.mismatched
        );
        if self.read_back {
            report.read_elapsed = Some(elapsed);
        }
        if self.verify {
            report.verify = Some(checked);
        }
    }

    fn write_batched<S>(&self, store: S, threshold: usize) -> Result<(u64, u64, Duration)>
    where
        S: Store,
    {
        store.create_bucket(&self.bucket)?;

        let config = Config::builder()
            .flush_threshold(threshold)
            .retry(self.retry.clone())
            .failure_policy(self.failure_policy)
            .build();
        let mut writer = BatchWriter::new(store, self.bucket.clone(), &config);

        let started = Instant::now();
        for (key, value) in self.workload.entries() {
            if let Err(e) = writer.put(key, value) {
                return Err(abort(writer.stats().entries_committed, e));
            }
        }

        let committed_before_finish = writer.stats().entries_committed;
        let summary = writer
            .finish()
            .map_err(|e| abort(committed_before_finish, e))?;
        Ok((
            summary.entries_committed,
            summary.batches_committed,
            started.elapsed(),
        ))
    }

    fn write_coalesced<S>(&self, store: S, config: CoalescerConfig) -> Result<(u64, u64, Duration)>
    where
        S: Store + 'static,
    {
        store.create_bucket(&self.bucket)?;

        let started = Instant::now();
        let coalescer = Coalescer::new(store, self.bucket.clone(), config, self.retry.clone())?;

        for (key, value) in self.workload.entries() {
            coalescer.submit(key, value)?;
        }

        match coalescer.shutdown() {
            Ok(report) => Ok((
                report.entries_committed,
                report.batches_committed,
                started.elapsed(),
            )),
            Err(e) => Err(abort(e.report.entries_committed, e)),
        }
    }
}

fn abort<E>(committed: u64, source: E) -> BatchError
where
    E: std::error::Error + Send + Sync + 'static,
{
    tracing::error!("Run aborted after {} committed entries: {}", committed, source);
    BatchError::Aborted {
        committed,
        source: Box::new(source),
    }
}

/// Read every workload key back from `store` and compare values
pub fn verify<S: Store + ?Sized>(store: &S, bucket: &[u8], workload: &Workload) -> Result<VerifyReport> {
    verify_with(workload, |key| store.get(bucket, key))
}

fn verify_with<F>(workload: &Workload, mut lookup: F) -> Result<VerifyReport>
where
    F: FnMut(&[u8]) -> Result<Option<Vec<u8>>>,
{
    let mut report = VerifyReport::default();
    for (key, expected) in workload.entries() {
        report.checked += 1;
        match lookup(&key)? {
            None => report.missing += 1,
            Some(actual) if actual != expected => report.mismatched += 1,
            Some(_) => {}
        }
    }
    Ok(report)
}
