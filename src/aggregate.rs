// promptmap/src/aggregate.rs
//! Concurrent record aggregation.
//!
//! - `Aggregator` owns the tree for the whole concurrent phase; the tree is
//!   only mutated through `get_or_create_child` and `append_line`.
//! - `run` schedules one unit of work per `Producer` on the current rayon pool.
//!   A unit that errors or panics is reported to the `DiagnosticSink` and the
//!   run goes on with whatever that unit already contributed.
//! - Cancellation and bad records are surfaced to the caller; they are not
//!   producer-local failures.

use std::{
    cell::Cell,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use anyhow::anyhow;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::{
    error::AggregateError,
    record::{validate_segments, Record},
    tree::{Line, TreeNode},
};

/* ----------------------------- cancellation ----------------------------- */

/// Cooperative cancellation flag shared by every producer of a run.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<(), AggregateError> {
        if self.is_cancelled() {
            Err(AggregateError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/* ------------------------------ diagnostics ------------------------------ */

/// Where isolated producer failures go.
pub trait DiagnosticSink: Sync {
    fn producer_failed(&self, unit: &str, error: &anyhow::Error);
}

/// Default sink: one `warn!` per failed unit.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn producer_failed(&self, unit: &str, error: &anyhow::Error) {
        warn!(unit, error = %format!("{error:#}"), "producer failed; skipping");
    }
}

/// Keeps `(unit, message)` pairs in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    failures: Mutex<Vec<(String, String)>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> Vec<(String, String)> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl DiagnosticSink for CollectingSink {
    fn producer_failed(&self, unit: &str, error: &anyhow::Error) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((unit.to_string(), format!("{error:#}")));
    }
}

/* ------------------------------- producers ------------------------------- */

/// One independently schedulable unit of work (typically one file).
pub trait Producer: Send + Sync {
    /// Name used in diagnostics and logs.
    fn label(&self) -> String;

    fn produce(&self, emitter: &Emitter<'_>) -> anyhow::Result<()>;
}

impl<P: Producer + ?Sized> Producer for Box<P> {
    fn label(&self) -> String {
        (**self).label()
    }

    fn produce(&self, emitter: &Emitter<'_>) -> anyhow::Result<()> {
        (**self).produce(emitter)
    }
}

/// Closure-backed producer.
pub struct FnProducer<F> {
    label: String,
    f: F,
}

impl<F> FnProducer<F>
where
    F: Fn(&Emitter<'_>) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(label: impl Into<String>, f: F) -> Self {
        Self { label: label.into(), f }
    }
}

impl<F> Producer for FnProducer<F>
where
    F: Fn(&Emitter<'_>) -> anyhow::Result<()> + Send + Sync,
{
    fn label(&self) -> String {
        self.label.clone()
    }

    fn produce(&self, emitter: &Emitter<'_>) -> anyhow::Result<()> {
        (self.f)(emitter)
    }
}

/// Per-unit handle into the aggregator.
pub struct Emitter<'a> {
    aggregator: &'a Aggregator,
    cancel: &'a CancelToken,
    emitted: Cell<usize>,
}

impl<'a> Emitter<'a> {
    fn new(aggregator: &'a Aggregator, cancel: &'a CancelToken) -> Self {
        Self { aggregator, cancel, emitted: Cell::new(0) }
    }

    pub fn emit(&self, record: Record) -> Result<(), AggregateError> {
        self.aggregator.submit(record)?;
        self.emitted.set(self.emitted.get() + 1);
        Ok(())
    }

    /// Resolve (creating as needed) a container below the run's root.
    pub fn container<S: AsRef<str>>(&self, segments: &[S]) -> Result<Arc<TreeNode>, AggregateError> {
        self.aggregator.resolve_path(self.aggregator.root(), segments)
    }

    /// Natural checkpoint: `Err(Cancelled)` once the run has been cancelled.
    pub fn checkpoint(&self) -> Result<(), AggregateError> {
        self.cancel.check()
    }

    pub fn emitted(&self) -> usize {
        self.emitted.get()
    }
}

/* ------------------------------ aggregator ------------------------------ */

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub producers: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Units never started, or stopped at a checkpoint, because of cancellation.
    pub skipped: usize,
    pub records: usize,
}

#[derive(Debug)]
pub struct Aggregator {
    root: Arc<TreeNode>,
}

impl Aggregator {
    /// Fresh run with a single root. An empty name gives an unnamed root.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self { root: Arc::new(TreeNode::new(root_name)) }
    }

    pub fn root(&self) -> &Arc<TreeNode> {
        &self.root
    }

    /// Hand the finished tree to the renderer.
    pub fn finish(self) -> Arc<TreeNode> {
        self.root
    }

    pub fn get_or_create_child(&self, parent: &TreeNode, name: &str) -> Result<Arc<TreeNode>, AggregateError> {
        if name.is_empty() {
            return Err(AggregateError::EmptyName);
        }
        Ok(parent.child_or_insert(name))
    }

    pub fn append_line(&self, node: &TreeNode, text: impl Into<String>) {
        node.push_line(Line { text: text.into(), sort_key: None });
    }

    pub fn append_keyed_line(&self, node: &TreeNode, text: impl Into<String>, sort_key: Option<String>) {
        node.push_line(Line { text: text.into(), sort_key });
    }

    /// One `get_or_create_child` per segment, starting at `from`.
    pub fn resolve_path<S: AsRef<str>>(
        &self,
        from: &Arc<TreeNode>,
        segments: &[S],
    ) -> Result<Arc<TreeNode>, AggregateError> {
        validate_segments(segments)?;
        let mut cur = Arc::clone(from);
        for seg in segments {
            cur = self.get_or_create_child(&cur, seg.as_ref())?;
        }
        Ok(cur)
    }

    pub fn submit(&self, record: Record) -> Result<(), AggregateError> {
        record.validate()?;
        let node = self.resolve_path(&self.root, &record.path)?;
        if let Some(text) = record.line {
            self.append_keyed_line(&node, text, record.sort_key);
        }
        Ok(())
    }

    /// Run every producer on the current rayon pool and join.
    ///
    /// Returns `Cancelled` if the token was set before the run or observed
    /// during it, or the first invariant violation a producer propagated.
    pub fn run<P: Producer>(
        &self,
        producers: &[P],
        cancel: &CancelToken,
        diagnostics: &dyn DiagnosticSink,
    ) -> Result<RunStats, AggregateError> {
        cancel.check()?;

        let stop = AtomicBool::new(false);
        let cancel_seen = AtomicBool::new(false);
        let violation: Mutex<Option<AggregateError>> = Mutex::new(None);
        let succeeded = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let skipped = AtomicUsize::new(0);
        let records = AtomicUsize::new(0);

        producers.par_iter().for_each(|producer| {
            if stop.load(Ordering::Relaxed) {
                skipped.fetch_add(1, Ordering::Relaxed);
                return;
            }
            if cancel.is_cancelled() {
                cancel_seen.store(true, Ordering::Relaxed);
                skipped.fetch_add(1, Ordering::Relaxed);
                return;
            }

            let label = producer.label();
            let emitter = Emitter::new(self, cancel);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| producer.produce(&emitter)));
            records.fetch_add(emitter.emitted(), Ordering::Relaxed);

            let err = match outcome {
                Ok(Ok(())) => {
                    debug!(unit = %label, records = emitter.emitted(), "producer done");
                    succeeded.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Ok(Err(err)) => err,
                Err(payload) => anyhow!("producer panicked: {}", panic_message(payload.as_ref())),
            };

            match err.downcast_ref::<AggregateError>() {
                Some(AggregateError::Cancelled) => {
                    debug!(unit = %label, "producer stopped at checkpoint");
                    cancel_seen.store(true, Ordering::Relaxed);
                    skipped.fetch_add(1, Ordering::Relaxed);
                }
                Some(v) if v.is_invariant_violation() => {
                    warn!(unit = %label, error = %v, "invalid record; stopping run");
                    stop.store(true, Ordering::Relaxed);
                    let mut slot = violation.lock().unwrap_or_else(PoisonError::into_inner);
                    slot.get_or_insert_with(|| v.clone());
                }
                _ => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    diagnostics.producer_failed(&label, &err);
                }
            }
        });

        if let Some(v) = violation.into_inner().unwrap_or_else(PoisonError::into_inner) {
            return Err(v);
        }
        if cancel_seen.load(Ordering::Relaxed) {
            return Err(AggregateError::Cancelled);
        }

        Ok(RunStats {
            producers: producers.len(),
            succeeded: succeeded.into_inner(),
            failed: failed.into_inner(),
            skipped: skipped.into_inner(),
            records: records.into_inner(),
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
