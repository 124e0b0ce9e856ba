//! Progress reporting shared by the reader and the writers.
//!
//! Callers pass a `&mut dyn ProgressSink` into a blocking run. Any
//! `FnMut(&ProgressUpdate)` closure is a sink. A sink may also ask the run to
//! stop; the run checks between ticks and fails with [`Cancelled`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

/// One progress tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// 0..=100
    pub percent: u8,
    /// Human-readable status
    pub message: String,
}

pub trait ProgressSink {
    fn report(&mut self, update: &ProgressUpdate);

    fn is_cancelled(&self) -> bool {
        false
    }
}

impl<F> ProgressSink for F
where
    F: FnMut(&ProgressUpdate),
{
    fn report(&mut self, update: &ProgressUpdate) {
        self(update)
    }
}

/// Sink that drops every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _update: &ProgressUpdate) {}
}

/// Wraps a sink with a shared cancellation flag.
#[derive(Debug)]
pub struct Cancellable<S> {
    inner: S,
    flag: Arc<AtomicBool>,
}

impl<S> Cancellable<S> {
    pub fn new(inner: S, flag: Arc<AtomicBool>) -> Self {
        Self { inner, flag }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ProgressSink> ProgressSink for Cancellable<S> {
    fn report(&mut self, update: &ProgressUpdate) {
        self.inner.report(update);
    }

    fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.inner.is_cancelled()
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation cancelled by caller")]
pub struct Cancelled;

/// Turns unit counts (bytes, entities) into percent ticks.
///
/// An update is forwarded only when the integer percent or the stage message
/// changes, so large inputs produce at most ~100 ticks per stage.
pub struct ProgressTracker<'a> {
    sink: &'a mut dyn ProgressSink,
    total: u64,
    done: u64,
    stage: String,
    last: Option<(u8, usize)>,
    stage_serial: usize,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(sink: &'a mut dyn ProgressSink, total: u64) -> Self {
        Self {
            sink,
            total,
            done: 0,
            stage: String::new(),
            last: None,
            stage_serial: 0,
        }
    }

    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.done.min(self.total) * 100) / self.total) as u8
    }

    /// Switch the status message and emit a tick at the current percent.
    pub fn stage(&mut self, message: impl Into<String>) -> Result<(), Cancelled> {
        self.stage = message.into();
        self.stage_serial += 1;
        self.emit()
    }

    /// Record `units` of completed work.
    pub fn advance(&mut self, units: u64) -> Result<(), Cancelled> {
        self.done = self.done.saturating_add(units);
        self.emit()
    }

    /// Emit the final 100% tick. The run is complete at this point, so a
    /// pending cancellation request is ignored.
    pub fn finish(&mut self, message: impl Into<String>) {
        self.done = self.total;
        self.stage = message.into();
        self.sink.report(&ProgressUpdate {
            percent: 100,
            message: self.stage.clone(),
        });
    }

    fn emit(&mut self) -> Result<(), Cancelled> {
        if self.sink.is_cancelled() {
            return Err(Cancelled);
        }
        let key = (self.percent(), self.stage_serial);
        if self.last != Some(key) {
            self.last = Some(key);
            self.sink.report(&ProgressUpdate {
                percent: key.0,
                message: self.stage.clone(),
            });
        }
        Ok(())
    }
}
