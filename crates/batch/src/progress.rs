//! Progress reporting for batch runs
//!
//! The orchestrator reports through a caller-supplied [`ProgressSink`]:
//! a closure, a `crossbeam_channel` sender for UI threads, or nothing.

use crate::summary::{FileRecord, RunSummary};
use crossbeam_channel::Sender;
use std::path::PathBuf;

/// Events emitted during a run, in order
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Discovery finished; `total` files will be reported
    Discovered { total: usize },
    /// Processing of the file at `index` (0-based) started
    FileStarted {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    /// The file at `index` got its outcome
    FileFinished {
        index: usize,
        total: usize,
        record: FileRecord,
    },
    /// The summary was persisted
    Finished { summary: RunSummary },
}

/// Receiver of progress events
pub trait ProgressSink {
    fn on_event(&mut self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: FnMut(ProgressEvent),
{
    fn on_event(&mut self, event: ProgressEvent) {
        self(event)
    }
}

/// Forwards events to a channel; a disconnected receiver is ignored
#[derive(Debug, Clone)]
pub struct ChannelProgress(pub Sender<ProgressEvent>);

impl ProgressSink for ChannelProgress {
    fn on_event(&mut self, event: ProgressEvent) {
        let _ = self.0.send(event);
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_event(&mut self, _event: ProgressEvent) {}
}
