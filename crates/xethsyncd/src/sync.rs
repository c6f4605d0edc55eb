//! Receive loop feeding driver datagrams into the shared reconciler
//!
//! Each source is drained by its own task, so per-source order is kept while
//! sources proceed in parallel. Notes are fanned out to subscribers over a
//! broadcast channel.

use crate::error::{Result, SyncdError};
use crate::transport::CaptureSource;
use serde::Serialize;
use std::ops::AddAssign;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::AsyncRead;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use xeth::{Link, NetNs, Note, Reconciler, Xid};

/// Notes buffered per subscriber before the slowest one starts lagging
const NOTE_CHANNEL_CAPACITY: usize = 1024;

/// Per-source replay counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub messages: u64,
    pub notes: u64,
    pub decode_errors: u64,
}

impl AddAssign for ReplayStats {
    fn add_assign(&mut self, other: Self) {
        self.messages += other.messages;
        self.notes += other.notes;
        self.decode_errors += other.decode_errors;
    }
}

/// One namespace's index, as dumped
#[derive(Debug, Serialize)]
pub struct NamespaceDump {
    pub netns: NetNs,
    pub entries: Vec<(i32, Xid)>,
}

/// Registry and namespace index, as dumped
#[derive(Debug, Serialize)]
pub struct StateDump {
    pub dump_done: bool,
    pub links: Vec<Link>,
    pub namespaces: Vec<NamespaceDump>,
}

#[derive(Debug, Clone)]
pub struct XethSync {
    engine: Arc<Reconciler>,
    notes: broadcast::Sender<Note>,
    shutdown: Arc<AtomicBool>,
}

impl XethSync {
    pub fn new(engine: Arc<Reconciler>) -> Self {
        let (notes, _) = broadcast::channel(NOTE_CHANNEL_CAPACITY);
        Self {
            engine,
            notes,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn engine(&self) -> &Arc<Reconciler> {
        &self.engine
    }

    /// Receive every note produced from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Note> {
        self.notes.subscribe()
    }

    /// Flag checked between records; set it to stop all replays
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Feed one source to the engine until it ends or shutdown is requested.
    ///
    /// Malformed datagrams are logged and skipped; framing errors end the
    /// source.
    #[instrument(skip(self, source), fields(source = source.name()))]
    pub async fn replay<R: AsyncRead + Unpin>(
        &self,
        mut source: CaptureSource<R>,
    ) -> Result<ReplayStats> {
        let mut stats = ReplayStats::default();
        while !self.shutdown.load(Ordering::Relaxed) {
            let Some(datagram) = source.next_record().await? else {
                break;
            };
            stats.messages += 1;
            match self.engine.rx_bytes(&datagram) {
                Ok(Some(note)) => {
                    debug!(%note, "note");
                    stats.notes += 1;
                    // no subscribers is fine
                    let _ = self.notes.send(note);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, len = datagram.len(), "dropping malformed message");
                    stats.decode_errors += 1;
                }
            }
        }
        info!(
            messages = stats.messages,
            notes = stats.notes,
            decode_errors = stats.decode_errors,
            "source drained"
        );
        Ok(stats)
    }

    /// Replay every path concurrently, one task each.
    ///
    /// All tasks run to completion; the first failure is returned.
    pub async fn run(&self, sources: &[PathBuf]) -> Result<ReplayStats> {
        let tasks: Vec<_> = sources
            .iter()
            .cloned()
            .map(|path| {
                let sync = self.clone();
                tokio::spawn(async move {
                    let source = CaptureSource::open(&path).await?;
                    sync.replay(source).await
                })
            })
            .collect();

        let mut total = ReplayStats::default();
        let mut first_error = None;
        for task in tasks {
            match task.await {
                Ok(Ok(stats)) => total += stats,
                Ok(Err(e)) => {
                    warn!(error = %e, "source failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(SyncdError::Task(e.to_string()));
                    }
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(total),
        }
    }

    /// Current registry and index contents
    pub fn state(&self) -> StateDump {
        let netns = self.engine.netns();
        StateDump {
            dump_done: self.engine.dump_done(),
            links: self
                .engine
                .links()
                .snapshot()
                .into_iter()
                .map(|(_, link)| link)
                .collect(),
            namespaces: netns
                .namespaces()
                .into_iter()
                .filter_map(|ns| {
                    netns.table(ns).map(|table| NamespaceDump {
                        netns: ns,
                        entries: table.entries(),
                    })
                })
                .collect(),
        }
    }

    pub fn dump_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.state())?)
    }
}
