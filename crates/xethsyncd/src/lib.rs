//! xeth synchronization daemon
//!
//! Wires capture sources, configuration and diagnostics around the
//! [`xeth::Reconciler`]. Every source is replayed by its own task into one
//! shared engine; lifecycle notes are fanned out to subscribers.
//!
//! NIST 800-53 Rev5 [CM-8]: System Component Inventory - Driver device registry
//! NIST 800-53 Rev5 [SI-4]: System Monitoring - Lifecycle notes and counters

pub mod config_file;
pub mod error;
pub mod sync;
pub mod transport;

pub use config_file::{
    DEFAULT_CONFIG_PATH, LoggingConfig, MetricsConfig, SyncdConfig, TransportConfig,
};
pub use error::{Result, SyncdError};
pub use sync::{NamespaceDump, ReplayStats, StateDump, XethSync};
pub use transport::{CaptureSource, MAX_RECORD_LEN, write_record};
