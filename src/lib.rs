//! examwatch - Exam-Room Monitoring Orchestrator
//!
//! ## Architecture
//!
//! 1. LifecycleController - run/stop/stopping state machine, signal intake
//! 2. MonitorSession - per-frame control loop (root component)
//! 3. AlertThrottle - per-subject rate limiting and alert records
//! 4. SnapshotWriter - crash-safe snapshot persistence
//! 5. ErrorCircuitBreaker - consecutive-failure stop policy
//! 6. ProcessDiagnostics - PID marker file
//! 7. Capture / Analysis / Presenter - external collaborator seams
//!
//! ## Design Principles
//!
//! - Perception is opaque: pose estimation and behavior analysis sit
//!   behind traits and an HTTP client, never in-process
//! - Cooperative cancellation: shutdown flips a shared state cell that
//!   every state-sensitive operation re-checks itself
//! - Durability: alert evidence is committed via write-fsync-rename, and
//!   recorded alerts survive snapshot failures

pub mod alert;
pub mod analysis;
pub mod capture;
pub mod circuit_breaker;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod lifecycle;
pub mod monitor;
pub mod overlay;
pub mod presenter;
pub mod snapshot;

pub use error::{Error, Result};
