//! tessera-pty: shell process lifecycle for the tessera terminal core.
//!
//! This crate owns every OS shell subprocess. Each leaf session in the layout
//! model is bound to at most one PTY, and the bridge streams raw output back
//! to subscribers tagged with the owning session id.
//!
//! # Architecture
//!
//! - [`PtyHandle`] — Low-level PTY process management (spawn, read, write,
//!   resize, kill).
//! - [`PtyBridge`] — Session-id-keyed process table with per-session reader
//!   threads and async output/exit event fan-out.

pub mod bridge;
pub mod pty;

/// Unique identifier for a terminal session.
pub type SessionId = u64;

pub use bridge::{BridgeConfig, PtyBridge, PtyEvent};
pub use pty::{default_shell, PtyError, PtyHandle, DEFAULT_COLS, DEFAULT_ROWS};
