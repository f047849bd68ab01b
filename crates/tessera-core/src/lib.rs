//! tessera-core: the session/layout model of the tessera terminal.
//!
//! Three layers, each owned by a single writer:
//!
//! - [`SessionRegistry`] — session id to metadata (title, cwd, active flag);
//!   pure data, no process ownership.
//! - [`LayoutNode`] — recursive split/leaf tree, one per tab; leaves hold
//!   session ids only.
//! - [`TabManager`] — owns the tab set and every layout tree, mediates all
//!   mutations, and drives a [`ProcessHost`] so each leaf gains/loses its
//!   shell process in lockstep with the tree.

pub mod error;
pub mod layout;
pub mod session;
pub mod tabs;

pub use error::CoreError;
pub use layout::{LayoutNode, NodeId, RemoveOutcome, SplitDirection};
pub use session::{Session, SessionId, SessionRegistry};
pub use tabs::{HostError, ListenerId, ProcessHost, Tab, TabId, TabManager};
