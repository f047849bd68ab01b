use crate::layout::NodeId;
use crate::session::SessionId;
use crate::tabs::TabId;

/// Errors from the session/layout model.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    SessionNotFound(SessionId),
    TabNotFound(TabId),
    /// The session is not a leaf of the given tab's layout.
    PaneNotFound { tab: TabId, session: SessionId },
    NodeNotFound(NodeId),
    BadChildIndex { node: NodeId, index: usize },
    /// A layout tree invariant does not hold. Layout operations never
    /// produce such a state; this surfaces only from explicit validation.
    Invariant(String),
}

impl std::fmt::Display for CoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::SessionNotFound(id) => write!(f, "session {id} not found"),
            CoreError::TabNotFound(id) => write!(f, "tab {id} not found"),
            CoreError::PaneNotFound { tab, session } => {
                write!(f, "session {session} is not a pane of tab {tab}")
            }
            CoreError::NodeNotFound(id) => write!(f, "layout node {id} not found"),
            CoreError::BadChildIndex { node, index } => {
                write!(f, "layout node {node} has no child at index {index}")
            }
            CoreError::Invariant(msg) => write!(f, "layout invariant violated: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}
