//! Wire types for the UI <-> core transport boundary.
//!
//! Requests arrive as tagged JSON, one per line; every request gets exactly
//! one [`Reply`]. Shell output and exit notifications are pushed as
//! [`PushEvent`]s interleaved on the same stream, tagged by session id.

use serde::{Deserialize, Serialize};

use tessera_core::{NodeId, Session, SessionId, SplitDirection, Tab, TabId};
use tessera_pty::PtyEvent;

/// Requests from the UI process.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Request {
    /// Bind a shell process to an existing session. Used by the UI to
    /// (re)spawn a dead pane; tab/split operations spawn implicitly.
    CreateTerminal {
        session_id: SessionId,
        cwd: Option<String>,
    },
    WriteTerminal {
        session_id: SessionId,
        data: String,
    },
    ResizeTerminal {
        session_id: SessionId,
        cols: u16,
        rows: u16,
    },
    CloseTerminal {
        session_id: SessionId,
    },
    GetCwd,
    GetHomeDir,
    CreateTab {
        title: Option<String>,
    },
    CloseTab {
        tab_id: TabId,
    },
    SetActiveTab {
        tab_id: TabId,
    },
    SplitPane {
        tab_id: TabId,
        session_id: SessionId,
        direction: SplitDirection,
    },
    ClosePane {
        tab_id: TabId,
        session_id: SessionId,
    },
    ResizeSplit {
        tab_id: TabId,
        node_id: NodeId,
        child_index: usize,
        weight: f32,
    },
    ListTabs,
}

/// Response to a single request. Failures are carried in `error`; no error
/// ever crosses the boundary as anything but data.
#[derive(Serialize, Debug, Default)]
pub struct Reply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<TabId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tabs: Option<Vec<Tab>>,
}

impl Reply {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_cwd(mut self, cwd: String) -> Self {
        self.cwd = Some(cwd);
        self
    }

    pub fn with_home_dir(mut self, home_dir: String) -> Self {
        self.home_dir = Some(home_dir);
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_tab_id(mut self, tab_id: TabId) -> Self {
        self.tab_id = Some(tab_id);
        self
    }

    pub fn with_tabs(mut self, tabs: Vec<Tab>) -> Self {
        self.tabs = Some(tabs);
        self
    }
}

/// Events pushed from the core to the UI without a request.
#[derive(Serialize, Clone, Debug)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PushEvent {
    TerminalData {
        session_id: SessionId,
        data: String,
    },
    TerminalExit {
        session_id: SessionId,
    },
}

impl From<PtyEvent> for PushEvent {
    fn from(event: PtyEvent) -> Self {
        match event {
            PtyEvent::Data { session_id, bytes } => PushEvent::TerminalData {
                session_id,
                data: String::from_utf8_lossy(&bytes).into_owned(),
            },
            PtyEvent::Exited { session_id } => PushEvent::TerminalExit { session_id },
        }
    }
}
