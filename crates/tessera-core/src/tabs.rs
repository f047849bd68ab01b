//! Tab manager: one layout tree per tab, one active tab, one active session
//! per tab.
//!
//! The manager is the sole writer of the tab set and every layout tree. It
//! mediates all mutation requests, keeps the session registry consistent
//! with the trees, and drives the process host (spawn on create/split, kill
//! on close). Listeners are notified synchronously exactly once per public
//! mutation, after the mutation is fully applied.
//!
//! The tab list is never empty after settling: closing the last tab
//! immediately creates a replacement.

use std::path::Path;
use std::time::SystemTime;

use serde::Serialize;

use crate::error::CoreError;
use crate::layout::{LayoutNode, NodeId, RemoveOutcome, SplitDirection};
use crate::session::{Session, SessionId, SessionRegistry};

/// Unique identifier for a tab.
pub type TabId = u64;

/// Identifier returned by [`TabManager::subscribe`].
pub type ListenerId = u64;

/// A top-level container owning one layout tree and, transitively, every
/// session reachable from it.
#[derive(Clone, Debug, Serialize)]
pub struct Tab {
    pub id: TabId,
    pub title: String,
    pub layout: LayoutNode,
    pub active: bool,
    /// The focused session within this tab.
    pub active_session: SessionId,
    pub created_at: SystemTime,
}

/// Failure starting a shell process for a session.
#[derive(Debug)]
pub struct HostError(pub String);

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for HostError {}

/// Seam between the layout model and the process layer.
///
/// The manager calls `spawn_shell` when a pane gains a session and
/// `kill_shell` when a pane or tab is torn down. A spawn failure leaves the
/// session in the registry with no bound process (a "dead" pane the caller
/// may retry); it never rolls back the layout mutation.
pub trait ProcessHost: Send {
    fn spawn_shell(&self, session: SessionId, cwd: &Path) -> Result<(), HostError>;
    fn kill_shell(&self, session: SessionId);
}

pub struct TabManager {
    registry: SessionRegistry,
    host: Box<dyn ProcessHost>,
    /// Tabs in creation order.
    tabs: Vec<Tab>,
    active_tab: TabId,
    next_tab_id: TabId,
    next_node_id: NodeId,
    /// Monotonic counter for "Tab N" default titles, never reused.
    tab_title_counter: u64,
    listeners: Vec<(ListenerId, Box<dyn Fn() + Send>)>,
    next_listener_id: ListenerId,
}

impl TabManager {
    /// Create a manager with one initial tab, so the "at least one tab"
    /// invariant holds from the start.
    pub fn new(registry: SessionRegistry, host: Box<dyn ProcessHost>) -> Self {
        let mut manager = Self {
            registry,
            host,
            tabs: Vec::new(),
            active_tab: 0,
            next_tab_id: 1,
            next_node_id: 1,
            tab_title_counter: 1,
            listeners: Vec::new(),
            next_listener_id: 1,
        };
        manager.create_tab_inner(None);
        manager
    }

    // ---- subscriptions ----

    /// Register a listener invoked synchronously after every mutation.
    pub fn subscribe(&mut self, callback: impl Fn() + Send + 'static) -> ListenerId {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    fn notify(&self) {
        for (_, callback) in &self.listeners {
            callback();
        }
    }

    // ---- tab lifecycle ----

    /// Create a tab holding a single fresh session and make it active.
    pub fn create_tab(&mut self, title: Option<String>) -> TabId {
        let id = self.create_tab_inner(title);
        self.notify();
        id
    }

    fn create_tab_inner(&mut self, title: Option<String>) -> TabId {
        let session = self.registry.create(None, None);
        if let Err(e) = self.host.spawn_shell(session.id, &session.cwd) {
            log::warn!(
                "shell spawn failed for session {}: {e}; pane starts dead",
                session.id
            );
        }
        let _ = self.registry.set_active(session.id, true);

        let id = self.next_tab_id;
        self.next_tab_id += 1;
        let title = title.unwrap_or_else(|| {
            let n = self.tab_title_counter;
            self.tab_title_counter += 1;
            format!("Tab {n}")
        });

        for tab in &mut self.tabs {
            tab.active = false;
        }
        self.tabs.push(Tab {
            id,
            title,
            layout: LayoutNode::leaf(session.id),
            active: true,
            active_session: session.id,
            created_at: SystemTime::now(),
        });
        self.active_tab = id;
        log::info!("created tab {id} with session {}", session.id);
        id
    }

    /// Close a tab, tearing down every session reachable from its layout.
    ///
    /// If the closed tab was active, the first remaining tab (in creation
    /// order) becomes active; if none remain, a fresh tab is created.
    pub fn close_tab(&mut self, id: TabId) -> Result<(), CoreError> {
        self.close_tab_inner(id)?;
        self.notify();
        Ok(())
    }

    fn close_tab_inner(&mut self, id: TabId) -> Result<(), CoreError> {
        let idx = self.tab_index(id)?;
        let tab = self.tabs.remove(idx);
        for sid in tab.layout.collect_session_ids() {
            self.host.kill_shell(sid);
            if !self.registry.remove(sid) {
                log::warn!("tab {id} referenced unknown session {sid}");
            }
        }
        log::info!("closed tab {id}");

        if self.active_tab == id {
            match self.tabs.first().map(|t| t.id) {
                Some(first) => self.set_active_tab_inner(first),
                None => {
                    // "no tabs" is not a stable state.
                    self.create_tab_inner(None);
                }
            }
        }
        Ok(())
    }

    /// Mark a tab active. Unknown ids are an error, not a silent no-op.
    pub fn set_active_tab(&mut self, id: TabId) -> Result<(), CoreError> {
        self.tab_index(id)?;
        self.set_active_tab_inner(id);
        self.notify();
        Ok(())
    }

    fn set_active_tab_inner(&mut self, id: TabId) {
        for tab in &mut self.tabs {
            tab.active = tab.id == id;
        }
        self.active_tab = id;
        if let Ok(idx) = self.tab_index(id) {
            let focused = self.tabs[idx].active_session;
            let _ = self.set_active_session_inner(id, focused);
        }
    }

    pub fn rename_tab(&mut self, id: TabId, title: String) -> Result<(), CoreError> {
        let idx = self.tab_index(id)?;
        self.tabs[idx].title = title;
        self.notify();
        Ok(())
    }

    // ---- pane operations ----

    /// Split the pane holding `session_id`, placing a fresh session in the
    /// second (bottom/right) slot and focusing it.
    pub fn split_pane(
        &mut self,
        tab_id: TabId,
        session_id: SessionId,
        direction: SplitDirection,
    ) -> Result<Session, CoreError> {
        let idx = self.tab_index(tab_id)?;
        if !self.tabs[idx].layout.contains_session(session_id) {
            return Err(CoreError::PaneNotFound {
                tab: tab_id,
                session: session_id,
            });
        }

        let new_session = self.registry.create(None, None);
        let split_id = self.next_node_id;
        self.next_node_id += 1;

        let found =
            self.tabs[idx]
                .layout
                .split_leaf(session_id, direction, new_session.id, split_id);
        debug_assert!(found, "membership was checked above");
        debug_assert!(self.tabs[idx].layout.validate().is_ok());

        if let Err(e) = self.host.spawn_shell(new_session.id, &new_session.cwd) {
            log::warn!(
                "shell spawn failed for session {}: {e}; pane starts dead",
                new_session.id
            );
        }
        let _ = self.set_active_session_inner(tab_id, new_session.id);
        self.notify();
        Ok(new_session)
    }

    /// Close one pane, killing its session. Closing the last pane of a tab
    /// closes the tab itself (an empty layout cannot exist).
    pub fn close_pane(&mut self, tab_id: TabId, session_id: SessionId) -> Result<(), CoreError> {
        let idx = self.tab_index(tab_id)?;
        match self.tabs[idx].layout.remove_leaf(session_id) {
            RemoveOutcome::NotFound => Err(CoreError::PaneNotFound {
                tab: tab_id,
                session: session_id,
            }),
            RemoveOutcome::BecameEmpty => {
                self.close_tab_inner(tab_id)?;
                self.notify();
                Ok(())
            }
            RemoveOutcome::Removed => {
                self.host.kill_shell(session_id);
                self.registry.remove(session_id);
                debug_assert!(self.tabs[idx].layout.validate().is_ok());
                if self.tabs[idx].active_session == session_id {
                    if let Some(first) = self.tabs[idx].layout.first_session() {
                        let _ = self.set_active_session_inner(tab_id, first);
                    }
                }
                self.notify();
                Ok(())
            }
        }
    }

    /// Reassign the weight of one child of a split node (drag-resize).
    pub fn resize_split(
        &mut self,
        tab_id: TabId,
        node_id: NodeId,
        child_index: usize,
        weight: f32,
    ) -> Result<(), CoreError> {
        let idx = self.tab_index(tab_id)?;
        self.tabs[idx]
            .layout
            .resize_child(node_id, child_index, weight)?;
        self.notify();
        Ok(())
    }

    /// Focus a session within its tab, deactivating the tab's other sessions.
    pub fn set_active_session(
        &mut self,
        tab_id: TabId,
        session_id: SessionId,
    ) -> Result<(), CoreError> {
        self.set_active_session_inner(tab_id, session_id)?;
        self.notify();
        Ok(())
    }

    fn set_active_session_inner(
        &mut self,
        tab_id: TabId,
        session_id: SessionId,
    ) -> Result<(), CoreError> {
        let idx = self.tab_index(tab_id)?;
        let ids = self.tabs[idx].layout.collect_session_ids();
        if !ids.contains(&session_id) {
            return Err(CoreError::PaneNotFound {
                tab: tab_id,
                session: session_id,
            });
        }
        for sid in ids {
            let _ = self.registry.set_active(sid, sid == session_id);
        }
        self.tabs[idx].active_session = session_id;
        Ok(())
    }

    pub fn rename_session(&mut self, id: SessionId, title: String) -> Result<(), CoreError> {
        self.registry.rename(id, title)?;
        self.notify();
        Ok(())
    }

    // ---- reads ----

    pub fn get_tab(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    /// Tabs in creation order.
    pub fn all_tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn active_tab_id(&self) -> TabId {
        self.active_tab
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.get_tab(self.active_tab)
    }

    /// The tab's sessions in layout order (first = default focus target),
    /// hydrated to full metadata.
    pub fn sessions_in_layout(&self, tab_id: TabId) -> Result<Vec<Session>, CoreError> {
        let idx = self.tab_index(tab_id)?;
        Ok(self.tabs[idx]
            .layout
            .collect_session_ids()
            .into_iter()
            .filter_map(|sid| self.registry.get(sid).cloned())
            .collect())
    }

    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    fn tab_index(&self, id: TabId) -> Result<usize, CoreError> {
        self.tabs
            .iter()
            .position(|t| t.id == id)
            .ok_or(CoreError::TabNotFound(id))
    }
}
