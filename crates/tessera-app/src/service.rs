//! Request dispatch onto the tab manager and PTY bridge.
//!
//! One `TerminalService` per UI connection. Requests are handled serially;
//! each mutating call completes (including listener notification) before the
//! next is processed.

use std::path::PathBuf;
use std::sync::Arc;

use tessera_core::{HostError, ProcessHost, SessionId, SessionRegistry, TabManager};
use tessera_pty::PtyBridge;

use crate::ipc::{Reply, Request};

/// Adapts the bridge to the core's process seam. Spawn failures become
/// structured `HostError`s; the manager decides how to surface them.
struct BridgeHost(Arc<PtyBridge>);

impl ProcessHost for BridgeHost {
    fn spawn_shell(&self, session: SessionId, cwd: &std::path::Path) -> Result<(), HostError> {
        self.0
            .spawn(session, Some(cwd))
            .map_err(|e| HostError(e.to_string()))
    }

    fn kill_shell(&self, session: SessionId) {
        if let Err(e) = self.0.kill(session) {
            log::warn!("kill for session {session} failed: {e}");
        }
    }
}

pub struct TerminalService {
    manager: TabManager,
    bridge: Arc<PtyBridge>,
}

impl TerminalService {
    pub fn new(bridge: Arc<PtyBridge>, default_cwd: PathBuf) -> Self {
        let registry = SessionRegistry::new(default_cwd);
        let manager = TabManager::new(registry, Box::new(BridgeHost(Arc::clone(&bridge))));
        Self { manager, bridge }
    }

    pub fn manager(&self) -> &TabManager {
        &self.manager
    }

    /// Handle one request, always producing a reply (never panicking across
    /// the boundary).
    pub fn handle(&mut self, request: Request) -> Reply {
        match request {
            Request::CreateTerminal { session_id, cwd } => {
                let cwd = cwd.map(PathBuf::from);
                match self.bridge.spawn(session_id, cwd.as_deref()) {
                    Ok(()) => Reply::ok(),
                    Err(e) => Reply::err(e.to_string()),
                }
            }
            Request::WriteTerminal { session_id, data } => {
                match self.bridge.write(session_id, data.as_bytes()) {
                    Ok(()) => Reply::ok(),
                    Err(e) => Reply::err(e.to_string()),
                }
            }
            Request::ResizeTerminal {
                session_id,
                cols,
                rows,
            } => match self.bridge.resize(session_id, cols, rows) {
                Ok(()) => Reply::ok(),
                Err(e) => Reply::err(e.to_string()),
            },
            Request::CloseTerminal { session_id } => match self.bridge.kill(session_id) {
                Ok(()) => Reply::ok(),
                Err(e) => Reply::err(e.to_string()),
            },
            Request::GetCwd => match std::env::current_dir() {
                Ok(cwd) => Reply::ok().with_cwd(cwd.to_string_lossy().into_owned()),
                Err(e) => Reply::err(format!("could not read working directory: {e}")),
            },
            Request::GetHomeDir => match home_dir() {
                Some(home) => Reply::ok().with_home_dir(home.to_string_lossy().into_owned()),
                None => Reply::err("could not determine home directory"),
            },
            Request::CreateTab { title } => {
                let tab_id = self.manager.create_tab(title);
                Reply::ok().with_tab_id(tab_id)
            }
            Request::CloseTab { tab_id } => match self.manager.close_tab(tab_id) {
                Ok(()) => Reply::ok(),
                Err(e) => Reply::err(e.to_string()),
            },
            Request::SetActiveTab { tab_id } => match self.manager.set_active_tab(tab_id) {
                Ok(()) => Reply::ok(),
                Err(e) => Reply::err(e.to_string()),
            },
            Request::SplitPane {
                tab_id,
                session_id,
                direction,
            } => match self.manager.split_pane(tab_id, session_id, direction) {
                Ok(session) => Reply::ok().with_session(session),
                Err(e) => Reply::err(e.to_string()),
            },
            Request::ClosePane { tab_id, session_id } => {
                match self.manager.close_pane(tab_id, session_id) {
                    Ok(()) => Reply::ok(),
                    Err(e) => Reply::err(e.to_string()),
                }
            }
            Request::ResizeSplit {
                tab_id,
                node_id,
                child_index,
                weight,
            } => match self
                .manager
                .resize_split(tab_id, node_id, child_index, weight)
            {
                Ok(()) => Reply::ok(),
                Err(e) => Reply::err(e.to_string()),
            },
            Request::ListTabs => Reply::ok().with_tabs(self.manager.all_tabs().to_vec()),
        }
    }
}

/// The user's home directory.
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tessera_core::SplitDirection;
    use tessera_pty::{BridgeConfig, PtyEvent};
    use tokio::sync::mpsc;

    fn service() -> (TerminalService, Arc<PtyBridge>) {
        let bridge = Arc::new(PtyBridge::new(BridgeConfig {
            shell: Some("/bin/sh".to_string()),
            default_cwd: PathBuf::from("/tmp"),
            cols: 80,
            rows: 24,
        }));
        let service = TerminalService::new(Arc::clone(&bridge), PathBuf::from("/tmp"));
        (service, bridge)
    }

    fn wait_for(
        rx: &mut mpsc::UnboundedReceiver<PtyEvent>,
        timeout: Duration,
        mut pred: impl FnMut(&PtyEvent) -> bool,
    ) -> Option<PtyEvent> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            match rx.try_recv() {
                Ok(ev) if pred(&ev) => return Some(ev),
                Ok(_) => {}
                Err(_) => std::thread::sleep(Duration::from_millis(20)),
            }
        }
        None
    }

    #[test]
    fn test_initial_tab_has_live_shell() {
        let (service, bridge) = service();
        let tab = service.manager().active_tab().unwrap();
        assert!(bridge.is_bound(tab.active_session));
    }

    #[test]
    fn test_echo_roundtrip_then_exit() {
        let (mut service, bridge) = service();
        let mut rx = bridge.subscribe();
        let session = service.manager().active_tab().unwrap().active_session;

        let reply = service.handle(Request::WriteTerminal {
            session_id: session,
            data: "echo hi\n".to_string(),
        });
        assert!(reply.success);

        let mut collected = Vec::new();
        let got = wait_for(&mut rx, Duration::from_secs(5), |ev| {
            if let PtyEvent::Data { session_id, bytes } = ev {
                if *session_id == session {
                    collected.extend_from_slice(bytes);
                }
            }
            String::from_utf8_lossy(&collected).contains("hi")
        });
        assert!(got.is_some(), "never saw echoed output");

        let reply = service.handle(Request::CloseTerminal { session_id: session });
        assert!(reply.success);
        let exit = wait_for(&mut rx, Duration::from_secs(5), |ev| {
            matches!(ev, PtyEvent::Exited { session_id } if *session_id == session)
        });
        assert!(exit.is_some(), "expected exactly one exit event");

        std::thread::sleep(Duration::from_millis(300));
        while let Ok(ev) = rx.try_recv() {
            panic!("no events expected after exit, got {ev:?}");
        }
    }

    #[test]
    fn test_write_to_unknown_session_is_structured_failure() {
        let (mut service, _bridge) = service();
        let reply = service.handle(Request::WriteTerminal {
            session_id: 999,
            data: "ls\n".to_string(),
        });
        assert!(!reply.success);
        assert!(reply.error.unwrap().contains("999"));
    }

    #[test]
    fn test_split_pane_spawns_second_shell() {
        let (mut service, bridge) = service();
        let tab = service.manager().active_tab().unwrap();
        let (tab_id, session) = (tab.id, tab.active_session);

        let reply = service.handle(Request::SplitPane {
            tab_id,
            session_id: session,
            direction: SplitDirection::Horizontal,
        });
        assert!(reply.success);
        let new_session = reply.session.unwrap();
        assert!(bridge.is_bound(new_session.id));
        assert_eq!(bridge.session_ids().len(), 2);
    }

    #[test]
    fn test_close_pane_releases_shell() {
        let (mut service, bridge) = service();
        let tab = service.manager().active_tab().unwrap();
        let (tab_id, session) = (tab.id, tab.active_session);
        let reply = service.handle(Request::SplitPane {
            tab_id,
            session_id: session,
            direction: SplitDirection::Vertical,
        });
        let new_session = reply.session.unwrap();

        let reply = service.handle(Request::ClosePane {
            tab_id,
            session_id: new_session.id,
        });
        assert!(reply.success);
        assert!(!bridge.is_bound(new_session.id));
    }

    #[test]
    fn test_get_cwd_and_home_dir() {
        let (mut service, _bridge) = service();
        let reply = service.handle(Request::GetCwd);
        assert!(reply.success);
        assert!(reply.cwd.is_some());

        let reply = service.handle(Request::GetHomeDir);
        // HOME is set in any reasonable test environment.
        assert!(reply.success);
        assert!(reply.home_dir.is_some());
    }

    #[test]
    fn test_close_tab_and_list_tabs() {
        let (mut service, bridge) = service();
        let first = service.manager().active_tab_id();
        let reply = service.handle(Request::CreateTab { title: None });
        assert!(reply.success);

        let reply = service.handle(Request::CloseTab { tab_id: first });
        assert!(reply.success);

        let reply = service.handle(Request::ListTabs);
        let tabs = reply.tabs.unwrap();
        assert_eq!(tabs.len(), 1);
        // The closed tab's shell is gone; the surviving tab's is live.
        assert!(bridge.is_bound(tabs[0].active_session));

        let reply = service.handle(Request::CloseTab { tab_id: 999 });
        assert!(!reply.success);
    }
}
