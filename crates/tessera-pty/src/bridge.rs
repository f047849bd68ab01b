use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::pty::{PtyError, PtyHandle, DEFAULT_COLS, DEFAULT_ROWS};
use crate::SessionId;

/// An asynchronous event pushed from the bridge to its subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PtyEvent {
    /// Raw shell output, in the order the OS produced it.
    Data {
        session_id: SessionId,
        bytes: Vec<u8>,
    },
    /// The shell process exited. Sent exactly once per PTY lifetime.
    Exited { session_id: SessionId },
}

/// Bridge-wide configuration, fixed at construction.
pub struct BridgeConfig {
    /// Shell program override. `None` resolves from the environment.
    pub shell: Option<String>,
    /// Working directory used when a spawn request does not carry one.
    pub default_cwd: PathBuf,
    pub cols: u16,
    pub rows: u16,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            shell: None,
            default_cwd: std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
        }
    }
}

/// Owns every OS shell process, keyed by session id.
///
/// At most one PTY is ever bound to a session id, and an id whose PTY has
/// exited is retired and never rebound. Each spawned PTY gets a dedicated
/// `pty-io-<id>` OS thread for blocking reads; output and exit events are
/// fanned out to all subscribers over unbounded channels.
pub struct PtyBridge {
    config: BridgeConfig,
    table: Arc<Mutex<HashMap<SessionId, PtyHandle>>>,
    retired: Arc<Mutex<HashSet<SessionId>>>,
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<PtyEvent>>>>,
}

impl PtyBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            table: Arc::new(Mutex::new(HashMap::new())),
            retired: Arc::new(Mutex::new(HashSet::new())),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a new subscriber for output/exit events.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PtyEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.subscribers).push(tx);
        rx
    }

    /// Spawn a shell process bound to `session_id`.
    ///
    /// The table lock is held across the spawn syscall, so a `kill` racing an
    /// in-flight spawn for the same id serialises behind it: the spawn
    /// completes first and the kill then applies to the live binding.
    pub fn spawn(&self, session_id: SessionId, cwd: Option<&Path>) -> Result<(), PtyError> {
        let mut table = lock(&self.table);
        if table.contains_key(&session_id) {
            return Err(PtyError::AlreadyBound(session_id));
        }
        if lock(&self.retired).contains(&session_id) {
            return Err(PtyError::AlreadyRetired(session_id));
        }

        let cwd = cwd.unwrap_or(self.config.default_cwd.as_path());
        let mut handle = PtyHandle::spawn(
            self.config.shell.as_deref(),
            cwd,
            self.config.cols,
            self.config.rows,
        )?;

        let reader = handle
            .take_reader()
            .ok_or_else(|| PtyError::SpawnFailed("PTY reader already taken".to_string()))?;

        table.insert(session_id, handle);
        log::info!("spawned shell for session {session_id} in {}", cwd.display());

        start_reader_thread(
            session_id,
            reader,
            Arc::clone(&self.table),
            Arc::clone(&self.retired),
            Arc::clone(&self.subscribers),
        );
        Ok(())
    }

    /// Forward raw input bytes to the session's shell.
    pub fn write(&self, session_id: SessionId, data: &[u8]) -> Result<(), PtyError> {
        let mut table = lock(&self.table);
        let handle = table
            .get_mut(&session_id)
            .ok_or(PtyError::NotFound(session_id))?;
        handle.write(data)
    }

    /// Propagate a terminal size change to the OS pty.
    pub fn resize(&self, session_id: SessionId, cols: u16, rows: u16) -> Result<(), PtyError> {
        let table = lock(&self.table);
        let handle = table
            .get(&session_id)
            .ok_or(PtyError::NotFound(session_id))?;
        handle.resize(cols, rows)
    }

    /// Terminate the session's shell and release the pty.
    ///
    /// Idempotent: killing an id with no live binding is a no-op. The id is
    /// retired here (not only in the reader thread) so that a re-spawn racing
    /// the reader's EOF handling can never rebind it. The single `Exited`
    /// event is still emitted by the reader thread when it drains to EOF.
    pub fn kill(&self, session_id: SessionId) -> Result<(), PtyError> {
        let removed = lock(&self.table).remove(&session_id);
        match removed {
            Some(mut handle) => {
                lock(&self.retired).insert(session_id);
                let _ = handle.kill();
                log::info!("killed shell for session {session_id}");
                Ok(())
            }
            None => {
                log::debug!("kill for session {session_id}: no live PTY, ignoring");
                Ok(())
            }
        }
    }

    /// Whether a live PTY is currently bound to the id.
    pub fn is_bound(&self, session_id: SessionId) -> bool {
        lock(&self.table).contains_key(&session_id)
    }

    /// All session ids with a live PTY, sorted.
    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = lock(&self.table).keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Kill every remaining shell process.
    pub fn shutdown(&self) {
        let mut table = lock(&self.table);
        for (id, handle) in table.iter_mut() {
            let _ = handle.kill();
            lock(&self.retired).insert(*id);
        }
        table.clear();
    }
}

impl Drop for PtyBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Lock a mutex, recovering the guard if a reader thread panicked while
/// holding it. The guarded maps stay structurally valid either way.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Start the blocking read loop for one session on a dedicated OS thread.
///
/// The reader is owned by the thread directly (not behind the table mutex),
/// so a blocked read never stalls writes, resizes, or kills. On EOF the
/// thread removes the table binding, retires the id, and emits the single
/// `Exited` event for this PTY lifetime.
fn start_reader_thread(
    session_id: SessionId,
    mut reader: Box<dyn Read + Send>,
    table: Arc<Mutex<HashMap<SessionId, PtyHandle>>>,
    retired: Arc<Mutex<HashSet<SessionId>>>,
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<PtyEvent>>>>,
) {
    let spawned = std::thread::Builder::new()
        .name(format!("pty-io-{session_id}"))
        .spawn(move || {
            let mut buf = [0u8; 65536];
            loop {
                // Blocks until data is available or the PTY closes.
                let n = match reader.read(&mut buf) {
                    Ok(0) => break,  // EOF, child exited
                    Ok(n) => n,
                    Err(_) => break, // read error, PTY likely closed
                };
                broadcast(
                    &subscribers,
                    PtyEvent::Data {
                        session_id,
                        bytes: buf[..n].to_vec(),
                    },
                );
            }

            // The handle may already be gone if an explicit kill removed it.
            lock(&table).remove(&session_id);
            lock(&retired).insert(session_id);
            log::debug!("session {session_id} PTY closed");
            broadcast(&subscribers, PtyEvent::Exited { session_id });
        });
    if let Err(e) = spawned {
        log::error!("failed to spawn I/O thread for session {session_id}: {e}");
    }
}

/// Send an event to every subscriber, dropping channels that have closed.
fn broadcast(
    subscribers: &Arc<Mutex<Vec<mpsc::UnboundedSender<PtyEvent>>>>,
    event: PtyEvent,
) {
    lock(subscribers).retain(|tx| tx.send(event.clone()).is_ok());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn test_bridge() -> PtyBridge {
        PtyBridge::new(BridgeConfig {
            shell: Some("/bin/sh".to_string()),
            default_cwd: PathBuf::from("/tmp"),
            cols: 80,
            rows: 24,
        })
    }

    /// Drain events until `pred` matches one, or the deadline passes.
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
    fn test_spawn_write_and_receive_output() {
        let bridge = test_bridge();
        let mut rx = bridge.subscribe();

        bridge.spawn(1, Some(Path::new("/tmp"))).unwrap();
        bridge.write(1, b"echo hi\n").unwrap();

        let mut collected = Vec::new();
        let got = wait_for(&mut rx, Duration::from_secs(5), |ev| {
            if let PtyEvent::Data { session_id: 1, bytes } = ev {
                collected.extend_from_slice(bytes);
            }
            String::from_utf8_lossy(&collected).contains("hi")
        });
        assert!(got.is_some(), "never saw echoed output");
    }

    #[test]
    fn test_kill_emits_exactly_one_exit() {
        let bridge = test_bridge();
        let mut rx = bridge.subscribe();

        bridge.spawn(7, None).unwrap();
        bridge.kill(7).unwrap();

        let exit = wait_for(&mut rx, Duration::from_secs(5), |ev| {
            matches!(ev, PtyEvent::Exited { session_id: 7 })
        });
        assert!(exit.is_some(), "expected an Exited event");

        // No further data or exit events arrive after the exit.
        std::thread::sleep(Duration::from_millis(300));
        let mut extra = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            extra.push(ev);
        }
        assert!(extra.is_empty(), "unexpected events after exit: {extra:?}");
        assert!(!bridge.is_bound(7));
    }

    #[test]
    fn test_spawn_twice_is_rejected() {
        let bridge = test_bridge();
        bridge.spawn(1, None).unwrap();
        let second = bridge.spawn(1, None);
        assert!(matches!(second, Err(PtyError::AlreadyBound(1))));
    }

    #[test]
    fn test_exited_id_is_never_rebound() {
        let bridge = test_bridge();
        let mut rx = bridge.subscribe();

        bridge.spawn(3, None).unwrap();
        bridge.kill(3).unwrap();
        let exit = wait_for(&mut rx, Duration::from_secs(5), |ev| {
            matches!(ev, PtyEvent::Exited { session_id: 3 })
        });
        assert!(exit.is_some());

        let respawn = bridge.spawn(3, None);
        assert!(matches!(respawn, Err(PtyError::AlreadyRetired(3))));
    }

    #[test]
    fn test_write_unknown_session() {
        let bridge = test_bridge();
        let result = bridge.write(99, b"x");
        assert!(matches!(result, Err(PtyError::NotFound(99))));
    }

    #[test]
    fn test_resize_unknown_session() {
        let bridge = test_bridge();
        let result = bridge.resize(99, 120, 40);
        assert!(matches!(result, Err(PtyError::NotFound(99))));
    }

    #[test]
    fn test_kill_is_idempotent() {
        let bridge = test_bridge();
        bridge.spawn(1, None).unwrap();
        bridge.kill(1).unwrap();
        // Second kill is a no-op, not an error.
        bridge.kill(1).unwrap();
        // Killing an id that never existed is also a no-op.
        bridge.kill(42).unwrap();
    }

    #[test]
    fn test_resize_live_session() {
        let bridge = test_bridge();
        bridge.spawn(1, None).unwrap();
        bridge.resize(1, 132, 50).unwrap();
    }

    #[test]
    fn test_session_ids_sorted() {
        let bridge = test_bridge();
        bridge.spawn(5, None).unwrap();
        bridge.spawn(2, None).unwrap();
        bridge.spawn(9, None).unwrap();
        assert_eq!(bridge.session_ids(), vec![2, 5, 9]);
    }

    #[test]
    fn test_shutdown_kills_everything() {
        let bridge = test_bridge();
        bridge.spawn(1, None).unwrap();
        bridge.spawn(2, None).unwrap();
        bridge.shutdown();
        assert!(bridge.session_ids().is_empty());
        assert!(matches!(bridge.spawn(1, None), Err(PtyError::AlreadyRetired(1))));
    }
}
