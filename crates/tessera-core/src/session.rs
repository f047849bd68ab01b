use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;

use crate::error::CoreError;

/// Unique identifier for a terminal session.
pub type SessionId = u64;

/// The logical identity of one terminal conversation, independent of whether
/// a shell process is currently bound to it.
#[derive(Clone, Debug, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub title: String,
    pub cwd: PathBuf,
    pub active: bool,
    pub created_at: SystemTime,
}

/// Maps session id to session metadata. Pure data: the registry never owns
/// a process, and layout trees reference sessions only by id.
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    default_cwd: PathBuf,
    /// Monotonic id counter, never reused even after deletion.
    next_id: SessionId,
    /// Monotonic counter for "Terminal N" default titles.
    title_counter: u64,
}

impl SessionRegistry {
    pub fn new(default_cwd: PathBuf) -> Self {
        Self {
            sessions: HashMap::new(),
            default_cwd,
            next_id: 1,
            title_counter: 1,
        }
    }

    /// Create a new session and return a copy of its metadata.
    ///
    /// Falls back to the configured default working directory and a
    /// `"Terminal N"` title when none are given.
    pub fn create(&mut self, cwd: Option<PathBuf>, title: Option<String>) -> Session {
        let id = self.next_id;
        self.next_id += 1;

        let title = title.unwrap_or_else(|| {
            let n = self.title_counter;
            self.title_counter += 1;
            format!("Terminal {n}")
        });

        let session = Session {
            id,
            title,
            cwd: cwd.unwrap_or_else(|| self.default_cwd.clone()),
            active: false,
            created_at: SystemTime::now(),
        };
        self.sessions.insert(id, session.clone());
        session
    }

    /// Remove a session. Returns `false` if the id was unknown.
    pub fn remove(&mut self, id: SessionId) -> bool {
        self.sessions.remove(&id).is_some()
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// All sessions, sorted by id.
    pub fn list(&self) -> Vec<&Session> {
        let mut sessions: Vec<&Session> = self.sessions.values().collect();
        sessions.sort_by_key(|s| s.id);
        sessions
    }

    /// Flip a session's active flag. One-active-per-tab is the tab
    /// manager's invariant; the registry only stores the flag.
    pub fn set_active(&mut self, id: SessionId, active: bool) -> Result<(), CoreError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(CoreError::SessionNotFound(id))?;
        session.active = active;
        Ok(())
    }

    pub fn rename(&mut self, id: SessionId, title: String) -> Result<(), CoreError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(CoreError::SessionNotFound(id))?;
        session.title = title;
        Ok(())
    }

    pub fn set_cwd(&mut self, id: SessionId, cwd: PathBuf) -> Result<(), CoreError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(CoreError::SessionNotFound(id))?;
        session.cwd = cwd;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn default_cwd(&self) -> &Path {
        &self.default_cwd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(PathBuf::from("/home/test"))
    }

    #[test]
    fn test_create_with_defaults() {
        let mut reg = registry();
        let s = reg.create(None, None);
        assert_eq!(s.title, "Terminal 1");
        assert_eq!(s.cwd, PathBuf::from("/home/test"));
        assert!(!s.active);
        assert!(reg.contains(s.id));
    }

    #[test]
    fn test_create_with_explicit_values() {
        let mut reg = registry();
        let s = reg.create(Some(PathBuf::from("/tmp")), Some("build".to_string()));
        assert_eq!(s.title, "build");
        assert_eq!(s.cwd, PathBuf::from("/tmp"));
    }

    #[test]
    fn test_ids_never_reused() {
        let mut reg = registry();
        let a = reg.create(None, None);
        assert!(reg.remove(a.id));
        let b = reg.create(None, None);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_title_counter_never_reused() {
        let mut reg = registry();
        let a = reg.create(None, None);
        let b = reg.create(None, None);
        reg.remove(a.id);
        reg.remove(b.id);
        let c = reg.create(None, None);
        assert_eq!(c.title, "Terminal 3");
    }

    #[test]
    fn test_explicit_title_does_not_consume_counter() {
        let mut reg = registry();
        reg.create(None, Some("named".to_string()));
        let s = reg.create(None, None);
        assert_eq!(s.title, "Terminal 1");
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut reg = registry();
        assert!(!reg.remove(999));
    }

    #[test]
    fn test_set_active_unknown_fails() {
        let mut reg = registry();
        assert_eq!(
            reg.set_active(42, true),
            Err(CoreError::SessionNotFound(42))
        );
    }

    #[test]
    fn test_list_sorted_by_id() {
        let mut reg = registry();
        let a = reg.create(None, None);
        let b = reg.create(None, None);
        let ids: Vec<_> = reg.list().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[test]
    fn test_rename() {
        let mut reg = registry();
        let s = reg.create(None, None);
        reg.rename(s.id, "renamed".to_string()).unwrap();
        assert_eq!(reg.get(s.id).unwrap().title, "renamed");
        assert!(reg.rename(999, "x".to_string()).is_err());
    }
}
