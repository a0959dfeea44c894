use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, info};

use crate::models::{ChangeRecord, CollabError, CursorUpdate, SessionInfoResponse};
use super::session::{JoinOutcome, LeaveOutcome, Session};

type SessionEntry<H> = Arc<Mutex<Session<H>>>;

/// Counters over all live sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub sessions: usize,
    pub participants: usize,
    pub locked_sessions: usize,
    pub changes: usize,
}

/// Owner of every document's collaboration session.
///
/// Each session sits behind its own mutex, so operations on one document are
/// serialized while different documents proceed in parallel. The outer map is
/// only locked long enough to look up, insert or remove an entry.
pub struct SessionRegistry<H> {
    sessions: RwLock<HashMap<String, SessionEntry<H>>>,
}

impl<H> Default for SessionRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> SessionRegistry<H> {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Join `participant_id` to the document's session, creating it if needed,
    /// and run `then` inside the same critical section.
    pub fn join<R>(
        &self,
        document_id: &str,
        participant_id: &str,
        handle: H,
        then: impl FnOnce(&Session<H>, JoinOutcome<H>) -> R,
    ) -> R {
        loop {
            let entry = self.entry_or_create(document_id);
            let mut session = lock(&entry);
            // Lost a race with the last participant leaving. Drop the dead
            // entry so the next lookup creates a fresh session.
            if session.closed {
                drop(session);
                self.remove(document_id, &entry);
                continue;
            }
            let outcome = session.join(participant_id, handle);
            debug!(
                "Participant {} joined document {} ({} connected)",
                participant_id,
                document_id,
                session.participant_count()
            );
            return then(&*session, outcome);
        }
    }

    /// Remove a participant only if `handle` is still its registered
    /// connection, running `then` inside the critical section when it was.
    /// Returns `None` when the connection had already been replaced.
    pub fn leave(
        &self,
        document_id: &str,
        participant_id: &str,
        handle: &H,
        then: impl FnOnce(&Session<H>, &LeaveOutcome),
    ) -> Option<LeaveOutcome>
    where
        H: PartialEq,
    {
        let entry = self.entry(document_id).ok()?;
        let outcome = {
            let mut session = lock(&entry);
            if session.closed {
                return None;
            }
            let outcome = session.leave_connection(participant_id, handle)?;
            if outcome.emptied {
                session.closed = true;
            }
            then(&*session, &outcome);
            outcome
        };
        if outcome.emptied {
            self.remove(document_id, &entry);
        }
        Some(outcome)
    }

    /// Run `f` against an existing, live session.
    pub fn with_session<R>(
        &self,
        document_id: &str,
        f: impl FnOnce(&mut Session<H>) -> R,
    ) -> Result<R, CollabError> {
        let entry = self.entry(document_id)?;
        let mut session = lock(&entry);
        if session.closed {
            return Err(CollabError::UnknownSession(document_id.to_string()));
        }
        Ok(f(&mut *session))
    }

    /// Record a cursor move and hand it to `then` before the session unlocks.
    pub fn update_cursor<R>(
        &self,
        document_id: &str,
        participant_id: &str,
        position: Value,
        then: impl FnOnce(&Session<H>, CursorUpdate) -> R,
    ) -> Result<R, CollabError> {
        self.with_session(document_id, |session| {
            session
                .update_cursor(participant_id, position)
                .map(|update| then(&*session, update))
        })?
    }

    /// Append a change to the log and hand the record to `then` before the
    /// session unlocks, so fan-out follows acceptance order.
    pub fn apply_change<R>(
        &self,
        document_id: &str,
        participant_id: &str,
        payload: Value,
        then: impl FnOnce(&Session<H>, ChangeRecord) -> R,
    ) -> Result<R, CollabError> {
        self.with_session(document_id, |session| {
            session
                .apply_change(participant_id, payload)
                .map(|record| then(&*session, record))
        })?
    }

    /// Try to take the lock; `on_acquired` only runs when it was taken.
    pub fn acquire_lock(
        &self,
        document_id: &str,
        participant_id: &str,
        on_acquired: impl FnOnce(&Session<H>),
    ) -> Result<bool, CollabError> {
        self.with_session(document_id, |session| {
            session.acquire_lock(participant_id).map(|acquired| {
                if acquired {
                    on_acquired(&*session);
                }
                acquired
            })
        })?
    }

    /// Release the lock if `participant_id` holds it; `on_released` only runs
    /// when it did.
    pub fn release_lock(
        &self,
        document_id: &str,
        participant_id: &str,
        on_released: impl FnOnce(&Session<H>),
    ) -> Result<bool, CollabError> {
        self.with_session(document_id, |session| {
            let released = session.release_lock(participant_id);
            if released {
                on_released(&*session);
            }
            released
        })
    }

    /// Summary of a document's session; empty when nobody is connected.
    pub fn session_info(&self, document_id: &str) -> SessionInfoResponse {
        self.with_session(document_id, |s| SessionInfoResponse {
            active_users: s.roster(),
            locked_by: s.lock_state().map(|lock| lock.holder.clone()),
            locked_at: s.lock_state().map(|lock| lock.acquired_at),
            recent_changes: s.changes().cloned().collect(),
        })
        .unwrap_or_default()
    }

    pub fn contains(&self, document_id: &str) -> bool {
        self.with_session(document_id, |_| ()).is_ok()
    }

    pub fn stats(&self) -> RegistryStats {
        let entries: Vec<SessionEntry<H>> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        entries.iter().fold(RegistryStats::default(), |mut stats, entry| {
            let session = lock(entry);
            if !session.closed {
                stats.sessions += 1;
                stats.participants += session.participant_count();
                stats.changes += session.change_count();
                if session.lock_holder().is_some() {
                    stats.locked_sessions += 1;
                }
            }
            stats
        })
    }

    fn entry(&self, document_id: &str) -> Result<SessionEntry<H>, CollabError> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(document_id)
            .cloned()
            .ok_or_else(|| CollabError::UnknownSession(document_id.to_string()))
    }

    fn entry_or_create(&self, document_id: &str) -> SessionEntry<H> {
        if let Ok(entry) = self.entry(document_id) {
            return entry;
        }
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(document_id.to_string())
            .or_insert_with(|| {
                info!("Opening collaboration session for document {}", document_id);
                Arc::new(Mutex::new(Session::new(document_id)))
            })
            .clone()
    }

    fn remove(&self, document_id: &str, entry: &SessionEntry<H>) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if sessions.get(document_id).is_some_and(|current| Arc::ptr_eq(current, entry)) {
            sessions.remove(document_id);
            info!("Closed collaboration session for document {}", document_id);
        }
    }
}

// Transitions validate before they write, so a poisoned session is still consistent.
fn lock<H>(entry: &SessionEntry<H>) -> MutexGuard<'_, Session<H>> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Barrier;
    use std::thread;

    fn join<H>(registry: &SessionRegistry<H>, document_id: &str, participant_id: &str, handle: H) {
        registry.join(document_id, participant_id, handle, |_, _| ());
    }

    fn leave<H: PartialEq>(registry: &SessionRegistry<H>, document_id: &str, participant_id: &str, handle: &H) -> Option<LeaveOutcome> {
        registry.leave(document_id, participant_id, handle, |_, _| ())
    }

    #[test]
    fn session_created_lazily_and_removed_when_empty() {
        let registry: SessionRegistry<u32> = SessionRegistry::new();
        assert!(!registry.contains("doc1"));

        join(&registry, "doc1", "a", 1);
        join(&registry, "doc1", "b", 2);
        assert!(registry.contains("doc1"));

        assert_eq!(leave(&registry, "doc1", "a", &1), Some(LeaveOutcome { lock_released: false, emptied: false }));
        assert!(registry.contains("doc1"));
        assert_eq!(leave(&registry, "doc1", "b", &2), Some(LeaveOutcome { lock_released: false, emptied: true }));
        assert!(!registry.contains("doc1"));
        assert_eq!(leave(&registry, "doc1", "b", &2), None);
    }

    #[test]
    fn rejoining_after_removal_starts_fresh() {
        let registry: SessionRegistry<u32> = SessionRegistry::new();
        join(&registry, "doc1", "a", 1);
        registry.apply_change("doc1", "a", json!("x"), |_, _| ()).unwrap();
        leave(&registry, "doc1", "a", &1).unwrap();

        let snapshot = registry.join("doc1", "a", 2, |_, outcome| outcome.snapshot);
        assert!(snapshot.changes.is_empty());
        assert_eq!(snapshot.lock_holder, None);
    }

    #[test]
    fn operations_on_missing_session_fail_softly() {
        let registry: SessionRegistry<u32> = SessionRegistry::new();
        assert_eq!(
            registry.update_cursor("nope", "a", json!(1), |_, _| ()),
            Err(CollabError::UnknownSession("nope".to_string()))
        );
        assert!(matches!(registry.apply_change("nope", "a", json!(1), |_, _| ()), Err(CollabError::UnknownSession(_))));
        assert!(matches!(registry.acquire_lock("nope", "a", |_| ()), Err(CollabError::UnknownSession(_))));
        assert!(matches!(registry.release_lock("nope", "a", |_| ()), Err(CollabError::UnknownSession(_))));
        assert_eq!(registry.session_info("nope"), SessionInfoResponse::default());
    }

    #[test]
    fn callbacks_run_only_on_state_change() {
        let registry: SessionRegistry<u32> = SessionRegistry::new();
        join(&registry, "doc1", "a", 1);
        join(&registry, "doc1", "b", 2);

        let mut seen = Vec::new();
        assert_eq!(registry.acquire_lock("doc1", "a", |s| seen.push(s.lock_holder().map(str::to_string))), Ok(true));
        assert_eq!(registry.acquire_lock("doc1", "b", |_| seen.push(None)), Ok(false));
        assert_eq!(registry.release_lock("doc1", "b", |_| seen.push(None)), Ok(false));
        assert_eq!(registry.release_lock("doc1", "a", |s| seen.push(s.lock_holder().map(str::to_string))), Ok(true));
        assert_eq!(seen, vec![Some("a".to_string()), None]);

        let seq = registry.apply_change("doc1", "b", json!(1), |s, record| {
            assert_eq!(s.change_count(), 1);
            record.seq
        });
        assert_eq!(seq, Ok(1));
        let moved = registry.update_cursor("doc1", "b", json!(3), |_, update| update.position);
        assert_eq!(moved, Ok(json!(3)));
    }

    #[test]
    fn lock_released_on_leave_lets_another_acquire() {
        let registry: SessionRegistry<u32> = SessionRegistry::new();
        join(&registry, "doc1", "a", 1);
        join(&registry, "doc1", "b", 2);
        assert_eq!(registry.acquire_lock("doc1", "a", |_| ()), Ok(true));
        assert_eq!(registry.acquire_lock("doc1", "b", |_| ()), Ok(false));

        let info = registry.session_info("doc1");
        assert_eq!(info.locked_by.as_deref(), Some("a"));
        assert!(info.locked_at.is_some());

        let outcome = registry.leave("doc1", "a", &1, |session, _| assert_eq!(session.lock_holder(), None));
        assert_eq!(outcome.map(|o| o.lock_released), Some(true));
        assert_eq!(registry.acquire_lock("doc1", "b", |_| ()), Ok(true));
    }

    #[test]
    fn stale_handle_leave_is_ignored() {
        let registry: SessionRegistry<u32> = SessionRegistry::new();
        join(&registry, "doc1", "a", 1);
        join(&registry, "doc1", "a", 2);

        let mut ran = false;
        assert_eq!(registry.leave("doc1", "a", &1, |_, _| ran = true), None);
        assert!(!ran);
        assert_eq!(registry.session_info("doc1").active_users, vec!["a"]);

        let outcome = registry.leave("doc1", "a", &2, |session, _| {
            assert!(session.roster().is_empty());
        });
        assert_eq!(outcome, Some(LeaveOutcome { lock_released: false, emptied: true }));
        assert!(!registry.contains("doc1"));
    }

    #[test]
    fn sessions_are_isolated() {
        let registry: SessionRegistry<u32> = SessionRegistry::new();
        join(&registry, "doc1", "a", 1);
        join(&registry, "doc2", "a", 2);
        assert_eq!(registry.acquire_lock("doc1", "a", |_| ()), Ok(true));
        assert_eq!(registry.acquire_lock("doc2", "a", |_| ()), Ok(true));
        registry.apply_change("doc2", "a", json!(1), |_, _| ()).unwrap();

        assert_eq!(
            registry.stats(),
            RegistryStats { sessions: 2, participants: 2, locked_sessions: 2, changes: 1 }
        );
    }

    #[test]
    fn concurrent_lock_requests_have_one_winner() {
        let registry: Arc<SessionRegistry<usize>> = Arc::new(SessionRegistry::new());
        let contenders = 16;
        for n in 0..contenders {
            join(&registry, "doc1", &format!("p{n}"), n);
        }

        let barrier = Arc::new(Barrier::new(contenders));
        let winners: usize = (0..contenders)
            .map(|n| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    registry.acquire_lock("doc1", &format!("p{n}"), |_| ()).unwrap()
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|t| t.join().unwrap() as usize)
            .sum();

        assert_eq!(winners, 1);
        assert!(registry.session_info("doc1").locked_by.is_some());
    }

    #[test]
    fn concurrent_changes_are_logged_in_seq_order() {
        let registry: Arc<SessionRegistry<usize>> = Arc::new(SessionRegistry::new());
        for n in 0..4 {
            join(&registry, "doc1", &format!("p{n}"), n);
        }

        let handles: Vec<_> = (0..4)
            .map(|n| {
                let registry = registry.clone();
                thread::spawn(move || {
                    let mut last = 0;
                    for i in 0..30 {
                        // Seqs handed to the callback only grow for each thread
                        let seq = registry.apply_change("doc1", &format!("p{n}"), json!(i), |_, r| r.seq).unwrap();
                        assert!(seq > last);
                        last = seq;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let changes = registry.session_info("doc1").recent_changes;
        assert_eq!(changes.len(), 50);
        assert_eq!(changes.last().unwrap().seq, 120);
        assert!(changes.windows(2).all(|w| w[0].seq + 1 == w[1].seq && w[0].applied_at <= w[1].applied_at));
    }
}
