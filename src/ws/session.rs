use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::{ChangeRecord, CollabError, CursorState, CursorUpdate, SessionSnapshot};

/// Number of accepted changes kept for replay to joining participants.
pub const CHANGE_LOG_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct LockState {
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
}

/// What happened when a participant joined.
#[derive(Debug)]
pub struct JoinOutcome<H> {
    pub snapshot: SessionSnapshot,
    /// Handle of the connection that was replaced by a reconnection.
    pub replaced: Option<H>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub lock_released: bool,
    /// No participants remain and nothing holds the session open.
    pub emptied: bool,
}

/// Collaboration state of one document.
///
/// Every method is a complete state transition: callers hold the session's
/// mutex for the duration of a call, so no partial update is ever observable.
/// `H` is the connection handle type; the session stores it but never uses it.
#[derive(Debug)]
pub struct Session<H> {
    document_id: String,
    participants: HashMap<String, H>,
    lock: Option<LockState>,
    cursors: HashMap<String, CursorState>,
    change_log: VecDeque<ChangeRecord>,
    next_seq: u64,
    pub(crate) closed: bool,
}

impl<H> Session<H> {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            participants: HashMap::new(),
            lock: None,
            cursors: HashMap::new(),
            change_log: VecDeque::with_capacity(CHANGE_LOG_CAPACITY),
            next_seq: 1,
            closed: false,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Register a participant, replacing the handle of an earlier connection
    /// with the same id.
    pub fn join(&mut self, participant_id: &str, handle: H) -> JoinOutcome<H> {
        let replaced = self.participants.insert(participant_id.to_string(), handle);
        JoinOutcome {
            snapshot: self.snapshot(),
            replaced,
        }
    }

    /// Remove a participant together with its cursor and, if held, its lock.
    pub fn leave(&mut self, participant_id: &str) -> LeaveOutcome {
        self.participants.remove(participant_id);
        self.cursors.remove(participant_id);
        let lock_released = self.is_holder(participant_id);
        if lock_released {
            self.lock = None;
        }
        LeaveOutcome {
            lock_released,
            emptied: self.is_idle(),
        }
    }

    /// Like [`Session::leave`], but only if `handle` is still the registered
    /// connection for the participant. Returns `None` when a newer connection
    /// has taken over.
    pub fn leave_connection(&mut self, participant_id: &str, handle: &H) -> Option<LeaveOutcome>
    where
        H: PartialEq,
    {
        match self.participants.get(participant_id) {
            Some(current) if current == handle => Some(self.leave(participant_id)),
            _ => None,
        }
    }

    pub fn update_cursor(&mut self, participant_id: &str, position: Value) -> Result<CursorUpdate, CollabError> {
        self.ensure_participant(participant_id)?;
        let updated_at = Utc::now();
        self.cursors.insert(
            participant_id.to_string(),
            CursorState { position: position.clone(), updated_at },
        );
        Ok(CursorUpdate {
            user_id: participant_id.to_string(),
            position,
            updated_at,
        })
    }

    /// Append a change unless someone else holds the lock.
    pub fn apply_change(&mut self, participant_id: &str, payload: Value) -> Result<ChangeRecord, CollabError> {
        self.ensure_participant(participant_id)?;
        if let Some(lock) = &self.lock {
            if lock.holder != participant_id {
                return Err(CollabError::LockConflict { holder: lock.holder.clone() });
            }
        }

        let record = ChangeRecord {
            seq: self.next_seq,
            user_id: participant_id.to_string(),
            applied_at: self.next_timestamp(),
            change: payload,
        };
        self.next_seq += 1;

        if self.change_log.len() == CHANGE_LOG_CAPACITY {
            self.change_log.pop_front();
        }
        self.change_log.push_back(record.clone());
        Ok(record)
    }

    /// Take the lock if nobody holds it. A holder asking again gets `false`.
    pub fn acquire_lock(&mut self, participant_id: &str) -> Result<bool, CollabError> {
        self.ensure_participant(participant_id)?;
        if self.lock.is_some() {
            return Ok(false);
        }
        self.lock = Some(LockState {
            holder: participant_id.to_string(),
            acquired_at: Utc::now(),
        });
        Ok(true)
    }

    /// Release the lock. Only the holder can.
    pub fn release_lock(&mut self, participant_id: &str) -> bool {
        if !self.is_holder(participant_id) {
            return false;
        }
        self.lock = None;
        true
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            lock_holder: self.lock_holder().map(str::to_string),
            cursors: self
                .cursors
                .iter()
                .map(|(id, cursor)| (id.clone(), cursor.clone()))
                .collect::<BTreeMap<_, _>>(),
            changes: self.change_log.iter().cloned().collect(),
        }
    }

    /// Participant ids, sorted.
    pub fn roster(&self) -> Vec<String> {
        let mut users: Vec<String> = self.participants.keys().cloned().collect();
        users.sort();
        users
    }

    pub fn handle(&self, participant_id: &str) -> Option<&H> {
        self.participants.get(participant_id)
    }

    pub fn handles(&self) -> impl Iterator<Item = (&str, &H)> {
        self.participants.iter().map(|(id, handle)| (id.as_str(), handle))
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn lock_holder(&self) -> Option<&str> {
        self.lock.as_ref().map(|lock| lock.holder.as_str())
    }

    pub fn lock_state(&self) -> Option<&LockState> {
        self.lock.as_ref()
    }

    pub fn changes(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.change_log.iter()
    }

    pub fn change_count(&self) -> usize {
        self.change_log.len()
    }

    pub fn is_idle(&self) -> bool {
        self.participants.is_empty() && self.lock.is_none()
    }

    fn is_holder(&self, participant_id: &str) -> bool {
        self.lock_holder() == Some(participant_id)
    }

    fn ensure_participant(&self, participant_id: &str) -> Result<(), CollabError> {
        if self.participants.contains_key(participant_id) {
            Ok(())
        } else {
            Err(CollabError::UnknownParticipant(participant_id.to_string()))
        }
    }

    // Wall clocks can step backwards; the log must not.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.change_log.back() {
            Some(last) if last.applied_at > now => last.applied_at,
            _ => now,
        }
    }
}
