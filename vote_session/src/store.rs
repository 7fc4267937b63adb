use std::collections::HashMap;
use std::sync::Mutex;

use crate::model::{Ballot, SessionError, VoteSession};

/// Store-assigned identifier for a persisted session.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct SessionId(pub String);

/// Persistence contract consumed by the engine.
///
/// All operations are assumed durable once acknowledged. Implementations
/// must serialize `append_ballot` per session: two concurrent appends to
/// the same session must both survive. Whole-session read-modify-write is
/// only acceptable behind a per-session serialization point.
pub trait SessionStore {
    fn create_session(&self, session: VoteSession) -> Result<SessionId, SessionError>;

    fn find_by_vote_code(&self, code: &str)
        -> Result<Option<(SessionId, VoteSession)>, SessionError>;

    fn find_by_results_code(
        &self,
        code: &str,
    ) -> Result<Option<(SessionId, VoteSession)>, SessionError>;

    fn append_ballot(&self, id: &SessionId, ballot: Ballot) -> Result<(), SessionError>;
}

/// In-process store over a mutex-guarded map.
///
/// The single mutex is the serialization point required by the contract.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    next_id: u64,
    sessions: HashMap<String, VoteSession>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>, SessionError> {
        self.inner
            .lock()
            .map_err(|_| SessionError::Store("session store lock poisoned".to_string()))
    }
}

impl SessionStore for MemoryStore {
    fn create_session(&self, session: VoteSession) -> Result<SessionId, SessionError> {
        let mut inner = self.locked()?;
        inner.next_id += 1;
        let id = format!("s{}", inner.next_id);
        inner.sessions.insert(id.clone(), session);
        Ok(SessionId(id))
    }

    fn find_by_vote_code(
        &self,
        code: &str,
    ) -> Result<Option<(SessionId, VoteSession)>, SessionError> {
        let inner = self.locked()?;
        Ok(inner
            .sessions
            .iter()
            .find(|(_, s)| s.vote_code == code)
            .map(|(id, s)| (SessionId(id.clone()), s.clone())))
    }

    fn find_by_results_code(
        &self,
        code: &str,
    ) -> Result<Option<(SessionId, VoteSession)>, SessionError> {
        let inner = self.locked()?;
        Ok(inner
            .sessions
            .iter()
            .find(|(_, s)| s.results_code == code)
            .map(|(id, s)| (SessionId(id.clone()), s.clone())))
    }

    fn append_ballot(&self, id: &SessionId, ballot: Ballot) -> Result<(), SessionError> {
        let mut inner = self.locked()?;
        let session = inner
            .sessions
            .get_mut(&id.0)
            .ok_or_else(|| SessionError::Store(format!("unknown session id {}", id.0)))?;
        session.ballots.push(ballot);
        Ok(())
    }
}
