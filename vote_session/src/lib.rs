pub mod codes;
mod model;
pub mod store;
pub mod tally;

use log::{debug, info};

use chrono::Utc;
use std::collections::HashSet;

pub use crate::codes::{CodeGenerator, RandomCodes};
pub use crate::model::*;
pub use crate::store::{MemoryStore, SessionId, SessionStore};
pub use crate::tally::compute_results;

/// The boundary that owns session creation and ballot intake.
///
/// The manager is the only writer: it creates sessions and appends ballots
/// through the injected [`SessionStore`]. Reads are side-effect-free and
/// safe to repeat. Everything is request-driven; there is no long-lived
/// state here beyond the store and generator handles.
pub struct SessionManager<S: SessionStore, G: CodeGenerator> {
    store: S,
    codes: G,
}

impl<S: SessionStore, G: CodeGenerator> SessionManager<S, G> {
    pub fn new(store: S, codes: G) -> SessionManager<S, G> {
        SessionManager { store, codes }
    }

    /// Creates a session with a fixed entry set, atomically.
    ///
    /// Requires at least two entries, each with a non-empty name after
    /// trimming. Returns the two access codes and nothing else: the codes
    /// are the only secret shared with the organizer.
    pub fn create_session(&self, new_entries: &[NewEntry]) -> Result<SessionCodes, SessionError> {
        if new_entries.len() < 2 {
            return Err(SessionError::Validation(format!(
                "a session needs at least 2 entries, got {}",
                new_entries.len()
            )));
        }
        for ne in new_entries {
            if ne.name.trim().is_empty() {
                return Err(SessionError::Validation(
                    "entry names may not be empty".to_string(),
                ));
            }
        }

        let entries: Vec<Entry> = new_entries
            .iter()
            .map(|ne| Entry {
                id: self.codes.opaque_id(),
                name: ne.name.clone(),
                icon_ref: ne.icon_ref.clone(),
            })
            .collect();

        let vote_code = self.codes.access_code();
        // The two codes must differ, otherwise handing out the vote code
        // would leak the results code. Draw again until they do.
        let mut results_code = self.codes.access_code();
        while results_code == vote_code {
            debug!("create_session: results code collided with vote code, regenerating");
            results_code = self.codes.access_code();
        }

        let session = VoteSession {
            vote_code: vote_code.clone(),
            results_code: results_code.clone(),
            entries,
            ballots: Vec::new(),
            created_at: Utc::now(),
        };
        let id = self.store.create_session(session)?;
        info!(
            "create_session: created session {:?} with {} entries",
            id,
            new_entries.len()
        );

        Ok(SessionCodes {
            vote_code,
            results_code,
        })
    }

    /// Returns the session's entries in stored order. Never exposes the
    /// ballots or the results code.
    pub fn entries_by_vote_code(&self, vote_code: &str) -> Result<Vec<Entry>, SessionError> {
        let (_, session) = self
            .store
            .find_by_vote_code(vote_code)?
            .ok_or(SessionError::NotFound)?;
        Ok(session.entries)
    }

    /// Validates and appends one ballot.
    ///
    /// Every ranked id and the self entry id (when given) must name an
    /// entry of the session, and no id may repeat within the ranking. A
    /// fresh voter id is generated per ballot; nothing prevents the same
    /// person from submitting again.
    pub fn submit_ballot(
        &self,
        vote_code: &str,
        self_entry_id: Option<&str>,
        ranking: &[String],
    ) -> Result<(), SessionError> {
        let (session_id, session) = self
            .store
            .find_by_vote_code(vote_code)?
            .ok_or(SessionError::NotFound)?;

        let known_ids: HashSet<&str> = session.entries.iter().map(|e| e.id.as_str()).collect();
        let mut seen: HashSet<&str> = HashSet::new();
        for id in ranking {
            if !known_ids.contains(id.as_str()) {
                return Err(SessionError::Validation(format!(
                    "ranked id {} is not an entry of this session",
                    id
                )));
            }
            if !seen.insert(id.as_str()) {
                return Err(SessionError::Validation(format!(
                    "entry {} appears more than once in the ranking",
                    id
                )));
            }
        }
        if let Some(self_id) = self_entry_id {
            if !known_ids.contains(self_id) {
                return Err(SessionError::Validation(format!(
                    "self entry id {} is not an entry of this session",
                    self_id
                )));
            }
        }

        let ballot = Ballot {
            voter_id: self.codes.opaque_id(),
            self_entry_id: self_entry_id.map(|s| s.to_string()),
            ranking: ranking.to_vec(),
        };
        self.store.append_ballot(&session_id, ballot)?;
        debug!(
            "submit_ballot: appended ballot to session {:?} ({} ranked)",
            session_id,
            ranking.len()
        );
        Ok(())
    }

    /// Looks up a session by its results code and aggregates its ballots.
    pub fn results_by_results_code(
        &self,
        results_code: &str,
    ) -> Result<Vec<EntryResult>, SessionError> {
        let (_, session) = self
            .store
            .find_by_results_code(results_code)?
            .ok_or(SessionError::NotFound)?;
        Ok(tally::compute_results(&session.entries, &session.ballots))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Deterministic generator: access codes are popped from a fixed list,
    /// opaque ids are a counter.
    struct ScriptedCodes {
        access: Mutex<Vec<String>>,
        next_id: AtomicU32,
    }

    impl ScriptedCodes {
        fn new(access: &[&str]) -> ScriptedCodes {
            let mut v: Vec<String> = access.iter().map(|s| s.to_string()).collect();
            v.reverse();
            ScriptedCodes {
                access: Mutex::new(v),
                next_id: AtomicU32::new(0),
            }
        }
    }

    impl CodeGenerator for ScriptedCodes {
        fn access_code(&self) -> String {
            self.access
                .lock()
                .unwrap()
                .pop()
                .expect("scripted codes exhausted")
        }

        fn opaque_id(&self) -> String {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            format!("id{:06}", n)
        }
    }

    fn new_entries(names: &[&str]) -> Vec<NewEntry> {
        names
            .iter()
            .map(|n| NewEntry {
                name: n.to_string(),
                icon_ref: format!("icons/{}.png", n),
            })
            .collect()
    }

    fn manager() -> SessionManager<MemoryStore, RandomCodes> {
        SessionManager::new(MemoryStore::new(), RandomCodes)
    }

    #[test]
    fn create_returns_two_distinct_numeric_codes() {
        let mgr = manager();
        let codes = mgr.create_session(&new_entries(&["A", "B"])).unwrap();
        assert_eq!(codes.vote_code.len(), 5);
        assert_eq!(codes.results_code.len(), 5);
        assert!(codes.vote_code.chars().all(|c| c.is_ascii_digit()));
        assert!(codes.results_code.chars().all(|c| c.is_ascii_digit()));
        assert_ne!(codes.vote_code, codes.results_code);
    }

    #[test]
    fn create_rejects_fewer_than_two_entries() {
        let mgr = manager();
        let res = mgr.create_session(&new_entries(&["A"]));
        assert!(matches!(res, Err(SessionError::Validation(_))));
        let res = mgr.create_session(&[]);
        assert!(matches!(res, Err(SessionError::Validation(_))));
    }

    #[test]
    fn create_rejects_blank_entry_names() {
        let mgr = manager();
        let res = mgr.create_session(&new_entries(&["A", "   "]));
        assert!(matches!(res, Err(SessionError::Validation(_))));
    }

    #[test]
    fn colliding_results_code_is_redrawn() {
        let codes = ScriptedCodes::new(&["11111", "11111", "22222"]);
        let mgr = SessionManager::new(MemoryStore::new(), codes);
        let out = mgr.create_session(&new_entries(&["A", "B"])).unwrap();
        assert_eq!(out.vote_code, "11111");
        assert_eq!(out.results_code, "22222");
    }

    #[test]
    fn entries_are_listed_in_creation_order_without_leaking_codes() {
        let mgr = manager();
        let codes = mgr
            .create_session(&new_entries(&["First", "Second", "Third"]))
            .unwrap();
        let entries = mgr.entries_by_vote_code(&codes.vote_code).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);

        // The results code does not double as a vote code.
        assert_eq!(
            mgr.entries_by_vote_code(&codes.results_code),
            Err(SessionError::NotFound)
        );
    }

    #[test]
    fn reads_are_idempotent() {
        let mgr = manager();
        let codes = mgr.create_session(&new_entries(&["A", "B"])).unwrap();
        let first = mgr.entries_by_vote_code(&codes.vote_code).unwrap();
        let second = mgr.entries_by_vote_code(&codes.vote_code).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_codes_are_not_found() {
        let mgr = manager();
        assert_eq!(
            mgr.entries_by_vote_code("00000"),
            Err(SessionError::NotFound)
        );
        assert_eq!(
            mgr.submit_ballot("00000", None, &[]),
            Err(SessionError::NotFound)
        );
        assert_eq!(
            mgr.results_by_results_code("00000"),
            Err(SessionError::NotFound)
        );
    }

    #[test]
    fn ballot_with_foreign_id_is_rejected() {
        let mgr = manager();
        let codes = mgr.create_session(&new_entries(&["A", "B"])).unwrap();
        let res = mgr.submit_ballot(&codes.vote_code, None, &["stranger".to_string()]);
        assert!(matches!(res, Err(SessionError::Validation(_))));
    }

    #[test]
    fn ballot_with_duplicate_id_is_rejected() {
        let mgr = manager();
        let codes = mgr.create_session(&new_entries(&["A", "B"])).unwrap();
        let entries = mgr.entries_by_vote_code(&codes.vote_code).unwrap();
        let dup = vec![entries[0].id.clone(), entries[0].id.clone()];
        let res = mgr.submit_ballot(&codes.vote_code, None, &dup);
        assert!(matches!(res, Err(SessionError::Validation(_))));
    }

    #[test]
    fn ballot_with_unknown_self_entry_is_rejected() {
        let mgr = manager();
        let codes = mgr.create_session(&new_entries(&["A", "B"])).unwrap();
        let entries = mgr.entries_by_vote_code(&codes.vote_code).unwrap();
        let ranking = vec![entries[0].id.clone()];
        let res = mgr.submit_ballot(&codes.vote_code, Some("stranger"), &ranking);
        assert!(matches!(res, Err(SessionError::Validation(_))));
    }

    #[test]
    fn self_ballots_are_excluded_from_their_entry_score() {
        let mgr = manager();
        let codes = mgr.create_session(&new_entries(&["A", "B"])).unwrap();
        let entries = mgr.entries_by_vote_code(&codes.vote_code).unwrap();
        let (a, b) = (entries[0].id.clone(), entries[1].id.clone());

        mgr.submit_ballot(&codes.vote_code, Some(&a), &[b.clone(), a.clone()])
            .unwrap();
        mgr.submit_ballot(&codes.vote_code, Some(&b), &[a.clone(), b.clone()])
            .unwrap();

        let results = mgr.results_by_results_code(&codes.results_code).unwrap();
        assert_eq!(results.len(), 2);
        for r in &results {
            assert_eq!(r.self_count, 1);
            assert_eq!(r.average_rank, 1.0);
        }
    }

    #[test]
    fn concurrent_submissions_lose_no_ballot() {
        let mgr = Arc::new(manager());
        let codes = mgr.create_session(&new_entries(&["A", "B"])).unwrap();
        let entries = mgr.entries_by_vote_code(&codes.vote_code).unwrap();
        let ranking: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();

        let threads: usize = 8;
        let per_thread: usize = 5;
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let mgr = Arc::clone(&mgr);
                let vote_code = codes.vote_code.clone();
                let ranking = ranking.clone();
                std::thread::spawn(move || {
                    for _ in 0..per_thread {
                        mgr.submit_ballot(&vote_code, None, &ranking).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let results = mgr.results_by_results_code(&codes.results_code).unwrap();
        // Every ballot ranked entry A first, so the count of contributing
        // ballots equals the total submitted.
        assert_eq!(results[0].average_rank, 1.0);
        let (_, session) = mgr
            .store
            .find_by_vote_code(&codes.vote_code)
            .unwrap()
            .unwrap();
        assert_eq!(session.ballots.len(), threads * per_thread);
    }
}
