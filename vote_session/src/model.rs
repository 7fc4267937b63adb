// ********* Session data structures ***********

use std::error::Error;
use std::fmt::Display;

use chrono::{DateTime, Utc};

/// A candidate entry registered in a vote session.
///
/// Entries are fixed at session creation and immutable afterwards.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Entry {
    /// Opaque identifier, unique within its session.
    pub id: String,
    /// Display label. Non-empty after trimming.
    pub name: String,
    /// Opaque reference to an image (URL or external handle).
    /// The engine never interprets it.
    pub icon_ref: String,
}

/// Organizer input for one entry, before an id has been assigned.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct NewEntry {
    pub name: String,
    pub icon_ref: String,
}

/// One voter's submission: an optional self-association and a preference
/// order over entry ids, most preferred first.
///
/// Ballots are append-only. There is no edit or retract operation.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Ballot {
    /// Generated by the system at submission time. The voter supplies no
    /// credential.
    pub voter_id: String,
    /// The entry this voter identifies as their own, if any.
    pub self_entry_id: Option<String>,
    /// Entry ids in preference order. Each id appears at most once and
    /// must reference an entry of the same session.
    pub ranking: Vec<String>,
}

/// One ranked-choice vote instance.
///
/// Invariant: `vote_code != results_code`, so that distributing one code
/// does not leak the other.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoteSession {
    /// Short numeric code granting ballot-submission access.
    pub vote_code: String,
    /// Short numeric code granting read access to aggregated results.
    pub results_code: String,
    /// Insertion order is preserved and used for stable display; it has no
    /// voting significance.
    pub entries: Vec<Entry>,
    pub ballots: Vec<Ballot>,
    pub created_at: DateTime<Utc>,
}

/// The two access codes handed back at session creation. Nothing else about
/// the stored session is returned to the organizer.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SessionCodes {
    pub vote_code: String,
    pub results_code: String,
}

// ******** Output data structures *********

/// Aggregated scores for one entry.
#[derive(PartialEq, Debug, Clone)]
pub struct EntryResult {
    pub entry: Entry,
    /// How many voters identified themselves as the owner of this entry.
    /// Not a preference vote.
    pub self_count: u64,
    /// Mean one-based rank over the non-self ballots that ranked this
    /// entry. Lower is better. `0.0` means no such ballot ranked it at
    /// all: absence of signal, not a favorable score. Renderers must
    /// special-case it.
    pub average_rank: f64,
}

// ********* Errors **********

/// Errors surfaced by the session manager and the store contract.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SessionError {
    /// Malformed or constraint-violating input. The message is meant to be
    /// shown to a human so they can correct the request.
    Validation(String),
    /// The code resolves to no session. Deliberately identical whether the
    /// session never existed or was purged.
    NotFound,
    /// Persistence layer failure. Not user-correctable and not retried by
    /// the engine.
    Store(String),
}

impl Error for SessionError {}

impl Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Validation(msg) => write!(f, "invalid request: {}", msg),
            SessionError::NotFound => write!(f, "no session found for this code"),
            SessionError::Store(msg) => write!(f, "storage failure: {}", msg),
        }
    }
}
