use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};

use std::fs;

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use vote_session::{NewEntry, RandomCodes, SessionManager};

use crate::app::file_store::JsonFileStore;
use crate::app::io::*;
use crate::args::{Args, Command};

#[derive(Debug, Snafu)]
pub enum CliError {
    #[snafu(display("Error reading file {path}"))]
    ReadingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON in {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display(""))]
    PrintingJson { source: serde_json::Error },
    #[snafu(display("{source}"))]
    Session {
        source: vote_session::SessionError,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type CliResult<T> = Result<T, CliError>;

/// The JSON shapes exchanged with the user. Field names follow the wire
/// format of the web front end (camelCase).
pub mod io {
    use serde::{Deserialize, Serialize};

    /// Organizer input for `create`.
    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct SessionSpec {
        pub projects: Vec<EntrySpec>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct EntrySpec {
        pub name: String,
        pub icon: Option<String>,
    }

    /// Output of `create`: the only secrets shared with the organizer.
    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct CodesJs {
        #[serde(rename = "voteCode")]
        pub vote_code: String,
        #[serde(rename = "resultsCode")]
        pub results_code: String,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct EntryJs {
        pub id: String,
        pub name: String,
        pub icon: String,
    }

    /// Voter input for `vote`.
    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct BallotJs {
        #[serde(rename = "userProject")]
        pub user_project: Option<String>,
        pub ranking: Vec<String>,
    }

    /// One line of the `results` output.
    #[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct ResultJs {
        pub project: EntryJs,
        /// Voters who claimed this entry as their own.
        pub votes: u64,
        #[serde(rename = "averageRank")]
        pub average_rank: f64,
    }

    impl From<&vote_session::Entry> for EntryJs {
        fn from(e: &vote_session::Entry) -> EntryJs {
            EntryJs {
                id: e.id.clone(),
                name: e.name.clone(),
                icon: e.icon_ref.clone(),
            }
        }
    }

    impl From<&vote_session::EntryResult> for ResultJs {
        fn from(r: &vote_session::EntryResult) -> ResultJs {
            ResultJs {
                project: EntryJs::from(&r.entry),
                votes: r.self_count,
                average_rank: r.average_rank,
            }
        }
    }
}

/// A [`vote_session::SessionStore`] over a single JSON document on disk.
///
/// Every operation reads the whole file, mutates it and writes it back
/// under a process-local mutex, which is the per-session serialization
/// point the store contract requires for this single-process front end.
pub mod file_store {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use chrono::{DateTime, Utc};
    use log::debug;
    use serde::{Deserialize, Serialize};

    use vote_session::{Ballot, Entry, SessionError, SessionId, SessionStore, VoteSession};

    use crate::app::io::EntryJs;

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    struct StoredBallot {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "userProject")]
        user_project: Option<String>,
        ranking: Vec<String>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    struct StoredSession {
        id: String,
        #[serde(rename = "voteCode")]
        vote_code: String,
        #[serde(rename = "resultsCode")]
        results_code: String,
        projects: Vec<EntryJs>,
        votes: Vec<StoredBallot>,
        #[serde(rename = "createdAt")]
        created_at: String,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
    struct StoreFile {
        sessions: Vec<StoredSession>,
    }

    pub struct JsonFileStore {
        path: PathBuf,
        lock: Mutex<()>,
    }

    impl JsonFileStore {
        pub fn new<P: Into<PathBuf>>(path: P) -> JsonFileStore {
            JsonFileStore {
                path: path.into(),
                lock: Mutex::new(()),
            }
        }

        fn load(&self) -> Result<StoreFile, SessionError> {
            if !self.path.exists() {
                debug!("load: store file {:?} absent, starting empty", self.path);
                return Ok(StoreFile::default());
            }
            let contents = std::fs::read_to_string(&self.path)
                .map_err(|e| SessionError::Store(format!("reading session store: {}", e)))?;
            serde_json::from_str(&contents)
                .map_err(|e| SessionError::Store(format!("corrupted session store: {}", e)))
        }

        fn save(&self, file: &StoreFile) -> Result<(), SessionError> {
            let contents = serde_json::to_string_pretty(file)
                .map_err(|e| SessionError::Store(format!("encoding session store: {}", e)))?;
            std::fs::write(&self.path, contents)
                .map_err(|e| SessionError::Store(format!("writing session store: {}", e)))
        }
    }

    fn to_stored(id: &str, session: &VoteSession) -> StoredSession {
        StoredSession {
            id: id.to_string(),
            vote_code: session.vote_code.clone(),
            results_code: session.results_code.clone(),
            projects: session.entries.iter().map(EntryJs::from).collect(),
            votes: session
                .ballots
                .iter()
                .map(|b| StoredBallot {
                    user_id: b.voter_id.clone(),
                    user_project: b.self_entry_id.clone(),
                    ranking: b.ranking.clone(),
                })
                .collect(),
            created_at: session.created_at.to_rfc3339(),
        }
    }

    fn from_stored(stored: &StoredSession) -> Result<VoteSession, SessionError> {
        let created_at = DateTime::parse_from_rfc3339(&stored.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| SessionError::Store(format!("bad createdAt timestamp: {}", e)))?;
        Ok(VoteSession {
            vote_code: stored.vote_code.clone(),
            results_code: stored.results_code.clone(),
            entries: stored
                .projects
                .iter()
                .map(|p| Entry {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    icon_ref: p.icon.clone(),
                })
                .collect(),
            ballots: stored
                .votes
                .iter()
                .map(|v| Ballot {
                    voter_id: v.user_id.clone(),
                    self_entry_id: v.user_project.clone(),
                    ranking: v.ranking.clone(),
                })
                .collect(),
            created_at,
        })
    }

    impl SessionStore for JsonFileStore {
        fn create_session(&self, session: VoteSession) -> Result<SessionId, SessionError> {
            let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
            let mut file = self.load()?;
            let id = format!("s{}", file.sessions.len() + 1);
            file.sessions.push(to_stored(&id, &session));
            self.save(&file)?;
            Ok(SessionId(id))
        }

        fn find_by_vote_code(
            &self,
            code: &str,
        ) -> Result<Option<(SessionId, VoteSession)>, SessionError> {
            let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
            let file = self.load()?;
            match file.sessions.iter().find(|s| s.vote_code == code) {
                Some(s) => Ok(Some((SessionId(s.id.clone()), from_stored(s)?))),
                None => Ok(None),
            }
        }

        fn find_by_results_code(
            &self,
            code: &str,
        ) -> Result<Option<(SessionId, VoteSession)>, SessionError> {
            let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
            let file = self.load()?;
            match file.sessions.iter().find(|s| s.results_code == code) {
                Some(s) => Ok(Some((SessionId(s.id.clone()), from_stored(s)?))),
                None => Ok(None),
            }
        }

        fn append_ballot(&self, id: &SessionId, ballot: Ballot) -> Result<(), SessionError> {
            let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
            let mut file = self.load()?;
            let session = file
                .sessions
                .iter_mut()
                .find(|s| s.id == id.0)
                .ok_or_else(|| SessionError::Store(format!("unknown session id {}", id.0)))?;
            session.votes.push(StoredBallot {
                user_id: ballot.voter_id,
                user_project: ballot.self_entry_id,
                ranking: ballot.ranking,
            });
            self.save(&file)
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> CliResult<T> {
    let contents = fs::read_to_string(path).context(ReadingFileSnafu { path })?;
    serde_json::from_str(&contents).context(ParsingJsonSnafu { path })
}

fn print_json<T: serde::Serialize>(value: &T) -> CliResult<()> {
    let pretty = serde_json::to_string_pretty(value).context(PrintingJsonSnafu {})?;
    println!("{}", pretty);
    Ok(())
}

type Manager = SessionManager<JsonFileStore, RandomCodes>;

fn run_create(manager: &Manager, entries_path: &str) -> CliResult<()> {
    let spec: SessionSpec = read_json(entries_path)?;
    info!(
        "create: {} entries read from {}",
        spec.projects.len(),
        entries_path
    );
    let new_entries: Vec<NewEntry> = spec
        .projects
        .iter()
        .map(|p| NewEntry {
            name: p.name.clone(),
            icon_ref: p.icon.clone().unwrap_or_default(),
        })
        .collect();
    let codes = manager.create_session(&new_entries).context(SessionSnafu)?;
    print_json(&CodesJs {
        vote_code: codes.vote_code,
        results_code: codes.results_code,
    })
}

fn run_entries(manager: &Manager, code: &str) -> CliResult<()> {
    let entries = manager.entries_by_vote_code(code).context(SessionSnafu)?;
    let projects: Vec<EntryJs> = entries.iter().map(EntryJs::from).collect();
    print_json(&json!({ "projects": projects }))
}

fn run_vote(manager: &Manager, code: &str, ballot_path: &str) -> CliResult<()> {
    let ballot: BallotJs = read_json(ballot_path)?;
    debug!("vote: ballot read from {}: {:?}", ballot_path, ballot);
    manager
        .submit_ballot(code, ballot.user_project.as_deref(), &ballot.ranking)
        .context(SessionSnafu)?;
    print_json(&json!({ "success": true }))
}

fn run_results(manager: &Manager, code: &str, reference_path: Option<&str>) -> CliResult<()> {
    let results = manager.results_by_results_code(code).context(SessionSnafu)?;
    let results_js: Vec<ResultJs> = results.iter().map(ResultJs::from).collect();
    // Normalize through a Value so that key ordering matches the parsed
    // reference when comparing below.
    let results_value = serde_json::to_value(&results_js).context(PrintingJsonSnafu {})?;
    let pretty = serde_json::to_string_pretty(&results_value).context(PrintingJsonSnafu {})?;
    println!("{}", pretty);

    // The reference results, if provided for comparison.
    if let Some(path) = reference_path {
        let reference: JSValue = read_json(path)?;
        let pretty_ref = serde_json::to_string_pretty(&reference).context(PrintingJsonSnafu {})?;
        if pretty_ref != pretty {
            warn!("Found differences with the reference results");
            print_diff(pretty_ref.as_str(), pretty.as_str(), "\n");
            whatever!("Difference detected between computed results and reference results");
        }
        info!("results: output matches the reference in {}", path);
    }
    Ok(())
}

pub fn run_command(args: &Args) -> CliResult<()> {
    let store = JsonFileStore::new(args.store.as_str());
    let manager: Manager = SessionManager::new(store, RandomCodes);
    match &args.command {
        Command::Create { entries } => run_create(&manager, entries),
        Command::Entries { code } => run_entries(&manager, code),
        Command::Vote { code, ballot } => run_vote(&manager, code, ballot),
        Command::Results { code, reference } => {
            run_results(&manager, code, reference.as_deref())
        }
    }
}
