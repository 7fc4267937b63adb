use clap::{Parser, Subcommand};

/// Runs ad-hoc ranked-choice vote sessions: create a session over a set of
/// entries, hand out the vote code, collect ballots, reveal results under
/// the results code.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON file holding the sessions. Created on first use.
    #[clap(short, long, value_parser, default_value = "votes.json")]
    pub store: String,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Creates a new vote session and prints its two access codes.
    Create {
        /// (file path) JSON description of the entries to vote on:
        /// {"projects": [{"name": "...", "icon": "..."}, ...]}
        #[clap(short, long, value_parser)]
        entries: String,
    },
    /// Lists the entries of a session, given its vote code.
    Entries {
        /// The 5-digit vote code distributed to voters.
        #[clap(value_parser)]
        code: String,
    },
    /// Submits one ballot to a session, given its vote code.
    Vote {
        /// The 5-digit vote code distributed to voters.
        #[clap(value_parser)]
        code: String,
        /// (file path) JSON ballot: {"userProject": "id", "ranking": ["id", ...]}.
        /// The userProject field is optional.
        #[clap(short, long, value_parser)]
        ballot: String,
    },
    /// Prints the aggregated results of a session, given its results code.
    Results {
        /// The 5-digit results code kept by the organizer.
        #[clap(value_parser)]
        code: String,
        /// (file path) A reference file containing expected results in JSON format.
        /// If provided, projvote will check that the computed output matches the reference.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
}
