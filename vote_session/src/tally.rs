use log::debug;

use crate::model::{Ballot, Entry, EntryResult};

/// Computes per-entry scores from the full set of ballots of a session.
///
/// Pure function: no persistence, no mutation. Results are returned in the
/// order of `entries`. For each entry:
///
/// - `self_count` counts the ballots whose self-association names it.
/// - `average_rank` is the mean one-based position over the ballots that
///   both ranked the entry and did not self-associate with it. A voter's
///   own ballot never contributes to their entry's preference score, which
///   prevents self-boosting. Ballots that do not rank the entry contribute
///   nothing: absence is "no opinion", not "ranked last".
///
/// The function is total over input satisfying the session invariants
/// (ranking ids reference session entries, no duplicates). Foreign ids in
/// a ranking simply never match and are ignored here; upholding the
/// invariant is the session manager's job.
pub fn compute_results(entries: &[Entry], ballots: &[Ballot]) -> Vec<EntryResult> {
    debug!(
        "compute_results: {} entries, {} ballots",
        entries.len(),
        ballots.len()
    );
    entries
        .iter()
        .map(|entry| {
            let self_count = ballots
                .iter()
                .filter(|b| b.self_entry_id.as_deref() == Some(entry.id.as_str()))
                .count() as u64;

            let mut rank_sum: u64 = 0;
            let mut ranked_by: u64 = 0;
            for ballot in ballots {
                if ballot.self_entry_id.as_deref() == Some(entry.id.as_str()) {
                    continue;
                }
                if let Some(pos) = ballot.ranking.iter().position(|id| *id == entry.id) {
                    rank_sum += pos as u64 + 1;
                    ranked_by += 1;
                }
            }
            // 0.0 is the "no signal" sentinel, not a top score.
            let average_rank = if ranked_by > 0 {
                rank_sum as f64 / ranked_by as f64
            } else {
                0.0
            };

            EntryResult {
                entry: entry.clone(),
                self_count,
                average_rank,
            }
        })
        .collect()
}
