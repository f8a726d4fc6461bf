//! Commit normalization: raw API records into stored commit records.

use crate::github::RawCommit;
use crate::store::CommitRecord;

/// Map raw commits into commit records, one-to-one and order-preserving.
pub fn normalize(raw_commits: Vec<RawCommit>) -> Vec<CommitRecord> {
    raw_commits.into_iter().map(normalize_commit).collect()
}

/// Resolve the timestamp/email ambiguity between author and committer.
///
/// The author sub-record wins whenever it carries a date; its email is used
/// even if the committer's differs. Only a missing author date triggers the
/// committer fallback, and then the committer supplies both fields together.
/// A commit with no dated sub-record at all still produces a record, with
/// timestamp and email absent.
fn normalize_commit(raw: RawCommit) -> CommitRecord {
    let detail = raw.commit;

    let (timestamp, email) = match (detail.author, detail.committer) {
        (Some(author), _) if author.date.is_some() => (author.date, author.email),
        (_, Some(committer)) if committer.date.is_some() => (committer.date, committer.email),
        _ => (None, None),
    };

    CommitRecord {
        sha: raw.sha,
        timestamp,
        message: detail.message,
        email,
    }
}
