//! Shared helpers for integration tests.
#![allow(dead_code)]

use serde_json::{json, Value};

/// Build one list-commits response entry in the upstream wire shape.
pub fn commit_json(sha: &str, date: Option<&str>, email: Option<&str>) -> Value {
    let signature = |email: Option<&str>, date: Option<&str>| -> Value {
        json!({
            "email": email,
            "date": date,
        })
    };

    json!({
        "sha": sha,
        "commit": {
            "message": format!("message for {}", sha),
            "author": signature(email, date),
            "committer": signature(Some("committer@example.com"), date),
        }
    })
}

/// A full page of synthetic commits, shas suffixed with the index.
pub fn commit_page(prefix: &str, count: usize, date: &str) -> Vec<Value> {
    (0..count)
        .map(|i| {
            commit_json(
                &format!("{}{:03}", prefix, i),
                Some(date),
                Some("dev@example.com"),
            )
        })
        .collect()
}
