//! Reference extraction from deploy subjects.
//!
//! Subjects are free text; pull-request and user references are scanned out
//! word by word when a deploy is created and kept as read-only annotations.

use serde::{Deserialize, Serialize};

/// A pull request mentioned in a deploy subject, either as `owner/repo#12`
/// or as a full GitHub pull request URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestReference {
    pub repository: String,
    pub id: String,
}

/// A user mentioned in a deploy subject as `@name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReference {
    pub name: String,
}

/// Scan `subject` for pull request references.
pub fn find_pull_request_references(subject: &str) -> Vec<PullRequestReference> {
    subject
        .split_whitespace()
        .filter_map(|word| shorthand_reference(word).or_else(|| url_reference(word)))
        .collect()
}

/// Scan `subject` for `@name` user references. A bare `@` and an infix `@`
/// (as in an email address) are not references.
pub fn find_user_references(subject: &str) -> Vec<UserReference> {
    subject
        .split_whitespace()
        .filter_map(|word| {
            let name = word
                .strip_prefix('@')?
                .trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
            if name.is_empty() {
                None
            } else {
                Some(UserReference { name: name.into() })
            }
        })
        .collect()
}

// Matches `owner/repo#12` with at most one trailing non-letter character,
// e.g. a comma.
fn shorthand_reference(word: &str) -> Option<PullRequestReference> {
    let (repository, rest) = word.split_once('#')?;
    if !is_repository(repository) {
        return None;
    }

    let number = rest.trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
    if rest.len() - number.len() > 1 {
        return None;
    }

    reference(repository, number)
}

// Matches `https://github.com/owner/repo/pull/12`, ignoring any query string.
fn url_reference(word: &str) -> Option<PullRequestReference> {
    let path = word
        .strip_prefix("https://github.com/")
        .or_else(|| word.strip_prefix("http://github.com/"))?;
    let (repository, rest) = path.split_at(path.find("/pull/")?);
    let number = rest
        .trim_start_matches("/pull/")
        .split(['?', '#'])
        .next()
        .unwrap_or_default();

    if !is_repository(repository) {
        return None;
    }

    reference(repository, number)
}

fn is_repository(s: &str) -> bool {
    match s.split_once('/') {
        Some((owner, name)) => !owner.is_empty() && !name.is_empty() && !name.contains('/'),
        None => false,
    }
}

fn reference(repository: &str, number: &str) -> Option<PullRequestReference> {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some(PullRequestReference {
        repository: repository.into(),
        id: number.into(),
    })
}
