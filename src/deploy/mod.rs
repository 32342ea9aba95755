//! Deploy records and the per-channel deploy coordinator.

mod channel;
mod references;

pub use channel::ChannelDeploys;
pub use references::{
    PullRequestReference, UserReference, find_pull_request_references, find_user_references,
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::now_unix;

/// The chat identity performing a deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: String,
    pub name: String,
}

/// One deploy attempt in one channel.
///
/// Timestamps are Unix seconds; zero means "not started" / "still running".
/// A deploy is immutable once finished: `abort` refuses to touch a finished
/// record and `finish` is idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deploy {
    pub id: Uuid,
    pub user: ChatUser,
    pub subject: String,
    pub started_at: u64,
    pub finished_at: u64,
    pub aborted: bool,
    pub abort_reason: String,
    pub pull_requests: Vec<PullRequestReference>,
    pub subscribers: Vec<UserReference>,
}

impl Deploy {
    /// Create an unstarted deploy, extracting pull-request and user
    /// references from the subject.
    pub fn new(user: ChatUser, subject: impl Into<String>) -> Self {
        let subject = subject.into();
        Self {
            id: Uuid::new_v4(),
            user,
            pull_requests: find_pull_request_references(&subject),
            subscribers: find_user_references(&subject),
            subject,
            started_at: 0,
            finished_at: 0,
            aborted: false,
            abort_reason: String::new(),
        }
    }

    pub fn finished(&self) -> bool {
        self.finished_at != 0
    }

    /// Stamp the start time. Returns `false` if the deploy already started.
    pub fn start(&mut self) -> bool {
        if self.started_at != 0 {
            return false;
        }

        self.started_at = now_unix();
        true
    }

    /// Mark the deploy finished. No-op on an already finished deploy.
    pub fn finish(&mut self) {
        if self.finished() {
            return;
        }

        self.finished_at = now_unix().max(self.started_at);
    }

    /// Forcibly end a running deploy, recording who-knows-why. A finished
    /// deploy is never re-aborted or re-opened.
    pub fn abort(&mut self, reason: impl Into<String>) {
        if self.finished() {
            return;
        }

        self.finish();
        self.aborted = true;
        self.abort_reason = reason.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> ChatUser {
        ChatUser {
            id: "U1".into(),
            name: "alice".into(),
        }
    }

    #[test]
    fn test_new_extracts_references() {
        let d = Deploy::new(user(), "octocat/helloworld#12 for @bob");

        assert_eq!(d.pull_requests.len(), 1);
        assert_eq!(d.pull_requests[0].repository, "octocat/helloworld");
        assert_eq!(d.subscribers, vec![UserReference { name: "bob".into() }]);
        assert_eq!(d.started_at, 0);
        assert!(!d.finished());
    }

    #[test]
    fn test_start_only_once() {
        let mut d = Deploy::new(user(), "release");

        assert!(d.start());
        let started_at = d.started_at;
        assert!(started_at > 0);

        assert!(!d.start());
        assert_eq!(d.started_at, started_at);
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut d = Deploy::new(user(), "release");
        d.start();

        d.finish();
        assert!(d.finished());
        assert!(d.finished_at >= d.started_at);

        let finished_at = d.finished_at;
        d.finish();
        assert_eq!(d.finished_at, finished_at);
    }

    #[test]
    fn test_abort_finishes_with_reason() {
        let mut d = Deploy::new(user(), "release");
        d.start();

        d.abort("requested by @bob");
        assert!(d.finished());
        assert!(d.aborted);
        assert_eq!(d.abort_reason, "requested by @bob");
    }

    #[test]
    fn test_abort_never_reopens_finished_deploy() {
        let mut d = Deploy::new(user(), "release");
        d.start();
        d.finish();

        d.abort("too late");
        assert!(!d.aborted);
        assert!(d.abort_reason.is_empty());
    }
}
