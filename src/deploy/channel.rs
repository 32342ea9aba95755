//! Per-channel deploy coordination.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::deploy::Deploy;
use crate::store::{Store, StoreError};

/// The writer-of-record for deploy transitions.
///
/// Enforces at most one running deploy per channel. The store serializes
/// individual reads and writes, but `start`/`finish`/`abort` are
/// check-then-write sequences, so each channel gets its own async lock held
/// across the whole sequence. Two concurrent `start` calls for the same
/// channel can therefore never both succeed.
pub struct ChannelDeploys {
    store: Arc<dyn Store>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ChannelDeploys {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn channel_lock(&self, channel: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks.entry(channel.to_string()).or_default().clone()
    }

    /// The channel's current deploy: its most recent record, which may
    /// already be finished.
    pub async fn current(&self, channel: &str) -> Result<Option<Deploy>, StoreError> {
        self.store.get(channel).await
    }

    /// Start `candidate` in the channel.
    ///
    /// A running deploy owned by a different user wins: the existing deploy
    /// is returned with `false` and nothing is mutated. A running deploy by
    /// the same owner is finished and transparently replaced. Returns the
    /// started deploy and `true` on success.
    pub async fn start(
        &self,
        channel: &str,
        mut candidate: Deploy,
    ) -> Result<(Deploy, bool), StoreError> {
        let lock = self.channel_lock(channel);
        let _guard = lock.lock().await;

        if let Some(mut current) = self.store.get(channel).await? {
            if !current.finished() {
                if current.user.id != candidate.user.id {
                    return Ok((current, false));
                }

                current.finish();
                self.store.set(channel, current).await?;
            }
        }

        candidate.start();
        self.store.set(channel, candidate.clone()).await?;

        Ok((candidate, true))
    }

    /// Finish the channel's running deploy and write it back. Returns `None`
    /// when nothing is running.
    pub async fn finish(&self, channel: &str) -> Result<Option<Deploy>, StoreError> {
        self.end(channel, None).await
    }

    /// Forcibly end the channel's running deploy, recording `reason`. Used
    /// when someone other than the owner ends the deploy. Returns `None`
    /// when nothing is running; a finished deploy is never re-aborted.
    pub async fn abort(&self, channel: &str, reason: &str) -> Result<Option<Deploy>, StoreError> {
        self.end(channel, Some(reason)).await
    }

    async fn end(&self, channel: &str, reason: Option<&str>) -> Result<Option<Deploy>, StoreError> {
        let lock = self.channel_lock(channel);
        let _guard = lock.lock().await;

        let Some(mut current) = self.store.get(channel).await? else {
            return Ok(None);
        };
        if current.finished() {
            return Ok(None);
        }

        match reason {
            Some(reason) => current.abort(reason),
            None => current.finish(),
        }
        self.store.set(channel, current.clone()).await?;

        Ok(Some(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::ChatUser;
    use crate::store::MemoryStore;

    fn user(id: &str) -> ChatUser {
        ChatUser {
            id: id.into(),
            name: format!("user-{}", id),
        }
    }

    fn repo() -> ChannelDeploys {
        ChannelDeploys::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_current_empty_channel() {
        assert_eq!(repo().current("ch1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_start_in_empty_channel() {
        let repo = repo();

        let (started, ok) = repo
            .start("ch1", Deploy::new(user("U1"), "release"))
            .await
            .unwrap();
        assert!(ok);
        assert!(started.started_at > 0);
        assert_eq!(repo.current("ch1").await.unwrap(), Some(started));
    }

    #[tokio::test]
    async fn test_start_conflict_with_other_user() {
        let repo = repo();

        let (running, _) = repo
            .start("ch1", Deploy::new(user("U1"), "release"))
            .await
            .unwrap();

        let (existing, ok) = repo
            .start("ch1", Deploy::new(user("U2"), "hotfix"))
            .await
            .unwrap();
        assert!(!ok);
        assert_eq!(existing, running);

        // State unchanged.
        assert_eq!(repo.current("ch1").await.unwrap(), Some(running));
    }

    #[tokio::test]
    async fn test_start_by_same_owner_restarts() {
        let repo = repo();

        let (first, _) = repo
            .start("ch1", Deploy::new(user("U1"), "release"))
            .await
            .unwrap();

        let (second, ok) = repo
            .start("ch1", Deploy::new(user("U1"), "release v2"))
            .await
            .unwrap();
        assert!(ok);
        assert_eq!(second.subject, "release v2");

        // The first deploy was finished, not replaced.
        let history = repo.store.all("ch1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, first.id);
        assert!(history[0].finished());
        assert!(!history[1].finished());
    }

    #[tokio::test]
    async fn test_finish() {
        let repo = repo();

        assert_eq!(repo.finish("ch1").await.unwrap(), None);

        let (started, _) = repo
            .start("ch1", Deploy::new(user("U1"), "release"))
            .await
            .unwrap();

        let finished = repo.finish("ch1").await.unwrap().unwrap();
        assert_eq!(finished.id, started.id);
        assert!(finished.finished());
        assert!(!finished.aborted);

        // Finished is terminal; a second finish finds nothing running.
        assert_eq!(repo.finish("ch1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_abort_records_reason() {
        let repo = repo();

        repo.start("ch1", Deploy::new(user("U1"), "release"))
            .await
            .unwrap();

        let aborted = repo.abort("ch1", "interrupted by user-U2").await.unwrap().unwrap();
        assert!(aborted.aborted);
        assert_eq!(aborted.abort_reason, "interrupted by user-U2");

        assert_eq!(repo.abort("ch1", "again").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_start_after_finish_creates_new_record() {
        let repo = repo();

        let (first, _) = repo
            .start("ch1", Deploy::new(user("U1"), "release"))
            .await
            .unwrap();
        repo.finish("ch1").await.unwrap();

        let (second, ok) = repo
            .start("ch1", Deploy::new(user("U2"), "hotfix"))
            .await
            .unwrap();
        assert!(ok);
        assert_ne!(second.id, first.id);
        assert_eq!(repo.store.all("ch1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_at_most_one_running_deploy() {
        let repo = Arc::new(repo());

        let mut handles = Vec::new();
        for i in 0..16 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                let d = Deploy::new(user(&format!("U{}", i)), "race");
                repo.start("ch1", d).await.unwrap().1
            }));
        }

        let mut started = 0;
        for handle in handles {
            if handle.await.unwrap() {
                started += 1;
            }
        }
        assert_eq!(started, 1);

        let running: Vec<_> = repo
            .store
            .all("ch1")
            .await
            .unwrap()
            .into_iter()
            .filter(|d| !d.finished())
            .collect();
        assert_eq!(running.len(), 1);
    }
}
