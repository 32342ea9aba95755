//! In-memory deploy store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{Store, StoreError};
use crate::deploy::Deploy;

/// Map-backed [`Store`]. History lives only as long as the process.
#[derive(Default)]
pub struct MemoryStore {
    channels: RwLock<HashMap<String, Vec<Deploy>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, channel: &str) -> Result<Option<Deploy>, StoreError> {
        let channels = self.channels.read().unwrap();
        Ok(channels.get(channel).and_then(|h| h.last().cloned()))
    }

    async fn set(&self, channel: &str, deploy: Deploy) -> Result<(), StoreError> {
        let mut channels = self.channels.write().unwrap();
        let history = channels.entry(channel.to_string()).or_default();
        match history.last_mut() {
            Some(last) if last.id == deploy.id => *last = deploy,
            _ => history.push(deploy),
        }
        Ok(())
    }

    async fn delete(&self, channel: &str) -> Result<Option<Deploy>, StoreError> {
        let mut channels = self.channels.write().unwrap();
        Ok(channels.get_mut(channel).and_then(Vec::pop))
    }

    async fn all(&self, channel: &str) -> Result<Vec<Deploy>, StoreError> {
        let channels = self.channels.read().unwrap();
        Ok(channels.get(channel).cloned().unwrap_or_default())
    }

    async fn since(&self, channel: &str, start: u64) -> Result<Vec<Deploy>, StoreError> {
        let channels = self.channels.read().unwrap();
        Ok(channels
            .get(channel)
            .map(|history| {
                history
                    .iter()
                    .filter(|d| d.started_at >= start)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
