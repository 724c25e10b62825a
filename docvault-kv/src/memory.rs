//! In-process key-value client.
//!
//! Values and hashes live in `HashMap`s behind an async-aware read-write lock.
//! Expiry is checked against [`tokio::time::Instant`] whenever a key is touched,
//! so tests running with a paused clock can advance time to expire records.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use mea::rwlock::RwLock;
use tokio::time::Instant;

use docvault_core::error::{DocumentStoreError, DocumentStoreResult};

use crate::client::KeyValueClient;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Debug, Default)]
struct State {
    values: HashMap<String, Entry>,
    hashes: HashMap<String, HashMap<String, String>>,
}

/// Thread-safe in-memory key-value client.
///
/// Cloning is cheap and every clone shares the same data.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKv {
    state: Arc<RwLock<State>>,
}

impl InMemoryKv {
    /// Creates an empty store.
    pub fn new() -> Self {
        InMemoryKv::default()
    }
}

#[async_trait]
impl KeyValueClient for InMemoryKv {
    async fn get(&self, key: &str) -> DocumentStoreResult<String> {
        let now = Instant::now();

        self.state
            .read()
            .await
            .values
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
            .ok_or_else(|| DocumentStoreError::NotFound(key.to_string()))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> DocumentStoreResult<()> {
        let expires_at = match ttl {
            Some(ttl) => Some(Instant::now().checked_add(ttl).ok_or_else(|| {
                DocumentStoreError::validation(format!("expiry of {}s is out of range", ttl.as_secs()))
            })?),
            None => None,
        };

        self.state
            .write()
            .await
            .values
            .insert(key.to_string(), Entry { value, expires_at });

        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> DocumentStoreResult<u64> {
        let now = Instant::now();
        let mut state = self.state.write().await;
        let mut removed = 0;

        for key in keys {
            let value = state.values.remove(key);
            let hash = state.hashes.remove(key);

            if value.is_some_and(|entry| entry.is_live(now)) || hash.is_some() {
                removed += 1;
            }
        }

        Ok(removed)
    }

    async fn scan(&self, pattern: &str) -> DocumentStoreResult<Vec<String>> {
        let now = Instant::now();
        let mut state = self.state.write().await;

        state.values.retain(|_, entry| entry.is_live(now));

        let pattern: Vec<char> = pattern.chars().collect();

        Ok(state
            .values
            .keys()
            .chain(state.hashes.keys())
            .filter(|key| glob_match(&pattern, &key.chars().collect::<Vec<_>>()))
            .cloned()
            .collect())
    }

    async fn hset(&self, key: &str, field: &str, value: String) -> DocumentStoreResult<()> {
        self.state
            .write()
            .await
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value);

        Ok(())
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> DocumentStoreResult<u64> {
        let mut state = self.state.write().await;

        let Some(hash) = state.hashes.get_mut(key) else {
            return Ok(0);
        };

        let removed = fields
            .iter()
            .filter(|field| hash.remove(field.as_str()).is_some())
            .count() as u64;

        if hash.is_empty() {
            state.hashes.remove(key);
        }

        Ok(removed)
    }

    async fn hgetall(&self, key: &str) -> DocumentStoreResult<HashMap<String, String>> {
        Ok(self
            .state
            .read()
            .await
            .hashes
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn ping(&self) -> DocumentStoreResult<()> {
        Ok(())
    }
}

/// Matches `text` against a glob supporting `*`, `?` and `\` escapes.
fn glob_match(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
                continue;
            }
            Some('?') => {
                p += 1;
                t += 1;
                continue;
            }
            Some('\\') if pattern.get(p + 1) == Some(&text[t]) => {
                p += 2;
                t += 1;
                continue;
            }
            Some(c) if *c != '\\' && *c == text[t] => {
                p += 1;
                t += 1;
                continue;
            }
            _ => {}
        }

        match backtrack {
            Some((star, matched)) => {
                p = star + 1;
                t = matched + 1;
                backtrack = Some((star, matched + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}
