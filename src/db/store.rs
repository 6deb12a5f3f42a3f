// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON document store with typed operations.
//!
//! The whole store is one JSON object mapping collection names to arrays
//! of records. Every mutation is load-modify-save: the touched collection
//! is modified on a copy, the full document is written to a temp file and
//! renamed over the store, and only then is the in-memory copy replaced.
//!
//! There is no file locking. One CLI invocation is expected to finish
//! before the next one starts against the same store; concurrent writers
//! will lose updates.
//!
//! Provides high-level operations for:
//! - Tokens (one OAuth token record per athlete)
//! - Bikes (local bikes, matched to Strava gear)
//! - Activities (synced Strava activities, keyed by Strava ID)

use crate::db::collections;
use crate::error::StoreError;
use crate::models::{Activity, Bike, StravaToken};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Collections = BTreeMap<String, Vec<Value>>;

/// Whether an upsert created a new record or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Document store handle. Clones share the same underlying data.
#[derive(Clone)]
pub struct DocumentStore {
    path: Option<PathBuf>,
    data: Arc<Mutex<Collections>>,
}

impl DocumentStore {
    /// Open (or lazily create) a store backed by the given JSON file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => Collections::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Collections::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        tracing::debug!(path = %path.display(), collections = data.len(), "Opened document store");

        Ok(Self {
            path: Some(path),
            data: Arc::new(Mutex::new(data)),
        })
    }

    /// Create a store that never touches disk (for tests).
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Arc::new(Mutex::new(Collections::new())),
        }
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the full document via temp file + rename.
    fn persist(&self, data: &Collections) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_vec_pretty(data)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }

    /// Modify one collection and persist. On any failure the in-memory
    /// state is left unchanged.
    fn modify<R>(
        &self,
        collection: &str,
        f: impl FnOnce(&mut Vec<Value>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut data = self.lock();
        let mut docs = data.get(collection).cloned().unwrap_or_default();
        let result = f(&mut docs)?;

        let previous = data.insert(collection.to_string(), docs);
        if let Err(e) = self.persist(&data) {
            match previous {
                Some(prev) => data.insert(collection.to_string(), prev),
                None => data.remove(collection),
            };
            return Err(e);
        }
        Ok(result)
    }

    // ─── Collection Operations ───────────────────────────────────

    /// All records in `collection` matching `predicate`.
    pub fn find<T, P>(&self, collection: &str, predicate: P) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned,
        P: Fn(&T) -> bool,
    {
        let data = self.lock();
        let Some(docs) = data.get(collection) else {
            return Ok(Vec::new());
        };

        let mut found = Vec::new();
        for doc in docs {
            let record = T::deserialize(doc)?;
            if predicate(&record) {
                found.push(record);
            }
        }
        Ok(found)
    }

    /// Insert `record`, or replace the record with the same key.
    pub fn upsert<T, K, F>(
        &self,
        collection: &str,
        key_fn: F,
        record: &T,
    ) -> Result<UpsertOutcome, StoreError>
    where
        T: Serialize + DeserializeOwned,
        K: PartialEq,
        F: Fn(&T) -> K,
    {
        let mut outcomes = self.upsert_many(collection, key_fn, std::slice::from_ref(record))?;
        Ok(outcomes.pop().unwrap_or(UpsertOutcome::Inserted))
    }

    /// Upsert several records with a single save.
    ///
    /// If the collection somehow holds more than one record for a key, the
    /// first is replaced and the rest are dropped.
    pub fn upsert_many<T, K, F>(
        &self,
        collection: &str,
        key_fn: F,
        records: &[T],
    ) -> Result<Vec<UpsertOutcome>, StoreError>
    where
        T: Serialize + DeserializeOwned,
        K: PartialEq,
        F: Fn(&T) -> K,
    {
        self.modify(collection, |docs| {
            let mut keys = Vec::with_capacity(docs.len());
            for doc in docs.iter() {
                let existing = T::deserialize(doc)?;
                keys.push(key_fn(&existing));
            }

            let mut outcomes = Vec::with_capacity(records.len());
            for record in records {
                let key = key_fn(record);
                let value = serde_json::to_value(record)?;

                match keys.iter().position(|k| *k == key) {
                    Some(idx) => {
                        docs[idx] = value;
                        // Drop duplicates left behind by older versions.
                        let mut i = keys.len();
                        while i > idx + 1 {
                            i -= 1;
                            if keys[i] == key {
                                keys.remove(i);
                                docs.remove(i);
                            }
                        }
                        outcomes.push(UpsertOutcome::Updated);
                    }
                    None => {
                        docs.push(value);
                        keys.push(key);
                        outcomes.push(UpsertOutcome::Inserted);
                    }
                }
            }
            Ok(outcomes)
        })
    }

    /// Delete all records matching `predicate`; returns how many were removed.
    pub fn delete<T, P>(&self, collection: &str, predicate: P) -> Result<usize, StoreError>
    where
        T: DeserializeOwned,
        P: Fn(&T) -> bool,
    {
        self.modify(collection, |docs| {
            let before = docs.len();
            let mut keep = Vec::with_capacity(before);
            for doc in docs.drain(..) {
                let record = T::deserialize(&doc)?;
                if !predicate(&record) {
                    keep.push(doc);
                }
            }
            *docs = keep;
            Ok(before - docs.len())
        })
    }

    /// Number of records in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.lock().get(collection).map_or(0, Vec::len)
    }

    // ─── Token Operations ────────────────────────────────────────

    /// Get the token for an athlete.
    pub fn get_token(&self, athlete_id: u64) -> Result<Option<StravaToken>, StoreError> {
        Ok(self
            .find(collections::TOKENS, |t: &StravaToken| t.athlete_id == athlete_id)?
            .into_iter()
            .next())
    }

    /// The most recently updated token, used when no athlete is known yet.
    pub fn current_token(&self) -> Result<Option<StravaToken>, StoreError> {
        Ok(self
            .find(collections::TOKENS, |_: &StravaToken| true)?
            .into_iter()
            .max_by_key(|t| t.updated_at))
    }

    /// Store a token, replacing any existing record for the same athlete.
    ///
    /// The original `created_at` survives the replacement.
    pub fn save_token(&self, token: &StravaToken) -> Result<UpsertOutcome, StoreError> {
        let mut token = token.clone();
        if let Some(existing) = self.get_token(token.athlete_id)? {
            token.created_at = existing.created_at;
        }
        self.upsert(collections::TOKENS, |t: &StravaToken| t.athlete_id, &token)
    }

    /// Delete tokens (for logout). Returns true if a record was removed.
    pub fn delete_token(&self, athlete_id: u64) -> Result<bool, StoreError> {
        let removed = self.delete(collections::TOKENS, |t: &StravaToken| {
            t.athlete_id == athlete_id
        })?;
        Ok(removed > 0)
    }

    // ─── Bike Operations ─────────────────────────────────────────

    pub fn list_bikes(&self) -> Result<Vec<Bike>, StoreError> {
        self.find(collections::BIKES, |_: &Bike| true)
    }

    /// Find the bike mirrored from a Strava gear ID.
    pub fn find_bike_by_gear_id(&self, gear_id: &str) -> Result<Option<Bike>, StoreError> {
        Ok(self
            .find(collections::BIKES, |b: &Bike| {
                b.strava_gear_id.as_deref() == Some(gear_id)
            })?
            .into_iter()
            .next())
    }

    /// Create or update a bike by local ID.
    pub fn upsert_bike(&self, bike: &Bike) -> Result<UpsertOutcome, StoreError> {
        self.upsert(collections::BIKES, |b: &Bike| b.id.clone(), bike)
    }

    // ─── Activity Operations ─────────────────────────────────────

    /// Get an activity by Strava ID.
    pub fn get_activity(&self, activity_id: u64) -> Result<Option<Activity>, StoreError> {
        Ok(self
            .find(collections::ACTIVITIES, |a: &Activity| a.id == activity_id)?
            .into_iter()
            .next())
    }

    /// Which of the given activity IDs are already stored.
    pub fn existing_activity_ids(&self, ids: &[u64]) -> Result<HashSet<u64>, StoreError> {
        /// Only the key is needed; the rest of the record is skipped.
        #[derive(Deserialize)]
        struct ActivityKey {
            id: u64,
        }

        let wanted: HashSet<u64> = ids.iter().copied().collect();
        Ok(self
            .find(collections::ACTIVITIES, |a: &ActivityKey| wanted.contains(&a.id))?
            .into_iter()
            .map(|a| a.id)
            .collect())
    }

    /// Insert or replace activities by Strava ID.
    pub fn upsert_activities(
        &self,
        activities: &[Activity],
    ) -> Result<Vec<UpsertOutcome>, StoreError> {
        self.upsert_many(collections::ACTIVITIES, |a: &Activity| a.id, activities)
    }

    /// Activities for an athlete, newest first.
    pub fn list_activities(&self, athlete_id: u64) -> Result<Vec<Activity>, StoreError> {
        let mut activities =
            self.find(collections::ACTIVITIES, |a: &Activity| a.athlete_id == athlete_id)?;
        activities.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(activities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: u32,
        text: String,
    }

    fn note(id: u32, text: &str) -> Note {
        Note {
            id,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_upsert_inserts_then_replaces() {
        let store = DocumentStore::in_memory();

        let first = store.upsert("notes", |n: &Note| n.id, &note(1, "a")).unwrap();
        let second = store.upsert("notes", |n: &Note| n.id, &note(1, "b")).unwrap();

        assert_eq!(first, UpsertOutcome::Inserted);
        assert_eq!(second, UpsertOutcome::Updated);
        let all: Vec<Note> = store.find("notes", |_| true).unwrap();
        assert_eq!(all, vec![note(1, "b")]);
    }

    #[test]
    fn test_upsert_many_same_key_in_batch() {
        let store = DocumentStore::in_memory();
        let outcomes = store
            .upsert_many("notes", |n: &Note| n.id, &[note(1, "a"), note(1, "b")])
            .unwrap();

        assert_eq!(outcomes, vec![UpsertOutcome::Inserted, UpsertOutcome::Updated]);
        assert_eq!(store.count("notes"), 1);
    }

    #[test]
    fn test_upsert_collapses_existing_duplicates() {
        let store = DocumentStore::in_memory();
        // Simulate an old store that appended duplicates.
        store
            .modify("notes", |docs| {
                docs.push(serde_json::to_value(note(7, "old1"))?);
                docs.push(serde_json::to_value(note(8, "other"))?);
                docs.push(serde_json::to_value(note(7, "old2"))?);
                Ok(())
            })
            .unwrap();

        store.upsert("notes", |n: &Note| n.id, &note(7, "new")).unwrap();

        let all: Vec<Note> = store.find("notes", |_| true).unwrap();
        assert_eq!(all, vec![note(7, "new"), note(8, "other")]);
    }

    #[test]
    fn test_find_and_delete_with_predicate() {
        let store = DocumentStore::in_memory();
        store
            .upsert_many(
                "notes",
                |n: &Note| n.id,
                &[note(1, "keep"), note(2, "drop"), note(3, "drop")],
            )
            .unwrap();

        let dropped: Vec<Note> = store.find("notes", |n: &Note| n.text == "drop").unwrap();
        assert_eq!(dropped.len(), 2);

        let removed = store.delete("notes", |n: &Note| n.text == "drop").unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.count("notes"), 1);
    }

    #[test]
    fn test_missing_collection_is_empty() {
        let store = DocumentStore::in_memory();
        let found: Vec<Note> = store.find("nothing", |_| true).unwrap();
        assert!(found.is_empty());
        assert_eq!(store.delete("nothing", |_: &Note| true).unwrap(), 0);
    }
}
