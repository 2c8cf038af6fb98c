//! Submission storage.
//!
//! The store is deliberately narrow: create, get, all. Submitted records
//! are immutable, so no update or delete surface exists. The in-memory
//! implementation stands in for a real database behind the same trait.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::response::{Answers, Response};

pub trait ResponseStore: Send + Sync {
    /// Validate the answers and store them as a new immutable record.
    fn create(&self, answers: Answers) -> Result<Response, String>;
    fn get(&self, id: &str) -> Option<Response>;
    /// All submissions, newest first.
    fn all(&self) -> Vec<Response>;
}

pub struct MemStorage {
    responses: RwLock<HashMap<String, Response>>,
}

impl MemStorage {
    pub fn new() -> Self {
        MemStorage {
            responses: RwLock::new(HashMap::new()),
        }
    }

    /// Rebuild a store from a snapshot, e.g. loaded at startup.
    pub fn from_snapshot(records: Vec<Response>) -> Self {
        let map = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        MemStorage {
            responses: RwLock::new(map),
        }
    }

    /// Copy of all records for snapshotting.
    pub fn snapshot(&self) -> Vec<Response> {
        self.responses.read().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.responses.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseStore for MemStorage {
    fn create(&self, answers: Answers) -> Result<Response, String> {
        let response = Response::from_answers(&answers)?;
        let mut map = self.responses.write().unwrap();
        map.insert(response.id.clone(), response.clone());
        Ok(response)
    }

    fn get(&self, id: &str) -> Option<Response> {
        self.responses.read().unwrap().get(id).cloned()
    }

    fn all(&self) -> Vec<Response> {
        let mut records: Vec<Response> =
            self.responses.read().unwrap().values().cloned().collect();
        records.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        records
    }
}
