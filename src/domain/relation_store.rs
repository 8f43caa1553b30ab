//! Per-symbol relation state for the relation-change cross policy.
//!
//! Lives for the process lifetime only. Each symbol's entry is read and
//! written under that entry's shard lock; no lock is ever held across an
//! await point.

use crate::domain::cross::{relation_change, Direction, Relation};
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct RelationStore {
    relations: DashMap<String, Relation>,
}

impl RelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Relation {
        self.relations
            .get(symbol)
            .map(|r| *r)
            .unwrap_or_default()
    }

    /// Apply the relation-change rule for `symbol` and store the result in a
    /// single read-modify-write.
    pub fn observe(&self, symbol: &str, current: Relation) -> Option<Direction> {
        let mut entry = self.relations.entry(symbol.to_string()).or_default();
        let (signal, next) = relation_change(*entry, current);
        *entry = next;
        signal
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}
