//! Source-id → target-id translation tables.

use std::collections::HashMap;

use crate::error::{Result, WriteError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPolicy {
    /// Target ids equal source ids.
    Preserve,
    /// Target ids are 1..=N in model order.
    Contiguous,
}

/// Translation table for one entity space (gridpoints, zones, elements...).
#[derive(Debug, Clone)]
pub struct Renumbering {
    entity: &'static str,
    policy: IdPolicy,
    map: HashMap<u32, u32>,
}

impl Renumbering {
    /// Build a table over `ids`, taken in order. Ids must be unique, which
    /// the mesh model guarantees.
    pub fn build(entity: &'static str, policy: IdPolicy, ids: impl IntoIterator<Item = u32>) -> Self {
        let map: HashMap<u32, u32> = match policy {
            IdPolicy::Preserve => ids.into_iter().map(|id| (id, id)).collect(),
            IdPolicy::Contiguous => ids
                .into_iter()
                .zip(1u32..)
                .collect(),
        };
        Self {
            entity,
            policy,
            map,
        }
    }

    /// Translate a source id. A missing entry means the writer referenced an
    /// entity outside the table, which is a defect rather than bad input.
    pub fn get(&self, source: u32) -> Result<u32> {
        self.map.get(&source).copied().ok_or_else(|| {
            WriteError::Invariant(format!(
                "{} {source} has no entry in the renumbering table",
                self.entity
            ))
        })
    }

    pub fn contains(&self, source: u32) -> bool {
        self.map.contains_key(&source)
    }

    pub fn policy(&self) -> IdPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
