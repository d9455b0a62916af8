//! Relationship index over the record store.
//!
//! Nothing here is persisted separately: parent/child, dependency and link
//! edges are read from the records themselves on demand. The parent chain must
//! stay acyclic; dependency and link targets may dangle.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::record::{ItemRecord, RecordId, RecordSummary};
use crate::store::{RecordStore, StoreError};

/// Outcome of checking a proposed `parentItemId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentCheck {
    /// No parent, or the parent exists and is not a descendant.
    Ok,
    /// The referenced parent is not in the store.
    Missing,
    /// The assignment would make the record its own ancestor.
    Cycle,
}

/// A related record as seen from a read: either present, with a summary, or a
/// dangling reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum RelatedRecord {
    Present(RecordSummary),
    Absent { id: RecordId },
}

impl RelatedRecord {
    pub fn id(&self) -> RecordId {
        match self {
            RelatedRecord::Present(summary) => summary.id,
            RelatedRecord::Absent { id } => *id,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, RelatedRecord::Absent { .. })
    }
}

/// Every relation of one record, resolved against the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relations {
    pub parent: Option<RelatedRecord>,
    /// Root first, direct parent last.
    pub ancestors: Vec<RelatedRecord>,
    pub children: Vec<RelatedRecord>,
    pub dependencies: Vec<RelatedRecord>,
    pub linked_items: Vec<RelatedRecord>,
    /// Records whose `dependencies` contain this one.
    pub dependents: Vec<RelatedRecord>,
}

/// Result of walking the parent chain upward.
struct ParentWalk {
    /// Nearest ancestor first.
    found: Vec<ItemRecord>,
    /// Set when the chain ends at an id that is not in the store.
    dangling: Option<RecordId>,
}

pub struct RelationshipIndex<'a> {
    store: &'a dyn RecordStore,
    max_depth: usize,
}

impl<'a> RelationshipIndex<'a> {
    pub fn new(store: &'a dyn RecordStore, max_depth: usize) -> Self {
        Self { store, max_depth }
    }

    /// Ids of the existing ancestors of `id`, root first. The walk stops at a
    /// dangling parent reference.
    pub fn ancestors(&self, id: RecordId) -> Result<Vec<RecordId>, StoreError> {
        let Some(record) = self.store.get(id)? else {
            return Ok(Vec::new());
        };
        let walk = self.walk_up(&record)?;
        Ok(walk.found.iter().rev().map(|r| r.id).collect())
    }

    pub fn children(&self, id: RecordId) -> Result<BTreeSet<RecordId>, StoreError> {
        Ok(self.store.children(id)?.into_iter().collect())
    }

    /// True when making `candidate_parent` the parent of `id` would put `id`
    /// on its own parent chain.
    ///
    /// Chains longer than the configured depth limit count as cycles.
    pub fn would_cycle(&self, candidate_parent: RecordId, id: RecordId) -> Result<bool, StoreError> {
        let mut visited = HashSet::new();
        let mut current = Some(candidate_parent);
        while let Some(node) = current {
            if node == id {
                return Ok(true);
            }
            if !visited.insert(node) || visited.len() > self.max_depth {
                tracing::warn!(%candidate_parent, %id, "parent chain exceeds depth limit or loops");
                return Ok(true);
            }
            current = self.store.get(node)?.and_then(|r| r.fields.parent_item_id);
        }
        Ok(false)
    }

    /// Check a proposed parent for the record `id` (`None` while creating).
    pub fn check_parent(
        &self,
        id: Option<RecordId>,
        parent: Option<RecordId>,
    ) -> Result<ParentCheck, StoreError> {
        let Some(parent) = parent else {
            return Ok(ParentCheck::Ok);
        };
        if Some(parent) == id {
            return Ok(ParentCheck::Cycle);
        }
        if !self.store.exists(parent)? {
            return Ok(ParentCheck::Missing);
        }
        match id {
            // A record being created has no descendants yet.
            None => Ok(ParentCheck::Ok),
            Some(id) if self.would_cycle(parent, id)? => Ok(ParentCheck::Cycle),
            Some(_) => Ok(ParentCheck::Ok),
        }
    }

    /// Resolve every relation of `record`. Dangling references are reported as
    /// [`RelatedRecord::Absent`].
    pub fn related(&self, record: &ItemRecord) -> Result<Relations, StoreError> {
        let walk = self.walk_up(record)?;

        let parent = match record.fields.parent_item_id {
            None => None,
            Some(parent_id) => Some(match walk.found.first() {
                Some(p) => RelatedRecord::Present(p.summary()),
                None => RelatedRecord::Absent { id: parent_id },
            }),
        };

        let mut ancestors: Vec<RelatedRecord> = walk
            .dangling
            .map(|id| RelatedRecord::Absent { id })
            .into_iter()
            .collect();
        ancestors.extend(
            walk.found
                .iter()
                .rev()
                .map(|r| RelatedRecord::Present(r.summary())),
        );

        let children = self
            .children(record.id)?
            .into_iter()
            .map(|id| self.lookup(id))
            .collect::<Result<_, _>>()?;
        let dependencies = record
            .fields
            .dependencies
            .iter()
            .map(|id| self.lookup(*id))
            .collect::<Result<_, _>>()?;
        let linked_items = record
            .fields
            .linked_items
            .iter()
            .map(|id| self.lookup(*id))
            .collect::<Result<_, _>>()?;
        let dependents = self
            .store
            .dependents(record.id)?
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|id| self.lookup(id))
            .collect::<Result<_, _>>()?;

        Ok(Relations {
            parent,
            ancestors,
            children,
            dependencies,
            linked_items,
            dependents,
        })
    }

    fn lookup(&self, id: RecordId) -> Result<RelatedRecord, StoreError> {
        Ok(match self.store.get(id)? {
            Some(record) => RelatedRecord::Present(record.summary()),
            None => RelatedRecord::Absent { id },
        })
    }

    fn walk_up(&self, record: &ItemRecord) -> Result<ParentWalk, StoreError> {
        let mut found = Vec::new();
        let mut visited = HashSet::from([record.id]);
        let mut next = record.fields.parent_item_id;
        while let Some(id) = next {
            if !visited.insert(id) || found.len() >= self.max_depth {
                tracing::warn!(record = %record.id, "parent chain truncated");
                break;
            }
            match self.store.get(id)? {
                Some(parent) => {
                    next = parent.fields.parent_item_id;
                    found.push(parent);
                }
                None => {
                    return Ok(ParentWalk {
                        found,
                        dangling: Some(id),
                    })
                }
            }
        }
        Ok(ParentWalk {
            found,
            dangling: None,
        })
    }
}
