//! Location hierarchy
//!
//! Locations nest (a flat inside a carrier inside a box, a track inside a
//! yard). The tree is built in two passes: every node first, then parent
//! links, so forward references never matter. A link that points at a
//! missing node, or that would close a cycle, is rejected and reported.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Location types offered before any are read from the database
pub const DEFAULT_LOCATION_TYPES: [&str; 6] =
    ["bag", "carrier", "flat", "staging_track", "yard_track", "box"];

/// A parent link that was not accepted into the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeIssue {
    /// `parent_id` names a location that does not exist
    DanglingParent { id: i64, parent_id: i64 },
    /// Linking `id` under `parent_id` would make `id` its own ancestor
    Cycle { id: i64, parent_id: i64 },
}

#[derive(Debug, Clone, Default)]
pub struct LocationTree {
    parents: BTreeMap<i64, Option<i64>>,
    children: BTreeMap<i64, BTreeSet<i64>>,
}

impl LocationTree {
    /// Build the tree from `(id, parent_id)` pairs
    ///
    /// Links are considered in ascending id order, so the same input always
    /// yields the same tree and the same issues.
    pub fn build<I>(pairs: I) -> (Self, Vec<TreeIssue>)
    where
        I: IntoIterator<Item = (i64, Option<i64>)>,
    {
        let requested: BTreeMap<i64, Option<i64>> = pairs.into_iter().collect();

        // Pass 1: nodes
        let mut tree = LocationTree {
            parents: requested.keys().map(|id| (*id, None)).collect(),
            children: BTreeMap::new(),
        };

        // Pass 2: links
        let mut issues = Vec::new();
        for (&id, &parent) in &requested {
            let Some(parent_id) = parent else { continue };

            if !tree.parents.contains_key(&parent_id) {
                issues.push(TreeIssue::DanglingParent { id, parent_id });
                continue;
            }
            if parent_id == id || tree.ancestors(parent_id).contains(&id) {
                issues.push(TreeIssue::Cycle { id, parent_id });
                continue;
            }

            tree.parents.insert(id, Some(parent_id));
            tree.children.entry(parent_id).or_default().insert(id);
        }

        (tree, issues)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.parents.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn parent_of(&self, id: i64) -> Option<i64> {
        self.parents.get(&id).copied().flatten()
    }

    pub fn children_of(&self, id: i64) -> impl Iterator<Item = i64> + '_ {
        self.children.get(&id).into_iter().flatten().copied()
    }

    /// Ancestors nearest first. Finite: accepted links never form a cycle.
    pub fn ancestors(&self, id: i64) -> Vec<i64> {
        let mut chain = Vec::new();
        let mut current = self.parent_of(id);
        while let Some(parent) = current {
            chain.push(parent);
            current = self.parent_of(parent);
        }
        chain
    }

    /// Topmost ancestor, or `id` itself for a root
    pub fn root_of(&self, id: i64) -> i64 {
        self.ancestors(id).last().copied().unwrap_or(id)
    }

    /// Every location nested under `id`, at any depth
    pub fn descendants(&self, id: i64) -> BTreeSet<i64> {
        let mut found = BTreeSet::new();
        let mut queue: VecDeque<i64> = self.children_of(id).collect();
        while let Some(current) = queue.pop_front() {
            if found.insert(current) {
                queue.extend(self.children_of(current));
            }
        }
        found
    }

    /// Accepted `(child, parent)` links in child id order
    pub fn links(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.parents
            .iter()
            .filter_map(|(&id, &parent)| parent.map(|p| (id, p)))
    }
}

/// Guess a location type from a free-form location name
pub fn infer_location_type(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    if name.contains("-F") {
        "flat"
    } else if lower.contains("staging") || lower.contains(" st") {
        "staging_track"
    } else if lower.contains("yard") || lower.contains(" yd") {
        "yard_track"
    } else if lower.contains("carrier") {
        "carrier"
    } else {
        "bag"
    }
}
