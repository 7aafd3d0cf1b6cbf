//! Object graph resolution.
//!
//! The `Connections` section is a flat list of records:
//!
//! ```text
//! C: "OO", 4001, 3000              ; geometry 4001 is a child of model 3000
//! C: "OP", 5001, 6000, "DiffuseColor"
//! ```
//!
//! `ConnectionMap` turns them into a symmetric adjacency map: every record
//! inserts a parent link on the source id and a child link on the target id.

use indexmap::IndexMap;
use log::warn;

use crate::tree::FbxTree;

/// One end of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Link {
    pub id: i64,
    /// Relationship label of `OP` records (`"DiffuseColor"`, `"d|X"`, ...).
    pub relationship: Option<String>,
}

/// Parents and children of one object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Relationships {
    pub parents: Vec<Link>,
    pub children: Vec<Link>,
}

/// Bidirectional connection map keyed by object id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectionMap {
    map: IndexMap<i64, Relationships>,
}

impl ConnectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the `Connections` section of a tree.
    ///
    /// A tree without one yields an empty map.
    pub fn from_tree(tree: &FbxTree) -> Self {
        let mut connections = Self::new();
        let Some(section) = tree.get("Connections") else {
            return connections;
        };

        for record in section.children_named("C") {
            let props = &record.properties;
            let from = props.get(1).and_then(|p| p.as_i64());
            let to = props.get(2).and_then(|p| p.as_i64());
            let (Some(from), Some(to)) = (from, to) else {
                warn!("Skipping malformed connection record {:?}", props);
                continue;
            };
            let relationship = props
                .get(3)
                .and_then(|p| p.as_str())
                .map(str::to_string);
            connections.connect(from, to, relationship);
        }

        connections
    }

    /// Record `from` as a child of `to`.
    pub fn connect(&mut self, from: i64, to: i64, relationship: Option<String>) {
        self.map.entry(from).or_default().parents.push(Link {
            id: to,
            relationship: relationship.clone(),
        });
        self.map.entry(to).or_default().children.push(Link {
            id: from,
            relationship,
        });
    }

    pub fn get(&self, id: i64) -> Option<&Relationships> {
        self.map.get(&id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.map.contains_key(&id)
    }

    /// Parent links of an object, empty when it has none.
    pub fn parents(&self, id: i64) -> &[Link] {
        self.map.get(&id).map(|r| r.parents.as_slice()).unwrap_or_default()
    }

    /// Child links of an object, empty when it has none.
    pub fn children(&self, id: i64) -> &[Link] {
        self.map.get(&id).map(|r| r.children.as_slice()).unwrap_or_default()
    }

    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.map.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
