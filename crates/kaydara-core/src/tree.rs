//! The generic FBX node tree.
//!
//! Both front ends (binary and text) build the same shape:
//!
//! ```text
//! FbxTree
//! ├── FBXHeaderExtension        (Single)
//! ├── GlobalSettings            (Single, Properties70 flattened into attributes)
//! ├── Objects                   (Single)
//! │   ├── Geometry              (IndexedById: id -> Node)
//! │   ├── Model                 (IndexedById)
//! │   └── ...
//! └── Connections               (Single)
//!     └── C                     (List)
//! ```
//!
//! A child name that recurs becomes an id-keyed map when the children carry
//! numeric ids and a plain list otherwise.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::property::{Attribute, Property};

/// Node identifier. The format allows integers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeId {
    Int(i64),
    Name(String),
}

impl NodeId {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            NodeId::Int(id) => Some(*id),
            NodeId::Name(_) => None,
        }
    }
}

/// One entry of the generic tree.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    pub name: String,
    pub id: Option<NodeId>,
    pub attr_name: Option<String>,
    pub attr_type: Option<String>,
    pub properties: Vec<Property>,
    /// `Properties70` records, keyed by their name.
    pub attributes: IndexMap<String, Attribute>,
    pub children: NodeMap,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn numeric_id(&self) -> Option<i64> {
        self.id.as_ref().and_then(NodeId::as_int)
    }

    /// Attach a parsed child node.
    ///
    /// `Properties70` blocks are not stored as children: their `P` records
    /// become attributes of the node that owns the block.
    pub fn add_child(&mut self, child: Node) {
        if child.name == "Properties70" {
            self.attributes.extend(child.attributes);
        } else if self.name == "Properties70" && child.name == "P" {
            if let Some(attribute) = Attribute::from_properties(&child.properties) {
                self.attributes.insert(attribute.name.clone(), attribute);
            }
        } else {
            self.children.insert(child);
        }
    }

    /// First child with the given name.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.first(name)
    }

    /// All children with the given name.
    pub fn children_named(&self, name: &str) -> Nodes<'_> {
        self.children.all(name)
    }

    /// Child with the given name and numeric id.
    pub fn child_by_id(&self, name: &str, id: i64) -> Option<&Node> {
        self.children.by_id(name, id)
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.children.contains(name)
    }

    /// First property of a leaf child (`Name: value`).
    pub fn value(&self, name: &str) -> Option<&Property> {
        self.child(name)?.properties.first()
    }

    pub fn value_f64(&self, name: &str) -> Option<f64> {
        self.value(name)?.as_f64()
    }

    pub fn value_i64(&self, name: &str) -> Option<i64> {
        self.value(name)?.as_i64()
    }

    pub fn value_str(&self, name: &str) -> Option<&str> {
        self.value(name)?.as_str()
    }

    /// Numeric array stored in a child (`Vertices: *12 { a: ... }`).
    pub fn array_f64(&self, name: &str) -> Option<Vec<f64>> {
        self.value(name)?.to_f64_vec()
    }

    pub fn array_i64(&self, name: &str) -> Option<Vec<i64>> {
        self.value(name)?.to_i64_vec()
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn attr_f64(&self, name: &str) -> Option<f64> {
        self.attribute(name)?.as_f64()
    }

    pub fn attr_vec3(&self, name: &str) -> Option<[f64; 3]> {
        self.attribute(name)?.as_vec3()
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attribute(name)?.as_str()
    }
}

/// Children sharing one name.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeChildren {
    Single(Box<Node>),
    IndexedById(IndexMap<i64, Node>),
    List(Vec<Node>),
}

impl NodeChildren {
    pub fn first(&self) -> Option<&Node> {
        match self {
            NodeChildren::Single(node) => Some(node.as_ref()),
            NodeChildren::IndexedById(map) => map.values().next(),
            NodeChildren::List(list) => list.first(),
        }
    }

    pub fn get(&self, id: i64) -> Option<&Node> {
        match self {
            NodeChildren::IndexedById(map) => map.get(&id),
            NodeChildren::Single(node) => (node.numeric_id() == Some(id)).then_some(&**node),
            NodeChildren::List(list) => list.iter().find(|n| n.numeric_id() == Some(id)),
        }
    }

    pub fn iter(&self) -> Nodes<'_> {
        let inner = match self {
            NodeChildren::Single(node) => NodesInner::One(Some(node.as_ref())),
            NodeChildren::IndexedById(map) => NodesInner::Map(map.values()),
            NodeChildren::List(list) => NodesInner::List(list.iter()),
        };
        Nodes { inner }
    }

    pub fn len(&self) -> usize {
        match self {
            NodeChildren::Single(_) => 1,
            NodeChildren::IndexedById(map) => map.len(),
            NodeChildren::List(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Iterator over the nodes of one child slot.
pub struct Nodes<'a> {
    inner: NodesInner<'a>,
}

enum NodesInner<'a> {
    Empty,
    One(Option<&'a Node>),
    Map(indexmap::map::Values<'a, i64, Node>),
    List(std::slice::Iter<'a, Node>),
}

impl<'a> Nodes<'a> {
    pub fn empty() -> Self {
        Self {
            inner: NodesInner::Empty,
        }
    }
}

impl<'a> Iterator for Nodes<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            NodesInner::Empty => None,
            NodesInner::One(node) => node.take(),
            NodesInner::Map(values) => values.next(),
            NodesInner::List(iter) => iter.next(),
        }
    }
}

/// Name-keyed child slots, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeMap {
    entries: IndexMap<String, NodeChildren>,
}

impl NodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node under its name.
    ///
    /// Nodes with a numeric id go into an id-keyed map (the first node seen
    /// for an id wins); anything else turns a repeated name into a list.
    pub fn insert(&mut self, node: Node) {
        let key = node.numeric_id();
        if !self.entries.contains_key(&node.name) {
            let name = node.name.clone();
            let slot = match key {
                Some(id) => NodeChildren::IndexedById(IndexMap::from([(id, node)])),
                None => NodeChildren::Single(Box::new(node)),
            };
            self.entries.insert(name, slot);
            return;
        }

        let Some(slot) = self.entries.get_mut(&node.name) else {
            return;
        };
        match slot {
            NodeChildren::IndexedById(map) => match key {
                Some(id) => {
                    map.entry(id).or_insert(node);
                }
                None => {
                    let mut list: Vec<Node> = std::mem::take(map).into_values().collect();
                    list.push(node);
                    *slot = NodeChildren::List(list);
                }
            },
            NodeChildren::Single(_) => {
                if let NodeChildren::Single(first) =
                    std::mem::replace(slot, NodeChildren::List(Vec::new()))
                {
                    *slot = NodeChildren::List(vec![*first, node]);
                }
            }
            NodeChildren::List(list) => list.push(node),
        }
    }

    pub fn get(&self, name: &str) -> Option<&NodeChildren> {
        self.entries.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<NodeChildren> {
        self.entries.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn first(&self, name: &str) -> Option<&Node> {
        self.get(name)?.first()
    }

    pub fn all(&self, name: &str) -> Nodes<'_> {
        self.get(name).map_or_else(Nodes::empty, NodeChildren::iter)
    }

    pub fn by_id(&self, name: &str, id: i64) -> Option<&Node> {
        self.get(name)?.get(id)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Every node of every slot, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.entries.values().flat_map(NodeChildren::iter)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which front end produced a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SourceFormat {
    Binary,
    Ascii,
}

/// Root of a decoded document.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FbxTree {
    pub version: u32,
    pub format: SourceFormat,
    pub nodes: NodeMap,
}

impl FbxTree {
    pub fn new(version: u32, format: SourceFormat) -> Self {
        Self {
            version,
            format,
            nodes: NodeMap::new(),
        }
    }

    /// Add a top-level node.
    pub fn add(&mut self, node: Node) {
        self.nodes.insert(node);
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.nodes.first(name)
    }

    pub fn objects(&self) -> Option<&Node> {
        self.get("Objects")
    }

    /// All `Objects` children of one kind (`Model`, `Geometry`, ...).
    pub fn objects_of(&self, kind: &str) -> Nodes<'_> {
        self.objects()
            .map_or_else(Nodes::empty, |objects| objects.children_named(kind))
    }

    /// The `Objects` child of one kind with the given id.
    pub fn object(&self, kind: &str, id: i64) -> Option<&Node> {
        self.objects()?.child_by_id(kind, id)
    }

    /// Every node name in the tree, at any depth.
    pub fn node_names(&self) -> BTreeSet<String> {
        fn collect(node: &Node, names: &mut BTreeSet<String>) {
            names.insert(node.name.clone());
            for child in node.children.iter() {
                collect(child, names);
            }
        }

        let mut names = BTreeSet::new();
        for node in self.nodes.iter() {
            collect(node, &mut names);
        }
        names
    }
}
