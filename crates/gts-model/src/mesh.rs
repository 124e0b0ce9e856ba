//! Mesh data structures shared by the reader and every writer.
//!
//! A [`MeshModel`] owns ordered nodes, elements and properties plus named
//! groups. Identifier lookups go through hash indexes built on insertion, so
//! iteration order always matches the order records were added.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::{Result, ValidationError};

/// A node in the finite element mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node ID (positive, unique within the model)
    pub id: u32,
    /// Coordinates [x, y, z]
    pub coords: [f64; 3],
}

/// Element topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// 2-node beam/truss
    Line2,
    /// 3-node triangle
    Tri3,
    /// 4-node quadrilateral
    Quad4,
    /// 4-node tetrahedron
    Tet4,
    /// 5-node pyramid
    Pyramid5,
    /// 6-node wedge (pentahedron)
    Wedge6,
    /// 8-node hexahedron
    Hex8,
}

impl ElementKind {
    pub const ALL: [ElementKind; 7] = [
        ElementKind::Line2,
        ElementKind::Tri3,
        ElementKind::Quad4,
        ElementKind::Tet4,
        ElementKind::Pyramid5,
        ElementKind::Wedge6,
        ElementKind::Hex8,
    ];

    /// Number of nodes in the connectivity of this kind
    pub fn num_nodes(self) -> usize {
        match self {
            ElementKind::Line2 => 2,
            ElementKind::Tri3 => 3,
            ElementKind::Quad4 => 4,
            ElementKind::Tet4 => 4,
            ElementKind::Pyramid5 => 5,
            ElementKind::Wedge6 => 6,
            ElementKind::Hex8 => 8,
        }
    }

    /// Topological dimension (1 = line, 2 = surface, 3 = volume)
    pub fn dimension(self) -> u8 {
        match self {
            ElementKind::Line2 => 1,
            ElementKind::Tri3 | ElementKind::Quad4 => 2,
            ElementKind::Tet4 | ElementKind::Pyramid5 | ElementKind::Wedge6 | ElementKind::Hex8 => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementKind::Line2 => "line2",
            ElementKind::Tri3 => "tri3",
            ElementKind::Quad4 => "quad4",
            ElementKind::Tet4 => "tet4",
            ElementKind::Pyramid5 => "pyramid5",
            ElementKind::Wedge6 => "wedge6",
            ElementKind::Hex8 => "hex8",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An element in the finite element mesh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Element ID (positive, unique within the model)
    pub id: u32,
    /// Topology
    pub kind: ElementKind,
    /// Node IDs in source order, length = `kind.num_nodes()`
    pub nodes: Vec<u32>,
    /// Property (material/section) reference
    pub property: Option<u32>,
}

impl Element {
    pub fn new(id: u32, kind: ElementKind, nodes: Vec<u32>) -> Self {
        Self {
            id,
            kind,
            nodes,
            property: None,
        }
    }

    pub fn with_property(mut self, property: u32) -> Self {
        self.property = Some(property);
        self
    }
}

/// A named property (material zone / section) declared by the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub id: u32,
    pub name: String,
}

/// A group member, tagged with the entity it refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Member {
    Node(u32),
    Element(u32),
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Node(id) => write!(f, "node {id}"),
            Member::Element(id) => write!(f, "element {id}"),
        }
    }
}

/// A named set of nodes and/or elements.
///
/// Members keep insertion order; inserting the same member twice is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    name: String,
    members: Vec<Member>,
    seen: HashSet<Member>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Add a member; returns false when it was already present.
    pub fn insert(&mut self, member: Member) -> bool {
        if !self.seen.insert(member) {
            return false;
        }
        self.members.push(member);
        true
    }

    pub fn contains(&self, member: Member) -> bool {
        self.seen.contains(&member)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.members.iter().filter_map(|m| match m {
            Member::Node(id) => Some(*id),
            Member::Element(_) => None,
        })
    }

    pub fn element_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.members.iter().filter_map(|m| match m {
            Member::Element(id) => Some(*id),
            Member::Node(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Normalized mesh: the reader's output and every writer's input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshModel {
    nodes: Vec<Node>,
    elements: Vec<Element>,
    properties: Vec<Property>,
    groups: Vec<Group>,
    node_index: HashMap<u32, usize>,
    element_index: HashMap<u32, usize>,
    property_index: HashMap<u32, usize>,
    group_index: HashMap<String, usize>,
}

impl MeshModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Rejects id 0, duplicates and non-finite coordinates.
    pub fn add_node(&mut self, id: u32, coords: [f64; 3]) -> Result<()> {
        if id == 0 {
            return Err(ValidationError::ZeroId { entity: "node" });
        }
        if let Some(&value) = coords.iter().find(|c| !c.is_finite()) {
            return Err(ValidationError::NonFiniteCoordinate { node: id, value });
        }
        if self.node_index.contains_key(&id) {
            return Err(ValidationError::DuplicateNode(id));
        }
        self.node_index.insert(id, self.nodes.len());
        self.nodes.push(Node { id, coords });
        Ok(())
    }

    /// Add an element. Node references are checked later by [`MeshModel::validate`]
    /// so elements may be added before the nodes they use.
    pub fn add_element(&mut self, element: Element) -> Result<()> {
        if element.id == 0 {
            return Err(ValidationError::ZeroId { entity: "element" });
        }
        let expected = element.kind.num_nodes();
        if element.nodes.len() != expected {
            return Err(ValidationError::NodeCount {
                element: element.id,
                kind: element.kind,
                expected,
                found: element.nodes.len(),
            });
        }
        if self.element_index.contains_key(&element.id) {
            return Err(ValidationError::DuplicateElement(element.id));
        }
        self.element_index.insert(element.id, self.elements.len());
        self.elements.push(element);
        Ok(())
    }

    pub fn add_property(&mut self, id: u32, name: impl Into<String>) -> Result<()> {
        if id == 0 {
            return Err(ValidationError::ZeroId { entity: "property" });
        }
        if self.property_index.contains_key(&id) {
            return Err(ValidationError::DuplicateProperty(id));
        }
        self.property_index.insert(id, self.properties.len());
        self.properties.push(Property {
            id,
            name: name.into(),
        });
        Ok(())
    }

    /// Create an empty group. Fails if the name is taken.
    pub fn add_group(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyGroupName);
        }
        if self.group_index.contains_key(&name) {
            return Err(ValidationError::DuplicateGroup(name));
        }
        self.group_index.insert(name.clone(), self.groups.len());
        self.groups.push(Group::new(name));
        Ok(())
    }

    /// Add a member to an existing group. Returns false for a repeated member.
    pub fn add_member(&mut self, group: &str, member: Member) -> Result<bool> {
        let idx = *self
            .group_index
            .get(group)
            .ok_or_else(|| ValidationError::UnknownGroup(group.to_string()))?;
        Ok(self.groups[idx].insert(member))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn node(&self, id: u32) -> Option<&Node> {
        self.node_index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn element(&self, id: u32) -> Option<&Element> {
        self.element_index.get(&id).map(|&i| &self.elements[i])
    }

    pub fn property(&self, id: u32) -> Option<&Property> {
        self.property_index.get(&id).map(|&i| &self.properties[i])
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.group_index.get(name).map(|&i| &self.groups[i])
    }

    pub fn contains(&self, member: Member) -> bool {
        match member {
            Member::Node(id) => self.node_index.contains_key(&id),
            Member::Element(id) => self.element_index.contains_key(&id),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Check every cross-reference invariant of the model.
    pub fn validate(&self) -> Result<()> {
        for element in &self.elements {
            let expected = element.kind.num_nodes();
            if element.nodes.len() != expected {
                return Err(ValidationError::NodeCount {
                    element: element.id,
                    kind: element.kind,
                    expected,
                    found: element.nodes.len(),
                });
            }
            if let Some(&node) = element
                .nodes
                .iter()
                .find(|n| !self.node_index.contains_key(n))
            {
                return Err(ValidationError::DanglingNode {
                    element: element.id,
                    node,
                });
            }
        }

        for group in &self.groups {
            if let Some(&member) = group.members().iter().find(|m| !self.contains(**m)) {
                return Err(ValidationError::DanglingMember {
                    group: group.name().to_string(),
                    member,
                });
            }
        }

        debug!(
            nodes = self.nodes.len(),
            elements = self.elements.len(),
            groups = self.groups.len(),
            "mesh model validated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_tet() -> MeshModel {
        let mut model = MeshModel::new();
        model.add_node(1, [0.0, 0.0, 0.0]).unwrap();
        model.add_node(2, [1.0, 0.0, 0.0]).unwrap();
        model.add_node(3, [0.0, 1.0, 0.0]).unwrap();
        model.add_node(4, [0.0, 0.0, 1.0]).unwrap();
        model
            .add_element(Element::new(10, ElementKind::Tet4, vec![1, 2, 3, 4]))
            .unwrap();
        model
    }

    #[test]
    fn node_counts_per_kind() {
        assert_eq!(ElementKind::Line2.num_nodes(), 2);
        assert_eq!(ElementKind::Pyramid5.num_nodes(), 5);
        assert_eq!(ElementKind::Hex8.num_nodes(), 8);
        assert_eq!(ElementKind::Quad4.dimension(), 2);
        assert_eq!(ElementKind::Wedge6.dimension(), 3);
    }

    #[test]
    fn rejects_duplicate_and_zero_ids() {
        let mut model = unit_tet();
        assert_eq!(
            model.add_node(2, [5.0, 5.0, 5.0]),
            Err(ValidationError::DuplicateNode(2))
        );
        assert_eq!(
            model.add_element(Element::new(10, ElementKind::Tet4, vec![1, 2, 3, 4])),
            Err(ValidationError::DuplicateElement(10))
        );
        assert!(matches!(
            model.add_node(0, [0.0; 3]),
            Err(ValidationError::ZeroId { entity: "node" })
        ));
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        let mut model = MeshModel::new();
        let err = model.add_node(7, [0.0, f64::NAN, 0.0]).unwrap_err();
        assert!(matches!(err, ValidationError::NonFiniteCoordinate { node: 7, .. }));
        assert_eq!(model.node_count(), 0);
    }

    #[test]
    fn rejects_wrong_node_count() {
        let mut model = MeshModel::new();
        let err = model
            .add_element(Element::new(1, ElementKind::Hex8, vec![1, 2, 3, 4]))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::NodeCount {
                element: 1,
                kind: ElementKind::Hex8,
                expected: 8,
                found: 4,
            }
        );
    }

    #[test]
    fn validate_reports_dangling_node() {
        let mut model = unit_tet();
        model
            .add_element(Element::new(11, ElementKind::Tri3, vec![1, 2, 99]))
            .unwrap();
        assert_eq!(
            model.validate(),
            Err(ValidationError::DanglingNode {
                element: 11,
                node: 99
            })
        );
    }

    #[test]
    fn group_members_keep_insertion_order_and_dedupe() {
        let mut model = unit_tet();
        model.add_group("Fixed").unwrap();
        assert!(model.add_member("Fixed", Member::Node(3)).unwrap());
        assert!(model.add_member("Fixed", Member::Node(1)).unwrap());
        assert!(model.add_member("Fixed", Member::Element(10)).unwrap());
        assert!(!model.add_member("Fixed", Member::Node(3)).unwrap());

        let group = model.group("Fixed").unwrap();
        assert_eq!(
            group.members(),
            &[Member::Node(3), Member::Node(1), Member::Element(10)]
        );
        assert_eq!(group.node_ids().collect::<Vec<_>>(), vec![3, 1]);
        assert_eq!(group.element_ids().collect::<Vec<_>>(), vec![10]);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn validate_reports_dangling_member() {
        let mut model = unit_tet();
        model.add_group("Load").unwrap();
        model.add_member("Load", Member::Element(42)).unwrap();
        assert_eq!(
            model.validate(),
            Err(ValidationError::DanglingMember {
                group: "Load".to_string(),
                member: Member::Element(42)
            })
        );
    }

    #[test]
    fn duplicate_group_and_unknown_group() {
        let mut model = MeshModel::new();
        model.add_group("A").unwrap();
        assert_eq!(
            model.add_group("A"),
            Err(ValidationError::DuplicateGroup("A".to_string()))
        );
        assert_eq!(
            model.add_member("B", Member::Node(1)),
            Err(ValidationError::UnknownGroup("B".to_string()))
        );
        assert_eq!(model.add_group("  "), Err(ValidationError::EmptyGroupName));
    }

    #[test]
    fn lookups_follow_insertion_order() {
        let mut model = unit_tet();
        model.add_property(3, "Rock").unwrap();
        assert_eq!(model.node(3).unwrap().coords, [0.0, 1.0, 0.0]);
        assert_eq!(model.element(10).unwrap().kind, ElementKind::Tet4);
        assert_eq!(model.property(3).unwrap().name, "Rock");
        assert!(model.property(4).is_none());
        let ids: Vec<u32> = model.nodes().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }
}
