//! Counts and extents extracted from a mesh model.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::mesh::{ElementKind, MeshModel};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub name: String,
    pub nodes: usize,
    pub elements: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshSummary {
    pub node_count: usize,
    pub element_count: usize,
    pub elements_by_kind: BTreeMap<ElementKind, usize>,
    pub property_count: usize,
    pub groups: Vec<GroupSummary>,
    /// Axis-aligned bounds as (min, max); `None` for a model without nodes
    pub bounds: Option<([f64; 3], [f64; 3])>,
}

impl MeshSummary {
    pub fn from_model(model: &MeshModel) -> Self {
        let mut elements_by_kind = BTreeMap::<ElementKind, usize>::new();
        for element in model.elements() {
            *elements_by_kind.entry(element.kind).or_insert(0) += 1;
        }

        let groups = model
            .groups()
            .iter()
            .map(|g| GroupSummary {
                name: g.name().to_string(),
                nodes: g.node_ids().count(),
                elements: g.element_ids().count(),
            })
            .collect();

        let bounds = model.nodes().iter().fold(None, |acc, node| {
            let (mut lo, mut hi) = acc.unwrap_or((node.coords, node.coords));
            for axis in 0..3 {
                lo[axis] = lo[axis].min(node.coords[axis]);
                hi[axis] = hi[axis].max(node.coords[axis]);
            }
            Some((lo, hi))
        });

        Self {
            node_count: model.node_count(),
            element_count: model.element_count(),
            elements_by_kind,
            property_count: model.properties().len(),
            groups,
            bounds,
        }
    }

    /// Highest element dimension present in the model.
    pub fn primary_dimension(&self) -> Option<u8> {
        self.elements_by_kind.keys().map(|k| k.dimension()).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Element, Member};

    #[test]
    fn summarizes_kinds_groups_and_bounds() {
        let mut model = MeshModel::new();
        model.add_node(1, [0.0, 0.0, 0.0]).unwrap();
        model.add_node(2, [2.0, 0.0, -1.0]).unwrap();
        model.add_node(3, [0.0, 3.0, 0.0]).unwrap();
        model.add_node(4, [0.0, 0.0, 4.0]).unwrap();
        model
            .add_element(Element::new(1, ElementKind::Tet4, vec![1, 2, 3, 4]))
            .unwrap();
        model
            .add_element(Element::new(2, ElementKind::Tri3, vec![1, 2, 3]))
            .unwrap();
        model
            .add_element(Element::new(3, ElementKind::Tri3, vec![1, 3, 4]))
            .unwrap();
        model.add_group("Fixed").unwrap();
        model.add_member("Fixed", Member::Node(1)).unwrap();
        model.add_member("Fixed", Member::Element(2)).unwrap();

        let s = MeshSummary::from_model(&model);
        assert_eq!(s.node_count, 4);
        assert_eq!(s.element_count, 3);
        assert_eq!(s.elements_by_kind[&ElementKind::Tri3], 2);
        assert_eq!(s.elements_by_kind[&ElementKind::Tet4], 1);
        assert_eq!(s.primary_dimension(), Some(3));
        assert_eq!(
            s.groups,
            vec![GroupSummary {
                name: "Fixed".to_string(),
                nodes: 1,
                elements: 1
            }]
        );
        assert_eq!(s.bounds, Some(([0.0, 0.0, -1.0], [2.0, 3.0, 4.0])));
    }

    #[test]
    fn empty_model_has_no_bounds() {
        let s = MeshSummary::from_model(&MeshModel::new());
        assert_eq!(s.bounds, None);
        assert_eq!(s.primary_dimension(), None);
    }
}
