//! Pieces shared by the three format writers.

use std::io::{self, Write};

use chrono::Utc;
use gts_model::{ElementKind, MeshModel, Node, ProgressTracker};

use crate::error::{OptionError, Result, WriteError};
use crate::options::{CommonOptions, TargetFormat};

/// A target-format writer bound to one model and one option set.
///
/// Construction validates the model and builds the renumbering tables;
/// [`write_to`](MeshWriter::write_to) only streams text.
pub trait MeshWriter {
    fn format(&self) -> TargetFormat;

    /// Units of progress the writer will report: one per node, element and
    /// group member.
    fn work_units(&self) -> u64;

    fn write_to(&self, out: &mut dyn Write, progress: &mut ProgressTracker<'_>) -> Result<()>;
}

pub(crate) fn work_units(model: &MeshModel) -> u64 {
    let members: usize = model.groups().iter().map(|g| g.len()).sum();
    (model.node_count() + model.element_count() + members) as u64
}

/// Node coordinates in the target frame; fails if scaling overflows.
pub(crate) fn target_coords(node: &Node, common: &CommonOptions) -> Result<[f64; 3]> {
    let coords = common.transform(node.coords);
    if coords.iter().any(|c| !c.is_finite()) {
        return Err(OptionError::OutOfRange {
            key: "scale_factor",
            message: format!(
                "node {} leaves the floating-point range when scaled by {}",
                node.id, common.scale_factor
            ),
        }
        .into());
    }
    Ok(coords)
}

/// Body of the optional metadata comment block, one entry per line, without
/// the format's comment marker.
pub(crate) fn metadata_lines(
    model: &MeshModel,
    common: &CommonOptions,
    format: TargetFormat,
) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Exported by gts-export {} ({format})",
            env!("CARGO_PKG_VERSION")
        ),
        format!("Created {}", Utc::now().format("%Y-%m-%dT%H:%M:%SZ")),
        format!(
            "Nodes: {}  Elements: {}  Groups: {}",
            model.node_count(),
            model.element_count(),
            model.groups().len()
        ),
    ];
    if let Some(unit) = common.length_unit {
        lines.push(format!("Length unit: {}", unit.name()));
    }
    if common.scale_factor != 1.0 {
        lines.push(format!("Scale factor: {}", common.scale_factor));
    }
    lines.push(format!("Coordinates: {}", common.coordinates.name()));
    lines
}

/// Write `ids` as rows of at most `per_row` entries joined by `separator`.
pub(crate) fn write_id_rows(
    out: &mut dyn Write,
    ids: &[u32],
    per_row: usize,
    indent: &str,
    separator: &str,
) -> io::Result<()> {
    for row in ids.chunks(per_row) {
        let row: Vec<String> = row.iter().map(u32::to_string).collect();
        writeln!(out, "{indent}{}", row.join(separator))?;
    }
    Ok(())
}

pub(crate) fn unsupported(format: TargetFormat, element: u32, kind: ElementKind) -> WriteError {
    WriteError::Unsupported {
        format,
        what: format!("{} element {element}", kind.name()),
    }
}

/// Reorder `nodes` by `permutation` (target slot → source index).
pub(crate) fn permute(nodes: &[u32], permutation: &[usize]) -> Result<Vec<u32>> {
    permutation
        .iter()
        .map(|&i| {
            nodes.get(i).copied().ok_or_else(|| {
                WriteError::Invariant(format!(
                    "node order table references slot {i} of a {}-node element",
                    nodes.len()
                ))
            })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use gts_model::{Element, ElementKind, Member, MeshModel};

    /// Unit cube hex with a pyramid cap, two shells on the base and a beam
    /// strut. Node ids start at 101 so renumbering is visible.
    pub fn mixed_model() -> MeshModel {
        let mut model = MeshModel::new();
        let coords = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
            [0.5, 0.5, 1.5],
        ];
        for (i, c) in coords.into_iter().enumerate() {
            model.add_node(101 + i as u32, c).unwrap();
        }
        model.add_property(1, "Rock").unwrap();
        model.add_property(2, "Cap").unwrap();
        model.add_property(3, "Lining").unwrap();
        let elements = [
            Element::new(1, ElementKind::Hex8, (101..=108).collect()).with_property(1),
            Element::new(2, ElementKind::Pyramid5, vec![105, 106, 107, 108, 109]).with_property(2),
            Element::new(3, ElementKind::Tri3, vec![101, 102, 103]).with_property(3),
            Element::new(4, ElementKind::Quad4, vec![101, 102, 103, 104]).with_property(3),
            Element::new(5, ElementKind::Line2, vec![101, 105]),
        ];
        for element in elements {
            model.add_element(element).unwrap();
        }
        model.add_group("Base").unwrap();
        for id in 101..=104 {
            model.add_member("Base", Member::Node(id)).unwrap();
        }
        model.add_group("Solids").unwrap();
        model.add_member("Solids", Member::Element(1)).unwrap();
        model.add_member("Solids", Member::Element(2)).unwrap();
        model.add_group("Struts").unwrap();
        model.add_member("Struts", Member::Element(5)).unwrap();
        model.validate().unwrap();
        model
    }

    /// Same model without the beam.
    pub fn solid_model() -> MeshModel {
        let source = mixed_model();
        let mut model = MeshModel::new();
        for node in source.nodes() {
            model.add_node(node.id, node.coords).unwrap();
        }
        for property in source.properties() {
            model.add_property(property.id, property.name.clone()).unwrap();
        }
        for element in source.elements().iter().filter(|e| e.kind != ElementKind::Line2) {
            model.add_element(element.clone()).unwrap();
        }
        for group in source.groups().iter().filter(|g| g.name() != "Struts") {
            model.add_group(group.name()).unwrap();
            for member in group.members() {
                model.add_member(group.name(), *member).unwrap();
            }
        }
        model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::LengthUnit;

    #[test]
    fn rows_wrap_at_the_limit() {
        let mut buf = Vec::new();
        write_id_rows(&mut buf, &[1, 2, 3, 4, 5], 2, "  ", ", ").unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "  1, 2\n  3, 4\n  5\n");
    }

    #[test]
    fn metadata_mentions_counts_and_unit() {
        let mut model = MeshModel::new();
        model.add_node(1, [0.0; 3]).unwrap();
        let common = CommonOptions {
            length_unit: Some(LengthUnit::Mm),
            ..CommonOptions::default()
        };
        let lines = metadata_lines(&model, &common, TargetFormat::Abaqus);
        assert!(lines[0].contains("Abaqus"));
        assert!(lines.iter().any(|l| l == "Nodes: 1  Elements: 0  Groups: 0"));
        assert!(lines.iter().any(|l| l == "Length unit: mm"));
    }

    #[test]
    fn overflowing_scale_is_an_option_error() {
        let node = Node {
            id: 7,
            coords: [1.0e300, 0.0, 0.0],
        };
        let common = CommonOptions {
            scale_factor: 1.0e10,
            ..CommonOptions::default()
        };
        let err = target_coords(&node, &common).unwrap_err();
        assert!(matches!(
            err,
            WriteError::Option(OptionError::OutOfRange { key: "scale_factor", .. })
        ));
    }

    #[test]
    fn permutation_out_of_bounds_is_an_invariant_violation() {
        assert_eq!(permute(&[10, 20, 30], &[2, 0, 1]).unwrap(), vec![30, 10, 20]);
        assert!(matches!(permute(&[1, 2], &[0, 3]), Err(WriteError::Invariant(_))));
    }
}
