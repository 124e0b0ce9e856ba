//! Abaqus input deck writer (`.inp`).

use std::collections::HashSet;
use std::io::Write;

use gts_model::{ElementKind, MeshModel, ProgressTracker};
use tracing::debug;

use crate::error::{Result, WriteError};
use crate::numeric::format_real;
use crate::options::{AbaqusOptions, TargetFormat};
use crate::renumber::{IdPolicy, Renumbering};
use crate::writer::{self, MeshWriter};

/// Abaqus element type for one mesh kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbaqusType {
    pub full: &'static str,
    pub reduced: &'static str,
    /// Target slot → source node index
    pub order: &'static [usize],
}

impl AbaqusType {
    pub fn name(&self, reduced_integration: bool) -> &'static str {
        if reduced_integration { self.reduced } else { self.full }
    }
}

const IDENTITY: &[usize] = &[0, 1, 2, 3, 4, 5, 6, 7];

/// Every mesh kind has an Abaqus counterpart. Pyramids are written as
/// collapsed bricks.
pub fn element_type(kind: ElementKind) -> AbaqusType {
    match kind {
        ElementKind::Line2 => AbaqusType {
            full: "B31",
            reduced: "B31",
            order: &IDENTITY[..2],
        },
        ElementKind::Tri3 => AbaqusType {
            full: "S3",
            reduced: "S3R",
            order: &IDENTITY[..3],
        },
        ElementKind::Quad4 => AbaqusType {
            full: "S4",
            reduced: "S4R",
            order: &IDENTITY[..4],
        },
        ElementKind::Tet4 => AbaqusType {
            full: "C3D4",
            reduced: "C3D4",
            order: &IDENTITY[..4],
        },
        ElementKind::Pyramid5 => AbaqusType {
            full: "C3D8",
            reduced: "C3D8R",
            order: &[0, 1, 2, 3, 4, 4, 4, 4],
        },
        ElementKind::Wedge6 => AbaqusType {
            full: "C3D6",
            reduced: "C3D6",
            order: &IDENTITY[..6],
        },
        ElementKind::Hex8 => AbaqusType {
            full: "C3D8",
            reduced: "C3D8R",
            order: IDENTITY,
        },
    }
}

const IDS_PER_ROW: usize = 16;
/// Abaqus labels are signed 32-bit.
const MAX_LABEL: u32 = i32::MAX as u32;

/// Quote a set name unless it is a plain Abaqus identifier.
pub fn set_name(name: &str) -> String {
    let mut chars = name.chars();
    let plain = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "'"))
    }
}

pub struct AbaqusWriter<'a> {
    model: &'a MeshModel,
    options: &'a AbaqusOptions,
    nodes: Renumbering,
    elements: Renumbering,
}

impl<'a> AbaqusWriter<'a> {
    pub fn new(model: &'a MeshModel, options: &'a AbaqusOptions) -> Result<Self> {
        model.validate()?;
        let too_large = model
            .nodes()
            .iter()
            .map(|n| ("node", n.id))
            .chain(model.elements().iter().map(|e| ("element", e.id)))
            .find(|(_, id)| *id > MAX_LABEL);
        if let Some((entity, id)) = too_large {
            return Err(WriteError::Unsupported {
                format: TargetFormat::Abaqus,
                what: format!("{entity} id {id} (labels are limited to {MAX_LABEL})"),
            });
        }

        let nodes = Renumbering::build("node", IdPolicy::Preserve, model.nodes().iter().map(|n| n.id));
        let elements = Renumbering::build(
            "element",
            IdPolicy::Preserve,
            model.elements().iter().map(|e| e.id),
        );
        Ok(Self {
            model,
            options,
            nodes,
            elements,
        })
    }

    fn write_heading(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "*HEADING")?;
        match &self.options.heading {
            Some(heading) => writeln!(out, "{heading}")?,
            None => writeln!(out, "Mesh exported from Midas GTS")?,
        }
        if self.options.common.emit_metadata {
            for line in writer::metadata_lines(self.model, &self.options.common, TargetFormat::Abaqus) {
                writeln!(out, "** {line}")?;
            }
        }
        Ok(())
    }

    fn write_nodes(&self, out: &mut dyn Write, progress: &mut ProgressTracker<'_>) -> Result<()> {
        progress.stage("Writing nodes")?;
        let precision = self.options.precision();
        writeln!(out, "*NODE, NSET=NALL")?;
        for node in self.model.nodes() {
            let [x, y, z] = writer::target_coords(node, &self.options.common)?;
            writeln!(
                out,
                "{}, {}, {}, {}",
                self.nodes.get(node.id)?,
                format_real(x, precision),
                format_real(y, precision),
                format_real(z, precision)
            )?;
            progress.advance(1)?;
        }
        Ok(())
    }

    fn write_elements(&self, out: &mut dyn Write, progress: &mut ProgressTracker<'_>) -> Result<()> {
        progress.stage("Writing elements")?;
        let reduced = self.options.reduced_integration;

        // One block per Abaqus type, in order of first appearance.
        let mut blocks: Vec<&'static str> = Vec::new();
        for element in self.model.elements() {
            let name = element_type(element.kind).name(reduced);
            if !blocks.contains(&name) {
                blocks.push(name);
            }
        }
        debug!(blocks = ?blocks, "Abaqus element blocks");

        for block in blocks {
            writeln!(out, "*ELEMENT, TYPE={block}, ELSET=EALL")?;
            for element in self.model.elements() {
                let abaqus = element_type(element.kind);
                if abaqus.name(reduced) != block {
                    continue;
                }
                let mut line = self.elements.get(element.id)?.to_string();
                for node in writer::permute(&element.nodes, abaqus.order)? {
                    line.push_str(", ");
                    line.push_str(&self.nodes.get(node)?.to_string());
                }
                writeln!(out, "{line}")?;
                progress.advance(1)?;
            }
        }
        Ok(())
    }

    fn write_set(&self, out: &mut dyn Write, keyword: &str, name: &str, ids: &[u32]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        writeln!(out, "*{keyword}, {keyword}={}", set_name(name))?;
        writer::write_id_rows(out, ids, IDS_PER_ROW, "", ", ")?;
        Ok(())
    }

    fn write_sets(&self, out: &mut dyn Write, progress: &mut ProgressTracker<'_>) -> Result<()> {
        if self.model.groups().is_empty() && !self.options.property_sets {
            return Ok(());
        }
        progress.stage("Writing sets")?;
        for group in self.model.groups() {
            let nodes = group
                .node_ids()
                .map(|id| self.nodes.get(id))
                .collect::<Result<Vec<_>>>()?;
            let elements = group
                .element_ids()
                .map(|id| self.elements.get(id))
                .collect::<Result<Vec<_>>>()?;
            self.write_set(out, "NSET", group.name(), &nodes)?;
            self.write_set(out, "ELSET", group.name(), &elements)?;
            progress.advance(group.len() as u64)?;
        }

        if self.options.property_sets {
            // Abaqus set names are case-insensitive and share one namespace
            // with the element blocks' EALL.
            let mut taken: HashSet<String> = self
                .model
                .groups()
                .iter()
                .map(|g| g.name().to_uppercase())
                .chain(["EALL".to_string()])
                .collect();
            let mut pids: Vec<u32> = Vec::new();
            for pid in self.model.elements().iter().filter_map(|e| e.property) {
                if !pids.contains(&pid) {
                    pids.push(pid);
                }
            }
            for pid in pids {
                let ids = self
                    .model
                    .elements()
                    .iter()
                    .filter(|e| e.property == Some(pid))
                    .map(|e| self.elements.get(e.id))
                    .collect::<Result<Vec<_>>>()?;
                let base = match self.model.property(pid) {
                    Some(property) => format!("PROP_{}", property.name),
                    None => format!("PROP_{pid}"),
                };
                let mut name = base.clone();
                let mut suffix = 2;
                while !taken.insert(name.to_uppercase()) {
                    name = format!("{base}_{suffix}");
                    suffix += 1;
                }
                if name != base {
                    debug!(property = pid, set = %name, "renamed property set to avoid a clash");
                }
                self.write_set(out, "ELSET", &name, &ids)?;
            }
        }
        Ok(())
    }
}

impl MeshWriter for AbaqusWriter<'_> {
    fn format(&self) -> TargetFormat {
        TargetFormat::Abaqus
    }

    fn work_units(&self) -> u64 {
        writer::work_units(self.model)
    }

    fn write_to(&self, out: &mut dyn Write, progress: &mut ProgressTracker<'_>) -> Result<()> {
        self.write_heading(out)?;
        self.write_nodes(out, progress)?;
        self.write_elements(out, progress)?;
        self.write_sets(out, progress)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::testing::mixed_model;
    use gts_model::{Member, NoProgress};

    fn render(model: &MeshModel, options: &AbaqusOptions) -> String {
        let writer = AbaqusWriter::new(model, options).unwrap();
        let mut sink = NoProgress;
        let mut progress = ProgressTracker::new(&mut sink, writer.work_units());
        let mut buf = Vec::new();
        writer.write_to(&mut buf, &mut progress).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn quiet() -> AbaqusOptions {
        let mut options = AbaqusOptions::default();
        options.common.emit_metadata = false;
        options
    }

    #[test]
    fn type_table_orders_cover_every_node() {
        for kind in ElementKind::ALL {
            let abaqus = element_type(kind);
            assert!(abaqus.order.iter().all(|&i| i < kind.num_nodes()), "{kind}");
            let mut used = abaqus.order.to_vec();
            used.sort_unstable();
            used.dedup();
            assert_eq!(used.len(), kind.num_nodes(), "{kind}");
        }
    }

    #[test]
    fn hex_and_pyramid_share_the_brick_block() {
        let text = render(&mixed_model(), &quiet());
        let blocks: Vec<&str> = text.lines().filter(|l| l.starts_with("*ELEMENT")).collect();
        assert_eq!(
            blocks,
            [
                "*ELEMENT, TYPE=C3D8, ELSET=EALL",
                "*ELEMENT, TYPE=S3, ELSET=EALL",
                "*ELEMENT, TYPE=S4, ELSET=EALL",
                "*ELEMENT, TYPE=B31, ELSET=EALL",
            ]
        );
        assert!(text.contains("\n2, 105, 106, 107, 108, 109, 109, 109, 109\n"));
        assert!(text.contains("\n5, 101, 105\n"));
    }

    #[test]
    fn reduced_integration_switches_types() {
        let mut options = quiet();
        options.reduced_integration = true;
        let text = render(&mixed_model(), &options);
        assert!(text.contains("TYPE=C3D8R"));
        assert!(text.contains("TYPE=S4R"));
        assert!(text.contains("TYPE=B31,"));
    }

    #[test]
    fn node_ids_are_preserved() {
        let text = render(&mixed_model(), &quiet());
        assert!(text.contains(
            "*NODE, NSET=NALL\n101, 0.000000000000000E+00, 0.000000000000000E+00, 0.000000000000000E+00\n"
        ));
    }

    #[test]
    fn groups_and_properties_become_sets() {
        let mut model = mixed_model();
        model.add_group("Left wall").unwrap();
        model.add_member("Left wall", Member::Node(109)).unwrap();
        let text = render(&model, &quiet());
        assert!(text.contains("*NSET, NSET=Base\n101, 102, 103, 104\n"));
        assert!(text.contains("*ELSET, ELSET=Solids\n1, 2\n"));
        assert!(text.contains("*NSET, NSET=\"Left wall\"\n109\n"));
        assert!(text.contains("*ELSET, ELSET=PROP_Lining\n3, 4\n"));

        let mut options = quiet();
        options.property_sets = false;
        assert!(!render(&model, &options).contains("PROP_"));
    }

    #[test]
    fn property_sets_do_not_merge_with_mesh_sets() {
        let mut model = mixed_model();
        model.add_group("prop_rock").unwrap();
        model.add_member("prop_rock", Member::Element(4)).unwrap();
        let text = render(&model, &quiet());
        assert!(text.contains("*ELSET, ELSET=prop_rock\n4\n"));
        assert!(text.contains("*ELSET, ELSET=PROP_Rock_2\n1\n"));
        assert!(!text.contains("ELSET=PROP_Rock\n"));
    }

    #[test]
    fn long_sets_wrap_at_sixteen() {
        let mut model = MeshModel::new();
        model.add_group("All").unwrap();
        for id in 1..=20 {
            model.add_node(id, [id as f64, 0.0, 0.0]).unwrap();
            model.add_member("All", Member::Node(id)).unwrap();
        }
        let text = render(&model, &quiet());
        let set: Vec<&str> = text
            .lines()
            .skip_while(|l| *l != "*NSET, NSET=All")
            .skip(1)
            .collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set[0].split(", ").count(), 16);
        assert_eq!(set[1], "17, 18, 19, 20");
    }

    #[test]
    fn oversized_labels_are_rejected() {
        let mut model = MeshModel::new();
        model.add_node(3_000_000_000, [0.0; 3]).unwrap();
        let options = quiet();
        assert!(matches!(
            AbaqusWriter::new(&model, &options),
            Err(WriteError::Unsupported { .. })
        ));
    }

    #[test]
    fn set_names_are_quoted_when_needed() {
        assert_eq!(set_name("Fixed"), "Fixed");
        assert_eq!(set_name("Zone_2"), "Zone_2");
        assert_eq!(set_name("2nd"), "\"2nd\"");
        assert_eq!(set_name("a \"b\""), "\"a 'b'\"");
    }
}
