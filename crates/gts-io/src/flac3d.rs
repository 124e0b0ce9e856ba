//! FLAC3D grid writer (`.f3grid` for FLAC3D 6+, `.flac3d` for version 5).
//!
//! Solids become zones, shells become faces, and nodes become gridpoints.
//! FLAC3D ids must be 1..N, so all three spaces are renumbered in model
//! order. Mesh sets are written as `ZGROUP`/`FGROUP`/`GPGROUP` blocks; with
//! `group_by_property` each property also becomes a zone/face group.
//!
//! Version 5 grids hold zones and zone groups only, one group per zone.
//! Shells and gridpoint groups are unsupported there, and overlapping mesh
//! sets cannot be expressed.

use std::collections::{HashMap, HashSet};
use std::io::Write;

use gts_model::{Element, ElementKind, Group, MeshModel, ProgressTracker};
use tracing::{debug, warn};

use crate::error::{Result, WriteError};
use crate::numeric::format_real;
use crate::options::{Flac3dOptions, Flac3dVersion, TargetFormat};
use crate::renumber::{IdPolicy, Renumbering};
use crate::writer::{self, MeshWriter};

/// Where an element kind lands in a FLAC3D grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flac3dEntity {
    Zone,
    Face,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flac3dShape {
    pub entity: Flac3dEntity,
    pub keyword: &'static str,
    /// Target slot → source node index
    pub order: &'static [usize],
}

const SHAPES: &[(ElementKind, Flac3dShape)] = &[
    (
        ElementKind::Hex8,
        Flac3dShape {
            entity: Flac3dEntity::Zone,
            keyword: "B8",
            order: &[0, 1, 3, 4, 2, 7, 5, 6],
        },
    ),
    (
        ElementKind::Wedge6,
        Flac3dShape {
            entity: Flac3dEntity::Zone,
            keyword: "W6",
            order: &[0, 1, 3, 2, 4, 5],
        },
    ),
    (
        ElementKind::Pyramid5,
        Flac3dShape {
            entity: Flac3dEntity::Zone,
            keyword: "P5",
            order: &[0, 1, 3, 4, 2],
        },
    ),
    (
        ElementKind::Tet4,
        Flac3dShape {
            entity: Flac3dEntity::Zone,
            keyword: "T4",
            order: &[0, 1, 2, 3],
        },
    ),
    (
        ElementKind::Quad4,
        Flac3dShape {
            entity: Flac3dEntity::Face,
            keyword: "Q4",
            order: &[0, 1, 2, 3],
        },
    ),
    (
        ElementKind::Tri3,
        Flac3dShape {
            entity: Flac3dEntity::Face,
            keyword: "T3",
            order: &[0, 1, 2],
        },
    ),
];

/// FLAC3D shape for `kind`; `None` for kinds a grid cannot hold (beams).
pub fn shape(kind: ElementKind) -> Option<&'static Flac3dShape> {
    SHAPES.iter().find(|(k, _)| *k == kind).map(|(_, s)| s)
}

const IDS_PER_ROW: usize = 10;
const DEFAULT_SLOT: &str = "Default";

pub struct Flac3dWriter<'a> {
    model: &'a MeshModel,
    options: &'a Flac3dOptions,
    gridpoints: Renumbering,
    zones: Renumbering,
    faces: Renumbering,
    skipped: HashSet<u32>,
    /// Version 5 only: (bare name, zones)
    legacy_groups: Vec<(String, Vec<u32>)>,
}

impl<'a> Flac3dWriter<'a> {
    pub fn new(model: &'a MeshModel, options: &'a Flac3dOptions) -> Result<Self> {
        model.validate()?;

        let mut zone_ids = Vec::new();
        let mut face_ids = Vec::new();
        let mut skipped = HashSet::new();
        for element in model.elements() {
            let entity = shape(element.kind)
                .map(|s| s.entity)
                .filter(|e| *e == Flac3dEntity::Zone || options.version == Flac3dVersion::V6);
            match entity {
                Some(Flac3dEntity::Zone) => zone_ids.push(element.id),
                Some(Flac3dEntity::Face) => face_ids.push(element.id),
                None if options.skip_unsupported => {
                    warn!(
                        element = element.id,
                        kind = element.kind.name(),
                        "FLAC3D grid cannot hold this element, skipping"
                    );
                    skipped.insert(element.id);
                }
                None => {
                    return Err(writer::unsupported(TargetFormat::Flac3d, element.id, element.kind));
                }
            }
        }

        let gridpoints = Renumbering::build(
            "gridpoint",
            IdPolicy::Contiguous,
            model.nodes().iter().map(|n| n.id),
        );
        let zones = Renumbering::build("zone", IdPolicy::Contiguous, zone_ids);
        let faces = Renumbering::build("face", IdPolicy::Contiguous, face_ids);
        let legacy_groups = match options.version {
            Flac3dVersion::V6 => Vec::new(),
            Flac3dVersion::V5 => legacy_groups(model, options, &zones)?,
        };
        debug!(
            gridpoints = gridpoints.len(),
            zones = zones.len(),
            faces = faces.len(),
            skipped = skipped.len(),
            "built FLAC3D renumbering tables"
        );

        Ok(Self {
            model,
            options,
            gridpoints,
            zones,
            faces,
            skipped,
            legacy_groups,
        })
    }

    pub fn gridpoints(&self) -> &Renumbering {
        &self.gridpoints
    }

    pub fn zones(&self) -> &Renumbering {
        &self.zones
    }

    pub fn faces(&self) -> &Renumbering {
        &self.faces
    }

    fn write_header(&self, out: &mut dyn Write) -> Result<()> {
        let tag = match self.options.version {
            Flac3dVersion::V6 => "FLAC3D grid",
            Flac3dVersion::V5 => "FLAC3D 5 grid",
        };
        writeln!(out, "* {tag} exported from Midas GTS")?;
        if self.options.common.emit_metadata {
            for line in writer::metadata_lines(self.model, &self.options.common, TargetFormat::Flac3d) {
                writeln!(out, "* {line}")?;
            }
        }
        Ok(())
    }

    fn write_gridpoints(&self, out: &mut dyn Write, progress: &mut ProgressTracker<'_>) -> Result<()> {
        progress.stage("Writing gridpoints")?;
        let precision = self.options.precision();
        writeln!(out, "* GRIDPOINTS")?;
        for node in self.model.nodes() {
            let [x, y, z] = writer::target_coords(node, &self.options.common)?;
            writeln!(
                out,
                "G {} {} {} {}",
                self.gridpoints.get(node.id)?,
                format_real(x, precision),
                format_real(y, precision),
                format_real(z, precision)
            )?;
            progress.advance(1)?;
        }
        Ok(())
    }

    fn write_cells(
        &self,
        out: &mut dyn Write,
        progress: &mut ProgressTracker<'_>,
        entity: Flac3dEntity,
    ) -> Result<()> {
        let (title, prefix, table) = match entity {
            Flac3dEntity::Zone => ("ZONES", 'Z', &self.zones),
            Flac3dEntity::Face => ("FACES", 'F', &self.faces),
        };
        if table.is_empty() {
            return Ok(());
        }
        progress.stage(format!("Writing {}", title.to_lowercase()))?;
        writeln!(out, "* {title}")?;
        for element in self.model.elements() {
            let Some(shape) = shape(element.kind).filter(|s| s.entity == entity) else {
                continue;
            };
            let mut line = format!("{prefix} {} {}", shape.keyword, table.get(element.id)?);
            for node in writer::permute(&element.nodes, shape.order)? {
                line.push(' ');
                line.push_str(&self.gridpoints.get(node)?.to_string());
            }
            writeln!(out, "{line}")?;
            progress.advance(1)?;
        }
        Ok(())
    }

    fn group_header(keyword: &str, name: &str, slot: &str) -> String {
        format!(
            "{keyword} \"{}\" SLOT \"{}\"",
            name.replace('"', "'"),
            slot.replace('"', "'")
        )
    }

    fn write_group_block(
        &self,
        out: &mut dyn Write,
        keyword: &str,
        name: &str,
        slot: &str,
        ids: &[u32],
    ) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        writeln!(out, "{}", Self::group_header(keyword, name, slot))?;
        writer::write_id_rows(out, ids, IDS_PER_ROW, "", " ")?;
        Ok(())
    }

    fn write_mesh_set(&self, out: &mut dyn Write, group: &Group) -> Result<()> {
        let gridpoints = group
            .node_ids()
            .map(|id| self.gridpoints.get(id))
            .collect::<Result<Vec<_>>>()?;

        let mut zones = Vec::new();
        let mut faces = Vec::new();
        for id in group.element_ids() {
            if self.skipped.contains(&id) {
                continue;
            }
            if self.zones.contains(id) {
                zones.push(self.zones.get(id)?);
            } else {
                faces.push(self.faces.get(id)?);
            }
        }

        // Mesh sets may overlap, so each gets its own slot.
        let slot = group.name();
        self.write_group_block(out, "ZGROUP", group.name(), slot, &zones)?;
        self.write_group_block(out, "FGROUP", group.name(), slot, &faces)?;
        self.write_group_block(out, "GPGROUP", group.name(), slot, &gridpoints)?;
        Ok(())
    }

    /// Property id → (zones, faces), in order of first use.
    fn property_groups(&self) -> Result<Vec<(u32, Vec<u32>, Vec<u32>)>> {
        let mut groups: Vec<(u32, Vec<u32>, Vec<u32>)> = Vec::new();
        for element in self.model.elements() {
            let Some(pid) = element.property else {
                continue;
            };
            if self.skipped.contains(&element.id) {
                continue;
            }
            let index = match groups.iter().position(|(p, _, _)| *p == pid) {
                Some(index) => index,
                None => {
                    groups.push((pid, Vec::new(), Vec::new()));
                    groups.len() - 1
                }
            };
            let entry = &mut groups[index];
            self.push_cell(element, &mut entry.1, &mut entry.2)?;
        }
        Ok(groups)
    }

    fn push_cell(&self, element: &Element, zones: &mut Vec<u32>, faces: &mut Vec<u32>) -> Result<()> {
        if self.zones.contains(element.id) {
            zones.push(self.zones.get(element.id)?);
        } else {
            faces.push(self.faces.get(element.id)?);
        }
        Ok(())
    }

    fn write_legacy_groups(&self, out: &mut dyn Write, progress: &mut ProgressTracker<'_>) -> Result<()> {
        if self.legacy_groups.is_empty() {
            return Ok(());
        }
        progress.stage("Writing groups")?;
        writeln!(out, "* GROUPS")?;
        for (name, zones) in &self.legacy_groups {
            writeln!(out, "ZGROUP {name}")?;
            writer::write_id_rows(out, zones, IDS_PER_ROW, "", " ")?;
        }
        let members: usize = self.model.groups().iter().map(Group::len).sum();
        progress.advance(members as u64)?;
        Ok(())
    }

    fn write_groups(&self, out: &mut dyn Write, progress: &mut ProgressTracker<'_>) -> Result<()> {
        if self.options.version == Flac3dVersion::V5 {
            return self.write_legacy_groups(out, progress);
        }
        let property_groups = if self.options.group_by_property {
            self.property_groups()?
        } else {
            Vec::new()
        };
        if self.model.groups().is_empty() && property_groups.is_empty() {
            return Ok(());
        }

        progress.stage("Writing groups")?;
        writeln!(out, "* GROUPS")?;
        for (pid, zones, faces) in &property_groups {
            let name = match self.model.property(*pid) {
                Some(property) => property.name.clone(),
                None => format!("Property {pid}"),
            };
            self.write_group_block(out, "ZGROUP", &name, DEFAULT_SLOT, zones)?;
            self.write_group_block(out, "FGROUP", &name, DEFAULT_SLOT, faces)?;
        }
        for group in self.model.groups() {
            self.write_mesh_set(out, group)?;
            progress.advance(group.len() as u64)?;
        }
        Ok(())
    }
}

/// `name` with blanks and quotes replaced, made unique among `taken`.
fn bare_name(name: &str, taken: &mut HashSet<String>) -> String {
    let base: String = name
        .chars()
        .map(|c| if c.is_whitespace() || c == '"' || c == '\'' { '_' } else { c })
        .collect();
    let mut candidate = base.clone();
    let mut suffix = 2;
    while !taken.insert(candidate.clone()) {
        candidate = format!("{base}_{suffix}");
        suffix += 1;
    }
    candidate
}

/// Zone groups of a version 5 grid. Mesh sets claim zones first; property
/// groups (`PROP_<name>`) keep the zones no set claimed.
fn legacy_groups(
    model: &MeshModel,
    options: &Flac3dOptions,
    zones: &Renumbering,
) -> Result<Vec<(String, Vec<u32>)>> {
    let mut taken = HashSet::new();
    let mut owner: HashMap<u32, &str> = HashMap::new();
    let mut groups = Vec::new();

    for group in model.groups() {
        if group.node_ids().next().is_some() {
            if !options.skip_unsupported {
                return Err(WriteError::Unsupported {
                    format: TargetFormat::Flac3d,
                    what: format!("gridpoint group '{}' in a version 5 grid", group.name()),
                });
            }
            warn!(group = group.name(), "version 5 grids hold no gridpoint groups, skipping its nodes");
        }
        let mut members = Vec::new();
        for id in group.element_ids().filter(|id| zones.contains(*id)) {
            let zone = zones.get(id)?;
            match owner.get(&zone).copied() {
                Some(first) if !options.skip_unsupported => {
                    return Err(WriteError::Unsupported {
                        format: TargetFormat::Flac3d,
                        what: format!(
                            "element {id} in both '{first}' and '{}' in a version 5 grid",
                            group.name()
                        ),
                    });
                }
                Some(first) => {
                    warn!(element = id, kept = first, dropped = group.name(), "zone already grouped, skipping");
                }
                None => {
                    owner.insert(zone, group.name());
                    members.push(zone);
                }
            }
        }
        if !members.is_empty() {
            groups.push((bare_name(group.name(), &mut taken), members));
        }
    }

    if options.group_by_property {
        let mut by_property: Vec<(u32, Vec<u32>)> = Vec::new();
        let mut claimed = 0usize;
        for element in model.elements() {
            let Some(pid) = element.property else {
                continue;
            };
            if !zones.contains(element.id) {
                continue;
            }
            let zone = zones.get(element.id)?;
            if owner.contains_key(&zone) {
                claimed += 1;
                continue;
            }
            match by_property.iter_mut().find(|(p, _)| *p == pid) {
                Some((_, members)) => members.push(zone),
                None => by_property.push((pid, vec![zone])),
            }
        }
        if claimed > 0 {
            warn!(zones = claimed, "zones in a mesh set are left out of their property group");
        }
        for (pid, members) in by_property {
            let name = match model.property(pid) {
                Some(property) => format!("PROP_{}", property.name),
                None => format!("PROP_{pid}"),
            };
            groups.push((bare_name(&name, &mut taken), members));
        }
    }
    debug!(groups = groups.len(), "built version 5 zone groups");
    Ok(groups)
}

impl MeshWriter for Flac3dWriter<'_> {
    fn format(&self) -> TargetFormat {
        TargetFormat::Flac3d
    }

    fn work_units(&self) -> u64 {
        writer::work_units(self.model)
    }

    fn write_to(&self, out: &mut dyn Write, progress: &mut ProgressTracker<'_>) -> Result<()> {
        self.write_header(out)?;
        self.write_gridpoints(out, progress)?;
        self.write_cells(out, progress, Flac3dEntity::Zone)?;
        self.write_cells(out, progress, Flac3dEntity::Face)?;
        progress.advance(self.skipped.len() as u64)?;
        self.write_groups(out, progress)?;
        Ok(())
    }
}
