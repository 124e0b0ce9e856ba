//! LS-DYNA keyword writer (`.k`).
//!
//! Layout: `*KEYWORD`, `*TITLE`, `*NODE`, one `*PART` per property in use,
//! `*ELEMENT_SOLID` / `*ELEMENT_SHELL` / `*ELEMENT_BEAM`, the sets, `*END`.
//! Solids and triangular shells are written as degenerate 8- and 4-node
//! cards. Parts carry `secid = mid = pid`; sections and materials are left
//! to the analyst.

use std::io::Write;

use gts_model::{Element, ElementKind, MeshModel, ProgressTracker};
use tracing::debug;

use crate::error::{Result, WriteError};
use crate::numeric::fit_real;
use crate::options::{FieldFormat, LsDynaOptions, TargetFormat};
use crate::renumber::{IdPolicy, Renumbering};
use crate::writer::{self, MeshWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DynaKeyword {
    Solid,
    Shell,
    Beam,
}

impl DynaKeyword {
    pub const ALL: [DynaKeyword; 3] = [DynaKeyword::Solid, DynaKeyword::Shell, DynaKeyword::Beam];

    pub fn element_keyword(&self) -> &'static str {
        match self {
            DynaKeyword::Solid => "*ELEMENT_SOLID",
            DynaKeyword::Shell => "*ELEMENT_SHELL",
            DynaKeyword::Beam => "*ELEMENT_BEAM",
        }
    }

    pub fn set_keyword(&self) -> &'static str {
        match self {
            DynaKeyword::Solid => "*SET_SOLID_TITLE",
            DynaKeyword::Shell => "*SET_SHELL_TITLE",
            DynaKeyword::Beam => "*SET_BEAM_TITLE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynaShape {
    pub keyword: DynaKeyword,
    /// Target slot → source node index
    pub order: &'static [usize],
}

pub fn element_shape(kind: ElementKind) -> DynaShape {
    let (keyword, order): (DynaKeyword, &'static [usize]) = match kind {
        ElementKind::Hex8 => (DynaKeyword::Solid, &[0, 1, 2, 3, 4, 5, 6, 7]),
        ElementKind::Wedge6 => (DynaKeyword::Solid, &[0, 1, 2, 3, 4, 4, 5, 5]),
        ElementKind::Pyramid5 => (DynaKeyword::Solid, &[0, 1, 2, 3, 4, 4, 4, 4]),
        ElementKind::Tet4 => (DynaKeyword::Solid, &[0, 1, 2, 3, 3, 3, 3, 3]),
        ElementKind::Quad4 => (DynaKeyword::Shell, &[0, 1, 2, 3]),
        ElementKind::Tri3 => (DynaKeyword::Shell, &[0, 1, 2, 2]),
        ElementKind::Line2 => (DynaKeyword::Beam, &[0, 1]),
    };
    DynaShape { keyword, order }
}

const IDS_PER_CARD: usize = 8;
const TITLE_WIDTH: usize = 80;
/// Significant digits a coordinate must keep, at least 1e-9 relative.
const ROUND_TRIP_DIGITS: usize = 10;

#[derive(Debug, Clone, Copy)]
enum Field {
    /// Node and element cards: I8 in standard format
    Id(u32),
    /// Part and set cards: I10 in standard format
    Wide(u32),
    Real(f64),
}

/// Formats cards in the selected field layout.
///
/// Free format writes no padding, but a value may not be longer than its
/// standard field.
struct Cards {
    format: FieldFormat,
    precision: usize,
}

impl Cards {
    fn width(&self, field: Field) -> usize {
        match (self.format, field) {
            (FieldFormat::Long, _) => 20,
            (_, Field::Id(_)) => 8,
            (_, Field::Wide(_)) => 10,
            (_, Field::Real(_)) => 16,
        }
    }

    fn overflow(&self, what: String, width: usize) -> WriteError {
        WriteError::Unsupported {
            format: TargetFormat::LsDyna,
            what: format!("{what} in a {width}-column {} field", self.format.name()),
        }
    }

    fn text(&self, field: Field, width: usize) -> Result<String> {
        match field {
            Field::Id(v) | Field::Wide(v) => {
                let text = v.to_string();
                if text.len() > width {
                    return Err(self.overflow(format!("value {text}"), width));
                }
                Ok(text)
            }
            Field::Real(v) => {
                let digits = self.precision + 1;
                let required = digits.min(ROUND_TRIP_DIGITS);
                match fit_real(v, width, digits) {
                    Some((text, kept)) if kept >= required => Ok(text),
                    _ => Err(self.overflow(format!("{v:e} to {required} significant digits"), width)),
                }
            }
        }
    }

    fn line(&self, fields: &[Field]) -> Result<String> {
        let mut line = String::new();
        for (i, field) in fields.iter().enumerate() {
            let width = self.width(*field);
            let text = self.text(*field, width)?;
            if self.format == FieldFormat::Free {
                if i > 0 {
                    line.push(',');
                }
                line.push_str(&text);
            } else {
                line.push_str(&format!("{text:>width$}"));
            }
        }
        Ok(line)
    }
}

fn title(text: &str) -> String {
    text.chars().take(TITLE_WIDTH).collect()
}

pub struct LsDynaWriter<'a> {
    model: &'a MeshModel,
    options: &'a LsDynaOptions,
    nodes: Renumbering,
    elements: Renumbering,
    /// (pid, part title), in order of first use
    parts: Vec<(u32, String)>,
    default_pid: u32,
}

impl<'a> LsDynaWriter<'a> {
    pub fn new(model: &'a MeshModel, options: &'a LsDynaOptions) -> Result<Self> {
        model.validate()?;

        let policy = if options.renumber {
            IdPolicy::Contiguous
        } else {
            IdPolicy::Preserve
        };
        let nodes = Renumbering::build("node", policy, model.nodes().iter().map(|n| n.id));
        let elements = Renumbering::build("element", policy, model.elements().iter().map(|e| e.id));

        let largest = model
            .properties()
            .iter()
            .map(|p| p.id)
            .chain(model.elements().iter().filter_map(|e| e.property))
            .max()
            .unwrap_or(0);
        let default_pid = largest.checked_add(1).ok_or_else(|| WriteError::Unsupported {
            format: TargetFormat::LsDyna,
            what: "a default part beyond property id 4294967295".to_string(),
        })?;

        let mut parts: Vec<(u32, String)> = Vec::new();
        for element in model.elements() {
            let pid = element.property.unwrap_or(default_pid);
            if parts.iter().any(|(p, _)| *p == pid) {
                continue;
            }
            let name = match (element.property, model.property(pid)) {
                (None, _) => "default".to_string(),
                (Some(_), Some(property)) => property.name.clone(),
                (Some(_), None) => format!("Property {pid}"),
            };
            parts.push((pid, name));
        }
        debug!(parts = parts.len(), policy = ?policy, "built LS-DYNA part and id tables");

        Ok(Self {
            model,
            options,
            nodes,
            elements,
            parts,
            default_pid,
        })
    }

    pub fn nodes(&self) -> &Renumbering {
        &self.nodes
    }

    pub fn elements(&self) -> &Renumbering {
        &self.elements
    }

    fn cards(&self) -> Cards {
        Cards {
            format: self.options.field_format,
            precision: self.options.precision(),
        }
    }

    fn write_header(&self, out: &mut dyn Write) -> Result<()> {
        match self.options.field_format {
            FieldFormat::Long => writeln!(out, "*KEYWORD LONG=Y")?,
            FieldFormat::Standard | FieldFormat::Free => writeln!(out, "*KEYWORD")?,
        }
        writeln!(out, "*TITLE")?;
        let text = self.options.title.as_deref().unwrap_or("Mesh exported from Midas GTS");
        writeln!(out, "{}", title(text))?;
        if self.options.common.emit_metadata {
            for line in writer::metadata_lines(self.model, &self.options.common, TargetFormat::LsDyna) {
                writeln!(out, "$ {line}")?;
            }
        }
        Ok(())
    }

    fn write_nodes(&self, out: &mut dyn Write, progress: &mut ProgressTracker<'_>) -> Result<()> {
        progress.stage("Writing nodes")?;
        let cards = self.cards();
        writeln!(out, "*NODE")?;
        for node in self.model.nodes() {
            let [x, y, z] = writer::target_coords(node, &self.options.common)?;
            let line = cards.line(&[
                Field::Id(self.nodes.get(node.id)?),
                Field::Real(x),
                Field::Real(y),
                Field::Real(z),
            ])?;
            writeln!(out, "{line}")?;
            progress.advance(1)?;
        }
        Ok(())
    }

    fn write_parts(&self, out: &mut dyn Write) -> Result<()> {
        let cards = self.cards();
        for (pid, name) in &self.parts {
            writeln!(out, "*PART")?;
            writeln!(out, "{}", title(name))?;
            let line = cards.line(&[Field::Wide(*pid), Field::Wide(*pid), Field::Wide(*pid)])?;
            writeln!(out, "{line}")?;
        }
        Ok(())
    }

    fn element_card(&self, cards: &Cards, element: &Element, shape: &DynaShape) -> Result<String> {
        let mut fields = vec![
            Field::Id(self.elements.get(element.id)?),
            Field::Id(element.property.unwrap_or(self.default_pid)),
        ];
        for node in writer::permute(&element.nodes, shape.order)? {
            fields.push(Field::Id(self.nodes.get(node)?));
        }
        if shape.keyword == DynaKeyword::Beam {
            // no orientation node
            fields.push(Field::Id(0));
        }
        cards.line(&fields)
    }

    fn write_elements(&self, out: &mut dyn Write, progress: &mut ProgressTracker<'_>) -> Result<()> {
        progress.stage("Writing elements")?;
        let cards = self.cards();
        for keyword in DynaKeyword::ALL {
            let mut block = self
                .model
                .elements()
                .iter()
                .map(|e| (e, element_shape(e.kind)))
                .filter(|(_, shape)| shape.keyword == keyword)
                .peekable();
            if block.peek().is_none() {
                continue;
            }
            writeln!(out, "{}", keyword.element_keyword())?;
            for (element, shape) in block {
                writeln!(out, "{}", self.element_card(&cards, element, &shape)?)?;
                progress.advance(1)?;
            }
        }
        Ok(())
    }

    fn write_set(
        &self,
        out: &mut dyn Write,
        keyword: &str,
        sid: u32,
        name: &str,
        ids: &[u32],
    ) -> Result<()> {
        let cards = self.cards();
        writeln!(out, "{keyword}")?;
        writeln!(out, "{}", title(name))?;
        writeln!(out, "{}", cards.line(&[Field::Wide(sid)])?)?;
        for row in ids.chunks(IDS_PER_CARD) {
            let fields: Vec<Field> = row.iter().map(|&id| Field::Wide(id)).collect();
            writeln!(out, "{}", cards.line(&fields)?)?;
        }
        Ok(())
    }

    fn write_sets(&self, out: &mut dyn Write, progress: &mut ProgressTracker<'_>) -> Result<()> {
        if self.model.groups().is_empty() {
            return Ok(());
        }
        progress.stage("Writing sets")?;
        // Set ids are numbered per set keyword.
        let mut node_sid = 0u32;
        let mut element_sid = [0u32; 3];
        for group in self.model.groups() {
            let nodes = group
                .node_ids()
                .map(|id| self.nodes.get(id))
                .collect::<Result<Vec<_>>>()?;
            if !nodes.is_empty() {
                node_sid += 1;
                self.write_set(out, "*SET_NODE_LIST_TITLE", node_sid, group.name(), &nodes)?;
            }

            for (slot, keyword) in DynaKeyword::ALL.into_iter().enumerate() {
                let mut ids = Vec::new();
                for id in group.element_ids() {
                    let element = self.model.element(id).ok_or_else(|| {
                        WriteError::Invariant(format!(
                            "group '{}' references missing element {id}",
                            group.name()
                        ))
                    })?;
                    if element_shape(element.kind).keyword == keyword {
                        ids.push(self.elements.get(id)?);
                    }
                }
                if !ids.is_empty() {
                    element_sid[slot] += 1;
                    self.write_set(out, keyword.set_keyword(), element_sid[slot], group.name(), &ids)?;
                }
            }
            progress.advance(group.len() as u64)?;
        }
        Ok(())
    }
}

impl MeshWriter for LsDynaWriter<'_> {
    fn format(&self) -> TargetFormat {
        TargetFormat::LsDyna
    }

    fn work_units(&self) -> u64 {
        writer::work_units(self.model)
    }

    fn write_to(&self, out: &mut dyn Write, progress: &mut ProgressTracker<'_>) -> Result<()> {
        self.write_header(out)?;
        self.write_nodes(out, progress)?;
        self.write_parts(out)?;
        self.write_elements(out, progress)?;
        self.write_sets(out, progress)?;
        writeln!(out, "*END")?;
        Ok(())
    }
}
