//! Interprets `.fpn` records into a [`MeshModel`].
//!
//! Nodes, elements and properties are added as their records are read. Mesh
//! set members and element connectivity may refer forward, so they are
//! checked in a final resolution pass that reports the line of the record
//! holding the unresolved reference.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use gts_model::{
    Element, ElementKind, Member, MeshModel, ProgressSink, ProgressTracker, ValidationError,
};
use encoding_rs::GB18030;
use tracing::{debug, info};

use crate::error::{ParseError, ReadError, Result};
use crate::grammar::{self, RecordKind};
use crate::record::{Record, RecordReader};

const AXES: [&str; 3] = ["x coordinate", "y coordinate", "z coordinate"];

/// Read and parse an `.fpn` file.
pub fn read(path: impl AsRef<Path>, progress: &mut dyn ProgressSink) -> Result<MeshModel> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = decode(bytes)?;
    info!(path = %path.display(), bytes = raw.len(), "reading FPN file");
    read_str(&raw, progress)
}

/// Source text as UTF-8, or as GB18030 (a superset of GBK) for files written
/// on Chinese-locale systems. Bytes valid in neither are a ParseError at the
/// first line that is not UTF-8.
fn decode(bytes: Vec<u8>) -> Result<String> {
    let err = match String::from_utf8(bytes) {
        Ok(text) => {
            return Ok(match text.strip_prefix('\u{feff}') {
                Some(rest) => rest.to_string(),
                None => text,
            });
        }
        Err(err) => err,
    };
    let valid = err.utf8_error().valid_up_to();
    let line = 1 + err.as_bytes()[..valid].iter().filter(|&&b| b == b'\n').count();
    match GB18030.decode_without_bom_handling_and_without_replacement(err.as_bytes()) {
        Some(text) => {
            info!(line, "source is not UTF-8, decoded as GB18030");
            Ok(text.into_owned())
        }
        None => Err(ParseError::new(line, "text is neither UTF-8 nor GB18030").into()),
    }
}

/// Parse `.fpn` text already held in memory.
pub fn read_str(raw: &str, progress: &mut dyn ProgressSink) -> Result<MeshModel> {
    let mut tracker = ProgressTracker::new(progress, raw.len() as u64);
    let mut records = RecordReader::new(raw);
    let mut parser = FpnParser::default();
    let mut stage: Option<&'static str> = None;
    let mut reported = 0usize;

    tracker.stage("Reading FPN file")?;
    while let Some(record) = records.next_record()? {
        let kind = grammar::lookup(&record.keyword).ok_or_else(|| {
            ParseError::new(
                record.line,
                format!("unknown record keyword '{}'", record.keyword),
            )
        })?;
        if stage != Some(kind.stage()) {
            stage = Some(kind.stage());
            debug!(line = record.line, stage = kind.stage(), "entering section");
            tracker.stage(kind.stage())?;
        }

        parser.apply(kind, &record)?;

        let consumed = records.consumed();
        tracker.advance((consumed - reported) as u64)?;
        reported = consumed;
    }

    tracker.stage("Resolving mesh set members")?;
    let model = parser.finish()?;

    let message = format!(
        "Read {} nodes, {} elements, {} groups",
        model.node_count(),
        model.element_count(),
        model.groups().len()
    );
    tracker.finish(message);
    info!(
        nodes = model.node_count(),
        elements = model.element_count(),
        properties = model.properties().len(),
        groups = model.groups().len(),
        "FPN model read"
    );
    Ok(model)
}

struct PendingSet {
    id: u32,
    /// Name and the line of its MSET record
    name: Option<(String, usize)>,
    first_line: usize,
    members: Vec<(Member, usize)>,
}

#[derive(Default)]
struct FpnParser {
    model: MeshModel,
    /// Line of each element record, parallel to `model.elements()`
    element_lines: Vec<usize>,
    sets: Vec<PendingSet>,
    set_index: HashMap<u32, usize>,
}

impl FpnParser {
    fn apply(&mut self, kind: RecordKind, record: &Record) -> Result<()> {
        match kind {
            RecordKind::Node => self.node(record),
            RecordKind::Element(kind) => self.element(kind, record),
            RecordKind::Property => self.property(record),
            RecordKind::MeshSet => self.mesh_set(record),
            RecordKind::MeshSetNodes => self.mesh_set_members(record, Member::Node),
            RecordKind::MeshSetElements => self.mesh_set_members(record, Member::Element),
            RecordKind::Skipped => Ok(()),
        }
    }

    fn node(&mut self, record: &Record) -> Result<()> {
        if record.fields.len() < 4 {
            return Err(truncated(record, "a node id and three coordinates").into());
        }
        let id = parse_id(record, 0, "node id")?;
        let mut coords = [0.0; 3];
        for (axis, value) in coords.iter_mut().enumerate() {
            *value = parse_real(record, axis + 1, AXES[axis])?;
        }
        self.model
            .add_node(id, coords)
            .map_err(|source| invalid(record, source))
    }

    fn element(&mut self, kind: ElementKind, record: &Record) -> Result<()> {
        let count = kind.num_nodes();
        if record.fields.len() < count + 2 {
            let expected = format!("an element id, a property id and {count} node ids");
            return Err(truncated(record, &expected).into());
        }
        let id = parse_id(record, 0, "element id")?;
        let property = parse_optional_id(record, 1, "property id")?;
        let nodes = (2..count + 2)
            .map(|idx| parse_id(record, idx, "node id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if let Some((idx, extra)) = record
            .fields
            .iter()
            .enumerate()
            .skip(count + 2)
            .find(|(_, f)| !f.is_empty() && f.as_str() != "0")
        {
            return Err(ParseError::new(
                record.line,
                format!(
                    "{} record has unexpected field {} ('{extra}') after {count} node ids",
                    record.keyword,
                    idx + 1
                ),
            )
            .into());
        }

        let mut element = Element::new(id, kind, nodes);
        if let Some(property) = property {
            element = element.with_property(property);
        }
        self.model
            .add_element(element)
            .map_err(|source| invalid(record, source))?;
        self.element_lines.push(record.line);
        Ok(())
    }

    fn property(&mut self, record: &Record) -> Result<()> {
        if record.fields.len() < 2 {
            return Err(truncated(record, "a property id and a name").into());
        }
        let id = parse_id(record, 0, "property id")?;
        let name = parse_name(record, 1, "property name")?;
        self.model
            .add_property(id, name)
            .map_err(|source| invalid(record, source))
    }

    fn mesh_set(&mut self, record: &Record) -> Result<()> {
        if record.fields.len() < 2 {
            return Err(truncated(record, "a mesh set id and a name").into());
        }
        let id = parse_id(record, 0, "mesh set id")?;
        let name = parse_name(record, 1, "mesh set name")?;
        let set = self.set_entry(id, record.line);
        if let Some((_, first)) = &set.name {
            return Err(ParseError::new(
                record.line,
                format!("mesh set {id} already declared at line {first}"),
            )
            .into());
        }
        set.name = Some((name, record.line));
        Ok(())
    }

    fn mesh_set_members(&mut self, record: &Record, member: fn(u32) -> Member) -> Result<()> {
        if record.fields.is_empty() {
            return Err(truncated(record, "a mesh set id").into());
        }
        let id = parse_id(record, 0, "mesh set id")?;
        let mut ids = Vec::with_capacity(record.fields.len() - 1);
        for idx in 1..record.fields.len() {
            if record.fields[idx].is_empty() {
                continue;
            }
            ids.push(parse_id(record, idx, "member id")?);
        }
        let line = record.line;
        let set = self.set_entry(id, line);
        set.members
            .extend(ids.into_iter().map(|id| (member(id), line)));
        Ok(())
    }

    fn set_entry(&mut self, id: u32, line: usize) -> &mut PendingSet {
        let idx = *self.set_index.entry(id).or_insert_with(|| {
            self.sets.push(PendingSet {
                id,
                name: None,
                first_line: line,
                members: Vec::new(),
            });
            self.sets.len() - 1
        });
        &mut self.sets[idx]
    }

    fn finish(self) -> Result<MeshModel> {
        let mut model = self.model;

        for (element, &line) in model.elements().iter().zip(&self.element_lines) {
            if let Some(&node) = element.nodes.iter().find(|n| model.node(**n).is_none()) {
                return Err(ReadError::Validation {
                    line,
                    source: ValidationError::DanglingNode {
                        element: element.id,
                        node,
                    },
                });
            }
        }

        for set in self.sets {
            let Some((name, declared_at)) = set.name else {
                return Err(ParseError::new(
                    set.first_line,
                    format!("mesh set {} is referenced but never declared by MSET", set.id),
                )
                .into());
            };
            model
                .add_group(name.clone())
                .map_err(|source| ReadError::Validation {
                    line: declared_at,
                    source,
                })?;
            for (member, line) in set.members {
                if !model.contains(member) {
                    return Err(ReadError::Validation {
                        line,
                        source: ValidationError::DanglingMember {
                            group: name.clone(),
                            member,
                        },
                    });
                }
                model
                    .add_member(&name, member)
                    .map_err(|source| ReadError::Validation { line, source })?;
            }
        }

        model
            .validate()
            .map_err(|source| ReadError::Validation { line: 0, source })?;
        Ok(model)
    }
}

fn truncated(record: &Record, expected: &str) -> ParseError {
    ParseError::new(
        record.line,
        format!(
            "truncated {} record: expected {expected}, found {} fields",
            record.keyword,
            record.fields.len()
        ),
    )
}

fn invalid(record: &Record, source: ValidationError) -> ReadError {
    ReadError::Validation {
        line: record.line,
        source,
    }
}

fn required<'r>(record: &'r Record, idx: usize, what: &str) -> std::result::Result<&'r str, ParseError> {
    match record.field(idx) {
        Some(f) if !f.is_empty() => Ok(f),
        _ => Err(ParseError::new(
            record.line,
            format!("{} record is missing the {what}", record.keyword),
        )),
    }
}

fn parse_id(record: &Record, idx: usize, what: &str) -> std::result::Result<u32, ParseError> {
    let raw = required(record, idx, what)?;
    match raw.parse::<u32>() {
        Ok(0) => Err(ParseError::new(
            record.line,
            format!("{what} must be positive, got 0"),
        )),
        Ok(id) => Ok(id),
        Err(_) => Err(ParseError::new(
            record.line,
            format!("invalid {what} '{raw}'"),
        )),
    }
}

/// Empty and `0` both mean "no reference".
fn parse_optional_id(
    record: &Record,
    idx: usize,
    what: &str,
) -> std::result::Result<Option<u32>, ParseError> {
    match record.field(idx) {
        None | Some("") | Some("0") => Ok(None),
        Some(_) => parse_id(record, idx, what).map(Some),
    }
}

fn parse_real(record: &Record, idx: usize, what: &str) -> std::result::Result<f64, ParseError> {
    let raw = required(record, idx, what)?;
    let normalized = raw.replace(['D', 'd'], "E");
    match normalized.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) => Err(ParseError::new(
            record.line,
            format!("non-finite {what} '{raw}'"),
        )),
        Err(_) => Err(ParseError::new(
            record.line,
            format!("invalid {what} '{raw}'"),
        )),
    }
}

fn parse_name(record: &Record, idx: usize, what: &str) -> std::result::Result<String, ParseError> {
    let raw = required(record, idx, what)?;
    let name = raw.trim_matches('"').trim();
    if name.is_empty() {
        return Err(ParseError::new(
            record.line,
            format!("{} record has an empty {what}", record.keyword),
        ));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gts_model::{NoProgress, ProgressUpdate};

    const SINGLE_TET: &str = r#"
$$ Node
NODE   , 1, 0., 0., 0., 1, , ,
NODE   , 2, 1., 0., 0., 1, , ,
NODE   , 3, 0., 1., 0., 1, , ,
NODE   , 4, 0., 0., 1., 1, , ,
$$ Element
TETRA  , 10, 1, 1, 2, 3, 4, 0, 0
$$ Mesh set
MSET   , 1, Fixed
MSETN  , 1, 1
"#;

    fn parse(src: &str) -> Result<MeshModel> {
        read_str(src, &mut NoProgress)
    }

    #[test]
    fn parses_single_tet_scenario() {
        let model = parse(SINGLE_TET).expect("parser should succeed");
        assert_eq!(model.node_count(), 4);
        assert_eq!(model.element_count(), 1);
        let tet = model.element(10).expect("element 10");
        assert_eq!(tet.kind, ElementKind::Tet4);
        assert_eq!(tet.nodes, vec![1, 2, 3, 4]);
        assert_eq!(tet.property, Some(1));
        assert_eq!(model.groups().len(), 1);
        let fixed = model.group("Fixed").expect("group Fixed");
        assert_eq!(fixed.members(), &[Member::Node(1)]);
    }

    #[test]
    fn parsing_is_deterministic() {
        let a = parse(SINGLE_TET).unwrap();
        let b = parse(SINGLE_TET).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn fails_on_truncated_element_record() {
        let src = "NODE, 1, 0, 0, 0\nNODE, 2, 1, 0, 0\nNODE, 3, 0, 1, 0\nHEXA, 7, 1, 1, 2, 3\n";
        let err = parse(src).expect_err("truncated record should fail");
        match err {
            ReadError::Parse(ref e) => {
                assert_eq!(e.line, 4);
                assert!(e.message.contains("truncated HEXA record"), "{}", e.message);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn fails_on_unknown_keyword() {
        let err = parse("NODE, 1, 0, 0, 0\nWEDGE, 2, 1, 1, 1, 1, 1, 1, 1\n").unwrap_err();
        assert_eq!(err.line(), Some(2));
        assert!(err.to_string().contains("unknown record keyword 'WEDGE'"));
    }

    #[test]
    fn fails_on_malformed_coordinate() {
        let err = parse("NODE, 1, 0.0, 1.2.3, 0\n").unwrap_err();
        assert_eq!(err.line(), Some(1));
        assert!(err.to_string().contains("invalid y coordinate"));
    }

    #[test]
    fn rejects_non_finite_coordinate() {
        let err = parse("NODE, 1, 0.0, inf, 0\n").unwrap_err();
        assert!(err.to_string().contains("non-finite y coordinate"));
    }

    #[test]
    fn fails_on_duplicate_node_id() {
        let err = parse("NODE, 1, 0, 0, 0\nNODE, 1, 1, 0, 0\n").unwrap_err();
        assert!(matches!(
            err,
            ReadError::Validation {
                line: 2,
                source: ValidationError::DuplicateNode(1)
            }
        ));
    }

    #[test]
    fn accepts_fortran_exponents_and_continuations() {
        let src = r#"
NODE, 1, 1.5D+03, -2.0d-01, 0
NODE, 2, 0, 0, 0
NODE, 3, 0, 1, 0
NODE, 4, 1, 1, 0
QUAD, 5, 0, 1, 2,
    , 4, 3
"#;
        let model = parse(src).expect("parser should succeed");
        assert_eq!(model.node(1).unwrap().coords, [1500.0, -0.2, 0.0]);
        let quad = model.element(5).unwrap();
        assert_eq!(quad.nodes, vec![1, 2, 4, 3]);
        assert_eq!(quad.property, None);
    }

    #[test]
    fn rejects_extra_connectivity() {
        let src = "TRIA, 5, 1, 1, 2, 3, 4\n";
        let err = parse(src).unwrap_err();
        assert_eq!(err.line(), Some(1));
        assert!(err.to_string().contains("unexpected field 6"));
    }

    #[test]
    fn resolves_forward_references() {
        let src = r#"
MSET , 3, Lining
MSETE, 3, 20
TRIA , 20, 2, 1, 2, 3
NODE , 1, 0, 0, 0
NODE , 2, 1, 0, 0
NODE , 3, 0, 1, 0
PSHELL, 2, Shotcrete
"#;
        let model = parse(src).expect("forward references should resolve");
        assert_eq!(
            model.group("Lining").unwrap().members(),
            &[Member::Element(20)]
        );
        assert_eq!(model.property(2).unwrap().name, "Shotcrete");
    }

    #[test]
    fn fails_on_unresolved_member_with_its_line() {
        let src = "NODE, 1, 0, 0, 0\nMSET, 1, Top\nMSETN, 1, 1, 2\n";
        let err = parse(src).unwrap_err();
        match err {
            ReadError::Validation { line, source } => {
                assert_eq!(line, 3);
                assert_eq!(
                    source,
                    ValidationError::DanglingMember {
                        group: "Top".to_string(),
                        member: Member::Node(2)
                    }
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn fails_on_dangling_connectivity() {
        let src = "NODE, 1, 0, 0, 0\nNODE, 2, 1, 0, 0\nBEAM, 1, 1, 1, 3\n";
        let err = parse(src).unwrap_err();
        assert!(matches!(
            err,
            ReadError::Validation {
                line: 3,
                source: ValidationError::DanglingNode { element: 1, node: 3 }
            }
        ));
    }

    #[test]
    fn fails_on_undeclared_mesh_set() {
        let err = parse("NODE, 1, 0, 0, 0\nMSETN, 9, 1\n").unwrap_err();
        assert_eq!(err.line(), Some(2));
        assert!(err.to_string().contains("never declared"));
    }

    #[test]
    fn fails_on_redeclared_mesh_set() {
        let err = parse("MSET, 1, A\nMSET, 1, B\n").unwrap_err();
        assert_eq!(err.line(), Some(2));
        assert!(err.to_string().contains("already declared at line 1"));
    }

    #[test]
    fn fails_on_duplicate_group_name() {
        let err = parse("MSET, 1, A\nMSET, 2, A\n").unwrap_err();
        assert!(matches!(
            err,
            ReadError::Validation {
                line: 2,
                source: ValidationError::DuplicateGroup(_)
            }
        ));
    }

    #[test]
    fn skips_recognised_analysis_records() {
        let src = "VER, 2.1\nUNIT, KN, M, SEC\nMATL, 1, Soil, 1\nNODE, 1, 0, 0, 0\n";
        let model = parse(src).expect("skipped records are accepted");
        assert_eq!(model.node_count(), 1);
    }

    #[test]
    fn reports_monotonic_progress_to_completion() {
        let mut updates = Vec::<ProgressUpdate>::new();
        let mut sink = |u: &ProgressUpdate| updates.push(u.clone());
        read_str(SINGLE_TET, &mut sink).expect("parser should succeed");
        assert!(!updates.is_empty());
        assert!(updates.windows(2).all(|w| w[0].percent <= w[1].percent));
        let last = updates.last().unwrap();
        assert_eq!(last.percent, 100);
        assert_eq!(last.message, "Read 4 nodes, 1 elements, 1 groups");
        assert!(updates.iter().any(|u| u.message == "Reading elements"));
    }

    #[test]
    fn read_reports_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = read(dir.path().join("missing.fpn"), &mut NoProgress).unwrap_err();
        assert!(matches!(err, ReadError::Io { .. }));
        assert!(err.to_string().contains("missing.fpn"));
    }

    #[test]
    fn read_parses_file_from_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("model.fpn");
        fs::write(&path, SINGLE_TET).expect("write fixture");
        let model = read(&path, &mut NoProgress).expect("read should succeed");
        assert_eq!(model.element_count(), 1);
    }

    #[test]
    fn gbk_names_are_decoded() {
        let (name, _, unmappable) = encoding_rs::GBK.encode("开挖");
        assert!(!unmappable);
        let (head, tail) = SINGLE_TET.split_once("Fixed").unwrap();
        let mut bytes = head.as_bytes().to_vec();
        bytes.extend_from_slice(&name);
        bytes.extend_from_slice(tail.as_bytes());

        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("gbk.fpn");
        fs::write(&path, &bytes).expect("write fixture");
        let model = read(&path, &mut NoProgress).expect("read should succeed");
        assert!(model.group("开挖").is_some());
    }

    #[test]
    fn undecodable_bytes_are_reported_with_their_line() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("binary.fpn");
        let mut bytes = SINGLE_TET.as_bytes().to_vec();
        // line 5 holds node 3
        let at = SINGLE_TET.find("NODE   , 3").unwrap();
        bytes.insert(at, 0xFF);
        fs::write(&path, &bytes).expect("write fixture");
        let err = read(&path, &mut NoProgress).unwrap_err();
        assert_eq!(err.line(), Some(5));
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let text = format!("\u{feff}{}", SINGLE_TET.trim_start());
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("bom.fpn");
        fs::write(&path, text).expect("write fixture");
        assert!(read(&path, &mut NoProgress).is_ok());
    }
}
