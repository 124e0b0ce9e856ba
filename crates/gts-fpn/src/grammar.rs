//! Keyword table of the `.fpn` grammar.
//!
//! Every keyword the reader accepts is listed here; anything else is a
//! parse error. Records the exporter has no use for (materials, loads,
//! analysis stages) are recognised and skipped.

use gts_model::ElementKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// `NODE, id, x, y, z, ...`
    Node,
    /// `<KEYWORD>, id, pid, n1..nk`
    Element(ElementKind),
    /// `P<TYPE>, pid, name, ...`
    Property,
    /// `MSET, gid, name`
    MeshSet,
    /// `MSETN, gid, node ids...`
    MeshSetNodes,
    /// `MSETE, gid, element ids...`
    MeshSetElements,
    Skipped,
}

impl RecordKind {
    /// Status shown while records of this kind are being read.
    pub fn stage(self) -> &'static str {
        match self {
            RecordKind::Node => "Reading nodes",
            RecordKind::Element(_) => "Reading elements",
            RecordKind::Property => "Reading properties",
            RecordKind::MeshSet | RecordKind::MeshSetNodes | RecordKind::MeshSetElements => {
                "Reading mesh sets"
            }
            RecordKind::Skipped => "Skipping analysis records",
        }
    }
}

pub const GRAMMAR: &[(&str, RecordKind)] = &[
    ("NODE", RecordKind::Node),
    ("BEAM", RecordKind::Element(ElementKind::Line2)),
    ("TRUSS", RecordKind::Element(ElementKind::Line2)),
    ("TRIA", RecordKind::Element(ElementKind::Tri3)),
    ("QUAD", RecordKind::Element(ElementKind::Quad4)),
    ("TETRA", RecordKind::Element(ElementKind::Tet4)),
    ("PYRAM", RecordKind::Element(ElementKind::Pyramid5)),
    ("PENTA", RecordKind::Element(ElementKind::Wedge6)),
    ("HEXA", RecordKind::Element(ElementKind::Hex8)),
    ("PSOLID", RecordKind::Property),
    ("PSHELL", RecordKind::Property),
    ("PBEAM", RecordKind::Property),
    ("PTRUSS", RecordKind::Property),
    ("MSET", RecordKind::MeshSet),
    ("MSETN", RecordKind::MeshSetNodes),
    ("MSETE", RecordKind::MeshSetElements),
    ("VER", RecordKind::Skipped),
    ("UNIT", RecordKind::Skipped),
    ("CSYS", RecordKind::Skipped),
    ("MATL", RecordKind::Skipped),
    ("MATD", RecordKind::Skipped),
    ("CONST", RecordKind::Skipped),
    ("LCSET", RecordKind::Skipped),
    ("STAGE", RecordKind::Skipped),
    ("SPC", RecordKind::Skipped),
    ("FORCE", RecordKind::Skipped),
    ("GRAV", RecordKind::Skipped),
    ("ANAL", RecordKind::Skipped),
];

pub fn lookup(keyword: &str) -> Option<RecordKind> {
    GRAMMAR
        .iter()
        .find(|(kw, _)| *kw == keyword)
        .map(|(_, kind)| *kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_element_kind_has_a_keyword() {
        for kind in ElementKind::ALL {
            assert!(
                GRAMMAR
                    .iter()
                    .any(|(_, rk)| *rk == RecordKind::Element(kind)),
                "no keyword for {kind}"
            );
        }
    }

    #[test]
    fn keywords_are_unique() {
        for (i, (kw, _)) in GRAMMAR.iter().enumerate() {
            assert!(
                GRAMMAR[i + 1..].iter().all(|(other, _)| other != kw),
                "duplicate keyword {kw}"
            );
        }
    }

    #[test]
    fn lookup_is_exact() {
        assert_eq!(lookup("PENTA"), Some(RecordKind::Element(ElementKind::Wedge6)));
        assert_eq!(lookup("MSETN"), Some(RecordKind::MeshSetNodes));
        assert_eq!(lookup("PENT"), None);
        assert_eq!(lookup("WEDGE"), None);
    }
}
