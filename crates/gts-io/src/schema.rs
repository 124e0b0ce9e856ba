//! Machine-readable description of each format's options, for hosts that
//! render their own options panel.

use serde::Serialize;

use crate::numeric::MAX_PRECISION;
use crate::options::{
    AbaqusOptions, CoordinateConvention, FieldFormat, Flac3dOptions, Flac3dVersion, LengthUnit,
    LsDynaOptions, TargetFormat, WriteOptions,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionSchema {
    pub format: TargetFormat,
    pub extension: &'static str,
    pub options: Vec<OptionSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionSpec {
    pub key: &'static str,
    pub kind: OptionKind,
    /// String form accepted by [`WriteOptions::set`]; `None` if unset by default
    pub default: Option<String>,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OptionKind {
    Bool,
    Float,
    Integer { min: usize, max: usize },
    Choice { values: Vec<&'static str> },
    Text,
}

impl OptionSpec {
    fn new(key: &'static str, kind: OptionKind, description: &'static str) -> Self {
        Self {
            key,
            kind,
            default: None,
            description,
        }
    }

    fn default_value(mut self, value: impl ToString) -> Self {
        self.default = Some(value.to_string());
        self
    }
}

fn names<T>(choices: &[(&'static str, T)]) -> Vec<&'static str> {
    choices.iter().map(|(name, _)| *name).collect()
}

/// Recognized keys for `format`, with defaults taken from
/// [`WriteOptions::defaults`].
pub fn list_options(format: TargetFormat) -> OptionSchema {
    let defaults = WriteOptions::defaults(format);
    let common = defaults.common();

    let precision_default = match &defaults {
        WriteOptions::Flac3d(_) => Flac3dOptions::DEFAULT_PRECISION,
        WriteOptions::Abaqus(_) => AbaqusOptions::DEFAULT_PRECISION,
        WriteOptions::LsDyna(_) => LsDynaOptions::DEFAULT_PRECISION,
    };

    let mut options = vec![
        OptionSpec::new(
            "scale_factor",
            OptionKind::Float,
            "Multiplies every coordinate; must be finite and positive",
        )
        .default_value(common.scale_factor),
        OptionSpec::new(
            "precision",
            OptionKind::Integer {
                min: 1,
                max: MAX_PRECISION,
            },
            "Digits after the decimal point in coordinate output",
        )
        .default_value(precision_default),
        OptionSpec::new(
            "length_unit",
            OptionKind::Choice {
                values: names(LengthUnit::CHOICES),
            },
            "Length unit label written to the metadata block; coordinates are not converted",
        ),
        OptionSpec::new(
            "coordinates",
            OptionKind::Choice {
                values: names(CoordinateConvention::CHOICES),
            },
            "Vertical axis of the target; y-up maps (x, y, z) to (x, z, -y)",
        )
        .default_value(common.coordinates.name()),
        OptionSpec::new(
            "emit_metadata",
            OptionKind::Bool,
            "Write a comment block with tool version, counts, unit and timestamp",
        )
        .default_value(common.emit_metadata),
    ];

    match &defaults {
        WriteOptions::Flac3d(o) => options.extend([
            OptionSpec::new(
                "version",
                OptionKind::Choice {
                    values: names(Flac3dVersion::CHOICES),
                },
                "Grid flavour: 6 writes .f3grid with group slots, 5 writes legacy .flac3d",
            )
            .default_value(o.version.name()),
            OptionSpec::new(
                "group_by_property",
                OptionKind::Bool,
                "Add one zone/face group per property",
            )
            .default_value(o.group_by_property),
            OptionSpec::new(
                "skip_unsupported",
                OptionKind::Bool,
                "Drop beam elements with a warning instead of failing",
            )
            .default_value(o.skip_unsupported),
        ]),
        WriteOptions::Abaqus(o) => options.extend([
            OptionSpec::new("heading", OptionKind::Text, "Text of the *HEADING card"),
            OptionSpec::new(
                "reduced_integration",
                OptionKind::Bool,
                "Use C3D8R, S4R and S3R element types",
            )
            .default_value(o.reduced_integration),
            OptionSpec::new(
                "property_sets",
                OptionKind::Bool,
                "Write one *ELSET per property",
            )
            .default_value(o.property_sets),
        ]),
        WriteOptions::LsDyna(o) => options.extend([
            OptionSpec::new("title", OptionKind::Text, "Text of the *TITLE card, at most 80 characters"),
            OptionSpec::new(
                "field_format",
                OptionKind::Choice {
                    values: names(FieldFormat::CHOICES),
                },
                "Card layout: standard (8/16 columns), long (20 columns) or free (comma separated)",
            )
            .default_value(o.field_format.name()),
            OptionSpec::new(
                "renumber",
                OptionKind::Bool,
                "Renumber nodes and elements 1..N instead of keeping source ids",
            )
            .default_value(o.renumber),
        ]),
    }

    OptionSchema {
        format,
        extension: defaults.extension(),
        options,
    }
}
