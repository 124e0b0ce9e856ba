//! Writer options.
//!
//! Every target format has a closed option set. Options can be built in code
//! or from `key=value` string pairs (what a host UI or the CLI collects);
//! either way [`WriteOptions::validate`] runs before any output is created.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OptionError;
use crate::numeric::MAX_PRECISION;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Flac3d,
    Abaqus,
    LsDyna,
}

impl TargetFormat {
    pub const ALL: [TargetFormat; 3] = [TargetFormat::Flac3d, TargetFormat::Abaqus, TargetFormat::LsDyna];

    pub fn name(&self) -> &'static str {
        match self {
            TargetFormat::Flac3d => "flac3d",
            TargetFormat::Abaqus => "abaqus",
            TargetFormat::LsDyna => "lsdyna",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetFormat::Flac3d => "FLAC3D",
            TargetFormat::Abaqus => "Abaqus",
            TargetFormat::LsDyna => "LS-DYNA",
        })
    }
}

impl FromStr for TargetFormat {
    type Err = OptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flac3d" | "flac" => Ok(TargetFormat::Flac3d),
            "abaqus" | "inp" => Ok(TargetFormat::Abaqus),
            "lsdyna" | "ls-dyna" | "dyna" => Ok(TargetFormat::LsDyna),
            _ => Err(OptionError::UnknownFormat(s.to_string())),
        }
    }
}

/// Length unit label. Coordinates are not converted; use `scale_factor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    M,
    Mm,
    Cm,
    Km,
    In,
    Ft,
}

impl LengthUnit {
    pub const CHOICES: &'static [(&'static str, LengthUnit)] = &[
        ("m", LengthUnit::M),
        ("mm", LengthUnit::Mm),
        ("cm", LengthUnit::Cm),
        ("km", LengthUnit::Km),
        ("in", LengthUnit::In),
        ("ft", LengthUnit::Ft),
    ];

    pub fn name(&self) -> &'static str {
        choice_name(Self::CHOICES, *self)
    }
}

/// Vertical-axis convention of the target. The source is Z-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinateConvention {
    #[default]
    ZUp,
    /// (x, y, z) → (x, z, -y)
    YUp,
}

impl CoordinateConvention {
    pub const CHOICES: &'static [(&'static str, CoordinateConvention)] = &[
        ("z-up", CoordinateConvention::ZUp),
        ("y-up", CoordinateConvention::YUp),
    ];

    pub fn name(&self) -> &'static str {
        choice_name(Self::CHOICES, *self)
    }

    pub fn apply(&self, [x, y, z]: [f64; 3]) -> [f64; 3] {
        match self {
            CoordinateConvention::ZUp => [x, y, z],
            CoordinateConvention::YUp => [x, z, -y],
        }
    }
}

/// Keys shared by every format.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonOptions {
    pub scale_factor: f64,
    /// Digits after the decimal point; `None` picks the writer default.
    pub precision: Option<usize>,
    pub length_unit: Option<LengthUnit>,
    pub coordinates: CoordinateConvention,
    pub emit_metadata: bool,
}

impl Default for CommonOptions {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            precision: None,
            length_unit: None,
            coordinates: CoordinateConvention::ZUp,
            emit_metadata: true,
        }
    }
}

impl CommonOptions {
    pub const KEYS: &'static [&'static str] =
        &["scale_factor", "precision", "length_unit", "coordinates", "emit_metadata"];

    /// Returns `Ok(false)` if `key` is not a common key.
    fn set(&mut self, key: &str, value: &str) -> Result<bool, OptionError> {
        match key {
            "scale_factor" => self.scale_factor = parse_f64(key, value)?,
            "precision" => self.precision = Some(parse_usize(key, value)?),
            "length_unit" => self.length_unit = Some(parse_choice(key, value, LengthUnit::CHOICES)?),
            "coordinates" => self.coordinates = parse_choice(key, value, CoordinateConvention::CHOICES)?,
            "emit_metadata" => self.emit_metadata = parse_bool(key, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn validate(&self, max_precision: usize) -> Result<(), OptionError> {
        if !self.scale_factor.is_finite() || self.scale_factor <= 0.0 {
            return Err(OptionError::OutOfRange {
                key: "scale_factor",
                message: format!("{} is not a finite positive number", self.scale_factor),
            });
        }
        if let Some(precision) = self.precision {
            if !(1..=max_precision).contains(&precision) {
                return Err(OptionError::OutOfRange {
                    key: "precision",
                    message: format!("{precision} is outside 1..={max_precision}"),
                });
            }
        }
        Ok(())
    }

    /// Map a source coordinate into the target frame.
    pub fn transform(&self, coords: [f64; 3]) -> [f64; 3] {
        self.coordinates.apply(coords).map(|c| c * self.scale_factor)
    }

    pub fn precision_or(&self, default: usize) -> usize {
        self.precision.unwrap_or(default)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flac3dVersion {
    /// FLAC3D 6 and later, `.f3grid`
    #[default]
    V6,
    /// FLAC3D 5 legacy grid, `.flac3d`
    V5,
}

impl Flac3dVersion {
    pub const CHOICES: &'static [(&'static str, Flac3dVersion)] =
        &[("6", Flac3dVersion::V6), ("5", Flac3dVersion::V5)];

    pub fn name(&self) -> &'static str {
        choice_name(Self::CHOICES, *self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Flac3dOptions {
    pub common: CommonOptions,
    pub version: Flac3dVersion,
    /// Add one zone/face group per property
    pub group_by_property: bool,
    /// Drop elements FLAC3D cannot hold (beams) instead of failing
    pub skip_unsupported: bool,
}

impl Default for Flac3dOptions {
    fn default() -> Self {
        Self {
            common: CommonOptions::default(),
            version: Flac3dVersion::V6,
            group_by_property: true,
            skip_unsupported: false,
        }
    }
}

impl Flac3dOptions {
    pub const DEFAULT_PRECISION: usize = 15;

    pub fn precision(&self) -> usize {
        self.common.precision_or(Self::DEFAULT_PRECISION)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AbaqusOptions {
    pub common: CommonOptions,
    /// `*HEADING` text; a default line is written when unset
    pub heading: Option<String>,
    /// C3D8R/S4R/S3R instead of full integration
    pub reduced_integration: bool,
    /// Emit one `*ELSET` per property
    pub property_sets: bool,
}

impl Default for AbaqusOptions {
    fn default() -> Self {
        Self {
            common: CommonOptions::default(),
            heading: None,
            reduced_integration: false,
            property_sets: true,
        }
    }
}

impl AbaqusOptions {
    pub const DEFAULT_PRECISION: usize = 15;

    pub fn precision(&self) -> usize {
        self.common.precision_or(Self::DEFAULT_PRECISION)
    }
}

/// LS-DYNA card layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldFormat {
    /// I8 / E16, sets and parts I10
    Standard,
    /// 20-character fields, `*KEYWORD LONG=Y`
    #[default]
    Long,
    /// Comma-separated, each value no longer than its standard field
    Free,
}

impl FieldFormat {
    pub const CHOICES: &'static [(&'static str, FieldFormat)] = &[
        ("standard", FieldFormat::Standard),
        ("long", FieldFormat::Long),
        ("free", FieldFormat::Free),
    ];

    pub fn name(&self) -> &'static str {
        choice_name(Self::CHOICES, *self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LsDynaOptions {
    pub common: CommonOptions,
    /// `*TITLE` text, at most 80 characters
    pub title: Option<String>,
    pub field_format: FieldFormat,
    /// Renumber nodes and elements 1..N instead of keeping source ids
    pub renumber: bool,
}

impl Default for LsDynaOptions {
    fn default() -> Self {
        Self {
            common: CommonOptions::default(),
            title: None,
            field_format: FieldFormat::Long,
            renumber: false,
        }
    }
}

impl LsDynaOptions {
    pub const MAX_TITLE: usize = 80;
    pub const DEFAULT_PRECISION: usize = 15;

    /// Requested digits after the point; a real keeps fewer when its field is
    /// too narrow.
    pub fn precision(&self) -> usize {
        self.common.precision_or(Self::DEFAULT_PRECISION)
    }
}

/// Options for one write, tagged by target format.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOptions {
    Flac3d(Flac3dOptions),
    Abaqus(AbaqusOptions),
    LsDyna(LsDynaOptions),
}

impl WriteOptions {
    pub fn defaults(format: TargetFormat) -> Self {
        match format {
            TargetFormat::Flac3d => WriteOptions::Flac3d(Flac3dOptions::default()),
            TargetFormat::Abaqus => WriteOptions::Abaqus(AbaqusOptions::default()),
            TargetFormat::LsDyna => WriteOptions::LsDyna(LsDynaOptions::default()),
        }
    }

    /// Defaults for `format` with `pairs` applied in order, then validated.
    pub fn from_pairs<I, K, V>(format: TargetFormat, pairs: I) -> Result<Self, OptionError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::defaults(format);
        for (key, value) in pairs {
            options.set(key.as_ref(), value.as_ref())?;
        }
        options.validate()?;
        Ok(options)
    }

    pub fn format(&self) -> TargetFormat {
        match self {
            WriteOptions::Flac3d(_) => TargetFormat::Flac3d,
            WriteOptions::Abaqus(_) => TargetFormat::Abaqus,
            WriteOptions::LsDyna(_) => TargetFormat::LsDyna,
        }
    }

    pub fn common(&self) -> &CommonOptions {
        match self {
            WriteOptions::Flac3d(o) => &o.common,
            WriteOptions::Abaqus(o) => &o.common,
            WriteOptions::LsDyna(o) => &o.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut CommonOptions {
        match self {
            WriteOptions::Flac3d(o) => &mut o.common,
            WriteOptions::Abaqus(o) => &mut o.common,
            WriteOptions::LsDyna(o) => &mut o.common,
        }
    }

    /// File extension of the output, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            WriteOptions::Flac3d(o) => match o.version {
                Flac3dVersion::V6 => "f3grid",
                Flac3dVersion::V5 => "flac3d",
            },
            WriteOptions::Abaqus(_) => "inp",
            WriteOptions::LsDyna(_) => "k",
        }
    }

    /// Set one option from its string form. Keys are case-insensitive and
    /// `-` is accepted in place of `_`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), OptionError> {
        let format = self.format();
        let key = key.trim().to_lowercase().replace('-', "_");
        let value = value.trim();
        if self.common_mut().set(&key, value)? {
            return Ok(());
        }
        match (self, key.as_str()) {
            (WriteOptions::Flac3d(o), "version") => {
                o.version = parse_choice(&key, value, Flac3dVersion::CHOICES)?
            }
            (WriteOptions::Flac3d(o), "group_by_property") => {
                o.group_by_property = parse_bool(&key, value)?
            }
            (WriteOptions::Flac3d(o), "skip_unsupported") => {
                o.skip_unsupported = parse_bool(&key, value)?
            }
            (WriteOptions::Abaqus(o), "heading") => o.heading = Some(value.to_string()),
            (WriteOptions::Abaqus(o), "reduced_integration") => {
                o.reduced_integration = parse_bool(&key, value)?
            }
            (WriteOptions::Abaqus(o), "property_sets") => o.property_sets = parse_bool(&key, value)?,
            (WriteOptions::LsDyna(o), "title") => o.title = Some(value.to_string()),
            (WriteOptions::LsDyna(o), "field_format") => {
                o.field_format = parse_choice(&key, value, FieldFormat::CHOICES)?
            }
            (WriteOptions::LsDyna(o), "renumber") => o.renumber = parse_bool(&key, value)?,
            _ => return Err(OptionError::UnknownKey { format, key }),
        }
        Ok(())
    }

    /// Check ranges and cross-option constraints.
    pub fn validate(&self) -> Result<(), OptionError> {
        match self {
            WriteOptions::Flac3d(o) => o.common.validate(MAX_PRECISION),
            WriteOptions::Abaqus(o) => {
                o.common.validate(MAX_PRECISION)?;
                if let Some(heading) = &o.heading {
                    reject_line_breaks("heading", heading)?;
                }
                Ok(())
            }
            WriteOptions::LsDyna(o) => {
                o.common.validate(MAX_PRECISION)?;
                if let Some(title) = &o.title {
                    reject_line_breaks("title", title)?;
                    let len = title.chars().count();
                    if len > LsDynaOptions::MAX_TITLE {
                        return Err(OptionError::OutOfRange {
                            key: "title",
                            message: format!(
                                "{len} characters, at most {} fit the *TITLE card",
                                LsDynaOptions::MAX_TITLE
                            ),
                        });
                    }
                }
                Ok(())
            }
        }
    }
}

fn reject_line_breaks(key: &'static str, text: &str) -> Result<(), OptionError> {
    if text.contains(['\n', '\r']) {
        return Err(OptionError::OutOfRange {
            key,
            message: "must be a single line".to_string(),
        });
    }
    Ok(())
}

fn invalid(key: &str, value: &str, expected: impl Into<String>) -> OptionError {
    OptionError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected: expected.into(),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, OptionError> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(key, value, "true or false")),
    }
}

fn parse_f64(key: &str, value: &str) -> Result<f64, OptionError> {
    value.parse().map_err(|_| invalid(key, value, "a number"))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, OptionError> {
    value.parse().map_err(|_| invalid(key, value, "a non-negative integer"))
}

fn parse_choice<T: Copy>(key: &str, value: &str, choices: &[(&'static str, T)]) -> Result<T, OptionError> {
    let wanted = value.to_lowercase();
    choices
        .iter()
        .find(|(name, _)| *name == wanted)
        .map(|(_, v)| *v)
        .ok_or_else(|| {
            let names: Vec<&str> = choices.iter().map(|(name, _)| *name).collect();
            invalid(key, value, format!("one of {}", names.join(", ")))
        })
}

fn choice_name<T: Copy + PartialEq>(choices: &[(&'static str, T)], value: T) -> &'static str {
    choices
        .iter()
        .find(|(_, v)| *v == value)
        .map(|(name, _)| *name)
        .unwrap_or("?")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_override_defaults() {
        let options = WriteOptions::from_pairs(
            TargetFormat::Flac3d,
            [("scale_factor", "0.001"), ("version", "5"), ("Skip-Unsupported", "yes")],
        )
        .unwrap();
        let WriteOptions::Flac3d(o) = &options else {
            panic!("wrong variant");
        };
        assert_eq!(o.common.scale_factor, 0.001);
        assert_eq!(o.version, Flac3dVersion::V5);
        assert!(o.skip_unsupported);
        assert_eq!(options.extension(), "flac3d");
    }

    #[test]
    fn unknown_key_names_the_format() {
        let err = WriteOptions::from_pairs(TargetFormat::Abaqus, [("renumber", "true")]).unwrap_err();
        assert_eq!(
            err,
            OptionError::UnknownKey {
                format: TargetFormat::Abaqus,
                key: "renumber".into()
            }
        );
        assert_eq!(err.to_string(), "unknown option 'renumber' for Abaqus");
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = WriteOptions::from_pairs(TargetFormat::LsDyna, [("field_format", "wide")]).unwrap_err();
        assert!(matches!(err, OptionError::InvalidValue { ref expected, .. } if expected.contains("standard")));

        let err = WriteOptions::from_pairs(TargetFormat::Abaqus, [("scale_factor", "-2")]).unwrap_err();
        assert!(matches!(err, OptionError::OutOfRange { key: "scale_factor", .. }));

        let err = WriteOptions::from_pairs(TargetFormat::Flac3d, [("precision", "0")]).unwrap_err();
        assert!(matches!(err, OptionError::OutOfRange { key: "precision", .. }));
    }

    #[test]
    fn lsdyna_precision_does_not_depend_on_field_format() {
        let WriteOptions::LsDyna(o) =
            WriteOptions::from_pairs(TargetFormat::LsDyna, [("precision", "16"), ("field_format", "standard")])
                .unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(o.precision(), 16);
        assert_eq!(LsDynaOptions::default().precision(), LsDynaOptions::DEFAULT_PRECISION);
        let err = WriteOptions::from_pairs(TargetFormat::LsDyna, [("precision", "17")]).unwrap_err();
        assert!(matches!(err, OptionError::OutOfRange { key: "precision", .. }));
    }

    #[test]
    fn title_must_fit_the_card() {
        let long = "x".repeat(81);
        let err = WriteOptions::from_pairs(TargetFormat::LsDyna, [("title", long.as_str())]).unwrap_err();
        assert!(matches!(err, OptionError::OutOfRange { key: "title", .. }));
    }

    #[test]
    fn y_up_rotates_then_scales() {
        let common = CommonOptions {
            scale_factor: 2.0,
            coordinates: CoordinateConvention::YUp,
            ..CommonOptions::default()
        };
        assert_eq!(common.transform([1.0, 2.0, 3.0]), [2.0, 6.0, -4.0]);
    }

    #[test]
    fn target_format_parses_aliases() {
        assert_eq!("LS-DYNA".parse::<TargetFormat>().unwrap(), TargetFormat::LsDyna);
        assert_eq!("flac3d".parse::<TargetFormat>().unwrap(), TargetFormat::Flac3d);
        assert!(matches!("nastran".parse::<TargetFormat>(), Err(OptionError::UnknownFormat(_))));
    }
}
