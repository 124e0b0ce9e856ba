//! Conversion surface for Midas GTS meshes.
//!
//! This crate provides:
//! - [`read`]: the `.fpn` reader, re-exported from `gts-fpn`
//! - [`write`]: FLAC3D, Abaqus and LS-DYNA writers behind one entry point
//! - [`list_options`]: the recognized option keys of each target format
//!
//! All runs are blocking and report through a [`ProgressSink`]. Output is
//! staged next to its destination and only moved into place when the write
//! completes, so a failed or cancelled run leaves no partial file.
//!
//! ```rust,no_run
//! use gts_io::{NoProgress, TargetFormat, WriteOptions};
//!
//! let model = gts_io::read("tunnel.fpn", &mut NoProgress)?;
//! let options = WriteOptions::from_pairs(TargetFormat::Abaqus, [("scale_factor", "0.001")])?;
//! let path = gts_io::write(&model, &options, "out/tunnel", &mut NoProgress)?;
//! println!("wrote {}", path.display());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod abaqus;
pub mod error;
pub mod flac3d;
pub mod lsdyna;
pub mod numeric;
pub mod options;
mod output;
pub mod renumber;
pub mod schema;
mod writer;

use std::path::{Path, PathBuf};

use tracing::info;

pub use abaqus::AbaqusWriter;
pub use error::{OptionError, Result, WriteError};
pub use flac3d::Flac3dWriter;
pub use gts_fpn::{ParseError, ReadError, read, read_str};
pub use gts_model::{
    Cancellable, Cancelled, MeshModel, MeshSummary, NoProgress, ProgressSink, ProgressTracker,
    ProgressUpdate, ValidationError,
};
pub use lsdyna::LsDynaWriter;
pub use options::{
    AbaqusOptions, CommonOptions, CoordinateConvention, FieldFormat, Flac3dOptions, Flac3dVersion,
    LengthUnit, LsDynaOptions, TargetFormat, WriteOptions,
};
pub use output::output_path;
pub use renumber::{IdPolicy, Renumbering};
pub use schema::{OptionKind, OptionSchema, OptionSpec, list_options};
pub use writer::MeshWriter;

use output::OutputFile;

/// Write `model` in the format selected by `options`.
///
/// `output` is the destination without extension (an existing matching
/// extension is kept). Options are validated before the filesystem is
/// touched. Returns the path of the written file.
pub fn write(
    model: &MeshModel,
    options: &WriteOptions,
    output: impl AsRef<Path>,
    progress: &mut dyn ProgressSink,
) -> Result<PathBuf> {
    options.validate()?;
    match options {
        WriteOptions::Flac3d(o) => run(&Flac3dWriter::new(model, o)?, options, output.as_ref(), progress),
        WriteOptions::Abaqus(o) => run(&AbaqusWriter::new(model, o)?, options, output.as_ref(), progress),
        WriteOptions::LsDyna(o) => run(&LsDynaWriter::new(model, o)?, options, output.as_ref(), progress),
    }
}

fn run(
    writer: &dyn MeshWriter,
    options: &WriteOptions,
    output: &Path,
    progress: &mut dyn ProgressSink,
) -> Result<PathBuf> {
    let path = output_path(output, options.extension());
    info!(format = %writer.format(), path = %path.display(), "writing mesh");

    let mut tracker = ProgressTracker::new(progress, writer.work_units());
    let mut file = OutputFile::create(&path)?;
    writer
        .write_to(file.writer(), &mut tracker)
        .map_err(|e| e.at_path(&path))?;

    tracker.stage("Saving")?;
    let path = file.commit()?;
    tracker.finish(format!("Wrote {}", path.display()));
    info!(path = %path.display(), "mesh written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::testing::solid_model;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn writes_each_format_with_its_extension() {
        let dir = tempfile::tempdir().unwrap();
        let model = solid_model();
        for (format, ext) in [
            (TargetFormat::Flac3d, "f3grid"),
            (TargetFormat::Abaqus, "inp"),
            (TargetFormat::LsDyna, "k"),
        ] {
            let options = WriteOptions::defaults(format);
            let path = write(&model, &options, dir.path().join("mesh"), &mut NoProgress).unwrap();
            assert_eq!(path, dir.path().join(format!("mesh.{ext}")));
            assert!(path.is_file());
        }
    }

    #[test]
    fn progress_ends_at_one_hundred() {
        let dir = tempfile::tempdir().unwrap();
        let mut updates = Vec::new();
        let mut sink = |u: &ProgressUpdate| updates.push(u.clone());
        let options = WriteOptions::defaults(TargetFormat::Abaqus);
        write(&solid_model(), &options, dir.path().join("m"), &mut sink).unwrap();
        let last = updates.last().unwrap();
        assert_eq!(last.percent, 100);
        assert!(last.message.starts_with("Wrote "));
        assert!(updates.windows(2).all(|w| w[0].percent <= w[1].percent));
    }

    #[test]
    fn invalid_options_fail_before_creating_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = WriteOptions::defaults(TargetFormat::Flac3d);
        options.common_mut().scale_factor = 0.0;
        let err = write(&solid_model(), &options, dir.path().join("sub/m"), &mut NoProgress).unwrap_err();
        assert!(matches!(err, WriteError::Option(_)));
        assert!(!dir.path().join("sub").exists());
    }

    #[test]
    fn cancelled_run_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let flag = Arc::new(AtomicBool::new(true));
        let mut sink = Cancellable::new(NoProgress, flag.clone());
        let options = WriteOptions::defaults(TargetFormat::LsDyna);
        let err = write(&solid_model(), &options, dir.path().join("m"), &mut sink).unwrap_err();
        assert!(matches!(err, WriteError::Cancelled(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(flag.load(Ordering::Relaxed));
    }
}
