use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use gts_io::{
    MeshModel, MeshSummary, OptionKind, OptionSchema, ProgressUpdate, TargetFormat, WriteOptions,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn Error>>;

/// Convert Midas GTS NX .fpn meshes to FLAC3D, Abaqus and LS-DYNA.
#[derive(Parser, Debug)]
#[command(name = "gts-export", version)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug); RUST_LOG applies otherwise
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read an .fpn file and write it in a target format
    Convert(ConvertArgs),
    /// Print a summary of an .fpn file
    Inspect {
        input: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List the options a target format accepts
    Options {
        format: TargetFormat,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct ConvertArgs {
    input: PathBuf,

    /// flac3d, abaqus or lsdyna
    #[arg(short, long)]
    format: TargetFormat,

    /// Directory for the output file [default: next to the input]
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output base name without extension [default: input file stem]
    #[arg(short, long)]
    name: Option<String>,

    /// Writer option, repeatable; applied after --options
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_pair)]
    set: Vec<(String, String)>,

    /// Flat JSON object of writer options
    #[arg(long = "options", value_name = "FILE")]
    options_file: Option<PathBuf>,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, found '{raw}'")),
    }
}

/// Option pairs from a flat JSON object. Numbers and booleans are passed on
/// in their JSON spelling.
fn load_option_file(path: &Path) -> CliResult<Vec<(String, String)>> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("failed to read options file {}: {e}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| format!("invalid options file {}: {e}", path.display()))?;
    let serde_json::Value::Object(entries) = value else {
        return Err(format!("options file {} must contain a JSON object", path.display()).into());
    };
    let mut pairs = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let text = match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            other => {
                return Err(format!("option '{key}' must be a string, number or boolean, found {other}").into());
            }
        };
        pairs.push((key, text));
    }
    Ok(pairs)
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

fn read_model(input: &Path) -> CliResult<MeshModel> {
    let bar = progress_bar();
    let mut sink = |u: &ProgressUpdate| {
        bar.set_position(u.percent.into());
        bar.set_message(u.message.clone());
    };
    let model = gts_io::read(input, &mut sink);
    bar.finish_and_clear();
    Ok(model?)
}

fn output_base(args: &ConvertArgs) -> PathBuf {
    let dir = match &args.output_dir {
        Some(dir) => dir.clone(),
        None => args.input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    let name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mesh".to_string()),
    };
    dir.join(name)
}

fn convert(args: &ConvertArgs) -> CliResult<()> {
    let mut pairs = match &args.options_file {
        Some(path) => load_option_file(path)?,
        None => Vec::new(),
    };
    pairs.extend(args.set.iter().cloned());
    // Validate before reading so a typo does not cost a full parse.
    let options = WriteOptions::from_pairs(args.format, pairs)?;
    debug!(?options, "writer options");

    let model = read_model(&args.input)?;
    info!(
        nodes = model.node_count(),
        elements = model.element_count(),
        "model loaded"
    );

    let bar = progress_bar();
    let mut sink = |u: &ProgressUpdate| {
        bar.set_position(u.percent.into());
        bar.set_message(u.message.clone());
    };
    let written = gts_io::write(&model, &options, output_base(args), &mut sink);
    bar.finish_and_clear();
    println!("{}", written?.display());
    Ok(())
}

fn print_summary(summary: &MeshSummary) {
    println!("nodes: {}", summary.node_count);
    println!("elements: {}", summary.element_count);
    for (kind, count) in &summary.elements_by_kind {
        println!("  {kind}: {count}");
    }
    println!("properties: {}", summary.property_count);
    if let Some(dimension) = summary.primary_dimension() {
        println!("dimension: {dimension}");
    }
    if let Some((min, max)) = summary.bounds {
        println!("bounds_min: {} {} {}", min[0], min[1], min[2]);
        println!("bounds_max: {} {} {}", max[0], max[1], max[2]);
    }
    println!("groups: {}", summary.groups.len());
    for group in &summary.groups {
        println!("  {}: {} nodes, {} elements", group.name, group.nodes, group.elements);
    }
}

fn kind_label(kind: &OptionKind) -> String {
    match kind {
        OptionKind::Bool => "bool".to_string(),
        OptionKind::Float => "float".to_string(),
        OptionKind::Integer { min, max } => format!("{min}..={max}"),
        OptionKind::Choice { values } => values.join("|"),
        OptionKind::Text => "text".to_string(),
    }
}

fn print_schema(schema: &OptionSchema) {
    println!("{} options (.{})", schema.format, schema.extension);
    for spec in &schema.options {
        let default = spec.default.as_deref().unwrap_or("-");
        println!(
            "  {:<20} {:<24} default {:<8} {}",
            spec.key,
            kind_label(&spec.kind),
            default,
            spec.description
        );
    }
}

fn run(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Command::Convert(args) => convert(args),
        Command::Inspect { input, json } => {
            let model = read_model(input)?;
            let summary = MeshSummary::from_model(&model);
            if *json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
            Ok(())
        }
        Command::Options { format, json } => {
            let schema = gts_io::list_options(*format);
            if *json {
                println!("{}", serde_json::to_string_pretty(&schema)?);
            } else {
                print_schema(&schema);
            }
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}
