//! Faculty Matrix CLI - Ingest timetable matrices into validated schedules
//!
//! # Main Commands
//!
//! ```bash
//! faculty-matrix ingest ce.xlsx -d CE -v vocabulary.json   # Full pipeline
//! faculty-matrix ingest a.xlsx b.ods -d CE -v vocab.json    # Several uploads at once
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! faculty-matrix inspect ce.xlsx            # Show detected block layouts
//! faculty-matrix validate response.json     # Check a saved response against the schema
//! faculty-matrix config                     # Show effective pipeline options
//! ```

use clap::{Parser, Subcommand};
use faculty_matrix::extract::scheduled_days;
use faculty_matrix::validation::schema::validate_matrix_response;
use faculty_matrix::{
    detect_layout, ingest_many, load_workbook, ColumnAxis, EntryExtractor, FailureResponse,
    FileFormat, JsonFileVocabulary, MatrixInput, MatrixResponse, PipelineOptions,
    VocabularyStore, DEFAULT_COLLEGE,
};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "faculty-matrix")]
#[command(about = "Turn faculty scheduling matrices into validated schedules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: workbook → layouts → entries → validated schedule
    Ingest {
        /// Input workbooks (xlsx, xls, ods, csv)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Department the matrices belong to
        #[arg(short, long)]
        department: String,

        /// College name
        #[arg(short, long, default_value = DEFAULT_COLLEGE)]
        college: String,

        /// Vocabulary JSON file: {"faculty": [...], "subjects": [...]}
        #[arg(short, long)]
        vocabulary: PathBuf,

        /// Force the input format instead of using the extension
        #[arg(short, long)]
        format: Option<FileFormat>,

        /// Subject/faculty separator in division cells
        #[arg(short, long)]
        separator: Option<String>,

        /// Longest run of identical cells read as one lab
        #[arg(long)]
        max_lab_span: Option<usize>,

        /// Meaning of schedule columns: division or faculty
        #[arg(long)]
        axis: Option<String>,

        /// Fraction of malformed blocks tolerated before the run fails
        #[arg(long)]
        tolerance: Option<f64>,

        /// Skip the schema check of the response
        #[arg(long)]
        no_validate: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write rejection reports to this file
        #[arg(short, long)]
        rejections: Option<PathBuf>,
    },

    /// Show how each block of a workbook is read
    Inspect {
        /// Input workbook
        input: PathBuf,

        /// Force the input format instead of using the extension
        #[arg(short, long)]
        format: Option<FileFormat>,

        /// Subject/faculty separator in division cells
        #[arg(short, long)]
        separator: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a saved success response against the response schema
    Validate {
        /// Response JSON file
        input: PathBuf,
    },

    /// Show the effective pipeline options
    Config,
}

/// Overrides collected from `ingest` flags.
struct IngestArgs {
    department: String,
    college: String,
    vocabulary: PathBuf,
    format: Option<FileFormat>,
    separator: Option<String>,
    max_lab_span: Option<usize>,
    axis: Option<String>,
    tolerance: Option<f64>,
    no_validate: bool,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Ingest {
            inputs,
            department,
            college,
            vocabulary,
            format,
            separator,
            max_lab_span,
            axis,
            tolerance,
            no_validate,
            output,
            rejections,
        } => {
            let args = IngestArgs {
                department,
                college,
                vocabulary,
                format,
                separator,
                max_lab_span,
                axis,
                tolerance,
                no_validate,
            };
            cmd_ingest(&inputs, args, output.as_deref(), rejections.as_deref()).await
        }

        Commands::Inspect {
            input,
            format,
            separator,
            output,
        } => cmd_inspect(&input, format, separator, output.as_deref()),

        Commands::Validate { input } => cmd_validate(&input),

        Commands::Config => cmd_config(),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn build_options(args: &IngestArgs) -> Result<PipelineOptions, Box<dyn std::error::Error>> {
    let mut options = PipelineOptions::from_env();

    if let Some(ref sep) = args.separator {
        if sep.is_empty() {
            return Err("separator must not be empty".into());
        }
        options = options.with_separator(sep.as_str());
    }
    if let Some(span) = args.max_lab_span {
        options.max_lab_span = span.max(1);
    }
    if let Some(ref axis) = args.axis {
        let axis = ColumnAxis::from_name(axis)
            .ok_or_else(|| format!("Unknown axis '{}', expected division or faculty", axis))?;
        options = options.with_column_axis(axis);
    }
    if let Some(tolerance) = args.tolerance {
        if !(0.0..=1.0).contains(&tolerance) {
            return Err(format!("Tolerance {} is outside 0..=1", tolerance).into());
        }
        options.malformed_block_tolerance = tolerance;
    }
    if args.no_validate {
        options.skip_validation = true;
    }

    Ok(options)
}

fn read_input(
    path: &Path,
    format: Option<FileFormat>,
    department: &str,
) -> Result<MatrixInput, Box<dyn std::error::Error>> {
    let input = match format {
        Some(format) => {
            let bytes = fs::read(path)?;
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("upload")
                .to_string();
            MatrixInput::new(bytes, format, department).with_source(name)
        }
        None => MatrixInput::from_file(path, department)?,
    };
    Ok(input)
}

async fn cmd_ingest(
    inputs: &[PathBuf],
    args: IngestArgs,
    output: Option<&Path>,
    rejections_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = build_options(&args)?;

    eprintln!("📚 Loading vocabulary: {}", args.vocabulary.display());
    let store = VocabularyStore::from_provider(&JsonFileVocabulary::new(&args.vocabulary))?;
    let snapshot = store.snapshot();
    eprintln!(
        "   {} faculty, {} subjects",
        snapshot.faculty.len(),
        snapshot.subjects.len()
    );

    let mut matrices = Vec::with_capacity(inputs.len());
    for path in inputs {
        eprintln!("📄 Queued: {}", path.display());
        let input = read_input(path, args.format, &args.department)?;
        matrices.push(input.with_college(args.college.as_str()));
    }

    eprintln!("\n⚙️  Running {} matrix pipeline(s)...", matrices.len());
    let results = ingest_many(matrices, &store, &options).await;

    let mut payloads = Vec::with_capacity(results.len());
    let mut reports = Vec::new();
    let mut failed = 0;

    for (path, result) in inputs.iter().zip(results) {
        match result {
            Ok(outcome) => {
                eprintln!(
                    "   ✅ {}: {} occurrences, {} rejected",
                    path.display(),
                    outcome.schedule.occurrence_count(),
                    outcome.rejections.entries.len()
                );
                if !outcome.rejections.is_empty() {
                    reports.push(json!({
                        "source": path.display().to_string(),
                        "rejections": &outcome.rejections,
                    }));
                }
                payloads.push(serde_json::to_value(MatrixResponse::from(outcome))?);
            }
            Err(err) => {
                failed += 1;
                eprintln!("   ❌ {}: {}", path.display(), err);
                let failure = FailureResponse::from(&err);
                if let Some(ref report) = failure.rejections {
                    reports.push(json!({
                        "source": path.display().to_string(),
                        "rejections": report,
                    }));
                }
                payloads.push(serde_json::to_value(failure)?);
            }
        }
    }

    if let Some(path) = rejections_path {
        let json = serde_json::to_string_pretty(&reports)?;
        fs::write(path, &json)?;
        eprintln!("💾 Rejections written to: {}", path.display());
    }

    let json = if payloads.len() == 1 {
        serde_json::to_string_pretty(&payloads[0])?
    } else {
        serde_json::to_string_pretty(&payloads)?
    };
    write_output(&json, output)?;

    if failed > 0 {
        return Err(format!("{} of {} matrix run(s) failed", failed, inputs.len()).into());
    }

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_inspect(
    input: &Path,
    format: Option<FileFormat>,
    separator: Option<String>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("🔍 Inspecting: {}", input.display());

    let format = match format {
        Some(format) => format,
        None => FileFormat::from_path(input)
            .ok_or_else(|| format!("Unsupported file type: {}", input.display()))?,
    };
    let mut options = PipelineOptions::from_env();
    if let Some(sep) = separator {
        options = options.with_separator(sep);
    }

    let bytes = fs::read(input)?;
    let workbook = load_workbook(&bytes, format)?;
    eprintln!("   Format: {}", workbook.format());
    eprintln!("   Blocks: {}", workbook.len());

    let mut summaries = Vec::with_capacity(workbook.len());
    for block in workbook.blocks() {
        let summary = match detect_layout(block, &options) {
            Ok(layout) => match EntryExtractor::new(block, &layout, &options) {
                Ok(extractor) => {
                    let entries: Vec<_> = extractor.entries().collect();
                    eprintln!(
                        "   ✅ {}: {:?}, {} lane(s), {} entries",
                        block.locator,
                        layout.orientation,
                        layout.lanes.len(),
                        entries.len()
                    );
                    json!({
                        "block": block.locator.to_string(),
                        "rows": block.height(),
                        "columns": block.width(),
                        "layout": &layout,
                        "entries": entries.len(),
                        "days": scheduled_days(entries),
                    })
                }
                Err(err) => malformed_summary(block.locator.to_string(), &err),
            },
            Err(err) => malformed_summary(block.locator.to_string(), &err),
        };
        summaries.push(summary);
    }

    let json = serde_json::to_string_pretty(&summaries)?;
    write_output(&json, output)?;

    Ok(())
}

fn malformed_summary(block: String, err: &impl std::fmt::Display) -> Value {
    eprintln!("   ⚠️  {}", err);
    json!({
        "block": block,
        "malformed": err.to_string(),
    })
}

fn cmd_validate(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Validating: {}", input.display());

    let content = fs::read_to_string(input)?;
    let response: Value = serde_json::from_str(&content)?;

    match validate_matrix_response(&response) {
        Ok(()) => {
            eprintln!("✅ Response is valid");
            Ok(())
        }
        Err(errors) => {
            eprintln!("\n❌ {} schema error(s):", errors.len());
            for err in errors.iter().take(10) {
                eprintln!("   - {}", err);
            }
            Err("response does not match the schema".into())
        }
    }
}

fn cmd_config() -> Result<(), Box<dyn std::error::Error>> {
    let options = PipelineOptions::from_env();
    println!("{}", serde_json::to_string_pretty(&options)?);
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
