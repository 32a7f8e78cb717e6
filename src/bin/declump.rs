//! declump CLI binary entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use declump::analysis::FullAnalysis;
use declump::config::DeclumpConfig;
use declump::detect::Detector;
use declump::error::{DeclumpError, Result};
use declump::index::StructuralIndex;
use declump::interaction::{ExtractChoice, ScriptedUi};
use declump::model::{DeclRef, SourceModel};
use declump::refactor::Refactoring;

/// Data clump detector and extract-class refactoring engine.
#[derive(Parser)]
#[command(name = "declump")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the source model JSON
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Minimum shared properties for a clump (default: 3)
    #[arg(long, global = true)]
    min_properties: Option<usize>,

    /// Require matching modifiers during detection
    #[arg(long, global = true)]
    include_modifiers: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect data clumps across the whole model and emit a report.
    Analyze {
        /// Write the report here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,

        /// Project name recorded in the report
        #[arg(long)]
        project_name: Option<String>,
    },

    /// Detect data clumps involving one declaration.
    Detect {
        /// Qualified name of the class or function to inspect
        #[arg(long)]
        at: String,
    },

    /// Extract a clump into a new class and rewrite both declarations.
    Extract {
        /// Qualified name of the declaration owning the clump
        #[arg(long)]
        at: String,

        /// Which of the declaration's clumps to extract (default: first)
        #[arg(long, default_value_t = 0)]
        pick: usize,

        /// Name for the extracted class
        #[arg(long)]
        class_name: String,

        /// File path for the extracted class
        #[arg(long)]
        class_file: String,

        /// Apply the edits and write the updated model here
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(err) => {
            let code = err.error_code();
            eprintln!(
                "{{\"status\":\"error\",\"error\":{{\"code\":\"{}\",\"message\":\"{}\"}}}}",
                code,
                err.to_string().replace('"', "\\\"")
            );
            ExitCode::from(code.code())
        }
    }
}

fn run(cli: Cli) -> Result<String> {
    let model_path = cli
        .model
        .clone()
        .ok_or_else(|| DeclumpError::invalid_args("--model is required"))?;
    let model = load_model(&model_path)?;
    let config = DeclumpConfig {
        min_properties: cli
            .min_properties
            .unwrap_or(declump::config::DEFAULT_MIN_PROPERTIES),
        include_modifiers_in_detection: cli.include_modifiers,
        include_modifiers_in_extraction: cli.include_modifiers,
    }
    .normalized()?;

    match cli.command {
        Commands::Analyze { out, project_name } => {
            let analysis = FullAnalysis::new(&model, config)?;
            let report = analysis.report(project_name);
            let json = report.to_json_pretty()?;
            match out {
                Some(path) => {
                    std::fs::write(&path, &json)?;
                    Ok(format!(
                        "{{\"status\":\"ok\",\"report\":\"{}\"}}",
                        path.display()
                    ))
                }
                None => Ok(json),
            }
        }
        Commands::Detect { at } => {
            let decl = resolve(&model, &at)?;
            let clumps = detect_at(&model, &config, decl);
            Ok(serde_json::to_string_pretty(&clumps)?)
        }
        Commands::Extract {
            at,
            pick,
            class_name,
            class_file,
            out,
        } => {
            let decl = resolve(&model, &at)?;
            let clumps = detect_at(&model, &config, decl);
            let clump = clumps.get(pick).ok_or_else(|| {
                DeclumpError::invalid_args(format!(
                    "declaration '{}' has {} clump(s), cannot pick #{}",
                    at,
                    clumps.len(),
                    pick
                ))
            })?;

            let ui = ScriptedUi::new();
            ui.push_choice(Some(ExtractChoice::NewClass {
                name: class_name,
                file: class_file,
            }));
            let plan = Refactoring::new(&model, &config, &ui).plan(clump)?;

            match out {
                Some(path) => {
                    let mut updated = model;
                    updated.apply(&plan.edits)?;
                    std::fs::write(&path, serde_json::to_string_pretty(&updated)?)?;
                    Ok(format!(
                        "{{\"status\":\"ok\",\"class\":\"{}\",\"model\":\"{}\"}}",
                        plan.class_name,
                        path.display()
                    ))
                }
                None => Ok(serde_json::to_string_pretty(&plan.edits)?),
            }
        }
    }
}

fn load_model(path: &PathBuf) -> Result<SourceModel> {
    let text = std::fs::read_to_string(path)
        .map_err(|_| DeclumpError::FileNotFound {
            path: path.display().to_string(),
        })?;
    SourceModel::from_json(&text)
}

fn resolve(model: &SourceModel, qualified_name: &str) -> Result<DeclRef> {
    if let Some(class) = model.class_by_qualified_name(qualified_name) {
        return Ok(DeclRef::Class(class.id));
    }
    if let Some(function) = model.function_by_qualified_name(qualified_name) {
        return Ok(DeclRef::Function(function.id));
    }
    Err(DeclumpError::declaration_not_found(qualified_name))
}

fn detect_at(
    model: &SourceModel,
    config: &DeclumpConfig,
    decl: DeclRef,
) -> Vec<declump::detect::Clump> {
    let mut index = StructuralIndex::build(model, config.min_properties);
    let mut detector = Detector::new(model, &mut index, config);
    detector.detect(decl)
}
