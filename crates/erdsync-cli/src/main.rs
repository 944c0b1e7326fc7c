//! erdsync CLI - ERD / dbt schema synchronization tool

mod args;
mod config;
mod output;

use std::process::ExitCode;

use clap::Parser;
use erdsync_core::{DbtProject, Diagram, Manifest, TransformFramework};
use miette::Result;

use crate::args::{Args, Command};
use crate::config::Config;
use crate::output::OutputFormatter;

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match (args.quiet, args.verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::WARN,
        (false, 1) => tracing::Level::INFO,
        (false, _) => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    match run(args) {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::from(2)
        }
    }
}

fn run(args: Args) -> Result<bool> {
    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::find_and_load()?.unwrap_or_default(),
    };

    let diagram_arg = match &args.command {
        Command::Infer { diagram } | Command::Sync { diagram } => diagram.clone(),
        _ => None,
    };
    let config = config.merge_with_args(
        &args.project_dir,
        &args.manifest,
        &diagram_arg,
        &args.format,
        args.include_unbound,
    );
    let formatter = OutputFormatter::new(config.output_format(), args.quiet);

    match args.command {
        Command::Infer { .. } => {
            let diagram = load_diagram(&config)?;
            // Inference reads schema files only; the manifest is optional
            let manifest_path = config.manifest_path();
            let manifest = if manifest_path.exists() {
                Manifest::from_file(&manifest_path)?
            } else {
                Manifest::default()
            };
            let project = DbtProject::new(config.project.clone(), manifest)?;
            let relationships = project.infer_relationships(&diagram)?;
            formatter.print_relationships(&relationships);
            Ok(false)
        }

        Command::Sync { .. } => {
            let diagram = load_diagram(&config)?;
            let project = open_project(&config)?;
            let report = project.sync_relationships(&diagram)?;
            formatter.print_report(&report);
            Ok(!report.is_success())
        }

        Command::Models => {
            let project = open_project(&config)?;
            formatter.print_models(&project.get_models()?);
            Ok(false)
        }

        Command::Show {
            model,
            model_version,
        } => {
            let project = open_project(&config)?;
            match project.get_model_schema(&model, model_version)? {
                Some(schema) => {
                    formatter.print_schema(&schema);
                    Ok(false)
                }
                None => {
                    eprintln!("Model '{}' is not documented in any schema file", model);
                    Ok(true)
                }
            }
        }
    }
}

fn open_project(config: &Config) -> Result<DbtProject<Manifest>> {
    let manifest = Manifest::from_file(&config.manifest_path())?;
    Ok(DbtProject::new(config.project.clone(), manifest)?)
}

fn load_diagram(config: &Config) -> Result<Diagram> {
    let Some(path) = &config.diagram else {
        miette::bail!("No diagram specified. Use --diagram or set `diagram` in erdsync.toml");
    };
    Ok(Diagram::from_file(path)?)
}
