//! `calcforge` command-line tool
//!
//! Evaluates calculator definitions stored as JSON, previews field substitution,
//! validates definitions and lists the built-in templates.

mod config;
mod logging;

use anyhow::{Context, Result, bail};
use calcforge_core::formula::dates::parse_date;
use calcforge_core::{CalculatorEngine, EvaluationResult, templates};
use calcforge_types::{CalculatorDefinition, FieldValueMap};
use chrono::{DateTime, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use config::{CalcforgeConfig, LogFormat};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "calcforge")]
#[command(about = "Evaluate user-built calculator formulas")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file; defaults to CALCFORGE_CONFIG_PATH or calcforge.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a calculator definition against a set of field values
    Eval {
        /// Calculator definition (JSON)
        #[arg(long)]
        definition: PathBuf,

        /// Field values keyed by field id (JSON object)
        #[arg(long)]
        values: PathBuf,

        /// Evaluation date (M/D/YYYY, YYYY-MM-DD or RFC 3339); defaults to now
        #[arg(long, value_parser = parse_as_of)]
        as_of: Option<DateTime<Utc>>,

        /// Skip the required-field and bounds checks
        #[arg(long)]
        skip_validation: bool,
    },

    /// Print a formula with field values spliced in
    Substitute {
        #[arg(long)]
        formula: String,

        /// Field values keyed by field id (JSON object)
        #[arg(long)]
        values: PathBuf,
    },

    /// Validate a calculator definition
    Check {
        #[arg(long)]
        definition: PathBuf,
    },

    /// List the built-in templates
    Templates {
        #[arg(long)]
        category: Option<String>,

        /// Print full definitions as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the helper functions and constants formulas can use
    Helpers,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = CalcforgeConfig::load(cli.config.as_deref())?;
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    logging::init(&config.logging);
    debug!(?config, "Configuration loaded");

    let engine = CalculatorEngine::with_config(config.engine);
    run(&engine, cli.command)
}

fn run(engine: &CalculatorEngine, command: Command) -> Result<ExitCode> {
    match command {
        Command::Eval { definition, values, as_of, skip_validation } => {
            let definition: CalculatorDefinition = read_json(&definition)?;
            let values: FieldValueMap = read_json(&values)?;
            let as_of = as_of.unwrap_or_else(Utc::now);

            info!(calculator = %definition.name, skip_validation, "Evaluating calculator");
            let result = if skip_validation {
                engine.evaluate_calculator(&definition.formula, &definition.fields, &values, as_of)
            } else {
                engine.run(&definition, &values, as_of)
            };

            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(exit_code(&result))
        }
        Command::Substitute { formula, values } => {
            let values: FieldValueMap = read_json(&values)?;
            let text = engine.substitute(&formula, &values)?;
            println!("{text}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { definition } => {
            let definition: CalculatorDefinition = read_json(&definition)?;
            match engine.validate_definition(&definition) {
                Ok(()) => {
                    println!("{}: ok", definition.name);
                    Ok(ExitCode::SUCCESS)
                }
                Err(error) => {
                    for problem in &error.problems {
                        eprintln!("{problem}");
                    }
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Templates { category, json } => {
            let selected: Vec<&templates::Template> = match &category {
                Some(category) => templates::by_category(category),
                None => templates::all().iter().collect(),
            };
            if selected.is_empty() {
                bail!(
                    "no templates in category '{}'; known categories: {}",
                    category.unwrap_or_default(),
                    templates::categories().join(", ")
                );
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&selected)?);
            } else {
                for template in selected {
                    println!("{:<20} {:<10} {}", template.id(), template.category, template.name());
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Helpers => {
            print!("{}", helper_listing(engine));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn helper_listing(engine: &CalculatorEngine) -> String {
    let functions = engine.functions();
    let mut listing = String::new();
    for name in functions.list_functions() {
        let description = functions.description(name).unwrap_or_default();
        listing.push_str(&format!("{name:<16} {description}\n"));
    }
    for name in functions.list_constants() {
        listing.push_str(&format!("Math.{name}\n"));
    }
    listing
}

fn exit_code(result: &EvaluationResult) -> ExitCode {
    if result.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn parse_as_of(text: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Ok(instant.with_timezone(&Utc));
    }
    parse_date(text)
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .ok_or_else(|| format!("'{text}' is not a date"))
}
