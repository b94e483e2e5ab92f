use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use tour_extract::calendar::parse_shamsi;
use tour_extract::config::{api_key_from_env, Settings};
use tour_extract::pipeline::processor::{DocumentProcessor, ProcessOptions};
use tour_extract::pipeline::structuring::{ExtractionRequester, GeminiClient, ParsedReply};
use tour_extract::summary::{render_reply, render_summary};

/// Exit code when the model answered but its reply could not be decoded.
const EXIT_UNPARSEABLE: u8 = 2;

#[derive(Parser)]
#[command(name = "tour-extract", version)]
#[command(about = "Extract structured itineraries from tour documents")]
struct Cli {
    /// Config file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract a tour from a PDF, image or text file
    Extract {
        file: PathBuf,
        /// Shamsi year assumed when the document omits it
        #[arg(long)]
        year: Option<i32>,
        /// Candidate models, tried in order
        #[arg(long, value_delimiter = ',')]
        models: Vec<String>,
        /// Send the PDF text layer instead of the document when present
        #[arg(long)]
        local_text: bool,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Convert a Shamsi date to Gregorian
    Convert {
        date: String,
        #[arg(long)]
        year: Option<i32>,
    },
    /// Print the effective candidate model list
    Models,
}

fn main() -> ExitCode {
    tour_extract::init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    settings.apply_env_overrides(|k| std::env::var(k).ok());

    match cli.cmd {
        Command::Extract {
            file,
            year,
            models,
            local_text,
            json,
        } => {
            if !models.is_empty() {
                settings.candidate_models = models;
            }
            if let Some(year) = year {
                settings.default_year = year;
            }
            settings.validate().context("Invalid settings")?;
            extract(&settings, file, local_text, json)
        }
        Command::Convert { date, year } => {
            let year = year.unwrap_or(settings.default_year);
            let shamsi = parse_shamsi(&date, Some(year))
                .with_context(|| format!("Cannot parse '{date}'"))?;
            let gregorian = shamsi.to_gregorian().context("Conversion failed")?;
            println!("{}", gregorian.format("%Y-%m-%d"));
            Ok(ExitCode::SUCCESS)
        }
        Command::Models => {
            settings.validate().context("Invalid settings")?;
            for model in &settings.candidate_models {
                println!("{model}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn extract(settings: &Settings, file: PathBuf, local_text: bool, json: bool) -> Result<ExitCode> {
    let api_key = api_key_from_env()?;
    let client = GeminiClient::new(
        &settings.api_base_url,
        api_key,
        settings.request_timeout_secs,
    )
    .context("Failed to build HTTP client")?;

    let requester =
        ExtractionRequester::new(Arc::new(client)).with_policy(settings.fallback_policy());
    let processor = DocumentProcessor::new(requester);
    let options = ProcessOptions {
        target_year: settings.default_year,
        candidate_models: settings.candidate_models.clone(),
        local_text,
    };

    let processed = processor
        .process_file(&file, &options)
        .with_context(|| format!("Failed to process {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&processed)?);
    }

    match &processed.reply {
        ParsedReply::Structured(tour) => {
            if !json {
                print!("{}", render_summary(tour));
                for warning in &processed.warnings {
                    eprintln!("warning: {warning}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        ParsedReply::Unparseable { reason, .. } => {
            eprintln!(
                "Model {} returned a reply that is not valid JSON ({reason}):",
                processed.model
            );
            eprintln!("{}", render_reply(&processed.reply));
            Ok(ExitCode::from(EXIT_UNPARSEABLE))
        }
    }
}
