//! WordSense CLI
//!
//! - `reconcile`: normalize one raw producer sense (placeholders, variants)
//! - `build`: word fields + raw senses → validated `Word`, or the full report
//! - `check`: validate an already-assembled `Word`
//! - `replay`: run an enrichment episode against recorded producer responses
//!
//! JSON results go to stdout; logs and status lines go to stderr.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;
use wordsense_enrich::{
    parse_producer_object, EnrichConfig, EnrichError, Enricher, EnrichmentRequest,
    InMemoryWordStore, RecordedProducer,
};
use wordsense_pipeline::{Mapping, Reconciler, SenseMerge, ValidationReport, Validator, WordBuilder};
use wordsense_schema::Word;

#[derive(Parser)]
#[command(name = "wordsense")]
#[command(author, version, about = "WordSense: reconcile and validate enriched vocabulary")]
struct Cli {
    /// JSON config file (`WORDSENSE_*` environment variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (otherwise `RUST_LOG`, default `info`)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile one raw producer sense and print the resulting mapping.
    ///
    /// Accepts producer text as-is, including markdown fences.
    Reconcile {
        input: PathBuf,
        /// Treat the input as a single link chain instead of a sense
        #[arg(long)]
        link_chain: bool,
    },

    /// Build and validate a word from word-level fields and raw senses.
    Build {
        /// Word-level fields (headword, language, categories, ...)
        #[arg(long)]
        word: PathBuf,
        /// JSON array of raw producer senses
        #[arg(long)]
        senses: PathBuf,
        /// Use this id instead of generating one
        #[arg(long)]
        word_id: Option<Uuid>,
        /// Record an enrichment batch with this id
        #[arg(long)]
        batch_id: Option<String>,
    },

    /// Validate a complete word document.
    Check { input: PathBuf },

    /// Run an enrichment episode against recorded producer responses.
    Replay {
        /// Enrichment request (headword, language, target_language, ...)
        #[arg(long)]
        word: PathBuf,
        /// Directory with core.json, sense-<i>.json, chains-<i>.json
        #[arg(long)]
        responses: PathBuf,
        /// Amend this existing word instead of creating a new one
        #[arg(long)]
        amend: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = MergeArg::Append)]
        merge: MergeArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MergeArg {
    Append,
    Replace,
}

impl From<MergeArg> for SenseMerge {
    fn from(arg: MergeArg) -> Self {
        match arg {
            MergeArg::Append => SenseMerge::Append,
            MergeArg::Replace => SenseMerge::Replace,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(cli.config.as_deref())?;

    let ok = match cli.command {
        Commands::Reconcile { input, link_chain } => cmd_reconcile(&config, &input, link_chain)?,
        Commands::Build {
            word,
            senses,
            word_id,
            batch_id,
        } => cmd_build(&config, &word, &senses, word_id, batch_id)?,
        Commands::Check { input } => cmd_check(&config, &input)?,
        Commands::Replay {
            word,
            responses,
            amend,
            merge,
        } => {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| anyhow!("failed to initialize tokio runtime: {e}"))?;
            rt.block_on(cmd_replay(config, &word, &responses, amend.as_deref(), merge.into()))?
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<EnrichConfig> {
    let config = match path {
        Some(path) => EnrichConfig::from_json_file(path)?
            .with_env_overrides(|k| std::env::var(k).ok())?,
        None => EnrichConfig::from_env()?,
    };
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_reconcile(config: &EnrichConfig, input: &Path, link_chain: bool) -> Result<bool> {
    let raw = read_object(input)?;
    let reconciler = Reconciler::new(&config.pipeline);
    let out = if link_chain {
        reconciler.reconcile_link_chain(raw)
    } else {
        reconciler.reconcile_sense(raw)
    };
    print_json(&Value::Object(out))?;
    Ok(true)
}

fn cmd_build(
    config: &EnrichConfig,
    word: &Path,
    senses: &Path,
    word_id: Option<Uuid>,
    batch_id: Option<String>,
) -> Result<bool> {
    let reconciler = Reconciler::new(&config.pipeline);
    let fields = reconciler.reconcile_word_fields(read_object(word)?);
    let raw_senses = read_object_list(senses)?;
    eprintln!(
        "{} {} sense(s) from {}",
        "Reconciling".green().bold(),
        raw_senses.len(),
        senses.display()
    );

    let mut builder = WordBuilder::new(fields, &config.pipeline);
    if let Some(id) = word_id {
        builder = builder.with_word_id(id);
    }
    if let Some(batch) = batch_id {
        builder = builder.record_batch(batch, None);
    }
    builder.extend_senses(reconciler.reconcile_senses_par(raw_senses));

    report_outcome(builder.build())
}

fn cmd_check(config: &EnrichConfig, input: &Path) -> Result<bool> {
    let value = read_json(input)?;
    eprintln!("{} {}", "Validating".green().bold(), input.display());
    report_outcome(Validator::new(&config.pipeline).word(&value))
}

async fn cmd_replay(
    config: EnrichConfig,
    request: &Path,
    responses: &Path,
    amend: Option<&Path>,
    merge: SenseMerge,
) -> Result<bool> {
    let request: EnrichmentRequest = serde_json::from_value(read_json(request)?)
        .map_err(|e| anyhow!("invalid enrichment request {}: {e}", request.display()))?;
    let producer = RecordedProducer::open(responses, request.language).await?;
    eprintln!(
        "{} {:?} with {} recorded sense(s) from {}",
        "Replaying".green().bold(),
        request.headword,
        producer.briefs().len(),
        responses.display()
    );

    let validator = Validator::new(&config.pipeline);
    let existing = match amend {
        Some(path) => Some(
            validator
                .word(&read_json(path)?)
                .map_err(|report| anyhow!("cannot amend {}: {report}", path.display()))?,
        ),
        None => None,
    };

    let store = Arc::new(InMemoryWordStore::new());
    let enricher = Enricher::new(producer, store, config);
    let outcome = match &existing {
        Some(word) => enricher.amend(word, &request, merge).await,
        None => enricher.run(&request).await,
    };

    match outcome {
        Ok(word) => {
            print_ok(&word)?;
            Ok(true)
        }
        Err(EnrichError::Validation(report)) => {
            print_report(&report)?;
            Ok(false)
        }
        Err(err) => {
            eprintln!(
                "{} {err} (disposition: {:?})",
                "error:".red().bold(),
                err.disposition()
            );
            Ok(false)
        }
    }
}

// ============================================================================
// Output
// ============================================================================

fn report_outcome(outcome: Result<Word, ValidationReport>) -> Result<bool> {
    match outcome {
        Ok(word) => {
            print_ok(&word)?;
            Ok(true)
        }
        Err(report) => {
            print_report(&report)?;
            Ok(false)
        }
    }
}

fn print_ok(word: &Word) -> Result<()> {
    eprintln!(
        "{} word {} ({} sense(s), {} link chain(s))",
        "ok".green().bold(),
        word.word_id,
        word.senses.len(),
        word.link_chain_count()
    );
    print_json(&serde_json::to_value(word)?)
}

fn print_report(report: &ValidationReport) -> Result<()> {
    eprintln!("{} {report}", "invalid".red().bold());
    print_json(&json!({
        "disposition": report.disposition(),
        "entity": report.entity,
        "issues": report.issues,
    }))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Input
// ============================================================================

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| anyhow!("failed to read {}: {e}", path.display()))
}

fn read_json(path: &Path) -> Result<Value> {
    serde_json::from_str(&read_text(path)?)
        .map_err(|e| anyhow!("{} is not valid JSON: {e}", path.display()))
}

/// Producer text (fenced, with prose) reduced to its JSON object.
fn read_object(path: &Path) -> Result<Mapping> {
    parse_producer_object(&read_text(path)?).map_err(|e| anyhow!("{}: {e}", path.display()))
}

fn read_object_list(path: &Path) -> Result<Vec<Mapping>> {
    match read_json(path)? {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(map) => Ok(map),
                _ => Err(anyhow!("{}: element {i} is not an object", path.display())),
            })
            .collect(),
        _ => Err(anyhow!("{}: expected a JSON array of senses", path.display())),
    }
}
