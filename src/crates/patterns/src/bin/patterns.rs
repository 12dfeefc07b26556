//! patterns CLI
//!
//! Browse a pattern library, classify requests and watch a patterns
//! directory for changes.

use anyhow::Context;
use clap::{Parser, Subcommand};
use patterns::config::ClassifierMode;
use patterns::{
    AbTestingLibrary, ContextData, HotReloader, IntentCategory, Library, Orchestrator,
    PatternSummary, PatternsConfig, RequestContext, UpdateKind,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "patterns")]
#[command(about = "Pattern library browser and intent router", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Patterns directory (overrides config and PATTERNS_DIR)
    #[arg(short, long, global = true, env = "PATTERNS_DIR")]
    dir: Option<PathBuf>,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List patterns, optionally filtered
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        backend_type: Option<String>,
        #[arg(long)]
        difficulty: Option<String>,
    },

    /// Rank patterns against a query
    Search {
        query: String,
        /// Maximum number of results
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Show one pattern
    Show {
        name: String,
        /// Render as an LLM prompt block
        #[arg(long)]
        llm: bool,
    },

    /// Classify the intent of a message
    Classify { message: String },

    /// Classify a message and print its execution plan
    Plan { message: String },

    /// Recommend a pattern for a message
    Recommend {
        message: String,
        /// Intent to score against; classified from the message when omitted
        #[arg(short, long)]
        intent: Option<IntentCategory>,
    },

    /// List variants of a pattern and the one a session gets
    Variants {
        name: String,
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Watch the patterns directory and log reloads until Ctrl-C
    Watch,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<PatternsConfig> {
    let mut config = match &cli.config {
        Some(path) => PatternsConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PatternsConfig::from_env()?,
    };
    if let Some(dir) = &cli.dir {
        config.library.patterns_dir = Some(dir.clone());
    }
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_summaries(summaries: &[PatternSummary]) {
    if summaries.is_empty() {
        println!("No patterns found");
        return;
    }
    for summary in summaries {
        println!(
            "{:<32} {:<16} {:<12} {}",
            summary.name, summary.category, summary.difficulty, summary.title
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    let library = Arc::new(config.build_library());
    info!(
        patterns_dir = ?library.patterns_dir(),
        classifier = %config.classifier.mode,
        "Pattern library ready"
    );

    let orchestrator = Orchestrator::new(Arc::clone(&library));
    if config.classifier.mode == ClassifierMode::Llm {
        warn!("No LLM provider is available to the CLI, using keyword classification");
    }

    match &cli.command {
        Commands::List {
            category,
            backend_type,
            difficulty,
        } => {
            let mut summaries = match category {
                Some(category) => library.filter_by_category(category),
                None => library.list_all(),
            };
            if let Some(backend_type) = backend_type {
                summaries.retain(|s| s.backend_type.eq_ignore_ascii_case(backend_type));
            }
            if let Some(difficulty) = difficulty {
                summaries.retain(|s| s.difficulty.eq_ignore_ascii_case(difficulty));
            }
            if cli.json {
                print_json(&summaries)?;
            } else {
                print_summaries(&summaries);
            }
        }

        Commands::Search { query, limit } => {
            let hits: Vec<_> = library.search_scored(query).into_iter().take(*limit).collect();
            if cli.json {
                print_json(&hits)?;
            } else if hits.is_empty() {
                println!("No patterns match '{}'", query);
            } else {
                for hit in &hits {
                    println!("{:>6.3}  {:<32} {}", hit.score, hit.summary.name, hit.summary.title);
                }
            }
        }

        Commands::Show { name, llm } => {
            let pattern = library.load(name)?;
            if cli.json {
                print_json(pattern.as_ref())?;
            } else if *llm {
                println!("{}", pattern.format_for_llm());
            } else {
                println!("{}", serde_yaml::to_string(pattern.as_ref())?);
            }
        }

        Commands::Classify { message } => {
            let classification = orchestrator.classify_intent(message, &ContextData::new()).await;
            if cli.json {
                print_json(&classification)?;
            } else {
                println!(
                    "{} ({:.2})",
                    classification.intent, classification.confidence
                );
            }
        }

        Commands::Plan { message } => {
            let context = ContextData::new();
            let classification = orchestrator.classify_intent(message, &context).await;
            let plan = orchestrator.plan_execution(classification.intent, message, &context)?;
            if cli.json {
                print_json(&plan)?;
            } else {
                println!("{} [{}]", plan.description, plan.intent);
                println!("  {}", plan.reasoning);
                for (i, step) in plan.steps.iter().enumerate() {
                    println!("  {}. {} - {}", i + 1, step.tool_name, step.description);
                }
                println!(
                    "  hint: {}",
                    orchestrator.routing_recommendation(classification.intent)
                );
            }
        }

        Commands::Recommend { message, intent } => {
            let intent = match intent {
                Some(intent) => *intent,
                None => {
                    orchestrator
                        .classify_intent(message, &ContextData::new())
                        .await
                        .intent
                }
            };
            let recommendation = orchestrator.recommend_pattern(message, intent);
            if cli.json {
                print_json(&recommendation)?;
            } else {
                match recommendation {
                    Some(r) => println!(
                        "{} (confidence {:.2}, {} candidates)",
                        r.pattern_name, r.confidence, r.candidates
                    ),
                    None => println!("No pattern recommended for intent {}", intent),
                }
            }
        }

        Commands::Variants { name, session } => {
            let ab = AbTestingLibrary::new(Arc::clone(&library));
            let variants = ab.variants(name);
            let mut ctx = RequestContext::new();
            if let Some(session) = session {
                ctx = ctx.with_session_id(session.as_str());
            }
            let selection = ab.load(name, &ctx)?;

            if cli.json {
                print_json(&serde_json::json!({
                    "pattern": name,
                    "variants": variants,
                    "session_id": ctx.session_id(),
                    "selected": selection.variant,
                }))?;
            } else {
                if variants.is_empty() {
                    println!("{} has no variants", name);
                } else {
                    println!("{}: {}", name, variants.join(", "));
                }
                println!(
                    "session '{}' gets variant '{}'",
                    ctx.session_id(),
                    selection.variant
                );
            }
        }

        Commands::Watch => watch(library, &config).await?,
    }

    Ok(())
}

async fn watch(library: Arc<Library>, config: &PatternsConfig) -> anyhow::Result<()> {
    let mut reload_config = config.to_reload_config().on_update(|update| match update.kind {
        UpdateKind::ValidationFailed => warn!(
            pattern = %update.pattern_name,
            error = ?update.error.as_ref().map(ToString::to_string),
            "Rejected pattern update"
        ),
        kind => info!(
            pattern = %update.pattern_name,
            kind = kind.as_str(),
            path = %update.file_path.display(),
            "Pattern updated"
        ),
    });
    reload_config.enabled = true;

    let reloader = HotReloader::new(library, reload_config)
        .context("watch needs a patterns directory (--dir or PATTERNS_DIR)")?;
    reloader.start()?;
    info!(
        root = %reloader.root().display(),
        directories = reloader.watched_directories().len(),
        "Watching for pattern changes, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    reloader.stop().await?;
    Ok(())
}
