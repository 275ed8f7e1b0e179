//! CareGraph CLI - healthcare knowledge-graph question answering

use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use caregraph_core::assistant::Assistant;
use caregraph_core::config::{Config, Credentials};
use caregraph_core::graph::{GraphEngine, Neo4jClient};
use caregraph_core::history::HistoryStore;
use caregraph_core::llm::{LanguageModel, LlmClient};
use caregraph_core::pipeline::{GraphRagPipeline, PipelineSettings};
use clap::{Parser, Subcommand};
use tracing::debug;

#[derive(Parser)]
#[command(name = "caregraph")]
#[command(author, version, about = "Ask questions about a healthcare knowledge graph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (answer only)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the assistant a question
    Ask {
        /// The question
        question: String,
        /// Continue an existing conversation thread
        #[arg(short, long)]
        thread: Option<String>,
    },

    /// Run only the GraphRAG pipeline for a question
    Query {
        /// The question
        question: String,
    },

    /// Show the graph schema
    Schema,

    /// Manage conversation history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List conversation threads
    List,
    /// Show the turns of a thread
    Show { id: String },
    /// Delete a thread
    Delete { id: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show the configuration file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("caregraph=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ask { question, thread } => {
            cmd_ask(&question, thread.as_deref(), cli.format, cli.quiet).await
        }
        Commands::Query { question } => cmd_query(&question, cli.format, cli.quiet).await,
        Commands::Schema => cmd_schema(cli.format).await,
        Commands::History { action } => cmd_history(action, cli.format, cli.quiet).await,
        Commands::Config { action } => cmd_config(action, cli.format, cli.quiet),
        Commands::Doctor => cmd_doctor(cli.quiet).await,
    }
}

// ============================================================================
// Startup
// ============================================================================

/// Everything a question needs, built once per invocation
struct Services {
    config: Config,
    llm: Arc<dyn LanguageModel>,
    pipeline: Arc<GraphRagPipeline>,
    settings: PipelineSettings,
}

fn graph_client(config: &Config, credentials: &Credentials) -> anyhow::Result<Arc<dyn GraphEngine>> {
    Ok(Arc::new(Neo4jClient::from_config(&config.graph, credentials)?))
}

async fn connect() -> anyhow::Result<Services> {
    let config = Config::load()?;
    let credentials = Credentials::from_env()?;
    debug!(credentials = ?credentials, "Credentials resolved");

    let llm: Arc<dyn LanguageModel> =
        Arc::new(LlmClient::new(config.llm.clone(), credentials.api_key.clone())?);
    let graph = graph_client(&config, &credentials)?;
    let settings = PipelineSettings::from_config(&config);

    let pipeline = GraphRagPipeline::connect(llm.clone(), graph, &settings)
        .await
        .context("Failed to load the graph schema")?;

    Ok(Services {
        config,
        llm,
        pipeline: Arc::new(pipeline),
        settings,
    })
}

async fn open_history(config: &Config) -> anyhow::Result<HistoryStore> {
    let path = config.history_path()?;
    HistoryStore::open(&path)
        .await
        .with_context(|| format!("Failed to open conversation history: {}", path.display()))
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_ask(
    question: &str,
    thread: Option<&str>,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let services = connect().await?;
    let history = open_history(&services.config).await?;
    let assistant = Assistant::new(services.pipeline, services.llm, history, &services.settings);

    let reply = assistant.chat(thread, question).await?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&reply)?);
        return Ok(());
    }

    println!("{}", reply.response);
    if !quiet {
        if let Some(query) = &reply.query {
            println!();
            println!("Cypher: {}", query);
        }
        println!("Thread: {}", reply.thread_id);
    }
    Ok(())
}

async fn cmd_query(question: &str, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let services = connect().await?;
    let outcome = services.pipeline.answer(question).await;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", outcome.response);
        if !quiet {
            if let Some(query) = &outcome.query {
                println!();
                println!("Cypher: {}", query);
            }
        }
    }

    if outcome.is_error() {
        bail!("The question could not be answered");
    }
    Ok(())
}

async fn cmd_schema(format: OutputFormat) -> anyhow::Result<()> {
    let config = Config::load()?;
    let credentials = Credentials::from_env()?;
    let graph = graph_client(&config, &credentials)?;

    let schema = graph
        .describe_schema()
        .await
        .context("Failed to load the graph schema")?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&schema)?);
    } else {
        print!("{}", schema);
    }
    Ok(())
}

async fn cmd_history(action: HistoryAction, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let history = open_history(&config).await?;

    match action {
        HistoryAction::List => {
            let summaries = history.list().await?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else if summaries.is_empty() {
                if !quiet {
                    println!("No conversations yet.");
                }
            } else {
                for summary in summaries {
                    println!(
                        "{}  {}  ({} turns, updated {})",
                        summary.thread_id,
                        summary.title,
                        summary.turn_count,
                        summary.updated_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }
        HistoryAction::Show { id } => {
            let turns = history.read(&id).await?;
            if turns.is_empty() {
                bail!("Conversation not found: {}", id);
            }
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&turns)?);
                return Ok(());
            }
            for turn in turns {
                println!("You: {}", turn.user_input);
                println!("Assistant: {}", turn.response);
                if !quiet {
                    if let Some(query) = &turn.query {
                        println!("  Cypher: {}", query);
                    }
                }
                println!();
            }
        }
        HistoryAction::Delete { id } => {
            if !history.delete(&id).await? {
                bail!("Conversation not found: {}", id);
            }
            if !quiet {
                println!("Deleted conversation {}", id);
            }
        }
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            println!("{}", config.get(&key)?);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let items = Config::load()?.list()?;
            if format == OutputFormat::Json {
                let map: serde_json::Map<String, serde_json::Value> = items
                    .into_iter()
                    .map(|(key, value)| (key, serde_json::Value::String(value)))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&map)?);
            } else {
                for (key, value) in items {
                    println!("{} = {}", key, value);
                }
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            println!("{}", Config::config_path()?.display());
        }
    }
    Ok(())
}

async fn cmd_doctor(quiet: bool) -> anyhow::Result<()> {
    let report = |ok: bool, label: &str, detail: &str| {
        if !quiet {
            let mark = if ok { "[OK]" } else { "[!!]" };
            println!("{} {}: {}", mark, label, detail);
        }
    };

    if !quiet {
        println!("CareGraph Health Check");
        println!("======================");
        println!();
    }

    let mut all_ok = true;

    let config = match Config::load() {
        Ok(config) => {
            report(true, "Configuration", "Valid");
            config
        }
        Err(e) => {
            all_ok = false;
            report(false, "Configuration", &format!("{:#}", e));
            Config::default()
        }
    };

    let credentials = match Credentials::from_env() {
        Ok(credentials) => {
            report(true, "Credentials", "Found in environment");
            Some(credentials)
        }
        Err(e) => {
            all_ok = false;
            report(false, "Credentials", &e.to_string());
            None
        }
    };

    match open_history(&config).await {
        Ok(history) => {
            report(true, "History", &history.database().path().display().to_string());
        }
        Err(e) => {
            all_ok = false;
            report(false, "History", &format!("{:#}", e));
        }
    }

    if let Some(credentials) = credentials {
        let graph = graph_client(&config, &credentials).and_then(|graph| {
            let uri = config.graph.effective_uri(&credentials)?;
            Ok((graph, uri))
        });
        match graph {
            Ok((graph, uri)) => match graph.run("RETURN 1 AS ok").await {
                Ok(_) => report(true, "Graph database", &uri),
                Err(e) => {
                    all_ok = false;
                    report(false, "Graph database", &e.to_string());
                }
            },
            Err(e) => {
                all_ok = false;
                report(false, "Graph database", &e.to_string());
            }
        }
    }

    if !all_ok {
        return Err(anyhow!("Some checks failed"));
    }
    if !quiet {
        println!();
        println!("All checks passed.");
    }
    Ok(())
}
