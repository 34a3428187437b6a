use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use galsync_core::{AppConfig, TagSource};
use galsync_resolve::{
    BangumiSource, ConsoleGateway, JsonRecordStore, Session, SourceTags, SyncItem, SyncPipeline,
};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "galsync",
    about = "Resolve scraped game metadata against your record store",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format.
    /// Also enabled by setting GALSYNC_JSON=1.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a title against the local snapshot and record store.
    Dedup { title: String },

    /// Find the metadata-API subject for a keyword.
    Match { keyword: String },

    /// Translate and merge raw tags into main tags.
    Tags {
        #[arg(long, action = clap::ArgAction::Append)]
        dlsite: Vec<String>,
        #[arg(long, action = clap::ArgAction::Append)]
        fanza: Vec<String>,
        #[arg(long, action = clap::ArgAction::Append)]
        ggbases: Vec<String>,
    },

    /// Resolve a brand name to its canonical form.
    Brand { name: String },

    /// Sync a JSON array of scraped items into the record store.
    Sync {
        file: String,
        /// Skip subject matching against the metadata API.
        #[arg(long)]
        offline: bool,
    },

    /// Rebuild the title snapshot from the record store.
    Refresh,

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

// ─── Config Actions ──────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration.
    Show,
    /// Print the config file path.
    Path,
    /// Write a default config file if none exists.
    Init,
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();
    init_logging();

    let json_output = cli.json || std::env::var("GALSYNC_JSON").as_deref() == Ok("1");
    let config = AppConfig::load().context("failed to load config")?;

    if let Commands::Config { action } = &cli.command {
        return run_config(action, &config, json_output);
    }

    let session = Arc::new(Session::open(config, Arc::new(ConsoleGateway::stdio()))?);

    tokio::select! {
        result = run(cli.command, session.clone()) => {
            let data = result?;
            session.flush()?;
            let dur = start.elapsed().as_millis();
            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":data,"meta":{"duration_ms":dur}}))?;
            } else {
                print_human(&data);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, flushing before exit");
            session.flush()?;
            // A console prompt may still be blocked on stdin.
            std::process::exit(130);
        }
    }

    Ok(())
}

async fn run(command: Commands, session: Arc<Session>) -> Result<serde_json::Value> {
    let config = session.config().clone();
    let store = Arc::new(JsonRecordStore::new(config.records_dir(), session.schema()));

    let data = match command {
        Commands::Dedup { title } => {
            let outcome = session.check_duplicate(&title, store.as_ref()).await?;
            serde_json::json!({ "title": title, "outcome": outcome })
        }

        Commands::Match { keyword } => {
            let source = BangumiSource::from_config(&config.metadata_api)?;
            let hit = session.match_subject(&keyword, &source).await?;
            serde_json::json!({ "keyword": keyword, "subject": hit })
        }

        Commands::Tags {
            dlsite,
            fanza,
            ggbases,
        } => {
            let mut tags = SourceTags::new();
            for (source, raw) in [
                (TagSource::Dlsite, dlsite),
                (TagSource::Fanza, fanza),
                (TagSource::Ggbases, ggbases),
            ] {
                if !raw.is_empty() {
                    tags.insert(source, raw);
                }
            }
            let resolved = session.process_tags(&tags).await?;
            serde_json::json!({ "tags": resolved })
        }

        Commands::Brand { name } => {
            let canonical = session.resolve_brand(&name).await?;
            serde_json::json!({ "name": name, "canonical": canonical })
        }

        Commands::Sync { file, offline } => {
            let items = load_items(Path::new(&file))?;
            let mut pipeline = SyncPipeline::new(session.clone(), store);
            if !offline {
                pipeline = pipeline.with_source(Arc::new(BangumiSource::from_config(&config.metadata_api)?));
            }
            let report = pipeline.run(items).await?;
            serde_json::to_value(report)?
        }

        Commands::Refresh => {
            let changed = session.refresh_pool(store.as_ref()).await?;
            serde_json::json!({ "changed": changed, "entries": session.pool().len() })
        }

        Commands::Config { .. } => unreachable!("handled before the session is opened"),
    };
    Ok(data)
}

fn run_config(action: &ConfigAction, config: &AppConfig, json_output: bool) -> Result<()> {
    let path = AppConfig::config_path();
    match action {
        ConfigAction::Show => {
            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":config}))?;
            } else {
                print!("{}", toml::to_string_pretty(config)?);
            }
        }
        ConfigAction::Path => {
            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":{"path":path}}))?;
            } else {
                println!("{}", path.display());
            }
        }
        ConfigAction::Init => {
            let created = !path.exists();
            if created {
                AppConfig::default().save_to(&path)?;
            }
            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":{"path":path,"created":created}}))?;
            } else if created {
                println!("Wrote default config to {}", path.display());
            } else {
                println!("Config already exists: {}", path.display());
            }
        }
    }
    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Logs go to stderr so console prompts on stdout stay readable.
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("GALSYNC_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_items(path: &Path) -> Result<Vec<SyncItem>> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("{} is not a JSON array of items", path.display()))
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn print_human(data: &serde_json::Value) {
    match data {
        serde_json::Value::Object(map) => {
            for (key, value) in map {
                match value {
                    serde_json::Value::String(s) => println!("{key}: {s}"),
                    serde_json::Value::Null => println!("{key}: -"),
                    other => println!("{key}: {other}"),
                }
            }
        }
        other => println!("{other}"),
    }
}
