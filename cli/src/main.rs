//! dropnote CLI — inspect indexer state and decode memos offline.
//!
//! # Commands
//! ```text
//! dropnote info
//! dropnote checkpoint get   --network <name>
//! dropnote checkpoint set   --network <name> --height <n>
//! dropnote checkpoint reset --network <name>
//! dropnote keys
//! dropnote parse-memo <memo> --sender <address>
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dropnote_core::{
    classify, parse_memo, AbciEvent, CheckpointManager, HandlerRegistry, IndexerConfig, KvStore,
    NetworkConfig, Source, DEV_PUBKEY_HEX,
};
use dropnote_storage::JsonFileStore;

mod logging;

use logging::{init_tracing, LogConfig};

const DEFAULT_STORE: &str = "./dropnote.json";

#[derive(Parser)]
#[command(
    name = "dropnote",
    about = "Dropnote indexer — checkpoint management and memo decoding",
    version
)]
struct Cli {
    /// JSON config file: { "indexer": {..}, "log": {..}, "store": "<path>" }
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Checkpoint store file (default: ./dropnote.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Global log level (overrides the config file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show defaults and capabilities
    Info,

    /// Read or change a network's checkpoint
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },

    /// List every key in the checkpoint store
    Keys,

    /// Decode a memo and print the payload as JSON
    #[command(name = "parse-memo")]
    ParseMemo {
        /// The full memo, e.g. 'dropnote:[cosmos1...:hello]'
        memo: String,
        /// Bank-module sender the memo is attributed to
        #[arg(long)]
        sender: Option<String>,
    },
}

#[derive(Subcommand)]
enum CheckpointAction {
    /// Print the stored height
    Get {
        #[arg(long)]
        network: String,
    },
    /// Overwrite the stored height
    Set {
        #[arg(long)]
        network: String,
        #[arg(long)]
        height: u64,
    },
    /// Remove the checkpoint; the next watch falls back to the lookback window
    Reset {
        #[arg(long)]
        network: String,
    },
}

/// Contents of the `--config` file. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CliConfig {
    indexer: IndexerConfig,
    log: LogConfig,
    store: Option<PathBuf>,
}

fn load_config(path: Option<&Path>) -> Result<CliConfig> {
    let Some(path) = path else {
        return Ok(CliConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config file '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse config file '{}'", path.display()))
}

/// Checkpoint keys only use the network name.
fn network(name: &str) -> NetworkConfig {
    NetworkConfig::new(name, name)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let mut log = config.log.clone();
    if let Some(level) = cli.log_level {
        log.level = level;
    }
    log.json |= cli.json_logs;
    init_tracing(&log);

    let store_path = cli
        .store
        .or(config.store.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE));

    match cli.command {
        Commands::Info => {
            cmd_info(&config.indexer, &store_path);
            Ok(())
        }
        Commands::Checkpoint { action } => cmd_checkpoint(&store_path, action).await,
        Commands::Keys => cmd_keys(&store_path).await,
        Commands::ParseMemo { memo, sender } => cmd_parse_memo(&memo, sender.as_deref()),
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

fn cmd_info(indexer: &IndexerConfig, store_path: &Path) {
    let registry = HandlerRegistry::with_defaults();
    println!("dropnote v{}", env!("CARGO_PKG_VERSION"));
    println!("  Lookback: {} blocks", indexer.lookback_blocks);
    println!("  Page size: {} txs/page", indexer.page_size);
    println!("  Event channel capacity: {}", indexer.channel_capacity);
    println!("  Dev wallet pubkey: {DEV_PUBKEY_HEX}");
    println!("  Memo subtypes: {}", registry.subtypes(Source::Memo).join(", "));
    println!("  Event subtypes: {}", registry.subtypes(Source::Events).join(", "));
    println!("  Checkpoint store: {}", store_path.display());
    println!("  Storage backends: memory, JSON file, prefixed, SQLite (feature: sqlite)");
}

async fn cmd_checkpoint(store_path: &Path, action: CheckpointAction) -> Result<()> {
    let store = JsonFileStore::new(store_path);
    let checkpoints = CheckpointManager::new(Arc::new(store.clone()));

    match action {
        CheckpointAction::Get { network: name } => {
            match checkpoints.load(&network(&name)).await.context("load checkpoint")? {
                Some(height) => println!("{name}: {height}"),
                None => println!("{name}: no checkpoint"),
            }
        }
        CheckpointAction::Set { network: name, height } => {
            checkpoints
                .save(&network(&name), height)
                .await
                .context("save checkpoint")?;
            store.flush().await.context("write checkpoint store")?;
            println!("{name}: {height}");
        }
        CheckpointAction::Reset { network: name } => {
            checkpoints
                .reset(&network(&name))
                .await
                .context("reset checkpoint")?;
            store.flush().await.context("write checkpoint store")?;
            println!("{name}: checkpoint removed");
        }
    }
    Ok(())
}

async fn cmd_keys(store_path: &Path) -> Result<()> {
    let store = JsonFileStore::new(store_path);
    for key in store.keys().await.context("list keys")? {
        println!("{key}");
    }
    Ok(())
}

fn cmd_parse_memo(memo: &str, sender: Option<&str>) -> Result<()> {
    if classify(Some(memo), &[]) != Some(Source::Memo) {
        bail!("not a dropnote memo: '{memo}'");
    }
    let events: Vec<AbciEvent> = sender
        .map(|s| AbciEvent::new("message").attr("sender", s))
        .into_iter()
        .collect();

    let payload = parse_memo(memo, &events).with_context(|| match sender {
        Some(_) => "decode memo".to_string(),
        None => "decode memo (pass --sender to attribute it)".to_string(),
    })?;

    let fields: serde_json::Map<String, serde_json::Value> = payload
        .fields
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    let out = serde_json::json!({ "subtype": payload.subtype, "fields": fields });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_sections_are_optional() {
        let cfg: CliConfig =
            serde_json::from_str(r#"{"indexer": {"page_size": 20}, "store": "/tmp/x.json"}"#).unwrap();
        assert_eq!(cfg.indexer.page_size, 20);
        assert_eq!(cfg.indexer.lookback_blocks, 864_000);
        assert_eq!(cfg.log, LogConfig::default());
        assert_eq!(cfg.store, Some(PathBuf::from("/tmp/x.json")));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("nope.json"))).is_err());
        assert!(load_config(None).is_ok());
    }

    #[tokio::test]
    async fn checkpoint_set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        cmd_checkpoint(
            &path,
            CheckpointAction::Set {
                network: "neutron".into(),
                height: 77,
            },
        )
        .await
        .unwrap();

        let store = JsonFileStore::new(&path);
        let checkpoints = CheckpointManager::new(Arc::new(store));
        assert_eq!(checkpoints.load(&network("neutron")).await.unwrap(), Some(77));
    }

    #[test]
    fn parse_memo_rejects_plain_text() {
        assert!(cmd_parse_memo("hello", Some("cosmos1a")).is_err());
        assert!(cmd_parse_memo("dropnote:[cosmos1b:hi]", Some("cosmos1a")).is_ok());
        assert!(cmd_parse_memo("dropnote:[cosmos1b:hi]", None).is_err());
    }
}
