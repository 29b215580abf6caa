use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chipscan_core::{KeyStore, TagScanner, TagSecret};
use chipscan_ultralight::{SimulatedField, UltralightTransport};
use clap::{Args, Parser};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

mod commands;
mod config;
mod display;

use commands::Command;
use config::{Config, ModelName};

#[derive(Parser)]
#[command(version, about = "Scan Ultralight AES tags with the chipscan engine")]
struct Cli {
    /// Trace level output
    #[arg(short, long)]
    verbose: bool,

    /// Config file (defaults to ./chipscan.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data protection key (key0), hex encoded
    #[arg(long, requires = "key1")]
    key0: Option<String>,

    /// UID retrieval key (key1), hex encoded
    #[arg(long, requires = "key0")]
    key1: Option<String>,

    #[command(flatten)]
    tag: TagArgs,

    #[command(subcommand)]
    command: Command,
}

/// Simulated tag overrides
#[derive(Args, Debug)]
struct TagArgs {
    /// Tag model presented to the field
    #[arg(long, value_enum)]
    model: Option<ModelName>,

    /// Tag UID, 7 bytes hex encoded
    #[arg(long)]
    uid: Option<String>,

    /// Enable random ID on the tag
    #[arg(long)]
    random_id: bool,

    /// Key 0 programmed into the tag, defaults to --key0
    #[arg(long)]
    tag_key0: Option<String>,

    /// Key 1 programmed into the tag, defaults to --key1
    #[arg(long)]
    tag_key1: Option<String>,
}

impl TagArgs {
    fn apply(self, config: &mut Config) {
        let tag = &mut config.tag;
        if let Some(model) = self.model {
            tag.model = model;
        }
        if let Some(uid) = self.uid {
            tag.uid = uid;
        }
        tag.random_id |= self.random_id;
        if self.tag_key0.is_some() {
            tag.key0 = self.tag_key0;
        }
        if self.tag_key1.is_some() {
            tag.key1 = self.tag_key1;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut config = config::load(cli.config.as_deref())?;
    if let (Some(key0), Some(key1)) = (cli.key0, cli.key1) {
        config.keys = Some(TagSecret::new(key0, key1));
    }
    cli.tag.apply(&mut config);

    let keys = Arc::new(KeyStore::new());
    match &config.keys {
        Some(secret) => keys
            .set_tag_secret(secret)
            .context("invalid tag keys")?,
        None => eprintln!(
            "{}",
            display::warning("No tag keys configured, scans will be refused")
        ),
    }

    let simulation = config.tag.to_simulation(config.keys.as_ref())?;
    info!(
        model = %simulation.model,
        uid = %hex::encode_upper(simulation.uid),
        "Presenting simulated tag"
    );
    if simulation.model != chipscan_ultralight::TagModel::UltralightAes {
        warn!("Simulated tag model is not supported by the transport");
    }

    let field = SimulatedField::with_tag(simulation.build());
    let scanner =
        TagScanner::new(keys, UltralightTransport::new(field)).with_config(config.scanner);

    commands::run(&scanner, cli.command).await
}

fn setup_logging(verbose: bool) {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose, &directives))
        .with_ansi(true)
        .init();
}

/// `-v` forces trace output, otherwise `RUST_LOG` applies on top of INFO
fn log_filter(verbose: bool, directives: &str) -> EnvFilter {
    if verbose {
        return EnvFilter::new("trace");
    }
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse_lossy(directives)
}
