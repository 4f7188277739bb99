//! CLI entry point for `mailsift`.

mod config;
mod output;

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use mailsift_core::{Classifier, NodeKind};
use mailsift_mime::Message;
use mailsift_sniff::{MediaType, Sniffer};

use crate::config::Config;
use crate::output::InspectReport;

#[derive(Parser)]
#[command(name = "mailsift", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to `$MAILSIFT_CONFIG` or the user config dir)
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every part of an RFC 5322 message
    Inspect {
        /// Message file (.eml)
        path: PathBuf,
        /// Only list nodes of this kind
        #[arg(short, long, value_parser = parse_kind)]
        kind: Option<NodeKind>,
        #[arg(long)]
        json: bool,
    },
    /// Sniff the media type of a file or http(s) URL
    Sniff {
        /// File path or URL
        target: String,
        /// Fallback `type/subtype` when nothing matches
        #[arg(short, long, value_name = "TYPE")]
        default: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

fn parse_kind(name: &str) -> Result<NodeKind, String> {
    NodeKind::from_name(name).ok_or_else(|| {
        let names: Vec<&str> = NodeKind::ALL.iter().map(|k| k.as_str()).collect();
        format!("unknown kind {name:?}, expected one of: {}", names.join(", "))
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level);

    match cli.command {
        Commands::Inspect { path, kind, json } => cmd_inspect(&config, &path, kind, json),
        Commands::Sniff {
            target,
            default,
            json,
        } => cmd_sniff(&config, &target, default.as_deref(), json),
    }
}

fn setup_logging(level: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_sniffer(config: &Config) -> anyhow::Result<Sniffer> {
    let sniffer_config = config
        .sniffer
        .to_sniffer_config()
        .context("invalid [sniffer] configuration")?;
    Ok(Sniffer::new(sniffer_config))
}

fn cmd_inspect(
    config: &Config,
    path: &Path,
    kind: Option<NodeKind>,
    json: bool,
) -> anyhow::Result<()> {
    let raw = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let message =
        Message::parse(&raw).with_context(|| format!("failed to parse {}", path.display()))?;

    let classifier = Classifier::with_config(
        build_sniffer(config)?,
        config.classifier.to_classifier_config(),
    );
    let tree = classifier
        .classify_message(&message)
        .with_context(|| format!("failed to classify {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        nodes = tree.flatten(None).len(),
        "Classified message"
    );

    let report = InspectReport::new(&tree, message.subject(), kind);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.to_text());
    }

    tree.close();
    Ok(())
}

fn cmd_sniff(
    config: &Config,
    target: &str,
    default: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let sniffer = build_sniffer(config)?;
    let default = default
        .map(|essence| {
            MediaType::from_essence(essence)
                .with_context(|| format!("invalid default {essence:?}, expected type/subtype"))
        })
        .transpose()?;

    let media_type = if is_url(target) {
        sniffer.classify_url(target, default.as_ref())
    } else {
        let path = Path::new(target);
        let file = File::open(path).with_context(|| format!("failed to open {target}"))?;
        let hint = path.file_name().and_then(|name| name.to_str());
        sniffer.classify_reader(file, hint, default.as_ref()).0
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&media_type)?);
    } else {
        println!("{}", output::sniff_line(&media_type));
    }
    Ok(())
}

fn is_url(target: &str) -> bool {
    let lower = target.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
