//! CLI entry point for daq-channels
//!
//! Builds a channel graph from configuration and drives it from stdin:
//! - `run`: feed stdin into one channel, triggering it at end of input or on Ctrl-C
//! - `check`: validate a configuration and list the graph it builds
//! - `help`: print the help text of a channel kind
//! - `kinds`: list the standard channel kinds
//!
//! # Usage
//!
//! ```bash
//! daq-channels run --config config/channels.toml --input serial --print reading
//! daq-channels check --json
//! daq-channels help pattern
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use daq_channels::channels::STD_KINDS;
use daq_channels::config::{RuntimeConfig, DEFAULT_CONFIG_PATH};
use daq_channels::logging::{self, TracingConfig};
use daq_channels::{graph, Call, ChannelKind, Operation, Runtime};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const READ_CHUNK: usize = 4096;

#[derive(Parser)]
#[command(name = "daq-channels")]
#[command(about = "Reactive channel runtime for instrument data streams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the graph and stream stdin into one channel
    Run {
        /// Channel graph configuration
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Channel that receives stdin
        #[arg(long)]
        input: String,

        /// Print everything these channels emit to stdout
        #[arg(long)]
        print: Vec<String>,
    },

    /// Validate a configuration and list the channels it creates
    Check {
        /// Channel graph configuration
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Emit the channel list as JSON
        #[arg(long)]
        json: bool,

        /// Also print the effective configuration (file plus environment) as TOML
        #[arg(long)]
        dump: bool,
    },

    /// Print the help text of a channel kind
    Help {
        /// Kind name, e.g. "buffer"
        kind: String,
    },

    /// List the standard channel kinds
    Kinds,
}

/// Prints every write on one line of stdout, prefixed with the channel it watches.
struct ConsoleChannel {
    label: String,
}

impl ChannelKind for ConsoleChannel {
    type State = ();
    const NAME: &'static str = "console";

    fn dispatch(&self, _state: Option<&()>, call: Call<'_>) {
        if call.op != Operation::Write || call.params.is_empty() {
            return;
        }
        let line: Vec<String> = call.params.values().iter().map(|v| v.to_text()).collect();
        let mut stdout = std::io::stdout().lock();
        // A closed stdout only loses console output
        let _ = writeln!(stdout, "{}: {}", self.label, line.join(" "));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, input, print } => run(config, input, print).await,
        Commands::Check { config, json, dump } => check(config, json, dump),
        Commands::Help { kind } => help(&kind),
        Commands::Kinds => {
            for kind in STD_KINDS {
                println!("{kind}");
            }
            Ok(())
        }
    }
}

fn load(path: &Path) -> Result<RuntimeConfig> {
    let config = RuntimeConfig::load_from(path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

async fn run(config_path: PathBuf, input: String, print: Vec<String>) -> Result<()> {
    let config = load(&config_path)?;
    logging::init_from_config(&config)?;

    let rt = Runtime::with_std_channels();
    let report = graph::build(&rt, &config)?;
    info!(channels = report.created.len(), links = report.links, "graph ready");

    let input_id = rt.lookup(&input);
    if input_id.is_none() {
        bail!("input channel '{input}' does not exist");
    }

    for name in print {
        let watched = rt.lookup(&name);
        if watched.is_none() {
            warn!(name = %name, "cannot print unknown channel");
            continue;
        }
        let console = rt.create_channel(&format!("{name}.console"), ConsoleChannel { label: name }, Some(()));
        rt.link(watched, console);
    }

    let mut stdin = tokio::io::stdin();
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut total = 0usize;
    loop {
        tokio::select! {
            read = stdin.read(&mut chunk) => {
                let n = read.context("reading stdin")?;
                if n == 0 {
                    break;
                }
                total += n;
                rt.write_buffer(input_id, bytes::Bytes::copy_from_slice(&chunk[..n]));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    rt.trigger(input_id);
    info!(bytes = total, "input closed");
    Ok(())
}

fn check(config_path: PathBuf, json: bool, dump: bool) -> Result<()> {
    let config = load(&config_path)?;
    logging::init(TracingConfig::new(tracing::Level::WARN).with_ansi(false))?;

    let rt = Runtime::with_std_channels();
    let report = graph::build(&rt, &config)?;

    if dump {
        println!("{}", toml::to_string_pretty(&config)?);
    }

    let channels: Vec<_> = rt.channels().into_iter().filter(|c| !c.is_kind).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&channels)?);
        return Ok(());
    }

    println!("{}: {} channels, {} links", config.application.name, channels.len(), report.links);
    for channel in &channels {
        let links: Vec<String> = channel
            .links
            .iter()
            .map(|id| rt.name(*id).unwrap_or_else(|| id.to_string()))
            .collect();
        println!("  {:>3}  {:<24} {:<14} -> {}", channel.id.get(), channel.name, channel.kind, links.join(", "));
    }
    for name in &report.disabled {
        println!("       {name:<24} (disabled)");
    }
    Ok(())
}

fn help(kind: &str) -> Result<()> {
    let rt = Runtime::with_std_channels();
    match rt.help(rt.lookup(kind)) {
        Some(text) => {
            print!("{text}");
            Ok(())
        }
        None => bail!("unknown channel kind '{kind}'"),
    }
}
