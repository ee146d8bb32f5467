//! Run one simulated transfer and report whether it arrived intact.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rdt_sim::{ScenarioConfig, Simulator};

/// Reliable transport over a simulated lossy link.
#[derive(Parser, Debug)]
#[command(name = "rdt-sim", about = "Sliding-window ARQ link simulator")]
struct Cli {
    /// Scenario TOML file. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// RNG seed for traffic and impairments.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of application messages to send.
    #[arg(long)]
    messages: Option<usize>,

    /// Per-packet loss probability, both directions.
    #[arg(long)]
    loss: Option<f64>,

    /// Per-packet corruption probability, both directions.
    #[arg(long)]
    corrupt: Option<f64>,

    /// Per-packet reordering probability, both directions.
    #[arg(long)]
    reorder: Option<f64>,

    /// Print the report as JSON on stdout.
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl Cli {
    fn scenario(&self) -> Result<ScenarioConfig> {
        let mut cfg = match &self.config {
            Some(path) => ScenarioConfig::from_file(path)?,
            None => ScenarioConfig::default(),
        };

        if let Some(seed) = self.seed {
            cfg.seed = seed;
        }
        if let Some(messages) = self.messages {
            cfg.messages = messages;
        }
        if let Some(loss) = self.loss {
            cfg.impairment.loss_rate = loss;
        }
        if let Some(corrupt) = self.corrupt {
            cfg.impairment.corrupt_rate = corrupt;
        }
        if let Some(reorder) = self.reorder {
            cfg.impairment.reorder_rate = reorder;
        }
        cfg.impairment
            .validate()
            .context("invalid impairment flags")?;
        Ok(cfg)
    }
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let scenario = cli.scenario()?;
    let report = Simulator::new(scenario).run();

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("serializing report")?;
        println!("{json}");
    } else {
        println!(
            "{:?} after {:.2}s: {} of {} bytes delivered, verdict {:?}",
            report.outcome,
            report.sim_time_secs,
            report.bytes_delivered,
            report.bytes_submitted,
            report.verdict,
        );
        println!(
            "sender: {} transmissions, {} retransmissions ({:.1}%), {} timeouts",
            report.sender.transmissions,
            report.sender.retransmissions,
            report.sender.retransmit_ratio() * 100.0,
            report.sender.timeouts,
        );
        println!(
            "receiver: {} packets, {} corrupt, {} duplicates, {} out of window, goodput {:.1}%",
            report.receiver.packets_received,
            report.receiver.checksum_failures,
            report.receiver.duplicates,
            report.receiver.out_of_window,
            report.receiver.goodput_ratio() * 100.0,
        );
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
