//! Entry point for `file-over-udp`.
//!
//! Parses CLI arguments and dispatches into either **send** or **receive**
//! mode. All protocol work is delegated to library modules; `main.rs` owns
//! only process setup (logging, argument parsing, result printing).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use file_over_udp::config::DEFAULT_DEST;
use file_over_udp::simulator::SimulatorConfig;
use file_over_udp::{run_trials, ReceiverConfig, ReferenceReceiver, TransferConfig, TrialSummary};

/// Reliable file transfer over UDP with a sliding window.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Send a file and print throughput, per-packet delay and score.
    Send {
        /// File to transfer.
        file: PathBuf,
        /// Receiver address.
        #[arg(short, long, default_value = DEFAULT_DEST)]
        dest: SocketAddr,
        /// Maximum unacknowledged segments in flight.
        #[arg(short, long, default_value_t = 100)]
        window: usize,
        /// Retransmission timeout in milliseconds.
        #[arg(long, default_value_t = 1000)]
        rto_ms: u64,
        /// Absolute bound on the termination handshake, in milliseconds.
        #[arg(long, default_value_t = 10_000)]
        teardown_timeout_ms: u64,
        /// Duplicate ACKs that trigger a fast retransmit.
        #[arg(long, default_value_t = 3)]
        dup_acks: u32,
        /// Give up if the data phase takes longer than this (milliseconds).
        #[arg(long)]
        data_timeout_ms: Option<u64>,
        /// Number of back-to-back transfers to average over.
        #[arg(short, long, default_value_t = 1)]
        trials: usize,
    },
    /// Run the reference receiver for a single transfer.
    Receive {
        /// Local address to bind.
        #[arg(short, long, default_value = DEFAULT_DEST)]
        bind: SocketAddr,
        /// Where to write the received bytes.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Simulated packet loss probability.
        #[arg(long, default_value_t = 0.0)]
        loss: f64,
        /// Simulated duplication probability.
        #[arg(long, default_value_t = 0.0)]
        duplicate: f64,
        /// Simulated reordering probability.
        #[arg(long, default_value_t = 0.0)]
        reorder: f64,
        /// Seed for the fault simulator.
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Send {
            file,
            dest,
            window,
            rto_ms,
            teardown_timeout_ms,
            dup_acks,
            data_timeout_ms,
            trials,
        } => {
            if trials == 0 {
                bail!("--trials must be at least 1");
            }
            let config = TransferConfig {
                window_size: window,
                rto: Duration::from_millis(rto_ms),
                teardown_timeout: Duration::from_millis(teardown_timeout_ms),
                dup_ack_threshold: dup_acks,
                data_timeout: data_timeout_ms.map(Duration::from_millis),
                ..TransferConfig::new(dest)
            };
            log::info!("Sending {} to {dest}", file.display());

            let reports = run_trials(&file, &config, trials)
                .await
                .with_context(|| format!("transfer of {} failed", file.display()))?;
            let summary = TrialSummary::from_reports(&reports).context("no trials completed")?;

            println!("Throughput: {:.7}", summary.throughput);
            println!("Delay: {:.7}", summary.avg_delay);
            println!("Metric: {:.7}", summary.score);
        }
        Mode::Receive {
            bind,
            output,
            loss,
            duplicate,
            reorder,
            seed,
        } => {
            let config = ReceiverConfig {
                faults: SimulatorConfig {
                    loss_rate: loss,
                    duplicate_rate: duplicate,
                    reorder_rate: reorder,
                    seed,
                },
                ..Default::default()
            };
            let receiver = ReferenceReceiver::bind(bind, config)
                .await
                .with_context(|| format!("cannot bind {bind}"))?;
            let received = receiver.run().await?;
            log::info!(
                "Received {} bytes (confirmed={} discarded={} faults={:?})",
                received.data.len(),
                received.confirmed,
                received.discarded,
                received.faults
            );

            match output {
                Some(path) => std::fs::write(&path, &received.data)
                    .with_context(|| format!("cannot write {}", path.display()))?,
                None => println!("{} bytes received", received.data.len()),
            }
        }
    }
    Ok(())
}
