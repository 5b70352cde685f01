//! Tahoe-LAFS log sink - command line host
//!
//! Reads log lines from stdin and writes them to a Tahoe-LAFS grid,
//! one event per line, until EOF or Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use tahoe_sink::{Event, EventSink, SinkConfig, TahoeSink};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(
    name = "tahoe-sink",
    about = "Write log lines from stdin to a Tahoe-LAFS grid",
    version = "0.1.0"
)]
struct Args {
    /// Destination path under the root capability; may contain escapes like %{host} or %Y
    path: String,

    /// Output format: raw, json, syslog, log4j or debug (default: TAHOE_OUTPUT_FORMAT or raw)
    format: Option<String>,

    /// Parse each input line as a JSON-encoded event instead of a raw body
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = SinkConfig::from_env()?;
    info!("Gateway: {}", config.gateway_url);

    let mut sink_args = vec![args.path.clone()];
    sink_args.extend(args.format.clone());
    let sink = TahoeSink::from_args(sink_args.as_slice(), &config)?;

    sink.start().await?;

    let pumped = pump_stdin(&sink, args.json).await;
    let stopped = sink.stop().await;

    match (pumped, stopped) {
        (Ok(count), Ok(())) => {
            info!("Wrote {} events to {}", count, sink.path());
            Ok(())
        }
        (Err(e), stopped) => {
            if let Err(stop_err) = stopped {
                warn!("Stopping sink also failed: {}", stop_err);
            }
            error!("Sink failed: {:#}", e);
            Err(e)
        }
        (Ok(_), Err(e)) => {
            error!("Failed to stop sink: {}", e);
            Err(e.into())
        }
    }
}

/// Write each stdin line as one event; returns the number of events written
async fn pump_stdin(sink: &TahoeSink, json: bool) -> Result<u64> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut count = 0u64;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let event = if json {
                    serde_json::from_str::<Event>(&line)
                        .with_context(|| format!("invalid JSON event on line {}", count + 1))?
                } else {
                    Event::new(line)
                };

                sink.write(&event).await?;
                count += 1;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping sink");
                break;
            }
        }
    }

    Ok(count)
}
