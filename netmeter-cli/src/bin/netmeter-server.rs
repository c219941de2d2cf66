//! Netmeter Server - echoes measurement probes for connecting clients.
//!
//! Accepts connections until the process is killed. Each accepted
//! connection runs one session on a pool worker; a failing session never
//! stops the accept loop.

use clap::Parser;
use netmeter_cli::config::{timeout_from_ms, Config, ServerConfig};
use netmeter_io::{prepare_stream, TcpListenerBuilder, WorkerPool};
use netmeter_protocol::{MessageCodec, ParseMode, ServerOutcome, ServerSession};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "netmeter-server")]
#[command(about = "Echo server for netmeter measurement sessions", long_about = None)]
struct Args {
    /// Listen port
    port: u16,

    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Worker threads serving sessions
    #[arg(long)]
    workers: Option<usize>,

    /// Per-read deadline in milliseconds (0 = block forever)
    #[arg(long)]
    timeout: Option<u64>,

    /// Fail on non-numeric protocol fields instead of degrading to 0
    #[arg(long)]
    strict: bool,

    /// TOML config file with server defaults
    #[arg(long)]
    config: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    // Usage errors must exit 1, not clap's default 2.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            std::process::exit(1);
        }
    };

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let defaults = match &args.config {
        Some(path) => Config::from_file(path)?.server.unwrap_or_default(),
        None => ServerConfig::default(),
    };
    let workers = args.workers.unwrap_or(defaults.workers);
    anyhow::ensure!(workers > 0, "at least one worker is required");
    let read_timeout = timeout_from_ms(args.timeout.unwrap_or(defaults.read_timeout_ms));
    let mode = if args.strict || defaults.strict_parsing {
        ParseMode::Strict
    } else {
        ParseMode::Lenient
    };

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    let listener = TcpListenerBuilder::new().bind(addr)?;
    tracing::info!(%addr, workers, "listening");

    let pool = WorkerPool::new(workers);
    let codec = MessageCodec::new(mode);
    let sessions_served = Arc::new(AtomicU64::new(0));

    loop {
        let (stream, peer) = match listener.accept() {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(error = %err, "accept failed");
                continue;
            }
        };
        tracing::info!(%peer, "connection accepted");
        if let Err(err) = prepare_stream(&stream, read_timeout) {
            tracing::warn!(%peer, error = %err, "failed to prepare connection");
            continue;
        }

        let served = Arc::clone(&sessions_served);
        pool.execute(move || {
            let mut session = ServerSession::with_codec(stream, codec);
            match session.run() {
                Ok(ServerOutcome::Completed { probes_echoed }) => {
                    let total = served.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::info!(%peer, probes_echoed, total, "session completed");
                }
                Ok(ServerOutcome::Rejected) => {
                    tracing::warn!(%peer, "setup rejected");
                }
                Err(err) => {
                    tracing::warn!(%peer, error = %err, "session aborted");
                }
            }
        });
    }
}
