//! Netmeter Client - runs one measurement session against a server.
//!
//! Connects, negotiates the measurement parameters, exchanges timed probes,
//! tears the session down, and prints the collected statistics.

use clap::Parser;
use netmeter_cli::config::{timeout_from_ms, ClientConfig, Config};
use netmeter_cli::stats::display_report;
use netmeter_io::TcpConnector;
use netmeter_protocol::{
    ClientSession, MeasurementKind, MessageCodec, ParseMode, SessionConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "netmeter-client")]
#[command(about = "Measure RTT or throughput against a netmeter server", long_about = None)]
struct Args {
    /// Server hostname or address
    host: String,

    /// Server port
    port: u16,

    /// Measurement type: rtt or tput
    kind: String,

    /// Probe payload size in bytes
    size: usize,

    /// Number of probes
    probes: u32,

    /// Server-side delay hint in milliseconds, carried in the setup
    #[arg(long, default_value = "0")]
    delay: u32,

    /// Per-read deadline in milliseconds (0 = block forever)
    #[arg(long)]
    timeout: Option<u64>,

    /// Fail on non-numeric protocol fields instead of degrading to 0
    #[arg(long)]
    strict: bool,

    /// TOML config file with client defaults
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

    let kind = MeasurementKind::from_token(&args.kind).ok_or_else(|| {
        anyhow::anyhow!("measurement type must be rtt or tput, got {:?}", args.kind)
    })?;

    let defaults = match &args.config {
        Some(path) => Config::from_file(path)?.client.unwrap_or_default(),
        None => ClientConfig::default(),
    };
    let strict = args.strict || defaults.strict_parsing;
    let read_timeout = timeout_from_ms(args.timeout.unwrap_or(defaults.read_timeout_ms));
    let connect_timeout = timeout_from_ms(defaults.connect_timeout_ms);

    let session_config =
        SessionConfig::new(kind, args.size, args.probes).with_server_delay(args.delay);

    tracing::info!(host = %args.host, port = args.port, %kind, "connecting");
    let stream = TcpConnector::new()
        .connect_timeout(connect_timeout)
        .read_timeout(read_timeout)
        .connect(&args.host, args.port)?;

    let mode = if strict {
        ParseMode::Strict
    } else {
        ParseMode::Lenient
    };
    let mut session = ClientSession::with_codec(stream, session_config, MessageCodec::new(mode))?;
    session.start()?;
    session.run_probes()?;
    let report = session.close()?;

    display_report(&report);
    Ok(())
}
