//! Command line tools for the tickprof profiler.
//!
//! # Usage
//!
//! ```bash
//! PROFILER_WEB_KEY=abc tickprof sign "https://svc/path?x=1"
//! PROFILER_WEB_KEY=abc tickprof verify "https://svc/path?x=1&PROFILER_KEY=...&PROFILER_TOKEN=..."
//! tickprof listen --port 4343
//! tickprof demo --sleep-ms 200
//! ```

mod client;
mod demo;

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tickprof_core::constants::ENV_WEB_KEY;
use tickprof_link::LinkSigner;
use tickprof_profiler::{
    JsonSink, Profiler, ProfilerConfig, ReportServer, ReportSink, DEFAULT_PORT,
};

use client::ReportClient;

/// Default host to connect to.
const DEFAULT_HOST: &str = "127.0.0.1";

#[derive(Parser)]
#[command(name = "tickprof", version, about = "Tick-driven profiler tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign a URL as a trace-activation link.
    Sign {
        url: String,
        /// Shared secret.
        #[arg(long, env = ENV_WEB_KEY, hide_env_values = true)]
        secret: String,
    },
    /// Check whether a URL is a valid trace-activation link.
    Verify {
        url: String,
        /// Shared secret.
        #[arg(long, env = ENV_WEB_KEY, hide_env_values = true)]
        secret: String,
        /// Reject links older than this many seconds.
        #[arg(long)]
        max_age: Option<u64>,
    },
    /// Print reports broadcast by a running report server.
    Listen {
        #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
        host: String,
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Connection attempts before giving up.
        #[arg(long, default_value_t = 5)]
        attempts: u32,
    },
    /// Profile a small workload in TRACE mode and print the report.
    Demo {
        /// Sleep inside each slow call, in milliseconds.
        #[arg(long, default_value_t = 200)]
        sleep_ms: u64,
        /// Also broadcast the report on this port, waiting for one listener.
        #[arg(long)]
        serve: Option<u16>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    match Cli::parse().command {
        Command::Sign { url, secret } => {
            let signer = LinkSigner::new(secret)?;
            println!("{}", signer.sign(&url)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify {
            url,
            secret,
            max_age,
        } => {
            let mut signer = LinkSigner::new(secret)?;
            if let Some(secs) = max_age {
                signer = signer.with_max_age(Duration::from_secs(secs));
            }
            if signer.verify(&url) {
                println!("valid");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("invalid");
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Listen {
            host,
            port,
            attempts,
        } => {
            let mut client = ReportClient::connect(&host, port, attempts)?;
            while let Some(report) = client.next_report()? {
                println!("{}", report.to_json()?);
            }
            info!("Report server said goodbye");
            client.disconnect();
            Ok(ExitCode::SUCCESS)
        }
        Command::Demo { sleep_ms, serve } => {
            run_demo(Duration::from_millis(sleep_ms), serve)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_demo(sleep: Duration, serve: Option<u16>) -> anyhow::Result<()> {
    let config = ProfilerConfig::new("trace").with_capture_args(true);

    let server = serve.map(ReportServer::start).transpose()?;
    if let Some(server) = &server {
        info!("Waiting for a listener on {}", server.local_addr());
        while server.client_count() == 0 {
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    let report = {
        let mut builder = Profiler::builder(config);
        builder = match &server {
            Some(server) => builder.sink(server.sink()),
            None => builder,
        };
        let mut profiler = builder.build()?;
        demo::run(&mut profiler, sleep);
        profiler.shutdown().cloned()
    };

    if let Some(report) = report {
        let mut sink = JsonSink::pretty(io::stdout());
        sink.deliver(&report)?;
    }

    if let Some(server) = server {
        server.stop();
    }
    Ok(())
}
