//! TCP client for the report server.

use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::{debug, info};

use tickprof_profiler::ipc::protocol::{decode, encode, read_frame};
use tickprof_profiler::{ClientMessage, ProfileReport, ServerMessage, PROTOCOL_VERSION};

/// Reconnection attempt interval.
const RECONNECT_INTERVAL: Duration = Duration::from_secs(2);

/// Blocking listener for finalized reports.
pub struct ReportClient {
    stream: TcpStream,
}

impl ReportClient {
    /// Connect to `host:port`, retrying until `attempts` run out.
    pub fn connect(host: &str, port: u16, attempts: u32) -> anyhow::Result<Self> {
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("invalid address {host}:{port}"))?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match TcpStream::connect_timeout(&addr, Duration::from_secs(2)) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    info!("Connected to report server at {addr}");
                    return Ok(Self { stream });
                }
                Err(e) if attempt < attempts => {
                    debug!("Connection attempt {attempt} failed: {e}");
                    thread::sleep(RECONNECT_INTERVAL);
                }
                Err(e) => return Err(e).context(format!("could not connect to {addr}")),
            }
        }
    }

    /// Block until the next report. `None` when the server says goodbye.
    pub fn next_report(&mut self) -> anyhow::Result<Option<ProfileReport>> {
        loop {
            let frame = read_frame(&mut self.stream).context("connection lost")?;
            match decode::<ServerMessage>(&frame)? {
                ServerMessage::Hello { version } => {
                    if version != PROTOCOL_VERSION {
                        bail!(
                            "Protocol version mismatch: server={version}, client={PROTOCOL_VERSION}"
                        );
                    }
                }
                ServerMessage::Report(report) => return Ok(Some(*report)),
                ServerMessage::Goodbye => return Ok(None),
            }
        }
    }

    /// Tell the server we are leaving.
    pub fn disconnect(mut self) {
        if let Ok(data) = encode(&ClientMessage::Goodbye) {
            let _ = self.stream.write_all(&data);
        }
    }
}
