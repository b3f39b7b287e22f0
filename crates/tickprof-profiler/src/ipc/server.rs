//! TCP server broadcasting finalized reports.
//!
//! Listeners connect, receive a `Hello` frame, and then one `Report` frame
//! per finalized profile until either side sends `Goodbye`. Writes block
//! (bounded by [`WRITE_TIMEOUT`]) so a large report is never cut short; the
//! accept thread only switches a stream to nonblocking while draining its
//! control messages.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::protocol::{decode, encode, ClientMessage, ServerMessage, PROTOCOL_VERSION};
use crate::events::ProfileReport;
use crate::sink::ReportSink;

/// Idle wait between accept polls.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Longest a single frame write may stall before the listener is dropped.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Listeners only ever send control messages.
const MAX_CLIENT_FRAME: usize = 1024;

type Listeners = Arc<Mutex<Vec<Listener>>>;

/// One connected listener and the control bytes received from it so far.
struct Listener {
    stream: TcpStream,
    peer: SocketAddr,
    inbox: Vec<u8>,
}

impl Listener {
    /// Configure a fresh connection and send the version handshake.
    fn greet(stream: TcpStream, peer: SocketAddr) -> io::Result<Self> {
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(WRITE_TIMEOUT))?;

        let mut listener = Self {
            stream,
            peer,
            inbox: Vec::new(),
        };
        let hello = encode(&ServerMessage::Hello {
            version: PROTOCOL_VERSION,
        })
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        listener.send(&hello)?;
        Ok(listener)
    }

    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        self.stream.write_all(frame)
    }

    /// Drain pending control messages. `false` drops the listener.
    fn poll(&mut self) -> bool {
        match self.fill_inbox() {
            Ok(true) => self.process_inbox(),
            Ok(false) => {
                debug!(peer = %self.peer, "Report listener closed the connection");
                false
            }
            Err(e) => {
                debug!(peer = %self.peer, "Report listener disconnected: {e}");
                false
            }
        }
    }

    /// Read whatever is available without blocking. `Ok(false)` on EOF.
    fn fill_inbox(&mut self) -> io::Result<bool> {
        self.stream.set_nonblocking(true)?;
        let mut buf = [0u8; 256];
        let open = loop {
            match self.stream.read(&mut buf) {
                Ok(0) => break Ok(false),
                Ok(n) => self.inbox.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(true),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => break Err(e),
            }
        };
        self.stream.set_nonblocking(false)?;
        open
    }

    /// Handle every complete frame in the inbox, keeping a partial tail.
    fn process_inbox(&mut self) -> bool {
        while let Some(header) = self.inbox.first_chunk::<4>() {
            let len = u32::from_le_bytes(*header) as usize;
            if len > MAX_CLIENT_FRAME {
                warn!(peer = %self.peer, "Oversized control frame from report listener");
                return false;
            }
            if self.inbox.len() < 4 + len {
                break;
            }
            let message = decode::<ClientMessage>(&self.inbox[4..4 + len]);
            self.inbox.drain(..4 + len);
            match message {
                Ok(ClientMessage::Hello) => {}
                Ok(ClientMessage::Goodbye) => {
                    info!(peer = %self.peer, "Report listener said goodbye");
                    return false;
                }
                Err(e) => {
                    warn!(peer = %self.peer, "Malformed control frame: {e}");
                    return false;
                }
            }
        }
        true
    }
}

/// Broadcasts finalized profiles to connected listeners.
pub struct ReportServer {
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    listeners: Listeners,
    addr: SocketAddr,
}

impl ReportServer {
    /// Bind `127.0.0.1:port` and start accepting. Port 0 picks a free port.
    pub fn start(port: u16) -> io::Result<Self> {
        let socket = TcpListener::bind(("127.0.0.1", port))?;
        socket.set_nonblocking(true)?;
        let addr = socket.local_addr()?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let listeners = Listeners::default();

        let worker = {
            let shutdown = Arc::clone(&shutdown);
            let listeners = Arc::clone(&listeners);
            thread::Builder::new()
                .name("tickprof-ipc".into())
                .spawn(move || accept_loop(&socket, &shutdown, &listeners))?
        };

        info!(%addr, "Report server listening");

        Ok(Self {
            shutdown,
            worker: Some(worker),
            listeners,
            addr,
        })
    }

    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of connected listeners.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// A sink that broadcasts reports through this server.
    #[must_use]
    pub fn sink(&self) -> ServerSink {
        ServerSink {
            listeners: Arc::clone(&self.listeners),
        }
    }

    /// Send `report` to every listener. Fails if it cannot be encoded or if
    /// any listener had to be dropped before receiving the whole frame.
    pub fn broadcast(&self, report: &ProfileReport) -> io::Result<()> {
        broadcast(&self.listeners, report)
    }

    /// Say goodbye to every listener and join the accept thread.
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        match encode(&ServerMessage::Goodbye) {
            Ok(frame) => {
                if let Err(e) = send_to_all(&self.listeners, &frame) {
                    debug!("Goodbye not delivered: {e}");
                }
            }
            Err(e) => warn!("Failed to encode goodbye: {e}"),
        }

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Report server thread panicked");
            }
        }

        info!("Report server stopped");
    }
}

impl Drop for ReportServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

fn accept_loop(socket: &TcpListener, shutdown: &AtomicBool, listeners: &Listeners) {
    while !shutdown.load(Ordering::Relaxed) {
        match socket.accept() {
            Ok((stream, peer)) => match Listener::greet(stream, peer) {
                Ok(listener) => {
                    info!(%peer, "Report listener connected");
                    listeners.lock().push(listener);
                }
                Err(e) => warn!(%peer, "Failed to greet report listener: {e}"),
            },
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                warn!("Accept error: {e}");
                thread::sleep(POLL_INTERVAL * 10);
            }
        }

        listeners.lock().retain_mut(Listener::poll);
    }
}

/// Write `frame` to every listener, dropping the ones that fail.
fn send_to_all(listeners: &Listeners, frame: &[u8]) -> io::Result<()> {
    let mut failure = None;
    listeners.lock().retain_mut(|listener| match listener.send(frame) {
        Ok(()) => true,
        Err(e) => {
            warn!(peer = %listener.peer, "Dropping report listener: {e}");
            failure = Some(io::Error::new(
                e.kind(),
                format!("listener {} dropped mid-frame: {e}", listener.peer),
            ));
            false
        }
    });
    failure.map_or(Ok(()), Err)
}

fn broadcast(listeners: &Listeners, report: &ProfileReport) -> io::Result<()> {
    let frame = encode(&ServerMessage::Report(Box::new(report.clone())))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    send_to_all(listeners, &frame)
}

/// Sink handle for a [`ReportServer`]. Clones share the same listeners.
#[derive(Clone)]
pub struct ServerSink {
    listeners: Listeners,
}

impl ReportSink for ServerSink {
    fn deliver(&mut self, report: &ProfileReport) -> tickprof_core::Result<()> {
        broadcast(&self.listeners, report)?;
        Ok(())
    }
}
