//! Connection management.
//!
//! A [`Connection`] owns one TCP stream driven by a single event loop task.
//! The task reads bytes into a [`FrameReader`], classifies each complete
//! message, and writes queued requests one at a time so that at most one is
//! ever in flight. Outcomes are delivered as [`ConnectionEvent`]s.

use crate::event::{ConnectionEvent, EventReceiver, DISCONNECTED, NOT_CONNECTED};
use crate::tracker::RequestTracker;
use chardb_protocol::{
    classify, CharacterRecord, Failure, FrameReader, Layout, ProtocolError, Reply, Request,
    DEFAULT_PORT, MAX_FRAME_SIZE,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server port.
    pub port: u16,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// How long [`Client`](crate::Client) waits for an outcome before closing
    /// the connection. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
    /// Maximum bytes buffered without a delimiter.
    pub max_frame_size: usize,
    /// Record layout spoken on the wire.
    pub layout: Layout,
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self {
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Some(Duration::from_secs(30)),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_frame_size: MAX_FRAME_SIZE,
            layout: Layout::default(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Messages from the [`Connection`] handle to its event loop.
#[derive(Debug)]
enum Op {
    Send(Request),
    Close,
}

/// A connection to a chardb server.
///
/// All operations return immediately; results arrive on the [`EventReceiver`]
/// returned by [`Connection::new`]. Must be used inside a tokio runtime.
pub struct Connection {
    config: ConnectionConfig,
    /// Sender half of the event stream, shared with the event loop.
    events: mpsc::UnboundedSender<ConnectionEvent>,
    /// Request channel into the running event loop.
    ops: Option<mpsc::UnboundedSender<Op>>,
    /// Is the connection established?
    connected: Arc<AtomicBool>,
    /// Event loop task.
    task: Option<JoinHandle<()>>,
}

impl Connection {
    /// Creates a new connection (not yet connected) and its event stream.
    pub fn new(config: ConnectionConfig) -> (Self, EventReceiver) {
        let (events, receiver) = mpsc::unbounded_channel();
        let conn = Self {
            config,
            events,
            ops: None,
            connected: Arc::new(AtomicBool::new(false)),
            task: None,
        };
        (conn, receiver)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Starts connecting to `host` on the configured port.
    ///
    /// Emits `Connected` or `ConnectionFailed`. Any previous connection is
    /// closed first and finishes emitting its events before the new attempt.
    pub fn connect(&mut self, host: impl Into<String>) {
        let host = host.into();
        let previous = self.task.take();
        self.close();

        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let event_loop = EventLoop::new(&self.config, self.events.clone(), self.connected.clone());

        tracing::debug!("Connecting to {}:{}...", host, self.config.port);
        self.task = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            event_loop.run(host, ops_rx).await;
        }));
        self.ops = Some(ops_tx);
    }

    /// Requests every record.
    pub fn request_all(&self) {
        self.send(Request::GetAll);
    }

    /// Requests the record with `id`.
    pub fn request_one(&self, id: i32) {
        self.send(Request::GetOne(id));
    }

    /// Creates a record. The server assigns its id.
    pub fn create(&self, record: CharacterRecord) {
        self.send(Request::Add(record));
    }

    /// Replaces the record with the same id.
    pub fn update(&self, record: CharacterRecord) {
        self.send(Request::Update(record));
    }

    /// Removes the record with `id`.
    pub fn remove(&self, id: i32) {
        self.send(Request::Remove(id));
    }

    /// Queues a request. Requests are written in order, each one only after
    /// the previous one has been answered.
    pub fn send(&self, request: Request) {
        let command = request.command();
        if let Some(ops) = &self.ops {
            if ops.send(Op::Send(request)).is_ok() {
                return;
            }
        }
        tracing::debug!("{} issued without a connection", command);
        let _ = self
            .events
            .send(ConnectionEvent::OperationFailed(NOT_CONNECTED.to_string()));
    }

    /// Closes the connection. Outstanding and queued requests fail with
    /// "disconnected".
    pub fn close(&mut self) {
        if let Some(ops) = self.ops.take() {
            tracing::debug!("Closing connection...");
            let _ = ops.send(Op::Close);
        }
    }

    /// Waits until the event loop has emitted its final event.
    pub async fn closed(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Why the event loop stopped serving.
#[derive(Debug)]
enum Shutdown {
    Local,
    Peer,
    Failed(String),
}

/// State owned by the connection task.
struct EventLoop {
    port: u16,
    connect_timeout: Duration,
    read_buffer_size: usize,
    layout: Layout,
    reader: FrameReader,
    tracker: RequestTracker,
    /// Requests waiting for the in-flight one to resolve.
    queue: VecDeque<Request>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    connected: Arc<AtomicBool>,
}

impl EventLoop {
    fn new(
        config: &ConnectionConfig,
        events: mpsc::UnboundedSender<ConnectionEvent>,
        connected: Arc<AtomicBool>,
    ) -> Self {
        Self {
            port: config.port,
            connect_timeout: config.connect_timeout,
            read_buffer_size: config.read_buffer_size,
            layout: config.layout,
            reader: FrameReader::with_max_frame_size(config.max_frame_size),
            tracker: RequestTracker::new(),
            queue: VecDeque::new(),
            events,
            connected,
        }
    }

    async fn run(mut self, host: String, mut ops: mpsc::UnboundedReceiver<Op>) {
        let stream = match self.establish(&host, &mut ops).await {
            Ok(stream) => stream,
            Err(reason) => {
                tracing::debug!("Connection to {}:{} failed: {}", host, self.port, reason);
                self.emit(ConnectionEvent::ConnectionFailed(reason));
                self.fail_pending(&mut ops, NOT_CONNECTED);
                return;
            }
        };

        // Configure TCP options for request/response latency
        stream.set_nodelay(true).ok();

        self.connected.store(true, Ordering::SeqCst);
        tracing::info!("Connected to {}:{}", host, self.port);
        self.emit(ConnectionEvent::Connected);

        let (mut read_half, mut write_half) = stream.into_split();
        let shutdown = self.serve(&mut read_half, &mut write_half, &mut ops).await;
        self.connected.store(false, Ordering::SeqCst);

        match &shutdown {
            Shutdown::Local => {
                tracing::info!("Connection to {}:{} closed", host, self.port);
                let _ = write_half.shutdown().await;
            }
            Shutdown::Peer => tracing::info!("Connection closed by {}:{}", host, self.port),
            Shutdown::Failed(e) => tracing::warn!("Connection to {}:{} lost: {}", host, self.port, e),
        }

        if let Some(command) = self.tracker.reset() {
            tracing::debug!("{} interrupted by disconnect", command);
            self.emit(ConnectionEvent::OperationFailed(DISCONNECTED.to_string()));
        }
        self.fail_pending(&mut ops, DISCONNECTED);
        self.reader.clear();
        self.emit(ConnectionEvent::Disconnected);
    }

    /// Connects, queueing requests that arrive in the meantime.
    async fn establish(
        &mut self,
        host: &str,
        ops: &mut mpsc::UnboundedReceiver<Op>,
    ) -> Result<TcpStream, String> {
        let connect = tokio::time::timeout(self.connect_timeout, TcpStream::connect((host, self.port)));
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => {
                    return match result {
                        Ok(Ok(stream)) => Ok(stream),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(_) => Err("connection timed out".to_string()),
                    };
                }
                op = ops.recv() => match op {
                    Some(Op::Send(request)) => self.queue.push_back(request),
                    Some(Op::Close) | None => return Err("connection cancelled".to_string()),
                },
            }
        }
    }

    async fn serve(
        &mut self,
        read_half: &mut OwnedReadHalf,
        write_half: &mut OwnedWriteHalf,
        ops: &mut mpsc::UnboundedReceiver<Op>,
    ) -> Shutdown {
        let mut buf = vec![0u8; self.read_buffer_size];

        loop {
            if let Err(e) = self.pump(write_half).await {
                return Shutdown::Failed(e.to_string());
            }

            tokio::select! {
                biased;

                // Handle incoming data from the server
                result = read_half.read(&mut buf) => {
                    match result {
                        Ok(0) => return Shutdown::Peer,
                        Ok(n) => {
                            tracing::debug!("Received {} bytes", n);
                            if let Err(e) = self.on_data(&buf[..n]) {
                                return Shutdown::Failed(e.to_string());
                            }
                        }
                        Err(e) => return Shutdown::Failed(e.to_string()),
                    }
                }

                // Handle requests from the connection handle
                op = ops.recv() => {
                    match op {
                        Some(Op::Send(request)) => self.queue.push_back(request),
                        Some(Op::Close) | None => return Shutdown::Local,
                    }
                }
            }
        }
    }

    /// Writes queued requests while nothing is in flight.
    async fn pump(&mut self, writer: &mut OwnedWriteHalf) -> std::io::Result<()> {
        while self.tracker.is_idle() {
            let Some(request) = self.queue.pop_front() else {
                break;
            };
            let command = request.command();

            let frame = match request.encode(self.layout) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!("Failed to encode {} request: {}", command, e);
                    self.emit(ConnectionEvent::OperationFailed(format!(
                        "encoding error: {}",
                        e
                    )));
                    continue;
                }
            };

            // Track before writing so a failed write still resolves the request.
            self.tracker.begin(command);
            writer.write_all(&frame).await?;
            tracing::debug!("Sent {} ({} bytes)", command, frame.len());
        }
        Ok(())
    }

    /// Extracts and dispatches every complete message in arrival order.
    fn on_data(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        self.reader.extend(data);
        while let Some(message) = self.reader.next_frame() {
            self.dispatch(&message);
        }
        self.reader.ensure_within_limit()
    }

    fn dispatch(&mut self, message: &[u8]) {
        let in_flight = self.tracker.complete();
        let reply = classify(message, self.layout);

        match (in_flight, &reply) {
            (None, _) => tracing::warn!(
                "Unsolicited message from server ({} bytes)",
                message.len()
            ),
            (Some(command), Reply::Failure(failure)) => {
                tracing::debug!("{} failed: {}", command, failure)
            }
            (Some(command), _) => tracing::debug!("{} completed", command),
        }
        match &reply {
            Reply::Failure(Failure::EmptyResponse) => tracing::warn!("Received empty frame"),
            Reply::Failure(Failure::UnknownResponse(code)) => {
                tracing::warn!("Unknown response code {:#04x}", code)
            }
            _ => {}
        }

        if in_flight.is_none() {
            self.emit(ConnectionEvent::Unsolicited);
        }
        self.emit(reply.into());
    }

    /// Fails every request that will never be written.
    fn fail_pending(&mut self, ops: &mut mpsc::UnboundedReceiver<Op>, reason: &str) {
        ops.close();
        while let Ok(op) = ops.try_recv() {
            if let Op::Send(request) = op {
                self.queue.push_back(request);
            }
        }

        for request in std::mem::take(&mut self.queue) {
            tracing::debug!("{} dropped: {}", request.command(), reason);
            self.emit(ConnectionEvent::OperationFailed(reason.to_string()));
        }
    }

    fn emit(&self, event: ConnectionEvent) {
        // The handle may already be gone; events are then discarded.
        let _ = self.events.send(event);
    }
}
