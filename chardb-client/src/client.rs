//! High-level client API.
//!
//! Wraps a [`Connection`] and its event stream, turning each operation's
//! terminal event into a `Result`.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use crate::event::{ConnectionEvent, EventReceiver};
use chardb_protocol::{CharacterRecord, Request};

/// High-level client for chardb.
pub struct Client {
    conn: Connection,
    events: EventReceiver,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        let (conn, events) = Connection::new(config);
        Self { conn, events }
    }

    /// Connects to `host` and waits for the outcome.
    pub async fn connect(&mut self, host: &str) -> Result<(), ClientError> {
        self.conn.connect(host);

        let timeout = self.conn.config().connect_timeout;
        loop {
            let event = tokio::time::timeout(timeout * 2, self.events.recv())
                .await
                .map_err(|_| ClientError::Timeout)?
                .ok_or(ClientError::ConnectionClosed)?;

            match event {
                ConnectionEvent::Connected => return Ok(()),
                ConnectionEvent::ConnectionFailed(reason) => {
                    return Err(ClientError::ConnectionFailed(reason))
                }
                // Leftovers from an earlier connection
                other => tracing::debug!("Skipping stale event while connecting: {:?}", other),
            }
        }
    }

    /// Returns whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Closes the connection and waits for the event loop to finish.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.conn.close();
        self.conn.closed().await;
        while let Ok(event) = self.events.try_recv() {
            tracing::debug!("Discarding event after close: {:?}", event);
        }
        Ok(())
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // =========================================================================
    // Helper methods
    // =========================================================================

    /// Sends a request and waits for the event that resolves it.
    ///
    /// On timeout the connection is closed, since closing is the only way to
    /// abandon an outstanding request.
    async fn request(&mut self, request: Request) -> Result<ConnectionEvent, ClientError> {
        let command = request.command();
        // Unframeable requests fail here with a typed error instead of an
        // "encoding error" event.
        request.encode(self.conn.config().layout)?;

        self.discard_stale();
        self.conn.send(request);

        let outcome = match self.conn.config().request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.next_terminal())
                .await
                .unwrap_or(Err(ClientError::Timeout)),
            None => self.next_terminal().await,
        };

        if matches!(outcome, Err(ClientError::Timeout)) {
            tracing::debug!("{} timed out, closing connection", command);
            self.close().await?;
        }

        match outcome? {
            ConnectionEvent::OperationFailed(message) => {
                Err(ClientError::from_failure_message(message))
            }
            event => Ok(event),
        }
    }

    async fn next_terminal(&mut self) -> Result<ConnectionEvent, ClientError> {
        let mut skip_next = false;
        loop {
            let event = self
                .events
                .recv()
                .await
                .ok_or(ClientError::ConnectionClosed)?;
            match event {
                ConnectionEvent::Unsolicited => skip_next = true,
                event if skip_next => {
                    tracing::debug!("Skipping unsolicited reply: {:?}", event);
                    skip_next = false;
                }
                event if event.is_terminal() => return Ok(event),
                event => tracing::debug!("Skipping lifecycle event: {:?}", event),
            }
        }
    }

    /// Drops events already queued before a new request is sent. Nothing is
    /// outstanding at this point, so none of them can answer it.
    fn discard_stale(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            tracing::debug!("Discarding stale event: {:?}", event);
        }
    }

    // =========================================================================
    // Record operations
    // =========================================================================

    /// Lists every record.
    ///
    /// An empty database is reported by the server as a failure and surfaces
    /// as an error for which [`ClientError::is_empty_result_set`] holds.
    pub async fn list(&mut self) -> Result<Vec<CharacterRecord>, ClientError> {
        match self.request(Request::GetAll).await? {
            ConnectionEvent::RecordsReceived(records) => Ok(records),
            other => Err(unexpected(other)),
        }
    }

    /// Gets one record by id.
    pub async fn get(&mut self, id: i32) -> Result<CharacterRecord, ClientError> {
        match self.request(Request::GetOne(id)).await? {
            ConnectionEvent::RecordReceived(record) => Ok(record),
            other => Err(unexpected(other)),
        }
    }

    /// Creates a record.
    pub async fn add(&mut self, record: CharacterRecord) -> Result<(), ClientError> {
        self.expect_success(Request::Add(record)).await
    }

    /// Updates a record.
    pub async fn update(&mut self, record: CharacterRecord) -> Result<(), ClientError> {
        self.expect_success(Request::Update(record)).await
    }

    /// Removes a record by id.
    pub async fn remove(&mut self, id: i32) -> Result<(), ClientError> {
        self.expect_success(Request::Remove(id)).await
    }

    async fn expect_success(&mut self, request: Request) -> Result<(), ClientError> {
        match self.request(request).await? {
            ConnectionEvent::OperationSucceeded => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(event: ConnectionEvent) -> ClientError {
    ClientError::UnexpectedEvent(format!("{:?}", event))
}
