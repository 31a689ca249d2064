//! Per-connection lifecycle.
//!
//! A session starts out waiting for its name line. Once named it joins the
//! [`Registry`] and then does two things at once until the connection fails:
//! forwards every line the peer sends as a broadcast, and writes out whatever
//! other sessions queued in its outbox. Leaving the registry happens exactly
//! once, on the way out of [`Session::run`].

use std::{io, net::SocketAddr, sync::Arc};

use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    select,
    sync::mpsc,
};
use tracing::{debug, info};

use crate::{
    protocol::{Message, parse_name, read_line},
    registry::{Outgoing, Registry, SessionHandle, SessionId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingName,
    Active,
    Terminated,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to read from peer")]
    Read(#[source] io::Error),
    #[error("failed to write to peer")]
    Write(#[source] io::Error),
}

pub struct Session<R, W> {
    id: SessionId,
    peer: Option<SocketAddr>,
    reader: BufReader<R>,
    writer: W,
    buffer: Vec<u8>,
    name: Option<String>,
    state: SessionState,
    registry: Arc<Registry>,
}

impl Session<OwnedReadHalf, OwnedWriteHalf> {
    pub fn from_stream(stream: TcpStream, registry: Arc<Registry>) -> Self {
        let peer = stream.peer_addr().ok();
        let (reader, writer) = stream.into_split();
        Self::new(reader, writer, peer, registry)
    }
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, peer: Option<SocketAddr>, registry: Arc<Registry>) -> Self {
        let id = registry.next_id();
        Self {
            id,
            peer,
            reader: BufReader::new(reader),
            writer,
            buffer: Vec::new(),
            name: None,
            state: SessionState::AwaitingName,
            registry,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drives the session until the peer goes away or I/O fails.
    ///
    /// A clean close by the peer is `Ok`; read or write failures come back as
    /// errors. Either way the session is out of the registry when this returns.
    pub async fn run(mut self) -> Result<(), SessionError> {
        info!(peer = ?self.peer, session = self.id, "client connected");
        let outcome = self.drive().await;
        self.terminate();
        outcome
    }

    async fn drive(&mut self) -> Result<(), SessionError> {
        let Some(name) = self.await_name().await? else {
            return Ok(());
        };
        let mut outbox = self.activate(name);
        self.relay(&mut outbox).await
    }

    async fn await_name(&mut self) -> Result<Option<String>, SessionError> {
        let line = read_line(&mut self.reader, &mut self.buffer)
            .await
            .map_err(SessionError::Read)?;
        Ok(line.map(|line| parse_name(&line)))
    }

    fn activate(&mut self, name: String) -> mpsc::UnboundedReceiver<Outgoing> {
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        self.registry
            .register(SessionHandle::new(self.id, name.clone(), outbox_tx));
        debug!(session = self.id, %name, "client named");
        self.name = Some(name);
        self.state = SessionState::Active;
        outbox_rx
    }

    async fn relay(
        &mut self,
        outbox: &mut mpsc::UnboundedReceiver<Outgoing>,
    ) -> Result<(), SessionError> {
        let Self {
            id,
            reader,
            writer,
            buffer,
            name,
            registry,
            ..
        } = self;
        let name = name.as_deref().unwrap_or_default();

        loop {
            select! {
                line = read_line(reader, buffer) => {
                    match line.map_err(SessionError::Read)? {
                        Some(line) => {
                            registry.broadcast(*id, &Message::new(name, &line));
                        }
                        None => return Ok(()),
                    }
                }
                Some(payload) = outbox.recv() => {
                    write_payload(writer, &payload).await?;
                }
            }
        }
    }

    fn terminate(&mut self) {
        if self.state == SessionState::Active {
            self.registry.deregister(self.id);
        }
        self.state = SessionState::Terminated;
        info!(
            peer = ?self.peer,
            session = self.id,
            name = self.name.as_deref().unwrap_or(""),
            "client disconnected"
        );
    }
}

async fn write_payload<W>(writer: &mut W, payload: &[u8]) -> Result<(), SessionError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(payload).await.map_err(SessionError::Write)?;
    writer.flush().await.map_err(SessionError::Write)
}
