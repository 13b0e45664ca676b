use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use roomsync::{ClientMessage, ServerMessage};

use crate::error::ConnectionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub token: String,
    pub display_name: String,
    pub device: String,
    pub hub_id: Option<String>,
}

impl JoinRequest {
    pub fn new(token: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            display_name: display_name.into(),
            device: "desktop".to_owned(),
            hub_id: None,
        }
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    pub fn with_hub(mut self, hub_id: impl Into<String>) -> Self {
        self.hub_id = Some(hub_id.into());
        self
    }
}

pub struct Joined<S> {
    pub session: S,
    pub inbound: mpsc::UnboundedReceiver<ServerMessage>,
}

pub trait Session: Send + 'static {
    fn send(&mut self, message: ClientMessage) -> Result<(), ConnectionError>;

    fn close(&mut self) {}
}

pub trait Transport: Send {
    type Session: Session;

    fn join(
        &mut self,
        request: &JoinRequest,
    ) -> impl Future<Output = Result<Joined<Self::Session>, ConnectionError>> + Send;
}

/// Creates an in-process room and the transport that connects to it.
pub fn memory_room() -> (MemoryTransport, MemoryRoom) {
    let (lobby_tx, lobby_rx) = mpsc::unbounded_channel();
    let refusal = Arc::new(Mutex::new(None));
    (
        MemoryTransport {
            lobby: lobby_tx,
            refusal: refusal.clone(),
        },
        MemoryRoom {
            lobby: lobby_rx,
            refusal,
        },
    )
}

#[derive(Debug, Clone)]
pub struct MemoryTransport {
    lobby: mpsc::UnboundedSender<RoomConnection>,
    refusal: Arc<Mutex<Option<String>>>,
}

impl Transport for MemoryTransport {
    type Session = MemorySession;

    async fn join(
        &mut self,
        request: &JoinRequest,
    ) -> Result<Joined<MemorySession>, ConnectionError> {
        let refused = self
            .refusal
            .lock()
            .map_err(|_| ConnectionError::Closed)?
            .clone();
        if let Some(reason) = refused {
            return Err(ConnectionError::Rejected(reason));
        }

        let (downstream_tx, downstream_rx) = mpsc::unbounded_channel();
        let (upstream_tx, upstream_rx) = mpsc::unbounded_channel();
        let connection = RoomConnection {
            request: request.clone(),
            downstream: downstream_tx,
            upstream: upstream_rx,
        };
        self.lobby
            .send(connection)
            .map_err(|_| ConnectionError::Closed)?;

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        tokio::spawn(decode_frames(downstream_rx, inbound_tx));

        log::debug!("joined in-memory room as {}", request.display_name);
        Ok(Joined {
            session: MemorySession {
                upstream: Some(upstream_tx),
            },
            inbound: inbound_rx,
        })
    }
}

async fn decode_frames(
    mut frames: mpsc::UnboundedReceiver<Vec<u8>>,
    inbound: mpsc::UnboundedSender<ServerMessage>,
) {
    while let Some(frame) = frames.recv().await {
        match ServerMessage::deserialize(&frame) {
            Ok(message) => {
                if inbound.send(message).is_err() {
                    break;
                }
            }
            Err(e) => log::warn!("dropping undecodable frame ({} bytes): {e}", frame.len()),
        }
    }
}

#[derive(Debug)]
pub struct MemorySession {
    upstream: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

impl Session for MemorySession {
    fn send(&mut self, message: ClientMessage) -> Result<(), ConnectionError> {
        let upstream = self.upstream.as_ref().ok_or(ConnectionError::Closed)?;
        let frame = message
            .serialize()
            .map_err(|e| ConnectionError::Transport(e.into()))?;
        upstream.send(frame).map_err(|_| ConnectionError::Closed)
    }

    fn close(&mut self) {
        self.upstream = None;
    }
}

/// Server side of [`memory_room`]: admits joins and exchanges frames with them.
#[derive(Debug)]
pub struct MemoryRoom {
    lobby: mpsc::UnboundedReceiver<RoomConnection>,
    refusal: Arc<Mutex<Option<String>>>,
}

impl MemoryRoom {
    pub async fn accept(&mut self) -> Option<RoomConnection> {
        self.lobby.recv().await
    }

    pub fn try_accept(&mut self) -> Option<RoomConnection> {
        self.lobby.try_recv().ok()
    }

    /// Rejects every following join with `reason`; `None` admits again.
    pub fn refuse(&self, reason: Option<&str>) {
        if let Ok(mut refusal) = self.refusal.lock() {
            *refusal = reason.map(str::to_owned);
        }
    }
}

#[derive(Debug)]
pub struct RoomConnection {
    pub request: JoinRequest,
    downstream: mpsc::UnboundedSender<Vec<u8>>,
    upstream: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl RoomConnection {
    pub fn push(&self, message: &ServerMessage) -> anyhow::Result<()> {
        self.push_frame(message.serialize()?)
    }

    pub fn push_frame(&self, frame: Vec<u8>) -> anyhow::Result<()> {
        self.downstream
            .send(frame)
            .map_err(|_| anyhow::anyhow!("participant disconnected"))
    }

    pub async fn recv(&mut self) -> Option<ClientMessage> {
        loop {
            let frame = self.upstream.recv().await?;
            match ClientMessage::deserialize(&frame) {
                Ok(message) => return Some(message),
                Err(e) => log::warn!("dropping undecodable frame from participant: {e}"),
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<ClientMessage> {
        while let Ok(frame) = self.upstream.try_recv() {
            if let Ok(message) = ClientMessage::deserialize(&frame) {
                return Some(message);
            }
        }
        None
    }

    pub fn drain(&mut self) -> Vec<ClientMessage> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.upstream.is_closed()
    }
}
