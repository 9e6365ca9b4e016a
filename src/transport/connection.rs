//! Single client connection over any async byte stream.

use crate::config::ProtocolConfig;
use crate::core::codec::FrameCodec;
use crate::error::{ProtocolError, Result};
use crate::protocol::events::ClientEvent;
use crate::protocol::session::ProtocolSession;
use crate::utils::metrics::global_metrics;
use crate::utils::timeout::with_timeout_error;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, info, instrument, warn};

/// A framed stream driving one [`ProtocolSession`].
pub struct Connection<S> {
    framed: Framed<S, FrameCodec>,
    session: ProtocolSession,
}

impl Connection<TcpStream> {
    /// Open a TCP connection to the configured server.
    #[instrument(skip(config), fields(address = %config.transport.address))]
    pub async fn connect(config: &ProtocolConfig) -> Result<Self> {
        let address = config.transport.address.as_str();
        let stream = with_timeout_error(
            async { TcpStream::connect(address).await.map_err(ProtocolError::from) },
            config.transport.connection_timeout,
        )
        .await?;
        stream.set_nodelay(true)?;
        info!("Connected to server");

        Ok(Self::new(
            stream,
            ProtocolSession::new(config),
            config.transport.read_buffer_capacity,
        ))
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an established stream. The codec shares the session's frame size table.
    pub fn new(stream: S, session: ProtocolSession, read_capacity: usize) -> Self {
        let codec = FrameCodec::new(session.frame_table());
        Self {
            framed: Framed::with_capacity(stream, codec, read_capacity),
            session,
        }
    }

    pub fn session(&self) -> &ProtocolSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ProtocolSession {
        &mut self.session
    }

    /// Write every frame the session has queued.
    pub async fn flush_outgoing(&mut self) -> Result<()> {
        for frame in self.session.drain_outgoing() {
            self.framed.feed(frame).await?;
        }
        self.framed.flush().await
    }

    /// Log in and process frames until the connection ends.
    ///
    /// Events are handed to `on_event` after each frame. The loop ends on a kick, a
    /// fatal protocol error, or end of stream; the final event is always
    /// [`ClientEvent::Disconnected`] and the returned error says why.
    #[instrument(skip(self, on_event), fields(username = %self.session.identity.username))]
    pub async fn run<F>(&mut self, mut on_event: F) -> Result<()>
    where
        F: FnMut(ClientEvent),
    {
        self.session.send_login();
        let result = match self.flush_outgoing().await {
            Ok(()) => self.read_loop(&mut on_event).await,
            Err(e) => Err(e),
        };

        if let Err(ref e) = result {
            self.session.fail(e);
        }
        for event in self.session.drain_events() {
            on_event(event);
        }
        self.session.abort();
        global_metrics().log_metrics();
        result
    }

    async fn read_loop<F>(&mut self, on_event: &mut F) -> Result<()>
    where
        F: FnMut(ClientEvent),
    {
        loop {
            let frame = match self.framed.next().await {
                Some(frame) => frame?,
                None => {
                    debug!("Server closed the stream");
                    return Err(ProtocolError::ConnectionClosed);
                }
            };

            match self.session.dispatch(&frame) {
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(error = %e, "Skipping frame"),
            }

            for event in self.session.drain_events() {
                on_event(event);
            }
            self.flush_outgoing().await?;
        }
    }

    /// Hand back the stream and session.
    pub fn into_parts(self) -> (S, ProtocolSession) {
        (self.framed.into_inner(), self.session)
    }
}
