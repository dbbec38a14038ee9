//! Transport session: the iroh endpoint, connection acceptance and the
//! per-channel reader/writer tasks.
//!
//! Each channel is one bidirectional stream per remote peer. The host opens
//! the stream after accepting a connection; a client accepts the stream the
//! host opens. Everything that happens on a channel surfaces as a
//! [`NetEvent`] on the session inbox so the room actor stays single-threaded.

use anyhow::{Context, Result};
use iroh::endpoint::Connection;
use iroh::{Endpoint, EndpointAddr, EndpointId};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::protocol::{Envelope, read_frame, write_frame};

/// Public identity of a peer, stable for the life of its endpoint.
pub type PeerId = EndpointId;

pub(crate) const ALPN: &[u8] = b"p2p-card-room/0";

/// What the transport reports up to the room actor.
#[derive(Debug)]
pub(crate) enum NetEvent {
    /// A channel to `Channel::remote` is up and writable.
    ChannelOpen(Channel),
    /// The channel died, whatever the cause. Idempotent.
    ChannelClosed(PeerId),
    /// One decoded envelope arrived on an open channel.
    Inbound { from: PeerId, envelope: Envelope },
}

/// Writable half of an open channel, held by the registry.
#[derive(Debug, Clone)]
pub(crate) struct Channel {
    pub remote: PeerId,
    outbound: mpsc::Sender<Envelope>,
    cancel: CancellationToken,
}

impl Channel {
    pub(crate) fn new(
        remote: PeerId,
        outbound: mpsc::Sender<Envelope>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            remote,
            outbound,
            cancel,
        }
    }

    /// Fire-and-forget send. A full or closed queue is logged and dropped;
    /// the liveness monitor will reap a peer that stops draining.
    pub(crate) fn send(&self, envelope: Envelope) {
        if let Err(err) = self.outbound.try_send(envelope) {
            warn!(remote = %self.remote.fmt_short(), "dropping outbound message: {err}");
        }
    }

    /// Tear the channel down from our side.
    pub(crate) fn close(&self) {
        self.cancel.cancel();
    }
}

/// An open iroh endpoint plus the inbox its tasks report into.
pub(crate) struct Session {
    endpoint: Endpoint,
    events: mpsc::Sender<NetEvent>,
    cancel: CancellationToken,
}

impl Session {
    /// Bind an endpoint and hand back the session with its event inbox.
    pub(crate) async fn open() -> Result<(Self, mpsc::Receiver<NetEvent>)> {
        let endpoint = Endpoint::builder()
            .alpns(vec![ALPN.to_vec()])
            .bind()
            .await
            .context("binding iroh endpoint")?;
        info!(id = %endpoint.id().fmt_short(), "endpoint bound");
        let (tx, rx) = mpsc::channel(64);
        Ok((
            Self {
                endpoint,
                events: tx,
                cancel: CancellationToken::new(),
            },
            rx,
        ))
    }

    pub(crate) fn id(&self) -> PeerId {
        self.endpoint.id()
    }

    /// Host side: accept inbound connections until cancelled, opening one
    /// channel stream per peer.
    pub(crate) fn spawn_accept_loop(&self) {
        let endpoint = self.endpoint.clone();
        let events = self.events.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                let incoming = tokio::select! {
                    _ = cancel.cancelled() => break,
                    incoming = endpoint.accept() => match incoming {
                        Some(incoming) => incoming,
                        None => break,
                    },
                };
                let conn = match incoming.await {
                    Ok(conn) => conn,
                    Err(err) => {
                        warn!("failed to accept connection: {err}");
                        continue;
                    }
                };
                let remote = conn.remote_id();
                debug!(remote = %remote.fmt_short(), "peer connected");
                let events = events.clone();
                let cancel = cancel.child_token();
                tokio::spawn(async move {
                    match conn.open_bi().await {
                        Ok((send, recv)) => {
                            run_channel(remote, conn, send, recv, events, cancel).await;
                        }
                        Err(err) => {
                            error!(remote = %remote.fmt_short(), "failed to open stream: {err}");
                        }
                    }
                });
            }
            debug!("accept loop stopped");
        });
    }

    /// Client side: dial the host and wait for it to open the channel
    /// stream.
    pub(crate) async fn connect(&self, host: PeerId) -> Result<()> {
        let conn = self
            .endpoint
            .connect(EndpointAddr::from(host), ALPN)
            .await
            .context("connecting to host")?;
        let (send, recv) = conn.accept_bi().await.context("waiting for host stream")?;
        info!(host = %host.fmt_short(), "connected to host");
        let events = self.events.clone();
        let cancel = self.cancel.child_token();
        tokio::spawn(async move {
            run_channel(host, conn, send, recv, events, cancel).await;
        });
        Ok(())
    }

    /// Cancel all channel tasks and close the endpoint gracefully.
    pub(crate) async fn close(self) {
        self.cancel.cancel();
        self.endpoint.close().await;
    }
}

/// Drive one channel to completion: register it, pump both directions, then
/// report the close exactly once.
async fn run_channel(
    remote: PeerId,
    conn: Connection,
    mut send: iroh::endpoint::SendStream,
    mut recv: iroh::endpoint::RecvStream,
    events: mpsc::Sender<NetEvent>,
    cancel: CancellationToken,
) {
    let (out_tx, mut out_rx) = mpsc::channel::<Envelope>(64);
    let channel = Channel::new(remote, out_tx, cancel.clone());
    if events.send(NetEvent::ChannelOpen(channel)).await.is_err() {
        return;
    }

    let writer_cancel = cancel.clone();
    let writer = tokio::spawn(async move {
        loop {
            let envelope = tokio::select! {
                _ = writer_cancel.cancelled() => break,
                envelope = out_rx.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => break,
                },
            };
            if let Err(err) = write_frame(&mut send, &envelope).await {
                warn!(remote = %remote.fmt_short(), "write failed: {err}");
                break;
            }
        }
    });

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = read_frame(&mut recv) => frame,
        };
        match frame {
            Ok(payload) => match serde_json::from_slice::<Envelope>(&payload) {
                Ok(envelope) => {
                    if events
                        .send(NetEvent::Inbound {
                            from: remote,
                            envelope,
                        })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(err) => {
                    error!(remote = %remote.fmt_short(), "undecodable message: {err}");
                }
            },
            Err(err) => {
                debug!(remote = %remote.fmt_short(), "channel read ended: {err}");
                break;
            }
        }
    }

    cancel.cancel();
    writer.abort();
    conn.close(0u32.into(), b"bye");
    let _ = events.send(NetEvent::ChannelClosed(remote)).await;
}

#[cfg(test)]
pub(crate) fn test_peer_id() -> PeerId {
    iroh::SecretKey::generate(&mut rand::rng()).public()
}
