//! Wire protocol: `{ "message": KIND, "data": ... }` JSON envelopes, framed
//! with a u32 length prefix over each channel stream.

use anyhow::{Context, Result, bail};
use iroh::endpoint::{RecvStream, SendStream};
use serde::{Deserialize, Serialize};

use crate::game::{Game, Player};

/// Frames larger than this are a protocol violation.
const MAX_FRAME: usize = 1024 * 1024;

/// One wire envelope.
///
/// `PING`/`PONG` are liveness traffic: they are intercepted by the room and
/// never reach application dispatch.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "message", content = "data")]
pub enum Envelope {
    /// Host asks a freshly connected client to announce its player record.
    #[serde(rename = "GET_PLAYER")]
    GetPlayer {},
    /// Player upsert. Clients forward their own record; the host applies it.
    #[serde(rename = "UPDATE_PLAYER")]
    UpdatePlayer(Player),
    /// Card flip request.
    #[serde(rename = "CHOSE_IMAGE")]
    #[serde(rename_all = "camelCase")]
    ChoseImage { image_id: String, player: Player },
    /// Hint toggle request.
    #[serde(rename = "HINT_IMAGE")]
    #[serde(rename_all = "camelCase")]
    HintImage { image_id: String, player: Player },
    /// Pass the turn without flipping a card.
    #[serde(rename = "OK_NEXT_TEAM")]
    OkNextTeam {},
    /// Authoritative full-state snapshot, host to clients.
    #[serde(rename = "UPDATE_GAME")]
    UpdateGame(Game),
    /// Liveness probe, host to client.
    #[serde(rename = "PING")]
    Ping {},
    /// Liveness reply, client to host.
    #[serde(rename = "PONG")]
    Pong {},
}

pub(crate) async fn write_frame(stream: &mut SendStream, envelope: &Envelope) -> Result<()> {
    let payload = serde_json::to_vec(envelope).context("encoding envelope")?;
    stream.write_all(&(payload.len() as u32).to_le_bytes()).await?;
    stream.write_all(&payload).await?;
    Ok(())
}

/// Read one raw frame.
///
/// Decoding is left to the caller so that an unknown message kind costs a
/// single dropped frame, not the whole channel.
pub(crate) async fn read_frame(stream: &mut RecvStream) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME {
        bail!("frame of {len} bytes exceeds limit");
    }
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await?;
    Ok(payload)
}
