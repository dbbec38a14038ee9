//! The public face of a game room.
//!
//! [`GameRoom::host`] and [`GameRoom::join`] bind an endpoint, spawn the
//! room actor and hand back the handle together with the event inbox the
//! actor reports into. Dropping the handle stops the actor.

mod actor;
mod events;

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::game::{Game, TeamId};
use crate::liveness::{LivenessConfig, LivenessMonitor};
use crate::registry::Role;
use crate::room::actor::{Command, RoomActor};
use crate::session::{PeerId, Session};

pub use events::RoomEvent;

/// Handle to a running room.
pub struct GameRoom {
    session: Option<Session>,
    commands: mpsc::Sender<Command>,
    my_id: PeerId,
    is_host: bool,
    actor_handle: Option<JoinHandle<()>>,
}

impl GameRoom {
    /// Open a room and start accepting players. The returned id is what
    /// others pass to [`GameRoom::join`].
    pub async fn host(name: &str) -> Result<(Self, mpsc::Receiver<RoomEvent>)> {
        Self::host_with(name, LivenessConfig::default()).await
    }

    pub async fn host_with(
        name: &str,
        config: LivenessConfig,
    ) -> Result<(Self, mpsc::Receiver<RoomEvent>)> {
        let (session, net_rx) = Session::open().await?;
        session.spawn_accept_loop();
        Self::spawn(session, net_rx, Role::Host, name, config)
    }

    /// Join the room hosted by `host_id`.
    pub async fn join(host_id: &str, name: &str) -> Result<(Self, mpsc::Receiver<RoomEvent>)> {
        Self::join_with(host_id, name, LivenessConfig::default()).await
    }

    pub async fn join_with(
        host_id: &str,
        name: &str,
        config: LivenessConfig,
    ) -> Result<(Self, mpsc::Receiver<RoomEvent>)> {
        let host = PeerId::from_str(host_id).context("invalid room id")?;
        let (session, net_rx) = Session::open().await?;
        session.connect(host).await?;
        Self::spawn(session, net_rx, Role::Client, name, config)
    }

    fn spawn(
        session: Session,
        net_rx: mpsc::Receiver<crate::session::NetEvent>,
        role: Role,
        name: &str,
        config: LivenessConfig,
    ) -> Result<(Self, mpsc::Receiver<RoomEvent>)> {
        let my_id = session.id();
        let (event_tx, event_rx) = mpsc::channel(32);
        let (command_tx, command_rx) = mpsc::channel(32);
        let (timer_tx, timer_rx) = mpsc::channel(32);
        let liveness = LivenessMonitor::new(config, timer_tx);
        let actor = RoomActor::new(role, my_id, name, liveness, event_tx, command_rx, net_rx, timer_rx)?;
        let actor_handle = tokio::spawn(actor.run());
        Ok((
            Self {
                session: Some(session),
                commands: command_tx,
                my_id,
                is_host: role == Role::Host,
                actor_handle: Some(actor_handle),
            },
            event_rx,
        ))
    }

    /// This peer's identity. For a host this is also the room id.
    pub fn id(&self) -> String {
        self.my_id.to_string()
    }

    pub fn am_i_host(&self) -> bool {
        self.is_host
    }

    /// Current state as this peer sees it.
    pub async fn game(&self) -> Result<Game> {
        self.query(Command::Game).await
    }

    /// Whether at least one channel is open.
    pub async fn is_connected(&self) -> Result<bool> {
        self.query(Command::IsConnected).await
    }

    /// Host only: last measured round trip per client.
    pub async fn latencies(&self) -> Result<HashMap<PeerId, Duration>> {
        self.query(Command::Latencies).await
    }

    pub async fn set_player_name(&self, name: &str) -> Result<()> {
        self.send(Command::SetPlayerName(name.to_string())).await
    }

    pub async fn set_player_team(&self, team: TeamId, is_game_master: bool) -> Result<()> {
        self.send(Command::SetPlayerTeam {
            team,
            is_game_master,
        })
        .await
    }

    /// Deal a board and start playing. Host only.
    pub async fn start(&self) -> Result<()> {
        if !self.is_host {
            bail!("only the host can start the game");
        }
        self.send(Command::Start).await
    }

    /// Back to the lobby. Host only.
    pub async fn set_in_waiting(&self) -> Result<()> {
        if !self.is_host {
            bail!("only the host can reset the game");
        }
        self.send(Command::SetInWaiting).await
    }

    pub async fn hint_card(&self, image_id: &str) -> Result<()> {
        self.send(Command::HintCard(image_id.to_string())).await
    }

    pub async fn chose_card(&self, image_id: &str) -> Result<()> {
        self.send(Command::ChoseCard(image_id.to_string())).await
    }

    pub async fn ok_next_team(&self) -> Result<()> {
        self.send(Command::OkNextTeam).await
    }

    /// Stop the actor and close the endpoint gracefully.
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.actor_handle.take() {
            handle.abort();
        }
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }

    async fn send(&self, command: Command) -> Result<()> {
        if self.commands.send(command).await.is_err() {
            bail!("room task stopped");
        }
        Ok(())
    }

    async fn query<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.context("room task stopped")
    }
}

impl Drop for GameRoom {
    fn drop(&mut self) {
        if let Some(handle) = self.actor_handle.take() {
            handle.abort();
        }
    }
}
