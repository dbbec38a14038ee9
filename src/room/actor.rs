//! The room actor: single task that owns the registry, the liveness
//! monitor and the game state, fed by three inboxes.
//!
//! Commands come from the [`GameRoom`](crate::room::GameRoom) handle, net
//! events from the session's channel tasks, timer events from the liveness
//! monitor. Because the actor is the only owner there is no locking
//! anywhere in the room.

use anyhow::Result;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::error::GameError;
use crate::game::{Game, Player, TeamId};
use crate::liveness::{LivenessMonitor, TimerEvent};
use crate::protocol::Envelope;
use crate::registry::{ConnectionRegistry, Role};
use crate::room::events::RoomEvent;
use crate::session::{Channel, NetEvent, PeerId};

/// Requests from the room handle.
#[derive(Debug)]
pub(crate) enum Command {
    SetPlayerName(String),
    SetPlayerTeam { team: TeamId, is_game_master: bool },
    Start,
    SetInWaiting,
    HintCard(String),
    ChoseCard(String),
    OkNextTeam,
    Game(oneshot::Sender<Game>),
    IsConnected(oneshot::Sender<bool>),
    Latencies(oneshot::Sender<HashMap<PeerId, Duration>>),
}

pub(crate) struct RoomActor {
    my_id: PeerId,
    my_name: String,
    registry: ConnectionRegistry,
    liveness: LivenessMonitor,
    game: Game,
    events: mpsc::Sender<RoomEvent>,
    commands: mpsc::Receiver<Command>,
    net: mpsc::Receiver<NetEvent>,
    timers: mpsc::Receiver<TimerEvent>,
}

impl RoomActor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        role: Role,
        my_id: PeerId,
        name: &str,
        liveness: LivenessMonitor,
        events: mpsc::Sender<RoomEvent>,
        commands: mpsc::Receiver<Command>,
        net: mpsc::Receiver<NetEvent>,
        timers: mpsc::Receiver<TimerEvent>,
    ) -> Result<Self> {
        let mut registry = ConnectionRegistry::default();
        registry.fix_role(role)?;
        let mut game = Game::new(None);
        if registry.am_i_host() {
            game.room_id = Some(my_id);
            game.update_player(Player::unassigned(my_id, name));
        }
        Ok(Self {
            my_id,
            my_name: name.to_string(),
            registry,
            liveness,
            game,
            events,
            commands,
            net,
            timers,
        })
    }

    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => break,
                },
                Some(event) = self.net.recv() => self.on_net(event).await,
                Some(event) = self.timers.recv() => self.on_timer(event).await,
            }
        }
        debug!("room actor stopped");
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::SetPlayerName(name) => {
                self.my_name = name.clone();
                let player = match self.game.players.get(&self.my_id) {
                    Some(player) => Player {
                        name,
                        ..player.clone()
                    },
                    None => Player::unassigned(self.my_id, &name),
                };
                self.apply_or_forward(Envelope::UpdatePlayer(player)).await;
            }
            Command::SetPlayerTeam {
                team,
                is_game_master,
            } => {
                let Some(player) = self.game.players.get(&self.my_id) else {
                    self.report(GameError::UnknownPlayer).await;
                    return;
                };
                let player = Player {
                    team_id: team,
                    is_game_master,
                    ..player.clone()
                };
                self.apply_or_forward(Envelope::UpdatePlayer(player)).await;
            }
            Command::Start => {
                self.mutate(|game| game.start()).await;
            }
            Command::SetInWaiting => {
                self.mutate(|game| {
                    game.set_in_waiting();
                    Ok(())
                })
                .await;
            }
            Command::HintCard(image_id) => {
                let Some(player) = self.game.players.get(&self.my_id).cloned() else {
                    self.report(GameError::UnknownPlayer).await;
                    return;
                };
                self.apply_or_forward(Envelope::HintImage { image_id, player })
                    .await;
            }
            Command::ChoseCard(image_id) => {
                let Some(player) = self.game.players.get(&self.my_id).cloned() else {
                    self.report(GameError::UnknownPlayer).await;
                    return;
                };
                self.apply_or_forward(Envelope::ChoseImage { image_id, player })
                    .await;
            }
            Command::OkNextTeam => {
                self.apply_or_forward(Envelope::OkNextTeam {}).await;
            }
            Command::Game(reply) => {
                let _ = reply.send(self.game.clone());
            }
            Command::IsConnected(reply) => {
                let _ = reply.send(self.registry.is_connected());
            }
            Command::Latencies(reply) => {
                let _ = reply.send(self.liveness.latencies());
            }
        }
    }

    /// Hosts apply an action locally; clients forward it to the host and
    /// wait for the next snapshot.
    async fn apply_or_forward(&mut self, envelope: Envelope) {
        if self.registry.am_i_host() {
            self.apply_local(envelope).await;
        } else if let Some(host) = self.registry.host_channel() {
            host.send(envelope);
        } else {
            warn!("not connected to a host, dropping request");
        }
    }

    /// Host side: run one action against the authoritative state and
    /// replicate on success.
    async fn apply_local(&mut self, envelope: Envelope) {
        match envelope {
            Envelope::UpdatePlayer(player) => {
                self.mutate(|game| {
                    game.update_player(player);
                    Ok(())
                })
                .await;
            }
            Envelope::HintImage { image_id, .. } => {
                self.mutate(|game| game.hint_card(&image_id)).await;
            }
            Envelope::ChoseImage { image_id, player } => {
                self.mutate(|game| game.chose_card(&image_id, &player)).await;
            }
            Envelope::OkNextTeam {} => {
                self.mutate(|game| game.ok_next_team()).await;
            }
            other => {
                error!(?other, "not an action envelope, dropping");
            }
        }
    }

    /// Validate-then-commit: only a successful mutation produces a
    /// snapshot, a rejected one only produces an error event.
    async fn mutate(&mut self, op: impl FnOnce(&mut Game) -> Result<(), GameError>) {
        if !self.registry.am_i_host() {
            self.report(GameError::NotHost).await;
            return;
        }
        match op(&mut self.game) {
            Ok(()) => self.replicate().await,
            Err(err) => self.report(err).await,
        }
    }

    async fn report(&self, err: GameError) {
        error!("rejected: {err}");
        let _ = self.events.send(RoomEvent::Error(err.to_string())).await;
    }

    /// Push the authoritative state to every client and to the local owner.
    async fn replicate(&self) {
        self.registry
            .broadcast(&Envelope::UpdateGame(self.game.clone()));
        let _ = self
            .events
            .send(RoomEvent::GameUpdated(self.game.clone()))
            .await;
    }

    async fn on_net(&mut self, event: NetEvent) {
        match event {
            NetEvent::ChannelOpen(channel) => self.on_channel_open(channel).await,
            NetEvent::ChannelClosed(peer) => self.on_channel_gone(peer).await,
            NetEvent::Inbound { from, envelope } => self.route(from, envelope).await,
        }
    }

    async fn on_channel_open(&mut self, channel: Channel) {
        let peer = channel.remote;
        if let Err(err) = self.registry.register(channel.clone()) {
            warn!(peer = %peer.fmt_short(), "rejecting channel: {err}");
            channel.close();
            return;
        }
        info!(peer = %peer.fmt_short(), "channel open");
        if self.registry.am_i_host() {
            // Ask the newcomer who it is and start probing it.
            channel.send(Envelope::GetPlayer {});
            channel.send(Envelope::Ping {});
            self.liveness.mark_ping_sent(peer);
            let _ = self.events.send(RoomEvent::PeerJoined(peer)).await;
        }
    }

    /// A channel died, by transport close or liveness timeout. Safe to call
    /// twice for the same peer.
    async fn on_channel_gone(&mut self, peer: PeerId) {
        self.liveness.forget(&peer);
        let Some(channel) = self.registry.remove(&peer) else {
            return;
        };
        channel.close();
        if self.registry.am_i_host() {
            info!(peer = %peer.fmt_short(), "client left");
            self.game.remove_player(&peer);
            self.replicate().await;
            let _ = self.events.send(RoomEvent::PeerLeft(peer)).await;
        } else {
            self.on_host_lost().await;
        }
    }

    /// Client side: the host is gone. Reset to a local lobby so the owner
    /// can host a new room or join another without tearing the peer down.
    async fn on_host_lost(&mut self) {
        warn!("host disconnected");
        let mut game = Game::new(Some(self.my_id));
        game.update_player(Player::unassigned(self.my_id, &self.my_name));
        self.game = game;
        let _ = self.events.send(RoomEvent::HostDisconnected).await;
        let _ = self
            .events
            .send(RoomEvent::GameUpdated(self.game.clone()))
            .await;
    }

    async fn route(&mut self, from: PeerId, envelope: Envelope) {
        match envelope {
            Envelope::Ping {} => self.on_ping(from).await,
            Envelope::Pong {} => self.on_pong(from).await,
            Envelope::UpdateGame(game) => {
                if self.registry.am_i_host() {
                    error!(peer = %from.fmt_short(), "client sent a snapshot, dropping");
                    return;
                }
                // The mirror is replaced verbatim, never merged.
                self.game = game;
                let _ = self
                    .events
                    .send(RoomEvent::GameUpdated(self.game.clone()))
                    .await;
            }
            Envelope::GetPlayer {} => {
                if self.registry.am_i_host() {
                    error!(peer = %from.fmt_short(), "client sent GET_PLAYER, dropping");
                    return;
                }
                let player = self
                    .game
                    .players
                    .get(&self.my_id)
                    .cloned()
                    .unwrap_or_else(|| Player::unassigned(self.my_id, &self.my_name));
                self.apply_or_forward(Envelope::UpdatePlayer(player)).await;
            }
            action => {
                if self.registry.am_i_host() {
                    self.apply_local(action).await;
                } else {
                    error!(peer = %from.fmt_short(), "action sent to a non-host, dropping");
                }
            }
        }
    }

    /// Client side: answer the probe and re-arm the host dead-man timer.
    async fn on_ping(&mut self, from: PeerId) {
        if self.registry.am_i_host() {
            error!(peer = %from.fmt_short(), "client sent PING, dropping");
            return;
        }
        if let Some(host) = self.registry.host_channel() {
            host.send(Envelope::Pong {});
        }
        self.liveness.on_ping(from);
    }

    /// Host side: record the round trip and schedule the next probe.
    async fn on_pong(&mut self, from: PeerId) {
        if !self.registry.am_i_host() {
            error!(peer = %from.fmt_short(), "host sent PONG, dropping");
            return;
        }
        match self.liveness.on_pong(from) {
            Some(rtt) => {
                let _ = self
                    .events
                    .send(RoomEvent::LatencyUpdated { peer: from, rtt })
                    .await;
            }
            None => warn!(peer = %from.fmt_short(), "PONG without a pending PING"),
        }
    }

    async fn on_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::PingDue(peer) => {
                if let Some(channel) = self.registry.get(&peer) {
                    channel.send(Envelope::Ping {});
                    self.liveness.mark_ping_sent(peer);
                }
            }
            TimerEvent::PongDeadline(peer) => {
                warn!(peer = %peer.fmt_short(), "no pong in time, dropping client");
                self.on_channel_gone(peer).await;
            }
            TimerEvent::HostDeadline(peer) => {
                warn!("host went silent");
                self.on_channel_gone(peer).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveness::LivenessConfig;
    use crate::session::test_peer_id;
    use tokio_util::sync::CancellationToken;

    /// An actor wired to in-memory inboxes, plus the handles a test drives
    /// it with.
    struct Harness {
        actor: RoomActor,
        events: mpsc::Receiver<RoomEvent>,
        _commands: mpsc::Sender<Command>,
        _net: mpsc::Sender<NetEvent>,
        _timers_in: mpsc::Sender<TimerEvent>,
    }

    fn harness(role: Role) -> Harness {
        let my_id = test_peer_id();
        let (event_tx, event_rx) = mpsc::channel(32);
        let (command_tx, command_rx) = mpsc::channel(32);
        let (timer_tx, timer_rx) = mpsc::channel(32);
        let (net_tx, net_rx) = mpsc::channel(32);
        let liveness = LivenessMonitor::new(LivenessConfig::default(), timer_tx.clone());
        let actor = RoomActor::new(
            role, my_id, "tester", liveness, event_tx, command_rx, net_rx, timer_rx,
        )
        .unwrap();
        Harness {
            actor,
            events: event_rx,
            _commands: command_tx,
            _net: net_tx,
            _timers_in: timer_tx,
        }
    }

    /// A channel whose outbound queue the test can inspect.
    fn fake_channel(peer: PeerId) -> (Channel, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(32);
        (Channel::new(peer, tx, CancellationToken::new()), rx)
    }

    #[tokio::test]
    async fn host_greets_and_probes_a_new_client() {
        let mut h = harness(Role::Host);
        let peer = test_peer_id();
        let (channel, mut wire) = fake_channel(peer);

        h.actor.on_net(NetEvent::ChannelOpen(channel)).await;

        assert_eq!(wire.recv().await.unwrap(), Envelope::GetPlayer {});
        assert_eq!(wire.recv().await.unwrap(), Envelope::Ping {});
        assert_eq!(h.events.recv().await.unwrap(), RoomEvent::PeerJoined(peer));
    }

    #[tokio::test]
    async fn successful_mutation_replicates_to_every_client() {
        let mut h = harness(Role::Host);
        let a = test_peer_id();
        let b = test_peer_id();
        let (chan_a, mut wire_a) = fake_channel(a);
        let (chan_b, mut wire_b) = fake_channel(b);
        h.actor.on_net(NetEvent::ChannelOpen(chan_a)).await;
        h.actor.on_net(NetEvent::ChannelOpen(chan_b)).await;
        // Drain the greetings.
        for wire in [&mut wire_a, &mut wire_b] {
            wire.recv().await.unwrap();
            wire.recv().await.unwrap();
        }

        h.actor.on_command(Command::Start).await;

        for wire in [&mut wire_a, &mut wire_b] {
            let Envelope::UpdateGame(game) = wire.recv().await.unwrap() else {
                panic!("expected a snapshot");
            };
            assert_eq!(game.images.len(), 16);
        }
    }

    #[tokio::test]
    async fn rejected_mutation_sends_no_snapshot() {
        let mut h = harness(Role::Host);
        let peer = test_peer_id();
        let (channel, mut wire) = fake_channel(peer);
        h.actor.on_net(NetEvent::ChannelOpen(channel)).await;
        wire.recv().await.unwrap();
        wire.recv().await.unwrap();
        h.events.recv().await.unwrap();

        // Flipping a card before the game started is not playing.
        h.actor.on_command(Command::ChoseCard("anchor".into())).await;

        match h.events.recv().await.unwrap() {
            RoomEvent::Error(msg) => assert!(msg.contains("not in progress")),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(wire.try_recv().is_err());
    }

    #[tokio::test]
    async fn client_forwards_actions_to_the_host() {
        let mut h = harness(Role::Client);
        let host = test_peer_id();
        let (channel, mut wire) = fake_channel(host);
        h.actor.on_net(NetEvent::ChannelOpen(channel)).await;

        h.actor.on_command(Command::OkNextTeam).await;

        assert_eq!(wire.recv().await.unwrap(), Envelope::OkNextTeam {});
        // And the local mirror stays untouched until a snapshot arrives.
        assert_eq!(h.actor.game.players.len(), 0);
    }

    #[tokio::test]
    async fn client_mirrors_snapshots_verbatim() {
        let mut h = harness(Role::Client);
        let host = test_peer_id();
        let (channel, _wire) = fake_channel(host);
        h.actor.on_net(NetEvent::ChannelOpen(channel)).await;

        let mut snapshot = Game::new(Some(host));
        snapshot.update_player(Player::unassigned(host, "the host"));
        h.actor
            .on_net(NetEvent::Inbound {
                from: host,
                envelope: Envelope::UpdateGame(snapshot.clone()),
            })
            .await;

        assert_eq!(h.actor.game, snapshot);
        assert_eq!(
            h.events.recv().await.unwrap(),
            RoomEvent::GameUpdated(snapshot)
        );
    }

    #[tokio::test]
    async fn client_answers_ping_with_pong() {
        let mut h = harness(Role::Client);
        let host = test_peer_id();
        let (channel, mut wire) = fake_channel(host);
        h.actor.on_net(NetEvent::ChannelOpen(channel)).await;

        h.actor
            .on_net(NetEvent::Inbound {
                from: host,
                envelope: Envelope::Ping {},
            })
            .await;

        assert_eq!(wire.recv().await.unwrap(), Envelope::Pong {});
    }

    #[tokio::test]
    async fn pong_deadline_reaps_the_client() {
        let mut h = harness(Role::Host);
        let peer = test_peer_id();
        let (channel, _wire) = fake_channel(peer);
        h.actor.on_net(NetEvent::ChannelOpen(channel)).await;
        h.events.recv().await.unwrap();

        h.actor.on_timer(TimerEvent::PongDeadline(peer)).await;

        // Removal replicates the shrunk roster, then reports the leave.
        let RoomEvent::GameUpdated(_) = h.events.recv().await.unwrap() else {
            panic!("expected a snapshot");
        };
        assert_eq!(h.events.recv().await.unwrap(), RoomEvent::PeerLeft(peer));
        assert!(!h.actor.registry.is_connected());
    }

    #[tokio::test]
    async fn host_deadline_resets_client_to_local_lobby() {
        let mut h = harness(Role::Client);
        let host = test_peer_id();
        let (channel, _wire) = fake_channel(host);
        h.actor.on_net(NetEvent::ChannelOpen(channel)).await;

        h.actor.on_timer(TimerEvent::HostDeadline(host)).await;

        assert_eq!(h.events.recv().await.unwrap(), RoomEvent::HostDisconnected);
        let RoomEvent::GameUpdated(game) = h.events.recv().await.unwrap() else {
            panic!("expected a snapshot");
        };
        assert_eq!(game.room_id, Some(h.actor.my_id));
        assert_eq!(game.players.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_close_is_idempotent() {
        let mut h = harness(Role::Host);
        let peer = test_peer_id();
        let (channel, _wire) = fake_channel(peer);
        h.actor.on_net(NetEvent::ChannelOpen(channel)).await;
        h.events.recv().await.unwrap();

        h.actor.on_net(NetEvent::ChannelClosed(peer)).await;
        h.events.recv().await.unwrap();
        h.events.recv().await.unwrap();

        // Liveness timeout racing the transport close must not emit a
        // second leave.
        h.actor.on_net(NetEvent::ChannelClosed(peer)).await;
        assert!(h.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsolicited_pong_is_dropped() {
        let mut h = harness(Role::Host);
        let peer = test_peer_id();
        let (channel, _wire) = fake_channel(peer);
        h.actor.on_net(NetEvent::ChannelOpen(channel)).await;
        h.events.recv().await.unwrap();

        // First pong answers the greeting ping, a second one is orphaned.
        h.actor
            .on_net(NetEvent::Inbound {
                from: peer,
                envelope: Envelope::Pong {},
            })
            .await;
        let RoomEvent::LatencyUpdated { peer: p, .. } = h.events.recv().await.unwrap() else {
            panic!("expected a latency update");
        };
        assert_eq!(p, peer);

        h.actor
            .on_net(NetEvent::Inbound {
                from: peer,
                envelope: Envelope::Pong {},
            })
            .await;
        assert!(h.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_hint_is_reported_and_not_replicated() {
        let mut h = harness(Role::Host);
        let peer = test_peer_id();
        let (channel, mut wire) = fake_channel(peer);
        h.actor.on_net(NetEvent::ChannelOpen(channel)).await;
        wire.recv().await.unwrap();
        wire.recv().await.unwrap();
        h.events.recv().await.unwrap();
        h.actor.on_command(Command::Start).await;
        wire.recv().await.unwrap();
        h.events.recv().await.unwrap();

        h.actor
            .on_net(NetEvent::Inbound {
                from: peer,
                envelope: Envelope::HintImage {
                    image_id: "zeppelin".to_string(),
                    player: Player::unassigned(peer, "bob"),
                },
            })
            .await;

        match h.events.recv().await.unwrap() {
            RoomEvent::Error(msg) => assert!(msg.contains("unknown image")),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(wire.try_recv().is_err());
    }

    #[tokio::test]
    async fn host_seeds_itself_into_the_roster() {
        let h = harness(Role::Host);
        assert_eq!(h.actor.game.room_id, Some(h.actor.my_id));
        assert!(h.actor.game.players.contains_key(&h.actor.my_id));
    }
}
