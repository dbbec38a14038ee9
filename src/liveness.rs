//! Ping/pong liveness monitoring.
//!
//! Transport-level closes are not reliable on p2p links: a peer that loses
//! power or drops off the network just goes silent. The host probes every
//! client on a fixed cadence and arms a dead-man timer around each probe;
//! clients arm a longer dead-man timer around the host's probes. When a
//! timer fires the peer is treated exactly like a closed channel.
//!
//! Timers are plain spawned sleeps that post a [`TimerEvent`] into the room
//! actor's inbox, so all the bookkeeping here runs on the actor's thread
//! without locks.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::session::PeerId;

/// Probe cadence and patience.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessConfig {
    /// How often the host pings each client.
    pub ping_interval: Duration,
    /// How long the host waits for a pong before declaring the client dead.
    pub pong_timeout: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_millis(3000),
            pong_timeout: Duration::from_millis(3000),
        }
    }
}

impl LivenessConfig {
    /// How long a client tolerates host silence: two missed probe
    /// intervals.
    pub fn host_timeout(&self) -> Duration {
        self.ping_interval * 2
    }
}

/// Posted into the room actor when a liveness timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerEvent {
    /// Host side: no pong arrived in time.
    PongDeadline(PeerId),
    /// Client side: the host went quiet.
    HostDeadline(PeerId),
    /// Host side: time to send the next ping.
    PingDue(PeerId),
}

/// Per-peer liveness state, owned by the room actor.
pub(crate) struct LivenessMonitor {
    config: LivenessConfig,
    timers: mpsc::Sender<TimerEvent>,
    /// Armed dead-man timer per peer, on either side of the protocol.
    deadman: HashMap<PeerId, JoinHandle<()>>,
    /// Pending next-ping timer per peer (host side).
    ping_due: HashMap<PeerId, JoinHandle<()>>,
    ping_sent_at: HashMap<PeerId, Instant>,
    latency: HashMap<PeerId, Duration>,
}

impl LivenessMonitor {
    pub(crate) fn new(config: LivenessConfig, timers: mpsc::Sender<TimerEvent>) -> Self {
        Self {
            config,
            timers,
            deadman: HashMap::new(),
            ping_due: HashMap::new(),
            ping_sent_at: HashMap::new(),
            latency: HashMap::new(),
        }
    }

    /// Host side: a ping just went out. Remember when, and start the pong
    /// dead-man timer.
    pub(crate) fn mark_ping_sent(&mut self, peer: PeerId) {
        self.ping_sent_at.insert(peer, Instant::now());
        self.arm_deadman(peer, self.config.pong_timeout, TimerEvent::PongDeadline(peer));
    }

    /// Host side: a pong arrived. Returns the measured round trip, or
    /// `None` for a pong nothing was waiting for.
    pub(crate) fn on_pong(&mut self, peer: PeerId) -> Option<Duration> {
        let sent_at = self.ping_sent_at.remove(&peer)?;
        if let Some(handle) = self.deadman.remove(&peer) {
            handle.abort();
        }
        let rtt = sent_at.elapsed();
        self.latency.insert(peer, rtt);
        let handle = spawn_timer(
            self.timers.clone(),
            self.config.ping_interval,
            TimerEvent::PingDue(peer),
        );
        if let Some(previous) = self.ping_due.insert(peer, handle) {
            previous.abort();
        }
        Some(rtt)
    }

    /// Client side: the host pinged us, so it was alive just now. Re-arm
    /// the host dead-man timer.
    pub(crate) fn on_ping(&mut self, host: PeerId) {
        self.arm_deadman(host, self.config.host_timeout(), TimerEvent::HostDeadline(host));
    }

    /// Drop every timer and record for a departed peer.
    pub(crate) fn forget(&mut self, peer: &PeerId) {
        if let Some(handle) = self.deadman.remove(peer) {
            handle.abort();
        }
        if let Some(handle) = self.ping_due.remove(peer) {
            handle.abort();
        }
        self.ping_sent_at.remove(peer);
        self.latency.remove(peer);
    }

    /// Last measured round trip per peer. A peer that has been pinged but
    /// never answered reports zero.
    pub(crate) fn latencies(&self) -> HashMap<PeerId, Duration> {
        let mut latencies = self.latency.clone();
        for peer in self.ping_sent_at.keys() {
            latencies.entry(*peer).or_insert(Duration::ZERO);
        }
        latencies
    }

    fn arm_deadman(&mut self, peer: PeerId, delay: Duration, event: TimerEvent) {
        let handle = spawn_timer(self.timers.clone(), delay, event);
        if let Some(previous) = self.deadman.insert(peer, handle) {
            previous.abort();
        }
    }
}

impl Drop for LivenessMonitor {
    fn drop(&mut self) {
        for handle in self.deadman.values().chain(self.ping_due.values()) {
            handle.abort();
        }
    }
}

fn spawn_timer(
    timers: mpsc::Sender<TimerEvent>,
    delay: Duration,
    event: TimerEvent,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = timers.send(event).await;
    })
}
