//! End-to-end room lifecycle over real iroh endpoints.
//!
//! These bind sockets and rely on endpoint discovery, so they are ignored
//! by default. Run them with `cargo test -- --ignored` on a machine with
//! outbound network access.

use std::time::Duration;

use p2p_card_room::{GameRoom, GameStatus, RoomEvent, TeamId};
use tokio::time::timeout;

async fn expect_event(
    events: &mut tokio::sync::mpsc::Receiver<RoomEvent>,
    what: &str,
    check: impl Fn(&RoomEvent) -> bool,
) -> RoomEvent {
    loop {
        let event = timeout(Duration::from_secs(30), events.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
            .expect("event stream closed");
        println!("event: {event:?}");
        if check(&event) {
            return event;
        }
    }
}

#[tokio::test]
#[ignore = "needs outbound network access for endpoint discovery"]
async fn host_and_client_play_a_turn() {
    let (host, mut host_events) = GameRoom::host("alice").await.unwrap();
    let room_id = host.id();
    println!("room open at {room_id}");

    let (client, mut client_events) = GameRoom::join(&room_id, "bob").await.unwrap();

    expect_event(&mut host_events, "the client to join", |e| {
        matches!(e, RoomEvent::PeerJoined(_))
    })
    .await;

    // The host's GET_PLAYER round trip puts bob into the roster and a
    // snapshot lands on the client.
    expect_event(&mut client_events, "the roster snapshot", |e| {
        matches!(e, RoomEvent::GameUpdated(g) if g.players.len() == 2)
    })
    .await;

    client.set_player_team(TeamId::Red, false).await.unwrap();
    host.set_player_team(TeamId::Blue, true).await.unwrap();
    host.start().await.unwrap();

    let RoomEvent::GameUpdated(game) = expect_event(&mut client_events, "the deal", |e| {
        matches!(e, RoomEvent::GameUpdated(g) if g.game_status == GameStatus::Playing)
    })
    .await
    else {
        unreachable!()
    };
    assert_eq!(game.images.len(), 16);
    assert_eq!(game.team_playing, TeamId::Blue);

    // A flip requested by the client comes back as an authoritative
    // snapshot with the card face up.
    let some_card = game.images.keys().next().unwrap().clone();
    client.chose_card(&some_card).await.unwrap();
    expect_event(&mut client_events, "the flip to replicate", |e| {
        matches!(e, RoomEvent::GameUpdated(g)
            if !g.images[&some_card].is_unflipped() || g.game_status == GameStatus::Finished)
    })
    .await;

    // Liveness keeps measuring while the room is idle.
    expect_event(&mut host_events, "a latency sample", |e| {
        matches!(e, RoomEvent::LatencyUpdated { .. })
    })
    .await;

    client.shutdown().await;
    expect_event(&mut host_events, "the client to leave", |e| {
        matches!(e, RoomEvent::PeerLeft(_))
    })
    .await;
    host.shutdown().await;
}

#[tokio::test]
#[ignore = "needs outbound network access for endpoint discovery"]
async fn client_detects_a_vanished_host() {
    let (host, _host_events) = GameRoom::host("alice").await.unwrap();
    let room_id = host.id();
    let (client, mut client_events) = GameRoom::join(&room_id, "bob").await.unwrap();

    expect_event(&mut client_events, "the first snapshot", |e| {
        matches!(e, RoomEvent::GameUpdated(_))
    })
    .await;

    host.shutdown().await;

    expect_event(&mut client_events, "the host loss", |e| {
        matches!(e, RoomEvent::HostDisconnected)
    })
    .await;
    let game = client.game().await.unwrap();
    assert_eq!(game.players.len(), 1);
    client.shutdown().await;
}
