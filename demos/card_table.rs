//! Minimal terminal client: host a room or join one, then drive the game
//! with line commands.
//!
//! ```text
//! cargo run --example card_table -- host alice
//! cargo run --example card_table -- join <room-id> bob
//! ```

use anyhow::Result;
use clap::Parser;
use p2p_card_room::{GameRoom, RoomEvent, TeamId};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(about = "p2p card room demo")]
enum Cli {
    /// Open a room and print its id.
    Host { name: String },
    /// Join a room by id.
    Join { room_id: String, name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (room, mut events) = match Cli::parse() {
        Cli::Host { name } => GameRoom::host(&name).await?,
        Cli::Join { room_id, name } => GameRoom::join(&room_id, &name).await?,
    };
    println!("room id: {}", room.id());
    println!(
        "commands: name <name> | blue | red | master | start | flip <card> | hint <card> | pass | board | quit"
    );

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                RoomEvent::GameUpdated(game) => {
                    println!(
                        "[{:?}] {} players, {} to play, winner: {}",
                        game.game_status,
                        game.players.len(),
                        game.team_playing,
                        game.winner
                    );
                }
                other => println!("{other:?}"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut words = line.split_whitespace();
        let result = match (words.next(), words.next()) {
            (Some("name"), Some(name)) => room.set_player_name(name).await,
            (Some("blue"), _) => room.set_player_team(TeamId::Blue, false).await,
            (Some("red"), _) => room.set_player_team(TeamId::Red, false).await,
            (Some("master"), _) => room.set_player_team(TeamId::Blue, true).await,
            (Some("start"), _) => room.start().await,
            (Some("flip"), Some(card)) => room.chose_card(card).await,
            (Some("hint"), Some(card)) => room.hint_card(card).await,
            (Some("pass"), _) => room.ok_next_team().await,
            (Some("board"), _) => {
                let game = room.game().await?;
                let mut cards: Vec<_> = game.images.values().collect();
                cards.sort_by_key(|c| c.index);
                for card in cards {
                    let state = if card.is_unflipped() {
                        if card.is_hint { "hint" } else { "down" }
                    } else {
                        "up"
                    };
                    println!("  {:2} {:12} {}", card.index, card.image_id, state);
                }
                Ok(())
            }
            (Some("quit"), _) | (None, _) => break,
            (Some(other), _) => {
                println!("unknown command '{other}'");
                Ok(())
            }
        };
        if let Err(err) = result {
            println!("error: {err}");
        }
    }

    room.shutdown().await;
    Ok(())
}
