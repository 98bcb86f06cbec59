//! Arcane Siege Server
//!
//! `arcane-siege-server [serve]` runs the room server, configured from
//! `ARCANE_SIEGE_*` environment variables.
//!
//! `arcane-siege-server demo [seed]` plays a bot-vs-bot match twice from
//! the same seed and checks both runs end on the same state hash.

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use arcane_siege::{
    DeterministicRng, MatchConfig, MatchState, VERSION,
    game::bot::play_bot_turn,
    game::turn::TurnTransition,
    network::{GameServer, ServerConfig},
};

/// Hard stop for a demo match that never resolves.
const DEMO_TURN_LIMIT: u32 = 500;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Arcane Siege Server v{}", VERSION);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("serve") => serve().await,
        Some("demo") => {
            let seed = match args.get(1) {
                Some(raw) => raw.parse().with_context(|| format!("invalid seed: {raw}"))?,
                None => 12345,
            };
            demo(seed)
        }
        Some(other) => bail!("unknown command: {other} (expected `serve` or `demo [seed]`)"),
    }
}

async fn serve() -> Result<()> {
    let config = ServerConfig::from_env().context("reading server configuration")?;
    info!(
        bind = %config.bind_addr,
        max_connections = config.max_connections,
        casters = config.room.match_config.casters_per_team,
        "starting room server"
    );

    let server = GameServer::new(config);
    server.run().await?;
    Ok(())
}

/// Play one bot-vs-bot match; returns the final state.
fn bot_match(seed: u64) -> MatchState {
    let mut rng = DeterministicRng::new(seed);
    let mut state = MatchState::generate(MatchConfig::default(), &mut rng);

    while !state.is_finished() && state.turn_count <= DEMO_TURN_LIMIT {
        let team = state.current_turn;
        let Some((action, transition)) = play_bot_turn(&mut state, team, &mut rng) else {
            break;
        };
        tracing::debug!(turn = state.turn_count, %team, ?action, "bot turn");
        if let TurnTransition::Won(winner) = transition {
            info!(%winner, turn = state.turn_count, "match finished");
        }
    }
    state
}

fn demo(seed: u64) -> Result<()> {
    info!("=== Demo Match (seed {}) ===", seed);

    let first = bot_match(seed);
    let hash = first.compute_hash();
    info!("Turns played: {}", first.turn_count);
    match first.winner {
        Some(winner) => info!("Winner: {}", winner),
        None => info!("No winner after {} turns", DEMO_TURN_LIMIT),
    }
    info!("Final State Hash: {}", hex::encode(hash));

    info!("=== Verifying Determinism ===");
    let replay_hash = bot_match(seed).compute_hash();
    info!("Replay State Hash: {}", hex::encode(replay_hash));

    if hash != replay_hash {
        bail!("determinism failure: replay hash differs");
    }
    info!("DETERMINISM VERIFIED: Hashes match!");
    Ok(())
}
