use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use eggdash_core::store::Store;
use eggdash_hunt::{Direction, GameState};
use eggdash_session::{
    Leaderboard, MemoryStore, MultiplayerClient, RoundTiming, SessionConfig, SessionError,
    SessionResults, new_player_id, play_solo,
};

const DEFAULT_ROUNDS: u32 = 2;
const STEER_PERIOD: Duration = Duration::from_millis(250);
const SOLO_NAMES: [&str; 3] = ["Hoppy", "Clover", "Bun"];

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = SessionConfig::load();
    if !config.validate() {
        tracing::error!("Invalid configuration, exiting");
        std::process::exit(1);
    }

    // `eggdash-sim [rounds]` plays a session, `eggdash-sim solo [runs]` the leaderboard.
    let mut args = std::env::args().skip(1).peekable();
    let solo = args.next_if(|a| a == "solo").is_some();
    let rounds = args
        .next()
        .and_then(|a| a.parse::<u32>().ok())
        .unwrap_or(DEFAULT_ROUNDS);

    tracing::info!(rounds, solo, round_secs = config.hunt.round_secs, "Eggdash simulation starting");
    let outcome = if solo {
        simulate_solo(config, rounds).await
    } else {
        simulate(config, rounds).await
    };
    if let Err(e) = outcome {
        tracing::error!(error = %e, "Simulation failed");
        std::process::exit(1);
    }
}

async fn simulate(config: SessionConfig, rounds: u32) -> Result<(), SessionError> {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let mut host = MultiplayerClient::new(
        Arc::clone(&store),
        config.clone(),
        new_player_id(),
        "Hoppy",
        1,
    );
    let mut guest = MultiplayerClient::new(Arc::clone(&store), config, new_player_id(), "Clover", 2);

    let session_id = host.coordinator_mut().create_session().await?;
    guest.coordinator_mut().join_session(&session_id).await?;
    println!("session {session_id}");

    let (host_input, host_rx) = watch::channel(Direction::NONE);
    let (guest_input, guest_rx) = watch::channel(Direction::NONE);
    let steering = [
        tokio::spawn(random_walk(host_input, 11)),
        tokio::spawn(random_walk(guest_input, 22)),
    ];

    for _ in 0..rounds {
        guest.coordinator().set_ready(true).await?;
        host.wait_until_startable().await?;
        host.coordinator().start_game().await?;

        let (host_done, guest_done) = tokio::join!(
            host.play_next_round(&host_rx),
            guest.play_next_round(&guest_rx),
        );
        let results = host_done?;
        guest_done?;
        print_results(&results);

        host.coordinator().restart_session().await?;
    }

    for task in steering {
        task.abort();
    }
    guest.coordinator_mut().cleanup().await?;
    host.coordinator_mut().cleanup().await?;
    Ok(())
}

async fn simulate_solo(config: SessionConfig, runs: u32) -> Result<(), SessionError> {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let leaderboard = Leaderboard::new(Arc::clone(&store), config.leaderboard_size);
    let timing = RoundTiming::from_config(&config);
    let mut game = GameState::new(config.hunt.clone(), 3);

    let (input, rx) = watch::channel(Direction::NONE);
    let steering = tokio::spawn(random_walk(input, 33));

    for (run, name) in (0..runs).zip(SOLO_NAMES.iter().cycle()) {
        let outcome = play_solo(&mut game, &rx, timing, &leaderboard, name).await?;
        let verdict = if outcome.qualified { "high score" } else { "no entry" };
        println!("run {} {name}: {} ({verdict})", run + 1, outcome.score);
    }
    steering.abort();

    println!("leaderboard:");
    for (rank, entry) in leaderboard.top(leaderboard.size()).await?.iter().enumerate() {
        println!("  {}. {:<12} {:>4}", rank + 1, entry.name, entry.score);
    }
    Ok(())
}

/// Hold a random direction for a while, then pick another.
async fn random_walk(input: watch::Sender<Direction>, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut interval = tokio::time::interval(STEER_PERIOD);
    loop {
        interval.tick().await;
        let direction = Direction {
            left: rng.random_bool(0.3),
            right: rng.random_bool(0.3),
            up: rng.random_bool(0.3),
            down: rng.random_bool(0.3),
        };
        if input.send(direction).is_err() {
            break;
        }
    }
}

fn print_results(results: &SessionResults) {
    println!("round {}", results.round + 1);
    for row in &results.ranking {
        println!("  {}. {:<12} {:>4}", row.rank, row.name, row.score);
    }
    println!("  wins:");
    for standing in &results.wins {
        println!("    {:<12} {}", standing.name, standing.wins);
    }
}
