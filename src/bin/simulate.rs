use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use clap::Parser;
use pacman_pursuit::constants::{TICK_MS, TILE_SIZE};
use pacman_pursuit::engine::{GameEngine, GameEngineOptions};
use pacman_pursuit::maze::Maze;
use pacman_pursuit::motion::collides;
use pacman_pursuit::planner::PlannerConfig;
use pacman_pursuit::rng::{seeded, GameRng};
use pacman_pursuit::types::{Direction, GameOverReason, PlanSource, RuntimeEvent, Snapshot};
use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const DEFAULT_MAX_TICKS: u64 = 6_000;
const AUTOPILOT_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;
const EVASION_NOISE: f32 = 1.5;
const REVERSE_PENALTY: f32 = 0.75;

#[derive(Parser, Debug)]
#[command(author, version, about = "Runs headless pursuit games against an evasive autopilot")]
struct Cli {
    #[arg(long, default_value_t = 3)]
    games: u32,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    rollouts: Option<usize>,
    #[arg(long)]
    depth: Option<usize>,
    #[arg(long)]
    period: Option<u32>,
    #[arg(long, default_value_t = DEFAULT_MAX_TICKS)]
    max_ticks: u64,
    #[arg(long)]
    maze: Option<PathBuf>,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug)]
struct GameSetup {
    index: u32,
    seed: u64,
    options: GameEngineOptions,
}

#[derive(Clone, Debug, Serialize)]
struct GameResultLine {
    game: u32,
    seed: u64,
    reason: Option<GameOverReason>,
    ticks: u64,
    #[serde(rename = "simulatedMs")]
    simulated_ms: u64,
    score: u32,
    level: u32,
    #[serde(rename = "livesLeft")]
    lives_left: u32,
    captures: u32,
    #[serde(rename = "foodEaten")]
    food_eaten: u32,
    plans: u32,
    #[serde(rename = "fallbackPlans")]
    fallback_plans: u32,
    #[serde(rename = "stuckPlans")]
    stuck_plans: u32,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u64,
    message: String,
}

#[derive(Clone, Debug)]
struct GameRunResult {
    result: GameResultLine,
    anomaly_records: Vec<AnomalyRecord>,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "startedAt")]
    started_at: String,
    #[serde(rename = "finishedAt")]
    finished_at: String,
    #[serde(rename = "gameCount")]
    game_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageScore")]
    average_score: u32,
    #[serde(rename = "averageTicks")]
    average_ticks: u64,
    #[serde(rename = "reasonCounts")]
    reason_counts: BTreeMap<String, usize>,
    games: Vec<GameResultLine>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let maze = match cli.maze.as_deref() {
        Some(path) => Maze::load(path, TILE_SIZE)
            .with_context(|| format!("loading maze from {}", path.display()))?,
        None => Maze::classic(),
    };
    let setups = resolve_games(&cli);
    let started_at = Utc::now();
    let match_id = cli.match_id.clone().unwrap_or_else(|| {
        default_match_id(
            setups.first().map(|setup| setup.seed).unwrap_or(0),
            &started_at.format("%Y%m%dT%H%M%S").to_string(),
        )
    });

    let mut has_anomaly = false;
    let mut results = Vec::new();
    let mut reason_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_anomalies = 0usize;

    for setup in setups {
        tracing::info!(
            match_id = %match_id,
            game = setup.index,
            seed = setup.seed,
            rollouts = setup.options.planner.rollouts,
            depth = setup.options.planner.depth,
            period = setup.options.plan_period,
            "game started"
        );
        let run = run_game(&maze, &setup);

        for anomaly in &run.anomaly_records {
            tracing::warn!(
                match_id = %match_id,
                game = setup.index,
                tick = anomaly.tick,
                message = %anomaly.message,
                "anomaly detected"
            );
        }
        if !run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += run.anomaly_records.len();
        *reason_counts
            .entry(game_over_reason_key(run.result.reason))
            .or_insert(0) += 1;

        tracing::info!(
            match_id = %match_id,
            game = setup.index,
            ticks = run.result.ticks,
            score = run.result.score,
            captures = run.result.captures,
            "game finished"
        );
        println!("{}", serde_json::to_string(&run.result)?);
        results.push(run.result);
    }

    let summary = build_run_summary(
        match_id.clone(),
        started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        results,
        reason_counts,
        total_anomalies,
    );

    if let Some(path) = cli.summary_out.as_ref() {
        write_summary(path, &summary)?;
        tracing::info!(path = %path.display(), "summary written");
    }

    tracing::info!(
        match_id = %match_id,
        games = summary.game_count,
        anomalies = summary.anomaly_count,
        average_score = summary.average_score,
        "run finished"
    );

    if has_anomaly {
        std::process::exit(1);
    }
    Ok(())
}

fn resolve_games(cli: &Cli) -> Vec<GameSetup> {
    let base_seed = cli
        .seed
        .unwrap_or_else(|| Utc::now().timestamp_millis().unsigned_abs());
    let defaults = PlannerConfig::default();
    let options = GameEngineOptions {
        planner: PlannerConfig {
            rollouts: cli.rollouts.unwrap_or(defaults.rollouts),
            depth: cli.depth.unwrap_or(defaults.depth),
            ..defaults
        },
        plan_period: cli
            .period
            .unwrap_or(GameEngineOptions::default().plan_period),
        max_ticks: Some(cli.max_ticks),
        ..GameEngineOptions::default()
    };
    (0..cli.games.max(1))
        .map(|index| GameSetup {
            index: index + 1,
            seed: base_seed.wrapping_add(u64::from(index)),
            options: options.clone(),
        })
        .collect()
}

fn run_game(maze: &Maze, setup: &GameSetup) -> GameRunResult {
    let mut engine = GameEngine::new(maze.clone(), setup.options.clone(), setup.seed);
    let mut autopilot = seeded(setup.seed ^ AUTOPILOT_SEED_SALT);
    engine.start();

    let mut plans = 0u32;
    let mut fallback_plans = 0u32;
    let mut stuck_plans = 0u32;
    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut last_score = 0u32;
    let mut tick_safety = 0u64;
    let safety_limit = setup.options.max_ticks.unwrap_or(DEFAULT_MAX_TICKS) + 1;

    while !engine.is_ended() {
        if let Some(dir) = choose_evasive_direction(&engine, &mut autopilot) {
            engine.set_player_direction(dir);
        }
        engine.step();
        let snapshot = engine.build_snapshot(true);
        for message in collect_snapshot_anomalies(&engine, &snapshot, last_score) {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                message,
            );
        }
        last_score = snapshot.score;

        for event in &snapshot.events {
            if let RuntimeEvent::GhostPlanned { source, .. } = event {
                plans += 1;
                match source {
                    PlanSource::PathFallback => fallback_plans += 1,
                    PlanSource::Stuck => stuck_plans += 1,
                    PlanSource::MonteCarlo => {}
                }
            }
        }

        tick_safety += 1;
        if tick_safety > safety_limit {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                "tick safety limit exceeded".to_string(),
            );
            break;
        }
    }

    let summary = engine.build_summary();
    GameRunResult {
        result: GameResultLine {
            game: setup.index,
            seed: setup.seed,
            reason: summary.reason,
            ticks: summary.ticks,
            simulated_ms: summary.ticks * TICK_MS,
            score: summary.score,
            level: summary.level,
            lives_left: summary.lives,
            captures: summary.captures,
            food_eaten: summary.food_eaten,
            plans,
            fallback_plans,
            stuck_plans,
            anomalies,
        },
        anomaly_records,
    }
}

/// Steers away from the nearest ghost, with enough noise to avoid loops.
fn choose_evasive_direction(engine: &GameEngine, rng: &mut GameRng) -> Option<Direction> {
    let body = engine.player_body();
    let here = engine.maze.cell_of(body.position);
    let moving = !body.velocity.is_zero();
    engine
        .legal_player_directions()
        .into_iter()
        .map(|dir| {
            let distance = engine.distance_to_nearest_ghost(here.neighbor(dir));
            let reversing = moving && dir == body.direction.opposite();
            let noise = rng.random::<f32>() * EVASION_NOISE;
            (dir, evasion_score(distance, reversing, noise))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(dir, _)| dir)
}

fn evasion_score(distance: Option<i32>, reversing: bool, noise: f32) -> f32 {
    let base = distance.map_or(0.0, |d| d as f32);
    let penalty = if reversing { REVERSE_PENALTY } else { 0.0 };
    base - penalty + noise
}

fn collect_snapshot_anomalies(
    engine: &GameEngine,
    snapshot: &Snapshot,
    last_score: u32,
) -> Vec<String> {
    let mut anomalies = Vec::new();
    for ghost in engine.ghost_bodies() {
        if collides(&engine.maze, ghost.position, ghost.size) {
            anomalies.push(format!(
                "ghost inside wall at ({}, {})",
                ghost.position.x, ghost.position.y
            ));
        }
    }
    let player = engine.player_body();
    if collides(&engine.maze, player.position, player.size) {
        anomalies.push("player inside wall".to_string());
    }
    if snapshot.score < last_score {
        anomalies.push(format!(
            "score went backwards: {} -> {}",
            last_score, snapshot.score
        ));
    }
    anomalies
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    tick: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        tick,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_match_id(seed: u64, stamp: &str) -> String {
    format!("sim-{seed}-{stamp}")
}

fn build_run_summary(
    match_id: String,
    started_at: String,
    finished_at: String,
    games: Vec<GameResultLine>,
    reason_counts: BTreeMap<String, usize>,
    anomaly_count: usize,
) -> RunSummary {
    let game_count = games.len();
    let (average_score, average_ticks) = if game_count == 0 {
        (0, 0)
    } else {
        let total_score: u64 = games.iter().map(|g| u64::from(g.score)).sum();
        let total_ticks: u64 = games.iter().map(|g| g.ticks).sum();
        (
            (total_score / game_count as u64) as u32,
            total_ticks / game_count as u64,
        )
    };
    RunSummary {
        match_id,
        started_at,
        finished_at,
        game_count,
        anomaly_count,
        average_score,
        average_ticks,
        reason_counts,
        games,
    }
}

fn game_over_reason_key(reason: Option<GameOverReason>) -> String {
    match reason {
        Some(GameOverReason::OutOfLives) => "out_of_lives",
        Some(GameOverReason::TickLimit) => "tick_limit",
        None => "unfinished",
    }
    .to_string()
}

fn write_summary(path: &Path, summary: &RunSummary) -> anyhow::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, summary_text)
        .with_context(|| format!("writing summary to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_result(reason: GameOverReason, score: u32, ticks: u64) -> GameResultLine {
        GameResultLine {
            game: 1,
            seed: 42,
            reason: Some(reason),
            ticks,
            simulated_ms: ticks * TICK_MS,
            score,
            level: 1,
            lives_left: 0,
            captures: 3,
            food_eaten: score / 10,
            plans: 0,
            fallback_plans: 0,
            stuck_plans: 0,
            anomalies: Vec::new(),
        }
    }

    fn quick_setup(seed: u64) -> GameSetup {
        GameSetup {
            index: 1,
            seed,
            options: GameEngineOptions {
                planner: PlannerConfig {
                    rollouts: 6,
                    ..PlannerConfig::default()
                },
                max_ticks: Some(240),
                ..GameEngineOptions::default()
            },
        }
    }

    #[test]
    fn default_match_id_contains_seed_and_stamp() {
        assert_eq!(
            default_match_id(42, "20240101T000000"),
            "sim-42-20240101T000000"
        );
    }

    #[test]
    fn build_run_summary_calculates_averages() {
        let summary = build_run_summary(
            "sim-42-1".to_string(),
            "a".to_string(),
            "b".to_string(),
            vec![
                make_result(GameOverReason::OutOfLives, 300, 1_000),
                make_result(GameOverReason::TickLimit, 500, 3_000),
            ],
            BTreeMap::from([
                ("out_of_lives".to_string(), 1usize),
                ("tick_limit".to_string(), 1usize),
            ]),
            1,
        );
        assert_eq!(summary.average_score, 400);
        assert_eq!(summary.average_ticks, 2_000);
        assert_eq!(summary.game_count, 2);
    }

    #[test]
    fn build_run_summary_handles_no_games() {
        let summary = build_run_summary(
            "sim-0".to_string(),
            "a".to_string(),
            "b".to_string(),
            Vec::new(),
            BTreeMap::new(),
            0,
        );
        assert_eq!(summary.average_score, 0);
        assert_eq!(summary.average_ticks, 0);
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let target = std::env::temp_dir()
            .join(format!("pacman-pursuit-missing-{now}"))
            .join("summary.json");
        let summary = build_run_summary(
            "sim-1-1".to_string(),
            "a".to_string(),
            "b".to_string(),
            vec![make_result(GameOverReason::TickLimit, 0, 60)],
            BTreeMap::from([("tick_limit".to_string(), 1usize)]),
            0,
        );
        assert!(write_summary(&target, &summary).is_err());
    }

    #[test]
    fn push_anomaly_keeps_records_and_deduplicates_summary_messages() {
        let mut anomalies = Vec::new();
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        push_anomaly(&mut anomalies, &mut records, &mut seen, 10, "same anomaly".to_string());
        push_anomaly(&mut anomalies, &mut records, &mut seen, 11, "same anomaly".to_string());

        assert_eq!(anomalies.len(), 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tick, 10);
        assert_eq!(records[1].tick, 11);
    }

    #[test]
    fn evasion_prefers_distance_over_noise() {
        let far = evasion_score(Some(6), false, 0.0);
        let near = evasion_score(Some(3), false, EVASION_NOISE);
        assert!(far > near);
        assert!(evasion_score(Some(4), false, 0.0) > evasion_score(Some(4), true, 0.0));
    }

    #[test]
    fn evasive_choice_is_always_legal() {
        let mut engine = GameEngine::new(Maze::classic(), quick_setup(3).options, 3);
        engine.start();
        let mut rng = seeded(11);
        for _ in 0..200 {
            if let Some(dir) = choose_evasive_direction(&engine, &mut rng) {
                assert!(engine.legal_player_directions().contains(&dir));
                engine.set_player_direction(dir);
            }
            engine.step();
            if engine.is_ended() {
                break;
            }
        }
    }

    #[test]
    fn run_game_is_reproducible_and_clean() {
        let maze = Maze::classic();
        let a = run_game(&maze, &quick_setup(99));
        let b = run_game(&maze, &quick_setup(99));
        assert_eq!(
            serde_json::to_string(&a.result).expect("serializes"),
            serde_json::to_string(&b.result).expect("serializes")
        );
        assert!(a.result.anomalies.is_empty(), "{:?}", a.result.anomalies);
        assert!(a.result.reason.is_some());
        assert!(a.result.ticks <= 240);
        assert!(a.result.plans > 0);
    }

    #[test]
    fn resolve_games_derives_consecutive_seeds() {
        let cli = Cli::parse_from(["simulate", "--games", "3", "--seed", "10", "--period", "4"]);
        let setups = resolve_games(&cli);
        let seeds: Vec<u64> = setups.iter().map(|s| s.seed).collect();
        assert_eq!(seeds, vec![10, 11, 12]);
        assert!(setups.iter().all(|s| s.options.plan_period == 4));
        assert_eq!(setups[0].options.max_ticks, Some(DEFAULT_MAX_TICKS));
    }
}
