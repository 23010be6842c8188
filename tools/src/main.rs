//! save-runner: headless session runner for the lifesim save pipeline.
//!
//! Usage:
//!   save-runner --db saves.db --minutes 600
//!   save-runner --config lifesim.json --new-game --seed 7
//!   save-runner --db saves.db --legacy old_save.json --dump

use anyhow::{Context, Result};
use lifesim_core::{
    clock::SystemClock,
    config::SaveConfig,
    fallback::FlatStore,
    orchestrator::{Notice, SaveOutcome},
    resume::{BootstrapOutcome, BootstrapRequest},
    session::GameSession,
};
use std::env;

/// Game minutes per simulated step.
const STEP_MINUTES: u64 = 10;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let minutes = parse_arg(&args, "--minutes", 180u64);
    let new_game = args.iter().any(|a| a == "--new-game");
    let dump = args.iter().any(|a| a == "--dump");

    let mut config = match flag_value(&args, "--config") {
        Some(path) => SaveConfig::load(path)?,
        None => SaveConfig::default(),
    };
    if let Some(db) = flag_value(&args, "--db") {
        config.db_path = db.to_string();
    }

    if let Some(legacy) = flag_value(&args, "--legacy") {
        seed_legacy_save(&config, legacy)?;
    }

    println!("lifesim save-runner");
    println!("  db:        {}", config.db_path);
    println!("  fallback:  {}", config.fallback_path.as_deref().unwrap_or("(memory)"));
    println!("  seed:      {seed}");
    println!("  minutes:   {minutes}");
    println!();

    let mut session = GameSession::build(config, Box::new(SystemClock), seed)?;
    if let Some(outcome) = session.legacy_outcome() {
        println!("legacy migration: {outcome:?}");
    }

    let outcome = if new_game {
        session.bootstrap(BootstrapRequest::NewGame)
    } else {
        session.continue_game()
    };
    match outcome {
        BootstrapOutcome::Resumed { save_id } => println!("resumed from save {save_id}"),
        BootstrapOutcome::NewGame { reason } => println!("new game ({reason:?})"),
        BootstrapOutcome::AlreadyLoaded => println!("already loaded"),
    }

    run_day(&mut session, minutes)?;

    session.quick_save()?;
    let checkpoint = format!("Day {} checkpoint", session.world().state().time.day);
    session.manual_save(&checkpoint)?;

    print_summary(&mut session)?;
    if dump {
        let snapshot = session.world().snapshot();
        println!();
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }
    Ok(())
}

/// Advance the clock in fixed steps and walk the opening scenes.
fn run_day(session: &mut GameSession, minutes: u64) -> Result<()> {
    let scenes = ["village_square", "farmhouse", "forest_clearing"];
    let steps = minutes / STEP_MINUTES;

    for step in 0..steps {
        if let Some(outcome) = session.advance_time(STEP_MINUTES) {
            report("interval", &outcome);
        }
        if step % 6 == 5 {
            let scene = scenes[(step / 6) as usize % scenes.len()];
            if let Some(outcome) = session.transition_scene(scene)? {
                report(scene, &outcome);
            }
        }
    }
    Ok(())
}

fn report(trigger: &str, outcome: &SaveOutcome) {
    match outcome {
        SaveOutcome::Saved { id, tier, .. } => println!("  [{trigger}] {tier} save -> {id}"),
        SaveOutcome::Skipped(reason) => log::debug!("[{trigger}] skipped: {reason:?}"),
        SaveOutcome::Failed { message } => println!("  [{trigger}] auto-save failed: {message}"),
    }
}

/// Put the contents of `path` under the legacy key so the next build
/// migrates it.
fn seed_legacy_save(config: &SaveConfig, path: &str) -> Result<()> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Cannot read {path}"))?;
    let fallback = config
        .fallback_path
        .as_deref()
        .context("--legacy needs a fallback_path to write into")?;
    let mut flat = FlatStore::open(fallback, config.fallback_quota_bytes)?;
    flat.set_item(&config.legacy_key, &raw)?;
    println!("seeded legacy save from {path} ({} bytes)", raw.len());
    Ok(())
}

fn print_summary(session: &mut GameSession) -> Result<()> {
    let state = session.world().state();
    println!();
    println!("=== SESSION SUMMARY ===");
    println!("  session:   {}", session.session_id());
    println!("  backend:   {:?}", session.backend_kind());
    println!(
        "  time:      day {} {:02}:{:02} ({:?})",
        state.time.day, state.time.hour, state.time.minute, state.time.weekday
    );
    println!("  weather:   {}", state.environment.weather);
    println!("  scene:     {}", state.story.current_scene_id.as_deref().unwrap_or("-"));
    println!("  health:    {}/{}", state.player.stats.health, state.player.stats.max_health);

    println!();
    println!("=== SAVES ===");
    for record in session.list_saves(None)? {
        println!(
            "  #{:<4} {:<6} slot={:<4} {:<24} {}",
            record.id.unwrap_or_default(),
            record.tier.as_str(),
            record.slot.map_or("-".to_string(), |s| s.to_string()),
            record.name,
            format_timestamp(record.timestamp),
        );
    }

    let notices = session.take_notices();
    if !notices.is_empty() {
        println!();
        println!("=== NOTICES ===");
        for notice in notices {
            match notice {
                Notice::Saved { tier, id, name } => println!("  saved {tier} #{id} '{name}'"),
                Notice::SaveFailed { tier, message } => println!("  {tier} save FAILED: {message}"),
                Notice::DegradedMode { reason } => println!("  degraded mode: {reason}"),
                Notice::LoadFailed { message } => println!("  load FAILED: {message}"),
            }
        }
    }

    let log = session.migration_log()?;
    println!();
    println!("=== MIGRATION LOG ({} entries) ===", log.len());
    for entry in log.iter().rev().take(5) {
        let mark = if entry.success { "ok " } else { "ERR" };
        println!("  {mark} {:<28} {}", entry.action, entry.details);
    }
    Ok(())
}

fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
