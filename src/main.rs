//! AR Stacker entry point
//!
//! Runs a scripted, headless session against the deterministic stand-in
//! world and logs every game event as a JSON line.
//!
//! Usage: `ar-stacker [settings.json] [seed]`

use glam::{Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use ar_stacker::Settings;
use ar_stacker::consts::{MAX_SUBSTEPS, SIM_DT};
use ar_stacker::sim::{ColumnWorld, GamePhase, GameSession, PlaneSurface, TickInput, aim_down_at, tick};

/// Simulated frame time fed to the accumulator (30 fps)
const FRAME_DT: f32 = 1.0 / 30.0;
/// Give up after this much simulated time
const MAX_SESSION_TIME: f32 = 120.0;
/// Seconds between scripted place presses
const PLACE_INTERVAL: f32 = 0.75;
/// Horizontal aim jitter (world units)
const AIM_JITTER: f32 = 0.03;
/// Half size of the simulated table top
const TABLE_HALF_EXTENT: f32 = 0.6;

fn load_settings(path: Option<&str>) -> Settings {
    let Some(path) = path else {
        return Settings::default();
    };
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) => {
            log::warn!("Could not read settings from {}: {}", path, e);
            return Settings::default();
        }
    };
    match Settings::from_json(&json) {
        Ok(settings) => {
            log::info!("Loaded settings from {}", path);
            settings
        }
        Err(e) => {
            log::warn!("Invalid settings in {}: {}; using defaults", path, e);
            Settings::default()
        }
    }
}

/// Script for one frame: start, anchor, then keep stacking
fn scripted_input(session: &GameSession, rng: &mut Pcg32, since_place: &mut f32) -> TickInput {
    match session.phase() {
        GamePhase::MainMenu => TickInput {
            start: true,
            ..Default::default()
        },
        GamePhase::AwaitingAnchor => TickInput {
            place: true,
            screen_point: Vec2::ZERO,
            ..Default::default()
        },
        GamePhase::Active if *since_place >= PLACE_INTERVAL && session.can_place() => {
            *since_place = 0.0;
            let top = session
                .blocks()
                .newest()
                .map(|b| b.position)
                .unwrap_or(Vec3::ZERO);
            let jitter = Vec3::new(
                rng.random_range(-AIM_JITTER..AIM_JITTER),
                0.0,
                rng.random_range(-AIM_JITTER..AIM_JITTER),
            );
            TickInput {
                place: true,
                aim: Some(aim_down_at(top + jitter)),
                ..Default::default()
            }
        }
        _ => TickInput::default(),
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let settings = load_settings(args.get(1).map(String::as_str));
    let seed = args
        .get(2)
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0x5eed);

    let block_height = settings.block_height;
    let mut session = match GameSession::new(settings) {
        Ok(session) => session,
        Err(e) => {
            log::error!("Refusing to start: {}", e);
            return;
        }
    };
    log::info!("AR Stacker (headless) starting, seed {}", seed);

    let mut world = ColumnWorld::new(block_height, Some(0.0)).with_floor_extent(TABLE_HALF_EXTENT);
    let mut surface = PlaneSurface::new(0.0, TABLE_HALF_EXTENT);
    let mut rng = Pcg32::seed_from_u64(seed);

    let mut accumulator = 0.0;
    let mut elapsed = 0.0;
    let mut since_place = 0.0;

    while elapsed < MAX_SESSION_TIME {
        accumulator += FRAME_DT;
        elapsed += FRAME_DT;
        since_place += FRAME_DT;

        // Input is sampled once per frame and consumed by the first substep
        let mut input = scripted_input(&session, &mut rng, &mut since_place);
        let mut substeps = 0;
        while accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            tick(&mut session, &mut world, &mut surface, &input, SIM_DT);
            input = TickInput::default();
            accumulator -= SIM_DT;
            substeps += 1;
        }

        for event in session.drain_events() {
            match serde_json::to_string(&event) {
                Ok(line) => log::info!("{}", line),
                Err(e) => log::warn!("Could not serialize {:?}: {}", event, e),
            }
        }

        if session.phase() == GamePhase::GameOver {
            break;
        }
    }

    log::info!(
        "Session ended after {:.1}s in {:?} with score {} ({} ticks)",
        elapsed,
        session.phase(),
        session.score(),
        session.time_ticks
    );
}
