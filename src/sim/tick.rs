//! Fixed timestep simulation tick
//!
//! Drives the session state machine: requests first, then the physics step,
//! then (while active) the timer, the settle scan, the collapse check and the
//! pending timed waits, in that order.

use glam::{Vec2, Vec3};

use super::collision::Ray;
use super::combo;
use super::physics::{BodyMode, PhysicsWorld, SurfaceTracker};
use super::placement::{PlacementCandidate, PlacementVerdict, resolve_candidate, validate};
use super::stability::SettleThresholds;
use super::state::{Block, BlockId, BlockKind, GameEvent, GameOverCause, GamePhase, GameSession};
use super::tasks::{PruneEffect, TaskKind};
use super::timer::TimerStatus;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Leave the main menu and start tracking surfaces
    pub start: bool,
    /// Place a block (the place button)
    pub place: bool,
    /// Play again after game over
    pub restart: bool,
    /// Back to the main menu
    pub menu: bool,
    /// Where the player is pointing, in `[-1, 1]²` screen space
    pub screen_point: Vec2,
    /// Camera ray through `screen_point`, if the presentation layer has one
    pub aim: Option<Ray>,
}

/// Why a place request did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    WrongPhase,
    Cooldown,
    /// A misplaced block is still falling
    FallPending,
    NoCandidate,
}

/// Outcome of a place request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceOutcome {
    /// No-op; state unchanged
    Rejected(RejectReason),
    /// The base went down and the run started
    Anchored { block: BlockId },
    Stacked {
        block: BlockId,
        support: Option<BlockId>,
    },
    /// Released to fall; the run ends after the fall delay
    Misplaced { block: BlockId },
}

/// Advance the session by one fixed timestep
pub fn tick<P, S>(
    session: &mut GameSession,
    physics: &mut P,
    surface: &mut S,
    input: &TickInput,
    dt: f32,
) where
    P: PhysicsWorld + ?Sized,
    S: SurfaceTracker + ?Sized,
{
    session.time_ticks += 1;

    if input.menu {
        request_menu(session, physics, surface);
    }
    if input.start {
        request_start(session, physics, surface);
    }
    if input.restart {
        request_restart(session, physics, surface);
    }
    if input.place {
        request_place(session, physics, surface, input.screen_point, input.aim.as_ref());
    }

    physics.step(dt);
    sync_poses(session, physics);

    if session.phase != GamePhase::Active {
        return;
    }

    // Timer
    let status = session.timer.tick(dt);
    session.emit_timer();
    if status == TimerStatus::Expired {
        enter_game_over(session, physics, GameOverCause::TimerExpired);
        return;
    }

    // Settling
    let thresholds = SettleThresholds::from_settings(&session.settings);
    let settled = session.monitor.scan(&mut session.registry, dt, &thresholds);
    for id in settled {
        log::debug!("Block {} stabilized", id);
        session.emit(GameEvent::BlockStabilized { block: id });
        if session.settings.freeze_when_stable {
            if let Some(block) = session.registry.get_mut(id) {
                if block.freeze() {
                    physics.set_mode(id, BodyMode::Static);
                }
            }
        }
    }

    // Collapse
    if let Some(anchor) = session.anchor_height {
        let collapsed = session.registry.check_collapse(
            anchor,
            session.settings.block_height,
            session.settings.collapse_epsilon,
        );
        if let Some(block) = collapsed {
            enter_game_over(session, physics, GameOverCause::Collapse { block });
            return;
        }
    }

    // Timed waits
    let mut game_over = None;
    for task in session.tasks.advance(dt) {
        match task {
            TaskKind::PlaceCooldown { .. } => session.emit(GameEvent::PlacementReady),
            TaskKind::FallingGameOver { block, .. } => {
                if game_over.is_none() {
                    game_over = Some(GameOverCause::BlockFell { block });
                }
            }
            TaskKind::PruneEffect(effect) => finish_prune_effect(session, physics, effect),
        }
    }
    if let Some(cause) = game_over {
        enter_game_over(session, physics, cause);
    }
}

/// Pull positions of every tracked block after the physics step
fn sync_poses<P: PhysicsWorld + ?Sized>(session: &mut GameSession, physics: &P) {
    for block in session.registry.iter_mut().chain(session.stray.iter_mut()) {
        if let Some(pose) = physics.pose(block.id) {
            block.set_pose(pose);
        }
    }
}

/// MainMenu -> AwaitingAnchor
pub fn request_start<P, S>(session: &mut GameSession, physics: &mut P, surface: &mut S) -> bool
where
    P: PhysicsWorld + ?Sized,
    S: SurfaceTracker + ?Sized,
{
    if session.phase != GamePhase::MainMenu {
        return false;
    }
    begin_session(session, physics, surface);
    true
}

/// GameOver -> AwaitingAnchor
pub fn request_restart<P, S>(session: &mut GameSession, physics: &mut P, surface: &mut S) -> bool
where
    P: PhysicsWorld + ?Sized,
    S: SurfaceTracker + ?Sized,
{
    if session.phase != GamePhase::GameOver {
        return false;
    }
    begin_session(session, physics, surface);
    true
}

/// GameOver | AwaitingAnchor -> MainMenu
pub fn request_menu<P, S>(session: &mut GameSession, physics: &mut P, surface: &mut S) -> bool
where
    P: PhysicsWorld + ?Sized,
    S: SurfaceTracker + ?Sized,
{
    if !matches!(session.phase, GamePhase::GameOver | GamePhase::AwaitingAnchor) {
        return false;
    }
    reset_world(session, physics);
    set_surface_tracking(session, surface, false);
    session.set_phase(GamePhase::MainMenu);
    true
}

fn begin_session<P, S>(session: &mut GameSession, physics: &mut P, surface: &mut S)
where
    P: PhysicsWorld + ?Sized,
    S: SurfaceTracker + ?Sized,
{
    reset_world(session, physics);
    set_surface_tracking(session, surface, true);
    session.set_phase(GamePhase::AwaitingAnchor);
    session.emit_scoreboard();
    session.emit_timer();
}

/// Drop every block, task and counter of the current run
fn reset_world<P: PhysicsWorld + ?Sized>(session: &mut GameSession, physics: &mut P) {
    session.tasks.cancel_all();
    session.monitor.clear();
    physics.clear();
    session.registry.clear();
    session.stray.clear();
    session.scoreboard.reset();
    session.timer.reset();
    session.anchor_height = None;
}

fn set_surface_tracking<S: SurfaceTracker + ?Sized>(
    session: &mut GameSession,
    surface: &mut S,
    enabled: bool,
) {
    if surface.is_enabled() != enabled {
        surface.set_enabled(enabled);
        session.emit(GameEvent::SurfaceTrackingChanged { enabled });
    }
}

fn placement_blocked(session: &GameSession) -> Option<RejectReason> {
    if !matches!(session.phase, GamePhase::AwaitingAnchor | GamePhase::Active) {
        Some(RejectReason::WrongPhase)
    } else if session.tasks.cooldown_active() {
        Some(RejectReason::Cooldown)
    } else if session.tasks.fall_pending() {
        Some(RejectReason::FallPending)
    } else {
        None
    }
}

/// Resolve a candidate from the collaborators and try to place it
pub fn request_place<P, S>(
    session: &mut GameSession,
    physics: &mut P,
    surface: &mut S,
    screen_point: Vec2,
    aim: Option<&Ray>,
) -> PlaceOutcome
where
    P: PhysicsWorld + ?Sized,
    S: SurfaceTracker + ?Sized,
{
    if let Some(reason) = placement_blocked(session) {
        return PlaceOutcome::Rejected(reason);
    }
    let candidate = resolve_candidate(
        session.phase,
        &session.registry,
        physics,
        surface,
        screen_point,
        aim,
        session.settings.block_height,
    );
    match candidate {
        Some(candidate) => place_candidate(session, physics, surface, &candidate),
        None => PlaceOutcome::Rejected(RejectReason::NoCandidate),
    }
}

/// Place a block at an explicit candidate
pub fn place_candidate<P, S>(
    session: &mut GameSession,
    physics: &mut P,
    surface: &mut S,
    candidate: &PlacementCandidate,
) -> PlaceOutcome
where
    P: PhysicsWorld + ?Sized,
    S: SurfaceTracker + ?Sized,
{
    if let Some(reason) = placement_blocked(session) {
        return PlaceOutcome::Rejected(reason);
    }

    let probe = session.settings.support_probe_distance();
    let verdict = validate(candidate, &session.registry, physics, probe);

    match (session.phase, verdict) {
        (GamePhase::AwaitingAnchor, PlacementVerdict::Accepted { support: None }) => {
            anchor_base(session, physics, surface, candidate)
        }
        (GamePhase::Active, PlacementVerdict::Accepted { support }) => {
            stack_block(session, physics, candidate, support)
        }
        (GamePhase::Active, PlacementVerdict::Misplaced) => {
            misplace_block(session, physics, candidate)
        }
        _ => PlaceOutcome::Rejected(RejectReason::WrongPhase),
    }
}

fn anchor_base<P, S>(
    session: &mut GameSession,
    physics: &mut P,
    surface: &mut S,
    candidate: &PlacementCandidate,
) -> PlaceOutcome
where
    P: PhysicsWorld + ?Sized,
    S: SurfaceTracker + ?Sized,
{
    let id = session.next_block_id();
    let block = Block::base(id, candidate.pose);
    physics.spawn(id, block.pose(), BodyMode::Static);

    let anchor_height = block.position.y + session.settings.block_height / 2.0;
    session.anchor_height = Some(anchor_height);
    let stack_index = session.registry.add(block);
    log::info!("Base {} anchored, top face at {:.3}", id, anchor_height);

    session.emit(GameEvent::BlockPlaced {
        block: id,
        kind: BlockKind::Base,
        stack_index,
    });
    if session.settings.hide_surfaces_after_anchor {
        set_surface_tracking(session, surface, false);
    }

    session.timer.start();
    session.set_phase(GamePhase::Active);
    session.emit_timer();
    start_cooldown(session);

    PlaceOutcome::Anchored { block: id }
}

fn stack_block<P: PhysicsWorld + ?Sized>(
    session: &mut GameSession,
    physics: &mut P,
    candidate: &PlacementCandidate,
    support: Option<BlockId>,
) -> PlaceOutcome {
    let id = session.next_block_id();
    let block = Block::stackable(id, candidate.pose);
    physics.spawn(id, block.pose(), BodyMode::Dynamic);
    session
        .monitor
        .track(id, block.pose(), session.settings.settle_grace);
    let stack_index = session.registry.add(block);
    log::debug!("Block {} stacked at index {} on {:?}", id, stack_index, support);

    session.emit(GameEvent::BlockPlaced {
        block: id,
        kind: BlockKind::Stackable,
        stack_index,
    });

    let result = combo::on_valid_placement(
        &mut session.scoreboard,
        &mut session.timer,
        &mut session.registry,
        &session.settings,
    );
    session.emit_scoreboard();

    if let Some(reward) = result.reward {
        let mut pruned = Vec::with_capacity(reward.pruned.len());
        for mut block in reward.pruned {
            session.monitor.untrack(block.id);
            block.freeze();
            physics.set_mode(block.id, BodyMode::Static);
            log::debug!("Block {} pruned", block.id);
            session.emit(GameEvent::BlockPruned { block: block.id });
            pruned.push(block.id);
            session.tasks.push(TaskKind::PruneEffect(PruneEffect::new(block)));
        }
        session.emit(GameEvent::ComboTriggered {
            timer: reward.timer,
            pruned,
        });
        session.emit_timer();
    }

    start_cooldown(session);
    PlaceOutcome::Stacked { block: id, support }
}

fn misplace_block<P: PhysicsWorld + ?Sized>(
    session: &mut GameSession,
    physics: &mut P,
    candidate: &PlacementCandidate,
) -> PlaceOutcome {
    let id = session.next_block_id();
    let mut block = Block::stackable(id, candidate.pose);
    physics.spawn(id, block.pose(), BodyMode::Dynamic);
    block.release();
    session.stray.push(block);

    let delay = session.settings.falling_to_game_over_delay;
    session.tasks.push(TaskKind::FallingGameOver {
        block: id,
        remaining: delay,
    });
    log::info!("Block {} misplaced, run ends in {:.1}s", id, delay);
    session.emit(GameEvent::BlockMisplaced { block: id });

    PlaceOutcome::Misplaced { block: id }
}

fn start_cooldown(session: &mut GameSession) {
    let cooldown = session.settings.place_cooldown;
    if cooldown > 0.0 {
        session
            .tasks
            .push(TaskKind::PlaceCooldown { remaining: cooldown });
    } else {
        session.emit(GameEvent::PlacementReady);
    }
}

fn finish_prune_effect<P: PhysicsWorld + ?Sized>(
    session: &mut GameSession,
    physics: &mut P,
    effect: PruneEffect,
) {
    physics.despawn(effect.block.id);
    session.emit(GameEvent::PruneEffectFinished {
        block: effect.block.id,
    });
}

/// Active -> GameOver. Returns false if the run was not active.
pub fn enter_game_over<P: PhysicsWorld + ?Sized>(
    session: &mut GameSession,
    physics: &mut P,
    cause: GameOverCause,
) -> bool {
    if session.phase != GamePhase::Active {
        return false;
    }

    for task in session.tasks.cancel_all() {
        if let TaskKind::PruneEffect(effect) = task {
            physics.despawn(effect.block.id);
        }
    }
    session.monitor.clear();
    session.timer.stop();
    for block in session.registry.iter_mut() {
        if block.freeze() {
            physics.set_mode(block.id, BodyMode::Static);
        }
    }
    session.scoreboard.combo_count = 0;

    let final_score = session.scoreboard.score;
    log::info!("Game over ({:?}), final score {}", cause, final_score);
    session.set_phase(GamePhase::GameOver);
    session.emit_scoreboard();
    session.emit(GameEvent::GameOver { final_score, cause });
    true
}

/// Straight-down camera ray above `target`, handy for scripted play
pub fn aim_down_at(target: Vec3) -> Ray {
    Ray::down(target + Vec3::Y * 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Settings;
    use crate::sim::physics::{ColumnWorld, PlaneSurface};
    use crate::sim::state::{PhysicsMode, Stability};
    use crate::Pose;
    use crate::consts::SIM_DT;

    const H: f32 = 0.1;
    // Binary-exact step: cooldowns, grace and delays land on tick boundaries
    const DT: f32 = 0.125;

    struct Rig {
        session: GameSession,
        world: ColumnWorld,
        surface: PlaneSurface,
        events: Vec<GameEvent>,
        dt: f32,
    }

    impl Rig {
        fn new(settings: Settings) -> Self {
            Self::at_dt(settings, DT)
        }

        fn at_dt(settings: Settings, dt: f32) -> Self {
            Self {
                session: GameSession::new(settings).expect("valid settings"),
                world: ColumnWorld::new(H, Some(0.0)).with_floor_extent(1.0),
                surface: PlaneSurface::new(0.0, 1.0),
                events: Vec::new(),
                dt,
            }
        }

        fn step(&mut self, input: TickInput) {
            tick(&mut self.session, &mut self.world, &mut self.surface, &input, self.dt);
            self.events.extend(self.session.drain_events());
        }

        fn idle(&mut self, ticks: usize) {
            for _ in 0..ticks {
                self.step(TickInput::default());
            }
        }

        fn wait_until_placeable(&mut self) {
            for _ in 0..64 {
                if self.session.can_place() {
                    return;
                }
                self.idle(1);
            }
            panic!("placement never became available");
        }

        fn place(&mut self) -> PlaceOutcome {
            request_place(
                &mut self.session,
                &mut self.world,
                &mut self.surface,
                Vec2::ZERO,
                Some(&aim_down_at(Vec3::ZERO)),
            )
        }

        fn place_beside(&mut self) -> PlaceOutcome {
            request_place(
                &mut self.session,
                &mut self.world,
                &mut self.surface,
                Vec2::new(0.9, 0.9),
                None,
            )
        }

        fn start_and_anchor(&mut self) {
            self.step(TickInput {
                start: true,
                ..Default::default()
            });
            assert_eq!(self.session.phase(), GamePhase::AwaitingAnchor);
            self.step(TickInput {
                place: true,
                ..Default::default()
            });
            assert_eq!(self.session.phase(), GamePhase::Active);
        }

        fn stack(&mut self, count: usize) {
            for _ in 0..count {
                self.wait_until_placeable();
                assert!(matches!(self.place(), PlaceOutcome::Stacked { .. }));
                self.idle(1);
            }
        }

        fn count(&self, pred: impl Fn(&GameEvent) -> bool) -> usize {
            self.events.iter().filter(|e| pred(e)).count()
        }
    }

    fn ids(session: &GameSession) -> Vec<BlockId> {
        session.blocks().iter().map(|b| b.id).collect()
    }

    #[test]
    fn test_start_and_anchor() {
        let mut rig = Rig::new(Settings::default());
        assert_eq!(rig.session.phase(), GamePhase::MainMenu);
        rig.start_and_anchor();

        let base = rig.session.blocks().base().cloned().expect("base");
        assert_eq!(base.kind, BlockKind::Base);
        assert_eq!(base.mode, PhysicsMode::Static);
        assert_eq!(base.stability, Stability::Stable);
        assert!((base.position.y - H / 2.0).abs() < 1e-6);
        assert_eq!(rig.session.anchor_height(), Some(base.position.y + H / 2.0));
        assert_eq!(rig.session.score(), 0);
        assert!(rig.session.timer().is_running());
        assert!(!rig.surface.is_enabled());
        assert_eq!(
            rig.count(|e| matches!(e, GameEvent::SurfaceTrackingChanged { enabled: false })),
            1
        );
    }

    #[test]
    fn test_place_in_main_menu_is_noop() {
        let mut rig = Rig::new(Settings::default());
        assert_eq!(rig.place(), PlaceOutcome::Rejected(RejectReason::WrongPhase));
        assert!(rig.session.blocks().is_empty());
        assert!(rig.world.is_empty());
    }

    #[test]
    fn test_anchor_needs_surface() {
        let mut rig = Rig::new(Settings::default());
        rig.step(TickInput {
            start: true,
            ..Default::default()
        });
        // Off-screen point: no surface under it
        let outcome = request_place(
            &mut rig.session,
            &mut rig.world,
            &mut rig.surface,
            Vec2::new(3.0, 0.0),
            None,
        );
        assert_eq!(outcome, PlaceOutcome::Rejected(RejectReason::NoCandidate));
        assert_eq!(rig.session.phase(), GamePhase::AwaitingAnchor);
        assert!(rig.session.blocks().is_empty());
    }

    #[test]
    fn test_cooldown_ignores_double_place() {
        let mut rig = Rig::new(Settings::default());
        rig.start_and_anchor();
        rig.wait_until_placeable();

        assert!(matches!(rig.place(), PlaceOutcome::Stacked { .. }));
        let size = rig.session.blocks().len();
        assert_eq!(rig.place(), PlaceOutcome::Rejected(RejectReason::Cooldown));
        rig.idle(1);
        assert_eq!(rig.place(), PlaceOutcome::Rejected(RejectReason::Cooldown));
        assert_eq!(rig.session.blocks().len(), size);
        assert_eq!(rig.session.score(), 1);

        // Cooldown is 0.5s = 4 ticks
        rig.idle(3);
        assert!(rig.session.can_place());
        assert!(rig.count(|e| matches!(e, GameEvent::PlacementReady)) >= 2);
    }

    #[test]
    fn test_block_stabilizes_and_freezes() {
        let mut rig = Rig::new(Settings::default());
        rig.start_and_anchor();
        rig.wait_until_placeable();

        let PlaceOutcome::Stacked { block, support } = rig.place() else {
            panic!("expected a stacked block");
        };
        assert_eq!(support, rig.session.blocks().base().map(|b| b.id));

        // 4 grace ticks, then 16 still ticks
        rig.idle(19);
        assert_eq!(
            rig.count(|e| matches!(e, GameEvent::BlockStabilized { .. })),
            0
        );
        rig.idle(1);
        assert_eq!(
            rig.count(|e| *e == GameEvent::BlockStabilized { block }),
            1
        );

        let placed = rig.session.blocks().get(block).cloned().expect("stacked");
        assert_eq!(placed.stability, Stability::Stable);
        assert_eq!(placed.mode, PhysicsMode::Static);
        assert_eq!(rig.world.mode(block), Some(BodyMode::Static));
    }

    #[test]
    fn test_combo_prunes_blocks_below_newest() {
        let settings = Settings {
            combo_threshold: 5,
            ..Default::default()
        };
        let mut rig = Rig::new(settings);
        rig.start_and_anchor();
        let base = rig.session.blocks().base().map(|b| b.id).expect("base");

        rig.stack(5);

        assert_eq!(rig.session.score(), 5);
        assert_eq!(rig.session.combo_count(), 0);
        let remaining = ids(&rig.session);
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0], base);
        assert_eq!(rig.count(|e| matches!(e, GameEvent::BlockPruned { .. })), 4);
        assert_eq!(rig.count(|e| matches!(e, GameEvent::ComboTriggered { .. })), 1);
        assert_eq!(rig.session.prune_effects().count(), 4);

        // Effects finish and the bodies leave the world
        rig.idle(6);
        assert_eq!(rig.session.prune_effects().count(), 0);
        assert_eq!(
            rig.count(|e| matches!(e, GameEvent::PruneEffectFinished { .. })),
            4
        );
        assert_eq!(rig.world.len(), 2);

        // Blocks after the combo stack up as usual
        rig.stack(2);
        assert_eq!(rig.session.score(), 7);
        assert_eq!(rig.session.combo_count(), 2);
        assert_eq!(ids(&rig.session).len(), 4);
        assert_eq!(ids(&rig.session)[1], remaining[1]);
        let indices: Vec<usize> = rig.session.blocks().iter().map(|b| b.stack_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_combo_bonus_clamped_in_session() {
        let settings = Settings {
            combo_threshold: 1,
            timer_max: 10.0,
            combo_timer_bonus: 2.0,
            ..Default::default()
        };
        let mut rig = Rig::new(settings);
        rig.start_and_anchor();
        // Anchor tick counted the timer down once; drain to 9.5
        rig.idle(3);
        assert_eq!(rig.session.timer().remaining(), 9.5);

        assert!(matches!(rig.place(), PlaceOutcome::Stacked { .. }));
        assert_eq!(rig.session.timer().remaining(), 10.0);
    }

    #[test]
    fn test_timer_expiry_ends_run() {
        let settings = Settings {
            timer_max: 1.0,
            ..Default::default()
        };
        let mut rig = Rig::new(settings);
        rig.start_and_anchor();

        // 1.0s = 8 ticks including the anchoring tick
        rig.idle(6);
        assert_eq!(rig.session.phase(), GamePhase::Active);
        rig.idle(1);
        assert_eq!(rig.session.phase(), GamePhase::GameOver);
        assert_eq!(rig.session.timer().remaining(), 0.0);
        assert_eq!(
            rig.count(|e| matches!(
                e,
                GameEvent::GameOver {
                    cause: GameOverCause::TimerExpired,
                    ..
                }
            )),
            1
        );

        let size = rig.session.blocks().len();
        assert_eq!(rig.place(), PlaceOutcome::Rejected(RejectReason::WrongPhase));
        assert_eq!(rig.session.blocks().len(), size);
    }

    #[test]
    fn test_misplaced_block_ends_run_once() {
        let settings = Settings {
            hide_surfaces_after_anchor: false,
            falling_to_game_over_delay: 2.0,
            ..Default::default()
        };
        let mut rig = Rig::new(settings);
        rig.start_and_anchor();
        rig.stack(1);
        rig.wait_until_placeable();

        let PlaceOutcome::Misplaced { block } = rig.place_beside() else {
            panic!("expected a misplacement");
        };
        assert_eq!(rig.session.stray_blocks().len(), 1);
        assert_eq!(rig.session.stray_blocks()[0].mode, PhysicsMode::Falling);
        assert!(!rig.session.blocks().contains(block));
        assert_eq!(rig.session.score(), 1);

        // Further placements are refused while it falls
        assert_eq!(rig.place(), PlaceOutcome::Rejected(RejectReason::FallPending));

        // 2.0s = 16 ticks
        rig.idle(15);
        assert_eq!(rig.session.phase(), GamePhase::Active);
        rig.idle(1);
        assert_eq!(rig.session.phase(), GamePhase::GameOver);

        rig.idle(20);
        assert_eq!(
            rig.count(|e| matches!(
                e,
                GameEvent::GameOver {
                    cause: GameOverCause::BlockFell { .. },
                    ..
                }
            )),
            1
        );
        assert_eq!(rig.count(|e| matches!(e, GameEvent::GameOver { .. })), 1);
    }

    #[test]
    fn test_collapse_ends_run() {
        let mut rig = Rig::new(Settings::default());
        rig.start_and_anchor();
        rig.stack(2);
        let top = rig.session.blocks().newest().map(|b| b.id).expect("block");

        // Knock the top block off the table
        rig.world.set_pose(top, Pose::at(Vec3::new(2.0, -0.5, 0.0)));
        rig.idle(1);

        assert_eq!(rig.session.phase(), GamePhase::GameOver);
        assert_eq!(
            rig.count(|e| matches!(
                e,
                GameEvent::GameOver {
                    cause: GameOverCause::Collapse { block },
                    ..
                } if *block == top
            )),
            1
        );
        assert_eq!(rig.session.combo_count(), 0);
        // Remaining blocks are frozen
        assert!(
            rig.session
                .blocks()
                .iter()
                .all(|b| b.mode == PhysicsMode::Static)
        );
    }

    #[test]
    fn test_game_over_cancels_prune_effects() {
        let settings = Settings {
            combo_threshold: 2,
            ..Default::default()
        };
        let mut rig = Rig::new(settings);
        rig.start_and_anchor();
        rig.stack(2);
        assert_eq!(rig.session.prune_effects().count(), 1);

        let newest = rig.session.blocks().newest().map(|b| b.id).expect("block");
        assert!(enter_game_over(
            &mut rig.session,
            &mut rig.world,
            GameOverCause::Collapse { block: newest }
        ));
        assert_eq!(rig.session.prune_effects().count(), 0);
        assert_eq!(rig.world.len(), rig.session.blocks().len());
        // Only once
        assert!(!enter_game_over(
            &mut rig.session,
            &mut rig.world,
            GameOverCause::TimerExpired
        ));
    }

    #[test]
    fn test_restart_clears_everything() {
        let settings = Settings {
            hide_surfaces_after_anchor: false,
            ..Default::default()
        };
        let mut rig = Rig::new(settings);
        rig.start_and_anchor();
        rig.stack(2);
        rig.wait_until_placeable();
        assert!(matches!(rig.place_beside(), PlaceOutcome::Misplaced { .. }));
        rig.idle(16);
        assert_eq!(rig.session.phase(), GamePhase::GameOver);

        rig.step(TickInput {
            restart: true,
            ..Default::default()
        });
        assert_eq!(rig.session.phase(), GamePhase::AwaitingAnchor);
        assert!(rig.session.blocks().is_empty());
        assert!(rig.session.stray_blocks().is_empty());
        assert!(rig.world.is_empty());
        assert_eq!(rig.session.score(), 0);
        assert_eq!(rig.session.combo_count(), 0);
        assert_eq!(rig.session.timer().remaining(), rig.session.settings().timer_max);
        assert!(rig.surface.is_enabled());

        // Nothing scheduled before the restart fires afterwards
        rig.events.clear();
        rig.idle(40);
        assert_eq!(rig.count(|e| matches!(e, GameEvent::GameOver { .. })), 0);
        assert_eq!(rig.session.phase(), GamePhase::AwaitingAnchor);

        // And a new run starts cleanly
        rig.step(TickInput {
            place: true,
            ..Default::default()
        });
        assert_eq!(rig.session.phase(), GamePhase::Active);
        assert_eq!(rig.session.blocks().len(), 1);
    }

    #[test]
    fn test_menu_from_game_over() {
        let settings = Settings {
            timer_max: 0.25,
            ..Default::default()
        };
        let mut rig = Rig::new(settings);
        rig.start_and_anchor();
        rig.idle(1);
        assert_eq!(rig.session.phase(), GamePhase::GameOver);

        // Restart is only valid from game over, start only from the menu
        assert!(!request_start(&mut rig.session, &mut rig.world, &mut rig.surface));
        rig.step(TickInput {
            menu: true,
            ..Default::default()
        });
        assert_eq!(rig.session.phase(), GamePhase::MainMenu);
        assert!(rig.world.is_empty());
        assert!(!rig.surface.is_enabled());
        assert!(!request_restart(&mut rig.session, &mut rig.world, &mut rig.surface));
    }

    #[test]
    fn test_menu_from_awaiting_anchor() {
        let mut rig = Rig::new(Settings::default());
        rig.step(TickInput {
            start: true,
            ..Default::default()
        });
        assert_eq!(rig.session.phase(), GamePhase::AwaitingAnchor);
        assert!(rig.surface.is_enabled());

        rig.step(TickInput {
            menu: true,
            ..Default::default()
        });
        assert_eq!(rig.session.phase(), GamePhase::MainMenu);
        assert!(!rig.surface.is_enabled());
        assert!(rig.session.blocks().is_empty());
        assert!(rig.world.is_empty());
        assert_eq!(
            rig.count(|e| matches!(e, GameEvent::SurfaceTrackingChanged { enabled: false })),
            1
        );
        assert_eq!(
            rig.count(|e| *e
                == GameEvent::PhaseChanged {
                    from: GamePhase::AwaitingAnchor,
                    to: GamePhase::MainMenu
                }),
            1
        );
        assert_eq!(rig.place(), PlaceOutcome::Rejected(RejectReason::WrongPhase));

        // Start works again from the menu
        rig.step(TickInput {
            start: true,
            ..Default::default()
        });
        assert_eq!(rig.session.phase(), GamePhase::AwaitingAnchor);
    }

    #[test]
    fn test_block_stabilizes_on_exact_tick_at_sim_dt() {
        let mut rig = Rig::at_dt(Settings::default(), SIM_DT);
        rig.start_and_anchor();
        rig.wait_until_placeable();

        let PlaceOutcome::Stacked { block, .. } = rig.place() else {
            panic!("expected a stacked block");
        };
        // 0.5s grace + 2.0s still = 150 ticks at 60 Hz
        rig.idle(149);
        assert_eq!(
            rig.count(|e| matches!(e, GameEvent::BlockStabilized { .. })),
            0
        );
        rig.idle(1);
        assert_eq!(
            rig.count(|e| *e == GameEvent::BlockStabilized { block }),
            1
        );
    }

    #[test]
    fn test_fall_delay_on_exact_tick_at_sim_dt() {
        let settings = Settings {
            hide_surfaces_after_anchor: false,
            ..Default::default()
        };
        let mut rig = Rig::at_dt(settings, SIM_DT);
        rig.start_and_anchor();
        rig.wait_until_placeable();
        assert!(matches!(rig.place_beside(), PlaceOutcome::Misplaced { .. }));

        // 2.0s = 120 ticks at 60 Hz
        rig.idle(119);
        assert_eq!(rig.session.phase(), GamePhase::Active);
        rig.idle(1);
        assert_eq!(rig.session.phase(), GamePhase::GameOver);
        assert_eq!(
            rig.count(|e| matches!(
                e,
                GameEvent::GameOver {
                    cause: GameOverCause::BlockFell { .. },
                    ..
                }
            )),
            1
        );
    }

    #[test]
    fn test_single_base_invariant() {
        let settings = Settings {
            combo_threshold: 3,
            ..Default::default()
        };
        let mut rig = Rig::new(settings);
        rig.start_and_anchor();
        rig.stack(7);

        let bases: Vec<&Block> = rig
            .session
            .blocks()
            .iter()
            .filter(|b| b.kind == BlockKind::Base)
            .collect();
        assert_eq!(bases.len(), 1);
        assert_eq!(bases[0].stack_index, 0);
        assert_eq!(bases[0].mode, PhysicsMode::Static);
        assert_eq!(bases[0].stability, Stability::Stable);
        assert!(rig.session.combo_count() < 3);
    }

    #[test]
    fn test_determinism() {
        let run = || {
            let mut rig = Rig::new(Settings::default());
            rig.start_and_anchor();
            rig.stack(6);
            rig.idle(10);
            (
                rig.session.score(),
                rig.session.timer().remaining(),
                ids(&rig.session),
                rig.events.len(),
            )
        };
        assert_eq!(run(), run());
    }
}
