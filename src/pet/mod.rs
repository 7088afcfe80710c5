//! The main pet: a [`BehaviorState`] plus the timers, playback and physics
//! that make it move.
//!
//! Nothing in here blocks or sleeps. The host calls [`Pet::update`] with the
//! elapsed time, every due timer fires in order, and each handler re-arms
//! whatever the current state still needs :
//!
//! ┌──────────────── Timer handlers ─────────────────────────────────┐
//! │  Frame      advance playback, completion picks what plays next  │
//! │  Physics    gravity step, bounce, land                          │
//! │  Movement   walk along the ground or a surface, edges           │
//! │  Jump       follow the jump arc, land                           │
//! │  IdleCheck  doze off after too long without interaction         │
//! └─────────────────────────────────────────────────────────────────┘
pub mod companion;
pub mod state;
pub mod timers;

use self::companion::{CompanionId, CompanionRegistry};
use self::state::{BehaviorState, Event, FallStep, JumpArc, Physics};
use self::timers::{Scheduler, TimerKind, TimerQueue, Timers};
use crate::config::{secs, BehaviorConfig};
use crate::expression::{evaluate, ExpressionVariables};
use crate::geometry::{Facing, GeometryProvider, Point, Rect, Size, Surface};
use crate::random::RandomSource;
use crate::sprite::playback::{
    select_next_animation, select_transition, select_weighted, Advance, Playback,
};
use crate::sprite::{AnimationDescriptor, PetDefinition, UNIVERSAL_SCOPE};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::VecDeque;
use std::mem::discriminant;
use std::rc::Rc;
use std::time::Duration;

/// Border transitions may be scoped to the side walls.
const BORDER_SCOPE: &str = "vertical";

/// Companions spawned from one trigger, nested spawns included.
const MAX_SPAWNS_PER_BURST: usize = 32;

/// What to do when a non-looping animation finishes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Completion {
    WalkCycle,
    Chain,
    Run,
    Sleep,
    LookDown,
    Land,
}

/// Configured animation roles.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Role {
    Walk,
    Run,
    IdleA,
    IdleB,
    Fall,
    Drag,
    Jump,
    Land,
    LookDown,
    Sleep(usize),
}

/// What a renderer (or a debugging tool) needs to know about the pet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PetSnapshot {
    pub frame: Option<u32>,
    pub x: f64,
    pub y: f64,
    pub offset_y: f64,
    pub facing: Facing,
    pub behavior: &'static str,
    pub animation: Option<String>,
    pub paused: bool,
    pub companions: usize,
}

pub struct Pet<S: Scheduler = TimerQueue> {
    definition: Rc<PetDefinition>,
    config: BehaviorConfig,
    physics: Physics,
    geometry: Box<dyn GeometryProvider>,
    random: Box<dyn RandomSource>,
    state: BehaviorState,
    playback: Playback<Completion>,
    timers: Timers<S>,
    companions: CompanionRegistry<S>,
    position: Point,
    size: Size,
    facing: Facing,
    last_interaction: Duration,
    paused: Option<BehaviorState>,
    landing: bool,
}

impl<S: Scheduler + Default> Pet<S> {
    pub fn new(
        definition: Rc<PetDefinition>,
        config: BehaviorConfig,
        geometry: Box<dyn GeometryProvider>,
        random: Box<dyn RandomSource>,
        scheduler: S,
    ) -> Self {
        Pet {
            physics: Physics::from(&config),
            size: config.pet_size,
            definition,
            config,
            geometry,
            random,
            state: BehaviorState::Falling {
                velocity: 0.0,
                bounces: 0,
            },
            playback: Playback::new(),
            timers: Timers::new(scheduler),
            companions: CompanionRegistry::new(),
            position: Point::default(),
            facing: Facing::default(),
            last_interaction: Duration::ZERO,
            paused: None,
            landing: false,
        }
    }

    /// First appearance : a weighted pick among the declared spawn points,
    /// or a random spot along the top of the work area without any.
    pub fn appear(&mut self) {
        let definition = Rc::clone(&self.definition);
        let spawn = select_weighted(&definition.spawns, |spawn| spawn.weight, &mut *self.random);
        match spawn {
            Some(spawn) => {
                let variables = self.variables();
                let position =
                    Point::new(evaluate(&spawn.x, &variables), evaluate(&spawn.y, &variables));
                info!("pet appears at spawn '{}' ({}, {})", spawn.id, position.x, position.y);
                self.place_at(position);
                if let Some(descriptor) = definition.animation(&spawn.next).cloned() {
                    self.play(descriptor, true, None);
                }
            }
            None => {
                let area = self.geometry.work_area();
                let max_x = (area.right() - self.size.width).max(area.left());
                let x = self.random.range(area.left() as i64, max_x as i64) as f64;
                info!("pet appears at ({}, {})", x, area.top());
                self.place_at(Point::new(x, area.top()));
            }
        }
    }

    /// Drops the pet at `position`; it falls from there.
    pub fn place_at(&mut self, position: Point) {
        self.timers.disarm_all();
        self.paused = None;
        self.landing = false;
        self.position = position;
        self.last_interaction = self.timers.now();
        self.state = BehaviorState::Falling {
            velocity: 0.0,
            bounces: 0,
        };
        self.enter();
    }

    /// Fires every timer due within the next `elapsed` and advances the
    /// companions by the same amount.
    pub fn update(&mut self, elapsed: Duration) {
        let deadline = self.timers.now() + elapsed;
        while let Some(kind) = self.timers.next_fired(deadline) {
            self.on_timer(kind);
        }

        let definition = Rc::clone(&self.definition);
        let triggers =
            self.companions
                .update(elapsed, &definition, &mut *self.random, &self.config);
        self.fire_child_rules(triggers);
    }

    pub fn pointer_down(&mut self, pointer: Point) {
        if self.is_paused() {
            return;
        }
        self.record_interaction();
        let pointer_offset = pointer.offset_from(self.position);
        self.apply(Event::Grab { pointer_offset });
    }

    pub fn pointer_moved(&mut self, pointer: Point) {
        if self.is_paused() {
            return;
        }
        if let BehaviorState::Dragging { pointer_offset } = self.state {
            self.position = pointer.offset_from(pointer_offset);
        }
    }

    pub fn pointer_up(&mut self) {
        if self.is_paused() {
            return;
        }
        if matches!(self.state, BehaviorState::Dragging { .. }) {
            self.record_interaction();
            self.apply(Event::Release);
        }
    }

    /// Freezes the pet in place. Calling it again does nothing.
    pub fn pause(&mut self) {
        if self.paused.is_some() {
            return;
        }
        debug!("pausing pet while {}", self.state.name());
        self.paused = Some(self.state);
        self.timers.disarm_all();
    }

    /// Restores the state captured by [`Pet::pause`] and re-arms exactly the
    /// timers it runs on. Calling it while running does nothing.
    pub fn resume(&mut self) {
        let Some(snapshot) = self.paused.take() else {
            return;
        };
        debug!("resuming pet while {}", snapshot.name());
        self.state = snapshot;
        self.record_interaction();
        for &kind in self.state.timers() {
            self.arm(kind);
        }
    }

    pub fn record_interaction(&mut self) {
        self.last_interaction = self.timers.now();
    }

    /// Cancels every timer of the pet and closes all companions.
    pub fn shutdown(&mut self) {
        self.timers.disarm_all();
        self.playback.stop();
        self.companions.close_all();
    }

    pub fn close_companion(&mut self, id: CompanionId) -> bool {
        self.companions.close(id)
    }

    pub fn set_size(&mut self, size: Size) {
        self.size = size;
    }

    /// Is `point` over the pet's sprite cell?
    pub fn hit_test(&self, point: Point) -> bool {
        self.bounds().contains(point)
    }

    pub fn bounds(&self) -> Rect {
        Rect {
            position: self.position,
            size: self.size,
        }
    }

    pub fn state(&self) -> BehaviorState {
        self.state
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn is_paused(&self) -> bool {
        self.paused.is_some()
    }

    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    pub fn definition(&self) -> &PetDefinition {
        &self.definition
    }

    pub fn companions(&self) -> &CompanionRegistry<S> {
        &self.companions
    }

    pub fn armed_timers(&self) -> Vec<TimerKind> {
        self.timers.armed()
    }

    pub fn animation_id(&self) -> Option<&str> {
        self.playback
            .descriptor()
            .map(|descriptor| descriptor.id.as_str())
    }

    pub fn current_frame_number(&self) -> Option<u32> {
        self.playback.current_frame_number()
    }

    pub fn current_interval(&self) -> f64 {
        self.playback.current_interval()
    }

    pub fn current_offset_y(&self) -> f64 {
        self.playback.current_offset_y()
    }

    pub fn current_move_x(&self) -> f64 {
        self.playback.current_move_x()
    }

    pub fn current_move_y(&self) -> f64 {
        self.playback.current_move_y()
    }

    pub fn snapshot(&self) -> PetSnapshot {
        PetSnapshot {
            frame: self.current_frame_number(),
            x: self.position.x,
            y: self.position.y,
            offset_y: self.current_offset_y(),
            facing: self.facing,
            behavior: self.state.name(),
            animation: self.animation_id().map(str::to_owned),
            paused: self.is_paused(),
            companions: self.companions.len(),
        }
    }

    fn apply(&mut self, event: Event) {
        let previous = self.state;
        self.state = previous.transition(event);
        if discriminant(&previous) != discriminant(&self.state) {
            debug!("pet {} -> {}", previous.name(), self.state.name());
            self.timers.disarm_all();
            self.enter();
        }
    }

    /// Starts the animation and timers of the state just entered.
    fn enter(&mut self) {
        for &kind in self.state.timers() {
            if kind != TimerKind::Frame {
                self.arm(kind);
            }
        }
        match self.state {
            BehaviorState::Falling { .. } | BehaviorState::FallingFromSurface { .. } => {
                self.play_role(Role::Fall, true, None);
            }
            BehaviorState::Walking | BehaviorState::WalkingOnSurface => {
                let landing = std::mem::take(&mut self.landing);
                if !(landing && self.play_role(Role::Land, false, Some(Completion::Land))) {
                    self.walk();
                }
            }
            BehaviorState::Sleeping { phase } => self.play_sleep(phase),
            BehaviorState::Dragging { .. } => {
                self.play_role(Role::Drag, true, None);
            }
            BehaviorState::Jumping(_)
            | BehaviorState::JumpingToSurface(_)
            | BehaviorState::JumpingOffSurface(_) => {
                self.play_role(Role::Jump, true, None);
            }
            BehaviorState::LookingDown => {
                if !self.play_role(Role::LookDown, false, Some(Completion::LookDown)) {
                    self.after_look_down();
                }
            }
        }
    }

    fn arm(&mut self, kind: TimerKind) {
        let delay = match kind {
            TimerKind::Frame => secs(self.playback.current_interval()),
            TimerKind::Physics => secs(self.config.physics_tick_secs),
            TimerKind::Movement => secs(self.config.movement_tick_secs),
            TimerKind::Jump => secs(self.config.jump_tick_secs),
            TimerKind::IdleCheck => secs(self.config.idle_check_secs),
            // only companions close themselves
            TimerKind::Close => return,
        };
        self.timers.arm(kind, delay);
    }

    fn on_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Frame => self.on_frame(),
            TimerKind::Physics => self.on_physics(),
            TimerKind::Movement => self.on_movement(),
            TimerKind::Jump => self.on_jump(),
            TimerKind::IdleCheck => self.on_idle_check(),
            // never armed for the main pet, see `arm`
            TimerKind::Close => {}
        }
    }

    fn on_frame(&mut self) {
        match self.playback.advance(&mut *self.random) {
            Advance::Stepped | Advance::Repeated => self.arm(TimerKind::Frame),
            Advance::Restarted => {
                self.arm(TimerKind::Frame);
                self.spawn_children();
            }
            Advance::Completed(Some(completion)) => self.on_complete(completion),
            Advance::Completed(None) | Advance::Idle => {}
        }
    }

    /// Each handler checks the state first : an animation left over from a
    /// state without its own animation may still complete.
    fn on_complete(&mut self, completion: Completion) {
        match completion {
            Completion::WalkCycle => self.after_walk_cycle(),
            Completion::Chain => self.after_chain(),
            Completion::Run => {
                let jumped = self.random.chance(self.config.jump_chance) && self.start_jump();
                if !jumped {
                    self.walk();
                }
            }
            Completion::Sleep => self.after_sleep_phase(),
            Completion::LookDown => self.after_look_down(),
            Completion::Land => self.walk(),
        }
    }

    fn is_walking(&self) -> bool {
        matches!(
            self.state,
            BehaviorState::Walking | BehaviorState::WalkingOnSurface
        )
    }

    /// Walk cycle done : follow its transitions, and if they lead back into
    /// the walk, roll for an idle action, then for a run.
    fn after_walk_cycle(&mut self) {
        if !self.is_walking() {
            return;
        }
        if let Some(current) = self.playback.descriptor().cloned() {
            let next = select_next_animation(&current.next, &mut *self.random).map(str::to_owned);
            if let Some(id) = next.filter(|id| *id != current.id) {
                if self.play_id(&id, Completion::Chain) {
                    return;
                }
            }
        }
        if self.random.chance(self.config.idle_a_chance)
            && self.play_role(Role::IdleA, false, Some(Completion::Chain))
        {
            return;
        }
        if self.random.chance(self.config.idle_b_chance)
            && self.play_role(Role::IdleB, false, Some(Completion::Chain))
        {
            return;
        }
        if self.random.chance(self.config.run_chance)
            && self.play_role(Role::Run, false, Some(Completion::Run))
        {
            return;
        }
        self.walk();
    }

    /// A chained animation finished : its own transitions pick what follows,
    /// the walk cycle otherwise.
    fn after_chain(&mut self) {
        if !self.is_walking() {
            return;
        }
        let next = self.playback.descriptor().cloned().and_then(|current| {
            select_next_animation(&current.next, &mut *self.random).map(str::to_owned)
        });
        if let Some(id) = next {
            if !self.is_walk(&id) && self.play_id(&id, Completion::Chain) {
                return;
            }
        }
        self.walk();
    }

    fn walk(&mut self) {
        if self.is_walking() {
            self.play_role(Role::Walk, false, Some(Completion::WalkCycle));
        }
    }

    fn is_walk(&self, id: &str) -> bool {
        self.role_descriptor(Role::Walk)
            .is_some_and(|walk| walk.id == id)
    }

    fn play_sleep(&mut self, phase: usize) {
        if phase >= self.config.animations.sleep.len() {
            self.wake_up();
        } else if !self.play_role(Role::Sleep(phase), false, Some(Completion::Sleep)) {
            self.after_sleep_phase();
        }
    }

    fn after_sleep_phase(&mut self) {
        let BehaviorState::Sleeping { phase } = self.state else {
            return;
        };
        if phase + 1 < self.config.animations.sleep.len() {
            self.apply(Event::NextSleepPhase);
            self.play_sleep(phase + 1);
        } else {
            self.wake_up();
        }
    }

    fn wake_up(&mut self) {
        self.record_interaction();
        self.apply(Event::WakeUp);
    }

    /// At the edge of a surface : turn around, or hop off.
    fn after_look_down(&mut self) {
        if self.state != BehaviorState::LookingDown {
            return;
        }
        if !self.is_supported() {
            return self.lose_support();
        }
        if self.random.chance(self.config.look_down_reverse_chance) {
            self.facing = self.facing.reversed();
            self.apply(Event::TurnBack);
            return;
        }
        let from = self.position;
        let to = Point::new(
            from.x + self.facing.sign() * self.config.jump_off_distance,
            from.y,
        );
        let arc = JumpArc::new(
            from,
            to,
            self.config.jump_off_height,
            self.config.jump_off_peak,
            self.config.jump_duration_secs,
        );
        self.apply(Event::JumpOff(arc));
    }

    /// Jumps from the ground, onto the surface above when there is one.
    fn start_jump(&mut self) -> bool {
        if self.state != BehaviorState::Walking {
            return false;
        }
        let from = self.position;
        let reach = from.x + self.facing.sign() * self.config.jump_distance;
        let surface = self
            .geometry
            .surface()
            .filter(|surface| surface.supports(from.x, self.size.width))
            .filter(|surface| surface.top() < from.y + self.size.height);

        let event = match surface {
            Some(surface) => {
                let to = Point::new(
                    reach.clamp(surface.bounds.left(), surface.bounds.right() - self.size.width),
                    surface.top() - self.size.height,
                );
                Event::JumpToSurface(self.jump_arc(from, to))
            }
            None => {
                let area = self.geometry.work_area();
                let max_x = (area.right() - self.size.width).max(area.left());
                let to = Point::new(reach.clamp(area.left(), max_x), from.y);
                Event::Jump(self.jump_arc(from, to))
            }
        };
        self.apply(event);
        true
    }

    fn jump_arc(&self, from: Point, to: Point) -> JumpArc {
        JumpArc::new(
            from,
            to,
            self.config.jump_height,
            0.5,
            self.config.jump_duration_secs,
        )
    }

    fn on_jump(&mut self) {
        self.apply(Event::JumpTick(self.config.jump_tick_secs));
        let arc = match self.state {
            BehaviorState::Jumping(arc)
            | BehaviorState::JumpingToSurface(arc)
            | BehaviorState::JumpingOffSurface(arc) => arc,
            _ => return,
        };
        self.position = arc.position();
        if arc.is_done() {
            self.landing = true;
            self.apply(Event::JumpFinished);
            self.landing = false;
        } else {
            self.arm(TimerKind::Jump);
        }
    }

    fn on_physics(&mut self) {
        let (velocity, bounces, from_surface) = match self.state {
            BehaviorState::Falling { velocity, bounces } => (velocity, bounces, false),
            BehaviorState::FallingFromSurface { velocity, bounces } => (velocity, bounces, true),
            _ => return,
        };
        let (rest_y, on_surface) = self.landing_plane(from_surface);
        match self.physics.step(self.position.y, velocity, bounces, rest_y) {
            FallStep::Airborne {
                y,
                velocity,
                bounces,
            } => {
                self.position.y = y;
                self.apply(Event::Fall { velocity, bounces });
                self.arm(TimerKind::Physics);
            }
            FallStep::Landed { y } => {
                self.position.y = y;
                self.landing = true;
                self.apply(Event::Land { on_surface });
                self.landing = false;
            }
        }
    }

    /// Where a fall from the current spot comes to rest (top-left y), and
    /// whether that is the surface.
    /// - the surface only catches a pet fully over it and not below its top
    /// - a pet that hopped off the surface always falls to the ground
    fn landing_plane(&self, from_surface: bool) -> (f64, bool) {
        let ground = self.geometry.work_area().bottom() - self.size.height;
        if !from_surface {
            if let Some(surface) = self.geometry.surface() {
                let rest = surface.top() - self.size.height;
                if surface.supports(self.position.x, self.size.width) && self.position.y <= rest {
                    return (rest, true);
                }
            }
        }
        (ground, false)
    }

    fn on_movement(&mut self) {
        let interval = self.playback.current_interval();
        let ratio = if interval > 0.0 {
            self.config.movement_tick_secs / interval
        } else {
            1.0
        };
        self.position.x += self.playback.current_move_x() * self.facing.sign() * ratio;

        match self.state {
            BehaviorState::Walking => self.walk_ground(),
            BehaviorState::WalkingOnSurface => self.walk_surface(),
            _ => return,
        }
        if self.state.timers().contains(&TimerKind::Movement)
            && !self.timers.is_armed(TimerKind::Movement)
        {
            self.arm(TimerKind::Movement);
        }
    }

    fn walk_ground(&mut self) {
        let area = self.geometry.work_area();
        self.position.y = area.bottom() - self.size.height;
        let max_x = (area.right() - self.size.width).max(area.left());
        let at_border = match self.facing {
            Facing::Left if self.position.x <= area.left() => {
                self.position.x = area.left();
                true
            }
            Facing::Right if self.position.x >= max_x => {
                self.position.x = max_x;
                true
            }
            _ => false,
        };
        if at_border {
            self.turn_at_border();
        }
    }

    fn turn_at_border(&mut self) {
        self.facing = self.facing.reversed();
        let target = self.playback.descriptor().cloned().and_then(|current| {
            select_transition(
                &current.border,
                |scope| scope == UNIVERSAL_SCOPE || scope == BORDER_SCOPE,
                &mut *self.random,
            )
            .map(str::to_owned)
        });
        if let Some(id) = target {
            debug!("border reached, playing '{}'", id);
            self.play_id(&id, Completion::Chain);
        }
    }

    /// Is there still a walkable surface under the pet's center?
    fn is_supported(&self) -> bool {
        let center = self.position.x + self.size.width / 2.0;
        self.geometry
            .surface()
            .filter(Surface::is_walkable)
            .is_some_and(|surface| {
                center >= surface.bounds.left() && center <= surface.bounds.right()
            })
    }

    fn walk_surface(&mut self) {
        if !self.is_supported() {
            return self.lose_support();
        }
        let Some(surface) = self.geometry.surface() else {
            return;
        };
        self.position.y = surface.top() - self.size.height;
        let left = surface.bounds.left();
        let right = (surface.bounds.right() - self.size.width).max(left);
        let at_edge = match self.facing {
            Facing::Left if self.position.x <= left => {
                self.position.x = left;
                true
            }
            Facing::Right if self.position.x >= right => {
                self.position.x = right;
                true
            }
            _ => false,
        };
        if at_edge {
            self.apply(Event::ReachEdge);
        }
    }

    fn lose_support(&mut self) {
        let gravity = self.playback.descriptor().cloned().and_then(|current| {
            select_next_animation(&current.gravity, &mut *self.random).map(str::to_owned)
        });
        self.apply(Event::LoseSupport);
        if let Some(descriptor) = gravity.and_then(|id| self.definition.animation(&id).cloned()) {
            self.play(descriptor, true, None);
        }
    }

    fn on_idle_check(&mut self) {
        if self.state != BehaviorState::Walking {
            return;
        }
        let idle = self.timers.now().saturating_sub(self.last_interaction);
        if idle >= secs(self.config.idle_timeout_secs) {
            info!("pet dozes off after {:?} without interaction", idle);
            self.apply(Event::Doze);
        } else {
            self.arm(TimerKind::IdleCheck);
        }
    }

    fn role_key(&self, role: Role) -> Option<&str> {
        let roles = &self.config.animations;
        let key = match role {
            Role::Walk => &roles.walk,
            Role::Run => &roles.run,
            Role::IdleA => &roles.idle_a,
            Role::IdleB => &roles.idle_b,
            Role::Fall => &roles.fall,
            Role::Drag => &roles.drag,
            Role::Jump => &roles.jump,
            Role::Land => &roles.land,
            Role::LookDown => &roles.look_down,
            Role::Sleep(phase) => roles.sleep.get(phase)?,
        };
        Some(key.as_str())
    }

    fn role_descriptor(&self, role: Role) -> Option<Rc<AnimationDescriptor>> {
        self.role_key(role)
            .and_then(|key| self.definition.resolve(key))
            .cloned()
    }

    /// Plays the animation configured for `role`. Without one the current
    /// animation stays as it is and false is returned.
    fn play_role(&mut self, role: Role, looping: bool, completion: Option<Completion>) -> bool {
        match self.role_descriptor(role) {
            Some(descriptor) => {
                self.play(descriptor, looping, completion);
                true
            }
            None => {
                debug!("no animation for role {:?}", role);
                false
            }
        }
    }

    fn play_id(&mut self, id: &str, completion: Completion) -> bool {
        match self.definition.animation(id).cloned() {
            Some(descriptor) => {
                self.play(descriptor, false, Some(completion));
                true
            }
            None => {
                debug!("transition to unknown animation '{}' ignored", id);
                false
            }
        }
    }

    fn play(
        &mut self,
        descriptor: Rc<AnimationDescriptor>,
        looping: bool,
        completion: Option<Completion>,
    ) {
        self.playback
            .start(descriptor, looping, completion, &mut *self.random);
        self.arm(TimerKind::Frame);
        self.spawn_children();
    }

    fn spawn_children(&mut self) {
        let trigger = self.playback.take_spawn();
        self.fire_child_rules(trigger);
    }

    /// Spawns the companions of every trigger, then those of the animations
    /// the new companions start with, breadth first.
    /// - at most [`MAX_SPAWNS_PER_BURST`] companions per call, cyclic rules
    ///   included
    fn fire_child_rules(&mut self, triggers: impl IntoIterator<Item = String>) {
        let definition = Rc::clone(&self.definition);
        let mut pending: VecDeque<String> = triggers.into_iter().collect();
        let mut spawned = 0;
        while let Some(trigger) = pending.pop_front() {
            for rule in definition.children_of(&trigger) {
                let Some(descriptor) = definition.animation(&rule.spawn).cloned() else {
                    warn!(
                        "child rule of '{}' names unknown animation '{}'",
                        rule.trigger, rule.spawn
                    );
                    continue;
                };
                if spawned == MAX_SPAWNS_PER_BURST {
                    warn!("child rules of '{}' keep spawning, stopping here", trigger);
                    return;
                }
                let variables = self.variables();
                let position =
                    Point::new(evaluate(&rule.x, &variables), evaluate(&rule.y, &variables));
                let (_, nested) =
                    self.companions
                        .spawn(descriptor, position, self.facing, &mut *self.random);
                spawned += 1;
                pending.extend(nested);
            }
        }
    }

    /// Expression variables for one spawn event; both random values are
    /// rolled here, once.
    fn variables(&mut self) -> ExpressionVariables {
        let screen = self.geometry.screen();
        let area = self.geometry.work_area();
        ExpressionVariables {
            screen_width: screen.size.width,
            screen_height: screen.size.height,
            area_width: area.size.width,
            area_height: area.size.height,
            image_x: self.position.x,
            image_y: self.position.y,
            image_width: self.size.width,
            image_height: self.size.height,
            random: self.random.percent() as f64,
            random_second: self.random.percent() as f64,
        }
    }
}
