//! Behavior states of a pet and the rules to move between them.
//!
//! The machine itself is pure: `transition` consumes the old state and
//! returns the new one, and the owner ([`super::Pet`]) reacts to whatever
//! state it lands in (animations, timers).
//!
//! ┌──────────────── State Transition Flow ──────────────────────────────┐
//! │  From State          →  Event            →  To State                │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  any                 →  Grab             →  Dragging                │
//! │  Dragging            →  Release          →  Falling                 │
//! │  Falling             →  Land             →  Walking / OnSurface     │
//! │  FallingFromSurface  →  Land             →  Walking                 │
//! │  Walking             →  Doze             →  Sleeping(0)             │
//! │  Sleeping(n)         →  NextSleepPhase   →  Sleeping(n + 1)         │
//! │  Sleeping            →  WakeUp           →  Walking                 │
//! │  Walking             →  Jump             →  Jumping                 │
//! │  Walking             →  JumpToSurface    →  JumpingToSurface        │
//! │  Jumping             →  JumpFinished     →  Walking                 │
//! │  JumpingToSurface    →  JumpFinished     →  WalkingOnSurface        │
//! │  JumpingOffSurface   →  JumpFinished     →  FallingFromSurface      │
//! │  WalkingOnSurface    →  ReachEdge        →  LookingDown             │
//! │  LookingDown         →  TurnBack         →  WalkingOnSurface        │
//! │  LookingDown         →  JumpOff          →  JumpingOffSurface       │
//! │  Walking             →  LoseSupport      →  Falling                 │
//! │  OnSurface / Looking →  LoseSupport      →  FallingFromSurface      │
//! └─────────────────────────────────────────────────────────────────────┘

use super::timers::TimerKind;
use crate::config::BehaviorConfig;
use crate::geometry::Point;

/// A parabolic hop between two points.
/// - x is interpolated linearly
/// - y follows the straight line from `from` to `to`, lifted by an arc that
///   peaks at `height` when progress reaches `peak`
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct JumpArc {
    pub from: Point,
    pub to: Point,
    pub height: f64,
    pub peak: f64,
    pub duration: f64,
    pub elapsed: f64,
}

impl JumpArc {
    pub fn new(from: Point, to: Point, height: f64, peak: f64, duration: f64) -> Self {
        JumpArc {
            from,
            to,
            height,
            peak: peak.clamp(0.05, 0.95),
            duration,
            elapsed: 0.0,
        }
    }

    pub fn progress(&self) -> f64 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }

    pub fn is_done(&self) -> bool {
        self.progress() >= 1.0
    }

    pub fn step(mut self, dt: f64) -> Self {
        self.elapsed += dt;
        self
    }

    pub fn position(&self) -> Point {
        let t = self.progress();
        let span = if t <= self.peak {
            self.peak
        } else {
            1.0 - self.peak
        };
        let lift = 1.0 - ((t - self.peak) / span).powi(2);
        Point {
            x: self.from.x + (self.to.x - self.from.x) * t,
            // y grows downward, so lifting subtracts
            y: self.from.y + (self.to.y - self.from.y) * t - self.height * lift.max(0.0),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum BehaviorState {
    Falling { velocity: f64, bounces: u32 },
    Walking,
    WalkingOnSurface,
    Sleeping { phase: usize },
    Dragging { pointer_offset: Point },
    Jumping(JumpArc),
    JumpingToSurface(JumpArc),
    LookingDown,
    JumpingOffSurface(JumpArc),
    FallingFromSurface { velocity: f64, bounces: u32 },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Event {
    Grab { pointer_offset: Point },
    Release,
    /// New velocity / bounce count after a physics step.
    Fall { velocity: f64, bounces: u32 },
    Land { on_surface: bool },
    Doze,
    NextSleepPhase,
    WakeUp,
    Jump(JumpArc),
    JumpToSurface(JumpArc),
    /// Seconds of jump progress.
    JumpTick(f64),
    JumpFinished,
    ReachEdge,
    TurnBack,
    JumpOff(JumpArc),
    LoseSupport,
}

impl BehaviorState {
    pub fn transition(self, event: Event) -> Self {
        use BehaviorState::*;
        match (self, event) {
            (_, Event::Grab { pointer_offset }) => Dragging { pointer_offset },
            (Dragging { .. }, Event::Release) => Falling {
                velocity: 0.0,
                bounces: 0,
            },
            (Falling { .. }, Event::Fall { velocity, bounces }) => Falling { velocity, bounces },
            (FallingFromSurface { .. }, Event::Fall { velocity, bounces }) => {
                FallingFromSurface { velocity, bounces }
            }
            (Falling { .. }, Event::Land { on_surface: true }) => WalkingOnSurface,
            (Falling { .. } | FallingFromSurface { .. }, Event::Land { .. }) => Walking,
            (Walking, Event::Doze) => Sleeping { phase: 0 },
            (Sleeping { phase }, Event::NextSleepPhase) => Sleeping { phase: phase + 1 },
            (Sleeping { .. }, Event::WakeUp) => Walking,
            (Walking, Event::Jump(arc)) => Jumping(arc),
            (Walking, Event::JumpToSurface(arc)) => JumpingToSurface(arc),
            (Jumping(arc), Event::JumpTick(dt)) => Jumping(arc.step(dt)),
            (JumpingToSurface(arc), Event::JumpTick(dt)) => JumpingToSurface(arc.step(dt)),
            (JumpingOffSurface(arc), Event::JumpTick(dt)) => JumpingOffSurface(arc.step(dt)),
            (Jumping(_), Event::JumpFinished) => Walking,
            (JumpingToSurface(_), Event::JumpFinished) => WalkingOnSurface,
            (JumpingOffSurface(_), Event::JumpFinished) => FallingFromSurface {
                velocity: 0.0,
                bounces: 0,
            },
            (WalkingOnSurface, Event::ReachEdge) => LookingDown,
            (LookingDown, Event::TurnBack) => WalkingOnSurface,
            (LookingDown, Event::JumpOff(arc)) => JumpingOffSurface(arc),
            (Walking, Event::LoseSupport) => Falling {
                velocity: 0.0,
                bounces: 0,
            },
            (WalkingOnSurface | LookingDown, Event::LoseSupport) => FallingFromSurface {
                velocity: 0.0,
                bounces: 0,
            },
            // anything else is not a legal move from this state
            _ => self,
        }
    }

    /// The timers a state runs on; resuming from pause arms exactly these.
    pub fn timers(&self) -> &'static [TimerKind] {
        use BehaviorState::*;
        use TimerKind::*;
        match self {
            Falling { .. } | FallingFromSurface { .. } => &[Frame, Physics],
            Walking => &[Frame, Movement, IdleCheck],
            WalkingOnSurface => &[Frame, Movement],
            Sleeping { .. } | LookingDown | Dragging { .. } => &[Frame],
            Jumping(_) | JumpingToSurface(_) | JumpingOffSurface(_) => &[Frame, Jump],
        }
    }

    pub fn name(&self) -> &'static str {
        use BehaviorState::*;
        match self {
            Falling { .. } => "falling",
            Walking => "walking",
            WalkingOnSurface => "walking_on_surface",
            Sleeping { .. } => "sleeping",
            Dragging { .. } => "dragging",
            Jumping(_) => "jumping",
            JumpingToSurface(_) => "jumping_to_surface",
            LookingDown => "looking_down",
            JumpingOffSurface(_) => "jumping_off_surface",
            FallingFromSurface { .. } => "falling_from_surface",
        }
    }
}

/// Result of one gravity step.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum FallStep {
    Airborne { y: f64, velocity: f64, bounces: u32 },
    Landed { y: f64 },
}

/// Gravity and bounce constants pulled from the config.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Physics {
    pub gravity: f64,
    pub damping: f64,
    pub max_bounces: u32,
    pub min_velocity: f64,
}

impl From<&BehaviorConfig> for Physics {
    fn from(config: &BehaviorConfig) -> Self {
        Physics {
            gravity: config.gravity,
            damping: config.bounce_damping,
            max_bounces: config.max_bounces,
            min_velocity: config.min_bounce_velocity,
        }
    }
}

impl Physics {
    /// Integrates one step of a fall towards `rest_y` (the y at which the
    /// body touches the plane).
    /// - crossing the plane reflects the velocity with damping
    /// - the fall ends when bounces exceed the cap or the rebound is weak
    pub fn step(&self, y: f64, velocity: f64, bounces: u32, rest_y: f64) -> FallStep {
        let velocity = velocity + self.gravity;
        let y = y + velocity;
        if y < rest_y {
            return FallStep::Airborne {
                y,
                velocity,
                bounces,
            };
        }
        let bounces = bounces + 1;
        let rebound = velocity.abs() * self.damping;
        if bounces > self.max_bounces || rebound < self.min_velocity {
            FallStep::Landed { y: rest_y }
        } else {
            FallStep::Airborne {
                y: rest_y,
                velocity: -rebound,
                bounces,
            }
        }
    }
}
