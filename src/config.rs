//! Tunables for the behavior state machine.
//!
//! Every field has a default so a partial `pet-config.json` is enough :
//! `{ "idle_timeout_secs": 30, "animations": { "walk": "stroll" } }`
use crate::geometry::Size;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Names (or ids) of the animations each behavior plays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationRoles {
    pub walk: String,
    pub run: String,
    pub idle_a: String,
    pub idle_b: String,
    pub fall: String,
    pub drag: String,
    pub jump: String,
    pub land: String,
    pub look_down: String,
    /// Played in order while asleep.
    pub sleep: Vec<String>,
}

impl Default for AnimationRoles {
    fn default() -> Self {
        AnimationRoles {
            walk: "walk".to_string(),
            run: "run".to_string(),
            idle_a: "sit".to_string(),
            idle_b: "eat".to_string(),
            fall: "fall".to_string(),
            drag: "drag".to_string(),
            jump: "jump".to_string(),
            land: "land".to_string(),
            look_down: "look down".to_string(),
            sleep: vec![
                "sleep1".to_string(),
                "sleep2".to_string(),
                "sleep3".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Seconds between physics steps while falling.
    pub physics_tick_secs: f64,
    /// Added to the fall velocity every physics step (px / step).
    pub gravity: f64,
    /// Fraction of velocity kept after a bounce.
    pub bounce_damping: f64,
    /// A fall ends once this many bounces have been exceeded.
    pub max_bounces: u32,
    /// ... or once a bounce leaves less velocity than this.
    pub min_bounce_velocity: f64,
    /// Seconds between movement steps while walking.
    pub movement_tick_secs: f64,
    /// Seconds between checks of the idle timeout.
    pub idle_check_secs: f64,
    /// Seconds without interaction before the pet falls asleep.
    pub idle_timeout_secs: f64,
    /// Independent percentage rolls made when the walk cycle repeats, in
    /// priority order : idle A, idle B, run.
    pub idle_a_chance: u32,
    pub idle_b_chance: u32,
    pub run_chance: u32,
    /// Percentage roll after each run cycle.
    pub jump_chance: u32,
    /// Percentage roll after looking down : reverse, otherwise jump off.
    pub look_down_reverse_chance: u32,
    /// Seconds between jump arc updates.
    pub jump_tick_secs: f64,
    pub jump_duration_secs: f64,
    pub jump_height: f64,
    pub jump_distance: f64,
    /// Where along a jump-off the arc peaks (0..1).
    pub jump_off_peak: f64,
    pub jump_off_height: f64,
    pub jump_off_distance: f64,
    /// Seconds a finished companion lingers before it closes.
    pub companion_close_delay_secs: f64,
    /// Used until the host reports the real sprite cell size.
    pub pet_size: Size,
    pub animations: AnimationRoles,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        BehaviorConfig {
            physics_tick_secs: 1.0 / 60.0,
            gravity: 0.6,
            bounce_damping: 0.45,
            max_bounces: 2,
            min_bounce_velocity: 2.5,
            movement_tick_secs: 0.05,
            idle_check_secs: 1.0,
            idle_timeout_secs: 120.0,
            idle_a_chance: 4,
            idle_b_chance: 4,
            run_chance: 8,
            jump_chance: 20,
            look_down_reverse_chance: 50,
            jump_tick_secs: 1.0 / 60.0,
            jump_duration_secs: 0.7,
            jump_height: 60.0,
            jump_distance: 120.0,
            jump_off_peak: 0.3,
            jump_off_height: 30.0,
            jump_off_distance: 40.0,
            companion_close_delay_secs: 0.5,
            pet_size: Size {
                width: 40.0,
                height: 40.0,
            },
            animations: AnimationRoles::default(),
        }
    }
}

/// Seconds to a `Duration`, clamping junk (negative / NaN) to zero.
pub fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn junk_durations_clamp_to_zero() {
        assert_eq!(secs(-1.0), Duration::ZERO);
        assert_eq!(secs(f64::NAN), Duration::ZERO);
        assert_eq!(secs(0.25), Duration::from_millis(250));
    }
}
