//! Companions: short-lived secondary characters spawned by child rules.
//!
//! A companion plays its animation chain at a fixed spot (plus the
//! animation's own movement) and closes itself once the chain runs out.
//! The registry hands out generational ids, so a stale id can never reach a
//! recycled slot, and closing twice is harmless.
use super::timers::{Scheduler, TimerKind, Timers};
use crate::config::{secs, BehaviorConfig};
use crate::geometry::{Facing, Point};
use crate::random::RandomSource;
use crate::sprite::playback::{select_next_animation, Advance, Playback};
use crate::sprite::{AnimationDescriptor, PetDefinition};
use log::debug;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CompanionId {
    index: usize,
    generation: u32,
}

#[derive(Debug)]
pub struct Companion<S> {
    playback: Playback<()>,
    position: Point,
    facing: Facing,
    timers: Timers<S>,
}

impl<S: Scheduler> Companion<S> {
    fn new(scheduler: S, position: Point, facing: Facing) -> Self {
        Companion {
            playback: Playback::new(),
            position,
            facing,
            timers: Timers::new(scheduler),
        }
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn current_frame_number(&self) -> Option<u32> {
        self.playback.current_frame_number()
    }

    pub fn current_offset_y(&self) -> f64 {
        self.playback.current_offset_y()
    }

    pub fn animation_id(&self) -> Option<&str> {
        self.playback
            .descriptor()
            .map(|descriptor| descriptor.id.as_str())
    }

    pub fn armed_timers(&self) -> Vec<TimerKind> {
        self.timers.armed()
    }

    /// Starts `descriptor`; returns the trigger id whose child rules fire now.
    fn play(
        &mut self,
        descriptor: Rc<AnimationDescriptor>,
        random: &mut dyn RandomSource,
    ) -> Option<String> {
        self.playback.start(descriptor, false, Some(()), random);
        self.arm_frame();
        self.playback.take_spawn()
    }

    fn arm_frame(&mut self) {
        self.timers
            .arm(TimerKind::Frame, secs(self.playback.current_interval()));
    }

    fn step(&mut self) {
        self.position.x += self.playback.current_move_x() * self.facing.sign();
        self.position.y += self.playback.current_move_y();
    }

    /// Runs the companion's due timers.
    /// - returns trigger ids whose child rules should fire, and whether the
    ///   companion asked to be closed
    fn update(
        &mut self,
        elapsed: Duration,
        definition: &PetDefinition,
        random: &mut dyn RandomSource,
        close_delay: Duration,
    ) -> (Vec<String>, bool) {
        let mut spawns = Vec::new();
        let deadline = self.timers.now() + elapsed;
        while let Some(kind) = self.timers.next_fired(deadline) {
            match kind {
                TimerKind::Close => return (spawns, true),
                TimerKind::Frame => match self.playback.advance(random) {
                    Advance::Stepped | Advance::Repeated | Advance::Restarted => {
                        self.step();
                        self.arm_frame();
                    }
                    Advance::Completed(_) => {
                        let next = self
                            .playback
                            .descriptor()
                            .and_then(|current| select_next_animation(&current.next, random))
                            .and_then(|id| definition.animation(id))
                            .cloned();
                        match next {
                            Some(descriptor) => spawns.extend(self.play(descriptor, random)),
                            None => self.timers.arm(TimerKind::Close, close_delay),
                        }
                    }
                    Advance::Idle => {}
                },
                _ => {}
            }
        }
        (spawns, false)
    }

    fn teardown(&mut self) {
        self.timers.disarm_all();
        self.playback.stop();
    }
}

#[derive(Debug)]
struct Slot<S> {
    generation: u32,
    companion: Option<Companion<S>>,
}

/// Owner of every live companion of one pet.
#[derive(Debug)]
pub struct CompanionRegistry<S> {
    slots: Vec<Slot<S>>,
    free: Vec<usize>,
}

impl<S> Default for CompanionRegistry<S> {
    fn default() -> Self {
        CompanionRegistry {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<S: Scheduler + Default> CompanionRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a companion playing `descriptor` at `position`.
    /// - also returns the trigger id of the animation it just started, whose
    ///   child rules the caller fires right away
    pub fn spawn(
        &mut self,
        descriptor: Rc<AnimationDescriptor>,
        position: Point,
        facing: Facing,
        random: &mut dyn RandomSource,
    ) -> (CompanionId, Option<String>) {
        debug!(
            "spawning companion '{}' at ({}, {})",
            descriptor.id, position.x, position.y
        );
        let mut companion = Companion::new(S::default(), position, facing);
        let trigger = companion.play(descriptor, random);

        let id = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.companion = Some(companion);
            CompanionId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len();
            self.slots.push(Slot {
                generation: 0,
                companion: Some(companion),
            });
            CompanionId {
                index,
                generation: 0,
            }
        };
        (id, trigger)
    }

    pub fn get(&self, id: CompanionId) -> Option<&Companion<S>> {
        let slot = self.slots.get(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.companion.as_ref()
    }

    /// Cancels the companion's timers (pending auto-close included) and
    /// releases it. Returns false when `id` was already closed.
    pub fn close(&mut self, id: CompanionId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index) else {
            return false;
        };
        if slot.generation != id.generation {
            return false;
        }
        let Some(mut companion) = slot.companion.take() else {
            return false;
        };
        companion.teardown();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        true
    }

    pub fn close_all(&mut self) {
        for id in self.ids() {
            self.close(id);
        }
    }

    pub fn ids(&self) -> Vec<CompanionId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.companion.is_some())
            .map(|(index, slot)| CompanionId {
                index,
                generation: slot.generation,
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CompanionId, &Companion<S>)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.companion.as_ref().map(|companion| {
                let id = CompanionId {
                    index,
                    generation: slot.generation,
                };
                (id, companion)
            })
        })
    }

    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.companion.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Advances every companion by `elapsed`; closes the finished ones.
    /// - returns trigger ids for nested child rules
    pub fn update(
        &mut self,
        elapsed: Duration,
        definition: &PetDefinition,
        random: &mut dyn RandomSource,
        config: &BehaviorConfig,
    ) -> Vec<String> {
        let close_delay = secs(config.companion_close_delay_secs);
        let mut spawns = Vec::new();
        let mut finished = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(companion) = slot.companion.as_mut() else {
                continue;
            };
            let (triggers, close) = companion.update(elapsed, definition, random, close_delay);
            spawns.extend(triggers);
            if close {
                finished.push(CompanionId {
                    index,
                    generation: slot.generation,
                });
            }
        }
        for id in finished {
            self.close(id);
        }
        spawns
    }
}
