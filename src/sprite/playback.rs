//! Frame cursor over one [`AnimationDescriptor`].
//!
//! ELI5: a play cycle walks the whole frame list once, then replays the tail
//! starting at `repeat_from` as many times as the repeat spec says :
//!
//! frames = [a b c d e], repeat_from = 2, repeat = 2
//!
//!   a b c d e │ c d e │ c d e
//!   ──────────┴───────┴────── progress 0.0 ─► 1.0
//!
//! Timing and movement are interpolated between the start and end motion
//! using that progress.

use super::{AnimationDescriptor, TransitionEdge};
use crate::random::RandomSource;
use std::rc::Rc;

/// What a single [`Playback::advance`] did.
/// - `C` is the completion token handed to [`Playback::start`]
#[derive(Debug, PartialEq)]
pub enum Advance<C> {
    /// moved to the next frame
    Stepped,
    /// jumped back to `repeat_from`
    Repeated,
    /// a looping cycle began again
    Restarted,
    /// the cycle ended; carries the completion token
    Completed(Option<C>),
    /// nothing playing (or already finished)
    Idle,
}

#[derive(Debug)]
pub struct Playback<C> {
    descriptor: Option<Rc<AnimationDescriptor>>,
    frame_index: usize,
    frames_played: u32,
    estimated_total_frames: u32,
    repeats_remaining: u32,
    looping: bool,
    finished: bool,
    on_complete: Option<C>,
    children_spawned: bool,
    pending_spawn: Option<String>,
}

impl<C> Default for Playback<C> {
    fn default() -> Self {
        Playback {
            descriptor: None,
            frame_index: 0,
            frames_played: 0,
            estimated_total_frames: 0,
            repeats_remaining: 0,
            looping: false,
            finished: false,
            on_complete: None,
            children_spawned: false,
            pending_spawn: None,
        }
    }
}

impl<C> Playback<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins a fresh cycle of `descriptor`.
    /// - resolves the repeat spec (random specs roll again every cycle)
    /// - arms a child spawn request for this descriptor's id
    pub fn start(
        &mut self,
        descriptor: Rc<AnimationDescriptor>,
        looping: bool,
        on_complete: Option<C>,
        random: &mut dyn RandomSource,
    ) {
        self.looping = looping;
        self.on_complete = on_complete;
        self.descriptor = Some(descriptor);
        self.begin_cycle(random);
    }

    fn begin_cycle(&mut self, random: &mut dyn RandomSource) {
        let Some(descriptor) = self.descriptor.as_ref() else {
            return;
        };
        let frame_count = descriptor.frame_count() as u32;
        let tail = frame_count - descriptor.repeat_from_index() as u32;
        self.frame_index = 0;
        self.frames_played = 0;
        self.finished = false;
        self.repeats_remaining = descriptor.repeat.evaluate(random);
        self.estimated_total_frames =
            frame_count.saturating_add(tail.saturating_mul(self.repeats_remaining));
        self.children_spawned = false;
        self.spawn_children();
    }

    fn spawn_children(&mut self) {
        if self.children_spawned {
            return;
        }
        if let Some(descriptor) = self.descriptor.as_ref() {
            self.pending_spawn = Some(descriptor.id.clone());
            self.children_spawned = true;
        }
    }

    /// Trigger id whose child rules should fire, at most once per cycle.
    pub fn take_spawn(&mut self) -> Option<String> {
        self.pending_spawn.take()
    }

    /// Drops the current descriptor; nothing plays until the next start.
    pub fn stop(&mut self) {
        self.descriptor = None;
        self.on_complete = None;
        self.pending_spawn = None;
        self.finished = false;
    }

    pub fn descriptor(&self) -> Option<&Rc<AnimationDescriptor>> {
        self.descriptor.as_ref()
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Sprite sheet frame under the cursor.
    pub fn current_frame_number(&self) -> Option<u32> {
        self.descriptor
            .as_ref()
            .and_then(|descriptor| descriptor.frames.get(self.frame_index).copied())
    }

    /// Normalised position through the cycle, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.estimated_total_frames <= 1 {
            return 0.0;
        }
        let progress =
            f64::from(self.frames_played) / f64::from(self.estimated_total_frames - 1);
        progress.clamp(0.0, 1.0)
    }

    fn interpolate(&self, field: impl Fn(&super::Motion) -> f64) -> f64 {
        match self.descriptor.as_ref() {
            Some(descriptor) => {
                let start = field(&descriptor.start);
                let end = field(&descriptor.end);
                start + (end - start) * self.progress()
            }
            None => 0.0,
        }
    }

    /// Seconds until the next frame.
    pub fn current_interval(&self) -> f64 {
        self.interpolate(|motion| motion.interval)
    }

    pub fn current_move_x(&self) -> f64 {
        self.interpolate(|motion| motion.move_x)
    }

    pub fn current_move_y(&self) -> f64 {
        self.interpolate(|motion| motion.move_y)
    }

    /// Not interpolated; the file only sets it in the start block.
    pub fn current_offset_y(&self) -> f64 {
        self.descriptor
            .as_ref()
            .map_or(0.0, |descriptor| descriptor.start.offset_y)
    }

    /// Moves the cursor one frame forward.
    pub fn advance(&mut self, random: &mut dyn RandomSource) -> Advance<C> {
        let Some(descriptor) = self.descriptor.as_ref() else {
            return Advance::Idle;
        };
        if self.finished {
            return Advance::Idle;
        }
        let frame_count = descriptor.frame_count();
        let repeat_from = descriptor.repeat_from_index();

        self.frames_played = self.frames_played.saturating_add(1);
        if self.frame_index + 1 < frame_count {
            self.frame_index += 1;
            return Advance::Stepped;
        }
        if self.repeats_remaining > 0 {
            self.repeats_remaining -= 1;
            self.frame_index = repeat_from.min(frame_count - 1);
            return Advance::Repeated;
        }
        if self.looping {
            self.begin_cycle(random);
            return Advance::Restarted;
        }
        self.finished = true;
        Advance::Completed(self.on_complete.take())
    }
}

/// Weighted draw over `items`.
/// - a uniform integer in `[1, total]` picks the first item whose running
///   weight reaches it, so equal weights split evenly by declaration order
pub fn select_weighted<'a, T>(
    items: impl IntoIterator<Item = &'a T>,
    weight: impl Fn(&T) -> u32,
    random: &mut dyn RandomSource,
) -> Option<&'a T> {
    let items: Vec<&T> = items.into_iter().collect();
    let total: i64 = items.iter().map(|item| i64::from(weight(*item))).sum();
    if total <= 0 {
        return None;
    }
    let draw = random.range(1, total);
    let mut cumulative = 0;
    for item in items {
        cumulative += i64::from(weight(item));
        if cumulative >= draw {
            return Some(item);
        }
    }
    None
}

/// Weighted transition among the edges whose scope `accepts`.
pub fn select_transition<'a>(
    transitions: &'a [TransitionEdge],
    accepts: impl Fn(&str) -> bool,
    random: &mut dyn RandomSource,
) -> Option<&'a str> {
    let candidates = transitions.iter().filter(|edge| accepts(edge.scope.as_str()));
    select_weighted(candidates, |edge| edge.weight, random).map(|edge| edge.target.as_str())
}

/// Weighted transition among universally scoped edges.
pub fn select_next_animation<'a>(
    transitions: &'a [TransitionEdge],
    random: &mut dyn RandomSource,
) -> Option<&'a str> {
    select_transition(transitions, |scope| scope == super::UNIVERSAL_SCOPE, random)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SeededRandom;
    use crate::sprite::{Motion, RepeatSpec, UNIVERSAL_SCOPE};
    use approx::assert_relative_eq;

    fn descriptor(frames: usize, repeat_from: usize, repeat: RepeatSpec) -> Rc<AnimationDescriptor> {
        Rc::new(AnimationDescriptor {
            id: "walk".into(),
            name: "walk".into(),
            frames: (10..10 + frames as u32).collect(),
            start: Motion {
                interval: 0.1,
                offset_y: 3.0,
                move_x: 2.0,
                move_y: 0.0,
            },
            end: Motion {
                interval: 0.5,
                offset_y: 9.0,
                move_x: 6.0,
                move_y: -4.0,
            },
            repeat,
            repeat_from,
            next: Vec::new(),
            border: Vec::new(),
            gravity: Vec::new(),
        })
    }

    fn edge(target: &str, weight: u32, scope: &str) -> TransitionEdge {
        TransitionEdge {
            target: target.into(),
            weight,
            scope: scope.into(),
        }
    }

    #[test]
    fn repeat_tail_sequence() {
        let mut random = SeededRandom::seeded(3);
        let mut playback: Playback<&str> = Playback::new();
        playback.start(descriptor(5, 2, RepeatSpec::Fixed(2)), false, Some("done"), &mut random);

        let mut indices = vec![playback.frame_index()];
        loop {
            match playback.advance(&mut random) {
                Advance::Completed(token) => {
                    assert_eq!(token, Some("done"));
                    break;
                }
                Advance::Stepped | Advance::Repeated => indices.push(playback.frame_index()),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 2, 3, 4, 2, 3, 4]);
        assert!(playback.is_finished());
        assert_eq!(playback.advance(&mut random), Advance::Idle);
    }

    #[test]
    fn progress_spans_zero_to_one_monotonically() {
        let mut random = SeededRandom::seeded(3);
        let mut playback: Playback<()> = Playback::new();
        playback.start(descriptor(5, 2, RepeatSpec::Fixed(2)), false, None, &mut random);
        assert_eq!(playback.progress(), 0.0);

        let mut last = 0.0;
        for _ in 0..10 {
            playback.advance(&mut random);
            let progress = playback.progress();
            assert!(progress >= last);
            last = progress;
        }
        // last frame of the final repeat
        assert_eq!(playback.frame_index(), 4);
        assert_eq!(playback.progress(), 1.0);
    }

    #[test]
    fn single_frame_cycles_report_zero_progress() {
        let mut random = SeededRandom::seeded(3);
        let mut playback: Playback<()> = Playback::new();
        playback.start(descriptor(1, 0, RepeatSpec::Fixed(0)), false, None, &mut random);
        assert_eq!(playback.progress(), 0.0);
        assert_relative_eq!(playback.current_interval(), 0.1);
    }

    #[test]
    fn interpolates_timing_and_movement() {
        let mut random = SeededRandom::seeded(3);
        let mut playback: Playback<()> = Playback::new();
        // 5 frames, no repeats: progress steps by 0.25
        playback.start(descriptor(5, 0, RepeatSpec::Fixed(0)), false, None, &mut random);
        playback.advance(&mut random);
        playback.advance(&mut random);
        assert_relative_eq!(playback.progress(), 0.5);
        assert_relative_eq!(playback.current_interval(), 0.3);
        assert_relative_eq!(playback.current_move_x(), 4.0);
        assert_relative_eq!(playback.current_move_y(), -2.0);
        assert_relative_eq!(playback.current_offset_y(), 3.0);
        assert_eq!(playback.current_frame_number(), Some(12));
    }

    #[test]
    fn looping_restarts_and_rearms_child_spawn() {
        let mut random = SeededRandom::seeded(3);
        let mut playback: Playback<()> = Playback::new();
        playback.start(descriptor(2, 0, RepeatSpec::Fixed(0)), true, None, &mut random);
        assert_eq!(playback.take_spawn().as_deref(), Some("walk"));
        assert_eq!(playback.take_spawn(), None);

        assert_eq!(playback.advance(&mut random), Advance::Stepped);
        assert_eq!(playback.take_spawn(), None);
        assert_eq!(playback.advance(&mut random), Advance::Restarted);
        assert_eq!(playback.frame_index(), 0);
        assert_eq!(playback.progress(), 0.0);
        assert_eq!(playback.take_spawn().as_deref(), Some("walk"));
    }

    #[test]
    fn idle_playback_reports_nothing() {
        let mut random = SeededRandom::seeded(3);
        let mut playback: Playback<()> = Playback::new();
        assert_eq!(playback.current_frame_number(), None);
        assert_eq!(playback.progress(), 0.0);
        assert_eq!(playback.advance(&mut random), Advance::Idle);
    }

    #[test]
    fn weighted_selection_matches_weights() {
        let mut random = SeededRandom::seeded(99);
        let edges = vec![
            edge("a", 1, UNIVERSAL_SCOPE),
            edge("b", 2, UNIVERSAL_SCOPE),
            edge("c", 3, UNIVERSAL_SCOPE),
            edge("d", 4, UNIVERSAL_SCOPE),
            edge("scoped", 50, "taskbar"),
        ];
        let draws = 100_000;
        let mut counts = [0u32; 4];
        for _ in 0..draws {
            match select_next_animation(&edges, &mut random) {
                Some("a") => counts[0] += 1,
                Some("b") => counts[1] += 1,
                Some("c") => counts[2] += 1,
                Some("d") => counts[3] += 1,
                other => panic!("unexpected selection {other:?}"),
            }
        }
        for (count, expected) in counts.iter().zip([0.1, 0.2, 0.3, 0.4]) {
            let observed = f64::from(*count) / f64::from(draws);
            assert!((observed - expected).abs() < 0.01, "{observed} vs {expected}");
        }
    }

    #[test]
    fn selection_with_nothing_to_pick() {
        let mut random = SeededRandom::seeded(5);
        assert_eq!(select_next_animation(&[], &mut random), None);
        let zero = vec![edge("a", 0, UNIVERSAL_SCOPE), edge("b", 0, UNIVERSAL_SCOPE)];
        assert_eq!(select_next_animation(&zero, &mut random), None);
        let scoped = vec![edge("a", 10, "vertical")];
        assert_eq!(select_next_animation(&scoped, &mut random), None);
        assert_eq!(
            select_transition(&scoped, |scope| scope == "vertical", &mut random),
            Some("a")
        );
    }
}
