// TABLE:
// ┌──────────────────────────────────────────────────────────────────────────┐
// │                      Descriptor Structure                                │
// ├───────────────────┬──────────────────────────────────────────────────────┤
// │ Code              │ Descriptor file                                      │
// ├───────────────────┼──────────────────────────────────────────────────────┤
// │ PetDefinition     │ the whole document                                   │
// │ ├── Header        │ <header> author / title / petname ...                │
// │ ├── SpriteSheet   │ <image> tilesx / tilesy / png                        │
// │ ├── animations    │ <animations><animation id=".."> ...                  │
// │ ├── spawns        │ <spawns><spawn> first appearance                     │
// │ └── children      │ <childs><child animationid=".."> companions          │
// └───────────────────┴──────────────────────────────────────────────────────┘
//
// Everything in here is immutable once parsed and shared by Rc between the
// main pet and its companions.
pub mod parser;
pub mod playback;

use crate::random::RandomSource;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

/// Scope tag that makes a transition applicable everywhere.
pub const UNIVERSAL_SCOPE: &str = "none";

/// How many extra passes over the `repeatfrom` tail a play cycle makes.
///
/// | text            | variant                | value                  |
/// |-----------------|------------------------|------------------------|
/// | `7`             | `Fixed(7)`             | 7                      |
/// | `random/4+1`    | `RandomDivided(4, 1)`  | `rand(0..=99) / 4 + 1` |
/// | `random*2`      | `RandomMultiplied(2)`  | `rand(0..=99) * 2`     |
/// | anything else   | `Fixed(1)`             | 1                      |
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RepeatSpec {
    Fixed(i64),
    RandomDivided { divisor: i64, offset: i64 },
    RandomMultiplied(i64),
}

impl Default for RepeatSpec {
    fn default() -> Self {
        RepeatSpec::Fixed(1)
    }
}

impl RepeatSpec {
    /// Never fails; unparsable text is `Fixed(1)`.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Some(rest) = text.strip_prefix("random/") {
            let (divisor, offset) = match rest.split_once('+') {
                Some((divisor, offset)) => (divisor.trim().parse::<i64>(), offset.trim().parse::<i64>()),
                None => (rest.trim().parse::<i64>(), Ok(0)),
            };
            return match (divisor, offset) {
                (Ok(divisor), Ok(offset)) if divisor != 0 => RepeatSpec::RandomDivided { divisor, offset },
                _ => RepeatSpec::default(),
            };
        }
        if let Some(rest) = text.strip_prefix("random*") {
            return rest
                .trim()
                .parse()
                .map(RepeatSpec::RandomMultiplied)
                .unwrap_or_default();
        }
        text.parse().map(RepeatSpec::Fixed).unwrap_or_default()
    }

    /// Resolves to a concrete, non-negative repeat count.
    /// - random variants draw a fresh sample every call
    pub fn evaluate(&self, random: &mut dyn RandomSource) -> u32 {
        let value = match *self {
            RepeatSpec::Fixed(count) => count,
            RepeatSpec::RandomDivided { divisor, offset } => {
                (random.percent() / divisor).saturating_add(offset)
            }
            RepeatSpec::RandomMultiplied(multiplier) => random.percent().saturating_mul(multiplier),
        };
        u32::try_from(value.max(0)).unwrap_or(u32::MAX)
    }
}

/// A weighted possible successor animation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEdge {
    pub target: String,
    pub weight: u32,
    pub scope: String,
}

impl TransitionEdge {
    pub fn is_universal(&self) -> bool {
        self.scope == UNIVERSAL_SCOPE
    }
}

/// Timing and movement at one end of a play cycle.
/// - interval is in SECONDS (the file stores milliseconds)
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Motion {
    pub interval: f64,
    pub offset_y: f64,
    pub move_x: f64,
    pub move_y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationDescriptor {
    pub id: String,
    pub name: String,
    /// Sprite sheet frame numbers, never empty.
    pub frames: Vec<u32>,
    pub start: Motion,
    pub end: Motion,
    pub repeat: RepeatSpec,
    pub repeat_from: usize,
    pub next: Vec<TransitionEdge>,
    pub border: Vec<TransitionEdge>,
    pub gravity: Vec<TransitionEdge>,
}

impl AnimationDescriptor {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// `repeat_from` clamped into the frame sequence.
    pub fn repeat_from_index(&self) -> usize {
        self.repeat_from.min(self.frames.len().saturating_sub(1))
    }
}

/// A companion spawned whenever `trigger` starts playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildSpawnRule {
    pub trigger: String,
    pub x: String,
    pub y: String,
    pub spawn: String,
}

/// A possible first appearance of the main pet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnPoint {
    pub id: String,
    pub weight: u32,
    pub x: String,
    pub y: String,
    pub next: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Header {
    pub author: String,
    pub title: String,
    pub pet_name: String,
    pub version: String,
    pub info: String,
}

/// Grid layout of the sprite atlas plus the raw PNG bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteSheet {
    pub columns: u32,
    pub rows: u32,
    pub png: Vec<u8>,
}

impl SpriteSheet {
    pub const DEFAULT_COLUMNS: u32 = 16;
    pub const DEFAULT_ROWS: u32 = 11;

    /// (column, row) of a frame number in the atlas grid.
    pub fn cell(&self, frame: u32) -> (u32, u32) {
        let columns = self.columns.max(1);
        (frame % columns, frame / columns)
    }
}

impl Default for SpriteSheet {
    fn default() -> Self {
        SpriteSheet {
            columns: Self::DEFAULT_COLUMNS,
            rows: Self::DEFAULT_ROWS,
            png: Vec::new(),
        }
    }
}

/// The parsed animation graph.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PetDefinition {
    pub header: Header,
    pub sheet: SpriteSheet,
    pub animations: HashMap<String, Rc<AnimationDescriptor>>,
    pub children: Vec<ChildSpawnRule>,
    pub spawns: Vec<SpawnPoint>,
}

impl PetDefinition {
    /// Best effort, see [`parser::parse`].
    pub fn parse(source: &str) -> Self {
        parser::parse(source)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pet descriptor from : {}", path.display()))?;
        Ok(Self::parse(&source))
    }

    pub fn animation(&self, id: &str) -> Option<&Rc<AnimationDescriptor>> {
        self.animations.get(id)
    }

    /// Looks an animation up by display name, then by id.
    /// - several animations may share a name, the lowest id wins so the
    ///   lookup is stable
    pub fn resolve(&self, key: &str) -> Option<&Rc<AnimationDescriptor>> {
        self.animations
            .values()
            .filter(|animation| animation.name == key)
            .min_by(|a, b| a.id.cmp(&b.id))
            .or_else(|| self.animations.get(key))
    }

    pub fn children_of<'a>(&'a self, trigger: &'a str) -> impl Iterator<Item = &'a ChildSpawnRule> {
        self.children.iter().filter(move |rule| rule.trigger == trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SeededRandom;

    #[test]
    fn repeat_spec_grammar() {
        assert_eq!(RepeatSpec::parse("7"), RepeatSpec::Fixed(7));
        assert_eq!(
            RepeatSpec::parse("random/4+1"),
            RepeatSpec::RandomDivided { divisor: 4, offset: 1 }
        );
        assert_eq!(
            RepeatSpec::parse("random/3"),
            RepeatSpec::RandomDivided { divisor: 3, offset: 0 }
        );
        assert_eq!(RepeatSpec::parse("random*2"), RepeatSpec::RandomMultiplied(2));
        assert_eq!(RepeatSpec::parse("garbage"), RepeatSpec::Fixed(1));
        assert_eq!(RepeatSpec::parse("random/0"), RepeatSpec::Fixed(1));
        assert_eq!(RepeatSpec::parse("random/x+1"), RepeatSpec::Fixed(1));
        assert_eq!(RepeatSpec::parse(""), RepeatSpec::Fixed(1));
    }

    #[test]
    fn repeat_spec_ranges_hold() {
        let mut random = SeededRandom::seeded(42);
        let divided = RepeatSpec::parse("random/4+1");
        let multiplied = RepeatSpec::parse("random*2");
        for _ in 0..5_000 {
            assert!((1..=25).contains(&divided.evaluate(&mut random)));
            assert!((0..=198).contains(&multiplied.evaluate(&mut random)));
            assert_eq!(RepeatSpec::parse("7").evaluate(&mut random), 7);
            assert_eq!(RepeatSpec::parse("garbage").evaluate(&mut random), 1);
        }
    }

    #[test]
    fn huge_random_repeats_saturate() {
        let mut random = SeededRandom::seeded(5);
        let multiplied = RepeatSpec::parse("random*9223372036854775807");
        let offset = RepeatSpec::parse("random/1+9223372036854775807");
        let negative = RepeatSpec::parse("random*-9223372036854775807");
        for _ in 0..200 {
            let count = multiplied.evaluate(&mut random);
            assert!(count == 0 || count == u32::MAX);
            assert_eq!(offset.evaluate(&mut random), u32::MAX);
            assert_eq!(negative.evaluate(&mut random), 0);
        }
    }

    #[test]
    fn negative_counts_clamp_to_zero() {
        let mut random = SeededRandom::seeded(1);
        assert_eq!(RepeatSpec::parse("-3").evaluate(&mut random), 0);
    }

    #[test]
    fn sheet_cells_wrap_by_column() {
        let sheet = SpriteSheet::default();
        assert_eq!(sheet.cell(0), (0, 0));
        assert_eq!(sheet.cell(17), (1, 1));
    }
}
