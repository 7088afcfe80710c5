//! Streaming reader for the pet descriptor markup.
//!
//! The reader keeps a stack of open elements; the meaning of a leaf such as
//! `<x>` or `<next>` depends on which block encloses it :
//!
//! ┌──────────────── Leaf routing ───────────────────────────────┐
//! │  leaf        innermost block      goes to                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  interval    start / end / none   start / end / both        │
//! │  offsety     start / end          start / end               │
//! │  x, y        start / end          movement vector           │
//! │  x, y        child / spawn        spawn expression          │
//! │  next        sequence             normal transitions        │
//! │  next        border / gravity     border / gravity lists    │
//! │  next        child / spawn        spawned animation id      │
//! └─────────────────────────────────────────────────────────────┘
//!
//! Parsing never fails: bad scalars fall back to defaults and incomplete
//! entries are dropped with a warning.
use super::{
    AnimationDescriptor, ChildSpawnRule, Motion, PetDefinition, RepeatSpec, SpawnPoint,
    SpriteSheet, TransitionEdge, UNIVERSAL_SCOPE,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::{debug, info, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::rc::Rc;

const DEFAULT_INTERVAL_MS: f64 = 200.0;
const DEFAULT_PROBABILITY: u32 = 100;

const MOTION_DEFAULT: Motion = Motion {
    interval: DEFAULT_INTERVAL_MS,
    offset_y: 0.0,
    move_x: 0.0,
    move_y: 0.0,
};

/// Parses a descriptor document into a [`PetDefinition`].
pub fn parse(source: &str) -> PetDefinition {
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(true);
    let mut state = ParseState::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => state.open(&element),
            Ok(Event::Empty(element)) => {
                state.open(&element);
                state.close();
            }
            Ok(Event::End(_)) => state.close(),
            Ok(Event::Text(text)) => match text.unescape() {
                Ok(text) => state.text.push_str(&text),
                Err(err) => warn!("skipping undecodable text in descriptor : {}", err),
            },
            Ok(Event::CData(data)) => state.text.push_str(&String::from_utf8_lossy(&data)),
            Ok(Event::Eof) => break,
            Err(err) => {
                // keep whatever was committed before the damage
                warn!(
                    "descriptor markup error at byte {} : {}",
                    reader.buffer_position(),
                    err
                );
                break;
            }
            Ok(_) => {}
        }
    }

    let definition = state.definition;
    info!(
        "loaded pet '{}' : {} animations, {} child rules, {} spawns",
        definition.header.pet_name,
        definition.animations.len(),
        definition.children.len(),
        definition.spawns.len()
    );
    definition
}

struct OpenElement {
    name: String,
    attributes: Vec<(String, String)>,
}

impl OpenElement {
    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum MotionScope {
    Start,
    End,
    Neither,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum TransitionScope {
    Normal,
    Border,
    Gravity,
}

/// Fields of one `<animation>` while it is still open.
struct AnimationBuilder {
    id: String,
    name: String,
    frames: Vec<u32>,
    start: Motion,
    end: Motion,
    repeat: RepeatSpec,
    repeat_from: usize,
    next: Vec<TransitionEdge>,
    border: Vec<TransitionEdge>,
    gravity: Vec<TransitionEdge>,
}

impl AnimationBuilder {
    fn new(id: String) -> Self {
        AnimationBuilder {
            id,
            name: String::new(),
            frames: Vec::new(),
            start: MOTION_DEFAULT,
            end: MOTION_DEFAULT,
            repeat: RepeatSpec::default(),
            repeat_from: 0,
            next: Vec::new(),
            border: Vec::new(),
            gravity: Vec::new(),
        }
    }

    fn motion(&mut self, scope: MotionScope) -> Option<&mut Motion> {
        match scope {
            MotionScope::Start => Some(&mut self.start),
            MotionScope::End => Some(&mut self.end),
            MotionScope::Neither => None,
        }
    }

    /// Applies the symmetric end defaults and converts to seconds.
    /// - `None` when the animation is unusable
    fn build(mut self) -> Option<AnimationDescriptor> {
        if self.id.is_empty() || self.frames.is_empty() {
            return None;
        }
        if self.end.move_x == 0.0 {
            self.end.move_x = self.start.move_x;
        }
        if self.end.move_y == 0.0 {
            self.end.move_y = self.start.move_y;
        }
        if self.end.interval == DEFAULT_INTERVAL_MS {
            self.end.interval = self.start.interval;
        }
        self.start.interval /= 1000.0;
        self.end.interval /= 1000.0;
        let repeat_from = self.repeat_from.min(self.frames.len() - 1);

        Some(AnimationDescriptor {
            id: self.id,
            name: self.name,
            frames: self.frames,
            start: self.start,
            end: self.end,
            repeat: self.repeat,
            repeat_from,
            next: self.next,
            border: self.border,
            gravity: self.gravity,
        })
    }
}

#[derive(Default)]
struct ParseState {
    stack: Vec<OpenElement>,
    text: String,
    definition: PetDefinition,
    animation: Option<AnimationBuilder>,
    child: Option<ChildSpawnRule>,
    spawn: Option<SpawnPoint>,
}

impl ParseState {
    fn open(&mut self, element: &BytesStart) {
        let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
        let attributes = element
            .attributes()
            .flatten()
            .filter_map(|attr| {
                let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
                attr.unescape_value()
                    .ok()
                    .map(|value| (key, value.trim().to_string()))
            })
            .collect();
        let element = OpenElement { name, attributes };

        match element.name.as_str() {
            "animation" => {
                let id = element.attribute("id").unwrap_or_default().to_string();
                self.animation = Some(AnimationBuilder::new(id));
            }
            "sequence" => {
                if let Some(animation) = self.animation.as_mut() {
                    animation.repeat = RepeatSpec::parse(element.attribute("repeat").unwrap_or_default());
                    animation.repeat_from = element
                        .attribute("repeatfrom")
                        .and_then(|text| text.parse().ok())
                        .unwrap_or(0);
                }
            }
            "child" => {
                self.child = Some(ChildSpawnRule {
                    trigger: element.attribute("animationid").unwrap_or_default().to_string(),
                    x: String::new(),
                    y: String::new(),
                    spawn: String::new(),
                });
            }
            "spawn" => {
                self.spawn = Some(SpawnPoint {
                    id: element.attribute("id").unwrap_or_default().to_string(),
                    weight: parse_weight(element.attribute("probability")),
                    x: String::new(),
                    y: String::new(),
                    next: String::new(),
                });
            }
            _ => {}
        }

        self.stack.push(element);
        self.text.clear();
    }

    fn close(&mut self) {
        let Some(element) = self.stack.pop() else {
            return;
        };
        let text = std::mem::take(&mut self.text);
        let text = text.trim();

        match element.name.as_str() {
            "animation" => self.commit_animation(),
            "child" => self.commit_child(),
            "spawn" => self.commit_spawn(),
            "tilesx" if self.animation.is_none() => {
                self.definition.sheet.columns = parse_grid(text, SpriteSheet::DEFAULT_COLUMNS);
            }
            "tilesy" if self.animation.is_none() => {
                self.definition.sheet.rows = parse_grid(text, SpriteSheet::DEFAULT_ROWS);
            }
            "png" if self.animation.is_none() => self.definition.sheet.png = decode_png(text),
            "author" | "title" | "petname" | "version" | "info" if self.parent_is("header") => {
                let header = &mut self.definition.header;
                let field = match element.name.as_str() {
                    "author" => &mut header.author,
                    "title" => &mut header.title,
                    "petname" => &mut header.pet_name,
                    "version" => &mut header.version,
                    _ => &mut header.info,
                };
                *field = text.to_string();
            }
            "x" | "y" | "next" if self.parent_is("child") => {
                if let Some(child) = self.child.as_mut() {
                    let slot = match element.name.as_str() {
                        "x" => &mut child.x,
                        "y" => &mut child.y,
                        _ => &mut child.spawn,
                    };
                    *slot = text.to_string();
                }
            }
            "x" | "y" | "next" if self.parent_is("spawn") => {
                if let Some(spawn) = self.spawn.as_mut() {
                    let slot = match element.name.as_str() {
                        "x" => &mut spawn.x,
                        "y" => &mut spawn.y,
                        _ => &mut spawn.next,
                    };
                    *slot = text.to_string();
                }
            }
            "name" if self.parent_is("animation") => {
                if let Some(animation) = self.animation.as_mut() {
                    animation.name = text.to_string();
                }
            }
            "frame" => self.push_frame(text),
            "interval" | "offsety" | "x" | "y" => self.apply_motion(&element.name, text),
            "next" => self.push_transition(&element, text),
            _ => {}
        }
    }

    fn parent_is(&self, name: &str) -> bool {
        self.stack.last().is_some_and(|parent| parent.name == name)
    }

    fn innermost<'a>(&self, names: &[&'a str]) -> Option<&'a str> {
        self.stack
            .iter()
            .rev()
            .find_map(|open| names.iter().find(|name| **name == open.name).copied())
    }

    fn push_frame(&mut self, text: &str) {
        let Some(animation) = self.animation.as_mut() else {
            return;
        };
        match text.parse() {
            Ok(frame) => animation.frames.push(frame),
            Err(_) => warn!("animation '{}' : skipping bad frame '{}'", animation.id, text),
        }
    }

    fn apply_motion(&mut self, field: &str, text: &str) {
        let scope = match self.innermost(&["start", "end"]) {
            Some("start") => MotionScope::Start,
            Some("end") => MotionScope::End,
            _ => MotionScope::Neither,
        };
        let Some(animation) = self.animation.as_mut() else {
            return;
        };
        let Ok(value) = text.parse::<f64>() else {
            debug!("animation '{}' : unparsable {} '{}'", animation.id, field, text);
            return;
        };

        if field == "interval" && scope == MotionScope::Neither {
            animation.start.interval = value;
            animation.end.interval = value;
            return;
        }
        let Some(motion) = animation.motion(scope) else {
            return;
        };
        match field {
            "interval" => motion.interval = value,
            "offsety" => motion.offset_y = value,
            "x" => motion.move_x = value,
            _ => motion.move_y = value,
        }
    }

    fn push_transition(&mut self, element: &OpenElement, text: &str) {
        let scope = match self.innermost(&["border", "gravity", "sequence"]) {
            Some("border") => TransitionScope::Border,
            Some("gravity") => TransitionScope::Gravity,
            Some("sequence") => TransitionScope::Normal,
            _ => return,
        };
        let Some(animation) = self.animation.as_mut() else {
            return;
        };
        if text.is_empty() {
            debug!("animation '{}' : dropping empty transition", animation.id);
            return;
        }
        let edge = TransitionEdge {
            target: text.to_string(),
            weight: parse_weight(element.attribute("probability")),
            scope: element
                .attribute("only")
                .filter(|only| !only.is_empty())
                .unwrap_or(UNIVERSAL_SCOPE)
                .to_string(),
        };
        match scope {
            TransitionScope::Normal => animation.next.push(edge),
            TransitionScope::Border => animation.border.push(edge),
            TransitionScope::Gravity => animation.gravity.push(edge),
        }
    }

    fn commit_animation(&mut self) {
        let Some(builder) = self.animation.take() else {
            return;
        };
        let id = builder.id.clone();
        match builder.build() {
            Some(animation) => {
                if self
                    .definition
                    .animations
                    .insert(id.clone(), Rc::new(animation))
                    .is_some()
                {
                    warn!("animation id '{}' declared twice, keeping the last one", id);
                }
            }
            None => warn!("dropping animation '{}' : missing id or frames", id),
        }
    }

    fn commit_child(&mut self) {
        let Some(child) = self.child.take() else {
            return;
        };
        if child.trigger.is_empty() || child.spawn.is_empty() {
            warn!("dropping incomplete child rule for '{}'", child.trigger);
            return;
        }
        self.definition.children.push(child);
    }

    fn commit_spawn(&mut self) {
        let Some(spawn) = self.spawn.take() else {
            return;
        };
        if spawn.next.is_empty() {
            warn!("dropping spawn '{}' : no animation", spawn.id);
            return;
        }
        self.definition.spawns.push(spawn);
    }
}

fn parse_weight(text: Option<&str>) -> u32 {
    text.and_then(|text| text.parse().ok())
        .unwrap_or(DEFAULT_PROBABILITY)
}

fn parse_grid(text: &str, default: u32) -> u32 {
    match text.parse() {
        Ok(count) if count > 0 => count,
        _ => default,
    }
}

fn decode_png(text: &str) -> Vec<u8> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact).unwrap_or_else(|err| {
        warn!("sprite sheet image is not valid base64 : {}", err);
        Vec::new()
    })
}
