use crate::browser;
use crate::config::BehaviorConfig;
use crate::engine::input::PointerEvent;
use crate::engine::{self, Game, Renderer, SpriteAtlas};
use crate::geometry::{Facing, FixedGeometry, Point, Rect, Surface, SurfaceEdge};
use crate::pet::timers::TimerQueue;
use crate::pet::{Pet, PetSnapshot};
use crate::random::SeededRandom;
use crate::sprite::PetDefinition;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::join;
use log::{info, warn};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// TABLE
/// ┌───────────────────── Desktop Pet Overview ──────────────────────────────┐
/// │                                                                         │
/// │    ┌─────────────┐          ┌─────────────┐          ┌─────────────┐    │
/// │    │  engine.rs  │  update  │   game.rs   │  update  │   pet/      │    │
/// │    │  GameLoop   ├─────────►│  DesktopPet ├─────────►│   Pet       │    │
/// │    │  (60 fps)   │  input   │             │ elapsed  │   timers    │    │
/// │    └─────────────┘          └──────┬──────┘          └──────┬──────┘    │
/// │                                    │ draw                   │ snapshot  │
/// │                              ┌─────┴──────┐          ┌──────┴──────┐    │
/// │                              │ SpriteAtlas│          │ companions  │    │
/// │                              └────────────┘          └─────────────┘    │
/// │                                                                         │
/// ├──────────────────────── Call Sequence ──────────────────────────────────┤
/// │  1. initialize : descriptor + config load in parallel, then the atlas   │
/// │  2. update     : pointer events -> Pet, then Pet::update(step)          │
/// │  3. draw       : surface, companions, pet (mirrored when facing left)   │
/// └─────────────────────────────────────────────────────────────────────────┘
pub enum DesktopPet {
    /// Descriptor, config and atlas are loading
    Loading,

    /// Running pet with its decoded atlas
    Loaded(Scene),
}

pub struct Scene {
    pet: Pet<TimerQueue>,
    atlas: SpriteAtlas,
    bounds: Rect,
    surface: Option<Surface>,
}

thread_local! {
    static LATEST_SNAPSHOT: RefCell<Option<PetSnapshot>> = const { RefCell::new(None) };
}

/// What the pet looked like after the last game step.
pub fn latest_snapshot() -> Option<PetSnapshot> {
    LATEST_SNAPSHOT.with(|snapshot| snapshot.borrow().clone())
}

impl DesktopPet {
    const DESCRIPTOR_PATH: &'static str = "pet.xml";
    const CONFIG_PATH: &'static str = "pet-config.json";
    // used when the descriptor carries no embedded png
    const IMAGE_PATH: &'static str = "pet.png";

    pub fn new() -> Self {
        DesktopPet::Loading
    }

    async fn load_definition() -> Result<PetDefinition> {
        let source = browser::fetch_text(Self::DESCRIPTOR_PATH)
            .await
            .with_context(|| format!("Failed to load pet descriptor from : {}", Self::DESCRIPTOR_PATH))?;
        Ok(PetDefinition::parse(&source))
    }

    /// The config file is optional.
    async fn load_config() -> BehaviorConfig {
        match browser::fetch_json::<BehaviorConfig>(Self::CONFIG_PATH).await {
            Ok(config) => config,
            Err(err) => {
                warn!("using default behavior config ({:#})", err);
                BehaviorConfig::default()
            }
        }
    }

    async fn load_atlas(definition: &PetDefinition) -> Result<SpriteAtlas> {
        let source = if definition.sheet.png.is_empty() {
            Self::IMAGE_PATH.to_string()
        } else {
            format!("data:image/png;base64,{}", STANDARD.encode(&definition.sheet.png))
        };
        let image = engine::load_image(&source)
            .await
            .context("Failed to load sprite sheet image")?;
        Ok(SpriteAtlas::new(image, &definition.sheet))
    }

    /// A dock across the middle of the lower canvas for the pet to climb.
    fn dock(bounds: &Rect) -> Surface {
        Surface {
            bounds: Rect::new(
                bounds.left() + bounds.size.width * 0.25,
                bounds.top() + bounds.size.height * 0.7,
                bounds.size.width * 0.5,
                12.0,
            ),
            edge: SurfaceEdge::Bottom,
        }
    }
}

impl Default for DesktopPet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl Game for DesktopPet {
    async fn initialize(&self) -> Result<Box<dyn Game>> {
        match self {
            DesktopPet::Loading => {
                // descriptor and config are independent : load them together
                let (definition, config) = join!(Self::load_definition(), Self::load_config());
                let definition = Rc::new(definition?);
                let atlas = Self::load_atlas(&definition).await?;

                let canvas = browser::canvas()?;
                let bounds = Rect::new(0.0, 0.0, f64::from(canvas.width()), f64::from(canvas.height()));
                let surface = Self::dock(&bounds);
                let geometry = FixedGeometry::new(bounds).with_surface(surface);

                let mut pet = Pet::new(
                    definition,
                    config,
                    Box::new(geometry),
                    Box::new(SeededRandom::from_entropy()),
                    TimerQueue::new(),
                );
                pet.set_size(atlas.cell_size());
                pet.appear();
                info!("pet '{}' is out", pet.definition().header.pet_name);

                Ok(Box::new(DesktopPet::Loaded(Scene {
                    pet,
                    atlas,
                    bounds,
                    surface: Some(surface),
                })))
            }
            DesktopPet::Loaded(_) => Err(anyhow!("Desktop pet is already initialized")),
        }
    }

    fn update(&mut self, input: &[PointerEvent], elapsed: Duration) {
        if let DesktopPet::Loaded(scene) = self {
            let pet = &mut scene.pet;
            for event in input {
                match *event {
                    PointerEvent::Down(point) if pet.hit_test(point) => pet.pointer_down(point),
                    PointerEvent::Down(_) => {}
                    PointerEvent::Move(point) => pet.pointer_moved(point),
                    PointerEvent::Up => pet.pointer_up(),
                    PointerEvent::TogglePause if pet.is_paused() => pet.resume(),
                    PointerEvent::TogglePause => pet.pause(),
                }
            }
            pet.update(elapsed);
            let snapshot = pet.snapshot();
            LATEST_SNAPSHOT.with(|latest| *latest.borrow_mut() = Some(snapshot));
        }
    }

    fn draw(&self, renderer: &Renderer) {
        if let DesktopPet::Loaded(scene) = self {
            renderer.clear(&scene.bounds);
            // Draw order matters : surface -> companions -> pet
            if let Some(surface) = scene.surface.as_ref() {
                renderer.fill_rect(&surface.bounds, "#8a8f98");
            }
            let size = scene.pet.size();
            for (_, companion) in scene.pet.companions().iter() {
                if let Some(frame) = companion.current_frame_number() {
                    let position = companion.position();
                    let destination = Rect {
                        position: Point::new(
                            position.x,
                            position.y + companion.current_offset_y(),
                        ),
                        size,
                    };
                    scene
                        .atlas
                        .draw(renderer, frame, &destination, companion.facing() == Facing::Left);
                }
            }
            if let Some(frame) = scene.pet.current_frame_number() {
                let mut destination = scene.pet.bounds();
                destination.position.y += scene.pet.current_offset_y();
                scene
                    .atlas
                    .draw(renderer, frame, &destination, scene.pet.facing() == Facing::Left);
            }
        }
    }
}
