use crate::browser;
use crate::geometry::{Rect, Size};
use crate::sprite::SpriteSheet;
use anyhow::{anyhow, Error, Result};
// ELI5: web assembly is a single threaded environment, so Rc RefCell > Mutex
use async_trait::async_trait;
use futures::channel::oneshot::channel;
use log::{error, warn};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use wasm_bindgen::{
    // unchecked_ref (unsafe) cast from Javascript type to Rust type
    // - we create the closures ourselves and know their signature
    JsCast,
    JsValue,
};
use web_sys::{CanvasRenderingContext2d, HtmlImageElement};

use self::input::PointerEvent;

#[async_trait(?Send)]
pub trait Game {
    async fn initialize(&self) -> Result<Box<dyn Game>>;
    /// One fixed step; `input` holds the pointer events since the last step.
    fn update(&mut self, input: &[PointerEvent], elapsed: Duration);
    fn draw(&self, renderer: &Renderer);
}

// length of a frame in milliseconds
const FRAME_SIZE: f32 = 1.0 / 60.0 * 1000.0;

pub struct GameLoop {
    last_frame: f64,
    accumulated_delta: f32,
    pending_input: Vec<PointerEvent>,
}

type SharedLoopClosure = Rc<RefCell<Option<browser::LoopClosure>>>;

impl GameLoop {
    pub async fn start(game: impl Game + 'static) -> Result<()> {
        let mut receiver = input::prepare_input()?;
        let mut game = game.initialize().await?;
        let mut game_loop = GameLoop {
            last_frame: browser::now()?,
            accumulated_delta: 0.0,
            pending_input: Vec::new(),
        };
        let renderer = Renderer {
            context: browser::context()?,
        };
        let step = Duration::from_secs_f32(FRAME_SIZE / 1000.0);

        let f: SharedLoopClosure = Rc::new(RefCell::new(None));
        let g = f.clone();
        *g.borrow_mut() = Some(browser::create_raf_closure(move |perf: f64| {
            game_loop
                .pending_input
                .extend(input::process_input(&mut receiver));
            game_loop.accumulated_delta += (perf - game_loop.last_frame) as f32;
            while game_loop.accumulated_delta > FRAME_SIZE {
                game.update(&game_loop.pending_input, step);
                game_loop.pending_input.clear();
                game_loop.accumulated_delta -= FRAME_SIZE;
            }
            game_loop.last_frame = perf;
            game.draw(&renderer);
            if let Some(closure) = f.borrow().as_ref() {
                if let Err(err) = browser::request_animation_frame(closure) {
                    error!("game loop stopped : {:#}", err);
                }
            }
        }));

        browser::request_animation_frame(
            g.borrow()
                .as_ref()
                .ok_or_else(|| anyhow!("GameLoop: Loop is None"))?,
        )?;

        Ok(())
    }
}

pub struct Renderer {
    context: CanvasRenderingContext2d,
}

impl Renderer {
    pub fn clear(&self, rect: &Rect) {
        self.context.clear_rect(
            rect.position.x,
            rect.position.y,
            rect.size.width,
            rect.size.height,
        );
    }

    #[allow(deprecated)]
    pub fn fill_rect(&self, rect: &Rect, color: &str) {
        self.context.set_fill_style(&JsValue::from_str(color));
        self.context.fill_rect(
            rect.position.x,
            rect.position.y,
            rect.size.width,
            rect.size.height,
        );
    }

    pub fn draw_image(&self, image: &HtmlImageElement, frame: &Rect, destination: &Rect) {
        if let Err(err) = self
            .context
            .draw_image_with_html_image_element_and_sw_and_sh_and_dx_and_dy_and_dw_and_dh(
                image,
                frame.position.x,
                frame.position.y,
                frame.size.width,
                frame.size.height,
                destination.position.x,
                destination.position.y,
                destination.size.width,
                destination.size.height,
            )
        {
            warn!("drawing failed : {:#?}", err);
        }
    }

    /// Same as [`Renderer::draw_image`], flipped around the destination's
    /// vertical center line.
    pub fn draw_image_mirrored(&self, image: &HtmlImageElement, frame: &Rect, destination: &Rect) {
        self.context.save();
        let flipped = self
            .context
            .translate(destination.right(), destination.top())
            .and_then(|_| self.context.scale(-1.0, 1.0));
        match flipped {
            Ok(()) => self.draw_image(
                image,
                frame,
                &Rect {
                    position: Default::default(),
                    size: destination.size,
                },
            ),
            Err(err) => warn!("mirroring failed : {:#?}", err),
        }
        self.context.restore();
    }
}

/// The sprite atlas image cut into the descriptor's grid.
pub struct SpriteAtlas {
    image: HtmlImageElement,
    grid: SpriteSheet,
}

impl SpriteAtlas {
    pub fn new(image: HtmlImageElement, sheet: &SpriteSheet) -> Self {
        SpriteAtlas {
            image,
            // the decoded image replaces the png bytes
            grid: SpriteSheet {
                columns: sheet.columns.max(1),
                rows: sheet.rows.max(1),
                png: Vec::new(),
            },
        }
    }

    pub fn cell_size(&self) -> Size {
        Size {
            width: f64::from(self.image.natural_width()) / f64::from(self.grid.columns),
            height: f64::from(self.image.natural_height()) / f64::from(self.grid.rows),
        }
    }

    /// Source rectangle of a frame number, row-major.
    pub fn frame_rect(&self, frame: u32) -> Rect {
        let size = self.cell_size();
        let (column, row) = self.grid.cell(frame);
        Rect::new(
            f64::from(column) * size.width,
            f64::from(row) * size.height,
            size.width,
            size.height,
        )
    }

    pub fn draw(&self, renderer: &Renderer, frame: u32, destination: &Rect, mirrored: bool) {
        let source = self.frame_rect(frame);
        if mirrored {
            renderer.draw_image_mirrored(&self.image, &source, destination);
        } else {
            renderer.draw_image(&self.image, &source, destination);
        }
    }
}

/// Asynchronously load an image from a given source path
/// # Arguments
/// * `source` - string slice to path/url (data urls work too)
/// # Returns
/// * `Ok(HtmlImageElement)` - on load success
/// * `Err` - on load fail
pub async fn load_image(source: &str) -> Result<HtmlImageElement> {
    let image = browser::create_html_image_element()?;
    let (tx, rx) = channel::<Result<(), Error>>();
    let success_tx = Rc::new(RefCell::new(Some(tx)));
    let error_tx = success_tx.clone();

    let success_callback = browser::closure_once(move || {
        if let Some(tx) = success_tx.borrow_mut().take() {
            let _ = tx.send(Ok(()));
        }
    });

    let error_callback = browser::closure_once(move |err: JsValue| {
        if let Some(tx) = error_tx.borrow_mut().take() {
            let _ = tx.send(Err(anyhow!(
                "[engine.rs::load_image] Error loading image: {:#?}",
                err
            )));
        }
    });

    image.set_onload(Some(success_callback.as_ref().unchecked_ref()));
    image.set_onerror(Some(error_callback.as_ref().unchecked_ref()));
    image.set_src(source);

    // keep callback alive until image is loaded or errors
    success_callback.forget();
    error_callback.forget();

    // ?? - double unwrap because Result<Result<(), Error>, oneshot::Canceled>
    // - first unwrap yields channel result : Result<(), Error>
    // - second unwrap yields image load result : () or propagating Error
    rx.await??;

    Ok(image)
}

pub mod input {
    //! Mouse events on the canvas, queued for the next game step.
    //!
    //! ┌──────────── Pointer mapping ───────────────┐
    //! │  mousedown  →  Down(offset x, offset y)    │
    //! │  mousemove  →  Move(offset x, offset y)    │
    //! │  mouseup    →  Up                          │
    //! │  dblclick   →  TogglePause                 │
    //! └────────────────────────────────────────────┘
    use crate::browser;
    use crate::geometry::Point;
    use anyhow::{anyhow, Result};
    use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
    use wasm_bindgen::JsCast;
    use web_sys::{HtmlCanvasElement, MouseEvent};

    #[derive(Debug, Copy, Clone, PartialEq)]
    pub enum PointerEvent {
        Down(Point),
        Move(Point),
        Up,
        TogglePause,
    }

    fn offset(event: &MouseEvent) -> Point {
        Point::new(f64::from(event.offset_x()), f64::from(event.offset_y()))
    }

    pub fn prepare_input() -> Result<UnboundedReceiver<PointerEvent>> {
        let (sender, receiver) = unbounded();
        let canvas = browser::canvas()?;
        listen(&canvas, "mousedown", sender.clone(), |event| {
            PointerEvent::Down(offset(event))
        })?;
        listen(&canvas, "mousemove", sender.clone(), |event| {
            PointerEvent::Move(offset(event))
        })?;
        listen(&canvas, "mouseup", sender.clone(), |_| PointerEvent::Up)?;
        listen(&canvas, "dblclick", sender, |_| PointerEvent::TogglePause)?;
        Ok(receiver)
    }

    fn listen(
        canvas: &HtmlCanvasElement,
        name: &str,
        sender: UnboundedSender<PointerEvent>,
        to_event: fn(&MouseEvent) -> PointerEvent,
    ) -> Result<()> {
        let callback = browser::closure_wrap(Box::new(move |event: MouseEvent| {
            let _ = sender.unbounded_send(to_event(&event));
        }) as Box<dyn FnMut(MouseEvent)>);
        canvas
            .add_event_listener_with_callback(name, callback.as_ref().unchecked_ref())
            .map_err(|err| anyhow!("Could not listen to {} : {:#?}", name, err))?;
        // the listener lives as long as the page
        callback.forget();
        Ok(())
    }

    /// Drains everything queued since the last call.
    pub fn process_input(receiver: &mut UnboundedReceiver<PointerEvent>) -> Vec<PointerEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = receiver.try_next() {
            events.push(event);
        }
        events
    }
}
