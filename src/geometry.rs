//! Screen-space primitives shared by the core and the host.
//!
//! Coordinates follow the canvas convention :
//! - origin is the top left corner
//! - x grows to the right, y grows DOWNWARD
//!
//! ┌──────────────── Screen ─────────────────────────┐
//! │ (0,0)                                           │
//! │   ┌──────────── work area ──────────────────┐   │
//! │   │                                         │   │
//! │   │        ┌── surface (dock) ──┐           │   │
//! │   │  pet   │                    │           │   │
//! │   └────────┴────────────────────┴───────────┘   │
//! └─────────────────────────────────────────────────┘

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn offset_from(self, other: Point) -> Point {
        Point {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub position: Point,
    pub size: Size,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect {
            position: Point { x, y },
            size: Size { width, height },
        }
    }

    pub fn left(&self) -> f64 {
        self.position.x
    }

    pub fn right(&self) -> f64 {
        self.position.x + self.size.width
    }

    pub fn top(&self) -> f64 {
        self.position.y
    }

    pub fn bottom(&self) -> f64 {
        self.position.y + self.size.height
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left()
            && point.x <= self.right()
            && point.y >= self.top()
            && point.y <= self.bottom()
    }
}

/// Horizontal direction a character walks and faces.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

impl Facing {
    /// +1 for right, -1 for left.
    pub fn sign(self) -> f64 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Facing::Left => Facing::Right,
            Facing::Right => Facing::Left,
        }
    }
}

/// Which screen edge an elevated surface is attached to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceEdge {
    Bottom,
    Left,
    Right,
}

/// An elevated platform (taskbar / dock) the pet can stand on.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Surface {
    pub bounds: Rect,
    pub edge: SurfaceEdge,
}

impl Surface {
    /// Only a bottom dock is a horizontal platform; side docks are walls.
    pub fn is_walkable(&self) -> bool {
        self.edge == SurfaceEdge::Bottom
    }

    /// Edge containment : is a body spanning `[left, left + width]` fully
    /// supported by the surface?
    pub fn supports(&self, left: f64, width: f64) -> bool {
        self.is_walkable() && left >= self.bounds.left() && left + width <= self.bounds.right()
    }

    pub fn top(&self) -> f64 {
        self.bounds.top()
    }
}

/// Live screen geometry supplied by the platform layer.
pub trait GeometryProvider {
    fn screen(&self) -> Rect;
    fn work_area(&self) -> Rect;
    fn surface(&self) -> Option<Surface>;
}

/// Geometry that never changes, used by the browser host (canvas bounds) and
/// by tests.
#[derive(Debug, Copy, Clone)]
pub struct FixedGeometry {
    pub screen: Rect,
    pub work_area: Rect,
    pub surface: Option<Surface>,
}

impl FixedGeometry {
    pub fn new(screen: Rect) -> Self {
        FixedGeometry {
            screen,
            work_area: screen,
            surface: None,
        }
    }

    pub fn with_surface(mut self, surface: Surface) -> Self {
        self.surface = Some(surface);
        self
    }
}

impl GeometryProvider for FixedGeometry {
    fn screen(&self) -> Rect {
        self.screen
    }

    fn work_area(&self) -> Rect {
        self.work_area
    }

    fn surface(&self) -> Option<Surface> {
        self.surface
    }
}
