use serde::{Deserialize, Serialize};

/// Axis-aligned box in screen coordinates (y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    /// Strict overlap: touching edges do not count.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    pub fn overlaps_horizontally(&self, other: &Rect) -> bool {
        self.x < other.right() && self.right() > other.x
    }

    pub fn contains_x(&self, x: f32) -> bool {
        x >= self.x && x <= self.right()
    }
}

/// Platform oscillating horizontally between `start_x` and `start_x + range`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovingPlatform {
    pub rect: Rect,
    pub dx: f32,
    pub range: f32,
    pub start_x: f32,
}

impl MovingPlatform {
    /// Move by `dx * frames`, reversing at either bound. Returns the applied
    /// horizontal delta.
    pub fn advance(&mut self, frames: f32) -> f32 {
        let before = self.rect.x;
        self.rect.x += self.dx * frames;
        let max_x = self.start_x + self.range;
        if self.rect.x > max_x {
            self.rect.x = max_x;
            self.dx = -self.dx.abs();
        } else if self.rect.x < self.start_x {
            self.rect.x = self.start_x;
            self.dx = self.dx.abs();
        }
        self.rect.x - before
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Platform {
    Flat(Rect),
    /// `y` is the surface height at the left edge, `end_y` at the right edge.
    Sloped {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        end_y: f32,
    },
    Moving(MovingPlatform),
}

impl Platform {
    /// Bounding box. Slopes span from their highest to lowest surface point
    /// plus their thickness.
    pub fn bounds(&self) -> Rect {
        match *self {
            Platform::Flat(rect) => rect,
            Platform::Moving(ref m) => m.rect,
            Platform::Sloped {
                x,
                y,
                width,
                height,
                end_y,
            } => {
                let top = y.min(end_y);
                let bottom = y.max(end_y) + height;
                Rect::new(x, top, width, bottom - top)
            },
        }
    }

    /// Surface height (top edge) at horizontal position `x`. Positions
    /// outside the platform are clamped to its nearest edge.
    pub fn surface_height_at(&self, x: f32) -> f32 {
        match *self {
            Platform::Flat(rect) => rect.y,
            Platform::Moving(ref m) => m.rect.y,
            Platform::Sloped {
                x: left,
                y,
                width,
                end_y,
                ..
            } => {
                if width <= 0.0 {
                    return y;
                }
                let t = ((x - left) / width).clamp(0.0, 1.0);
                y + (end_y - y) * t
            },
        }
    }

    /// Surface drop per unit of horizontal travel. Zero for flat and moving
    /// platforms.
    pub fn steepness(&self) -> f32 {
        match *self {
            Platform::Sloped {
                y, width, end_y, ..
            } if width > 0.0 => (end_y - y).abs() / width,
            _ => 0.0,
        }
    }

    /// Thickness of the landing band below the surface.
    pub fn thickness(&self) -> f32 {
        match *self {
            Platform::Flat(rect) => rect.height,
            Platform::Moving(ref m) => m.rect.height,
            Platform::Sloped { height, .. } => height,
        }
    }

    pub fn left(&self) -> f32 {
        self.bounds().x
    }

    pub fn right(&self) -> f32 {
        self.bounds().right()
    }

    pub fn is_moving(&self) -> bool {
        matches!(self, Platform::Moving(_))
    }

    pub fn center_x(&self) -> f32 {
        self.bounds().center_x()
    }
}
