use serde::Serialize;
use std::fmt;

/// Axis-aligned box in pixel coordinates, `(x1, y1)` top-left and `(x2, y2)` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Truncates toward zero, the way an integer cast does.
    pub fn from_xyxy(xyxy: [f32; 4]) -> Self {
        Self {
            x1: xyxy[0] as i32,
            y1: xyxy[1] as i32,
            x2: xyxy[2] as i32,
            y2: xyxy[3] as i32,
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.x1 <= self.x2 && self.y1 <= self.y2
    }

    /// Edges may touch the border, so `x2 == width` still fits.
    pub fn fits_in(&self, width: u32, height: u32) -> bool {
        self.is_ordered()
            && self.x1 >= 0
            && self.y1 >= 0
            && self.x2 as i64 <= width as i64
            && self.y2 as i64 <= height as i64
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub bounding_box: BoundingBox,
    pub confidence: f32,
    pub label: String,
}

/// One box as produced by the model, before label resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateBox {
    pub class_id: usize,
    pub confidence: f32,
    pub xyxy: [f32; 4],
}

impl CandidateBox {
    pub fn area(&self) -> f32 {
        (self.xyxy[2] - self.xyxy[0]).max(0.) * (self.xyxy[3] - self.xyxy[1]).max(0.)
    }

    pub fn intersection(&self, other: &CandidateBox) -> f32 {
        let w = self.xyxy[2].min(other.xyxy[2]) - self.xyxy[0].max(other.xyxy[0]);
        let h = self.xyxy[3].min(other.xyxy[3]) - self.xyxy[1].max(other.xyxy[1]);
        w.max(0.) * h.max(0.)
    }

    pub fn iou(&self, other: &CandidateBox) -> f32 {
        let intersection = self.intersection(other);
        let union = self.area() + other.area() - intersection;
        if union <= 0. {
            return 0.;
        }
        intersection / union
    }
}

/// Raw result for one input image.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InferenceResult {
    pub boxes: Vec<CandidateBox>,
    pub image_width: u32,
    pub image_height: u32,
}
