use serde::{Deserialize, Serialize};

use crate::error::WindowError;
use crate::geometry::{Point, Rect, RoundDirection, Size};

/// Inclusive range of component indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentRange {
    pub first: u16,
    pub last: u16,
}

impl ComponentRange {
    pub const fn new(first: u16, last: u16) -> Self {
        Self { first, last }
    }

    pub fn contains(&self, c: u16) -> bool {
        (self.first..=self.last).contains(&c)
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> {
        self.first..=self.last
    }
}

/// A client's view window: which part of which frame, which components and
/// how many quality layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewWindow {
    /// Requested frame size
    pub frame: Size,

    /// Region offset within the requested frame
    #[serde(default)]
    pub offset: Point,

    /// Region size; the rest of the frame from `offset` when absent
    #[serde(default)]
    pub region: Option<Size>,

    /// Components to deliver; all components when absent
    #[serde(default)]
    pub components: Option<ComponentRange>,

    /// Quality layer limit; every layer when absent
    #[serde(default)]
    pub layers: Option<u16>,

    #[serde(default)]
    pub round: RoundDirection,
}

impl ViewWindow {
    /// A window covering the whole of a frame.
    pub fn full_frame(frame: Size) -> Self {
        Self {
            frame,
            offset: Point::default(),
            region: None,
            components: None,
            layers: None,
            round: RoundDirection::default(),
        }
    }

    pub fn with_region(mut self, offset: Point, size: Size) -> Self {
        self.offset = offset;
        self.region = Some(size);
        self
    }

    pub fn with_components(mut self, range: ComponentRange) -> Self {
        self.components = Some(range);
        self
    }

    pub fn with_layers(mut self, layers: u16) -> Self {
        self.layers = Some(layers);
        self
    }

    pub fn with_round(mut self, round: RoundDirection) -> Self {
        self.round = round;
        self
    }

    /// Region size, defaulting to the remainder of the frame.
    pub fn region_size(&self) -> Size {
        self.region.unwrap_or(Size::new(
            self.frame.width.saturating_sub(self.offset.x),
            self.frame.height.saturating_sub(self.offset.y),
        ))
    }

    /// Requested region on the requested frame, clipped to the frame.
    pub fn region_rect(&self) -> Rect {
        Rect::from_origin_size(self.offset, self.region_size())
            .intersect(&Rect::new(0, 0, self.frame.width, self.frame.height))
    }

    /// Reject malformed windows before any scheduling work.
    pub fn validate(&self, num_components: u16) -> Result<(), WindowError> {
        if self.frame.is_empty() {
            return Err(WindowError::EmptyFrame {
                width: self.frame.width,
                height: self.frame.height,
            });
        }
        if self.offset.x >= self.frame.width || self.offset.y >= self.frame.height {
            return Err(WindowError::OffsetOutsideFrame {
                x: self.offset.x,
                y: self.offset.y,
                width: self.frame.width,
                height: self.frame.height,
            });
        }
        let region = self.region_size();
        if region.is_empty() {
            return Err(WindowError::EmptyRegion {
                width: region.width,
                height: region.height,
            });
        }
        if let Some(range) = self.components {
            if range.first > range.last || range.last >= num_components {
                return Err(WindowError::InvalidComponentRange {
                    first: range.first,
                    last: range.last,
                    available: num_components,
                });
            }
        }
        if self.layers == Some(0) {
            return Err(WindowError::ZeroLayers);
        }
        Ok(())
    }
}

/// A view window after it has been snapped onto the codestream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedWindow {
    /// Resolution levels dropped from the full image
    pub discard_levels: u8,

    /// Frame size requested by the client
    pub requested_frame: Size,

    /// Frame size actually served
    pub frame: Size,

    /// Region on the served frame
    pub region: Rect,

    /// Region on the full-resolution reference grid
    pub reference_region: Rect,

    pub components: ComponentRange,

    /// Number of quality layers to deliver
    pub layers: u16,

    /// Layer limit exactly as the client asked for it. Schedulers that
    /// synthesize their own layers apply it to those instead.
    pub requested_layers: Option<u16>,
}

impl ResolvedWindow {
    /// Ratio of requested to served frame area, in `[0, 1]`. Below 1 when
    /// the served frame is larger than the one asked for.
    pub fn scale_factor(&self) -> f64 {
        let served = self.frame.area();
        if served == 0 {
            return 1.0;
        }
        (self.requested_frame.area() as f64 / served as f64).clamp(0.0, 1.0)
    }
}
