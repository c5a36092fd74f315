use crate::render::Gpu;
use std::rc::Rc;

/// Linear fraction of the device resolution the background is rendered at.
pub const DEFAULT_RENDER_SCALE: f64 = 0.5;

/// Device pixel ratios above this are treated as this value.
pub const DEFAULT_MAX_PIXEL_RATIO: f64 = 1.0;

/// A token for a scheduled frame callback, valid until it fires or is
/// cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameRequest(pub i32);

/// The host side of the renderer: where frames come from and where pixels
/// go.
pub trait Surface {
    type Gpu: Gpu;

    /// `None` means the host has no compatible graphics API.
    fn acquire_context(&mut self) -> Option<Rc<Self::Gpu>>;

    /// Size of the surface in logical (CSS) pixels.
    fn logical_size(&self) -> (u32, u32);

    fn device_pixel_ratio(&self) -> f64;

    /// Resize the backing buffer the context renders into.
    fn set_backing_size(&mut self, width: u32, height: u32);

    /// Schedule a single callback for the next display refresh.
    fn request_frame(&mut self) -> FrameRequest;

    fn cancel_frame(&mut self, request: FrameRequest);

    fn listen_for_resize(&mut self);

    fn stop_listening_for_resize(&mut self);

    fn is_context_lost(&self) -> bool {
        false
    }

    /// Whether a lost context comes back through the host's restore event
    /// rather than from the next `acquire_context`.
    fn restores_lost_context(&self) -> bool {
        false
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scaling {
    pub render_scale: f64,
    pub max_pixel_ratio: f64,
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            render_scale: DEFAULT_RENDER_SCALE,
            max_pixel_ratio: DEFAULT_MAX_PIXEL_RATIO,
        }
    }
}

impl Scaling {
    // Out-of-range values fall back to the defaults rather than producing
    // an empty or oversized backing buffer.
    fn sanitized(&self) -> Self {
        let render_scale = if self.render_scale.is_finite() && self.render_scale > 0.0 {
            self.render_scale.min(1.0)
        } else {
            DEFAULT_RENDER_SCALE
        };
        let max_pixel_ratio = if self.max_pixel_ratio.is_finite() && self.max_pixel_ratio > 0.0 {
            self.max_pixel_ratio
        } else {
            DEFAULT_MAX_PIXEL_RATIO
        };

        Self {
            render_scale,
            max_pixel_ratio,
        }
    }
}

/// Size of the backing buffer, in device pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceDimensions {
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// Device pixels per logical pixel after clamping and downscaling.
    pub device_pixel_scale: f64,
}

impl Default for SurfaceDimensions {
    fn default() -> Self {
        Self {
            pixel_width: 1,
            pixel_height: 1,
            device_pixel_scale: DEFAULT_RENDER_SCALE * DEFAULT_MAX_PIXEL_RATIO,
        }
    }
}

impl SurfaceDimensions {
    pub fn new(
        logical_width: u32,
        logical_height: u32,
        device_pixel_ratio: f64,
        scaling: &Scaling,
    ) -> Self {
        let Scaling {
            render_scale,
            max_pixel_ratio,
        } = scaling.sanitized();
        let device_pixel_ratio = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };

        let device_pixel_scale = device_pixel_ratio.min(max_pixel_ratio) * render_scale;
        let to_pixels = |logical: u32| {
            let physical = (f64::from(logical) * device_pixel_ratio) as u32;
            let scaled = (f64::from(logical) * device_pixel_scale) as u32;
            scaled.min(physical).max(1)
        };

        Self {
            pixel_width: to_pixels(logical_width),
            pixel_height: to_pixels(logical_height),
            device_pixel_scale,
        }
    }

    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.pixel_width) / f64::from(self.pixel_height)
    }
}
