pub mod clock;
pub mod color;
mod data;
pub mod driver;
pub mod noise;
pub mod pipeline;
pub mod render;
pub mod settings;
pub mod shading;
pub mod surface;
pub mod uniforms;

#[cfg(test)]
mod mock;

pub use driver::{Driver, State};
pub use render::{Gpu, Problem};
pub use settings::{RenderConfig, Settings};
pub use surface::{FrameRequest, Surface};
