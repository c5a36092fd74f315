use crate::render::Gpu;
use crate::settings::RenderConfig;
use crate::surface::SurfaceDimensions;
use rustc_hash::FxHashMap;

pub const TIME: &str = "uTime";
pub const RESOLUTION: &str = "uResolution";
pub const COLOR_PRIMARY: &str = "uColorPrimary";
pub const COLOR_SECONDARY: &str = "uColorSecondary";
pub const COLOR_BACKGROUND: &str = "uColorBackground";
pub const SPEED: &str = "uSpeed";
pub const INTENSITY: &str = "uIntensity";

pub const NAMES: [&str; 7] = [
    TIME,
    RESOLUTION,
    COLOR_PRIMARY,
    COLOR_SECONDARY,
    COLOR_BACKGROUND,
    SPEED,
    INTENSITY,
];

/// Uniform locations, looked up once when the program is linked.
///
/// A uniform the program doesn't declare (or that the compiler optimised
/// away) maps to `None` and is skipped when binding.
pub struct UniformLocations<G: Gpu> {
    locations: FxHashMap<&'static str, Option<G::UniformLocation>>,
}

impl<G: Gpu> UniformLocations<G> {
    pub fn new(context: &G, program: G::Program) -> Self {
        let locations = NAMES
            .iter()
            .map(|&name| (name, context.get_uniform_location(program, name)))
            .collect();

        Self { locations }
    }

    pub fn get(&self, name: &str) -> Option<&G::UniformLocation> {
        self.locations.get(name).and_then(Option::as_ref)
    }

    pub fn missing(&self) -> Vec<&'static str> {
        NAMES
            .iter()
            .copied()
            .filter(|name| self.get(name).is_none())
            .collect()
    }
}

/// Submit the frame's uniforms to the program currently in use.
pub fn bind<G: Gpu>(
    context: &G,
    locations: &UniformLocations<G>,
    config: &RenderConfig,
    elapsed: f32,
    dimensions: &SurfaceDimensions,
) {
    let set_float = |name: &str, value: f32| {
        if let Some(location) = locations.get(name) {
            context.uniform_1_f32(location, value);
        }
    };
    let set_color = |name: &str, [red, green, blue]: [f32; 3]| {
        if let Some(location) = locations.get(name) {
            context.uniform_3_f32(location, red, green, blue);
        }
    };

    set_float(TIME, elapsed);

    if let Some(location) = locations.get(RESOLUTION) {
        context.uniform_2_f32(
            location,
            dimensions.pixel_width as f32,
            dimensions.pixel_height as f32,
        );
    }

    set_color(COLOR_PRIMARY, config.color_primary.to_array());
    set_color(COLOR_SECONDARY, config.color_secondary.to_array());
    set_color(COLOR_BACKGROUND, config.color_background.to_array());
    set_float(SPEED, config.speed);
    set_float(INTENSITY, config.intensity);
}
