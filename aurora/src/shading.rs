//! The aurora fragment program, evaluated on the CPU.
//!
//! Mirrors `main` in `shaders/aurora.frag`. Useful for checking properties of
//! the shading (range, determinism) without a GPU.

use crate::noise::fbm;
use crate::settings::RenderConfig;

type Vec2 = [f32; 2];
type Vec3 = [f32; 3];

const PRIMARY_GLOW_RADIUS: f32 = 0.5;
const SECONDARY_GLOW_RADIUS: f32 = 0.4;

const PRIMARY_GLOW_WEIGHT: f32 = 0.25;
const SECONDARY_GLOW_WEIGHT: f32 = 0.18;
const NOISE_WEIGHT: f32 = 0.12;

pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn mix(from: Vec3, to: Vec3, weight: f32) -> Vec3 {
    let weight = weight.clamp(0.0, 1.0);
    [
        from[0] + (to[0] - from[0]) * weight,
        from[1] + (to[1] - from[1]) * weight,
        from[2] + (to[2] - from[2]) * weight,
    ]
}

fn distance(a: Vec2, b: Vec2) -> f32 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

/// Three drifting fBm layers blended into a single value in `[0, 1]`.
///
/// `t` is the elapsed time already multiplied by the speed.
pub fn combined_noise(uv: Vec2, t: f32) -> f32 {
    let [u, v] = uv;
    let noise1 = fbm(u * 2.0 + t * 0.1, v * 2.0 + t * 0.05);
    let noise2 = fbm(u * 1.5 - t * 0.08, v * 1.5 + t * 0.12);
    let noise3 = fbm(u * 3.0 + t * 0.05, v * 3.0 - t * 0.03);

    let combined = noise1 * 0.5 + noise2 * 0.3 + noise3 * 0.2;
    smoothstep(-0.5, 0.8, combined)
}

/// Centers of the primary and secondary glow, orbiting slowly.
pub fn glow_centers(t: f32) -> (Vec2, Vec2) {
    (
        [0.3 + (t * 0.2).sin() * 0.1, 0.4 + (t * 0.15).cos() * 0.1],
        [0.7 + (t * 0.18).cos() * 0.1, 0.6 + (t * 0.22).sin() * 0.1],
    )
}

pub fn vignette(uv: Vec2) -> f32 {
    let falloff = 1.0 - smoothstep(0.5, 1.5, distance(uv, [0.5, 0.5]) * 1.2);
    0.95 + falloff * 0.05
}

/// The color of the pixel at `uv` (normalized screen coordinates),
/// `elapsed` seconds after the pipeline started.
pub fn shade(config: &RenderConfig, uv: Vec2, elapsed: f32) -> Vec3 {
    let t = elapsed * config.speed;
    let intensity = config.intensity;
    let primary = config.color_primary.to_array();
    let secondary = config.color_secondary.to_array();

    let (center1, center2) = glow_centers(t);
    let glow1 = 1.0 - smoothstep(0.0, PRIMARY_GLOW_RADIUS, distance(uv, center1));
    let glow2 = 1.0 - smoothstep(0.0, SECONDARY_GLOW_RADIUS, distance(uv, center2));

    let mut color = config.color_background.to_array();
    color = mix(color, primary, glow1 * PRIMARY_GLOW_WEIGHT * intensity);
    color = mix(color, secondary, glow2 * SECONDARY_GLOW_WEIGHT * intensity);
    color = mix(color, primary, combined_noise(uv, t) * NOISE_WEIGHT * intensity);

    let vignette = vignette(uv);
    color.map(|channel| (channel * vignette).clamp(0.0, 1.0))
}
