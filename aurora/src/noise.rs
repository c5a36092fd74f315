// Host-side copies of the noise functions in `shaders/aurora.frag`. They
// follow the GLSL operation for operation, so the two can be compared.

#![allow(clippy::excessive_precision)]

const C: [f32; 4] = [
    0.211324865405187,  // (3 - sqrt(3)) / 6
    0.366025403784439,  // (sqrt(3) - 1) / 2
    -0.577350269189626, // -1 + 2 * C[0]
    0.024390243902439,  // 1 / 41
];

pub const OCTAVES: usize = 3;

// GLSL `mod`, which floors rather than truncates.
fn mod289(x: f32) -> f32 {
    x - 289.0 * (x / 289.0).floor()
}

fn permute(x: f32) -> f32 {
    mod289(((x * 34.0) + 1.0) * x)
}

fn fract(x: f32) -> f32 {
    x - x.floor()
}

/// 2D simplex noise in roughly `[-1, 1]`.
///
/// A pure function of its input: the permutation polynomial replaces a
/// random lookup table.
pub fn simplex(x: f32, y: f32) -> f32 {
    // Skew to find the simplex cell
    let skew = (x + y) * C[1];
    let i = [(x + skew).floor(), (y + skew).floor()];
    let unskew = (i[0] + i[1]) * C[0];
    let x0 = [x - i[0] + unskew, y - i[1] + unskew];

    let i1 = if x0[0] > x0[1] { [1.0, 0.0] } else { [0.0, 1.0] };
    let corners = [
        x0,
        [x0[0] + C[0] - i1[0], x0[1] + C[0] - i1[1]],
        [x0[0] + C[2], x0[1] + C[2]],
    ];

    let i = [mod289(i[0]), mod289(i[1])];
    let hashes = [
        permute(permute(i[1]) + i[0]),
        permute(permute(i[1] + i1[1]) + i[0] + i1[0]),
        permute(permute(i[1] + 1.0) + i[0] + 1.0),
    ];

    let total: f32 = corners
        .iter()
        .zip(hashes)
        .map(|(&[cx, cy], hash)| {
            let falloff = (0.5 - (cx * cx + cy * cy)).max(0.0);
            let falloff = falloff * falloff * falloff * falloff;

            // Gradients from 41 points on a line, mapped onto a diamond
            let gx = 2.0 * fract(hash * C[3]) - 1.0;
            let h = gx.abs() - 0.5;
            let a0 = gx - (gx + 0.5).floor();

            let normalised = falloff * (1.79284291400159 - 0.85373472095314 * (a0 * a0 + h * h));
            normalised * (a0 * cx + h * cy)
        })
        .sum();

    130.0 * total
}

/// Fractal sum of `OCTAVES` simplex octaves. Each octave doubles the
/// frequency and halves the amplitude.
pub fn fbm(x: f32, y: f32) -> f32 {
    let mut value = 0.0;
    let mut amplitude = 0.5;
    let mut frequency = 1.0;
    for _ in 0..OCTAVES {
        value += amplitude * simplex(x * frequency, y * frequency);
        amplitude *= 0.5;
        frequency *= 2.0;
    }
    value
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_grid() -> impl Iterator<Item = (f32, f32)> {
        (-20..20).flat_map(|i| (-20..20).map(move |j| (i as f32 * 0.37, j as f32 * 0.53)))
    }

    #[test]
    fn is_deterministic() {
        for (x, y) in sample_grid() {
            assert_eq!(simplex(x, y).to_bits(), simplex(x, y).to_bits());
            assert_eq!(fbm(x, y).to_bits(), fbm(x, y).to_bits());
        }
    }

    #[test]
    fn is_bounded() {
        // The 130 scale factor puts the extremes close to ±1.
        let bound = 1.05;
        for (x, y) in sample_grid() {
            let value = simplex(x, y);
            assert!(value.abs() <= bound, "simplex({}, {}) = {}", x, y, value);

            // Octave amplitudes sum to 0.875
            let value = fbm(x, y);
            assert!(value.abs() <= 0.875 * bound, "fbm({}, {}) = {}", x, y, value);
        }
    }

    #[test]
    fn is_continuous() {
        let step = 1e-3;
        for (x, y) in sample_grid() {
            let delta = (simplex(x + step, y) - simplex(x, y)).abs();
            assert!(delta < 0.05, "jump of {} at ({}, {})", delta, x, y);
        }
    }

    #[test]
    fn is_not_constant() {
        let values: Vec<f32> = sample_grid().map(|(x, y)| simplex(x, y)).collect();
        let min = values.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        assert!(max - min > 0.5);
    }
}
