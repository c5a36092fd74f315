// Common geometries

/// Two triangles covering clip space, as `(x, y)` pairs.
#[rustfmt::skip]
pub static PLANE_VERTICES: [f32; 12] = [
    -1.0, -1.0,
     1.0, -1.0,
    -1.0,  1.0,
    -1.0,  1.0,
     1.0, -1.0,
     1.0,  1.0,
];

pub const PLANE_VERTEX_COUNT: usize = PLANE_VERTICES.len() / 2;
