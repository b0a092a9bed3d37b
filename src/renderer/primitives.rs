use glam::Vec3;

use super::vertex::{v, QuadVertex, Vertex};

/// Faces as (normal, tangent, bitangent) with `tangent x bitangent == normal`,
/// which keeps every generated triangle counter-clockwise seen from outside.
const CUBE_FACES: [(Vec3, Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Z, Vec3::Y),
    (Vec3::NEG_X, Vec3::Z, Vec3::Y),
    (Vec3::Y, Vec3::X, Vec3::NEG_Z),
    (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    (Vec3::Z, Vec3::X, Vec3::Y),
    (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
];

/// Corner signs of the two triangles of a face.
const FACE_CORNERS: [(f32, f32); 6] = [
    (-1.0, -1.0),
    (1.0, -1.0),
    (1.0, 1.0),
    (-1.0, -1.0),
    (1.0, 1.0),
    (-1.0, 1.0),
];

/// Unit cube spanning -1..1 as 36 unindexed vertices.
pub fn cube_vertices() -> Vec<Vertex> {
    CUBE_FACES
        .iter()
        .flat_map(|&(normal, tangent, bitangent)| {
            FACE_CORNERS.iter().map(move |&(s, t)| {
                let pos = normal + tangent * s + bitangent * t;
                v(
                    pos.to_array(),
                    normal.to_array(),
                    [(s + 1.0) * 0.5, (1.0 - t) * 0.5],
                )
            })
        })
        .collect()
}

/// Full-screen quad drawn as a 4-vertex triangle strip.
pub fn quad_vertices() -> [QuadVertex; 4] {
    [
        QuadVertex {
            pos: [-1.0, 1.0, 0.0],
            uv: [0.0, 1.0],
        },
        QuadVertex {
            pos: [-1.0, -1.0, 0.0],
            uv: [0.0, 0.0],
        },
        QuadVertex {
            pos: [1.0, 1.0, 0.0],
            uv: [1.0, 1.0],
        },
        QuadVertex {
            pos: [1.0, -1.0, 0.0],
            uv: [1.0, 0.0],
        },
    ]
}
