use bytemuck::{Pod, Zeroable};
use std::mem;

use super::gpu::{VertexAttribute, VertexLayout};

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const ATTRS: [VertexAttribute; 3] = [
        VertexAttribute {
            location: 0,
            components: 3,
            offset: 0,
        },
        VertexAttribute {
            location: 1,
            components: 3,
            offset: 12,
        },
        VertexAttribute {
            location: 2,
            components: 2,
            offset: 24,
        },
    ];

    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: mem::size_of::<Vertex>() as u32,
            attributes: Self::ATTRS.to_vec(),
        }
    }
}

/// Position and texture coordinate of the full-screen quad.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct QuadVertex {
    pub pos: [f32; 3],
    pub uv: [f32; 2],
}

impl QuadVertex {
    pub const ATTRS: [VertexAttribute; 2] = [
        VertexAttribute {
            location: 0,
            components: 3,
            offset: 0,
        },
        VertexAttribute {
            location: 1,
            components: 2,
            offset: 12,
        },
    ];

    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: mem::size_of::<QuadVertex>() as u32,
            attributes: Self::ATTRS.to_vec(),
        }
    }
}

#[inline]
pub fn v(pos: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Vertex {
    Vertex { pos, normal, uv }
}
