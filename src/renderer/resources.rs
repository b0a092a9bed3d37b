use super::gpu::{GraphicsDevice, Topology, UniformBufferHandle, VertexArrayDescriptor, VertexArrayHandle};
use super::primitives::{cube_vertices, quad_vertices};
use super::uniforms::FrameConstants;
use super::vertex::{QuadVertex, Vertex};

pub const CUBE_VERTEX_COUNT: u32 = 36;
pub const QUAD_VERTEX_COUNT: u32 = 4;

/// Geometry and buffers shared by every pass, created once per renderer.
#[derive(Debug)]
pub struct RenderResources {
    cube: VertexArrayHandle,
    quad: VertexArrayHandle,
    frame_constants: UniformBufferHandle,
}

impl RenderResources {
    pub fn new<D: GraphicsDevice>(device: &mut D) -> Self {
        let cube = cube_vertices();
        let cube = device.create_vertex_array(&VertexArrayDescriptor {
            label: "UnitCube",
            vertices: bytemuck::cast_slice(&cube),
            layout: Vertex::layout(),
            indices: &[],
        });

        let quad = quad_vertices();
        let quad = device.create_vertex_array(&VertexArrayDescriptor {
            label: "ScreenQuad",
            vertices: bytemuck::cast_slice(&quad),
            layout: QuadVertex::layout(),
            indices: &[],
        });

        let frame_constants = device.create_uniform_buffer(
            "FrameConstants",
            std::mem::size_of::<FrameConstants>() as u64,
            FrameConstants::BINDING,
        );

        log::info!("Created shared render resources");
        Self {
            cube,
            quad,
            frame_constants,
        }
    }

    pub fn cube(&self) -> VertexArrayHandle {
        self.cube
    }

    pub fn quad(&self) -> VertexArrayHandle {
        self.quad
    }

    pub fn frame_constants(&self) -> UniformBufferHandle {
        self.frame_constants
    }

    pub fn write_frame_constants<D: GraphicsDevice>(&self, device: &mut D, constants: &FrameConstants) {
        device.write_uniform_buffer(self.frame_constants, 0, bytemuck::bytes_of(constants));
    }

    pub fn draw_cube<D: GraphicsDevice>(&self, device: &mut D, program: &mut D::Program) {
        device.bind_vertex_array(Some(self.cube));
        device.draw_arrays(program, Topology::Triangles, 0, CUBE_VERTEX_COUNT);
        device.bind_vertex_array(None);
    }

    pub fn draw_quad<D: GraphicsDevice>(&self, device: &mut D, program: &mut D::Program) {
        device.bind_vertex_array(Some(self.quad));
        device.draw_arrays(program, Topology::TriangleStrip, 0, QUAD_VERTEX_COUNT);
        device.bind_vertex_array(None);
    }

    pub fn release<D: GraphicsDevice>(&self, device: &mut D) {
        device.destroy_vertex_array(self.cube);
        device.destroy_vertex_array(self.quad);
    }
}
