//! Command interface between the pipeline core and a graphics backend.
//!
//! The core never talks to a graphics API directly. Every pass is expressed
//! as calls on [`GraphicsDevice`] (resources, fixed-function state, draws)
//! and on the device's [`ShaderProgram`] (named uniforms), issued in program
//! order on a single thread.

pub mod handle;
pub mod recording;
pub mod uniform_layout;
pub mod wgpu_device;
pub mod wgpu_program;

use bitflags::bitflags;
use thiserror::Error;

use crate::renderer::shader::ShaderProgram;

pub use handle::{
    FramebufferHandle, Handle, TextureHandle, UniformBufferHandle, VertexArrayHandle,
};
pub use recording::{Command, RecordingDevice, TextureKind};
pub use uniform_layout::{UniformKind, UniformLayout};
pub use wgpu_device::WgpuDevice;
pub use wgpu_program::{ProgramDescriptor, SampleKind, SampledTexture, WgpuProgram};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ClearFlags: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture2D,
    CubeMap,
}

impl TextureTarget {
    pub fn layer_count(self) -> u32 {
        match self {
            TextureTarget::Texture2D => 1,
            TextureTarget::CubeMap => 6,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DepthFunc {
    Less,
    LessEqual,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topology {
    Triangles,
    TriangleStrip,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    Rgba8Unorm,
    Rgba16Float,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn scaled(self, factor: u32) -> Self {
        Self {
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// One float vector attribute inside an interleaved vertex buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: u32,
    pub offset: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

pub struct VertexArrayDescriptor<'a> {
    pub label: &'a str,
    pub vertices: &'a [u8],
    pub layout: VertexLayout,
    pub indices: &'a [u32],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthAttachment {
    pub texture: TextureHandle,
    /// `None` attaches every layer (layered rendering), `Some(n)` a single face.
    pub layer: Option<u32>,
}

pub struct FramebufferDescriptor<'a> {
    pub label: &'a str,
    pub color: &'a [TextureHandle],
    pub depth: Option<DepthAttachment>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GpuError {
    #[error("framebuffer '{label}' is incomplete: {reason}")]
    IncompleteFramebuffer { label: String, reason: String },
    #[error("invalid {kind} handle #{index}")]
    InvalidHandle { kind: &'static str, index: usize },
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// A single logical GPU command stream.
///
/// Draw calls take the program explicitly: uniforms written through the
/// program before a draw are the ones that draw observes.
pub trait GraphicsDevice {
    type Program: ShaderProgram;

    fn create_depth_texture(&mut self, label: &str, target: TextureTarget, size: Extent)
        -> TextureHandle;
    fn create_color_texture(&mut self, label: &str, format: ColorFormat, size: Extent)
        -> TextureHandle;
    fn destroy_texture(&mut self, texture: TextureHandle);

    fn create_framebuffer(&mut self, desc: &FramebufferDescriptor<'_>) -> FramebufferHandle;
    fn check_framebuffer(&self, framebuffer: FramebufferHandle) -> Result<(), GpuError>;
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle);

    fn create_vertex_array(&mut self, desc: &VertexArrayDescriptor<'_>) -> VertexArrayHandle;
    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    fn create_uniform_buffer(&mut self, label: &str, size: u64, binding: u32)
        -> UniformBufferHandle;
    fn write_uniform_buffer(&mut self, buffer: UniformBufferHandle, offset: u64, data: &[u8]);

    /// Whether a cube target can be rendered in one pass through all six layers.
    fn supports_layered_rendering(&self) -> bool;

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>);
    fn set_viewport(&mut self, size: Extent);
    fn set_clear_color(&mut self, color: [f32; 4]);
    fn clear(&mut self, flags: ClearFlags);
    fn set_depth_test(&mut self, enabled: bool);
    fn set_depth_func(&mut self, func: DepthFunc);
    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: Option<TextureHandle>);
    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>);

    fn draw_arrays(&mut self, program: &mut Self::Program, topology: Topology, first: u32, count: u32);
    fn draw_elements(&mut self, program: &mut Self::Program, topology: Topology, count: u32);

    /// Pops the oldest pending diagnostic, if any.
    fn take_error(&mut self) -> Option<GpuError>;
}
