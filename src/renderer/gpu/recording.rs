//! Backend that records the command stream instead of executing it.
//!
//! Handles are allocated sequentially per resource kind. Framebuffers are
//! reported incomplete when an attachment is empty, larger than the
//! configured maximum, or when failure simulation is switched on.

use std::collections::{HashMap, VecDeque};

use super::{
    ClearFlags, ColorFormat, DepthFunc, Extent, FramebufferDescriptor, FramebufferHandle,
    GpuError, GraphicsDevice, Handle, TextureHandle, TextureTarget, Topology, UniformBufferHandle,
    VertexArrayDescriptor, VertexArrayHandle,
};
use crate::renderer::shader::UniformTable;

const DEFAULT_MAX_TEXTURE_SIZE: u32 = 8192;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureKind {
    Depth(TextureTarget),
    Color(ColorFormat),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    CreateTexture {
        texture: TextureHandle,
        kind: TextureKind,
        size: Extent,
    },
    DestroyTexture(TextureHandle),
    CreateFramebuffer {
        framebuffer: FramebufferHandle,
        label: String,
    },
    DestroyFramebuffer(FramebufferHandle),
    CreateVertexArray {
        vertex_array: VertexArrayHandle,
        label: String,
        vertex_count: u32,
        index_count: u32,
    },
    DestroyVertexArray(VertexArrayHandle),
    CreateUniformBuffer {
        buffer: UniformBufferHandle,
        binding: u32,
        size: u64,
    },
    WriteUniformBuffer {
        buffer: UniformBufferHandle,
        offset: u64,
        len: usize,
    },
    BindFramebuffer(Option<FramebufferHandle>),
    SetViewport(Extent),
    SetClearColor([f32; 4]),
    Clear(ClearFlags),
    SetDepthTest(bool),
    SetDepthFunc(DepthFunc),
    BindTexture {
        unit: u32,
        target: TextureTarget,
        texture: Option<TextureHandle>,
    },
    BindVertexArray(Option<VertexArrayHandle>),
    Draw {
        program: String,
        framebuffer: Option<FramebufferHandle>,
        vertex_array: Option<VertexArrayHandle>,
        topology: Topology,
        first: u32,
        count: u32,
        indexed: bool,
    },
}

#[derive(Clone, Copy, Debug)]
struct TextureRecord {
    kind: TextureKind,
    size: Extent,
}

#[derive(Clone, Debug)]
struct FramebufferRecord {
    label: String,
    attachments: Vec<TextureHandle>,
}

pub struct RecordingDevice {
    commands: Vec<Command>,
    textures: HashMap<usize, TextureRecord>,
    framebuffers: HashMap<usize, FramebufferRecord>,
    vertex_arrays: HashMap<usize, u32>,
    uniform_buffers: HashMap<usize, Vec<u8>>,
    next_texture: usize,
    next_framebuffer: usize,
    next_vertex_array: usize,
    next_uniform_buffer: usize,
    bound_framebuffer: Option<FramebufferHandle>,
    bound_vertex_array: Option<VertexArrayHandle>,
    layered_rendering: bool,
    max_texture_size: u32,
    fail_framebuffers: bool,
    errors: VecDeque<GpuError>,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            uniform_buffers: HashMap::new(),
            next_texture: 0,
            next_framebuffer: 0,
            next_vertex_array: 0,
            next_uniform_buffer: 0,
            bound_framebuffer: None,
            bound_vertex_array: None,
            layered_rendering: true,
            max_texture_size: DEFAULT_MAX_TEXTURE_SIZE,
            fail_framebuffers: false,
            errors: VecDeque::new(),
        }
    }

    /// Behave like a backend that renders cube faces one at a time.
    pub fn without_layered_rendering(mut self) -> Self {
        self.layered_rendering = false;
        self
    }

    pub fn with_max_texture_size(mut self, size: u32) -> Self {
        self.max_texture_size = size;
        self
    }

    /// Every framebuffer created from now on reports itself incomplete.
    pub fn with_incomplete_framebuffers(mut self) -> Self {
        self.fail_framebuffers = true;
        self
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, Command::Draw { .. }))
            .count()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn texture_kind(&self, texture: TextureHandle) -> Option<TextureKind> {
        self.textures.get(&texture.index()).map(|record| record.kind)
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    pub fn uniform_buffer_contents(&self, buffer: UniformBufferHandle) -> Option<&[u8]> {
        self.uniform_buffers.get(&buffer.index()).map(Vec::as_slice)
    }

    pub fn push_error(&mut self, error: GpuError) {
        self.errors.push_back(error);
    }

    fn validate_attachment(&self, texture: TextureHandle) -> Result<(), String> {
        let Some(record) = self.textures.get(&texture.index()) else {
            return Err(format!("attachment {texture:?} does not exist"));
        };
        if record.size.is_empty() {
            return Err(format!("attachment {texture:?} has zero size"));
        }
        if record.size.width > self.max_texture_size || record.size.height > self.max_texture_size
        {
            return Err(format!(
                "attachment {:?} is {}x{}, above the {} limit",
                texture, record.size.width, record.size.height, self.max_texture_size
            ));
        }
        Ok(())
    }

    fn record_draw(&mut self, program: &UniformTable, topology: Topology, first: u32, count: u32, indexed: bool) {
        if self.bound_vertex_array.is_none() {
            self.errors.push_back(GpuError::InvalidOperation(
                "draw issued without a bound vertex array".to_owned(),
            ));
        }
        self.commands.push(Command::Draw {
            program: program.label().to_owned(),
            framebuffer: self.bound_framebuffer,
            vertex_array: self.bound_vertex_array,
            topology,
            first,
            count,
            indexed,
        });
    }
}

impl GraphicsDevice for RecordingDevice {
    type Program = UniformTable;

    fn create_depth_texture(&mut self, _label: &str, target: TextureTarget, size: Extent) -> TextureHandle {
        let texture = Handle::new(self.next_texture);
        self.next_texture += 1;
        let kind = TextureKind::Depth(target);
        self.textures.insert(texture.index(), TextureRecord { kind, size });
        self.commands.push(Command::CreateTexture { texture, kind, size });
        texture
    }

    fn create_color_texture(&mut self, _label: &str, format: ColorFormat, size: Extent) -> TextureHandle {
        let texture = Handle::new(self.next_texture);
        self.next_texture += 1;
        let kind = TextureKind::Color(format);
        self.textures.insert(texture.index(), TextureRecord { kind, size });
        self.commands.push(Command::CreateTexture { texture, kind, size });
        texture
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture.index()).is_none() {
            self.errors.push_back(GpuError::InvalidHandle {
                kind: "texture",
                index: texture.index(),
            });
        }
        self.commands.push(Command::DestroyTexture(texture));
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDescriptor<'_>) -> FramebufferHandle {
        let framebuffer = Handle::new(self.next_framebuffer);
        self.next_framebuffer += 1;
        let mut attachments = desc.color.to_vec();
        if let Some(depth) = desc.depth {
            attachments.push(depth.texture);
        }
        self.framebuffers.insert(
            framebuffer.index(),
            FramebufferRecord {
                label: desc.label.to_owned(),
                attachments,
            },
        );
        self.commands.push(Command::CreateFramebuffer {
            framebuffer,
            label: desc.label.to_owned(),
        });
        framebuffer
    }

    fn check_framebuffer(&self, framebuffer: FramebufferHandle) -> Result<(), GpuError> {
        let record = self
            .framebuffers
            .get(&framebuffer.index())
            .ok_or(GpuError::InvalidHandle {
                kind: "framebuffer",
                index: framebuffer.index(),
            })?;

        let incomplete = |reason: String| GpuError::IncompleteFramebuffer {
            label: record.label.clone(),
            reason,
        };

        if self.fail_framebuffers {
            return Err(incomplete("simulated failure".to_owned()));
        }
        if record.attachments.is_empty() {
            return Err(incomplete("no attachments".to_owned()));
        }
        for texture in &record.attachments {
            self.validate_attachment(*texture).map_err(incomplete)?;
        }
        Ok(())
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if self.framebuffers.remove(&framebuffer.index()).is_none() {
            self.errors.push_back(GpuError::InvalidHandle {
                kind: "framebuffer",
                index: framebuffer.index(),
            });
        }
        if self.bound_framebuffer == Some(framebuffer) {
            self.bound_framebuffer = None;
        }
        self.commands.push(Command::DestroyFramebuffer(framebuffer));
    }

    fn create_vertex_array(&mut self, desc: &VertexArrayDescriptor<'_>) -> VertexArrayHandle {
        let vertex_array = Handle::new(self.next_vertex_array);
        self.next_vertex_array += 1;
        let stride = desc.layout.stride.max(1) as usize;
        let vertex_count = (desc.vertices.len() / stride) as u32;
        self.vertex_arrays.insert(vertex_array.index(), vertex_count);
        self.commands.push(Command::CreateVertexArray {
            vertex_array,
            label: desc.label.to_owned(),
            vertex_count,
            index_count: desc.indices.len() as u32,
        });
        vertex_array
    }

    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        if self.vertex_arrays.remove(&vertex_array.index()).is_none() {
            self.errors.push_back(GpuError::InvalidHandle {
                kind: "vertex array",
                index: vertex_array.index(),
            });
        }
        self.commands.push(Command::DestroyVertexArray(vertex_array));
    }

    fn create_uniform_buffer(&mut self, _label: &str, size: u64, binding: u32) -> UniformBufferHandle {
        let buffer = Handle::new(self.next_uniform_buffer);
        self.next_uniform_buffer += 1;
        self.uniform_buffers.insert(buffer.index(), vec![0; size as usize]);
        self.commands.push(Command::CreateUniformBuffer {
            buffer,
            binding,
            size,
        });
        buffer
    }

    fn write_uniform_buffer(&mut self, buffer: UniformBufferHandle, offset: u64, data: &[u8]) {
        let Some(contents) = self.uniform_buffers.get_mut(&buffer.index()) else {
            self.errors.push_back(GpuError::InvalidHandle {
                kind: "uniform buffer",
                index: buffer.index(),
            });
            return;
        };
        let start = offset as usize;
        let end = start + data.len();
        if end > contents.len() {
            self.errors.push_back(GpuError::InvalidOperation(format!(
                "write of {} bytes at {} overflows a {} byte buffer",
                data.len(),
                offset,
                contents.len()
            )));
            return;
        }
        contents[start..end].copy_from_slice(data);
        self.commands.push(Command::WriteUniformBuffer {
            buffer,
            offset,
            len: data.len(),
        });
    }

    fn supports_layered_rendering(&self) -> bool {
        self.layered_rendering
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.bound_framebuffer = framebuffer;
        self.commands.push(Command::BindFramebuffer(framebuffer));
    }

    fn set_viewport(&mut self, size: Extent) {
        self.commands.push(Command::SetViewport(size));
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.commands.push(Command::SetClearColor(color));
    }

    fn clear(&mut self, flags: ClearFlags) {
        self.commands.push(Command::Clear(flags));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.commands.push(Command::SetDepthTest(enabled));
    }

    fn set_depth_func(&mut self, func: DepthFunc) {
        self.commands.push(Command::SetDepthFunc(func));
    }

    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: Option<TextureHandle>) {
        self.commands.push(Command::BindTexture {
            unit,
            target,
            texture,
        });
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>) {
        self.bound_vertex_array = vertex_array;
        self.commands.push(Command::BindVertexArray(vertex_array));
    }

    fn draw_arrays(&mut self, program: &mut UniformTable, topology: Topology, first: u32, count: u32) {
        self.record_draw(program, topology, first, count, false);
    }

    fn draw_elements(&mut self, program: &mut UniformTable, topology: Topology, count: u32) {
        self.record_draw(program, topology, 0, count, true);
    }

    fn take_error(&mut self) -> Option<GpuError> {
        self.errors.pop_front()
    }
}
