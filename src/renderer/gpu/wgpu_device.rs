//! [`GraphicsDevice`] on top of wgpu.
//!
//! State calls only update a shadow copy of the fixed-function state. Clears
//! are deferred until the next draw on the same target (or until the target
//! changes) and every draw is encoded as its own render pass, so passes land
//! in the command encoder in exactly the order they were issued.

use std::collections::{HashMap, VecDeque};

use wgpu::util::DeviceExt;

use super::wgpu_program::{PipelineKey, ProgramDescriptor, SampleKind, SampledTexture, WgpuProgram};
use super::{
    ClearFlags, ColorFormat, DepthAttachment, DepthFunc, Extent, FramebufferDescriptor,
    FramebufferHandle, GpuError, GraphicsDevice, Handle, TextureHandle, TextureTarget, Topology,
    UniformBufferHandle, VertexArrayDescriptor, VertexArrayHandle, VertexLayout,
};
use crate::renderer::uniforms::FrameConstants;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const FRAME_CONSTANTS_SIZE: u64 = std::mem::size_of::<FrameConstants>() as u64;

struct TextureResource {
    _texture: wgpu::Texture,
    sample_view: wgpu::TextureView,
    layer_views: Vec<wgpu::TextureView>,
}

struct TextureEntry {
    label: String,
    format: wgpu::TextureFormat,
    target: TextureTarget,
    size: Extent,
    /// `None` when the requested size could not be allocated.
    resource: Option<TextureResource>,
}

struct FramebufferEntry {
    label: String,
    color: Vec<TextureHandle>,
    depth: Option<DepthAttachment>,
}

struct VertexArrayEntry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: Option<wgpu::Buffer>,
    layout: VertexLayout,
}

struct DefaultTarget {
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    size: Extent,
    _depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
}

/// Views bound where a program samples a unit that holds nothing usable.
struct Fallbacks {
    _textures: Vec<wgpu::Texture>,
    flat_float: wgpu::TextureView,
    flat_depth: wgpu::TextureView,
    cube_float: wgpu::TextureView,
    cube_depth: wgpu::TextureView,
}

impl Fallbacks {
    fn new(device: &wgpu::Device) -> Self {
        let mut textures = Vec::with_capacity(4);
        let mut make = |label: &str, format: wgpu::TextureFormat, target: TextureTarget| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: target.layer_count(),
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            let view = texture.create_view(&sample_view_descriptor(target));
            textures.push(texture);
            view
        };

        let flat_float = make("FallbackFloat", wgpu::TextureFormat::Rgba16Float, TextureTarget::Texture2D);
        let flat_depth = make("FallbackDepth", DEPTH_FORMAT, TextureTarget::Texture2D);
        let cube_float = make("FallbackCubeFloat", wgpu::TextureFormat::Rgba16Float, TextureTarget::CubeMap);
        let cube_depth = make("FallbackCubeDepth", DEPTH_FORMAT, TextureTarget::CubeMap);

        Self {
            _textures: textures,
            flat_float,
            flat_depth,
            cube_float,
            cube_depth,
        }
    }

    fn view(&self, target: TextureTarget, sample: SampleKind) -> &wgpu::TextureView {
        match (target, sample) {
            (TextureTarget::Texture2D, SampleKind::Float) => &self.flat_float,
            (TextureTarget::Texture2D, SampleKind::Depth) => &self.flat_depth,
            (TextureTarget::CubeMap, SampleKind::Float) => &self.cube_float,
            (TextureTarget::CubeMap, SampleKind::Depth) => &self.cube_depth,
        }
    }
}

struct State {
    framebuffer: Option<FramebufferHandle>,
    viewport: Option<Extent>,
    clear_color: [f32; 4],
    pending_clear: ClearFlags,
    pending_clear_color: [f32; 4],
    depth_test: bool,
    depth_func: DepthFunc,
    units: HashMap<u32, (TextureTarget, TextureHandle)>,
    vertex_array: Option<VertexArrayHandle>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            framebuffer: None,
            viewport: None,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            pending_clear: ClearFlags::empty(),
            pending_clear_color: [0.0, 0.0, 0.0, 1.0],
            depth_test: false,
            depth_func: DepthFunc::Less,
            units: HashMap::new(),
            vertex_array: None,
        }
    }
}

struct ResolvedTarget {
    colors: Vec<wgpu::TextureView>,
    color_formats: Vec<wgpu::TextureFormat>,
    depth: Option<wgpu::TextureView>,
    depth_format: Option<wgpu::TextureFormat>,
    size: Extent,
}

enum DrawRange {
    Arrays { first: u32, count: u32 },
    Elements { count: u32 },
}

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    frame_layout: wgpu::BindGroupLayout,
    frame_bind_group: wgpu::BindGroup,
    filtering_sampler: wgpu::Sampler,
    point_sampler: wgpu::Sampler,
    fallbacks: Fallbacks,
    textures: Vec<Option<TextureEntry>>,
    framebuffers: Vec<Option<FramebufferEntry>>,
    vertex_arrays: Vec<Option<VertexArrayEntry>>,
    uniform_buffers: Vec<Option<wgpu::Buffer>>,
    default_target: Option<DefaultTarget>,
    encoder: Option<wgpu::CommandEncoder>,
    state: State,
    errors: VecDeque<GpuError>,
}

fn sample_view_descriptor(target: TextureTarget) -> wgpu::TextureViewDescriptor<'static> {
    match target {
        TextureTarget::Texture2D => wgpu::TextureViewDescriptor::default(),
        TextureTarget::CubeMap => wgpu::TextureViewDescriptor {
            dimension: Some(wgpu::TextureViewDimension::Cube),
            array_layer_count: Some(6),
            ..Default::default()
        },
    }
}

fn color_format(format: ColorFormat) -> wgpu::TextureFormat {
    match format {
        ColorFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        ColorFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
    }
}

fn sample_kind(format: wgpu::TextureFormat) -> SampleKind {
    if format.is_depth_stencil_format() {
        SampleKind::Depth
    } else {
        SampleKind::Float
    }
}

fn create_frame_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("FrameConstantsBindGroup"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    })
}

fn begin_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    target: &ResolvedTarget,
    clear: ClearFlags,
    clear_color: [f32; 4],
) -> wgpu::RenderPass<'e> {
    let color_ops = wgpu::Operations {
        load: if clear.contains(ClearFlags::COLOR) {
            wgpu::LoadOp::Clear(wgpu::Color {
                r: clear_color[0] as f64,
                g: clear_color[1] as f64,
                b: clear_color[2] as f64,
                a: clear_color[3] as f64,
            })
        } else {
            wgpu::LoadOp::Load
        },
        store: wgpu::StoreOp::Store,
    };
    let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = target
        .colors
        .iter()
        .map(|view| {
            Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: color_ops,
            })
        })
        .collect();
    let depth_stencil_attachment =
        target
            .depth
            .as_ref()
            .map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: if clear.contains(ClearFlags::DEPTH) {
                        wgpu::LoadOp::Clear(1.0)
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            });

    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("WgpuDevicePass"),
        color_attachments: &color_attachments,
        depth_stencil_attachment,
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("FrameConstantsLayout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(FRAME_CONSTANTS_SIZE),
                },
                count: None,
            }],
        });
        let default_constants = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("DefaultFrameConstants"),
            contents: bytemuck::bytes_of(&FrameConstants::default()),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let frame_bind_group = create_frame_bind_group(&device, &frame_layout, &default_constants);

        let filtering_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("LinearSampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let point_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("PointSampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });
        let fallbacks = Fallbacks::new(&device);

        Self {
            device,
            queue,
            frame_layout,
            frame_bind_group,
            filtering_sampler,
            point_sampler,
            fallbacks,
            textures: Vec::new(),
            framebuffers: Vec::new(),
            vertex_arrays: Vec::new(),
            uniform_buffers: Vec::new(),
            default_target: None,
            encoder: None,
            state: State::default(),
            errors: VecDeque::new(),
        }
    }

    /// Device on the default adapter with no surface attached.
    pub fn request_headless() -> Result<Self, GpuError> {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .map_err(|err| GpuError::Backend(err.to_string()))?;

            let (device, queue) = adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    experimental_features: wgpu::ExperimentalFeatures::disabled(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    trace: wgpu::Trace::Off,
                })
                .await
                .map_err(|err| GpuError::Backend(err.to_string()))?;

            log::info!("Using adapter {:?}", adapter.get_info().name);
            Ok(Self::new(device, queue))
        })
    }

    pub fn raw_device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn create_program(&self, desc: &ProgramDescriptor<'_>) -> WgpuProgram {
        WgpuProgram::new(&self.device, &self.frame_layout, desc)
    }

    /// Sets the view the default framebuffer (`bind_framebuffer(None)`)
    /// renders into for the coming frame.
    pub fn begin_frame(&mut self, view: wgpu::TextureView, format: wgpu::TextureFormat, size: Extent) {
        let reuse_depth = self
            .default_target
            .take()
            .filter(|target| target.size == size);

        let (depth, depth_view) = match reuse_depth {
            Some(target) => (target._depth, target.depth_view),
            None => {
                let depth = self.device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("DefaultDepth"),
                    size: wgpu::Extent3d {
                        width: size.width.max(1),
                        height: size.height.max(1),
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: DEPTH_FORMAT,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                });
                let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
                (depth, depth_view)
            }
        };

        self.default_target = Some(DefaultTarget {
            view,
            format,
            size,
            _depth: depth,
            depth_view,
        });
    }

    /// Encodes any outstanding clear and submits everything recorded so far.
    pub fn submit(&mut self) -> Option<wgpu::SubmissionIndex> {
        self.flush_clear();
        let encoder = self.encoder.take()?;
        Some(self.queue.submit(Some(encoder.finish())))
    }

    fn create_texture_entry(
        &mut self,
        label: &str,
        format: wgpu::TextureFormat,
        target: TextureTarget,
        size: Extent,
    ) -> TextureHandle {
        let max = self.device.limits().max_texture_dimension_2d;
        let allocatable = !size.is_empty()
            && size.width <= max
            && size.height <= max
            && (target == TextureTarget::Texture2D || size.width == size.height);

        let resource = if allocatable {
            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: size.width,
                    height: size.height,
                    depth_or_array_layers: target.layer_count(),
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            let sample_view = texture.create_view(&sample_view_descriptor(target));
            let layer_views = (0..target.layer_count())
                .map(|layer| {
                    texture.create_view(&wgpu::TextureViewDescriptor {
                        label: Some(label),
                        dimension: Some(wgpu::TextureViewDimension::D2),
                        base_array_layer: layer,
                        array_layer_count: Some(1),
                        ..Default::default()
                    })
                })
                .collect();
            Some(TextureResource {
                _texture: texture,
                sample_view,
                layer_views,
            })
        } else {
            log::warn!(
                "Texture '{}' ({}x{}, {:?}) cannot be allocated on this device (max {})",
                label,
                size.width,
                size.height,
                target,
                max
            );
            None
        };

        self.textures.push(Some(TextureEntry {
            label: label.to_owned(),
            format,
            target,
            size,
            resource,
        }));
        Handle::new(self.textures.len() - 1)
    }

    fn texture_entry(&self, texture: TextureHandle) -> Result<&TextureEntry, GpuError> {
        self.textures
            .get(texture.index())
            .and_then(Option::as_ref)
            .ok_or(GpuError::InvalidHandle {
                kind: "texture",
                index: texture.index(),
            })
    }

    fn framebuffer_entry(&self, framebuffer: FramebufferHandle) -> Result<&FramebufferEntry, GpuError> {
        self.framebuffers
            .get(framebuffer.index())
            .and_then(Option::as_ref)
            .ok_or(GpuError::InvalidHandle {
                kind: "framebuffer",
                index: framebuffer.index(),
            })
    }

    fn resolve_target(&self) -> Result<ResolvedTarget, GpuError> {
        let Some(handle) = self.state.framebuffer else {
            let target = self.default_target.as_ref().ok_or_else(|| {
                GpuError::InvalidOperation("default framebuffer used before begin_frame".to_owned())
            })?;
            return Ok(ResolvedTarget {
                colors: vec![target.view.clone()],
                color_formats: vec![target.format],
                depth: Some(target.depth_view.clone()),
                depth_format: Some(DEPTH_FORMAT),
                size: target.size,
            });
        };

        self.check_framebuffer(handle)?;
        let entry = self.framebuffer_entry(handle)?;
        let mut resolved = ResolvedTarget {
            colors: Vec::with_capacity(entry.color.len()),
            color_formats: Vec::with_capacity(entry.color.len()),
            depth: None,
            depth_format: None,
            size: Extent::new(0, 0),
        };
        for texture in &entry.color {
            let color = self.texture_entry(*texture)?;
            if let Some(resource) = &color.resource {
                resolved.colors.push(resource.layer_views[0].clone());
                resolved.color_formats.push(color.format);
                resolved.size = color.size;
            }
        }
        if let Some(attachment) = entry.depth {
            let depth = self.texture_entry(attachment.texture)?;
            if let Some(resource) = &depth.resource {
                let layer = attachment.layer.unwrap_or(0) as usize;
                resolved.depth = Some(resource.layer_views[layer].clone());
                resolved.depth_format = Some(depth.format);
                resolved.size = depth.size;
            }
        }
        Ok(resolved)
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("WgpuDeviceEncoder"),
            })
        })
    }

    /// Encodes a clear that no draw picked up.
    fn flush_clear(&mut self) {
        if self.state.pending_clear.is_empty() {
            return;
        }
        let clear = std::mem::take(&mut self.state.pending_clear);
        let clear_color = self.state.pending_clear_color;
        match self.resolve_target() {
            Ok(target) => {
                let encoder = self.encoder();
                drop(begin_pass(encoder, &target, clear, clear_color));
            }
            Err(err) => self.errors.push_back(err),
        }
    }

    fn texture_view_for(&self, unit: u32, decl: &SampledTexture) -> &wgpu::TextureView {
        let bound = self.state.units.get(&unit).and_then(|(target, handle)| {
            if *target != decl.target {
                return None;
            }
            let entry = self.textures.get(handle.index())?.as_ref()?;
            if entry.target != decl.target || sample_kind(entry.format) != decl.sample {
                return None;
            }
            entry.resource.as_ref().map(|resource| &resource.sample_view)
        });
        if bound.is_none() {
            log::trace!("No usable texture on unit {} for '{}'", unit, decl.name);
        }
        bound.unwrap_or_else(|| self.fallbacks.view(decl.target, decl.sample))
    }

    fn texture_bind_group(&self, program: &WgpuProgram) -> wgpu::BindGroup {
        let views: Vec<&wgpu::TextureView> = program
            .sampled_textures()
            .map(|(decl, unit)| self.texture_view_for(unit, decl))
            .collect();

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Sampler(&self.filtering_sampler),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&self.point_sampler),
            },
        ];
        for (i, view) in views.into_iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }

        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{}Textures", program.label())),
            layout: program.texture_layout(),
            entries: &entries,
        })
    }

    fn draw(&mut self, program: &mut WgpuProgram, topology: Topology, range: DrawRange) {
        let Some(va_handle) = self.state.vertex_array else {
            self.errors.push_back(GpuError::InvalidOperation(format!(
                "'{}' drawn without a bound vertex array",
                program.label()
            )));
            return;
        };
        let Some(layout) = self
            .vertex_arrays
            .get(va_handle.index())
            .and_then(Option::as_ref)
            .map(|va| va.layout.clone())
        else {
            self.errors.push_back(GpuError::InvalidHandle {
                kind: "vertex array",
                index: va_handle.index(),
            });
            return;
        };
        let target = match self.resolve_target() {
            Ok(target) => target,
            Err(err) => {
                self.errors.push_back(err);
                return;
            }
        };

        let viewport = self.state.viewport.unwrap_or(target.size);
        let width = viewport.width.min(target.size.width);
        let height = viewport.height.min(target.size.height);
        if width == 0 || height == 0 {
            log::debug!("Skipping '{}' draw into an empty viewport", program.label());
            return;
        }

        let key = PipelineKey {
            color_formats: target.color_formats.clone(),
            depth_format: target.depth_format,
            depth_test: self.state.depth_test,
            depth_func: self.state.depth_func,
            topology,
            vertex_layout: layout,
        };
        let uniforms = program.uniform_bind_group(&self.device);
        let textures = self.texture_bind_group(program);
        let clear = std::mem::take(&mut self.state.pending_clear);
        let clear_color = self.state.pending_clear_color;
        let pipeline = program.pipeline(&self.device, &key);

        let device = &self.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("WgpuDeviceEncoder"),
            })
        });
        let Some(va) = self.vertex_arrays.get(va_handle.index()).and_then(Option::as_ref) else {
            return;
        };

        let mut pass = begin_pass(encoder, &target, clear, clear_color);
        pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.frame_bind_group, &[]);
        pass.set_bind_group(1, &uniforms, &[]);
        pass.set_bind_group(2, &textures, &[]);
        pass.set_vertex_buffer(0, va.vertex_buffer.slice(..));
        match range {
            DrawRange::Arrays { first, count } => pass.draw(first..first + count, 0..1),
            DrawRange::Elements { count } => match &va.index_buffer {
                Some(indices) => {
                    pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(0..count, 0, 0..1);
                }
                None => {
                    drop(pass);
                    self.errors.push_back(GpuError::InvalidOperation(format!(
                        "'{}' indexed draw on a vertex array without indices",
                        program.label()
                    )));
                }
            },
        }
    }
}

impl GraphicsDevice for WgpuDevice {
    type Program = WgpuProgram;

    fn create_depth_texture(&mut self, label: &str, target: TextureTarget, size: Extent) -> TextureHandle {
        self.create_texture_entry(label, DEPTH_FORMAT, target, size)
    }

    fn create_color_texture(&mut self, label: &str, format: ColorFormat, size: Extent) -> TextureHandle {
        self.create_texture_entry(label, color_format(format), TextureTarget::Texture2D, size)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        match self.textures.get_mut(texture.index()).and_then(Option::take) {
            Some(entry) => log::debug!("Destroyed texture '{}'", entry.label),
            None => self.errors.push_back(GpuError::InvalidHandle {
                kind: "texture",
                index: texture.index(),
            }),
        }
        self.state.units.retain(|_, (_, bound)| *bound != texture);
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDescriptor<'_>) -> FramebufferHandle {
        self.framebuffers.push(Some(FramebufferEntry {
            label: desc.label.to_owned(),
            color: desc.color.to_vec(),
            depth: desc.depth,
        }));
        Handle::new(self.framebuffers.len() - 1)
    }

    fn check_framebuffer(&self, framebuffer: FramebufferHandle) -> Result<(), GpuError> {
        let entry = self.framebuffer_entry(framebuffer)?;
        let incomplete = |reason: String| GpuError::IncompleteFramebuffer {
            label: entry.label.clone(),
            reason,
        };

        if entry.color.is_empty() && entry.depth.is_none() {
            return Err(incomplete("no attachments".to_owned()));
        }

        let mut size = None;
        let attachments = entry
            .color
            .iter()
            .map(|texture| (*texture, Some(0)))
            .chain(entry.depth.map(|depth| (depth.texture, depth.layer)));
        for (texture, layer) in attachments {
            let attachment = self.texture_entry(texture)?;
            if attachment.resource.is_none() {
                return Err(incomplete(format!("attachment '{}' has no storage", attachment.label)));
            }
            match layer {
                Some(layer) if layer >= attachment.target.layer_count() => {
                    return Err(incomplete(format!(
                        "layer {} out of range for '{}'",
                        layer, attachment.label
                    )));
                }
                None if attachment.target == TextureTarget::CubeMap => {
                    return Err(incomplete(format!(
                        "layered attachment '{}' needs layered rendering",
                        attachment.label
                    )));
                }
                _ => {}
            }
            match size {
                Some(size) if size != attachment.size => {
                    return Err(incomplete("attachments differ in size".to_owned()));
                }
                _ => size = Some(attachment.size),
            }
        }
        Ok(())
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if self
            .framebuffers
            .get_mut(framebuffer.index())
            .and_then(Option::take)
            .is_none()
        {
            self.errors.push_back(GpuError::InvalidHandle {
                kind: "framebuffer",
                index: framebuffer.index(),
            });
        }
        if self.state.framebuffer == Some(framebuffer) {
            self.state.framebuffer = None;
            self.state.pending_clear = ClearFlags::empty();
        }
    }

    fn create_vertex_array(&mut self, desc: &VertexArrayDescriptor<'_>) -> VertexArrayHandle {
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(desc.label),
            contents: desc.vertices,
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = (!desc.indices.is_empty()).then(|| {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(desc.label),
                contents: bytemuck::cast_slice(desc.indices),
                usage: wgpu::BufferUsages::INDEX,
            })
        });
        self.vertex_arrays.push(Some(VertexArrayEntry {
            vertex_buffer,
            index_buffer,
            layout: desc.layout.clone(),
        }));
        Handle::new(self.vertex_arrays.len() - 1)
    }

    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        if self
            .vertex_arrays
            .get_mut(vertex_array.index())
            .and_then(Option::take)
            .is_none()
        {
            self.errors.push_back(GpuError::InvalidHandle {
                kind: "vertex array",
                index: vertex_array.index(),
            });
        }
        if self.state.vertex_array == Some(vertex_array) {
            self.state.vertex_array = None;
        }
    }

    fn create_uniform_buffer(&mut self, label: &str, size: u64, binding: u32) -> UniformBufferHandle {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size.max(FRAME_CONSTANTS_SIZE).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if binding == 0 {
            self.frame_bind_group = create_frame_bind_group(&self.device, &self.frame_layout, &buffer);
        } else {
            log::warn!(
                "Uniform buffer '{}' asks for binding {}; only binding 0 is shared with programs",
                label,
                binding
            );
        }
        self.uniform_buffers.push(Some(buffer));
        Handle::new(self.uniform_buffers.len() - 1)
    }

    fn write_uniform_buffer(&mut self, buffer: UniformBufferHandle, offset: u64, data: &[u8]) {
        let Some(target) = self.uniform_buffers.get(buffer.index()).and_then(Option::as_ref) else {
            self.errors.push_back(GpuError::InvalidHandle {
                kind: "uniform buffer",
                index: buffer.index(),
            });
            return;
        };
        let aligned = offset % wgpu::COPY_BUFFER_ALIGNMENT == 0
            && data.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT == 0;
        if !aligned || offset + data.len() as u64 > target.size() {
            self.errors.push_back(GpuError::InvalidOperation(format!(
                "uniform write of {} bytes at {} is misaligned or out of range",
                data.len(),
                offset
            )));
            return;
        }
        self.queue.write_buffer(target, offset, data);
    }

    fn supports_layered_rendering(&self) -> bool {
        false
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        if self.state.framebuffer != framebuffer {
            self.flush_clear();
        }
        self.state.framebuffer = framebuffer;
    }

    fn set_viewport(&mut self, size: Extent) {
        self.state.viewport = Some(size);
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.state.clear_color = color;
    }

    fn clear(&mut self, flags: ClearFlags) {
        if !self.state.pending_clear.is_empty() && self.state.pending_clear_color != self.state.clear_color {
            self.flush_clear();
        }
        self.state.pending_clear |= flags;
        self.state.pending_clear_color = self.state.clear_color;
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.state.depth_test = enabled;
    }

    fn set_depth_func(&mut self, func: DepthFunc) {
        self.state.depth_func = func;
    }

    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: Option<TextureHandle>) {
        match texture {
            Some(texture) => {
                self.state.units.insert(unit, (target, texture));
            }
            None => {
                self.state.units.remove(&unit);
            }
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>) {
        self.state.vertex_array = vertex_array;
    }

    fn draw_arrays(&mut self, program: &mut WgpuProgram, topology: Topology, first: u32, count: u32) {
        self.draw(program, topology, DrawRange::Arrays { first, count });
    }

    fn draw_elements(&mut self, program: &mut WgpuProgram, topology: Topology, count: u32) {
        self.draw(program, topology, DrawRange::Elements { count });
    }

    fn take_error(&mut self) -> Option<GpuError> {
        self.errors.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // requires a GPU adapter
    fn oversized_shadow_map_is_reported_incomplete() {
        let mut device = WgpuDevice::request_headless().expect("headless device");
        let size = device.raw_device().limits().max_texture_dimension_2d + 1;
        let texture = device.create_depth_texture("shadow", TextureTarget::Texture2D, Extent::new(size, size));
        let framebuffer = device.create_framebuffer(&FramebufferDescriptor {
            label: "shadow",
            color: &[],
            depth: Some(DepthAttachment {
                texture,
                layer: None,
            }),
        });

        assert!(matches!(
            device.check_framebuffer(framebuffer),
            Err(GpuError::IncompleteFramebuffer { .. })
        ));
    }

    #[test]
    #[ignore] // requires a GPU adapter
    fn cube_faces_are_individually_attachable() {
        let mut device = WgpuDevice::request_headless().expect("headless device");
        let texture = device.create_depth_texture("cube", TextureTarget::CubeMap, Extent::new(64, 64));

        let layered = device.create_framebuffer(&FramebufferDescriptor {
            label: "layered",
            color: &[],
            depth: Some(DepthAttachment {
                texture,
                layer: None,
            }),
        });
        assert!(device.check_framebuffer(layered).is_err());

        for face in 0..6 {
            let framebuffer = device.create_framebuffer(&FramebufferDescriptor {
                label: "face",
                color: &[],
                depth: Some(DepthAttachment {
                    texture,
                    layer: Some(face),
                }),
            });
            assert!(device.check_framebuffer(framebuffer).is_ok());
        }
    }

    #[test]
    #[ignore] // requires a GPU adapter
    fn clear_without_draw_is_submitted() {
        let mut device = WgpuDevice::request_headless().expect("headless device");
        let color = device.create_color_texture("hdr", ColorFormat::Rgba16Float, Extent::new(4, 4));
        let framebuffer = device.create_framebuffer(&FramebufferDescriptor {
            label: "hdr",
            color: &[color],
            depth: None,
        });
        device.bind_framebuffer(Some(framebuffer));
        device.set_clear_color([0.1, 0.1, 0.1, 1.0]);
        device.clear(ClearFlags::COLOR);

        assert!(device.submit().is_some());
        assert_eq!(device.take_error(), None);
    }
}
