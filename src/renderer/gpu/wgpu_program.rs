use std::collections::HashMap;

use super::uniform_layout::{UniformKind, UniformLayout};
use super::{DepthFunc, TextureTarget, Topology, VertexLayout};
use crate::renderer::shader::{ShaderProgram, UniformValue};

/// How a sampled texture binding is read by the shader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleKind {
    Float,
    Depth,
}

/// A texture the shader samples; its unit is chosen through the int uniform
/// of the same name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampledTexture {
    pub name: String,
    pub target: TextureTarget,
    pub sample: SampleKind,
}

impl SampledTexture {
    pub fn new(name: &str, target: TextureTarget, sample: SampleKind) -> Self {
        Self {
            name: name.to_owned(),
            target,
            sample,
        }
    }
}

/// WGSL program description.
///
/// Bind group 0 is the shared frame-constants block, group 1 the program's
/// own uniform block (laid out by `uniforms`) and group 2 holds a filtering
/// sampler at binding 0, a non-filtering sampler at binding 1 and the
/// sampled textures from binding 2 on, in declaration order.
pub struct ProgramDescriptor<'a> {
    pub label: &'a str,
    pub source: &'a str,
    pub vertex_entry: &'a str,
    pub fragment_entry: Option<&'a str>,
    pub uniforms: UniformLayout,
    pub textures: Vec<SampledTexture>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub(crate) color_formats: Vec<wgpu::TextureFormat>,
    pub(crate) depth_format: Option<wgpu::TextureFormat>,
    pub(crate) depth_test: bool,
    pub(crate) depth_func: DepthFunc,
    pub(crate) topology: Topology,
    pub(crate) vertex_layout: VertexLayout,
}

pub struct WgpuProgram {
    label: String,
    module: wgpu::ShaderModule,
    vertex_entry: String,
    fragment_entry: Option<String>,
    layout: UniformLayout,
    staging: Vec<u8>,
    textures: Vec<SampledTexture>,
    texture_units: Vec<u32>,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl WgpuProgram {
    pub(crate) fn new(
        device: &wgpu::Device,
        frame_layout: &wgpu::BindGroupLayout,
        desc: &ProgramDescriptor<'_>,
    ) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(desc.source.into()),
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{}UniformLayout", desc.label)),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let mut texture_entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                count: None,
            },
        ];
        for (i, texture) in desc.textures.iter().enumerate() {
            texture_entries.push(wgpu::BindGroupLayoutEntry {
                binding: 2 + i as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: match texture.sample {
                        SampleKind::Float => wgpu::TextureSampleType::Float { filterable: true },
                        SampleKind::Depth => wgpu::TextureSampleType::Depth,
                    },
                    view_dimension: match texture.target {
                        TextureTarget::Texture2D => wgpu::TextureViewDimension::D2,
                        TextureTarget::CubeMap => wgpu::TextureViewDimension::Cube,
                    },
                    multisampled: false,
                },
                count: None,
            });
        }
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{}TextureLayout", desc.label)),
            entries: &texture_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{}PipelineLayout", desc.label)),
            bind_group_layouts: &[frame_layout, &uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        log::info!(
            "Created program '{}' ({} uniforms, {} sampled textures)",
            desc.label,
            desc.uniforms.len(),
            desc.textures.len()
        );

        Self {
            label: desc.label.to_owned(),
            module,
            vertex_entry: desc.vertex_entry.to_owned(),
            fragment_entry: desc.fragment_entry.map(str::to_owned),
            staging: vec![0; desc.uniforms.byte_size() as usize],
            layout: desc.uniforms.clone(),
            texture_units: vec![0; desc.textures.len()],
            textures: desc.textures.clone(),
            uniform_layout,
            texture_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn texture_layout(&self) -> &wgpu::BindGroupLayout {
        &self.texture_layout
    }

    pub(crate) fn sampled_textures(&self) -> impl Iterator<Item = (&SampledTexture, u32)> {
        self.textures.iter().zip(self.texture_units.iter().copied())
    }

    pub(crate) fn uniform_bytes(&self) -> &[u8] {
        &self.staging
    }

    /// Snapshot of the current uniform values for one draw.
    pub(crate) fn uniform_bind_group(&self, device: &wgpu::Device) -> wgpu::BindGroup {
        use wgpu::util::DeviceExt;

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}Uniforms", self.label)),
            contents: self.uniform_bytes(),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{}UniformBindGroup", self.label)),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        })
    }

    pub(crate) fn pipeline(&mut self, device: &wgpu::Device, key: &PipelineKey) -> &wgpu::RenderPipeline {
        if !self.pipelines.contains_key(key) {
            log::debug!("Building pipeline variant for '{}': {:?}", self.label, key);
            let pipeline = self.build_pipeline(device, key);
            self.pipelines.insert(key.clone(), pipeline);
        }
        &self.pipelines[key]
    }

    fn build_pipeline(&self, device: &wgpu::Device, key: &PipelineKey) -> wgpu::RenderPipeline {
        let attributes: Vec<wgpu::VertexAttribute> = key
            .vertex_layout
            .attributes
            .iter()
            .map(|attribute| wgpu::VertexAttribute {
                format: vertex_format(attribute.components),
                offset: attribute.offset as wgpu::BufferAddress,
                shader_location: attribute.location,
            })
            .collect();
        let buffers = [wgpu::VertexBufferLayout {
            array_stride: key.vertex_layout.stride as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &attributes,
        }];
        let targets: Vec<Option<wgpu::ColorTargetState>> = key
            .color_formats
            .iter()
            .map(|format| {
                Some(wgpu::ColorTargetState {
                    format: *format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&self.label),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.module,
                entry_point: Some(&self.vertex_entry),
                buffers: &buffers,
                compilation_options: Default::default(),
            },
            fragment: self
                .fragment_entry
                .as_deref()
                .map(|entry| wgpu::FragmentState {
                    module: &self.module,
                    entry_point: Some(entry),
                    targets: &targets,
                    compilation_options: Default::default(),
                }),
            primitive: wgpu::PrimitiveState {
                topology: match key.topology {
                    Topology::Triangles => wgpu::PrimitiveTopology::TriangleList,
                    Topology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
                },
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: key.depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: key.depth_test,
                depth_compare: if key.depth_test {
                    match key.depth_func {
                        DepthFunc::Less => wgpu::CompareFunction::Less,
                        DepthFunc::LessEqual => wgpu::CompareFunction::LessEqual,
                    }
                } else {
                    wgpu::CompareFunction::Always
                },
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) {
        let start = offset as usize;
        self.staging[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

impl ShaderProgram for WgpuProgram {
    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        if let UniformValue::Int(unit) = value {
            if let Some(index) = self.textures.iter().position(|texture| texture.name == name) {
                self.texture_units[index] = unit.max(0) as u32;
                return;
            }
        }

        let Some(slot) = self.layout.slot(name) else {
            log::trace!("{}: no active uniform '{}'", self.label, name);
            return;
        };

        match (slot.kind, value) {
            (UniformKind::Float, UniformValue::Float(v)) => self.write(slot.offset, bytemuck::bytes_of(&v)),
            (UniformKind::Int, UniformValue::Int(v)) => self.write(slot.offset, bytemuck::bytes_of(&v)),
            (UniformKind::Bool, UniformValue::Bool(v)) => {
                self.write(slot.offset, bytemuck::bytes_of(&u32::from(v)))
            }
            (UniformKind::Vec3, UniformValue::Vec3(v)) => {
                self.write(slot.offset, bytemuck::cast_slice(&v.to_array()))
            }
            (UniformKind::Mat4, UniformValue::Mat4(m)) => {
                self.write(slot.offset, bytemuck::cast_slice(&m.to_cols_array()))
            }
            (kind, value) => log::warn!(
                "{}: uniform '{}' is {:?}, ignoring {:?}",
                self.label,
                name,
                kind,
                value
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::gpu::WgpuDevice;

    const COMPOSITE_VS: &str = r#"
struct Params {
    exposure: f32,
    hdr: u32,
}
@group(1) @binding(0) var<uniform> params: Params;

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    return vec4<f32>(f32(index), params.exposure, f32(params.hdr), 1.0);
}
"#;

    #[test]
    #[ignore] // requires a GPU adapter
    fn uniforms_land_at_their_layout_offsets() {
        let device = WgpuDevice::request_headless().expect("headless device");
        let mut program = device.create_program(&ProgramDescriptor {
            label: "composite",
            source: COMPOSITE_VS,
            vertex_entry: "vs_main",
            fragment_entry: None,
            uniforms: UniformLayout::new()
                .field("exposure", UniformKind::Float)
                .field("hdr", UniformKind::Bool),
            textures: vec![SampledTexture::new("hdrColor", TextureTarget::Texture2D, SampleKind::Float)],
        });

        program.set_float("exposure", 2.5);
        program.set_bool("hdr", true);
        program.set_int("hdrColor", 3);
        program.set_float("missing", 1.0);

        let bytes = program.uniform_bytes();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[0..4], bytemuck::bytes_of(&2.5f32));
        assert_eq!(&bytes[4..8], bytemuck::bytes_of(&1u32));
        let units: Vec<u32> = program.sampled_textures().map(|(_, unit)| unit).collect();
        assert_eq!(units, vec![3]);
    }
}
