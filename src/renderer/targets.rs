//! Offscreen targets of the deferred path: the geometry buffer, the HDR
//! lighting target with its bright output, and the ping-pong blur pair.

use super::gpu::{
    ColorFormat, DepthAttachment, Extent, FramebufferDescriptor, FramebufferHandle, GraphicsDevice,
    TextureHandle, TextureTarget,
};
use super::shader::ShaderProgram;
use super::slots::TextureUnits;

fn create_checked<D: GraphicsDevice>(
    device: &mut D,
    label: &str,
    color: &[TextureHandle],
    depth: Option<TextureHandle>,
) -> FramebufferHandle {
    let framebuffer = device.create_framebuffer(&FramebufferDescriptor {
        label,
        color,
        depth: depth.map(|texture| DepthAttachment {
            texture,
            layer: None,
        }),
    });
    if let Err(err) = device.check_framebuffer(framebuffer) {
        log::error!("{}", err);
    }
    framebuffer
}

#[derive(Debug)]
pub struct GBuffer {
    framebuffer: FramebufferHandle,
    position: TextureHandle,
    normal: TextureHandle,
    albedo_spec: TextureHandle,
    depth: TextureHandle,
}

impl GBuffer {
    pub const SAMPLERS: [&'static str; 3] = ["gPosition", "gNormal", "gAlbedoSpec"];

    pub fn new<D: GraphicsDevice>(device: &mut D, size: Extent) -> Self {
        let position = device.create_color_texture("gPosition", ColorFormat::Rgba16Float, size);
        let normal = device.create_color_texture("gNormal", ColorFormat::Rgba16Float, size);
        let albedo_spec = device.create_color_texture("gAlbedoSpec", ColorFormat::Rgba8Unorm, size);
        let depth = device.create_depth_texture("gDepth", TextureTarget::Texture2D, size);
        let framebuffer = create_checked(device, "GBuffer", &[position, normal, albedo_spec], Some(depth));

        Self {
            framebuffer,
            position,
            normal,
            albedo_spec,
            depth,
        }
    }

    pub fn framebuffer(&self) -> FramebufferHandle {
        self.framebuffer
    }

    pub fn outputs(&self) -> [TextureHandle; 3] {
        [self.position, self.normal, self.albedo_spec]
    }

    /// Binds the three outputs on the next free units.
    pub fn configure<D: GraphicsDevice>(&self, device: &mut D, program: &mut D::Program, units: &mut TextureUnits) {
        for (name, texture) in Self::SAMPLERS.iter().zip(self.outputs()) {
            let unit = units.allocate();
            device.bind_texture(unit, TextureTarget::Texture2D, Some(texture));
            program.set_int(name, unit as i32);
        }
    }

    fn release<D: GraphicsDevice>(&self, device: &mut D) {
        device.destroy_framebuffer(self.framebuffer);
        for texture in [self.position, self.normal, self.albedo_spec, self.depth] {
            device.destroy_texture(texture);
        }
    }
}

/// Lit colour plus the thresholded bright colour fed to the bloom blur.
#[derive(Debug)]
pub struct HdrTarget {
    framebuffer: FramebufferHandle,
    color: TextureHandle,
    bright: TextureHandle,
    depth: TextureHandle,
}

impl HdrTarget {
    pub fn new<D: GraphicsDevice>(device: &mut D, size: Extent) -> Self {
        let color = device.create_color_texture("HdrColor", ColorFormat::Rgba16Float, size);
        let bright = device.create_color_texture("HdrBright", ColorFormat::Rgba16Float, size);
        let depth = device.create_depth_texture("HdrDepth", TextureTarget::Texture2D, size);
        let framebuffer = create_checked(device, "HdrTarget", &[color, bright], Some(depth));

        Self {
            framebuffer,
            color,
            bright,
            depth,
        }
    }

    pub fn framebuffer(&self) -> FramebufferHandle {
        self.framebuffer
    }

    pub fn color(&self) -> TextureHandle {
        self.color
    }

    pub fn bright(&self) -> TextureHandle {
        self.bright
    }

    fn release<D: GraphicsDevice>(&self, device: &mut D) {
        device.destroy_framebuffer(self.framebuffer);
        for texture in [self.color, self.bright, self.depth] {
            device.destroy_texture(texture);
        }
    }
}

#[derive(Debug)]
pub struct PingPong {
    framebuffers: [FramebufferHandle; 2],
    colors: [TextureHandle; 2],
}

impl PingPong {
    pub fn new<D: GraphicsDevice>(device: &mut D, size: Extent) -> Self {
        let colors = [
            device.create_color_texture("PingPong0", ColorFormat::Rgba16Float, size),
            device.create_color_texture("PingPong1", ColorFormat::Rgba16Float, size),
        ];
        let framebuffers = [
            create_checked(device, "PingPong0", &colors[..1], None),
            create_checked(device, "PingPong1", &colors[1..], None),
        ];
        Self { framebuffers, colors }
    }

    pub fn framebuffer(&self, index: usize) -> FramebufferHandle {
        self.framebuffers[index & 1]
    }

    pub fn color(&self, index: usize) -> TextureHandle {
        self.colors[index & 1]
    }

    fn release<D: GraphicsDevice>(&self, device: &mut D) {
        for framebuffer in self.framebuffers {
            device.destroy_framebuffer(framebuffer);
        }
        for texture in self.colors {
            device.destroy_texture(texture);
        }
    }
}

#[derive(Debug)]
pub struct DeferredTargets {
    pub gbuffer: GBuffer,
    pub hdr: HdrTarget,
    pub pingpong: PingPong,
    size: Extent,
}

impl DeferredTargets {
    pub fn new<D: GraphicsDevice>(device: &mut D, size: Extent) -> Self {
        log::info!("Creating deferred targets at {}x{}", size.width, size.height);
        Self {
            gbuffer: GBuffer::new(device, size),
            hdr: HdrTarget::new(device, size),
            pingpong: PingPong::new(device, size),
            size,
        }
    }

    pub fn size(&self) -> Extent {
        self.size
    }

    /// Re-creates every target when the size changes.
    pub fn resize<D: GraphicsDevice>(&mut self, device: &mut D, size: Extent) {
        if size == self.size {
            return;
        }
        self.release(device);
        *self = Self::new(device, size);
    }

    pub fn release<D: GraphicsDevice>(&self, device: &mut D) {
        self.gbuffer.release(device);
        self.hdr.release(device);
        self.pingpong.release(device);
    }
}
