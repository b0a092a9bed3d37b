//! Shadow-map targets and the light-space transforms rendered into them.

use std::f32::consts::{FRAC_PI_2, PI};

use glam::{Mat4, Vec3};

use super::gpu::{
    DepthAttachment, Extent, FramebufferDescriptor, FramebufferHandle, GraphicsDevice,
    TextureHandle, TextureTarget,
};

pub const POINT_SHADOW_FOV: f32 = FRAC_PI_2;
pub const POINT_SHADOW_NEAR: f32 = 0.01;
pub const POINT_SHADOW_FAR: f32 = 5.0;

pub const SPOT_SHADOW_NEAR: f32 = 0.01;
pub const SPOT_SHADOW_FAR: f32 = 5.0;

pub const DIRECTIONAL_SHADOW_EXTENT: f32 = 10.0;
pub const DIRECTIONAL_SHADOW_NEAR: f32 = 1.0;
pub const DIRECTIONAL_SHADOW_FAR: f32 = 7.5;

/// Cube face order: +X, -X, +Y, -Y, +Z, -Z.
pub const CUBE_FACE_DIRECTIONS: [Vec3; 6] = [
    Vec3::X,
    Vec3::NEG_X,
    Vec3::Y,
    Vec3::NEG_Y,
    Vec3::Z,
    Vec3::NEG_Z,
];

pub const CUBE_FACE_UPS: [Vec3; 6] = [
    Vec3::NEG_Y,
    Vec3::NEG_Y,
    Vec3::Z,
    Vec3::NEG_Z,
    Vec3::NEG_Y,
    Vec3::NEG_Y,
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CubeShadowMatrices {
    pub projection: Mat4,
    pub views: [Mat4; 6],
    pub far: f32,
}

impl CubeShadowMatrices {
    pub fn view_projections(&self) -> [Mat4; 6] {
        self.views.map(|view| self.projection * view)
    }
}

pub fn point_shadow_matrices(position: Vec3, aspect: f32) -> CubeShadowMatrices {
    let projection = Mat4::perspective_rh(POINT_SHADOW_FOV, aspect, POINT_SHADOW_NEAR, POINT_SHADOW_FAR);

    let mut views = [Mat4::IDENTITY; 6];
    for ((view, dir), up) in views
        .iter_mut()
        .zip(CUBE_FACE_DIRECTIONS.iter())
        .zip(CUBE_FACE_UPS.iter())
    {
        *view = Mat4::look_at_rh(position, position + *dir, *up);
    }

    CubeShadowMatrices {
        projection,
        views,
        far: POINT_SHADOW_FAR,
    }
}

pub fn directional_shadow_matrix(position: Vec3, direction: Vec3) -> Mat4 {
    let direction = safe_normalize(direction, Vec3::NEG_Y);
    let view = Mat4::look_at_rh(position, position + direction, shadow_up(direction));
    let extent = DIRECTIONAL_SHADOW_EXTENT;
    let projection = Mat4::orthographic_rh(
        -extent,
        extent,
        -extent,
        extent,
        DIRECTIONAL_SHADOW_NEAR,
        DIRECTIONAL_SHADOW_FAR,
    );
    projection * view
}

/// Frustum covering the outer cone (`outer_angle` is the half angle).
pub fn spot_shadow_matrix(position: Vec3, direction: Vec3, outer_angle: f32, aspect: f32) -> Mat4 {
    let direction = safe_normalize(direction, Vec3::NEG_Z);
    let fov = (outer_angle * 2.0).clamp(0.1, PI - 0.1);
    let view = Mat4::look_at_rh(position, position + direction, shadow_up(direction));
    Mat4::perspective_rh(fov, aspect, SPOT_SHADOW_NEAR, SPOT_SHADOW_FAR) * view
}

fn safe_normalize(v: Vec3, fallback: Vec3) -> Vec3 {
    v.try_normalize().unwrap_or(fallback)
}

fn shadow_up(direction: Vec3) -> Vec3 {
    let up = Vec3::Y;
    if direction.abs().dot(up) > 0.95 {
        Vec3::Z
    } else {
        up
    }
}

/// Depth-only render target of one light.
///
/// A cube target is rendered either through one layered framebuffer or, on
/// devices without layered rendering, through one framebuffer per face.
#[derive(Debug)]
pub struct ShadowTarget {
    texture: TextureHandle,
    target: TextureTarget,
    size: Extent,
    passes: Vec<FramebufferHandle>,
    usable: bool,
}

impl ShadowTarget {
    pub fn new<D: GraphicsDevice>(device: &mut D, label: &str, target: TextureTarget, size: u32) -> Self {
        let extent = Extent::new(size, size);
        let texture = device.create_depth_texture(label, target, extent);

        let layers: Vec<Option<u32>> =
            if target == TextureTarget::CubeMap && !device.supports_layered_rendering() {
                (0..target.layer_count()).map(Some).collect()
            } else {
                vec![None]
            };
        let passes: Vec<FramebufferHandle> = layers
            .into_iter()
            .map(|layer| {
                device.create_framebuffer(&FramebufferDescriptor {
                    label,
                    color: &[],
                    depth: Some(DepthAttachment { texture, layer }),
                })
            })
            .collect();

        let mut usable = true;
        for framebuffer in &passes {
            if let Err(err) = device.check_framebuffer(*framebuffer) {
                log::error!("Shadow target '{}' is unusable: {}", label, err);
                usable = false;
                break;
            }
        }
        if usable {
            log::info!(
                "Created {:?} shadow target '{}' ({}x{}, {} pass(es))",
                target,
                label,
                size,
                size,
                passes.len()
            );
        }

        Self {
            texture,
            target,
            size: extent,
            passes,
            usable,
        }
    }

    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    pub fn target(&self) -> TextureTarget {
        self.target
    }

    pub fn size(&self) -> Extent {
        self.size
    }

    /// Framebuffers to render, in face order for per-face cube targets.
    pub fn passes(&self) -> &[FramebufferHandle] {
        &self.passes
    }

    pub fn is_per_face(&self) -> bool {
        self.passes.len() > 1
    }

    pub fn is_usable(&self) -> bool {
        self.usable
    }

    pub fn release<D: GraphicsDevice>(&self, device: &mut D) {
        for framebuffer in &self.passes {
            device.destroy_framebuffer(*framebuffer);
        }
        device.destroy_texture(self.texture);
    }
}
