use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;
use glam::{Mat4, Vec3};

use super::gpu::{GraphicsDevice, TextureTarget};
use super::shader::{array_uniform, ShaderProgram};
use super::shadows::{
    directional_shadow_matrix, point_shadow_matrices, spot_shadow_matrix, ShadowTarget,
    DIRECTIONAL_SHADOW_FAR, DIRECTIONAL_SHADOW_NEAR, POINT_SHADOW_FAR, POINT_SHADOW_NEAR,
    SPOT_SHADOW_FAR, SPOT_SHADOW_NEAR,
};
use crate::scene::Camera;

/// Lights are owned by the application and observed weakly by the scene.
pub type SharedLight = Rc<RefCell<Light>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LightType {
    Directional,
    Point,
    Spot,
    /// Spot light attached to the camera.
    Flash,
}

impl LightType {
    /// Prefix of the shader array this type is uploaded into.
    pub fn uniform_name(self) -> &'static str {
        match self {
            LightType::Directional => "dir",
            LightType::Point => "point",
            LightType::Spot | LightType::Flash => "spot",
        }
    }

    pub fn flag(self) -> LightTypes {
        match self {
            LightType::Directional => LightTypes::DIRECTIONAL,
            LightType::Point => LightTypes::POINT,
            LightType::Spot => LightTypes::SPOT,
            LightType::Flash => LightTypes::FLASH,
        }
    }

    pub fn shadow_target(self) -> TextureTarget {
        match self {
            LightType::Point => TextureTarget::CubeMap,
            _ => TextureTarget::Texture2D,
        }
    }
}

bitflags! {
    /// Set of light types, used to pick which lights a shadow pass renders.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct LightTypes: u8 {
        const DIRECTIONAL = 1 << 0;
        const POINT = 1 << 1;
        const SPOT = 1 << 2;
        const FLASH = 1 << 3;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightColor {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl LightColor {
    pub fn new(ambient: Vec3, diffuse: Vec3, specular: Vec3) -> Self {
        Self {
            ambient,
            diffuse,
            specular,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for Attenuation {
    fn default() -> Self {
        Self {
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        }
    }
}

/// Cone half angles in radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpotCone {
    pub inner: f32,
    pub outer: f32,
}

impl SpotCone {
    pub fn from_degrees(inner: f32, outer: f32) -> Self {
        Self {
            inner: inner.to_radians(),
            outer: outer.to_radians(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightKind {
    Directional {
        direction: Vec3,
    },
    Point {
        attenuation: Attenuation,
    },
    Spot {
        direction: Vec3,
        attenuation: Attenuation,
        cone: SpotCone,
    },
    Flash {
        direction: Vec3,
        attenuation: Attenuation,
        cone: SpotCone,
    },
}

impl LightKind {
    pub fn light_type(&self) -> LightType {
        match self {
            LightKind::Directional { .. } => LightType::Directional,
            LightKind::Point { .. } => LightType::Point,
            LightKind::Spot { .. } => LightType::Spot,
            LightKind::Flash { .. } => LightType::Flash,
        }
    }
}

pub struct Light {
    pub position: Vec3,
    pub color: LightColor,
    pub kind: LightKind,
    shadow: ShadowTarget,
    depth_map_index: u32,
    far_plane: f32,
}

impl Light {
    /// Creates the light together with its shadow target.
    pub fn new<D: GraphicsDevice>(
        device: &mut D,
        shadow_map_size: u32,
        position: Vec3,
        color: LightColor,
        kind: LightKind,
    ) -> Self {
        let light_type = kind.light_type();
        let label = format!("{:?}Shadow", light_type);
        let shadow = ShadowTarget::new(device, &label, light_type.shadow_target(), shadow_map_size);

        Self {
            position,
            color,
            kind,
            shadow,
            depth_map_index: 0,
            far_plane: POINT_SHADOW_FAR,
        }
    }

    pub fn into_shared(self) -> SharedLight {
        Rc::new(RefCell::new(self))
    }

    pub fn light_type(&self) -> LightType {
        self.kind.light_type()
    }

    pub fn shadow(&self) -> &ShadowTarget {
        &self.shadow
    }

    /// Texture unit of this light's shadow map; assigned when lights are configured.
    pub fn depth_map_index(&self) -> u32 {
        self.depth_map_index
    }

    pub(crate) fn set_depth_map_index(&mut self, index: u32) {
        self.depth_map_index = index;
    }

    pub fn far_plane(&self) -> f32 {
        self.far_plane
    }

    pub fn direction(&self) -> Option<Vec3> {
        match self.kind {
            LightKind::Directional { direction }
            | LightKind::Spot { direction, .. }
            | LightKind::Flash { direction, .. } => Some(direction),
            LightKind::Point { .. } => None,
        }
    }

    /// Near and far plane of the shadow projection.
    pub fn shadow_planes(&self) -> (f32, f32) {
        match self.kind {
            LightKind::Directional { .. } => (DIRECTIONAL_SHADOW_NEAR, DIRECTIONAL_SHADOW_FAR),
            LightKind::Point { .. } => (POINT_SHADOW_NEAR, POINT_SHADOW_FAR),
            LightKind::Spot { .. } | LightKind::Flash { .. } => (SPOT_SHADOW_NEAR, SPOT_SHADOW_FAR),
        }
    }

    /// World to light clip space for single-map lights.
    pub fn light_space_matrix(&self) -> Option<Mat4> {
        let aspect = self.shadow.size().aspect();
        match self.kind {
            LightKind::Directional { direction } => {
                Some(directional_shadow_matrix(self.position, direction))
            }
            LightKind::Spot { direction, cone, .. } | LightKind::Flash { direction, cone, .. } => {
                Some(spot_shadow_matrix(self.position, direction, cone.outer, aspect))
            }
            LightKind::Point { .. } => None,
        }
    }

    pub fn configure_shadow_matrices<P: ShaderProgram + ?Sized>(&mut self, program: &mut P) {
        match self.kind {
            LightKind::Point { .. } => {
                let matrices = point_shadow_matrices(self.position, self.shadow.size().aspect());
                self.far_plane = matrices.far;
                for (i, matrix) in matrices.view_projections().iter().enumerate() {
                    program.set_mat4(&format!("shadowMatrices[{i}]"), *matrix);
                }
                program.set_float("far", self.far_plane);
                program.set_vec3("lightPos", self.position);
            }
            _ => {
                let (_, far) = self.shadow_planes();
                self.far_plane = far;
                if let Some(light_space) = self.light_space_matrix() {
                    program.set_mat4("lightSpaceMatrix", light_space);
                }
            }
        }
    }

    pub fn active_shadow_tex<D: GraphicsDevice>(&self, device: &mut D) {
        device.bind_texture(
            self.depth_map_index,
            self.shadow.target(),
            Some(self.shadow.texture()),
        );
    }

    /// Uploads this light as element `index` of the `<type_name>s` array.
    pub fn configure<P: ShaderProgram + ?Sized>(&self, program: &mut P, type_name: &str, index: usize) {
        let field = |name: &str| array_uniform(type_name, index, name);

        program.set_vec3(&field("ambient"), self.color.ambient);
        program.set_vec3(&field("diffuse"), self.color.diffuse);
        program.set_vec3(&field("specular"), self.color.specular);
        program.set_int(&field("shadowMap"), self.depth_map_index as i32);

        match self.kind {
            LightKind::Directional { direction } => {
                program.set_vec3(&field("direction"), direction);
            }
            LightKind::Point { attenuation } => {
                program.set_vec3(&field("position"), self.position);
                set_attenuation(program, &field, attenuation);
                program.set_float(&field("farPlane"), self.far_plane);
            }
            LightKind::Spot {
                direction,
                attenuation,
                cone,
            }
            | LightKind::Flash {
                direction,
                attenuation,
                cone,
            } => {
                program.set_vec3(&field("position"), self.position);
                program.set_vec3(&field("direction"), direction);
                program.set_float(&field("cutOff"), cone.inner.cos());
                program.set_float(&field("outerCutOff"), cone.outer.cos());
                set_attenuation(program, &field, attenuation);
            }
        }

        if let Some(light_space) = self.light_space_matrix() {
            program.set_mat4(&field("lightSpaceMatrix"), light_space);
        }
    }

    /// Flash lights track the camera's position and view direction.
    pub fn follow_camera(&mut self, camera: &Camera) {
        if let LightKind::Flash { direction, .. } = &mut self.kind {
            self.position = camera.position();
            *direction = camera.forward();
        }
    }

    pub fn release<D: GraphicsDevice>(&self, device: &mut D) {
        self.shadow.release(device);
    }
}

fn set_attenuation<P, F>(program: &mut P, field: &F, attenuation: Attenuation)
where
    P: ShaderProgram + ?Sized,
    F: Fn(&str) -> String,
{
    program.set_float(&field("constant"), attenuation.constant);
    program.set_float(&field("linear"), attenuation.linear);
    program.set_float(&field("quadratic"), attenuation.quadratic);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::gpu::{Command, RecordingDevice};
    use crate::renderer::shader::UniformTable;

    fn white() -> LightColor {
        LightColor::new(Vec3::splat(0.05), Vec3::ONE, Vec3::ONE)
    }

    fn spot_kind() -> LightKind {
        LightKind::Spot {
            direction: Vec3::NEG_Y,
            attenuation: Attenuation::default(),
            cone: SpotCone::from_degrees(12.5, 17.5),
        }
    }

    #[test]
    fn point_light_uploads_six_shadow_matrices() {
        let mut device = RecordingDevice::new();
        let mut light = Light::new(
            &mut device,
            512,
            Vec3::new(1.0, 2.0, 3.0),
            white(),
            LightKind::Point {
                attenuation: Attenuation::default(),
            },
        );
        let mut program = UniformTable::new("depth");
        light.configure_shadow_matrices(&mut program);

        for i in 0..6 {
            assert!(program.mat4(&format!("shadowMatrices[{i}]")).is_some());
        }
        assert!(!program.contains("shadowMatrices[6]"));
        assert_eq!(program.float("far"), Some(POINT_SHADOW_FAR));
        assert_eq!(program.vec3("lightPos"), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(light.far_plane(), POINT_SHADOW_FAR);
    }

    #[test]
    fn spot_light_configures_cone_cosines() {
        let mut device = RecordingDevice::new();
        let light = Light::new(&mut device, 512, Vec3::Y, white(), spot_kind());
        let mut program = UniformTable::new("lighting");
        light.configure(&mut program, "spot", 1);

        let cut_off = program.float("spots[1].cutOff").unwrap();
        assert!((cut_off - 12.5f32.to_radians().cos()).abs() < 1e-6);
        assert!(program.float("spots[1].outerCutOff").unwrap() < cut_off);
        assert_eq!(program.float("spots[1].constant"), Some(1.0));
        assert!(program.contains("spots[1].lightSpaceMatrix"));
        assert!(!program.contains("spots[1].farPlane"));
    }

    #[test]
    fn shadow_texture_is_bound_at_depth_map_index() {
        let mut device = RecordingDevice::new();
        let mut light = Light::new(
            &mut device,
            256,
            Vec3::ZERO,
            white(),
            LightKind::Point {
                attenuation: Attenuation::default(),
            },
        );
        light.set_depth_map_index(3);
        device.clear_commands();
        light.active_shadow_tex(&mut device);

        assert_eq!(
            device.commands(),
            &[Command::BindTexture {
                unit: 3,
                target: TextureTarget::CubeMap,
                texture: Some(light.shadow().texture()),
            }]
        );
    }

    #[test]
    fn only_flash_lights_follow_the_camera() {
        let mut device = RecordingDevice::new();
        let camera = Camera {
            eye: Vec3::new(0.0, 1.0, 5.0),
            target: Vec3::new(0.0, 1.0, 0.0),
            ..Camera::default()
        };

        let mut flash = Light::new(
            &mut device,
            128,
            Vec3::ZERO,
            white(),
            LightKind::Flash {
                direction: Vec3::X,
                attenuation: Attenuation::default(),
                cone: SpotCone::from_degrees(10.0, 15.0),
            },
        );
        let mut spot = Light::new(&mut device, 128, Vec3::ZERO, white(), spot_kind());
        flash.follow_camera(&camera);
        spot.follow_camera(&camera);

        assert_eq!(flash.position, camera.eye);
        assert!(flash.direction().unwrap().abs_diff_eq(Vec3::NEG_Z, 1e-6));
        assert_eq!(spot.position, Vec3::ZERO);
    }

    #[test]
    fn flash_shares_the_spot_array() {
        assert_eq!(LightType::Flash.uniform_name(), "spot");
        assert_eq!(LightType::Point.shadow_target(), TextureTarget::CubeMap);
        assert!(LightTypes::all().contains(LightType::Flash.flag()));
    }
}
