use glam::{Mat4, Vec3};

#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
    /// Output aspect ratio, kept in sync with the viewport by `Scene::resize`.
    pub aspect: f32,
    /// Tonemapping exposure read by the composite pass.
    pub exposure: f32,
}

impl Camera {
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Depth maps near to 0 and far to 1, or the other way round when
    /// `reversed_depth` is set.
    pub fn projection(&self, reversed_depth: bool) -> Mat4 {
        if reversed_depth {
            Mat4::perspective_rh(self.fov_y_radians, self.aspect, self.far, self.near)
        } else {
            Mat4::perspective_rh(self.fov_y_radians, self.aspect, self.near, self.far)
        }
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection(false) * self.view()
    }

    pub fn position(&self) -> Vec3 {
        self.eye
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye).try_normalize().unwrap_or(Vec3::NEG_Z)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_radians: 45f32.to_radians(),
            near: 0.1,
            far: 100.0,
            aspect: 16.0 / 9.0,
            exposure: 1.0,
        }
    }
}
