// renderer/uniforms.rs
use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Camera matrices shared by every program through uniform binding 0.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct FrameConstants {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
}

impl FrameConstants {
    pub const BINDING: u32 = 0;

    pub fn new(projection: Mat4, view: Mat4) -> Self {
        Self {
            projection: projection.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
        }
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.projection)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.view)
    }
}

impl Default for FrameConstants {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY)
    }
}
