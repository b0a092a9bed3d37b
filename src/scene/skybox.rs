use crate::renderer::gpu::TextureHandle;

/// Environment cube map drawn behind the scene; rendered with the shared unit cube.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Skybox {
    cube_map: TextureHandle,
}

impl Skybox {
    pub fn new(cube_map: TextureHandle) -> Self {
        Self { cube_map }
    }

    pub fn cube_map(&self) -> TextureHandle {
        self.cube_map
    }
}
