use super::transform::Transform;
use crate::renderer::gpu::GraphicsDevice;
use crate::renderer::lights::SharedLight;
use crate::renderer::mesh::Mesh;
use crate::renderer::shader::ShaderProgram;

#[derive(Debug)]
pub struct Model {
    pub name: String,
    pub transform: Transform,
    pub meshes: Vec<Mesh>,
}

impl Model {
    pub fn new(name: &str, meshes: Vec<Mesh>) -> Self {
        Self {
            name: name.to_owned(),
            transform: Transform::default(),
            meshes,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn draw<D: GraphicsDevice>(
        &self,
        device: &mut D,
        program: &mut D::Program,
        lights: &[SharedLight],
        with_materials: bool,
    ) {
        program.set_mat4("model", self.transform.matrix());
        for mesh in &self.meshes {
            mesh.draw(device, program, lights, with_materials);
        }
    }

    pub fn release<D: GraphicsDevice>(&self, device: &mut D) {
        for mesh in &self.meshes {
            mesh.release(device);
        }
    }
}
