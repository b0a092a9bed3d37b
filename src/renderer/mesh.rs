use super::gpu::{GraphicsDevice, Topology, VertexArrayDescriptor, VertexArrayHandle};
use super::lights::SharedLight;
use super::material::Material;
use super::slots::TextureUnits;
use super::vertex::Vertex;

/// Uploaded geometry with its materials.
#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    vertex_array: VertexArrayHandle,
    vertex_count: u32,
    index_count: u32,
    pub materials: Vec<Material>,
}

impl Mesh {
    pub fn upload<D: GraphicsDevice>(
        device: &mut D,
        name: &str,
        vertices: &[Vertex],
        indices: &[u32],
        materials: Vec<Material>,
    ) -> Self {
        let vertex_array = device.create_vertex_array(&VertexArrayDescriptor {
            label: name,
            vertices: bytemuck::cast_slice(vertices),
            layout: Vertex::layout(),
            indices,
        });
        log::debug!(
            "Uploaded mesh '{}' ({} vertices, {} indices, {} materials)",
            name,
            vertices.len(),
            indices.len(),
            materials.len()
        );

        Self {
            name: name.to_owned(),
            vertex_array,
            vertex_count: vertices.len() as u32,
            index_count: indices.len() as u32,
            materials,
        }
    }

    pub fn vertex_array(&self) -> VertexArrayHandle {
        self.vertex_array
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Shadow maps of `lights` occupy units `0..lights.len()`; material
    /// textures follow from there.
    pub fn draw<D: GraphicsDevice>(
        &self,
        device: &mut D,
        program: &mut D::Program,
        lights: &[SharedLight],
        with_materials: bool,
    ) {
        device.bind_vertex_array(Some(self.vertex_array));

        for light in lights {
            light.borrow().active_shadow_tex(device);
        }

        let mut units = TextureUnits::after_shadow_maps(lights.len());
        if with_materials {
            for (index, material) in self.materials.iter().enumerate() {
                material.configure(device, program, index, &mut units);
            }
        }

        if self.index_count > 0 {
            device.draw_elements(program, Topology::Triangles, self.index_count);
        } else {
            device.draw_arrays(program, Topology::Triangles, 0, self.vertex_count);
        }

        device.bind_vertex_array(None);
    }

    pub fn release<D: GraphicsDevice>(&self, device: &mut D) {
        device.destroy_vertex_array(self.vertex_array);
    }
}
