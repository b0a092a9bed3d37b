use glam::Vec3;

use super::gpu::{GraphicsDevice, TextureHandle, TextureTarget};
use super::shader::ShaderProgram;
use super::slots::TextureUnits;

/// What a material texture is sampled for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSemantic {
    Diffuse,
    Specular,
    Normal,
    Height,
}

impl TextureSemantic {
    pub fn uniform_name(self) -> &'static str {
        match self {
            TextureSemantic::Diffuse => "diffuseTex",
            TextureSemantic::Specular => "specularTex",
            TextureSemantic::Normal => "normalTex",
            TextureSemantic::Height => "heightTex",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaterialTexture {
    pub semantic: TextureSemantic,
    pub texture: TextureHandle,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub shininess: f32,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub textures: Vec<MaterialTexture>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            shininess: 32.0,
            diffuse: Vec3::splat(0.8),
            specular: Vec3::splat(0.5),
            textures: Vec::new(),
        }
    }
}

impl Material {
    pub fn new(shininess: f32, diffuse: Vec3, specular: Vec3) -> Self {
        Self {
            shininess,
            diffuse,
            specular,
            textures: Vec::new(),
        }
    }

    pub fn with_texture(mut self, semantic: TextureSemantic, texture: TextureHandle) -> Self {
        self.textures.push(MaterialTexture { semantic, texture });
        self
    }

    pub fn has_texture(&self, semantic: TextureSemantic) -> bool {
        self.textures.iter().any(|t| t.semantic == semantic)
    }

    /// Uploads `materials[index].*` and binds every texture on the next free unit.
    pub fn configure<D: GraphicsDevice>(
        &self,
        device: &mut D,
        program: &mut D::Program,
        index: usize,
        units: &mut TextureUnits,
    ) {
        let field = |name: &str| format!("materials[{index}].{name}");

        program.set_float(&field("shininess"), self.shininess);
        program.set_vec3(&field("diffuseColor"), self.diffuse);
        program.set_vec3(&field("specularColor"), self.specular);
        program.set_bool(&field("hasDiffuseTex"), self.has_texture(TextureSemantic::Diffuse));
        program.set_bool(&field("hasSpecularTex"), self.has_texture(TextureSemantic::Specular));

        for texture in &self.textures {
            let unit = units.allocate();
            device.bind_texture(unit, TextureTarget::Texture2D, Some(texture.texture));
            program.set_int(&field(texture.semantic.uniform_name()), unit as i32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::gpu::{Handle, RecordingDevice};
    use crate::renderer::shader::UniformTable;

    #[test]
    fn presence_flags_follow_texture_list() {
        let material = Material::default().with_texture(TextureSemantic::Specular, Handle::new(7));
        let mut device = RecordingDevice::new();
        let mut program = UniformTable::new("forward");
        let mut units = TextureUnits::after_shadow_maps(2);
        material.configure(&mut device, &mut program, 0, &mut units);

        assert_eq!(program.bool("materials[0].hasDiffuseTex"), Some(false));
        assert_eq!(program.bool("materials[0].hasSpecularTex"), Some(true));
        assert_eq!(program.int("materials[0].specularTex"), Some(2));
        assert_eq!(units.allocated(), 1);
    }
}
