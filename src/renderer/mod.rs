pub mod blur;
pub mod gpu;
pub mod lights;
pub mod material;
pub mod mesh;
pub mod primitives;
pub mod renderer;
pub mod resources;
pub mod shader;
pub mod shadows;
pub mod slots;
pub mod targets;
pub mod uniforms;
pub mod vertex;

pub use blur::BlurSource;
pub use lights::{Attenuation, Light, LightColor, LightKind, LightType, LightTypes, SharedLight, SpotCone};
pub use material::{Material, MaterialTexture, TextureSemantic};
pub use mesh::Mesh;
pub use renderer::{DeferredPrograms, ForwardPrograms, RenderOptions, Renderer};
pub use shader::{ShaderProgram, UniformTable, UniformValue};
pub use shadows::ShadowTarget;
pub use slots::LightCounts;
pub use vertex::Vertex;
