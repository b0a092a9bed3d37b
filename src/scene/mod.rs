pub mod camera;
pub mod model;
pub mod scene;
pub mod skybox;
pub mod transform;

pub use camera::Camera;
pub use model::Model;
pub use scene::Scene;
pub use skybox::Skybox;
pub use transform::Transform;
