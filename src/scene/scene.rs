use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::camera::Camera;
use super::model::Model;
use super::skybox::Skybox;
use crate::renderer::gpu::{Extent, GraphicsDevice};
use crate::renderer::lights::{Light, SharedLight};
use crate::renderer::targets::DeferredTargets;

/// Everything one frame renders.
///
/// Lights are held weakly: the application owns them, and a light it drops
/// simply stops being rendered.
pub struct Scene {
    models: Vec<Model>,
    lights: Vec<Weak<RefCell<Light>>>,
    camera: Rc<RefCell<Camera>>,
    skybox: Option<Skybox>,
    targets: DeferredTargets,
}

impl Scene {
    /// `size` is the render resolution of the deferred targets.
    pub fn new<D: GraphicsDevice>(device: &mut D, camera: Rc<RefCell<Camera>>, size: Extent) -> Self {
        camera.borrow_mut().aspect = size.aspect();
        Self {
            models: Vec::new(),
            lights: Vec::new(),
            camera,
            skybox: None,
            targets: DeferredTargets::new(device, size),
        }
    }

    pub fn add_model(&mut self, model: Model) {
        self.models.push(model);
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn models_mut(&mut self) -> &mut [Model] {
        &mut self.models
    }

    pub fn add_light(&mut self, light: &SharedLight) {
        self.lights.push(Rc::downgrade(light));
    }

    /// Live lights in insertion order.
    pub fn lights(&self) -> Vec<SharedLight> {
        self.lights.iter().filter_map(Weak::upgrade).collect()
    }

    /// Forgets lights whose owner dropped them; returns how many were removed.
    pub fn prune_lights(&mut self) -> usize {
        let before = self.lights.len();
        self.lights.retain(|light| light.strong_count() > 0);
        before - self.lights.len()
    }

    pub fn camera(&self) -> &Rc<RefCell<Camera>> {
        &self.camera
    }

    pub fn skybox(&self) -> Option<&Skybox> {
        self.skybox.as_ref()
    }

    pub fn set_skybox(&mut self, skybox: Option<Skybox>) {
        self.skybox = skybox;
    }

    pub fn targets(&self) -> &DeferredTargets {
        &self.targets
    }

    pub fn resize<D: GraphicsDevice>(&mut self, device: &mut D, size: Extent) {
        self.targets.resize(device, size);
        self.camera.borrow_mut().aspect = size.aspect();
    }

    /// Moves every flash light to the camera's position and view direction.
    ///
    /// Frames do not call this; the application calls it once per frame
    /// after updating the camera and before rendering.
    pub fn update_flash_lights(&self) {
        let camera = *self.camera.borrow();
        for light in self.lights() {
            light.borrow_mut().follow_camera(&camera);
        }
    }

    /// Releases models and targets. Lights belong to their owner and are
    /// only detached.
    pub fn clean_up<D: GraphicsDevice>(&mut self, device: &mut D) {
        for model in &self.models {
            model.release(device);
        }
        self.models.clear();
        self.lights.clear();
        self.targets.release(device);
        log::info!("Scene resources released");
    }
}
