use glam::{Mat3, Mat4, Vec3};

use super::blur::{blur_result, blur_schedule, BlurSource};
use super::gpu::{ClearFlags, DepthFunc, Extent, GraphicsDevice, TextureTarget};
use super::lights::{LightTypes, SharedLight};
use super::resources::RenderResources;
use super::shader::ShaderProgram;
use super::slots::{LightCounts, SlotAllocator, TextureUnits};
use super::uniforms::FrameConstants;
use crate::scene::{Camera, Scene};
use crate::settings::RenderSettings;

/// Scale of the cube drawn at a light's position by [`Renderer::render_light`].
pub const LIGHT_MARKER_SCALE: f32 = 0.005;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    /// Configure the light arrays before drawing.
    pub with_lights: bool,
    /// Upload material uniforms and bind material textures.
    pub with_materials: bool,
    /// Bind every light's shadow map for sampling.
    pub with_shadow_map: bool,
}

impl RenderOptions {
    pub const DEPTH_ONLY: Self = Self {
        with_lights: false,
        with_materials: false,
        with_shadow_map: false,
    };

    pub const MATERIALS_ONLY: Self = Self {
        with_lights: false,
        with_materials: true,
        with_shadow_map: false,
    };
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            with_lights: true,
            with_materials: true,
            with_shadow_map: true,
        }
    }
}

/// Programs used by [`Renderer::render_deferred_frame`].
pub struct DeferredPrograms<'a, P> {
    pub shadow: &'a mut P,
    pub gbuffer: &'a mut P,
    pub lighting: &'a mut P,
    pub blur: &'a mut P,
    pub composite: &'a mut P,
}

/// Programs used by [`Renderer::render_forward_frame`].
pub struct ForwardPrograms<'a, P> {
    pub shadow: &'a mut P,
    pub scene: &'a mut P,
    pub skybox: &'a mut P,
}

fn drain_errors<D: GraphicsDevice>(device: &mut D, pass: &str) {
    while let Some(err) = device.take_error() {
        log::warn!("{} pass: {}", pass, err);
    }
}

pub struct Renderer {
    settings: RenderSettings,
    resources: RenderResources,
    frame_viewport: Option<Extent>,
}

impl Renderer {
    pub fn new<D: GraphicsDevice>(device: &mut D, settings: RenderSettings) -> Self {
        let resources = RenderResources::new(device);
        drain_errors(device, "setup");
        Self {
            settings,
            resources,
            frame_viewport: None,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn resources(&self) -> &RenderResources {
        &self.resources
    }

    /// Viewport set by the last `prepare`, `None` before the first one.
    pub fn frame_viewport(&self) -> Option<Extent> {
        self.frame_viewport
    }

    /// Size offscreen targets need for a window of `viewport`.
    pub fn render_extent(&self, viewport: Extent) -> Extent {
        viewport.scaled(self.settings.supersample)
    }

    pub fn prepare<D: GraphicsDevice>(&mut self, device: &mut D, camera: &Camera, viewport: Extent) {
        device.bind_framebuffer(None);
        device.set_clear_color(self.settings.clear_color);
        device.clear(ClearFlags::COLOR | ClearFlags::DEPTH | ClearFlags::STENCIL);
        device.set_depth_test(true);
        device.set_depth_func(DepthFunc::Less);

        let constants = FrameConstants::new(camera.projection(false), camera.view());
        self.resources.write_frame_constants(device, &constants);

        let frame_viewport = self.render_extent(viewport);
        self.frame_viewport = Some(frame_viewport);
        device.set_viewport(frame_viewport);
        drain_errors(device, "prepare");
    }

    pub fn render_shadow_maps<D: GraphicsDevice>(
        &self,
        device: &mut D,
        program: &mut D::Program,
        scene: &Scene,
        types: LightTypes,
    ) {
        let size = self.settings.shadow_map_size;
        device.set_viewport(Extent::new(size, size));

        for light in scene.lights() {
            if !types.contains(light.borrow().light_type().flag()) {
                continue;
            }
            light.borrow_mut().configure_shadow_matrices(program);

            let light = light.borrow();
            let shadow = light.shadow();
            if !shadow.is_usable() {
                log::debug!("Skipping unusable {:?} shadow target", light.light_type());
                continue;
            }
            for (face, framebuffer) in shadow.passes().iter().enumerate() {
                device.bind_framebuffer(Some(*framebuffer));
                device.clear(ClearFlags::DEPTH);
                if shadow.is_per_face() {
                    program.set_int("shadowFace", face as i32);
                }
                self.draw_models(device, program, scene, &[], false);
            }
            device.bind_framebuffer(None);
        }

        match self.frame_viewport {
            Some(frame_viewport) => device.set_viewport(frame_viewport),
            None => log::warn!("Shadow maps rendered before prepare; viewport left at the shadow size"),
        }
        drain_errors(device, "shadow map");
    }

    /// Assigns shadow units and array slots in list order and uploads every
    /// light plus the per-type counts.
    pub fn configure_lights<P: ShaderProgram + ?Sized>(lights: &[SharedLight], program: &mut P) -> LightCounts {
        let mut slots = SlotAllocator::new();
        for light in lights {
            let mut light = light.borrow_mut();
            let slot = slots.assign(light.light_type());
            light.set_depth_map_index(slot.depth_map_index);
            light.configure(program, slot.type_name, slot.type_index as usize);
        }

        let counts = slots.counts();
        counts.upload(program);
        log::trace!("Configured {} light(s): {:?}", slots.depth_maps(), counts);
        counts
    }

    fn assign_depth_maps(lights: &[SharedLight]) {
        let mut slots = SlotAllocator::new();
        for light in lights {
            let mut light = light.borrow_mut();
            let slot = slots.assign(light.light_type());
            light.set_depth_map_index(slot.depth_map_index);
        }
    }

    fn draw_models<D: GraphicsDevice>(
        &self,
        device: &mut D,
        program: &mut D::Program,
        scene: &Scene,
        lights: &[SharedLight],
        with_materials: bool,
    ) {
        for model in scene.models() {
            model.draw(device, program, lights, with_materials);
        }
    }

    fn draw_scene<D: GraphicsDevice>(
        &self,
        device: &mut D,
        program: &mut D::Program,
        scene: &Scene,
        options: RenderOptions,
    ) {
        program.set_vec3("viewPos", scene.camera().borrow().position());

        let lights = scene.lights();
        if options.with_lights {
            Self::configure_lights(&lights, program);
        } else if options.with_shadow_map {
            Self::assign_depth_maps(&lights);
        }

        let sampled: &[SharedLight] = if options.with_shadow_map { &lights } else { &[] };
        self.draw_models(device, program, scene, sampled, options.with_materials);
    }

    pub fn render<D: GraphicsDevice>(
        &self,
        device: &mut D,
        program: &mut D::Program,
        scene: &Scene,
        options: RenderOptions,
    ) {
        self.draw_scene(device, program, scene, options);
        drain_errors(device, "forward");
    }

    pub fn render_skybox<D: GraphicsDevice>(&self, device: &mut D, program: &mut D::Program, scene: &Scene) {
        let Some(skybox) = scene.skybox() else {
            return;
        };

        let camera = scene.camera().borrow();
        let view = Mat4::from_mat3(Mat3::from_mat4(camera.view()));
        program.set_mat4("view", view);
        program.set_mat4("projection", camera.projection(false));

        device.set_depth_func(DepthFunc::LessEqual);
        device.bind_texture(0, TextureTarget::CubeMap, Some(skybox.cube_map()));
        program.set_int("cubemap", 0);
        self.resources.draw_cube(device, program);
        device.bind_texture(0, TextureTarget::CubeMap, None);
        device.set_depth_func(DepthFunc::Less);
        drain_errors(device, "skybox");
    }

    /// Small cube marking a light's position.
    pub fn render_light<D: GraphicsDevice>(
        &self,
        device: &mut D,
        program: &mut D::Program,
        position: Vec3,
        color: Vec3,
    ) {
        let model = Mat4::from_translation(position) * Mat4::from_scale(Vec3::splat(LIGHT_MARKER_SCALE));
        program.set_mat4("model", model);
        program.set_vec3("lightColor", color);
        self.resources.draw_cube(device, program);
        drain_errors(device, "light marker");
    }

    pub fn render_gbuffer<D: GraphicsDevice>(&self, device: &mut D, program: &mut D::Program, scene: &Scene) {
        device.bind_framebuffer(Some(scene.targets().gbuffer.framebuffer()));
        device.clear(ClearFlags::COLOR | ClearFlags::DEPTH);
        self.draw_scene(device, program, scene, RenderOptions::MATERIALS_ONLY);
        device.bind_framebuffer(None);
        drain_errors(device, "g-buffer");
    }

    pub fn render_light_pass<D: GraphicsDevice>(&self, device: &mut D, program: &mut D::Program, scene: &Scene) {
        let targets = scene.targets();
        device.bind_framebuffer(Some(targets.hdr.framebuffer()));
        device.set_depth_test(false);
        device.clear(ClearFlags::COLOR | ClearFlags::DEPTH);
        program.set_vec3("viewPos", scene.camera().borrow().position());

        let lights = scene.lights();
        Self::configure_lights(&lights, program);
        for light in &lights {
            light.borrow().active_shadow_tex(device);
        }
        let mut units = TextureUnits::after_shadow_maps(lights.len());
        targets.gbuffer.configure(device, program, &mut units);

        self.resources.draw_quad(device, program);
        device.set_depth_test(true);
        device.bind_framebuffer(None);
        drain_errors(device, "light");
    }

    /// Returns the buffer holding the blurred bright colour.
    pub fn render_blur<D: GraphicsDevice>(
        &self,
        device: &mut D,
        program: &mut D::Program,
        scene: &Scene,
    ) -> BlurSource {
        let targets = scene.targets();
        let steps = blur_schedule(self.settings.blur_passes);

        for step in &steps {
            device.bind_framebuffer(Some(targets.pingpong.framebuffer(step.target)));
            program.set_bool("horizontal", step.horizontal);
            let source = match step.source {
                BlurSource::Bright => targets.hdr.bright(),
                BlurSource::PingPong(index) => targets.pingpong.color(index),
            };
            device.bind_texture(0, TextureTarget::Texture2D, Some(source));
            program.set_int("image", 0);
            self.resources.draw_quad(device, program);
        }

        device.bind_framebuffer(None);
        drain_errors(device, "blur");
        blur_result(&steps)
    }

    /// Tonemaps the lit colour with the blurred bloom onto the default framebuffer.
    pub fn deferred_render<D: GraphicsDevice>(
        &self,
        device: &mut D,
        program: &mut D::Program,
        scene: &Scene,
        bloom: BlurSource,
    ) {
        let targets = scene.targets();
        device.bind_framebuffer(None);

        device.bind_texture(0, TextureTarget::Texture2D, Some(targets.hdr.color()));
        program.set_int("hdrColor", 0);
        let bloom = match bloom {
            BlurSource::Bright => targets.hdr.bright(),
            BlurSource::PingPong(index) => targets.pingpong.color(index),
        };
        device.bind_texture(1, TextureTarget::Texture2D, Some(bloom));
        program.set_int("bloomBlur", 1);

        program.set_bool("hdr", self.settings.hdr);
        program.set_bool("bloom", self.settings.bloom);
        program.set_float("exposure", scene.camera().borrow().exposure);
        self.resources.draw_quad(device, program);
        drain_errors(device, "composite");
    }

    /// Draws the scene from the first light's point of view for inspection.
    pub fn debug_render_shadow_map<D: GraphicsDevice>(
        &self,
        device: &mut D,
        program: &mut D::Program,
        scene: &Scene,
    ) {
        let lights = scene.lights();
        let Some(first) = lights.first() else {
            log::warn!("Shadow map debug view requested for a scene without lights");
            return;
        };

        first.borrow_mut().configure_shadow_matrices(program);
        let (near, far) = first.borrow().shadow_planes();
        program.set_float("near", near);
        program.set_float("far", far);

        self.draw_scene(
            device,
            program,
            scene,
            RenderOptions {
                with_lights: false,
                with_materials: false,
                with_shadow_map: true,
            },
        );
        drain_errors(device, "shadow debug");
    }

    /// prepare, shadows, G-buffer, light pass, blur, composite.
    pub fn render_deferred_frame<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        programs: DeferredPrograms<'_, D::Program>,
        scene: &Scene,
        viewport: Extent,
    ) {
        let camera = *scene.camera().borrow();
        self.prepare(device, &camera, viewport);
        self.render_shadow_maps(device, programs.shadow, scene, LightTypes::all());
        self.render_gbuffer(device, programs.gbuffer, scene);
        self.render_light_pass(device, programs.lighting, scene);
        let bloom = self.render_blur(device, programs.blur, scene);
        self.deferred_render(device, programs.composite, scene, bloom);
        log::debug!("Deferred frame rendered ({} light(s))", scene.lights().len());
    }

    /// prepare, shadows, lit forward pass, skybox.
    pub fn render_forward_frame<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        programs: ForwardPrograms<'_, D::Program>,
        scene: &Scene,
        viewport: Extent,
    ) {
        let camera = *scene.camera().borrow();
        self.prepare(device, &camera, viewport);
        self.render_shadow_maps(device, programs.shadow, scene, LightTypes::all());
        self.render(device, programs.scene, scene, RenderOptions::default());
        self.render_skybox(device, programs.skybox, scene);
        log::debug!("Forward frame rendered ({} light(s))", scene.lights().len());
    }

    pub fn release<D: GraphicsDevice>(&self, device: &mut D) {
        self.resources.release(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::gpu::{Command, RecordingDevice};
    use crate::renderer::shader::UniformTable;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn prepare_supersamples_the_viewport() {
        let mut device = RecordingDevice::new();
        let mut renderer = Renderer::new(&mut device, RenderSettings::default());
        renderer.prepare(&mut device, &Camera::default(), Extent::new(400, 300));

        assert_eq!(renderer.frame_viewport(), Some(Extent::new(800, 600)));
        assert!(device
            .commands()
            .contains(&Command::Clear(ClearFlags::all())));
    }

    #[test]
    fn skybox_is_skipped_without_a_cube_map() {
        let mut device = RecordingDevice::new();
        let renderer = Renderer::new(&mut device, RenderSettings::default());
        let camera = Rc::new(RefCell::new(Camera::default()));
        let scene = Scene::new(&mut device, camera, Extent::new(8, 8));
        device.clear_commands();

        renderer.render_skybox(&mut device, &mut UniformTable::new("skybox"), &scene);
        assert!(device.commands().is_empty());
    }

    #[test]
    fn light_marker_is_a_scaled_cube() {
        let mut device = RecordingDevice::new();
        let renderer = Renderer::new(&mut device, RenderSettings::default());
        let mut program = UniformTable::new("marker");
        renderer.render_light(&mut device, &mut program, Vec3::new(1.0, 0.0, 0.0), Vec3::ONE);

        let model = program.mat4("model").unwrap();
        let corner = model.transform_point3(Vec3::ONE);
        assert!(corner.abs_diff_eq(Vec3::new(1.005, 0.005, 0.005), 1e-5));
        assert_eq!(device.draw_count(), 1);
    }

    #[test]
    fn shadow_debug_view_uses_the_first_light() {
        use crate::renderer::lights::{Attenuation, Light, LightColor, LightKind};

        let mut device = RecordingDevice::new();
        let renderer = Renderer::new(&mut device, RenderSettings::default());
        let camera = Rc::new(RefCell::new(Camera::default()));
        let mut scene = Scene::new(&mut device, camera, Extent::new(8, 8));
        let mut program = UniformTable::new("shadow debug");
        renderer.debug_render_shadow_map(&mut device, &mut program, &scene);
        assert!(!program.contains("near"));

        let lamp = Light::new(
            &mut device,
            32,
            Vec3::Y,
            LightColor::new(Vec3::ZERO, Vec3::ONE, Vec3::ONE),
            LightKind::Point {
                attenuation: Attenuation::default(),
            },
        )
        .into_shared();
        scene.add_light(&lamp);
        renderer.debug_render_shadow_map(&mut device, &mut program, &scene);

        assert_eq!(program.float("near"), Some(0.01));
        assert_eq!(program.float("far"), Some(5.0));
        assert!(program.contains("shadowMatrices[0]"));
        assert!(!program.contains("pointNum"));
    }

    #[test]
    fn shadow_pass_before_prepare_keeps_the_shadow_viewport() {
        let mut device = RecordingDevice::new();
        let renderer = Renderer::new(&mut device, RenderSettings::default());
        let camera = Rc::new(RefCell::new(Camera::default()));
        let scene = Scene::new(&mut device, camera, Extent::new(8, 8));
        device.clear_commands();

        renderer.render_shadow_maps(&mut device, &mut UniformTable::new("shadow"), &scene, LightTypes::all());

        let viewports: Vec<Extent> = device
            .commands()
            .iter()
            .filter_map(|command| match command {
                Command::SetViewport(size) => Some(*size),
                _ => None,
            })
            .collect();
        assert_eq!(renderer.frame_viewport(), None);
        assert_eq!(viewports, vec![Extent::new(1024, 1024)]);
    }

    #[test]
    fn shadow_pass_restores_the_prepared_viewport() {
        let mut device = RecordingDevice::new();
        let mut renderer = Renderer::new(&mut device, RenderSettings::default());
        let camera = Rc::new(RefCell::new(Camera::default()));
        let scene = Scene::new(&mut device, camera, Extent::new(8, 8));
        renderer.prepare(&mut device, &Camera::default(), Extent::new(100, 50));
        device.clear_commands();

        renderer.render_shadow_maps(&mut device, &mut UniformTable::new("shadow"), &scene, LightTypes::all());

        let last = device.commands().iter().rev().find_map(|command| match command {
            Command::SetViewport(size) => Some(*size),
            _ => None,
        });
        assert_eq!(last, Some(Extent::new(200, 100)));
    }
}
