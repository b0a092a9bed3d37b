use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use glam::Vec3;
use wgpu_deferred::renderer::blur::BlurSource;
use wgpu_deferred::renderer::gpu::{Command, Extent, Handle, RecordingDevice, TextureTarget};
use wgpu_deferred::renderer::lights::{
    Attenuation, Light, LightColor, LightKind, LightTypes, SharedLight, SpotCone,
};
use wgpu_deferred::renderer::material::{Material, TextureSemantic};
use wgpu_deferred::renderer::mesh::Mesh;
use wgpu_deferred::renderer::primitives::cube_vertices;
use wgpu_deferred::renderer::{DeferredPrograms, ForwardPrograms, Renderer, UniformTable};
use wgpu_deferred::scene::{Camera, Model, Scene};
use wgpu_deferred::settings::RenderSettings;

const SHADOW_SIZE: u32 = 64;

fn color() -> LightColor {
    LightColor::new(Vec3::splat(0.05), Vec3::ONE, Vec3::ONE)
}

fn directional(device: &mut RecordingDevice) -> SharedLight {
    Light::new(
        device,
        SHADOW_SIZE,
        Vec3::new(0.0, 4.0, 0.0),
        color(),
        LightKind::Directional {
            direction: Vec3::new(0.2, -1.0, 0.1),
        },
    )
    .into_shared()
}

fn point(device: &mut RecordingDevice, x: f32) -> SharedLight {
    Light::new(
        device,
        SHADOW_SIZE,
        Vec3::new(x, 1.0, 0.0),
        color(),
        LightKind::Point {
            attenuation: Attenuation::default(),
        },
    )
    .into_shared()
}

fn spot(device: &mut RecordingDevice) -> SharedLight {
    Light::new(
        device,
        SHADOW_SIZE,
        Vec3::new(0.0, 2.0, 2.0),
        color(),
        LightKind::Spot {
            direction: Vec3::NEG_Z,
            attenuation: Attenuation::default(),
            cone: SpotCone::from_degrees(12.5, 17.5),
        },
    )
    .into_shared()
}

fn cube_model(device: &mut RecordingDevice, material: Material) -> Model {
    let mesh = Mesh::upload(device, "cube", &cube_vertices(), &[], vec![material]);
    Model::new("cube", vec![mesh])
}

fn scene(device: &mut RecordingDevice) -> Scene {
    let camera = Rc::new(RefCell::new(Camera::default()));
    let mut scene = Scene::new(device, camera, Extent::new(64, 36));
    let model = cube_model(device, Material::default());
    scene.add_model(model);
    scene
}

fn draws_by_program(device: &RecordingDevice) -> Vec<String> {
    device
        .commands()
        .iter()
        .filter_map(|command| match command {
            Command::Draw { program, .. } => Some(program.clone()),
            _ => None,
        })
        .collect()
}

fn pass_order(draws: &[String]) -> Vec<String> {
    let mut order: Vec<String> = draws.to_vec();
    order.dedup();
    order
}

struct Programs {
    shadow: UniformTable,
    gbuffer: UniformTable,
    lighting: UniformTable,
    blur: UniformTable,
    composite: UniformTable,
}

impl Programs {
    fn new() -> Self {
        Self {
            shadow: UniformTable::new("shadow"),
            gbuffer: UniformTable::new("gbuffer"),
            lighting: UniformTable::new("lighting"),
            blur: UniformTable::new("blur"),
            composite: UniformTable::new("composite"),
        }
    }

    fn deferred(&mut self) -> DeferredPrograms<'_, UniformTable> {
        DeferredPrograms {
            shadow: &mut self.shadow,
            gbuffer: &mut self.gbuffer,
            lighting: &mut self.lighting,
            blur: &mut self.blur,
            composite: &mut self.composite,
        }
    }
}

#[test]
fn deferred_frame_runs_passes_in_structural_order() {
    let mut device = RecordingDevice::new();
    let mut renderer = Renderer::new(&mut device, RenderSettings::default());
    let mut scene = scene(&mut device);
    let sun = directional(&mut device);
    let lamp = point(&mut device, 1.0);
    scene.add_light(&sun);
    scene.add_light(&lamp);
    device.clear_commands();

    let mut programs = Programs::new();
    renderer.render_deferred_frame(&mut device, programs.deferred(), &scene, Extent::new(32, 18));

    let draws = draws_by_program(&device);
    assert_eq!(
        pass_order(&draws),
        vec!["shadow", "gbuffer", "lighting", "blur", "composite"]
    );
    assert_eq!(draws.iter().filter(|name| *name == "shadow").count(), 2);
    assert_eq!(draws.iter().filter(|name| *name == "blur").count(), 10);
    assert_eq!(renderer.frame_viewport(), Some(Extent::new(64, 36)));
    assert_eq!(programs.composite.float("exposure"), Some(1.0));
    assert_eq!(programs.lighting.int("dirNum"), Some(1));
    assert_eq!(programs.lighting.int("pointNum"), Some(1));
    assert_eq!(programs.lighting.int("gPosition"), Some(2));
    assert_eq!(programs.lighting.int("gAlbedoSpec"), Some(4));
}

#[test]
fn mixed_lights_get_sequential_slots_and_per_type_indices() {
    let mut device = RecordingDevice::new();
    let lights = vec![
        directional(&mut device),
        point(&mut device, -1.0),
        point(&mut device, 1.0),
        spot(&mut device),
    ];
    let mut program = UniformTable::new("forward");

    let counts = Renderer::configure_lights(&lights, &mut program);

    assert_eq!((counts.directional, counts.point, counts.spot), (1, 2, 1));
    assert_eq!(program.int("dirNum"), Some(1));
    assert_eq!(program.int("pointNum"), Some(2));
    assert_eq!(program.int("spotNum"), Some(1));
    let slots: Vec<u32> = lights.iter().map(|l| l.borrow().depth_map_index()).collect();
    assert_eq!(slots, vec![0, 1, 2, 3]);
    assert!(program.contains("dirs[0].direction"));
    assert!(program.contains("points[1].position"));
    assert!(program.contains("spots[0].cutOff"));
}

#[test]
fn empty_light_list_uploads_zero_counts() {
    let mut program = UniformTable::new("forward");
    let counts = Renderer::configure_lights(&[], &mut program);

    assert_eq!(counts.total(), 0);
    assert_eq!(program.int("dirNum"), Some(0));
    assert_eq!(program.int("spotNum"), Some(0));
}

#[test]
fn blur_starts_from_the_bright_buffer_and_ends_in_the_reported_target() {
    let mut device = RecordingDevice::new();
    let renderer = Renderer::new(&mut device, RenderSettings::default());
    let scene = scene(&mut device);
    device.clear_commands();

    let mut program = UniformTable::new("blur");
    let result = renderer.render_blur(&mut device, &mut program, &scene);

    assert_eq!(result, BlurSource::PingPong(0));
    assert_eq!(device.draw_count(), 10);
    let first_input = device.commands().iter().find_map(|command| match command {
        Command::BindTexture { texture, .. } => *texture,
        _ => None,
    });
    assert_eq!(first_input, Some(scene.targets().hdr.bright()));
    assert_eq!(program.bool("horizontal"), Some(false));
}

#[test]
fn texture_units_never_repeat_within_one_draw() {
    let mut device = RecordingDevice::new();
    let renderer = Renderer::new(&mut device, RenderSettings::default());
    let camera = Rc::new(RefCell::new(Camera::default()));
    let mut scene = Scene::new(&mut device, camera, Extent::new(16, 16));
    let material = Material::default()
        .with_texture(TextureSemantic::Diffuse, Handle::new(90))
        .with_texture(TextureSemantic::Specular, Handle::new(91));
    scene.add_model(cube_model(&mut device, material));
    let lights = vec![directional(&mut device), point(&mut device, 0.0), spot(&mut device)];
    for light in &lights {
        scene.add_light(light);
    }
    device.clear_commands();

    let mut program = UniformTable::new("forward");
    renderer.render(&mut device, &mut program, &scene, Default::default());

    let units: Vec<u32> = device
        .commands()
        .iter()
        .filter_map(|command| match command {
            Command::BindTexture {
                unit,
                texture: Some(_),
                ..
            } => Some(*unit),
            _ => None,
        })
        .collect();
    let unique: HashSet<u32> = units.iter().copied().collect();
    assert_eq!(units.len(), 5);
    assert_eq!(unique.len(), units.len());
    assert!(units.iter().all(|unit| *unit < 5));
    assert_eq!(program.int("materials[0].diffuseTex"), Some(3));
    assert_eq!(program.int("materials[0].specularTex"), Some(4));
}

#[test]
fn shared_geometry_is_created_once_across_frames() {
    let mut device = RecordingDevice::new();
    let mut renderer = Renderer::new(&mut device, RenderSettings::default());
    let mut scene = scene(&mut device);
    let lamp = point(&mut device, 0.5);
    scene.add_light(&lamp);

    let mut programs = Programs::new();
    for _ in 0..3 {
        renderer.render_deferred_frame(&mut device, programs.deferred(), &scene, Extent::new(32, 18));
    }

    let created: Vec<&str> = device
        .commands()
        .iter()
        .filter_map(|command| match command {
            Command::CreateVertexArray { label, .. } => Some(label.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(created.iter().filter(|label| **label == "UnitCube").count(), 1);
    assert_eq!(created.iter().filter(|label| **label == "ScreenQuad").count(), 1);
}

#[test]
fn incomplete_framebuffers_degrade_without_failing_the_frame() {
    let mut device = RecordingDevice::new().with_incomplete_framebuffers();
    let mut renderer = Renderer::new(&mut device, RenderSettings::default());
    let mut scene = scene(&mut device);
    let lamp = point(&mut device, 0.0);
    scene.add_light(&lamp);
    assert!(!lamp.borrow().shadow().is_usable());

    let mut programs = Programs::new();
    renderer.render_deferred_frame(&mut device, programs.deferred(), &scene, Extent::new(32, 18));

    let draws = draws_by_program(&device);
    assert!(!draws.iter().any(|name| name == "shadow"));
    assert_eq!(draws.last().map(String::as_str), Some("composite"));
}

#[test]
fn point_shadows_render_each_face_without_layered_rendering() {
    let mut device = RecordingDevice::new().without_layered_rendering();
    let renderer = Renderer::new(&mut device, RenderSettings::default());
    let mut scene = scene(&mut device);
    let lamp = point(&mut device, 0.0);
    scene.add_light(&lamp);
    device.clear_commands();

    let mut program = UniformTable::new("shadow");
    renderer.render_shadow_maps(&mut device, &mut program, &scene, LightTypes::POINT);

    assert_eq!(device.draw_count(), 6);
    assert_eq!(program.int("shadowFace"), Some(5));
    assert!(program.contains("shadowMatrices[5]"));
    assert_eq!(program.float("far"), Some(5.0));
    let framebuffers: HashSet<_> = device
        .commands()
        .iter()
        .filter_map(|command| match command {
            Command::Draw { framebuffer, .. } => *framebuffer,
            _ => None,
        })
        .collect();
    assert_eq!(framebuffers.len(), 6);
}

#[test]
fn shadow_pass_only_renders_requested_light_types() {
    let mut device = RecordingDevice::new();
    let renderer = Renderer::new(&mut device, RenderSettings::default());
    let mut scene = scene(&mut device);
    let sun = directional(&mut device);
    let torch = spot(&mut device);
    scene.add_light(&sun);
    scene.add_light(&torch);
    device.clear_commands();

    let mut program = UniformTable::new("shadow");
    renderer.render_shadow_maps(&mut device, &mut program, &scene, LightTypes::SPOT | LightTypes::FLASH);

    assert_eq!(device.draw_count(), 1);
    let viewport = device.commands().iter().find_map(|command| match command {
        Command::SetViewport(size) => Some(*size),
        _ => None,
    });
    let shadow = RenderSettings::default().shadow_map_size;
    assert_eq!(viewport, Some(Extent::new(shadow, shadow)));
}

#[test]
fn forward_frame_draws_the_skybox_last_with_lequal_depth() {
    let mut device = RecordingDevice::new();
    let mut renderer = Renderer::new(&mut device, RenderSettings::default());
    let mut scene = scene(&mut device);
    let cube_map = device_cube_map(&mut device);
    scene.set_skybox(Some(wgpu_deferred::scene::Skybox::new(cube_map)));
    device.clear_commands();

    let mut shadow = UniformTable::new("shadow");
    let mut forward = UniformTable::new("forward");
    let mut skybox = UniformTable::new("skybox");
    renderer.render_forward_frame(
        &mut device,
        ForwardPrograms {
            shadow: &mut shadow,
            scene: &mut forward,
            skybox: &mut skybox,
        },
        &scene,
        Extent::new(32, 18),
    );

    let draws = draws_by_program(&device);
    assert_eq!(pass_order(&draws), vec!["forward", "skybox"]);
    assert_eq!(skybox.int("cubemap"), Some(0));
    let view = skybox.mat4("view").unwrap();
    assert_eq!(view.w_axis.truncate(), Vec3::ZERO);
    assert!(device.commands().contains(&Command::SetDepthFunc(
        wgpu_deferred::renderer::gpu::DepthFunc::LessEqual
    )));
    assert_eq!(
        device.commands().last(),
        Some(&Command::SetDepthFunc(wgpu_deferred::renderer::gpu::DepthFunc::Less))
    );
}

fn device_cube_map(device: &mut RecordingDevice) -> wgpu_deferred::renderer::gpu::TextureHandle {
    use wgpu_deferred::renderer::gpu::GraphicsDevice;
    device.create_depth_texture("sky", TextureTarget::CubeMap, Extent::new(16, 16))
}
