use glam::{Mat4, Vec3};
use wgpu_deferred::renderer::gpu::{Command, RecordingDevice, TextureTarget};
use wgpu_deferred::renderer::shadows::{
    directional_shadow_matrix, point_shadow_matrices, spot_shadow_matrix, ShadowTarget,
    CUBE_FACE_DIRECTIONS, POINT_SHADOW_FAR, POINT_SHADOW_NEAR,
};

const EPSILON: f32 = 1e-4;

fn compute_ndc(matrix: Mat4, world_pos: Vec3) -> Vec3 {
    let clip = matrix * world_pos.extend(1.0);
    clip.truncate() / clip.w
}

fn inside_clip_volume(ndc: Vec3) -> bool {
    ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0 && (0.0..=1.0).contains(&ndc.z)
}

fn approx_mat(a: Mat4, b: Mat4) {
    assert!(a.abs_diff_eq(b, EPSILON), "{a:?} != {b:?}");
}

#[test]
fn point_light_produces_six_face_matrices_sharing_one_projection() {
    let position = Vec3::new(1.0, 2.0, -0.5);
    let cube = point_shadow_matrices(position, 1.0);
    let view_projections = cube.view_projections();

    assert_eq!(view_projections.len(), 6);
    assert_eq!(cube.far, POINT_SHADOW_FAR);
    let expected = Mat4::perspective_rh(90_f32.to_radians(), 1.0, POINT_SHADOW_NEAR, POINT_SHADOW_FAR);
    for (view_proj, view) in view_projections.iter().zip(cube.views.iter()) {
        approx_mat(*view_proj * view.inverse(), expected);
    }
}

#[test]
fn each_cube_face_sees_the_point_along_its_axis() {
    let position = Vec3::new(0.5, -1.0, 3.0);
    let cube = point_shadow_matrices(position, 1.0);

    for (face, view_proj) in cube.view_projections().iter().enumerate() {
        let sample = position + CUBE_FACE_DIRECTIONS[face] * 2.0;
        let ndc = compute_ndc(*view_proj, sample);
        assert!(ndc.x.abs() < EPSILON && ndc.y.abs() < EPSILON, "face {face}: {ndc:?}");
        assert!(inside_clip_volume(ndc), "face {face}: {ndc:?}");

        let behind = position - CUBE_FACE_DIRECTIONS[face] * 2.0;
        let clip = *view_proj * behind.extend(1.0);
        assert!(clip.w < 0.0, "face {face} must not see behind itself");
    }
}

#[test]
fn cube_faces_use_the_conventional_up_vectors() {
    let position = Vec3::new(-2.0, 0.5, 1.5);
    let cube = point_shadow_matrices(position, 1.0);
    let faces = [
        (Vec3::X, Vec3::NEG_Y),
        (Vec3::NEG_X, Vec3::NEG_Y),
        (Vec3::Y, Vec3::Z),
        (Vec3::NEG_Y, Vec3::NEG_Z),
        (Vec3::Z, Vec3::NEG_Y),
        (Vec3::NEG_Z, Vec3::NEG_Y),
    ];

    for (face, (dir, up)) in faces.iter().enumerate() {
        approx_mat(cube.views[face], Mat4::look_at_rh(position, position + *dir, *up));

        let camera_up = cube.views[face].inverse().y_axis.truncate();
        assert!(camera_up.abs_diff_eq(*up, EPSILON), "face {face}: up {camera_up:?}");

        let above = compute_ndc(cube.view_projections()[face], position + *dir + *up * 0.5);
        assert!(above.y > 0.0, "face {face}: {above:?}");
    }
}

#[test]
fn directional_shadow_covers_points_along_the_light_direction() {
    let position = Vec3::new(0.0, 4.0, 0.0);
    let direction = Vec3::new(0.4, -1.0, 0.2);
    let matrix = directional_shadow_matrix(position, direction);

    let centre = position + direction.normalize() * 4.0;
    let ndc = compute_ndc(matrix, centre);
    assert!(inside_clip_volume(ndc), "{ndc:?}");
    assert!(ndc.x.abs() < EPSILON && ndc.y.abs() < EPSILON);

    let too_far = position + direction.normalize() * 20.0;
    assert!(compute_ndc(matrix, too_far).z > 1.0);
}

#[test]
fn straight_down_directional_light_has_a_finite_matrix() {
    let matrix = directional_shadow_matrix(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y);
    assert!(matrix.is_finite());
}

#[test]
fn spot_frustum_follows_the_outer_cone() {
    let position = Vec3::ZERO;
    let direction = Vec3::NEG_Z;
    let outer = 20_f32.to_radians();
    let matrix = spot_shadow_matrix(position, direction, outer, 1.0);

    let inside = Vec3::new(2.0 * (outer * 0.9).tan(), 0.0, -2.0);
    let outside = Vec3::new(2.0 * (outer * 1.1).tan(), 0.0, -2.0);
    assert!(inside_clip_volume(compute_ndc(matrix, inside)));
    assert!(!inside_clip_volume(compute_ndc(matrix, outside)));
}

#[test]
fn cube_target_without_layered_rendering_uses_one_framebuffer_per_face() {
    let mut device = RecordingDevice::new().without_layered_rendering();
    let target = ShadowTarget::new(&mut device, "point shadow", TextureTarget::CubeMap, 256);

    assert!(target.is_per_face());
    assert!(target.is_usable());
    assert_eq!(target.passes().len(), 6);
    let framebuffers = device
        .commands()
        .iter()
        .filter(|command| matches!(command, Command::CreateFramebuffer { .. }))
        .count();
    assert_eq!(framebuffers, 6);
}

#[test]
fn cube_target_with_layered_rendering_uses_a_single_framebuffer() {
    let mut device = RecordingDevice::new();
    let target = ShadowTarget::new(&mut device, "point shadow", TextureTarget::CubeMap, 256);

    assert!(!target.is_per_face());
    assert_eq!(target.passes().len(), 1);
}

#[test]
fn incomplete_shadow_target_is_marked_unusable() {
    let mut device = RecordingDevice::new().with_incomplete_framebuffers();
    let target = ShadowTarget::new(&mut device, "spot shadow", TextureTarget::Texture2D, 512);
    assert!(!target.is_usable());
}
