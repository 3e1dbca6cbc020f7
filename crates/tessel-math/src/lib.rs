// SPDX-License-Identifier: CEPL-1.0
//! Camera and model transforms for the per-frame uniform block.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Model rotation speed, radians per second.
pub const SPIN_RATE: f32 = std::f32::consts::FRAC_PI_2;

pub const EYE: Vec3 = Vec3::new(2.0, 2.0, 2.0);
pub const FOV_Y: f32 = std::f32::consts::FRAC_PI_4;
pub const Z_NEAR: f32 = 0.1;
pub const Z_FAR: f32 = 10.0;

/// Matches `layout(set = 0, binding = 0) uniform Transforms` in mesh.vert.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Transforms {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
}

impl Transforms {
    pub fn new(model: Mat4, view: Mat4, proj: Mat4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
        }
    }

    /// Mesh spinning around +Z, seen from [`EYE`].
    pub fn spinning(seconds: f32, aspect: f32) -> Self {
        let model = Mat4::from_rotation_z(seconds * SPIN_RATE);
        let view = Mat4::look_at_rh(EYE, Vec3::ZERO, Vec3::Z);
        let proj = perspective_vk(FOV_Y, aspect, Z_NEAR, Z_FAR);
        Self::new(model, view, proj)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Right-handed perspective with depth in [0, 1] and clip-space Y pointing down.
pub fn perspective_vk(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let mut proj = Mat4::perspective_rh(fov_y, aspect, near, far);
    proj.y_axis.y *= -1.0;
    proj
}

/// Width over height; a degenerate height yields 1.0.
pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}
