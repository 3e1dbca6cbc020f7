// SPDX-License-Identifier: CEPL-1.0
//! Backend-agnostic pieces shared by the renderer, the platform layer and the app.

use anyhow::Result;

mod assets;

pub use assets::{AssetError, MeshData, TextureData, Vertex};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports a zero-sized framebuffer.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// What the renderer needs from the window/input layer.
pub trait WindowPort {
    /// Current framebuffer size in physical pixels.
    fn framebuffer_size(&self) -> RenderSize;

    /// Pumps pending window events without blocking for long.
    fn poll_events(&mut self);

    /// Returns and clears the "surface needs resize" signal.
    fn take_resized(&mut self) -> bool;

    fn should_close(&self) -> bool;
}

/// Lifecycle exposed to the application entry point.
///
/// Construction is backend specific and plays the role of `Init`.
pub trait Renderer {
    /// Blocks until the window is closed or `max_frames` frames were presented.
    fn run_frame_loop(&mut self, window: &mut dyn WindowPort, max_frames: Option<u64>)
        -> Result<()>;

    fn set_clear_color(&mut self, rgba: [f32; 4]);

    /// Waits for the GPU and releases everything.
    fn shutdown(self) -> Result<()>
    where
        Self: Sized;
}
