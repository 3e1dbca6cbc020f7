// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use thiserror::Error;

/// Fatal renderer failures. Surface staleness and minimized windows are not
/// errors; see `Acquired`, `Presented` and `SwapchainState`.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to load the Vulkan loader: {0}")]
    Loader(String),
    #[error("window handle unavailable: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),
    #[error("no device with graphics and present queues, VK_KHR_swapchain and anisotropic sampling")]
    NoSuitableDevice,
    #[error("validation layer {0} requested but not installed")]
    ValidationLayerUnavailable(String),
    #[error("none of the candidate depth formats supports optimal-tiling depth attachments")]
    NoSupportedDepthFormat,
    #[error("no memory type matches bits {type_bits:#b} with {properties:?}")]
    NoSuitableMemoryType {
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    },
    #[error("surface reports no formats")]
    NoSurfaceFormat,
    #[error("cannot negotiate a presentable image count (min {min}, max {max})")]
    NoPresentableImageCount { min: u32, max: u32 },
    #[error("unsupported layout transition {old:?} -> {new:?}")]
    UnsupportedLayoutTransition {
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    },
    #[error("upload of {len} bytes does not fit a {capacity}-byte destination")]
    UploadTooLarge { len: u64, capacity: u64 },
    #[error("no packed texel size known for {0:?}")]
    UnknownTexelSize(vk::Format),
    #[error("refusing to create an empty {0}")]
    EmptyResource(&'static str),
    #[error("swapchain used after it was destroyed")]
    SwapchainDestroyed,
    #[error("invalid SPIR-V for {stage}: {reason}")]
    InvalidShader { stage: &'static str, reason: String },
    #[error("invalid texture: {0}")]
    InvalidTexture(String),
    #[error("{call} failed: {result}")]
    Vk {
        call: &'static str,
        result: vk::Result,
    },
}

pub type RenderResult<T> = Result<T, RenderError>;

impl RenderError {
    /// Adapter for `map_err` on raw `VkResult`s.
    pub fn vk(call: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| RenderError::Vk { call, result }
    }
}
