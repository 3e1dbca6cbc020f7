// SPDX-License-Identifier: CEPL-1.0
//! Vulkan renderer core on ash: device context, resource utilities, staged
//! uploads, swapchain generations, the pipeline, frame slots, command
//! recording and the render loop.
//!
//! Everything below `device` talks to the GPU through the [`Gpu`] trait, so
//! the lifecycle and synchronization rules run unchanged against the
//! in-memory device used by the tests.

pub mod context;
pub mod device;
pub mod error;
pub mod frame;
pub mod frame_loop;
pub mod gpu;
pub mod pipeline;
pub mod record;
pub mod resource;
pub mod scene;
pub mod swapchain;
pub mod upload;

#[cfg(test)]
mod testing;

pub use context::{DeviceCaps, QueueFamilies};
pub use device::{ContextOptions, GpuContext};
pub use error::{RenderError, RenderResult};
pub use frame::FRAMES_IN_FLIGHT;
pub use frame_loop::{FrameLoop, FrameOutcome, FrameStats, RenderConfig};
pub use gpu::Gpu;
pub use pipeline::ShaderSet;
pub use swapchain::{PresentPreference, SwapchainPrefs};

/// The renderer the application runs: the frame loop on a real device.
pub type VkRenderer = FrameLoop<GpuContext>;
