// SPDX-License-Identifier: CEPL-1.0
//! Swapchain generations and the Valid/Stale state machine around them.
//!
//! A generation is the swapchain plus everything sized or formatted after it:
//! image views, the depth target, the render pass and one framebuffer per
//! image. It is created and destroyed as a unit, never piecemeal.

use ash::vk;
use tessel_render::{RenderSize, WindowPort};
use tracing::{debug, info};

use crate::error::{RenderError, RenderResult};
use crate::gpu::Gpu;
use crate::resource::{create_image_view, Image, ImageSpec};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PresentPreference {
    /// MAILBOX, then IMMEDIATE, then FIFO.
    #[default]
    LowLatency,
    /// Always FIFO.
    Vsync,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SwapchainPrefs {
    pub present: PresentPreference,
    /// Requested image count; `None` means one more than the surface minimum.
    pub image_count: Option<u32>,
}

const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// A lone `UNDEFINED` entry means the surface takes any format.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> RenderResult<vk::SurfaceFormatKHR> {
    if let [only] = formats {
        if only.format == vk::Format::UNDEFINED {
            return Ok(PREFERRED_SURFACE_FORMAT);
        }
    }
    formats
        .iter()
        .copied()
        .find(|&f| f == PREFERRED_SURFACE_FORMAT)
        .or_else(|| formats.first().copied())
        .ok_or(RenderError::NoSurfaceFormat)
}

pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preference: PresentPreference,
) -> vk::PresentModeKHR {
    if preference == PresentPreference::Vsync {
        return vk::PresentModeKHR::FIFO;
    }
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|m| modes.contains(m))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// The surface's own extent, or the window size clamped to the surface limits
/// when the surface lets the swapchain decide (`u32::MAX`).
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, window: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    vk::Extent2D {
        width: window
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: window
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// `max_image_count == 0` means unbounded.
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR, target: Option<u32>) -> RenderResult<u32> {
    let (min, max) = (caps.min_image_count, caps.max_image_count);
    if min == 0 || (max != 0 && max < min) {
        return Err(RenderError::NoPresentableImageCount { min, max });
    }
    let wanted = target.unwrap_or(min + 1).max(min);
    Ok(if max != 0 { wanted.min(max) } else { wanted })
}

#[derive(Debug)]
pub struct DepthTarget {
    pub image: Image,
    pub view: vk::ImageView,
}

impl DepthTarget {
    pub fn create(gpu: &dyn Gpu, extent: vk::Extent2D) -> RenderResult<Self> {
        let image = Image::create(
            gpu,
            ImageSpec {
                extent,
                format: gpu.caps().depth_format,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            },
        )?;
        match create_image_view(gpu, image.handle, image.format) {
            Ok(view) => Ok(Self { image, view }),
            Err(e) => {
                image.destroy(gpu);
                Err(e)
            }
        }
    }

    pub fn destroy(self, gpu: &dyn Gpu) {
        gpu.destroy_image_view(self.view);
        self.image.destroy(gpu);
    }
}

/// Color clear then store for presentation; depth clear then discard.
pub fn create_render_pass(
    gpu: &dyn Gpu,
    color_format: vk::Format,
    depth_format: vk::Format,
) -> RenderResult<vk::RenderPass> {
    let attachments = [
        vk::AttachmentDescription {
            format: color_format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            ..Default::default()
        },
        vk::AttachmentDescription {
            format: depth_format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ..Default::default()
        },
    ];
    let color_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let subpass = vk::SubpassDescription {
        pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
        color_attachment_count: 1,
        p_color_attachments: &color_ref,
        p_depth_stencil_attachment: &depth_ref,
        ..Default::default()
    };
    // Last frame's attachment writes finish before this subpass touches them.
    let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
    let dependency = vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: stages,
        dst_stage_mask: stages,
        src_access_mask: vk::AccessFlags::empty(),
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ
            | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ..Default::default()
    };
    let info = vk::RenderPassCreateInfo {
        s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
        attachment_count: attachments.len() as u32,
        p_attachments: attachments.as_ptr(),
        subpass_count: 1,
        p_subpasses: &subpass,
        dependency_count: 1,
        p_dependencies: &dependency,
        ..Default::default()
    };
    gpu.create_render_pass(&info)
        .map_err(RenderError::vk("create_render_pass"))
}

#[derive(Debug)]
pub struct SwapchainGeneration {
    swapchain: vk::SwapchainKHR,
    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    depth: Option<DepthTarget>,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
}

impl SwapchainGeneration {
    pub fn create(gpu: &dyn Gpu, window: RenderSize, prefs: &SwapchainPrefs) -> RenderResult<Self> {
        let support = gpu
            .surface_support()
            .map_err(RenderError::vk("get_physical_device_surface_capabilities"))?;
        let format = choose_surface_format(&support.formats)?;
        let present_mode = choose_present_mode(&support.present_modes, prefs.present);
        let extent = choose_extent(&support.capabilities, window);
        let image_count = choose_image_count(&support.capabilities, prefs.image_count)?;

        let families = gpu.caps().queue_families;
        let family_indices = families.unique();
        let (sharing_mode, shared_with) = if families.is_shared() {
            (vk::SharingMode::EXCLUSIVE, &[][..])
        } else {
            (vk::SharingMode::CONCURRENT, &family_indices[..])
        };

        let info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            min_image_count: image_count,
            image_format: format.format,
            image_color_space: format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: sharing_mode,
            queue_family_index_count: shared_with.len() as u32,
            p_queue_family_indices: shared_with.as_ptr(),
            pre_transform: support.capabilities.current_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode,
            clipped: vk::TRUE,
            old_swapchain: vk::SwapchainKHR::null(),
            ..Default::default()
        };
        let swapchain = gpu
            .create_swapchain(&info)
            .map_err(RenderError::vk("create_swapchain"))?;

        let mut generation = Self {
            swapchain,
            format,
            present_mode,
            extent,
            images: Vec::new(),
            views: Vec::new(),
            depth: None,
            render_pass: vk::RenderPass::null(),
            framebuffers: Vec::new(),
        };
        if let Err(e) = generation.build_dependents(gpu) {
            generation.destroy(gpu);
            return Err(e);
        }

        info!(
            format = ?format.format,
            color_space = ?format.color_space,
            present_mode = ?present_mode,
            "swapchain {}x{} with {} images",
            extent.width,
            extent.height,
            generation.images.len()
        );
        Ok(generation)
    }

    fn build_dependents(&mut self, gpu: &dyn Gpu) -> RenderResult<()> {
        self.images = gpu
            .swapchain_images(self.swapchain)
            .map_err(RenderError::vk("get_swapchain_images"))?;
        for &image in &self.images {
            let view = create_image_view(gpu, image, self.format.format)?;
            self.views.push(view);
        }

        let depth = DepthTarget::create(gpu, self.extent)?;
        let depth_view = depth.view;
        let depth_format = depth.image.format;
        self.depth = Some(depth);
        self.render_pass = create_render_pass(gpu, self.format.format, depth_format)?;

        for &view in &self.views {
            let attachments = [view, depth_view];
            let info = vk::FramebufferCreateInfo {
                s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                render_pass: self.render_pass,
                attachment_count: attachments.len() as u32,
                p_attachments: attachments.as_ptr(),
                width: self.extent.width,
                height: self.extent.height,
                layers: 1,
                ..Default::default()
            };
            let framebuffer = gpu
                .create_framebuffer(&info)
                .map_err(RenderError::vk("create_framebuffer"))?;
            self.framebuffers.push(framebuffer);
        }
        Ok(())
    }

    pub fn swapchain(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn framebuffers(&self) -> &[vk::Framebuffer] {
        &self.framebuffers
    }

    /// Reverse creation order: framebuffers, depth, render pass, views, swapchain.
    pub fn destroy(self, gpu: &dyn Gpu) {
        for framebuffer in self.framebuffers {
            gpu.destroy_framebuffer(framebuffer);
        }
        if let Some(depth) = self.depth {
            depth.destroy(gpu);
        }
        if self.render_pass != vk::RenderPass::null() {
            gpu.destroy_render_pass(self.render_pass);
        }
        for view in self.views {
            gpu.destroy_image_view(view);
        }
        gpu.destroy_swapchain(self.swapchain);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapchainState {
    Valid,
    Stale,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquired {
    Image { index: u32, suboptimal: bool },
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presented {
    Ok,
    /// Out of date or suboptimal; the manager is now `Stale`.
    Stale,
}

#[derive(Debug)]
pub struct SwapchainManager {
    generation: Option<SwapchainGeneration>,
    state: SwapchainState,
    prefs: SwapchainPrefs,
}

impl SwapchainManager {
    pub fn new(gpu: &dyn Gpu, window: RenderSize, prefs: SwapchainPrefs) -> RenderResult<Self> {
        Ok(Self {
            generation: Some(SwapchainGeneration::create(gpu, window, &prefs)?),
            state: SwapchainState::Valid,
            prefs,
        })
    }

    /// Fails once a recreation has torn the old generation down without
    /// managing to build a new one.
    pub fn generation(&self) -> RenderResult<&SwapchainGeneration> {
        self.generation.as_ref().ok_or(RenderError::SwapchainDestroyed)
    }

    pub fn state(&self) -> SwapchainState {
        self.state
    }

    pub fn mark_stale(&mut self) {
        self.state = SwapchainState::Stale;
    }

    pub fn acquire(&mut self, gpu: &dyn Gpu, signal: vk::Semaphore) -> RenderResult<Acquired> {
        let swapchain = self.generation()?.swapchain;
        match gpu.acquire_next_image(swapchain, signal) {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    self.state = SwapchainState::Stale;
                }
                Ok(Acquired::Image { index, suboptimal })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.state = SwapchainState::Stale;
                Ok(Acquired::OutOfDate)
            }
            Err(e) => Err(RenderError::vk("acquire_next_image")(e)),
        }
    }

    pub fn present(&mut self, gpu: &dyn Gpu, index: u32, wait: vk::Semaphore) -> RenderResult<Presented> {
        let swapchain = self.generation()?.swapchain;
        match gpu.queue_present(swapchain, index, wait) {
            Ok(false) => Ok(Presented::Ok),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.state = SwapchainState::Stale;
                Ok(Presented::Stale)
            }
            Err(e) => Err(RenderError::vk("queue_present")(e)),
        }
    }

    /// Waits for the device, tears the current generation down and builds a
    /// new one against `window`. The caller guarantees a non-zero size.
    pub fn recreate(&mut self, gpu: &dyn Gpu, window: RenderSize) -> RenderResult<()> {
        gpu.device_wait_idle()
            .map_err(RenderError::vk("device_wait_idle"))?;
        if let Some(old) = self.generation.take() {
            debug!(
                "tearing down {}x{} swapchain generation",
                old.extent.width, old.extent.height
            );
            old.destroy(gpu);
        }
        self.generation = Some(SwapchainGeneration::create(gpu, window, &self.prefs)?);
        self.state = SwapchainState::Valid;
        Ok(())
    }

    pub fn destroy(self, gpu: &dyn Gpu) {
        if let Some(generation) = self.generation {
            generation.destroy(gpu);
        }
    }
}

/// Spins on window events until the framebuffer has a non-zero size.
/// Returns `None` if the window is closed first. No GPU calls are made.
pub fn wait_for_drawable_extent(window: &mut dyn WindowPort) -> Option<RenderSize> {
    let mut logged = false;
    loop {
        let size = window.framebuffer_size();
        if !size.is_empty() {
            return Some(size);
        }
        if window.should_close() {
            return None;
        }
        if !logged {
            debug!("framebuffer is 0x0, waiting for the window to be restored");
            logged = true;
        }
        window.poll_events();
    }
}
