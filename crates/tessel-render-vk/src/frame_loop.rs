// SPDX-License-Identifier: CEPL-1.0
//! The render loop: wait slot, acquire, update uniforms, submit, present,
//! advance, and rebuild the swapchain generation whenever it goes stale.

use std::time::Instant;

use anyhow::{Context, Result};
use tessel_math::{aspect_ratio, Transforms};
use tessel_render::{MeshData, RenderSize, Renderer, TextureData, WindowPort};
use tracing::{debug, info, trace};

use crate::error::RenderResult;
use crate::frame::FrameScheduler;
use crate::gpu::{Gpu, QueueKind};
use crate::pipeline::{GraphicsPipeline, ShaderSet};
use crate::record::{record_all, CommandBuffers};
use crate::scene::{FrameUniforms, SceneResources};
use crate::swapchain::{
    wait_for_drawable_extent, Acquired, SwapchainManager, SwapchainPrefs, SwapchainState,
};
use crate::upload::StagingUploader;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderConfig {
    pub clear_color: [f32; 4],
    pub swapchain: SwapchainPrefs,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.02, 0.02, 0.03, 1.0],
            swapchain: SwapchainPrefs::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// The swapchain was rebuilt instead of drawing.
    Rebuilt,
    /// The window closed while waiting for a drawable size.
    Closed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames_presented: u64,
    pub regenerations: u64,
}

/// Owns the device and every resource that draws with it.
pub struct FrameLoop<G: Gpu> {
    gpu: G,
    uploader: StagingUploader,
    scene: SceneResources,
    swapchain: SwapchainManager,
    shaders: ShaderSet,
    pipeline: GraphicsPipeline,
    uniforms: FrameUniforms,
    commands: CommandBuffers,
    scheduler: FrameScheduler,
    clear_color: [f32; 4],
    resize_pending: bool,
    needs_record: bool,
    started: Instant,
    stats: FrameStats,
}

impl<G: Gpu> FrameLoop<G> {
    /// Uploads the scene, builds the first swapchain generation and records
    /// every image's command buffer.
    ///
    /// A failure here is fatal; the device is dropped right after, so partial
    /// state is not unwound.
    pub fn new(
        gpu: G,
        window: RenderSize,
        mesh: &MeshData,
        texture: &TextureData,
        shaders: ShaderSet,
        config: RenderConfig,
    ) -> RenderResult<Self> {
        let uploader = StagingUploader::new(&gpu)?;
        let scene = SceneResources::load(&gpu, &uploader, mesh, texture)?;
        let swapchain = SwapchainManager::new(&gpu, window, config.swapchain)?;
        let generation = swapchain.generation()?;
        let image_count = generation.image_count();
        let pipeline = GraphicsPipeline::build(
            &gpu,
            &shaders,
            generation.render_pass(),
            generation.extent(),
            scene.set_layout,
        )?;
        let uniforms = FrameUniforms::create(&gpu, &scene, image_count)?;
        let commands = CommandBuffers::allocate(&gpu, image_count)?;
        record_all(
            &gpu,
            &commands,
            generation,
            &pipeline,
            &scene,
            &uniforms,
            config.clear_color,
        )?;
        let scheduler = FrameScheduler::new(&gpu, image_count)?;

        info!(device = %gpu.caps().device_name, image_count, "renderer ready");
        Ok(Self {
            gpu,
            uploader,
            scene,
            swapchain,
            shaders,
            pipeline,
            uniforms,
            commands,
            scheduler,
            clear_color: config.clear_color,
            resize_pending: false,
            needs_record: false,
            started: Instant::now(),
            stats: FrameStats::default(),
        })
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn swapchain(&self) -> &SwapchainManager {
        &self.swapchain
    }

    /// Flags the swapchain for recreation on the next frame.
    pub fn notify_resized(&mut self) {
        self.resize_pending = true;
    }

    /// One pass through the frame cycle.
    pub fn draw_frame(&mut self, window: &mut dyn WindowPort) -> RenderResult<FrameOutcome> {
        if window.take_resized() {
            self.resize_pending = true;
        }
        if self.resize_pending || self.swapchain.state() == SwapchainState::Stale {
            return self.rebuild(window);
        }
        if self.needs_record {
            self.rerecord()?;
        }

        let gpu: &dyn Gpu = &self.gpu;
        self.scheduler.wait_current(gpu)?;
        let slot = self.scheduler.current();

        let image_index = match self.swapchain.acquire(gpu, slot.image_acquired)? {
            Acquired::Image { index, .. } => index,
            Acquired::OutOfDate => {
                debug!("acquire reported out of date");
                return self.rebuild(window);
            }
        };
        self.scheduler.claim_image(gpu, image_index)?;

        let extent = self.swapchain.generation()?.extent();
        let transforms = Transforms::spinning(
            self.started.elapsed().as_secs_f32(),
            aspect_ratio(extent.width, extent.height),
        );
        self.uniforms.write(image_index as usize, &transforms)?;

        let queue = gpu.queue(QueueKind::Graphics);
        self.scheduler
            .submit(gpu, queue, self.commands.get(image_index as usize))?;
        let presented = self
            .swapchain
            .present(gpu, image_index, slot.render_finished)?;
        self.scheduler.advance();
        self.stats.frames_presented += 1;
        trace!(
            frame = self.scheduler.frame_index(),
            image_index,
            ?presented,
            "frame submitted"
        );

        if window.take_resized() {
            self.resize_pending = true;
        }
        // A suboptimal acquire leaves the manager stale even when present succeeds.
        if self.resize_pending || self.swapchain.state() == SwapchainState::Stale {
            if self.rebuild(window)? == FrameOutcome::Closed {
                return Ok(FrameOutcome::Closed);
            }
        }
        Ok(FrameOutcome::Presented)
    }

    /// Polls the window and draws until it closes, or until `max_frames` more
    /// frames have been presented.
    pub fn run(&mut self, window: &mut dyn WindowPort, max_frames: Option<u64>) -> RenderResult<FrameStats> {
        let start = self.stats.frames_presented;
        loop {
            window.poll_events();
            if window.should_close() {
                break;
            }
            if max_frames.is_some_and(|max| self.stats.frames_presented - start >= max) {
                break;
            }
            if self.draw_frame(window)? == FrameOutcome::Closed {
                break;
            }
        }
        Ok(self.stats)
    }

    /// Waits for a drawable size, then replaces the swapchain generation, the
    /// pipeline and (when the image count changed) the per-image resources,
    /// and re-records every command buffer.
    fn rebuild(&mut self, window: &mut dyn WindowPort) -> RenderResult<FrameOutcome> {
        let Some(size) = wait_for_drawable_extent(window) else {
            return Ok(FrameOutcome::Closed);
        };
        let gpu: &dyn Gpu = &self.gpu;

        self.swapchain.recreate(gpu, size)?;
        let generation = self.swapchain.generation()?;
        let image_count = generation.image_count();

        let pipeline = GraphicsPipeline::build(
            gpu,
            &self.shaders,
            generation.render_pass(),
            generation.extent(),
            self.scene.set_layout,
        )?;
        std::mem::replace(&mut self.pipeline, pipeline).destroy(gpu);

        if image_count != self.uniforms.len() {
            debug!(
                from = self.uniforms.len(),
                to = image_count,
                "image count changed, rebuilding per-image resources"
            );
            let uniforms = FrameUniforms::create(gpu, &self.scene, image_count)?;
            std::mem::replace(&mut self.uniforms, uniforms).destroy(gpu);
            self.commands.reallocate(gpu, image_count)?;
        }
        self.scheduler.reset_images(image_count);
        record_all(
            gpu,
            &self.commands,
            generation,
            &self.pipeline,
            &self.scene,
            &self.uniforms,
            self.clear_color,
        )?;

        // The resize that got us here has been handled.
        window.take_resized();
        self.resize_pending = false;
        self.needs_record = false;
        self.stats.regenerations += 1;
        let extent = generation.extent();
        info!(
            regeneration = self.stats.regenerations,
            "swapchain rebuilt at {}x{}",
            extent.width,
            extent.height
        );
        Ok(FrameOutcome::Rebuilt)
    }

    fn rerecord(&mut self) -> RenderResult<()> {
        let gpu: &dyn Gpu = &self.gpu;
        gpu.device_wait_idle()
            .map_err(crate::error::RenderError::vk("device_wait_idle"))?;
        record_all(
            gpu,
            &self.commands,
            self.swapchain.generation()?,
            &self.pipeline,
            &self.scene,
            &self.uniforms,
            self.clear_color,
        )?;
        self.needs_record = false;
        Ok(())
    }

    /// Waits for the device, releases everything in dependency order and
    /// hands the device back.
    pub fn teardown(self) -> RenderResult<(G, FrameStats)> {
        let gpu: &dyn Gpu = &self.gpu;
        gpu.device_wait_idle()
            .map_err(crate::error::RenderError::vk("device_wait_idle"))?;

        self.commands.destroy(gpu);
        self.uniforms.destroy(gpu);
        self.pipeline.destroy(gpu);
        self.swapchain.destroy(gpu);
        self.scene.destroy(gpu);
        self.scheduler.destroy(gpu);
        self.uploader.destroy(gpu);

        info!(
            frames = self.stats.frames_presented,
            regenerations = self.stats.regenerations,
            "renderer shut down"
        );
        Ok((self.gpu, self.stats))
    }
}

impl<G: Gpu> Renderer for FrameLoop<G> {
    fn run_frame_loop(&mut self, window: &mut dyn WindowPort, max_frames: Option<u64>) -> Result<()> {
        self.run(window, max_frames).context("frame loop failed")?;
        Ok(())
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        if self.clear_color != rgba {
            self.clear_color = rgba;
            self.needs_record = true;
        }
    }

    fn shutdown(self) -> Result<()> {
        self.teardown().context("renderer shutdown failed")?;
        Ok(())
    }
}
