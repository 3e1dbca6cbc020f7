// SPDX-License-Identifier: CEPL-1.0
//! Frame slots: the CPU-side bound on frames in flight.

use ash::vk;
use tracing::trace;

use crate::error::{RenderError, RenderResult};
use crate::gpu::{Gpu, SubmitBatch};

/// K. Independent of the swapchain image count.
pub const FRAMES_IN_FLIGHT: usize = 2;

#[derive(Clone, Copy, Debug)]
pub struct FrameSlot {
    pub image_acquired: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    /// Created signalled so the first wait on each slot returns at once.
    pub in_flight: vk::Fence,
}

impl FrameSlot {
    fn create(gpu: &dyn Gpu) -> RenderResult<Self> {
        let image_acquired = gpu
            .create_semaphore()
            .map_err(RenderError::vk("create_semaphore"))?;
        let render_finished = match gpu.create_semaphore() {
            Ok(s) => s,
            Err(e) => {
                gpu.destroy_semaphore(image_acquired);
                return Err(RenderError::vk("create_semaphore")(e));
            }
        };
        match gpu.create_fence(true) {
            Ok(in_flight) => Ok(Self {
                image_acquired,
                render_finished,
                in_flight,
            }),
            Err(e) => {
                gpu.destroy_semaphore(render_finished);
                gpu.destroy_semaphore(image_acquired);
                Err(RenderError::vk("create_fence")(e))
            }
        }
    }

    fn destroy(self, gpu: &dyn Gpu) {
        gpu.destroy_fence(self.in_flight);
        gpu.destroy_semaphore(self.render_finished);
        gpu.destroy_semaphore(self.image_acquired);
    }
}

/// Rotates through [`FRAMES_IN_FLIGHT`] slots and remembers which slot last
/// submitted work for each swapchain image.
#[derive(Debug)]
pub struct FrameScheduler {
    slots: Vec<FrameSlot>,
    current: usize,
    frame: u64,
    images_in_flight: Vec<Option<usize>>,
}

impl FrameScheduler {
    pub fn new(gpu: &dyn Gpu, image_count: usize) -> RenderResult<Self> {
        let mut slots = Vec::with_capacity(FRAMES_IN_FLIGHT);
        for _ in 0..FRAMES_IN_FLIGHT {
            match FrameSlot::create(gpu) {
                Ok(slot) => slots.push(slot),
                Err(e) => {
                    for slot in slots {
                        slot.destroy(gpu);
                    }
                    return Err(e);
                }
            }
        }
        Ok(Self {
            slots,
            current: 0,
            frame: 0,
            images_in_flight: vec![None; image_count],
        })
    }

    pub fn current(&self) -> FrameSlot {
        self.slots[self.current]
    }

    pub fn slot_index(&self) -> usize {
        self.current
    }

    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    /// Blocks until the GPU is done with everything last submitted from this slot.
    pub fn wait_current(&self, gpu: &dyn Gpu) -> RenderResult<()> {
        gpu.wait_for_fence(self.slots[self.current].in_flight)
            .map_err(RenderError::vk("wait_for_fences"))
    }

    /// Records that the current slot is about to use `image_index`, first
    /// waiting for another slot that may still be rendering into it.
    pub fn claim_image(&mut self, gpu: &dyn Gpu, image_index: u32) -> RenderResult<()> {
        let image = image_index as usize;
        if let Some(previous) = self.images_in_flight[image] {
            if previous != self.current {
                trace!(image, previous, "waiting on slot still using the image");
                gpu.wait_for_fence(self.slots[previous].in_flight)
                    .map_err(RenderError::vk("wait_for_fences"))?;
            }
        }
        self.images_in_flight[image] = Some(self.current);
        Ok(())
    }

    /// Resets the current slot fence and submits `cmd` so that it waits for
    /// the acquire and signals both the render-finished semaphore and the fence.
    pub fn submit(&self, gpu: &dyn Gpu, queue: vk::Queue, cmd: vk::CommandBuffer) -> RenderResult<()> {
        let slot = self.current();
        gpu.reset_fence(slot.in_flight)
            .map_err(RenderError::vk("reset_fences"))?;
        let wait = [(
            slot.image_acquired,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        )];
        let batch = SubmitBatch {
            wait: &wait,
            command_buffers: std::slice::from_ref(&cmd),
            signal: std::slice::from_ref(&slot.render_finished),
        };
        gpu.queue_submit(queue, &batch, slot.in_flight)
            .map_err(RenderError::vk("queue_submit"))
    }

    pub fn advance(&mut self) {
        self.frame += 1;
        self.current = (self.current + 1) % self.slots.len();
    }

    /// Forgets image ownership after the device went idle, resizing for a
    /// new swapchain generation.
    pub fn reset_images(&mut self, image_count: usize) {
        self.images_in_flight = vec![None; image_count];
    }

    pub fn destroy(self, gpu: &dyn Gpu) {
        for slot in self.slots {
            slot.destroy(gpu);
        }
    }
}
