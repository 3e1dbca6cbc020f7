// SPDX-License-Identifier: CEPL-1.0
//! Staged uploads into device-local memory.
//!
//! Everything here blocks on `queue_wait_idle`; it is meant for load time and
//! must not be called from inside the frame loop.

use ash::vk;
use tracing::debug;

use crate::error::{RenderError, RenderResult};
use crate::gpu::{Gpu, QueueKind};
use crate::resource::{
    cmd_transition, image_copy_region, one_shot, read_mapped, write_mapped, Buffer, Image,
    HOST_COHERENT,
};

/// Destination of an upload.
#[derive(Clone, Copy, Debug)]
pub enum DeviceLocal<'a> {
    Buffer(&'a Buffer),
    Image(&'a Image),
}

impl DeviceLocal<'_> {
    fn capacity(&self) -> RenderResult<vk::DeviceSize> {
        match self {
            DeviceLocal::Buffer(b) => Ok(b.size),
            DeviceLocal::Image(i) => i.byte_size(),
        }
    }
}

/// Layout an uploaded image is left in, chosen by what it will be used for.
pub fn settled_layout(usage: vk::ImageUsageFlags) -> vk::ImageLayout {
    if usage.contains(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT) {
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
    } else {
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    }
}

/// Owns the transient scratch pool used for one-shot transfer commands.
#[derive(Debug)]
pub struct StagingUploader {
    pool: vk::CommandPool,
    queue: vk::Queue,
}

impl StagingUploader {
    pub fn new(gpu: &dyn Gpu) -> RenderResult<Self> {
        let pool = gpu
            .create_command_pool(vk::CommandPoolCreateFlags::TRANSIENT)
            .map_err(RenderError::vk("create_command_pool(scratch)"))?;
        Ok(Self {
            pool,
            queue: gpu.queue(QueueKind::Graphics),
        })
    }

    /// Copies `data` into `dst` through a temporary host-visible buffer.
    ///
    /// Images go `UNDEFINED -> TRANSFER_DST`, receive the copy, then move to
    /// [`settled_layout`]. A short payload zeroes the rest of an image and
    /// leaves the rest of a buffer untouched.
    pub fn upload_to_device_local(
        &self,
        gpu: &dyn Gpu,
        dst: DeviceLocal<'_>,
        data: &[u8],
    ) -> RenderResult<()> {
        if data.is_empty() {
            return Err(RenderError::EmptyResource("upload payload"));
        }
        let capacity = dst.capacity()?;
        if data.len() as u64 > capacity {
            return Err(RenderError::UploadTooLarge {
                len: data.len() as u64,
                capacity,
            });
        }

        // Image copies always read a full image worth of texels.
        let staging_size = match dst {
            DeviceLocal::Buffer(_) => data.len() as u64,
            DeviceLocal::Image(_) => capacity,
        };
        let staging = Buffer::create(
            gpu,
            staging_size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            HOST_COHERENT,
        )?;
        let result = write_mapped(gpu, &staging, data)
            .and_then(|()| self.copy_from_staging(gpu, &staging, dst, data.len() as u64));
        staging.destroy(gpu);
        if result.is_ok() {
            debug!(bytes = data.len(), "staged upload complete");
        }
        result
    }

    fn copy_from_staging(
        &self,
        gpu: &dyn Gpu,
        staging: &Buffer,
        dst: DeviceLocal<'_>,
        len: vk::DeviceSize,
    ) -> RenderResult<()> {
        one_shot(gpu, self.pool, self.queue, |cmd| match dst {
            DeviceLocal::Buffer(buffer) => {
                let region = vk::BufferCopy {
                    src_offset: 0,
                    dst_offset: 0,
                    size: len,
                };
                gpu.cmd_copy_buffer(cmd, staging.handle, buffer.handle, &[region]);
                Ok(())
            }
            DeviceLocal::Image(image) => {
                cmd_transition(
                    gpu,
                    cmd,
                    image,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                )?;
                gpu.cmd_copy_buffer_to_image(
                    cmd,
                    staging.handle,
                    image.handle,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[image_copy_region(image)],
                );
                cmd_transition(
                    gpu,
                    cmd,
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    settled_layout(image.usage),
                )
            }
        })
    }

    /// Fresh host-visible copy of a device-local buffer. Needs `TRANSFER_SRC` usage.
    pub fn read_back_buffer(&self, gpu: &dyn Gpu, src: &Buffer) -> RenderResult<Vec<u8>> {
        let readback = Buffer::create(gpu, src.size, vk::BufferUsageFlags::TRANSFER_DST, HOST_COHERENT)?;
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size: src.size,
        };
        let result = one_shot(gpu, self.pool, self.queue, |cmd| {
            gpu.cmd_copy_buffer(cmd, src.handle, readback.handle, &[region]);
            Ok(())
        })
        .and_then(|()| read_mapped(gpu, &readback, src.size as usize));
        readback.destroy(gpu);
        result
    }

    /// Fresh host-visible copy of a sampled image; the image is returned to
    /// `SHADER_READ_ONLY_OPTIMAL` afterwards.
    pub fn read_back_image(&self, gpu: &dyn Gpu, src: &Image) -> RenderResult<Vec<u8>> {
        let size = src.byte_size()?;
        let readback = Buffer::create(gpu, size, vk::BufferUsageFlags::TRANSFER_DST, HOST_COHERENT)?;
        let result = one_shot(gpu, self.pool, self.queue, |cmd| {
            cmd_transition(
                gpu,
                cmd,
                src,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            )?;
            gpu.cmd_copy_image_to_buffer(
                cmd,
                src.handle,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                readback.handle,
                &[image_copy_region(src)],
            );
            cmd_transition(
                gpu,
                cmd,
                src,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )
        })
        .and_then(|()| read_mapped(gpu, &readback, size as usize));
        readback.destroy(gpu);
        result
    }

    pub fn destroy(self, gpu: &dyn Gpu) {
        gpu.destroy_command_pool(self.pool);
    }
}
