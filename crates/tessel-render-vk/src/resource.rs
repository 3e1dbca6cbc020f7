// SPDX-License-Identifier: CEPL-1.0
//! Buffers, images, host mapping, one-shot commands and layout transitions.
//!
//! Owning types release themselves through a consuming `destroy`, so each
//! handle is freed exactly once and only by its owner.

use std::ptr::NonNull;

use ash::vk;
use tracing::trace;

use crate::context::{has_stencil, is_depth};
use crate::error::{RenderError, RenderResult};
use crate::gpu::{Gpu, SubmitBatch};

pub const HOST_COHERENT: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

#[derive(Debug)]
pub struct Buffer {
    pub handle: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
    pub properties: vk::MemoryPropertyFlags,
}

impl Buffer {
    pub fn create(
        gpu: &dyn Gpu,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> RenderResult<Self> {
        if size == 0 {
            return Err(RenderError::EmptyResource("buffer"));
        }
        let info = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let handle = gpu.create_buffer(&info).map_err(RenderError::vk("create_buffer"))?;

        let req = gpu.buffer_memory_requirements(handle);
        let memory = match allocate_for(gpu, req, properties) {
            Ok(memory) => memory,
            Err(e) => {
                gpu.destroy_buffer(handle);
                return Err(e);
            }
        };
        if let Err(e) = gpu.bind_buffer_memory(handle, memory) {
            gpu.destroy_buffer(handle);
            gpu.free_memory(memory);
            return Err(RenderError::vk("bind_buffer_memory")(e));
        }

        Ok(Self {
            handle,
            memory,
            size,
            usage,
            properties,
        })
    }

    pub fn is_host_visible(&self) -> bool {
        self.properties.contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
    }

    pub fn destroy(self, gpu: &dyn Gpu) {
        gpu.destroy_buffer(self.handle);
        gpu.free_memory(self.memory);
    }
}

fn allocate_for(
    gpu: &dyn Gpu,
    req: vk::MemoryRequirements,
    properties: vk::MemoryPropertyFlags,
) -> RenderResult<vk::DeviceMemory> {
    let type_index = gpu.caps().find_memory_type(req.memory_type_bits, properties)?;
    gpu.allocate_memory(req.size, type_index)
        .map_err(RenderError::vk("allocate_memory"))
}

#[derive(Clone, Copy, Debug)]
pub struct ImageSpec {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
    pub properties: vk::MemoryPropertyFlags,
}

#[derive(Debug)]
pub struct Image {
    pub handle: vk::Image,
    pub memory: vk::DeviceMemory,
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
}

impl Image {
    /// 2D, single mip, optimal tiling.
    pub fn create(gpu: &dyn Gpu, spec: ImageSpec) -> RenderResult<Self> {
        if spec.extent.width == 0 || spec.extent.height == 0 {
            return Err(RenderError::EmptyResource("image"));
        }
        let info = vk::ImageCreateInfo {
            s_type: vk::StructureType::IMAGE_CREATE_INFO,
            image_type: vk::ImageType::TYPE_2D,
            format: spec.format,
            extent: vk::Extent3D {
                width: spec.extent.width,
                height: spec.extent.height,
                depth: 1,
            },
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: spec.usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            ..Default::default()
        };
        let handle = gpu.create_image(&info).map_err(RenderError::vk("create_image"))?;

        let req = gpu.image_memory_requirements(handle);
        let memory = match allocate_for(gpu, req, spec.properties) {
            Ok(memory) => memory,
            Err(e) => {
                gpu.destroy_image(handle);
                return Err(e);
            }
        };
        if let Err(e) = gpu.bind_image_memory(handle, memory) {
            gpu.destroy_image(handle);
            gpu.free_memory(memory);
            return Err(RenderError::vk("bind_image_memory")(e));
        }

        Ok(Self {
            handle,
            memory,
            extent: spec.extent,
            format: spec.format,
            usage: spec.usage,
        })
    }

    /// Tightly packed byte size of one full copy of this image.
    pub fn byte_size(&self) -> RenderResult<vk::DeviceSize> {
        let texel = texel_size(self.format).ok_or(RenderError::UnknownTexelSize(self.format))?;
        Ok(self.extent.width as u64 * self.extent.height as u64 * texel)
    }

    pub fn destroy(self, gpu: &dyn Gpu) {
        gpu.destroy_image(self.handle);
        gpu.free_memory(self.memory);
    }
}

/// Bytes per texel in a tightly packed copy; `None` for formats we never copy.
pub fn texel_size(format: vk::Format) -> Option<u64> {
    use ash::vk::Format as F;
    Some(match format {
        F::R8_UNORM | F::R8_SRGB => 1,
        F::D16_UNORM => 2,
        F::R8G8B8A8_UNORM
        | F::R8G8B8A8_SRGB
        | F::B8G8R8A8_UNORM
        | F::B8G8R8A8_SRGB
        | F::D32_SFLOAT
        | F::D24_UNORM_S8_UINT
        | F::X8_D24_UNORM_PACK32 => 4,
        F::D32_SFLOAT_S8_UINT | F::R16G16B16A16_SFLOAT => 8,
        F::R32G32B32A32_SFLOAT => 16,
        _ => return None,
    })
}

pub fn aspect_for(format: vk::Format) -> vk::ImageAspectFlags {
    if has_stencil(format) {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else if is_depth(format) {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

fn full_range(aspect_mask: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

pub fn create_image_view(
    gpu: &dyn Gpu,
    image: vk::Image,
    format: vk::Format,
) -> RenderResult<vk::ImageView> {
    let info = vk::ImageViewCreateInfo {
        s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
        image,
        view_type: vk::ImageViewType::TYPE_2D,
        format,
        subresource_range: full_range(aspect_for(format)),
        ..Default::default()
    };
    gpu.create_image_view(&info)
        .map_err(RenderError::vk("create_image_view"))
}

/// Persistently mapped host-visible buffer, rewritten by the CPU every frame.
#[derive(Debug)]
pub struct HostBuffer {
    buffer: Buffer,
    ptr: NonNull<u8>,
}

impl HostBuffer {
    pub fn create(gpu: &dyn Gpu, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> RenderResult<Self> {
        let buffer = Buffer::create(gpu, size, usage, HOST_COHERENT)?;
        let ptr = match gpu.map_memory(buffer.memory, size) {
            Ok(raw) => NonNull::new(raw),
            Err(e) => {
                buffer.destroy(gpu);
                return Err(RenderError::vk("map_memory")(e));
            }
        };
        match ptr {
            Some(ptr) => Ok(Self { buffer, ptr }),
            None => {
                gpu.unmap_memory(buffer.memory);
                buffer.destroy(gpu);
                Err(RenderError::vk("map_memory")(vk::Result::ERROR_MEMORY_MAP_FAILED))
            }
        }
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Copies `bytes` to `offset`. Out-of-range writes are rejected.
    pub fn write(&self, offset: vk::DeviceSize, bytes: &[u8]) -> RenderResult<()> {
        let capacity = self.buffer.size;
        offset
            .checked_add(bytes.len() as u64)
            .filter(|&end| end <= capacity)
            .ok_or(RenderError::UploadTooLarge {
                len: offset.saturating_add(bytes.len() as u64),
                capacity,
            })?;
        // SAFETY: the mapping covers `size` bytes, stays alive until `destroy`
        // and the range was checked above.
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.ptr.as_ptr().add(offset as usize),
                bytes.len(),
            );
        }
        Ok(())
    }

    pub fn destroy(self, gpu: &dyn Gpu) {
        gpu.unmap_memory(self.buffer.memory);
        self.buffer.destroy(gpu);
    }
}

/// Map, copy, zero the rest of the buffer, unmap.
pub fn write_mapped(gpu: &dyn Gpu, buffer: &Buffer, bytes: &[u8]) -> RenderResult<()> {
    if bytes.len() as u64 > buffer.size {
        return Err(RenderError::UploadTooLarge {
            len: bytes.len() as u64,
            capacity: buffer.size,
        });
    }
    let ptr = gpu
        .map_memory(buffer.memory, buffer.size)
        .map_err(RenderError::vk("map_memory"))?;
    // SAFETY: freshly mapped range of `buffer.size` bytes, length checked above.
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len());
        std::ptr::write_bytes(ptr.add(bytes.len()), 0, buffer.size as usize - bytes.len());
    }
    gpu.unmap_memory(buffer.memory);
    Ok(())
}

/// Map, copy out `len` bytes, unmap.
pub fn read_mapped(gpu: &dyn Gpu, buffer: &Buffer, len: usize) -> RenderResult<Vec<u8>> {
    let len = len.min(buffer.size as usize);
    let ptr = gpu
        .map_memory(buffer.memory, buffer.size)
        .map_err(RenderError::vk("map_memory"))?;
    let mut out = vec![0u8; len];
    // SAFETY: mapped range covers `buffer.size >= len` bytes.
    unsafe { std::ptr::copy_nonoverlapping(ptr as *const u8, out.as_mut_ptr(), len) };
    gpu.unmap_memory(buffer.memory);
    Ok(out)
}

/// Records a single-use command buffer, submits it and blocks until the queue
/// drains. Load-time only.
pub fn one_shot(
    gpu: &dyn Gpu,
    pool: vk::CommandPool,
    queue: vk::Queue,
    record: impl FnOnce(vk::CommandBuffer) -> RenderResult<()>,
) -> RenderResult<()> {
    let cmds = gpu
        .allocate_command_buffers(pool, 1)
        .map_err(RenderError::vk("allocate_command_buffers"))?;
    let result = submit_one_shot(gpu, queue, cmds[0], record);
    gpu.free_command_buffers(pool, &cmds);
    result
}

fn submit_one_shot(
    gpu: &dyn Gpu,
    queue: vk::Queue,
    cmd: vk::CommandBuffer,
    record: impl FnOnce(vk::CommandBuffer) -> RenderResult<()>,
) -> RenderResult<()> {
    gpu.begin_command_buffer(cmd, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
        .map_err(RenderError::vk("begin_command_buffer"))?;
    record(cmd)?;
    gpu.end_command_buffer(cmd)
        .map_err(RenderError::vk("end_command_buffer"))?;

    let batch = SubmitBatch {
        command_buffers: std::slice::from_ref(&cmd),
        ..Default::default()
    };
    gpu.queue_submit(queue, &batch, vk::Fence::null())
        .map_err(RenderError::vk("queue_submit"))?;
    gpu.queue_wait_idle(queue)
        .map_err(RenderError::vk("queue_wait_idle"))?;
    trace!("one-shot command buffer retired");
    Ok(())
}

/// Access masks and stages for one supported layout transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutTransition {
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

pub fn layout_transition(
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> RenderResult<LayoutTransition> {
    use ash::vk::AccessFlags as A;
    use ash::vk::ImageLayout as L;
    use ash::vk::PipelineStageFlags as S;

    let t = |src_access, dst_access, src_stage, dst_stage| LayoutTransition {
        src_access,
        dst_access,
        src_stage,
        dst_stage,
    };
    let depth_rw = A::DEPTH_STENCIL_ATTACHMENT_READ | A::DEPTH_STENCIL_ATTACHMENT_WRITE;

    Ok(match (old, new) {
        (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => {
            t(A::empty(), A::TRANSFER_WRITE, S::TOP_OF_PIPE, S::TRANSFER)
        }
        (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => {
            t(A::TRANSFER_WRITE, A::SHADER_READ, S::TRANSFER, S::FRAGMENT_SHADER)
        }
        (L::TRANSFER_DST_OPTIMAL, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => {
            t(A::TRANSFER_WRITE, depth_rw, S::TRANSFER, S::EARLY_FRAGMENT_TESTS)
        }
        (L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => {
            t(A::empty(), depth_rw, S::TOP_OF_PIPE, S::EARLY_FRAGMENT_TESTS)
        }
        (L::SHADER_READ_ONLY_OPTIMAL, L::TRANSFER_SRC_OPTIMAL) => {
            t(A::SHADER_READ, A::TRANSFER_READ, S::FRAGMENT_SHADER, S::TRANSFER)
        }
        (L::TRANSFER_SRC_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => {
            t(A::TRANSFER_READ, A::SHADER_READ, S::TRANSFER, S::FRAGMENT_SHADER)
        }
        (old, new) => return Err(RenderError::UnsupportedLayoutTransition { old, new }),
    })
}

/// Records the barrier for `old -> new` on the whole image.
pub fn cmd_transition(
    gpu: &dyn Gpu,
    cmd: vk::CommandBuffer,
    image: &Image,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> RenderResult<()> {
    let t = layout_transition(old, new)?;
    let barrier = vk::ImageMemoryBarrier {
        s_type: vk::StructureType::IMAGE_MEMORY_BARRIER,
        src_access_mask: t.src_access,
        dst_access_mask: t.dst_access,
        old_layout: old,
        new_layout: new,
        src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        image: image.handle,
        subresource_range: full_range(aspect_for(image.format)),
        ..Default::default()
    };
    gpu.cmd_pipeline_barrier(cmd, t.src_stage, t.dst_stage, std::slice::from_ref(&barrier));
    Ok(())
}

/// Whole-image copy region for a tightly packed buffer.
pub fn image_copy_region(image: &Image) -> vk::BufferImageCopy {
    let aspect = aspect_for(image.format);
    // Buffer copies address one aspect at a time.
    let aspect = if aspect.contains(vk::ImageAspectFlags::DEPTH) {
        vk::ImageAspectFlags::DEPTH
    } else {
        aspect
    };
    vk::BufferImageCopy {
        buffer_offset: 0,
        buffer_row_length: 0,
        buffer_image_height: 0,
        image_subresource: vk::ImageSubresourceLayers {
            aspect_mask: aspect,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        },
        image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
        image_extent: vk::Extent3D {
            width: image.extent.width,
            height: image.extent.height,
            depth: 1,
        },
    }
}
