// SPDX-License-Identifier: CEPL-1.0
//! One persistent command buffer per swapchain image.

use ash::vk;
use tracing::debug;

use crate::error::{RenderError, RenderResult};
use crate::gpu::Gpu;
use crate::pipeline::GraphicsPipeline;
use crate::scene::{FrameUniforms, SceneResources};
use crate::swapchain::SwapchainGeneration;

#[derive(Debug)]
pub struct CommandBuffers {
    pool: vk::CommandPool,
    buffers: Vec<vk::CommandBuffer>,
}

impl CommandBuffers {
    pub fn allocate(gpu: &dyn Gpu, count: usize) -> RenderResult<Self> {
        let pool = gpu
            .create_command_pool(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .map_err(RenderError::vk("create_command_pool"))?;
        match gpu.allocate_command_buffers(pool, count as u32) {
            Ok(buffers) => Ok(Self { pool, buffers }),
            Err(e) => {
                gpu.destroy_command_pool(pool);
                Err(RenderError::vk("allocate_command_buffers")(e))
            }
        }
    }

    /// Replaces every buffer. The device must be idle.
    pub fn reallocate(&mut self, gpu: &dyn Gpu, count: usize) -> RenderResult<()> {
        gpu.free_command_buffers(self.pool, &self.buffers);
        self.buffers.clear();
        self.buffers = gpu
            .allocate_command_buffers(self.pool, count as u32)
            .map_err(RenderError::vk("allocate_command_buffers"))?;
        Ok(())
    }

    pub fn get(&self, image_index: usize) -> vk::CommandBuffer {
        self.buffers[image_index]
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn destroy(self, gpu: &dyn Gpu) {
        gpu.free_command_buffers(self.pool, &self.buffers);
        gpu.destroy_command_pool(self.pool);
    }
}

/// Inputs for recording one image's draw.
#[derive(Clone, Copy, Debug)]
pub struct FrameDraw<'a> {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub pipeline: &'a GraphicsPipeline,
    pub scene: &'a SceneResources,
    pub descriptor_set: vk::DescriptorSet,
    pub clear_color: [f32; 4],
}

pub fn record_frame(gpu: &dyn Gpu, cmd: vk::CommandBuffer, draw: &FrameDraw<'_>) -> RenderResult<()> {
    gpu.reset_command_buffer(cmd)
        .map_err(RenderError::vk("reset_command_buffer"))?;
    gpu.begin_command_buffer(cmd, vk::CommandBufferUsageFlags::SIMULTANEOUS_USE)
        .map_err(RenderError::vk("begin_command_buffer"))?;

    let clears = [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: draw.clear_color,
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        },
    ];
    let begin = vk::RenderPassBeginInfo {
        s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
        render_pass: draw.render_pass,
        framebuffer: draw.framebuffer,
        render_area: vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: draw.extent,
        },
        clear_value_count: clears.len() as u32,
        p_clear_values: clears.as_ptr(),
        ..Default::default()
    };

    let mesh = &draw.scene.mesh;
    gpu.cmd_begin_render_pass(cmd, &begin);
    gpu.cmd_bind_pipeline(cmd, draw.pipeline.handle);
    gpu.cmd_bind_vertex_buffer(cmd, mesh.vertex.handle);
    gpu.cmd_bind_index_buffer(cmd, mesh.index.handle, vk::IndexType::UINT32);
    gpu.cmd_bind_descriptor_set(cmd, draw.pipeline.layout, draw.descriptor_set);
    gpu.cmd_draw_indexed(cmd, mesh.index_count);
    gpu.cmd_end_render_pass(cmd);

    gpu.end_command_buffer(cmd)
        .map_err(RenderError::vk("end_command_buffer"))
}

/// Re-records every image's buffer against the current generation and pipeline.
pub fn record_all(
    gpu: &dyn Gpu,
    commands: &CommandBuffers,
    generation: &SwapchainGeneration,
    pipeline: &GraphicsPipeline,
    scene: &SceneResources,
    uniforms: &FrameUniforms,
    clear_color: [f32; 4],
) -> RenderResult<()> {
    for (i, &framebuffer) in generation.framebuffers().iter().enumerate() {
        let draw = FrameDraw {
            render_pass: generation.render_pass(),
            framebuffer,
            extent: generation.extent(),
            pipeline,
            scene,
            descriptor_set: uniforms.set(i),
            clear_color,
        };
        record_frame(gpu, commands.get(i), &draw)?;
    }
    debug!(count = commands.len(), "command buffers recorded");
    Ok(())
}
