// SPDX-License-Identifier: CEPL-1.0
//! Shader loading and the single mesh pipeline.

use std::ffi::CStr;
use std::io::Cursor;
use std::mem::{offset_of, size_of};
use std::path::Path;

use ash::vk;
use tessel_render::Vertex;
use tracing::debug;

use crate::error::{RenderError, RenderResult};
use crate::gpu::Gpu;

pub const VERTEX_SPV: &str = "mesh.vert.spv";
pub const FRAGMENT_SPV: &str = "mesh.frag.spv";

const SPIRV_MAGIC: u32 = 0x0723_0203;
const ENTRY: &CStr = c"main";

/// Compiled SPIR-V for the vertex and fragment stages.
#[derive(Clone, Debug)]
pub struct ShaderSet {
    vertex: Vec<u32>,
    fragment: Vec<u32>,
}

fn parse_spirv(stage: &'static str, bytes: &[u8]) -> RenderResult<Vec<u32>> {
    let words = ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|e| RenderError::InvalidShader {
        stage,
        reason: e.to_string(),
    })?;
    if words.first() != Some(&SPIRV_MAGIC) {
        return Err(RenderError::InvalidShader {
            stage,
            reason: "missing SPIR-V magic number".into(),
        });
    }
    Ok(words)
}

impl ShaderSet {
    pub fn from_spirv(vertex: &[u8], fragment: &[u8]) -> RenderResult<Self> {
        Ok(Self {
            vertex: parse_spirv("vertex", vertex)?,
            fragment: parse_spirv("fragment", fragment)?,
        })
    }

    /// Reads `mesh.vert.spv` and `mesh.frag.spv` from `dir`.
    pub fn load_dir(dir: &Path) -> RenderResult<Self> {
        let read = |stage: &'static str, name: &str| {
            let path = dir.join(name);
            std::fs::read(&path).map_err(|e| RenderError::InvalidShader {
                stage,
                reason: format!("{}: {e}", path.display()),
            })
        };
        let vertex = read("vertex", VERTEX_SPV)?;
        let fragment = read("fragment", FRAGMENT_SPV)?;
        debug!(dir = %dir.display(), "loaded SPIR-V");
        Self::from_spirv(&vertex, &fragment)
    }

    /// Shaders compiled by the build script.
    #[cfg(feature = "embed-shaders")]
    pub fn embedded() -> RenderResult<Self> {
        Self::from_spirv(
            include_bytes!(concat!(env!("OUT_DIR"), "/mesh.vert.spv")),
            include_bytes!(concat!(env!("OUT_DIR"), "/mesh.frag.spv")),
        )
    }
}

fn vertex_attributes() -> [vk::VertexInputAttributeDescription; 3] {
    let attr = |location, format, offset: usize| vk::VertexInputAttributeDescription {
        location,
        binding: 0,
        format,
        offset: offset as u32,
    };
    [
        attr(0, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, position)),
        attr(1, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, color)),
        attr(2, vk::Format::R32G32_SFLOAT, offset_of!(Vertex, uv)),
    ]
}

#[derive(Debug)]
pub struct GraphicsPipeline {
    pub layout: vk::PipelineLayout,
    pub handle: vk::Pipeline,
}

impl GraphicsPipeline {
    /// Viewport and scissor are baked in, so this is rebuilt with every swapchain generation.
    pub fn build(
        gpu: &dyn Gpu,
        shaders: &ShaderSet,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
        set_layout: vk::DescriptorSetLayout,
    ) -> RenderResult<Self> {
        let vert = gpu
            .create_shader_module(&shaders.vertex)
            .map_err(RenderError::vk("create_shader_module(vertex)"))?;
        let frag = match gpu.create_shader_module(&shaders.fragment) {
            Ok(module) => module,
            Err(e) => {
                gpu.destroy_shader_module(vert);
                return Err(RenderError::vk("create_shader_module(fragment)")(e));
            }
        };

        let result = Self::build_with_modules(gpu, vert, frag, render_pass, extent, set_layout);
        // Modules are only needed while the pipeline is being created.
        gpu.destroy_shader_module(vert);
        gpu.destroy_shader_module(frag);
        result
    }

    fn build_with_modules(
        gpu: &dyn Gpu,
        vert: vk::ShaderModule,
        frag: vk::ShaderModule,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
        set_layout: vk::DescriptorSetLayout,
    ) -> RenderResult<Self> {
        let stages = [
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::VERTEX,
                module: vert,
                p_name: ENTRY.as_ptr(),
                ..Default::default()
            },
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: frag,
                p_name: ENTRY.as_ptr(),
                ..Default::default()
            },
        ];

        let binding = vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        };
        let attributes = vertex_attributes();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            vertex_binding_description_count: 1,
            p_vertex_binding_descriptions: &binding,
            vertex_attribute_description_count: attributes.len() as u32,
            p_vertex_attribute_descriptions: attributes.as_ptr(),
            ..Default::default()
        };
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            primitive_restart_enable: vk::FALSE,
            ..Default::default()
        };

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let viewport_state = vk::PipelineViewportStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
            viewport_count: 1,
            p_viewports: &viewport,
            scissor_count: 1,
            p_scissors: &scissor,
            ..Default::default()
        };

        let raster = vk::PipelineRasterizationStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            line_width: 1.0,
            ..Default::default()
        };
        let multisample = vk::PipelineMultisampleStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
            rasterization_samples: vk::SampleCountFlags::TYPE_1,
            ..Default::default()
        };
        let depth = vk::PipelineDepthStencilStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
            depth_test_enable: vk::TRUE,
            depth_write_enable: vk::TRUE,
            depth_compare_op: vk::CompareOp::LESS,
            max_depth_bounds: 1.0,
            ..Default::default()
        };
        let blend_attachment = vk::PipelineColorBlendAttachmentState {
            blend_enable: vk::FALSE,
            color_write_mask: vk::ColorComponentFlags::RGBA,
            ..Default::default()
        };
        let blend = vk::PipelineColorBlendStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &blend_attachment,
            ..Default::default()
        };

        let layout_info = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            set_layout_count: 1,
            p_set_layouts: &set_layout,
            ..Default::default()
        };
        let layout = gpu
            .create_pipeline_layout(&layout_info)
            .map_err(RenderError::vk("create_pipeline_layout"))?;

        let info = vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            stage_count: stages.len() as u32,
            p_stages: stages.as_ptr(),
            p_vertex_input_state: &vertex_input,
            p_input_assembly_state: &input_assembly,
            p_viewport_state: &viewport_state,
            p_rasterization_state: &raster,
            p_multisample_state: &multisample,
            p_depth_stencil_state: &depth,
            p_color_blend_state: &blend,
            layout,
            render_pass,
            subpass: 0,
            ..Default::default()
        };
        match gpu.create_graphics_pipeline(&info) {
            Ok(handle) => {
                debug!("graphics pipeline built for {}x{}", extent.width, extent.height);
                Ok(Self { layout, handle })
            }
            Err(e) => {
                gpu.destroy_pipeline_layout(layout);
                Err(RenderError::vk("create_graphics_pipelines")(e))
            }
        }
    }

    pub fn destroy(self, gpu: &dyn Gpu) {
        gpu.destroy_pipeline(self.handle);
        gpu.destroy_pipeline_layout(self.layout);
    }
}
