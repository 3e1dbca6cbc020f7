// SPDX-License-Identifier: CEPL-1.0
//! Static scene data (mesh, texture, descriptor layout) and the per-image
//! uniform buffers and descriptor sets.

use std::mem::size_of;

use ash::vk;
use tessel_math::Transforms;
use tessel_render::{MeshData, TextureData};
use tracing::{debug, info};

use crate::error::{RenderError, RenderResult};
use crate::gpu::Gpu;
use crate::resource::{create_image_view, Buffer, HostBuffer, Image, ImageSpec};
use crate::upload::{DeviceLocal, StagingUploader};

pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;
const PREFERRED_ANISOTROPY: f32 = 16.0;

#[derive(Debug)]
pub struct MeshBuffers {
    pub vertex: Buffer,
    pub index: Buffer,
    pub index_count: u32,
}

impl MeshBuffers {
    pub fn upload(gpu: &dyn Gpu, uploader: &StagingUploader, mesh: &MeshData) -> RenderResult<Self> {
        let transfer = vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::TRANSFER_SRC;
        let vertex = device_buffer(
            gpu,
            uploader,
            mesh.vertex_bytes(),
            vk::BufferUsageFlags::VERTEX_BUFFER | transfer,
        )?;
        let index = match device_buffer(
            gpu,
            uploader,
            mesh.index_bytes(),
            vk::BufferUsageFlags::INDEX_BUFFER | transfer,
        ) {
            Ok(index) => index,
            Err(e) => {
                vertex.destroy(gpu);
                return Err(e);
            }
        };
        Ok(Self {
            vertex,
            index,
            index_count: mesh.index_count(),
        })
    }

    pub fn destroy(self, gpu: &dyn Gpu) {
        self.index.destroy(gpu);
        self.vertex.destroy(gpu);
    }
}

fn device_buffer(
    gpu: &dyn Gpu,
    uploader: &StagingUploader,
    bytes: &[u8],
    usage: vk::BufferUsageFlags,
) -> RenderResult<Buffer> {
    let buffer = Buffer::create(gpu, bytes.len() as u64, usage, vk::MemoryPropertyFlags::DEVICE_LOCAL)?;
    match uploader.upload_to_device_local(gpu, DeviceLocal::Buffer(&buffer), bytes) {
        Ok(()) => Ok(buffer),
        Err(e) => {
            buffer.destroy(gpu);
            Err(e)
        }
    }
}

#[derive(Debug)]
pub struct Texture {
    pub image: Image,
    pub view: vk::ImageView,
    pub sampler: vk::Sampler,
}

impl Texture {
    pub fn upload(gpu: &dyn Gpu, uploader: &StagingUploader, data: &TextureData) -> RenderResult<Self> {
        let limit = gpu.caps().max_image_dimension_2d;
        if data.width() > limit || data.height() > limit {
            return Err(RenderError::InvalidTexture(format!(
                "{}x{} exceeds the device limit of {limit}",
                data.width(),
                data.height()
            )));
        }

        let image = Image::create(
            gpu,
            ImageSpec {
                extent: vk::Extent2D {
                    width: data.width(),
                    height: data.height(),
                },
                format: TEXTURE_FORMAT,
                usage: vk::ImageUsageFlags::SAMPLED
                    | vk::ImageUsageFlags::TRANSFER_DST
                    | vk::ImageUsageFlags::TRANSFER_SRC,
                properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            },
        )?;
        let view_and_sampler = uploader
            .upload_to_device_local(gpu, DeviceLocal::Image(&image), data.pixels())
            .and_then(|()| create_image_view(gpu, image.handle, TEXTURE_FORMAT))
            .and_then(|view| match create_sampler(gpu) {
                Ok(sampler) => Ok((view, sampler)),
                Err(e) => {
                    gpu.destroy_image_view(view);
                    Err(e)
                }
            });
        match view_and_sampler {
            Ok((view, sampler)) => {
                debug!("texture {}x{} uploaded", data.width(), data.height());
                Ok(Self {
                    image,
                    view,
                    sampler,
                })
            }
            Err(e) => {
                image.destroy(gpu);
                Err(e)
            }
        }
    }

    pub fn destroy(self, gpu: &dyn Gpu) {
        gpu.destroy_sampler(self.sampler);
        gpu.destroy_image_view(self.view);
        self.image.destroy(gpu);
    }
}

/// Linear filtering, repeat addressing, anisotropy clamped to the device limit.
fn create_sampler(gpu: &dyn Gpu) -> RenderResult<vk::Sampler> {
    let info = vk::SamplerCreateInfo {
        s_type: vk::StructureType::SAMPLER_CREATE_INFO,
        mag_filter: vk::Filter::LINEAR,
        min_filter: vk::Filter::LINEAR,
        mipmap_mode: vk::SamplerMipmapMode::LINEAR,
        address_mode_u: vk::SamplerAddressMode::REPEAT,
        address_mode_v: vk::SamplerAddressMode::REPEAT,
        address_mode_w: vk::SamplerAddressMode::REPEAT,
        anisotropy_enable: vk::TRUE,
        max_anisotropy: PREFERRED_ANISOTROPY.min(gpu.caps().max_sampler_anisotropy),
        border_color: vk::BorderColor::INT_OPAQUE_BLACK,
        compare_op: vk::CompareOp::ALWAYS,
        ..Default::default()
    };
    gpu.create_sampler(&info).map_err(RenderError::vk("create_sampler"))
}

/// Binding 0: transforms (vertex stage). Binding 1: texture (fragment stage).
pub fn create_descriptor_set_layout(gpu: &dyn Gpu) -> RenderResult<vk::DescriptorSetLayout> {
    let bindings = [
        vk::DescriptorSetLayoutBinding {
            binding: 0,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: 1,
            stage_flags: vk::ShaderStageFlags::VERTEX,
            ..Default::default()
        },
        vk::DescriptorSetLayoutBinding {
            binding: 1,
            descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: 1,
            stage_flags: vk::ShaderStageFlags::FRAGMENT,
            ..Default::default()
        },
    ];
    let info = vk::DescriptorSetLayoutCreateInfo {
        s_type: vk::StructureType::DESCRIPTOR_SET_LAYOUT_CREATE_INFO,
        binding_count: bindings.len() as u32,
        p_bindings: bindings.as_ptr(),
        ..Default::default()
    };
    gpu.create_descriptor_set_layout(&info)
        .map_err(RenderError::vk("create_descriptor_set_layout"))
}

/// Everything uploaded once at startup and kept until shutdown.
#[derive(Debug)]
pub struct SceneResources {
    pub mesh: MeshBuffers,
    pub texture: Texture,
    pub set_layout: vk::DescriptorSetLayout,
}

impl SceneResources {
    pub fn load(
        gpu: &dyn Gpu,
        uploader: &StagingUploader,
        mesh: &MeshData,
        texture: &TextureData,
    ) -> RenderResult<Self> {
        let mesh_buffers = MeshBuffers::upload(gpu, uploader, mesh)?;
        let texture = match Texture::upload(gpu, uploader, texture) {
            Ok(t) => t,
            Err(e) => {
                mesh_buffers.destroy(gpu);
                return Err(e);
            }
        };
        let set_layout = match create_descriptor_set_layout(gpu) {
            Ok(l) => l,
            Err(e) => {
                texture.destroy(gpu);
                mesh_buffers.destroy(gpu);
                return Err(e);
            }
        };
        info!(
            vertices = mesh.vertices.len(),
            indices = mesh.index_count(),
            "scene uploaded"
        );
        Ok(Self {
            mesh: mesh_buffers,
            texture,
            set_layout,
        })
    }

    pub fn destroy(self, gpu: &dyn Gpu) {
        gpu.destroy_descriptor_set_layout(self.set_layout);
        self.texture.destroy(gpu);
        self.mesh.destroy(gpu);
    }
}

/// One mapped uniform buffer and one descriptor set per swapchain image.
#[derive(Debug)]
pub struct FrameUniforms {
    pool: vk::DescriptorPool,
    buffers: Vec<HostBuffer>,
    sets: Vec<vk::DescriptorSet>,
}

impl FrameUniforms {
    pub fn create(gpu: &dyn Gpu, scene: &SceneResources, image_count: usize) -> RenderResult<Self> {
        let count = image_count as u32;
        let sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: count,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: count,
            },
        ];
        let pool_info = vk::DescriptorPoolCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
            max_sets: count,
            pool_size_count: sizes.len() as u32,
            p_pool_sizes: sizes.as_ptr(),
            ..Default::default()
        };
        let pool = gpu
            .create_descriptor_pool(&pool_info)
            .map_err(RenderError::vk("create_descriptor_pool"))?;

        let mut uniforms = Self {
            pool,
            buffers: Vec::with_capacity(image_count),
            sets: Vec::new(),
        };
        if let Err(e) = uniforms.fill(gpu, scene, image_count) {
            uniforms.destroy(gpu);
            return Err(e);
        }
        Ok(uniforms)
    }

    fn fill(&mut self, gpu: &dyn Gpu, scene: &SceneResources, image_count: usize) -> RenderResult<()> {
        let ubo_size = size_of::<Transforms>() as vk::DeviceSize;
        for _ in 0..image_count {
            let buffer = HostBuffer::create(gpu, ubo_size, vk::BufferUsageFlags::UNIFORM_BUFFER)?;
            buffer.write(0, Transforms::spinning(0.0, 1.0).as_bytes())?;
            self.buffers.push(buffer);
        }

        let layouts = vec![scene.set_layout; image_count];
        let alloc = vk::DescriptorSetAllocateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_ALLOCATE_INFO,
            descriptor_pool: self.pool,
            descriptor_set_count: layouts.len() as u32,
            p_set_layouts: layouts.as_ptr(),
            ..Default::default()
        };
        self.sets = gpu
            .allocate_descriptor_sets(&alloc)
            .map_err(RenderError::vk("allocate_descriptor_sets"))?;

        let image_info = vk::DescriptorImageInfo {
            sampler: scene.texture.sampler,
            image_view: scene.texture.view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        };
        for (set, buffer) in self.sets.iter().zip(&self.buffers) {
            let buffer_info = vk::DescriptorBufferInfo {
                buffer: buffer.buffer().handle,
                offset: 0,
                range: ubo_size,
            };
            let writes = [
                vk::WriteDescriptorSet {
                    s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
                    dst_set: *set,
                    dst_binding: 0,
                    descriptor_count: 1,
                    descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                    p_buffer_info: &buffer_info,
                    ..Default::default()
                },
                vk::WriteDescriptorSet {
                    s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
                    dst_set: *set,
                    dst_binding: 1,
                    descriptor_count: 1,
                    descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    p_image_info: &image_info,
                    ..Default::default()
                },
            ];
            gpu.update_descriptor_sets(&writes);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn set(&self, image_index: usize) -> vk::DescriptorSet {
        self.sets[image_index]
    }

    /// The caller must have waited for the last submission that read this image's buffer.
    pub fn write(&self, image_index: usize, transforms: &Transforms) -> RenderResult<()> {
        self.buffers[image_index].write(0, transforms.as_bytes())
    }

    #[cfg(test)]
    pub(crate) fn buffer(&self, image_index: usize) -> &Buffer {
        self.buffers[image_index].buffer()
    }

    /// Sets go back with the pool.
    pub fn destroy(self, gpu: &dyn Gpu) {
        gpu.destroy_descriptor_pool(self.pool);
        for buffer in self.buffers {
            buffer.destroy(gpu);
        }
    }
}
