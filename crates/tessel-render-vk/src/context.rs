// SPDX-License-Identifier: CEPL-1.0
//! Physical-device capability snapshot, taken once per device.

use ash::vk;

use crate::error::{RenderError, RenderResult};

/// Preferred first.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// First graphics-capable family and first family that can present.
    pub fn find(
        families: &[vk::QueueFamilyProperties],
        mut can_present: impl FnMut(u32) -> bool,
    ) -> Option<Self> {
        let mut graphics = None;
        let mut present = None;
        for (i, family) in families.iter().enumerate() {
            let i = i as u32;
            if family.queue_count == 0 {
                continue;
            }
            if graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                graphics = Some(i);
            }
            if present.is_none() && can_present(i) {
                present = Some(i);
            }
            if graphics.is_some() && present.is_some() {
                break;
            }
        }
        Some(Self {
            graphics: graphics?,
            present: present?,
        })
    }

    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

#[derive(Clone, Debug)]
pub struct DeviceCaps {
    pub device_name: String,
    pub memory: vk::PhysicalDeviceMemoryProperties,
    pub depth_format: vk::Format,
    pub queue_families: QueueFamilies,
    pub max_sampler_anisotropy: f32,
    pub max_image_dimension_2d: u32,
}

impl DeviceCaps {
    /// Index of the first memory type allowed by `type_bits` that has all of `properties`.
    pub fn find_memory_type(
        &self,
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> RenderResult<u32> {
        let count = self.memory.memory_type_count.min(vk::MAX_MEMORY_TYPES as u32);
        (0..count)
            .find(|&i| {
                type_bits & (1 << i) != 0
                    && self.memory.memory_types[i as usize]
                        .property_flags
                        .contains(properties)
            })
            .ok_or(RenderError::NoSuitableMemoryType {
                type_bits,
                properties,
            })
    }
}

pub fn select_depth_format(
    mut properties_of: impl FnMut(vk::Format) -> vk::FormatProperties,
) -> RenderResult<vk::Format> {
    DEPTH_FORMAT_CANDIDATES
        .into_iter()
        .find(|&f| {
            properties_of(f)
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .ok_or(RenderError::NoSupportedDepthFormat)
}

pub fn has_stencil(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D16_UNORM_S8_UINT
    )
}

pub fn is_depth(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32
    ) || has_stencil(format)
}

#[cfg(test)]
pub(crate) fn memory_table(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
    let mut memory = vk::PhysicalDeviceMemoryProperties {
        memory_type_count: flags.len() as u32,
        ..Default::default()
    };
    for (slot, &property_flags) in memory.memory_types.iter_mut().zip(flags) {
        *slot = vk::MemoryType {
            property_flags,
            heap_index: 0,
        };
    }
    memory
}
