// SPDX-License-Identifier: CEPL-1.0
//! In-memory `Gpu` for tests.
//!
//! Work submitted to a queue executes immediately for data and layouts, but is
//! only *retired* when its fence is waited on or the queue/device is idled.
//! Every contract breach is recorded in `violations` instead of panicking so
//! tests can assert on the whole run.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use tessel_render::{RenderSize, WindowPort};

use crate::context::{memory_table, DeviceCaps, QueueFamilies};
use crate::gpu::{Gpu, QueueKind, SubmitBatch, SurfaceSupport};
use crate::resource::{texel_size, HOST_COHERENT};

const GRAPHICS_QUEUE: u64 = 0xF0;
const PRESENT_QUEUE: u64 = 0xF1;
const FIRST_HANDLE: u64 = 0x1_0000;
/// Fresh allocations hold this instead of zeros, as real memory is undefined.
pub(crate) const STALE_BYTE: u8 = 0xCD;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct FakeStats {
    pub allocations: u64,
    pub submits: u64,
    pub fenced_submits: u64,
    pub fence_waits: u64,
    pub max_outstanding: usize,
    pub acquires: u64,
    pub presents: u64,
    pub swapchains_created: u64,
    pub queue_idle_waits: u64,
    pub device_idle_waits: u64,
    pub recordings: u64,
}

#[derive(Debug)]
enum Command {
    Barrier {
        image: u64,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    },
    CopyBuffer {
        src: u64,
        dst: u64,
        regions: Vec<vk::BufferCopy>,
    },
    CopyBufferToImage {
        src: u64,
        dst: u64,
        layout: vk::ImageLayout,
    },
    CopyImageToBuffer {
        src: u64,
        layout: vk::ImageLayout,
        dst: u64,
    },
    BeginRenderPass {
        framebuffer: u64,
    },
    Draw,
}

struct Memory {
    bytes: Box<[u8]>,
    host_visible: bool,
    mapped: bool,
}

struct FakeImage {
    extent: vk::Extent2D,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
    memory: Option<u64>,
    layout: vk::ImageLayout,
    swapchain_owned: bool,
}

struct Framebuffer {
    extent: vk::Extent2D,
    render_pass: u64,
    attachments: Vec<u64>,
}

struct CommandBuffer {
    pool: u64,
    recording: bool,
    pending: u32,
    commands: Vec<Command>,
}

#[derive(Default)]
struct Semaphore {
    signaled: bool,
    waiter: Option<u64>,
}

struct Fence {
    signaled: bool,
    pending: Option<u64>,
}

struct Swapchain {
    extent: vk::Extent2D,
    images: Vec<u64>,
    next: usize,
}

struct Submission {
    id: u64,
    fence: Option<u64>,
    command_buffers: Vec<u64>,
}

pub(crate) struct FakeState {
    next_handle: u64,
    live: HashMap<u64, &'static str>,
    memories: HashMap<u64, Memory>,
    buffers: HashMap<u64, (u64, Option<u64>)>,
    images: HashMap<u64, FakeImage>,
    views: HashMap<u64, u64>,
    framebuffers: HashMap<u64, Framebuffer>,
    command_buffers: HashMap<u64, CommandBuffer>,
    semaphores: HashMap<u64, Semaphore>,
    fences: HashMap<u64, Fence>,
    swapchains: HashMap<u64, Swapchain>,
    retired_swapchains: HashSet<u64>,
    submissions: VecDeque<Submission>,
    next_submission: u64,
    surface: vk::Extent2D,
    min_images: u32,
    max_images: u32,
    suboptimal_acquires: u32,
    stats: FakeStats,
    violations: Vec<String>,
}

impl FakeState {
    fn new(surface: vk::Extent2D) -> Self {
        Self {
            next_handle: FIRST_HANDLE,
            live: HashMap::new(),
            memories: HashMap::new(),
            buffers: HashMap::new(),
            images: HashMap::new(),
            views: HashMap::new(),
            framebuffers: HashMap::new(),
            command_buffers: HashMap::new(),
            semaphores: HashMap::new(),
            fences: HashMap::new(),
            swapchains: HashMap::new(),
            retired_swapchains: HashSet::new(),
            submissions: VecDeque::new(),
            next_submission: 1,
            surface,
            min_images: 2,
            max_images: 3,
            suboptimal_acquires: 0,
            stats: FakeStats::default(),
            violations: Vec::new(),
        }
    }

    fn violation(&mut self, msg: String) {
        self.violations.push(msg);
    }

    fn mint_untracked(&mut self) -> u64 {
        let raw = self.next_handle;
        self.next_handle += 1;
        raw
    }

    fn mint(&mut self, kind: &'static str) -> u64 {
        let raw = self.mint_untracked();
        self.live.insert(raw, kind);
        raw
    }

    fn retire(&mut self, raw: u64, kind: &'static str) -> bool {
        if raw == 0 {
            return false;
        }
        match self.live.remove(&raw) {
            Some(k) if k == kind => true,
            Some(k) => {
                self.violation(format!("destroyed {raw:#x} as {kind} but it is a {k}"));
                false
            }
            None => {
                self.violation(format!("double destroy or unknown {kind} {raw:#x}"));
                false
            }
        }
    }

    fn is_live(&self, raw: u64, kind: &'static str) -> bool {
        self.live.get(&raw) == Some(&kind)
    }

    fn require_idle(&mut self, what: &str) {
        if self.submissions.iter().any(|s| s.fence.is_some()) {
            self.violation(format!("{what} destroyed while frames are in flight"));
        }
    }

    fn swapchain_fate(&self, raw: u64) -> &'static str {
        if self.retired_swapchains.contains(&raw) {
            "destroyed"
        } else {
            "unknown"
        }
    }

    fn outstanding(&self) -> usize {
        self.submissions.iter().filter(|s| s.fence.is_some()).count()
    }

    fn retire_through(&mut self, id: u64) {
        while self.submissions.front().is_some_and(|s| s.id <= id) {
            let Some(done) = self.submissions.pop_front() else {
                break;
            };
            if let Some(f) = done.fence.and_then(|f| self.fences.get_mut(&f)) {
                f.signaled = true;
                f.pending = None;
            }
            for cb in done.command_buffers {
                if let Some(cb) = self.command_buffers.get_mut(&cb) {
                    cb.pending = cb.pending.saturating_sub(1);
                }
            }
            for sem in self.semaphores.values_mut() {
                if sem.waiter == Some(done.id) {
                    sem.waiter = None;
                }
            }
        }
    }

    fn retire_all(&mut self) {
        let last = self.next_submission;
        self.retire_through(last);
    }

    fn buffer_memory(&self, buffer: u64) -> Option<u64> {
        self.buffers.get(&buffer).and_then(|b| b.1)
    }

    fn copy_bytes(&mut self, src_mem: u64, src_off: u64, dst_mem: u64, dst_off: u64, len: u64) {
        let chunk: Vec<u8> = match self.memories.get(&src_mem) {
            Some(m) => {
                let start = src_off as usize;
                let end = (start + len as usize).min(m.bytes.len());
                m.bytes[start.min(end)..end].to_vec()
            }
            None => {
                self.violation(format!("copy from freed memory {src_mem:#x}"));
                return;
            }
        };
        match self.memories.get_mut(&dst_mem) {
            Some(m) => {
                let start = dst_off as usize;
                let end = (start + chunk.len()).min(m.bytes.len());
                let n = end.saturating_sub(start);
                m.bytes[start..end].copy_from_slice(&chunk[..n]);
            }
            None => self.violation(format!("copy into freed memory {dst_mem:#x}")),
        }
    }

    fn execute(&mut self, cb: u64) {
        let commands = match self.command_buffers.get_mut(&cb) {
            Some(c) => std::mem::take(&mut c.commands),
            None => return,
        };
        for command in &commands {
            match *command {
                Command::Barrier { image, old, new } => {
                    let Some(have) = self.images.get(&image).map(|i| i.layout) else {
                        self.violation(format!("barrier on destroyed image {image:#x}"));
                        continue;
                    };
                    if old != vk::ImageLayout::UNDEFINED && have != old {
                        self.violation(format!(
                            "barrier expects {old:?} but image {image:#x} is {have:?}"
                        ));
                    }
                    if let Some(img) = self.images.get_mut(&image) {
                        img.layout = new;
                    }
                }
                Command::CopyBuffer {
                    src,
                    dst,
                    ref regions,
                } => {
                    let (Some(sm), Some(dm)) = (self.buffer_memory(src), self.buffer_memory(dst))
                    else {
                        self.violation("copy between unbound buffers".into());
                        continue;
                    };
                    for r in regions.clone() {
                        self.copy_bytes(sm, r.src_offset, dm, r.dst_offset, r.size);
                    }
                }
                Command::CopyBufferToImage { src, dst, layout } => {
                    let image_state = self.images.get(&dst).map(|i| (i.layout, i.memory));
                    let Some((actual, Some(dm))) = image_state else {
                        self.violation(format!("copy into unbound image {dst:#x}"));
                        continue;
                    };
                    if layout != vk::ImageLayout::TRANSFER_DST_OPTIMAL || actual != layout {
                        self.violation(format!("copy into image in {actual:?} (declared {layout:?})"));
                    }
                    let Some(sm) = self.buffer_memory(src) else {
                        self.violation("copy from unbound buffer".into());
                        continue;
                    };
                    let len = self.memories.get(&dm).map_or(0, |m| m.bytes.len() as u64);
                    self.copy_bytes(sm, 0, dm, 0, len);
                }
                Command::CopyImageToBuffer { src, layout, dst } => {
                    let image_state = self.images.get(&src).map(|i| (i.layout, i.memory));
                    let Some((actual, Some(sm))) = image_state else {
                        self.violation(format!("copy from unbound image {src:#x}"));
                        continue;
                    };
                    if layout != vk::ImageLayout::TRANSFER_SRC_OPTIMAL || actual != layout {
                        self.violation(format!("copy from image in {actual:?} (declared {layout:?})"));
                    }
                    let Some(dm) = self.buffer_memory(dst) else {
                        self.violation("copy into unbound buffer".into());
                        continue;
                    };
                    let len = self.memories.get(&sm).map_or(0, |m| m.bytes.len() as u64);
                    self.copy_bytes(sm, 0, dm, 0, len);
                }
                Command::BeginRenderPass { framebuffer } => {
                    if !self.is_live(framebuffer, "framebuffer") {
                        self.violation(format!("submitted pass on destroyed framebuffer {framebuffer:#x}"));
                    }
                }
                Command::Draw => {}
            }
        }
        if let Some(c) = self.command_buffers.get_mut(&cb) {
            c.commands = commands;
        }
    }

    fn record(&mut self, cb: vk::CommandBuffer, command: Command) {
        let recording = self
            .command_buffers
            .get(&cb.as_raw())
            .is_some_and(|c| c.recording);
        if !recording {
            self.violation(format!("command recorded outside begin/end: {command:?}"));
            return;
        }
        if let Some(c) = self.command_buffers.get_mut(&cb.as_raw()) {
            c.commands.push(command);
        }
    }

    fn signal_semaphore(&mut self, raw: u64) -> Option<&'static str> {
        let problem = match self.semaphores.get(&raw) {
            None => Some("signal of a destroyed semaphore"),
            Some(sem) if sem.signaled => Some("signal of an already signalled semaphore"),
            Some(sem) if sem.waiter.is_some() => {
                Some("semaphore signalled again before its previous wait retired")
            }
            Some(_) => None,
        };
        if let Some(sem) = self.semaphores.get_mut(&raw) {
            sem.signaled = true;
        }
        problem
    }

    /// Consumes a signal; `waiter` is the submission that must retire before reuse.
    fn wait_semaphore(&mut self, raw: u64, waiter: Option<u64>) -> bool {
        match self.semaphores.get_mut(&raw) {
            Some(sem) if sem.signaled => {
                sem.signaled = false;
                sem.waiter = waiter;
                true
            }
            _ => false,
        }
    }

    fn support(&self) -> SurfaceSupport {
        SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: self.min_images,
                max_image_count: self.max_images,
                current_extent: self.surface,
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 8192,
                    height: 8192,
                },
                max_image_array_layers: 1,
                supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            },
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::R8G8B8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    }
}

/// Shared view of a [`FakeGpu`]'s state, handed to fake windows.
#[derive(Clone)]
pub(crate) struct FakeProbe(Rc<RefCell<FakeState>>);

impl FakeProbe {
    pub fn set_surface(&self, size: RenderSize) {
        self.0.borrow_mut().surface = vk::Extent2D {
            width: size.width,
            height: size.height,
        };
    }

    pub fn stats(&self) -> FakeStats {
        self.0.borrow().stats
    }
}

pub(crate) struct FakeGpu {
    caps: DeviceCaps,
    state: Rc<RefCell<FakeState>>,
}

impl FakeGpu {
    /// 1280x720 surface, 2..=3 images, split graphics/present families.
    pub fn new() -> Self {
        Self::with_surface(1280, 720)
    }

    pub fn with_surface(width: u32, height: u32) -> Self {
        let caps = DeviceCaps {
            device_name: "fake".into(),
            memory: memory_table(&[vk::MemoryPropertyFlags::DEVICE_LOCAL, HOST_COHERENT]),
            depth_format: vk::Format::D32_SFLOAT,
            queue_families: QueueFamilies {
                graphics: 0,
                present: 1,
            },
            max_sampler_anisotropy: 16.0,
            max_image_dimension_2d: 4096,
        };
        Self {
            caps,
            state: Rc::new(RefCell::new(FakeState::new(vk::Extent2D { width, height }))),
        }
    }

    pub fn probe(&self) -> FakeProbe {
        FakeProbe(self.state.clone())
    }

    pub fn set_image_count_limits(&self, min: u32, max: u32) {
        let mut s = self.state.borrow_mut();
        s.min_images = min;
        s.max_images = max;
    }

    pub fn inject_suboptimal(&self, acquires: u32) {
        self.state.borrow_mut().suboptimal_acquires = acquires;
    }

    pub fn stats(&self) -> FakeStats {
        self.state.borrow().stats
    }

    pub fn violations(&self) -> Vec<String> {
        self.state.borrow().violations.clone()
    }

    pub fn assert_clean(&self) {
        let v = self.violations();
        assert!(v.is_empty(), "contract violations: {v:#?}");
    }

    /// Objects created and not yet destroyed (swapchain-owned images excluded).
    pub fn live_objects(&self) -> usize {
        self.state.borrow().live.len()
    }

    pub fn live_kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.state.borrow().live.values().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn memory_contents(&self, memory: vk::DeviceMemory) -> Vec<u8> {
        self.state
            .borrow()
            .memories
            .get(&memory.as_raw())
            .map(|m| m.bytes.to_vec())
            .unwrap_or_default()
    }

    pub fn image_layout(&self, image: vk::Image) -> Option<vk::ImageLayout> {
        self.state.borrow().images.get(&image.as_raw()).map(|i| i.layout)
    }

    pub fn framebuffer_extents(&self) -> Vec<vk::Extent2D> {
        let s = self.state.borrow();
        s.framebuffers
            .iter()
            .filter(|(fb, _)| s.is_live(**fb, "framebuffer"))
            .map(|(_, fb)| fb.extent)
            .collect()
    }

    pub fn depth_image_extents(&self) -> Vec<vk::Extent2D> {
        self.state
            .borrow()
            .images
            .values()
            .filter(|i| !i.swapchain_owned && i.usage.contains(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT))
            .map(|i| i.extent)
            .collect()
    }

    pub fn outstanding(&self) -> usize {
        self.state.borrow().outstanding()
    }
}

impl Gpu for FakeGpu {
    fn caps(&self) -> &DeviceCaps {
        &self.caps
    }

    fn queue(&self, kind: QueueKind) -> vk::Queue {
        match kind {
            QueueKind::Graphics => vk::Queue::from_raw(GRAPHICS_QUEUE),
            QueueKind::Present => vk::Queue::from_raw(PRESENT_QUEUE),
        }
    }

    fn surface_support(&self) -> VkResult<SurfaceSupport> {
        Ok(self.state.borrow().support())
    }

    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR<'_>) -> VkResult<vk::SwapchainKHR> {
        let mut s = self.state.borrow_mut();
        let extent = info.image_extent;
        if extent.width == 0 || extent.height == 0 {
            s.violation("swapchain created with a zero extent".into());
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        let count = info.min_image_count;
        if count < s.min_images || (s.max_images > 0 && count > s.max_images) {
            s.violation(format!("swapchain image count {count} outside surface limits"));
        }
        let split = self.caps.queue_families.graphics != self.caps.queue_families.present;
        if split
            && (info.image_sharing_mode != vk::SharingMode::CONCURRENT
                || info.queue_family_index_count != 2)
        {
            s.violation("split queue families need CONCURRENT sharing".into());
        }
        s.stats.swapchains_created += 1;

        let handle = s.mint("swapchain");
        let mut images = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let raw = s.mint_untracked();
            s.images.insert(
                raw,
                FakeImage {
                    extent,
                    format: info.image_format,
                    usage: info.image_usage,
                    memory: None,
                    layout: vk::ImageLayout::UNDEFINED,
                    swapchain_owned: true,
                },
            );
            images.push(raw);
        }
        s.swapchains.insert(
            handle,
            Swapchain {
                extent,
                images,
                next: 0,
            },
        );
        Ok(vk::SwapchainKHR::from_raw(handle))
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        let s = self.state.borrow();
        s.swapchains
            .get(&swapchain.as_raw())
            .map(|sc| sc.images.iter().map(|&i| vk::Image::from_raw(i)).collect())
            .ok_or(vk::Result::ERROR_SURFACE_LOST_KHR)
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let mut s = self.state.borrow_mut();
        let raw = swapchain.as_raw();
        s.require_idle("swapchain");
        if !s.retire(raw, "swapchain") {
            return;
        }
        if let Some(sc) = s.swapchains.remove(&raw) {
            for img in &sc.images {
                s.images.remove(img);
            }
            let orphaned = s
                .views
                .values()
                .filter(|&&img| sc.images.contains(&img))
                .count();
            if orphaned > 0 {
                s.violation(format!("swapchain destroyed before {orphaned} of its views"));
            }
        }
        s.retired_swapchains.insert(raw);
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        let mut s = self.state.borrow_mut();
        s.stats.acquires += 1;
        let surface = s.surface;
        let raw = swapchain.as_raw();
        let Some(sc) = s.swapchains.get(&raw) else {
            let what = s.swapchain_fate(raw);
            s.violation(format!("acquire on {what} swapchain {raw:#x}"));
            return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
        };
        if sc.extent != surface {
            return Err(vk::Result::ERROR_OUT_OF_DATE_KHR);
        }

        if let Some(problem) = s.signal_semaphore(signal.as_raw()) {
            s.violation(format!("acquire: {problem}"));
        }

        let suboptimal = s.suboptimal_acquires > 0;
        if suboptimal {
            s.suboptimal_acquires -= 1;
        }
        let Some(sc) = s.swapchains.get_mut(&raw) else {
            return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
        };
        let index = sc.next;
        sc.next = (sc.next + 1) % sc.images.len();
        Ok((index as u32, suboptimal))
    }

    fn queue_present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<bool> {
        let mut s = self.state.borrow_mut();
        let surface = s.surface;
        let raw = swapchain.as_raw();
        let Some(sc) = s.swapchains.get(&raw) else {
            let what = s.swapchain_fate(raw);
            s.violation(format!("present on {what} swapchain {raw:#x}"));
            return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
        };
        let stale = sc.extent != surface;
        let image_count = sc.images.len();
        if image_index as usize >= image_count {
            s.violation(format!("present of image {image_index} out of {image_count}"));
        }
        if !s.wait_semaphore(wait.as_raw(), None) {
            s.violation("present waits on a semaphore nobody signalled".into());
        }
        if stale {
            return Err(vk::Result::ERROR_OUT_OF_DATE_KHR);
        }
        s.stats.presents += 1;
        Ok(false)
    }

    fn create_buffer(&self, info: &vk::BufferCreateInfo<'_>) -> VkResult<vk::Buffer> {
        let mut s = self.state.borrow_mut();
        let raw = s.mint("buffer");
        s.buffers.insert(raw, (info.size, None));
        Ok(vk::Buffer::from_raw(raw))
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        let s = self.state.borrow();
        vk::MemoryRequirements {
            size: s.buffers.get(&buffer.as_raw()).map_or(0, |b| b.0),
            alignment: 16,
            memory_type_bits: 0b11,
        }
    }

    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        match s.buffers.get_mut(&buffer.as_raw()) {
            Some(b) => {
                b.1 = Some(memory.as_raw());
                Ok(())
            }
            None => Err(vk::Result::ERROR_UNKNOWN),
        }
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        let mut s = self.state.borrow_mut();
        if s.retire(buffer.as_raw(), "buffer") {
            s.buffers.remove(&buffer.as_raw());
        }
    }

    fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> VkResult<vk::Image> {
        let mut s = self.state.borrow_mut();
        let raw = s.mint("image");
        s.images.insert(
            raw,
            FakeImage {
                extent: vk::Extent2D {
                    width: info.extent.width,
                    height: info.extent.height,
                },
                format: info.format,
                usage: info.usage,
                memory: None,
                layout: info.initial_layout,
                swapchain_owned: false,
            },
        );
        Ok(vk::Image::from_raw(raw))
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        let s = self.state.borrow();
        let size = s
            .images
            .get(&image.as_raw())
            .and_then(|i| {
                texel_size(i.format).map(|t| i.extent.width as u64 * i.extent.height as u64 * t)
            })
            .unwrap_or(0);
        vk::MemoryRequirements {
            size,
            alignment: 256,
            memory_type_bits: 0b01,
        }
    }

    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        match s.images.get_mut(&image.as_raw()) {
            Some(i) => {
                i.memory = Some(memory.as_raw());
                Ok(())
            }
            None => Err(vk::Result::ERROR_UNKNOWN),
        }
    }

    fn destroy_image(&self, image: vk::Image) {
        let mut s = self.state.borrow_mut();
        let raw = image.as_raw();
        if s.views.values().any(|&v| v == raw) {
            s.violation(format!("image {raw:#x} destroyed before its view"));
        }
        if s.retire(raw, "image") {
            s.images.remove(&raw);
        }
    }

    fn allocate_memory(
        &self,
        size: vk::DeviceSize,
        memory_type_index: u32,
    ) -> VkResult<vk::DeviceMemory> {
        let mut s = self.state.borrow_mut();
        s.stats.allocations += 1;
        let raw = s.mint("memory");
        s.memories.insert(
            raw,
            Memory {
                bytes: vec![STALE_BYTE; size.max(1) as usize].into_boxed_slice(),
                host_visible: memory_type_index == 1,
                mapped: false,
            },
        );
        Ok(vk::DeviceMemory::from_raw(raw))
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        let mut s = self.state.borrow_mut();
        let raw = memory.as_raw();
        let still_bound = s.buffers.values().any(|b| b.1 == Some(raw))
            || s.images.values().any(|i| i.memory == Some(raw));
        if still_bound {
            s.violation(format!("memory {raw:#x} freed while still bound"));
        }
        if s.retire(raw, "memory") {
            s.memories.remove(&raw);
        }
    }

    fn map_memory(&self, memory: vk::DeviceMemory, size: vk::DeviceSize) -> VkResult<*mut u8> {
        let mut s = self.state.borrow_mut();
        let problem = match s.memories.get(&memory.as_raw()) {
            None => Some("map of freed memory"),
            Some(m) if !m.host_visible => Some("map of device-local memory"),
            Some(m) if m.mapped => Some("memory mapped twice"),
            Some(m) if size as usize > m.bytes.len() => Some("map range past the allocation"),
            Some(_) => None,
        };
        if let Some(p) = problem {
            s.violation(p.into());
            return Err(vk::Result::ERROR_MEMORY_MAP_FAILED);
        }
        match s.memories.get_mut(&memory.as_raw()) {
            Some(m) => {
                m.mapped = true;
                Ok(m.bytes.as_mut_ptr())
            }
            None => Err(vk::Result::ERROR_MEMORY_MAP_FAILED),
        }
    }

    fn unmap_memory(&self, memory: vk::DeviceMemory) {
        let mut s = self.state.borrow_mut();
        let was_mapped = match s.memories.get_mut(&memory.as_raw()) {
            Some(m) => std::mem::replace(&mut m.mapped, false),
            None => false,
        };
        if !was_mapped {
            s.violation("unmap of memory that is not mapped".into());
        }
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView> {
        let mut s = self.state.borrow_mut();
        let image = info.image.as_raw();
        if !s.images.contains_key(&image) {
            s.violation(format!("view of destroyed image {image:#x}"));
        }
        let raw = s.mint("image view");
        s.views.insert(raw, image);
        Ok(vk::ImageView::from_raw(raw))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        let mut s = self.state.borrow_mut();
        let raw = view.as_raw();
        s.require_idle("image view");
        let in_use = s
            .framebuffers
            .iter()
            .any(|(fb, f)| s.is_live(*fb, "framebuffer") && f.attachments.contains(&raw));
        if in_use {
            s.violation(format!("view {raw:#x} destroyed before its framebuffer"));
        }
        if s.retire(raw, "image view") {
            s.views.remove(&raw);
        }
    }

    fn create_sampler(&self, _info: &vk::SamplerCreateInfo<'_>) -> VkResult<vk::Sampler> {
        Ok(vk::Sampler::from_raw(self.state.borrow_mut().mint("sampler")))
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        self.state.borrow_mut().retire(sampler.as_raw(), "sampler");
    }

    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo<'_>) -> VkResult<vk::RenderPass> {
        let mut s = self.state.borrow_mut();
        if info.attachment_count != 2 || info.subpass_count != 1 {
            s.violation("render pass needs a color and a depth attachment in one subpass".into());
        }
        Ok(vk::RenderPass::from_raw(s.mint("render pass")))
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        let mut s = self.state.borrow_mut();
        let raw = render_pass.as_raw();
        s.require_idle("render pass");
        let in_use = s
            .framebuffers
            .iter()
            .any(|(fb, f)| s.is_live(*fb, "framebuffer") && f.render_pass == raw);
        if in_use {
            s.violation("render pass destroyed before its framebuffers".into());
        }
        s.retire(raw, "render pass");
    }

    fn create_framebuffer(&self, info: &vk::FramebufferCreateInfo<'_>) -> VkResult<vk::Framebuffer> {
        let mut s = self.state.borrow_mut();
        let attachments: Vec<u64> = if info.attachment_count == 0 || info.p_attachments.is_null() {
            Vec::new()
        } else {
            // SAFETY: the caller keeps the attachment array alive for the call.
            unsafe { std::slice::from_raw_parts(info.p_attachments, info.attachment_count as usize) }
                .iter()
                .map(|v| v.as_raw())
                .collect()
        };
        let extent = vk::Extent2D {
            width: info.width,
            height: info.height,
        };
        for view in &attachments {
            let image = s.views.get(view).copied();
            let fits = image
                .and_then(|i| s.images.get(&i))
                .is_some_and(|i| i.extent.width >= extent.width && i.extent.height >= extent.height);
            if !s.is_live(*view, "image view") || !fits {
                s.violation(format!("framebuffer attachment {view:#x} is stale or too small"));
            }
        }
        let raw = s.mint("framebuffer");
        s.framebuffers.insert(
            raw,
            Framebuffer {
                extent,
                render_pass: info.render_pass.as_raw(),
                attachments,
            },
        );
        Ok(vk::Framebuffer::from_raw(raw))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        let mut s = self.state.borrow_mut();
        s.require_idle("framebuffer");
        if s.retire(framebuffer.as_raw(), "framebuffer") {
            s.framebuffers.remove(&framebuffer.as_raw());
        }
    }

    fn create_shader_module(&self, code: &[u32]) -> VkResult<vk::ShaderModule> {
        if code.is_empty() {
            return Err(vk::Result::ERROR_INVALID_SHADER_NV);
        }
        Ok(vk::ShaderModule::from_raw(self.state.borrow_mut().mint("shader module")))
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.state.borrow_mut().retire(module.as_raw(), "shader module");
    }

    fn create_pipeline_layout(
        &self,
        _info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        Ok(vk::PipelineLayout::from_raw(self.state.borrow_mut().mint("pipeline layout")))
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.state.borrow_mut().retire(layout.as_raw(), "pipeline layout");
    }

    fn create_graphics_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline> {
        let mut s = self.state.borrow_mut();
        if !s.is_live(info.render_pass.as_raw(), "render pass") {
            s.violation("pipeline built against a destroyed render pass".into());
        }
        Ok(vk::Pipeline::from_raw(s.mint("pipeline")))
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        let mut s = self.state.borrow_mut();
        s.require_idle("pipeline");
        s.retire(pipeline.as_raw(), "pipeline");
    }

    fn create_descriptor_set_layout(
        &self,
        _info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorSetLayout> {
        Ok(vk::DescriptorSetLayout::from_raw(
            self.state.borrow_mut().mint("descriptor set layout"),
        ))
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.state
            .borrow_mut()
            .retire(layout.as_raw(), "descriptor set layout");
    }

    fn create_descriptor_pool(
        &self,
        _info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorPool> {
        Ok(vk::DescriptorPool::from_raw(
            self.state.borrow_mut().mint("descriptor pool"),
        ))
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        let mut s = self.state.borrow_mut();
        s.require_idle("descriptor pool");
        s.retire(pool.as_raw(), "descriptor pool");
    }

    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::DescriptorSet>> {
        let mut s = self.state.borrow_mut();
        if !s.is_live(info.descriptor_pool.as_raw(), "descriptor pool") {
            s.violation("descriptor sets from a destroyed pool".into());
        }
        Ok((0..info.descriptor_set_count)
            .map(|_| vk::DescriptorSet::from_raw(s.mint_untracked()))
            .collect())
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]) {
        let mut s = self.state.borrow_mut();
        for w in writes {
            if w.dst_set == vk::DescriptorSet::null() {
                s.violation("descriptor write to a null set".into());
            }
        }
    }

    fn create_command_pool(&self, _flags: vk::CommandPoolCreateFlags) -> VkResult<vk::CommandPool> {
        Ok(vk::CommandPool::from_raw(self.state.borrow_mut().mint("command pool")))
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        let mut s = self.state.borrow_mut();
        let raw = pool.as_raw();
        let owned: Vec<u64> = s
            .command_buffers
            .iter()
            .filter(|(_, c)| c.pool == raw)
            .map(|(cb, _)| *cb)
            .collect();
        for cb in owned {
            if s.command_buffers.get(&cb).is_some_and(|c| c.pending > 0) {
                s.violation("command pool destroyed with pending work".into());
            }
            s.command_buffers.remove(&cb);
            s.live.remove(&cb);
        }
        s.retire(raw, "command pool");
    }

    fn allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        let mut s = self.state.borrow_mut();
        if !s.is_live(pool.as_raw(), "command pool") {
            s.violation("command buffers from a destroyed pool".into());
        }
        let mut out = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let raw = s.mint("command buffer");
            s.command_buffers.insert(
                raw,
                CommandBuffer {
                    pool: pool.as_raw(),
                    recording: false,
                    pending: 0,
                    commands: Vec::new(),
                },
            );
            out.push(vk::CommandBuffer::from_raw(raw));
        }
        Ok(out)
    }

    fn free_command_buffers(&self, _pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        let mut s = self.state.borrow_mut();
        for cb in buffers {
            let raw = cb.as_raw();
            if s.command_buffers.get(&raw).is_some_and(|c| c.pending > 0) {
                s.violation("command buffer freed while pending".into());
            }
            if s.retire(raw, "command buffer") {
                s.command_buffers.remove(&raw);
            }
        }
    }

    fn begin_command_buffer(
        &self,
        cmd: vk::CommandBuffer,
        _flags: vk::CommandBufferUsageFlags,
    ) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        s.stats.recordings += 1;
        let pending = match s.command_buffers.get_mut(&cmd.as_raw()) {
            Some(c) => {
                c.recording = true;
                c.commands.clear();
                c.pending
            }
            None => return Err(vk::Result::ERROR_UNKNOWN),
        };
        if pending > 0 {
            s.violation("command buffer re-recorded while pending".into());
        }
        Ok(())
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        let was_recording = match s.command_buffers.get_mut(&cmd.as_raw()) {
            Some(c) => std::mem::replace(&mut c.recording, false),
            None => false,
        };
        if !was_recording {
            s.violation("end without begin".into());
            return Err(vk::Result::ERROR_UNKNOWN);
        }
        Ok(())
    }

    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        let pending = match s.command_buffers.get_mut(&cmd.as_raw()) {
            Some(c) => {
                c.commands.clear();
                c.recording = false;
                c.pending
            }
            None => return Err(vk::Result::ERROR_UNKNOWN),
        };
        if pending > 0 {
            s.violation("command buffer reset while pending".into());
        }
        Ok(())
    }

    fn cmd_pipeline_barrier(
        &self,
        cmd: vk::CommandBuffer,
        _src_stage: vk::PipelineStageFlags,
        _dst_stage: vk::PipelineStageFlags,
        barriers: &[vk::ImageMemoryBarrier<'_>],
    ) {
        let mut s = self.state.borrow_mut();
        for b in barriers {
            s.record(
                cmd,
                Command::Barrier {
                    image: b.image.as_raw(),
                    old: b.old_layout,
                    new: b.new_layout,
                },
            );
        }
    }

    fn cmd_copy_buffer(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) {
        self.state.borrow_mut().record(
            cmd,
            Command::CopyBuffer {
                src: src.as_raw(),
                dst: dst.as_raw(),
                regions: regions.to_vec(),
            },
        );
    }

    fn cmd_copy_buffer_to_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Image,
        layout: vk::ImageLayout,
        _regions: &[vk::BufferImageCopy],
    ) {
        self.state.borrow_mut().record(
            cmd,
            Command::CopyBufferToImage {
                src: src.as_raw(),
                dst: dst.as_raw(),
                layout,
            },
        );
    }

    fn cmd_copy_image_to_buffer(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Image,
        layout: vk::ImageLayout,
        dst: vk::Buffer,
        _regions: &[vk::BufferImageCopy],
    ) {
        self.state.borrow_mut().record(
            cmd,
            Command::CopyImageToBuffer {
                src: src.as_raw(),
                layout,
                dst: dst.as_raw(),
            },
        );
    }

    fn cmd_begin_render_pass(&self, cmd: vk::CommandBuffer, info: &vk::RenderPassBeginInfo<'_>) {
        let mut s = self.state.borrow_mut();
        let fb = info.framebuffer.as_raw();
        if !s.is_live(fb, "framebuffer") {
            s.violation("render pass begun on a destroyed framebuffer".into());
        }
        if info.clear_value_count != 2 {
            s.violation("render pass needs color and depth clear values".into());
        }
        s.record(cmd, Command::BeginRenderPass { framebuffer: fb });
    }

    fn cmd_end_render_pass(&self, _cmd: vk::CommandBuffer) {}

    fn cmd_bind_pipeline(&self, _cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        let mut s = self.state.borrow_mut();
        if !s.is_live(pipeline.as_raw(), "pipeline") {
            s.violation("bound a destroyed pipeline".into());
        }
    }

    fn cmd_bind_vertex_buffer(&self, _cmd: vk::CommandBuffer, buffer: vk::Buffer) {
        let mut s = self.state.borrow_mut();
        if !s.is_live(buffer.as_raw(), "buffer") {
            s.violation("bound a destroyed vertex buffer".into());
        }
    }

    fn cmd_bind_index_buffer(
        &self,
        _cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        _index_type: vk::IndexType,
    ) {
        let mut s = self.state.borrow_mut();
        if !s.is_live(buffer.as_raw(), "buffer") {
            s.violation("bound a destroyed index buffer".into());
        }
    }

    fn cmd_bind_descriptor_set(
        &self,
        _cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        _set: vk::DescriptorSet,
    ) {
        let mut s = self.state.borrow_mut();
        if !s.is_live(layout.as_raw(), "pipeline layout") {
            s.violation("descriptor set bound through a destroyed layout".into());
        }
    }

    fn cmd_draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32) {
        let mut s = self.state.borrow_mut();
        if index_count == 0 {
            s.violation("empty draw".into());
        }
        s.record(cmd, Command::Draw);
    }

    fn queue_submit(
        &self,
        _queue: vk::Queue,
        batch: &SubmitBatch<'_>,
        fence: vk::Fence,
    ) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        s.stats.submits += 1;
        let id = s.next_submission;
        s.next_submission += 1;

        for (sem, _) in batch.wait {
            if !s.wait_semaphore(sem.as_raw(), Some(id)) {
                s.violation("submit waits on a semaphore that will never signal".into());
            }
        }

        for cb in batch.command_buffers {
            let raw = cb.as_raw();
            let problem = match s.command_buffers.get(&raw) {
                None => Some("submit of a freed command buffer"),
                Some(c) if c.recording => Some("submit of a command buffer still recording"),
                Some(c) if c.pending > 0 => Some("command buffer resubmitted before its fence"),
                Some(_) => None,
            };
            if let Some(p) = problem {
                s.violation(p.into());
            }
            s.execute(raw);
            if let Some(c) = s.command_buffers.get_mut(&raw) {
                c.pending += 1;
            }
        }

        for sem in batch.signal {
            if let Some(problem) = s.signal_semaphore(sem.as_raw()) {
                s.violation(format!("submit: {problem}"));
            }
        }

        let fence_raw = fence.as_raw();
        if fence_raw != 0 {
            let armed = match s.fences.get_mut(&fence_raw) {
                Some(f) if !f.signaled && f.pending.is_none() => {
                    f.pending = Some(id);
                    true
                }
                _ => false,
            };
            if !armed {
                s.violation("submit with a fence that was not reset".into());
            }
            s.stats.fenced_submits += 1;
        }

        s.submissions.push_back(Submission {
            id,
            fence: (fence_raw != 0).then_some(fence_raw),
            command_buffers: batch.command_buffers.iter().map(|c| c.as_raw()).collect(),
        });
        let outstanding = s.outstanding();
        s.stats.max_outstanding = s.stats.max_outstanding.max(outstanding);
        Ok(())
    }

    fn queue_wait_idle(&self, _queue: vk::Queue) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        s.stats.queue_idle_waits += 1;
        s.retire_all();
        Ok(())
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        s.stats.device_idle_waits += 1;
        s.retire_all();
        Ok(())
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        let mut s = self.state.borrow_mut();
        let raw = s.mint("semaphore");
        s.semaphores.insert(raw, Semaphore::default());
        Ok(vk::Semaphore::from_raw(raw))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        let mut s = self.state.borrow_mut();
        let raw = semaphore.as_raw();
        if s.semaphores.get(&raw).is_some_and(|st| st.waiter.is_some()) {
            s.violation("semaphore destroyed while a submission waits on it".into());
        }
        if s.retire(raw, "semaphore") {
            s.semaphores.remove(&raw);
        }
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let mut s = self.state.borrow_mut();
        let raw = s.mint("fence");
        s.fences.insert(
            raw,
            Fence {
                signaled,
                pending: None,
            },
        );
        Ok(vk::Fence::from_raw(raw))
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        let mut s = self.state.borrow_mut();
        let raw = fence.as_raw();
        if s.fences.get(&raw).is_some_and(|f| f.pending.is_some()) {
            s.violation("fence destroyed while pending".into());
        }
        if s.retire(raw, "fence") {
            s.fences.remove(&raw);
        }
    }

    fn wait_for_fence(&self, fence: vk::Fence) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        s.stats.fence_waits += 1;
        let state = s.fences.get(&fence.as_raw()).map(|f| (f.signaled, f.pending));
        match state {
            Some((true, _)) => Ok(()),
            Some((false, Some(id))) => {
                s.retire_through(id);
                Ok(())
            }
            Some((false, None)) => {
                s.violation("wait on an unsignalled fence with no pending work (deadlock)".into());
                Err(vk::Result::TIMEOUT)
            }
            None => {
                s.violation("wait on a destroyed fence".into());
                Err(vk::Result::ERROR_DEVICE_LOST)
            }
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        let pending = match s.fences.get_mut(&fence.as_raw()) {
            Some(f) => {
                let pending = f.pending.is_some();
                f.signaled = false;
                pending
            }
            None => return Err(vk::Result::ERROR_UNKNOWN),
        };
        if pending {
            s.violation("fence reset while its submission is in flight".into());
        }
        Ok(())
    }
}

enum ScriptEvent {
    Resize(RenderSize),
    Close,
}

/// `WindowPort` driven by a poll-indexed script; resizes also move the fake surface.
pub(crate) struct ScriptedWindow {
    probe: FakeProbe,
    size: RenderSize,
    resized: bool,
    closed: bool,
    polls: u64,
    poll_budget: u64,
    script: VecDeque<(u64, ScriptEvent)>,
    /// (size, allocations) observed at each poll.
    pub history: Vec<(RenderSize, u64)>,
}

impl ScriptedWindow {
    pub fn new(gpu: &FakeGpu, size: RenderSize) -> Self {
        let probe = gpu.probe();
        probe.set_surface(size);
        Self {
            probe,
            size,
            resized: false,
            closed: false,
            polls: 0,
            poll_budget: 100_000,
            script: VecDeque::new(),
            history: Vec::new(),
        }
    }

    /// Events must be scheduled in increasing poll order.
    pub fn resize_at(mut self, poll: u64, width: u32, height: u32) -> Self {
        self.script
            .push_back((poll, ScriptEvent::Resize(RenderSize::new(width, height))));
        self
    }

    pub fn close_at(mut self, poll: u64) -> Self {
        self.script.push_back((poll, ScriptEvent::Close));
        self
    }

    pub fn resize_now(&mut self, width: u32, height: u32) {
        self.apply(ScriptEvent::Resize(RenderSize::new(width, height)));
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }

    fn apply(&mut self, event: ScriptEvent) {
        match event {
            ScriptEvent::Resize(size) => {
                self.size = size;
                self.resized = true;
                self.probe.set_surface(size);
            }
            ScriptEvent::Close => self.closed = true,
        }
    }
}

impl WindowPort for ScriptedWindow {
    fn framebuffer_size(&self) -> RenderSize {
        self.size
    }

    fn poll_events(&mut self) {
        self.polls += 1;
        while self.script.front().is_some_and(|(at, _)| *at <= self.polls) {
            if let Some((_, event)) = self.script.pop_front() {
                self.apply(event);
            }
        }
        if self.polls >= self.poll_budget {
            self.closed = true;
        }
        self.history.push((self.size, self.probe.stats().allocations));
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    fn should_close(&self) -> bool {
        self.closed
    }
}

/// A syntactically valid SPIR-V header; the fake never looks past it.
pub(crate) fn spirv_bytes() -> Vec<u8> {
    [0x0723_0203u32, 0x0001_0000, 0, 1, 0]
        .iter()
        .flat_map(|w| w.to_le_bytes())
        .collect()
}

pub(crate) fn fake_shaders() -> crate::pipeline::ShaderSet {
    let spv = spirv_bytes();
    crate::pipeline::ShaderSet::from_spirv(&spv, &spv).expect("valid header")
}
