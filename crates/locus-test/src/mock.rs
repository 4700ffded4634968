//! Deterministic fake GPU.
//!
//! Work submitted to the [`MockBackend`] does not complete on its own: it
//! stays pending until the CPU waits on its fence (which completes every
//! submission up to and including that one, in order), until
//! [`MockBackend::complete_all`] runs, or until the device is drained with
//! `wait_idle`. A [`stall`](MockBackend::stall)ed GPU completes nothing on a
//! fence wait, so bounded waits time out.

use crate::events::{EventLog, GpuEvent};
use crate::window::MockWindow;
use ash::vk::{self, Handle as _};
use locus_gpu::{
    AcquiredImage, FrameSubmit, GpuBackend, GpuError, GpuObject, RenderPassBegin, Result,
    SwapchainInfo,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

struct MockSwapchain {
    image_count: u32,
    next_image: u32,
}

/// Fake [`GpuBackend`] with synthetic handles and an event log.
pub struct MockBackend {
    log: EventLog,
    next_raw: u64,
    live: HashSet<GpuObject>,
    fences: HashMap<vk::Fence, bool>,
    pending: VecDeque<vk::Fence>,
    swapchains: HashMap<vk::SwapchainKHR, MockSwapchain>,
    image_count: u32,
    stalled: bool,
    out_of_date: bool,
    suboptimal: bool,
    fail_swapchain: bool,
    fail_begin_commands: bool,
    fail_end_commands: bool,
    fail_submit: bool,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a backend whose swapchains have three images.
    pub fn new() -> Self {
        Self {
            log: EventLog::new(),
            next_raw: 1,
            live: HashSet::new(),
            fences: HashMap::new(),
            pending: VecDeque::new(),
            swapchains: HashMap::new(),
            image_count: 3,
            stalled: false,
            out_of_date: false,
            suboptimal: false,
            fail_swapchain: false,
            fail_begin_commands: false,
            fail_end_commands: false,
            fail_submit: false,
        }
    }

    /// Use `count` images for swapchains created from now on.
    #[must_use]
    pub fn with_image_count(mut self, count: u32) -> Self {
        assert!(count > 0, "a swapchain needs at least one image");
        self.image_count = count;
        self
    }

    /// Shared handle to the event log.
    pub fn log(&self) -> EventLog {
        self.log.clone()
    }

    /// Stop completing work on fence waits.
    pub fn stall(&mut self) {
        self.stalled = true;
    }

    /// Undo [`stall`](Self::stall).
    pub fn resume(&mut self) {
        self.stalled = false;
    }

    /// Make acquisition report an out-of-date surface until the next swapchain is created.
    pub fn invalidate_surfaces(&mut self) {
        self.out_of_date = true;
    }

    /// Make acquisition and presentation report suboptimal surfaces.
    pub fn set_suboptimal(&mut self, suboptimal: bool) {
        self.suboptimal = suboptimal;
    }

    /// Make swapchain creation fail.
    pub fn fail_swapchain_creation(&mut self, fail: bool) {
        self.fail_swapchain = fail;
    }

    /// Make `begin_commands` report a lost device.
    pub fn fail_begin_commands(&mut self, fail: bool) {
        self.fail_begin_commands = fail;
    }

    /// Make `end_commands` report a lost device.
    pub fn fail_end_commands(&mut self, fail: bool) {
        self.fail_end_commands = fail;
    }

    /// Make submission report a lost device. Nothing is queued and the
    /// fence stays unsignaled.
    pub fn fail_submit(&mut self, fail: bool) {
        self.fail_submit = fail;
    }

    /// Complete every pending submission.
    pub fn complete_all(&mut self) {
        while let Some(fence) = self.pending.pop_front() {
            self.signal(fence);
        }
    }

    /// Number of submissions the GPU has not finished yet.
    pub fn pending_submissions(&self) -> usize {
        self.pending.len()
    }

    /// Number of created objects not yet destroyed.
    pub fn live_objects(&self) -> usize {
        self.live.len()
    }

    /// Whether `object` was created and not yet destroyed.
    pub fn is_live(&self, object: GpuObject) -> bool {
        self.live.contains(&object)
    }

    /// Whether `fence` is currently signaled.
    pub fn is_signaled(&self, fence: vk::Fence) -> bool {
        self.fences.get(&fence).copied().unwrap_or(false)
    }

    /// Create a pipeline, for tests that hand user objects to the frame manager.
    pub fn create_pipeline(&mut self) -> vk::Pipeline {
        let pipeline = vk::Pipeline::from_raw(self.raw());
        self.track(GpuObject::Pipeline(pipeline));
        pipeline
    }

    fn raw(&mut self) -> u64 {
        let raw = self.next_raw;
        self.next_raw += 1;
        raw
    }

    fn track(&mut self, object: GpuObject) {
        self.live.insert(object);
        self.log.push(GpuEvent::Created(object));
    }

    fn signal(&mut self, fence: vk::Fence) {
        self.fences.insert(fence, true);
        self.log.push(GpuEvent::GpuCompleted(fence));
    }

    fn assert_live(&self, object: GpuObject) {
        assert!(self.live.contains(&object), "use of dead object {object:?}");
    }
}

impl GpuBackend for MockBackend {
    type Window = MockWindow;

    fn create_surface(&mut self, _window: &MockWindow) -> Result<vk::SurfaceKHR> {
        let surface = vk::SurfaceKHR::from_raw(self.raw());
        self.track(GpuObject::Surface(surface));
        Ok(surface)
    }

    fn create_swapchain(
        &mut self,
        surface: vk::SurfaceKHR,
        extent: vk::Extent2D,
        _vsync: bool,
    ) -> Result<SwapchainInfo> {
        self.assert_live(GpuObject::Surface(surface));
        if self.fail_swapchain {
            return Err(GpuError::SwapchainCreation("injected failure".into()));
        }
        if extent.width == 0 || extent.height == 0 {
            return Err(GpuError::SwapchainCreation(format!(
                "zero-sized extent {}x{}",
                extent.width, extent.height
            )));
        }

        let swapchain = vk::SwapchainKHR::from_raw(self.raw());
        self.track(GpuObject::Swapchain(swapchain));
        self.swapchains.insert(
            swapchain,
            MockSwapchain {
                image_count: self.image_count,
                next_image: 0,
            },
        );
        self.out_of_date = false;

        let images = (0..self.image_count)
            .map(|_| vk::Image::from_raw(self.raw()))
            .collect();

        Ok(SwapchainInfo {
            swapchain,
            images,
            format: vk::Format::B8G8R8A8_SRGB,
            extent,
        })
    }

    fn create_image_view(&mut self, _image: vk::Image, _format: vk::Format) -> Result<vk::ImageView> {
        let view = vk::ImageView::from_raw(self.raw());
        self.track(GpuObject::ImageView(view));
        Ok(view)
    }

    fn create_render_pass(&mut self, _format: vk::Format) -> Result<vk::RenderPass> {
        let render_pass = vk::RenderPass::from_raw(self.raw());
        self.track(GpuObject::RenderPass(render_pass));
        Ok(render_pass)
    }

    fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        _extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer> {
        self.assert_live(GpuObject::RenderPass(render_pass));
        self.assert_live(GpuObject::ImageView(view));
        let framebuffer = vk::Framebuffer::from_raw(self.raw());
        self.track(GpuObject::Framebuffer(framebuffer));
        Ok(framebuffer)
    }

    fn create_command_pool(&mut self) -> Result<vk::CommandPool> {
        let pool = vk::CommandPool::from_raw(self.raw());
        self.track(GpuObject::CommandPool(pool));
        Ok(pool)
    }

    fn allocate_command_buffer(&mut self, pool: vk::CommandPool) -> Result<vk::CommandBuffer> {
        self.assert_live(GpuObject::CommandPool(pool));
        Ok(vk::CommandBuffer::from_raw(self.raw()))
    }

    fn create_semaphore(&mut self) -> Result<vk::Semaphore> {
        let semaphore = vk::Semaphore::from_raw(self.raw());
        self.track(GpuObject::Semaphore(semaphore));
        Ok(semaphore)
    }

    fn create_fence(&mut self, signaled: bool) -> Result<vk::Fence> {
        let fence = vk::Fence::from_raw(self.raw());
        self.track(GpuObject::Fence(fence));
        self.fences.insert(fence, signaled);
        Ok(fence)
    }

    fn wait_for_fence(&mut self, fence: vk::Fence, timeout: Option<Duration>) -> Result<()> {
        self.assert_live(GpuObject::Fence(fence));

        if !self.is_signaled(fence) {
            let submitted = self.pending.contains(&fence);
            if self.stalled || !submitted {
                self.log.push(GpuEvent::FenceWaitTimedOut(fence));
                return match timeout {
                    Some(_) => Err(GpuError::Timeout),
                    None => panic!("unbounded wait on {fence:?} would never return"),
                };
            }

            while let Some(done) = self.pending.pop_front() {
                self.signal(done);
                if done == fence {
                    break;
                }
            }
        }

        self.log.push(GpuEvent::FenceWaitReturned(fence));
        Ok(())
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> Result<()> {
        self.assert_live(GpuObject::Fence(fence));
        assert!(
            !self.pending.contains(&fence),
            "reset of {fence:?} while its submission is still pending"
        );
        self.fences.insert(fence, false);
        self.log.push(GpuEvent::FenceReset(fence));
        Ok(())
    }

    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
        _timeout: Option<Duration>,
    ) -> Result<AcquiredImage> {
        self.assert_live(GpuObject::Semaphore(signal));
        if self.out_of_date {
            return Err(GpuError::SurfaceOutOfDate);
        }

        let Some(chain) = self.swapchains.get_mut(&swapchain) else {
            panic!("acquire on unknown swapchain {swapchain:?}");
        };
        let image_index = chain.next_image;
        chain.next_image = (chain.next_image + 1) % chain.image_count;

        self.log.push(GpuEvent::Acquired {
            swapchain,
            image_index,
        });
        Ok(AcquiredImage {
            index: image_index,
            suboptimal: self.suboptimal,
        })
    }

    fn begin_commands(&mut self, _cmd: vk::CommandBuffer) -> Result<()> {
        if self.fail_begin_commands {
            return Err(GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST));
        }
        Ok(())
    }

    fn begin_render_pass(&mut self, _cmd: vk::CommandBuffer, begin: &RenderPassBegin) {
        self.assert_live(GpuObject::RenderPass(begin.render_pass));
        self.assert_live(GpuObject::Framebuffer(begin.framebuffer));
    }

    fn end_render_pass(&mut self, _cmd: vk::CommandBuffer) {}

    fn end_commands(&mut self, _cmd: vk::CommandBuffer) -> Result<()> {
        if self.fail_end_commands {
            return Err(GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST));
        }
        Ok(())
    }

    fn submit(&mut self, submit: &FrameSubmit) -> Result<()> {
        self.assert_live(GpuObject::Fence(submit.fence));
        self.assert_live(GpuObject::Semaphore(submit.wait));
        self.assert_live(GpuObject::Semaphore(submit.signal));
        assert!(
            !self.is_signaled(submit.fence),
            "submit with already signaled {:?}",
            submit.fence
        );
        if self.fail_submit {
            return Err(GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST));
        }

        self.pending.push_back(submit.fence);
        self.log.push(GpuEvent::Submitted {
            fence: submit.fence,
            command_buffer: submit.command_buffer,
        });
        Ok(())
    }

    fn present(
        &mut self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> Result<bool> {
        self.assert_live(GpuObject::Swapchain(swapchain));
        self.assert_live(GpuObject::Semaphore(wait));
        self.log.push(GpuEvent::Presented {
            swapchain,
            image_index,
        });
        Ok(self.suboptimal || self.out_of_date)
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.complete_all();
        self.log.push(GpuEvent::WaitIdle);
        Ok(())
    }

    fn destroy(&mut self, object: GpuObject) {
        assert!(
            self.live.remove(&object),
            "destroying unknown or already destroyed {object:?}"
        );
        match object {
            GpuObject::Fence(fence) => {
                assert!(
                    !self.pending.contains(&fence),
                    "destroying {fence:?} while the GPU still uses it"
                );
                self.fences.remove(&fence);
            }
            GpuObject::Swapchain(swapchain) => {
                self.swapchains.remove(&swapchain);
            }
            _ => {}
        }
        self.log.push(GpuEvent::Destroyed(object));
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        if !self.live.is_empty() {
            tracing::warn!(leaked = self.live.len(), "MockBackend dropped with live objects");
        }
    }
}
