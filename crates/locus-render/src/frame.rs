//! Per-slot frame resources and the token proving a frame is in progress.

use crate::render_context::RenderContextHandle;
use ash::vk;
use locus_gpu::{
    DeletionQueue, GpuBackend, GpuObject, Owner, ResourceArena, ResourceHandle, Result,
};

/// One slot of a render context's frame ring.
pub struct FrameResources<B> {
    pub(crate) command_pool: vk::CommandPool,
    pub(crate) command_buffer: vk::CommandBuffer,
    /// Signaled by acquisition; drawing waits on it.
    pub(crate) image_available: vk::Semaphore,
    /// Signaled when drawing finishes; presentation waits on it.
    pub(crate) render_finished: vk::Semaphore,
    /// Signaled when the GPU is done with the slot's last submission.
    pub(crate) in_flight: vk::Fence,
    pub(crate) fence_record: ResourceHandle,
    /// Resources retired while this slot was recording.
    pub(crate) deletion_queue: DeletionQueue<B>,
}

impl<B: GpuBackend> FrameResources<B> {
    /// Create the slot's objects and record them in `arena` under
    /// [`Owner::FrameSlot`].
    ///
    /// The fence starts signaled so the slot's first wait returns at once.
    pub(crate) fn create(
        backend: &mut B,
        arena: &mut ResourceArena,
        context: u64,
        slot: usize,
    ) -> Result<Self> {
        let owner = Owner::FrameSlot { context, slot };

        let command_pool = backend.create_command_pool()?;
        arena.register(GpuObject::CommandPool(command_pool), owner, &[]);
        let command_buffer = backend.allocate_command_buffer(command_pool)?;

        let image_available = backend.create_semaphore()?;
        arena.register(GpuObject::Semaphore(image_available), owner, &[]);
        let render_finished = backend.create_semaphore()?;
        arena.register(GpuObject::Semaphore(render_finished), owner, &[]);

        let in_flight = backend.create_fence(true)?;
        let fence_record = arena.register(GpuObject::Fence(in_flight), owner, &[]);

        Ok(Self {
            command_pool,
            command_buffer,
            image_available,
            render_finished,
            in_flight,
            fence_record,
            deletion_queue: DeletionQueue::new(),
        })
    }

    /// Command pool the slot's command buffer is allocated from.
    pub const fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    /// The slot's completion fence.
    pub const fn fence(&self) -> vk::Fence {
        self.in_flight
    }

    /// Number of pending deferred actions.
    pub fn pending_deletions(&self) -> usize {
        self.deletion_queue.len()
    }
}

/// Proof that a frame is being recorded.
///
/// Returned by [`GraphicsManager::begin_frame`](crate::GraphicsManager::begin_frame)
/// and consumed by [`GraphicsManager::end_frame`](crate::GraphicsManager::end_frame).
#[must_use = "a frame must be finished with GraphicsManager::end_frame"]
#[derive(Debug)]
pub struct FrameToken {
    pub(crate) context: RenderContextHandle,
    pub(crate) slot: usize,
    pub(crate) image_index: u32,
    pub(crate) frame_number: u64,
    pub(crate) command_buffer: vk::CommandBuffer,
    pub(crate) extent: vk::Extent2D,
    pub(crate) ended: bool,
}

impl FrameToken {
    /// Render context the frame belongs to.
    pub const fn context(&self) -> RenderContextHandle {
        self.context
    }

    /// Frame slot in use.
    pub const fn slot(&self) -> usize {
        self.slot
    }

    /// Index of the acquired swapchain image.
    pub const fn image_index(&self) -> u32 {
        self.image_index
    }

    /// The context's frame counter when the frame began.
    pub const fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Command buffer to record into. A render pass clearing the acquired
    /// image is already open.
    pub const fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Size of the acquired image.
    pub const fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for FrameToken {
    fn drop(&mut self) {
        if !self.ended {
            tracing::error!(
                context = %self.context,
                frame = self.frame_number,
                "Frame token dropped without end_frame; the context stays mid-frame"
            );
        }
    }
}
