//! Shared record of GPU interactions.

use ash::vk;
use locus_gpu::GpuObject;
use parking_lot::Mutex;
use std::sync::Arc;

/// Something that happened on the fake GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuEvent {
    /// An object was created.
    Created(GpuObject),
    /// An object was destroyed.
    Destroyed(GpuObject),
    /// A fence was returned to the unsignaled state.
    FenceReset(vk::Fence),
    /// A frame's work was queued.
    Submitted {
        fence: vk::Fence,
        command_buffer: vk::CommandBuffer,
    },
    /// Queued work signaled its fence.
    GpuCompleted(vk::Fence),
    /// A CPU wait on a fence returned successfully.
    FenceWaitReturned(vk::Fence),
    /// A bounded CPU wait gave up.
    FenceWaitTimedOut(vk::Fence),
    /// A swapchain image was handed out.
    Acquired {
        swapchain: vk::SwapchainKHR,
        image_index: u32,
    },
    /// A swapchain image was queued for presentation.
    Presented {
        swapchain: vk::SwapchainKHR,
        image_index: u32,
    },
    /// The device was drained.
    WaitIdle,
    /// Test-defined marker, typically pushed from a deletion action.
    Marker(&'static str),
}

/// Cloneable handle to a shared event list.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<GpuEvent>>>);

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn push(&self, event: GpuEvent) {
        self.0.lock().push(event);
    }

    /// Append a [`GpuEvent::Marker`].
    pub fn mark(&self, label: &'static str) {
        self.push(GpuEvent::Marker(label));
    }

    /// Copy of every event so far.
    pub fn snapshot(&self) -> Vec<GpuEvent> {
        self.0.lock().clone()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.0.lock().clear();
    }

    /// Index of the first event equal to `event`.
    pub fn position(&self, event: GpuEvent) -> Option<usize> {
        self.0.lock().iter().position(|e| *e == event)
    }

    /// Index of the first event matching `predicate`.
    pub fn find(&self, predicate: impl Fn(&GpuEvent) -> bool) -> Option<usize> {
        self.0.lock().iter().position(predicate)
    }

    /// Number of events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&GpuEvent) -> bool) -> usize {
        self.0.lock().iter().filter(|e| predicate(e)).count()
    }

    /// Number of [`GpuEvent::Marker`] events with `label`.
    pub fn markers(&self, label: &'static str) -> usize {
        self.count(|e| *e == GpuEvent::Marker(label))
    }

    /// Destroyed objects, in destruction order.
    pub fn destroyed(&self) -> Vec<GpuObject> {
        self.0
            .lock()
            .iter()
            .filter_map(|e| match e {
                GpuEvent::Destroyed(object) => Some(*object),
                _ => None,
            })
            .collect()
    }
}
