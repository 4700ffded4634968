//! Synchronization primitives.

use crate::error::{GpuError, Result};
use ash::vk;
use std::time::Duration;

/// Convert an optional timeout to the nanosecond value Vulkan expects.
///
/// `None` waits forever. Durations too long for `u64` nanoseconds saturate.
pub fn timeout_ns(timeout: Option<Duration>) -> u64 {
    timeout.map_or(u64::MAX, |t| u64::try_from(t.as_nanos()).unwrap_or(u64::MAX))
}

/// Create a semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    let semaphore = unsafe { device.create_semaphore(&create_info, None)? };
    Ok(semaphore)
}

/// Create a fence.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    let fence = unsafe { device.create_fence(&create_info, None)? };
    Ok(fence)
}

/// Wait for a fence to be signaled.
///
/// Returns [`GpuError::Timeout`] if `timeout` expires first.
///
/// # Safety
/// The device and fence must be valid.
#[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
pub unsafe fn wait_for_fence(
    device: &ash::Device,
    fence: vk::Fence,
    timeout: Option<Duration>,
) -> Result<()> {
    match unsafe { device.wait_for_fences(&[fence], true, timeout_ns(timeout)) } {
        Ok(()) => Ok(()),
        Err(vk::Result::TIMEOUT) => Err(GpuError::Timeout),
        Err(e) => Err(GpuError::from(e)),
    }
}

/// Reset a fence to unsignaled state.
///
/// # Safety
/// The device and fence must be valid.
#[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
pub unsafe fn reset_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    unsafe { device.reset_fences(&[fence])? };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_wait_is_u64_max() {
        assert_eq!(timeout_ns(None), u64::MAX);
    }

    #[test]
    fn bounded_wait_in_nanoseconds() {
        assert_eq!(timeout_ns(Some(Duration::from_millis(3))), 3_000_000);
        assert_eq!(timeout_ns(Some(Duration::ZERO)), 0);
    }

    #[test]
    fn huge_timeout_saturates() {
        assert_eq!(timeout_ns(Some(Duration::MAX)), u64::MAX);
    }
}
