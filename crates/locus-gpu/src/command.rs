//! Command buffer management.

use crate::backend::RenderPassBegin;
use crate::error::Result;
use ash::vk;

/// Create a command pool whose buffers can be reset individually.
///
/// # Safety
/// The device must be valid and the queue family must exist.
pub unsafe fn create_command_pool(
    device: &ash::Device,
    queue_family: u32,
) -> Result<vk::CommandPool> {
    let create_info = vk::CommandPoolCreateInfo::default()
        .queue_family_index(queue_family)
        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

    let pool = unsafe { device.create_command_pool(&create_info, None)? };
    Ok(pool)
}

/// Allocate a single primary command buffer.
///
/// # Safety
/// The device and pool must be valid.
pub unsafe fn allocate_command_buffer(
    device: &ash::Device,
    pool: vk::CommandPool,
) -> Result<vk::CommandBuffer> {
    let alloc_info = vk::CommandBufferAllocateInfo::default()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);

    let buffers = unsafe { device.allocate_command_buffers(&alloc_info)? };
    Ok(buffers[0])
}

/// Reset a command buffer and begin one-time-submit recording.
///
/// # Safety
/// The device and command buffer must be valid and the buffer must not be in use.
pub unsafe fn begin_command_buffer(device: &ash::Device, cmd: vk::CommandBuffer) -> Result<()> {
    let begin_info =
        vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
    unsafe {
        device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
        device.begin_command_buffer(cmd, &begin_info)?;
    }
    Ok(())
}

/// End recording a command buffer.
///
/// # Safety
/// The device and command buffer must be valid.
pub unsafe fn end_command_buffer(device: &ash::Device, cmd: vk::CommandBuffer) -> Result<()> {
    unsafe { device.end_command_buffer(cmd)? };
    Ok(())
}

/// Begin an inline render pass that clears its single color attachment.
///
/// # Safety
/// The device, command buffer and every handle in `begin` must be valid.
pub unsafe fn cmd_begin_render_pass(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    begin: &RenderPassBegin,
) {
    let clear_values = [vk::ClearValue {
        color: vk::ClearColorValue {
            float32: begin.clear_color,
        },
    }];
    let begin_info = vk::RenderPassBeginInfo::default()
        .render_pass(begin.render_pass)
        .framebuffer(begin.framebuffer)
        .render_area(vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: begin.extent,
        })
        .clear_values(&clear_values);

    unsafe { device.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE) };
}

/// Submit command buffers to a queue.
///
/// # Safety
/// All handles must be valid.
#[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
pub unsafe fn submit_command_buffers(
    device: &ash::Device,
    queue: vk::Queue,
    command_buffers: &[vk::CommandBuffer],
    wait_semaphores: &[vk::Semaphore],
    wait_stages: &[vk::PipelineStageFlags],
    signal_semaphores: &[vk::Semaphore],
    fence: vk::Fence,
) -> Result<()> {
    let submit_info = vk::SubmitInfo::default()
        .command_buffers(command_buffers)
        .wait_semaphores(wait_semaphores)
        .wait_dst_stage_mask(wait_stages)
        .signal_semaphores(signal_semaphores);

    unsafe { device.queue_submit(queue, &[submit_info], fence)? };
    Ok(())
}
