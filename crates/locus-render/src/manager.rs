//! Frame orchestration across render contexts.
//!
//! Each render context cycles `Idle -> FrameInProgress -> Idle`. Only one
//! frame may be in progress across all contexts at a time; beginning a second
//! one, or ending a frame that is not the one in progress, is a caller bug
//! and panics.
//!
//! A frame slot is reused every `frames_in_flight` frames. Beginning a frame
//! first waits for the slot's fence, which the GPU signals when it finishes
//! the slot's previous submission. That wait caps how far the CPU can run
//! ahead, and it is also the point where the slot's deletion queue is
//! flushed: anything deferred while the slot was last recording is no longer
//! referenced by the GPU.

use crate::config::FrameConfig;
use crate::frame::FrameToken;
use crate::render_context::{window_extent, RenderContext, RenderContextHandle, SurfaceChain};
use locus_core::Pool;
use locus_gpu::{
    DeletionQueue, FrameSubmit, GpuBackend, GpuError, GpuObject, Owner, PresentWindow,
    RenderPassBegin, ResourceArena, ResourceHandle, Result,
};

/// Owns every render context and drives their frames.
pub struct GraphicsManager<B: GpuBackend> {
    backend: B,
    config: FrameConfig,
    contexts: Pool<RenderContext<B>, RenderContextHandle>,
    arena: ResourceArena,
    global_queue: DeletionQueue<B>,
    active: Option<RenderContextHandle>,
    next_context_key: u64,
    shutting_down: bool,
    shut_down: bool,
}

impl<B: GpuBackend> GraphicsManager<B> {
    /// Create a manager driving `backend`.
    ///
    /// # Panics
    /// Panics if `config.frames_in_flight` is zero.
    pub fn new(backend: B, config: FrameConfig) -> Self {
        assert!(
            config.frames_in_flight >= 1,
            "frames_in_flight must be at least 1"
        );
        tracing::info!(
            frames_in_flight = config.frames_in_flight,
            max_render_contexts = config.max_render_contexts,
            "Graphics manager created"
        );

        Self {
            backend,
            contexts: Pool::with_capacity(config.max_render_contexts),
            config,
            arena: ResourceArena::new(),
            global_queue: DeletionQueue::new(),
            active: None,
            next_context_key: 0,
            shutting_down: false,
            shut_down: false,
        }
    }

    /// Create a render context presenting to `window`.
    ///
    /// # Panics
    /// Panics if the render context limit is reached.
    pub fn create_render_context(&mut self, window: &B::Window) -> Result<RenderContextHandle> {
        if self.shutting_down {
            return Err(GpuError::ShuttingDown);
        }
        assert!(
            !self.contexts.is_full(),
            "render context capacity exceeded ({} contexts)",
            self.config.max_render_contexts
        );

        let key = self.next_context_key;
        self.next_context_key += 1;

        match RenderContext::create(
            &mut self.backend,
            &mut self.arena,
            &self.config,
            key,
            window,
        ) {
            Ok(context) => {
                let handle = self.contexts.create(context);
                tracing::info!(context = %handle, "Render context created");
                Ok(handle)
            }
            Err(e) => {
                tracing::error!("Render context creation failed: {e}");
                self.release_context_objects(key, self.config.frames_in_flight);
                Err(e)
            }
        }
    }

    /// Destroy a render context and every GPU object it owns.
    ///
    /// Waits for the device to go idle first. A stale handle is logged and
    /// ignored.
    ///
    /// # Panics
    /// Panics if `handle`'s frame is in progress.
    pub fn destroy_render_context(&mut self, handle: RenderContextHandle) -> Result<()> {
        assert!(
            self.active != Some(handle),
            "cannot destroy render context {handle} while its frame is in progress"
        );
        if !self.contexts.is_valid(handle) {
            tracing::warn!(context = %handle, "Attempted to destroy an invalid render context");
            return Ok(());
        }

        self.backend.wait_idle()?;
        if let Some(context) = self.contexts.take(handle) {
            self.teardown(context);
            tracing::info!(context = %handle, "Render context destroyed");
        }
        Ok(())
    }

    /// Begin recording a frame on `handle`.
    ///
    /// Blocks until the frame slot's previous submission has finished, then
    /// flushes the slot's deletion queue, acquires a swapchain image and
    /// opens a render pass that clears it.
    ///
    /// Returns [`GpuError::SurfaceOutOfDate`] when the surface no longer
    /// matches the image chain; the context stays idle and
    /// [`rebuild_surface_chain`](Self::rebuild_surface_chain) must run before
    /// the next attempt. Returns [`GpuError::Timeout`] when a configured wait
    /// bound expires.
    ///
    /// # Panics
    /// Panics if any frame is already in progress or `handle` is invalid.
    #[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
    pub fn begin_frame(&mut self, handle: RenderContextHandle) -> Result<FrameToken> {
        if self.shutting_down {
            return Err(GpuError::ShuttingDown);
        }
        if let Some(active) = self.active {
            panic!("frame already in progress on {active}; cannot begin a frame on {handle}");
        }
        assert!(
            self.contexts.is_valid(handle),
            "begin_frame on invalid render context {handle}"
        );

        let context = self.contexts.get_mut(handle);
        let Some(chain) = context.chain.as_ref() else {
            return Err(GpuError::SurfaceOutOfDate);
        };
        let slot = context.current_slot();
        let frame = &mut context.frames[slot];

        {
            let _span = tracing::trace_span!("fence_wait", context = %handle, slot).entered();
            self.backend
                .wait_for_fence(frame.in_flight, self.config.fence_timeout)?;
        }

        let batch = frame.deletion_queue.take();
        if !batch.is_empty() {
            tracing::debug!(
                context = %handle,
                slot,
                actions = batch.len(),
                "Flushing frame slot deletion queue"
            );
        }
        batch.run(&mut self.backend);

        // Reset only once an image is acquired.
        let acquired = {
            let _span = tracing::trace_span!("acquire", context = %handle).entered();
            match self.backend.acquire_next_image(
                chain.swapchain,
                frame.image_available,
                self.config.acquire_timeout,
            ) {
                Ok(acquired) => acquired,
                Err(GpuError::SurfaceOutOfDate) => {
                    tracing::debug!(context = %handle, "Surface out of date");
                    context.needs_rebuild = true;
                    return Err(GpuError::SurfaceOutOfDate);
                }
                Err(e) => return Err(e),
            }
        };
        if acquired.suboptimal {
            context.needs_rebuild = true;
        }

        let Some(&framebuffer) = chain.framebuffers.get(acquired.index as usize) else {
            return Err(GpuError::InvalidState(format!(
                "acquired image {} but the swapchain has {} images",
                acquired.index,
                chain.framebuffers.len()
            )));
        };

        let reset = self.backend.reset_fence(frame.in_flight);
        if let Err(e) = reset.and_then(|()| self.backend.begin_commands(frame.command_buffer)) {
            self.rearm_slot(handle, slot);
            return Err(e);
        }
        self.backend.begin_render_pass(
            frame.command_buffer,
            &RenderPassBegin {
                render_pass: chain.render_pass,
                framebuffer,
                extent: chain.extent,
                clear_color: context.clear_color,
            },
        );

        self.active = Some(handle);
        Ok(FrameToken {
            context: handle,
            slot,
            image_index: acquired.index,
            frame_number: context.frame_number,
            command_buffer: frame.command_buffer,
            extent: chain.extent,
            ended: false,
        })
    }

    /// Submit and present the frame `token` stands for.
    ///
    /// The manager is idle afterwards even if recording, submission or
    /// presentation fails. When nothing was submitted, the slot gets a fresh
    /// signaled fence so its next frame does not wait on work that never ran.
    ///
    /// # Panics
    /// Panics if `token` is not the frame in progress.
    #[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
    pub fn end_frame(&mut self, mut token: FrameToken) -> Result<()> {
        token.ended = true;
        let handle = token.context;
        match self.active {
            Some(active) if active == handle => {}
            Some(active) => panic!("end_frame for {handle} but the frame in progress is on {active}"),
            None => panic!("end_frame for {handle} without a frame in progress"),
        }
        self.active = None;

        let context = self.contexts.get_mut(handle);
        let frame = &context.frames[token.slot];
        let Some(chain) = context.chain.as_ref() else {
            return Err(GpuError::InvalidState(format!(
                "render context {handle} lost its surface chain mid-frame"
            )));
        };

        self.backend.end_render_pass(frame.command_buffer);
        let submitted = self.backend.end_commands(frame.command_buffer).and_then(|()| {
            let _span = tracing::trace_span!("submit", context = %handle).entered();
            self.backend.submit(&FrameSubmit {
                command_buffer: frame.command_buffer,
                wait: frame.image_available,
                signal: frame.render_finished,
                fence: frame.in_flight,
            })
        });
        if let Err(e) = submitted {
            self.rearm_slot(handle, token.slot);
            return Err(e);
        }
        context.frame_number += 1;

        let rebuild = {
            let _span = tracing::trace_span!("present", context = %handle).entered();
            self.backend
                .present(chain.swapchain, token.image_index, frame.render_finished)?
        };
        if rebuild {
            context.needs_rebuild = true;
        }
        Ok(())
    }

    /// Recreate the swapchain, views, render pass and framebuffers of
    /// `handle` for `window`'s current size. The handle stays the same.
    ///
    /// Does nothing while the window has a zero-sized framebuffer
    /// (e.g. minimized).
    ///
    /// # Panics
    /// Panics if `handle` is invalid or its frame is in progress.
    #[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
    pub fn rebuild_surface_chain(
        &mut self,
        handle: RenderContextHandle,
        window: &B::Window,
    ) -> Result<()> {
        assert!(
            self.active != Some(handle),
            "cannot rebuild the surface of {handle} while its frame is in progress"
        );
        assert!(
            self.contexts.is_valid(handle),
            "rebuild_surface_chain on invalid render context {handle}"
        );

        let (width, height) = window.framebuffer_size();
        if width == 0 || height == 0 {
            tracing::debug!(context = %handle, "Skipping surface rebuild for zero-sized window");
            return Ok(());
        }

        self.backend.wait_idle()?;

        let context = self.contexts.get_mut(handle);
        context.chain = None;
        context.needs_rebuild = true;
        for object in self.arena.release(Owner::SurfaceChain(context.key)) {
            self.backend.destroy(object);
        }

        match SurfaceChain::build(
            &mut self.backend,
            &mut self.arena,
            context.key,
            (context.surface, context.surface_record),
            window_extent(window),
            self.config.vsync,
        ) {
            Ok(chain) => {
                context.chain = Some(chain);
                context.needs_rebuild = false;
                Ok(())
            }
            Err(e) => {
                for object in self.arena.release(Owner::SurfaceChain(context.key)) {
                    self.backend.destroy(object);
                }
                Err(e)
            }
        }
    }

    /// Clear `handle`'s frames to `color` instead of the configured color.
    ///
    /// # Panics
    /// Panics if `handle` is invalid.
    pub fn set_clear_color(&mut self, handle: RenderContextHandle, color: [f32; 4]) {
        self.contexts.get_mut(handle).clear_color = color;
    }

    /// Whether `handle`'s surface reported it should be rebuilt.
    pub fn needs_rebuild(&self, handle: RenderContextHandle) -> bool {
        self.contexts
            .try_get(handle)
            .is_some_and(|context| context.needs_rebuild)
    }

    /// Run `action` once the GPU has finished the frame `token` stands for.
    ///
    /// # Panics
    /// Panics if `token` is not the frame in progress.
    pub fn defer(&mut self, token: &FrameToken, action: impl FnOnce(&mut B) + 'static) {
        assert!(
            self.active == Some(token.context),
            "defer with a token for {} that is not the frame in progress",
            token.context
        );
        self.contexts.get_mut(token.context).frames[token.slot]
            .deletion_queue
            .push(action);
    }

    /// Destroy `object` once the GPU has finished the frame `token` stands for.
    pub fn defer_destroy(&mut self, token: &FrameToken, object: GpuObject) {
        self.defer(token, move |backend| backend.destroy(object));
    }

    /// Run `action` when the render context `handle` is destroyed.
    ///
    /// # Panics
    /// Panics if `handle` is invalid.
    pub fn defer_context(
        &mut self,
        handle: RenderContextHandle,
        action: impl FnOnce(&mut B) + 'static,
    ) {
        assert!(
            self.contexts.is_valid(handle),
            "defer_context on invalid render context {handle}"
        );
        self.contexts.get_mut(handle).deletion_queue.push(action);
    }

    /// Run `action` at shutdown, after every render context is gone.
    pub fn defer_global(&mut self, action: impl FnOnce(&mut B) + 'static) {
        self.global_queue.push(action);
    }

    /// Take ownership of an object created directly on the backend. It is
    /// destroyed at shutdown unless [`retire`](Self::retire)d earlier.
    pub fn adopt_global(
        &mut self,
        object: GpuObject,
        dependencies: &[ResourceHandle],
    ) -> ResourceHandle {
        self.arena.register(object, Owner::Global, dependencies)
    }

    /// Stop tracking an adopted object and destroy it once the GPU has
    /// finished the frame `token` stands for. A stale handle is ignored.
    pub fn retire(&mut self, token: &FrameToken, handle: ResourceHandle) {
        match self.arena.remove(handle) {
            Some(object) => self.defer_destroy(token, object),
            None => tracing::warn!(resource = %handle, "Attempted to retire an untracked resource"),
        }
    }

    /// Render context whose frame is in progress.
    pub const fn active_render_context(&self) -> Option<RenderContextHandle> {
        self.active
    }

    /// Number of frames ended on `handle`, or `None` for a stale handle.
    pub fn frame_number(&self, handle: RenderContextHandle) -> Option<u64> {
        self.contexts.try_get(handle).map(|context| context.frame_number)
    }

    /// Frame slots per render context.
    pub const fn frames_in_flight(&self) -> usize {
        self.config.frames_in_flight
    }

    /// Live render context handles.
    pub fn render_contexts(&self) -> impl Iterator<Item = RenderContextHandle> + '_ {
        self.contexts.handles()
    }

    /// Look up a render context.
    pub fn render_context(&self, handle: RenderContextHandle) -> Option<&RenderContext<B>> {
        self.contexts.try_get(handle)
    }

    /// Whether `handle` refers to a live render context.
    pub fn is_valid(&self, handle: RenderContextHandle) -> bool {
        self.contexts.is_valid(handle)
    }

    /// Active configuration.
    pub const fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Tracked GPU objects.
    pub const fn arena(&self) -> &ResourceArena {
        &self.arena
    }

    /// The GPU backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// The GPU backend, mutably.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Whether [`shutdown`](Self::shutdown) has started.
    pub const fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Destroy every render context and every global object.
    ///
    /// New frames and render contexts are refused from the moment this is
    /// called. Calling it again after it succeeded does nothing.
    ///
    /// # Panics
    /// Panics if a frame is in progress.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        if let Some(active) = self.active {
            panic!("shutdown while the frame on {active} is in progress");
        }
        self.shutting_down = true;

        self.backend.wait_idle()?;

        let handles: Vec<_> = self.contexts.handles().collect();
        for handle in handles {
            if let Some(context) = self.contexts.take(handle) {
                self.teardown(context);
                tracing::info!(context = %handle, "Render context destroyed");
            }
        }

        if let Some((handle, record)) = self
            .arena
            .iter()
            .find(|(_, record)| record.owner != Owner::Global)
        {
            panic!(
                "{:?} ({handle}) owned by {:?} outlived every render context",
                record.object, record.owner
            );
        }

        self.global_queue.flush(&mut self.backend);
        for object in self.arena.release(Owner::Global) {
            self.backend.destroy(object);
        }

        self.shut_down = true;
        tracing::info!("Graphics manager shut down");
        Ok(())
    }

    /// Swap the fence of `handle`'s `slot` for a signaled one after a frame
    /// failed between resetting the fence and submitting.
    fn rearm_slot(&mut self, handle: RenderContextHandle, slot: usize) {
        let context = self.contexts.get_mut(handle);
        let owner = Owner::FrameSlot {
            context: context.key,
            slot,
        };
        let frame = &mut context.frames[slot];

        let fence = match self.backend.create_fence(true) {
            Ok(fence) => fence,
            Err(e) => {
                tracing::error!(context = %handle, slot, "Failed to re-arm frame slot: {e}");
                return;
            }
        };
        if let Some(stale) = self.arena.remove(frame.fence_record) {
            self.backend.destroy(stale);
        }
        frame.fence_record = self.arena.register(GpuObject::Fence(fence), owner, &[]);
        frame.in_flight = fence;
        tracing::warn!(context = %handle, slot, "Frame slot re-armed after a failed frame");
    }

    /// Distinct owners of the objects still tracked.
    fn leaked_owners(&self) -> Vec<Owner> {
        let mut owners = Vec::new();
        for (_, record) in self.arena.iter() {
            if !owners.contains(&record.owner) {
                owners.push(record.owner);
            }
        }
        owners
    }

    /// Flush a context's queues and destroy everything it owns.
    fn teardown(&mut self, mut context: RenderContext<B>) {
        for frame in &mut context.frames {
            frame.deletion_queue.flush(&mut self.backend);
        }
        context.deletion_queue.flush(&mut self.backend);
        self.release_context_objects(context.key, context.frames.len());
    }

    /// Destroy the objects of context `key`: frame slots newest first, then
    /// the surface chain, then the surface.
    fn release_context_objects(&mut self, key: u64, slots: usize) {
        let owners = (0..slots)
            .rev()
            .map(|slot| Owner::FrameSlot { context: key, slot })
            .chain([Owner::SurfaceChain(key), Owner::Context(key)]);

        for owner in owners {
            for object in self.arena.release(owner) {
                self.backend.destroy(object);
            }
        }
    }
}

impl<B: GpuBackend> Drop for GraphicsManager<B> {
    fn drop(&mut self) {
        if self.shut_down {
            return;
        }
        if self.active.is_some() || std::thread::panicking() {
            tracing::error!(
                active = ?self.active,
                leaked = self.arena.len(),
                owners = ?self.leaked_owners(),
                "Graphics manager dropped without shutting down; GPU objects leaked"
            );
            return;
        }
        if let Err(e) = self.shutdown() {
            tracing::error!("Graphics manager shutdown failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;
    use locus_test::{EventLog, GpuEvent, MockBackend, MockWindow};
    use std::time::Duration;

    fn manager(backend: MockBackend) -> GraphicsManager<MockBackend> {
        GraphicsManager::new(backend, FrameConfig::default())
    }

    fn run_frame(manager: &mut GraphicsManager<MockBackend>, handle: RenderContextHandle) {
        let token = manager.begin_frame(handle).unwrap();
        manager.end_frame(token).unwrap();
    }

    fn submitted_fences(log: &EventLog) -> Vec<vk::Fence> {
        log.snapshot()
            .into_iter()
            .filter_map(|event| match event {
                GpuEvent::Submitted { fence, .. } => Some(fence),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn third_frame_waits_for_first_and_flushes_once() {
        let mut manager = manager(MockBackend::new().with_image_count(2));
        let log = manager.backend().log();
        let window = MockWindow::default();
        let ctx = manager.create_render_context(&window).unwrap();

        let first = manager.begin_frame(ctx).unwrap();
        assert_eq!(first.slot(), 0);
        manager.defer(&first, |backend| backend.log().mark("slot0"));
        manager.end_frame(first).unwrap();

        run_frame(&mut manager, ctx);
        assert_eq!(manager.backend().pending_submissions(), 2);
        assert_eq!(log.markers("slot0"), 0);

        let fences = submitted_fences(&log);
        let first_fence = fences[0];
        assert_ne!(first_fence, fences[1]);
        assert!(!manager.backend().is_signaled(first_fence));

        let third = manager.begin_frame(ctx).unwrap();
        assert_eq!(third.slot(), 0);

        let events = log.snapshot();
        let completed = log.position(GpuEvent::GpuCompleted(first_fence)).unwrap();
        let returned = completed
            + events[completed..]
                .iter()
                .position(|e| *e == GpuEvent::FenceWaitReturned(first_fence))
                .unwrap();
        let flushed = log.position(GpuEvent::Marker("slot0")).unwrap();
        let third_acquire = events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, GpuEvent::Acquired { .. }))
            .map(|(i, _)| i)
            .nth(2)
            .unwrap();
        assert!(returned < flushed);
        assert!(flushed < third_acquire);
        // Frame two is still running on the GPU.
        assert_eq!(manager.backend().pending_submissions(), 1);

        manager.end_frame(third).unwrap();
        run_frame(&mut manager, ctx);
        run_frame(&mut manager, ctx);
        assert_eq!(log.markers("slot0"), 1);
        assert_eq!(manager.frame_number(ctx), Some(5));
    }

    #[test]
    fn slot_fence_reset_only_after_wait() {
        let mut manager = manager(MockBackend::new());
        let log = manager.backend().log();
        let window = MockWindow::default();
        let ctx = manager.create_render_context(&window).unwrap();

        run_frame(&mut manager, ctx);
        let fence = submitted_fences(&log)[0];
        let reset = log.position(GpuEvent::FenceReset(fence)).unwrap();
        let waited = log.position(GpuEvent::FenceWaitReturned(fence)).unwrap();
        let submitted = log
            .find(|e| matches!(e, GpuEvent::Submitted { .. }))
            .unwrap();
        assert!(waited < reset);
        assert!(reset < submitted);
    }

    #[test]
    #[should_panic(expected = "frame already in progress")]
    fn second_begin_panics() {
        let mut manager = manager(MockBackend::new());
        let a_window = MockWindow::default();
        let b_window = MockWindow::default();
        let a = manager.create_render_context(&a_window).unwrap();
        let b = manager.create_render_context(&b_window).unwrap();

        let _token = manager.begin_frame(a).unwrap();
        let _ = manager.begin_frame(b);
    }

    #[test]
    #[should_panic(expected = "without a frame in progress")]
    fn end_frame_on_wrong_manager_panics() {
        let mut first = manager(MockBackend::new());
        let mut second = manager(MockBackend::new());
        let window = MockWindow::default();
        let ctx = first.create_render_context(&window).unwrap();
        second.create_render_context(&window).unwrap();

        let token = first.begin_frame(ctx).unwrap();
        let _ = second.end_frame(token);
    }

    #[test]
    fn contexts_take_turns() {
        let mut manager = manager(MockBackend::new());
        let a_window = MockWindow::default();
        let b_window = MockWindow::new(1280, 720);
        let a = manager.create_render_context(&a_window).unwrap();
        let b = manager.create_render_context(&b_window).unwrap();

        for _ in 0..3 {
            let token = manager.begin_frame(a).unwrap();
            assert_eq!(manager.active_render_context(), Some(a));
            manager.end_frame(token).unwrap();

            let token = manager.begin_frame(b).unwrap();
            assert_eq!(token.extent().width, 1280);
            manager.end_frame(token).unwrap();
        }
        assert_eq!(manager.active_render_context(), None);
        assert_eq!(manager.frame_number(a), Some(3));
        assert_eq!(manager.frame_number(b), Some(3));
        assert_eq!(manager.render_contexts().count(), 2);
    }

    #[test]
    #[should_panic(expected = "while its frame is in progress")]
    fn destroy_mid_frame_panics() {
        let mut manager = manager(MockBackend::new());
        let window = MockWindow::default();
        let ctx = manager.create_render_context(&window).unwrap();
        let _token = manager.begin_frame(ctx).unwrap();
        let _ = manager.destroy_render_context(ctx);
    }

    #[test]
    fn out_of_date_surface_is_recoverable() {
        let mut manager = manager(MockBackend::new());
        let log = manager.backend().log();
        let window = MockWindow::default();
        let ctx = manager.create_render_context(&window).unwrap();
        run_frame(&mut manager, ctx);

        manager.backend_mut().invalidate_surfaces();
        window.resize(1024, 768);
        log.clear();

        assert!(matches!(
            manager.begin_frame(ctx),
            Err(GpuError::SurfaceOutOfDate)
        ));
        assert_eq!(manager.active_render_context(), None);
        assert!(manager.needs_rebuild(ctx));
        assert_eq!(log.count(|e| matches!(e, GpuEvent::FenceReset(_))), 0);

        manager.rebuild_surface_chain(ctx, &window).unwrap();
        assert!(!manager.needs_rebuild(ctx));
        assert_eq!(
            log.count(|e| matches!(e, GpuEvent::Destroyed(GpuObject::Swapchain(_)))),
            1
        );
        assert_eq!(
            log.count(|e| matches!(e, GpuEvent::Destroyed(GpuObject::Surface(_)))),
            0
        );

        let token = manager.begin_frame(ctx).unwrap();
        assert_eq!(token.context(), ctx);
        assert_eq!(
            token.extent(),
            vk::Extent2D {
                width: 1024,
                height: 768
            }
        );
        manager.end_frame(token).unwrap();
    }

    #[test]
    fn zero_sized_window_skips_rebuild() {
        let mut manager = manager(MockBackend::new());
        let log = manager.backend().log();
        let window = MockWindow::default();
        let ctx = manager.create_render_context(&window).unwrap();

        window.resize(0, 600);
        log.clear();
        manager.rebuild_surface_chain(ctx, &window).unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn failed_rebuild_reports_out_of_date_until_retried() {
        let mut manager = manager(MockBackend::new());
        let window = MockWindow::default();
        let ctx = manager.create_render_context(&window).unwrap();
        let live = manager.backend().live_objects();

        manager.backend_mut().fail_swapchain_creation(true);
        assert!(manager.rebuild_surface_chain(ctx, &window).is_err());
        assert!(manager.needs_rebuild(ctx));
        assert!(matches!(
            manager.begin_frame(ctx),
            Err(GpuError::SurfaceOutOfDate)
        ));

        manager.backend_mut().fail_swapchain_creation(false);
        manager.rebuild_surface_chain(ctx, &window).unwrap();
        assert_eq!(manager.backend().live_objects(), live);
        run_frame(&mut manager, ctx);
    }

    #[test]
    fn clear_color_is_per_context() {
        let config = FrameConfig::default().with_clear_color([0.0, 0.0, 1.0, 1.0]);
        let mut manager = GraphicsManager::new(MockBackend::new(), config);
        let window = MockWindow::default();
        let a = manager.create_render_context(&window).unwrap();
        let b = manager.create_render_context(&window).unwrap();

        manager.set_clear_color(b, [1.0, 0.0, 0.0, 1.0]);
        let color = |h| manager.render_context(h).unwrap().clear_color();
        assert_eq!(color(a), [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(color(b), [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn suboptimal_present_requests_rebuild() {
        let mut manager = manager(MockBackend::new());
        let window = MockWindow::default();
        let ctx = manager.create_render_context(&window).unwrap();
        assert!(!manager.needs_rebuild(ctx));

        manager.backend_mut().set_suboptimal(true);
        run_frame(&mut manager, ctx);
        assert!(manager.needs_rebuild(ctx));
    }

    #[test]
    fn stalled_gpu_times_out() {
        let config = FrameConfig::default().with_fence_timeout(Duration::from_millis(5));
        let mut manager = GraphicsManager::new(MockBackend::new(), config);
        let window = MockWindow::default();
        let ctx = manager.create_render_context(&window).unwrap();
        run_frame(&mut manager, ctx);
        run_frame(&mut manager, ctx);

        manager.backend_mut().stall();
        assert!(matches!(manager.begin_frame(ctx), Err(GpuError::Timeout)));
        assert_eq!(manager.active_render_context(), None);

        manager.backend_mut().resume();
        run_frame(&mut manager, ctx);
    }

    #[test]
    fn destroy_releases_in_reverse_creation_order() {
        let mut manager = manager(MockBackend::new());
        let log = manager.backend().log();
        let window = MockWindow::default();
        let ctx = manager.create_render_context(&window).unwrap();
        run_frame(&mut manager, ctx);
        manager.defer_context(ctx, |backend| backend.log().mark("context queue"));

        manager.destroy_render_context(ctx).unwrap();
        assert!(!manager.is_valid(ctx));
        assert_eq!(manager.backend().live_objects(), 0);
        assert!(manager.arena().is_empty());

        let marker = log.position(GpuEvent::Marker("context queue")).unwrap();
        let first_destroy = log
            .find(|e| matches!(e, GpuEvent::Destroyed(_)))
            .unwrap();
        assert!(log.position(GpuEvent::WaitIdle).unwrap() < marker);
        assert!(marker < first_destroy);

        let destroyed = log.destroyed();
        let last_fence = destroyed
            .iter()
            .rposition(|o| matches!(o, GpuObject::Fence(_)))
            .unwrap();
        let swapchain = destroyed
            .iter()
            .position(|o| matches!(o, GpuObject::Swapchain(_)))
            .unwrap();
        let last_view = destroyed
            .iter()
            .rposition(|o| matches!(o, GpuObject::ImageView(_)))
            .unwrap();
        assert!(last_fence < swapchain);
        assert!(last_view < swapchain);
        assert!(matches!(destroyed.last(), Some(GpuObject::Surface(_))));
    }

    #[test]
    fn destroying_stale_handle_is_noop() {
        let mut manager = manager(MockBackend::new());
        let window = MockWindow::default();
        let ctx = manager.create_render_context(&window).unwrap();
        manager.destroy_render_context(ctx).unwrap();

        let log = manager.backend().log();
        log.clear();
        manager.destroy_render_context(ctx).unwrap();
        assert!(log.is_empty());

        let reused = manager.create_render_context(&window).unwrap();
        assert_eq!(reused.index(), ctx.index());
        assert_eq!(reused.generation(), ctx.generation() + 1);
        assert_eq!(manager.frame_number(ctx), None);
    }

    #[test]
    fn failed_creation_leaks_nothing() {
        let mut backend = MockBackend::new();
        backend.fail_swapchain_creation(true);
        let mut manager = manager(backend);
        let window = MockWindow::default();

        assert!(manager.create_render_context(&window).is_err());
        assert_eq!(manager.backend().live_objects(), 0);
        assert!(manager.arena().is_empty());
        assert_eq!(manager.render_contexts().count(), 0);
    }

    #[test]
    #[should_panic(expected = "render context capacity exceeded")]
    fn context_limit_enforced() {
        let config = FrameConfig::default().with_max_render_contexts(1);
        let mut manager = GraphicsManager::new(MockBackend::new(), config);
        let window = MockWindow::default();
        manager.create_render_context(&window).unwrap();
        let _ = manager.create_render_context(&window);
    }

    #[test]
    fn retired_object_outlives_its_frame() {
        let mut manager = manager(MockBackend::new());
        let window = MockWindow::default();
        let ctx = manager.create_render_context(&window).unwrap();

        let pipeline = GpuObject::Pipeline(manager.backend_mut().create_pipeline());
        let handle = manager.adopt_global(pipeline, &[]);

        let token = manager.begin_frame(ctx).unwrap();
        manager.retire(&token, handle);
        manager.end_frame(token).unwrap();

        run_frame(&mut manager, ctx);
        assert!(manager.backend().is_live(pipeline));

        // Slot 0 comes around again after its first submission completed.
        run_frame(&mut manager, ctx);
        assert!(!manager.backend().is_live(pipeline));
        assert!(manager.arena().get(handle).is_none());
    }

    #[test]
    fn shutdown_destroys_everything() {
        let mut manager = manager(MockBackend::new());
        let log = manager.backend().log();
        let a_window = MockWindow::default();
        let b_window = MockWindow::default();
        let a = manager.create_render_context(&a_window).unwrap();
        manager.create_render_context(&b_window).unwrap();
        run_frame(&mut manager, a);

        let pipeline = GpuObject::Pipeline(manager.backend_mut().create_pipeline());
        manager.adopt_global(pipeline, &[]);
        manager.defer_global(|backend| backend.log().mark("global"));

        manager.shutdown().unwrap();
        assert_eq!(manager.backend().live_objects(), 0);
        assert_eq!(manager.render_contexts().count(), 0);
        assert_eq!(log.markers("global"), 1);
        assert_eq!(log.destroyed().last(), Some(&pipeline));

        assert!(matches!(manager.begin_frame(a), Err(GpuError::ShuttingDown)));
        assert!(matches!(
            manager.create_render_context(&a_window),
            Err(GpuError::ShuttingDown)
        ));

        // Idempotent.
        log.clear();
        manager.shutdown().unwrap();
        assert!(log.is_empty());
    }

    fn slot_fence(
        manager: &GraphicsManager<MockBackend>,
        ctx: RenderContextHandle,
        slot: usize,
    ) -> vk::Fence {
        manager.render_context(ctx).unwrap().frames()[slot].fence()
    }

    /// Fail one frame on slot 0, then run frames until slot 0 is reused.
    fn assert_slot_recovers(fail: fn(&mut MockBackend, bool), fails_in_begin: bool) {
        let mut manager = manager(MockBackend::new());
        let window = MockWindow::default();
        let ctx = manager.create_render_context(&window).unwrap();
        let live = manager.backend().live_objects();
        let tracked = manager.arena().len();
        let old_fence = slot_fence(&manager, ctx, 0);

        fail(manager.backend_mut(), true);
        let result = if fails_in_begin {
            manager.begin_frame(ctx).map(drop)
        } else {
            let token = manager.begin_frame(ctx).unwrap();
            manager.end_frame(token)
        };
        assert!(matches!(
            result,
            Err(GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST))
        ));
        assert!(!result.unwrap_err().is_recoverable());
        assert_eq!(manager.active_render_context(), None);
        assert_eq!(manager.frame_number(ctx), Some(0));

        let new_fence = slot_fence(&manager, ctx, 0);
        assert_ne!(new_fence, old_fence);
        assert!(manager.backend().is_signaled(new_fence));
        assert!(!manager.backend().is_live(GpuObject::Fence(old_fence)));
        assert_eq!(manager.backend().live_objects(), live);
        assert_eq!(manager.arena().len(), tracked);

        // The failed frame did not advance the ring, so slot 0 is waited on next.
        fail(manager.backend_mut(), false);
        for _ in 0..=manager.frames_in_flight() {
            run_frame(&mut manager, ctx);
        }
        manager.shutdown().unwrap();
        assert_eq!(manager.backend().live_objects(), 0);
    }

    #[test]
    fn submit_failure_does_not_wedge_slot() {
        assert_slot_recovers(MockBackend::fail_submit, false);
    }

    #[test]
    fn end_commands_failure_does_not_wedge_slot() {
        assert_slot_recovers(MockBackend::fail_end_commands, false);
    }

    #[test]
    fn begin_commands_failure_does_not_wedge_slot() {
        assert_slot_recovers(MockBackend::fail_begin_commands, true);
    }

    #[test]
    fn drop_mid_frame_reports_leaked_owners() {
        let backend = MockBackend::new();
        let log = backend.log();
        let mut manager = manager(backend);
        let window = MockWindow::default();
        let ctx = manager.create_render_context(&window).unwrap();
        let pipeline = GpuObject::Pipeline(manager.backend_mut().create_pipeline());
        manager.adopt_global(pipeline, &[]);

        let owners = manager.leaked_owners();
        assert!(owners.contains(&Owner::Context(0)));
        assert!(owners.contains(&Owner::SurfaceChain(0)));
        assert!(owners.contains(&Owner::FrameSlot { context: 0, slot: 1 }));
        assert!(owners.contains(&Owner::Global));
        assert_eq!(owners.iter().filter(|&&o| o == Owner::Global).count(), 1);

        let token = manager.begin_frame(ctx).unwrap();
        log.clear();
        drop(manager);
        drop(token);
        assert_eq!(log.count(|e| matches!(e, GpuEvent::Destroyed(_))), 0);
    }

    #[test]
    fn drop_shuts_down() {
        let backend = MockBackend::new();
        let log = backend.log();
        {
            let mut manager = manager(backend);
            let window = MockWindow::default();
            let ctx = manager.create_render_context(&window).unwrap();
            run_frame(&mut manager, ctx);
        }
        assert!(log.position(GpuEvent::WaitIdle).is_some());
        assert!(log
            .destroyed()
            .iter()
            .any(|o| matches!(o, GpuObject::Surface(_))));
        assert_eq!(
            log.count(|e| matches!(e, GpuEvent::Created(_))),
            log.count(|e| matches!(e, GpuEvent::Destroyed(_)))
        );
    }
}
