//! Deferred destruction for multi-frame-in-flight rendering.
//!
//! When using multiple frames in flight, GPU resources cannot be freed the
//! moment the CPU stops needing them: a previously submitted frame may still
//! reference them. A [`DeletionQueue`] collects the destruction work and runs
//! it later, once the owner knows the GPU is done:
//!
//! - the global queue is flushed at shutdown after the device is idle;
//! - each frame slot's queue is flushed right after that slot's fence wait,
//!   so its entries are destroyed one full trip around the frame ring later.
//!
//! Actions run in reverse push order, so resources are torn down in the
//! opposite order to the one they were created in.

use std::fmt;

type Action<C> = Box<dyn FnOnce(&mut C)>;

/// LIFO list of deferred destruction actions.
///
/// Each action receives the flush context `C` (typically the GPU backend),
/// so actions never need to capture device handles themselves.
pub struct DeletionQueue<C: ?Sized> {
    actions: Vec<Action<C>>,
}

impl<C: ?Sized> DeletionQueue<C> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    /// Defer `action` until the next flush.
    pub fn push(&mut self, action: impl FnOnce(&mut C) + 'static) {
        self.actions.push(Box::new(action));
    }

    /// Number of pending actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether no action is pending.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Detach everything pushed so far.
    ///
    /// The queue is empty afterwards. Anything pushed while the returned
    /// batch runs lands in the queue again and waits for the next flush.
    pub fn take(&mut self) -> DeletionBatch<C> {
        DeletionBatch {
            actions: std::mem::take(&mut self.actions),
        }
    }

    /// Run all pending actions, most recently pushed first.
    pub fn flush(&mut self, ctx: &mut C) {
        self.take().run(ctx);
    }
}

impl<C: ?Sized> Default for DeletionQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> fmt::Debug for DeletionQueue<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeletionQueue")
            .field("pending", &self.actions.len())
            .finish()
    }
}

impl<C: ?Sized> Drop for DeletionQueue<C> {
    fn drop(&mut self) {
        if !self.actions.is_empty() {
            tracing::warn!(
                pending = self.actions.len(),
                "Deletion queue dropped without being flushed; resources leaked"
            );
        }
    }
}

/// Snapshot of a [`DeletionQueue`] taken at flush start.
#[must_use = "a deletion batch does nothing until it is run"]
pub struct DeletionBatch<C: ?Sized> {
    actions: Vec<Action<C>>,
}

impl<C: ?Sized> DeletionBatch<C> {
    /// Number of actions in the batch.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Execute the batch in reverse push order.
    pub fn run(self, ctx: &mut C) {
        for action in self.actions.into_iter().rev() {
            action(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn flush_runs_in_reverse_order() {
        let mut queue: DeletionQueue<Vec<&str>> = DeletionQueue::new();
        queue.push(|log| log.push("A"));
        queue.push(|log| log.push("B"));
        queue.push(|log| log.push("C"));

        let mut log = Vec::new();
        queue.flush(&mut log);

        assert_eq!(log, vec!["C", "B", "A"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn flush_empties_queue() {
        let mut queue: DeletionQueue<u32> = DeletionQueue::new();
        queue.push(|count| *count += 1);
        queue.push(|count| *count += 1);
        assert_eq!(queue.len(), 2);

        let mut count = 0;
        queue.flush(&mut count);
        queue.flush(&mut count);
        assert_eq!(count, 2);
    }

    #[test]
    fn pushes_during_flush_wait_for_next_flush() {
        let queue: Rc<RefCell<DeletionQueue<Vec<&str>>>> =
            Rc::new(RefCell::new(DeletionQueue::new()));

        let nested = Rc::clone(&queue);
        queue.borrow_mut().push(move |log| {
            log.push("outer");
            nested.borrow_mut().push(|log| log.push("nested"));
        });

        let mut log = Vec::new();
        let batch = queue.borrow_mut().take();
        batch.run(&mut log);
        assert_eq!(log, vec!["outer"]);
        assert_eq!(queue.borrow().len(), 1);

        let batch = queue.borrow_mut().take();
        batch.run(&mut log);
        assert_eq!(log, vec!["outer", "nested"]);
        assert!(queue.borrow().is_empty());
    }

    #[test]
    fn batch_reports_size() {
        let mut queue: DeletionQueue<()> = DeletionQueue::new();
        queue.push(|_| {});
        let batch = queue.take();
        assert_eq!(batch.len(), 1);
        assert!(queue.is_empty());
        batch.run(&mut ());
    }
}
