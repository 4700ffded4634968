//! Ownership-tagged tracking of GPU objects.
//!
//! Every object the render core creates is recorded together with the
//! component that owns it and the objects it depends on. Teardown asks the
//! arena for everything a given owner holds and gets it back in a safe
//! destruction order: dependents before their dependencies, and otherwise
//! newest first.

use crate::backend::GpuObject;
use locus_core::{define_handle, Pool};

define_handle! {
    /// Handle to a tracked GPU object.
    pub struct ResourceHandle;
}

/// Component responsible for destroying a GPU object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    /// Lives until the graphics manager shuts down.
    Global,
    /// Lives as long as the render context (e.g. its surface).
    Context(u64),
    /// Rebuilt whenever the render context's surface changes size.
    SurfaceChain(u64),
    /// Belongs to one slot of a render context's frame ring.
    FrameSlot {
        /// Owning render context.
        context: u64,
        /// Ring index.
        slot: usize,
    },
}

impl Owner {
    /// Render context key this owner belongs to, if any.
    pub const fn context(self) -> Option<u64> {
        match self {
            Self::Global => None,
            Self::Context(key) | Self::SurfaceChain(key) | Self::FrameSlot { context: key, .. } => {
                Some(key)
            }
        }
    }
}

/// A tracked GPU object.
#[derive(Debug, Clone)]
pub struct ResourceRecord {
    /// The object itself.
    pub object: GpuObject,
    /// Who destroys it.
    pub owner: Owner,
    /// Objects that must outlive this one.
    pub dependencies: Vec<ResourceHandle>,
    sequence: u64,
}

/// Arena of GPU object records.
#[derive(Default)]
pub struct ResourceArena {
    records: Pool<ResourceRecord, ResourceHandle>,
    next_sequence: u64,
}

impl ResourceArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `object` under `owner`.
    ///
    /// # Panics
    /// Panics if a dependency handle is not live.
    pub fn register(
        &mut self,
        object: GpuObject,
        owner: Owner,
        dependencies: &[ResourceHandle],
    ) -> ResourceHandle {
        for &dependency in dependencies {
            assert!(
                self.records.is_valid(dependency),
                "{object:?} depends on untracked resource {dependency}"
            );
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.records.create(ResourceRecord {
            object,
            owner,
            dependencies: dependencies.to_vec(),
            sequence,
        })
    }

    /// Declare that `dependent` must be destroyed before `dependency`.
    ///
    /// # Panics
    /// Panics if either handle is not live.
    pub fn add_dependency(&mut self, dependent: ResourceHandle, dependency: ResourceHandle) {
        assert!(
            self.records.is_valid(dependency),
            "dependency {dependency} is not tracked"
        );
        let record = self.records.get_mut(dependent);
        if !record.dependencies.contains(&dependency) {
            record.dependencies.push(dependency);
        }
    }

    /// Look up a record.
    pub fn get(&self, handle: ResourceHandle) -> Option<&ResourceRecord> {
        self.records.try_get(handle)
    }

    /// Stop tracking a single object and hand it back for destruction.
    ///
    /// # Panics
    /// Panics if another live record still depends on it.
    pub fn remove(&mut self, handle: ResourceHandle) -> Option<GpuObject> {
        if let Some((dependent, _)) = self
            .records
            .iter()
            .find(|(_, record)| record.dependencies.contains(&handle))
        {
            panic!("cannot release resource {handle}: {dependent} still depends on it");
        }
        self.records.take(handle).map(|record| record.object)
    }

    /// Remove every object owned by `owner`, in destruction order.
    ///
    /// # Panics
    /// Panics if an object owned by someone else still depends on one of the
    /// released objects, or if the owner's objects form a dependency cycle.
    pub fn release(&mut self, owner: Owner) -> Vec<GpuObject> {
        let mut pending: Vec<(ResourceHandle, u64)> = self
            .records
            .iter()
            .filter(|(_, record)| record.owner == owner)
            .map(|(handle, record)| (handle, record.sequence))
            .collect();

        for (handle, record) in self.records.iter() {
            if record.owner == owner {
                continue;
            }
            if let Some(dependency) = record
                .dependencies
                .iter()
                .find(|dependency| pending.iter().any(|(h, _)| h == *dependency))
            {
                panic!(
                    "releasing {owner:?} would destroy {dependency} while {handle} ({:?}) still depends on it",
                    record.owner
                );
            }
        }

        // Newest first; a record is only emitted once nothing left depends on it.
        pending.sort_by(|a, b| b.1.cmp(&a.1));

        let mut order = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let next = pending.iter().position(|&(candidate, _)| {
                !pending.iter().any(|&(other, _)| {
                    other != candidate && self.records.get(other).dependencies.contains(&candidate)
                })
            });
            let Some(position) = next else {
                panic!("dependency cycle among resources owned by {owner:?}");
            };

            let (handle, _) = pending.remove(position);
            if let Some(record) = self.records.take(handle) {
                order.push(record.object);
            }
        }

        order
    }

    /// Number of tracked objects.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of tracked objects owned by `owner`.
    pub fn owned_by(&self, owner: Owner) -> usize {
        self.records
            .iter()
            .filter(|(_, record)| record.owner == owner)
            .count()
    }

    /// Iterate over tracked records.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceHandle, &ResourceRecord)> + '_ {
        self.records.iter()
    }
}
