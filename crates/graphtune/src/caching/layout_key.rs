//! Value identity of the buffers bound to one launch of a computation.

use std::{
    fmt, hash::{Hash, Hasher}
};

use rustc_hash::FxHasher;
use smallvec::SmallVec;

use crate::device::DeviceMemory;

/// One bound buffer: which allocation slot it fills and where it lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferSlice {
    pub allocation_index: u32,
    pub address: u64,
    pub size: u64,
}

/// Identity of a buffer layout, used as the graph cache key.
///
/// Owns plain copies of addresses and sizes, so it stays valid after the
/// buffers it was built from are released.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferLayoutKey {
    slices: SmallVec<[BufferSlice; 8]>,
}

impl BufferLayoutKey {
    /// Build a key from buffers in allocation order.
    pub fn from_buffers<I>(buffers: I) -> Self
    where
        I: IntoIterator<Item = DeviceMemory>,
    {
        let slices = buffers
            .into_iter()
            .zip(0u32..)
            .map(|(mem, allocation_index)| BufferSlice {
                allocation_index,
                address: mem.address,
                size: mem.size,
            })
            .collect();
        Self { slices }
    }

    /// Build a key from explicit slices, e.g. when some allocation slots are unused.
    pub fn from_slices(slices: impl IntoIterator<Item = BufferSlice>) -> Self {
        Self {
            slices: slices.into_iter().collect(),
        }
    }

    pub fn slices(&self) -> &[BufferSlice] {
        &self.slices
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Stable 64-bit digest used in statistics and metric events.
    pub fn hash64(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl fmt::Display for BufferLayoutKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layout[{} buffers, {:#018x}]", self.slices.len(), self.hash64())
    }
}
