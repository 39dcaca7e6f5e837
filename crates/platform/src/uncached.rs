//! Uncached-memory marker traits for buffers shared with an offload coprocessor.
//!
//! A region implementing [`UncachedRegion`] guarantees that ordinary stores
//! through a `&mut` reference are visible to a DMA-capable coprocessor
//! without a cache writeback — the same discipline [`crate::dma_safety`]
//! encodes for specific STM32H743 SRAM banks, generalized here to any
//! backing store a sample-buffer-style ring might use (a real uncached SRAM
//! alias, or — in tests — ordinary heap memory that opts in because nothing
//! in a host test actually has a cache to desynchronize).

/// Marker trait: the memory backing this region is uncached from the CPU's
/// point of view, so writes are immediately visible to a DMA/offload reader.
///
/// # Safety
/// Only implement for types that back memory genuinely mapped through an
/// uncached view (or, in test builds, that have no concurrent DMA reader to
/// desynchronize from in the first place).
pub unsafe trait UncachedRegion: Sized {}

// SAFETY: AXI SRAM is already established as DMA-accessible uncached memory
// by `dma_safety::AxiSramRegion`; the same physical guarantee applies here.
unsafe impl UncachedRegion for crate::dma_safety::AxiSramRegion {}

// SAFETY: SRAM4 is BDMA-reachable per `dma_safety::Sram4Region`; uncached
// from the CPU's perspective for the same bus-matrix reasons.
unsafe impl UncachedRegion for crate::dma_safety::Sram4Region {}

/// Host-only region backed by ordinary heap memory.
///
/// There is no coprocessor to desynchronize from in a `std` test process, so
/// this region is safe to use as an `UncachedRegion` purely for exercising
/// the sample-buffer logic under test.
#[cfg(any(test, feature = "std"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapRegion;

// SAFETY: test-only stand-in; no real DMA coprocessor observes this memory.
#[cfg(any(test, feature = "std"))]
unsafe impl UncachedRegion for HeapRegion {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_region_is_uncached_region() {
        fn assert_uncached<T: UncachedRegion>() {}
        assert_uncached::<HeapRegion>();
    }
}
