//! DMA-accessibility marker traits and the memory regions the audio core
//! is allowed to place sample-buffer storage in.
//!
//! ## Memory regions
//!
//! | Type | Trait | Description |
//! |------|-------|-------------|
//! | [`AxiSramRegion`] | `DmaAccessible` | D1 AXI SRAM — audio SAI, SDMMC |
//! | [`Sram4Region`] | `BdmaAccessible` | D3 SRAM4 — BDMA-only: SAI4, SPI6 |
//! | [`DtcmRegion`] | *(none)* | CPU-only DTCM — no DMA access |
//!
//! [`crate::uncached::UncachedRegion`] is implemented for the two
//! DMA-accessible regions above: both are physically uncached from the
//! CPU's point of view, which is the property the sample buffer actually
//! depends on (not DMA-accessibility itself, which is a stronger fact that
//! happens to imply it on this hardware).

/// Marker trait: memory region accessible by DMA1, DMA2, and MDMA.
///
/// # Safety
/// Only implement for zero-sized types representing memory regions that are
/// physically accessible by the STM32H743 DMA controllers. Incorrectly
/// implementing this trait for DTCM will cause silent DMA data corruption or
/// bus faults.
pub unsafe trait DmaAccessible: Sized {}

/// Marker trait: memory region accessible by BDMA (D3 domain) only.
///
/// # Safety
/// BDMA can only access D3 SRAM4 (0x3800_0000, 64 KB). DMA1/DMA2 cannot
/// access SRAM4 — mixing them causes bus faults. Only implement for
/// zero-sized types representing SRAM4.
pub unsafe trait BdmaAccessible: Sized {}

/// Zero-sized type representing AXI SRAM (DMA1/DMA2/MDMA accessible).
#[derive(Debug, Clone, Copy)]
pub struct AxiSramRegion;

// SAFETY: AXI SRAM at 0x2400_0000 is in D1 domain, accessible by all DMA
// controllers (DMA1, DMA2, MDMA) per the STM32H743 reference manual.
unsafe impl DmaAccessible for AxiSramRegion {}

/// Zero-sized type representing SRAM4 (BDMA-only, D3 domain, 0x3800_0000).
///
/// SRAM4 is in the D3 domain; only BDMA can access it. DMA1/DMA2 (D1/D2
/// domain) cannot reach it, so this type implements [`BdmaAccessible`] but
/// not [`DmaAccessible`] — mixing the two would be a silent bus fault.
#[derive(Debug, Clone, Copy)]
pub struct Sram4Region;

// SAFETY: SRAM4 at 0x3800_0000 (D3 domain) is accessible only by the BDMA
// controller per the STM32H743 reference manual bus matrix table.
unsafe impl BdmaAccessible for Sram4Region {}

/// Zero-sized type representing DTCM (CPU-only, NOT DMA-accessible).
///
/// Tightly coupled to the Cortex-M7 pipeline; never place DMA buffers here.
#[derive(Debug, Clone, Copy)]
pub struct DtcmRegion;
// DtcmRegion intentionally does NOT implement DmaAccessible or BdmaAccessible.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dtcm_region_is_not_dma_accessible() {
        let src = include_str!("dma_safety.rs");
        let violation = src
            .lines()
            .any(|l| l.trim_start().starts_with("unsafe impl DmaAccessible for DtcmRegion"));
        assert!(!violation, "DtcmRegion must not implement DmaAccessible");
    }

    #[test]
    fn sram4_is_bdma_only() {
        let src = include_str!("dma_safety.rs");
        assert!(!src.contains("unsafe impl DmaAccessible for Sram4Region"));
        assert!(src.contains("unsafe impl BdmaAccessible for Sram4Region"));
    }
}
