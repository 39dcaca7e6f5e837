//! Per-format codec implementations dispatched by [`crate::container::Wav64File`].
//!
//! One module per format code in the on-disk header (§6.1): [`raw`] (format
//! 0), [`vadpcm`] (format 1, always linked in), and [`opus`] (format 3,
//! behind the `opus` feature — see that module's doc comment for why).
//! [`huffman`] is VADPCM's residual-nibble prefix-code overlay, not a
//! top-level format of its own.

pub mod huffman;
#[cfg(feature = "opus")]
pub mod opus;
pub mod raw;
pub mod vadpcm;
