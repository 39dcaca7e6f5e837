//! A no-op [`OffloadQueue`] for codecs that never actually hand work to a
//! coprocessor (raw PCM, and Opus-Custom's CELT decode which this crate
//! treats as a synchronous call into a caller-supplied [`CeltDecoder`]
//! rather than a real offloaded job — see `codec::opus`).
//!
//! `SampleBuffer::append`/`discard` are generic over any [`OffloadQueue`]
//! so compaction can drain outstanding work; codecs with no outstanding
//! work to drain pass this instead of threading a real queue through.

use platform::offload::OffloadQueue;

/// An [`OffloadQueue`] whose `sync` is always an immediate no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOffloadQueue;

impl OffloadQueue for NullOffloadQueue {
    type Error = core::convert::Infallible;

    fn submit(&mut self, _job: platform::offload::OffloadJob) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn sync(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn begin_high_priority(&mut self) {}
    fn end_high_priority(&mut self) {}
}
