//! Offload coprocessor FIFO abstraction.
//!
//! Models a vector/DSP coprocessor as a queue of submitted jobs with a
//! `sync` barrier, generalizing a DMA channel's start/stop/is-complete shape
//! to an arbitrary job rather than a single fixed transfer. Two-tier
//! priority lets interactive (mixer) work preempt batch (preload,
//! compaction) work without a full scheduler.

/// A queue of decode/transform jobs dispatched to an offload coprocessor.
#[allow(async_fn_in_trait)]
pub trait OffloadQueue {
    /// Error type.
    type Error: core::fmt::Debug;

    /// Enqueue a job. Returns immediately; the job runs out-of-line.
    fn submit(&mut self, job: OffloadJob) -> Result<(), Self::Error>;

    /// Block until every job submitted so far has completed.
    ///
    /// Acts as a memory barrier: writes a submitted job made to its target
    /// buffer are guaranteed visible to the caller only after `sync`
    /// returns.
    async fn sync(&mut self) -> Result<(), Self::Error>;

    /// Begin a run of high-priority submissions (mixer-context decode).
    ///
    /// Jobs submitted between `begin_high_priority` and `end_high_priority`
    /// run ahead of any still-queued normal-priority (preload, compaction)
    /// jobs.
    fn begin_high_priority(&mut self);

    /// End a run of high-priority submissions started by
    /// [`begin_high_priority`](Self::begin_high_priority).
    fn end_high_priority(&mut self);
}

/// One unit of work submitted to an [`OffloadQueue`].
///
/// The core never inspects job contents; it only needs to know a job was
/// submitted so `sync` has something to drain. Concrete coprocessor
/// backends interpret `kind` and `target_ptr`/`len` to do real work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffloadJob {
    /// What kind of work this job performs.
    pub kind: OffloadJobKind,
    /// Physical address of the destination buffer the job writes into.
    pub target_ptr: usize,
    /// Length in bytes of the destination range.
    pub len: usize,
}

/// The kinds of work this core ever submits to an offload coprocessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffloadJobKind {
    /// VADPCM predictive decode of one chunk of frames.
    VadpcmDecode,
    /// Ring-buffer compaction memmove (see `wav64::SampleBuffer::append`).
    Compaction,
}

/// An [`OffloadQueue`] that executes every submitted job synchronously,
/// in-process, for use in tests where no real coprocessor exists.
///
/// `sync` is always a no-op since nothing was ever actually deferred.
#[derive(Debug, Default)]
pub struct ImmediateOffloadQueue {
    submitted: heapless::Vec<OffloadJob, 64>,
    high_priority_depth: u8,
}

impl ImmediateOffloadQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs submitted since the last `sync`, in submission order.
    pub fn submitted(&self) -> &[OffloadJob] {
        &self.submitted
    }
}

/// Error type for [`ImmediateOffloadQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmediateOffloadError {
    /// The fixed-capacity job log is full.
    QueueFull,
}

impl core::fmt::Display for ImmediateOffloadError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::QueueFull => f.write_str("offload job log is full"),
        }
    }
}

impl OffloadQueue for ImmediateOffloadQueue {
    type Error = ImmediateOffloadError;

    fn submit(&mut self, job: OffloadJob) -> Result<(), Self::Error> {
        self.submitted
            .push(job)
            .map_err(|_| ImmediateOffloadError::QueueFull)
    }

    async fn sync(&mut self) -> Result<(), Self::Error> {
        self.submitted.clear();
        Ok(())
    }

    fn begin_high_priority(&mut self) {
        self.high_priority_depth = self.high_priority_depth.saturating_add(1);
    }

    fn end_high_priority(&mut self) {
        self.high_priority_depth = self.high_priority_depth.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_records_job() {
        let mut q = ImmediateOffloadQueue::new();
        q.submit(OffloadJob {
            kind: OffloadJobKind::VadpcmDecode,
            target_ptr: 0x1000,
            len: 32,
        })
        .expect("submit should succeed with room in the queue");
        assert_eq!(q.submitted().len(), 1);
    }

    #[test]
    fn high_priority_nesting_is_saturating() {
        let mut q = ImmediateOffloadQueue::new();
        q.end_high_priority();
        assert_eq!(q.high_priority_depth, 0);
        q.begin_high_priority();
        q.begin_high_priority();
        assert_eq!(q.high_priority_depth, 2);
    }
}
