use crate::election::Epoch;

/// Offset of a record in the replicated log.
pub type LogOffset = u64;

/// A log offset as tracked for the high watermark.
///
/// Richer position information (segment, file position) stays with the log
/// implementation; the quorum layer only orders offsets.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq, PartialOrd, Ord)]
#[derive(derive_more::Display)]
#[display(fmt = "{}", offset)]
pub struct LogOffsetMetadata {
    pub offset: LogOffset,
}

impl LogOffsetMetadata {
    pub fn new(offset: LogOffset) -> Self {
        Self { offset }
    }
}

/// End of the local log: the next offset to be written and the epoch of the
/// last written record.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq)]
#[derive(derive_more::Display)]
#[display(fmt = "(offset={}, epoch={})", offset, epoch)]
pub struct OffsetAndEpoch {
    pub offset: LogOffset,
    pub epoch: Epoch,
}

impl OffsetAndEpoch {
    pub fn new(offset: LogOffset, epoch: Epoch) -> Self {
        Self { offset, epoch }
    }
}
