use thiserror::Error;

/// Failure to satisfy an allocation request.
///
/// `UnsupportedAlignment` and `InvalidAlignment` are configuration errors on
/// the caller's side; they are never retried. `OutOfMemory` and `Exhausted`
/// come from the backend and are passed through unchanged by adaptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The requested alignment is not a power of two.
    #[error("alignment {0} is not a power of two")]
    InvalidAlignment(usize),

    /// The requested alignment exceeds what the resource was configured for.
    #[error("alignment {alignment} exceeds the supported maximum of {max}")]
    UnsupportedAlignment { alignment: usize, max: usize },

    /// `bytes` rounded up to whole chunks does not fit in `usize`.
    #[error("{bytes} bytes at alignment {alignment} overflows the address space")]
    CapacityOverflow { bytes: usize, alignment: usize },

    /// The backing allocator could not provide the memory.
    #[error("out of memory allocating {bytes} bytes aligned to {alignment}")]
    OutOfMemory { bytes: usize, alignment: usize },

    /// The resource never hands out memory.
    #[error("memory resource is exhausted")]
    Exhausted,
}

/// Malformed `BYTES:ALIGN` probe request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeParseError {
    #[error("expected BYTES:ALIGN, got {0:?}")]
    MissingSeparator(String),

    #[error("invalid number {value:?} in probe request")]
    InvalidNumber { value: String },
}
