//! Error types for the decode pipeline core.

use thiserror::Error;

/// Conditions that are legal per the H.264 spec but that this core does not
/// implement (§1 Non-goals). Each is reported individually so a caller can
/// tell interlaced content from a `frame_num` gap from a mid-stream
/// resolution change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnsupportedReason {
    #[error("field-coded picture (field != none) is not supported")]
    InterlacedNotSupported,

    #[error("frame_mbs_only_flag must be set")]
    FrameMbsOnlyNotSet,

    #[error("frame_num gap: prev_frame_num={prev} frame_num={curr}")]
    FrameNumGap { prev: i32, curr: i32 },

    #[error("resolution change without a full re-initialization is not supported")]
    HotResolutionChange,

    #[error("encrypted bitstreams are not supported")]
    Encryption,
}

/// Errors emitted by the decode pipeline core (spec §7).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecoderError {
    /// The decoded bits violate the accepted profile in a way the core
    /// cannot proceed from.
    #[error("invalid stream: {0}")]
    InvalidStream(String),

    /// Spec-legal but out-of-scope feature.
    #[error("unsupported stream: {0}")]
    UnsupportedStream(#[from] UnsupportedReason),

    /// `Dpb::store` was attempted with no eviction candidate available.
    #[error("DPB full: {context}")]
    DpbFull { context: String },

    /// The external `Codec` capability reported a driver-level failure.
    #[error("platform failure: {0}")]
    PlatformFailure(String),

    /// Soft error: the surface pool is exhausted. Always local to `decode`,
    /// never escalated to `notify_error`.
    #[error("out of surfaces")]
    NoSurfaces,

    /// A client contract violation (bad buffer id, undersized buffer, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl DecoderError {
    /// Whether this error is local to one `decode()` call (never moves the
    /// FSM to `error` and never fires `notify_error`), per §7 propagation
    /// rules.
    pub fn is_local(&self) -> bool {
        matches!(self, DecoderError::NoSurfaces)
    }
}

pub type Result<T> = std::result::Result<T, DecoderError>;
