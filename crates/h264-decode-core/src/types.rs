//! Small shared value types used across the decode pipeline.

use serde::{Deserialize, Serialize};

/// Field coding of a picture. The core only supports `None` (progressive,
/// `frame_mbs_only_flag == 1`); the other variants exist so a `Parser` can
/// report field pictures and have the core reject them with a typed error
/// (§4.3, §4.5, §9 design notes) instead of silently mis-tracking them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    None,
    Top,
    Bottom,
}

impl Field {
    pub fn is_progressive(self) -> bool {
        matches!(self, Field::None)
    }
}

impl Default for Field {
    fn default() -> Self {
        Field::None
    }
}

/// Opaque handle to a hardware decode/display surface, minted by the
/// client and returned by `assign_picture_buffers`. The core never
/// interprets its value, only threads it through the surface pool (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceHandle(pub u32);

/// Opaque id supplied by the client for each input bitstream buffer,
/// echoed back in `notify_end_of_bitstream_buffer` and every picture
/// emitted from it (GLOSSARY: Bitstream id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BitstreamId(pub u64);

/// A picture's visible cropping rectangle, forwarded verbatim to
/// `picture_ready` (§6). The core does not interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VisibleRect {
    pub width: u32,
    pub height: u32,
}

/// Reason a codec drain was requested, fed to the `Codec` wrapper instead
/// of inlining an ad-hoc boolean (§9 design notes: codec-reset
/// idempotency).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrainReason {
    Flush,
    Reset,
    Destroy,
}
