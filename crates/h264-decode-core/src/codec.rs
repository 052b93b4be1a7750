//! The `Codec` capability the core drives (spec §6): bit-exact
//! compatibility with a concrete hardware decode API is left to the
//! implementer, the core only sequences these calls per picture.

use tracing::debug;

use crate::error::Result;
use crate::parser::{Pps, Sps, SliceHeader};
use crate::types::{DrainReason, SurfaceHandle};

/// Picture-level parameters submitted once per picture, before its slices.
#[derive(Debug, Clone)]
pub struct PictureParameters {
    pub sps: Sps,
    pub pps: Pps,
    pub frame_num: i32,
    pub pic_order_cnt: i32,
}

/// Quantization-matrix submission, carried opaque: scaling-list parsing is
/// the `Parser` collaborator's responsibility (spec §1 Non-goals).
#[derive(Debug, Clone, Default)]
pub struct IqMatrixParameters {
    pub scaling_lists_4x4: Vec<[u8; 16]>,
    pub scaling_lists_8x8: Vec<[u8; 64]>,
}

/// Per-slice submission unit.
#[derive(Debug, Clone)]
pub struct SliceParameters {
    pub header: SliceHeader,
    pub ref_list0: Vec<Option<SurfaceHandle>>,
    pub ref_list1: Vec<Option<SurfaceHandle>>,
}

/// The external hardware-decode capability (spec §6).
pub trait Codec {
    fn submit_picture_parameters(&mut self, params: &PictureParameters) -> Result<()>;
    fn submit_iq_matrix(&mut self, params: &IqMatrixParameters) -> Result<()>;
    fn submit_slice_parameters(&mut self, params: &SliceParameters) -> Result<()>;
    fn submit_slice_data(&mut self, data: &[u8]) -> Result<()>;
    fn execute_for_surface(&mut self, surface: SurfaceHandle) -> Result<()>;

    /// Drains any in-flight submission for `reason`, then resets internal
    /// state. Called from `Reset`/`Destroy` (§5): must not block forever.
    fn reset(&mut self, reason: DrainReason) -> Result<()>;
    fn release(&mut self) -> Result<()>;
}

/// A `Codec` that performs no real hardware work, used by the CLI demo and
/// by unit tests that exercise the decoder driving logic without a real
/// accelerator. Mirrors the role a test double with no backend work plays
/// in the surrounding pack's codec test harnesses.
#[derive(Debug, Default)]
pub struct NullCodec {
    pub picture_submissions: u32,
    pub slice_submissions: u32,
    pub executions: Vec<SurfaceHandle>,
    pub reset_count: u32,
    pub released: bool,
}

impl Codec for NullCodec {
    fn submit_picture_parameters(&mut self, _params: &PictureParameters) -> Result<()> {
        self.picture_submissions += 1;
        Ok(())
    }

    fn submit_iq_matrix(&mut self, _params: &IqMatrixParameters) -> Result<()> {
        Ok(())
    }

    fn submit_slice_parameters(&mut self, _params: &SliceParameters) -> Result<()> {
        self.slice_submissions += 1;
        Ok(())
    }

    fn submit_slice_data(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn execute_for_surface(&mut self, surface: SurfaceHandle) -> Result<()> {
        self.executions.push(surface);
        Ok(())
    }

    fn reset(&mut self, reason: DrainReason) -> Result<()> {
        debug!(?reason, "NullCodec: reset");
        self.reset_count += 1;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.released = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_codec_counts_submissions() {
        let mut codec = NullCodec::default();
        let sps = crate::test_support::sample_sps();
        let pps = crate::test_support::sample_pps();
        codec
            .submit_picture_parameters(&PictureParameters { sps, pps, frame_num: 0, pic_order_cnt: 0 })
            .unwrap();
        codec.execute_for_surface(SurfaceHandle(0)).unwrap();
        assert_eq!(codec.picture_submissions, 1);
        assert_eq!(codec.executions, vec![SurfaceHandle(0)]);
    }

    #[test]
    fn null_codec_reset_is_idempotent() {
        let mut codec = NullCodec::default();
        codec.reset(DrainReason::Reset).unwrap();
        codec.reset(DrainReason::Reset).unwrap();
        assert_eq!(codec.reset_count, 2);
    }
}
