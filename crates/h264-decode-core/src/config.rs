//! Decoder configuration: the fields the spec (§3) says are immutable while
//! `state == decoding`, derived once per active SPS.

use serde::{Deserialize, Serialize};

use crate::error::{DecoderError, Result};
use crate::parser::Sps;

/// Profiles for which the profile/constraint-flag fallback of §4.6 yields a
/// reorder window of zero when no VUI bitstream-restriction is present.
const ZERO_REORDER_PROFILES: [u8; 6] = [44, 86, 100, 110, 122, 244];

/// Immutable-while-decoding decoder configuration (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    pub sps_id: u8,
    pub pps_id: u8,

    pub max_pic_order_cnt_lsb: i32,
    pub max_frame_num: i32,
    pub max_pic_num: i32,
    pub max_long_term_frame_idx: i32,
    pub max_num_reorder_frames: usize,
    pub max_num_ref_frames: u32,
    pub max_num_pics: usize,

    pub pic_width_in_mbs: u32,
    pub pic_height_in_map_units: u32,

    /// Extra surface-pool headroom above `max_num_pics` (§4.7).
    pub pipeline_margin: usize,
}

impl DecoderConfig {
    pub const DEFAULT_PIPELINE_MARGIN: usize = 2;

    /// Builds a config from a parsed SPS, deriving `max_num_reorder_frames`
    /// per §4.6: VUI bitstream-restriction value if present, else the
    /// profile_idc/constraint_set3 fallback table, else `max_num_pics`.
    pub fn from_sps(sps: &Sps, pps_id: u8) -> Result<Self> {
        if !sps.frame_mbs_only_flag {
            return Err(DecoderError::UnsupportedStream(
                crate::error::UnsupportedReason::FrameMbsOnlyNotSet,
            ));
        }

        let max_num_pics = sps.max_num_pics();
        let max_num_reorder_frames = Self::derive_max_num_reorder_frames(sps, max_num_pics);

        Ok(Self {
            sps_id: sps.seq_parameter_set_id,
            pps_id,
            max_pic_order_cnt_lsb: sps.max_pic_order_cnt_lsb(),
            max_frame_num: sps.max_frame_num(),
            max_pic_num: sps.max_frame_num(),
            max_long_term_frame_idx: -1,
            max_num_reorder_frames,
            max_num_ref_frames: sps.max_num_ref_frames,
            max_num_pics,
            pic_width_in_mbs: sps.pic_width_in_mbs_minus1 + 1,
            pic_height_in_map_units: sps.pic_height_in_map_units_minus1 + 1,
            pipeline_margin: Self::DEFAULT_PIPELINE_MARGIN,
        })
    }

    fn derive_max_num_reorder_frames(sps: &Sps, max_num_pics: usize) -> usize {
        if sps.vui_parameters_present_flag && sps.bitstream_restriction_flag {
            return sps.max_num_reorder_frames as usize;
        }
        if sps.constraint_set3_flag && ZERO_REORDER_PROFILES.contains(&sps.profile_idc) {
            return 0;
        }
        // Open Question (spec §9): reasonable, not canonical.
        max_num_pics
    }

    /// Total surface pool capacity for this config (§4.7).
    pub fn surface_pool_capacity(&self) -> usize {
        self.max_num_pics + self.pipeline_margin
    }
}
