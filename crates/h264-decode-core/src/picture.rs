//! The per-picture state record (spec §3 `Picture`).

use crate::parser::MmcoOp;
use crate::types::{BitstreamId, Field};

/// Upper bound on `MmcoOp` records carried per picture, matching the H.264
/// cap on `ref_pic_list_modification`/MMCO loop length the spec calls
/// `kRefListModSize` (§4.4 complexity target).
pub const MAX_MMCO_OPS: usize = 32;

/// A decoded (or decoding) picture. Lives while referenced by the DPB, the
/// current-picture slot, or (transiently, by value) a reference list.
///
/// `Picture` is cheap to `Clone`: it owns no buffers, only scalar state plus
/// a short `Vec<MmcoOp>`. Reference lists hold clones rather than indices
/// into the DPB so that in-slice list modification (§4.4) never aliases the
/// DPB's own copy — see SPEC_FULL.md §2.
#[derive(Debug, Clone, PartialEq)]
pub struct Picture {
    pub bitstream_id: BitstreamId,

    pub top_field_order_cnt: i32,
    pub bottom_field_order_cnt: i32,
    pub pic_order_cnt: i32,
    pub pic_order_cnt_msb: i32,
    pub pic_order_cnt_lsb: i32,

    pub frame_num: i32,
    pub frame_num_offset: i32,
    pub frame_num_wrap: i32,

    pub pic_num: i32,
    pub long_term_pic_num: i32,
    pub long_term_frame_idx: i32,

    pub is_idr: bool,
    pub is_ref: bool,
    pub is_long_term: bool,
    pub was_output: bool,
    pub needs_mmco5: bool,

    pub field: Field,

    pub long_term_reference_flag: bool,
    pub adaptive_ref_pic_marking_mode_flag: bool,
    pub mmco_ops: Vec<MmcoOp>,
}

impl Picture {
    pub fn new(bitstream_id: BitstreamId) -> Self {
        Self {
            bitstream_id,
            top_field_order_cnt: 0,
            bottom_field_order_cnt: 0,
            pic_order_cnt: 0,
            pic_order_cnt_msb: 0,
            pic_order_cnt_lsb: 0,
            frame_num: 0,
            frame_num_offset: 0,
            frame_num_wrap: 0,
            pic_num: 0,
            long_term_pic_num: 0,
            long_term_frame_idx: -1,
            is_idr: false,
            is_ref: false,
            is_long_term: false,
            was_output: false,
            needs_mmco5: false,
            field: Field::None,
            long_term_reference_flag: false,
            adaptive_ref_pic_marking_mode_flag: false,
            mmco_ops: Vec::new(),
        }
    }

    /// `PicNumF(p)` of §4.4: `pic_num` for short-term refs, else
    /// `max_pic_num`, which makes a long-term reference sort/compare as
    /// "never the nearest short-term match".
    pub fn pic_num_f(&self, max_pic_num: i32) -> i32 {
        if !self.is_long_term {
            self.pic_num
        } else {
            max_pic_num
        }
    }

    /// `LongTermPicNumF(p)` of §4.4.
    pub fn long_term_pic_num_f(&self, max_long_term_frame_idx: i32) -> i32 {
        if self.is_long_term {
            self.long_term_pic_num
        } else {
            2 * (max_long_term_frame_idx + 1)
        }
    }

    /// True once the picture should no longer be retained by the DPB per
    /// I4: it has been displayed and is no longer a reference.
    pub fn is_purgeable(&self) -> bool {
        self.was_output && !self.is_ref
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pic_num_f_uses_max_pic_num_for_long_term() {
        let mut p = Picture::new(BitstreamId(0));
        p.is_long_term = true;
        p.long_term_pic_num = 3;
        assert_eq!(p.pic_num_f(16), 16);
    }

    #[test]
    fn pic_num_f_uses_pic_num_for_short_term() {
        let mut p = Picture::new(BitstreamId(0));
        p.pic_num = 7;
        assert_eq!(p.pic_num_f(16), 7);
    }

    #[test]
    fn long_term_pic_num_f_sentinel_for_short_term() {
        let p = Picture::new(BitstreamId(0));
        assert_eq!(p.long_term_pic_num_f(3), 2 * (3 + 1));
    }

    #[test]
    fn is_purgeable_requires_output_and_non_ref() {
        let mut p = Picture::new(BitstreamId(0));
        assert!(!p.is_purgeable());
        p.was_output = true;
        assert!(p.is_purgeable());
        p.is_ref = true;
        assert!(!p.is_purgeable());
    }
}
