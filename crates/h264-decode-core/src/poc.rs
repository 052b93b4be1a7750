//! Picture Order Count computation (spec §4.2; ITU-T H.264 §8.2.1).

use crate::error::{DecoderError, Result};
use crate::parser::{Sps, SliceHeader};
use crate::picture::Picture;
use crate::types::Field;

/// Per-picture POC inputs not already carried on [`Picture`].
pub struct PocInputs<'a> {
    pub sps: &'a Sps,
    pub slice: &'a SliceHeader,
    pub is_idr: bool,
    pub is_ref: bool,
    pub field: Field,
}

/// Carries the cross-picture state §4.2 requires: the previous
/// `frame_num`/`frame_num_offset`, and — separately — the previous
/// *reference* picture's POC fields (needed by type 0's MMCO-5 special
/// case).
#[derive(Debug, Clone, Default)]
pub struct PocEngine {
    prev_frame_num: i32,
    /// `frame_num` of the last *finished* picture, used only by
    /// `frame_num_offset`'s wrap test (types 1/2, §8.2.1). Kept separate
    /// from `prev_frame_num` above, which the FSM's `FrameNumGap` check
    /// advances at slice entry — `compute` runs after that advance, so
    /// reading `prev_frame_num` here would compare the current picture's
    /// `frame_num` against itself and never detect a wrap.
    prev_frame_num_for_offset: i32,
    prev_frame_num_offset: i32,

    prev_has_mmco5: bool,

    prev_ref_has_mmco5: bool,
    prev_ref_top_field_order_cnt: i32,
    prev_ref_pic_order_cnt_msb: i32,
    prev_ref_pic_order_cnt_lsb: i32,
    prev_ref_field: Field,
}

impl PocEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the new picture's `frame_num`, returning the previous one
    /// (used by the FSM's `FrameNumGap` check, spec §4.8).
    pub fn note_frame_num(&mut self, frame_num: i32) -> i32 {
        let prev = self.prev_frame_num;
        self.prev_frame_num = frame_num;
        prev
    }

    /// Computes `top_field_order_cnt`, `bottom_field_order_cnt`, and the
    /// canonical `pic_order_cnt` for `pic`, per `sps.pic_order_cnt_type`.
    pub fn compute(&self, pic: &mut Picture, input: &PocInputs) -> Result<()> {
        if !input.field.is_progressive() {
            return Err(DecoderError::from(
                crate::error::UnsupportedReason::InterlacedNotSupported,
            ));
        }

        pic.pic_order_cnt_lsb = input.slice.pic_order_cnt_lsb;

        match input.sps.pic_order_cnt_type {
            0 => self.compute_type0(pic, input)?,
            1 => self.compute_type1(pic, input)?,
            2 => self.compute_type2(pic, input),
            other => {
                return Err(DecoderError::InvalidStream(format!(
                    "invalid pic_order_cnt_type {other}"
                )))
            }
        }

        pic.pic_order_cnt = pic.top_field_order_cnt.min(pic.bottom_field_order_cnt);
        Ok(())
    }

    fn compute_type0(&self, pic: &mut Picture, input: &PocInputs) -> Result<()> {
        let max_lsb = input.sps.max_pic_order_cnt_lsb();
        let lsb = input.slice.pic_order_cnt_lsb;

        let (prev_msb, prev_lsb) = if input.is_idr {
            (0, 0)
        } else if self.prev_ref_has_mmco5 {
            if self.prev_ref_field != Field::Bottom {
                (0, self.prev_ref_top_field_order_cnt)
            } else {
                (0, 0)
            }
        } else {
            (self.prev_ref_pic_order_cnt_msb, self.prev_ref_pic_order_cnt_lsb)
        };

        let msb = if lsb < prev_lsb && prev_lsb - lsb >= max_lsb / 2 {
            prev_msb + max_lsb
        } else if lsb > prev_lsb && lsb - prev_lsb > max_lsb / 2 {
            prev_msb - max_lsb
        } else {
            prev_msb
        };
        pic.pic_order_cnt_msb = msb;
        pic.top_field_order_cnt = msb + lsb;
        pic.bottom_field_order_cnt = pic.top_field_order_cnt + input.slice.delta_pic_order_cnt_bottom;
        Ok(())
    }

    fn frame_num_offset(&self, input: &PocInputs) -> i32 {
        let prev_frame_num_offset = if self.prev_has_mmco5 {
            0
        } else {
            self.prev_frame_num_offset
        };
        if input.is_idr {
            0
        } else if self.prev_frame_num_for_offset > input.slice.frame_num {
            prev_frame_num_offset + input.sps.max_frame_num()
        } else {
            prev_frame_num_offset
        }
    }

    fn compute_type1(&self, pic: &mut Picture, input: &PocInputs) -> Result<()> {
        let frame_num_offset = self.frame_num_offset(input);
        pic.frame_num_offset = frame_num_offset;

        let cycle_len = input.sps.num_ref_frames_in_pic_order_cnt_cycle as i32;
        let mut abs_frame_num = if cycle_len != 0 {
            frame_num_offset + input.slice.frame_num
        } else {
            0
        };
        if !input.is_ref && abs_frame_num > 0 {
            abs_frame_num -= 1;
        }

        let mut expected_poc = 0;
        if abs_frame_num > 0 {
            if cycle_len == 0 {
                return Err(DecoderError::InvalidStream(
                    "num_ref_frames_in_pic_order_cnt_cycle is 0 but abs_frame_num > 0".into(),
                ));
            }
            let cycle_cnt = (abs_frame_num - 1) / cycle_len;
            let in_cycle = (abs_frame_num - 1) % cycle_len;
            let expected_delta_per_cycle: i32 = input.sps.offset_for_ref_frame.iter().sum();
            expected_poc = cycle_cnt * expected_delta_per_cycle;
            for i in 0..=in_cycle as usize {
                expected_poc += input.sps.offset_for_ref_frame[i];
            }
        }
        if !input.is_ref {
            expected_poc += input.sps.offset_for_non_ref_pic;
        }

        pic.top_field_order_cnt = expected_poc + input.slice.delta_pic_order_cnt[0];
        pic.bottom_field_order_cnt = pic.top_field_order_cnt
            + input.sps.offset_for_top_to_bottom_field
            + input.slice.delta_pic_order_cnt[1];
        Ok(())
    }

    fn compute_type2(&self, pic: &mut Picture, input: &PocInputs) {
        let frame_num_offset = self.frame_num_offset(input);
        pic.frame_num_offset = frame_num_offset;

        let temp_poc = if input.is_idr {
            0
        } else if !input.is_ref {
            2 * (frame_num_offset + input.slice.frame_num) - 1
        } else {
            2 * (frame_num_offset + input.slice.frame_num)
        };
        pic.top_field_order_cnt = temp_poc;
        pic.bottom_field_order_cnt = temp_poc;
    }

    /// Canonical carry-over mutation, run at `FinishPicture` (§4.2, §4.8):
    /// if `pic` was a reference, snapshot its POC fields into the
    /// `prev_ref_*` slots; unconditionally advance `prev_has_mmco5` and
    /// `prev_frame_num_offset`.
    pub fn finish_picture(&mut self, pic: &Picture) {
        if pic.is_ref {
            self.prev_ref_has_mmco5 = pic.needs_mmco5;
            self.prev_ref_top_field_order_cnt = pic.top_field_order_cnt;
            self.prev_ref_pic_order_cnt_msb = pic.pic_order_cnt_msb;
            self.prev_ref_pic_order_cnt_lsb = pic.pic_order_cnt_lsb;
            self.prev_ref_field = pic.field;
        }
        self.prev_has_mmco5 = pic.needs_mmco5;
        self.prev_frame_num_offset = pic.frame_num_offset;
        self.prev_frame_num_for_offset = pic.frame_num;
    }
}
