//! Reference picture marking at `FinishPicture` (spec §4.5; ITU-T H.264
//! §8.2.5).

use tracing::warn;

use crate::config::DecoderConfig;
use crate::dpb::Dpb;
use crate::error::{DecoderError, Result};
use crate::parser::MmcoOp;
use crate::picture::Picture;
use crate::types::Field;

/// Applies reference marking to `dpb`/`curr` and returns the updated
/// `max_long_term_frame_idx` the caller should store in its config.
pub fn mark_references(dpb: &mut Dpb, curr: &mut Picture, cfg: &mut DecoderConfig) -> Result<()> {
    if !curr.field.is_progressive() {
        return Err(DecoderError::from(
            crate::error::UnsupportedReason::InterlacedNotSupported,
        ));
    }

    if curr.is_idr {
        dpb.mark_all_non_ref();
        if curr.long_term_reference_flag {
            curr.is_long_term = true;
            curr.long_term_frame_idx = 0;
            cfg.max_long_term_frame_idx = 0;
        } else {
            curr.is_long_term = false;
            cfg.max_long_term_frame_idx = -1;
        }
        return Ok(());
    }

    if !curr.adaptive_ref_pic_marking_mode_flag {
        sliding_window(dpb, curr, cfg);
    } else {
        run_mmco(dpb, curr, cfg)?;
    }
    Ok(())
}

fn sliding_window(dpb: &mut Dpb, curr: &Picture, cfg: &DecoderConfig) {
    let threshold = cfg.max_num_ref_frames.max(1) as usize;
    if dpb.count_refs() != threshold {
        return;
    }
    match dpb.lowest_frame_num_wrap_short_ref_mut() {
        Some(p) => p.is_ref = false,
        None => {
            let _ = curr;
            crate::dpb::log_missing_eviction_candidate("sliding_window: no short-term ref to evict");
        }
    }
}

fn run_mmco(dpb: &mut Dpb, curr: &mut Picture, cfg: &mut DecoderConfig) -> Result<()> {
    for op in curr.mmco_ops.clone().iter() {
        apply_mmco_op(dpb, curr, cfg, op)?;
        if op.operation == 0 {
            break;
        }
    }
    Ok(())
}

fn apply_mmco_op(dpb: &mut Dpb, curr: &mut Picture, cfg: &mut DecoderConfig, op: &MmcoOp) -> Result<()> {
    match op.operation {
        0 => {}
        1 => {
            let pic_num = curr.pic_num - (op.diff_of_pic_nums_minus1 as i32 + 1);
            let p = dpb.short_ref_by_pic_num_mut(pic_num).ok_or_else(|| {
                DecoderError::InvalidStream(format!("MMCO 1: no short-term ref with pic_num {pic_num}"))
            })?;
            p.is_ref = false;
        }
        2 => {
            let long_term_pic_num = op.long_term_pic_num as i32;
            let p = dpb.long_ref_by_lt_pic_num(long_term_pic_num).map(|p| p.pic_order_cnt).ok_or_else(|| {
                DecoderError::InvalidStream(format!(
                    "MMCO 2: no long-term ref with long_term_pic_num {long_term_pic_num}"
                ))
            })?;
            dpb.iter_mut().find(|q| q.pic_order_cnt == p).unwrap().is_ref = false;
        }
        3 => {
            let pic_num = curr.pic_num - (op.diff_of_pic_nums_minus1 as i32 + 1);
            let p = dpb.short_ref_by_pic_num_mut(pic_num).ok_or_else(|| {
                DecoderError::InvalidStream(format!("MMCO 3: no short-term ref with pic_num {pic_num}"))
            })?;
            if !p.is_ref || p.is_long_term {
                return Err(DecoderError::InvalidStream(format!(
                    "MMCO 3: ref with pic_num {pic_num} is not currently a short-term reference"
                )));
            }
            p.is_long_term = true;
            p.long_term_frame_idx = op.long_term_frame_idx as i32;
        }
        4 => {
            cfg.max_long_term_frame_idx = op.max_long_term_frame_idx_plus1 as i32 - 1;
            let max = cfg.max_long_term_frame_idx;
            for p in dpb.iter_mut() {
                if p.is_long_term && p.long_term_frame_idx > max {
                    p.is_ref = false;
                }
            }
        }
        5 => {
            dpb.mark_all_non_ref();
            cfg.max_long_term_frame_idx = -1;
            curr.needs_mmco5 = true;
        }
        6 => {
            let idx = op.long_term_frame_idx as i32;
            for p in dpb.iter_mut() {
                if p.is_long_term && p.long_term_frame_idx == idx {
                    p.is_ref = false;
                }
            }
            curr.is_ref = true;
            curr.is_long_term = true;
            curr.long_term_frame_idx = idx;
        }
        other => {
            warn!(operation = other, "unrecognized MMCO operation, ignoring");
        }
    }
    Ok(())
}
