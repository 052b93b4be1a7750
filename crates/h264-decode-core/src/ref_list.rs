//! RefPicList0/1 construction and in-slice modification (spec §4.4;
//! ITU-T H.264 §8.2.4).

use tracing::debug;

use crate::config::DecoderConfig;
use crate::error::{DecoderError, Result};
use crate::parser::{RefPicListModOp, SliceHeader, SliceType};
use crate::picture::{Picture, MAX_MMCO_OPS};

/// A constructed reference list. Holes (requested length exceeding the
/// number of pictures actually available) are `None`, spec §4.4.
pub type RefList = Vec<Option<Picture>>;

fn pic_num_f(p: &Picture, max_pic_num: i32) -> i32 {
    p.pic_num_f(max_pic_num)
}

fn long_term_pic_num_f(p: &Picture, max_long_term_frame_idx: i32) -> i32 {
    p.long_term_pic_num_f(max_long_term_frame_idx)
}

/// Builds the unmodified initial `ref_pic_list0`/`ref_pic_list1` for a P/SP
/// or B slice (§8.2.4.2), already truncated to the slice's active length.
pub fn build_initial_lists(
    refs: &[&Picture],
    curr_poc: i32,
    slice: &SliceHeader,
) -> (RefList, RefList) {
    let mut shorts: Vec<&Picture> = refs.iter().copied().filter(|p| !p.is_long_term).collect();
    let mut longs: Vec<&Picture> = refs.iter().copied().filter(|p| p.is_long_term).collect();
    longs.sort_by_key(|p| p.long_term_pic_num);

    let active_l0 = slice.num_ref_idx_l0_active_minus1 as usize + 1;

    if slice.slice_type.is_p_or_sp() {
        shorts.sort_by_key(|p| std::cmp::Reverse(p.pic_num));
        let mut list0: RefList = shorts.iter().chain(longs.iter()).map(|p| Some((*p).clone())).collect();
        truncate_or_pad(&mut list0, active_l0);
        return (list0, Vec::new());
    }

    debug_assert!(slice.slice_type.is_b());
    let active_l1 = slice.num_ref_idx_l1_active_minus1 as usize + 1;

    let mut before: Vec<&Picture> = shorts.iter().copied().filter(|p| p.pic_order_cnt < curr_poc).collect();
    before.sort_by_key(|p| std::cmp::Reverse(p.pic_order_cnt));
    let mut after: Vec<&Picture> = shorts.iter().copied().filter(|p| p.pic_order_cnt > curr_poc).collect();
    after.sort_by_key(|p| p.pic_order_cnt);

    let mut list0: RefList = before
        .iter()
        .chain(after.iter())
        .chain(longs.iter())
        .map(|p| Some((*p).clone()))
        .collect();
    let mut list1: RefList = after
        .iter()
        .chain(before.iter())
        .chain(longs.iter())
        .map(|p| Some((*p).clone()))
        .collect();

    if list1.len() > 1 && list0 == list1 {
        list1.swap(0, 1);
    }

    truncate_or_pad(&mut list0, active_l0);
    truncate_or_pad(&mut list1, active_l1);
    (list0, list1)
}

fn truncate_or_pad(list: &mut RefList, active_len: usize) {
    if list.len() > active_len {
        list.truncate(active_len);
    } else {
        while list.len() < active_len {
            list.push(None);
        }
    }
}

/// Applies `ref_pic_list_modification` (§8.2.4.3) to `list` in place.
/// `refs` is the full DPB reference set (post `update_pic_nums`) used for
/// lookups; `curr_pic_num`/`max_pic_num`/`max_long_term_frame_idx` come
/// from the current picture and active `DecoderConfig`.
pub fn modify_list(
    list: &mut RefList,
    ops: &[RefPicListModOp],
    refs: &[&Picture],
    curr_pic_num: i32,
    cfg: &DecoderConfig,
) -> Result<()> {
    if ops.len() > MAX_MMCO_OPS {
        return Err(DecoderError::InvalidStream(format!(
            "ref_pic_list_modification has {} ops, exceeds cap {}",
            ops.len(),
            MAX_MMCO_OPS
        )));
    }

    let active_len = list.len();
    let max_pic_num = cfg.max_pic_num;
    let mut pic_num_lx_pred = curr_pic_num;
    let mut ref_idx_lx = 0usize;

    for op in ops {
        match op.idc {
            0 | 1 => {
                let delta = op.value as i32 + 1;
                let no_wrap = if op.idc == 0 {
                    pic_num_lx_pred - delta
                } else {
                    pic_num_lx_pred + delta
                };
                let no_wrap = if no_wrap < 0 {
                    no_wrap + max_pic_num
                } else if no_wrap >= max_pic_num {
                    no_wrap - max_pic_num
                } else {
                    no_wrap
                };
                let pic_num_lx = if no_wrap > curr_pic_num {
                    no_wrap - max_pic_num
                } else {
                    no_wrap
                };

                let found = refs
                    .iter()
                    .find(|p| !p.is_long_term && p.is_ref && p.pic_num == pic_num_lx)
                    .ok_or_else(|| {
                        DecoderError::InvalidStream(format!(
                            "ref_pic_list_modification: no short-term ref with pic_num {pic_num_lx}"
                        ))
                    })?;

                insert_and_compact(list, ref_idx_lx, (*found).clone(), |p| pic_num_f(p, max_pic_num) == pic_num_lx);
                ref_idx_lx += 1;
                pic_num_lx_pred = pic_num_lx;
            }
            2 => {
                let long_term_pic_num = op.value as i32;
                let found = refs
                    .iter()
                    .find(|p| p.is_long_term && p.is_ref && p.long_term_pic_num == long_term_pic_num)
                    .ok_or_else(|| {
                        DecoderError::InvalidStream(format!(
                            "ref_pic_list_modification: no long-term ref with long_term_pic_num {long_term_pic_num}"
                        ))
                    })?;

                insert_and_compact(list, ref_idx_lx, (*found).clone(), |p| {
                    long_term_pic_num_f(p, cfg.max_long_term_frame_idx) == long_term_pic_num
                });
                ref_idx_lx += 1;
            }
            3 => break,
            other => {
                debug!(idc = other, "ref_pic_list_modification: unrecognized idc, ignoring");
            }
        }
    }

    truncate_or_pad(list, active_len);
    Ok(())
}

/// Shifts `list[ref_idx..]` right by one, inserts `pic` at `ref_idx`, then
/// removes any later duplicate matched by `same_pic_num`.
fn insert_and_compact(list: &mut RefList, ref_idx: usize, pic: Picture, same_pic_num: impl Fn(&Picture) -> bool) {
    if ref_idx > list.len() {
        list.resize(ref_idx, None);
    }
    list.insert(ref_idx, Some(pic));

    let mut i = ref_idx + 1;
    while i < list.len() {
        let dup = matches!(&list[i], Some(p) if same_pic_num(p));
        if dup {
            list.remove(i);
        } else {
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BitstreamId;

    fn short_ref(poc: i32, pic_num: i32) -> Picture {
        let mut p = Picture::new(BitstreamId(poc as u64));
        p.pic_order_cnt = poc;
        p.pic_num = pic_num;
        p.is_ref = true;
        p
    }

    fn long_ref(poc: i32, long_term_pic_num: i32) -> Picture {
        let mut p = Picture::new(BitstreamId(poc as u64 + 100));
        p.pic_order_cnt = poc;
        p.is_ref = true;
        p.is_long_term = true;
        p.long_term_pic_num = long_term_pic_num;
        p
    }

    fn p_slice(active_l0: u32) -> SliceHeader {
        SliceHeader {
            first_mb_in_slice: 0,
            slice_type: SliceType::P,
            pic_parameter_set_id: 0,
            frame_num: 0,
            idr_pic_flag: false,
            field_pic_flag: false,
            bottom_field_flag: false,
            pic_order_cnt_lsb: 0,
            delta_pic_order_cnt: [0, 0],
            delta_pic_order_cnt_bottom: 0,
            nal_ref_idc: 1,
            num_ref_idx_l0_active_minus1: active_l0.saturating_sub(1),
            num_ref_idx_l1_active_minus1: 0,
            ref_pic_list_modification_flag_l0: false,
            ref_pic_list_modification_flag_l1: false,
            ref_list_l0_modifications: vec![],
            ref_list_l1_modifications: vec![],
            no_output_of_prior_pics_flag: false,
            long_term_reference_flag: false,
            adaptive_ref_pic_marking_mode_flag: false,
            ref_pic_marking: vec![],
        }
    }

    #[test]
    fn p_slice_sorts_short_refs_by_pic_num_descending_then_longs() {
        let a = short_ref(0, 5);
        let b = short_ref(1, 9);
        let c = long_ref(2, 0);
        let refs = vec![&a, &b, &c];
        let slice = p_slice(3);
        let (list0, list1) = build_initial_lists(&refs, 10, &slice);
        assert!(list1.is_empty());
        let order: Vec<_> = list0.iter().map(|p| p.as_ref().unwrap().pic_num).collect();
        assert_eq!(order, vec![9, 5, 0]); // long_term pic_num defaults to 0
    }

    #[test]
    fn p_slice_truncates_to_active_length() {
        let a = short_ref(0, 5);
        let b = short_ref(1, 9);
        let refs = vec![&a, &b];
        let slice = p_slice(1);
        let (list0, _) = build_initial_lists(&refs, 10, &slice);
        assert_eq!(list0.len(), 1);
        assert_eq!(list0[0].as_ref().unwrap().pic_num, 9);
    }

    #[test]
    fn p_slice_pads_with_holes_when_requested_length_exceeds_available() {
        let a = short_ref(0, 5);
        let refs = vec![&a];
        let slice = p_slice(3);
        let (list0, _) = build_initial_lists(&refs, 10, &slice);
        assert_eq!(list0.len(), 3);
        assert!(list0[1].is_none());
        assert!(list0[2].is_none());
    }

    fn b_slice() -> SliceHeader {
        let mut s = p_slice(3);
        s.slice_type = SliceType::B;
        s.num_ref_idx_l1_active_minus1 = 2;
        s
    }

    #[test]
    fn b_slice_list0_before_then_after_by_poc() {
        let a = short_ref(4, 0); // before currPOC=10
        let b = short_ref(16, 0); // after
        let c = short_ref(2, 0); // before, further away
        let refs = vec![&a, &b, &c];
        let slice = b_slice();
        let (list0, list1) = build_initial_lists(&refs, 10, &slice);
        let pocs0: Vec<_> = list0.iter().filter_map(|p| p.as_ref().map(|p| p.pic_order_cnt)).collect();
        assert_eq!(pocs0, vec![4, 2, 16]);
        let pocs1: Vec<_> = list1.iter().filter_map(|p| p.as_ref().map(|p| p.pic_order_cnt)).collect();
        assert_eq!(pocs1, vec![16, 4, 2]);
    }

    #[test]
    fn b_slice_swaps_list1_head_when_identical_to_list0() {
        // Two "after" refs and none "before": the unswapped list0 and list1
        // both reduce to the same after-only ordering, so the builder must
        // swap list1's first two entries.
        let after_near = short_ref(12, 0);
        let after_far = short_ref(16, 0);
        let refs = vec![&after_near, &after_far];
        let mut slice = b_slice();
        slice.num_ref_idx_l0_active_minus1 = 1;
        slice.num_ref_idx_l1_active_minus1 = 1;
        let (list0, list1) = build_initial_lists(&refs, 0, &slice);
        assert_ne!(list0, list1);
        assert_eq!(
            list1.iter().map(|p| p.as_ref().unwrap().pic_order_cnt).collect::<Vec<_>>(),
            vec![16, 12]
        );
    }

    #[test]
    fn modify_list_reorders_by_pic_num_lx() {
        let a = short_ref(0, 5);
        let b = short_ref(1, 9);
        let refs = vec![&a, &b];
        let mut list: RefList = vec![Some(a.clone()), Some(b.clone())];
        let cfg = DecoderConfig {
            sps_id: 0,
            pps_id: 0,
            max_pic_order_cnt_lsb: 256,
            max_frame_num: 16,
            max_pic_num: 16,
            max_long_term_frame_idx: -1,
            max_num_reorder_frames: 0,
            max_num_ref_frames: 2,
            max_num_pics: 3,
            pic_width_in_mbs: 10,
            pic_height_in_map_units: 6,
            pipeline_margin: 2,
        };
        // curr_pic_num = 9; idc=0, value=3 -> pic_num_lx_no_wrap = 9 - 4 = 5,
        // which matches the existing short-term ref with pic_num 5.
        let ops = vec![RefPicListModOp { idc: 0, value: 3 }];
        modify_list(&mut list, &ops, &refs, 9, &cfg).unwrap();
        assert_eq!(list[0].as_ref().unwrap().pic_num, 5);
    }

    #[test]
    fn modify_list_missing_short_ref_is_invalid_stream() {
        let a = short_ref(0, 5);
        let refs = vec![&a];
        let mut list: RefList = vec![Some(a.clone())];
        let cfg = DecoderConfig {
            sps_id: 0,
            pps_id: 0,
            max_pic_order_cnt_lsb: 256,
            max_frame_num: 16,
            max_pic_num: 16,
            max_long_term_frame_idx: -1,
            max_num_reorder_frames: 0,
            max_num_ref_frames: 2,
            max_num_pics: 3,
            pic_width_in_mbs: 10,
            pic_height_in_map_units: 6,
            pipeline_margin: 2,
        };
        let ops = vec![RefPicListModOp { idc: 0, value: 200 }];
        let err = modify_list(&mut list, &ops, &refs, 5, &cfg).unwrap_err();
        assert!(matches!(err, DecoderError::InvalidStream(_)));
    }

    #[test]
    fn modify_list_too_many_ops_is_invalid_stream() {
        let refs: Vec<&Picture> = vec![];
        let mut list: RefList = vec![];
        let cfg = DecoderConfig {
            sps_id: 0,
            pps_id: 0,
            max_pic_order_cnt_lsb: 256,
            max_frame_num: 16,
            max_pic_num: 16,
            max_long_term_frame_idx: -1,
            max_num_reorder_frames: 0,
            max_num_ref_frames: 2,
            max_num_pics: 3,
            pic_width_in_mbs: 10,
            pic_height_in_map_units: 6,
            pipeline_margin: 2,
        };
        let ops = vec![RefPicListModOp { idc: 3, value: 0 }; MAX_MMCO_OPS + 1];
        let err = modify_list(&mut list, &ops, &refs, 0, &cfg).unwrap_err();
        assert!(matches!(err, DecoderError::InvalidStream(_)));
    }
}
