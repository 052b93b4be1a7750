//! Shared fixtures for unit tests across the crate. Not part of the public
//! API; compiled only under `#[cfg(test)]`.

use crate::parser::{Pps, Sps};

pub fn sample_sps() -> Sps {
    Sps {
        seq_parameter_set_id: 0,
        profile_idc: 100,
        constraint_set3_flag: false,
        level_idc: 31,
        log2_max_frame_num_minus4: 0,
        pic_order_cnt_type: 0,
        log2_max_pic_order_cnt_lsb_minus4: 0,
        delta_pic_order_always_zero_flag: false,
        offset_for_non_ref_pic: 0,
        offset_for_top_to_bottom_field: 0,
        num_ref_frames_in_pic_order_cnt_cycle: 0,
        offset_for_ref_frame: vec![],
        max_num_ref_frames: 2,
        gaps_in_frame_num_value_allowed_flag: false,
        pic_width_in_mbs_minus1: 9,
        pic_height_in_map_units_minus1: 5,
        frame_mbs_only_flag: true,
        vui_parameters_present_flag: false,
        bitstream_restriction_flag: false,
        max_num_reorder_frames: 0,
        max_dec_frame_buffering: 0,
    }
}

pub fn sample_pps() -> Pps {
    Pps {
        pic_parameter_set_id: 0,
        seq_parameter_set_id: 0,
        entropy_coding_mode_flag: false,
        weighted_pred_flag: false,
        weighted_bipred_idc: 0,
        pic_order_present_flag: false,
        deblocking_filter_control_present_flag: false,
        transform_8x8_mode_flag: false,
        constrained_intra_pred_flag: false,
        redundant_pic_cnt_present_flag: false,
    }
}
