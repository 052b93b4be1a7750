//! A synthetic bitstream: pre-built sequence of NAL units driving a fixed
//! IDR + P-frame GOP pattern, standing in for a real Annex-B parser (out of
//! scope for the core, spec §1).

use h264_decode_core::parser::{
    MmcoOp, Nalu, NalUnitType, Parser, Pps, RefPicListModOp, SliceHeader, SliceType, Sps,
};

pub fn sample_sps(max_num_ref_frames: u32) -> Sps {
    Sps {
        seq_parameter_set_id: 0,
        profile_idc: 66,
        constraint_set3_flag: false,
        level_idc: 31,
        log2_max_frame_num_minus4: 4,
        pic_order_cnt_type: 0,
        log2_max_pic_order_cnt_lsb_minus4: 4,
        delta_pic_order_always_zero_flag: false,
        offset_for_non_ref_pic: 0,
        offset_for_top_to_bottom_field: 0,
        num_ref_frames_in_pic_order_cnt_cycle: 0,
        offset_for_ref_frame: vec![],
        max_num_ref_frames,
        gaps_in_frame_num_value_allowed_flag: false,
        pic_width_in_mbs_minus1: 79,
        pic_height_in_map_units_minus1: 44,
        frame_mbs_only_flag: true,
        vui_parameters_present_flag: false,
        bitstream_restriction_flag: false,
        max_num_reorder_frames: 0,
        max_dec_frame_buffering: 0,
    }
}

fn sample_pps() -> Pps {
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

fn header_for(frame_num: i32, poc_lsb: i32, is_idr: bool) -> SliceHeader {
    SliceHeader {
        first_mb_in_slice: 0,
        slice_type: if is_idr { SliceType::I } else { SliceType::P },
        pic_parameter_set_id: 0,
        frame_num,
        idr_pic_flag: is_idr,
        field_pic_flag: false,
        bottom_field_flag: false,
        pic_order_cnt_lsb: poc_lsb,
        delta_pic_order_cnt: [0, 0],
        delta_pic_order_cnt_bottom: 0,
        nal_ref_idc: 1,
        num_ref_idx_l0_active_minus1: 0,
        num_ref_idx_l1_active_minus1: 0,
        ref_pic_list_modification_flag_l0: false,
        ref_pic_list_modification_flag_l1: false,
        ref_list_l0_modifications: Vec::<RefPicListModOp>::new(),
        ref_list_l1_modifications: Vec::<RefPicListModOp>::new(),
        no_output_of_prior_pics_flag: true,
        long_term_reference_flag: false,
        adaptive_ref_pic_marking_mode_flag: false,
        ref_pic_marking: Vec::<MmcoOp>::new(),
    }
}

/// A driven-to-completion NAL stream: `gop_count` GOPs of `gop_size`
/// pictures each (IDR followed by `gop_size - 1` P slices), `frame_num`
/// incrementing across GOP boundaries the way a real encoder's would.
pub struct SyntheticParser {
    sps: Sps,
    pps: Pps,
    nalus: Vec<(NalUnitType, SliceHeader)>,
    cursor: usize,
}

impl SyntheticParser {
    pub fn new(gop_size: usize, gop_count: usize, max_num_ref_frames: u32) -> Self {
        let sps = sample_sps(max_num_ref_frames);
        let pps = sample_pps();
        let max_frame_num = sps.max_frame_num();

        let mut nalus = vec![(NalUnitType::Sps, header_for(0, 0, true))];
        let mut frame_num = 0i32;
        for _gop in 0..gop_count.max(1) {
            for i in 0..gop_size.max(1) {
                let is_idr = i == 0;
                if is_idr {
                    frame_num = 0;
                }
                let poc_lsb = (i as i32) * 2;
                let nal_type = if is_idr { NalUnitType::SliceIdr } else { NalUnitType::SliceNonIdr };
                nalus.push((nal_type, header_for(frame_num, poc_lsb, is_idr)));
                frame_num = (frame_num + 1) % max_frame_num;
            }
        }

        Self { sps, pps, nalus, cursor: 0 }
    }
}

impl Parser for SyntheticParser {
    type Error = String;

    fn set_stream(&mut self, _bytes: &[u8]) {}

    fn advance_to_next_nalu(&mut self) -> Result<Option<Nalu>, Self::Error> {
        if self.cursor >= self.nalus.len() {
            return Ok(None);
        }
        let (nal_unit_type, header) = &self.nalus[self.cursor];
        self.cursor += 1;
        Ok(Some(Nalu { nal_unit_type: *nal_unit_type, nal_ref_idc: header.nal_ref_idc }))
    }

    fn parse_sps(&mut self) -> Result<u8, Self::Error> {
        Ok(self.sps.seq_parameter_set_id)
    }

    fn parse_pps(&mut self) -> Result<u8, Self::Error> {
        Ok(self.pps.pic_parameter_set_id)
    }

    fn parse_slice_header(&mut self, _nalu: &Nalu) -> Result<SliceHeader, Self::Error> {
        Ok(self.nalus[self.cursor - 1].1.clone())
    }

    fn get_sps(&self, id: u8) -> Option<&Sps> {
        (id == self.sps.seq_parameter_set_id).then_some(&self.sps)
    }

    fn get_pps(&self, id: u8) -> Option<&Pps> {
        (id == self.pps.pic_parameter_set_id).then_some(&self.pps)
    }
}
