//! The `Parser` capability the core consumes (spec §6).
//!
//! Raw NAL unit / SPS / PPS / slice-header byte parsing is explicitly out of
//! scope (spec §1); this module only defines the records the core reads out
//! of an already-parsed NAL unit, plus the trait a concrete Annex-B parser
//! must implement to drive a `Decoder`. Field names mirror the bitstream
//! syntax elements named in spec §6 so a parser implementer can map them
//! directly off the ITU-T H.264 table.

use serde::{Deserialize, Serialize};

pub type SpsId = u8;
pub type PpsId = u8;

/// NAL unit type, restricted to the values the top-level FSM dispatches on
/// (spec §4.8); a real parser will see others and the core simply ignores
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NalUnitType {
    Sps,
    Pps,
    SliceIdr,
    SliceNonIdr,
    Other(u8),
}

/// A single NAL unit as handed to the core by the parser. The core never
/// looks at `payload`; it is opaque bytes the `Parser` capability already
/// consumed to produce `parse_sps`/`parse_pps`/`parse_slice_header`.
#[derive(Debug, Clone)]
pub struct Nalu {
    pub nal_unit_type: NalUnitType,
    pub nal_ref_idc: u8,
}

/// Sequence Parameter Set fields consumed by the core (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sps {
    pub seq_parameter_set_id: SpsId,
    pub profile_idc: u8,
    pub constraint_set3_flag: bool,
    pub level_idc: u8,

    pub log2_max_frame_num_minus4: u8,
    pub pic_order_cnt_type: u8,
    pub log2_max_pic_order_cnt_lsb_minus4: u8,
    pub delta_pic_order_always_zero_flag: bool,
    pub offset_for_non_ref_pic: i32,
    pub offset_for_top_to_bottom_field: i32,
    pub num_ref_frames_in_pic_order_cnt_cycle: u8,
    pub offset_for_ref_frame: Vec<i32>,

    pub max_num_ref_frames: u32,
    pub gaps_in_frame_num_value_allowed_flag: bool,

    pub pic_width_in_mbs_minus1: u32,
    pub pic_height_in_map_units_minus1: u32,
    pub frame_mbs_only_flag: bool,

    pub vui_parameters_present_flag: bool,
    pub bitstream_restriction_flag: bool,
    pub max_num_reorder_frames: u32,
    pub max_dec_frame_buffering: u32,
}

impl Sps {
    pub fn max_frame_num(&self) -> i32 {
        1i32 << (self.log2_max_frame_num_minus4 as u32 + 4)
    }

    pub fn max_pic_order_cnt_lsb(&self) -> i32 {
        1i32 << (self.log2_max_pic_order_cnt_lsb_minus4 as u32 + 4)
    }

    pub fn max_num_pics(&self) -> usize {
        (self.max_num_ref_frames as usize + 1).max(1)
    }
}

/// Picture Parameter Set fields consumed by the core (spec §6). The core
/// itself only needs `seq_parameter_set_id` to resolve the active SPS; the
/// remaining fields are carried because a real `Codec` submission needs
/// them and the spec lists them as part of the PPS record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pps {
    pub pic_parameter_set_id: PpsId,
    pub seq_parameter_set_id: SpsId,
    pub entropy_coding_mode_flag: bool,
    pub weighted_pred_flag: bool,
    pub weighted_bipred_idc: u8,
    pub pic_order_present_flag: bool,
    pub deblocking_filter_control_present_flag: bool,
    pub transform_8x8_mode_flag: bool,
    pub constrained_intra_pred_flag: bool,
    pub redundant_pic_cnt_present_flag: bool,
}

/// Slice type per ITU-T H.264 Table 7-6 (mod 5 collapses SP/SI aliases).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliceType {
    P,
    B,
    I,
    Sp,
    Si,
}

impl SliceType {
    pub fn is_p_or_sp(self) -> bool {
        matches!(self, SliceType::P | SliceType::Sp)
    }
    pub fn is_b(self) -> bool {
        matches!(self, SliceType::B)
    }
    pub fn is_intra_only(self) -> bool {
        matches!(self, SliceType::I | SliceType::Si)
    }
}

/// A single `ref_pic_list_modification` entry: `(idc, value)` per §4.4.
/// `idc` 0/1 reorder short-term references, `idc` 2 reorders a long-term
/// reference by `LongTermPicNum`, `idc` 3 terminates the list early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefPicListModOp {
    pub idc: u8,
    pub value: u32,
}

/// One `memory_management_control_operation` record (§4.5, §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MmcoOp {
    pub operation: u8,
    pub diff_of_pic_nums_minus1: u32,
    pub long_term_pic_num: u32,
    pub long_term_frame_idx: u32,
    pub max_long_term_frame_idx_plus1: u32,
}

/// Slice header fields consumed by the core (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceHeader {
    pub first_mb_in_slice: u32,
    pub slice_type: SliceType,
    pub pic_parameter_set_id: PpsId,
    pub frame_num: i32,
    pub idr_pic_flag: bool,
    pub field_pic_flag: bool,
    pub bottom_field_flag: bool,
    pub pic_order_cnt_lsb: i32,
    pub delta_pic_order_cnt: [i32; 2],
    pub delta_pic_order_cnt_bottom: i32,
    pub nal_ref_idc: u8,

    pub num_ref_idx_l0_active_minus1: u32,
    pub num_ref_idx_l1_active_minus1: u32,
    pub ref_pic_list_modification_flag_l0: bool,
    pub ref_pic_list_modification_flag_l1: bool,
    pub ref_list_l0_modifications: Vec<RefPicListModOp>,
    pub ref_list_l1_modifications: Vec<RefPicListModOp>,

    /// `idr_pic_flag` slices only.
    pub no_output_of_prior_pics_flag: bool,
    pub long_term_reference_flag: bool,
    pub adaptive_ref_pic_marking_mode_flag: bool,
    pub ref_pic_marking: Vec<MmcoOp>,
}

impl SliceHeader {
    pub fn is_idr(&self) -> bool {
        self.idr_pic_flag
    }

    pub fn is_ref(&self) -> bool {
        self.nal_ref_idc > 0
    }
}

/// The external bitstream-parsing capability. `spec.md` §1 and §6 delegate
/// byte-level Annex-B parsing entirely to an implementer; the core only
/// drives this trait.
pub trait Parser {
    type Error: std::fmt::Display;

    fn set_stream(&mut self, bytes: &[u8]);

    /// Advances to the next NAL unit, or `Ok(None)` at end of stream.
    fn advance_to_next_nalu(&mut self) -> Result<Option<Nalu>, Self::Error>;

    fn parse_sps(&mut self) -> Result<SpsId, Self::Error>;
    fn parse_pps(&mut self) -> Result<PpsId, Self::Error>;
    fn parse_slice_header(&mut self, nalu: &Nalu) -> Result<SliceHeader, Self::Error>;

    fn get_sps(&self, id: SpsId) -> Option<&Sps>;
    fn get_pps(&self, id: PpsId) -> Option<&Pps>;
}
