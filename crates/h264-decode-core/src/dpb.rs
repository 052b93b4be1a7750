//! The Decoded Picture Buffer (spec §3, §4.1).

use tracing::{debug, warn};

use crate::error::{DecoderError, Result};
use crate::picture::Picture;
use crate::types::Field;

/// Upper bound on `max_num_pics` for frame-only coding (spec §3).
pub const DPB_MAX: usize = 16;

/// An ordered collection of [`Picture`]s, insertion order == decode order.
///
/// Invariants maintained by this type (spec §4.1):
/// - I1: `len() <= max_num_pics` at every observable state.
/// - I2: POCs of pictures in the DPB are unique.
/// - I3: a picture is "ref" iff `count_refs` counts it.
/// - I4: a picture is dropped only via `delete_unused` (both
///   `was_output && !is_ref`) or an explicit `delete_by_poc`.
#[derive(Debug, Default)]
pub struct Dpb {
    pictures: Vec<Picture>,
    max_num_pics: usize,
}

impl Dpb {
    pub fn new() -> Self {
        Self {
            pictures: Vec::new(),
            max_num_pics: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.pictures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pictures.is_empty()
    }

    pub fn max_num_pics(&self) -> usize {
        self.max_num_pics
    }

    pub fn iter(&self) -> impl Iterator<Item = &Picture> {
        self.pictures.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Picture> {
        self.pictures.iter_mut()
    }

    /// Sets the DPB capacity. If `n < len()`, truncates from the tail; the
    /// spec notes this only happens during an SPS transition at IDR, which
    /// is benign because IDR flushes the DPB first.
    pub fn set_max_num_pics(&mut self, n: usize) {
        let n = n.min(DPB_MAX);
        self.max_num_pics = n;
        if self.pictures.len() > n {
            self.pictures.truncate(n);
        }
    }

    /// Appends `pic`. Fails with `DpbFull` if at capacity.
    pub fn store(&mut self, pic: Picture) -> Result<()> {
        if self.pictures.len() >= self.max_num_pics {
            return Err(DecoderError::DpbFull {
                context: format!(
                    "store: len={} max_num_pics={}",
                    self.pictures.len(),
                    self.max_num_pics
                ),
            });
        }
        self.pictures.push(pic);
        Ok(())
    }

    /// Removes exactly the picture whose `pic_order_cnt == poc`.
    pub fn delete_by_poc(&mut self, poc: i32) -> Result<Picture> {
        let idx = self
            .pictures
            .iter()
            .position(|p| p.pic_order_cnt == poc)
            .ok_or_else(|| DecoderError::InvalidStream(format!("delete_by_poc: missing poc {poc}")))?;
        Ok(self.pictures.remove(idx))
    }

    /// Removes all pictures with `was_output && !is_ref` (I4).
    pub fn delete_unused(&mut self) {
        self.pictures.retain(|p| !p.is_purgeable());
    }

    pub fn clear(&mut self) {
        self.pictures.clear();
    }

    pub fn mark_all_non_ref(&mut self) {
        for p in self.pictures.iter_mut() {
            p.is_ref = false;
        }
    }

    pub fn count_refs(&self) -> usize {
        self.pictures.iter().filter(|p| p.is_ref).count()
    }

    pub fn short_ref_by_pic_num(&self, pic_num: i32) -> Option<&Picture> {
        self.pictures
            .iter()
            .find(|p| p.is_ref && !p.is_long_term && p.pic_num == pic_num)
    }

    pub fn short_ref_by_pic_num_mut(&mut self, pic_num: i32) -> Option<&mut Picture> {
        self.pictures
            .iter_mut()
            .find(|p| p.is_ref && !p.is_long_term && p.pic_num == pic_num)
    }

    pub fn long_ref_by_lt_pic_num(&self, long_term_pic_num: i32) -> Option<&Picture> {
        self.pictures
            .iter()
            .find(|p| p.is_ref && p.is_long_term && p.long_term_pic_num == long_term_pic_num)
    }

    pub fn long_ref_by_lt_frame_idx_mut(&mut self, long_term_frame_idx: i32) -> Option<&mut Picture> {
        self.pictures
            .iter_mut()
            .find(|p| p.is_ref && p.is_long_term && p.long_term_frame_idx == long_term_frame_idx)
    }

    /// The short-term reference with the lowest `frame_num_wrap`, used by
    /// sliding-window marking (§4.5) to pick an eviction candidate.
    pub fn lowest_frame_num_wrap_short_ref(&self) -> Option<&Picture> {
        self.pictures
            .iter()
            .filter(|p| p.is_ref && !p.is_long_term)
            .min_by_key(|p| p.frame_num_wrap)
    }

    pub fn lowest_frame_num_wrap_short_ref_mut(&mut self) -> Option<&mut Picture> {
        let poc = self.lowest_frame_num_wrap_short_ref().map(|p| p.pic_order_cnt)?;
        self.pictures.iter_mut().find(|p| p.pic_order_cnt == poc)
    }

    /// Appends every picture with `!was_output` into `out`, without
    /// clearing it first (spec §4.1 collectors).
    pub fn collect_not_output<'a>(&'a self, out: &mut Vec<&'a Picture>) {
        out.extend(self.pictures.iter().filter(|p| !p.was_output));
    }

    pub fn collect_short_refs<'a>(&'a self, out: &mut Vec<&'a Picture>) {
        out.extend(self.pictures.iter().filter(|p| p.is_ref && !p.is_long_term));
    }

    pub fn collect_long_refs<'a>(&'a self, out: &mut Vec<&'a Picture>) {
        out.extend(self.pictures.iter().filter(|p| p.is_ref && p.is_long_term));
    }

    /// Read-only diagnostic mirroring the original `DPB::ActiveRefPicsCount`
    /// (SPEC_FULL.md §2); used only by the output scheduler's bumping
    /// decision.
    pub fn needs_output_bumping(&self, max_num_pics: usize) -> bool {
        let not_output = self.pictures.iter().filter(|p| !p.was_output).count();
        not_output + 1 > max_num_pics.max(1)
    }
}

/// PicNum maintenance (§4.3): before building reference lists for a new
/// picture, refresh `frame_num_wrap`/`pic_num`/`long_term_pic_num` for every
/// reference in the DPB relative to the current picture's `frame_num`.
pub fn update_pic_nums(dpb: &mut Dpb, curr_frame_num: i32, max_frame_num: i32) -> Result<()> {
    for p in dpb.iter_mut() {
        if !p.field.is_progressive() {
            return Err(DecoderError::from(
                crate::error::UnsupportedReason::InterlacedNotSupported,
            ));
        }
        if !p.is_ref {
            continue;
        }
        if p.is_long_term {
            p.long_term_pic_num = p.long_term_frame_idx;
            continue;
        }
        p.frame_num_wrap = if p.frame_num > curr_frame_num {
            p.frame_num - max_frame_num
        } else {
            p.frame_num
        };
        p.pic_num = p.frame_num_wrap;
    }
    Ok(())
}

/// Diagnostic-only surface/reference lookup fallback (§4.1): missing POC
/// lookups never error the stream.
pub fn log_missing_poc(context: &str, poc: i32) {
    warn!(poc, context, "reference lookup missed; falling back to neutral descriptor");
}

pub fn log_missing_eviction_candidate(context: &str) {
    debug!(context, "no eviction candidate found; leaving DPB as-is");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BitstreamId;

    fn pic(poc: i32, bsid: u64) -> Picture {
        let mut p = Picture::new(BitstreamId(bsid));
        p.pic_order_cnt = poc;
        p
    }

    #[test]
    fn store_respects_capacity() {
        let mut dpb = Dpb::new();
        dpb.set_max_num_pics(1);
        dpb.store(pic(0, 0)).unwrap();
        let err = dpb.store(pic(1, 1)).unwrap_err();
        assert!(matches!(err, DecoderError::DpbFull { .. }));
    }

    #[test]
    fn set_max_num_pics_truncates_from_tail() {
        let mut dpb = Dpb::new();
        dpb.set_max_num_pics(3);
        dpb.store(pic(0, 0)).unwrap();
        dpb.store(pic(2, 1)).unwrap();
        dpb.store(pic(4, 2)).unwrap();
        dpb.set_max_num_pics(2);
        assert_eq!(dpb.len(), 2);
        assert_eq!(dpb.iter().map(|p| p.pic_order_cnt).collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn delete_by_poc_missing_is_an_error() {
        let mut dpb = Dpb::new();
        dpb.set_max_num_pics(4);
        let err = dpb.delete_by_poc(99).unwrap_err();
        assert!(matches!(err, DecoderError::InvalidStream(_)));
    }

    #[test]
    fn delete_unused_only_removes_output_non_ref() {
        let mut dpb = Dpb::new();
        dpb.set_max_num_pics(4);
        let mut a = pic(0, 0);
        a.was_output = true;
        a.is_ref = false;
        let mut b = pic(1, 1);
        b.was_output = true;
        b.is_ref = true;
        dpb.store(a).unwrap();
        dpb.store(b).unwrap();
        dpb.delete_unused();
        assert_eq!(dpb.len(), 1);
        assert_eq!(dpb.iter().next().unwrap().pic_order_cnt, 1);
    }

    #[test]
    fn lowest_frame_num_wrap_picks_minimum_among_short_refs() {
        let mut dpb = Dpb::new();
        dpb.set_max_num_pics(4);
        for (poc, fnw) in [(0, 5), (1, -2), (2, 3)] {
            let mut p = pic(poc, poc as u64);
            p.is_ref = true;
            p.frame_num_wrap = fnw;
            dpb.store(p).unwrap();
        }
        assert_eq!(dpb.lowest_frame_num_wrap_short_ref().unwrap().pic_order_cnt, 1);
    }

    #[test]
    fn update_pic_nums_wraps_relative_to_curr_frame_num() {
        let mut dpb = Dpb::new();
        dpb.set_max_num_pics(4);
        let mut p = pic(0, 0);
        p.is_ref = true;
        p.frame_num = 14;
        dpb.store(p).unwrap();
        update_pic_nums(&mut dpb, 2, 16).unwrap();
        let p = dpb.iter().next().unwrap();
        assert_eq!(p.frame_num_wrap, 14 - 16);
        assert_eq!(p.pic_num, -2);
    }

    #[test]
    fn update_pic_nums_is_idempotent_when_frame_num_unchanged() {
        let mut dpb = Dpb::new();
        dpb.set_max_num_pics(4);
        let mut p = pic(0, 0);
        p.is_ref = true;
        p.frame_num = 5;
        dpb.store(p).unwrap();
        update_pic_nums(&mut dpb, 10, 16).unwrap();
        let first = dpb.iter().next().unwrap().pic_num;
        update_pic_nums(&mut dpb, 10, 16).unwrap();
        let second = dpb.iter().next().unwrap().pic_num;
        assert_eq!(first, second);
    }

    #[test]
    fn update_pic_nums_rejects_interlaced() {
        let mut dpb = Dpb::new();
        dpb.set_max_num_pics(4);
        let mut p = pic(0, 0);
        p.is_ref = true;
        p.field = Field::Top;
        dpb.store(p).unwrap();
        let err = update_pic_nums(&mut dpb, 0, 16).unwrap_err();
        assert!(matches!(
            err,
            DecoderError::UnsupportedStream(crate::error::UnsupportedReason::InterlacedNotSupported)
        ));
    }
}

#[cfg(test)]
mod pic_num_properties {
    use super::*;
    use crate::types::{BitstreamId, Field};
    use proptest::prelude::*;

    fn short_ref(frame_num: i32) -> Picture {
        let mut p = Picture::new(BitstreamId(0));
        p.is_ref = true;
        p.field = Field::None;
        p.frame_num = frame_num;
        p
    }

    proptest! {
        /// Calling `update_pic_nums` twice with the same `curr_frame_num`
        /// leaves `pic_num`/`frame_num_wrap` unchanged: the derivation
        /// depends only on `frame_num` and `curr_frame_num`, never on
        /// prior `pic_num`/`frame_num_wrap` values (§4.2).
        #[test]
        fn update_pic_nums_idempotent_for_short_term_refs(
            frame_num in 0i32..16,
            curr_frame_num in 0i32..16,
        ) {
            let max_frame_num = 16;
            let mut dpb = Dpb::new();
            dpb.set_max_num_pics(4);
            dpb.store(short_ref(frame_num)).unwrap();

            update_pic_nums(&mut dpb, curr_frame_num, max_frame_num).unwrap();
            let first = (dpb.iter().next().unwrap().pic_num, dpb.iter().next().unwrap().frame_num_wrap);

            update_pic_nums(&mut dpb, curr_frame_num, max_frame_num).unwrap();
            let second = (dpb.iter().next().unwrap().pic_num, dpb.iter().next().unwrap().frame_num_wrap);

            prop_assert_eq!(first, second);
        }

        /// A long-term reference's `long_term_pic_num` always resolves to
        /// `long_term_frame_idx`, regardless of `curr_frame_num` (§4.2):
        /// long-term identity doesn't wrap against `frame_num`.
        #[test]
        fn long_term_pic_num_tracks_frame_idx_regardless_of_curr_frame_num(
            long_term_frame_idx in 0i32..16,
            curr_frame_num in 0i32..16,
        ) {
            let mut dpb = Dpb::new();
            dpb.set_max_num_pics(4);
            let mut p = short_ref(0);
            p.is_long_term = true;
            p.long_term_frame_idx = long_term_frame_idx;
            dpb.store(p).unwrap();

            update_pic_nums(&mut dpb, curr_frame_num, 16).unwrap();
            prop_assert_eq!(dpb.iter().next().unwrap().long_term_pic_num, long_term_frame_idx);
        }
    }
}
