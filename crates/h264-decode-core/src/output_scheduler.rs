//! Output reordering (spec §4.6): chooses when a finished picture is safe
//! to hand back to the client while preserving non-decreasing POC order.

use tracing::debug;

use crate::dpb::Dpb;
use crate::error::{DecoderError, Result};
use crate::picture::Picture;
use crate::surface_pool::SurfacePool;

/// One emitted picture: what the client-facing `picture_ready` callback
/// needs (spec §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    pub bitstream_id: crate::types::BitstreamId,
    pub pic_order_cnt: i32,
}

/// Tracks the last emitted POC across `finish_picture` calls, asserting
/// non-decreasing output order (§4.6, §8 testable property).
#[derive(Debug)]
pub struct OutputScheduler {
    last_output_poc: i32,
}

impl Default for OutputScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputScheduler {
    pub fn new() -> Self {
        Self { last_output_poc: i32::MIN }
    }

    /// Runs the `FinishPicture` bumping algorithm (§4.6) for `curr`, which
    /// is moved into the DPB (or dropped) by this call; returns the
    /// pictures that became safe to emit, in ascending POC order.
    ///
    /// `curr` must already have marking/POC carry-over applied.
    pub fn finish_picture(
        &mut self,
        dpb: &mut Dpb,
        pool: &mut SurfacePool,
        max_num_pics: usize,
        max_num_reorder_frames: usize,
        mut curr: Picture,
    ) -> Result<Vec<Emission>> {
        dpb.delete_unused();

        let curr_poc = curr.pic_order_cnt;
        let mut pending: Vec<i32> = {
            let mut v: Vec<&Picture> = Vec::new();
            dpb.collect_not_output(&mut v);
            v.into_iter().map(|p| p.pic_order_cnt).collect()
        };
        pending.push(curr_poc);
        pending.sort_unstable();

        let mut emissions = Vec::new();
        while pending.len() > max_num_reorder_frames {
            let poc = pending.remove(0);
            if poc < self.last_output_poc {
                return Err(DecoderError::InvalidStream(format!(
                    "output order violation: poc {} emitted after {}",
                    poc, self.last_output_poc
                )));
            }
            self.last_output_poc = poc;

            if poc == curr_poc {
                curr.was_output = true;
                emissions.push(Emission { bitstream_id: curr.bitstream_id, pic_order_cnt: poc });
                if !curr.is_ref {
                    pool.release(poc);
                }
            } else {
                let found = dpb.iter().find(|p| p.pic_order_cnt == poc).map(|p| (p.bitstream_id, p.is_ref));
                mark_output_in_place(dpb, poc);
                if let Some((bitstream_id, is_ref)) = found {
                    emissions.push(Emission { bitstream_id, pic_order_cnt: poc });
                    if !is_ref {
                        pool.release(poc);
                        dpb.delete_by_poc(poc)?;
                    }
                }
            }
        }

        if !curr.was_output || curr.is_ref {
            if dpb.len() >= max_num_pics {
                return Err(DecoderError::DpbFull {
                    context: format!("finish_picture: len={} max_num_pics={}", dpb.len(), max_num_pics),
                });
            }
            dpb.store(curr)?;
        }

        Ok(emissions)
    }

    /// `Flush` (§4.6): emit every remaining not-output picture ascending
    /// by POC, then clear the DPB and reset `last_output_poc`.
    pub fn flush(&mut self, dpb: &mut Dpb, pool: &mut SurfacePool) -> Vec<Emission> {
        let mut remaining: Vec<&Picture> = Vec::new();
        dpb.collect_not_output(&mut remaining);
        let mut remaining: Vec<Picture> = remaining.into_iter().cloned().collect();
        remaining.sort_by_key(|p| p.pic_order_cnt);

        let emissions = remaining
            .iter()
            .map(|p| Emission { bitstream_id: p.bitstream_id, pic_order_cnt: p.pic_order_cnt })
            .collect();

        for p in &remaining {
            pool.release(p.pic_order_cnt);
        }
        dpb.clear();
        self.last_output_poc = i32::MIN;
        emissions
    }

    /// `Reset` (§4.6, §4.8): discard without emitting. Per §8's round-trip
    /// property, this leaves `last_output_poc` at the same `MIN` sentinel
    /// a fresh `Initialize` would.
    pub fn reset(&mut self, dpb: &mut Dpb, pool: &mut SurfacePool) {
        dpb.clear();
        pool.release_all();
        self.last_output_poc = i32::MIN;
        debug!("output scheduler reset; in-flight picture discarded without emission");
    }

    /// Rewinds `last_output_poc` to `MIN` without touching the DPB or
    /// surface pool, for the IDR path of `start_new_frame` (§4.8), which
    /// clears the DPB itself before this is called.
    pub fn reset_last_output_poc(&mut self) {
        self.last_output_poc = i32::MIN;
    }
}

fn mark_output_in_place(dpb: &mut Dpb, poc: i32) {
    if let Some(p) = dpb.iter_mut().find(|p| p.pic_order_cnt == poc) {
        p.was_output = true;
    }
}
