//! Correlates (POC, bitstream_id, hardware surface) triples and enforces
//! capacity backpressure (spec §4.7).

use std::collections::HashMap;

use tracing::debug;

use crate::error::{DecoderError, Result};
use crate::types::{BitstreamId, SurfaceHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Binding {
    surface: SurfaceHandle,
    bitstream_id: BitstreamId,
}

/// A fixed-capacity surface pool (§4.7). `available` is a free list of
/// handles; `bindings` maps POC to the surface currently assigned to it.
#[derive(Debug)]
pub struct SurfacePool {
    capacity: usize,
    available: Vec<SurfaceHandle>,
    bindings: HashMap<i32, Binding>,
}

impl SurfacePool {
    /// Builds a pool of `capacity` freshly numbered handles.
    pub fn new(capacity: usize) -> Self {
        let available = (0..capacity as u32).map(SurfaceHandle).collect();
        Self {
            capacity,
            available,
            bindings: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    /// Draws a free surface and binds it to `poc`. `NoSurfaces` is a soft
    /// error: the caller pauses the decode loop rather than failing the
    /// stream (§4.7, §7).
    pub fn assign(&mut self, bitstream_id: BitstreamId, poc: i32) -> Result<SurfaceHandle> {
        let surface = self.available.pop().ok_or(DecoderError::NoSurfaces)?;
        self.bindings.insert(poc, Binding { surface, bitstream_id });
        Ok(surface)
    }

    /// Returns the surface bound to `poc` to `available`. Absent POC is
    /// diagnostic-only (§4.7): callers may release a POC whose picture was
    /// already purged from the DPB.
    pub fn release(&mut self, poc: i32) {
        match self.bindings.remove(&poc) {
            Some(binding) => self.available.push(binding.surface),
            None => debug!(poc, "release: no surface bound to this poc"),
        }
    }

    pub fn lookup(&self, poc: i32) -> Option<SurfaceHandle> {
        self.bindings.get(&poc).map(|b| b.surface)
    }

    /// Releases every outstanding binding without returning handles (used
    /// by `Reset`/`Destroy`, where the client invalidates all surfaces).
    pub fn release_all(&mut self) {
        self.bindings.clear();
        self.available = (0..self.capacity as u32).map(SurfaceHandle).collect();
    }

    /// Reallocates to a new capacity (`AllocateNewSurfaces`, spec §4.8).
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.release_all();
    }
}
