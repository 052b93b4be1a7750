//! Client-facing command/event surface (spec §5, §6), modeled as two
//! directional enums the way the surrounding pack models UI↔core traffic.

use crate::error::DecoderError;
use crate::types::{BitstreamId, SurfaceHandle, VisibleRect};

/// Client → decoder. Processed on the decoder context (spec §5); queued
/// from the client context via [`crate::worker::DecoderHandle`].
#[derive(Debug, Clone)]
pub enum Command {
    Initialize { config_hint: Option<u8> },
    Decode { bitstream_id: BitstreamId, data: Vec<u8> },
    AssignPictureBuffers { surfaces: Vec<SurfaceHandle> },
    ReusePictureBuffer { surface: SurfaceHandle },
    Flush,
    Reset,
    Destroy,
}

/// Decoder → client callbacks (spec §6). Emitted from the decoder context,
/// delivered to the client context via the same channel pair.
#[derive(Debug, Clone)]
pub enum Event {
    InitializeComplete { success: bool },
    ProvidePictureBuffers { count: usize, width: u32, height: u32 },
    PictureReady {
        bitstream_id: BitstreamId,
        pic_order_cnt: i32,
        visible_rect: VisibleRect,
    },
    NotifyEndOfBitstreamBuffer { bitstream_id: BitstreamId },
    NotifyFlushDone,
    NotifyResetDone,
    NotifyError { kind: DecoderError },
}

/// Synchronous callback surface, implemented by a client that wants direct
/// calls instead of draining an `Event` channel (spec §6's `Client
/// capability`). The CLI demo and in-process tests use this; the
/// channel-based [`crate::worker`] path is for genuine two-thread use.
pub trait ClientCallbacks {
    fn initialize_complete(&mut self, success: bool);
    fn provide_picture_buffers(&mut self, count: usize, width: u32, height: u32);
    fn picture_ready(&mut self, bitstream_id: BitstreamId, pic_order_cnt: i32, visible_rect: VisibleRect);
    fn notify_end_of_bitstream_buffer(&mut self, bitstream_id: BitstreamId);
    fn notify_flush_done(&mut self);
    fn notify_reset_done(&mut self);
    fn notify_error(&mut self, err: &DecoderError);
}

/// A [`ClientCallbacks`] that records every call, for tests and for the CLI
/// demo's summary printout.
#[derive(Debug, Default)]
pub struct RecordingClient {
    pub events: Vec<Event>,
}

impl ClientCallbacks for RecordingClient {
    fn initialize_complete(&mut self, success: bool) {
        self.events.push(Event::InitializeComplete { success });
    }

    fn provide_picture_buffers(&mut self, count: usize, width: u32, height: u32) {
        self.events.push(Event::ProvidePictureBuffers { count, width, height });
    }

    fn picture_ready(&mut self, bitstream_id: BitstreamId, pic_order_cnt: i32, visible_rect: VisibleRect) {
        self.events.push(Event::PictureReady { bitstream_id, pic_order_cnt, visible_rect });
    }

    fn notify_end_of_bitstream_buffer(&mut self, bitstream_id: BitstreamId) {
        self.events.push(Event::NotifyEndOfBitstreamBuffer { bitstream_id });
    }

    fn notify_flush_done(&mut self) {
        self.events.push(Event::NotifyFlushDone);
    }

    fn notify_reset_done(&mut self) {
        self.events.push(Event::NotifyResetDone);
    }

    fn notify_error(&mut self, err: &DecoderError) {
        self.events.push(Event::NotifyError { kind: err.clone() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_client_accumulates_events_in_call_order() {
        let mut client = RecordingClient::default();
        client.initialize_complete(true);
        client.notify_flush_done();
        assert_eq!(client.events.len(), 2);
        assert!(matches!(client.events[0], Event::InitializeComplete { success: true }));
        assert!(matches!(client.events[1], Event::NotifyFlushDone));
    }
}
