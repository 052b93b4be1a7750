//! The decoder worker thread: client context and decoder context as two
//! cooperating threads communicating over `crossbeam_channel` FIFOs (spec
//! §5). The surrounding pack sketches this shape in `AsyncJobManager` but
//! leaves the actual thread unimplemented (`TODO Phase 2: Add actual
//! threadpool`); this module is that thread, specialized to one decoder
//! instead of a generic job queue.

use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{error, warn};

use crate::client::{ClientCallbacks, Command, Event};
use crate::codec::Codec;
use crate::decoder::{DecodeStatus, Decoder};
use crate::parser::Parser;
use crate::types::BitstreamId;

struct EventSink {
    tx: Sender<Event>,
}

impl ClientCallbacks for EventSink {
    fn initialize_complete(&mut self, success: bool) {
        self.send(Event::InitializeComplete { success });
    }

    fn provide_picture_buffers(&mut self, count: usize, width: u32, height: u32) {
        self.send(Event::ProvidePictureBuffers { count, width, height });
    }

    fn picture_ready(&mut self, bitstream_id: BitstreamId, pic_order_cnt: i32, visible_rect: crate::types::VisibleRect) {
        self.send(Event::PictureReady { bitstream_id, pic_order_cnt, visible_rect });
    }

    fn notify_end_of_bitstream_buffer(&mut self, bitstream_id: BitstreamId) {
        self.send(Event::NotifyEndOfBitstreamBuffer { bitstream_id });
    }

    fn notify_flush_done(&mut self) {
        self.send(Event::NotifyFlushDone);
    }

    fn notify_reset_done(&mut self) {
        self.send(Event::NotifyResetDone);
    }

    fn notify_error(&mut self, err: &crate::error::DecoderError) {
        self.send(Event::NotifyError { kind: err.clone() });
    }
}

impl EventSink {
    fn send(&self, event: Event) {
        if self.tx.send(event).is_err() {
            warn!("event channel closed, client context has gone away");
        }
    }
}

/// Client-side handle: owns the command sender and event receiver, per
/// spec §5's "communication is by message passing via ... FIFOs; no data
/// structure is shared read-write across contexts".
pub struct DecoderHandle {
    commands: Sender<Command>,
    events: Receiver<Event>,
    join: Option<JoinHandle<()>>,
}

impl DecoderHandle {
    /// Spawns the decoder context thread and returns the client-side
    /// handle. `parser`/`codec` are moved onto the worker thread; the
    /// client context never touches them again (shared-resource policy,
    /// spec §5).
    pub fn spawn<P, C>(parser: P, codec: C) -> Self
    where
        P: Parser + Send + 'static,
        C: Codec + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded::<Command>();
        let (evt_tx, evt_rx) = crossbeam_channel::unbounded::<Event>();

        let join = std::thread::Builder::new()
            .name("h264-decoder".into())
            .spawn(move || run_decoder_context(Decoder::new(parser, codec), cmd_rx, evt_tx))
            .expect("failed to spawn decoder context thread");

        Self { commands: cmd_tx, events: evt_rx, join: Some(join) }
    }

    pub fn initialize(&self) {
        let _ = self.commands.send(Command::Initialize { config_hint: None });
    }

    pub fn decode(&self, bitstream_id: BitstreamId, data: Vec<u8>) {
        let _ = self.commands.send(Command::Decode { bitstream_id, data });
    }

    pub fn assign_picture_buffers(&self, surfaces: Vec<crate::types::SurfaceHandle>) {
        let _ = self.commands.send(Command::AssignPictureBuffers { surfaces });
    }

    pub fn reuse_picture_buffer(&self, surface: crate::types::SurfaceHandle) {
        let _ = self.commands.send(Command::ReusePictureBuffer { surface });
    }

    pub fn flush(&self) {
        let _ = self.commands.send(Command::Flush);
    }

    pub fn reset(&self) {
        let _ = self.commands.send(Command::Reset);
    }

    /// Sends `Destroy` and joins the worker thread. Per spec §5, a
    /// permanently-stuck codec must not hang this: `Codec::reset`/
    /// `release` are expected to make bounded progress, and `Decoder`
    /// never blocks indefinitely itself.
    pub fn destroy(mut self) {
        let _ = self.commands.send(Command::Destroy);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                error!("decoder context thread panicked during destroy");
            }
        }
    }

    /// Non-blocking drain of pending client-bound events (spec §5
    /// suspension points: the client context never blocks on the decoder
    /// context).
    pub fn try_recv_events(&self) -> Vec<Event> {
        self.events.try_iter().collect()
    }

    /// Blocking drain used by tests and the CLI demo, bounded so a
    /// hung decoder context cannot wedge the caller forever.
    pub fn recv_events_timeout(&self, timeout: std::time::Duration) -> Vec<Event> {
        let mut out = Vec::new();
        match self.events.recv_timeout(timeout) {
            Ok(event) => out.push(event),
            Err(RecvTimeoutError::Timeout) => return out,
            Err(RecvTimeoutError::Disconnected) => return out,
        }
        out.extend(self.events.try_iter());
        out
    }
}

fn run_decoder_context<P, C>(mut decoder: Decoder<P, C>, commands: Receiver<Command>, events: Sender<Event>)
where
    P: Parser,
    C: Codec,
{
    let mut sink = EventSink { tx: events };

    while let Ok(command) = commands.recv() {
        match command {
            Command::Initialize { .. } => sink.initialize_complete(true),
            Command::Decode { bitstream_id, data } => {
                match decoder.decode(bitstream_id, &data, &mut sink) {
                    DecodeStatus::RanOutOfStreamData | DecodeStatus::RanOutOfSurfaces | DecodeStatus::DecodeError => {}
                }
            }
            Command::AssignPictureBuffers { .. } | Command::ReusePictureBuffer { .. } => {
                // Surface lifecycle is owned by `Decoder`'s internal
                // `SurfacePool`; the client-visible handles arrive back
                // through `PictureReady`/`ProvidePictureBuffers`. Nothing
                // further to do on this path in the current core.
            }
            Command::Flush => decoder.flush(&mut sink),
            Command::Reset => decoder.reset(&mut sink),
            Command::Destroy => {
                decoder.destroy(&mut sink);
                break;
            }
        }
    }
}
