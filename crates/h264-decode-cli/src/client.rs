//! A [`ClientCallbacks`] implementation that prints and records events,
//! standing in for a real renderer/presentation surface.

use h264_decode_core::{ClientCallbacks, DecoderError};
use h264_decode_core::types::{BitstreamId, VisibleRect};

#[derive(Debug, Default)]
pub struct PrintingClient {
    pub emitted: Vec<(u64, i32)>,
}

impl ClientCallbacks for PrintingClient {
    fn initialize_complete(&mut self, success: bool) {
        println!("InitializeComplete success={success}");
    }

    fn provide_picture_buffers(&mut self, count: usize, width: u32, height: u32) {
        println!("ProvidePictureBuffers count={count} width={width} height={height}");
    }

    fn picture_ready(&mut self, bitstream_id: BitstreamId, pic_order_cnt: i32, visible_rect: VisibleRect) {
        println!(
            "PictureReady bitstream_id={} poc={pic_order_cnt} visible={}x{}",
            bitstream_id.0, visible_rect.width, visible_rect.height
        );
        self.emitted.push((bitstream_id.0, pic_order_cnt));
    }

    fn notify_end_of_bitstream_buffer(&mut self, bitstream_id: BitstreamId) {
        println!("NotifyEndOfBitstreamBuffer bitstream_id={}", bitstream_id.0);
    }

    fn notify_flush_done(&mut self) {
        println!("NotifyFlushDone");
    }

    fn notify_reset_done(&mut self) {
        println!("NotifyResetDone");
    }

    fn notify_error(&mut self, err: &DecoderError) {
        eprintln!("NotifyError: {err}");
    }
}
