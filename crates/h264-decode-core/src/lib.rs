//! H.264/AVC decode-pipeline core: reference-list and DPB management, POC
//! derivation, reference-picture marking, and output reordering, driven by
//! an async client/decoder-context worker on top of a caller-supplied
//! bitstream parser and hardware-decode backend.
//!
//! This crate implements the state machinery around a decode accelerator
//! (spec §4); it does not parse NAL units or run any actual decode — those
//! are the [`parser::Parser`] and [`codec::Codec`] capabilities a caller
//! plugs in.

pub mod client;
pub mod codec;
pub mod config;
pub mod decoder;
pub mod dpb;
pub mod error;
pub mod output_scheduler;
pub mod parser;
pub mod picture;
pub mod poc;
pub mod ref_list;
pub mod ref_marker;
pub mod surface_pool;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{ClientCallbacks, Command, Event, RecordingClient};
pub use codec::{Codec, IqMatrixParameters, NullCodec, PictureParameters, SliceParameters};
pub use config::DecoderConfig;
pub use decoder::{DecodeStatus, Decoder, DecoderState};
pub use error::{DecoderError, Result, UnsupportedReason};
pub use parser::Parser;
pub use worker::DecoderHandle;
