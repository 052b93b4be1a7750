//! Command-line demo driver for `h264-decode-core`.
//!
//! Byte-level Annex-B parsing is out of scope for the core (spec §1), so
//! this binary drives it with a synthetic GOP generator instead of a real
//! bitstream reader, and prints the picture-ready/emission order the core
//! produces.

use anyhow::Result;
use clap::{Parser as ClapParser, Subcommand};

mod client;
mod synthetic;

use client::PrintingClient;
use h264_decode_core::types::BitstreamId;
use h264_decode_core::{DecodeStatus, Decoder, NullCodec};
use synthetic::SyntheticParser;

/// h264-decode - demo driver for the H.264 decode-pipeline core
#[derive(ClapParser, Debug)]
#[command(name = "h264-decode")]
#[command(about = "Drive h264-decode-core with a synthetic bitstream", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a synthetic IDR + P-frame GOP through the decoder and print
    /// the emission order.
    Run {
        /// Number of pictures in the GOP, including the leading IDR.
        #[arg(short, long, default_value = "8")]
        gop_size: usize,

        /// Number of GOPs to feed.
        #[arg(short = 'n', long, default_value = "2")]
        count: usize,

        /// max_num_ref_frames to advertise in the synthetic SPS.
        #[arg(long, default_value = "4")]
        max_num_ref_frames: u32,
    },

    /// Print the `DecoderConfig` a synthetic SPS would derive, without
    /// decoding anything.
    Info {
        #[arg(long, default_value = "4")]
        max_num_ref_frames: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level.parse().unwrap_or(tracing::Level::WARN))
        .init();

    match cli.command {
        Commands::Run { gop_size, count, max_num_ref_frames } => run(gop_size, count, max_num_ref_frames),
        Commands::Info { max_num_ref_frames } => info(max_num_ref_frames),
    }
}

fn info(max_num_ref_frames: u32) -> Result<()> {
    let sps = synthetic::sample_sps(max_num_ref_frames);
    let cfg = h264_decode_core::DecoderConfig::from_sps(&sps, 0)?;
    println!("h264-decode-cli: derived DecoderConfig");
    println!("=======================================");
    println!("max_frame_num:            {}", cfg.max_frame_num);
    println!("max_pic_order_cnt_lsb:    {}", cfg.max_pic_order_cnt_lsb);
    println!("max_num_ref_frames:       {}", cfg.max_num_ref_frames);
    println!("max_num_pics:             {}", cfg.max_num_pics);
    println!("max_num_reorder_frames:   {}", cfg.max_num_reorder_frames);
    println!("pipeline_margin:          {}", cfg.pipeline_margin);
    Ok(())
}

fn run(gop_size: usize, count: usize, max_num_ref_frames: u32) -> Result<()> {
    let parser = SyntheticParser::new(gop_size, count, max_num_ref_frames);
    let mut decoder = Decoder::new(parser, NullCodec::default());
    let mut client = PrintingClient::default();

    let status = decoder.decode(BitstreamId(0), &[], &mut client);
    println!("decode() returned: {status:?}");
    decoder.flush(&mut client);

    println!();
    println!("pictures emitted (bitstream_id, poc):");
    for (bitstream_id, poc) in &client.emitted {
        println!("  {bitstream_id:>4}  poc={poc}");
    }
    println!("total emitted: {}", client.emitted.len());

    if matches!(status, DecodeStatus::DecodeError) {
        anyhow::bail!("decoder entered the error state, see logs above");
    }
    Ok(())
}
