// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use clap::Parser;
use std::path::PathBuf;
use std::fs;
use serde::Serialize;
use anyhow::{Context, Result};

use easel_kernel::raster::BitmapFactory;
use easel_kernel::snapshot::decode::decode_sync_state;
use easel_kernel::snapshot::encode::SCHEMA_VERSION;
use easel_kernel::snapshot::hash::{hash_bytes, hash_model, to_hex};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a dumped sync state (e.g. room.easel)
    state: PathBuf,

    /// Expected canvas hash (hex); exit with an error on mismatch
    #[arg(long)]
    expect: Option<String>,
}

#[derive(Serialize, Debug)]
struct Report {
    schema_version: u32,
    input_hash: String,
    checkpoint_hash: String,
    events: usize,
    revoked: usize,
    layers: usize,
    canvas_hash: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    eprintln!("Easel Verifier v{}", env!("CARGO_PKG_VERSION"));

    // 1. Load and decode the container
    let bytes = fs::read(&args.state).context("Failed to read sync state file")?;
    let state = decode_sync_state(&bytes).context("Failed to decode sync state")?;

    // 2. Hash the checkpoint alone, then replay the retained history on top
    let checkpoint = state
        .checkpoint
        .restore(&BitmapFactory)
        .context("Failed to restore checkpoint")?;
    let model = state.replay(&BitmapFactory).context("Replay failed")?;

    let report = Report {
        schema_version: SCHEMA_VERSION,
        input_hash: to_hex(&hash_bytes(&bytes)),
        checkpoint_hash: to_hex(&hash_model(&checkpoint)),
        events: state.history.len(),
        revoked: state.history.iter().filter(|e| e.is_revoked).count(),
        layers: model.len(),
        canvas_hash: to_hex(&hash_model(&model)),
    };

    // 3. Output JSON
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(expected) = args.expect {
        if !expected.eq_ignore_ascii_case(&report.canvas_hash) {
            anyhow::bail!("Canvas hash mismatch: expected {}, replayed {}", expected, report.canvas_hash);
        }
    }
    Ok(())
}
