//! Print what the loader detects in a file without applying any schema.

use accident_ingest::load::{self, LoadHints};
use accident_ingest::normalize::utils::normalize_name;
use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::{fs, path::PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "sniff", about = "Detect encoding, delimiter and columns of a CSV upload")]
struct Args {
    input: PathBuf,

    /// Rows to echo back.
    #[arg(long, default_value_t = 3)]
    preview: usize,
}

#[derive(Serialize)]
struct Column<'a> {
    header: &'a str,
    normalized: String,
    filled: usize,
}

#[derive(Serialize)]
struct Sniffed<'a> {
    encoding: String,
    had_bom: bool,
    delimiter: String,
    rows: usize,
    columns: Vec<Column<'a>>,
    preview: Vec<&'a [Option<String>]>,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let bytes = fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let raw = load::load(&bytes, &LoadHints::default())
        .with_context(|| format!("loading {}", args.input.display()))?;

    let columns = raw
        .headers()
        .iter()
        .enumerate()
        .map(|(i, h)| Column {
            header: h,
            normalized: normalize_name(h),
            filled: raw.rows().iter().filter(|r| r[i].is_some()).count(),
        })
        .collect();

    let out = Sniffed {
        encoding: raw.encoding().to_string(),
        had_bom: raw.had_bom(),
        delimiter: match raw.delimiter() {
            b'\t' => "tab".to_string(),
            d => (d as char).to_string(),
        },
        rows: raw.len(),
        columns,
        preview: raw.rows().iter().take(args.preview).map(Vec::as_slice).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
