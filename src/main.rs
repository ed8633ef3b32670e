use accident_ingest::{
    export::{self, ExportOptions},
    normalize::{date_parser, DateGranularity, Value},
    pipeline, presets,
    query::{self, Filter},
    HeaderMode, IngestConfig, TextEncoding,
};
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Load an accident CSV upload, normalize it and report what happened.
#[derive(Parser, Debug)]
#[command(name = "accident-ingest", version, about)]
struct Cli {
    /// The uploaded CSV file.
    input: PathBuf,

    /// YAML or JSON file with `load` hints and a `schema`.
    #[arg(long, conflicts_with = "preset")]
    config: Option<PathBuf>,

    /// Built-in schema: hourly_occurrences or highway_accidents.
    #[arg(long)]
    preset: Option<String>,

    /// Force the text encoding (e.g. utf-8, latin1, cp1252).
    #[arg(long)]
    encoding: Option<String>,

    /// Force the field delimiter; `tab` for a tab.
    #[arg(long)]
    delimiter: Option<String>,

    /// The file has no header row; columns follow the schema order.
    #[arg(long)]
    no_header: bool,

    /// Keep rows with COL between MIN and MAX (either side may be empty).
    #[arg(long = "range", value_name = "COL=MIN..MAX", value_parser = parse_range)]
    ranges: Vec<Filter>,

    /// Keep rows whose COL is one of the listed values.
    #[arg(long = "only", value_name = "COL=A,B", value_parser = parse_only)]
    only: Vec<Filter>,

    /// Write the selected rows as canonical CSV.
    #[arg(long)]
    export: Option<PathBuf>,

    /// Write the selected rows as Parquet.
    #[arg(long)]
    parquet: Option<PathBuf>,
}

#[derive(Serialize)]
struct Output<'a> {
    #[serde(flatten)]
    summary: pipeline::Summary<'a>,
    selected_rows: usize,
}

fn main() -> Result<()> {
    // 1) init logging; stdout is reserved for the JSON summary
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // 2) resolve hints + schema
    let mut config = match (&cli.config, &cli.preset) {
        (Some(path), _) => IngestConfig::from_path(path)?,
        (None, Some(name)) => IngestConfig::new(presets::by_name(name).ok_or_else(|| {
            anyhow!("unknown preset `{}` (known: {})", name, presets::NAMES.join(", "))
        })?),
        (None, None) => bail!("either --config or --preset is required"),
    };
    if let Some(label) = &cli.encoding {
        let enc = TextEncoding::from_label(label)
            .ok_or_else(|| anyhow!("unknown encoding `{}`", label))?;
        config.load.encoding = Some(enc);
    }
    if let Some(d) = &cli.delimiter {
        config.load.delimiter = Some(parse_delimiter(d)?);
    }
    if cli.no_header {
        config.load.header = HeaderMode::from_spec(&config.schema);
    }

    // 3) run the pipeline
    let bytes = fs::read(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let ingested = pipeline::run(&bytes, &config.load, &config.schema)
        .map_err(|e| anyhow!("{} failed: {}", e.step(), e))?;
    for line in ingested.report.summary_lines() {
        warn!("{}", line);
    }

    // 4) filters
    let filters: Vec<Filter> = cli.ranges.iter().chain(&cli.only).cloned().collect();
    let selected = query::apply(&ingested.table, &filters)?;
    info!(filters = filters.len(), selected = selected.len(), "filters applied");

    // 5) exports
    if let Some(path) = &cli.export {
        export::write_csv(&ingested.table, Some(&selected), ExportOptions::default(), path)?;
        info!(path = %path.display(), "csv written");
    }
    if let Some(path) = &cli.parquet {
        export::write_parquet(&ingested.table, Some(&selected), path)?;
    }

    let out = Output {
        summary: ingested.summary(),
        selected_rows: selected.len(),
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn parse_delimiter(s: &str) -> Result<char> {
    match s {
        "tab" | "\\t" => Ok('\t'),
        _ => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => bail!("delimiter must be a single character, got `{}`", s),
            }
        }
    }
}

/// Best typed reading of a bound typed on the command line.
fn parse_value(s: &str) -> Value {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Value::Float(f);
    }
    match date_parser::parse_date(s, DateGranularity::Millisecond) {
        Some(d) => Value::Date(d),
        None => Value::Str(s.to_string()),
    }
}

fn split_assignment(s: &str) -> Result<(&str, &str), String> {
    s.split_once('=')
        .map(|(c, v)| (c.trim(), v))
        .filter(|(c, _)| !c.is_empty())
        .ok_or_else(|| format!("expected COL=..., got `{}`", s))
}

fn parse_range(s: &str) -> Result<Filter, String> {
    let (column, bounds) = split_assignment(s)?;
    let (lo, hi) = bounds
        .split_once("..")
        .ok_or_else(|| format!("expected MIN..MAX, got `{}`", bounds))?;
    let bound = |b: &str| (!b.trim().is_empty()).then(|| parse_value(b));
    Ok(Filter::range(column, bound(lo), bound(hi)))
}

fn parse_only(s: &str) -> Result<Filter, String> {
    let (column, values) = split_assignment(s)?;
    Ok(Filter::one_of(column, values.split(',').map(parse_value)))
}
