// src/pipeline.rs

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

use crate::error::IngestError;
use crate::load::{self, LoadHints, TextEncoding};
use crate::normalize::{self, CleanTable, CoercionReport, ColumnSpec};

/// Everything one upload produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub encoding: TextEncoding,
    pub delimiter: char,
    pub had_bom: bool,
    /// Data rows the loader produced, before any were dropped.
    pub raw_rows: usize,
    /// Header names as they appeared in the upload.
    pub raw_headers: Vec<String>,
    pub table: CleanTable,
    pub report: CoercionReport,
}

/// Serializable digest of an [`Ingested`] for logs and the CLI.
#[derive(Debug, Serialize)]
pub struct Summary<'a> {
    pub encoding: &'a str,
    pub delimiter: String,
    pub had_bom: bool,
    pub raw_rows: usize,
    pub raw_headers: &'a [String],
    pub columns: Vec<&'a str>,
    pub rows: usize,
    pub report: &'a CoercionReport,
    pub notes: Vec<String>,
}

impl Ingested {
    pub fn summary(&self) -> Summary<'_> {
        Summary {
            encoding: self.encoding.name(),
            delimiter: match self.delimiter {
                '\t' => "tab".to_string(),
                c => c.to_string(),
            },
            had_bom: self.had_bom,
            raw_rows: self.raw_rows,
            raw_headers: &self.raw_headers,
            columns: self.table.column_names().collect(),
            rows: self.table.len(),
            report: &self.report,
            notes: self.report.summary_lines(),
        }
    }
}

/// Load then normalize one upload.
///
/// Pure: identical bytes, hints and spec always give an identical result.
#[instrument(level = "info", skip_all, fields(bytes = bytes.len()))]
pub fn run(bytes: &[u8], hints: &LoadHints, spec: &ColumnSpec) -> Result<Ingested, IngestError> {
    // 1) raw table
    let raw = load::load(bytes, hints)?;

    // 2) typed table + report
    let (table, report) = normalize::normalize(&raw, spec)?;

    info!(
        raw_rows = raw.len(),
        rows = table.len(),
        removed = report.rows_removed(),
        "ingested"
    );
    Ok(Ingested {
        encoding: raw.encoding(),
        delimiter: raw.delimiter() as char,
        had_bom: raw.had_bom(),
        raw_rows: raw.len(),
        raw_headers: raw.headers().to_vec(),
        table,
        report,
    })
}

/// Content address of one `run` call.
pub fn cache_key(bytes: &[u8], hints: &LoadHints, spec: &ColumnSpec) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.update([0u8]);
    hasher.update(format!("{:?}", hints).as_bytes());
    hasher.update([0u8]);
    hasher.update(format!("{:?}", spec).as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, Arc<Ingested>>,
    /// Insertion order, oldest first.
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

/// Memoizes [`run`] by content hash so repeated reruns skip the work.
///
/// Oldest entries are evicted first once `capacity` is reached. Failures are
/// returned but never stored.
#[derive(Debug)]
pub struct PipelineCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl PipelineCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn run(
        &self,
        bytes: &[u8],
        hints: &LoadHints,
        spec: &ColumnSpec,
    ) -> Result<Arc<Ingested>, IngestError> {
        let key = cache_key(bytes, hints, spec);

        {
            let mut state = self.lock();
            if let Some(hit) = state.entries.get(&key).cloned() {
                state.hits += 1;
                debug!(key = %&key[..12], "pipeline cache hit");
                return Ok(hit);
            }
            state.misses += 1;
        }

        // computed outside the lock; a concurrent miss on the same key
        // produces an identical value
        let ingested = Arc::new(run(bytes, hints, spec)?);

        let mut state = self.lock();
        if !state.entries.contains_key(&key) {
            while state.order.len() >= self.capacity {
                if let Some(old) = state.order.pop_front() {
                    debug!(key = %&old[..12], "pipeline cache evict");
                    state.entries.remove(&old);
                }
            }
            state.order.push_back(key.clone());
            state.entries.insert(key, Arc::clone(&ingested));
        }
        Ok(ingested)
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            entries: state.entries.len(),
            hits: state.hits,
            misses: state.misses,
        }
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
