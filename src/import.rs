//! Batch import of location-history exports.
//!
//! Files are parsed in parallel and then added to the grid one by one in
//! input order. A bad file is recorded in the report and never stops the
//! rest of the batch. Persisting is left to the caller, once per batch.

use flate2::read::GzDecoder;
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::grid::{GridIndex, ImportedFile};
use crate::parsers::{DetectedFormat, ParseError, ParsedTimeline, parse_bytes};

/// Raw bytes of one export together with its display name.
#[derive(Debug, Clone)]
pub struct ImportSource {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ImportSource {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("could not read file: {0}")]
    Read(#[source] std::io::Error),
    #[error("could not parse file: {0}")]
    Parse(#[from] ParseError),
    #[error("unrecognised location history format")]
    UnknownFormat,
    #[error("file contains no usable locations")]
    NoPoints,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedSummary {
    pub id: String,
    pub name: String,
    pub format: DetectedFormat,
    pub points: usize,
    pub edges: usize,
    pub skipped_entries: usize,
}

#[derive(Debug)]
pub struct ImportFailure {
    pub name: String,
    pub error: ImportError,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: Vec<ImportedSummary>,
    pub failed: Vec<ImportFailure>,
}

impl ImportReport {
    pub fn processed(&self) -> usize {
        self.imported.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} files processed, {} failed",
            self.imported.len(),
            self.failed.len()
        )
    }
}

fn is_export(path: &Path) -> bool {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    name.ends_with(".json") || name.ends_with(".json.gz")
}

/// Expands directories recursively into the exports they contain.
///
/// Plain file paths are kept as given, whatever their extension.
pub fn discover_exports(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut in_dir: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|entry| entry.file_type().is_file() && is_export(entry.path()))
                .map(|entry| entry.into_path())
                .collect();
            in_dir.sort();
            info!(dir = %path.display(), count = in_dir.len(), "Found exports");
            found.extend(in_dir);
        } else {
            found.push(path.clone());
        }
    }
    found
}

/// Reads an export, gunzipping `*.gz` files.
pub fn read_export(path: &Path) -> std::io::Result<ImportSource> {
    let gzipped = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    let file = File::open(path)?;
    let mut bytes = Vec::new();
    if gzipped {
        GzDecoder::new(file).read_to_end(&mut bytes)?;
    } else {
        BufReader::new(file).read_to_end(&mut bytes)?;
    }

    let name = if gzipped {
        path.file_stem()
    } else {
        path.file_name()
    };
    let name = name
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string());
    Ok(ImportSource::new(name, bytes))
}

/// Reads every path and imports the readable ones as one batch.
pub fn import_paths(grid: &mut GridIndex, paths: &[PathBuf]) -> ImportReport {
    let mut sources = Vec::new();
    let mut unreadable = Vec::new();
    for path in discover_exports(paths) {
        match read_export(&path) {
            Ok(source) => sources.push(source),
            Err(e) => {
                warn!(path = %path.display(), "Could not read export: {}", e);
                unreadable.push(ImportFailure {
                    name: path.display().to_string(),
                    error: ImportError::Read(e),
                });
            }
        }
    }

    let mut report = import_batch(grid, sources);
    unreadable.append(&mut report.failed);
    report.failed = unreadable;
    report
}

fn check(parsed: ParsedTimeline) -> Result<ParsedTimeline, ImportError> {
    if parsed.format == DetectedFormat::Unknown {
        return Err(ImportError::UnknownFormat);
    }
    if parsed.is_empty() {
        return Err(ImportError::NoPoints);
    }
    Ok(parsed)
}

/// Parses all sources in parallel, then indexes them into `grid` in order.
pub fn import_batch(grid: &mut GridIndex, sources: Vec<ImportSource>) -> ImportReport {
    let total = sources.len() as u64;
    let parsed: Vec<(String, Result<ParsedTimeline, ImportError>)> = sources
        .into_par_iter()
        .progress_count(total)
        .map(|source| {
            let result = parse_bytes(&source.bytes)
                .map_err(ImportError::from)
                .and_then(check);
            (source.name, result)
        })
        .collect();

    let mut report = ImportReport::default();
    for (name, result) in parsed {
        match result {
            Ok(timeline) => {
                let summary_format = timeline.format;
                let skipped_entries = timeline.skipped_entries;
                let file = ImportedFile::new(name, timeline.into_group());
                let stats = file.get_statistics();
                report.imported.push(ImportedSummary {
                    id: file.id().to_string(),
                    name: file.name().to_string(),
                    format: summary_format,
                    points: stats.total_points,
                    edges: stats.total_paths,
                    skipped_entries,
                });
                grid.add_file(file);
            }
            Err(error) => {
                warn!(name = %name, "Import failed: {}", error);
                report.failed.push(ImportFailure { name, error });
            }
        }
    }

    info!("{}", report.summary());
    report
}
