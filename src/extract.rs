//! Purpose: Turn a `^^^`-delimited bill corpus into one JSON array document.
//! Exports: `ErrorPolicy`, `ExtractConfig`, `Extraction`, `ExtractOutcome`, `SkippedLine`,
//!          `extract_records`, `render_json`, `write_atomic`, `run`.
//! Role: Extraction engine used by the CLI; owns file I/O and the malformed-line policy.
//! Invariants: Records keep input line order.
//! Invariants: Stop mode aborts on the first malformed line; nothing is written.
//! Invariants: The destination file only ever holds a complete document.
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bstr::ByteSlice;

use crate::core::error::{Error, ErrorKind};
use crate::record::{BillRecord, parse_line};

/// Output path that means "write to stdout".
pub const STDOUT_PATH: &str = "-";

const MAX_SNIPPET_BYTES: usize = 80;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ErrorPolicy {
    #[default]
    Stop,
    Skip,
}

#[derive(Clone, Debug)]
pub struct ExtractConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub errors: ErrorPolicy,
    pub pretty: bool,
}

impl ExtractConfig {
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            errors: ErrorPolicy::Stop,
            pretty: false,
        }
    }

    pub fn writes_to_stdout(&self) -> bool {
        self.output_path == Path::new(STDOUT_PATH)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SkippedLine {
    /// 1-based line number in the input.
    pub line: u64,
    pub message: String,
    pub snippet: String,
}

#[derive(Clone, Debug, Default)]
pub struct Extraction {
    pub records: Vec<BillRecord>,
    pub skipped: u64,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ExtractOutcome {
    pub records: u64,
    pub skipped: u64,
}

/// Parse every line of `input`, in order.
///
/// Under `ErrorPolicy::Stop` the first malformed line is returned as an error
/// carrying its line number. Under `ErrorPolicy::Skip` it is reported through
/// `on_skip` and parsing continues.
pub fn extract_records<F>(
    input: &[u8],
    errors: ErrorPolicy,
    mut on_skip: F,
) -> Result<Extraction, Error>
where
    F: FnMut(SkippedLine),
{
    let mut extraction = Extraction::default();
    for (idx, line) in input.lines().enumerate() {
        let line_no = idx as u64 + 1;
        // `lines` keeps a bare `\r` on an unterminated last line.
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        match parse_line(line) {
            Ok(record) => extraction.records.push(record),
            Err(err) => match errors {
                ErrorPolicy::Stop => {
                    let err = if err.hint().is_some() {
                        err
                    } else {
                        err.with_hint("Use --errors skip to drop malformed lines and continue.")
                    };
                    return Err(err.with_line(line_no));
                }
                ErrorPolicy::Skip => {
                    let message = err.message().unwrap_or("malformed line").to_string();
                    tracing::debug!(line = line_no, %message, "skipping malformed line");
                    extraction.skipped += 1;
                    on_skip(SkippedLine {
                        line: line_no,
                        message,
                        snippet: truncate_snippet(line, MAX_SNIPPET_BYTES),
                    });
                }
            },
        }
    }
    Ok(extraction)
}

/// Serialize records as a single JSON array.
pub fn render_json(records: &[BillRecord], pretty: bool) -> Result<Vec<u8>, Error> {
    let encoded = if pretty {
        serde_json::to_vec_pretty(records)
    } else {
        serde_json::to_vec(records)
    };
    encoded.map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode records as json")
            .with_source(err)
    })
}

/// Write `bytes` to a sibling temp file, then rename it over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let Some(name) = path.file_name() else {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("output path has no file name")
            .with_path(path));
    };
    let tmp_path = path.with_file_name(format!(
        ".{}.{}.tmp",
        name.to_string_lossy(),
        std::process::id()
    ));

    let result = fs::File::create(&tmp_path)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp_path, path));
    if let Err(err) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(Error::from_io(err, "failed to write output", path));
    }
    Ok(())
}

fn write_stdout(bytes: &[u8]) -> Result<(), Error> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(bytes)
        .and_then(|()| stdout.write_all(b"\n"))
        .and_then(|()| stdout.flush())
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write stdout")
                .with_source(err)
        })
}

/// Read the input file, extract all records, and write the JSON document.
pub fn run<F>(config: &ExtractConfig, on_skip: F) -> Result<ExtractOutcome, Error>
where
    F: FnMut(SkippedLine),
{
    let input = &config.input_path;
    let bytes =
        fs::read(input).map_err(|err| Error::from_io(err, "failed to read input", input))?;
    tracing::debug!(input = %input.display(), bytes = bytes.len(), "read input");

    let extraction =
        extract_records(&bytes, config.errors, on_skip).map_err(|err| err.with_path(input))?;
    let json = render_json(&extraction.records, config.pretty)?;

    if config.writes_to_stdout() {
        write_stdout(&json)?;
    } else {
        write_atomic(&config.output_path, &json)?;
    }

    let outcome = ExtractOutcome {
        records: extraction.records.len() as u64,
        skipped: extraction.skipped,
    };
    tracing::info!(
        records = outcome.records,
        skipped = outcome.skipped,
        output = %config.output_path.display(),
        "wrote bill records"
    );
    Ok(outcome)
}

fn truncate_snippet(line: &[u8], max_bytes: usize) -> String {
    let text = line.to_str_lossy();
    if text.len() <= max_bytes {
        return text.into_owned();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
