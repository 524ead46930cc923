//! SAM text input and output.
//!
//! Header lines (leading `@`) are collected verbatim for the output and also parsed into a
//! noodles [`Header`], against which every record line is decoded exactly once by
//! [`AlignmentRecord::from_sam_line`].

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use noodles::sam::Header;

use crate::record::AlignmentRecord;

/// Buffer size used for file and stdio streams.
const IO_BUFFER_SIZE: usize = 1 << 20;

/// Returns true if the path refers to standard input or output.
///
/// # Examples
/// ```
/// use cfdedup_lib::sam_io::is_stdio_path;
///
/// assert!(is_stdio_path("-"));
/// assert!(is_stdio_path("/dev/stdin"));
/// assert!(!is_stdio_path("reads.sam"));
/// ```
#[must_use]
pub fn is_stdio_path<P: AsRef<Path>>(path: P) -> bool {
    let path_str = path.as_ref().to_string_lossy();
    path_str == "-" || path_str == "/dev/stdin" || path_str == "/dev/stdout"
}

/// Opens a SAM text input, reading standard input for `-`.
///
/// # Errors
/// Returns an error if the file cannot be opened
pub fn open_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead + Send>> {
    let path_ref = path.as_ref();
    if is_stdio_path(path_ref) {
        return Ok(Box::new(BufReader::with_capacity(IO_BUFFER_SIZE, io::stdin())));
    }
    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open input SAM: {}", path_ref.display()))?;
    Ok(Box::new(BufReader::with_capacity(IO_BUFFER_SIZE, file)))
}

/// Creates a SAM text output, writing standard output for `-`.
///
/// # Errors
/// Returns an error if the file cannot be created
pub fn open_output<P: AsRef<Path>>(path: P) -> Result<Box<dyn Write + Send>> {
    let path_ref = path.as_ref();
    if is_stdio_path(path_ref) {
        return Ok(Box::new(BufWriter::with_capacity(IO_BUFFER_SIZE, io::stdout())));
    }
    let file = File::create(path_ref)
        .with_context(|| format!("Failed to create output SAM: {}", path_ref.display()))?;
    Ok(Box::new(BufWriter::with_capacity(IO_BUFFER_SIZE, file)))
}

/// Streaming reader over SAM text.
///
/// Call [`SamReader::read_header`] once, then [`SamReader::next_record`] until it returns
/// `None`.
pub struct SamReader<R> {
    inner: R,
    line: String,
    line_number: u64,
    header: Option<Arc<Header>>,
    pending: Option<String>,
}

impl<R: BufRead> SamReader<R> {
    /// Wraps a buffered reader.
    pub fn new(inner: R) -> Self {
        Self { inner, line: String::new(), line_number: 0, header: None, pending: None }
    }

    fn read_line(&mut self) -> Result<bool> {
        self.line.clear();
        let n = self
            .inner
            .read_line(&mut self.line)
            .with_context(|| format!("Failed to read SAM input at line {}", self.line_number + 1))?;
        if n > 0 {
            self.line_number += 1;
        }
        Ok(n > 0)
    }

    /// Reads all leading header lines and returns them verbatim, newline-terminated.
    ///
    /// The parsed form is available from [`SamReader::header`] afterwards. The first record
    /// line is held back for the next call to [`SamReader::next_record`].
    ///
    /// # Errors
    /// Returns an error if the input cannot be read or the header is not valid SAM
    pub fn read_header(&mut self) -> Result<String> {
        let mut header = String::new();
        while self.read_line()? {
            if self.line.starts_with('@') {
                header.push_str(&self.line);
                if !header.ends_with('\n') {
                    header.push('\n');
                }
            } else if !self.line.trim().is_empty() {
                self.pending = Some(std::mem::take(&mut self.line));
                break;
            }
        }
        let parsed: Header = header.parse().context("Failed to parse SAM header")?;
        self.header = Some(Arc::new(parsed));
        Ok(header)
    }

    /// The parsed header, once [`SamReader::read_header`] has run.
    #[must_use]
    pub fn header(&self) -> Option<&Arc<Header>> {
        self.header.as_ref()
    }

    /// Parses the next record, skipping blank lines.
    ///
    /// # Errors
    /// Returns an error if the input cannot be read, a record is malformed, or a header line
    /// appears after the first record
    pub fn next_record(&mut self) -> Result<Option<AlignmentRecord>> {
        if self.header.is_none() {
            bail!("SAM header must be read before records");
        }
        if let Some(line) = self.pending.take() {
            return Ok(Some(self.parse(&line)?));
        }
        while self.read_line()? {
            if self.line.trim().is_empty() {
                continue;
            }
            if self.line.starts_with('@') {
                bail!("Header line found after records at line {}", self.line_number);
            }
            let line = std::mem::take(&mut self.line);
            return Ok(Some(self.parse(&line)?));
        }
        Ok(None)
    }

    fn parse(&self, line: &str) -> Result<AlignmentRecord> {
        let header = self.header.as_deref().context("SAM header must be read before records")?;
        AlignmentRecord::from_sam_line(header, line)
            .with_context(|| format!("Failed to parse SAM record at line {}", self.line_number))
    }

    /// Number of lines consumed so far.
    #[must_use]
    pub fn line_number(&self) -> u64 {
        self.line_number
    }
}
