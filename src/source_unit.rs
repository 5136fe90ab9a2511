//! Per-unit container of line aggregates.
//!
//! A unit is one profiled source artifact, identified by its key: a
//! filesystem path for file-backed code, or a synthetic tag (for example
//! `<eval>`) for code with no backing file. Classification happens once at
//! creation time by attempting to read the key as a file.

use std::fs::File;
use std::io::Read;

use crate::line_entry::LineEntry;

/// Growth increment, in lines, for units whose extent is not known in
/// advance.
pub const LINE_CHUNK: usize = 50;

/// Line aggregates for one source unit.
///
/// The `lines` vector is 1-indexed: slot 0 is never referenced by a
/// well-behaved host and simply pays for direct indexing by line number.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    key: String,
    file_backed: bool,
    lines: Vec<LineEntry>,
}

impl SourceUnit {
    /// Create the unit for `key`, classifying it and sizing its line space.
    ///
    /// If `key` opens and reads as a file, the unit is file-backed and its
    /// capacity is fixed at the file's newline count plus one slot for the
    /// implicit end-of-file line plus one for 1-based indexing. Otherwise
    /// the unit starts at [`LINE_CHUNK`] lines and grows on demand; that
    /// covers synthetic tags and also paths that exist but cannot be read,
    /// where the extent genuinely is not known.
    pub fn open(key: &str) -> Self {
        match count_lines(key) {
            Ok(newlines) => SourceUnit {
                key: key.to_string(),
                file_backed: true,
                lines: vec![LineEntry::default(); newlines + 2],
            },
            Err(_) => SourceUnit {
                key: key.to_string(),
                file_backed: false,
                lines: vec![LineEntry::default(); LINE_CHUNK],
            },
        }
    }

    /// The identifying key this unit was created with.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the line space was sized from a backing file.
    pub fn is_file_backed(&self) -> bool {
        self.file_backed
    }

    /// Current allocated line capacity (highest indexable line + 1).
    pub fn line_capacity(&self) -> usize {
        self.lines.len()
    }

    /// The aggregate slot for `line`, applying the growth policy.
    ///
    /// File-backed units were sized from the file itself; a reference past
    /// that capacity means line tracking has gone wrong and the process is
    /// terminated with a diagnostic rather than recording bad data. Units
    /// without a backing file grow by whole chunks, preserving every
    /// existing aggregate across the reallocation.
    pub fn line_slot(&mut self, line: usize) -> &mut LineEntry {
        if line >= self.lines.len() {
            if self.file_backed {
                tracing::error!(
                    unit = %self.key,
                    line,
                    capacity = self.lines.len(),
                    "line index beyond file-backed unit capacity"
                );
                eprintln!(
                    "perfilar: fatal: line {} beyond capacity {} of file-backed unit {}",
                    line,
                    self.lines.len(),
                    self.key
                );
                std::process::exit(1);
            }
            let grown = std::cmp::max(line + 1, self.lines.len() + LINE_CHUNK);
            self.lines.resize(grown, LineEntry::default());
        }
        &mut self.lines[line]
    }

    /// Lines that were entered at least once, as `(line_number, entry)`.
    pub fn live_entries(&self) -> impl Iterator<Item = (usize, &LineEntry)> {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_live())
    }
}

/// Count newline characters in the file at `path`.
fn count_lines(path: &str) -> std::io::Result<usize> {
    let mut file = File::open(path)?;
    let mut buf = [0u8; 64 * 1024];
    let mut newlines = 0;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        newlines += buf[..n].iter().filter(|&&b| b == b'\n').count();
    }
    Ok(newlines)
}
