//! Report serialization.
//!
//! One record per traced line with a nonzero call count:
//!
//! ```text
//! <call_count> <seconds>.<nanoseconds> <avg_ms>ms <resolved_path>:<line>
//! ```
//!
//! Nanoseconds are zero-padded to nine digits and the average is rendered
//! in milliseconds with three decimal places. Records are emitted in
//! registry traversal order; consumers needing sorted output post-process.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use fnv::FnvHashMap;

use crate::error::ProfileError;
use crate::line_entry::LineEntry;
use crate::source_unit::SourceUnit;

/// Upper bound on a formatted report path.
pub const MAX_REPORT_PATH: usize = 4096;

/// Expand `pattern` with the current local time and append the optional
/// pid suffix.
///
/// An invalid format specifier, an empty expansion, or an oversized result
/// aborts the save before any file is touched.
pub fn format_report_path(pattern: &str, pid: Option<u32>) -> Result<PathBuf, ProfileError> {
    let mut name = String::new();
    if write!(name, "{}", Local::now().format(pattern)).is_err() {
        return Err(ProfileError::InvalidPattern {
            pattern: pattern.to_string(),
        });
    }
    if name.is_empty() {
        return Err(ProfileError::EmptyReportPath {
            pattern: pattern.to_string(),
        });
    }
    if let Some(pid) = pid {
        name.push('.');
        name.push_str(&pid.to_string());
    }
    if name.len() > MAX_REPORT_PATH {
        return Err(ProfileError::ReportPathTooLong {
            len: name.len(),
            max: MAX_REPORT_PATH,
        });
    }
    Ok(PathBuf::from(name))
}

/// Write every live line aggregate in `units` to `path`.
///
/// Open and write failures abort the save; a sync failure after a complete
/// write is only reported, the written data stands.
pub fn write_report(
    path: &Path,
    units: &FnvHashMap<String, Vec<SourceUnit>>,
) -> Result<(), ProfileError> {
    let io_err = |source: std::io::Error| ProfileError::ReportIo {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);

    for chain in units.values() {
        for unit in chain {
            let resolved = resolve_display_path(unit.key());
            for (line, entry) in unit.live_entries() {
                if !entry.stack.is_empty() {
                    tracing::warn!(
                        unit = unit.key(),
                        line,
                        depth = entry.stack.depth(),
                        "begin still in flight at report time"
                    );
                }
                writeln!(writer, "{}", format_record(entry, &resolved, line)).map_err(io_err)?;
            }
        }
    }

    let file = writer.into_inner().map_err(|e| io_err(e.into_error()))?;
    if let Err(err) = file.sync_all() {
        tracing::warn!(%err, path = %path.display(), "report sync failed after write");
    }
    Ok(())
}

/// Format one report record.
fn format_record(entry: &LineEntry, resolved_path: &str, line: usize) -> String {
    let avg_ms = entry.total.total_nanos() as f64 / entry.call_count as f64 / 1e6;
    format!(
        "{} {}.{:09} {:.3}ms {}:{}",
        entry.call_count, entry.total.sec, entry.total.nsec, avg_ms, resolved_path, line
    )
}

/// Canonicalize a unit key for display, keeping the raw key when the path
/// cannot be resolved (deleted file, synthetic tag).
fn resolve_display_path(key: &str) -> String {
    std::fs::canonicalize(key)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| key.to_string())
}
