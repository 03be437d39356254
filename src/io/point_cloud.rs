//! Serialization of captured frames to an ASCII point-cloud format, and bundling of the
//! per-frame records into a single zip archive.
//!
//! Each frame becomes one text record with a fixed-field header followed by one line per point:
//!
//! ```text
//! VERSION 0.7
//! FIELDS x y z intensity
//! SIZE 8 8 8 8
//! TYPE F F F F
//! COUNT 1 1 1 1
//! WIDTH <n>
//! HEIGHT 1
//! POINTS <n>
//! DATA ascii
//! <x> <y> <z> <intensity>
//! ...
//! ```
//!
//! The field order and naming are stable so downstream tooling that consumes the records keeps
//! working across versions. Records inside the archive are named
//! `frame_<zero-padded-number>_<timestamp>.pcd`, where the timestamp is the frame's start time
//! rendered ISO-style with colons replaced and sub-second digits truncated.

use crate::capture::CapturedFrame;
use crate::{POINT_STRIDE, Result};
use itertools::Itertools;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const FIELDS: [&str; POINT_STRIDE] = ["x", "y", "z", "intensity"];

/// The outcome of an archive export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub frames_written: usize,
    pub points_written: usize,

    /// The archive location, or None when there was nothing to export.
    pub path: Option<PathBuf>,
}

/// Write one frame's points as an ASCII record with the fixed-field header.
///
/// # Arguments
///
/// * `writer`: destination for the record
/// * `points`: flat buffer of four values per point
///
/// returns: Result<(), Box<dyn Error, Global>>
pub fn write_xyzi_ascii<W: Write>(writer: &mut W, points: &[f64]) -> Result<()> {
    let count = points.len() / POINT_STRIDE;

    writeln!(writer, "VERSION 0.7")?;
    writeln!(writer, "FIELDS {}", FIELDS.iter().join(" "))?;
    writeln!(writer, "SIZE {}", FIELDS.iter().map(|_| "8").join(" "))?;
    writeln!(writer, "TYPE {}", FIELDS.iter().map(|_| "F").join(" "))?;
    writeln!(writer, "COUNT {}", FIELDS.iter().map(|_| "1").join(" "))?;
    writeln!(writer, "WIDTH {}", count)?;
    writeln!(writer, "HEIGHT 1")?;
    writeln!(writer, "POINTS {}", count)?;
    writeln!(writer, "DATA ascii")?;

    for p in points.chunks_exact(POINT_STRIDE) {
        writeln!(writer, "{} {} {} {}", p[0], p[1], p[2], p[3])?;
    }
    Ok(())
}

/// The archive entry name for a frame. The frame's start time is interpreted as Unix epoch
/// milliseconds; times that fall outside the representable calendar range fall back to the raw
/// millisecond count so a name is always produced.
pub fn frame_file_name(frame: &CapturedFrame) -> String {
    let stamp = chrono::DateTime::from_timestamp_millis(frame.start_time_ms() as i64)
        .map(|dt| dt.format("%Y-%m-%dT%H-%M-%S").to_string())
        .unwrap_or_else(|| format!("{}ms", frame.start_time_ms() as i64));
    format!("frame_{:06}_{}.pcd", frame.frame_number(), stamp)
}

/// Serialize the given frames and bundle them into a zip archive at `path`, one record per
/// frame. When the frame iterator is empty this logs a notice and creates no file; the summary's
/// `path` is None in that case.
///
/// # Arguments
///
/// * `path`: destination archive path
/// * `frames`: the frames to serialize, typically a capture session's retained list
///
/// returns: Result<ExportSummary, Box<dyn Error, Global>>
pub fn export_frames_zip<'a, I>(path: &Path, frames: I) -> Result<ExportSummary>
where
    I: IntoIterator<Item = &'a CapturedFrame>,
{
    let frames: Vec<&CapturedFrame> = frames.into_iter().collect();
    if frames.is_empty() {
        log::warn!("no captured frames to export, skipping archive creation");
        return Ok(ExportSummary {
            frames_written: 0,
            points_written: 0,
            path: None,
        });
    }

    let file = std::fs::File::create(path)?;
    let mut archive = ZipWriter::new(std::io::BufWriter::new(file));
    let options = SimpleFileOptions::default();

    let mut points_written = 0;
    for frame in &frames {
        archive.start_file(frame_file_name(frame), options)?;
        write_xyzi_ascii(&mut archive, frame.points())?;
        points_written += frame.point_count();
    }
    archive.finish()?;

    Ok(ExportSummary {
        frames_written: frames.len(),
        points_written,
        path: Some(path.to_path_buf()),
    })
}
