//! This module has I/O functionality for captured point-cloud frames

mod point_cloud;

pub use point_cloud::{ExportSummary, export_frames_zip, frame_file_name, write_xyzi_ascii};
