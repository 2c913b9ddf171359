//! Recorded capture: header row plus one CSV record per frame.
//!
//! Records are appended and flushed one at a time so a crash loses at most
//! the record being written. Files are never rewritten.

use std::fs::File;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::CaptureError;
use crate::frame::{Frame, CAPTURE_HEADER, CHANNEL_COUNT};

pub struct CaptureWriter {
    writer: csv::Writer<File>,
    path: PathBuf,
    records: u64,
}

impl CaptureWriter {
    /// Create the capture file and write the header
    pub fn create(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| CaptureError::Open {
            path: path.clone(),
            source,
        })?;

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(CAPTURE_HEADER)?;
        writer.flush()?;

        info!("[CAPTURE] Recording to {}", path.display());
        Ok(Self {
            writer,
            path,
            records: 0,
        })
    }

    /// Append one frame and flush it to disk
    pub fn append(&mut self, frame: &Frame) -> Result<(), CaptureError> {
        let mut record = Vec::with_capacity(CHANNEL_COUNT + 1);
        record.push(frame.timestamp_ms.to_string());
        record.extend(frame.channels().iter().map(|v| v.to_string()));

        self.writer.write_record(&record)?;
        self.writer.flush()?;
        self.records += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> u64 {
        self.records
    }
}

/// Load every data record of a capture into memory
pub fn load_capture(path: impl AsRef<Path>) -> Result<Vec<Frame>, CaptureError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| CaptureError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let mut frames = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        // Row 1 is the header
        let row = index + 2;

        if record.len() < CHANNEL_COUNT + 1 {
            return Err(CaptureError::Malformed {
                row,
                reason: format!(
                    "expected {} fields, found {}",
                    CHANNEL_COUNT + 1,
                    record.len()
                ),
            });
        }

        let mut values = [0.0; CHANNEL_COUNT + 1];
        for (slot, field) in values.iter_mut().zip(record.iter()) {
            *slot = field.trim().parse().map_err(|_| CaptureError::Malformed {
                row,
                reason: format!("{:?} is not a number", field),
            })?;
        }

        let mut channels = [0.0; CHANNEL_COUNT];
        channels.copy_from_slice(&values[1..]);
        frames.push(Frame::from_channels(values[0], &channels));
    }

    Ok(frames)
}
