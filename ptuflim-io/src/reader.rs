//! Memory-mapped file readers.
//!

use crate::config::ProcessingConfig;
use crate::{Error, Result};
use memmap2::Mmap;
use ptuflim_algorithms::{AssemblyStats, FrameAssembler};
use ptuflim_core::{EventBatch, FlimHistogram, ImagingParams};
use ptuflim_ptu::{correct_overflows, Header, OverflowStats, RecordDecoder, RecordType};
use std::fs::File;
use std::path::{Path, PathBuf};

/// A memory-mapped file reader.
///
/// Uses memmap2 to efficiently access file contents without
/// loading the entire file into memory.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| Error::MmapError(format!("{}: {e}", path.display())))?;
        Ok(Self {
            mmap,
            path: path.to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Result of reading a PTU image file.
#[derive(Debug, Clone)]
pub struct FlimData {
    /// Photon counts `[rows, cols, channels, bins]`.
    pub histogram: FlimHistogram,
    /// Assembler counters.
    pub stats: AssemblyStats,
    /// Overflow correction counters.
    pub overflow: OverflowStats,
    /// Imaging parameters derived from the header.
    pub params: ImagingParams,
    /// The parsed header.
    pub metadata: Header,
}

impl FlimData {
    /// Metadata JSON: all header tags plus the derived acquisition summary.
    #[must_use]
    pub fn metadata_json(&self) -> serde_json::Value {
        let mut json = self.metadata.to_json();
        if let serde_json::Value::Object(map) = &mut json {
            map.insert(
                "ptuflim".into(),
                serde_json::json!({
                    "record_type": self.metadata.record_type().ok().map(|t| t.name()),
                    "pixels_x": self.params.pixels_x,
                    "pixels_y": self.params.pixels_y,
                    "line_start_marker": self.params.markers.line_start,
                    "line_stop_marker": self.params.markers.line_stop,
                    "frame_marker": self.params.markers.frame,
                    "microtime_resolution_s": self.params.microtime_resolution_s,
                    "sync_period_s": self.params.sync_period_s,
                    "laser_frequency_mhz": self.params.laser_frequency_mhz(),
                    "frames": self.stats.frames,
                    "lines": self.stats.lines,
                    "photons_binned": self.stats.photons_binned,
                    "photons_dropped": self.stats.photons_dropped,
                    "photons_outside": self.stats.photons_outside,
                }),
            );
        }
        json
    }
}

/// A PTU file reader with memory-mapped I/O.
///
/// The header is parsed on open; records are decoded on demand.
pub struct PtuFileReader {
    reader: MappedFileReader,
    header: Header,
    config: ProcessingConfig,
}

impl PtuFileReader {
    /// Opens a PTU file and parses its header.
    ///
    /// # Errors
    /// Returns an error if the file cannot be mapped or the header is invalid.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        let header = Header::parse(reader.as_bytes())?;
        log::info!(
            "opened {} ({} bytes, {} header tags, data at byte {})",
            reader.path().display(),
            reader.len(),
            header.tags().len(),
            header.data_offset()
        );
        Ok(Self {
            reader,
            header,
            config: ProcessingConfig::default(),
        })
    }

    /// Sets the processing configuration.
    #[must_use]
    pub fn with_config(mut self, config: ProcessingConfig) -> Self {
        self.config = config;
        self
    }

    /// Processing configuration in use.
    #[must_use]
    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// The parsed header.
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// Record type declared in the header.
    ///
    /// # Errors
    /// Missing tag or unsupported record type.
    pub fn record_type(&self) -> Result<RecordType> {
        Ok(self.header.record_type()?)
    }

    /// Number of records declared in the header.
    ///
    /// # Errors
    /// Missing or negative `TTResult_NumberOfRecords`.
    pub fn record_count(&self) -> Result<usize> {
        Ok(self.header.record_count()?)
    }

    /// Decodes all records and applies overflow correction.
    ///
    /// # Errors
    /// Unsupported record type or truncated record data.
    pub fn decode_events(&self) -> Result<(EventBatch, OverflowStats)> {
        let decoder = RecordDecoder::with_config(self.config.decoder.clone());
        let decoded = decoder.decode_records(&self.header, self.reader.as_bytes())?;
        let (events, stats) = correct_overflows(&decoded)?;
        log::info!(
            "decoded {} records from {}: {} events, {} overflow records, {} wraps",
            decoded.len(),
            self.reader.path().display(),
            events.len(),
            stats.overflow_events,
            stats.total_wraps
        );
        Ok((events, stats))
    }

    /// Decodes the file and assembles the FLIM histogram.
    ///
    /// # Errors
    /// Decoding errors, missing imaging tags, or
    /// [`ptuflim_core::Error::NotFlimData`] for acquisitions that are not
    /// marker-driven image scans.
    pub fn read_flim(&self) -> Result<FlimData> {
        let params = self.header.imaging_params()?;
        // Reject point and piezo measurements before decoding.
        params.ensure_flim_image()?;

        let (events, overflow) = self.decode_events()?;
        let assembler = FrameAssembler::with_config(params, self.config.assembler().clone());
        let (histogram, stats) = assembler.assemble(&events)?;
        log::info!(
            "assembled {:?} histogram: {} photons in {} frames",
            histogram.shape(),
            stats.photons_binned,
            stats.frames
        );

        Ok(FlimData {
            histogram,
            stats,
            overflow,
            params,
            metadata: self.header.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_mapped_file_reader() {
        let mut file = NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..64).collect();
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let reader = MappedFileReader::open(file.path()).unwrap();
        assert_eq!(reader.len(), 64);
        assert!(!reader.is_empty());
        assert_eq!(reader.as_bytes(), &data[..]);
        assert_eq!(reader.path(), file.path());
    }

    #[test]
    fn test_ptu_reader_rejects_non_ptu() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"NOTAPTUFILE.....").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            PtuFileReader::open(file.path()),
            Err(Error::PtuError(ptuflim_ptu::Error::FormatError(_)))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            PtuFileReader::open("/nonexistent/file.ptu"),
            Err(Error::Io(_))
        ));
    }
}
