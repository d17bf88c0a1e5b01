//! File writers for FLIM histograms and phasor images.

use crate::{Error, Result};
use ptuflim_core::{FlimHistogram, PhasorImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Path of the JSON sidecar describing a raw histogram file: the data path
/// with `.json` appended.
#[must_use]
pub fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}

/// Writer for processed FLIM output.
///
/// Writes histograms as raw little-endian `u32` (with a JSON sidecar) or
/// sparse CSV, and phasor images as CSV.
pub struct DataFileWriter {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl DataFileWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer, path })
    }

    /// Output path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the histogram as raw little-endian `u32` in row-major
    /// `[rows, cols, channels, bins]` order.
    ///
    /// # Errors
    /// Returns an error on write failure.
    pub fn write_histogram_raw(&mut self, histogram: &FlimHistogram) -> Result<()> {
        for &count in histogram.view() {
            self.writer.write_all(&count.to_le_bytes())?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Writes the JSON sidecar for a raw histogram next to the output file
    /// and returns its path.
    ///
    /// # Errors
    /// Returns an error on write or serialization failure.
    pub fn write_histogram_sidecar(
        &self,
        histogram: &FlimHistogram,
        metadata: &serde_json::Value,
    ) -> Result<PathBuf> {
        let sidecar = sidecar_path(&self.path);
        let json = serde_json::json!({
            "shape": histogram.shape(),
            "axes": ["row", "col", "channel", "microtime"],
            "dtype": "uint32",
            "byte_order": "little",
            "total_counts": histogram.total(),
            "metadata": metadata,
        });
        let mut writer = BufWriter::new(File::create(&sidecar)?);
        serde_json::to_writer_pretty(&mut writer, &json)?;
        writer.flush()?;
        Ok(sidecar)
    }

    /// Writes the non-zero histogram entries as CSV.
    ///
    /// Format: `row,col,channel,bin,count`
    ///
    /// # Errors
    /// Returns an error on write failure.
    pub fn write_histogram_csv(&mut self, histogram: &FlimHistogram) -> Result<()> {
        writeln!(self.writer, "row,col,channel,bin,count")?;
        for ((row, col, channel, bin), &count) in histogram.view().indexed_iter() {
            if count > 0 {
                writeln!(self.writer, "{row},{col},{channel},{bin},{count}")?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Writes a histogram phasor image as CSV.
    ///
    /// Format: `row,col,channel,g,s,dc`
    ///
    /// # Errors
    /// [`Error::InvalidFormat`] unless the image is `[rows, cols, channels]`;
    /// otherwise write failures.
    pub fn write_phasor_csv(&mut self, image: &PhasorImage) -> Result<()> {
        if image.shape().len() != 3 {
            return Err(Error::InvalidFormat(format!(
                "phasor CSV needs a [rows, cols, channels] image, got shape {:?}",
                image.shape()
            )));
        }

        writeln!(self.writer, "row,col,channel,g,s,dc")?;
        for ((index, &g), (s, dc)) in image
            .g
            .indexed_iter()
            .zip(image.s.iter().zip(image.dc.iter()))
        {
            writeln!(
                self.writer,
                "{},{},{},{g},{s},{dc}",
                index[0], index[1], index[2]
            )?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
