//! Combined decoding and analysis settings for whole-file processing.

use crate::Result;
use ptuflim_algorithms::{AnalysisConfig, AssemblerConfig, PhasorConfig};
use ptuflim_ptu::DecoderConfig;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Settings for reading a PTU file end to end.
///
/// ```json
/// {
///   "decoder": { "parallel": true, "chunk_size": 1048576 },
///   "assembler": { "transient_lines": 10 },
///   "phasor": { "harmonic": 2 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Record decoder settings.
    pub decoder: DecoderConfig,
    /// Assembler and phasor settings.
    #[serde(flatten)]
    pub analysis: AnalysisConfig,
}

impl ProcessingConfig {
    /// Parses a JSON document.
    ///
    /// # Errors
    /// JSON errors, or a core config error for invalid values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.analysis.validate()?;
        Ok(config)
    }

    /// Loads a JSON file.
    ///
    /// # Errors
    /// I/O and JSON errors, or a core config error for invalid values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.analysis.validate()?;
        Ok(config)
    }

    /// Assembler settings.
    #[must_use]
    pub fn assembler(&self) -> &AssemblerConfig {
        &self.analysis.assembler
    }

    /// Phasor settings.
    #[must_use]
    pub fn phasor(&self) -> &PhasorConfig {
        &self.analysis.phasor
    }
}
