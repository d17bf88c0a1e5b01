//! Assembler and phasor configuration.

use ptuflim_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Frame assembler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Leading line marker pairs skipped when estimating the line duration.
    pub transient_lines: usize,
    /// Reject streams without any frame marker instead of treating the
    /// whole stream as one frame.
    pub require_frame_marker: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            transient_lines: 10,
            require_frame_marker: false,
        }
    }
}

impl AssemblerConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of start-up line pairs to skip.
    #[must_use]
    pub fn with_transient_lines(mut self, lines: usize) -> Self {
        self.transient_lines = lines;
        self
    }

    /// Sets whether a frame marker is mandatory.
    #[must_use]
    pub fn with_require_frame_marker(mut self, require: bool) -> Self {
        self.require_frame_marker = require;
        self
    }
}

/// Phasor transform settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhasorConfig {
    /// Harmonic to evaluate (1 = laser repetition frequency).
    pub harmonic: usize,
    /// Zero the microtime bins before the most common decay peak.
    pub time_mask: bool,
    /// Passes of the 3x3 median filter over G and S (0 = off).
    pub median_iterations: usize,
}

impl Default for PhasorConfig {
    fn default() -> Self {
        Self {
            harmonic: 1,
            time_mask: false,
            median_iterations: 0,
        }
    }
}

impl PhasorConfig {
    /// Sets the harmonic.
    #[must_use]
    pub fn with_harmonic(mut self, harmonic: usize) -> Self {
        self.harmonic = harmonic;
        self
    }

    /// Sets whether the decay is cut at its peak before the transform.
    #[must_use]
    pub fn with_time_mask(mut self, enabled: bool) -> Self {
        self.time_mask = enabled;
        self
    }

    /// Sets the number of median filter passes.
    #[must_use]
    pub fn with_median_iterations(mut self, iterations: usize) -> Self {
        self.median_iterations = iterations;
        self
    }
}

/// Analysis settings as loaded from a JSON file.
///
/// ```json
/// {
///   "assembler": { "transient_lines": 10, "require_frame_marker": false },
///   "phasor": { "harmonic": 1, "time_mask": false, "median_iterations": 0 }
/// }
/// ```
///
/// Missing sections and fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Frame assembler settings.
    pub assembler: AssemblerConfig,
    /// Phasor settings.
    pub phasor: PhasorConfig,
}

impl AnalysisConfig {
    /// Parses a JSON document.
    ///
    /// # Errors
    /// [`Error::ConfigError`] on malformed JSON or invalid values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a JSON file.
    ///
    /// # Errors
    /// [`Error::ConfigError`] if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::ConfigError(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::ConfigError(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    /// [`Error::ConfigError`] for a zero harmonic.
    pub fn validate(&self) -> Result<()> {
        if self.phasor.harmonic == 0 {
            return Err(Error::ConfigError("phasor.harmonic must be at least 1".into()));
        }
        Ok(())
    }
}
