//! Build units: an operation described by its declared inputs and outputs.
//!
//! A [`BuildUnit`] records the files an operation reads, the parameters that
//! shape its result and the files it produces. An [`InvalidationPolicy`]
//! decides whether the outputs are current; [`BuildUnit::run`] skips the work
//! when they are and removes the declared outputs when the work fails.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use bam_transform::container::index_path_for;
//! use bam_transform::job::{BuildUnit, Outcome, StampPolicy};
//! use bam_transform::core::types::TransformOptions;
//! use bam_transform::ops::subtract_files;
//!
//! let (input, exclude, output) = (Path::new("a.bam"), Path::new("b.bam"), Path::new("out.bam"));
//! let options = TransformOptions::default();
//!
//! let unit = BuildUnit::new("subtract")
//!     .input(input)
//!     .input(exclude)
//!     .output(output)
//!     .output(index_path_for(output))
//!     .param("options", &options)
//!     .unwrap();
//!
//! match unit.run(&StampPolicy, || subtract_files(input, exclude, output, &options)).unwrap() {
//!     Outcome::UpToDate => println!("nothing to do"),
//!     Outcome::Built(summary) => println!("{} records written", summary.records_out),
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::error::TransformError;

/// Errors from running a build unit
#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Stamp error: {0}")]
    Stamp(#[from] serde_json::Error),
}

/// Result of [`BuildUnit::run`]
#[derive(Debug)]
pub enum Outcome<T> {
    /// The policy found the outputs current; the work was not run
    UpToDate,
    /// The work ran and succeeded
    Built(T),
}

/// Declared inputs, parameters and outputs of one operation
#[derive(Debug, Clone)]
pub struct BuildUnit {
    name: String,
    inputs: Vec<PathBuf>,
    outputs: Vec<PathBuf>,
    params: serde_json::Map<String, serde_json::Value>,
}

impl BuildUnit {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            params: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(path.into());
        self
    }

    /// Declare an output. The first output is the unit's primary file.
    #[must_use]
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.outputs.push(path.into());
        self
    }

    /// Add a named parameter to the fingerprint
    ///
    /// # Errors
    ///
    /// Returns `JobError::Stamp` if `value` cannot be serialized.
    pub fn param<T: Serialize + ?Sized>(mut self, key: &str, value: &T) -> Result<Self, JobError> {
        self.params
            .insert(key.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    #[must_use]
    pub fn outputs(&self) -> &[PathBuf] {
        &self.outputs
    }

    /// MD5 over the unit name, crate version, parameters and the size and
    /// modification time of every input.
    ///
    /// # Errors
    ///
    /// Returns `JobError::Io` if an input cannot be stat'ed.
    pub fn fingerprint(&self) -> Result<String, JobError> {
        let mut ctx = md5::Context::new();
        ctx.consume(self.name.as_bytes());
        ctx.consume([0u8]);
        ctx.consume(env!("CARGO_PKG_VERSION").as_bytes());
        ctx.consume([0u8]);
        ctx.consume(serde_json::to_vec(&self.params)?);

        for input in &self.inputs {
            let meta = fs::metadata(input)?;
            let mtime = meta
                .modified()?
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_nanos());
            ctx.consume([0u8]);
            ctx.consume(input.to_string_lossy().as_bytes());
            ctx.consume(meta.len().to_le_bytes());
            ctx.consume(mtime.to_le_bytes());
        }

        Ok(format!("{:x}", ctx.compute()))
    }

    /// Run `work` unless `policy` finds the outputs current.
    ///
    /// On success the policy records the new state. On failure every
    /// declared output that exists is removed, so a failed unit never leaves
    /// outputs that look current.
    ///
    /// # Errors
    ///
    /// Returns the error of `work`, or the policy's I/O and stamp errors.
    pub fn run<T, F, P>(&self, policy: &P, work: F) -> Result<Outcome<T>, JobError>
    where
        F: FnOnce() -> Result<T, TransformError>,
        P: InvalidationPolicy + ?Sized,
    {
        if policy.is_up_to_date(self)? {
            info!(unit = %self.name, "Outputs are up to date, skipping");
            return Ok(Outcome::UpToDate);
        }

        match work() {
            Ok(value) => {
                policy.record(self)?;
                Ok(Outcome::Built(value))
            }
            Err(e) => {
                self.remove_outputs();
                policy.forget(self);
                Err(e.into())
            }
        }
    }

    fn remove_outputs(&self) {
        for output in &self.outputs {
            if output.exists() {
                warn!(unit = %self.name, output = %output.display(), "Removing output of failed unit");
                if let Err(e) = fs::remove_file(output) {
                    warn!(output = %output.display(), error = %e, "Could not remove output");
                }
            }
        }
    }
}

/// Decides whether a unit's outputs are current
pub trait InvalidationPolicy {
    /// Whether the unit can be skipped
    ///
    /// # Errors
    ///
    /// Returns an error if the unit's state cannot be determined.
    fn is_up_to_date(&self, unit: &BuildUnit) -> Result<bool, JobError>;

    /// Remember the state after a successful run
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be persisted.
    fn record(&self, unit: &BuildUnit) -> Result<(), JobError>;

    /// Discard remembered state after a failed run
    fn forget(&self, _unit: &BuildUnit) {}
}

/// Never skips, remembers nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRun;

impl InvalidationPolicy for AlwaysRun {
    fn is_up_to_date(&self, _unit: &BuildUnit) -> Result<bool, JobError> {
        Ok(false)
    }

    fn record(&self, _unit: &BuildUnit) -> Result<(), JobError> {
        Ok(())
    }
}

/// Contents of a stamp file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stamp {
    pub unit: String,
    pub fingerprint: String,
    pub outputs: Vec<String>,
    pub created: DateTime<Utc>,
}

/// Skips a unit when every output exists and a JSON stamp next to the
/// primary output carries the current fingerprint
#[derive(Debug, Clone, Copy, Default)]
pub struct StampPolicy;

impl StampPolicy {
    /// `out.bam` → `out.bam.stamp.json`
    #[must_use]
    pub fn stamp_path(unit: &BuildUnit) -> Option<PathBuf> {
        unit.outputs.first().map(|primary| {
            let mut s = primary.as_os_str().to_owned();
            s.push(".stamp.json");
            PathBuf::from(s)
        })
    }

    fn read_stamp(path: &Path) -> Option<Stamp> {
        let text = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&text) {
            Ok(stamp) => Some(stamp),
            Err(e) => {
                warn!(stamp = %path.display(), error = %e, "Ignoring unreadable stamp");
                None
            }
        }
    }
}

impl InvalidationPolicy for StampPolicy {
    fn is_up_to_date(&self, unit: &BuildUnit) -> Result<bool, JobError> {
        let Some(stamp_path) = Self::stamp_path(unit) else {
            return Ok(false);
        };
        if let Some(missing) = unit.outputs.iter().find(|o| !o.exists()) {
            debug!(unit = %unit.name, output = %missing.display(), "Output missing");
            return Ok(false);
        }
        let Some(stamp) = Self::read_stamp(&stamp_path) else {
            return Ok(false);
        };

        let current = unit.fingerprint()?;
        debug!(
            unit = %unit.name,
            stamped = %stamp.fingerprint,
            current = %current,
            "Comparing fingerprints"
        );
        Ok(stamp.unit == unit.name && stamp.fingerprint == current)
    }

    fn record(&self, unit: &BuildUnit) -> Result<(), JobError> {
        let Some(stamp_path) = Self::stamp_path(unit) else {
            return Ok(());
        };

        let stamp = Stamp {
            unit: unit.name.clone(),
            fingerprint: unit.fingerprint()?,
            outputs: unit
                .outputs
                .iter()
                .filter(|o| o.exists())
                .map(|o| o.display().to_string())
                .collect(),
            created: Utc::now(),
        };
        fs::write(&stamp_path, serde_json::to_string_pretty(&stamp)?)?;
        debug!(stamp = %stamp_path.display(), "Wrote stamp");
        Ok(())
    }

    fn forget(&self, unit: &BuildUnit) {
        if let Some(stamp_path) = Self::stamp_path(unit) {
            let _ = fs::remove_file(stamp_path);
        }
    }
}
