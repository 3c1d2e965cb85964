//! Per-upload scratch storage for the transcode
//!
//! A [`Staging`] holds the raw upload and, once encoded, the transcoded
//! output. In disk mode both live as uniquely named files in the configured
//! temp directory. Every file is owned by a `NamedTempFile`, so dropping the
//! guard on any path (error, timeout, panic unwinding) removes it.

use crate::{Error, Result};
use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::{Builder, NamedTempFile};

const FILE_PREFIX: &str = "asset-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingMode {
    Memory,
    Disk,
}

impl FromStr for StagingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StagingMode::Memory),
            "disk" => Ok(StagingMode::Disk),
            other => Err(format!("unknown staging mode '{}'", other)),
        }
    }
}

impl fmt::Display for StagingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StagingMode::Memory => f.write_str("memory"),
            StagingMode::Disk => f.write_str("disk"),
        }
    }
}

enum Slot {
    Memory(Vec<u8>),
    Disk(NamedTempFile),
}

impl Slot {
    fn create(mode: StagingMode, dir: &Path, suffix: &str, bytes: &[u8]) -> Result<Self> {
        match mode {
            StagingMode::Memory => Ok(Slot::Memory(bytes.to_vec())),
            StagingMode::Disk => {
                let mut file = Builder::new()
                    .prefix(FILE_PREFIX)
                    .suffix(suffix)
                    .tempfile_in(dir)?;
                file.write_all(bytes)?;
                file.flush()?;
                Ok(Slot::Disk(file))
            }
        }
    }

    fn read(&self) -> Result<Cow<'_, [u8]>> {
        match self {
            Slot::Memory(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
            Slot::Disk(file) => Ok(Cow::Owned(fs::read(file.path())?)),
        }
    }

    fn path(&self) -> Option<&Path> {
        match self {
            Slot::Memory(_) => None,
            Slot::Disk(file) => Some(file.path()),
        }
    }

    fn close(self) -> std::io::Result<()> {
        match self {
            Slot::Memory(_) => Ok(()),
            Slot::Disk(file) => file.close(),
        }
    }
}

/// Scratch space owned by exactly one upload.
pub struct Staging {
    mode: StagingMode,
    dir: PathBuf,
    input: Slot,
    output: Option<Slot>,
}

impl Staging {
    /// Stage the raw upload bytes.
    pub fn acquire(mode: StagingMode, dir: &Path, raw: &[u8]) -> Result<Self> {
        if mode == StagingMode::Disk {
            fs::create_dir_all(dir)?;
        }
        let input = Slot::create(mode, dir, ".src", raw)?;
        Ok(Self {
            mode,
            dir: dir.to_path_buf(),
            input,
            output: None,
        })
    }

    pub fn input(&self) -> Result<Cow<'_, [u8]>> {
        self.input.read()
    }

    /// Stage the transcoded bytes. Replaces any earlier output.
    pub fn stage_output(&mut self, bytes: &[u8], extension: &str) -> Result<()> {
        let suffix = format!(".{}", extension.trim_start_matches('.'));
        let slot = Slot::create(self.mode, &self.dir, &suffix, bytes)?;
        if let Some(previous) = self.output.replace(slot) {
            previous.close()?;
        }
        Ok(())
    }

    pub fn output(&self) -> Result<Cow<'_, [u8]>> {
        self.output
            .as_ref()
            .ok_or_else(|| Error::Invariant("no transcoded output staged".to_string()))?
            .read()
    }

    /// Paths of the files currently on disk. Empty in memory mode.
    pub fn paths(&self) -> Vec<PathBuf> {
        std::iter::once(&self.input)
            .chain(self.output.as_ref())
            .filter_map(|slot| slot.path().map(Path::to_path_buf))
            .collect()
    }

    /// Remove everything staged. Dropping the guard does the same but
    /// cannot report failures.
    pub fn release(self) {
        let Staging { input, output, .. } = self;
        for slot in std::iter::once(input).chain(output) {
            if let Err(e) = slot.close() {
                tracing::warn!("Failed to remove staged file: {}", e);
            }
        }
    }
}
