//! External transcoder wrapper
//!
//! Sound and video records are handed to `ffmpeg`. The binary is probed once with
//! `-version`; when it cannot be run every conversion reports `Ok(false)` and the caller
//! leaves the source as is.

use std::{
    ffi::OsString,
    path::Path,
    process::{Command, Stdio},
};

use anyhow::{bail, Context, Result};

const DEFAULT_BINARY: &str = "ffmpeg";

#[derive(Debug, Clone)]
pub struct MediaConverter {
    binary: OsString,
    available: bool,
}

impl MediaConverter {
    /// Probes `ffmpeg` from `PATH`.
    pub fn new() -> Self {
        Self::with_binary(DEFAULT_BINARY)
    }

    pub fn with_binary(binary: impl Into<OsString>) -> Self {
        let binary = binary.into();
        let available = run(&binary, &["-version".into()]).is_ok();
        if available {
            log::info!("Using transcoder {:?}", binary);
        } else {
            log::warn!(
                "Transcoder {:?} not found; sound and video records will not be converted",
                binary
            );
        }
        MediaConverter { binary, available }
    }

    /// A converter that never runs anything.
    pub fn disabled() -> Self {
        MediaConverter {
            binary: OsString::from(DEFAULT_BINARY),
            available: false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Transcodes any audio input into 16-bit PCM WAV.
    pub fn prepare_wav(&self, source: &Path, dest: &Path) -> Result<bool> {
        if !self.available {
            return Ok(false);
        }
        run(
            &self.binary,
            &[
                "-y".into(),
                "-i".into(),
                source.into(),
                "-c:a".into(),
                "pcm_s16le".into(),
                dest.into(),
            ],
        )?;
        Ok(true)
    }

    /// Transcodes a video using the default codec for the destination extension.
    pub fn prepare_video(&self, source: &Path, dest: &Path) -> Result<bool> {
        if !self.available {
            return Ok(false);
        }
        run(
            &self.binary,
            &[
                "-y".into(),
                "-i".into(),
                source.into(),
                "-threads".into(),
                "1".into(),
                dest.into(),
            ],
        )?;
        Ok(true)
    }
}

impl Default for MediaConverter {
    fn default() -> Self {
        Self::new()
    }
}

fn run(binary: &OsString, args: &[OsString]) -> Result<()> {
    let output = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute {:?}", binary))?;

    if !output.status.success() {
        bail!(
            "{:?} {:?} failed ({}): {}",
            binary,
            args,
            output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "terminated".to_string()),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}
