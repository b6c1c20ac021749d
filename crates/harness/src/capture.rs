//! Screenshot capture into the output directory

use image::GenericImageView;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{HarnessError, HarnessResult};
use crate::scenario::ArtifactSpec;
use crate::session::{PageDriver, ScreenshotRequest};

/// A persisted screenshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureResult {
    pub path: PathBuf,
    pub full_page: bool,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
    /// Hex SHA-256 of the written file
    pub sha256: String,
}

/// Wait for an element capture's selector when none is configured
const DEFAULT_ELEMENT_TIMEOUT: Duration = Duration::from_millis(1000);

pub struct ArtifactCapture {
    output_dir: PathBuf,
    element_timeout: Duration,
}

impl ArtifactCapture {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            element_timeout: DEFAULT_ELEMENT_TIMEOUT,
        }
    }

    /// Bound how long an element capture waits for its selector
    pub fn with_element_timeout(mut self, timeout: Duration) -> Self {
        self.element_timeout = timeout;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where an artifact ends up; relative paths land under the output directory
    pub fn resolve_path(&self, spec: &ArtifactSpec) -> PathBuf {
        if spec.output_path.is_absolute() {
            spec.output_path.clone()
        } else {
            self.output_dir.join(&spec.output_path)
        }
    }

    /// Take the screenshot described by `spec` and write it.
    ///
    /// The image is written to a temporary file next to the target and
    /// renamed over it, so an existing artifact is replaced whole.
    pub async fn capture(
        &self,
        page: &mut dyn PageDriver,
        spec: &ArtifactSpec,
    ) -> HarnessResult<CaptureResult> {
        let path = self.resolve_path(spec);
        let request = ScreenshotRequest {
            full_page: spec.full_page,
            selector: spec.selector.clone(),
            timeout: self.element_timeout,
        };

        let data = page
            .screenshot(&request)
            .await
            .map_err(|e| capture_error(&path, e))?;

        let decoded =
            image::load_from_memory(&data).map_err(|e| capture_error(&path, e))?;
        let (width, height) = decoded.dimensions();

        let sha256 = hex::encode(Sha256::digest(&data));
        let bytes = data.len() as u64;

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&target, &data))
            .await
            .map_err(|e| capture_error(&path, e))?
            .map_err(|e| capture_error(&path, e))?;

        info!("Captured {} ({}x{}, {} bytes)", path.display(), width, height, bytes);

        Ok(CaptureResult {
            path,
            full_page: spec.full_page,
            width,
            height,
            bytes,
            sha256,
        })
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> HarnessResult<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| HarnessError::Io(e.error))?;

    debug!("Wrote {}", path.display());
    Ok(())
}

fn capture_error(path: &Path, reason: impl std::fmt::Display) -> HarnessError {
    HarnessError::Capture {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
