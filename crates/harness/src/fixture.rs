//! Fixture resolution
//!
//! Turns the fixture reference of a scenario into something the browser can
//! load. Relative paths are resolved against an explicit base directory so
//! the outcome never depends on where the harness was launched from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use url::Url;

use crate::error::{HarnessError, HarnessResult};

/// Schemes accepted as already-loadable URLs
const URL_SCHEMES: &[&str] = &["http", "https", "file", "data", "about"];

/// Where a fixture document lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FixtureRef {
    Path(PathBuf),
    Url(String),
}

impl FixtureRef {
    pub fn parse(reference: &str) -> Self {
        match Url::parse(reference) {
            // single-letter schemes are Windows drive letters, not URLs
            Ok(url) if url.scheme().len() > 1 && URL_SCHEMES.contains(&url.scheme()) => {
                FixtureRef::Url(reference.to_string())
            }
            _ => FixtureRef::Path(PathBuf::from(reference)),
        }
    }
}

impl From<String> for FixtureRef {
    fn from(s: String) -> Self {
        FixtureRef::parse(&s)
    }
}

impl From<&str> for FixtureRef {
    fn from(s: &str) -> Self {
        FixtureRef::parse(s)
    }
}

impl From<FixtureRef> for String {
    fn from(r: FixtureRef) -> Self {
        r.to_string()
    }
}

impl fmt::Display for FixtureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureRef::Path(p) => write!(f, "{}", p.display()),
            FixtureRef::Url(u) => write!(f, "{}", u),
        }
    }
}

/// A URI the browser can navigate to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadableUri {
    pub uri: String,
    /// Backing file for `file://` fixtures
    pub local_path: Option<PathBuf>,
}

impl LoadableUri {
    pub fn as_str(&self) -> &str {
        &self.uri
    }
}

impl fmt::Display for LoadableUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Resolves fixture references against a fixed base directory
#[derive(Debug, Clone)]
pub struct FixtureLocator {
    base_dir: PathBuf,
}

impl FixtureLocator {
    /// The base directory is made absolute once, here, so later resolution
    /// is unaffected by changes to the process working directory.
    pub fn new(base_dir: impl Into<PathBuf>) -> HarnessResult<Self> {
        let base_dir = base_dir.into();
        let base_dir = if base_dir.is_absolute() {
            base_dir
        } else {
            std::path::absolute(&base_dir)?
        };
        Ok(Self {
            base_dir: normalize_lexically(&base_dir),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn resolve(&self, reference: &FixtureRef) -> HarnessResult<LoadableUri> {
        match reference {
            FixtureRef::Path(path) => self.resolve_path(path),
            FixtureRef::Url(raw) => self.resolve_url(raw),
        }
    }

    fn resolve_path(&self, path: &Path) -> HarnessResult<LoadableUri> {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        };
        let absolute = normalize_lexically(&joined);
        ensure_readable_file(&absolute)?;

        let url = Url::from_file_path(&absolute).map_err(|_| HarnessError::InvalidFixture {
            reference: path.display().to_string(),
            reason: "cannot express path as a file URI".to_string(),
        })?;

        Ok(LoadableUri {
            uri: url.to_string(),
            local_path: Some(absolute),
        })
    }

    fn resolve_url(&self, raw: &str) -> HarnessResult<LoadableUri> {
        let url = Url::parse(raw).map_err(|e| HarnessError::InvalidFixture {
            reference: raw.to_string(),
            reason: e.to_string(),
        })?;

        if url.scheme() != "file" {
            return Ok(LoadableUri {
                uri: url.to_string(),
                local_path: None,
            });
        }

        let path = url.to_file_path().map_err(|_| HarnessError::InvalidFixture {
            reference: raw.to_string(),
            reason: "file URI has no local path".to_string(),
        })?;
        ensure_readable_file(&path)?;

        Ok(LoadableUri {
            uri: url.to_string(),
            local_path: Some(path),
        })
    }
}

fn ensure_readable_file(path: &Path) -> HarnessResult<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => {
            // metadata succeeds on unreadable files; opening does not
            std::fs::File::open(path)
                .map(|_| ())
                .map_err(|_| HarnessError::FixtureNotFound(path.to_path_buf()))
        }
        _ => Err(HarnessError::FixtureNotFound(path.to_path_buf())),
    }
}

/// Collapses `.` and `..` without touching the filesystem
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
