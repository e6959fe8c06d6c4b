//! Versioned engine-binary cache: download, validate, retire.
//!
//! # Cache Structure
//!
//! ```text
//! <data-dir>/engines/
//!   engine-7.1.0          # immutable once present + executable
//!   engine-7.2.0
//!   engine-7.3.0.partial  # in-flight download, never executed
//! ```
//!
//! A binary that is present and executable is treated as immutable
//! and never re-downloaded. Downloads land on a `.partial` path and
//! are renamed into place only after validation, so a crashed
//! download can never be mistaken for a usable engine.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::errors::{BenchError, BenchResult};
use crate::settings::Settings;

/// Magic-byte check: we accept ELF, shebang scripts, and Mach-O.
fn looks_executable(prefix: &[u8]) -> bool {
    const ELF: [u8; 4] = [0x7f, b'E', b'L', b'F'];
    const MACHO: [[u8; 4]; 4] = [
        [0xfe, 0xed, 0xfa, 0xce],
        [0xfe, 0xed, 0xfa, 0xcf],
        [0xcf, 0xfa, 0xed, 0xfe],
        [0xca, 0xfe, 0xba, 0xbe],
    ];
    if prefix.len() < 4 {
        return false;
    }
    if prefix[..4] == ELF || prefix.starts_with(b"#!") {
        return true;
    }
    MACHO.iter().any(|magic| prefix[..4] == *magic)
}

/// Download, verify, cache, and retire engine binaries by version.
#[derive(Debug, Clone)]
pub struct EngineRepository {
    cache_dir: PathBuf,
    url_template: String,
    client: reqwest::Client,
}

impl EngineRepository {
    pub fn new(settings: &Settings) -> BenchResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.download_connect_timeout())
            .timeout(settings.download_timeout())
            .build()?;
        Ok(Self {
            cache_dir: settings.engines_dir(),
            url_template: settings.download_url_template.clone(),
            client,
        })
    }

    /// Deterministic cache path for a version.
    pub fn binary_path(&self, version: &str) -> PathBuf {
        self.cache_dir.join(format!("engine-{}", sanitize(version)))
    }

    /// Idempotent: a cached executable binary is returned without any
    /// network access; otherwise download, validate, install.
    pub async fn ensure(&self, version: &str) -> BenchResult<PathBuf> {
        let path = self.binary_path(version);
        if is_executable_file(&path) {
            debug!(version, path = %path.display(), "engine cache hit");
            return Ok(path);
        }

        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| BenchError::io(format!("creating {}", self.cache_dir.display()), e))?;

        let url = self.url_template.replace("{version}", version);
        info!(version, url = %url, "downloading engine binary");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BenchError::Network {
                message: format!("HTTP {} downloading {}", status.as_u16(), url),
            });
        }
        let payload = response.bytes().await?;

        let partial = self.cache_dir.join(format!("engine-{}.partial", sanitize(version)));
        let installed = self.install(version, &partial, &path, &payload);
        if installed.is_err() {
            let _ = fs::remove_file(&partial);
        }
        installed?;

        info!(version, path = %path.display(), "engine binary installed");
        Ok(path)
    }

    fn install(
        &self,
        version: &str,
        partial: &Path,
        path: &Path,
        payload: &[u8],
    ) -> BenchResult<()> {
        if payload.is_empty() {
            return Err(BenchError::DownloadValidation {
                version: version.to_string(),
                reason: "downloaded artifact is empty".to_string(),
            });
        }
        if !looks_executable(payload) {
            return Err(BenchError::DownloadValidation {
                version: version.to_string(),
                reason: "downloaded artifact is not a recognized executable format".to_string(),
            });
        }

        fs::write(partial, payload)
            .map_err(|e| BenchError::io(format!("writing {}", partial.display()), e))?;
        set_executable(partial)
            .map_err(|e| BenchError::io(format!("marking {} executable", partial.display()), e))?;
        fs::rename(partial, path)
            .map_err(|e| BenchError::io(format!("installing {}", path.display()), e))?;
        Ok(())
    }

    /// Delete all cached binaries beyond the `keep` most recently
    /// modified. Returns the retired paths.
    pub fn retire_old(&self, keep: usize) -> BenchResult<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(BenchError::io(
                    format!("listing {}", self.cache_dir.display()),
                    err,
                ))
            }
        };

        let mut binaries: Vec<(SystemTime, PathBuf)> = Vec::new();
        for entry in entries.filter_map(Result::ok) {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with("engine-") || name.ends_with(".partial") {
                continue;
            }
            let Ok(meta) = entry.metadata() else { continue };
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            binaries.push((modified, entry.path()));
        }

        binaries.sort_by(|a, b| b.0.cmp(&a.0));

        let mut retired = Vec::new();
        for (_, path) in binaries.into_iter().skip(keep) {
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!(path = %path.display(), "retired old engine binary");
                    retired.push(path);
                }
                Err(err) => warn!(path = %path.display(), error = %err, "failed to retire binary"),
            }
        }
        Ok(retired)
    }
}

fn sanitize(version: &str) -> String {
    version
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn is_executable_file(path: &Path) -> bool {
    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

fn set_executable(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}
