//! Aplicação do fuso horário vencedor ao sistema.
//!
//! O [`LocaltimeLink`] troca o symlink `/etc/localtime` para apontar para o
//! arquivo correspondente em `/usr/share/zoneinfo`. O nome recebido vem de um
//! serviço remoto, então ele é validado antes de virar caminho.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::ApplyError;

pub const DEFAULT_ZONEINFO_DIR: &str = "/usr/share/zoneinfo";
pub const DEFAULT_LOCALTIME_PATH: &str = "/etc/localtime";

/// Consumes the winning timezone of a race.
pub trait TimezoneSink {
    /// Zone currently in effect, if it can be determined.
    fn current(&self) -> Option<String>;

    fn apply(&self, timezone: &str) -> Result<(), ApplyError>;
}

/// Sink that rewrites the `localtime` symlink.
#[derive(Debug, Clone)]
pub struct LocaltimeLink {
    zoneinfo_dir: PathBuf,
    localtime_path: PathBuf,
}

impl Default for LocaltimeLink {
    fn default() -> Self {
        Self::new(DEFAULT_ZONEINFO_DIR, DEFAULT_LOCALTIME_PATH)
    }
}

impl LocaltimeLink {
    pub fn new(zoneinfo_dir: impl Into<PathBuf>, localtime_path: impl Into<PathBuf>) -> Self {
        Self {
            zoneinfo_dir: zoneinfo_dir.into(),
            localtime_path: localtime_path.into(),
        }
    }

    /// Resolve `timezone` to a file inside the zoneinfo directory.
    fn zone_path(&self, timezone: &str) -> Result<PathBuf, ApplyError> {
        let relative = Path::new(timezone);
        let safe = !timezone.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return Err(ApplyError::InvalidName(timezone.to_string()));
        }
        Ok(self.zoneinfo_dir.join(relative))
    }
}

impl TimezoneSink for LocaltimeLink {
    fn current(&self) -> Option<String> {
        let target = fs::read_link(&self.localtime_path).ok()?;
        let zone = target.strip_prefix(&self.zoneinfo_dir).ok()?;
        zone.to_str().map(str::to_string)
    }

    fn apply(&self, timezone: &str) -> Result<(), ApplyError> {
        let zone_path = self.zone_path(timezone)?;

        match fs::metadata(&zone_path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(ApplyError::Unsupported(timezone.to_string())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ApplyError::Unsupported(timezone.to_string()));
            }
            Err(source) => {
                return Err(ApplyError::Inspect {
                    path: zone_path,
                    source,
                });
            }
        }

        match fs::remove_file(&self.localtime_path) {
            Ok(()) => {}
            // Nothing to replace on a fresh system.
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(ApplyError::Remove(err)),
        }

        symlink(&zone_path, &self.localtime_path).map_err(ApplyError::Link)?;

        tracing::info!(
            zone = %zone_path.display(),
            link = %self.localtime_path.display(),
            "localtime updated"
        );
        Ok(())
    }
}

#[cfg(unix)]
fn symlink(original: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(not(unix))]
fn symlink(_original: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "localtime symlinks are only supported on unix",
    ))
}
