//! Tipos de erro de nível superior do tzsync.
//!
//! [`RaceError`] é o único resultado de falha que atravessa a fronteira do
//! [`Racer`](crate::race::Racer); [`ApplyError`] cobre a aplicação do fuso
//! vencedor ao sistema. Os dois nunca se misturam: [`TzsyncError`] os mantém
//! em variantes separadas para que o chamador decida a mensagem final.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::geo::FetchError;

#[derive(Debug, Error)]
pub enum TzsyncError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Could not retrieve any timezone from the services: {0}")]
    Race(#[from] RaceError<FetchError>),

    #[error("{0}")]
    Apply(#[from] ApplyError),
}

/// Terminal failure of a single race.
#[derive(Debug, Error)]
pub enum RaceError<E> {
    /// The race was started without any descriptor.
    #[error("no candidate services configured")]
    NoCandidates,

    /// Every attempt failed. Carries the failure observed last.
    #[error("cannot reach any service: {0}")]
    AllFailed(#[source] E),

    /// The deadline elapsed before any attempt succeeded.
    #[error("deadline exceeded before any service answered")]
    TimedOut,

    /// The caller's cancellation token fired before any attempt succeeded.
    #[error("cancelled before any service answered")]
    Cancelled,
}

impl<E> RaceError<E> {
    /// Whether running the whole race again could produce a different result.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RaceError::AllFailed(_) | RaceError::TimedOut)
    }
}

/// Erros ao aplicar o fuso horário vencedor em `/etc/localtime`.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// O nome recebido não é um caminho relativo seguro dentro do zoneinfo.
    #[error("Timezone {0:?} is not a valid zone name")]
    InvalidName(String),

    /// O arquivo do fuso não existe no banco zoneinfo local.
    #[error("Timezone {0} not supported")]
    Unsupported(String),

    #[error("unexpected error inspecting {}: {source}", path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not remove current timezone: {0}")]
    Remove(#[source] io::Error),

    #[error("could not create symlink: {0}")]
    Link(#[source] io::Error),
}

impl ApplyError {
    /// True when the underlying cause is an access-control failure.
    pub fn is_permission_denied(&self) -> bool {
        let source = match self {
            ApplyError::Inspect { source, .. } => source,
            ApplyError::Remove(source) | ApplyError::Link(source) => source,
            ApplyError::InvalidName(_) | ApplyError::Unsupported(_) => return false,
        };
        source.kind() == io::ErrorKind::PermissionDenied
    }
}
