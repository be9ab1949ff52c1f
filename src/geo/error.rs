//! Tipos de erro para uma única consulta de geolocalização.
//!
//! Um [`FetchError`] nunca sai do racer sozinho: ele só aparece para o
//! chamador como a causa de [`RaceError::AllFailed`](crate::error::RaceError).

use thiserror::Error;

/// Erros que podem ocorrer ao consultar um serviço de geolocalização.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Falha de rede subjacente (DNS, conexão recusada, timeout do cliente).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// O serviço respondeu com um status HTTP que não é 2xx.
    #[error("{url} returned status {status}")]
    Status { status: u16, url: String },

    /// O corpo da resposta não é JSON válido.
    #[error("unable to decode JSON response: {0}")]
    Decode(#[from] serde_json::Error),

    /// JSON válido, mas sem o campo de fuso horário.
    #[error("{url} did not report a timezone")]
    MissingTimezone { url: String },

    /// A corrida terminou antes da resposta chegar.
    #[error("lookup cancelled")]
    Cancelled,
}
