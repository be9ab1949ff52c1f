//! Corpo JSON devolvido pelos serviços de geolocalização por IP.
//!
//! Cada serviço devolve dezenas de campos; apenas o identificador IANA do
//! fuso horário interessa aqui, então todo o resto é ignorado pelo `serde`.

use serde::{Deserialize, Serialize};

/// Resposta mínima de um serviço de geolocalização.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupResponse {
    /// Identificador IANA (ex.: "Europe/Rome").
    ///
    /// Alguns provedores usam `time_zone` em vez de `timezone`.
    #[serde(default, alias = "time_zone")]
    pub timezone: Option<String>,
}

impl LookupResponse {
    /// Returns the timezone name if the service actually sent one.
    pub fn into_timezone(self) -> Option<String> {
        self.timezone
            .map(|tz| tz.trim().to_string())
            .filter(|tz| !tz.is_empty())
    }
}
