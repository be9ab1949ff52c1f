//! Configuração do tzsync carregada a partir de `tzsync.toml`.
//!
//! A struct [`TzsyncConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis, que reproduzem o
//! comportamento clássico: quatro serviços, timeout de 30s por requisição e
//! nenhum prazo global para a corrida.
//! A variável de ambiente `TZSYNC_SERVICES` tem precedência sobre o arquivo.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::geo::DEFAULT_SERVICES;
use crate::zoneinfo::{DEFAULT_LOCALTIME_PATH, DEFAULT_ZONEINFO_DIR};

const CONFIG_FILE: &str = "tzsync.toml";
const SERVICES_ENV: &str = "TZSYNC_SERVICES";

/// Configuração de nível superior carregada de `tzsync.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct TzsyncConfig {
    /// URLs dos serviços de geolocalização disputados na corrida.
    #[serde(default = "default_services")]
    pub services: Vec<String>,

    /// Timeout de conexão de cada requisição, em segundos.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Timeout total de cada requisição, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Prazo global da corrida. Ausente significa esperar até que algum
    /// serviço responda ou todos falhem.
    #[serde(default)]
    pub deadline_secs: Option<u64>,

    /// Quantas vezes repetir a corrida inteira quando ela falha.
    #[serde(default)]
    pub max_retries: u32,

    /// Atraso base em milissegundos para backoff exponencial.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_zoneinfo_dir")]
    pub zoneinfo_dir: PathBuf,

    #[serde(default = "default_localtime_path")]
    pub localtime_path: PathBuf,
}

fn default_services() -> Vec<String> {
    DEFAULT_SERVICES.iter().map(|s| s.to_string()).collect()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_zoneinfo_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ZONEINFO_DIR)
}

fn default_localtime_path() -> PathBuf {
    PathBuf::from(DEFAULT_LOCALTIME_PATH)
}

impl Default for TzsyncConfig {
    fn default() -> Self {
        Self {
            services: default_services(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            deadline_secs: None,
            max_retries: 0,
            base_delay_ms: default_base_delay_ms(),
            zoneinfo_dir: default_zoneinfo_dir(),
            localtime_path: default_localtime_path(),
        }
    }
}

impl TzsyncConfig {
    /// Carrega a configuração de `path`, ou de `tzsync.toml` no diretório
    /// atual. Sem caminho explícito, usa os defaults se o arquivo não existir.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(CONFIG_FILE).exists() => Self::from_file(Path::new(CONFIG_FILE))?,
            None => Self::default(),
        };

        if let Ok(value) = std::env::var(SERVICES_ENV) {
            config.apply_services_override(&value);
        }

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str::<TzsyncConfig>(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Substitui a lista de serviços por uma lista separada por vírgulas.
    /// Uma lista vazia é ignorada.
    fn apply_services_override(&mut self, value: &str) {
        let services: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if !services.is_empty() {
            self.services = services;
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}
