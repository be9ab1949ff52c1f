//! Interface de linha de comando do tzsync baseada em clap.
//!
//! Sem nenhuma flag o programa consulta os serviços padrão e atualiza
//! `/etc/localtime`. As flags apenas sobrescrevem valores de [`TzsyncConfig`](crate::config::TzsyncConfig).

use std::path::PathBuf;

use clap::Parser;

use crate::config::TzsyncConfig;

/// tzsync: detecta o fuso horário pelo IP e atualiza /etc/localtime.
#[derive(Debug, Parser)]
#[command(name = "tzsync", version, about)]
pub struct Cli {
    /// Caminho para um arquivo de configuração TOML.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Prazo global da corrida, em segundos.
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<u64>,

    /// Número de vezes que a corrida inteira é repetida em caso de falha.
    #[arg(long)]
    pub retries: Option<u32>,

    /// Apenas detecta e imprime o fuso, sem alterar o sistema.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}

impl Cli {
    /// Flags take precedence over the file and the environment.
    pub fn apply_overrides(&self, config: &mut TzsyncConfig) {
        if let Some(deadline) = self.deadline {
            config.deadline_secs = Some(deadline);
        }
        if let Some(retries) = self.retries {
            config.max_retries = retries;
        }
    }
}
