//! Interface de terminal do tzsync: spinner e saída colorida.
//!
//! Usa as crates `indicatif` para o spinner de progresso e `console` para
//! estilização com cores. O [`RaceProgress`] acompanha visualmente a corrida
//! entre os serviços e imprime exatamente uma linha com o resultado final.

use std::sync::atomic::{AtomicUsize, Ordering};

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::TzsyncError;
use crate::race::{Disposition, RaceObserver};
use crate::updater::{Applied, Detected};

/// Indicador visual de progresso para a corrida no terminal.
///
/// Exibe um spinner enquanto os serviços são consultados e mensagens
/// coloridas para sucesso (verde), falha (vermelho) e retentativa (amarelo).
pub struct RaceProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    // Quantidade de serviços na corrida atual.
    total: usize,
    // Serviços que já falharam na corrida atual.
    failed: AtomicUsize,
    green: Style,
    red: Style,
    yellow: Style,
}

impl RaceProgress {
    /// Inicia o spinner. Com `visible = false` nada é desenhado, o que evita
    /// misturar o spinner com as linhas de log do modo verbose.
    pub fn start(total: usize, visible: bool) -> Self {
        let pb = if visible {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
                pb.set_style(style);
            }
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            pb
        } else {
            ProgressBar::hidden()
        };
        pb.set_message(format!("Querying {total} services..."));

        Self {
            pb,
            total,
            failed: AtomicUsize::new(0),
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Exibe uma mensagem de retentativa com o número da tentativa e o motivo.
    pub fn retry(&self, attempt: u32, max: u32, reason: &str, delay_ms: u64) {
        self.failed.store(0, Ordering::SeqCst);
        self.pb.println(format!(
            "  {} Retry {attempt}/{max}: {reason} (waiting {delay_ms}ms)",
            self.yellow.apply_to("↻")
        ));
    }

    /// Finaliza o spinner após uma detecção em modo `--dry-run`.
    pub fn detected(&self, detected: &Detected) {
        self.pb.finish_and_clear();
        println!(
            "{} Detected timezone {} (from {})",
            self.green.apply_to("✓"),
            detected.timezone,
            detected.service
        );
    }

    /// Finaliza o spinner e exibe o resultado da aplicação do fuso.
    pub fn complete(&self, detected: &Detected, applied: Applied) {
        self.pb.finish_and_clear();
        match applied {
            Applied::Updated => println!(
                "{} Timezone updated to {}",
                self.green.apply_to("✓"),
                detected.timezone
            ),
            Applied::Unchanged => println!(
                "{} Timezone already set to {}",
                self.green.apply_to("✓"),
                detected.timezone
            ),
        }
    }

    /// Finaliza o spinner e exibe a falha em stderr, com a dica de root
    /// quando o erro é de permissão.
    pub fn fail(&self, err: &TzsyncError) {
        self.pb.finish_and_clear();
        eprintln!("{} {}", self.red.apply_to("✗"), failure_line(err));
    }
}

impl RaceObserver for RaceProgress {
    fn attempt_finished(&self, _index: usize, disposition: Disposition) {
        if disposition == Disposition::Failed {
            let failed = self.failed.fetch_add(1, Ordering::SeqCst) + 1;
            self.pb.set_message(format!(
                "Querying {} services... ({failed} failed)",
                self.total
            ));
        }
    }
}

/// Single line describing a terminal failure.
fn failure_line(err: &TzsyncError) -> String {
    match err {
        TzsyncError::Apply(apply) if apply.is_permission_denied() => {
            format!("{err} (are you running as root?)")
        }
        _ => err.to_string(),
    }
}
