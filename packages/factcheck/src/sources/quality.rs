//! Acceptance check applied to every strategy's output.

use crate::types::config::SourceConfig;

/// Phrases that mark interstitials, paywalls and bot walls rather than
/// article text.
const BOILERPLATE_MARKERS: &[&str] = &[
    "enable javascript",
    "javascript is disabled",
    "please enable cookies",
    "are you a robot",
    "verify you are human",
    "captcha",
    "access denied",
    "403 forbidden",
    "just a moment",
    "subscribe to continue reading",
    "ative o javascript",
    "habilite o javascript",
    "assine para continuar",
    "conteúdo exclusivo para assinantes",
];

/// Minimum length, text-to-markup ratio and boilerplate screen.
#[derive(Debug, Clone)]
pub struct QualityGate {
    min_text_chars: usize,
    min_text_ratio: f64,
    boilerplate_check_below: usize,
}

impl QualityGate {
    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            min_text_chars: config.min_text_chars,
            min_text_ratio: config.min_text_ratio,
            boilerplate_check_below: config.boilerplate_check_below,
        }
    }

    /// `Err` carries the rejection reason.
    pub fn check(&self, text: &str, markup_len: usize) -> Result<(), String> {
        let chars = text.chars().count();
        if chars < self.min_text_chars {
            return Err(format!(
                "text too short ({} < {} chars)",
                chars, self.min_text_chars
            ));
        }

        if markup_len > 0 {
            let ratio = text.len() as f64 / markup_len as f64;
            if ratio < self.min_text_ratio {
                return Err(format!(
                    "text/markup ratio {:.4} below {}",
                    ratio, self.min_text_ratio
                ));
            }
        }

        if chars < self.boilerplate_check_below {
            let lower = text.to_lowercase();
            if let Some(marker) = BOILERPLATE_MARKERS.iter().find(|m| lower.contains(*m)) {
                return Err(format!("boilerplate detected ({})", marker));
            }
        }

        Ok(())
    }
}
