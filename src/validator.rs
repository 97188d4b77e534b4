// src/validator.rs
//! Pre-extraction message gate.
//!
//! Extraction calls are slow and metered, so every fetched message passes
//! through this cheap, deterministic classifier first. The gate is tuned for
//! high recall: ambiguous texts go through (the extraction service rejects
//! them later), obvious non-vacancies (media-only posts, short notices) are
//! dropped before any network call.
//!
//! Keyword sets cover the serviced languages (Ukrainian, Russian, English)
//! and can be overridden from a TOML file, same as the rest of the runtime
//! configuration.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_MIN_TEXT_CHARS: usize = 30;
pub const DEFAULT_MIN_SECTION_HITS: usize = 2;

pub const ENV_VALIDATOR_CONFIG_PATH: &str = "VALIDATOR_CONFIG_PATH";

pub const REASON_OK: &str = "ok";
pub const REASON_NO_TEXT: &str = "no text content";
pub const REASON_TOO_SHORT: &str = "too short";
pub const REASON_NO_PRIMARY: &str = "no vacancy indicator";
pub const REASON_TOO_FEW_SECTIONS: &str = "too few section indicators";

/// Outcome of classification. Never an error: every input maps to a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub is_valid: bool,
    pub reason: &'static str,
}

impl Classification {
    fn accept() -> Self {
        Self {
            is_valid: true,
            reason: REASON_OK,
        }
    }

    fn reject(reason: &'static str) -> Self {
        Self {
            is_valid: false,
            reason,
        }
    }
}

/// One thematic group of section markers ("requirements", "salary", ...).
/// A group counts once toward the section threshold no matter how many of
/// its terms match.
#[derive(Debug, Clone, Deserialize)]
pub struct SectionGroup {
    pub name: String,
    pub terms: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorConfig {
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
    #[serde(default = "default_min_section_hits")]
    pub min_section_hits: usize,
    #[serde(default)]
    pub primary_indicators: Vec<String>,
    #[serde(default, rename = "sections")]
    pub section_groups: Vec<SectionGroup>,
}

fn default_min_text_chars() -> usize {
    DEFAULT_MIN_TEXT_CHARS
}

fn default_min_section_hits() -> usize {
    DEFAULT_MIN_SECTION_HITS
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
            min_section_hits: DEFAULT_MIN_SECTION_HITS,
            primary_indicators: default_primary_indicators(),
            section_groups: default_section_groups(),
        }
    }
}

fn default_primary_indicators() -> Vec<String> {
    [
        // English
        "vacancy",
        "hiring",
        "we are hiring",
        "looking for",
        "job opening",
        "open position",
        "position",
        // Ukrainian
        "вакансія",
        "шукаємо",
        "шукаю",
        "потрібен",
        "потрібна",
        "потрібні",
        "набираємо",
        "у пошуку",
        // Russian
        "вакансия",
        "ищем",
        "ищу",
        "требуется",
        "требуются",
        "в поиске",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_section_groups() -> Vec<SectionGroup> {
    fn group(name: &str, terms: &[&str]) -> SectionGroup {
        SectionGroup {
            name: name.to_string(),
            terms: terms.iter().map(|t| t.to_string()).collect(),
        }
    }
    vec![
        group("requirements", &["requirements", "вимоги", "требования"]),
        group(
            "responsibilities",
            &["responsibilities", "duties", "обов'язки", "обязанности"],
        ),
        group(
            "conditions",
            &["conditions", "we offer", "умови", "условия", "пропонуємо", "предлагаем"],
        ),
        group("salary", &["salary", "зп", "зарплата", "платня", "оклад"]),
        group("company", &["company", "компанія", "компания"]),
        group(
            "contacts",
            &["contact", "контакти", "контакты", "apply", "резюме"],
        ),
        group("experience", &["experience", "досвід", "опыт"]),
    ]
}

impl ValidatorConfig {
    /// Load from an explicit TOML path. Lists left out of the file fall back
    /// to the built-in keyword sets, so a file can override just thresholds.
    pub fn from_toml_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading validator config from {}", path.display()))?;
        let mut cfg: ValidatorConfig =
            toml::from_str(&content).context("parsing validator config TOML")?;
        if cfg.primary_indicators.is_empty() {
            cfg.primary_indicators = default_primary_indicators();
        }
        if cfg.section_groups.is_empty() {
            cfg.section_groups = default_section_groups();
        }
        cfg.normalize();
        Ok(cfg)
    }

    /// Load using `$VALIDATOR_CONFIG_PATH` when set, built-in defaults otherwise.
    pub fn load_default() -> Result<Self> {
        match std::env::var(ENV_VALIDATOR_CONFIG_PATH) {
            Ok(p) => Self::from_toml_path(Path::new(&p)),
            Err(_) => {
                let mut cfg = Self::default();
                cfg.normalize();
                Ok(cfg)
            }
        }
    }

    /// Lowercase all terms once so `classify` only lowercases the input.
    fn normalize(&mut self) {
        for t in &mut self.primary_indicators {
            *t = t.trim().to_lowercase();
        }
        self.primary_indicators.retain(|t| !t.is_empty());
        for g in &mut self.section_groups {
            for t in &mut g.terms {
                *t = t.trim().to_lowercase();
            }
            g.terms.retain(|t| !t.is_empty());
        }
    }

    /// Decide whether a message text is plausibly a vacancy.
    ///
    /// Pure and deterministic: same text, same decision. `None` and empty
    /// text reject with [`REASON_NO_TEXT`]; texts below the length threshold
    /// reject with [`REASON_TOO_SHORT`] before any keyword check runs.
    pub fn classify(&self, text: Option<&str>) -> Classification {
        let Some(text) = text else {
            return Classification::reject(REASON_NO_TEXT);
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Classification::reject(REASON_NO_TEXT);
        }
        if trimmed.chars().count() < self.min_text_chars {
            return Classification::reject(REASON_TOO_SHORT);
        }

        let lower = trimmed.to_lowercase();

        if !self
            .primary_indicators
            .iter()
            .any(|term| lower.contains(term.as_str()))
        {
            return Classification::reject(REASON_NO_PRIMARY);
        }

        let section_hits = self
            .section_groups
            .iter()
            .filter(|g| g.terms.iter().any(|term| lower.contains(term.as_str())))
            .count();
        if section_hits < self.min_section_hits {
            return Classification::reject(REASON_TOO_FEW_SECTIONS);
        }

        Classification::accept()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VACANCY_TEXT: &str = "Вакансія: Rust Developer\n\
        Вимоги: 3+ роки досвіду з Rust, знання Tokio\n\
        Умови: віддалена робота, гнучкий графік\n\
        ЗП: 4000-6000 USD\n\
        Контакти: @recruiter";

    #[test]
    fn missing_and_empty_text_reject_with_no_text() {
        let cfg = ValidatorConfig::default();
        assert_eq!(cfg.classify(None).reason, REASON_NO_TEXT);
        assert_eq!(cfg.classify(Some("")).reason, REASON_NO_TEXT);
        assert_eq!(cfg.classify(Some("   \n ")).reason, REASON_NO_TEXT);
    }

    #[test]
    fn short_text_rejects_regardless_of_keywords() {
        let cfg = ValidatorConfig::default();
        // 20 chars, contains a primary indicator.
        let out = cfg.classify(Some("вакансія rust dev!!!"));
        assert!(!out.is_valid);
        assert_eq!(out.reason, REASON_TOO_SHORT);
    }

    #[test]
    fn text_without_primary_indicator_rejects() {
        let cfg = ValidatorConfig::default();
        let out = cfg.classify(Some(
            "Our weekly digest of Rust ecosystem news, releases and articles.",
        ));
        assert!(!out.is_valid);
        assert_eq!(out.reason, REASON_NO_PRIMARY);
    }

    #[test]
    fn primary_indicator_alone_is_not_enough() {
        let cfg = ValidatorConfig::default();
        let out = cfg.classify(Some(
            "We are hiring! Details will be announced in the next post, stay tuned.",
        ));
        assert!(!out.is_valid);
        assert_eq!(out.reason, REASON_TOO_FEW_SECTIONS);
    }

    #[test]
    fn obvious_vacancy_is_accepted() {
        let cfg = ValidatorConfig::default();
        let out = cfg.classify(Some(VACANCY_TEXT));
        assert!(out.is_valid, "reason: {}", out.reason);
        assert_eq!(out.reason, REASON_OK);
    }

    #[test]
    fn classification_is_deterministic() {
        let cfg = ValidatorConfig::default();
        let a = cfg.classify(Some(VACANCY_TEXT));
        let b = cfg.classify(Some(VACANCY_TEXT));
        assert_eq!(a, b);
    }

    #[test]
    fn toml_override_keeps_default_keywords_when_lists_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("validator.toml");
        std::fs::write(&path, "min_text_chars = 10\nmin_section_hits = 1\n").unwrap();

        let cfg = ValidatorConfig::from_toml_path(&path).unwrap();
        assert_eq!(cfg.min_text_chars, 10);
        assert_eq!(cfg.min_section_hits, 1);
        assert!(!cfg.primary_indicators.is_empty());
        assert!(!cfg.section_groups.is_empty());
    }

    #[test]
    fn toml_override_replaces_keyword_sets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("validator.toml");
        std::fs::write(
            &path,
            r#"
primary_indicators = ["JOB:"]

[[sections]]
name = "pay"
terms = ["Pay:"]

[[sections]]
name = "where"
terms = ["Where:"]
"#,
        )
        .unwrap();

        let cfg = ValidatorConfig::from_toml_path(&path).unwrap();
        let accepted = cfg.classify(Some(
            "job: senior backend engineer. pay: competitive. where: anywhere in Europe.",
        ));
        assert!(accepted.is_valid, "terms are matched case-insensitively");

        let rejected = cfg.classify(Some(VACANCY_TEXT));
        assert_eq!(rejected.reason, REASON_NO_PRIMARY);
    }
}
