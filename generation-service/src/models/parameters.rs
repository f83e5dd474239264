//! Generation parameters accepted from callers.
//!
//! Each parameter is a closed set with a default. Unrecognised input never
//! fails a request: it is logged and replaced by the default.

use serde::{Deserialize, Serialize};

/// Language used when the caller does not specify one.
pub const DEFAULT_LANGUAGE: &str = "french";

/// Parse `input` into `T`, falling back to `T::default()` for unknown or blank
/// values.
fn parse_or_default<T>(field: &'static str, input: Option<&str>, lookup: fn(&str) -> Option<T>) -> T
where
    T: Default,
{
    let Some(raw) = input.map(str::trim).filter(|s| !s.is_empty()) else {
        return T::default();
    };

    match lookup(&raw.to_lowercase()) {
        Some(value) => value,
        None => {
            tracing::warn!(field, value = %raw, "Unknown generation parameter, using default");
            T::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Professional,
    Casual,
    Friendly,
    Formal,
}

impl Tone {
    pub fn parse(input: Option<&str>) -> Self {
        parse_or_default("tone", input, |s| match s {
            "professional" => Some(Tone::Professional),
            "casual" => Some(Tone::Casual),
            "friendly" => Some(Tone::Friendly),
            "formal" => Some(Tone::Formal),
            _ => None,
        })
    }

    /// Phrase inserted into the system prompt.
    pub fn instruction(&self) -> &'static str {
        match self {
            Tone::Professional => "un ton professionnel",
            Tone::Casual => "un ton décontracté",
            Tone::Friendly => "un ton amical",
            Tone::Formal => "un ton formel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LengthTier {
    Short,
    #[default]
    Medium,
    Long,
}

impl LengthTier {
    pub fn parse(input: Option<&str>) -> Self {
        parse_or_default("length", input, |s| match s {
            "short" => Some(LengthTier::Short),
            "medium" => Some(LengthTier::Medium),
            "long" => Some(LengthTier::Long),
            _ => None,
        })
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            LengthTier::Short => "courte",
            LengthTier::Medium => "moyenne",
            LengthTier::Long => "longue",
        }
    }

    /// Output token budget handed to the provider.
    pub fn max_tokens(&self) -> u32 {
        match self {
            LengthTier::Short => 150,
            LengthTier::Medium => 300,
            LengthTier::Long => 600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentDesign {
    #[default]
    Minimal,
    Professional,
    Creative,
    Academic,
}

impl DocumentDesign {
    pub fn parse(input: Option<&str>) -> Self {
        parse_or_default("design", input, |s| match s {
            "minimal" => Some(DocumentDesign::Minimal),
            "professional" => Some(DocumentDesign::Professional),
            "creative" => Some(DocumentDesign::Creative),
            "academic" => Some(DocumentDesign::Academic),
            _ => None,
        })
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            DocumentDesign::Minimal => "Adopte une mise en page sobre et épurée.",
            DocumentDesign::Professional => {
                "Adopte une mise en page professionnelle, adaptée à un contexte d'entreprise."
            }
            DocumentDesign::Creative => "Adopte une mise en page créative et expressive.",
            DocumentDesign::Academic => {
                "Adopte une mise en page académique avec introduction, sections numérotées et conclusion."
            }
        }
    }
}

/// Free-form language with a default. Blank input counts as absent.
pub fn language_or_default(input: Option<&str>) -> String {
    input
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_LANGUAGE)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_values_use_defaults() {
        assert_eq!(Tone::parse(None), Tone::Professional);
        assert_eq!(LengthTier::parse(None), LengthTier::Medium);
        assert_eq!(DocumentDesign::parse(None), DocumentDesign::Minimal);
        assert_eq!(language_or_default(None), "french");
        assert_eq!(language_or_default(Some("   ")), "french");
    }

    #[test]
    fn unknown_values_fall_back_instead_of_failing() {
        assert_eq!(Tone::parse(Some("sarcastic")), Tone::Professional);
        assert_eq!(LengthTier::parse(Some("epic")), LengthTier::Medium);
        assert_eq!(DocumentDesign::parse(Some("brutalist")), DocumentDesign::Minimal);
    }

    #[test]
    fn known_values_are_case_insensitive() {
        assert_eq!(Tone::parse(Some("Casual")), Tone::Casual);
        assert_eq!(LengthTier::parse(Some(" LONG ")), LengthTier::Long);
        assert_eq!(DocumentDesign::parse(Some("academic")), DocumentDesign::Academic);
    }

    #[test]
    fn length_tiers_map_to_token_budgets() {
        assert_eq!(LengthTier::Short.max_tokens(), 150);
        assert_eq!(LengthTier::Medium.max_tokens(), 300);
        assert_eq!(LengthTier::Long.max_tokens(), 600);
    }
}
