//! Provider requests built from caller parameters.

use crate::models::{DocumentDesign, LengthTier, Tone};
use crate::services::providers::{GenerationParams, ProviderRequest, DEFAULT_TEMPERATURE};

/// Output budget for document generation.
pub const DOCUMENT_MAX_TOKENS: u32 = 1000;

pub fn text_request(prompt: &str, tone: Tone, length: LengthTier, language: &str) -> ProviderRequest {
    let system_prompt = format!(
        "Tu es un assistant IA qui génère du contenu. Réponds en {} avec {} et une longueur {}.",
        language,
        tone.instruction(),
        length.instruction()
    );

    ProviderRequest {
        system_prompt,
        user_prompt: prompt.to_string(),
        params: GenerationParams {
            max_tokens: length.max_tokens(),
            temperature: DEFAULT_TEMPERATURE,
        },
    }
}

pub fn document_request(prompt: &str, design: DocumentDesign) -> ProviderRequest {
    let system_prompt = format!(
        "Tu es un assistant qui crée du contenu structuré pour des PDF. \
         Génère un contenu bien formaté avec des titres, sous-titres et paragraphes. \
         Utilise le markdown pour la structure. {}",
        design.instruction()
    );

    ProviderRequest {
        system_prompt,
        user_prompt: prompt.to_string(),
        params: GenerationParams {
            max_tokens: DOCUMENT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_request_carries_tone_length_and_language() {
        let request = text_request("Write a slogan", Tone::Friendly, LengthTier::Long, "english");

        assert!(request.system_prompt.contains("english"));
        assert!(request.system_prompt.contains("un ton amical"));
        assert!(request.system_prompt.contains("longue"));
        assert_eq!(request.user_prompt, "Write a slogan");
        assert_eq!(request.params.max_tokens, 600);
        assert_eq!(request.params.temperature, 0.7);
    }

    #[test]
    fn document_request_uses_fixed_budget() {
        let request = document_request("Quarterly report", DocumentDesign::Academic);

        assert_eq!(request.params.max_tokens, 1000);
        assert!(request.system_prompt.contains("markdown"));
        assert!(request.system_prompt.contains("académique"));
    }
}
