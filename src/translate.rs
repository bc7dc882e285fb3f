use thiserror::Error;
use tracing::debug;

use crate::llm::Generator;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("empty response from generation service")]
    EmptyResponse,

    #[error(transparent)]
    Service(#[from] anyhow::Error),
}

/// Instruction sent to the generation service for one translation.
pub fn build_prompt(text: &str, target: &str) -> String {
    format!(
        "Detect the language of the text below automatically and translate it into the \
         language with code \"{target}\". Preserve punctuation, emoji and line breaks exactly. \
         Return only the translated text, with no quotes, notes or commentary.\n\n{text}"
    )
}

/// Translate `text` into `target`. Generator failures propagate unchanged.
pub async fn translate(
    generator: &dyn Generator,
    text: &str,
    target: &str,
) -> Result<String, TranslateError> {
    let prompt = build_prompt(text, target);
    let output = generator.generate(&prompt).await?;
    let output = output.trim();
    if output.is_empty() {
        return Err(TranslateError::EmptyResponse);
    }
    debug!("Translated {} chars into {}", text.chars().count(), target);
    Ok(output.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Canned {
        output: anyhow::Result<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl Canned {
        fn ok(s: &str) -> Self {
            Self {
                output: Ok(s.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Generator for Canned {
        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.output {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(anyhow::anyhow!("{}", e)),
            }
        }
    }

    #[test]
    fn test_prompt_contents() {
        let prompt = build_prompt("Merhaba dünya 👋\nikinci satır", "en");
        assert!(prompt.contains("\"en\""));
        assert!(prompt.contains("Detect the language"));
        assert!(prompt.contains("line breaks"));
        assert!(prompt.contains("emoji"));
        assert!(prompt.contains("Return only the translated text"));
        assert!(prompt.ends_with("Merhaba dünya 👋\nikinci satır"));
    }

    #[tokio::test]
    async fn test_translate_trims_output() {
        let generator = Canned::ok("  Hello world\n");
        let out = translate(&generator, "Merhaba dünya", "en").await.unwrap();
        assert_eq!(out, "Hello world");
        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Merhaba dünya"));
    }

    #[tokio::test]
    async fn test_empty_output_is_error() {
        let generator = Canned::ok("   ");
        let err = translate(&generator, "hi", "tr").await.unwrap_err();
        assert!(matches!(err, TranslateError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_service_error_propagates_unchanged() {
        let generator = Canned {
            output: Err(anyhow::anyhow!("openrouter API error (429): rate limited")),
            prompts: Mutex::new(Vec::new()),
        };
        let err = translate(&generator, "hi", "tr").await.unwrap_err();
        assert!(matches!(err, TranslateError::Service(_)));
        assert_eq!(err.to_string(), "openrouter API error (429): rate limited");
    }
}
