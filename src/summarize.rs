//! Summarisation collaborator: meeting material → [`Report`] via an LLM.
//!
//! This sits upstream of the export core. It builds one prompt from the
//! numbered material files and the transcript, makes a single chat call
//! under a timeout, and parses the reply with
//! [`crate::report::parse_report_response`]. A reply that does not parse is
//! an error here, so the exporters only ever see valid reports.
//!
//! One attempt per call; retries are left to the caller.

use crate::config::SummarizeConfig;
use crate::error::SummarizeError;
use crate::prompts;
use crate::report::{parse_report_response, Report};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default model when a provider is named without one.
const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// One uploaded meeting document, already converted to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material {
    pub name: String,
    pub content: String,
}

impl Material {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Everything the model is asked to summarise.
#[derive(Debug, Clone, Default)]
pub struct MeetingMaterials {
    pub materials: Vec<Material>,
    pub transcript: Option<String>,
}

impl MeetingMaterials {
    /// Read material files (named by their file name) and an optional transcript.
    pub async fn from_files(
        materials: &[PathBuf],
        transcript: Option<&Path>,
    ) -> Result<Self, SummarizeError> {
        let mut out = Self::default();
        for path in materials {
            let content = read_text(path).await?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            out.materials.push(Material { name, content });
        }
        if let Some(path) = transcript {
            out.transcript = Some(read_text(path).await?);
        }
        Ok(out)
    }

    pub fn is_empty(&self) -> bool {
        self.materials.iter().all(|m| m.content.trim().is_empty())
            && self
                .transcript
                .as_deref()
                .is_none_or(|t| t.trim().is_empty())
    }
}

async fn read_text(path: &Path) -> Result<String, SummarizeError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SummarizeError::ReadInput {
            path: path.to_path_buf(),
            source,
        })
}

/// Summarise meeting material into a structured report.
///
/// # Errors
/// [`SummarizeError::NoInput`] when there is nothing to summarise, a
/// provider/API/timeout error from the LLM call, or a parse error when the
/// reply is not a report.
pub async fn summarize(
    input: &MeetingMaterials,
    config: &SummarizeConfig,
) -> Result<Report, SummarizeError> {
    if input.is_empty() {
        return Err(SummarizeError::NoInput);
    }

    let start = Instant::now();
    info!(
        "Summarising {} material file(s){}",
        input.materials.len(),
        if input.transcript.is_some() {
            " and a transcript"
        } else {
            ""
        }
    );

    let provider = resolve_provider(config)?;
    let date = report_date();
    let messages = build_messages(input, config, &date);
    let options = CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    };

    let response = tokio::time::timeout(
        Duration::from_secs(config.timeout_secs),
        provider.chat(&messages, Some(&options)),
    )
    .await
    .map_err(|_| SummarizeError::Timeout {
        secs: config.timeout_secs,
    })?
    .map_err(|e| SummarizeError::LlmApiError {
        message: e.to_string(),
    })?;

    debug!(
        "Summary reply: {} input tokens, {} output tokens, {:?}",
        response.prompt_tokens,
        response.completion_tokens,
        start.elapsed()
    );

    let report = parse_report_response(&response.content)?;
    info!(
        "Report '{}': {} topics, {} follow-ups",
        report.title,
        report.topics.len(),
        report.follow_ups.len()
    );
    Ok(report)
}

/// Today's date as written into new reports.
pub fn report_date() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

fn build_messages(input: &MeetingMaterials, config: &SummarizeConfig, date: &str) -> Vec<ChatMessage> {
    let context = prompts::meeting_context(&input.materials, input.transcript.as_deref());
    vec![
        ChatMessage::system(prompts::system_prompt(config.system_prompt.as_deref(), date)),
        ChatMessage::user(prompts::user_prompt(&context)),
    ]
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model` or a
///    default model; the factory reads the matching API key.
/// 3. **Environment pair** `MEETINGMIND_LLM_PROVIDER` + `MEETINGMIND_MODEL`,
///    when both are set.
/// 4. **Auto-detection** via `ProviderFactory::from_env`.
fn resolve_provider(config: &SummarizeConfig) -> Result<Arc<dyn LLMProvider>, SummarizeError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("MEETINGMIND_LLM_PROVIDER"),
        std::env::var("MEETINGMIND_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| SummarizeError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;
    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, SummarizeError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        SummarizeError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_input_is_rejected_before_any_call() {
        let input = MeetingMaterials {
            materials: vec![Material::new("blank.txt", "   ")],
            transcript: Some("\n".into()),
        };
        let err = summarize(&input, &SummarizeConfig::default()).await.unwrap_err();
        assert!(matches!(err, SummarizeError::NoInput));
    }

    #[tokio::test]
    async fn files_are_read_with_their_names() {
        let dir = tempfile::tempdir().unwrap();
        let agenda = dir.path().join("agenda.txt");
        let transcript = dir.path().join("call.txt");
        std::fs::write(&agenda, "Budget").unwrap();
        std::fs::write(&transcript, "Kim: hello").unwrap();

        let input = MeetingMaterials::from_files(&[agenda], Some(&transcript))
            .await
            .unwrap();
        assert_eq!(input.materials, vec![Material::new("agenda.txt", "Budget")]);
        assert_eq!(input.transcript.as_deref(), Some("Kim: hello"));
        assert!(!input.is_empty());
    }

    #[tokio::test]
    async fn missing_file_names_the_path() {
        let err = MeetingMaterials::from_files(&[PathBuf::from("/no/such/file.txt")], None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/no/such/file.txt"));
    }

    #[test]
    fn messages_are_system_then_user() {
        let input = MeetingMaterials {
            materials: vec![Material::new("a.txt", "alpha")],
            transcript: None,
        };
        let messages = build_messages(&input, &SummarizeConfig::default(), "2024-12-16");
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn report_date_is_iso() {
        let d = report_date();
        assert!(chrono::NaiveDate::parse_from_str(&d, "%Y-%m-%d").is_ok());
    }
}
