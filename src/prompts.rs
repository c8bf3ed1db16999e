//! Prompts for the summarisation collaborator.
//!
//! Every prompt lives here so unit tests can inspect them without calling a
//! model. Callers can override the system prompt via
//! [`crate::config::SummarizeConfig::system_prompt`]; the `{date}`
//! placeholder is substituted in overrides too.

use crate::summarize::Material;

/// Placeholder replaced with the report date.
pub const DATE_PLACEHOLDER: &str = "{date}";

/// Default system prompt asking for a report as JSON.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a professional minutes writer for a company's CEO and executive team.
Analyse the meeting material and transcript you are given and write a concise executive report that focuses on what matters.

Prefer short bullet points over long prose.

Reply ONLY with JSON of the following shape:
{
  "title": "Specific meeting title reflecting the main subject",
  "date": "{date}",
  "participants": ["Participant 1", "Participant 2"],
  "meetingPurpose": ["Purpose 1 (one sentence)", "Purpose 2"],
  "summary": "Overall summary, 2-3 sentences focused on conclusions",
  "topics": [
    {
      "title": "Discussion topic (a concrete category name)",
      "content": "One-line overview of the topic (optional)",
      "subItems": ["Key item: concrete detail, schedule or figure (1-2 sentences)"]
    }
  ],
  "decisions": [
    {
      "decision": "What was decided",
      "rationale": "Why",
      "impact": "Expected effect",
      "deadline": "Execution deadline, if any"
    }
  ],
  "risks": [
    {
      "risk": "Concrete risk",
      "severity": "high | medium | low",
      "mitigation": "Mitigation including concrete actions",
      "owner": "Owner, if any"
    }
  ],
  "keyInsights": ["Key insight with concrete content"],
  "followUps": [
    {
      "task": "Concrete follow-up action",
      "assignee": "Assignee",
      "deadline": "Deadline",
      "priority": "high | medium | low",
      "details": "Extra details, if any"
    }
  ],
  "nextSteps": "Next steps and upcoming schedule, 2-3 sentences"
}

Writing rules:
1. Keep proper nouns, abbreviations, product names and technical terms exactly as written in the source.
2. Never replace a source word with a similar-looking one.
3. Never include transcript timestamps.
4. Write bullet points as "Item: key content" instead of long sentences.
5. Keep topic content short and put details into subItems.
6. Include every concrete figure: amounts, quantities, dates, ratios.
7. Group the discussion into 5-8 topics by category.
8. If participants are not named, use ["Meeting participants"].
9. If an assignee or deadline is not stated, write "TBD".
10. If there are no risks or decisions, use an empty array []."#;

/// Build the system prompt, substituting the report date.
pub fn system_prompt(template: Option<&str>, date: &str) -> String {
    template
        .unwrap_or(DEFAULT_SYSTEM_PROMPT)
        .replace(DATE_PLACEHOLDER, date)
}

/// Numbered material sections followed by the transcript.
pub fn meeting_context(materials: &[Material], transcript: Option<&str>) -> String {
    let mut context = String::new();

    if !materials.is_empty() {
        context.push_str("## Meeting material\n\n");
        for (i, material) in materials.iter().enumerate() {
            context.push_str(&format!(
                "### Material {}: {}\n{}\n\n",
                i + 1,
                material.name,
                material.content
            ));
        }
    }

    if let Some(transcript) = transcript.filter(|t| !t.trim().is_empty()) {
        context.push_str("## Meeting transcript\n\n");
        context.push_str(transcript);
        context.push_str("\n\n");
    }

    context
}

/// The user turn: instructions plus the meeting context.
pub fn user_prompt(context: &str) -> String {
    format!(
        "Analyse the following meeting and write a concise report for the CEO and executives.\n\n\
         Important:\n\
         - Leave out timestamps.\n\
         - Keep abbreviations, product names and technical terms exactly as written.\n\
         - Do not alter words from the source.\n\n\
         {}",
        context
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_is_substituted() {
        let p = system_prompt(None, "2024-12-16");
        assert!(p.contains(r#""date": "2024-12-16""#));
        assert!(!p.contains(DATE_PLACEHOLDER));

        let custom = system_prompt(Some("Report for {date}."), "today");
        assert_eq!(custom, "Report for today.");
    }

    #[test]
    fn context_numbers_materials_and_appends_transcript() {
        let materials = vec![
            Material::new("agenda.txt", "1. Budget"),
            Material::new("kpi.csv", "q,rev"),
        ];
        let ctx = meeting_context(&materials, Some("Kim: let's start"));
        assert!(ctx.contains("### Material 1: agenda.txt\n1. Budget"));
        assert!(ctx.contains("### Material 2: kpi.csv"));
        let transcript_at = ctx.find("## Meeting transcript").unwrap();
        assert!(transcript_at > ctx.find("kpi.csv").unwrap());
    }

    #[test]
    fn blank_transcript_is_left_out() {
        assert_eq!(meeting_context(&[], Some("  \n")), "");
    }
}
