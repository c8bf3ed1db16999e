//! The structured meeting report and its JSON boundary.
//!
//! A [`Report`] is what the summarisation collaborator hands back and what
//! every exporter consumes. The core never validates it beyond serde's shape
//! checks: lists the model forgot to emit (`topics`, `followUps`,
//! `participants`) default to empty, and optional sections that are absent
//! or empty are simply omitted from the output.
//!
//! ## Why a custom tier parser?
//!
//! Risk severity and follow-up priority are a closed three-level scale, but
//! models answer in whatever casing (and language) the prompt suggested.
//! [`Tier`] accepts `high`/`High`/`HIGH` as well as the Korean `상/중/하`
//! that Korean-language prompts produce, and rejects anything else so a garbled
//! value surfaces as a parse error instead of an unstyled badge.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A structured meeting report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub title: String,
    pub date: String,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_purpose: Option<Vec<String>>,
    pub summary: String,
    #[serde(default)]
    pub topics: Vec<Topic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decisions: Option<Vec<Decision>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risks: Option<Vec<Risk>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_insights: Option<Vec<String>>,
    #[serde(default)]
    pub follow_ups: Vec<FollowUp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<String>,
}

/// One discussion topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_items: Option<Vec<String>>,
}

/// A decision taken during the meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub decision: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub impact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
}

/// A risk or concern raised during the meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Risk {
    pub risk: String,
    pub severity: Tier,
    #[serde(default)]
    pub mitigation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// A follow-up action item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUp {
    pub task: String,
    #[serde(default)]
    pub assignee: String,
    #[serde(default)]
    pub deadline: String,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_tier",
        skip_serializing_if = "Option::is_none"
    )]
    pub priority: Option<Tier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Report {
    /// Meeting purposes, if the section should be emitted.
    pub fn purposes(&self) -> Option<&[String]> {
        non_empty(self.meeting_purpose.as_deref())
    }

    /// Key insights, if the section should be emitted.
    pub fn insights(&self) -> Option<&[String]> {
        non_empty(self.key_insights.as_deref())
    }

    /// Decisions, if the section should be emitted.
    pub fn decision_items(&self) -> Option<&[Decision]> {
        non_empty(self.decisions.as_deref())
    }

    /// Risks, if the section should be emitted.
    pub fn risk_items(&self) -> Option<&[Risk]> {
        non_empty(self.risks.as_deref())
    }

    /// Next steps, if the section should be emitted (blank text counts as absent).
    pub fn next_steps_text(&self) -> Option<&str> {
        self.next_steps
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn non_empty<T>(items: Option<&[T]>) -> Option<&[T]> {
    items.filter(|v| !v.is_empty())
}

// ── Tier ──────────────────────────────────────────────────────────────────

/// Three-level ranking shared by risk severity and follow-up priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    High,
    Medium,
    Low,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::High => "high",
            Tier::Medium => "medium",
            Tier::Low => "low",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" | "상" => Ok(Tier::High),
            "medium" | "med" | "중" => Ok(Tier::Medium),
            "low" | "하" => Ok(Tier::Low),
            other => Err(format!(
                "unknown tier '{other}' (expected high, medium or low)"
            )),
        }
    }
}

impl Serialize for Tier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Tier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// `null`, a missing field and `""` all mean "no priority".
fn deserialize_optional_tier<'de, D>(deserializer: D) -> Result<Option<Tier>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

// ── Response parsing ──────────────────────────────────────────────────────

/// The model's reply could not be turned into a [`Report`].
#[derive(Debug, Error)]
pub enum ReportParseError {
    #[error("Model response is empty")]
    Empty,

    #[error("Model response is not a valid report: {source}\nFirst characters: {preview:?}")]
    Invalid {
        preview: String,
        #[source]
        source: serde_json::Error,
    },
}

static RE_FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```(?:json)?\s*(.*?)```").unwrap());

/// Extract and parse a [`Report`] from a free-form model response.
///
/// The first fenced block (```` ```json ```` or bare ```` ``` ````) wins;
/// if its body does not parse, the whole response is tried as raw JSON.
pub fn parse_report_response(content: &str) -> Result<Report, ReportParseError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ReportParseError::Empty);
    }

    if let Some(caps) = RE_FENCED_JSON.captures(trimmed) {
        if let Ok(report) = serde_json::from_str::<Report>(caps[1].trim()) {
            return Ok(report);
        }
    }

    serde_json::from_str::<Report>(trimmed).map_err(|source| ReportParseError::Invalid {
        preview: trimmed.chars().take(80).collect(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{"title":"Q4 review","date":"2024-12-16","summary":"Done."}"#;

    #[test]
    fn missing_required_lists_default_to_empty() {
        let r: Report = serde_json::from_str(MINIMAL).unwrap();
        assert!(r.topics.is_empty());
        assert!(r.follow_ups.is_empty());
        assert!(r.participants.is_empty());
        assert!(r.decisions.is_none());
    }

    #[test]
    fn empty_optional_lists_count_as_absent() {
        let r: Report = serde_json::from_str(
            r#"{"title":"t","date":"d","summary":"s","risks":[],"keyInsights":[],"nextSteps":"  "}"#,
        )
        .unwrap();
        assert!(r.risk_items().is_none());
        assert!(r.insights().is_none());
        assert!(r.next_steps_text().is_none());
    }

    #[test]
    fn tiers_accept_case_and_korean_aliases() {
        assert_eq!("HIGH".parse::<Tier>(), Ok(Tier::High));
        assert_eq!("중".parse::<Tier>(), Ok(Tier::Medium));
        assert_eq!(" low ".parse::<Tier>(), Ok(Tier::Low));
        assert!("critical".parse::<Tier>().is_err());
    }

    #[test]
    fn blank_priority_is_none() {
        let f: FollowUp = serde_json::from_str(
            r#"{"task":"Ship","assignee":"Kim","deadline":"TBD","priority":""}"#,
        )
        .unwrap();
        assert_eq!(f.priority, None);

        let f: FollowUp = serde_json::from_str(
            r#"{"task":"Ship","assignee":"Kim","deadline":"TBD","priority":"상"}"#,
        )
        .unwrap();
        assert_eq!(f.priority, Some(Tier::High));
    }

    #[test]
    fn camel_case_round_trips_field_names() {
        let r: Report = serde_json::from_str(
            r#"{"title":"t","date":"d","summary":"s","followUps":[{"task":"a","assignee":"b","deadline":"c"}],"nextSteps":"go"}"#,
        )
        .unwrap();
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"followUps\""));
        assert!(json.contains("\"nextSteps\":\"go\""));
        assert!(!json.contains("meetingPurpose"));
    }

    #[test]
    fn parse_unwraps_fenced_json() {
        let reply = format!("Here is your report:\n```json\n{MINIMAL}\n```\nThanks!");
        let r = parse_report_response(&reply).unwrap();
        assert_eq!(r.title, "Q4 review");
    }

    #[test]
    fn parse_accepts_bare_fence_and_raw_json() {
        let bare = format!("```\n{MINIMAL}\n```");
        assert!(parse_report_response(&bare).is_ok());
        assert!(parse_report_response(MINIMAL).is_ok());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(parse_report_response("   "), Err(ReportParseError::Empty)));
        let err = parse_report_response("I could not summarise this meeting.").unwrap_err();
        assert!(err.to_string().contains("not a valid report"));
    }
}
