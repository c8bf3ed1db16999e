//! Flow-document (DOCX) export.
//!
//! Word processors paginate on their own, so this exporter skips staging,
//! rasterisation and composition entirely. It walks the same flattened
//! section list as the PDF exporter and maps each section to styled
//! paragraphs, which keeps the two artifacts in the same order with the
//! same captions.

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::export::{artifact_file_name, export_date, write_artifact};
use crate::output::FlowOutput;
use crate::pipeline::flatten::{flatten, Section};
use crate::pipeline::markup::topic_ordinal;
use crate::report::{Report, Tier};
use crate::style::StyleSheet;
use docx_rs::{AlignmentType, Docx, LineSpacing, Paragraph, Run};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Role of one line of flow text; decides its paragraph style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRole {
    Kicker,
    Title,
    Meta,
    Heading,
    Subheading,
    Body,
    Bullet,
    SubBullet,
    /// Bold caption followed by a value.
    Field,
    /// A severity/priority badge rendered as coloured text.
    Badge(Tier),
    Footer,
}

/// One paragraph of the flow document before styling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowLine {
    pub role: LineRole,
    pub text: String,
    /// Caption for [`LineRole::Field`] lines.
    pub label: Option<String>,
}

impl FlowLine {
    fn new(role: LineRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            label: None,
        }
    }

    fn field(label: &str, value: impl Into<String>) -> Self {
        Self {
            role: LineRole::Field,
            text: value.into(),
            label: Some(label.to_string()),
        }
    }
}

/// Export a report as a DOCX document.
pub fn export_docx(report: &Report, config: &ExportConfig) -> Result<FlowOutput, ExportError> {
    let sections = flatten(report);
    info!(
        "Starting DOCX export of '{}': {} sections",
        report.title,
        sections.len()
    );

    let style = &config.style;
    let mut docx = Docx::new();
    let mut paragraphs = 0usize;
    for section in &sections {
        for line in section_lines(section, style) {
            docx = docx.add_paragraph(paragraph(&line, style));
            paragraphs += 1;
        }
    }
    debug!("DOCX body has {} paragraphs", paragraphs);

    let mut buf = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buf)
        .map_err(|e| ExportError::SerializationFailed(format!("DOCX packaging failed: {e}")))?;

    Ok(FlowOutput {
        bytes: buf.into_inner(),
        file_name: artifact_file_name(&config.file_label, export_date(config), "docx"),
        sections: sections.len(),
    })
}

/// Export a report as DOCX and write it to `output_path`.
///
/// Same path rules as [`crate::export_pdf_to_file`].
pub async fn export_docx_to_file(
    report: &Report,
    output_path: impl AsRef<Path>,
    config: &ExportConfig,
) -> Result<(PathBuf, FlowOutput), ExportError> {
    let output = export_docx(report, config)?;
    let path = write_artifact(output_path.as_ref(), &output.file_name, &output.bytes).await?;
    Ok((path, output))
}

/// The flow lines of one section, in reading order.
pub fn section_lines(section: &Section, style: &StyleSheet) -> Vec<FlowLine> {
    let labels = &style.labels;
    let mut lines = Vec::new();

    match section {
        Section::Header {
            title,
            date,
            participants,
        } => {
            lines.push(FlowLine::new(LineRole::Kicker, &labels.report_kind));
            lines.push(FlowLine::new(LineRole::Title, title));
            lines.push(FlowLine::field(&labels.date, date));
            lines.push(FlowLine::field(&labels.participants, participants.join(", ")));
        }
        Section::Purpose { items } => {
            lines.push(FlowLine::new(LineRole::Heading, &labels.purpose));
            lines.extend(items.iter().map(|i| FlowLine::new(LineRole::Bullet, i)));
        }
        Section::Summary { text } => {
            lines.push(FlowLine::new(LineRole::Heading, &labels.summary));
            lines.push(FlowLine::new(LineRole::Body, text));
        }
        Section::Insights { items } => {
            lines.push(FlowLine::new(LineRole::Heading, &labels.insights));
            lines.extend(items.iter().map(|i| FlowLine::new(LineRole::Bullet, i)));
        }
        Section::TopicsHeader => lines.push(FlowLine::new(LineRole::Heading, &labels.topics)),
        Section::Topic { ordinal, topic } => {
            lines.push(FlowLine::new(
                LineRole::Subheading,
                format!("{}  {}", topic_ordinal(*ordinal), topic.title),
            ));
            if !topic.content.trim().is_empty() {
                lines.push(FlowLine::new(LineRole::Body, &topic.content));
            }
            if let Some(subs) = &topic.sub_items {
                lines.extend(subs.iter().map(|s| FlowLine::new(LineRole::SubBullet, s)));
            }
        }
        Section::DecisionsHeader => {
            lines.push(FlowLine::new(LineRole::Heading, &labels.decisions))
        }
        Section::Decision { decision } => {
            lines.push(FlowLine::new(LineRole::Subheading, &decision.decision));
            lines.push(FlowLine::field(&labels.rationale, &decision.rationale));
            lines.push(FlowLine::field(&labels.impact, &decision.impact));
            if let Some(deadline) = decision.deadline.as_deref().filter(|d| !d.trim().is_empty()) {
                lines.push(FlowLine::field(&labels.deadline, deadline));
            }
        }
        Section::RisksHeader => lines.push(FlowLine::new(LineRole::Heading, &labels.risks)),
        Section::Risk { risk } => {
            lines.push(FlowLine::new(LineRole::Subheading, &risk.risk));
            lines.push(FlowLine::new(
                LineRole::Badge(risk.severity),
                labels.tier(risk.severity),
            ));
            lines.push(FlowLine::field(&labels.mitigation, &risk.mitigation));
            if let Some(owner) = risk.owner.as_deref().filter(|o| !o.trim().is_empty()) {
                lines.push(FlowLine::field(&labels.owner, owner));
            }
        }
        Section::FollowUpsHeader => {
            lines.push(FlowLine::new(LineRole::Heading, &labels.follow_ups))
        }
        Section::FollowUp { ordinal, item } => {
            lines.push(FlowLine::new(
                LineRole::Subheading,
                format!("{}. {}", ordinal, item.task),
            ));
            if let Some(priority) = item.priority {
                lines.push(FlowLine::new(LineRole::Badge(priority), labels.tier(priority)));
            }
            lines.push(FlowLine::new(
                LineRole::Meta,
                format!(
                    "{}: {}   |   {}: {}",
                    labels.assignee, item.assignee, labels.deadline, item.deadline
                ),
            ));
            if let Some(details) = item.details.as_deref().filter(|d| !d.trim().is_empty()) {
                lines.push(FlowLine::new(LineRole::Body, details));
            }
        }
        Section::NextSteps { text } => {
            lines.push(FlowLine::new(LineRole::Heading, &labels.next_steps));
            lines.push(FlowLine::new(LineRole::Body, text));
        }
        Section::Footer => lines.push(FlowLine::new(LineRole::Footer, &labels.footer)),
    }

    lines
}

/// Points to the half-point sizes DOCX runs use.
fn half_points(size: f32) -> usize {
    (size * 2.0).round() as usize
}

/// `#C9A227` → `C9A227`
fn hex(color: &str) -> &str {
    color.trim_start_matches('#')
}

fn paragraph(line: &FlowLine, style: &StyleSheet) -> Paragraph {
    let text = Run::new().add_text(&line.text);
    let spacing = |before: u32, after: u32| LineSpacing::new().before(before).after(after);

    match line.role {
        LineRole::Kicker => Paragraph::new().add_run(
            text.bold()
                .size(half_points(style.badge_size))
                .color(hex(&style.accent)),
        ),
        LineRole::Title => Paragraph::new()
            .add_run(text.bold().size(half_points(style.title_size)).color(hex(&style.text)))
            .line_spacing(spacing(60, 120)),
        LineRole::Meta => Paragraph::new()
            .add_run(text.size(half_points(style.meta_size)).color(hex(&style.muted_text))),
        LineRole::Heading => Paragraph::new()
            .add_run(text.bold().size(half_points(style.heading_size)).color(hex(&style.text)))
            .line_spacing(spacing(300, 100)),
        LineRole::Subheading => Paragraph::new()
            .add_run(
                text.bold()
                    .size(half_points(style.subheading_size))
                    .color(hex(&style.text)),
            )
            .line_spacing(spacing(160, 60)),
        LineRole::Body => Paragraph::new()
            .add_run(text.size(half_points(style.body_size)).color(hex(&style.body_text))),
        LineRole::Bullet | LineRole::SubBullet => {
            let indent = if line.role == LineRole::Bullet { 360 } else { 720 };
            Paragraph::new()
                .add_run(
                    Run::new()
                        .add_text(format!("• {}", line.text))
                        .size(half_points(style.body_size))
                        .color(hex(&style.body_text)),
                )
                .indent(Some(indent), None, None, None)
        }
        LineRole::Field => {
            let label = line.label.as_deref().unwrap_or_default();
            Paragraph::new()
                .add_run(
                    Run::new()
                        .add_text(format!("{label}: "))
                        .bold()
                        .size(half_points(style.body_size)),
                )
                .add_run(text.size(half_points(style.body_size)).color(hex(&style.body_text)))
        }
        LineRole::Badge(tier) => Paragraph::new().add_run(
            text.bold()
                .size(half_points(style.badge_size))
                .color(hex(&style.tier(tier).text)),
        ),
        LineRole::Footer => Paragraph::new()
            .add_run(text.size(half_points(style.footer_size)).color(hex(&style.faint_text)))
            .align(AlignmentType::Center)
            .line_spacing(spacing(400, 0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{FollowUp, Risk, Topic};
    use chrono::NaiveDate;

    fn report() -> Report {
        Report {
            title: "Launch review".into(),
            date: "2024-12-16".into(),
            participants: vec!["Kim".into(), "Lee".into()],
            meeting_purpose: None,
            summary: "Ready to ship.".into(),
            topics: vec![Topic {
                title: "Pricing".into(),
                content: "Hold at current tier.".into(),
                sub_items: Some(vec!["Review in Q2".into()]),
            }],
            decisions: None,
            risks: Some(vec![Risk {
                risk: "Late docs".into(),
                severity: Tier::Medium,
                mitigation: "Freeze scope".into(),
                owner: None,
            }]),
            key_insights: None,
            follow_ups: vec![FollowUp {
                task: "Publish notes".into(),
                assignee: "Kim".into(),
                deadline: "Friday".into(),
                priority: Some(Tier::High),
                details: None,
            }],
            next_steps: None,
        }
    }

    #[test]
    fn docx_is_a_zip_named_by_date() {
        let config = ExportConfig::builder()
            .export_date(NaiveDate::from_ymd_opt(2024, 12, 16).unwrap())
            .build()
            .unwrap();
        let out = export_docx(&report(), &config).unwrap();
        assert!(out.bytes.starts_with(b"PK"));
        assert_eq!(out.file_name, "meeting-report-2024-12-16.docx");
        assert_eq!(out.sections, flatten(&report()).len());
    }

    #[test]
    fn topic_lines_use_padded_ordinal_and_nested_bullets() {
        let sections = flatten(&report());
        let topic = sections
            .iter()
            .find(|s| matches!(s, Section::Topic { .. }))
            .unwrap();
        let lines = section_lines(topic, &StyleSheet::default());
        assert_eq!(lines[0].text, "01  Pricing");
        assert_eq!(lines.last().unwrap().role, LineRole::SubBullet);
    }

    #[test]
    fn tiers_become_coloured_badges() {
        let style = StyleSheet::default();
        let sections = flatten(&report());
        let lines: Vec<FlowLine> = sections
            .iter()
            .flat_map(|s| section_lines(s, &style))
            .collect();
        assert!(lines
            .iter()
            .any(|l| l.role == LineRole::Badge(Tier::Medium) && l.text == "Medium"));
        assert!(lines
            .iter()
            .any(|l| l.role == LineRole::Badge(Tier::High) && l.text == "High"));
        assert!(lines.iter().any(|l| l.text == "1. Publish notes"));
        assert!(lines.iter().any(|l| l.text == "Kim, Lee"));
    }
}
