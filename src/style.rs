//! Shared style sheet for block rendering.
//!
//! Every block of one export is rendered against the same [`StyleSheet`],
//! so changing a colour or a font size here changes the whole document
//! consistently. The sheet is plain serde data: the CLI can load a JSON
//! override with `--style`.
//!
//! Text is measured with the fonts the rasteriser draws with, resolved from
//! [`StyleSheet::font_family`]; see [`crate::pipeline::metrics`].

use crate::report::Tier;
use serde::{Deserialize, Serialize};

/// Visual parameters shared by every rendered block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleSheet {
    /// CSS-style font family list passed to the SVG renderer.
    pub font_family: String,
    /// Multiplier applied to font size to get a line box height.
    pub line_height: f32,

    pub title_size: f32,
    pub heading_size: f32,
    pub subheading_size: f32,
    pub body_size: f32,
    pub meta_size: f32,
    pub badge_size: f32,
    pub footer_size: f32,

    /// Outer padding around every block.
    pub wrapper_padding: f32,
    /// Inner padding of section panels.
    pub panel_padding: f32,
    /// Inner padding of per-item cards (topic, decision, risk, follow-up).
    pub card_padding: f32,
    pub corner_radius: f32,
    /// Left indent of bulleted list text.
    pub list_indent: f32,
    /// Vertical space between list items.
    pub list_item_gap: f32,

    pub accent: String,
    pub accent_light: String,
    pub text: String,
    pub body_text: String,
    pub muted_text: String,
    pub faint_text: String,
    pub rule: String,

    pub panel_fill: String,
    pub topic_fill: String,
    pub follow_up_fill: String,
    pub decision_fill: String,
    pub decision_accent: String,
    pub risk_fill: String,
    pub risk_accent: String,
    pub insight_fill: String,
    pub next_steps_fill: String,
    pub purpose_accent: String,

    pub high: TierPalette,
    pub medium: TierPalette,
    pub low: TierPalette,

    pub labels: Labels,
}

/// Badge colours for one severity/priority tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierPalette {
    pub fill: String,
    pub text: String,
}

/// Human-readable captions used by both the PDF and DOCX exporters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub report_kind: String,
    pub purpose: String,
    pub summary: String,
    pub insights: String,
    pub topics: String,
    pub decisions: String,
    pub risks: String,
    pub follow_ups: String,
    pub next_steps: String,
    pub date: String,
    pub participants: String,
    pub rationale: String,
    pub impact: String,
    pub mitigation: String,
    pub owner: String,
    pub assignee: String,
    pub deadline: String,
    pub priority: String,
    pub high: String,
    pub medium: String,
    pub low: String,
    pub footer: String,
}

impl Default for StyleSheet {
    fn default() -> Self {
        Self {
            font_family: "'Noto Sans KR', 'Noto Sans', 'DejaVu Sans', sans-serif".to_string(),
            line_height: 1.5,
            title_size: 22.0,
            heading_size: 14.0,
            subheading_size: 12.0,
            body_size: 11.0,
            meta_size: 10.0,
            badge_size: 9.0,
            footer_size: 8.0,
            wrapper_padding: 16.0,
            panel_padding: 12.0,
            card_padding: 10.0,
            corner_radius: 6.0,
            list_indent: 16.0,
            list_item_gap: 3.0,
            accent: "#C9A227".to_string(),
            accent_light: "#E5D188".to_string(),
            text: "#1a1a1a".to_string(),
            body_text: "#333333".to_string(),
            muted_text: "#666666".to_string(),
            faint_text: "#888888".to_string(),
            rule: "#eeeeee".to_string(),
            panel_fill: "#f8f8f8".to_string(),
            topic_fill: "#f0f0f0".to_string(),
            follow_up_fill: "#fafafa".to_string(),
            decision_fill: "#e8f4fd".to_string(),
            decision_accent: "#3b82f6".to_string(),
            risk_fill: "#fef2f2".to_string(),
            risk_accent: "#ef4444".to_string(),
            insight_fill: "#fffbeb".to_string(),
            next_steps_fill: "#f0fdf4".to_string(),
            purpose_accent: "#3b82f6".to_string(),
            high: TierPalette {
                fill: "#fee2e2".to_string(),
                text: "#dc2626".to_string(),
            },
            medium: TierPalette {
                fill: "#fef3c7".to_string(),
                text: "#d97706".to_string(),
            },
            low: TierPalette {
                fill: "#e5e7eb".to_string(),
                text: "#6b7280".to_string(),
            },
            labels: Labels::default(),
        }
    }
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            report_kind: "EXECUTIVE REPORT".to_string(),
            purpose: "Meeting Purpose".to_string(),
            summary: "Summary".to_string(),
            insights: "Key Insights".to_string(),
            topics: "Key Discussion Topics".to_string(),
            decisions: "Key Decisions".to_string(),
            risks: "Risks & Concerns".to_string(),
            follow_ups: "Follow-up Actions".to_string(),
            next_steps: "Next Steps".to_string(),
            date: "Date".to_string(),
            participants: "Participants".to_string(),
            rationale: "Rationale".to_string(),
            impact: "Expected impact".to_string(),
            mitigation: "Mitigation".to_string(),
            owner: "Owner".to_string(),
            assignee: "Assignee".to_string(),
            deadline: "Due".to_string(),
            priority: "Priority".to_string(),
            high: "High".to_string(),
            medium: "Medium".to_string(),
            low: "Low".to_string(),
            footer: "Generated by MeetingMind | AI meeting minutes".to_string(),
        }
    }
}

impl StyleSheet {
    /// Height of one line of text at `font_size`.
    pub fn line_box(&self, font_size: f32) -> f32 {
        font_size * self.line_height
    }

    /// Badge palette for a tier.
    pub fn tier(&self, tier: Tier) -> &TierPalette {
        match tier {
            Tier::High => &self.high,
            Tier::Medium => &self.medium,
            Tier::Low => &self.low,
        }
    }
}

impl Labels {
    /// Display caption for a tier.
    pub fn tier(&self, tier: Tier) -> &str {
        match tier {
            Tier::High => &self.high,
            Tier::Medium => &self.medium,
            Tier::Low => &self.low,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_palettes_are_distinct() {
        let style = StyleSheet::default();
        assert_ne!(style.tier(Tier::High), style.tier(Tier::Medium));
        assert_ne!(style.tier(Tier::Medium), style.tier(Tier::Low));
        assert_ne!(style.tier(Tier::High), style.tier(Tier::Low));
    }

    #[test]
    fn style_sheet_loads_partial_json() {
        let style: StyleSheet = serde_json::from_str(r##"{"accent":"#000000"}"##).unwrap();
        assert_eq!(style.accent, "#000000");
        assert_eq!(style.body_size, StyleSheet::default().body_size);
    }
}
