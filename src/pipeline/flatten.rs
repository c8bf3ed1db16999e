//! Report flattening: a [`Report`] becomes the ordered list of [`Section`]s
//! that are rendered and composed one at a time.
//!
//! ## Fixed order
//!
//! ```text
//! header → purpose? → summary → insights? → topics-header → topic×N
//!        → (decisions-header → decision×D)? → (risks-header → risk×R)?
//!        → follow-ups-header → follow-up×M → next-steps? → footer
//! ```
//!
//! The compositor assumes sections arrive in this order and never revisits
//! an earlier page, so the order is part of the output contract.
//!
//! ## Why one section per item?
//!
//! A page break may fall between two topics but must never cut through one.
//! Emitting each topic, decision, risk and follow-up as its own section makes
//! the item the smallest unit the compositor can move to the next page.
//!
//! Sections own clones of their payload; nothing points back into the
//! report, so flattening is a pure, repeatable function.

use crate::report::{Decision, FollowUp, Report, Risk, Topic};
use serde::Serialize;
use std::fmt;

/// Discriminant of a [`Section`], used in logs, errors and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Header,
    Purpose,
    Summary,
    Insights,
    TopicsHeader,
    Topic,
    DecisionsHeader,
    Decision,
    RisksHeader,
    Risk,
    FollowUpsHeader,
    FollowUp,
    NextSteps,
    Footer,
}

impl SectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionKind::Header => "header",
            SectionKind::Purpose => "purpose",
            SectionKind::Summary => "summary",
            SectionKind::Insights => "insights",
            SectionKind::TopicsHeader => "topics_header",
            SectionKind::Topic => "topic",
            SectionKind::DecisionsHeader => "decisions_header",
            SectionKind::Decision => "decision",
            SectionKind::RisksHeader => "risks_header",
            SectionKind::Risk => "risk",
            SectionKind::FollowUpsHeader => "follow_ups_header",
            SectionKind::FollowUp => "follow_up",
            SectionKind::NextSteps => "next_steps",
            SectionKind::Footer => "footer",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One independently rendered unit of the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Section {
    Header {
        title: String,
        date: String,
        participants: Vec<String>,
    },
    Purpose {
        items: Vec<String>,
    },
    Summary {
        text: String,
    },
    Insights {
        items: Vec<String>,
    },
    TopicsHeader,
    Topic {
        /// 1-based position among the report's topics.
        ordinal: usize,
        topic: Topic,
    },
    DecisionsHeader,
    Decision {
        decision: Decision,
    },
    RisksHeader,
    Risk {
        risk: Risk,
    },
    FollowUpsHeader,
    FollowUp {
        /// 1-based position among the report's follow-ups.
        ordinal: usize,
        item: FollowUp,
    },
    NextSteps {
        text: String,
    },
    Footer,
}

impl Section {
    pub fn kind(&self) -> SectionKind {
        match self {
            Section::Header { .. } => SectionKind::Header,
            Section::Purpose { .. } => SectionKind::Purpose,
            Section::Summary { .. } => SectionKind::Summary,
            Section::Insights { .. } => SectionKind::Insights,
            Section::TopicsHeader => SectionKind::TopicsHeader,
            Section::Topic { .. } => SectionKind::Topic,
            Section::DecisionsHeader => SectionKind::DecisionsHeader,
            Section::Decision { .. } => SectionKind::Decision,
            Section::RisksHeader => SectionKind::RisksHeader,
            Section::Risk { .. } => SectionKind::Risk,
            Section::FollowUpsHeader => SectionKind::FollowUpsHeader,
            Section::FollowUp { .. } => SectionKind::FollowUp,
            Section::NextSteps { .. } => SectionKind::NextSteps,
            Section::Footer => SectionKind::Footer,
        }
    }
}

/// Flatten a report into its ordered section list.
pub fn flatten(report: &Report) -> Vec<Section> {
    let mut sections = Vec::with_capacity(expected_len(report));

    sections.push(Section::Header {
        title: report.title.clone(),
        date: report.date.clone(),
        participants: report.participants.clone(),
    });

    if let Some(items) = report.purposes() {
        sections.push(Section::Purpose {
            items: items.to_vec(),
        });
    }

    sections.push(Section::Summary {
        text: report.summary.clone(),
    });

    if let Some(items) = report.insights() {
        sections.push(Section::Insights {
            items: items.to_vec(),
        });
    }

    sections.push(Section::TopicsHeader);
    sections.extend(report.topics.iter().enumerate().map(|(i, topic)| Section::Topic {
        ordinal: i + 1,
        topic: topic.clone(),
    }));

    if let Some(decisions) = report.decision_items() {
        sections.push(Section::DecisionsHeader);
        sections.extend(decisions.iter().map(|d| Section::Decision {
            decision: d.clone(),
        }));
    }

    if let Some(risks) = report.risk_items() {
        sections.push(Section::RisksHeader);
        sections.extend(risks.iter().map(|r| Section::Risk { risk: r.clone() }));
    }

    sections.push(Section::FollowUpsHeader);
    sections.extend(
        report
            .follow_ups
            .iter()
            .enumerate()
            .map(|(i, item)| Section::FollowUp {
                ordinal: i + 1,
                item: item.clone(),
            }),
    );

    if let Some(text) = report.next_steps_text() {
        sections.push(Section::NextSteps {
            text: text.to_string(),
        });
    }

    sections.push(Section::Footer);
    sections
}

/// Number of sections [`flatten`] produces for `report`.
pub fn expected_len(report: &Report) -> usize {
    let flag = |present: bool| usize::from(present);
    let decisions = report.decision_items().map_or(0, |d| 1 + d.len());
    let risks = report.risk_items().map_or(0, |r| 1 + r.len());

    1 + flag(report.purposes().is_some())
        + 1
        + flag(report.insights().is_some())
        + 1
        + report.topics.len()
        + decisions
        + risks
        + 1
        + report.follow_ups.len()
        + flag(report.next_steps_text().is_some())
        + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Tier;

    fn topic(title: &str) -> Topic {
        Topic {
            title: title.into(),
            content: "content".into(),
            sub_items: None,
        }
    }

    fn follow_up(task: &str) -> FollowUp {
        FollowUp {
            task: task.into(),
            assignee: "Kim".into(),
            deadline: "2024-12-20".into(),
            priority: None,
            details: None,
        }
    }

    fn bare_report() -> Report {
        Report {
            title: "Weekly sync".into(),
            date: "2024-12-16".into(),
            participants: vec!["Kim".into(), "Lee".into()],
            meeting_purpose: None,
            summary: "All good.".into(),
            topics: vec![],
            decisions: None,
            risks: None,
            key_insights: None,
            follow_ups: vec![],
            next_steps: None,
        }
    }

    fn full_report() -> Report {
        Report {
            meeting_purpose: Some(vec!["Align".into()]),
            key_insights: Some(vec!["Growth".into(), "Churn".into()]),
            topics: vec![topic("A"), topic("B"), topic("C")],
            decisions: Some(vec![Decision {
                decision: "Hire".into(),
                rationale: "Load".into(),
                impact: "Speed".into(),
                deadline: None,
            }]),
            risks: Some(vec![
                Risk {
                    risk: "FX".into(),
                    severity: Tier::High,
                    mitigation: "Hedge".into(),
                    owner: None,
                },
                Risk {
                    risk: "Supply".into(),
                    severity: Tier::Low,
                    mitigation: "Diversify".into(),
                    owner: Some("Park".into()),
                },
            ]),
            follow_ups: vec![follow_up("x"), follow_up("y")],
            next_steps: Some("Reconvene in January.".into()),
            ..bare_report()
        }
    }

    fn kinds(sections: &[Section]) -> Vec<SectionKind> {
        sections.iter().map(Section::kind).collect()
    }

    #[test]
    fn one_topic_two_follow_ups_is_eight_blocks() {
        let report = Report {
            topics: vec![topic("Only")],
            follow_ups: vec![follow_up("a"), follow_up("b")],
            ..bare_report()
        };
        let sections = flatten(&report);
        assert_eq!(sections.len(), 8);
        assert_eq!(
            kinds(&sections),
            vec![
                SectionKind::Header,
                SectionKind::Summary,
                SectionKind::TopicsHeader,
                SectionKind::Topic,
                SectionKind::FollowUpsHeader,
                SectionKind::FollowUp,
                SectionKind::FollowUp,
                SectionKind::Footer,
            ]
        );
    }

    #[test]
    fn full_report_follows_fixed_order() {
        use SectionKind::*;
        let sections = flatten(&full_report());
        assert_eq!(
            kinds(&sections),
            vec![
                Header,
                Purpose,
                Summary,
                Insights,
                TopicsHeader,
                Topic,
                Topic,
                Topic,
                DecisionsHeader,
                Decision,
                RisksHeader,
                Risk,
                Risk,
                FollowUpsHeader,
                FollowUp,
                FollowUp,
                NextSteps,
                Footer,
            ]
        );
    }

    #[test]
    fn length_matches_formula_for_every_optional_combination() {
        let full = full_report();
        for mask in 0u8..32 {
            let mut report = full.clone();
            if mask & 1 == 0 {
                report.meeting_purpose = None;
            }
            if mask & 2 == 0 {
                report.key_insights = Some(vec![]);
            }
            if mask & 4 == 0 {
                report.decisions = None;
            }
            if mask & 8 == 0 {
                report.risks = Some(vec![]);
            }
            if mask & 16 == 0 {
                report.next_steps = None;
            }

            let n = report.topics.len();
            let m = report.follow_ups.len();
            let d = report.decisions.as_ref().map_or(0, Vec::len);
            let r = report.risks.as_ref().map_or(0, Vec::len);
            let formula = 1
                + usize::from(mask & 1 != 0)
                + 1
                + usize::from(mask & 2 != 0)
                + 1
                + n
                + usize::from(d > 0)
                + d
                + usize::from(r > 0)
                + r
                + 1
                + m
                + usize::from(mask & 16 != 0)
                + 1;

            let sections = flatten(&report);
            assert_eq!(sections.len(), formula, "mask {mask:05b}");
            assert_eq!(expected_len(&report), formula, "mask {mask:05b}");
        }
    }

    #[test]
    fn flattening_is_idempotent() {
        let report = full_report();
        assert_eq!(flatten(&report), flatten(&report));
    }

    #[test]
    fn empty_or_absent_risks_emit_nothing() {
        for risks in [None, Some(vec![])] {
            let report = Report {
                risks,
                ..full_report()
            };
            let sections = flatten(&report);
            assert!(sections
                .iter()
                .all(|s| !matches!(s.kind(), SectionKind::RisksHeader | SectionKind::Risk)));
        }
    }

    #[test]
    fn ordinals_are_one_based_and_sequential() {
        let sections = flatten(&full_report());
        let topic_ordinals: Vec<usize> = sections
            .iter()
            .filter_map(|s| match s {
                Section::Topic { ordinal, .. } => Some(*ordinal),
                _ => None,
            })
            .collect();
        assert_eq!(topic_ordinals, vec![1, 2, 3]);
    }

    #[test]
    fn blank_next_steps_are_omitted() {
        let report = Report {
            next_steps: Some("   ".into()),
            ..bare_report()
        };
        assert!(flatten(&report)
            .iter()
            .all(|s| s.kind() != SectionKind::NextSteps));
    }
}
