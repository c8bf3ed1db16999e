//! Section markup: one [`Section`] → one fixed-width SVG document.
//!
//! Layout happens here, not in the rasteriser. Each block is built top to
//! bottom on a [`Canvas`] that advances a vertical cursor by the line boxes
//! of the wrapped text, so the final cursor position *is* the block height.
//! The SVG is emitted with exactly that height, and the rasteriser only has
//! to paint it; the two can never disagree about how tall a block is.
//!
//! All blocks share the render width and the [`StyleSheet`], which keeps
//! horizontal placement trivial for the compositor. Text is wrapped with the
//! [`TextMetrics`] of the fonts that will draw it, at the weight it is drawn
//! in, so no wrapped line runs past its column.

use crate::pipeline::flatten::{Section, SectionKind};
use crate::report::{Decision, FollowUp, Risk, Tier, Topic};
use crate::pipeline::metrics::TextMetrics;
use crate::style::StyleSheet;
use std::fmt::Write as _;

/// Rendered markup for one block, ready for the staging area.
#[derive(Debug, Clone)]
pub struct BlockMarkup {
    pub kind: SectionKind,
    /// Complete SVG document.
    pub svg: String,
    pub width_px: u32,
    /// Exact content height; the rasteriser must reproduce it.
    pub height_px: u32,
}

/// Render `section` into an SVG document `width_px` wide.
pub fn render_markup(
    section: &Section,
    style: &StyleSheet,
    metrics: &TextMetrics,
    width_px: u32,
) -> BlockMarkup {
    let mut canvas = Canvas::new(style, metrics, width_px as f32);
    let pad = style.wrapper_padding;
    canvas.advance(pad);

    match section {
        Section::Header {
            title,
            date,
            participants,
        } => header(&mut canvas, title, date, participants),
        Section::Purpose { items } => {
            let label = style.labels.purpose.clone();
            canvas.panel(
                PanelStyle::new(&style.panel_fill, style.panel_padding)
                    .accent(&style.purpose_accent, 4.0),
                |c| {
                    c.heading(&label);
                    c.advance(8.0);
                    c.bullets(items, &style.body_text);
                },
            );
        }
        Section::Summary { text } => {
            let label = style.labels.summary.clone();
            canvas.panel(PanelStyle::new(&style.panel_fill, style.panel_padding), |c| {
                c.heading(&label);
                c.advance(8.0);
                c.paragraph(text, style.body_size, &style.body_text, Weight::Regular);
            });
        }
        Section::Insights { items } => {
            let label = style.labels.insights.clone();
            canvas.panel(
                PanelStyle::new(&style.insight_fill, style.panel_padding)
                    .accent(&style.accent, 4.0),
                |c| {
                    c.heading(&label);
                    c.advance(8.0);
                    c.bullets(items, &style.body_text);
                },
            );
        }
        Section::TopicsHeader => canvas.heading(&style.labels.topics),
        Section::DecisionsHeader => canvas.heading(&style.labels.decisions),
        Section::RisksHeader => canvas.heading(&style.labels.risks),
        Section::FollowUpsHeader => canvas.heading(&style.labels.follow_ups),
        Section::Topic { ordinal, topic } => topic_card(&mut canvas, *ordinal, topic),
        Section::Decision { decision } => decision_card(&mut canvas, decision),
        Section::Risk { risk } => risk_card(&mut canvas, risk),
        Section::FollowUp { ordinal, item } => follow_up_card(&mut canvas, *ordinal, item),
        Section::NextSteps { text } => {
            let label = style.labels.next_steps.clone();
            canvas.panel(
                PanelStyle::new(&style.next_steps_fill, style.panel_padding),
                |c| {
                    c.heading(&label);
                    c.advance(8.0);
                    c.paragraph(text, style.body_size, &style.body_text, Weight::Regular);
                },
            );
        }
        Section::Footer => footer(&mut canvas),
    }

    canvas.advance(pad);
    canvas.finish(section.kind())
}

/// Zero-padded two-digit topic ordinal: `1` → `"01"`.
pub fn topic_ordinal(ordinal: usize) -> String {
    format!("{:02}", ordinal)
}

// ── Section builders ─────────────────────────────────────────────────────

fn header(c: &mut Canvas<'_>, title: &str, date: &str, participants: &[String]) {
    let style = c.style;
    let x = c.left();
    let w = c.inner_width();
    c.defs.push(format!(
        r#"<linearGradient id="header-bar" x1="0" y1="0" x2="1" y2="0"><stop offset="0" stop-color="{}"/><stop offset="1" stop-color="{}"/></linearGradient>"#,
        style.accent, style.accent_light
    ));
    let _ = write!(
        c.body,
        r#"<rect x="{x}" y="{y}" width="{w}" height="3" rx="2" fill="url(#header-bar)"/>"#,
        y = c.y
    );
    c.advance(3.0 + 16.0);

    let kind = style.labels.report_kind.clone();
    c.text_line(x, &kind, 10.0, &style.accent, Weight::Semibold);
    c.advance(6.0);

    c.paragraph(title, style.title_size, &style.text, Weight::Bold);
    c.advance(12.0);

    let meta = format!(
        "{}: {}   |   {}: {}",
        style.labels.date,
        date,
        style.labels.participants,
        participants.join(", ")
    );
    c.paragraph(&meta, style.meta_size, &style.muted_text, Weight::Regular);
}

fn topic_card(c: &mut Canvas<'_>, ordinal: usize, topic: &Topic) {
    let style = c.style;
    c.panel(PanelStyle::new(&style.topic_fill, style.card_padding), |c| {
        let number = topic_ordinal(ordinal);
        let number_w = c.measure(&number, style.subheading_size, Weight::Semibold) + 6.0;
        let x = c.left();
        c.text_line(x, &number, style.subheading_size, &style.accent, Weight::Semibold);
        // The title wraps in the column to the right of the ordinal.
        c.row_at(
            x + number_w,
            c.inner_width() - number_w,
            &topic.title,
            style.subheading_size,
            &style.text,
            Weight::Semibold,
        );
        c.advance(6.0);
        c.paragraph(&topic.content, style.body_size, &style.body_text, Weight::Regular);

        if let Some(subs) = topic.sub_items.as_deref().filter(|s| !s.is_empty()) {
            c.advance(8.0);
            c.indented(8.0, |c| c.bullets(subs, &style.muted_text));
        }
    });
}

fn decision_card(c: &mut Canvas<'_>, d: &Decision) {
    let style = c.style;
    c.panel(
        PanelStyle::new(&style.decision_fill, style.card_padding).accent(&style.decision_accent, 3.0),
        |c| {
            c.paragraph(&d.decision, style.subheading_size, &style.text, Weight::Semibold);
            c.advance(6.0);
            c.labelled(&style.labels.rationale, &d.rationale);
            c.advance(4.0);
            c.labelled(&style.labels.impact, &d.impact);
            if let Some(deadline) = d.deadline.as_deref().filter(|s| !s.trim().is_empty()) {
                c.advance(4.0);
                c.labelled(&style.labels.deadline, deadline);
            }
        },
    );
}

fn risk_card(c: &mut Canvas<'_>, r: &Risk) {
    let style = c.style;
    c.panel(
        PanelStyle::new(&style.risk_fill, style.card_padding).accent(&style.risk_accent, 3.0),
        |c| {
            let badge_w = c.badge_width(r.severity);
            let top = c.y;
            c.badge(c.right() - badge_w, top, r.severity);
            c.wrapped_at(
                c.left(),
                c.inner_width() - badge_w - 8.0,
                &r.risk,
                style.subheading_size,
                &style.text,
                Weight::Semibold,
            );
            c.y = c.y.max(top + c.badge_height());
            c.advance(6.0);
            c.labelled(&style.labels.mitigation, &r.mitigation);
            if let Some(owner) = r.owner.as_deref().filter(|s| !s.trim().is_empty()) {
                c.advance(4.0);
                c.labelled(&style.labels.owner, owner);
            }
        },
    );
}

fn follow_up_card(c: &mut Canvas<'_>, ordinal: usize, f: &FollowUp) {
    let style = c.style;
    c.panel(
        PanelStyle::new(&style.follow_up_fill, style.card_padding).accent(&style.accent, 3.0),
        |c| {
            let task = format!("{}. {}", ordinal, f.task);
            let top = c.y;
            let reserved = match f.priority {
                Some(tier) => {
                    let w = c.badge_width(tier);
                    c.badge(c.right() - w, top, tier);
                    w + 8.0
                }
                None => 0.0,
            };
            c.wrapped_at(
                c.left(),
                c.inner_width() - reserved,
                &task,
                style.body_size,
                &style.text,
                Weight::Medium,
            );
            if f.priority.is_some() {
                c.y = c.y.max(top + c.badge_height());
            }
            c.advance(3.0);
            let meta = format!(
                "{}: {}   |   {}: {}",
                style.labels.assignee, f.assignee, style.labels.deadline, f.deadline
            );
            c.paragraph(&meta, style.badge_size, &style.faint_text, Weight::Regular);
            if let Some(details) = f.details.as_deref().filter(|s| !s.trim().is_empty()) {
                c.advance(3.0);
                c.paragraph(details, style.body_size, &style.body_text, Weight::Regular);
            }
        },
    );
}

fn footer(c: &mut Canvas<'_>) {
    let style = c.style;
    let x = c.left();
    let w = c.inner_width();
    let _ = write!(
        c.body,
        r#"<line x1="{x}" y1="{y}" x2="{x2}" y2="{y}" stroke="{color}" stroke-width="1"/>"#,
        y = c.y + 0.5,
        x2 = x + w,
        color = style.rule
    );
    c.advance(12.0);
    let text = style.labels.footer.clone();
    c.centered(&text, style.footer_size, &style.faint_text);
}

// ── Canvas ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Weight {
    Regular,
    Medium,
    Semibold,
    Bold,
}

impl Weight {
    fn css(self) -> u16 {
        match self {
            Weight::Regular => 400,
            Weight::Medium => 500,
            Weight::Semibold => 600,
            Weight::Bold => 700,
        }
    }
}

struct PanelStyle<'s> {
    fill: &'s str,
    padding: f32,
    accent: Option<(&'s str, f32)>,
}

impl<'s> PanelStyle<'s> {
    fn new(fill: &'s str, padding: f32) -> Self {
        Self {
            fill,
            padding,
            accent: None,
        }
    }

    fn accent(mut self, color: &'s str, width: f32) -> Self {
        self.accent = Some((color, width));
        self
    }
}

/// Top-to-bottom SVG builder with a vertical cursor and a horizontal
/// content box that panels and indents narrow.
struct Canvas<'s> {
    style: &'s StyleSheet,
    metrics: &'s TextMetrics,
    width: f32,
    /// Current content box: (left, right).
    frame: (f32, f32),
    y: f32,
    defs: Vec<String>,
    body: String,
}

impl<'s> Canvas<'s> {
    fn new(style: &'s StyleSheet, metrics: &'s TextMetrics, width: f32) -> Self {
        let pad = style.wrapper_padding;
        Self {
            style,
            metrics,
            width,
            frame: (pad, width - pad),
            y: 0.0,
            defs: Vec::new(),
            body: String::new(),
        }
    }

    fn left(&self) -> f32 {
        self.frame.0
    }

    fn right(&self) -> f32 {
        self.frame.1
    }

    fn inner_width(&self) -> f32 {
        (self.frame.1 - self.frame.0).max(1.0)
    }

    fn advance(&mut self, dy: f32) {
        self.y += dy;
    }

    fn measure(&self, text: &str, size: f32, weight: Weight) -> f32 {
        self.metrics.measure(text, size, weight.css())
    }

    fn wrap(&self, text: &str, size: f32, weight: Weight, width: f32) -> Vec<String> {
        self.metrics.wrap(text, size, weight.css(), width)
    }

    /// One unwrapped line whose line box starts at the cursor.
    fn text_line(&mut self, x: f32, text: &str, size: f32, color: &str, weight: Weight) {
        self.emit_line(x, self.y, text, size, color, weight, "start");
    }

    fn emit_line(
        &mut self,
        x: f32,
        top: f32,
        text: &str,
        size: f32,
        color: &str,
        weight: Weight,
        anchor: &str,
    ) {
        // Baseline sits where a CSS line box would put it: half-leading plus ascent.
        let baseline = top + (self.style.line_box(size) - size) / 2.0 + size * 0.88;
        let _ = write!(
            self.body,
            r#"<text x="{x:.1}" y="{baseline:.1}" font-size="{size}" font-weight="{w}" fill="{color}" text-anchor="{anchor}" xml:space="preserve">{t}</text>"#,
            w = weight.css(),
            t = escape_xml(text),
        );
    }

    /// Wrap `text` into the column `[x, x + width)` and advance past it.
    /// Returns the number of line boxes used.
    fn wrapped_at(
        &mut self,
        x: f32,
        width: f32,
        text: &str,
        size: f32,
        color: &str,
        weight: Weight,
    ) -> usize {
        let line_box = self.style.line_box(size);
        let lines = self.wrap(text, size, weight, width.max(size));
        for line in &lines {
            if !line.is_empty() {
                self.emit_line(x, self.y, line, size, color, weight, "start");
            }
            self.y += line_box;
        }
        lines.len()
    }

    /// [`Self::wrapped_at`] for text beside a marker (ordinal, bullet): the
    /// row keeps one line box even when the text is blank.
    fn row_at(&mut self, x: f32, width: f32, text: &str, size: f32, color: &str, weight: Weight) {
        if self.wrapped_at(x, width, text, size, color, weight) == 0 {
            self.y += self.style.line_box(size);
        }
    }

    fn paragraph(&mut self, text: &str, size: f32, color: &str, weight: Weight) {
        let (x, w) = (self.left(), self.inner_width());
        self.wrapped_at(x, w, text, size, color, weight);
    }

    fn heading(&mut self, text: &str) {
        let (size, color) = (self.style.heading_size, self.style.text.clone());
        self.paragraph(text, size, &color, Weight::Semibold);
    }

    fn centered(&mut self, text: &str, size: f32, color: &str) {
        let line_box = self.style.line_box(size);
        let cx = (self.left() + self.right()) / 2.0;
        for line in self.wrap(text, size, Weight::Regular, self.inner_width()) {
            self.emit_line(cx, self.y, &line, size, color, Weight::Regular, "middle");
            self.y += line_box;
        }
    }

    /// `Label:` in bold followed by the value, wrapped as one paragraph.
    ///
    /// Wrapping measures the whole paragraph in bold, the wider of the two
    /// weights, so the regular-weight value always fits too.
    fn labelled(&mut self, label: &str, value: &str) {
        let size = self.style.body_size;
        let line_box = self.style.line_box(size);
        let prefix = format!("{label}:");
        let x = self.left();
        let prefix_w = self.measure(&format!("{prefix} "), size, Weight::Bold);
        let lines = self.wrap(&format!("{prefix} {value}"), size, Weight::Bold, self.inner_width());
        for (i, line) in lines.iter().enumerate() {
            if i == 0 && line.starts_with(&prefix) {
                let rest = line[prefix.len()..].trim_start();
                let color = self.style.text.clone();
                self.emit_line(x, self.y, &prefix, size, &color, Weight::Bold, "start");
                let color = self.style.body_text.clone();
                self.emit_line(x + prefix_w, self.y, rest, size, &color, Weight::Regular, "start");
            } else {
                let color = self.style.body_text.clone();
                self.emit_line(x, self.y, line, size, &color, Weight::Regular, "start");
            }
            self.y += line_box;
        }
    }

    fn bullets(&mut self, items: &[String], color: &str) {
        let size = self.style.body_size;
        let indent = self.style.list_indent;
        let gap = self.style.list_item_gap;
        let x = self.left();
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.y += gap;
            }
            self.emit_line(x + indent * 0.25, self.y, "•", size, color, Weight::Regular, "start");
            self.row_at(x + indent, self.inner_width() - indent, item, size, color, Weight::Regular);
        }
    }

    fn indented(&mut self, dx: f32, f: impl FnOnce(&mut Self)) {
        let saved = self.frame;
        self.frame.0 = (self.frame.0 + dx).min(self.frame.1 - 1.0);
        f(self);
        self.frame = saved;
    }

    fn badge_width(&self, tier: Tier) -> f32 {
        self.measure(self.style.labels.tier(tier), self.style.badge_size, Weight::Semibold) + 12.0
    }

    fn badge_height(&self) -> f32 {
        self.style.line_box(self.style.badge_size) + 2.0
    }

    fn badge(&mut self, x: f32, top: f32, tier: Tier) {
        let palette = self.style.tier(tier).clone();
        let label = self.style.labels.tier(tier).to_string();
        let (w, h) = (self.badge_width(tier), self.badge_height());
        let _ = write!(
            self.body,
            r#"<rect class="tier-{tier}" x="{x:.1}" y="{top:.1}" width="{w:.1}" height="{h:.1}" rx="3" fill="{fill}"/>"#,
            fill = palette.fill,
        );
        let size = self.style.badge_size;
        self.emit_line(x + w / 2.0, top + 1.0, &label, size, &palette.text, Weight::Semibold, "middle");
    }

    /// Draw a rounded panel around whatever `f` lays out inside it.
    ///
    /// The background has to precede its content in SVG paint order but its
    /// height is only known afterwards, so the content is laid out into a
    /// scratch buffer first.
    fn panel(&mut self, panel: PanelStyle<'_>, f: impl FnOnce(&mut Self)) {
        let top = self.y;
        let outer = self.frame;
        let accent_w = panel.accent.map_or(0.0, |(_, w)| w);
        let body = std::mem::take(&mut self.body);

        self.frame = (
            outer.0 + accent_w + panel.padding,
            (outer.1 - panel.padding).max(outer.0 + accent_w + panel.padding + 1.0),
        );
        self.y += panel.padding;
        f(self);
        self.y += panel.padding;
        let height = self.y - top;

        let content = std::mem::replace(&mut self.body, body);
        self.frame = outer;

        let (x, w) = (outer.0, outer.1 - outer.0);
        let r = self.style.corner_radius;
        let _ = write!(
            self.body,
            r#"<rect x="{x:.1}" y="{top:.1}" width="{w:.1}" height="{height:.1}" rx="{r}" fill="{fill}"/>"#,
            fill = panel.fill,
        );
        if let Some((color, aw)) = panel.accent {
            let _ = write!(
                self.body,
                r#"<rect x="{x:.1}" y="{top:.1}" width="{aw}" height="{height:.1}" fill="{color}"/>"#,
            );
        }
        self.body.push_str(&content);
    }

    fn finish(self, kind: SectionKind) -> BlockMarkup {
        let width_px = self.width.round() as u32;
        let height_px = self.y.ceil().max(1.0) as u32;
        let mut svg = String::with_capacity(self.body.len() + 512);
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width_px}" height="{height_px}" viewBox="0 0 {width_px} {height_px}" font-family="{font}" data-kind="{kind}">"#,
            font = escape_xml(&self.style.font_family),
        );
        if !self.defs.is_empty() {
            svg.push_str("<defs>");
            for d in &self.defs {
                svg.push_str(d);
            }
            svg.push_str("</defs>");
        }
        let _ = write!(
            svg,
            r##"<rect width="{width_px}" height="{height_px}" fill="#ffffff"/>"##
        );
        svg.push_str(&self.body);
        svg.push_str("</svg>");

        BlockMarkup {
            kind,
            svg,
            width_px,
            height_px,
        }
    }
}

/// Escape text for inclusion in SVG character data or attributes.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if (c as u32) < 0x20 && c != '\t' => {}
            c => out.push(c),
        }
    }
    out
}
