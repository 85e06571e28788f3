//! Terminal output for analysis results.
//!
//! Nothing here influences classification; it only formats [`Report`]s.

use clap::ValueEnum;
use owo_colors::{OwoColorize, Style};
use std::fmt::Write;

use crate::model::{Report, Severity};

const NAME_WIDTH: usize = 30;
const MAX_RELEASES_SHOWN: usize = 10;
const BODY_LINES_SHOWN: usize = 3;

/// Which reports a list view shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Filter {
    #[default]
    All,
    Breaking,
    Deprecated,
    Behind,
}

impl Filter {
    pub fn matches(self, report: &Report) -> bool {
        match self {
            Filter::All => true,
            Filter::Breaking => report.severity == Severity::Breaking,
            Filter::Deprecated => report.severity >= Severity::Deprecation,
            Filter::Behind => report.behind_by > 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, style: Style, text: &str) -> String {
        if self.color {
            text.style(style).to_string()
        } else {
            text.to_string()
        }
    }

    fn severity_style(severity: Severity) -> Style {
        match severity {
            Severity::Breaking => Style::new().red().bold(),
            Severity::Deprecation => Style::new().yellow(),
            Severity::Feature => Style::new().green(),
            Severity::Ok => Style::new().dimmed(),
        }
    }

    fn status(&self, report: &Report) -> String {
        if report.is_error() {
            self.paint(Style::new().red(), "error")
        } else {
            self.paint(
                Self::severity_style(report.severity),
                report.severity.status_label(),
            )
        }
    }

    /// One line per finished dependency, e.g. `[3/12] 🟢 oil.nvim`.
    pub fn progress_line(&self, index: usize, total: usize, report: &Report) -> String {
        let mut line = format!(
            "[{}/{}] {} {}",
            index + 1,
            total,
            report.severity.icon(),
            report.dependency.name
        );
        if report.is_error() {
            line.push(' ');
            line.push_str(&self.paint(Style::new().red(), "✗ error"));
        }
        line
    }

    pub fn summary_line(&self, reports: &[Report]) -> String {
        let count = |f: Filter| reports.iter().filter(|r| f.matches(r)).count();
        let breaking = count(Filter::Breaking);
        let deprecated = reports
            .iter()
            .filter(|r| r.severity == Severity::Deprecation)
            .count();
        format!(
            "{} {} breaking  {} {} deprecated  {} {} behind  │  {} plugins total",
            self.paint(Self::severity_style(Severity::Breaking), "●"),
            breaking,
            self.paint(Self::severity_style(Severity::Deprecation), "●"),
            deprecated,
            self.paint(Self::severity_style(Severity::Feature), "●"),
            count(Filter::Behind),
            reports.len(),
        )
    }

    /// Ranked list view. `reports` is printed in the order given.
    pub fn table(&self, reports: &[Report], filter: Filter) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "    {:<32} {:<12} {:<10} {}",
            "Plugin", "Commit", "Behind", "Status"
        );
        let _ = writeln!(out, "  {}", "─".repeat(80));

        for report in reports.iter().filter(|r| filter.matches(r)) {
            let behind = if report.behind_by > 0 {
                format!("+{}", report.behind_by)
            } else {
                String::new()
            };
            let _ = writeln!(
                out,
                "  {} {:<32} {:<12} {:<10} {}",
                report.severity.icon(),
                truncate(&report.dependency.name, NAME_WIDTH),
                prefix(&report.dependency.commit, 10),
                behind,
                self.status(report)
            );
        }
        out
    }

    /// Full view of one report: metadata, message excerpts and releases.
    pub fn detail(&self, report: &Report) -> String {
        let dep = &report.dependency;
        let mut out = String::new();

        let _ = writeln!(
            out,
            "{}  {}",
            report.severity.icon(),
            self.paint(Style::new().bold(), &dep.name)
        );
        let mut field = |label: &str, value: &str| {
            let _ = writeln!(out, "  {:<16}{}", label, value);
        };
        field("Repository:", &dep.slug());
        field("Branch:", &dep.branch);
        field("Current Commit:", prefix(&dep.commit, 12));
        field("Behind by:", &format!("{} commits", report.behind_by));
        field("Severity:", &report.severity.to_string());
        if !report.compare_url.is_empty() {
            field("Compare URL:", &report.compare_url);
        }

        if let Some(error) = report.error.as_deref().filter(|e| !e.is_empty()) {
            let _ = writeln!(out, "\n  {}", self.paint(Style::new().red(), &format!("Error: {}", error)));
        }

        self.message_section(&mut out, "🔴 Breaking Changes", Severity::Breaking, &report.breaking_messages);
        self.message_section(
            &mut out,
            "🟡 Deprecation Warnings",
            Severity::Deprecation,
            &report.deprecation_messages,
        );

        if !report.releases.is_empty() {
            let _ = writeln!(out, "\n  📦 Recent Releases");
            for release in report.releases.iter().take(MAX_RELEASES_SHOWN) {
                let name = if !release.name.is_empty() && release.name != release.tag {
                    format!(" — {}", release.name)
                } else {
                    String::new()
                };
                let _ = writeln!(out, "    {} {}{}", release.severity.icon(), release.tag, name);

                let mut lines = release.body.lines().map(str::trim).filter(|l| !l.is_empty());
                for line in lines.by_ref().take(BODY_LINES_SHOWN) {
                    let _ = writeln!(out, "        {}", truncate(line, 100));
                }
                if lines.next().is_some() {
                    let _ = writeln!(out, "        ...");
                }
            }
        }
        out
    }

    fn message_section(&self, out: &mut String, title: &str, severity: Severity, messages: &[String]) {
        if messages.is_empty() {
            return;
        }
        let _ = writeln!(out, "\n  {}", title);
        for message in messages {
            let line = format!("    • {}", truncate(message, 100));
            let _ = writeln!(out, "{}", self.paint(Self::severity_style(severity), &line));
        }
    }
}

pub fn to_json(reports: &[Report]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(reports)
}

/// Shortens `s` to at most `max` characters, marking the cut with `...`.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

fn prefix(s: &str, len: usize) -> &str {
    match s.char_indices().nth(len) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}
