//! Turns a commit range and a release list into a [`Report`].
//!
//! Everything here is pure: the same inputs always give the same report.

use crate::analysis::signals::{first_line, parse_major, Signals};
use crate::model::{CommitRange, Dependency, ReleaseRecord, ReleaseReport, Report, Severity};
use crate::traits::ClientError;

/// Classifies one dependency.
///
/// # Arguments
///
/// * `dependency` - The dependency the report is about
/// * `comparison` - Outcome of comparing the pinned commit with the branch tip
/// * `releases` - Release page for the repository; empty when listing failed
///
/// A failed comparison yields an error report at [`Severity::Ok`]. Callers
/// must look at [`Report::is_error`] before trusting the severity.
pub fn classify(
    dependency: &Dependency,
    comparison: Result<&CommitRange, &ClientError>,
    releases: &[ReleaseRecord],
) -> Report {
    let range = match comparison {
        Ok(range) => range,
        Err(e) => return Report::failed(dependency.clone(), format!("compare failed: {}", e)),
    };

    let mut report = Report::new(dependency.clone());
    report.behind_by = range.ahead_by;
    report.compare_url = range.html_url.clone();

    if range.ahead_by == 0 {
        return report;
    }

    for commit in &range.commits {
        let signals = Signals::scan(&commit.message);
        let excerpt = first_line(&commit.message);
        if signals.breaking {
            report.breaking_messages.push(excerpt.to_string());
        }
        if signals.deprecation {
            report.deprecation_messages.push(excerpt.to_string());
        }
    }

    report.releases = evaluate_releases(releases);
    report.severity = overall_severity(&report);
    report
}

fn overall_severity(report: &Report) -> Severity {
    let mut severity = Severity::Ok;
    if report.behind_by > 0 {
        severity = severity.escalate(Severity::Feature);
    }
    severity = report
        .releases
        .iter()
        .fold(severity, |acc, release| acc.escalate(release.severity));

    // A breaking commit message overrides everything else.
    if !report.breaking_messages.is_empty() {
        Severity::Breaking
    } else if !report.deprecation_messages.is_empty() {
        severity.escalate(Severity::Deprecation)
    } else {
        severity
    }
}

/// Classifies every non-draft release, newest first.
///
/// Ordering is by publish time descending; equal timestamps keep their input
/// order and releases without a timestamp go last.
pub fn evaluate_releases(releases: &[ReleaseRecord]) -> Vec<ReleaseReport> {
    let mut ordered: Vec<&ReleaseRecord> = releases.iter().filter(|r| !r.draft).collect();
    ordered.sort_by(|a, b| b.published_at.cmp(&a.published_at));

    let jumps = major_jumps(&ordered);

    ordered
        .into_iter()
        .zip(jumps)
        .map(|(release, jumped)| {
            let mut severity = if jumped {
                Severity::Breaking
            } else {
                Severity::Feature
            };

            let signals = Signals::scan(&format!("{} {}", release.name, release.body));
            if signals.breaking {
                severity = Severity::Breaking;
            } else if signals.deprecation {
                severity = severity.escalate(Severity::Deprecation);
            }

            ReleaseReport {
                tag: release.tag.clone(),
                name: release.name.clone(),
                body: release.body.clone(),
                url: release.html_url.clone(),
                published_at: release.published_at,
                severity,
            }
        })
        .collect()
}

/// State carried through the oldest-to-newest walk over releases.
#[derive(Default)]
struct MajorScan {
    previous_major: Option<u64>,
    jumps: Vec<bool>,
}

/// For each release (newest first), whether its major version is strictly
/// greater than that of the closest older release with a parseable tag.
fn major_jumps(newest_first: &[&ReleaseRecord]) -> Vec<bool> {
    let scan = newest_first
        .iter()
        .rev()
        .fold(MajorScan::default(), |mut scan, release| {
            let major = parse_major(&release.tag);
            let jumped = matches!((scan.previous_major, major), (Some(prev), Some(cur)) if cur > prev);
            if major.is_some() {
                scan.previous_major = major;
            }
            scan.jumps.push(jumped);
            scan
        });

    let mut jumps = scan.jumps;
    jumps.reverse();
    jumps
}
