//! Terminal rendering for gcs-core types using owo_colors.

use gcs_core::ManifestEvent;
use gcs_core::apply::ApplyOutcome;
use gcs_core::diff::{ResolutionOperation, ResolutionPlan, ResolutionStatus};
use owo_colors::OwoColorize;

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

/// Colorize text according to the resolution status
fn colorize(status: ResolutionStatus, text: &str) -> String {
    match status {
        ResolutionStatus::Create => text.green().to_string(),
        ResolutionStatus::Update => text.yellow().to_string(),
        ResolutionStatus::Delete => text.red().to_string(),
        ResolutionStatus::Conflict => text.magenta().to_string(),
        ResolutionStatus::Review => text.cyan().to_string(),
        ResolutionStatus::Noop => text.dimmed().to_string(),
    }
}

impl Render for ResolutionStatus {
    fn render(&self) -> String {
        colorize(*self, self.symbol())
    }
}

impl Render for ResolutionOperation {
    fn render(&self) -> String {
        let label = match &self.payload {
            Some(event) => event.identity.to_string(),
            None => self.identity_hash.short().to_string(),
        };
        format!(
            "{} {} {} {}",
            self.status.render(),
            colorize(self.status, &label),
            self.identity_hash.short().dimmed(),
            format!("({})", self.reason).dimmed()
        )
    }
}

impl Render for ManifestEvent {
    fn render(&self) -> String {
        let mut flags = Vec::new();
        if !self.ownership.managed {
            flags.push("unmanaged");
        }
        if self.ownership.locked {
            flags.push("locked");
        }
        let span = match self.date_span() {
            Some((start, end)) => format!("{start}..{end}"),
            None => "symbolic dates".to_string(),
        };
        let subs = self.sub_events.len();
        let mut line = format!(
            "{} {} {}",
            self.id.get(..12).unwrap_or(self.id.as_str()).dimmed(),
            self,
            format!("{span}, {subs} {}", pluralize("sub-event", subs)).dimmed()
        );
        if !flags.is_empty() {
            line.push_str(&format!(" [{}]", flags.join(", ")).yellow().to_string());
        }
        line
    }
}

/// Threshold for compact view (show counts instead of individual operations)
const COMPACT_THRESHOLD: usize = 5;

const STATUS_ORDER: [ResolutionStatus; 6] = [
    ResolutionStatus::Create,
    ResolutionStatus::Update,
    ResolutionStatus::Delete,
    ResolutionStatus::Conflict,
    ResolutionStatus::Review,
    ResolutionStatus::Noop,
];

fn status_label(status: ResolutionStatus) -> &'static str {
    match status {
        ResolutionStatus::Create => "new",
        ResolutionStatus::Update => "changed",
        ResolutionStatus::Delete => "deleted",
        ResolutionStatus::Conflict => "conflicting",
        ResolutionStatus::Review => "to review",
        ResolutionStatus::Noop => "unchanged",
    }
}

/// Render a plan, using compact view if there are many operations and verbose is false.
///
/// Unchanged identities are only listed in verbose mode. Conflicts and
/// reviews are always listed individually.
pub fn render_plan(plan: &ResolutionPlan, verbose: bool) -> String {
    if plan.operations.is_empty() {
        return "   No events on either side".dimmed().to_string();
    }

    let mut lines = Vec::new();
    let listed: Vec<&ResolutionOperation> = plan
        .operations
        .iter()
        .filter(|op| verbose || op.status != ResolutionStatus::Noop)
        .collect();

    if verbose || listed.len() <= COMPACT_THRESHOLD {
        for op in &listed {
            lines.push(format!("   {}", op.render()));
        }
    } else {
        for status in STATUS_ORDER {
            if matches!(status, ResolutionStatus::Conflict | ResolutionStatus::Review) {
                continue;
            }
            let count = plan.operations.iter().filter(|op| op.status == status).count();
            if count > 0 {
                let label = format!("({count} {} {})", status_label(status), pluralize("event", count));
                lines.push(format!("   {} {}", status.render(), colorize(status, &label)));
            }
        }
        for op in plan.needs_attention() {
            lines.push(format!("   {}", op.render()));
        }
    }

    if lines.is_empty() {
        lines.push("   No changes".dimmed().to_string());
    }
    if plan.dry_run {
        lines.push("   (dry run)".dimmed().to_string());
    }
    lines.join("\n")
}

pub fn render_outcome(outcome: &ApplyOutcome) -> String {
    format!(
        "Applied {} created, {} updated, {} deleted ({} {} total)",
        outcome.created.green(),
        outcome.updated.yellow(),
        outcome.deleted.red(),
        outcome.entries.len(),
        pluralize("entry", outcome.entries.len())
    )
}

/// Simple pluralization helper
pub fn pluralize(word: &str, count: usize) -> &str {
    if count == 1 {
        word
    } else {
        match word {
            "event" => "events",
            "entry" => "entries",
            "sub-event" => "sub-events",
            _ => word,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pluralizes_known_words() {
        assert_eq!(pluralize("event", 1), "event");
        assert_eq!(pluralize("event", 2), "events");
        assert_eq!(pluralize("entry", 0), "entries");
    }

    #[test]
    fn empty_plan_says_so() {
        let plan = ResolutionPlan::default();
        assert!(render_plan(&plan, false).contains("No events"));
    }
}
