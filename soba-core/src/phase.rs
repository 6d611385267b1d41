//! Phase Strategy — pure mapping from label set to phase and back.
//!
//! Mirrors the teacher's `worker::decision` module: a stateless capability,
//! no I/O, exhaustively tested against the label tables in the state
//! machine (spec §4.1).

use std::fmt;

/// The soba label namespace prefix. Every label the daemon owns is
/// `soba:<name>`; everything else is ignored by the strategy.
pub const LABEL_PREFIX: &str = "soba:";

/// A single `soba:*` label, without the namespace prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SobaLabel {
    Todo,
    Queued,
    Planning,
    Ready,
    Doing,
    ReviewRequested,
    Reviewing,
    RequiresChanges,
    Revising,
    Done,
    Merged,
}

impl SobaLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Queued => "queued",
            Self::Planning => "planning",
            Self::Ready => "ready",
            Self::Doing => "doing",
            Self::ReviewRequested => "review-requested",
            Self::Reviewing => "reviewing",
            Self::RequiresChanges => "requires-changes",
            Self::Revising => "revising",
            Self::Done => "done",
            Self::Merged => "merged",
        }
    }

    /// Parse the bare label name (without the `soba:` prefix).
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "todo" => Self::Todo,
            "queued" => Self::Queued,
            "planning" => Self::Planning,
            "ready" => Self::Ready,
            "doing" => Self::Doing,
            "review-requested" => Self::ReviewRequested,
            "reviewing" => Self::Reviewing,
            "requires-changes" => Self::RequiresChanges,
            "revising" => Self::Revising,
            "done" => Self::Done,
            "merged" => Self::Merged,
            _ => return None,
        })
    }

    /// The admission class this label belongs to (spec §3 label taxonomy).
    pub fn class(self) -> LabelClass {
        match self {
            Self::Todo => LabelClass::Candidate,
            Self::Queued | Self::Planning | Self::Ready | Self::Doing | Self::Reviewing => {
                LabelClass::Active
            }
            Self::ReviewRequested | Self::RequiresChanges => LabelClass::Intermediate,
            Self::Done | Self::Merged => LabelClass::Terminal,
            Self::Revising => LabelClass::Active,
        }
    }

    /// Full `soba:<name>` form, as written on a GitHub issue.
    pub fn full_name(self) -> String {
        format!("{LABEL_PREFIX}{}", self.as_str())
    }
}

impl fmt::Display for SobaLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The admission class of a label (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelClass {
    Candidate,
    Active,
    Intermediate,
    Terminal,
}

/// Parse a full label name (e.g. `"soba:todo"`) into a `SobaLabel`.
///
/// Returns `None` for anything outside the `soba:` namespace or an
/// unrecognized name within it — unknown labels are ignored everywhere,
/// never an error (spec §4.1).
pub fn parse_label(full_name: &str) -> Option<SobaLabel> {
    full_name
        .strip_prefix(LABEL_PREFIX)
        .and_then(SobaLabel::parse)
}

/// A phase of work on a single issue. `nil` from spec.md is modeled as
/// `Option<Phase>` rather than a variant (spec §9: tagged result unions
/// replace exceptions-as-control-flow; `None` is the idiomatic `nil`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Plan,
    Implement,
    Review,
    Revise,
    QueuedToPlanning,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Implement => "implement",
            Self::Review => "review",
            Self::Revise => "revise",
            Self::QueuedToPlanning => "queued_to_planning",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Determine the phase implied by a set of labels.
///
/// Returns `Some(phase)` iff the label set contains exactly one of the
/// entry labels (`todo`, `queued`, `ready`, `review-requested`,
/// `requires-changes`). Any active label means work is already in flight,
/// so the result is `None`; terminal labels also yield `None`.
///
/// `todo` and `queued` both map to the "start planning" family but produce
/// different phases: `todo` is the legacy direct path used only by
/// single-issue `start ISSUE_NO` invocations (spec §9 open question);
/// `queued` is the production admission path (§4.3).
pub fn determine_phase(labels: &[SobaLabel]) -> Option<Phase> {
    // An active label anywhere in the set means work is in flight: no phase.
    if labels.iter().any(|l| l.class() == LabelClass::Active) {
        return None;
    }

    if labels.contains(&SobaLabel::Queued) {
        return Some(Phase::QueuedToPlanning);
    }
    if labels.contains(&SobaLabel::Todo) {
        return Some(Phase::Plan);
    }
    if labels.contains(&SobaLabel::Ready) {
        return Some(Phase::Implement);
    }
    if labels.contains(&SobaLabel::ReviewRequested) {
        return Some(Phase::Review);
    }
    if labels.contains(&SobaLabel::RequiresChanges) {
        return Some(Phase::Revise);
    }
    None
}

/// The label this phase transitions *to* once its command is launched.
pub fn next_label(phase: Phase) -> SobaLabel {
    match phase {
        Phase::Plan | Phase::QueuedToPlanning => SobaLabel::Planning,
        Phase::Implement => SobaLabel::Doing,
        Phase::Review => SobaLabel::Reviewing,
        Phase::Revise => SobaLabel::Revising,
    }
}

/// The label a phase is entered *from* — the inverse of the entry mapping.
pub fn current_label_for_phase(phase: Phase) -> SobaLabel {
    match phase {
        Phase::Plan => SobaLabel::Todo,
        Phase::QueuedToPlanning => SobaLabel::Queued,
        Phase::Implement => SobaLabel::Ready,
        Phase::Review => SobaLabel::ReviewRequested,
        Phase::Revise => SobaLabel::RequiresChanges,
    }
}

/// The allowed edges of the state machine (spec §4.1). Ordering is total:
/// every label update must pass through here.
const TRANSITIONS: &[(SobaLabel, SobaLabel)] = &[
    (SobaLabel::Todo, SobaLabel::Queued),
    (SobaLabel::Queued, SobaLabel::Planning),
    (SobaLabel::Planning, SobaLabel::Ready),
    (SobaLabel::Ready, SobaLabel::Doing),
    (SobaLabel::Doing, SobaLabel::ReviewRequested),
    (SobaLabel::ReviewRequested, SobaLabel::Reviewing),
    (SobaLabel::Reviewing, SobaLabel::Done),
    (SobaLabel::Reviewing, SobaLabel::RequiresChanges),
    (SobaLabel::RequiresChanges, SobaLabel::Revising),
    (SobaLabel::Revising, SobaLabel::ReviewRequested),
    (SobaLabel::Done, SobaLabel::Merged),
];

/// Is `from -> to` one of the allowed state machine edges?
pub fn validate_transition(from: SobaLabel, to: SobaLabel) -> bool {
    TRANSITIONS.contains(&(from, to))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<SobaLabel> {
        names.iter().filter_map(|n| SobaLabel::parse(n)).collect()
    }

    // ── determine_phase ──────────────────────────────────────────────────

    #[test]
    fn todo_yields_plan() {
        assert_eq!(determine_phase(&labels(&["todo"])), Some(Phase::Plan));
    }

    #[test]
    fn queued_yields_queued_to_planning() {
        assert_eq!(
            determine_phase(&labels(&["queued"])),
            Some(Phase::QueuedToPlanning)
        );
    }

    #[test]
    fn ready_yields_implement() {
        assert_eq!(determine_phase(&labels(&["ready"])), Some(Phase::Implement));
    }

    #[test]
    fn review_requested_yields_review() {
        assert_eq!(
            determine_phase(&labels(&["review-requested"])),
            Some(Phase::Review)
        );
    }

    #[test]
    fn requires_changes_yields_revise() {
        assert_eq!(
            determine_phase(&labels(&["requires-changes"])),
            Some(Phase::Revise)
        );
    }

    #[test]
    fn active_labels_yield_nil() {
        for l in ["planning", "doing", "reviewing", "revising"] {
            assert_eq!(determine_phase(&labels(&[l])), None, "label {l}");
        }
    }

    #[test]
    fn terminal_labels_yield_nil() {
        for l in ["done", "merged"] {
            assert_eq!(determine_phase(&labels(&[l])), None, "label {l}");
        }
    }

    #[test]
    fn empty_label_set_yields_nil() {
        assert_eq!(determine_phase(&[]), None);
    }

    #[test]
    fn non_soba_labels_are_irrelevant() {
        // parse_label filters these out before they ever reach determine_phase;
        // this documents that determine_phase itself only ever sees SobaLabel.
        assert_eq!(parse_label("bug"), None);
        assert_eq!(parse_label("soba:todo"), Some(SobaLabel::Todo));
        assert_eq!(parse_label("soba:unknown-thing"), None);
    }

    // ── next_label / current_label_for_phase ─────────────────────────────

    #[test]
    fn next_label_table() {
        assert_eq!(next_label(Phase::Plan), SobaLabel::Planning);
        assert_eq!(next_label(Phase::QueuedToPlanning), SobaLabel::Planning);
        assert_eq!(next_label(Phase::Implement), SobaLabel::Doing);
        assert_eq!(next_label(Phase::Review), SobaLabel::Reviewing);
        assert_eq!(next_label(Phase::Revise), SobaLabel::Revising);
    }

    #[test]
    fn current_label_for_phase_table() {
        assert_eq!(current_label_for_phase(Phase::Plan), SobaLabel::Todo);
        assert_eq!(
            current_label_for_phase(Phase::QueuedToPlanning),
            SobaLabel::Queued
        );
        assert_eq!(current_label_for_phase(Phase::Implement), SobaLabel::Ready);
        assert_eq!(
            current_label_for_phase(Phase::Review),
            SobaLabel::ReviewRequested
        );
        assert_eq!(
            current_label_for_phase(Phase::Revise),
            SobaLabel::RequiresChanges
        );
    }

    /// Property 2 (spec §8): every phase's entry/exit pair is a valid transition.
    #[test]
    fn every_phase_transition_is_valid() {
        for phase in [
            Phase::Plan,
            Phase::QueuedToPlanning,
            Phase::Implement,
            Phase::Review,
            Phase::Revise,
        ] {
            let from = current_label_for_phase(phase);
            let to = next_label(phase);
            assert!(
                validate_transition(from, to),
                "{phase}: {from} -> {to} should be valid"
            );
        }
    }

    // ── validate_transition ───────────────────────────────────────────────

    #[test]
    fn full_transition_table() {
        let allowed = [
            (SobaLabel::Todo, SobaLabel::Queued),
            (SobaLabel::Queued, SobaLabel::Planning),
            (SobaLabel::Planning, SobaLabel::Ready),
            (SobaLabel::Ready, SobaLabel::Doing),
            (SobaLabel::Doing, SobaLabel::ReviewRequested),
            (SobaLabel::ReviewRequested, SobaLabel::Reviewing),
            (SobaLabel::Reviewing, SobaLabel::Done),
            (SobaLabel::Reviewing, SobaLabel::RequiresChanges),
            (SobaLabel::RequiresChanges, SobaLabel::Revising),
            (SobaLabel::Revising, SobaLabel::ReviewRequested),
            (SobaLabel::Done, SobaLabel::Merged),
        ];
        for (from, to) in allowed {
            assert!(validate_transition(from, to), "{from} -> {to}");
        }
    }

    #[test]
    fn reverse_transitions_are_invalid() {
        assert!(!validate_transition(SobaLabel::Queued, SobaLabel::Todo));
        assert!(!validate_transition(SobaLabel::Doing, SobaLabel::Ready));
    }

    #[test]
    fn skip_transitions_are_invalid() {
        assert!(!validate_transition(SobaLabel::Todo, SobaLabel::Planning));
        assert!(!validate_transition(SobaLabel::Ready, SobaLabel::ReviewRequested));
    }

    #[test]
    fn label_classes() {
        assert_eq!(SobaLabel::Todo.class(), LabelClass::Candidate);
        for l in [
            SobaLabel::Queued,
            SobaLabel::Planning,
            SobaLabel::Ready,
            SobaLabel::Doing,
            SobaLabel::Reviewing,
            SobaLabel::Revising,
        ] {
            assert_eq!(l.class(), LabelClass::Active, "{l}");
        }
        for l in [SobaLabel::ReviewRequested, SobaLabel::RequiresChanges] {
            assert_eq!(l.class(), LabelClass::Intermediate, "{l}");
        }
        for l in [SobaLabel::Done, SobaLabel::Merged] {
            assert_eq!(l.class(), LabelClass::Terminal, "{l}");
        }
    }

    #[test]
    fn full_name_has_prefix() {
        assert_eq!(SobaLabel::Todo.full_name(), "soba:todo");
        assert_eq!(SobaLabel::ReviewRequested.full_name(), "soba:review-requested");
    }
}
