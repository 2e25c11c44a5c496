//! The cutover state machine.
//!
//! States form a strict chain and every event moves exactly one state to the
//! next one. The table is a plain `match`, so adding a state without wiring
//! its event fails to compile instead of failing at runtime.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a migration stands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationPhase {
    /// Created, nothing checked yet
    #[default]
    Uninitialized,
    /// Gateway and cluster link validated, topic set fixed
    Initialized,
    /// Mirror lag is below the threshold
    LagsOk,
    /// Gateway re-checked right before promotion
    Fenced,
    /// Promotion requested for every migration topic
    Promoting,
    /// Every migration topic is a regular topic on the destination
    Promoted,
    /// Gateway route repointed and pods recycled
    Switched,
}

impl MigrationPhase {
    /// Every state, in order of forward progress
    pub const ALL: [MigrationPhase; 7] = [
        MigrationPhase::Uninitialized,
        MigrationPhase::Initialized,
        MigrationPhase::LagsOk,
        MigrationPhase::Fenced,
        MigrationPhase::Promoting,
        MigrationPhase::Promoted,
        MigrationPhase::Switched,
    ];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationPhase::Uninitialized => "uninitialized",
            MigrationPhase::Initialized => "initialized",
            MigrationPhase::LagsOk => "lags_ok",
            MigrationPhase::Fenced => "fenced",
            MigrationPhase::Promoting => "promoting",
            MigrationPhase::Promoted => "promoted",
            MigrationPhase::Switched => "switched",
        }
    }

    /// Whether `event` may fire from this state
    pub fn can(&self, event: MigrationEvent) -> bool {
        transition(*self, event).is_some()
    }

    /// Whether there is nothing left to do
    pub fn is_terminal(&self) -> bool {
        *self == MigrationPhase::Switched
    }
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that moves a migration forward
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationEvent {
    /// `uninitialized -> initialized`
    Initialize,
    /// `initialized -> lags_ok`
    WaitForLags,
    /// `lags_ok -> fenced`
    Fence,
    /// `fenced -> promoting`
    Promote,
    /// `promoting -> promoted`
    WaitForPromotionCompletion,
    /// `promoted -> switched`
    Switch,
}

impl MigrationEvent {
    /// The order `execute` fires events in
    pub const SEQUENCE: [MigrationEvent; 6] = [
        MigrationEvent::Initialize,
        MigrationEvent::WaitForLags,
        MigrationEvent::Fence,
        MigrationEvent::Promote,
        MigrationEvent::WaitForPromotionCompletion,
        MigrationEvent::Switch,
    ];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationEvent::Initialize => "initialize",
            MigrationEvent::WaitForLags => "wait_for_lags",
            MigrationEvent::Fence => "fence",
            MigrationEvent::Promote => "promote",
            MigrationEvent::WaitForPromotionCompletion => "wait_for_promotion_completion",
            MigrationEvent::Switch => "switch",
        }
    }

    /// Name used in "failed during <step>" errors
    pub fn step_name(&self) -> &'static str {
        match self {
            MigrationEvent::Initialize => "initializing migration",
            MigrationEvent::WaitForLags => "checking lags",
            MigrationEvent::Fence => "fencing gateway",
            MigrationEvent::Promote => "promoting topics",
            MigrationEvent::WaitForPromotionCompletion => "waiting for promotion completion",
            MigrationEvent::Switch => "switching gateway",
        }
    }
}

impl fmt::Display for MigrationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transition table. `None` means the event is not valid from `from`.
pub fn transition(from: MigrationPhase, event: MigrationEvent) -> Option<MigrationPhase> {
    use MigrationEvent as E;
    use MigrationPhase as P;

    match (from, event) {
        (P::Uninitialized, E::Initialize) => Some(P::Initialized),
        (P::Initialized, E::WaitForLags) => Some(P::LagsOk),
        (P::LagsOk, E::Fence) => Some(P::Fenced),
        (P::Fenced, E::Promote) => Some(P::Promoting),
        (P::Promoting, E::WaitForPromotionCompletion) => Some(P::Promoted),
        (P::Promoted, E::Switch) => Some(P::Switched),
        _ => None,
    }
}
