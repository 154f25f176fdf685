//! Which exit leg closed an armed group.

use crate::domain::shared::Timestamp;
use crate::domain::trade_group::value_objects::{GroupState, LegKind};

/// A filled exit leg as seen in a broker snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegFill {
    /// Fill time, when the broker reports one.
    pub filled_at: Option<Timestamp>,
}

/// The exit that closes an armed group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Take-profit filled first.
    TakeProfit,
    /// Stop-loss filled first, or the race was ambiguous.
    StopLoss,
}

impl ExitOutcome {
    /// The leg that filled.
    #[must_use]
    pub const fn winner(&self) -> LegKind {
        match self {
            Self::TakeProfit => LegKind::TakeProfit,
            Self::StopLoss => LegKind::StopLoss,
        }
    }

    /// The leg that must be cancelled.
    #[must_use]
    pub const fn loser(&self) -> LegKind {
        match self {
            Self::TakeProfit => LegKind::StopLoss,
            Self::StopLoss => LegKind::TakeProfit,
        }
    }

    /// Terminal state the group moves to.
    #[must_use]
    pub const fn closed_state(&self) -> GroupState {
        match self {
            Self::TakeProfit => GroupState::ClosedTp,
            Self::StopLoss => GroupState::ClosedSl,
        }
    }
}

/// Decide the exit from the filled legs, if any.
///
/// When both legs report a fill the earlier `filled_at` wins. Missing or
/// equal timestamps resolve to the stop-loss, the conservative reading.
#[must_use]
pub fn resolve_exit(tp: Option<LegFill>, sl: Option<LegFill>) -> Option<ExitOutcome> {
    match (tp, sl) {
        (None, None) => None,
        (Some(_), None) => Some(ExitOutcome::TakeProfit),
        (None, Some(_)) => Some(ExitOutcome::StopLoss),
        (Some(tp), Some(sl)) => match (tp.filled_at, sl.filled_at) {
            (Some(tp_at), Some(sl_at)) if tp_at < sl_at => Some(ExitOutcome::TakeProfit),
            _ => Some(ExitOutcome::StopLoss),
        },
    }
}
