use log::{debug, warn};

use crate::errors::CoreError;
use crate::models::holding::Holding;
use crate::models::portfolio::{Portfolio, SyncStatus};
use crate::models::settings::SyncFailurePolicy;
use crate::providers::dto::HoldingUpdate;

/// An optimistic change that is applied locally but not yet confirmed.
///
/// Holds the portfolio exactly as it was before the change, so a failed
/// persist can put it back.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChange {
    pub portfolio_id: String,
    snapshot: Portfolio,
}

impl PendingChange {
    /// The portfolio as it was before the change.
    pub fn snapshot(&self) -> &Portfolio {
        &self.snapshot
    }
}

/// How a pending change ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Backend confirmed the change.
    Committed,
    /// Backend failed; the local change was undone.
    RolledBack { reason: String },
    /// Backend failed; the local change was kept and flagged.
    MarkedUnsynced { reason: String },
    /// The portfolio disappeared before the backend answered. Nothing to do.
    Discarded,
}

/// One write against a backend holding row.
#[derive(Debug, Clone, PartialEq)]
pub enum LotWrite {
    Update { id: String, update: HoldingUpdate },
    Delete { id: String },
}

/// Backend writes that bring a holding's rows in line with its new local
/// state, and the row ids the holding keeps once they succeed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LotPlan {
    pub writes: Vec<LotWrite>,
    pub kept: Vec<String>,
}

/// Plan the row writes for a sell, edit or removal of `before`.
///
/// - `after` is `None` (position closed): every row is deleted.
/// - Otherwise the first row is overwritten with the whole position and the
///   other rows are deleted, so the backend holds a single row afterwards.
///
/// A holding with no known rows cannot be written back.
pub fn plan_lot_writes(before: &Holding, after: Option<&Holding>) -> Result<LotPlan, CoreError> {
    let Some((first, rest)) = before.lot_ids.split_first() else {
        return Err(CoreError::HoldingNotPersisted {
            ticker: before.ticker.clone(),
        });
    };

    let deletes = |ids: &[String]| -> Vec<LotWrite> {
        ids.iter()
            .map(|id| LotWrite::Delete { id: id.clone() })
            .collect()
    };

    Ok(match after {
        None => LotPlan {
            writes: deletes(&before.lot_ids),
            kept: Vec::new(),
        },
        Some(holding) => {
            let mut writes = vec![LotWrite::Update {
                id: first.clone(),
                update: HoldingUpdate {
                    shares: Some(holding.shares),
                    avg_price: Some(holding.avg_price),
                },
            }];
            writes.extend(deletes(rest));
            LotPlan {
                writes,
                kept: vec![first.clone()],
            }
        }
    })
}

/// Two-phase commit for optimistic updates.
///
/// 1. [`begin`](Self::begin): snapshot, apply locally, mark `Pending`.
/// 2. Persist through the backend.
/// 3. [`commit`](Self::commit) or [`fail`](Self::fail) according to the result.
pub struct SyncService {
    policy: SyncFailurePolicy,
}

impl SyncService {
    pub fn new(policy: SyncFailurePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SyncFailurePolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: SyncFailurePolicy) {
        self.policy = policy;
    }

    /// Apply `change` to the portfolio with `id` and mark it pending.
    ///
    /// If `change` fails the portfolio is untouched and no pending change is
    /// returned.
    pub fn begin<T, F>(
        &self,
        portfolios: &mut [Portfolio],
        id: &str,
        change: F,
    ) -> Result<(PendingChange, T), CoreError>
    where
        F: FnOnce(&mut Portfolio) -> Result<T, CoreError>,
    {
        let portfolio = portfolios
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| CoreError::PortfolioNotFound(id.to_string()))?;

        let snapshot = portfolio.clone();
        let result = change(portfolio)?;
        portfolio.sync = SyncStatus::Pending;

        Ok((
            PendingChange {
                portfolio_id: id.to_string(),
                snapshot,
            },
            result,
        ))
    }

    /// Backend confirmed the change.
    ///
    /// A portfolio that was already unsynced before this change stays
    /// unsynced: the earlier divergence has not been resolved.
    pub fn commit(&self, portfolios: &mut [Portfolio], pending: PendingChange) -> SyncOutcome {
        let Some(portfolio) = portfolios.iter_mut().find(|p| p.id == pending.portfolio_id) else {
            return SyncOutcome::Discarded;
        };
        portfolio.sync = match pending.snapshot.sync {
            SyncStatus::Unsynced { reason } => SyncStatus::Unsynced { reason },
            _ => SyncStatus::Synced,
        };
        debug!("committed change to portfolio {}", pending.portfolio_id);
        SyncOutcome::Committed
    }

    /// Backend failed to persist the change. Resolve per policy.
    pub fn fail(
        &self,
        portfolios: &mut [Portfolio],
        pending: PendingChange,
        error: &CoreError,
    ) -> SyncOutcome {
        let reason = error.to_string();
        let Some(portfolio) = portfolios.iter_mut().find(|p| p.id == pending.portfolio_id) else {
            return SyncOutcome::Discarded;
        };

        warn!(
            "failed to persist change to portfolio {}: {reason}",
            pending.portfolio_id
        );

        match self.policy {
            SyncFailurePolicy::Rollback => {
                *portfolio = pending.snapshot;
                SyncOutcome::RolledBack { reason }
            }
            SyncFailurePolicy::MarkUnsynced => {
                portfolio.sync = SyncStatus::Unsynced {
                    reason: reason.clone(),
                };
                SyncOutcome::MarkedUnsynced { reason }
            }
        }
    }
}

impl Default for SyncService {
    fn default() -> Self {
        Self::new(SyncFailurePolicy::default())
    }
}
