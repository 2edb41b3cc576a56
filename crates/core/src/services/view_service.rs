use log::debug;

use crate::models::portfolio::Portfolio;
use crate::models::view::{RefreshTicket, ViewState};

/// List ↔ detail state of the portfolio page.
///
/// ```text
///   List --select(id)--> Detail(id)
///   Detail --back------> List
///   Detail(id) --delete(id)--> List
/// ```
///
/// Every transition bumps an epoch. A fetch started for one view carries the
/// ticket it was issued, and its result is only applied while
/// [`ViewCoordinator::is_current`] still holds.
#[derive(Debug, Default)]
pub struct ViewCoordinator {
    state: ViewState,
    epoch: u64,
}

impl ViewCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn active_id(&self) -> Option<&str> {
        self.state.active_id()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Open a portfolio's detail view.
    ///
    /// An id that is not among `portfolios` falls back to the list.
    pub fn select(&mut self, id: &str, portfolios: &[Portfolio]) -> RefreshTicket {
        let next = if portfolios.iter().any(|p| p.id == id) {
            ViewState::Detail {
                active_id: id.to_string(),
            }
        } else {
            debug!("select: portfolio {id} not loaded, staying on list");
            ViewState::List
        };
        self.transition(next)
    }

    /// Return to the list view.
    pub fn back(&mut self) -> RefreshTicket {
        self.transition(ViewState::List)
    }

    /// Notify that a portfolio was deleted. Leaves detail if it was the active one.
    pub fn on_deleted(&mut self, id: &str) -> Option<RefreshTicket> {
        if self.active_id() == Some(id) {
            Some(self.transition(ViewState::List))
        } else {
            None
        }
    }

    /// Drop back to the list if the active portfolio vanished (e.g., after a
    /// reload from the backend).
    pub fn revalidate(&mut self, portfolios: &[Portfolio]) -> Option<RefreshTicket> {
        let active = self.active_id()?;
        if portfolios.iter().any(|p| p.id == active) {
            None
        } else {
            Some(self.transition(ViewState::List))
        }
    }

    /// Whether a result fetched under `ticket` may still be applied.
    pub fn is_current(&self, ticket: &RefreshTicket) -> bool {
        ticket.epoch == self.epoch && ticket.target == self.state
    }

    /// Ticket for the view as it stands, without transitioning.
    pub fn current_ticket(&self) -> RefreshTicket {
        RefreshTicket {
            epoch: self.epoch,
            target: self.state.clone(),
        }
    }

    fn transition(&mut self, next: ViewState) -> RefreshTicket {
        self.epoch += 1;
        self.state = next;
        self.current_ticket()
    }
}
