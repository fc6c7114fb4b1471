//! Wheelhouse - Reservation and settlement core for vehicle rentals
//!
//! Wheelhouse brokers time-bounded rentals between owners and renters,
//! gated by an external payment settlement step. It owns the reservation
//! ledger (conflict-free booking windows), the booking lifecycle state
//! machine, and the idempotent reconciliation of gateway-verified payments.

pub mod availability;
pub mod config;
pub mod ledger;
pub mod lifecycle;
pub mod reservations;
pub mod routes;
pub mod server;
pub mod settlement;
pub mod sweep;
pub mod types;

pub use config::Args;
pub use ledger::Ledger;
pub use reservations::ReservationService;
pub use server::{run, AppState};
pub use settlement::Reconciler;
pub use types::{CoreError, Result};
