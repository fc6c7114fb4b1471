//! Settlement layer for Wheelhouse
//!
//! Drives the payment round trip with the external gateway and converts a
//! verified payment into a durable ledger effect exactly once per token.
//!
//! ## Flow
//!
//! 1. `initiate` passes the dedup/rate gate, asks the gateway for a token,
//!    and registers a settlement binding.
//! 2. The client completes payment on the gateway's hosted page and returns
//!    with the token.
//! 3. `reconcile` verifies the token against the gateway's lookup endpoint
//!    and applies the effect (asset PAID / booking CONFIRMED) at most once.
//!    Retried reconciliations replay the stored success without another
//!    gateway query.

pub mod gateway;
pub mod guard;
pub mod reconciler;

pub use gateway::{
    GatewayStatus, HttpGateway, InitiateRequest, InitiateResponse, LookupResponse,
    SettlementGateway, StubGateway,
};
pub use guard::{fingerprint, AttemptGuard, AttemptStatus, GuardConfig, GuardStats};
pub use reconciler::{
    InitiateSettlementRequest, InitiatedSettlement, Reconciler, SettlementOutcome, SettlementState,
};
