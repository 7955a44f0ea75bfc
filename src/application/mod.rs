//! Application layer: the verification pipeline.
//!
//! `poller` is a generic retry engine with no knowledge of payments.
//! `orchestrator` drives one contribution through initiation, the gateway charge,
//! server verification and reconciliation, and hands the caller a lazy sequence
//! of lifecycle states. `reconciler` is the only writer of payment fields in the
//! ledger cache.

pub mod orchestrator;
pub mod poller;
pub mod reconciler;
