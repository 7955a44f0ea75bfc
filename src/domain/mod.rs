//! Domain layer: payment and ledger types plus the ports the application layer drives.

pub mod ledger;
pub mod money;
pub mod payment;
pub mod ports;
pub mod resource;
