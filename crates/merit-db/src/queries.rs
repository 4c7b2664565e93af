//! Database query functions organized by domain.

pub mod investments;
pub mod ledger;
pub mod publications;
pub mod quota;
pub mod tappalka;
pub mod votes;
pub mod wallets;
