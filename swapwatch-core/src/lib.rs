#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod entities;
pub mod extract;
pub mod framework;
pub mod ledger;
pub mod notify;
pub mod processors;
