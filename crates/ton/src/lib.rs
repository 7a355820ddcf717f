//! Chain primitives for building and addressing TON contracts: the cell
//! model with its representation hash, bag-of-cells serialization, account
//! addresses, and the wallet v3 contract used to fund deployments.

pub mod address;
pub mod boc;
pub mod cell;
pub mod coins;
pub mod state_init;
pub mod wallet;

pub use {
    address::Address,
    cell::{Cell, CellBuilder},
    coins::Nano,
};
