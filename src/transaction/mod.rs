pub mod model;

pub use model::{OutputMap, Transaction, TxInput};
