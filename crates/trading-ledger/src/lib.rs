pub mod ledger;
pub mod models;

#[cfg(test)]
mod tests;

pub use ledger::*;
pub use models::*;
