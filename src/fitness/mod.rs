//! Daily fitness (CTL/ATL/TSB) ledger.

pub mod ledger;
pub mod load;

pub use ledger::{DailyFitnessLedger, FitnessLedger};
pub use load::{DailyLoad, LoadCalculator};
