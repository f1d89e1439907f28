// ABOUTME: Diagnostics - basin mass-balance ledger and fatal/warning reporter
pub mod mass_balance;
pub mod report;

pub use mass_balance::BasinLedger;
pub use report::{report_fatal, report_warning};
