//! Document model, totals, validation and numbering.
//!
//! The types here describe a SUNAT electronic payment voucher (factura,
//! boleta, credit and debit notes) independently of its UBL rendering.

mod builder;
mod error;
mod lifecycle;
mod numbering;
mod totals;
mod types;
pub mod units;
mod validation;

pub use builder::*;
pub use error::*;
pub use lifecycle::*;
pub use numbering::*;
pub use totals::calculate_totals;
pub use types::*;
pub use units::is_known_unit_code;
pub use validation::*;
