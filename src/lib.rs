//! # comprobante
//!
//! Peruvian electronic payment vouchers (SUNAT CPE) end to end: document
//! model and totals, UBL 2.1 generation, enveloped XMLDSig signatures, ZIP
//! packaging, SOAP submission to the billService and CDR processing.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use comprobante::core::*;
//! use rust_decimal_macros::dec;
//!
//! let doc = DocumentBuilder::new(
//!     DocumentType::Invoice,
//!     "F001",
//!     "00000001",
//!     NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
//! )
//! .issuer(PartyBuilder::ruc("20123456789", "EMPRESA DEMO SAC").build())
//! .recipient(PartyBuilder::ruc("20987654321", "CLIENTE SAC").build())
//! .add_line(
//!     LineItemBuilder::new(1, "P001", "Laptop", dec!(2), "NIU", dec!(100))
//!         .tax(TaxType::Igv, dec!(18))
//!         .build(),
//! )
//! .build()
//! .unwrap();
//!
//! let totals = doc.totals.unwrap();
//! assert_eq!(totals.taxed, dec!(200.00));
//! assert_eq!(totals.total_tax, dec!(36.00));
//! assert_eq!(totals.grand_total, dec!(236.00));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Document model, builders, totals, validation, numbering, lifecycle |
//! | `ubl` | UBL 2.1 conversion and serialization, CDR parsing |
//! | `xmldsig` | Canonicalization, RSA-SHA256 signing and verification |
//! | `package` | ZIP + base64 bundles |
//! | `sunat` | billService SOAP client and response mapping |
//! | `pipeline` | Single-document pipeline and batch coordinator |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "ubl")]
pub mod ubl;

#[cfg(feature = "xmldsig")]
pub mod xmldsig;

#[cfg(feature = "package")]
pub mod package;

#[cfg(feature = "sunat")]
pub mod sunat;

#[cfg(feature = "pipeline")]
pub mod pipeline;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
