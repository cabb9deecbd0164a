//! ZIP + base64 bundles for the billing service.
//!
//! A signed voucher travels as a ZIP archive holding exactly one XML entry,
//! named after the document identifier (`{ruc}-{type}-{series}-{number}`).
//! The service answers with a CDR packed the same way.
//!
//! # Example
//!
//! ```no_run
//! use comprobante::package;
//!
//! let signed_xml = std::fs::read("20123456789-01-F001-00000001.xml").unwrap();
//! let bundle = package::pack(&signed_xml, "20123456789-01-F001-00000001").unwrap();
//! assert_eq!(bundle.file_name, "20123456789-01-F001-00000001.zip");
//! ```

mod archive;
mod bundle;

pub use archive::{is_zip, unpack};
pub use bundle::{SignedDocumentPackage, pack, validate_package};

/// Largest uncompressed XML entry the service accepts.
pub const MAX_ENTRY_SIZE: u64 = 10 * 1024 * 1024;
