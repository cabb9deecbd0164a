//! UBL 2.1 schema mapping, XML serialization and CDR parsing.
//!
//! SUNAT publishes its vouchers as UBL 2.1 documents with the Peruvian
//! customization `2.0`. Facturas and boletas use the `Invoice` shape, notes
//! use `CreditNote` and `DebitNote`.
//!
//! # Example
//!
//! ```no_run
//! use comprobante::core::*;
//! use comprobante::ubl;
//!
//! let doc: Document = todo!(); // build via DocumentBuilder
//! let schema = ubl::convert(&doc).unwrap();
//! let xml = ubl::serialize(&schema).unwrap();
//! ```

mod cdr;
mod convert;
mod schema;
mod serialize;
pub(crate) mod xml_utils;

pub use cdr::{CdrResponse, CdrStatus, is_accepted_code, parse_cdr};
pub use convert::convert;
pub use schema::*;
pub use serialize::{serialize, to_xml};

/// UBL version emitted in `cbc:UBLVersionID`.
pub const UBL_VERSION: &str = "2.1";

/// SUNAT customization emitted in `cbc:CustomizationID`.
pub const CUSTOMIZATION_ID: &str = "2.0";

/// Namespace URIs used by the vouchers and the CDR.
pub mod ns {
    pub const INVOICE: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
    pub const CREDIT_NOTE: &str = "urn:oasis:names:specification:ubl:schema:xsd:CreditNote-2";
    pub const DEBIT_NOTE: &str = "urn:oasis:names:specification:ubl:schema:xsd:DebitNote-2";
    pub const APPLICATION_RESPONSE: &str =
        "urn:oasis:names:specification:ubl:schema:xsd:ApplicationResponse-2";
    pub const CAC: &str =
        "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
    pub const CBC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";
    pub const EXT: &str =
        "urn:oasis:names:specification:ubl:schema:xsd:CommonExtensionComponents-2";
    pub const DS: &str = "http://www.w3.org/2000/09/xmldsig#";
}

/// Catalog 06 scheme URI on party identifiers.
pub(crate) const CATALOG_06_URI: &str = "urn:pe:gob:sunat:cpe:see:gem:catalogos:catalogo06";

/// `Id` of the embedded `ds:Signature`, referenced from `cac:Signature`.
pub const SIGNATURE_ID: &str = "SignatureSP";
