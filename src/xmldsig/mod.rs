//! Enveloped XMLDSig signatures over UBL vouchers.
//!
//! Signing works on a parsed node tree rather than on the raw text: the
//! signature block is inserted into the `ext:ExtensionContent` placeholder
//! and both digests are taken over the simplified canonical form produced
//! by [`canonicalize`].
//!
//! The canonical form is a deterministic subset of C14N 1.0 (declaration,
//! comments and whitespace-only text removed; attributes, namespace
//! declarations and escaping left as written). It is not W3C compliant.

mod c14n;
mod keys;
mod sign;
pub mod tree;

pub use c14n::canonicalize;
pub use keys::{KeyMaterial, KeyProvider, PemKeyProvider};
pub use sign::{VerificationReport, sign, verify, verify_at};

/// Algorithm URIs written into `ds:SignedInfo`.
pub mod algorithms {
    pub const C14N: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
    pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
    pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
    pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
}
