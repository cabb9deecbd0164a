use super::tree;
use crate::core::CpeError;

/// Reduce an XML document to its simplified canonical form.
///
/// Drops the XML declaration, comments, processing instructions, the
/// doctype and whitespace-only text between elements. Everything inside
/// tags is left as written, including attribute order and quoting, namespace
/// declarations and `<a/>` forms. Character escaping is untouched.
///
/// Idempotent: `canonicalize(&canonicalize(x)?)? == canonicalize(x)?`.
pub fn canonicalize(xml: &[u8]) -> Result<Vec<u8>, CpeError> {
    Ok(tree::parse(xml)?.to_bytes())
}
