use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use rsa::Pkcs1v15Sign;
use sha2::{Digest, Sha256};
use tracing::debug;
use x509_cert::Certificate;
use x509_cert::der::Decode;

use super::algorithms;
use super::c14n::canonicalize;
use super::keys::{KeyMaterial, certificate_public_key};
use super::tree::{self, Element, Node};
use crate::core::CpeError;
use crate::ubl::{SIGNATURE_ID, ns};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Outcome of checking an embedded signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    /// Document digest matches `ds:DigestValue`.
    pub digest_ok: bool,
    /// `ds:SignatureValue` verifies over `ds:SignedInfo` with the embedded
    /// certificate's key.
    pub signature_ok: bool,
    /// The check time falls inside the certificate validity window.
    pub certificate_valid: bool,
    /// `cac:Signature` (when present) points at the signature `Id`.
    pub reference_ok: bool,
    /// Certificate subject (RFC 4514).
    pub subject: String,
}

impl VerificationReport {
    pub fn is_valid(&self) -> bool {
        self.digest_ok && self.signature_ok && self.certificate_valid && self.reference_ok
    }
}

/// Sign a UBL document with an enveloped RSA-SHA256 signature.
///
/// The `ds:Signature` block lands in the first empty
/// `ext:UBLExtension/ext:ExtensionContent`, which is created when missing.
/// Returns the signed document, compact, with a UTF-8 declaration.
pub fn sign(xml: &[u8], key: &KeyMaterial) -> Result<String, CpeError> {
    let mut root = tree::parse(xml)?;
    if find_signature(&root).is_some() {
        return Err(CpeError::Signing("document is already signed".into()));
    }
    signature_slot(&mut root)?;

    let canonical = root.to_bytes();
    let digest_value = Base64::encode_string(&Sha256::digest(&canonical));

    let signed_info = signed_info(&digest_value);
    let signed_info_c14n = canonicalize(&signed_info.to_bytes())?;
    let signature = key
        .private_key()
        .sign(
            Pkcs1v15Sign::new::<Sha256>(),
            &Sha256::digest(&signed_info_c14n),
        )
        .map_err(|e| CpeError::Signing(format!("RSA signing failed: {e}")))?;

    let certificate = Base64::encode_string(&key.certificate_der()?);

    let mut block = Element::new("ds:Signature").with_attr("Id", SIGNATURE_ID);
    if root.attr("xmlns:ds").is_none() {
        block = block.with_attr("xmlns:ds", ns::DS);
    }
    let block = block
        .with_child(signed_info)
        .with_child(Element::new("ds:SignatureValue").with_text(&Base64::encode_string(&signature)))
        .with_child(
            Element::new("ds:KeyInfo").with_child(
                Element::new("ds:X509Data")
                    .with_child(Element::new("ds:X509Certificate").with_text(&certificate)),
            ),
        );

    signature_slot(&mut root)?.children.push(Node::Element(block));

    debug!(
        root = root.local_name(),
        digest = %digest_value,
        "document signed"
    );

    let body = String::from_utf8(root.to_bytes())
        .map_err(|e| CpeError::Signing(format!("signed output is not UTF-8: {e}")))?;
    Ok(format!("{XML_DECLARATION}{body}"))
}

/// Verify an embedded signature against the current time.
pub fn verify(xml: &[u8]) -> Result<bool, CpeError> {
    verify_at(xml, Utc::now()).map(|report| report.is_valid())
}

/// Verify an embedded signature, checking certificate validity at `now`.
///
/// Digest or signature mismatches are reported in the returned
/// [`VerificationReport`]. A missing or malformed signature block, or an
/// unreadable certificate, is a [`CpeError::Verification`].
pub fn verify_at(xml: &[u8], now: DateTime<Utc>) -> Result<VerificationReport, CpeError> {
    let mut root = tree::parse(xml)?;
    let signature = take_signature(&mut root)
        .ok_or_else(|| CpeError::Verification("no ds:Signature block found".into()))?;

    let signed_info = signature
        .child("SignedInfo")
        .ok_or_else(|| missing("SignedInfo"))?;
    let method = signed_info
        .child("SignatureMethod")
        .and_then(|m| m.attr("Algorithm"))
        .ok_or_else(|| missing("SignatureMethod"))?;
    if method != algorithms::RSA_SHA256 {
        return Err(CpeError::Verification(format!(
            "unsupported signature method {method}"
        )));
    }
    let embedded_digest = signed_info
        .find_path(&["Reference", "DigestValue"])
        .ok_or_else(|| missing("DigestValue"))?
        .text();
    let signature_value = signature
        .child("SignatureValue")
        .ok_or_else(|| missing("SignatureValue"))?
        .text();
    let certificate_b64 = signature
        .find_path(&["KeyInfo", "X509Data", "X509Certificate"])
        .ok_or_else(|| missing("X509Certificate"))?
        .text();

    let canonical = root.to_bytes();
    let digest = Base64::encode_string(&Sha256::digest(&canonical));
    let digest_ok = strip_whitespace(&embedded_digest) == digest;

    let cert_der = Base64::decode_vec(&strip_whitespace(&certificate_b64))
        .map_err(|e| CpeError::Verification(format!("certificate base64: {e}")))?;
    let certificate = Certificate::from_der(&cert_der)
        .map_err(|e| CpeError::Verification(format!("certificate: {e}")))?;
    let public_key = certificate_public_key(&certificate)?;

    let signed_info_c14n = canonicalize(&signed_info.to_bytes())?;
    let signature_ok = match Base64::decode_vec(&strip_whitespace(&signature_value)) {
        Ok(sig) => public_key
            .verify(
                Pkcs1v15Sign::new::<Sha256>(),
                &Sha256::digest(&signed_info_c14n),
                &sig,
            )
            .is_ok(),
        Err(_) => false,
    };

    let validity = &certificate.tbs_certificate.validity;
    let not_before = DateTime::<Utc>::from(validity.not_before.to_system_time());
    let not_after = DateTime::<Utc>::from(validity.not_after.to_system_time());
    let certificate_valid = not_before <= now && now <= not_after;

    let reference_ok = match root.find_path(&[
        "Signature",
        "DigitalSignatureAttachment",
        "ExternalReference",
        "URI",
    ]) {
        Some(uri) => signature
            .attr("Id")
            .is_some_and(|id| uri.text() == format!("#{id}")),
        None => true,
    };

    let report = VerificationReport {
        digest_ok,
        signature_ok,
        certificate_valid,
        reference_ok,
        subject: certificate.tbs_certificate.subject.to_string(),
    };
    debug!(
        digest_ok,
        signature_ok,
        certificate_valid,
        reference_ok,
        "signature verified"
    );
    Ok(report)
}

fn signed_info(digest_value: &str) -> Element {
    Element::new("ds:SignedInfo")
        .with_child(Element::new("ds:CanonicalizationMethod").with_attr("Algorithm", algorithms::C14N))
        .with_child(Element::new("ds:SignatureMethod").with_attr("Algorithm", algorithms::RSA_SHA256))
        .with_child(
            Element::new("ds:Reference")
                .with_attr("URI", "")
                .with_child(
                    Element::new("ds:Transforms")
                        .with_child(
                            Element::new("ds:Transform")
                                .with_attr("Algorithm", algorithms::ENVELOPED_SIGNATURE),
                        )
                        .with_child(Element::new("ds:Transform").with_attr("Algorithm", algorithms::C14N)),
                )
                .with_child(Element::new("ds:DigestMethod").with_attr("Algorithm", algorithms::SHA256))
                .with_child(Element::new("ds:DigestValue").with_text(digest_value)),
        )
}

fn missing(what: &str) -> CpeError {
    CpeError::Verification(format!("signature block has no {what}"))
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_ascii_whitespace()).collect()
}

fn prefixed(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{p}:{local}"),
        None => local.to_string(),
    }
}

/// The empty `ExtensionContent` that receives the signature, creating the
/// `UBLExtensions/UBLExtension/ExtensionContent` chain as needed.
fn signature_slot(root: &mut Element) -> Result<&mut Element, CpeError> {
    if root.child("UBLExtensions").is_none() {
        let mut exts = Element::new("ext:UBLExtensions");
        if root.attr("xmlns:ext").is_none() {
            exts = exts.with_attr("xmlns:ext", ns::EXT);
        }
        root.children.insert(0, Node::Element(exts));
    }
    let exts = root
        .child_mut("UBLExtensions")
        .ok_or_else(|| CpeError::Signing("UBLExtensions placeholder missing".into()))?;
    let prefix = exts.name.split_once(':').map(|(p, _)| p.to_string());

    let is_free = |n: &Node| match n {
        Node::Element(ext) => {
            ext.local_name() == "UBLExtension"
                && ext
                    .child("ExtensionContent")
                    .is_none_or(|c| c.children.is_empty())
        }
        _ => false,
    };
    let idx = match exts.children.iter().position(is_free) {
        Some(idx) => idx,
        None => {
            exts.children.push(Node::Element(Element::new(prefixed(
                prefix.as_deref(),
                "UBLExtension",
            ))));
            exts.children.len() - 1
        }
    };
    let Node::Element(ext) = &mut exts.children[idx] else {
        return Err(CpeError::Signing("UBLExtension slot is not an element".into()));
    };
    if ext.child("ExtensionContent").is_none() {
        ext.children.push(Node::Element(Element::new(prefixed(
            prefix.as_deref(),
            "ExtensionContent",
        ))));
    }
    let slot = ext
        .child_mut("ExtensionContent")
        .ok_or_else(|| CpeError::Signing("ExtensionContent placeholder missing".into()))?;
    // Signed output carries the slot as a start/end pair, so the digest does too.
    slot.self_closing = false;
    Ok(slot)
}

fn find_signature(root: &Element) -> Option<&Element> {
    root.child("UBLExtensions")?
        .elements()
        .filter(|e| e.local_name() == "UBLExtension")
        .find_map(|ext| ext.find_path(&["ExtensionContent", "Signature"]))
}

fn take_signature(root: &mut Element) -> Option<Element> {
    root.child_mut("UBLExtensions")?
        .children
        .iter_mut()
        .find_map(|n| match n {
            Node::Element(ext) if ext.local_name() == "UBLExtension" => ext
                .child_mut("ExtensionContent")
                .and_then(|c| c.remove_child("Signature")),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const CERT: &str = include_str!("../../tests/fixtures/signer_cert.pem");
    const KEY: &str = include_str!("../../tests/fixtures/signer_key.pem");

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Invoice xmlns="urn:oasis:names:specification:ubl:schema:xsd:Invoice-2" xmlns:cbc="urn:cbc" xmlns:ds="http://www.w3.org/2000/09/xmldsig#" xmlns:ext="urn:ext">
  <ext:UBLExtensions>
    <ext:UBLExtension>
      <ext:ExtensionContent/>
    </ext:UBLExtension>
  </ext:UBLExtensions>
  <cbc:ID>F001-00000001</cbc:ID>
</Invoice>"#;

    fn key() -> KeyMaterial {
        KeyMaterial::from_pem(CERT, KEY).unwrap()
    }

    fn later() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn signature_lands_in_placeholder() {
        let signed = sign(DOC.as_bytes(), &key()).unwrap();
        assert!(signed.starts_with(XML_DECLARATION));
        let root = tree::parse(signed.as_bytes()).unwrap();
        let sig = root
            .find_path(&["UBLExtensions", "UBLExtension", "ExtensionContent", "Signature"])
            .unwrap();
        assert_eq!(sig.attr("Id"), Some(SIGNATURE_ID));
        // root declares ds already
        assert!(sig.attr("xmlns:ds").is_none());
        assert!(sig.find_path(&["SignedInfo", "Reference", "DigestValue"]).is_some());
    }

    #[test]
    fn sign_then_verify() {
        let signed = sign(DOC.as_bytes(), &key()).unwrap();
        let report = verify_at(signed.as_bytes(), later()).unwrap();
        assert!(report.is_valid(), "{report:?}");
        assert!(report.subject.contains("20123456789"));
    }

    #[test]
    fn placeholder_created_when_missing() {
        let bare = r#"<Invoice xmlns="urn:x"><ID>1</ID></Invoice>"#;
        let signed = sign(bare.as_bytes(), &key()).unwrap();
        let root = tree::parse(signed.as_bytes()).unwrap();
        let first = root.elements().next().unwrap();
        assert_eq!(first.name, "ext:UBLExtensions");
        assert_eq!(first.attr("xmlns:ext"), Some(ns::EXT));
        assert!(verify_at(signed.as_bytes(), later()).unwrap().is_valid());
    }

    #[test]
    fn content_tamper_breaks_digest() {
        let signed = sign(DOC.as_bytes(), &key()).unwrap();
        let tampered = signed.replace("F001-00000001", "F001-00000002");
        let report = verify_at(tampered.as_bytes(), later()).unwrap();
        assert!(!report.digest_ok);
        assert!(report.signature_ok);
        assert!(!report.is_valid());
    }

    #[test]
    fn expired_window_reported() {
        let signed = sign(DOC.as_bytes(), &key()).unwrap();
        let before = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let report = verify_at(signed.as_bytes(), before).unwrap();
        assert!(report.digest_ok && report.signature_ok);
        assert!(!report.certificate_valid);
    }

    #[test]
    fn signing_twice_is_refused() {
        let signed = sign(DOC.as_bytes(), &key()).unwrap();
        let err = sign(signed.as_bytes(), &key()).unwrap_err();
        assert!(matches!(err, CpeError::Signing(_)));
    }

    #[test]
    fn unsigned_document_is_an_error() {
        let err = verify_at(DOC.as_bytes(), later()).unwrap_err();
        assert!(matches!(err, CpeError::Verification(_)));
    }
}
