#![cfg(all(feature = "xmldsig", feature = "ubl"))]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use comprobante::core::*;
use comprobante::ubl;
use comprobante::xmldsig::{KeyMaterial, KeyProvider, PemKeyProvider, canonicalize, sign, verify_at};
use rust_decimal_macros::dec;

const CERT: &str = include_str!("fixtures/signer_cert.pem");
const KEY: &str = include_str!("fixtures/signer_key.pem");
const OTHER_CERT: &str = include_str!("fixtures/other_cert.pem");
const OTHER_KEY: &str = include_str!("fixtures/other_key.pem");

fn key() -> KeyMaterial {
    KeyMaterial::from_pem(CERT, KEY).unwrap()
}

fn in_validity() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
}

fn unsigned_xml() -> String {
    let doc = DocumentBuilder::new(
        DocumentType::Invoice,
        "F001",
        "00000001",
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
    )
    .issuer(PartyBuilder::ruc("20123456789", "EMPRESA DEMO SAC").build())
    .recipient(PartyBuilder::ruc("20987654321", "CLIENTE SAC").build())
    .add_line(
        LineItemBuilder::new(1, "P001", "Laptop", dec!(2), "NIU", dec!(100))
            .tax(TaxType::Igv, dec!(18))
            .build(),
    )
    .build()
    .unwrap();
    ubl::to_xml(&doc).unwrap()
}

#[test]
fn signed_invoice_verifies() {
    let signed = sign(unsigned_xml().as_bytes(), &key()).unwrap();

    assert!(signed.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(signed.contains(r#"<ds:Signature Id="SignatureSP">"#));
    assert!(signed.contains("<ds:X509Certificate>"));

    let report = verify_at(signed.as_bytes(), in_validity()).unwrap();
    assert!(report.digest_ok);
    assert!(report.signature_ok);
    assert!(report.certificate_valid);
    assert!(report.reference_ok);
    assert!(report.subject.contains("20123456789"));
}

#[test]
fn signature_sits_in_extension_content() {
    let signed = sign(unsigned_xml().as_bytes(), &key()).unwrap();
    let content = signed.find("<ext:ExtensionContent>").unwrap();
    let sig = signed.find("<ds:Signature").unwrap();
    let version = signed.find("<cbc:UBLVersionID>").unwrap();
    assert!(content < sig && sig < version);
}

#[test]
fn signing_twice_is_refused() {
    let signed = sign(unsigned_xml().as_bytes(), &key()).unwrap();
    assert!(matches!(sign(signed.as_bytes(), &key()), Err(CpeError::Signing(_))));
}

#[test]
fn tampered_amount_breaks_digest() {
    let signed = sign(unsigned_xml().as_bytes(), &key()).unwrap();
    let tampered = signed.replace(">236.00<", ">1.00<");
    assert_ne!(tampered, signed);

    let report = verify_at(tampered.as_bytes(), in_validity()).unwrap();
    assert!(!report.digest_ok);
    assert!(!report.is_valid());
}

#[test]
fn tampered_signed_info_breaks_signature() {
    let signed = sign(unsigned_xml().as_bytes(), &key()).unwrap();
    let start = signed.find("<ds:DigestValue>").unwrap() + "<ds:DigestValue>".len();
    let mut bytes = signed.into_bytes();
    bytes[start] = if bytes[start] == b'A' { b'B' } else { b'A' };

    let report = verify_at(&bytes, in_validity()).unwrap();
    assert!(!report.signature_ok);
    assert!(!report.is_valid());
}

#[test]
fn certificate_outside_validity() {
    let signed = sign(unsigned_xml().as_bytes(), &key()).unwrap();
    let before = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let report = verify_at(signed.as_bytes(), before).unwrap();
    assert!(report.digest_ok);
    assert!(report.signature_ok);
    assert!(!report.certificate_valid);
}

#[test]
fn unsigned_document_is_an_error() {
    let err = verify_at(unsigned_xml().as_bytes(), in_validity()).unwrap_err();
    assert!(matches!(err, CpeError::Verification(_)));
}

#[test]
fn mismatched_key_pair_rejected() {
    assert!(matches!(
        KeyMaterial::from_pem(CERT, OTHER_KEY),
        Err(CpeError::KeyLoad(_))
    ));
    assert!(KeyMaterial::from_pem(OTHER_CERT, OTHER_KEY).is_ok());
}

#[test]
fn provider_loads_from_disk() {
    let dir = env!("CARGO_MANIFEST_DIR");
    let provider = PemKeyProvider::new(
        format!("{dir}/tests/fixtures/signer_cert.pem"),
        format!("{dir}/tests/fixtures/signer_key.pem"),
    );
    let material = provider.load().unwrap();
    let signed = sign(unsigned_xml().as_bytes(), &material).unwrap();
    assert!(verify_at(signed.as_bytes(), in_validity()).unwrap().is_valid());
}

#[test]
fn canonical_form_drops_formatting() {
    let pretty = unsigned_xml();
    let c1 = canonicalize(pretty.as_bytes()).unwrap();
    let text = String::from_utf8(c1.clone()).unwrap();
    assert!(!text.starts_with("<?xml"));
    assert!(!text.contains("\n  <"));
    assert_eq!(canonicalize(&c1).unwrap(), c1);
}
