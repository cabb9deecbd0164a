use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::MAX_ENTRY_SIZE;
use super::archive::{entries, unpack, write_single};
use crate::core::CpeError;

/// Signed voucher ready for `sendBill`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedDocumentPackage {
    /// `{document id}.zip`, sent as `fileName`.
    pub file_name: String,
    pub zip: Vec<u8>,
    /// Standard base64 of `zip`, sent as `contentFile`.
    pub base64: String,
    /// The signed XML held in the single entry.
    pub xml: Vec<u8>,
}

impl SignedDocumentPackage {
    /// Name of the XML entry inside the archive.
    pub fn entry_name(&self) -> String {
        format!("{}.xml", stem(&self.file_name))
    }
}

fn stem(name: &str) -> &str {
    name.strip_suffix(".zip")
        .or_else(|| name.strip_suffix(".xml"))
        .unwrap_or(name)
}

/// Zip a signed document under `{document_id}.xml`, base64 it and check
/// the result with [`validate_package`].
pub fn pack(signed_xml: &[u8], document_id: &str) -> Result<SignedDocumentPackage, CpeError> {
    let id = stem(document_id.trim());
    if id.is_empty() {
        return Err(CpeError::packaging("fileName", "document id is empty"));
    }
    if signed_xml.is_empty() {
        return Err(CpeError::packaging("xml", "signed XML is empty"));
    }

    let zip = write_single(&format!("{id}.xml"), signed_xml)?;
    let base64 = Base64::encode_string(&zip);
    let package = SignedDocumentPackage {
        file_name: format!("{id}.zip"),
        zip,
        base64,
        xml: signed_xml.to_vec(),
    };
    validate_package(&package)?;

    debug!(
        document_id = id,
        zip_bytes = package.zip.len(),
        xml_bytes = package.xml.len(),
        "package built"
    );
    Ok(package)
}

/// Check a bundle before it is sent.
///
/// Every failure is a [`CpeError::Packaging`] whose `field` names what is
/// missing or inconsistent: `fileName`, `zip`, `xml`, `base64` or `entry`.
pub fn validate_package(package: &SignedDocumentPackage) -> Result<(), CpeError> {
    if package.file_name.trim().is_empty() {
        return Err(CpeError::packaging("fileName", "is empty"));
    }
    if package.zip.is_empty() {
        return Err(CpeError::packaging("zip", "is empty"));
    }
    if package.xml.is_empty() {
        return Err(CpeError::packaging("xml", "is empty"));
    }
    if package.base64.is_empty() {
        return Err(CpeError::packaging("base64", "is empty"));
    }

    let decoded = Base64::decode_vec(&package.base64)
        .map_err(|e| CpeError::packaging("base64", format!("not valid base64: {e}")))?;
    if decoded != package.zip {
        return Err(CpeError::packaging("base64", "does not decode to the ZIP bytes"));
    }

    let files = entries(&package.zip)?;
    let [(name, size)] = files.as_slice() else {
        return Err(CpeError::packaging(
            "entry",
            format!("expected exactly one file, found {}", files.len()),
        ));
    };
    if !name.to_ascii_lowercase().ends_with(".xml") {
        return Err(CpeError::packaging("entry", format!("{name} is not an .xml file")));
    }
    if *size > MAX_ENTRY_SIZE {
        return Err(CpeError::packaging(
            "entry",
            format!("{name} is {size} bytes, limit is {MAX_ENTRY_SIZE}"),
        ));
    }

    let (_, content) = unpack(&package.zip)?;
    if content != package.xml {
        return Err(CpeError::packaging("xml", "does not match the ZIP entry"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "20123456789-01-F001-00000001";
    const XML: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?><Invoice></Invoice>";

    fn field_of(err: CpeError) -> String {
        match err {
            CpeError::Packaging { field, .. } => field,
            other => panic!("expected packaging error, got {other:?}"),
        }
    }

    #[test]
    fn pack_names_and_encodes() {
        let pkg = pack(XML, ID).unwrap();
        assert_eq!(pkg.file_name, format!("{ID}.zip"));
        assert_eq!(pkg.entry_name(), format!("{ID}.xml"));
        assert_eq!(Base64::decode_vec(&pkg.base64).unwrap(), pkg.zip);
        let (name, content) = unpack(&pkg.zip).unwrap();
        assert_eq!(name, format!("{ID}.xml"));
        assert_eq!(content, XML);
    }

    #[test]
    fn suffix_on_id_is_not_doubled() {
        let pkg = pack(XML, &format!("{ID}.xml")).unwrap();
        assert_eq!(pkg.file_name, format!("{ID}.zip"));
    }

    #[test]
    fn empty_inputs_name_the_field() {
        assert_eq!(field_of(pack(XML, "  ").unwrap_err()), "fileName");
        assert_eq!(field_of(pack(b"", ID).unwrap_err()), "xml");
    }

    #[test]
    fn validation_names_the_field() {
        let good = pack(XML, ID).unwrap();

        let mut p = good.clone();
        p.file_name.clear();
        assert_eq!(field_of(validate_package(&p).unwrap_err()), "fileName");

        let mut p = good.clone();
        p.zip.clear();
        assert_eq!(field_of(validate_package(&p).unwrap_err()), "zip");

        let mut p = good.clone();
        p.base64.clear();
        assert_eq!(field_of(validate_package(&p).unwrap_err()), "base64");

        let mut p = good.clone();
        p.base64 = Base64::encode_string(b"something else");
        assert_eq!(field_of(validate_package(&p).unwrap_err()), "base64");

        let mut p = good.clone();
        p.xml = b"<Other/>".to_vec();
        assert_eq!(field_of(validate_package(&p).unwrap_err()), "xml");
    }

    #[test]
    fn non_xml_entry_rejected() {
        let zip = write_single("readme.txt", b"hello").unwrap();
        let p = SignedDocumentPackage {
            file_name: "x.zip".into(),
            base64: Base64::encode_string(&zip),
            zip,
            xml: b"hello".to_vec(),
        };
        assert_eq!(field_of(validate_package(&p).unwrap_err()), "entry");
    }
}
