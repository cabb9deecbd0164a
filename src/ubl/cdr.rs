use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};

use crate::core::CpeError;

/// Business outcome carried by a CDR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CdrStatus {
    /// Response code zero.
    Accepted,
    /// Any other response code.
    Rejected,
    /// No response code present; poll the ticket later.
    Pending,
}

/// Parsed `ApplicationResponse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdrResponse {
    pub status: CdrStatus,
    /// CDR identifier (`cbc:ID`).
    pub id: Option<String>,
    pub response_code: Option<String>,
    /// Human-readable description, kept verbatim.
    pub description: Option<String>,
    /// `{series}-{number}` of the voucher the response refers to.
    pub reference_id: Option<String>,
    /// Observations (`cbc:Note`) attached by the billing service.
    pub notes: Vec<String>,
    pub response_date: Option<NaiveDate>,
    pub response_time: Option<String>,
}

/// Whether a response code means the voucher was accepted.
///
/// The service writes `0` in current CDRs; `0000` appears in older ones.
pub fn is_accepted_code(code: &str) -> bool {
    !code.is_empty() && code.bytes().all(|b| b == b'0')
}

/// Parse a raw `ApplicationResponse` XML document.
///
/// Element prefixes are ignored; only local names are matched. The
/// description and notes are kept verbatim, CDATA sections included.
pub fn parse_cdr(xml: &[u8]) -> Result<CdrResponse, CpeError> {
    let mut reader = Reader::from_reader(xml);

    let mut cdr = CdrResponse {
        status: CdrStatus::Pending,
        id: None,
        response_code: None,
        description: None,
        reference_id: None,
        notes: Vec::new(),
        response_date: None,
        response_time: None,
    };
    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut buf = Vec::new();
    let mut saw_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if path.is_empty() {
                    if name != "ApplicationResponse" {
                        return Err(CpeError::protocol(
                            "CDR",
                            format!("unexpected root element '{name}'"),
                        ));
                    }
                    saw_root = true;
                }
                path.push(name);
                text.clear();
            }
            Ok(Event::Text(ref e)) => {
                let part = e
                    .unescape()
                    .map_err(|e| CpeError::protocol("CDR", format!("bad text: {e}")))?;
                text.push_str(&part);
            }
            Ok(Event::CData(ref e)) => {
                let part = std::str::from_utf8(e)
                    .map_err(|e| CpeError::protocol("CDR", format!("bad CDATA: {e}")))?;
                text.push_str(part);
            }
            Ok(Event::End(_)) => {
                // whitespace-only runs are indentation between tags
                if !text.trim().is_empty() {
                    cdr.handle_text(&path, std::mem::take(&mut text));
                }
                text.clear();
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CpeError::protocol("CDR", format!("XML parse error: {e}")));
            }
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(CpeError::protocol("CDR", "empty application response"));
    }

    cdr.status = match cdr.response_code.as_deref() {
        None => CdrStatus::Pending,
        Some(code) if is_accepted_code(code) => CdrStatus::Accepted,
        Some(_) => CdrStatus::Rejected,
    };
    Ok(cdr)
}

impl CdrResponse {
    /// Identifiers and codes are trimmed; free text is stored as written.
    fn handle_text(&mut self, path: &[String], text: String) {
        let p: Vec<&str> = path.iter().map(String::as_str).collect();
        let token = || text.trim().to_string();
        match p.as_slice() {
            ["ApplicationResponse", "ID"] => self.id = Some(token()),
            ["ApplicationResponse", "ResponseDate"] => {
                self.response_date = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok();
            }
            ["ApplicationResponse", "ResponseTime"] => self.response_time = Some(token()),
            ["ApplicationResponse", "Note"] => self.notes.push(text),
            [.., "DocumentResponse", "Response", "ReferenceID"] => {
                self.reference_id = Some(token())
            }
            [.., "DocumentResponse", "Response", "ResponseCode"] => {
                self.response_code.get_or_insert_with(token);
            }
            [.., "DocumentResponse", "Response", "Description"] => {
                self.description.get_or_insert(text);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cdr_xml(code: &str, description: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ar:ApplicationResponse xmlns:ar="urn:oasis:names:specification:ubl:schema:xsd:ApplicationResponse-2"
    xmlns:cac="urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2"
    xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2">
  <cbc:ID>171234567890</cbc:ID>
  <cbc:ResponseDate>2024-06-15</cbc:ResponseDate>
  <cbc:ResponseTime>10:20:30</cbc:ResponseTime>
  <cbc:Note>4252 - El dato ingresado como atributo @listName es incorrecto</cbc:Note>
  <cac:DocumentResponse>
    <cac:Response>
      <cbc:ReferenceID>F001-00000001</cbc:ReferenceID>
      <cbc:ResponseCode>{code}</cbc:ResponseCode>
      <cbc:Description>{description}</cbc:Description>
    </cac:Response>
  </cac:DocumentResponse>
</ar:ApplicationResponse>"#
        )
    }

    #[test]
    fn accepted_cdr() {
        let cdr = parse_cdr(cdr_xml("0", "La Factura numero F001-00000001, ha sido aceptada").as_bytes())
            .unwrap();
        assert_eq!(cdr.status, CdrStatus::Accepted);
        assert_eq!(cdr.reference_id.as_deref(), Some("F001-00000001"));
        assert_eq!(cdr.id.as_deref(), Some("171234567890"));
        assert_eq!(cdr.notes.len(), 1);
        assert_eq!(cdr.response_date, NaiveDate::from_ymd_opt(2024, 6, 15));
        assert_eq!(cdr.response_time.as_deref(), Some("10:20:30"));
    }

    #[test]
    fn rejected_cdr_keeps_description() {
        let cdr = parse_cdr(cdr_xml("0003", "El XML no contiene el tag &amp; esperado").as_bytes())
            .unwrap();
        assert_eq!(cdr.status, CdrStatus::Rejected);
        assert_eq!(cdr.response_code.as_deref(), Some("0003"));
        assert_eq!(
            cdr.description.as_deref(),
            Some("El XML no contiene el tag & esperado")
        );
    }

    #[test]
    fn description_is_kept_verbatim() {
        let cdr = parse_cdr(cdr_xml(" 2800 ", "  El dato ingresado no cumple  ").as_bytes()).unwrap();
        assert_eq!(cdr.response_code.as_deref(), Some("2800"));
        assert_eq!(cdr.description.as_deref(), Some("  El dato ingresado no cumple  "));

        let cdata = cdr_xml("2017", "<![CDATA[El numero de RUC <20123456789> no existe]]>");
        let cdr = parse_cdr(cdata.as_bytes()).unwrap();
        assert_eq!(cdr.status, CdrStatus::Rejected);
        assert_eq!(
            cdr.description.as_deref(),
            Some("El numero de RUC <20123456789> no existe")
        );
    }

    #[test]
    fn missing_code_is_pending() {
        let xml = r#"<ApplicationResponse><ID>1</ID></ApplicationResponse>"#;
        assert_eq!(parse_cdr(xml.as_bytes()).unwrap().status, CdrStatus::Pending);
    }

    #[test]
    fn wrong_root_rejected() {
        let err = parse_cdr(b"<Invoice/>").unwrap_err();
        assert!(matches!(err, CpeError::Protocol { .. }));
    }

    #[test]
    fn accepted_codes() {
        assert!(is_accepted_code("0"));
        assert!(is_accepted_code("0000"));
        assert!(!is_accepted_code("0003"));
        assert!(!is_accepted_code(""));
    }
}
