use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::CpeError;
use crate::package::{is_zip, unpack};
use crate::ubl::{CdrResponse, CdrStatus, is_accepted_code, parse_cdr};

/// Result of `sendBill`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    /// The exchange completed and the voucher was not rejected.
    pub success: bool,
    pub http_status: u16,
    pub status: CdrStatus,
    pub ticket: Option<String>,
    /// Decoded `applicationResponse` payload (usually a ZIP).
    pub cdr: Option<Vec<u8>>,
    pub cdr_response: Option<CdrResponse>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Result of `getStatus`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusOutcome {
    pub status_code: String,
    pub status: CdrStatus,
    pub cdr: Option<Vec<u8>>,
    pub cdr_response: Option<CdrResponse>,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Result of `getStatusCdr`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdrOutcome {
    pub status_code: Option<String>,
    pub status: CdrStatus,
    pub cdr: Option<Vec<u8>>,
    pub cdr_response: Option<CdrResponse>,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// First child of `Body` plus the text of every leaf below it, keyed by
/// local name.
#[derive(Debug, Default)]
struct SoapReply {
    operation: String,
    fields: Vec<(String, String)>,
}

impl SoapReply {
    fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }
}

fn soap_err(message: impl Into<String>) -> CpeError {
    CpeError::protocol("SOAP", message)
}

fn parse_envelope(xml: &[u8]) -> Result<SoapReply, CpeError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut reply = SoapReply::default();
    let mut body_depth: Option<usize> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if body_depth.is_some_and(|d| path.len() == d + 1) && reply.operation.is_empty() {
                    reply.operation = name.clone();
                }
                if name == "Body" && body_depth.is_none() {
                    body_depth = Some(path.len());
                }
                path.push(name);
            }
            Ok(Event::Empty(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if body_depth.is_some_and(|d| path.len() == d + 1) && reply.operation.is_empty() {
                    reply.operation = name;
                }
            }
            Ok(Event::Text(ref e)) => {
                if body_depth.is_some_and(|d| path.len() > d + 1) {
                    let text = e
                        .unescape()
                        .map_err(|e| soap_err(format!("bad text: {e}")))?
                        .into_owned();
                    if let Some(leaf) = path.last() {
                        reply.fields.push((leaf.clone(), text));
                    }
                }
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(soap_err(format!("XML parse error: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    if body_depth.is_none() {
        return Err(soap_err("response has no SOAP Body"));
    }
    Ok(reply)
}

/// Parse a reply, turning a `Fault` into [`CpeError::Protocol`] and any
/// non-2xx status without a fault into a protocol error as well.
fn checked_reply(http_status: u16, body: &[u8], expected: &str) -> Result<SoapReply, CpeError> {
    let reply = match parse_envelope(body) {
        Ok(reply) => reply,
        Err(_) if !(200..300).contains(&http_status) => {
            return Err(CpeError::protocol(
                format!("HTTP {http_status}"),
                String::from_utf8_lossy(body).chars().take(512).collect::<String>(),
            ));
        }
        Err(e) => return Err(e),
    };

    if reply.operation == "Fault" {
        let code = reply.get("faultcode").unwrap_or("Fault").to_string();
        let message = reply.get("faultstring").unwrap_or_default().to_string();
        debug!(fault_code = %code, "SOAP fault received");
        return Err(CpeError::protocol(code, message));
    }
    if !(200..300).contains(&http_status) {
        return Err(CpeError::protocol(
            format!("HTTP {http_status}"),
            format!("unexpected status with '{}' body", reply.operation),
        ));
    }
    if reply.operation != expected {
        return Err(soap_err(format!(
            "expected {expected}, got '{}'",
            reply.operation
        )));
    }
    Ok(reply)
}

/// Decode a base64 CDR payload (ZIP or raw `ApplicationResponse`).
///
/// Returns the decoded payload and the parsed response.
pub fn decode_cdr(encoded: &str) -> Result<(Vec<u8>, CdrResponse), CpeError> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let payload = Base64::decode_vec(&compact)
        .map_err(|e| CpeError::protocol("CDR", format!("payload is not base64: {e}")))?;
    let cdr = if is_zip(&payload) {
        let (_, xml) = unpack(&payload)?;
        parse_cdr(&xml)?
    } else {
        parse_cdr(&payload)?
    };
    Ok((payload, cdr))
}

fn cdr_message(cdr: Option<&CdrResponse>, fallback: &str) -> String {
    cdr.and_then(|c| c.description.clone())
        .unwrap_or_else(|| fallback.to_string())
}

/// Map a `sendBill` reply.
pub fn process_send_bill(http_status: u16, body: &[u8]) -> Result<SubmissionOutcome, CpeError> {
    let reply = checked_reply(http_status, body, "sendBillResponse")?;

    let (cdr, cdr_response) = match reply.get("applicationResponse") {
        Some(encoded) => {
            let (payload, parsed) = decode_cdr(encoded)?;
            (Some(payload), Some(parsed))
        }
        None => (None, None),
    };
    let status = cdr_response
        .as_ref()
        .map_or(CdrStatus::Pending, |c| c.status);
    let message = cdr_message(
        cdr_response.as_ref(),
        match status {
            CdrStatus::Pending => "received, awaiting CDR",
            CdrStatus::Accepted => "accepted",
            CdrStatus::Rejected => "rejected",
        },
    );

    Ok(SubmissionOutcome {
        success: status != CdrStatus::Rejected,
        http_status,
        status,
        ticket: reply.get("ticket").map(str::to_string),
        cdr,
        cdr_response,
        message,
        timestamp: Utc::now(),
    })
}

/// Map a `getStatus` reply.
///
/// Status code `98` means the ticket is still being processed. A CDR in
/// `content` decides the outcome when present.
pub fn process_status(http_status: u16, body: &[u8]) -> Result<StatusOutcome, CpeError> {
    let reply = checked_reply(http_status, body, "getStatusResponse")?;
    let status_code = reply.get("statusCode").unwrap_or_default().to_string();

    let (cdr, cdr_response) = match reply.get("content") {
        Some(encoded) => {
            let (payload, parsed) = decode_cdr(encoded)?;
            (Some(payload), Some(parsed))
        }
        None => (None, None),
    };
    let status = match (&cdr_response, status_code.as_str()) {
        (Some(c), _) => c.status,
        (None, "98") | (None, "") => CdrStatus::Pending,
        (None, code) if is_accepted_code(code) => CdrStatus::Accepted,
        (None, _) => CdrStatus::Rejected,
    };

    Ok(StatusOutcome {
        message: cdr_response
            .as_ref()
            .and_then(|c| c.description.clone())
            .or_else(|| reply.get("statusMessage").map(str::to_string)),
        status_code,
        status,
        cdr,
        cdr_response,
        timestamp: Utc::now(),
    })
}

/// Map a `getStatusCdr` reply.
pub fn process_cdr(http_status: u16, body: &[u8]) -> Result<CdrOutcome, CpeError> {
    let reply = checked_reply(http_status, body, "getStatusCdrResponse")?;

    let (cdr, cdr_response) = match reply.get("content") {
        Some(encoded) => {
            let (payload, parsed) = decode_cdr(encoded)?;
            (Some(payload), Some(parsed))
        }
        None => (None, None),
    };

    Ok(CdrOutcome {
        status_code: reply.get("statusCode").map(str::to_string),
        status: cdr_response
            .as_ref()
            .map_or(CdrStatus::Pending, |c| c.status),
        message: reply
            .get("statusMessage")
            .map(str::to_string)
            .or_else(|| cdr_response.as_ref().and_then(|c| c.description.clone())),
        cdr,
        cdr_response,
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<soap-env:Envelope xmlns:soap-env="http://schemas.xmlsoap.org/soap/envelope/">
  <soap-env:Header/>
  <soap-env:Body>{body}</soap-env:Body>
</soap-env:Envelope>"#
        )
    }

    fn cdr_b64(code: &str, description: &str) -> String {
        let xml = format!(
            r#"<ar:ApplicationResponse xmlns:ar="urn:ar" xmlns:cac="urn:cac" xmlns:cbc="urn:cbc">
<cac:DocumentResponse><cac:Response><cbc:ReferenceID>F001-1</cbc:ReferenceID>
<cbc:ResponseCode>{code}</cbc:ResponseCode><cbc:Description>{description}</cbc:Description>
</cac:Response></cac:DocumentResponse></ar:ApplicationResponse>"#
        );
        Base64::encode_string(xml.as_bytes())
    }

    #[test]
    fn accepted_send_bill() {
        let body = envelope(&format!(
            "<br:sendBillResponse xmlns:br=\"http://service.sunat.gob.pe\"><applicationResponse>{}</applicationResponse></br:sendBillResponse>",
            cdr_b64("0000", "La Factura numero F001-1, ha sido aceptada")
        ));
        let outcome = process_send_bill(200, body.as_bytes()).unwrap();
        assert_eq!(outcome.status, CdrStatus::Accepted);
        assert!(outcome.success);
        assert!(outcome.cdr.is_some());
        assert_eq!(outcome.message, "La Factura numero F001-1, ha sido aceptada");
    }

    #[test]
    fn rejected_send_bill_keeps_description() {
        let body = envelope(&format!(
            "<sendBillResponse><applicationResponse>{}</applicationResponse></sendBillResponse>",
            cdr_b64("0003", "El XML no cumple con el esquema")
        ));
        let outcome = process_send_bill(200, body.as_bytes()).unwrap();
        assert_eq!(outcome.status, CdrStatus::Rejected);
        assert!(!outcome.success);
        assert_eq!(outcome.message, "El XML no cumple con el esquema");
    }

    #[test]
    fn ticket_without_cdr_is_pending() {
        let body = envelope("<sendBillResponse><ticket>1700000000001</ticket></sendBillResponse>");
        let outcome = process_send_bill(200, body.as_bytes()).unwrap();
        assert_eq!(outcome.status, CdrStatus::Pending);
        assert_eq!(outcome.ticket.as_deref(), Some("1700000000001"));
        assert!(outcome.cdr.is_none());
    }

    #[test]
    fn fault_is_protocol_error() {
        let body = envelope(
            "<soap-env:Fault><faultcode>soap-env:Client.0151</faultcode><faultstring>El nombre del archivo ZIP es incorrecto</faultstring></soap-env:Fault>",
        );
        let err = process_send_bill(500, body.as_bytes()).unwrap_err();
        match err {
            CpeError::Protocol { code, message } => {
                assert_eq!(code, "soap-env:Client.0151");
                assert_eq!(message, "El nombre del archivo ZIP es incorrecto");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!CpeError::protocol("x", "y").is_retryable());
    }

    #[test]
    fn non_xml_error_status() {
        let err = process_send_bill(503, b"Service Unavailable").unwrap_err();
        assert!(matches!(err, CpeError::Protocol { ref code, .. } if code == "HTTP 503"));
    }

    #[test]
    fn status_in_progress() {
        let body = envelope("<getStatusResponse><status><statusCode>98</statusCode></status></getStatusResponse>");
        let outcome = process_status(200, body.as_bytes()).unwrap();
        assert_eq!(outcome.status_code, "98");
        assert_eq!(outcome.status, CdrStatus::Pending);
    }

    #[test]
    fn status_with_content() {
        let body = envelope(&format!(
            "<getStatusResponse><status><statusCode>0</statusCode><content>{}</content></status></getStatusResponse>",
            cdr_b64("0", "aceptada")
        ));
        let outcome = process_status(200, body.as_bytes()).unwrap();
        assert_eq!(outcome.status, CdrStatus::Accepted);
        assert_eq!(outcome.message.as_deref(), Some("aceptada"));
    }

    #[test]
    fn status_cdr_without_content() {
        let body = envelope(
            "<getStatusCdrResponse><statusCdr><statusCode>0127</statusCode><statusMessage>El ticket no existe</statusMessage></statusCdr></getStatusCdrResponse>",
        );
        let outcome = process_cdr(200, body.as_bytes()).unwrap();
        assert_eq!(outcome.status_code.as_deref(), Some("0127"));
        assert_eq!(outcome.status, CdrStatus::Pending);
        assert_eq!(outcome.message.as_deref(), Some("El ticket no existe"));
    }

    #[test]
    fn wrong_operation() {
        let body = envelope("<getStatusResponse/>");
        assert!(matches!(
            process_send_bill(200, body.as_bytes()),
            Err(CpeError::Protocol { .. })
        ));
    }

    #[test]
    fn bad_cdr_base64() {
        assert!(matches!(decode_cdr("%%%"), Err(CpeError::Protocol { .. })));
    }
}
