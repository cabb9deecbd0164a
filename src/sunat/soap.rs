use crate::core::CpeError;
use crate::ubl::xml_utils::XmlWriter;

pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SERVICE_NS: &str = "http://service.sunat.gob.pe";
pub const WSSE_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";

/// billService operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoapOperation<'a> {
    SendBill {
        file_name: &'a str,
        content: &'a str,
    },
    GetStatus {
        ticket: &'a str,
    },
    GetStatusCdr {
        ruc: &'a str,
        type_code: &'a str,
        series: &'a str,
        number: &'a str,
    },
}

impl SoapOperation<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendBill { .. } => "sendBill",
            Self::GetStatus { .. } => "getStatus",
            Self::GetStatusCdr { .. } => "getStatusCdr",
        }
    }

    /// Value of the `SOAPAction` header.
    pub fn action(&self) -> String {
        format!("urn:{}", self.name())
    }
}

/// Build the request envelope with a plaintext UsernameToken header.
pub fn envelope(username: &str, password: &str, op: &SoapOperation<'_>) -> Result<String, CpeError> {
    let mut w = XmlWriter::new()?;
    w.start_element_with_attrs(
        "soapenv:Envelope",
        &[
            ("xmlns:soapenv", SOAP_ENV_NS),
            ("xmlns:ser", SERVICE_NS),
            ("xmlns:wsse", WSSE_NS),
        ],
    )?;

    w.start_element("soapenv:Header")?;
    w.start_element("wsse:Security")?;
    w.start_element("wsse:UsernameToken")?;
    w.text_element("wsse:Username", username)?;
    w.text_element("wsse:Password", password)?;
    w.end_element("wsse:UsernameToken")?;
    w.end_element("wsse:Security")?;
    w.end_element("soapenv:Header")?;

    w.start_element("soapenv:Body")?;
    let tag = format!("ser:{}", op.name());
    w.start_element(&tag)?;
    match op {
        SoapOperation::SendBill { file_name, content } => {
            w.text_element("fileName", file_name)?;
            w.text_element("contentFile", content)?;
        }
        SoapOperation::GetStatus { ticket } => {
            w.text_element("ticket", ticket)?;
        }
        SoapOperation::GetStatusCdr {
            ruc,
            type_code,
            series,
            number,
        } => {
            w.text_element("rucComprobante", ruc)?;
            w.text_element("tipoComprobante", type_code)?;
            w.text_element("serieComprobante", series)?;
            w.text_element("numeroComprobante", number)?;
        }
    }
    w.end_element(&tag)?;
    w.end_element("soapenv:Body")?;
    w.end_element("soapenv:Envelope")?;
    w.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_bill_envelope() {
        let op = SoapOperation::SendBill {
            file_name: "20123456789-01-F001-00000001.zip",
            content: "UEsDBA==",
        };
        let xml = envelope("20123456789MODDATOS", "MODDATOS", &op).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(r#"xmlns:ser="http://service.sunat.gob.pe""#));
        assert!(xml.contains("<wsse:Username>20123456789MODDATOS</wsse:Username>"));
        assert!(xml.contains("<ser:sendBill>"));
        assert!(xml.contains("<fileName>20123456789-01-F001-00000001.zip</fileName>"));
        assert!(xml.contains("<contentFile>UEsDBA==</contentFile>"));
        assert_eq!(op.action(), "urn:sendBill");
    }

    #[test]
    fn status_cdr_envelope() {
        let op = SoapOperation::GetStatusCdr {
            ruc: "20123456789",
            type_code: "01",
            series: "F001",
            number: "1",
        };
        let xml = envelope("u", "p&q", &op).unwrap();
        assert!(xml.contains("<ser:getStatusCdr>"));
        assert!(xml.contains("<tipoComprobante>01</tipoComprobante>"));
        assert!(xml.contains("<wsse:Password>p&amp;q</wsse:Password>"));
        assert_eq!(op.action(), "urn:getStatusCdr");
    }
}
