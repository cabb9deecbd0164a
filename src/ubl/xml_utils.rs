//! Event writer shared by the UBL serializer and the SOAP envelope.

use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::Decimal;

use crate::core::CpeError;

pub type XmlResult = Result<String, CpeError>;

/// Indenting writer with the UTF-8 declaration already emitted.
///
/// Every element goes through [`XmlWriter::start_element_with_attrs`] and
/// [`XmlWriter::end_element`]; the other methods are shorthands over them.
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub fn new() -> Result<Self, CpeError> {
        let mut w = Self {
            writer: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2),
        };
        w.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(w)
    }

    pub fn into_string(self) -> XmlResult {
        String::from_utf8(self.writer.into_inner().into_inner())
            .map_err(|e| CpeError::Serialization(format!("XML is not UTF-8: {e}")))
    }

    fn emit(&mut self, event: Event<'_>) -> Result<&mut Self, CpeError> {
        self.writer
            .write_event(event)
            .map_err(|e| CpeError::Serialization(format!("XML write error: {e}")))?;
        Ok(self)
    }

    pub fn start_element_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, CpeError> {
        let start = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.emit(Event::Start(start))
    }

    pub fn start_element(&mut self, name: &str) -> Result<&mut Self, CpeError> {
        self.start_element_with_attrs(name, &[])
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, CpeError> {
        self.emit(Event::End(BytesEnd::new(name)))
    }

    /// `<name attrs>text</name>`, text escaped.
    pub fn text_element_with_attrs(
        &mut self,
        name: &str,
        text: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, CpeError> {
        self.start_element_with_attrs(name, attrs)?
            .emit(Event::Text(BytesText::new(text)))?
            .end_element(name)
    }

    pub fn text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, CpeError> {
        self.text_element_with_attrs(name, text, &[])
    }

    /// Skipped when `text` is absent or empty.
    pub fn optional_text_element(
        &mut self,
        name: &str,
        text: Option<&str>,
    ) -> Result<&mut Self, CpeError> {
        match text.filter(|t| !t.is_empty()) {
            Some(text) => self.text_element(name, text),
            None => Ok(self),
        }
    }

    /// Monetary amount tagged with its ISO 4217 `currencyID`.
    pub fn amount_element(
        &mut self,
        name: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<&mut Self, CpeError> {
        self.text_element_with_attrs(name, &format_decimal(amount), &[("currencyID", currency)])
    }

    /// Line quantity tagged with its catalog 03 `unitCode`.
    pub fn quantity_element(
        &mut self,
        name: &str,
        quantity: Decimal,
        unit: &str,
    ) -> Result<&mut Self, CpeError> {
        self.text_element_with_attrs(name, &format_decimal(quantity), &[("unitCode", unit)])
    }
}

/// Format a Decimal for XML output: at least 2 decimal places, trailing
/// zeros beyond that stripped.
pub fn format_decimal(d: Decimal) -> String {
    let s = d.normalize().to_string();
    match s.find('.') {
        Some(dot) if s.len() - dot - 1 >= 2 => s,
        Some(dot) => format!("{s}{}", "0".repeat(2 - (s.len() - dot - 1))),
        None => format!("{s}.00"),
    }
}
