use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::ns;

/// A voucher mapped onto one of the three UBL document shapes.
///
/// Fields shared by every shape live here; the shape-specific element
/// names hang off [`SchemaKind`].
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDocument {
    pub kind: SchemaKind,
    /// `{series}-{number}`.
    pub id: String,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub currency: String,
    pub notes: Vec<String>,
    pub line_count: usize,
    pub signature: SignatureReference,
    pub supplier: SchemaParty,
    pub customer: SchemaParty,
    pub payment_terms: Vec<SchemaPaymentTerm>,
    pub tax_total: SchemaTaxTotal,
    pub monetary_total: SchemaMonetaryTotal,
    pub lines: Vec<SchemaLine>,
}

/// Document shape discriminant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaKind {
    /// Factura (01) or boleta (03).
    Invoice { type_code: String },
    CreditNote,
    DebitNote,
}

impl SchemaKind {
    pub fn root_element(&self) -> &'static str {
        match self {
            Self::Invoice { .. } => "Invoice",
            Self::CreditNote => "CreditNote",
            Self::DebitNote => "DebitNote",
        }
    }

    pub fn namespace(&self) -> &'static str {
        match self {
            Self::Invoice { .. } => ns::INVOICE,
            Self::CreditNote => ns::CREDIT_NOTE,
            Self::DebitNote => ns::DEBIT_NOTE,
        }
    }

    pub fn type_code(&self) -> &str {
        match self {
            Self::Invoice { type_code } => type_code,
            Self::CreditNote => "07",
            Self::DebitNote => "08",
        }
    }

    pub fn type_code_element(&self) -> &'static str {
        match self {
            Self::Invoice { .. } => "cbc:InvoiceTypeCode",
            Self::CreditNote => "cbc:CreditNoteTypeCode",
            Self::DebitNote => "cbc:DebitNoteTypeCode",
        }
    }

    pub fn line_element(&self) -> &'static str {
        match self {
            Self::Invoice { .. } => "cac:InvoiceLine",
            Self::CreditNote => "cac:CreditNoteLine",
            Self::DebitNote => "cac:DebitNoteLine",
        }
    }

    pub fn quantity_element(&self) -> &'static str {
        match self {
            Self::Invoice { .. } => "cbc:InvoicedQuantity",
            Self::CreditNote => "cbc:CreditedQuantity",
            Self::DebitNote => "cbc:DebitedQuantity",
        }
    }

    /// Debit notes carry a requested rather than a legal total.
    pub fn monetary_total_element(&self) -> &'static str {
        match self {
            Self::DebitNote => "cac:RequestedMonetaryTotal",
            _ => "cac:LegalMonetaryTotal",
        }
    }

    pub fn has_payment_terms(&self) -> bool {
        !matches!(self, Self::DebitNote)
    }
}

/// `cac:Signature`, pointing at the embedded XMLDSig block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureReference {
    pub id: String,
    pub signatory_id: String,
    pub signatory_name: String,
    pub uri: String,
}

/// Identifier with scheme metadata (`schemeID`, `schemeName`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIdentifier {
    pub value: String,
    pub scheme_id: String,
    pub scheme_name: String,
    pub scheme_agency_name: String,
    pub scheme_uri: Option<String>,
}

impl SchemaIdentifier {
    pub(crate) fn attrs(&self) -> Vec<(&str, &str)> {
        let mut attrs = vec![
            ("schemeID", self.scheme_id.as_str()),
            ("schemeName", self.scheme_name.as_str()),
            ("schemeAgencyName", self.scheme_agency_name.as_str()),
        ];
        if let Some(uri) = &self.scheme_uri {
            attrs.push(("schemeURI", uri));
        }
        attrs
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaParty {
    pub identifier: SchemaIdentifier,
    /// `cac:PartyName`: trade name, or the legal name when there is none.
    pub name: String,
    pub registration_name: String,
    pub registration_address: Option<SchemaAddress>,
    pub postal_address: Option<SchemaAddress>,
    pub contact: Option<SchemaContact>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaAddress {
    /// Ubigeo, written with the INEI scheme attributes.
    pub ubigeo: Option<String>,
    /// Establishment code; `0000` is the fiscal address.
    pub address_type_code: Option<String>,
    pub city: Option<String>,
    pub subentity: Option<String>,
    pub district: Option<String>,
    pub line: Option<String>,
    pub country_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaContact {
    pub name: Option<String>,
    pub telephone: Option<String>,
    pub email: Option<String>,
}

/// One `cac:PaymentTerms` (`FormaPago`) entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaPaymentTerm {
    /// `Contado`, `Credito` or `CuotaNNN`.
    pub means_id: String,
    pub amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaTaxTotal {
    pub amount: Decimal,
    pub subtotals: Vec<SchemaTaxSubtotal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaTaxSubtotal {
    pub taxable_amount: Decimal,
    pub amount: Decimal,
    pub category: SchemaTaxCategory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaTaxCategory {
    /// UN/ECE 5305 code.
    pub id: String,
    pub percent: Option<Decimal>,
    /// Catalog 07 affectation code (line level only).
    pub exemption_reason_code: Option<String>,
    pub scheme: SchemaTaxScheme,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaTaxScheme {
    /// Catalog 05 code.
    pub id: String,
    pub name: String,
    /// UN/ECE 5153 code.
    pub type_code: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaMonetaryTotal {
    pub line_extension: Decimal,
    pub tax_exclusive: Decimal,
    pub tax_inclusive: Decimal,
    pub allowance_total: Option<Decimal>,
    pub prepaid: Option<Decimal>,
    pub rounding: Option<Decimal>,
    pub payable: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaLine {
    pub id: String,
    pub quantity: Decimal,
    pub unit_code: String,
    pub line_extension_amount: Decimal,
    pub alternative_price: Option<AlternativePrice>,
    pub tax_total: Option<SchemaTaxTotal>,
    pub description: String,
    pub sellers_item_id: Option<String>,
    pub classified_tax_category: SchemaTaxCategory,
    pub price: Decimal,
}

/// `cac:PricingReference/cac:AlternativeConditionPrice`.
#[derive(Debug, Clone, PartialEq)]
pub struct AlternativePrice {
    pub amount: Decimal,
    /// Catalog 16 price type.
    pub type_code: String,
}
