use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::lifecycle::DocumentState;

/// Electronic payment voucher (comprobante de pago electrónico).
///
/// Carries the business content plus the artifacts produced by each pipeline
/// stage. A `Document` is owned by a single pipeline run at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Storage identifier (opaque to the pipeline).
    pub id: String,
    /// Catalog 01 document type.
    pub document_type: DocumentType,
    /// Series, e.g. "F001" or "B001".
    pub series: String,
    /// Correlative number within the series.
    pub number: String,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub currency: Currency,
    /// Free-text legends (e.g. amount in words).
    pub notes: Vec<String>,
    pub payment_terms: Option<PaymentTerms>,
    pub issuer: Party,
    pub recipient: Party,
    pub lines: Vec<LineItem>,
    /// Document-level tax summary (set by `calculate_totals()`).
    pub taxes: Vec<TaxEntry>,
    /// Global discounts applied to the payable amount.
    pub discounts: Decimal,
    /// Advance payments already received.
    pub advances: Decimal,
    /// Rounding adjustment added to the payable amount.
    pub rounding: Decimal,
    /// Calculated totals (set by `calculate_totals()`).
    pub totals: Option<MonetaryTotals>,
    pub state: DocumentState,
    /// Unsigned UBL XML.
    pub xml: Option<String>,
    /// UBL XML with the embedded signature.
    pub signed_xml: Option<String>,
    /// ZIP bundle as submitted.
    pub zip: Option<Vec<u8>>,
    /// Ticket returned by the billing service.
    pub ticket: Option<String>,
    /// Certified response (CDR) as returned, ZIP or raw XML.
    pub cdr: Option<Vec<u8>>,
    /// Last rejection description or stage failure.
    pub status_message: Option<String>,
}

impl Document {
    /// `{series}-{number}`, the UBL `cbc:ID`.
    pub fn full_number(&self) -> String {
        format!("{}-{}", self.series, self.number)
    }

    /// `{ruc}-{type}-{series}-{number}`, the package file stem.
    pub fn file_name(&self) -> String {
        super::numbering::document_file_name(
            &self.issuer.identity.number,
            self.document_type,
            &self.series,
            &self.number,
        )
    }
}

/// Catalog 01: document type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    /// 01: Factura.
    Invoice,
    /// 03: Boleta de venta. Uses the invoice schema shape.
    Boleta,
    /// 07: Nota de crédito.
    CreditNote,
    /// 08: Nota de débito.
    DebitNote,
}

impl DocumentType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Invoice => "01",
            Self::Boleta => "03",
            Self::CreditNote => "07",
            Self::DebitNote => "08",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "01" => Some(Self::Invoice),
            "03" => Some(Self::Boleta),
            "07" => Some(Self::CreditNote),
            "08" => Some(Self::DebitNote),
            _ => None,
        }
    }
}

/// Currencies accepted by the billing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    Pen,
    Usd,
    Eur,
}

impl Currency {
    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Pen => "PEN",
            Self::Usd => "USD",
            Self::Eur => "EUR",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "PEN" => Some(Self::Pen),
            "USD" => Some(Self::Usd),
            "EUR" => Some(Self::Eur),
            _ => None,
        }
    }
}

/// Issuer or recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub identity: TaxIdentifier,
    /// Razón social.
    pub legal_name: String,
    /// Nombre comercial.
    pub trade_name: Option<String>,
    pub address: Address,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Identity document (catalog 06 type + number).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxIdentifier {
    pub kind: IdentityType,
    pub number: String,
}

/// Catalog 06: identity document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityType {
    /// 0: Non-domiciled, no RUC.
    NonDomiciled,
    /// 1: DNI (national identity card).
    Dni,
    /// 4: Carné de extranjería.
    ForeignerCard,
    /// 6: RUC (taxpayer registry).
    Ruc,
    /// 7: Passport.
    Passport,
}

impl IdentityType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NonDomiciled => "0",
            Self::Dni => "1",
            Self::ForeignerCard => "4",
            Self::Ruc => "6",
            Self::Passport => "7",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "0" => Some(Self::NonDomiciled),
            "1" => Some(Self::Dni),
            "4" => Some(Self::ForeignerCard),
            "6" => Some(Self::Ruc),
            "7" => Some(Self::Passport),
            _ => None,
        }
    }
}

/// Fiscal address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    /// Street line.
    pub line: Option<String>,
    pub district: Option<String>,
    pub province: Option<String>,
    pub department: Option<String>,
    /// INEI ubigeo code (six digits).
    pub ubigeo: Option<String>,
    /// ISO 3166-1 alpha-2.
    pub country_code: String,
}

/// One line of the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Sequence number, starting at 1.
    pub sequence: u32,
    /// Seller's product code.
    pub code: String,
    pub description: String,
    /// Catalog 03 unit of measure (e.g. "NIU", "ZZ").
    pub unit: String,
    pub quantity: Decimal,
    /// Unit value without taxes.
    pub unit_value: Decimal,
    /// Unit price including taxes.
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub affectation: Affectation,
    pub taxes: Vec<TaxEntry>,
    /// `quantity × unit_value` (set by `calculate_totals()`).
    pub sale_value: Option<Decimal>,
    /// `sale_value + discount` (set by `calculate_totals()`).
    pub total_value: Option<Decimal>,
}

/// Catalog 07: IGV affectation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Affectation {
    /// 10: Taxed, paid operation.
    TaxedPaid,
    /// 11: Taxed, withdrawal as a prize (free of charge).
    TaxedFree,
    /// 12: Taxed, withdrawal as a donation.
    TaxedDonation,
    /// 13: Taxed, withdrawal.
    TaxedWithdrawal,
    /// 14: Taxed, withdrawal for advertising.
    TaxedAdvertising,
    /// 15: Taxed, bonus.
    TaxedBonus,
    /// 16: Taxed, delivery to employees.
    TaxedEmployeeDelivery,
    /// 17: Taxed under IVAP.
    IvapTaxed,
    /// 20: Exempt, paid operation.
    Exempt,
    /// 21: Exempt, free transfer.
    ExemptFree,
    /// 30: Unaffected, paid operation.
    Unaffected,
    /// 31: Unaffected, withdrawal as a bonus.
    UnaffectedBonus,
    /// 32: Unaffected, withdrawal.
    UnaffectedWithdrawal,
    /// 33: Unaffected, medical samples.
    UnaffectedMedicalSamples,
    /// 34: Unaffected, collective agreement.
    UnaffectedCollectiveAgreement,
    /// 35: Unaffected, withdrawal as a prize.
    UnaffectedPrize,
    /// 36: Unaffected, withdrawal for advertising.
    UnaffectedAdvertising,
    /// 37: Unaffected, free transfer.
    UnaffectedFree,
    /// 40: Export.
    ExportFree,
}

/// The four sale subtotals an affectation contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaleBucket {
    Taxed,
    Exempt,
    Unaffected,
    Free,
}

impl Affectation {
    pub const ALL: [Affectation; 19] = [
        Self::TaxedPaid,
        Self::TaxedFree,
        Self::TaxedDonation,
        Self::TaxedWithdrawal,
        Self::TaxedAdvertising,
        Self::TaxedBonus,
        Self::TaxedEmployeeDelivery,
        Self::IvapTaxed,
        Self::Exempt,
        Self::ExemptFree,
        Self::Unaffected,
        Self::UnaffectedBonus,
        Self::UnaffectedWithdrawal,
        Self::UnaffectedMedicalSamples,
        Self::UnaffectedCollectiveAgreement,
        Self::UnaffectedPrize,
        Self::UnaffectedAdvertising,
        Self::UnaffectedFree,
        Self::ExportFree,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::TaxedPaid => "10",
            Self::TaxedFree => "11",
            Self::TaxedDonation => "12",
            Self::TaxedWithdrawal => "13",
            Self::TaxedAdvertising => "14",
            Self::TaxedBonus => "15",
            Self::TaxedEmployeeDelivery => "16",
            Self::IvapTaxed => "17",
            Self::Exempt => "20",
            Self::ExemptFree => "21",
            Self::Unaffected => "30",
            Self::UnaffectedBonus => "31",
            Self::UnaffectedWithdrawal => "32",
            Self::UnaffectedMedicalSamples => "33",
            Self::UnaffectedCollectiveAgreement => "34",
            Self::UnaffectedPrize => "35",
            Self::UnaffectedAdvertising => "36",
            Self::UnaffectedFree => "37",
            Self::ExportFree => "40",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.code() == code)
    }

    pub fn bucket(&self) -> SaleBucket {
        match self {
            Self::TaxedPaid | Self::IvapTaxed => SaleBucket::Taxed,
            Self::Exempt => SaleBucket::Exempt,
            Self::Unaffected => SaleBucket::Unaffected,
            _ => SaleBucket::Free,
        }
    }

    /// Free-of-charge lines contribute nothing to the payable amount.
    pub fn is_free(&self) -> bool {
        self.bucket() == SaleBucket::Free
    }

    /// UN/ECE 5305 category used in `cac:ClassifiedTaxCategory`.
    pub fn tax_category(&self) -> TaxCategory {
        match self {
            Self::TaxedPaid | Self::IvapTaxed => TaxCategory::Standard,
            Self::Exempt => TaxCategory::Exempt,
            Self::Unaffected => TaxCategory::NotSubject,
            Self::ExportFree => TaxCategory::Export,
            _ => TaxCategory::Free,
        }
    }
}

/// A tax applied to a line or summarised at document level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxEntry {
    pub tax_type: TaxType,
    pub category: TaxCategory,
    /// Taxable base (≥ 0).
    pub base: Decimal,
    /// Rate in percent (≥ 0).
    pub rate: Decimal,
    /// `round(base × rate / 100, 2)` (set by `calculate_totals()`).
    pub amount: Decimal,
}

impl TaxEntry {
    /// Build an entry with the category implied by the tax type.
    pub fn new(tax_type: TaxType, base: Decimal, rate: Decimal) -> Self {
        Self {
            tax_type,
            category: tax_type.default_category(),
            base,
            rate,
            amount: Decimal::ZERO,
        }
    }
}

/// Catalog 05: tax type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaxType {
    /// 1000: IGV (general sales tax).
    Igv,
    /// 1016: IVAP (rice sales tax).
    Ivap,
    /// 2000: ISC (selective consumption tax).
    Isc,
    /// 9995: Export.
    Export,
    /// 9996: Free of charge (gratuito).
    Free,
    /// 9997: Exempt (exonerado).
    Exempt,
    /// 9998: Unaffected (inafecto).
    Unaffected,
    /// 9999: Other taxes.
    Other,
}

impl TaxType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Igv => "1000",
            Self::Ivap => "1016",
            Self::Isc => "2000",
            Self::Export => "9995",
            Self::Free => "9996",
            Self::Exempt => "9997",
            Self::Unaffected => "9998",
            Self::Other => "9999",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1000" => Some(Self::Igv),
            "1016" => Some(Self::Ivap),
            "2000" => Some(Self::Isc),
            "9995" => Some(Self::Export),
            "9996" => Some(Self::Free),
            "9997" => Some(Self::Exempt),
            "9998" => Some(Self::Unaffected),
            "9999" => Some(Self::Other),
            _ => None,
        }
    }

    /// Scheme name shown in `cac:TaxScheme/cbc:Name`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Igv => "IGV",
            Self::Ivap => "IVAP",
            Self::Isc => "ISC",
            Self::Export => "EXP",
            Self::Free => "GRA",
            Self::Exempt => "EXO",
            Self::Unaffected => "INA",
            Self::Other => "OTROS",
        }
    }

    /// UN/ECE 5153 tax type code.
    pub fn international_code(&self) -> &'static str {
        match self {
            Self::Igv | Self::Ivap => "VAT",
            Self::Isc => "EXC",
            Self::Export | Self::Free | Self::Exempt | Self::Unaffected => "FRE",
            Self::Other => "OTH",
        }
    }

    pub fn default_category(&self) -> TaxCategory {
        match self {
            Self::Igv | Self::Ivap | Self::Isc | Self::Other => TaxCategory::Standard,
            Self::Export => TaxCategory::Export,
            Self::Free => TaxCategory::Free,
            Self::Exempt => TaxCategory::Exempt,
            Self::Unaffected => TaxCategory::NotSubject,
        }
    }
}

/// UN/ECE 5305: tax category codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaxCategory {
    /// S: Standard rate.
    Standard,
    /// E: Exempt.
    Exempt,
    /// O: Not subject to tax.
    NotSubject,
    /// Z: Free of charge.
    Free,
    /// G: Export.
    Export,
}

impl TaxCategory {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Standard => "S",
            Self::Exempt => "E",
            Self::NotSubject => "O",
            Self::Free => "Z",
            Self::Export => "G",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "S" => Some(Self::Standard),
            "E" => Some(Self::Exempt),
            "O" => Some(Self::NotSubject),
            "Z" => Some(Self::Free),
            "G" => Some(Self::Export),
            _ => None,
        }
    }
}

/// Document totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonetaryTotals {
    /// Sum of sale values on taxed lines.
    pub taxed: Decimal,
    /// Sum of sale values on exempt lines.
    pub exempt: Decimal,
    /// Sum of sale values on unaffected lines.
    pub unaffected: Decimal,
    /// Sum of sale values on free-of-charge lines.
    pub free: Decimal,
    pub discounts: Decimal,
    pub advances: Decimal,
    /// Sum of all tax amounts, free lines included.
    pub total_tax: Decimal,
    /// `taxed + exempt + unaffected + free`.
    pub total_sale_value: Decimal,
    /// Payable sale value plus payable tax; free lines excluded.
    pub total_price: Decimal,
    pub rounding: Decimal,
    /// `total_price − discounts − advances + rounding`, rounded to 2 places.
    pub grand_total: Decimal,
}

/// Forma de pago.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PaymentTerms {
    /// Contado: paid on issue.
    Cash,
    /// Crédito, paid in installments.
    Credit { installments: Vec<Installment> },
}

/// One credit installment (cuota).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub amount: Decimal,
    pub due_date: NaiveDate,
}
