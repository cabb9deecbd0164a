use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::error::{CpeError, validation_failure};
use super::lifecycle::DocumentState;
use super::totals::{calculate_totals, round_half_up};
use super::types::*;
use super::validation;

/// Builder for constructing valid documents.
///
/// ```
/// use comprobante::core::*;
/// use rust_decimal_macros::dec;
/// use chrono::NaiveDate;
///
/// let doc = DocumentBuilder::new(
///         DocumentType::Invoice, "F001", "00000001",
///         NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
///     .issuer(PartyBuilder::ruc("20123456789", "EMPRESA DEMO SAC")
///         .address(AddressBuilder::new().line("AV. LARCO 123").district("MIRAFLORES").build())
///         .build())
///     .recipient(PartyBuilder::ruc("20987654321", "CLIENTE SAC").build())
///     .add_line(LineItemBuilder::new(1, "P001", "Laptop", dec!(2), "NIU", dec!(100))
///         .tax(TaxType::Igv, dec!(18))
///         .build())
///     .build()
///     .unwrap();
///
/// assert_eq!(doc.totals.unwrap().grand_total, dec!(236.00));
/// ```
pub struct DocumentBuilder {
    id: Option<String>,
    document_type: DocumentType,
    series: String,
    number: String,
    issue_date: NaiveDate,
    due_date: Option<NaiveDate>,
    currency: Currency,
    notes: Vec<String>,
    payment_terms: Option<PaymentTerms>,
    issuer: Option<Party>,
    recipient: Option<Party>,
    lines: Vec<LineItem>,
    discounts: Decimal,
    advances: Decimal,
    rounding: Decimal,
}

impl DocumentBuilder {
    pub fn new(
        document_type: DocumentType,
        series: impl Into<String>,
        number: impl Into<String>,
        issue_date: NaiveDate,
    ) -> Self {
        Self {
            id: None,
            document_type,
            series: series.into(),
            number: number.into(),
            issue_date,
            due_date: None,
            currency: Currency::Pen,
            notes: Vec::new(),
            payment_terms: None,
            issuer: None,
            recipient: None,
            lines: Vec::new(),
            discounts: Decimal::ZERO,
            advances: Decimal::ZERO,
            rounding: Decimal::ZERO,
        }
    }

    /// Storage identifier. Defaults to `{series}-{number}`.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn due_date(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn payment_terms(mut self, terms: PaymentTerms) -> Self {
        self.payment_terms = Some(terms);
        self
    }

    pub fn issuer(mut self, party: Party) -> Self {
        self.issuer = Some(party);
        self
    }

    pub fn recipient(mut self, party: Party) -> Self {
        self.recipient = Some(party);
        self
    }

    pub fn add_line(mut self, line: LineItem) -> Self {
        self.lines.push(line);
        self
    }

    pub fn discounts(mut self, amount: Decimal) -> Self {
        self.discounts = amount;
        self
    }

    pub fn advances(mut self, amount: Decimal) -> Self {
        self.advances = amount;
        self
    }

    pub fn rounding(mut self, amount: Decimal) -> Self {
        self.rounding = amount;
        self
    }

    /// Build the document, calculating totals and running validation.
    /// Returns all validation errors (not just the first).
    pub fn build(self) -> Result<Document, CpeError> {
        let mut doc = self.assemble()?;

        // Input limits to prevent abuse
        if doc.lines.len() > 10_000 {
            return Err(CpeError::Validation(
                "document cannot have more than 10,000 line items".into(),
            ));
        }
        if doc.notes.len() > 100 {
            return Err(CpeError::Validation(
                "document cannot have more than 100 notes".into(),
            ));
        }

        let errors = validation::validate_document(&doc);
        if !errors.is_empty() {
            return Err(validation_failure(&errors));
        }

        calculate_totals(&mut doc)?;
        Ok(doc)
    }

    /// Build without validation. Totals are still calculated.
    pub fn build_unchecked(self) -> Result<Document, CpeError> {
        let mut doc = self.assemble()?;
        calculate_totals(&mut doc)?;
        Ok(doc)
    }

    fn assemble(self) -> Result<Document, CpeError> {
        let issuer = self
            .issuer
            .ok_or_else(|| CpeError::Validation("issuer: is required".into()))?;
        let recipient = self
            .recipient
            .ok_or_else(|| CpeError::Validation("recipient: is required".into()))?;

        if self.lines.is_empty() {
            return Err(CpeError::Validation(
                "lines: at least one line item is required".into(),
            ));
        }

        Ok(Document {
            id: self
                .id
                .unwrap_or_else(|| format!("{}-{}", self.series, self.number)),
            document_type: self.document_type,
            series: self.series,
            number: self.number,
            issue_date: self.issue_date,
            due_date: self.due_date,
            currency: self.currency,
            notes: self.notes,
            payment_terms: self.payment_terms,
            issuer,
            recipient,
            lines: self.lines,
            taxes: Vec::new(),
            discounts: self.discounts,
            advances: self.advances,
            rounding: self.rounding,
            totals: None,
            state: DocumentState::Pending,
            xml: None,
            signed_xml: None,
            zip: None,
            ticket: None,
            cdr: None,
            status_message: None,
        })
    }
}

/// Builder for Party (issuer/recipient).
pub struct PartyBuilder {
    identity: TaxIdentifier,
    legal_name: String,
    trade_name: Option<String>,
    address: Address,
    phone: Option<String>,
    email: Option<String>,
}

impl PartyBuilder {
    pub fn new(kind: IdentityType, number: impl Into<String>, legal_name: impl Into<String>) -> Self {
        Self {
            identity: TaxIdentifier {
                kind,
                number: number.into(),
            },
            legal_name: legal_name.into(),
            trade_name: None,
            address: AddressBuilder::new().build(),
            phone: None,
            email: None,
        }
    }

    /// Party identified by RUC.
    pub fn ruc(ruc: impl Into<String>, legal_name: impl Into<String>) -> Self {
        Self::new(IdentityType::Ruc, ruc, legal_name)
    }

    /// Party identified by DNI.
    pub fn dni(dni: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(IdentityType::Dni, dni, name)
    }

    pub fn trade_name(mut self, name: impl Into<String>) -> Self {
        self.trade_name = Some(name.into());
        self
    }

    pub fn address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn build(self) -> Party {
        Party {
            identity: self.identity,
            legal_name: self.legal_name,
            trade_name: self.trade_name,
            address: self.address,
            phone: self.phone,
            email: self.email,
        }
    }
}

/// Builder for Address. Country defaults to "PE".
pub struct AddressBuilder {
    address: Address,
}

impl AddressBuilder {
    pub fn new() -> Self {
        Self {
            address: Address {
                country_code: "PE".into(),
                ..Address::default()
            },
        }
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.address.line = Some(line.into());
        self
    }

    pub fn district(mut self, district: impl Into<String>) -> Self {
        self.address.district = Some(district.into());
        self
    }

    pub fn province(mut self, province: impl Into<String>) -> Self {
        self.address.province = Some(province.into());
        self
    }

    pub fn department(mut self, department: impl Into<String>) -> Self {
        self.address.department = Some(department.into());
        self
    }

    pub fn ubigeo(mut self, ubigeo: impl Into<String>) -> Self {
        self.address.ubigeo = Some(ubigeo.into());
        self
    }

    pub fn country(mut self, country_code: impl Into<String>) -> Self {
        self.address.country_code = country_code.into();
        self
    }

    pub fn build(self) -> Address {
        self.address
    }
}

impl Default for AddressBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for LineItem.
pub struct LineItemBuilder {
    sequence: u32,
    code: String,
    description: String,
    quantity: Decimal,
    unit: String,
    unit_value: Decimal,
    unit_price: Option<Decimal>,
    discount: Decimal,
    affectation: Affectation,
    // Rates whose base is the line sale value, resolved in build()
    rated: Vec<(TaxType, Decimal)>,
    taxes: Vec<TaxEntry>,
}

impl LineItemBuilder {
    pub fn new(
        sequence: u32,
        code: impl Into<String>,
        description: impl Into<String>,
        quantity: Decimal,
        unit: impl Into<String>,
        unit_value: Decimal,
    ) -> Self {
        Self {
            sequence,
            code: code.into(),
            description: description.into(),
            quantity,
            unit: unit.into(),
            unit_value,
            unit_price: None,
            discount: Decimal::ZERO,
            affectation: Affectation::TaxedPaid,
            rated: Vec::new(),
            taxes: Vec::new(),
        }
    }

    pub fn affectation(mut self, affectation: Affectation) -> Self {
        self.affectation = affectation;
        self
    }

    /// Add a tax whose base is the line sale value (`quantity × unit_value`).
    pub fn tax(mut self, tax_type: TaxType, rate: Decimal) -> Self {
        self.rated.push((tax_type, rate));
        self
    }

    /// Add a tax with an explicit base.
    pub fn tax_entry(mut self, entry: TaxEntry) -> Self {
        self.taxes.push(entry);
        self
    }

    /// Unit price including taxes. Derived from the rates when not set.
    pub fn unit_price(mut self, price: Decimal) -> Self {
        self.unit_price = Some(price);
        self
    }

    pub fn discount(mut self, discount: Decimal) -> Self {
        self.discount = discount;
        self
    }

    /// Out-of-range amounts are not caught here: `calculate_totals` rejects
    /// a line whose sale value overflows before any tax base is used.
    pub fn build(self) -> LineItem {
        let base = self
            .quantity
            .checked_mul(self.unit_value)
            .unwrap_or(Decimal::ZERO);
        let mut taxes = self.taxes;
        for (tax_type, rate) in &self.rated {
            taxes.push(TaxEntry::new(*tax_type, base, *rate));
        }

        let unit_price = self.unit_price.unwrap_or_else(|| {
            self.rated
                .iter()
                .try_fold(Decimal::ZERO, |sum, (_, r)| sum.checked_add(*r))
                .and_then(|rate_sum| rate_sum.checked_div(dec!(100)))
                .and_then(|factor| self.unit_value.checked_mul(dec!(1) + factor))
                .map_or(self.unit_value, |price| round_half_up(price, 2))
        });

        LineItem {
            sequence: self.sequence,
            code: self.code,
            description: self.description,
            unit: self.unit,
            quantity: self.quantity,
            unit_value: self.unit_value,
            unit_price,
            discount: self.discount,
            affectation: self.affectation,
            taxes,
            sale_value: None,
            total_value: None,
        }
    }
}
