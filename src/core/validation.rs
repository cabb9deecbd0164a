use std::collections::HashSet;

use super::error::ValidationError;
use super::types::*;

/// Taxpayer-type prefixes a RUC may start with.
///
/// 10 natural person, 15 non-domiciled natural person, 17 non-domiciled
/// with RUC by exception, 20 legal entity.
pub const RUC_TAXPAYER_PREFIXES: [&str; 4] = ["10", "15", "17", "20"];

/// Maximum series length accepted by the schema.
pub const MAX_SERIES_LEN: usize = 10;

/// Check that `ruc` is 11 ASCII digits with a known taxpayer-type prefix.
pub fn validate_ruc(ruc: &str) -> Result<(), ValidationError> {
    if ruc.len() != 11 {
        return Err(ValidationError::with_rule(
            "ruc",
            format!("RUC must have 11 digits, got {}", ruc.chars().count()),
            "CAT-06",
        ));
    }
    if !ruc.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::with_rule(
            "ruc",
            "RUC must contain only digits",
            "CAT-06",
        ));
    }
    let prefix = &ruc[..2];
    if !RUC_TAXPAYER_PREFIXES.contains(&prefix) {
        return Err(ValidationError::with_rule(
            "ruc",
            format!("unknown taxpayer type prefix '{prefix}'"),
            "CAT-06",
        ));
    }
    Ok(())
}

/// Convenience wrapper over [`validate_ruc`].
pub fn is_valid_ruc(ruc: &str) -> bool {
    validate_ruc(ruc).is_ok()
}

/// Check a recipient identity number against its declared document type.
pub fn validate_identity(id: &TaxIdentifier) -> Result<(), ValidationError> {
    let number = id.number.trim();
    if number.is_empty() {
        return Err(ValidationError::with_rule(
            "number",
            "identity document number is required",
            "CAT-06",
        ));
    }
    let digits_only = number.bytes().all(|b| b.is_ascii_digit());
    match id.kind {
        IdentityType::Ruc => validate_ruc(number).map_err(|e| ValidationError {
            field: "number".into(),
            ..e
        }),
        IdentityType::Dni if number.len() != 8 || !digits_only => Err(ValidationError::with_rule(
            "number",
            "DNI must have 8 digits",
            "CAT-06",
        )),
        IdentityType::ForeignerCard | IdentityType::Passport
            if number.len() > 12 || !number.bytes().all(|b| b.is_ascii_alphanumeric()) =>
        {
            Err(ValidationError::with_rule(
                "number",
                "document number must be at most 12 alphanumeric characters",
                "CAT-06",
            ))
        }
        IdentityType::NonDomiciled if number.len() > 15 => Err(ValidationError::with_rule(
            "number",
            "document number must be at most 15 characters",
            "CAT-06",
        )),
        _ => Ok(()),
    }
}

/// Validate a document before conversion.
/// Returns all validation errors found (not just the first).
pub fn validate_document(doc: &Document) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Err(e) = validate_ruc(&doc.issuer.identity.number) {
        errors.push(ValidationError {
            field: "issuer.ruc".into(),
            ..e
        });
    }
    if doc.issuer.identity.kind != IdentityType::Ruc {
        errors.push(ValidationError::new(
            "issuer.identity.kind",
            "issuer must be identified by RUC",
        ));
    }
    if doc.issuer.legal_name.trim().is_empty() {
        errors.push(ValidationError::new(
            "issuer.legal_name",
            "issuer legal name must not be empty",
        ));
    }

    if let Err(e) = validate_identity(&doc.recipient.identity) {
        errors.push(ValidationError {
            field: "recipient.document_number".into(),
            ..e
        });
    }
    if doc.document_type == DocumentType::Invoice
        && doc.recipient.identity.kind != IdentityType::Ruc
    {
        errors.push(ValidationError::new(
            "recipient.identity.kind",
            "a factura must be issued to a RUC holder",
        ));
    }
    if doc.recipient.legal_name.trim().is_empty() {
        errors.push(ValidationError::new(
            "recipient.legal_name",
            "recipient legal name must not be empty",
        ));
    }

    validate_series(doc, &mut errors);

    if doc.number.is_empty()
        || doc.number.len() > 8
        || !doc.number.bytes().all(|b| b.is_ascii_digit())
    {
        errors.push(ValidationError::new(
            "number",
            "number must have between 1 and 8 digits",
        ));
    }

    if doc.lines.is_empty() {
        errors.push(ValidationError::new(
            "lines",
            "document must have at least one line item",
        ));
    }

    let mut seen = HashSet::new();
    for (i, line) in doc.lines.iter().enumerate() {
        validate_line(line, i, &mut errors);
        if !seen.insert(line.sequence) {
            errors.push(ValidationError::new(
                format!("lines[{i}].sequence"),
                format!("duplicate line sequence {}", line.sequence),
            ));
        }
    }

    for (field, value) in [
        ("discounts", doc.discounts),
        ("advances", doc.advances),
    ] {
        if value.is_sign_negative() {
            errors.push(ValidationError::new(field, "must not be negative"));
        }
    }

    if let Some(PaymentTerms::Credit { installments }) = &doc.payment_terms {
        if installments.is_empty() {
            errors.push(ValidationError::new(
                "payment_terms.installments",
                "credit sales need at least one installment",
            ));
        }
        for (i, inst) in installments.iter().enumerate() {
            if inst.amount <= rust_decimal::Decimal::ZERO {
                errors.push(ValidationError::new(
                    format!("payment_terms.installments[{i}].amount"),
                    "installment amount must be positive",
                ));
            }
            if inst.due_date < doc.issue_date {
                errors.push(ValidationError::new(
                    format!("payment_terms.installments[{i}].due_date"),
                    "installment due date precedes the issue date",
                ));
            }
        }
    }

    errors
}

fn validate_series(doc: &Document, errors: &mut Vec<ValidationError>) {
    let series = &doc.series;
    if series.is_empty() || series.len() > MAX_SERIES_LEN {
        errors.push(ValidationError::new(
            "series",
            format!("series must have 1 to {MAX_SERIES_LEN} characters"),
        ));
        return;
    }
    if !series.bytes().all(|b| b.is_ascii_alphanumeric()) {
        errors.push(ValidationError::new(
            "series",
            "series must be alphanumeric",
        ));
        return;
    }
    let expected = match doc.document_type {
        DocumentType::Boleta => 'B',
        _ => 'F',
    };
    // Notes follow the series letter of the voucher they modify.
    let allowed = match doc.document_type {
        DocumentType::CreditNote | DocumentType::DebitNote => {
            series.starts_with('F') || series.starts_with('B')
        }
        _ => series.starts_with(expected),
    };
    if !allowed {
        errors.push(ValidationError::new(
            "series",
            format!(
                "series '{series}' is not valid for document type {}",
                doc.document_type.code()
            ),
        ));
    }
}

fn validate_line(line: &LineItem, index: usize, errors: &mut Vec<ValidationError>) {
    let prefix = format!("lines[{index}]");

    if line.sequence == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.sequence"),
            "line sequence must be greater than zero",
        ));
    }
    if line.description.trim().is_empty() {
        errors.push(ValidationError::new(
            format!("{prefix}.description"),
            "description must not be empty",
        ));
    }
    if !super::units::is_known_unit_code(&line.unit) {
        errors.push(ValidationError::with_rule(
            format!("{prefix}.unit"),
            format!("unknown unit of measure '{}'", line.unit),
            "CAT-03",
        ));
    }
    if line.quantity <= rust_decimal::Decimal::ZERO {
        errors.push(ValidationError::new(
            format!("{prefix}.quantity"),
            "quantity must be greater than zero",
        ));
    }
    for (field, value) in [
        ("unit_value", line.unit_value),
        ("unit_price", line.unit_price),
        ("discount", line.discount),
    ] {
        if value.is_sign_negative() {
            errors.push(ValidationError::new(
                format!("{prefix}.{field}"),
                "must not be negative",
            ));
        }
    }
    for (j, tax) in line.taxes.iter().enumerate() {
        if tax.base.is_sign_negative() || tax.rate.is_sign_negative() {
            errors.push(ValidationError::new(
                format!("{prefix}.taxes[{j}]"),
                "tax base and rate must not be negative",
            ));
        }
    }
}
