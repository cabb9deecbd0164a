use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use super::error::CpeError;
use super::types::*;

/// Calculate line values, the document tax summary and the monetary totals
/// (mutates in place).
///
/// Per line: `sale_value = quantity × unit_value`,
/// `total_value = sale_value + discount`, and every tax entry's amount is
/// recomputed as `round(base × rate / 100, 2)`.
///
/// Line taxes are summed into document-level entries keyed by
/// (tax type, category). Free-of-charge lines count towards `free` and
/// `total_tax` but not towards `total_price`.
pub fn calculate_totals(doc: &mut Document) -> Result<(), CpeError> {
    if doc.lines.is_empty() {
        return Err(CpeError::Calculation(
            "document has no line items".into(),
        ));
    }

    let mut taxed = Decimal::ZERO;
    let mut exempt = Decimal::ZERO;
    let mut unaffected = Decimal::ZERO;
    let mut free = Decimal::ZERO;
    let mut free_tax = Decimal::ZERO;

    // BTreeMap keeps the summary in a deterministic order
    let mut groups: BTreeMap<(TaxType, TaxCategory), (Decimal, Decimal, Decimal)> =
        BTreeMap::new();

    for line in &mut doc.lines {
        let sale_value = line
            .quantity
            .checked_mul(line.unit_value)
            .ok_or_else(|| overflow(line.sequence, "sale value"))?;
        let total_value = sale_value
            .checked_add(line.discount)
            .ok_or_else(|| overflow(line.sequence, "total value"))?;
        line.sale_value = Some(sale_value);
        line.total_value = Some(total_value);

        let bucket = match line.affectation.bucket() {
            SaleBucket::Taxed => &mut taxed,
            SaleBucket::Exempt => &mut exempt,
            SaleBucket::Unaffected => &mut unaffected,
            SaleBucket::Free => &mut free,
        };
        accumulate(bucket, sale_value, line.sequence, "sale bucket")?;

        for tax in &mut line.taxes {
            if tax.base.is_sign_negative() || tax.rate.is_sign_negative() {
                return Err(CpeError::Calculation(format!(
                    "line {}: tax {} has a negative base or rate",
                    line.sequence,
                    tax.tax_type.code()
                )));
            }
            tax.amount = tax_amount(tax.base, tax.rate)
                .ok_or_else(|| overflow(line.sequence, "tax amount"))?;

            if line.affectation.is_free() {
                accumulate(&mut free_tax, tax.amount, line.sequence, "free tax")?;
            }

            let entry = groups
                .entry((tax.tax_type, tax.category))
                .or_insert((Decimal::ZERO, tax.rate, Decimal::ZERO));
            accumulate(&mut entry.0, tax.base, line.sequence, "tax base")?;
            accumulate(&mut entry.2, tax.amount, line.sequence, "tax summary")?;
        }
    }

    doc.taxes = groups
        .into_iter()
        .map(|((tax_type, category), (base, rate, amount))| TaxEntry {
            tax_type,
            category,
            base,
            rate,
            amount,
        })
        .collect();

    let document_overflow = || CpeError::Calculation("document totals overflow".into());
    let total_tax = doc
        .taxes
        .iter()
        .try_fold(Decimal::ZERO, |sum, t| sum.checked_add(t.amount))
        .ok_or_else(document_overflow)?;
    let total_sale_value = [exempt, unaffected, free]
        .into_iter()
        .try_fold(taxed, Decimal::checked_add)
        .ok_or_else(document_overflow)?;
    let total_price = (total_sale_value - free)
        .checked_add(total_tax - free_tax)
        .ok_or_else(document_overflow)?;
    let grand_total = total_price
        .checked_sub(doc.discounts)
        .and_then(|v| v.checked_sub(doc.advances))
        .and_then(|v| v.checked_add(doc.rounding))
        .map(|v| round_half_up(v, 2))
        .ok_or_else(document_overflow)?;

    debug!(
        document = %doc.full_number(),
        %total_sale_value,
        %total_tax,
        %grand_total,
        "totals calculated"
    );

    doc.totals = Some(MonetaryTotals {
        taxed,
        exempt,
        unaffected,
        free,
        discounts: doc.discounts,
        advances: doc.advances,
        total_tax,
        total_sale_value,
        total_price,
        rounding: doc.rounding,
        grand_total,
    });

    Ok(())
}

fn tax_amount(base: Decimal, rate: Decimal) -> Option<Decimal> {
    let raw = base.checked_mul(rate)?.checked_div(dec!(100))?;
    Some(round_half_up(raw, 2))
}

fn accumulate(acc: &mut Decimal, value: Decimal, sequence: u32, what: &str) -> Result<(), CpeError> {
    *acc = acc
        .checked_add(value)
        .ok_or_else(|| overflow(sequence, what))?;
    Ok(())
}

fn overflow(sequence: u32, what: &str) -> CpeError {
    CpeError::Calculation(format!("line {sequence}: {what} overflows"))
}

/// Round a Decimal to `dp` decimal places using half-up (commercial rounding).
pub(crate) fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}
