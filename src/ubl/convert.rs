use rust_decimal::Decimal;
use tracing::debug;

use super::schema::*;
use super::{CATALOG_06_URI, SIGNATURE_ID};
use crate::core::*;

/// Default ubigeo for an issuer without one (Lima).
const DEFAULT_UBIGEO: &str = "150101";

/// Map a document with calculated totals onto its UBL shape.
///
/// Fails with [`CpeError::Conversion`] when the issuer RUC is malformed,
/// the recipient has no identity number, the currency code is empty, there
/// are no lines or totals have not been calculated.
pub fn convert(doc: &Document) -> Result<SchemaDocument, CpeError> {
    validate_ruc(&doc.issuer.identity.number)
        .map_err(|e| CpeError::Conversion(format!("issuer {e}")))?;
    if doc.recipient.identity.number.trim().is_empty() {
        return Err(CpeError::Conversion(
            "recipient identity number is empty".into(),
        ));
    }
    let currency = doc.currency.code();
    if currency.is_empty() {
        return Err(CpeError::Conversion("currency is empty".into()));
    }
    if doc.lines.is_empty() {
        return Err(CpeError::Conversion(
            "document has no line items".into(),
        ));
    }
    let totals = doc.totals.as_ref().ok_or_else(|| {
        CpeError::Conversion("totals must be calculated before conversion".into())
    })?;

    let kind = match doc.document_type {
        DocumentType::Invoice | DocumentType::Boleta => SchemaKind::Invoice {
            type_code: doc.document_type.code().to_string(),
        },
        DocumentType::CreditNote => SchemaKind::CreditNote,
        DocumentType::DebitNote => SchemaKind::DebitNote,
    };

    let schema = SchemaDocument {
        kind,
        id: doc.full_number(),
        issue_date: doc.issue_date,
        due_date: doc.due_date,
        currency: currency.to_string(),
        notes: doc.notes.clone(),
        line_count: doc.lines.len(),
        signature: SignatureReference {
            id: SIGNATURE_ID.to_string(),
            signatory_id: doc.issuer.identity.number.clone(),
            signatory_name: doc.issuer.legal_name.clone(),
            uri: format!("#{SIGNATURE_ID}"),
        },
        supplier: supplier_party(&doc.issuer),
        customer: customer_party(&doc.recipient),
        payment_terms: payment_terms(doc.payment_terms.as_ref(), totals.grand_total),
        tax_total: tax_total(&doc.taxes),
        monetary_total: monetary_total(totals),
        lines: doc.lines.iter().map(convert_line).collect(),
    };

    debug!(
        document = %schema.id,
        shape = schema.kind.root_element(),
        lines = schema.line_count,
        "document converted"
    );
    Ok(schema)
}

fn identity(id: &TaxIdentifier) -> SchemaIdentifier {
    SchemaIdentifier {
        value: id.number.clone(),
        scheme_id: id.kind.code().to_string(),
        scheme_name: "Documento de Identidad".into(),
        scheme_agency_name: "PE:SUNAT".into(),
        scheme_uri: Some(CATALOG_06_URI.into()),
    }
}

fn supplier_party(party: &Party) -> SchemaParty {
    let addr = &party.address;
    let registration_address = SchemaAddress {
        ubigeo: Some(
            addr.ubigeo
                .clone()
                .unwrap_or_else(|| DEFAULT_UBIGEO.to_string()),
        ),
        address_type_code: Some("0000".into()),
        city: addr.province.clone(),
        subentity: addr.department.clone(),
        district: addr.district.clone(),
        line: addr.line.clone(),
        country_code: addr.country_code.clone(),
    };
    let postal_address = SchemaAddress {
        ubigeo: None,
        address_type_code: None,
        ..registration_address.clone()
    };

    let contact = (party.phone.is_some() || party.email.is_some()).then(|| SchemaContact {
        name: party.trade_name.clone(),
        telephone: party.phone.clone(),
        email: party.email.clone(),
    });

    SchemaParty {
        identifier: identity(&party.identity),
        name: party
            .trade_name
            .clone()
            .unwrap_or_else(|| party.legal_name.clone()),
        registration_name: party.legal_name.clone(),
        registration_address: Some(registration_address),
        postal_address: Some(postal_address),
        contact,
    }
}

fn customer_party(party: &Party) -> SchemaParty {
    let addr = &party.address;
    let address = addr.line.as_ref().map(|line| SchemaAddress {
        ubigeo: None,
        address_type_code: None,
        city: addr.province.clone(),
        subentity: addr.department.clone(),
        district: addr.district.clone(),
        line: Some(line.clone()),
        country_code: addr.country_code.clone(),
    });

    SchemaParty {
        identifier: identity(&party.identity),
        name: party
            .trade_name
            .clone()
            .unwrap_or_else(|| party.legal_name.clone()),
        registration_name: party.legal_name.clone(),
        registration_address: address.clone(),
        postal_address: address,
        contact: party.email.as_ref().map(|email| SchemaContact {
            name: None,
            telephone: None,
            email: Some(email.clone()),
        }),
    }
}

fn payment_terms(terms: Option<&PaymentTerms>, grand_total: Decimal) -> Vec<SchemaPaymentTerm> {
    match terms {
        None => Vec::new(),
        Some(PaymentTerms::Cash) => vec![SchemaPaymentTerm {
            means_id: "Contado".into(),
            amount: None,
            due_date: None,
        }],
        Some(PaymentTerms::Credit { installments }) => {
            let mut out = vec![SchemaPaymentTerm {
                means_id: "Credito".into(),
                amount: Some(grand_total),
                due_date: None,
            }];
            out.extend(installments.iter().enumerate().map(|(i, inst)| {
                SchemaPaymentTerm {
                    means_id: format!("Cuota{:03}", i + 1),
                    amount: Some(inst.amount),
                    due_date: Some(inst.due_date),
                }
            }));
            out
        }
    }
}

fn tax_scheme(tax_type: TaxType) -> SchemaTaxScheme {
    SchemaTaxScheme {
        id: tax_type.code().to_string(),
        name: tax_type.name().to_string(),
        type_code: tax_type.international_code().to_string(),
    }
}

fn tax_total(entries: &[TaxEntry]) -> SchemaTaxTotal {
    SchemaTaxTotal {
        amount: entries.iter().map(|t| t.amount).sum(),
        subtotals: entries
            .iter()
            .map(|t| SchemaTaxSubtotal {
                taxable_amount: t.base,
                amount: t.amount,
                category: SchemaTaxCategory {
                    id: t.category.code().to_string(),
                    percent: Some(t.rate),
                    exemption_reason_code: None,
                    scheme: tax_scheme(t.tax_type),
                },
            })
            .collect(),
    }
}

fn monetary_total(totals: &MonetaryTotals) -> SchemaMonetaryTotal {
    let payable_sale_value = totals.total_sale_value - totals.free;
    let non_zero = |d: Decimal| (!d.is_zero()).then_some(d);
    SchemaMonetaryTotal {
        line_extension: payable_sale_value,
        tax_exclusive: payable_sale_value,
        tax_inclusive: totals.total_price,
        allowance_total: non_zero(totals.discounts),
        prepaid: non_zero(totals.advances),
        rounding: non_zero(totals.rounding),
        payable: totals.grand_total,
    }
}

/// Tax scheme implied by the affectation when a line carries no tax entry.
fn affectation_tax_type(affectation: Affectation) -> TaxType {
    match affectation {
        Affectation::IvapTaxed => TaxType::Ivap,
        Affectation::ExportFree => TaxType::Export,
        a => match a.bucket() {
            SaleBucket::Taxed => TaxType::Igv,
            SaleBucket::Exempt => TaxType::Exempt,
            SaleBucket::Unaffected => TaxType::Unaffected,
            SaleBucket::Free => TaxType::Free,
        },
    }
}

fn convert_line(line: &LineItem) -> SchemaLine {
    let sale_value = line
        .sale_value
        .unwrap_or(line.quantity * line.unit_value);

    let primary = line.taxes.first();
    let classified_tax_category = SchemaTaxCategory {
        id: line.affectation.tax_category().code().to_string(),
        percent: Some(primary.map_or(Decimal::ZERO, |t| t.rate)),
        exemption_reason_code: Some(line.affectation.code().to_string()),
        scheme: tax_scheme(
            primary.map_or_else(|| affectation_tax_type(line.affectation), |t| t.tax_type),
        ),
    };

    let tax_total = (!line.taxes.is_empty()).then(|| self::tax_total(&line.taxes));

    let alternative_price = (line.affectation != Affectation::TaxedPaid).then(|| AlternativePrice {
        amount: line.unit_value,
        type_code: "01".into(),
    });

    SchemaLine {
        id: line.sequence.to_string(),
        quantity: line.quantity,
        unit_code: line.unit.clone(),
        line_extension_amount: sale_value,
        alternative_price,
        tax_total,
        description: line.description.clone(),
        sellers_item_id: (!line.code.is_empty()).then(|| line.code.clone()),
        classified_tax_category,
        price: line.unit_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn document(doc_type: DocumentType, series: &str) -> Document {
        DocumentBuilder::new(doc_type, series, "00000001", date())
            .issuer(
                PartyBuilder::ruc("20123456789", "EMPRESA DEMO SAC")
                    .trade_name("DEMO")
                    .phone("014445555")
                    .build(),
            )
            .recipient(PartyBuilder::ruc("20987654321", "CLIENTE SAC").build())
            .add_line(
                LineItemBuilder::new(1, "P001", "Laptop", dec!(2), "NIU", dec!(100))
                    .tax(TaxType::Igv, dec!(18))
                    .build(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn invoice_shape() {
        let schema = convert(&document(DocumentType::Invoice, "F001")).unwrap();
        assert_eq!(schema.kind.type_code(), "01");
        assert_eq!(schema.id, "F001-00000001");
        assert_eq!(schema.line_count, 1);
        assert_eq!(schema.tax_total.amount, dec!(36.00));
        assert_eq!(schema.monetary_total.payable, dec!(236.00));
        assert_eq!(schema.supplier.name, "DEMO");
        assert_eq!(
            schema.supplier.registration_address.as_ref().unwrap().ubigeo.as_deref(),
            Some("150101")
        );
        assert!(schema.supplier.contact.is_some());
        assert!(schema.customer.registration_address.is_none());
        assert!(schema.lines[0].alternative_price.is_none());
    }

    #[test]
    fn boleta_reuses_invoice_shape() {
        let mut doc = document(DocumentType::Invoice, "F001");
        doc.document_type = DocumentType::Boleta;
        let schema = convert(&doc).unwrap();
        assert_eq!(
            schema.kind,
            SchemaKind::Invoice {
                type_code: "03".into()
            }
        );
    }

    #[test]
    fn notes_dispatch_to_own_shapes() {
        let credit = convert(&document(DocumentType::CreditNote, "FC01")).unwrap();
        assert_eq!(credit.kind, SchemaKind::CreditNote);
        let debit = convert(&document(DocumentType::DebitNote, "FD01")).unwrap();
        assert_eq!(debit.kind, SchemaKind::DebitNote);
    }

    #[test]
    fn bad_issuer_ruc_fails() {
        let mut doc = document(DocumentType::Invoice, "F001");
        doc.issuer.identity.number = "99123456789".into();
        let err = convert(&doc).unwrap_err();
        assert!(matches!(err, CpeError::Conversion(_)));
        assert!(err.to_string().contains("'99'"));
    }

    #[test]
    fn empty_recipient_fails() {
        let mut doc = document(DocumentType::Invoice, "F001");
        doc.recipient.identity.number = String::new();
        assert!(matches!(convert(&doc), Err(CpeError::Conversion(_))));
    }

    #[test]
    fn missing_totals_fails() {
        let mut doc = document(DocumentType::Invoice, "F001");
        doc.totals = None;
        assert!(convert(&doc).unwrap_err().to_string().contains("totals"));
    }

    #[test]
    fn credit_terms_number_installments() {
        let terms = PaymentTerms::Credit {
            installments: vec![
                Installment {
                    amount: dec!(118),
                    due_date: NaiveDate::from_ymd_opt(2024, 7, 15).unwrap(),
                },
                Installment {
                    amount: dec!(118),
                    due_date: NaiveDate::from_ymd_opt(2024, 8, 15).unwrap(),
                },
            ],
        };
        let out = payment_terms(Some(&terms), dec!(236));
        let ids: Vec<_> = out.iter().map(|t| t.means_id.as_str()).collect();
        assert_eq!(ids, ["Credito", "Cuota001", "Cuota002"]);
        assert_eq!(out[0].amount, Some(dec!(236)));
    }

    #[test]
    fn free_line_gets_alternative_price() {
        let line = LineItemBuilder::new(2, "P002", "Regalo", dec!(1), "NIU", dec!(100))
            .affectation(Affectation::TaxedFree)
            .tax(TaxType::Free, dec!(18))
            .unit_price(dec!(0))
            .build();
        let converted = convert_line(&line);
        let alt = converted.alternative_price.unwrap();
        assert_eq!(alt.amount, dec!(100));
        assert_eq!(alt.type_code, "01");
        assert_eq!(converted.classified_tax_category.id, "Z");
        assert_eq!(converted.classified_tax_category.scheme.id, "9996");
        assert_eq!(
            converted.classified_tax_category.exemption_reason_code.as_deref(),
            Some("11")
        );
    }

    #[test]
    fn untaxed_line_scheme_from_affectation() {
        let line = LineItemBuilder::new(1, "", "Libro", dec!(1), "NIU", dec!(50))
            .affectation(Affectation::Exempt)
            .build();
        let converted = convert_line(&line);
        assert!(converted.tax_total.is_none());
        assert!(converted.sellers_item_id.is_none());
        assert_eq!(converted.classified_tax_category.scheme.id, "9997");
        assert_eq!(converted.classified_tax_category.id, "E");
    }
}
