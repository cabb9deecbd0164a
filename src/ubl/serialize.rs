use super::ns;
use super::schema::*;
use super::xml_utils::{XmlResult, XmlWriter, format_decimal};
use super::{CUSTOMIZATION_ID, UBL_VERSION, convert};
use crate::core::{CpeError, Document};

/// Serialize a schema document to UBL XML.
///
/// Element order follows the UBL 2.1 schema. The output always starts with
/// a UTF-8 declaration and always carries an empty
/// `ext:UBLExtensions/ext:UBLExtension/ext:ExtensionContent` placeholder as
/// the first child of the root, to be filled by the signer.
pub fn serialize(doc: &SchemaDocument) -> XmlResult {
    let currency = doc.currency.as_str();
    let mut w = XmlWriter::new()?;

    let root = doc.kind.root_element();
    w.start_element_with_attrs(
        root,
        &[
            ("xmlns", doc.kind.namespace()),
            ("xmlns:cac", ns::CAC),
            ("xmlns:cbc", ns::CBC),
            ("xmlns:ds", ns::DS),
            ("xmlns:ext", ns::EXT),
        ],
    )?;

    w.start_element("ext:UBLExtensions")?;
    w.start_element("ext:UBLExtension")?;
    w.start_element("ext:ExtensionContent")?;
    w.end_element("ext:ExtensionContent")?;
    w.end_element("ext:UBLExtension")?;
    w.end_element("ext:UBLExtensions")?;

    w.text_element("cbc:UBLVersionID", UBL_VERSION)?;
    w.text_element("cbc:CustomizationID", CUSTOMIZATION_ID)?;
    w.text_element("cbc:ID", &doc.id)?;
    w.text_element("cbc:IssueDate", &doc.issue_date.to_string())?;
    if let (SchemaKind::Invoice { .. }, Some(due)) = (&doc.kind, &doc.due_date) {
        w.text_element("cbc:DueDate", &due.to_string())?;
    }
    w.text_element(doc.kind.type_code_element(), doc.kind.type_code())?;
    for note in &doc.notes {
        w.text_element("cbc:Note", note)?;
    }
    w.text_element("cbc:DocumentCurrencyCode", currency)?;
    w.text_element("cbc:LineCountNumeric", &doc.line_count.to_string())?;

    write_signature_reference(&mut w, &doc.signature)?;

    w.start_element("cac:AccountingSupplierParty")?;
    write_party(&mut w, &doc.supplier)?;
    w.end_element("cac:AccountingSupplierParty")?;

    w.start_element("cac:AccountingCustomerParty")?;
    write_party(&mut w, &doc.customer)?;
    w.end_element("cac:AccountingCustomerParty")?;

    if doc.kind.has_payment_terms() {
        for term in &doc.payment_terms {
            w.start_element("cac:PaymentTerms")?;
            w.text_element("cbc:ID", "FormaPago")?;
            w.text_element("cbc:PaymentMeansID", &term.means_id)?;
            if let Some(amount) = term.amount {
                w.amount_element("cbc:Amount", amount, currency)?;
            }
            if let Some(due) = &term.due_date {
                w.text_element("cbc:PaymentDueDate", &due.to_string())?;
            }
            w.end_element("cac:PaymentTerms")?;
        }
    }

    write_tax_total(&mut w, &doc.tax_total, currency)?;

    let total_tag = doc.kind.monetary_total_element();
    let mt = &doc.monetary_total;
    w.start_element(total_tag)?;
    w.amount_element("cbc:LineExtensionAmount", mt.line_extension, currency)?;
    w.amount_element("cbc:TaxExclusiveAmount", mt.tax_exclusive, currency)?;
    w.amount_element("cbc:TaxInclusiveAmount", mt.tax_inclusive, currency)?;
    if let Some(v) = mt.allowance_total {
        w.amount_element("cbc:AllowanceTotalAmount", v, currency)?;
    }
    if let Some(v) = mt.prepaid {
        w.amount_element("cbc:PrepaidAmount", v, currency)?;
    }
    if let Some(v) = mt.rounding {
        w.amount_element("cbc:PayableRoundingAmount", v, currency)?;
    }
    w.amount_element("cbc:PayableAmount", mt.payable, currency)?;
    w.end_element(total_tag)?;

    for line in &doc.lines {
        write_line(&mut w, &doc.kind, line, currency)?;
    }

    w.end_element(root)?;
    w.into_string()
}

/// Convert and serialize in one step.
pub fn to_xml(doc: &Document) -> Result<String, CpeError> {
    serialize(&convert(doc)?)
}

fn write_signature_reference(w: &mut XmlWriter, sig: &SignatureReference) -> Result<(), CpeError> {
    w.start_element("cac:Signature")?;
    w.text_element("cbc:ID", &sig.id)?;
    w.start_element("cac:SignatoryParty")?;
    w.start_element("cac:PartyIdentification")?;
    w.text_element("cbc:ID", &sig.signatory_id)?;
    w.end_element("cac:PartyIdentification")?;
    w.start_element("cac:PartyName")?;
    w.text_element("cbc:Name", &sig.signatory_name)?;
    w.end_element("cac:PartyName")?;
    w.end_element("cac:SignatoryParty")?;
    w.start_element("cac:DigitalSignatureAttachment")?;
    w.start_element("cac:ExternalReference")?;
    w.text_element("cbc:URI", &sig.uri)?;
    w.end_element("cac:ExternalReference")?;
    w.end_element("cac:DigitalSignatureAttachment")?;
    w.end_element("cac:Signature")?;
    Ok(())
}

fn write_party(w: &mut XmlWriter, party: &SchemaParty) -> Result<(), CpeError> {
    let id = &party.identifier;
    w.start_element("cac:Party")?;

    w.start_element("cac:PartyIdentification")?;
    w.text_element_with_attrs("cbc:ID", &id.value, &id.attrs())?;
    w.end_element("cac:PartyIdentification")?;

    w.start_element("cac:PartyName")?;
    w.text_element("cbc:Name", &party.name)?;
    w.end_element("cac:PartyName")?;

    w.start_element("cac:PartyTaxScheme")?;
    w.text_element("cbc:RegistrationName", &party.registration_name)?;
    w.text_element_with_attrs("cbc:CompanyID", &id.value, &id.attrs())?;
    w.start_element("cac:TaxScheme")?;
    w.text_element_with_attrs("cbc:ID", &id.value, &id.attrs())?;
    w.end_element("cac:TaxScheme")?;
    w.end_element("cac:PartyTaxScheme")?;

    w.start_element("cac:PartyLegalEntity")?;
    w.text_element("cbc:RegistrationName", &party.registration_name)?;
    if let Some(addr) = &party.registration_address {
        w.start_element("cac:RegistrationAddress")?;
        if let Some(ubigeo) = &addr.ubigeo {
            w.text_element_with_attrs(
                "cbc:ID",
                ubigeo,
                &[
                    ("schemeName", "Ubigeos"),
                    ("schemeAgencyName", "PE:INEI"),
                ],
            )?;
        }
        if let Some(code) = &addr.address_type_code {
            w.text_element_with_attrs(
                "cbc:AddressTypeCode",
                code,
                &[
                    ("listAgencyName", "PE:SUNAT"),
                    ("listName", "Establecimientos anexos"),
                ],
            )?;
        }
        w.optional_text_element("cbc:CityName", addr.city.as_deref())?;
        w.optional_text_element("cbc:CountrySubentity", addr.subentity.as_deref())?;
        w.optional_text_element("cbc:District", addr.district.as_deref())?;
        if let Some(line) = &addr.line {
            w.start_element("cac:AddressLine")?;
            w.text_element("cbc:Line", line)?;
            w.end_element("cac:AddressLine")?;
        }
        write_country(w, &addr.country_code)?;
        w.end_element("cac:RegistrationAddress")?;
    }
    w.end_element("cac:PartyLegalEntity")?;

    if let Some(addr) = &party.postal_address {
        w.start_element("cac:PostalAddress")?;
        w.optional_text_element("cbc:StreetName", addr.line.as_deref())?;
        w.optional_text_element("cbc:CitySubdivisionName", addr.district.as_deref())?;
        w.optional_text_element("cbc:CityName", addr.city.as_deref())?;
        w.optional_text_element("cbc:CountrySubentity", addr.subentity.as_deref())?;
        write_country(w, &addr.country_code)?;
        w.end_element("cac:PostalAddress")?;
    }

    if let Some(contact) = &party.contact {
        w.start_element("cac:Contact")?;
        w.optional_text_element("cbc:Name", contact.name.as_deref())?;
        w.optional_text_element("cbc:Telephone", contact.telephone.as_deref())?;
        w.optional_text_element("cbc:ElectronicMail", contact.email.as_deref())?;
        w.end_element("cac:Contact")?;
    }

    w.end_element("cac:Party")?;
    Ok(())
}

fn write_country(w: &mut XmlWriter, code: &str) -> Result<(), CpeError> {
    w.start_element("cac:Country")?;
    w.text_element_with_attrs(
        "cbc:IdentificationCode",
        code,
        &[
            ("listID", "ISO 3166-1"),
            (
                "listAgencyName",
                "United Nations Economic Commission for Europe",
            ),
            ("listName", "Country"),
        ],
    )?;
    w.end_element("cac:Country")?;
    Ok(())
}

fn write_tax_total(
    w: &mut XmlWriter,
    total: &SchemaTaxTotal,
    currency: &str,
) -> Result<(), CpeError> {
    w.start_element("cac:TaxTotal")?;
    w.amount_element("cbc:TaxAmount", total.amount, currency)?;
    for sub in &total.subtotals {
        w.start_element("cac:TaxSubtotal")?;
        w.amount_element("cbc:TaxableAmount", sub.taxable_amount, currency)?;
        w.amount_element("cbc:TaxAmount", sub.amount, currency)?;
        write_tax_category(w, "cac:TaxCategory", &sub.category)?;
        w.end_element("cac:TaxSubtotal")?;
    }
    w.end_element("cac:TaxTotal")?;
    Ok(())
}

fn write_tax_category(
    w: &mut XmlWriter,
    tag: &str,
    category: &SchemaTaxCategory,
) -> Result<(), CpeError> {
    w.start_element(tag)?;
    w.text_element_with_attrs(
        "cbc:ID",
        &category.id,
        &[
            ("schemeID", "UN/ECE 5305"),
            ("schemeName", "Tax Category Identifier"),
            ("schemeAgencyName", "United Nations Economic Commission for Europe"),
        ],
    )?;
    if let Some(pct) = category.percent {
        w.text_element("cbc:Percent", &format_decimal(pct))?;
    }
    if let Some(code) = &category.exemption_reason_code {
        w.text_element_with_attrs(
            "cbc:TaxExemptionReasonCode",
            code,
            &[
                ("listAgencyName", "PE:SUNAT"),
                ("listName", "Afectacion del IGV"),
                ("listURI", "urn:pe:gob:sunat:cpe:see:gem:catalogos:catalogo07"),
            ],
        )?;
    }
    w.start_element("cac:TaxScheme")?;
    w.text_element_with_attrs(
        "cbc:ID",
        &category.scheme.id,
        &[
            ("schemeID", "UN/ECE 5153"),
            ("schemeName", "Codigo de tributos"),
            ("schemeAgencyName", "PE:SUNAT"),
        ],
    )?;
    w.text_element("cbc:Name", &category.scheme.name)?;
    w.text_element("cbc:TaxTypeCode", &category.scheme.type_code)?;
    w.end_element("cac:TaxScheme")?;
    w.end_element(tag)?;
    Ok(())
}

fn write_line(
    w: &mut XmlWriter,
    kind: &SchemaKind,
    line: &SchemaLine,
    currency: &str,
) -> Result<(), CpeError> {
    let tag = kind.line_element();
    w.start_element(tag)?;
    w.text_element("cbc:ID", &line.id)?;
    w.quantity_element(kind.quantity_element(), line.quantity, &line.unit_code)?;
    w.amount_element("cbc:LineExtensionAmount", line.line_extension_amount, currency)?;

    if let Some(alt) = &line.alternative_price {
        w.start_element("cac:PricingReference")?;
        w.start_element("cac:AlternativeConditionPrice")?;
        w.amount_element("cbc:PriceAmount", alt.amount, currency)?;
        w.text_element("cbc:PriceTypeCode", &alt.type_code)?;
        w.end_element("cac:AlternativeConditionPrice")?;
        w.end_element("cac:PricingReference")?;
    }

    if let Some(tax) = &line.tax_total {
        write_tax_total(w, tax, currency)?;
    }

    w.start_element("cac:Item")?;
    w.text_element("cbc:Description", &line.description)?;
    if let Some(id) = &line.sellers_item_id {
        w.start_element("cac:SellersItemIdentification")?;
        w.text_element("cbc:ID", id)?;
        w.end_element("cac:SellersItemIdentification")?;
    }
    write_tax_category(w, "cac:ClassifiedTaxCategory", &line.classified_tax_category)?;
    w.end_element("cac:Item")?;

    w.start_element("cac:Price")?;
    w.amount_element("cbc:PriceAmount", line.price, currency)?;
    w.end_element("cac:Price")?;

    w.end_element(tag)?;
    Ok(())
}
