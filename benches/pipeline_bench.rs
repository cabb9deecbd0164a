use chrono::NaiveDate;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rust_decimal_macros::dec;

use comprobante::core::*;
use comprobante::ubl;
use comprobante::xmldsig::{self, KeyMaterial};

fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

fn build_invoice(lines: u32) -> Document {
    let mut builder = DocumentBuilder::new(DocumentType::Invoice, "F001", "00000001", test_date())
        .issuer(
            PartyBuilder::ruc("20123456789", "EMPRESA DEMO SAC")
                .address(
                    AddressBuilder::new()
                        .line("AV. LARCO 123")
                        .district("MIRAFLORES")
                        .ubigeo("150122")
                        .build(),
                )
                .build(),
        )
        .recipient(PartyBuilder::ruc("20987654321", "CLIENTE SAC").build());

    for i in 1..=lines {
        builder = builder.add_line(
            LineItemBuilder::new(i, format!("P{i:04}"), format!("Item {i}"), dec!(2), "NIU", dec!(9.99))
                .tax(TaxType::Igv, dec!(18))
                .build(),
        );
    }

    builder.build().unwrap()
}

fn key() -> KeyMaterial {
    KeyMaterial::from_pem(
        include_str!("../tests/fixtures/signer_cert.pem"),
        include_str!("../tests/fixtures/signer_key.pem"),
    )
    .unwrap()
}

fn bench_build(c: &mut Criterion) {
    c.bench_function("build_invoice_10_lines", |b| {
        b.iter(|| black_box(build_invoice(10)));
    });
}

fn bench_totals(c: &mut Criterion) {
    let doc = build_invoice(1000);
    c.bench_function("calculate_totals_1000_lines", |b| {
        b.iter(|| {
            let mut d = doc.clone();
            calculate_totals(black_box(&mut d)).unwrap();
            black_box(d.totals)
        });
    });
}

fn bench_serialize(c: &mut Criterion) {
    let doc = build_invoice(10);
    c.bench_function("ubl_convert_serialize", |b| {
        b.iter(|| black_box(ubl::to_xml(black_box(&doc))));
    });
}

fn bench_sign(c: &mut Criterion) {
    let xml = ubl::to_xml(&build_invoice(10)).unwrap();
    let key = key();
    c.bench_function("xmldsig_sign", |b| {
        b.iter(|| black_box(xmldsig::sign(black_box(xml.as_bytes()), &key)));
    });

    let signed = xmldsig::sign(xml.as_bytes(), &key).unwrap();
    c.bench_function("xmldsig_verify", |b| {
        b.iter(|| black_box(xmldsig::verify(black_box(signed.as_bytes()))));
    });
}

criterion_group!(benches, bench_build, bench_totals, bench_serialize, bench_sign);
criterion_main!(benches);
