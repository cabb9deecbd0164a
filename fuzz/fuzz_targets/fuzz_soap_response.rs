#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = comprobante::sunat::process_send_bill(200, data);
    let _ = comprobante::sunat::process_status(200, data);
    let _ = comprobante::sunat::process_cdr(500, data);
});
