#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Errors are fine. Canonical output must be a fixed point.
    if let Ok(once) = comprobante::xmldsig::canonicalize(data) {
        let twice = comprobante::xmldsig::canonicalize(&once).expect("canonical form reparses");
        assert_eq!(once, twice);
    }
});
