//! Catalog 03 units of measure.
//!
//! SUNAT adopts UN/ECE Recommendation 20 for line quantities. This is the
//! subset that shows up on retail and service vouchers.

/// Check whether `code` is a known catalog 03 unit code.
pub fn is_known_unit_code(code: &str) -> bool {
    UNIT_CODES.binary_search(&code).is_ok()
}

/// Sorted for binary search.
static UNIT_CODES: &[&str] = &[
    "4A",  // Bobinas
    "BE",  // Fardo
    "BG",  // Bolsa
    "BJ",  // Balde
    "BLL", // Barriles
    "BO",  // Botellas
    "BX",  // Caja
    "C62", // Piezas
    "CA",  // Latas
    "CEN", // Ciento de unidades
    "CJ",  // Conos
    "CMK", // Centímetro cuadrado
    "CMQ", // Centímetro cúbico
    "CMT", // Centímetro lineal
    "CT",  // Cartones
    "CY",  // Cilindro
    "DAY", // Día
    "DZN", // Docena
    "GLL", // Galón
    "GRM", // Gramo
    "HUR", // Hora
    "KGM", // Kilogramo
    "KT",  // Kit
    "KWH", // Kilovatio hora
    "LTR", // Litro
    "MGM", // Miligramo
    "MIL", // Millares
    "MLT", // Mililitro
    "MMT", // Milímetro
    "MON", // Mes
    "MTK", // Metro cuadrado
    "MTQ", // Metro cúbico
    "MTR", // Metro
    "NIU", // Unidad (bienes)
    "PK",  // Paquete
    "PR",  // Par
    "SET", // Juego
    "ST",  // Pliego
    "TNE", // Tonelada
    "TU",  // Tubos
    "ZZ",  // Unidad (servicios)
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_sorted() {
        let mut sorted = UNIT_CODES.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, UNIT_CODES);
    }

    #[test]
    fn common_codes() {
        assert!(is_known_unit_code("NIU"));
        assert!(is_known_unit_code("ZZ"));
        assert!(is_known_unit_code("KGM"));
        assert!(!is_known_unit_code("niu"));
        assert!(!is_known_unit_code("XYZ"));
    }
}
