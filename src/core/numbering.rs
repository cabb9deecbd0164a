use super::error::CpeError;
use super::types::DocumentType;

/// Highest correlative a series can issue (eight digits).
pub const MAX_CORRELATIVE: u64 = 99_999_999;

/// Correlative number generator for one series.
///
/// SUNAT numbers each series independently from 1 to 99999999, without
/// gaps. Numbers are rendered zero-padded to eight digits, e.g.
/// "F001-00000042".
#[derive(Debug, Clone)]
pub struct SeriesSequence {
    series: String,
    next_number: u64,
}

impl SeriesSequence {
    /// Create a new sequence starting at 1.
    pub fn new(series: impl Into<String>) -> Self {
        Self {
            series: series.into(),
            next_number: 1,
        }
    }

    /// Create a sequence continuing from a given number.
    pub fn starting_at(series: impl Into<String>, next_number: u64) -> Self {
        Self {
            series: series.into(),
            next_number,
        }
    }

    pub fn series(&self) -> &str {
        &self.series
    }

    /// Issue the next number, failing once the series is exhausted.
    pub fn next_number(&mut self) -> Result<String, CpeError> {
        if self.next_number == 0 || self.next_number > MAX_CORRELATIVE {
            return Err(CpeError::Numbering(format!(
                "series {} has no numbers left (next would be {})",
                self.series, self.next_number
            )));
        }
        let number = format_correlative(self.next_number);
        self.next_number += 1;
        Ok(number)
    }

    /// Preview the next number without consuming it.
    pub fn peek(&self) -> String {
        format_correlative(self.next_number)
    }

    /// Get the next number that will be issued (unformatted).
    pub fn next_raw(&self) -> u64 {
        self.next_number
    }
}

/// Zero-pad a correlative to eight digits.
pub fn format_correlative(number: u64) -> String {
    format!("{number:0>8}")
}

/// `{ruc}-{type}-{series}-{number}`: the file stem used for the ZIP and its
/// single XML entry.
pub fn document_file_name(
    ruc: &str,
    document_type: DocumentType,
    series: &str,
    number: &str,
) -> String {
    format!("{ruc}-{}-{series}-{number}", document_type.code())
}
