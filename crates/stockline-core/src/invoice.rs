//! # Invoice Numbers
//!
//! Formatting and parsing of `INV-YYYYMMDD-NNNNN` invoice numbers.
//!
//! ```text
//!   INV-20250115-00001
//!   └┬┘ └──┬───┘ └─┬─┘
//!    │     │       └── sequence within (day, scope), 5 digits minimum
//!    │     └────────── business date
//!    └──────────────── fixed marker
//!
//!   prefix = "INV-20250115"
//! ```
//!
//! Sequences past 99999 keep growing in width (`INV-20250115-100000`) up to
//! [`MAX_SEQUENCE`] and never wrap. The counter itself lives in
//! `stockline-db`.

use chrono::NaiveDate;

use crate::error::ValidationError;

/// Fixed marker at the start of every invoice number.
pub const INVOICE_MARKER: &str = "INV";

/// Minimum width of the sequence part.
pub const SEQUENCE_WIDTH: usize = 5;

/// Highest sequence the allocator issues for one `(day, scope)`.
pub const MAX_SEQUENCE: i64 = 99_999_999;

/// Returns the counter prefix for a business date.
pub fn prefix_for_date(date: NaiveDate) -> String {
    format!("{}-{}", INVOICE_MARKER, date.format("%Y%m%d"))
}

/// Formats a full invoice number from its prefix and sequence.
pub fn format_invoice_number(prefix: &str, sequence: i64) -> String {
    format!("{}-{:0width$}", prefix, sequence, width = SEQUENCE_WIDTH)
}

/// A parsed invoice number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceNumber {
    pub date: NaiveDate,
    pub sequence: i64,
}

impl InvoiceNumber {
    pub fn prefix(&self) -> String {
        prefix_for_date(self.date)
    }
}

impl std::fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_invoice_number(&self.prefix(), self.sequence))
    }
}

/// Parses an engine-issued invoice number.
///
/// Caller-supplied numbers do not have to follow this format; this is only
/// used to recognise numbers the allocator could have produced. A sequence
/// above [`MAX_SEQUENCE`] is outside that range and is rejected.
pub fn parse_invoice_number(raw: &str) -> Result<InvoiceNumber, ValidationError> {
    let invalid = |reason: &str| ValidationError::invalid("invoice_no", reason.to_string());

    let mut parts = raw.splitn(3, '-');
    let marker = parts.next().unwrap_or_default();
    let (Some(date_part), Some(seq_part)) = (parts.next(), parts.next()) else {
        return Err(invalid("expected INV-YYYYMMDD-NNNNN"));
    };

    if marker != INVOICE_MARKER {
        return Err(invalid("must start with INV"));
    }
    if date_part.len() != 8 {
        return Err(invalid("date must be YYYYMMDD"));
    }
    let date = NaiveDate::parse_from_str(date_part, "%Y%m%d")
        .map_err(|_| invalid("date must be YYYYMMDD"))?;

    if seq_part.len() < SEQUENCE_WIDTH || !seq_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("sequence must be at least 5 digits"));
    }
    let sequence: i64 = seq_part
        .parse()
        .map_err(|_| invalid("sequence is too large"))?;
    if sequence < 1 {
        return Err(invalid("sequence starts at 1"));
    }
    if sequence > MAX_SEQUENCE {
        return Err(invalid("sequence is too large"));
    }

    Ok(InvoiceNumber { date, sequence })
}
