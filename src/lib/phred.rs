//! Phred quality score constants.
//!
//! Qualities are held decoded (raw Phred values) on [`crate::record::AlignmentRecord`]; noodles
//! converts them to and from the `+33` ASCII encoding at the SAM text boundary.

/// Minimum Phred score assigned to masked and no-call bases (Q2)
pub const MIN_PHRED: u8 = 2;

/// No-call base character
pub const NO_CALL_BASE: u8 = b'N';

/// Phred score type
pub type PhredScore = u8;
