//! Typed SAM alignment records.
//!
//! [`AlignmentRecord`] wraps a noodles [`RecordBuf`] decoded once from a SAM line against the
//! run's header, then owned by whichever pipeline stage currently holds it. Trimming, overlap
//! correction and consensus calling mutate it through explicit setters; nothing downstream
//! re-parses the text.
//!
//! Records are checked while decoding for the invariants the rest of the pipeline relies on:
//! exactly one of READ1/READ2 set, a well-formed CIGAR with no zero-length operations, and
//! SEQ/QUAL lengths that agree with the CIGAR.

use std::fmt::Write as _;
use std::io::{self, Write};

use noodles::core::Position;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::io::Write as AlignmentWrite;
use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record::{Flags, MappingQuality};
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::sam::alignment::record_buf::{Cigar, QualityScores, Sequence};
use noodles::sam::{self, Header};

use crate::errors::{DedupError, Result};
use crate::phred::PhredScore;

/// Mapping quality written when none is available.
const MISSING_MAPPING_QUALITY: u8 = 255;

/// Longest prefix of a bad line echoed back in error messages.
const MAX_ERROR_LINE: usize = 120;

/// Maps a noodles CIGAR kind back to its SAM character.
fn kind_to_char(kind: Kind) -> char {
    match kind {
        Kind::Match => 'M',
        Kind::Insertion => 'I',
        Kind::Deletion => 'D',
        Kind::Skip => 'N',
        Kind::SoftClip => 'S',
        Kind::HardClip => 'H',
        Kind::Pad => 'P',
        Kind::SequenceMatch => '=',
        Kind::SequenceMismatch => 'X',
    }
}

/// Returns true for operations that align a read base to a reference base.
#[inline]
#[must_use]
pub fn is_aligned(kind: Kind) -> bool {
    matches!(kind, Kind::Match | Kind::SequenceMatch | Kind::SequenceMismatch)
}

#[inline]
fn is_clip(kind: Kind) -> bool {
    matches!(kind, Kind::SoftClip | Kind::HardClip)
}

/// Number of reference bases spanned by CIGAR operations.
#[must_use]
pub fn reference_len(ops: &[Op]) -> usize {
    ops.iter().filter(|op| op.kind().consumes_reference()).map(|op| op.len()).sum()
}

/// Number of read bases described by CIGAR operations, including soft clips.
#[must_use]
pub fn read_len(ops: &[Op]) -> usize {
    ops.iter().filter(|op| op.kind().consumes_read()).map(|op| op.len()).sum()
}

/// Total soft and hard clipping before the first non-clip operation.
#[must_use]
pub fn leading_clip(ops: &[Op]) -> usize {
    ops.iter().take_while(|op| is_clip(op.kind())).map(|op| op.len()).sum()
}

/// Total soft and hard clipping after the last non-clip operation.
#[must_use]
pub fn trailing_clip(ops: &[Op]) -> usize {
    ops.iter().rev().take_while(|op| is_clip(op.kind())).map(|op| op.len()).sum()
}

/// Formats CIGAR operations as SAM text, `*` when there are none.
///
/// # Examples
/// ```
/// use cfdedup_lib::record::format_cigar;
/// use noodles::sam::alignment::record::cigar::Op;
/// use noodles::sam::alignment::record::cigar::op::Kind;
///
/// assert_eq!(format_cigar(&[Op::new(Kind::SoftClip, 2), Op::new(Kind::Match, 8)]), "2S8M");
/// assert_eq!(format_cigar(&[]), "*");
/// ```
#[must_use]
pub fn format_cigar(ops: &[Op]) -> String {
    if ops.is_empty() {
        return String::from("*");
    }
    let mut result = String::with_capacity(ops.len() * 4);
    for op in ops {
        let _ = write!(result, "{}{}", op.len(), kind_to_char(op.kind()));
    }
    result
}

/// Builds a CIGAR from operations, merging adjacent runs of the same kind and dropping empty ones.
#[must_use]
pub fn merge_ops(ops: impl IntoIterator<Item = Op>) -> Cigar {
    let mut merged: Vec<Op> = Vec::new();
    for op in ops {
        if op.len() == 0 {
            continue;
        }
        match merged.last_mut() {
            Some(last) if last.kind() == op.kind() => {
                *last = Op::new(op.kind(), last.len() + op.len());
            }
            _ => merged.push(op),
        }
    }
    Cigar::from(merged)
}

fn truncate_for_error(line: &str) -> String {
    line.chars().take(MAX_ERROR_LINE).collect()
}

/// Checks every CIGAR operation of a not-yet-decoded record.
fn validate_cigar(raw: &sam::Record) -> Result<()> {
    let cigar = raw.cigar();
    let malformed = |reason: String| DedupError::MalformedCigar {
        cigar: String::from_utf8_lossy(cigar.as_ref()).into_owned(),
        reason,
    };
    for op in cigar.iter() {
        let op = op.map_err(|e| malformed(e.to_string()))?;
        if op.len() == 0 {
            return Err(malformed(format!("operation '{}' has zero length", kind_to_char(op.kind()))));
        }
    }
    Ok(())
}

/// One decoded SAM record.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentRecord {
    record: RecordBuf,
}

impl AlignmentRecord {
    /// Decodes one tab-delimited SAM record line (with or without the trailing newline).
    ///
    /// Reference names are resolved against `header`.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::InvalidReadFlags`] for a flag with both or neither of READ1/READ2
    /// set, [`DedupError::MalformedCigar`] for an undecodable or zero-length CIGAR operation, and
    /// [`DedupError::MalformedRecord`] for anything else noodles rejects (missing fields,
    /// non-numeric positions, a reference missing from the header) or a SEQ/QUAL/CIGAR length
    /// disagreement.
    pub fn from_sam_line(header: &Header, line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\n', '\r']);
        let malformed =
            |reason: String| DedupError::MalformedRecord { line: truncate_for_error(line), reason };

        let mut reader = sam::io::Reader::new(line.as_bytes());
        let mut raw = sam::Record::default();
        reader.read_record(&mut raw).map_err(|e| malformed(e.to_string()))?;

        let flags = raw.flags().map_err(|e| malformed(format!("invalid FLAG: {e}")))?;
        if flags.is_first_segment() == flags.is_last_segment() {
            let name = raw.name().map(|n| String::from_utf8_lossy(n).into_owned()).unwrap_or_default();
            return Err(DedupError::InvalidReadFlags { name, flags: u16::from(flags) });
        }
        validate_cigar(&raw)?;

        let record =
            RecordBuf::try_from_alignment_record(header, &raw).map_err(|e| malformed(e.to_string()))?;
        let sequence_len = record.sequence().len();
        let quality_len = record.quality_scores().as_ref().len();
        if quality_len > 0 && quality_len != sequence_len {
            return Err(malformed(format!(
                "SEQ has {sequence_len} bases but QUAL has {quality_len} scores"
            )));
        }
        let ops = record.cigar().as_ref();
        if !ops.is_empty() && sequence_len > 0 && read_len(ops) != sequence_len {
            return Err(malformed(format!(
                "CIGAR {} describes {} bases but SEQ has {sequence_len}",
                format_cigar(ops),
                read_len(ops)
            )));
        }

        Ok(Self { record })
    }

    /// Encodes this record as one SAM line through the noodles writer.
    ///
    /// # Errors
    /// Returns an error if the record cannot be encoded against `header` or `out` fails.
    pub fn write_sam_line<W: Write>(&self, header: &Header, out: W) -> io::Result<()> {
        let mut writer = sam::io::Writer::new(out);
        writer.write_alignment_record(header, &self.record)
    }

    /// The underlying noodles record.
    #[must_use]
    pub fn as_record_buf(&self) -> &RecordBuf {
        &self.record
    }

    /// Read name (QNAME), `*` when absent.
    #[must_use]
    pub fn name(&self) -> &str {
        self.record.name().and_then(|n| std::str::from_utf8(n).ok()).unwrap_or("*")
    }

    /// SAM flag bits.
    #[must_use]
    pub fn flags(&self) -> Flags {
        self.record.flags()
    }

    /// Header index of the reference sequence, `None` when unplaced.
    #[must_use]
    pub fn reference_id(&self) -> Option<usize> {
        self.record.reference_sequence_id()
    }

    /// 1-based leftmost aligned position; 0 when unset.
    #[must_use]
    pub fn position(&self) -> u32 {
        self.record
            .alignment_start()
            .map_or(0, |p| u32::try_from(usize::from(p)).unwrap_or(u32::MAX))
    }

    /// Mapping quality; 255 when unavailable.
    #[must_use]
    pub fn mapping_quality(&self) -> u8 {
        self.record.mapping_quality().map_or(MISSING_MAPPING_QUALITY, |mq| mq.get())
    }

    /// Decoded CIGAR operations.
    #[must_use]
    pub fn cigar_ops(&self) -> &[Op] {
        self.record.cigar().as_ref()
    }

    /// CIGAR as SAM text.
    #[must_use]
    pub fn cigar_string(&self) -> String {
        format_cigar(self.cigar_ops())
    }

    /// Read bases.
    #[must_use]
    pub fn sequence(&self) -> &[u8] {
        self.record.sequence().as_ref()
    }

    /// Raw Phred base qualities.
    #[must_use]
    pub fn qualities(&self) -> &[PhredScore] {
        self.record.quality_scores().as_ref()
    }

    /// True when this is the first segment of the template.
    #[must_use]
    pub fn is_read1(&self) -> bool {
        self.flags().is_first_segment()
    }

    /// True when the read itself is aligned.
    #[must_use]
    pub fn is_mapped(&self) -> bool {
        !self.flags().is_unmapped()
    }

    /// True when the read is aligned to the reverse strand.
    #[must_use]
    pub fn is_reverse(&self) -> bool {
        self.flags().is_reverse_complemented()
    }

    /// True for secondary, supplementary, or pairs where neither mate aligned.
    #[must_use]
    pub fn is_filtered(&self) -> bool {
        let flags = self.flags();
        flags.is_secondary()
            || flags.is_supplementary()
            || (flags.is_unmapped() && flags.is_mate_unmapped())
    }

    /// 1-based inclusive last aligned reference position.
    ///
    /// Equals [`Self::position`] for unmapped reads and reads without a CIGAR.
    #[must_use]
    pub fn alignment_end(&self) -> u32 {
        let span = u32::try_from(reference_len(self.cigar_ops())).unwrap_or(u32::MAX);
        if !self.is_mapped() || span == 0 {
            self.position()
        } else {
            self.position().saturating_add(span - 1)
        }
    }

    /// Soft and hard clipping before the first aligned operation.
    #[must_use]
    pub fn leading_clip(&self) -> usize {
        leading_clip(self.cigar_ops())
    }

    /// Alignment start extended by any leading clipping.
    #[must_use]
    pub fn unclipped_start(&self) -> i64 {
        i64::from(self.position()) - self.leading_clip() as i64
    }

    /// Alignment end extended by any trailing clipping.
    #[must_use]
    pub fn unclipped_end(&self) -> i64 {
        i64::from(self.alignment_end()) + trailing_clip(self.cigar_ops()) as i64
    }

    /// Unclipped 5' reference position, accounting for strand.
    #[must_use]
    pub fn five_prime_position(&self) -> i64 {
        if self.is_reverse() { self.unclipped_end() } else { self.unclipped_start() }
    }

    /// Value of a string (`Z`) optional field, if present.
    #[must_use]
    pub fn tag_value(&self, tag: &[u8; 2]) -> Option<&str> {
        match self.record.data().get(&Tag::from(*tag)) {
            Some(Value::String(value)) => std::str::from_utf8(value).ok(),
            _ => None,
        }
    }

    /// Value of an integer optional field, if present.
    #[must_use]
    pub fn int_tag_value(&self, tag: &[u8; 2]) -> Option<i64> {
        self.record.data().get(&Tag::from(*tag)).and_then(Value::as_int)
    }

    /// Replaces the read bases.
    pub fn set_sequence(&mut self, sequence: Vec<u8>) {
        *self.record.sequence_mut() = Sequence::from(sequence);
    }

    /// Replaces the base qualities.
    pub fn set_qualities(&mut self, qualities: Vec<PhredScore>) {
        *self.record.quality_scores_mut() = QualityScores::from(qualities);
    }

    /// Replaces the CIGAR.
    pub fn set_cigar(&mut self, cigar: Cigar) {
        *self.record.cigar_mut() = cigar;
    }

    /// Moves the alignment start.
    pub fn set_position(&mut self, position: u32) {
        *self.record.alignment_start_mut() =
            usize::try_from(position).ok().and_then(Position::new);
    }

    /// Updates the mate's alignment start (PNEXT).
    pub fn set_mate_position(&mut self, position: u32) {
        *self.record.mate_alignment_start_mut() =
            usize::try_from(position).ok().and_then(Position::new);
    }

    /// Replaces the observed template length (TLEN).
    pub fn set_template_length(&mut self, template_length: i32) {
        *self.record.template_length_mut() = template_length;
    }

    /// Replaces the mapping quality.
    pub fn set_mapping_quality(&mut self, mapping_quality: u8) {
        *self.record.mapping_quality_mut() = MappingQuality::new(mapping_quality);
    }

    /// Adds or replaces an integer optional field.
    pub fn set_int_tag(&mut self, tag: &[u8; 2], value: i32) {
        self.record.data_mut().insert(Tag::from(*tag), Value::from(value));
    }
}
