//! Mate pairing over a coordinate-sorted record stream.
//!
//! The stream is sorted by position only, so a fragment's two mates can be separated by any
//! number of unrelated records. [`MatePairer`] buffers the first-seen mate of every fragment by
//! read name and emits a [`PairedFragment`] when the partner arrives. It also enforces the sort
//! order that the windowed grouper depends on.

use ahash::AHashMap;
use noodles::sam::Header;
use noodles::sam::alignment::record::cigar::op::Kind;

use crate::errors::{DedupError, Result};
use crate::record::AlignmentRecord;

/// A point in the sorted stream: (reference ordinal in order of appearance, 1-based position).
pub type StreamPosition = (usize, i64);

/// Ordinal used for unplaced records (reference `*`), which sort after every placed record.
pub const UNPLACED_ORDINAL: usize = usize::MAX;

/// Tracks reference order of appearance and verifies the input is coordinate sorted.
#[derive(Debug, Default)]
pub struct ReferenceOrder {
    reference_names: Vec<String>,
    ordinals: AHashMap<usize, usize>,
    current: Option<usize>,
    last_position: u32,
    unplaced_seen: bool,
}

impl ReferenceOrder {
    /// Creates an empty tracker for records decoded against `header`.
    #[must_use]
    pub fn new(header: &Header) -> Self {
        let reference_names = header
            .reference_sequences()
            .keys()
            .map(ToString::to_string)
            .collect();
        Self { reference_names, ..Self::default() }
    }

    fn reference_name(&self, id: usize) -> String {
        self.reference_names.get(id).cloned().unwrap_or_else(|| format!("#{id}"))
    }

    /// Records the position of the next record and returns its stream position.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::UnsortedInput`] if the position decreases within a reference, a
    /// reference reappears after another has started, or a placed record follows an unplaced
    /// one.
    pub fn observe(&mut self, record: &AlignmentRecord) -> Result<StreamPosition> {
        let position = record.position();
        let Some(id) = record.reference_id() else {
            self.unplaced_seen = true;
            return Ok((UNPLACED_ORDINAL, 0));
        };
        if self.unplaced_seen {
            return Err(DedupError::UnsortedInput {
                reason: format!(
                    "read '{}' at {}:{position} follows unplaced reads",
                    record.name(),
                    self.reference_name(id)
                ),
            });
        }

        match self.current {
            Some(current) if current == id => {
                if position < self.last_position {
                    let name = self.reference_name(id);
                    return Err(DedupError::UnsortedInput {
                        reason: format!(
                            "read '{}' at {name}:{position} follows {name}:{}",
                            record.name(),
                            self.last_position
                        ),
                    });
                }
                self.last_position = position;
            }
            _ => {
                if self.ordinals.contains_key(&id) {
                    let previous = self.current.map(|c| self.reference_name(c)).unwrap_or_default();
                    return Err(DedupError::UnsortedInput {
                        reason: format!(
                            "reference '{}' reappears after reference '{previous}'",
                            self.reference_name(id)
                        ),
                    });
                }
                self.ordinals.insert(id, self.ordinals.len());
                self.current = Some(id);
                self.last_position = position;
            }
        }
        Ok((self.ordinal(Some(id)), i64::from(position)))
    }

    /// Ordinal of an already-observed reference, [`UNPLACED_ORDINAL`] for unplaced or unseen
    /// references.
    #[must_use]
    pub fn ordinal(&self, reference_id: Option<usize>) -> usize {
        reference_id.and_then(|id| self.ordinals.get(&id).copied()).unwrap_or(UNPLACED_ORDINAL)
    }
}

/// Furthest stream position at which another member of a family could still complete.
///
/// Reverse-strand mates are keyed by their unclipped end, which no duplicate can align past,
/// so they contribute a fixed position. A forward-strand mate is keyed by its unclipped start,
/// but a duplicate with more leading clipping aligns further right; that part of the horizon
/// is resolved against a clip allowance only known as the stream progresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Horizon {
    fixed: StreamPosition,
    forward: Option<StreamPosition>,
}

impl Horizon {
    /// A horizon at exactly `position`.
    #[must_use]
    pub fn at(position: StreamPosition) -> Self {
        Self { fixed: position, forward: None }
    }

    /// Extends the fixed part to cover `position`.
    pub fn include(&mut self, position: StreamPosition) {
        self.fixed = self.fixed.max(position);
    }

    fn include_forward(&mut self, five_prime: StreamPosition) {
        self.forward = Some(self.forward.map_or(five_prime, |f| f.max(five_prime)));
    }

    /// Component-wise maximum of two horizons.
    pub fn merge(&mut self, other: &Self) {
        self.include(other.fixed);
        if let Some(forward) = other.forward {
            self.include_forward(forward);
        }
    }

    /// The concrete stream position, given the largest leading clip any later forward mate
    /// could carry.
    #[must_use]
    pub fn resolve(&self, clip_allowance: i64) -> StreamPosition {
        match self.forward {
            Some((ordinal, five_prime)) => {
                self.fixed.max((ordinal, five_prime.saturating_add(clip_allowance)))
            }
            None => self.fixed,
        }
    }
}

/// One mate's contribution to a [`LocationKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MateEnd {
    /// Reference ordinal.
    pub reference: usize,
    /// Unclipped 5' position.
    pub position: i64,
    /// True for reverse-strand alignments.
    pub reverse: bool,
}

/// Duplicate-family key derived from both mates' unclipped 5' ends and strands.
///
/// The two ends are stored in canonical order, so the key does not depend on which mate
/// arrived first. An unmapped mate contributes `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationKey {
    ends: [Option<MateEnd>; 2],
}

impl LocationKey {
    /// Builds a key from two mate ends in any order.
    #[must_use]
    pub fn new(a: Option<MateEnd>, b: Option<MateEnd>) -> Self {
        if a <= b { Self { ends: [a, b] } } else { Self { ends: [b, a] } }
    }

    /// The canonically ordered ends.
    #[must_use]
    pub fn ends(&self) -> &[Option<MateEnd>; 2] {
        &self.ends
    }
}

/// An owning pair of primary mates, ordered left-most then right-most.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadPair {
    left: AlignmentRecord,
    right: AlignmentRecord,
}

impl ReadPair {
    /// Pairs two mates of one fragment.
    ///
    /// `first` must be the mate seen first in the sorted stream; it becomes the left mate
    /// unless both mates start at the same position, in which case READ1 is placed left.
    ///
    /// # Errors
    ///
    /// Returns an error if both records are the same segment of the template.
    pub fn from_mates(first: AlignmentRecord, second: AlignmentRecord) -> Result<Self> {
        if first.is_read1() == second.is_read1() {
            return Err(DedupError::MalformedRecord {
                line: first.name().to_string(),
                reason: format!(
                    "two {} records share the read name",
                    if first.is_read1() { "READ1" } else { "READ2" }
                ),
            });
        }
        let same_start = first.reference_id() == second.reference_id()
            && first.position() == second.position();
        if same_start && second.is_read1() {
            Ok(Self { left: second, right: first })
        } else {
            Ok(Self { left: first, right: second })
        }
    }

    /// The left-most mate.
    #[must_use]
    pub fn left(&self) -> &AlignmentRecord {
        &self.left
    }

    /// The right-most mate.
    #[must_use]
    pub fn right(&self) -> &AlignmentRecord {
        &self.right
    }

    /// Mutable access to the left-most mate.
    pub fn left_mut(&mut self) -> &mut AlignmentRecord {
        &mut self.left
    }

    /// Mutable access to the right-most mate.
    pub fn right_mut(&mut self) -> &mut AlignmentRecord {
        &mut self.right
    }

    /// Mutable access to both mates at once.
    pub fn mates_mut(&mut self) -> (&mut AlignmentRecord, &mut AlignmentRecord) {
        (&mut self.left, &mut self.right)
    }

    /// The shared read name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.left.name()
    }

    /// Value of a string tag, taken from the left mate and falling back to the right mate.
    #[must_use]
    pub fn tag_value(&self, tag: &[u8; 2]) -> Option<&str> {
        self.left.tag_value(tag).or_else(|| self.right.tag_value(tag))
    }

    /// Appends both mates as SAM lines.
    ///
    /// # Errors
    /// Returns an error if either mate cannot be encoded against `header`.
    pub fn write_sam_lines(&self, header: &Header, out: &mut Vec<u8>) -> Result<()> {
        for mate in [&self.left, &self.right] {
            mate.write_sam_line(header, &mut *out).map_err(|source| DedupError::RecordEncoding {
                name: mate.name().to_string(),
                source,
            })?;
        }
        Ok(())
    }

    /// The duplicate-family key of this pair.
    #[must_use]
    pub fn location_key(&self, order: &ReferenceOrder) -> LocationKey {
        let end = |r: &AlignmentRecord| {
            r.is_mapped().then(|| MateEnd {
                reference: order.ordinal(r.reference_id()),
                position: r.five_prime_position(),
                reverse: r.is_reverse(),
            })
        };
        LocationKey::new(end(&self.left), end(&self.right))
    }

    /// Where another member of this pair's family could still complete.
    ///
    /// Placed mates contribute their reference ordinal and unclipped 5' position (forward mates
    /// through the clip allowance), unmapped placed mates their position, and unplaced mates
    /// [`UNPLACED_ORDINAL`].
    #[must_use]
    pub fn horizon(&self, order: &ReferenceOrder) -> Horizon {
        let mut horizon = Horizon::at((0, 0));
        for mate in [&self.left, &self.right] {
            let ordinal = order.ordinal(mate.reference_id());
            if ordinal == UNPLACED_ORDINAL {
                horizon.include((UNPLACED_ORDINAL, 0));
            } else if !mate.is_mapped() {
                horizon.include((ordinal, i64::from(mate.position())));
            } else if mate.is_reverse() {
                horizon.include((ordinal, mate.unclipped_end()));
            } else {
                horizon.include_forward((ordinal, mate.unclipped_start()));
            }
        }
        horizon
    }
}

/// A newly completed pair with its family key and horizon.
#[derive(Debug)]
pub struct PairedFragment {
    /// The completed pair.
    pub pair: ReadPair,
    /// Its duplicate-family key.
    pub key: LocationKey,
    /// Where another member of its family could still complete.
    pub horizon: Horizon,
}

/// Counters kept while pairing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PairingCounts {
    /// Records seen.
    pub records_read: u64,
    /// Secondary, supplementary and both-unmapped records dropped before pairing.
    pub records_filtered: u64,
    /// Pairs formed.
    pub pairs: u64,
}

/// Read bases plus hard clips: an upper bound on the record's leading clip.
fn query_length(record: &AlignmentRecord) -> i64 {
    let described: usize = record
        .cigar_ops()
        .iter()
        .filter(|op| op.kind().consumes_read() || op.kind() == Kind::HardClip)
        .map(|op| op.len())
        .sum();
    i64::try_from(described.max(record.sequence().len())).unwrap_or(i64::MAX)
}

/// Streams records and matches each read to its mate by name.
#[derive(Debug)]
pub struct MatePairer {
    order: ReferenceOrder,
    unpaired: AHashMap<String, AlignmentRecord>,
    counts: PairingCounts,
    longest_query: i64,
}

impl MatePairer {
    /// Creates an empty pairer for records decoded against `header`.
    #[must_use]
    pub fn new(header: &Header) -> Self {
        Self {
            order: ReferenceOrder::new(header),
            unpaired: AHashMap::new(),
            counts: PairingCounts::default(),
            longest_query: 0,
        }
    }

    /// Consumes one record in stream order.
    ///
    /// Returns the record's stream position and, if it completed a fragment, the new pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the record violates the sort order or duplicates a mate.
    pub fn push(
        &mut self,
        record: AlignmentRecord,
    ) -> Result<(StreamPosition, Option<PairedFragment>)> {
        self.counts.records_read += 1;
        let position = self.order.observe(&record)?;
        if record.is_filtered() {
            self.counts.records_filtered += 1;
            return Ok((position, None));
        }
        self.longest_query = self.longest_query.max(query_length(&record));

        let Some(first) = self.unpaired.remove(record.name()) else {
            self.unpaired.insert(record.name().to_string(), record);
            return Ok((position, None));
        };

        let pair = ReadPair::from_mates(first, record)?;
        self.counts.pairs += 1;
        let key = pair.location_key(&self.order);
        let mut horizon = pair.horizon(&self.order);
        horizon.include(position);
        Ok((position, Some(PairedFragment { pair, key, horizon })))
    }

    /// Longest query (read bases plus hard clips) of any record paired or buffered so far.
    ///
    /// No forward mate seen so far has a leading clip this long, so it bounds how far right of
    /// its unclipped 5' end a duplicate can align while read lengths stay within that seen.
    #[must_use]
    pub fn clip_allowance(&self) -> i64 {
        self.longest_query
    }

    /// Number of reads still waiting for their mate.
    #[must_use]
    pub fn unpaired_len(&self) -> usize {
        self.unpaired.len()
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn counts(&self) -> PairingCounts {
        self.counts
    }
}
