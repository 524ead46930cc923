//! Windowed grouping of read pairs into duplicate families.
//!
//! The input is sorted by position only, so a family keeps growing until the stream has moved
//! past the furthest coordinate any of its members could complete at (its *horizon*). Horizons
//! are resolved against the pairer's current clip allowance each time they are compared, since
//! a duplicate's forward mate aligns to the right of the shared unclipped 5' end. Rather
//! than buffering a whole contig, the grouper keeps two rolling windows:
//!
//! - the **active** window, whose boundary is the largest horizon of any family in it, and
//! - the **next** window, holding families first seen with a horizon beyond that boundary.
//!
//! When the stream passes the active boundary every family in the active window is sealed at
//! once, the next window is promoted, and a fresh next window begins. A family is only ever
//! sealed after the stream has passed its own horizon, so no later record can join it.

use ahash::AHashMap;
use log::debug;

use crate::pairing::{Horizon, LocationKey, PairedFragment, ReadPair, StreamPosition};

/// All read pairs sharing a [`LocationKey`].
#[derive(Debug, Clone)]
pub struct Family {
    key: LocationKey,
    pairs: Vec<ReadPair>,
    horizon: Horizon,
}

impl Family {
    /// Starts a family from a single pair.
    #[must_use]
    pub fn new(key: LocationKey, pair: ReadPair, horizon: Horizon) -> Self {
        Self { key, pairs: vec![pair], horizon }
    }

    /// Builds a family directly from its members.
    #[must_use]
    pub fn from_pairs(key: LocationKey, pairs: Vec<ReadPair>, horizon: Horizon) -> Self {
        Self { key, pairs, horizon }
    }

    /// The family key.
    #[must_use]
    pub fn key(&self) -> &LocationKey {
        &self.key
    }

    /// The member pairs in arrival order.
    #[must_use]
    pub fn pairs(&self) -> &[ReadPair] {
        &self.pairs
    }

    /// Takes ownership of the members.
    #[must_use]
    pub fn into_pairs(self) -> Vec<ReadPair> {
        self.pairs
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when the family has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Where another member could still complete.
    #[must_use]
    pub fn horizon(&self) -> &Horizon {
        &self.horizon
    }

    fn push(&mut self, pair: ReadPair, horizon: &Horizon) {
        self.pairs.push(pair);
        self.horizon.merge(horizon);
    }
}

/// One of the two rolling buckets of open families.
#[derive(Debug, Default)]
struct Window {
    index: AHashMap<LocationKey, usize>,
    families: Vec<Family>,
    boundary: Option<Horizon>,
}

impl Window {
    fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    fn get_mut(&mut self, key: &LocationKey) -> Option<&mut Family> {
        self.index.get(key).map(|&i| &mut self.families[i])
    }

    fn extend_boundary(&mut self, horizon: &Horizon) {
        match &mut self.boundary {
            Some(boundary) => boundary.merge(horizon),
            None => self.boundary = Some(*horizon),
        }
    }

    fn add_to_existing(&mut self, fragment: PairedFragment) -> Result<(), PairedFragment> {
        let PairedFragment { pair, key, horizon } = fragment;
        match self.get_mut(&key) {
            Some(family) => {
                family.push(pair, &horizon);
                self.extend_boundary(&horizon);
                Ok(())
            }
            None => Err(PairedFragment { pair, key, horizon }),
        }
    }

    fn open(&mut self, fragment: PairedFragment) {
        let PairedFragment { pair, key, horizon } = fragment;
        self.index.insert(key, self.families.len());
        self.families.push(Family::new(key, pair, horizon));
        self.extend_boundary(&horizon);
    }

    fn take(&mut self) -> Vec<Family> {
        self.index.clear();
        self.boundary = None;
        std::mem::take(&mut self.families)
    }
}

/// Streaming two-window duplicate-family grouper.
///
/// Call [`WindowedFamilyGrouper::advance`] with the stream position of every record (paired
/// or not) and the pairer's clip allowance before adding any fragment it completed, then
/// [`WindowedFamilyGrouper::finish`] at end of input.
#[derive(Debug, Default)]
pub struct WindowedFamilyGrouper {
    active: Window,
    next: Window,
    extra_span: i64,
    clip_allowance: i64,
    windows_sealed: u64,
}

impl WindowedFamilyGrouper {
    /// Creates a grouper that seals a window as soon as the stream passes its boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a grouper that waits `extra_span` bases beyond each boundary before sealing.
    ///
    /// Family membership is identical for any span; only memory use and dispatch timing change.
    #[must_use]
    pub fn with_extra_span(extra_span: u32) -> Self {
        Self { extra_span: i64::from(extra_span), ..Self::default() }
    }

    fn is_past(&self, position: StreamPosition, boundary: &Horizon) -> bool {
        let (ordinal, end) = boundary.resolve(self.clip_allowance);
        position > (ordinal, end.saturating_add(self.extra_span))
    }

    /// Moves the stream to `position`, returning every family that can no longer grow.
    ///
    /// `clip_allowance` bounds the leading clip of any forward mate still to come; it never
    /// decreases across calls.
    pub fn advance(&mut self, position: StreamPosition, clip_allowance: i64) -> Vec<Family> {
        self.clip_allowance = self.clip_allowance.max(clip_allowance);
        let mut sealed = Vec::new();
        while let Some(boundary) = self.active.boundary {
            if !self.is_past(position, &boundary) {
                break;
            }
            let families = self.active.take();
            debug!(
                "Sealed window of {} families at boundary {:?} (stream at {:?})",
                families.len(),
                boundary.resolve(self.clip_allowance),
                position
            );
            self.windows_sealed += 1;
            sealed.extend(families);
            std::mem::swap(&mut self.active, &mut self.next);
        }
        sealed
    }

    /// Adds a completed pair to its family, opening a new family if needed.
    pub fn add(&mut self, fragment: PairedFragment) {
        let Err(fragment) = self.active.add_to_existing(fragment) else { return };
        let Err(fragment) = self.next.add_to_existing(fragment) else { return };

        let allowance = self.clip_allowance;
        match &self.active.boundary {
            Some(boundary) if fragment.horizon.resolve(allowance) > boundary.resolve(allowance) => {
                self.next.open(fragment);
            }
            _ => self.active.open(fragment),
        }
    }

    /// Seals both windows unconditionally at end of input.
    pub fn finish(&mut self) -> Vec<Family> {
        let mut sealed = self.active.take();
        sealed.extend(self.next.take());
        if !sealed.is_empty() {
            self.windows_sealed += 1;
        }
        sealed
    }

    /// Number of families still open in either window.
    #[must_use]
    pub fn open_families(&self) -> usize {
        self.active.families.len() + self.next.families.len()
    }

    /// True when no families are open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.next.is_empty()
    }

    /// Number of window seal events so far.
    #[must_use]
    pub fn windows_sealed(&self) -> u64 {
        self.windows_sealed
    }
}
