//! UMI (Unique Molecular Identifier) partitioning of position families
//!
//! A position family can hold several independent molecules that happened to share start
//! coordinates. When a UMI mode is configured, [`UmiPartitioner`] splits each family into
//! sub-families using the strategy chosen once at configuration time.

pub mod assigner;

use std::fmt;
use std::str::FromStr;

use crate::errors::{DedupError, Result};
use crate::pairing::ReadPair;

pub use assigner::{ExactUmiAssigner, FuzzyUmiAssigner, UmiAssigner, split_umi};

/// Default SAM tag holding the UMI.
pub const DEFAULT_UMI_TAG: [u8; 2] = *b"RX";

/// How families are sub-partitioned by UMI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum UmiMode {
    /// No UMI partitioning; position families are final
    #[default]
    None,
    /// Each distinct UMI tag value is its own sub-family
    Exact,
    /// Two-part `<left>-<right>` UMIs, joined transitively when either half matches
    Fuzzy,
}

impl UmiMode {
    /// Builds the clustering strategy for this mode, or `None` when partitioning is disabled.
    #[must_use]
    pub fn new_assigner(&self) -> Option<Box<dyn UmiAssigner>> {
        match self {
            UmiMode::None => None,
            UmiMode::Exact => Some(Box::new(ExactUmiAssigner)),
            UmiMode::Fuzzy => Some(Box::new(FuzzyUmiAssigner)),
        }
    }
}

impl fmt::Display for UmiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UmiMode::None => "none",
            UmiMode::Exact => "exact",
            UmiMode::Fuzzy => "fuzzy",
        })
    }
}

impl FromStr for UmiMode {
    type Err = DedupError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(UmiMode::None),
            "exact" => Ok(UmiMode::Exact),
            "fuzzy" => Ok(UmiMode::Fuzzy),
            other => Err(DedupError::InvalidParameter {
                parameter: "umi".to_string(),
                reason: format!("'{other}' is not one of none, exact, fuzzy"),
            }),
        }
    }
}

/// Splits position families into UMI sub-families.
pub struct UmiPartitioner {
    mode: UmiMode,
    tag: [u8; 2],
    assigner: Option<Box<dyn UmiAssigner>>,
}

impl UmiPartitioner {
    /// Creates a partitioner reading UMIs from `tag`.
    #[must_use]
    pub fn new(mode: UmiMode, tag: [u8; 2]) -> Self {
        Self { mode, tag, assigner: mode.new_assigner() }
    }

    fn tag_name(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }

    /// Partitions a family's pairs into sub-families, preserving arrival order within each.
    ///
    /// With [`UmiMode::None`] the input is returned as a single sub-family.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::MissingUmi`] if a pair has no UMI tag, or
    /// [`DedupError::InvalidUmi`] if fuzzy mode finds a UMI without two halves.
    pub fn partition(&self, pairs: Vec<ReadPair>) -> Result<Vec<Vec<ReadPair>>> {
        let Some(assigner) = &self.assigner else {
            return Ok(vec![pairs]);
        };

        let mut umis: Vec<&str> = Vec::with_capacity(pairs.len());
        for pair in &pairs {
            let umi = pair.tag_value(&self.tag).ok_or_else(|| DedupError::MissingUmi {
                name: pair.name().to_string(),
                tag: self.tag_name(),
            })?;
            if self.mode == UmiMode::Fuzzy && split_umi(umi).is_none() {
                return Err(DedupError::InvalidUmi {
                    name: pair.name().to_string(),
                    umi: umi.to_string(),
                });
            }
            umis.push(umi);
        }

        let ids = assigner.assign(&umis);
        let n_groups = ids.iter().max().map_or(0, |&m| m + 1);
        let mut groups: Vec<Vec<ReadPair>> = (0..n_groups).map(|_| Vec::new()).collect();
        for (pair, id) in pairs.into_iter().zip(ids) {
            groups[id].push(pair);
        }
        Ok(groups)
    }
}
