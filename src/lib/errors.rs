//! Custom error types for cfdedup operations.
//!
//! Every variant is fatal for a run: the pipeline has no partial-success mode, so these
//! errors propagate up to `main` and end the process with a non-zero exit code.

use thiserror::Error;

/// Result type alias for cfdedup operations
pub type Result<T> = std::result::Result<T, DedupError>;

/// Error type for cfdedup operations
#[derive(Error, Debug)]
pub enum DedupError {
    /// A SAM record line could not be split into its mandatory fields
    #[error("Malformed SAM record '{line}': {reason}")]
    MalformedRecord {
        /// The offending line (possibly truncated)
        line: String,
        /// Explanation of the problem
        reason: String,
    },

    /// A CIGAR string could not be decoded
    #[error("Malformed CIGAR '{cigar}': {reason}")]
    MalformedCigar {
        /// The CIGAR string as found in the record
        cigar: String,
        /// Explanation of the problem
        reason: String,
    },

    /// A record had both or neither of the READ1/READ2 flag bits set
    #[error("Read '{name}' has flag {flags}: exactly one of READ1 (0x40) and READ2 (0x80) must be set")]
    InvalidReadFlags {
        /// The read name
        name: String,
        /// The raw flag value
        flags: u16,
    },

    /// A record could not be encoded as SAM text
    #[error("Failed to encode read '{name}' as SAM")]
    RecordEncoding {
        /// The read name
        name: String,
        /// The underlying encoder error
        #[source]
        source: std::io::Error,
    },

    /// The input stream is not coordinate sorted
    #[error("Input is not coordinate sorted: {reason}")]
    UnsortedInput {
        /// Description of the violation
        reason: String,
    },

    /// UMI grouping was requested but a read pair carries no UMI tag
    #[error("Read '{name}' is missing the {tag} UMI tag required by the selected UMI mode")]
    MissingUmi {
        /// The read name
        name: String,
        /// The UMI tag that was expected
        tag: String,
    },

    /// A UMI could not be split into two halves for fuzzy grouping
    #[error("Read '{name}' has UMI '{umi}' which is not of the form <left>-<right>")]
    InvalidUmi {
        /// The read name
        name: String,
        /// The UMI value
        umi: String,
    },

    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// File format error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "BED", "statistics JSON")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// A worker or the writer thread stopped before the input was exhausted
    #[error("Worker failure: {reason}")]
    WorkerFailed {
        /// What was observed
        reason: String,
    },
}
