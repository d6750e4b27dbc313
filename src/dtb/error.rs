// ABOUTME: Error types for device tree blob parsing
// ABOUTME: Provides no_std compatible error handling for DTB operations

use core::fmt;

/// Error type for device tree blob parsing.
///
/// Every variant is a parse-time failure: once [`DeviceTree::parse`] returns
/// `Ok`, queries cannot fail, only miss. Misses are reported as `None` or `0`
/// return values, never through this type.
///
/// [`DeviceTree::parse`]: super::DeviceTree::parse
///
/// # Examples
///
/// ```rust
/// # use dtb_arena::{DeviceTree, DtbError};
/// let not_a_dtb = [0u8; 64];
/// match DeviceTree::parse(&not_a_dtb) {
///     Err(DtbError::InvalidMagic) => println!("not a DTB image"),
///     Err(e) => println!("broken DTB: {e}"),
///     Ok(_) => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DtbError {
    /// The first header field is not the DTB magic number (0xd00dfeed).
    InvalidMagic,

    /// The input ends before the fixed 40-byte header does.
    TruncatedHeader,

    /// A header offset or size places a block outside the input.
    MalformedHeader,

    /// The structure block ends in the middle of a node name or property.
    TruncatedStructure,

    /// A node's token stream reached the end of the structure block without
    /// an END_NODE tag.
    UnterminatedNode,

    /// A node or property name is not valid UTF-8.
    InvalidString,

    /// The node table filled up mid-parse.
    ///
    /// The table is sized by a pre-scan whose counts are upper bounds, so
    /// this only occurs for a blob whose structure block mutated between the
    /// scan and the parse, i.e. corruption.
    NodeTableExhausted,

    /// The property table filled up mid-parse. Same corruption caveat as
    /// [`DtbError::NodeTableExhausted`].
    PropTableExhausted,

    /// The tables would need more memory than the caller's byte budget
    /// allows. Only returned by [`DeviceTree::parse_with_limit`].
    ///
    /// [`DeviceTree::parse_with_limit`]: super::DeviceTree::parse_with_limit
    BufferLimitExceeded {
        /// Bytes the three tables would occupy.
        required: usize,
        /// The caller's budget.
        limit: usize,
    },
}

impl fmt::Display for DtbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DtbError::InvalidMagic => write!(f, "FDT has incorrect magic number"),
            DtbError::TruncatedHeader => write!(f, "input is shorter than the FDT header"),
            DtbError::MalformedHeader => {
                write!(f, "header places a block outside the input")
            }
            DtbError::TruncatedStructure => {
                write!(f, "structure block ends inside a name or property")
            }
            DtbError::UnterminatedNode => write!(f, "node has no terminating tag"),
            DtbError::InvalidString => write!(f, "name is not valid UTF-8"),
            DtbError::NodeTableExhausted => write!(f, "node table ran out of space"),
            DtbError::PropTableExhausted => write!(f, "property table ran out of space"),
            DtbError::BufferLimitExceeded { required, limit } => {
                write!(f, "tables need {required} bytes but the limit is {limit}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DtbError {}
