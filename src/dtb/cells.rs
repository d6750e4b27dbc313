// ABOUTME: Big-endian cell reader over the structure block
// ABOUTME: Centralizes endian conversion and runs the table-sizing pre-scan

use super::arena::TableCapacity;
use super::tokens::FdtToken;

/// The structure block viewed as a run of 32-bit big-endian cells.
///
/// All multi-byte reads from the block go through [`Cells::read`], the one
/// place endianness is converted. Byte-granular data (node names, property
/// payloads) is sliced out with [`Cells::bytes_from`], which needs no
/// alignment because it stays a byte slice.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cells<'a> {
    bytes: &'a [u8],
}

impl<'a> Cells<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Number of whole cells in the block.
    pub(crate) fn len(&self) -> usize {
        self.bytes.len() / 4
    }

    /// Read the big-endian cell at `index`, or `None` past the end.
    pub(crate) fn read(&self, index: usize) -> Option<u32> {
        let start = index.checked_mul(4)?;
        let raw = self.bytes.get(start..start + 4)?;
        Some(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// The byte tail of the block starting at cell `index`.
    pub(crate) fn bytes_from(&self, index: usize) -> &'a [u8] {
        let start = index.saturating_mul(4).min(self.bytes.len());
        &self.bytes[start..]
    }

    /// Count BEGIN_NODE and PROP cells to size the tables.
    ///
    /// Token-naive: every cell is inspected, including name bytes and
    /// property payloads, so a payload cell that happens to decode to 1 or 3
    /// inflates a count. The counts are upper bounds on what the parser will
    /// allocate, never undercounts.
    pub(crate) fn survey(&self) -> TableCapacity {
        let mut capacity = TableCapacity { nodes: 0, props: 0 };
        for index in 0..self.len() {
            match self.read(index) {
                Some(FdtToken::FDT_BEGIN_NODE) => capacity.nodes += 1,
                Some(FdtToken::FDT_PROP) => capacity.props += 1,
                _ => {}
            }
        }
        capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn cells_of(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    #[test]
    fn test_read_is_big_endian() {
        let bytes = [0x12, 0x34, 0x56, 0x78, 0xd0, 0x0d, 0xfe, 0xed];
        let cells = Cells::new(&bytes);
        assert_eq!(cells.len(), 2);
        assert_eq!(cells.read(0), Some(0x1234_5678));
        assert_eq!(cells.read(1), Some(0xd00d_feed));
        assert_eq!(cells.read(2), None);
    }

    #[test]
    fn test_partial_trailing_cell_is_ignored() {
        let bytes = [0, 0, 0, 1, 0xff, 0xff];
        let cells = Cells::new(&bytes);
        assert_eq!(cells.len(), 1);
        assert_eq!(cells.read(1), None);
    }

    #[test]
    fn test_bytes_from_cell_boundary() {
        let bytes = cells_of(&[1, 0x6370_7573]); // "cpus"
        let cells = Cells::new(&bytes);
        assert_eq!(cells.bytes_from(1), b"cpus");
        assert_eq!(cells.bytes_from(9), b"");
    }

    #[test]
    fn test_survey_counts_tokens() {
        let bytes = cells_of(&[1, 0, 3, 8, 0, 0, 0, 2, 9]);
        let capacity = Cells::new(&bytes).survey();
        assert_eq!(capacity.nodes, 1);
        assert_eq!(capacity.props, 1);
    }

    #[test]
    fn test_survey_overcounts_payload_aliases() {
        // The second 3 sits where a payload would be; the naive scan still
        // counts it, producing an upper bound rather than an exact count.
        let bytes = cells_of(&[1, 0, 3, 4, 0, 3, 2, 9]);
        let capacity = Cells::new(&bytes).survey();
        assert_eq!(capacity.nodes, 1);
        assert_eq!(capacity.props, 2);
    }
}
