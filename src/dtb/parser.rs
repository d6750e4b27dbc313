// ABOUTME: Recursive-descent parser for the DTB structure block
// ABOUTME: Builds the arena tables and applies phandle and cell-width properties

use super::arena::{Arena, NO_IDX};
use super::cells::Cells;
use super::error::DtbError;
use super::header::FdtHeader;
use super::prop::{Prop, first_cell_of};
use super::tokens::FdtToken;
use super::tree::{DeviceTree, Node};

/// Cell widths a top-level node starts from when the blob declares nothing.
const ROOT_ADDR_CELLS: u8 = 2;
const ROOT_SIZE_CELLS: u8 = 1;

/// One-shot builder: validates the header, sizes the tables from the
/// pre-scan, then descends the token stream. Consumed by
/// [`DeviceTree::parse`]; never observable in a partial state.
pub(crate) struct Parser<'a> {
    cells: Cells<'a>,
    strings: &'a [u8],
    arena: Arena<'a>,
}

impl<'a> Parser<'a> {
    pub(crate) fn run(blob: &'a [u8], limit: Option<usize>) -> Result<DeviceTree<'a>, DtbError> {
        let header = FdtHeader::parse(blob)?;
        let (structs, strings) = header.blocks(blob)?;
        let cells = Cells::new(structs);
        let capacity = cells.survey();
        if let Some(limit) = limit {
            let required = capacity.arena_bytes();
            if required > limit {
                return Err(DtbError::BufferLimitExceeded { required, limit });
            }
        }
        let mut parser = Parser {
            cells,
            strings,
            arena: Arena::with_capacity(capacity),
        };
        let root = parser.parse_top_level()?;
        Ok(DeviceTree::from_parts(parser.arena, root))
    }

    /// Scan for top-level BEGIN_NODE tokens and chain the parsed nodes as
    /// siblings in encounter order; the first becomes the head.
    fn parse_top_level(&mut self) -> Result<u32, DtbError> {
        let mut head = NO_IDX;
        let mut tail = NO_IDX;
        let mut offset = 0;
        while offset < self.cells.len() {
            if self.cells.read(offset) != Some(FdtToken::FDT_BEGIN_NODE) {
                offset += 1;
                continue;
            }
            let root = self.parse_node(&mut offset, ROOT_ADDR_CELLS, ROOT_SIZE_CELLS)?;
            if head == NO_IDX {
                head = root;
            } else {
                self.arena.nodes[tail as usize].sibling = root;
            }
            tail = root;
        }
        Ok(head)
    }

    /// Parse one node at `*offset`, which the caller has checked is a
    /// BEGIN_NODE cell. Children and properties are prepended to the node's
    /// chains, and children inherit whatever cell widths are current when
    /// their subtree begins.
    fn parse_node(
        &mut self,
        offset: &mut usize,
        addr_cells: u8,
        size_cells: u8,
    ) -> Result<u32, DtbError> {
        let name = self.node_name(*offset + 1)?;
        *offset += 1 + (name.len() + 1).div_ceil(4);
        let index = self.arena.alloc_node(Node {
            name,
            addr_cells,
            size_cells,
            parent: NO_IDX,
            child: NO_IDX,
            sibling: NO_IDX,
            props: NO_IDX,
        })?;

        while *offset < self.cells.len() {
            let cell = self.cells.read(*offset).ok_or(DtbError::TruncatedStructure)?;
            match FdtToken::from_cell(cell) {
                FdtToken::EndNode => {
                    *offset += 1;
                    return Ok(index);
                }
                FdtToken::BeginNode => {
                    let row = self.arena.nodes[index as usize];
                    let child = self.parse_node(offset, row.addr_cells, row.size_cells)?;
                    self.arena.nodes[child as usize].sibling =
                        self.arena.nodes[index as usize].child;
                    self.arena.nodes[child as usize].parent = index;
                    self.arena.nodes[index as usize].child = child;
                }
                FdtToken::Prop => {
                    let prop = self.parse_prop(offset)?;
                    self.arena.props[prop as usize].next = self.arena.nodes[index as usize].props;
                    self.arena.nodes[index as usize].props = prop;
                    self.apply_special_prop(index, prop);
                }
                // NOP and anything unrecognized: skip one cell.
                _ => *offset += 1,
            }
        }
        Err(DtbError::UnterminatedNode)
    }

    /// Parse one property at `*offset`, which the caller has checked is a
    /// PROP cell: `{ length, name_offset }` then the padded payload.
    fn parse_prop(&mut self, offset: &mut usize) -> Result<u32, DtbError> {
        *offset += 1;
        let length = self.cells.read(*offset).ok_or(DtbError::TruncatedStructure)? as usize;
        let name_offset =
            self.cells.read(*offset + 1).ok_or(DtbError::TruncatedStructure)? as usize;
        let payload = self.payload(*offset + 2, length)?;
        let name = self.prop_name(name_offset)?;
        *offset += 2 + length.div_ceil(4);
        self.arena.alloc_prop(Prop {
            name,
            payload,
            next: NO_IDX,
        })
    }

    fn payload(&self, cell_index: usize, length: usize) -> Result<&'a [u8], DtbError> {
        self.cells
            .bytes_from(cell_index)
            .get(..length)
            .ok_or(DtbError::TruncatedStructure)
    }

    fn node_name(&self, cell_index: usize) -> Result<&'a str, DtbError> {
        terminated_str(self.cells.bytes_from(cell_index))
    }

    fn prop_name(&self, offset: usize) -> Result<&'a str, DtbError> {
        let tail = self
            .strings
            .get(offset..)
            .ok_or(DtbError::TruncatedStructure)?;
        terminated_str(tail)
    }

    /// Properties that feed the tree structure itself: the phandle index and
    /// cell-width inheritance. First-byte check short-circuits the common
    /// case before any name comparison runs.
    fn apply_special_prop(&mut self, node: u32, prop: u32) {
        let row = self.arena.props[prop as usize];
        let first = row.name.as_bytes().first().copied();
        if first != Some(b'#') && first != Some(b'p') && first != Some(b'l') {
            return;
        }
        match row.name {
            "phandle" | "linux,phandle" => {
                if let Some(handle) = first_cell_of(row.payload) {
                    self.arena.record_phandle(handle, node);
                }
            }
            "#address-cells" => {
                if let Some(cells) = first_cell_of(row.payload) {
                    self.arena.nodes[node as usize].addr_cells = cells as u8;
                }
            }
            "#size-cells" => {
                if let Some(cells) = first_cell_of(row.payload) {
                    self.arena.nodes[node as usize].size_cells = cells as u8;
                }
            }
            _ => {}
        }
    }
}

fn terminated_str(tail: &[u8]) -> Result<&str, DtbError> {
    let nul = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or(DtbError::TruncatedStructure)?;
    core::str::from_utf8(&tail[..nul]).map_err(|_| DtbError::InvalidString)
}

#[cfg(test)]
mod tests {
    use crate::DtbError;
    use crate::dtb::tree::DeviceTree;
    use crate::integration_tests::FdtBuilder;

    #[test]
    fn test_unterminated_node_fails_whole_parse() {
        let mut builder = FdtBuilder::new();
        builder.begin_node("");
        builder.begin_node("chosen");
        builder.end_node();
        // root never closed
        let blob = builder.finish();
        assert_eq!(
            DeviceTree::parse(&blob).unwrap_err(),
            DtbError::UnterminatedNode
        );
    }

    #[test]
    fn test_nop_cells_are_skipped() {
        let mut builder = FdtBuilder::new();
        builder.begin_node("");
        builder.nop();
        builder.prop_u32("#address-cells", 1);
        builder.nop();
        builder.begin_node("serial@0");
        builder.end_node();
        builder.nop();
        builder.end_node();
        let blob = builder.finish();

        let tree = DeviceTree::parse(&blob).unwrap();
        assert_eq!(tree.node_count(), 2);
        assert!(tree.find("/serial").is_some());
    }

    #[test]
    fn test_cell_width_inheritance() {
        let mut builder = FdtBuilder::new();
        builder.begin_node("");
        builder.begin_node("early");
        builder.end_node();
        builder.prop_u32("#address-cells", 1);
        builder.prop_u32("#size-cells", 0);
        builder.begin_node("late");
        builder.begin_node("grandchild");
        builder.end_node();
        builder.end_node();
        builder.end_node();
        let blob = builder.finish();

        let tree = DeviceTree::parse(&blob).unwrap();
        let root = tree.root().unwrap();
        // The root's own values reflect its declarations.
        assert_eq!((root.addr_cells(), root.size_cells()), (1, 0));
        // A child parsed before the declarations saw the defaults.
        let early = tree.find("/early").unwrap();
        assert_eq!((early.addr_cells(), early.size_cells()), (2, 1));
        // Children parsed after inherit the overrides, transitively.
        let late = tree.find("/late").unwrap();
        assert_eq!((late.addr_cells(), late.size_cells()), (1, 0));
        let grandchild = tree.find("/late/grandchild").unwrap();
        assert_eq!((grandchild.addr_cells(), grandchild.size_cells()), (1, 0));
    }

    #[test]
    fn test_multiple_top_level_nodes_chain_in_order() {
        let mut builder = FdtBuilder::new();
        builder.begin_node("");
        builder.end_node();
        builder.begin_node("extra");
        builder.end_node();
        let blob = builder.finish();

        let tree = DeviceTree::parse(&blob).unwrap();
        let head = tree.root().unwrap();
        assert_eq!(head.name(), "");
        assert_eq!(head.sibling().unwrap().name(), "extra");
        assert_eq!(head.sibling().unwrap().sibling(), None);
    }

    #[test]
    fn test_phandle_lookup_and_out_of_range_drop() {
        let mut builder = FdtBuilder::new();
        builder.begin_node("");
        builder.begin_node("intc");
        builder.prop_u32("phandle", 1);
        builder.end_node();
        builder.begin_node("timer");
        builder.prop_u32("linux,phandle", 2);
        builder.end_node();
        builder.begin_node("rogue");
        builder.prop_u32("phandle", 0xffff);
        builder.end_node();
        builder.end_node();
        let blob = builder.finish();

        let tree = DeviceTree::parse(&blob).unwrap();
        assert_eq!(tree.find_phandle(1).unwrap().name(), "intc");
        assert_eq!(tree.find_phandle(2).unwrap().name(), "timer");
        assert_eq!(tree.find_phandle(0xffff), None);
        assert_eq!(tree.find_phandle(3), None);
    }
}
