// ABOUTME: Fixed-capacity node, property and phandle tables
// ABOUTME: Bump allocation inside capacities fixed by the structure pre-scan

use super::error::DtbError;
use super::prop::Prop;
use super::tree::Node;
use alloc::vec;
use alloc::vec::Vec;

/// Index sentinel for "no node / no property".
pub(crate) const NO_IDX: u32 = u32::MAX;

/// Table sizes derived from the structure-block pre-scan.
///
/// `nodes` and `props` are the counted BEGIN_NODE and PROP cells, upper
/// bounds on the rows the parse will fill. Useful on its own through
/// [`DeviceTree::survey`] when an embedded host wants to budget memory
/// before committing to a parse.
///
/// [`DeviceTree::survey`]: super::DeviceTree::survey
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableCapacity {
    /// Node table rows.
    pub nodes: usize,
    /// Property table rows.
    pub props: usize,
}

impl TableCapacity {
    /// Bytes the three tables occupy: one node row and one phandle slot per
    /// counted node, one property row per counted property.
    #[must_use]
    pub fn arena_bytes(&self) -> usize {
        self.nodes * core::mem::size_of::<Node<'static>>()
            + self.props * core::mem::size_of::<Prop<'static>>()
            + self.nodes * core::mem::size_of::<u32>()
    }
}

/// The backing tables of a parsed tree.
///
/// All rows are appended during the parse and never touched again. Cross
/// references between rows are `u32` indices with [`NO_IDX`] for null, so
/// the tables are relocatable and free of aliasing.
#[derive(Debug)]
pub(crate) struct Arena<'a> {
    pub(crate) nodes: Vec<Node<'a>>,
    pub(crate) props: Vec<Prop<'a>>,
    /// Indexed by phandle value; each slot is [`NO_IDX`] or a node index.
    pub(crate) phandles: Vec<u32>,
    node_max: usize,
    prop_max: usize,
}

impl<'a> Arena<'a> {
    /// Reserve all three tables up front. No allocation happens after this.
    pub(crate) fn with_capacity(capacity: TableCapacity) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity.nodes),
            props: Vec::with_capacity(capacity.props),
            phandles: vec![NO_IDX; capacity.nodes],
            node_max: capacity.nodes,
            prop_max: capacity.props,
        }
    }

    /// Append a node row, returning its index.
    pub(crate) fn alloc_node(&mut self, node: Node<'a>) -> Result<u32, DtbError> {
        if self.nodes.len() >= self.node_max {
            return Err(DtbError::NodeTableExhausted);
        }
        let index = self.nodes.len() as u32;
        self.nodes.push(node);
        Ok(index)
    }

    /// Append a property row, returning its index.
    pub(crate) fn alloc_prop(&mut self, prop: Prop<'a>) -> Result<u32, DtbError> {
        if self.props.len() >= self.prop_max {
            return Err(DtbError::PropTableExhausted);
        }
        let index = self.props.len() as u32;
        self.props.push(prop);
        Ok(index)
    }

    /// Record `node` under a phandle value. Handles at or beyond the node
    /// table capacity are dropped without error.
    pub(crate) fn record_phandle(&mut self, handle: u32, node: u32) {
        if let Some(slot) = self.phandles.get_mut(handle as usize) {
            *slot = node;
        }
    }
}
