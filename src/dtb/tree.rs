// ABOUTME: The parsed device tree state and its query engine
// ABOUTME: Index-linked node handles, path and phandle lookup, traversal, stat

use super::arena::{Arena, NO_IDX, TableCapacity};
use super::cells::Cells;
use super::error::DtbError;
use super::header::FdtHeader;
use super::parser::Parser;
use super::prop::{PropHandle, PropsIter};
use core::fmt::{self, Display, Formatter};

/// A node table row. Name borrows from the blob; links are table indices.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Node<'a> {
    /// Node name as written in the blob, unit address included.
    pub(crate) name: &'a str,
    /// `#address-cells` in effect for this node's children.
    pub(crate) addr_cells: u8,
    /// `#size-cells` in effect for this node's children.
    pub(crate) size_cells: u8,
    pub(crate) parent: u32,
    pub(crate) child: u32,
    pub(crate) sibling: u32,
    /// Head of the property chain, reverse-of-blob order.
    pub(crate) props: u32,
}

/// A parsed device tree: the query entry point.
///
/// Built once by [`DeviceTree::parse`], immutable afterwards. Queries are
/// plain reads, so a tree may be shared freely across threads for as long as
/// the blob it borrows from stays alive.
///
/// Child and property iteration order is the reverse of blob order: the
/// parser prepends as it goes, so the last child written to the blob is the
/// first one a chain walk visits.
#[derive(Debug)]
pub struct DeviceTree<'a> {
    arena: Arena<'a>,
    root: u32,
}

impl<'a> DeviceTree<'a> {
    /// Parse a DTB image into a tree.
    ///
    /// The blob must start with the 40-byte header. Table sizes come from a
    /// pre-scan of the structure block, and each table is reserved exactly
    /// once; names and payloads stay borrowed from `blob`.
    ///
    /// # Errors
    ///
    /// Any [`DtbError`] format variant. On error no tree exists; there is no
    /// partially parsed state to observe.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use dtb_arena::{DeviceTree, DtbError};
    /// # fn main() -> Result<(), DtbError> {
    /// let blob = std::fs::read("device.dtb").unwrap();
    /// let tree = DeviceTree::parse(&blob)?;
    /// println!("{} nodes", tree.node_count());
    /// # Ok(())
    /// # }
    /// ```
    pub fn parse(blob: &'a [u8]) -> Result<Self, DtbError> {
        Parser::run(blob, None)
    }

    /// Parse with a byte budget for the internal tables.
    ///
    /// For hosts with a fixed memory region: the pre-scan runs first, and if
    /// [`TableCapacity::arena_bytes`] exceeds `limit` the parse fails with
    /// [`DtbError::BufferLimitExceeded`] before anything is allocated.
    ///
    /// # Errors
    ///
    /// As [`DeviceTree::parse`], plus the budget failure.
    pub fn parse_with_limit(blob: &'a [u8], limit: usize) -> Result<Self, DtbError> {
        Parser::run(blob, Some(limit))
    }

    /// Pre-scan a blob without building the tree.
    ///
    /// Reports the table capacities a parse of this blob would reserve, so a
    /// memory-constrained host can budget ahead of time.
    ///
    /// # Errors
    ///
    /// Header failures only; the structure block itself is not validated.
    pub fn survey(blob: &[u8]) -> Result<TableCapacity, DtbError> {
        let header = FdtHeader::parse(blob)?;
        let (structs, _strings) = header.blocks(blob)?;
        Ok(Cells::new(structs).survey())
    }

    pub(crate) fn from_parts(arena: Arena<'a>, root: u32) -> Self {
        Self { arena, root }
    }

    pub(crate) fn node_row(&self, index: u32) -> &Node<'a> {
        &self.arena.nodes[index as usize]
    }

    pub(crate) fn prop_row(&self, index: u32) -> &super::prop::Prop<'a> {
        &self.arena.props[index as usize]
    }

    fn wrap(&self, index: u32) -> Option<NodeHandle<'_, 'a>> {
        (index != NO_IDX).then_some(NodeHandle { tree: self, index })
    }

    /// The head of the top-level node list, usually the single root node.
    ///
    /// A blob with several top-level nodes chains the extras behind the
    /// first via [`NodeHandle::sibling`].
    #[must_use]
    pub fn root(&self) -> Option<NodeHandle<'_, 'a>> {
        self.wrap(self.root)
    }

    /// Total nodes in the tree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.arena.nodes.len()
    }

    /// Total properties in the tree.
    #[must_use]
    pub fn prop_count(&self) -> usize {
        self.arena.props.len()
    }

    /// Look a node up by slash-separated path.
    ///
    /// `""` and `"/"` return the root; leading, trailing and repeated
    /// slashes are tolerated. Each segment is compared byte-for-byte against
    /// a child's name up to its `'@'` unit-address separator, so
    /// `find("/cpus/cpu")` matches a `cpu@0` child while
    /// `find("/cpus/cpu@0")` matches nothing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # fn example(tree: &dtb_arena::DeviceTree) {
    /// assert_eq!(tree.find(""), tree.root());
    /// assert_eq!(tree.find("//chosen/"), tree.find("/chosen"));
    /// # }
    /// ```
    #[must_use]
    pub fn find(&self, path: &str) -> Option<NodeHandle<'_, 'a>> {
        let mut rest = path.as_bytes();
        let mut scan = self.root;
        while scan != NO_IDX {
            while rest.first() == Some(&b'/') {
                rest = &rest[1..];
            }
            let seg_len = rest
                .iter()
                .position(|&b| b == b'/')
                .unwrap_or(rest.len());
            if seg_len == 0 {
                return self.wrap(scan);
            }
            scan = self.child_named(scan, &rest[..seg_len]);
            rest = &rest[seg_len..];
        }
        None
    }

    /// Scan of `parent`'s child chain for a unit-address-blind name match.
    pub(crate) fn child_named(&self, parent: u32, segment: &[u8]) -> u32 {
        let mut index = self.node_row(parent).child;
        while index != NO_IDX {
            let row = self.node_row(index);
            let name = row.name.as_bytes();
            let bare = &name[..bare_name_len(row.name)];
            if bare == segment {
                return index;
            }
            index = row.sibling;
        }
        NO_IDX
    }

    /// Find the next node whose `compatible` string list contains
    /// `compatible`, searching in node-table order (depth-first pre-order of
    /// the blob) from just after `start`, or from the first node when
    /// `start` is `None`.
    ///
    /// Feeding each result back in walks every matching instance:
    ///
    /// ```rust
    /// # fn example(tree: &dtb_arena::DeviceTree) {
    /// let mut hit = tree.find_compatible(None, "ns16550a");
    /// while let Some(node) = hit {
    ///     println!("{}", node.name());
    ///     hit = tree.find_compatible(Some(node), "ns16550a");
    /// }
    /// # }
    /// ```
    #[must_use]
    pub fn find_compatible(
        &self,
        start: Option<NodeHandle<'_, 'a>>,
        compatible: &str,
    ) -> Option<NodeHandle<'_, 'a>> {
        let begin = match start {
            Some(node) => node.index as usize + 1,
            None => 0,
        };
        for index in begin..self.arena.nodes.len() {
            let node = NodeHandle {
                tree: self,
                index: index as u32,
            };
            if let Some(compat) = node.find_prop("compatible")
                && compat.strings().any(|s| s == compatible)
            {
                return Some(node);
            }
        }
        None
    }

    /// Look a node up by phandle value.
    ///
    /// Backed by the direct-indexed table filled in at parse time from
    /// `phandle` and `linux,phandle` properties. Out-of-range handles and
    /// handles no node declared return `None`.
    #[must_use]
    pub fn find_phandle(&self, handle: u32) -> Option<NodeHandle<'_, 'a>> {
        let index = *self.arena.phandles.get(handle as usize)?;
        self.wrap(index)
    }

    /// Iterate every node in table order (depth-first pre-order).
    pub fn iter_nodes(&self) -> NodeIter<'_, 'a> {
        NodeIter {
            tree: self,
            next: 0,
        }
    }

    fn fmt_node(&self, f: &mut Formatter<'_>, index: u32, depth: usize) -> fmt::Result {
        let row = self.node_row(index);
        let pad = "  ".repeat(depth);
        let shown = if row.name.is_empty() { "/" } else { row.name };
        writeln!(f, "{pad}{shown} {{")?;
        let props = PropsIter {
            tree: self,
            next: row.props,
        };
        for prop in props {
            writeln!(f, "{pad}  {prop};")?;
        }
        let mut child = row.child;
        while child != NO_IDX {
            self.fmt_node(f, child, depth + 1)?;
            child = self.node_row(child).sibling;
        }
        writeln!(f, "{pad}}}")
    }
}

/// Indented source-style dump of the whole tree, top-level nodes in order.
impl Display for DeviceTree<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut index = self.root;
        while index != NO_IDX {
            self.fmt_node(f, index, 0)?;
            index = self.node_row(index).sibling;
        }
        Ok(())
    }
}

fn bare_name_len(name: &str) -> usize {
    name.as_bytes()
        .iter()
        .position(|&b| b == b'@')
        .unwrap_or(name.len())
}

/// A node of a parsed [`DeviceTree`].
///
/// Copyable and cheap: a tree reference plus a table index. Two handles are
/// equal when they designate the same row of the same tree.
#[derive(Clone, Copy)]
pub struct NodeHandle<'t, 'a> {
    pub(crate) tree: &'t DeviceTree<'a>,
    pub(crate) index: u32,
}

impl<'t, 'a> NodeHandle<'t, 'a> {
    fn row(&self) -> &'t Node<'a> {
        self.tree.node_row(self.index)
    }

    fn link(&self, index: u32) -> Option<NodeHandle<'t, 'a>> {
        (index != NO_IDX).then_some(NodeHandle {
            tree: self.tree,
            index,
        })
    }

    /// The node name as written in the blob, unit address included. The head
    /// root's name is the empty string; [`NodeHandle::stat`] renders it `"/"`.
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.row().name
    }

    /// `#address-cells` in effect for this node's children: its own
    /// declaration if present, otherwise inherited from the parent chain
    /// (root default 2).
    #[must_use]
    pub fn addr_cells(&self) -> u8 {
        self.row().addr_cells
    }

    /// `#size-cells` counterpart of [`NodeHandle::addr_cells`] (root default 1).
    #[must_use]
    pub fn size_cells(&self) -> u8 {
        self.row().size_cells
    }

    /// The parent node, `None` for top-level nodes.
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle<'t, 'a>> {
        self.link(self.row().parent)
    }

    /// The first child, reverse-of-blob order.
    #[must_use]
    pub fn child(&self) -> Option<NodeHandle<'t, 'a>> {
        self.link(self.row().child)
    }

    /// The next sibling in the parent's chain.
    #[must_use]
    pub fn sibling(&self) -> Option<NodeHandle<'t, 'a>> {
        self.link(self.row().sibling)
    }

    /// Find a direct child whose name up to `'@'` equals `name` exactly.
    #[must_use]
    pub fn find_child(&self, name: &str) -> Option<NodeHandle<'t, 'a>> {
        self.link(self.tree.child_named(self.index, name.as_bytes()))
    }

    /// Find a property by exact full-name match.
    #[must_use]
    pub fn find_prop(&self, name: &str) -> Option<PropHandle<'t, 'a>> {
        self.props().find(|prop| prop.name() == name)
    }

    /// The `index`-th property in chain order (reverse-of-blob).
    #[must_use]
    pub fn prop(&self, index: u32) -> Option<PropHandle<'t, 'a>> {
        self.props().nth(index as usize)
    }

    /// Whether a property with this exact name exists.
    #[must_use]
    pub fn has_prop(&self, name: &str) -> bool {
        self.find_prop(name).is_some()
    }

    /// The first cell of a named property, a common one-liner for
    /// `phandle`-style and `#...-cells`-style values.
    #[must_use]
    pub fn prop_u32(&self, name: &str) -> Option<u32> {
        self.find_prop(name)?.first_cell()
    }

    /// Iterate this node's properties, reverse-of-blob order.
    pub fn props(&self) -> PropsIter<'t, 'a> {
        PropsIter {
            tree: self.tree,
            next: self.row().props,
        }
    }

    /// Iterate this node's children, reverse-of-blob order.
    pub fn children(&self) -> ChildrenIter<'t, 'a> {
        ChildrenIter {
            tree: self.tree,
            next: self.row().child,
        }
    }

    /// Count children, properties and siblings.
    ///
    /// The sibling count runs over the parent's whole child chain, this node
    /// included; top-level nodes report zero. The head root reports the
    /// literal name `"/"`.
    #[must_use]
    pub fn stat(&self) -> NodeStat<'a> {
        let name = if self.index == self.tree.root {
            "/"
        } else {
            self.row().name
        };
        let sibling_count = match self.parent() {
            Some(parent) => parent.children().count() as u32,
            None => 0,
        };
        NodeStat {
            name,
            child_count: self.children().count() as u32,
            prop_count: self.props().count() as u32,
            sibling_count,
        }
    }
}

impl PartialEq for NodeHandle<'_, '_> {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.tree, other.tree) && self.index == other.index
    }
}

impl fmt::Debug for NodeHandle<'_, '_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("name", &self.name())
            .field("index", &self.index)
            .finish()
    }
}

/// Iterating a handle yields its children, reverse-of-blob order.
impl<'t, 'a> IntoIterator for NodeHandle<'t, 'a> {
    type Item = NodeHandle<'t, 'a>;
    type IntoIter = ChildrenIter<'t, 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.children()
    }
}

/// Name and population counts of a node, see [`NodeHandle::stat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStat<'a> {
    /// Node name; `"/"` for the head root.
    pub name: &'a str,
    /// Direct children.
    pub child_count: u32,
    /// Properties on the node itself.
    pub prop_count: u32,
    /// Length of the parent's child chain, zero for top-level nodes.
    pub sibling_count: u32,
}

/// Iterator over a child chain.
#[derive(Clone)]
pub struct ChildrenIter<'t, 'a> {
    tree: &'t DeviceTree<'a>,
    next: u32,
}

impl<'t, 'a> Iterator for ChildrenIter<'t, 'a> {
    type Item = NodeHandle<'t, 'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == NO_IDX {
            return None;
        }
        let handle = NodeHandle {
            tree: self.tree,
            index: self.next,
        };
        self.next = self.tree.node_row(self.next).sibling;
        Some(handle)
    }
}

/// Iterator over every node in table order.
#[derive(Clone)]
pub struct NodeIter<'t, 'a> {
    tree: &'t DeviceTree<'a>,
    next: usize,
}

impl<'t, 'a> Iterator for NodeIter<'t, 'a> {
    type Item = NodeHandle<'t, 'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.tree.arena.nodes.len() {
            return None;
        }
        let handle = NodeHandle {
            tree: self.tree,
            index: self.next as u32,
        };
        self.next += 1;
        Some(handle)
    }
}
