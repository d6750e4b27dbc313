// ABOUTME: Arena-backed device tree blob parser with an index-linked node table
// ABOUTME: Exposes path, phandle and compatible-string queries over one immutable parse

//! # dtb-arena
//!
//! Parse a flattened device tree (DTB) image into fixed-capacity node and
//! property tables, then query it: path lookup, child and property search,
//! compatible-string enumeration, phandle lookup, and zero-copy property
//! decoding. Designed for `no_std` environments with `alloc`.
//!
//! The whole tree is built by a single call to [`DeviceTree::parse`]. A
//! pre-scan of the structure block sizes the tables exactly, so parsing
//! performs one up-front reservation per table and nothing afterwards. Node
//! names and property payloads are borrowed straight from the caller's blob.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # use dtb_arena::{DeviceTree, DtbError};
//! # fn main() -> Result<(), DtbError> {
//! let blob = std::fs::read("path/to/your.dtb").unwrap();
//! let tree = DeviceTree::parse(&blob)?;
//!
//! if let Some(chosen) = tree.find("/chosen")
//!     && let Some(bootargs) = chosen.find_prop("bootargs")
//! {
//!     println!("bootargs: {:?}", bootargs.string(0));
//! }
//!
//! // Enumerate every ns16550a-compatible device.
//! let mut uart = tree.find_compatible(None, "ns16550a");
//! while let Some(node) = uart {
//!     println!("uart: {}", node.name());
//!     uart = tree.find_compatible(Some(node), "ns16550a");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Main Types
//!
//! - [`DeviceTree`] - the parsed tree and query entry point
//! - [`NodeHandle`] - a node within the tree, with navigation and search
//! - [`PropHandle`] - a property, with the string/bytes/cell decoders
//! - [`FdtHeader`] - the 40-byte blob header
//! - [`TableCapacity`] - pre-scan table sizing, for embedded memory budgets
//! - [`DtbError`] - parse failures

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod dtb;


pub use dtb::{
    DeviceTree, DtbError, FdtHeader, FdtToken, NodeHandle, NodeStat, PropHandle, TableCapacity,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_blob_is_rejected() {
        let data = &[0u8; 16];
        assert_eq!(
            DeviceTree::parse(data).unwrap_err(),
            DtbError::TruncatedHeader
        );
    }
}
