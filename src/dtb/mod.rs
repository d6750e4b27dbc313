// ABOUTME: Device tree blob parsing and query modules
// ABOUTME: Splits wire-format handling from the arena tables and the query engine

pub mod arena;
pub mod cells;
pub mod error;
pub mod header;
pub mod parser;
pub mod prop;
pub mod tokens;
pub mod tree;

pub use arena::TableCapacity;
pub use error::DtbError;
pub use header::FdtHeader;
pub use prop::{PropHandle, PropsIter};
pub use tokens::FdtToken;
pub use tree::{ChildrenIter, DeviceTree, NodeHandle, NodeIter, NodeStat};
