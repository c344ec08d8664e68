//! Symbol index
//!
//! Records extracted from source files, the in-memory table every query
//! reads, and the line-oriented `symbols.index` file that persists it.

mod record;
mod store;
mod table;

pub use record::{parse_index_line, LineError, ParamInfo, SymbolRecord, UNKNOWN_TYPE};
pub use store::{IndexStore, IndexStoreError, LoadedIndex};
pub use table::SymbolTable;
