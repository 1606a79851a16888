//! Parser for cserve's indentation-sensitive config-script table language.
//!
//! A config-script document is a single top-level mapping; values are
//! scalars, dash-prefixed lists, or nested mappings, with inline `[...]`
//! and `{...}` forms for short lists and maps. This mirrors the shape of
//! the reference server's own YAML-flavored config language without
//! pulling in a YAML crate for what is, in practice, a much smaller
//! grammar (no anchors, no multi-document streams, no flow scalars).

mod from_table;
mod lexer;
mod parser;
mod table;

pub use from_table::{ConvertError, FromTable};
pub use parser::{parse, ParseError};
pub use table::TableValue;
