//! Atom-level building blocks: box headers, identifiers, typed payloads,
//! and the generic tree reader.

pub mod data;
pub mod head;
pub mod ident;
pub mod tree;
pub mod util;

pub use data::Data;
pub use head::{AtomBounds, Head, Size};
pub use ident::{DataIdent, Fourcc};
pub use tree::Atom;
