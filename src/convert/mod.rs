//! Message conversion: plans, codecs and the read/write drivers
//!
//! A plan is built once per message type and cached for the process
//! lifetime; every read and write call then walks the plan against the
//! streaming token layer with no per-value type derivation.

pub(crate) mod codec;
pub mod extension;
pub mod options;
pub mod plan;
pub mod reader;
pub mod writer;

pub use extension::{ExtensionCatalog, ExtensionEntry};
pub use options::{DefaultHandling, JsonOptions, NamingPolicy};
pub use plan::{FieldEntry, FieldPlan};
pub use reader::read_message;
pub use writer::write_message;
