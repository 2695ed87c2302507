//! Schema descriptors and the dynamic message model
//!
//! Everything the converter knows about a message type comes from these
//! descriptors; there is no compile-time code generation involved.

pub mod message;
pub mod schema;
pub mod value;

pub use message::DynamicMessage;
pub use schema::{
    to_json_name, Cardinality, DescriptorError, EnumDescriptor, ExtensionDescriptor,
    FieldDescriptor, FieldKind, FileDescriptor, MapKeyKind, MessageDescriptor,
};
pub use value::{MapKey, Value};
