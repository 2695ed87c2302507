//! Schema metadata: files, messages, fields, enums and extensions
//!
//! Descriptors are built once, are immutable afterwards, and are cheap to
//! clone (reference-counted internals). The converter derives everything it
//! needs from them at plan-build time. Descriptors serialize to JSON for
//! schema inspection and diffing.

use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Inconsistent schema metadata detected while building a field plan.
///
/// A descriptor that fails here cannot be used with the converter at all;
/// no partial plan is cached.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("field {field} of {message} references oneof index {index}, but only {count} oneofs are declared")]
    UnknownOneof {
        message: String,
        field: String,
        index: usize,
        count: usize,
    },

    #[error("map field {field} of {message} cannot also be repeated or optional")]
    MapCardinality { message: String, field: String },

    #[error("field {field} of {message} resolves to an empty JSON name")]
    EmptyJsonName { message: String, field: String },
}

/// Allowed protobuf map key kinds; keys are always JSON strings on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MapKeyKind {
    Bool,
    Int32,
    Int64,
    Uint32,
    Uint64,
    String,
}

/// The declared value type of a field
#[derive(Debug, Clone, Serialize)]
pub enum FieldKind {
    Bool,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Float,
    Double,
    String,
    Bytes,
    Enum(EnumDescriptor),
    Message(MessageDescriptor),
}

/// Field presence discipline.
///
/// `Singular` fields have implicit presence (absent means default);
/// `Optional` fields and oneof members track presence explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Cardinality {
    Singular,
    Optional,
    Repeated,
}

///
/// EnumDescriptor
///

#[derive(Clone, Serialize)]
#[serde(transparent)]
pub struct EnumDescriptor {
    inner: Arc<EnumInner>,
}

#[derive(Serialize)]
struct EnumInner {
    full_name: String,
    values: Vec<(i32, String)>,
    #[serde(skip)]
    by_number: HashMap<i32, usize>,
    #[serde(skip)]
    by_name: HashMap<String, usize>,
}

impl EnumDescriptor {
    pub fn new<N, V, S>(full_name: N, values: V) -> Self
    where
        N: Into<String>,
        V: IntoIterator<Item = (i32, S)>,
        S: Into<String>,
    {
        let values: Vec<(i32, String)> =
            values.into_iter().map(|(n, s)| (n, s.into())).collect();
        let mut by_number = HashMap::new();
        let mut by_name = HashMap::new();
        for (idx, (number, name)) in values.iter().enumerate() {
            by_number.entry(*number).or_insert(idx);
            by_name.entry(name.clone()).or_insert(idx);
        }
        EnumDescriptor {
            inner: Arc::new(EnumInner {
                full_name: full_name.into(),
                values,
                by_number,
                by_name,
            }),
        }
    }

    pub fn full_name(&self) -> &str {
        &self.inner.full_name
    }

    pub fn values(&self) -> &[(i32, String)] {
        &self.inner.values
    }

    /// Symbolic name for a numeric value, if the enum declares one
    pub fn name_of(&self, number: i32) -> Option<&str> {
        self.inner
            .by_number
            .get(&number)
            .map(|&idx| self.inner.values[idx].1.as_str())
    }

    /// Numeric value for a symbolic name, if the enum declares it
    pub fn number_of(&self, name: &str) -> Option<i32> {
        self.inner
            .by_name
            .get(name)
            .map(|&idx| self.inner.values[idx].0)
    }
}

impl fmt::Debug for EnumDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnumDescriptor({})", self.full_name())
    }
}

///
/// FieldDescriptor
///

#[derive(Debug, Clone, Serialize)]
pub struct FieldDescriptor {
    number: u32,
    name: String,
    json_name: String,
    kind: FieldKind,
    cardinality: Cardinality,
    #[serde(skip_serializing_if = "Option::is_none")]
    map_key: Option<MapKeyKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    oneof_index: Option<usize>,
}

impl FieldDescriptor {
    /// A singular field. The camelCase JSON name is derived from `name`;
    /// override it with `with_json_name` when the schema declares its own.
    pub fn new(number: u32, name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        let json_name = to_json_name(&name);
        FieldDescriptor {
            number,
            name,
            json_name,
            kind,
            cardinality: Cardinality::Singular,
            map_key: None,
            oneof_index: None,
        }
    }

    /// A `map<key, value>` field
    pub fn map(
        number: u32,
        name: impl Into<String>,
        key: MapKeyKind,
        value: FieldKind,
    ) -> Self {
        let mut field = FieldDescriptor::new(number, name, value);
        field.map_key = Some(key);
        field
    }

    pub fn repeated(mut self) -> Self {
        self.cardinality = Cardinality::Repeated;
        self
    }

    pub fn optional(mut self) -> Self {
        self.cardinality = Cardinality::Optional;
        self
    }

    /// Place this field in the oneof group at `index` (into the message's
    /// declared oneof list)
    pub fn with_oneof(mut self, index: usize) -> Self {
        self.oneof_index = Some(index);
        self
    }

    pub fn with_json_name(mut self, json_name: impl Into<String>) -> Self {
        self.json_name = json_name.into();
        self
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn json_name(&self) -> &str {
        &self.json_name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn map_key(&self) -> Option<MapKeyKind> {
        self.map_key
    }

    pub fn oneof_index(&self) -> Option<usize> {
        self.oneof_index
    }

    pub fn is_repeated(&self) -> bool {
        self.cardinality == Cardinality::Repeated
    }

    pub fn is_map(&self) -> bool {
        self.map_key.is_some()
    }
}

///
/// MessageDescriptor
///

#[derive(Clone, Serialize)]
#[serde(transparent)]
pub struct MessageDescriptor {
    inner: Arc<MessageInner>,
}

#[derive(Serialize)]
struct MessageInner {
    full_name: String,
    fields: Vec<FieldDescriptor>,
    oneofs: Vec<String>,
    #[serde(skip)]
    by_number: HashMap<u32, usize>,
    #[serde(skip)]
    file: OnceCell<FileDescriptor>,
}

impl MessageDescriptor {
    pub fn new(full_name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        MessageDescriptor::with_oneofs(full_name, fields, Vec::new())
    }

    /// A message with oneof groups; fields reference groups by index via
    /// `FieldDescriptor::with_oneof`
    pub fn with_oneofs(
        full_name: impl Into<String>,
        fields: Vec<FieldDescriptor>,
        oneofs: Vec<String>,
    ) -> Self {
        let mut by_number = HashMap::new();
        for (idx, field) in fields.iter().enumerate() {
            by_number.entry(field.number).or_insert(idx);
        }
        MessageDescriptor {
            inner: Arc::new(MessageInner {
                full_name: full_name.into(),
                fields,
                oneofs,
                by_number,
                file: OnceCell::new(),
            }),
        }
    }

    pub fn full_name(&self) -> &str {
        &self.inner.full_name
    }

    /// Short name: the segment after the last `.`
    pub fn name(&self) -> &str {
        self.inner
            .full_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.inner.full_name)
    }

    /// Declared fields, in schema declaration order
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.inner.fields
    }

    pub fn field(&self, number: u32) -> Option<&FieldDescriptor> {
        self.inner
            .by_number
            .get(&number)
            .map(|&idx| &self.inner.fields[idx])
    }

    pub fn oneofs(&self) -> &[String] {
        &self.inner.oneofs
    }

    /// Declared field numbers of the members of one oneof group
    pub fn oneof_members(&self, index: usize) -> impl Iterator<Item = u32> + '_ {
        self.inner
            .fields
            .iter()
            .filter(move |f| f.oneof_index == Some(index))
            .map(|f| f.number)
    }

    /// The file this message was registered under, if any
    pub fn parent_file(&self) -> Option<&FileDescriptor> {
        self.inner.file.get()
    }

    pub(crate) fn attach_file(&self, file: FileDescriptor) {
        // First registration wins; re-registering a shared descriptor under
        // a second file is ignored.
        let _ = self.inner.file.set(file);
    }

    /// All extensions registered against this message in its file and the
    /// file's transitive dependencies, in registration order.
    ///
    /// A message never registered under a `FileDescriptor` has none.
    pub fn applicable_extensions(&self) -> Vec<ExtensionDescriptor> {
        let Some(file) = self.parent_file() else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(file.clone());
        while let Some(f) = queue.pop_front() {
            if !visited.insert(f.name().to_string()) {
                continue;
            }
            for ext in f.extensions() {
                if ext.extendee() == self.full_name() {
                    out.push(ext.clone());
                }
            }
            for dep in f.dependencies() {
                queue.push_back(dep.clone());
            }
        }
        out
    }
}

impl fmt::Debug for MessageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageDescriptor({})", self.full_name())
    }
}

///
/// ExtensionDescriptor
///

#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct ExtensionDescriptor {
    inner: Arc<ExtensionInner>,
}

#[derive(Debug, Serialize)]
struct ExtensionInner {
    extendee: String,
    field: FieldDescriptor,
}

impl ExtensionDescriptor {
    /// Register `field` as an extension of the message named `extendee`
    pub fn new(extendee: impl Into<String>, field: FieldDescriptor) -> Self {
        ExtensionDescriptor {
            inner: Arc::new(ExtensionInner {
                extendee: extendee.into(),
                field,
            }),
        }
    }

    /// Full name of the extended message
    pub fn extendee(&self) -> &str {
        &self.inner.extendee
    }

    pub fn field(&self) -> &FieldDescriptor {
        &self.inner.field
    }

    pub fn number(&self) -> u32 {
        self.inner.field.number()
    }
}

///
/// FileDescriptor
///

#[derive(Clone, Serialize)]
#[serde(transparent)]
pub struct FileDescriptor {
    inner: Arc<FileInner>,
}

#[derive(Serialize)]
struct FileInner {
    name: String,
    messages: Vec<MessageDescriptor>,
    enums: Vec<EnumDescriptor>,
    extensions: Vec<ExtensionDescriptor>,
    dependencies: Vec<FileDescriptor>,
}

impl FileDescriptor {
    /// Build a file and register every listed message under it.
    ///
    /// `messages` must list every message the file declares, including
    /// nested ones, for extension discovery to see them.
    pub fn new(
        name: impl Into<String>,
        messages: Vec<MessageDescriptor>,
        enums: Vec<EnumDescriptor>,
        extensions: Vec<ExtensionDescriptor>,
        dependencies: Vec<FileDescriptor>,
    ) -> Self {
        let file = FileDescriptor {
            inner: Arc::new(FileInner {
                name: name.into(),
                messages,
                enums,
                extensions,
                dependencies,
            }),
        };
        for message in &file.inner.messages {
            message.attach_file(file.clone());
        }
        file
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn messages(&self) -> &[MessageDescriptor] {
        &self.inner.messages
    }

    pub fn enums(&self) -> &[EnumDescriptor] {
        &self.inner.enums
    }

    pub fn extensions(&self) -> &[ExtensionDescriptor] {
        &self.inner.extensions
    }

    pub fn dependencies(&self) -> &[FileDescriptor] {
        &self.inner.dependencies
    }

    pub fn message_by_name(&self, full_name: &str) -> Option<MessageDescriptor> {
        self.inner
            .messages
            .iter()
            .find(|m| m.full_name() == full_name)
            .cloned()
    }
}

impl fmt::Debug for FileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileDescriptor({})", self.name())
    }
}

/// Derive the protobuf camelCase JSON name from a snake_case field name
pub fn to_json_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}
