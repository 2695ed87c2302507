use crate::descriptor::schema::{ExtensionDescriptor, MessageDescriptor};
use crate::descriptor::value::Value;
use std::collections::{BTreeMap, HashMap};

/// A mutable message instance bound to a descriptor.
///
/// Declared fields and extension fields live in separate tables, both keyed
/// by field number. The converter never retains a reference to an instance
/// beyond a single read or write call.
#[derive(Debug, Clone)]
pub struct DynamicMessage {
    descriptor: MessageDescriptor,
    fields: BTreeMap<u32, Value>,
    extensions: BTreeMap<u32, Value>,
    /// Selected member per oneof group index
    oneof_cases: HashMap<usize, u32>,
}

impl DynamicMessage {
    pub fn new(descriptor: MessageDescriptor) -> Self {
        DynamicMessage {
            descriptor,
            fields: BTreeMap::new(),
            extensions: BTreeMap::new(),
            oneof_cases: HashMap::new(),
        }
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    pub fn get(&self, number: u32) -> Option<&Value> {
        self.fields.get(&number)
    }

    pub fn has(&self, number: u32) -> bool {
        self.fields.contains_key(&number)
    }

    /// Store a field value. Setting a oneof member clears its siblings and
    /// records the member as the group's selected case.
    pub fn set(&mut self, number: u32, value: Value) {
        if let Some(index) = self
            .descriptor
            .field(number)
            .and_then(|f| f.oneof_index())
        {
            let siblings: Vec<u32> = self.descriptor.oneof_members(index).collect();
            for sibling in siblings {
                if sibling != number {
                    self.fields.remove(&sibling);
                }
            }
            self.oneof_cases.insert(index, number);
        }
        self.fields.insert(number, value);
    }

    /// Store a field value without oneof bookkeeping.
    ///
    /// This deliberately bypasses the oneof contract; a writer consulting
    /// `oneof_selected` will not see a member stored this way as selected.
    pub fn set_unchecked(&mut self, number: u32, value: Value) {
        self.fields.insert(number, value);
    }

    pub fn clear(&mut self, number: u32) {
        self.fields.remove(&number);
        if let Some(index) = self
            .descriptor
            .field(number)
            .and_then(|f| f.oneof_index())
        {
            if self.oneof_cases.get(&index) == Some(&number) {
                self.oneof_cases.remove(&index);
            }
        }
    }

    /// The member currently selected in the oneof group at `index`
    pub fn oneof_selected(&self, index: usize) -> Option<u32> {
        self.oneof_cases.get(&index).copied()
    }

    pub fn get_extension(&self, extension: &ExtensionDescriptor) -> Option<&Value> {
        self.extensions.get(&extension.number())
    }

    pub fn has_extension(&self, extension: &ExtensionDescriptor) -> bool {
        self.extensions.contains_key(&extension.number())
    }

    /// Store an extension value. The value is not validated against the
    /// extension's declared type here; a mismatch surfaces as that one
    /// extension being skipped during write.
    pub fn set_extension(&mut self, extension: &ExtensionDescriptor, value: Value) {
        self.extensions.insert(extension.number(), value);
    }

    pub fn clear_extension(&mut self, extension: &ExtensionDescriptor) {
        self.extensions.remove(&extension.number());
    }

    /// Iterate stored declared-field values by number
    pub fn fields(&self) -> impl Iterator<Item = (u32, &Value)> {
        self.fields.iter().map(|(n, v)| (*n, v))
    }
}

impl PartialEq for DynamicMessage {
    /// Field-by-field equality: same type, same stored fields, same stored
    /// extensions. Oneof case bookkeeping is derived state and not compared.
    fn eq(&self, other: &Self) -> bool {
        self.descriptor.full_name() == other.descriptor.full_name()
            && self.fields == other.fields
            && self.extensions == other.extensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::schema::{FieldDescriptor, FieldKind};

    fn oneof_message() -> MessageDescriptor {
        MessageDescriptor::with_oneofs(
            "test.Shape",
            vec![
                FieldDescriptor::new(1, "circle", FieldKind::Double).with_oneof(0),
                FieldDescriptor::new(2, "square", FieldKind::Double).with_oneof(0),
                FieldDescriptor::new(3, "label", FieldKind::String),
            ],
            vec!["kind".to_string()],
        )
    }

    #[test]
    fn test_set_get_clear() {
        let desc = MessageDescriptor::new(
            "test.Simple",
            vec![FieldDescriptor::new(1, "name", FieldKind::String)],
        );
        let mut msg = DynamicMessage::new(desc);

        assert!(!msg.has(1));
        msg.set(1, Value::String("a".into()));
        assert_eq!(msg.get(1), Some(&Value::String("a".into())));
        msg.clear(1);
        assert!(!msg.has(1));
    }

    #[test]
    fn test_oneof_set_clears_siblings() {
        let mut msg = DynamicMessage::new(oneof_message());

        msg.set(1, Value::F64(1.0));
        assert_eq!(msg.oneof_selected(0), Some(1));

        msg.set(2, Value::F64(2.0));
        assert_eq!(msg.oneof_selected(0), Some(2));
        assert!(!msg.has(1));
        assert!(msg.has(2));
    }

    #[test]
    fn test_set_unchecked_bypasses_oneof_case() {
        let mut msg = DynamicMessage::new(oneof_message());

        msg.set(1, Value::F64(1.0));
        msg.set_unchecked(2, Value::F64(2.0));

        // Both stored, but the group still reports field 1 as selected
        assert!(msg.has(1));
        assert!(msg.has(2));
        assert_eq!(msg.oneof_selected(0), Some(1));
    }

    #[test]
    fn test_equality_ignores_set_order() {
        let desc = MessageDescriptor::new(
            "test.Pair",
            vec![
                FieldDescriptor::new(1, "a", FieldKind::Int32),
                FieldDescriptor::new(2, "b", FieldKind::Int32),
            ],
        );
        let mut left = DynamicMessage::new(desc.clone());
        left.set(1, Value::I32(1));
        left.set(2, Value::I32(2));

        let mut right = DynamicMessage::new(desc);
        right.set(2, Value::I32(2));
        right.set(1, Value::I32(1));

        assert_eq!(left, right);
    }
}
