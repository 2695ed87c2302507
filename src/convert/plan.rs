//! Pre-computed per-type conversion plans
//!
//! A `FieldPlan` is built once per message type (and per options
//! fingerprint), then drives every read and write for that type without
//! re-deriving type information per value. Plans are cached for the
//! process lifetime; concurrent first-use may build twice, in which case
//! the loser adopts the cached plan and discards its own.

use crate::convert::codec::{codec_for_field, Codec};
use crate::convert::options::{DefaultHandling, JsonOptions};
use crate::descriptor::schema::{
    Cardinality, DescriptorError, FieldDescriptor, FieldKind, MessageDescriptor,
};
use crate::error::ConvertError;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// One declared field, resolved to its JSON name and codec
#[derive(Debug)]
pub struct FieldEntry {
    json_name: String,
    number: u32,
    is_repeated: bool,
    is_map: bool,
    oneof: Option<usize>,
    /// Whether presence is tracked explicitly (optional fields and embedded
    /// messages), as opposed to absent-means-default
    explicit_presence: bool,
    pub(crate) codec: Arc<Codec>,
}

impl FieldEntry {
    pub fn json_name(&self) -> &str {
        &self.json_name
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn is_repeated(&self) -> bool {
        self.is_repeated
    }

    pub fn is_map(&self) -> bool {
        self.is_map
    }

    pub fn oneof(&self) -> Option<usize> {
        self.oneof
    }

    pub(crate) fn explicit_presence(&self) -> bool {
        self.explicit_presence
    }
}

/// The immutable conversion plan for one message type
#[derive(Debug)]
pub struct FieldPlan {
    message_full_name: String,
    /// Schema declaration order; drives deterministic write output
    entries: Vec<FieldEntry>,
    /// Property-name lookup; on duplicate JSON names the last-declared
    /// field wins here while both remain in `entries`
    lookup: HashMap<String, usize>,
    case_insensitive: bool,
    default_handling: DefaultHandling,
}

static PLANS: Lazy<RwLock<HashMap<(String, u64), Arc<FieldPlan>>>> =
    Lazy::new(Default::default);

impl FieldPlan {
    /// The cached plan for a type, building it on first use
    pub fn cached(
        descriptor: &MessageDescriptor,
        options: &JsonOptions,
    ) -> Result<Arc<FieldPlan>, ConvertError> {
        let key = (descriptor.full_name().to_string(), options.fingerprint());
        if let Some(plan) = PLANS
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(plan.clone());
        }
        let built = Arc::new(FieldPlan::build(descriptor, options)?);
        Ok(PLANS
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert(built)
            .clone())
    }

    fn build(
        descriptor: &MessageDescriptor,
        options: &JsonOptions,
    ) -> Result<FieldPlan, ConvertError> {
        let mut entries = Vec::with_capacity(descriptor.fields().len());
        let mut lookup = HashMap::with_capacity(descriptor.fields().len());

        for field in descriptor.fields() {
            validate(descriptor, field)?;

            let json_name = options.naming.resolve(field);
            if json_name.is_empty() {
                return Err(DescriptorError::EmptyJsonName {
                    message: descriptor.full_name().to_string(),
                    field: field.name().to_string(),
                }
                .into());
            }

            let entry = FieldEntry {
                json_name,
                number: field.number(),
                is_repeated: field.is_repeated(),
                is_map: field.is_map(),
                oneof: field.oneof_index(),
                explicit_presence: field.cardinality() == Cardinality::Optional
                    || (matches!(field.kind(), FieldKind::Message(_))
                        && !field.is_repeated()
                        && !field.is_map()),
                codec: codec_for_field(field, options),
            };
            lookup.insert(options.lookup_key(&entry.json_name), entries.len());
            entries.push(entry);
        }

        Ok(FieldPlan {
            message_full_name: descriptor.full_name().to_string(),
            entries,
            lookup,
            case_insensitive: options.case_insensitive_properties,
            default_handling: options.default_handling,
        })
    }

    pub fn message_full_name(&self) -> &str {
        &self.message_full_name
    }

    /// Entries in schema declaration order
    pub fn entries(&self) -> &[FieldEntry] {
        &self.entries
    }

    /// Resolve an incoming property name against the plan
    pub fn entry_for(&self, name: &str) -> Option<&FieldEntry> {
        let index = if self.case_insensitive {
            self.lookup.get(&name.to_lowercase())
        } else {
            self.lookup.get(name)
        };
        index.map(|&i| &self.entries[i])
    }

    pub(crate) fn default_handling(&self) -> DefaultHandling {
        self.default_handling
    }
}

fn validate(
    descriptor: &MessageDescriptor,
    field: &FieldDescriptor,
) -> Result<(), ConvertError> {
    if let Some(index) = field.oneof_index() {
        let count = descriptor.oneofs().len();
        if index >= count {
            return Err(DescriptorError::UnknownOneof {
                message: descriptor.full_name().to_string(),
                field: field.name().to_string(),
                index,
                count,
            }
            .into());
        }
    }
    if field.is_map() && field.cardinality() != Cardinality::Singular {
        return Err(DescriptorError::MapCardinality {
            message: descriptor.full_name().to_string(),
            field: field.name().to_string(),
        }
        .into());
    }
    Ok(())
}
