//! Per-type extension catalogs
//!
//! Extensions get the same build-once treatment as declared fields: the
//! catalog resolves every extension registered against a message type (its
//! file plus transitive dependencies) into a bracketed JSON name and a
//! typed codec, and is cached per (type, options).
//!
//! Failure isolation is the defining contract here: anything that goes
//! wrong resolving or applying one extension drops that extension alone,
//! never the surrounding message.

use crate::convert::codec::{codec_for_field, Codec};
use crate::convert::options::JsonOptions;
use crate::descriptor::message::DynamicMessage;
use crate::descriptor::schema::{Cardinality, ExtensionDescriptor, MessageDescriptor};
use crate::error::ConvertError;
use crate::json::{JsonReader, JsonWriter, TextWriter, ValueReader};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug)]
pub struct ExtensionEntry {
    descriptor: ExtensionDescriptor,
    /// Resolved property name without the surrounding brackets
    json_name: String,
    codec: Arc<Codec>,
}

impl ExtensionEntry {
    pub fn descriptor(&self) -> &ExtensionDescriptor {
        &self.descriptor
    }

    pub fn json_name(&self) -> &str {
        &self.json_name
    }
}

/// All extensions applicable to one message type, keyed by bracketed name
#[derive(Debug)]
pub struct ExtensionCatalog {
    entries: Vec<ExtensionEntry>,
    lookup: HashMap<String, usize>,
    case_insensitive: bool,
}

static CATALOGS: Lazy<RwLock<HashMap<(String, u64), Arc<ExtensionCatalog>>>> =
    Lazy::new(Default::default);

impl ExtensionCatalog {
    /// The cached catalog for a type, building it on first use.
    ///
    /// Never fails: an extension whose metadata cannot be resolved is left
    /// out of the catalog.
    pub fn cached(descriptor: &MessageDescriptor, options: &JsonOptions) -> Arc<ExtensionCatalog> {
        let key = (descriptor.full_name().to_string(), options.fingerprint());
        if let Some(catalog) = CATALOGS
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return catalog.clone();
        }
        let built = Arc::new(ExtensionCatalog::build(descriptor, options));
        CATALOGS
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert(built)
            .clone()
    }

    fn build(descriptor: &MessageDescriptor, options: &JsonOptions) -> ExtensionCatalog {
        let mut entries = Vec::new();
        let mut lookup = HashMap::new();

        for extension in descriptor.applicable_extensions() {
            let field = extension.field();
            // Malformed registrations are skipped, not surfaced
            if field.is_map() && field.cardinality() != Cardinality::Singular {
                continue;
            }
            let json_name = options.naming.resolve(field);
            if json_name.is_empty() {
                continue;
            }
            let entry = ExtensionEntry {
                codec: codec_for_field(field, options),
                descriptor: extension,
                json_name,
            };
            lookup.insert(options.lookup_key(&entry.json_name), entries.len());
            entries.push(entry);
        }

        ExtensionCatalog {
            entries,
            lookup,
            case_insensitive: options.case_insensitive_properties,
        }
    }

    /// Entries in registration order
    pub fn entries(&self) -> &[ExtensionEntry] {
        &self.entries
    }

    pub fn entry_for(&self, name: &str) -> Option<&ExtensionEntry> {
        let index = if self.case_insensitive {
            self.lookup.get(&name.to_lowercase())
        } else {
            self.lookup.get(name)
        };
        index.map(|&i| &self.entries[i])
    }

    /// Consume one bracketed property's value from the stream.
    ///
    /// The value is captured before decoding so the stream stays
    /// synchronized whatever happens; a decode failure (or an unknown
    /// name) just drops the value.
    pub(crate) fn read_value(
        &self,
        r: &mut dyn JsonReader,
        name: &str,
        message: &mut DynamicMessage,
    ) -> Result<(), ConvertError> {
        let Some(entry) = self.entry_for(name) else {
            return r.skip_value();
        };
        let raw = r.read_raw()?;
        if raw.is_null() {
            return Ok(());
        }
        let mut sub = ValueReader::new(raw);
        if let Ok(value) = entry.codec.read(&mut sub) {
            message.set_extension(&entry.descriptor, value);
        }
        Ok(())
    }

    /// Append every present extension as a `"[name]"` property.
    ///
    /// Each value is rendered to a scratch buffer first; a render failure
    /// (typically a stored value that does not match the extension's
    /// declared type) skips that one extension.
    pub(crate) fn write_all(&self, w: &mut dyn JsonWriter, message: &DynamicMessage) {
        for entry in &self.entries {
            let Some(value) = message.get_extension(&entry.descriptor) else {
                continue;
            };
            let mut scratch = TextWriter::new();
            if entry.codec.write(&mut scratch, value).is_ok() {
                w.property_name(&format!("[{}]", entry.json_name));
                w.raw(&scratch.finish());
            }
        }
    }
}
