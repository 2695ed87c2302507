use crate::descriptor::schema::FieldDescriptor;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// How a field's JSON property name is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingPolicy {
    /// The field's declared name, passed through an optional caller-supplied
    /// transform. With no transform the declared name is used as-is.
    Default {
        transform: Option<fn(&str) -> String>,
    },
    /// The schema-declared camelCase JSON name
    ProtobufJsonName,
    /// The schema-declared snake_case field name
    ProtobufFieldName,
}

impl NamingPolicy {
    /// Resolve the JSON property name for one field. Total over valid
    /// descriptors; never fails.
    pub fn resolve(&self, field: &FieldDescriptor) -> String {
        match self {
            NamingPolicy::Default { transform: Some(t) } => t(field.name()),
            NamingPolicy::Default { transform: None } => field.name().to_string(),
            NamingPolicy::ProtobufJsonName => field.json_name().to_string(),
            NamingPolicy::ProtobufFieldName => field.name().to_string(),
        }
    }
}

/// When a field's property is omitted from written output.
///
/// Any mode other than `Never` omits absent fields; `WhenWritingDefault`
/// additionally omits implicit-presence fields holding their default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultHandling {
    /// Emit everything: absent singular fields appear as JSON null, absent
    /// repeated and map fields as empty containers
    Never,
    /// Emit stored values, including defaults; omit absent fields
    WhenWritingNull,
    /// Omit absent fields and implicit-presence fields at their default
    WhenWritingDefault,
}

/// Conversion configuration, captured into the field plan at build time.
///
/// The hot read/write paths never consult these flags directly; every
/// decision they drive is baked into the plan and its codecs.
#[derive(Debug, Clone)]
pub struct JsonOptions {
    pub naming: NamingPolicy,
    /// Match incoming property names case-insensitively
    pub case_insensitive_properties: bool,
    pub default_handling: DefaultHandling,
    /// Serialize enum values as their numbers instead of their symbols
    pub enum_as_integer: bool,
}

impl Default for JsonOptions {
    fn default() -> Self {
        JsonOptions {
            naming: NamingPolicy::Default { transform: None },
            case_insensitive_properties: false,
            default_handling: DefaultHandling::WhenWritingDefault,
            enum_as_integer: false,
        }
    }
}

impl JsonOptions {
    /// Stable digest of every plan-affecting setting; part of the plan
    /// cache key so the same type under different options gets distinct
    /// plans.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        match self.naming {
            NamingPolicy::Default { transform } => {
                0u8.hash(&mut hasher);
                transform.map(|f| f as usize).hash(&mut hasher);
            }
            NamingPolicy::ProtobufJsonName => 1u8.hash(&mut hasher),
            NamingPolicy::ProtobufFieldName => 2u8.hash(&mut hasher),
        }
        self.case_insensitive_properties.hash(&mut hasher);
        let handling = match self.default_handling {
            DefaultHandling::Never => 0u8,
            DefaultHandling::WhenWritingNull => 1u8,
            DefaultHandling::WhenWritingDefault => 2u8,
        };
        handling.hash(&mut hasher);
        self.enum_as_integer.hash(&mut hasher);
        hasher.finish()
    }

    /// The key a property name is looked up under, honoring the configured
    /// case sensitivity
    pub(crate) fn lookup_key(&self, name: &str) -> String {
        if self.case_insensitive_properties {
            name.to_lowercase()
        } else {
            name.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::schema::{FieldDescriptor, FieldKind};

    fn field() -> FieldDescriptor {
        FieldDescriptor::new(1, "user_name", FieldKind::String)
    }

    #[test]
    fn test_naming_policies() {
        assert_eq!(
            NamingPolicy::Default { transform: None }.resolve(&field()),
            "user_name"
        );
        assert_eq!(
            NamingPolicy::ProtobufJsonName.resolve(&field()),
            "userName"
        );
        assert_eq!(
            NamingPolicy::ProtobufFieldName.resolve(&field()),
            "user_name"
        );
    }

    #[test]
    fn test_naming_transform() {
        fn screaming(name: &str) -> String {
            name.to_uppercase()
        }
        let policy = NamingPolicy::Default {
            transform: Some(screaming),
        };
        assert_eq!(policy.resolve(&field()), "USER_NAME");
    }

    #[test]
    fn test_fingerprint_distinguishes_options() {
        let base = JsonOptions::default();
        let mut insensitive = JsonOptions::default();
        insensitive.case_insensitive_properties = true;
        let mut numeric_enums = JsonOptions::default();
        numeric_enums.enum_as_integer = true;

        assert_eq!(base.fingerprint(), JsonOptions::default().fingerprint());
        assert_ne!(base.fingerprint(), insensitive.fingerprint());
        assert_ne!(base.fingerprint(), numeric_enums.fingerprint());
    }
}
