//! Typed construction from a generic value tree.
//!
//! Struct fields are matched with the file format's [`FieldNaming`], map keys
//! are left untouched, and scalars are coerced leniently so all-string
//! sources such as properties files still deserialize into numbers and
//! booleans.

use super::format::FieldNaming;
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, Deserializer, IntoDeserializer, MapAccess, SeqAccess,
    Visitor,
};
use serde::forward_to_deserialize_any;
use serde_json::{Map, Value};

/// Deserialize `T` from a tree whose struct keys follow `naming`.
pub fn from_tree<T: DeserializeOwned>(value: Value, naming: FieldNaming) -> Result<T, serde_json::Error> {
    T::deserialize(TreeDeserializer { value, naming })
}

/// Overlay `patch` onto `base`, object by object.
///
/// Patch keys are matched to existing base keys with `naming`, so a
/// `fixed-delay` key in a YAML file overrides the `fixed_delay` key of a
/// serialized default. Non-object values replace what was there.
pub fn overlay(base: &mut Value, patch: Value, naming: FieldNaming) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                let existing = base_map
                    .keys()
                    .find(|candidate| naming.matches(candidate, &key))
                    .cloned();
                match existing.and_then(|k| base_map.get_mut(&k)) {
                    Some(slot) => overlay(slot, value, naming),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, patch) => *slot = patch,
    }
}

struct TreeDeserializer {
    value: Value,
    naming: FieldNaming,
}

macro_rules! deserialize_parsed {
    ($($method:ident => $visit:ident: $ty:ty),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                match self.value {
                    Value::String(text) => match text.trim().parse::<$ty>() {
                        Ok(parsed) => visitor.$visit(parsed),
                        Err(_) => Err(de::Error::invalid_value(de::Unexpected::Str(&text), &visitor)),
                    },
                    other => other.$method(visitor),
                }
            }
        )*
    };
}

impl<'de> Deserializer<'de> for TreeDeserializer {
    type Error = serde_json::Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let naming = self.naming;
        match self.value {
            Value::Array(items) => visitor.visit_seq(TreeSeq {
                items: items.into_iter(),
                naming,
            }),
            Value::Object(map) => visitor.visit_map(TreeMap::new(map, naming, None)),
            other => other.deserialize_any(visitor),
        }
    }

    deserialize_parsed! {
        deserialize_bool => visit_bool: bool,
        deserialize_i8 => visit_i8: i8,
        deserialize_i16 => visit_i16: i16,
        deserialize_i32 => visit_i32: i32,
        deserialize_i64 => visit_i64: i64,
        deserialize_u8 => visit_u8: u8,
        deserialize_u16 => visit_u16: u16,
        deserialize_u32 => visit_u32: u32,
        deserialize_u64 => visit_u64: u64,
        deserialize_f32 => visit_f32: f32,
        deserialize_f64 => visit_f64: f64,
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::Number(number) => visitor.visit_string(number.to_string()),
            Value::Bool(flag) => visitor.visit_string(flag.to_string()),
            other => other.deserialize_string(visitor),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::Null => visitor.visit_none(),
            Value::String(ref text) if text.is_empty() => visitor.visit_none(),
            value => {
                let inner = Self {
                    value,
                    naming: self.naming,
                };
                visitor.visit_some(inner)
            }
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        let naming = self.naming;
        match self.value {
            Value::Object(map) => visitor.visit_map(TreeMap::new(map, naming, Some(fields))),
            other => Self { value: other, naming }.deserialize_any(visitor),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.value.deserialize_enum(name, variants, visitor)
    }

    forward_to_deserialize_any! {
        i128 u128 char bytes byte_buf unit unit_struct seq tuple tuple_struct map identifier ignored_any
    }
}

struct TreeMap {
    entries: serde_json::map::IntoIter,
    pending: Option<Value>,
    naming: FieldNaming,
    fields: Option<&'static [&'static str]>,
}

impl TreeMap {
    fn new(map: Map<String, Value>, naming: FieldNaming, fields: Option<&'static [&'static str]>) -> Self {
        Self {
            entries: map.into_iter(),
            pending: None,
            naming,
            fields,
        }
    }
}

impl<'de> MapAccess<'de> for TreeMap {
    type Error = serde_json::Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error> {
        let Some((key, value)) = self.entries.next() else {
            return Ok(None);
        };
        self.pending = Some(value);

        let key = match self.fields.and_then(|fields| self.naming.field_for(&key, fields)) {
            Some(field) => field.to_string(),
            None => key,
        };
        let key: de::value::StringDeserializer<serde_json::Error> = key.into_deserializer();
        seed.deserialize(key).map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, Self::Error> {
        let value = self
            .pending
            .take()
            .ok_or_else(|| <serde_json::Error as de::Error>::custom("value requested before key"))?;
        seed.deserialize(TreeDeserializer {
            value,
            naming: self.naming,
        })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

struct TreeSeq {
    items: std::vec::IntoIter<Value>,
    naming: FieldNaming,
}

impl<'de> SeqAccess<'de> for TreeSeq {
    type Error = serde_json::Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error> {
        match self.items.next() {
            Some(value) => seed
                .deserialize(TreeDeserializer {
                    value,
                    naming: self.naming,
                })
                .map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Jwt {
        timeout_mins: Option<u32>,
        cookie_name: Option<String>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Security {
        domain_name: String,
        #[serde(default)]
        cors_allowed_host: Vec<String>,
        #[serde(default)]
        jwts: BTreeMap<String, Jwt>,
    }

    #[test]
    fn test_kebab_case_fields() {
        let tree = json!({
            "domain-name": "example.org",
            "cors-allowed-host": ["a", "b"],
            "jwts": { "admin-portal": { "timeout-mins": 15 } }
        });
        let security: Security = from_tree(tree, FieldNaming::KebabCase).unwrap();
        assert_eq!(security.domain_name, "example.org");
        assert_eq!(security.cors_allowed_host, vec!["a", "b"]);
        // Map keys are data and keep their spelling
        assert_eq!(security.jwts["admin-portal"].timeout_mins, Some(15));
    }

    #[test]
    fn test_camel_case_fields() {
        let tree = json!({ "domainName": "example.org", "jwts": { "web": { "cookieName": "sid" } } });
        let security: Security = from_tree(tree, FieldNaming::CamelCase).unwrap();
        assert_eq!(security.jwts["web"].cookie_name.as_deref(), Some("sid"));
    }

    #[test]
    fn test_string_scalars_are_coerced() {
        let tree = json!({ "domain_name": 42, "jwts": { "web": { "timeoutMins": "30", "cookieName": "" } } });
        let security: Security = from_tree(tree, FieldNaming::CamelCase).unwrap();
        assert_eq!(security.domain_name, "42");
        assert_eq!(security.jwts["web"].timeout_mins, Some(30));
        assert_eq!(security.jwts["web"].cookie_name, None);
    }

    #[test]
    fn test_bad_number_is_an_error() {
        let tree = json!({ "domain_name": "x", "jwts": { "web": { "timeoutMins": "soon" } } });
        let result: Result<Security, _> = from_tree(tree, FieldNaming::CamelCase);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let tree = json!({ "domain_name": "x", "legacy-flag": true });
        let security: Security = from_tree(tree, FieldNaming::KebabCase).unwrap();
        assert_eq!(security.domain_name, "x");
    }

    #[test]
    fn test_overlay_matches_naming() {
        let mut base = json!({ "domain_name": "default.org", "cors_allowed_host": ["*"] });
        overlay(&mut base, json!({ "domain-name": "override.org" }), FieldNaming::KebabCase);
        assert_eq!(base, json!({ "domain_name": "override.org", "cors_allowed_host": ["*"] }));
    }

    #[test]
    fn test_overlay_nested_and_new_keys() {
        let mut base = json!({ "jwts": { "web": { "timeout_mins": 5, "cookie_name": "a" } } });
        overlay(
            &mut base,
            json!({ "jwts": { "web": { "timeoutMins": 10 }, "api": { "cookieName": "b" } } }),
            FieldNaming::CamelCase,
        );
        assert_eq!(
            base,
            json!({ "jwts": {
                "web": { "timeout_mins": 10, "cookie_name": "a" },
                "api": { "cookieName": "b" }
            } })
        );
    }
}
