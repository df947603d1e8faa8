//! Key identity policy.
//!
//! Every key that enters a coalescer or a result mapper is reduced to a
//! [`NormalizedKey`]. Equivalence of normalized keys, not reference identity
//! or in-memory layout, decides caching, deduplication and grouping.
//!
//! Two normalization paths exist:
//!
//! - **Structural** (default): the key is turned into a JSON value and written
//!   out canonically, with object members sorted by name.
//! - **Canonical**: identifier types that carry their own notion of equality
//!   (for example [`ObjectId`] or [`uuid::Uuid`]) report their canonical
//!   string form, which is used verbatim.

mod object_id;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

pub use object_id::{ObjectId, ObjectIdError};

/// How a key wants to be compared.
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    /// Opaque identifier with custom equality; the string is its canonical form.
    Canonical(String),
    /// Plain value compared by structure.
    Structural(Value),
}

/// Canonical, hashable form of a key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedKey(Arc<str>);

impl NormalizedKey {
    pub fn from_identity(identity: Identity) -> Self {
        match identity {
            Identity::Canonical(s) => Self(Arc::from(s)),
            Identity::Structural(value) => {
                let mut out = String::new();
                write_canonical(&value, &mut out);
                Self(Arc::from(out))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NormalizedKey({})", &self.0)
    }
}

/// Identity capability for batch keys.
///
/// Implementors only describe their [`Identity`]; normalization and
/// comparison are derived from it.
pub trait KeyIdentity {
    /// Returns how this key is compared.
    fn identity(&self) -> Identity;

    /// Returns the canonical cache key.
    fn normalize(&self) -> NormalizedKey {
        NormalizedKey::from_identity(self.identity())
    }

    /// Returns true when both keys denote the same logical entity.
    fn same_key(&self, other: &Self) -> bool {
        self.normalize() == other.normalize()
    }
}

impl<T: KeyIdentity + ?Sized> KeyIdentity for &T {
    fn identity(&self) -> Identity {
        (**self).identity()
    }
}

impl<T: KeyIdentity> KeyIdentity for Option<T> {
    fn identity(&self) -> Identity {
        match self {
            Some(inner) => inner.identity(),
            None => Identity::Structural(Value::Null),
        }
    }
}

impl KeyIdentity for str {
    fn identity(&self) -> Identity {
        Identity::Structural(Value::String(self.to_string()))
    }
}

impl KeyIdentity for String {
    fn identity(&self) -> Identity {
        self.as_str().identity()
    }
}

impl KeyIdentity for Arc<str> {
    fn identity(&self) -> Identity {
        (**self).identity()
    }
}

impl KeyIdentity for Value {
    fn identity(&self) -> Identity {
        Identity::Structural(self.clone())
    }
}

impl KeyIdentity for uuid::Uuid {
    fn identity(&self) -> Identity {
        Identity::Canonical(self.hyphenated().to_string())
    }
}

macro_rules! structural_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl KeyIdentity for $ty {
                fn identity(&self) -> Identity {
                    Identity::Structural(Value::from(*self))
                }
            }
        )*
    };
}

structural_scalar!(bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// Wrapper giving any serializable value structural identity.
///
/// Values that cannot be represented as JSON (maps with non-string keys, for
/// instance) fall back to their `Debug` rendering, which keeps normalization
/// total.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Structural<T>(pub T);

impl<T: Serialize + fmt::Debug> KeyIdentity for Structural<T> {
    fn identity(&self) -> Identity {
        match serde_json::to_value(&self.0) {
            Ok(value) => Identity::Structural(value),
            Err(_) => Identity::Canonical(format!("{:?}", self.0)),
        }
    }
}

/// Writes `value` as JSON with object members sorted by name.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(members) => {
            let mut entries: Vec<(&String, &Value)> = members.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (name, member)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(name.clone()).to_string());
                out.push(':');
                write_canonical(member, out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_strings_normalize_like_json() {
        assert_eq!("abc".normalize().as_str(), "\"abc\"");
        assert_eq!(String::from("abc").normalize(), "abc".normalize());
    }

    #[test]
    fn test_numbers_and_strings_do_not_collide() {
        // "1" and 1 are different entities
        assert_ne!("1".normalize(), 1u32.normalize());
        assert_eq!(1u32.normalize(), 1i64.normalize());
    }

    #[test]
    fn test_object_member_order_does_not_affect_identity() {
        let a = json!({"tenant": "acme", "id": 7});
        let b = json!({"id": 7, "tenant": "acme"});
        assert!(a.same_key(&b));
        assert_eq!(a.normalize().as_str(), r#"{"id":7,"tenant":"acme"}"#);
    }

    #[test]
    fn test_nested_values_are_canonical() {
        let a = json!({"outer": {"b": [1, {"y": 2, "x": 1}], "a": null}});
        let b = json!({"outer": {"a": null, "b": [1, {"x": 1, "y": 2}]}});
        assert_eq!(a.normalize(), b.normalize());
    }

    #[test]
    fn test_uuid_uses_canonical_form() {
        let id = uuid::Uuid::new_v4();
        let parsed = uuid::Uuid::parse_str(&id.to_string().to_uppercase()).unwrap();
        assert_eq!(id.normalize().as_str(), id.hyphenated().to_string());
        assert!(id.same_key(&parsed));
    }

    #[test]
    fn test_option_none_normalizes_to_null() {
        let none: Option<String> = None;
        assert_eq!(none.normalize().as_str(), "null");
        assert_eq!(Some("a".to_string()).normalize(), "a".normalize());
    }

    #[test]
    fn test_structural_wrapper_serializes_value() {
        #[derive(Debug, Serialize)]
        struct Composite {
            org: &'static str,
            seq: u32,
        }

        let key = Structural(Composite { org: "acme", seq: 3 });
        assert_eq!(key.normalize().as_str(), r#"{"org":"acme","seq":3}"#);
    }

    #[test]
    fn test_structural_wrapper_falls_back_to_debug() {
        // JSON maps need string keys; tuple keys cannot be serialized
        let mut map = BTreeMap::new();
        map.insert((1, 2), "pair");
        let key = Structural(map);
        assert_eq!(key.normalize().as_str(), r#"{(1, 2): "pair"}"#);
    }

    #[test]
    fn test_references_share_identity_with_owned_keys() {
        let owned = String::from("k");
        let borrowed: &String = &owned;
        assert_eq!(borrowed.normalize(), owned.normalize());
    }
}
