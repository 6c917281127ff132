//! Type-erased scalar values carried by differences.
//!
//! A [`Scalar`] is a type compared atomically by value equality and never
//! descended into. The implementations in this module form the built-in
//! allowlist: primitives, strings, durations and instants, network
//! addresses, paths, `chrono` date/time types and `uuid::Uuid`. User types
//! opt in by implementing [`Scalar`].

use rustc_hash::FxHasher;
use serde::{Serialize, Serializer};
use std::any::{type_name, Any};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A value compared atomically by `PartialEq`
pub trait Scalar: Any + Clone + PartialEq + fmt::Debug + Send + Sync {
    /// JSON rendering used when differences are serialized
    fn to_json(&self) -> serde_json::Value {
        serde_json::Value::String(format!("{:?}", self))
    }

    /// Hash consistent with `PartialEq`, for types that are `Hash`
    ///
    /// Set diffs bucket elements by this key. `None` makes them fall back
    /// to pairwise equality scans.
    fn hash_key(&self) -> Option<u64> {
        None
    }
}

/// Deterministic hash for [`Scalar::hash_key`]
#[must_use]
pub fn stable_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Object-safe view of a [`Scalar`]
trait ErasedScalar: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn eq_erased(&self, other: &dyn ErasedScalar) -> bool;
    fn fmt_debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
    fn json(&self) -> serde_json::Value;
    fn scalar_type(&self) -> &'static str;
}

impl<T: Scalar> ErasedScalar for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_erased(&self, other: &dyn ErasedScalar) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn fmt_debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }

    fn json(&self) -> serde_json::Value {
        self.to_json()
    }

    fn scalar_type(&self) -> &'static str {
        type_name::<T>()
    }
}

/// A scalar value with its concrete type erased
///
/// Cloning is cheap. Two values are equal only when they hold the same
/// concrete type and that type's `PartialEq` says so.
#[derive(Clone)]
pub struct Value(Arc<dyn ErasedScalar>);

impl Value {
    /// Erase a scalar
    #[must_use]
    pub fn new<T: Scalar>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrow the concrete value if it has type `T`
    #[must_use]
    pub fn downcast_ref<T: Scalar>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Whether the concrete value has type `T`
    #[must_use]
    pub fn is<T: Scalar>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }

    /// Name of the concrete type
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.0.scalar_type()
    }

    /// JSON rendering of the value
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        self.0.json()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_erased(&*other.0)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt_debug(f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_json() {
            serde_json::Value::String(s) => f.write_str(&s),
            other => write!(f, "{}", other),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Scalars whose JSON form is their serde representation
macro_rules! serde_scalar {
    (unhashed: $($ty:ty),* $(,)?) => {
        $(
            impl Scalar for $ty {
                fn to_json(&self) -> serde_json::Value {
                    serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
                }
            }
        )*
    };
    ($($ty:ty),* $(,)?) => {
        $(
            impl Scalar for $ty {
                fn to_json(&self) -> serde_json::Value {
                    serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
                }

                fn hash_key(&self) -> Option<u64> {
                    Some(stable_hash(self))
                }
            }
        )*
    };
}

/// Scalars rendered through `Display`
macro_rules! display_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Scalar for $ty {
                fn to_json(&self) -> serde_json::Value {
                    serde_json::Value::String(self.to_string())
                }

                fn hash_key(&self) -> Option<u64> {
                    Some(stable_hash(self))
                }
            }
        )*
    };
}

serde_scalar!(
    bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize,
    String, &'static str, Box<str>, (),
    std::path::PathBuf,
    chrono::NaiveDate, chrono::NaiveTime, chrono::NaiveDateTime,
    chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::FixedOffset>, chrono::DateTime<chrono::Local>,
    uuid::Uuid,
);

serde_scalar!(unhashed: f32, f64);

display_scalar!(
    Arc<str>,
    std::net::IpAddr, std::net::Ipv4Addr, std::net::Ipv6Addr, std::net::SocketAddr,
    chrono::TimeDelta,
);

// Debug rendering ("1.5s") reads better in audit logs than {secs, nanos}
impl Scalar for std::time::Duration {
    fn hash_key(&self) -> Option<u64> {
        Some(stable_hash(self))
    }
}

impl Scalar for std::time::SystemTime {
    fn to_json(&self) -> serde_json::Value {
        let since_epoch = self
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_else(|e| -(e.duration().as_millis() as i64));
        serde_json::Value::from(since_epoch)
    }

    fn hash_key(&self) -> Option<u64> {
        Some(stable_hash(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum State {
        Active,
        Inactive,
    }

    impl Scalar for State {}

    #[test]
    fn test_value_equality_same_type() {
        assert_eq!(Value::new(42i64), Value::new(42i64));
        assert_ne!(Value::new(42i64), Value::new(43i64));
        assert_eq!(Value::new("a".to_string()), Value::new("a".to_string()));
    }

    #[test]
    fn test_value_equality_across_types() {
        // Same number, different concrete types
        assert_ne!(Value::new(1i32), Value::new(1i64));
        assert_ne!(Value::new("x"), Value::new("x".to_string()));
    }

    #[test]
    fn test_downcast() {
        let value = Value::new(State::Active);
        assert!(value.is::<State>());
        assert_eq!(value.downcast_ref::<State>(), Some(&State::Active));
        assert_eq!(value.downcast_ref::<i32>(), None);
        assert!(value.type_name().ends_with("State"));
    }

    #[test]
    fn test_json_rendering() {
        assert_eq!(Value::new(7u8).to_json(), serde_json::json!(7));
        assert_eq!(Value::new(true).to_json(), serde_json::json!(true));
        assert_eq!(Value::new("Hi".to_string()).to_json(), serde_json::json!("Hi"));
        assert_eq!(Value::new(State::Inactive).to_json(), serde_json::json!("Inactive"));
        assert_eq!(Value::new(Duration::from_millis(1500)).to_json(), serde_json::json!("1.5s"));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Value::new("Hello".to_string())), "Hello");
        assert_eq!(format!("{}", Value::new(10.5f64)), "10.5");
        assert_eq!(format!("{:?}", Value::new("Hello".to_string())), "\"Hello\"");
    }

    #[test]
    fn test_hash_keys() {
        assert_eq!("a".to_string().hash_key(), "a".to_string().hash_key());
        assert_ne!(1i32.hash_key(), 2i32.hash_key());
        assert!(1.5f64.hash_key().is_none());
        assert!(State::Active.hash_key().is_none());
    }

    #[test]
    fn test_uuid_and_dates() {
        let id = uuid::Uuid::nil();
        assert_eq!(Value::new(id).to_json(), serde_json::json!("00000000-0000-0000-0000-000000000000"));

        let date = chrono::NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
        assert_eq!(Value::new(date).to_json(), serde_json::json!("2015-01-01"));
    }

    proptest::proptest! {
        #[test]
        fn prop_equality_follows_the_scalar(a in proptest::prelude::any::<i64>(), b in proptest::prelude::any::<i64>()) {
            proptest::prop_assert_eq!(Value::new(a) == Value::new(b), a == b);
            proptest::prop_assert_eq!(Value::new(a).clone(), Value::new(a));
        }

        #[test]
        fn prop_strings_render_verbatim(s in ".{0,24}") {
            proptest::prop_assert_eq!(Value::new(s.clone()).to_string(), s);
        }
    }
}
