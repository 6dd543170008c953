//! Content fingerprints
//!
//! Report generators cache their output per file and use a fingerprint of the
//! file's coverage data to decide when to regenerate. The hasher accepts a
//! closed set of value kinds: strings, integers, booleans, null, sequences,
//! pairs and JSON values.

use serde_json::Value;

/// A value that can be fed to a [`Hasher`]
pub trait Fingerprint {
    fn feed(&self, hasher: &mut Hasher);
}

/// Accumulates a fingerprint over typed values
///
/// Every value is prefixed with a kind tag, so `"1"` and `1` hash
/// differently, and sequences record their length.
#[derive(Debug, Clone, Default)]
pub struct Hasher {
    inner: blake3::Hasher,
}

impl Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` to the fingerprint
    pub fn update<T: Fingerprint + ?Sized>(&mut self, value: &T) {
        value.feed(self);
    }

    /// Hex digest of everything fed so far
    pub fn hexdigest(&self) -> String {
        self.inner.finalize().to_hex().to_string()
    }

    fn tag(&mut self, kind: &str) {
        self.inner.update(kind.as_bytes());
        self.inner.update(b":");
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.inner.update(&(bytes.len() as u64).to_le_bytes());
        self.inner.update(bytes);
    }
}

impl Fingerprint for str {
    fn feed(&self, hasher: &mut Hasher) {
        hasher.tag("str");
        hasher.bytes(self.as_bytes());
    }
}

impl Fingerprint for String {
    fn feed(&self, hasher: &mut Hasher) {
        self.as_str().feed(hasher);
    }
}

impl Fingerprint for bool {
    fn feed(&self, hasher: &mut Hasher) {
        hasher.tag("bool");
        hasher.inner.update(&[u8::from(*self)]);
    }
}

macro_rules! int_fingerprint {
    ($($ty:ty),*) => {
        $(
            impl Fingerprint for $ty {
                fn feed(&self, hasher: &mut Hasher) {
                    hasher.tag("int");
                    hasher.inner.update(&i128::from(*self).to_le_bytes());
                }
            }
        )*
    };
}

int_fingerprint!(i32, i64, u32, u64);

impl Fingerprint for f64 {
    fn feed(&self, hasher: &mut Hasher) {
        hasher.tag("float");
        hasher.inner.update(&self.to_le_bytes());
    }
}

impl<A: Fingerprint, B: Fingerprint> Fingerprint for (A, B) {
    fn feed(&self, hasher: &mut Hasher) {
        hasher.tag("pair");
        self.0.feed(hasher);
        self.1.feed(hasher);
    }
}

impl<T: Fingerprint> Fingerprint for [T] {
    fn feed(&self, hasher: &mut Hasher) {
        hasher.tag("seq");
        hasher.inner.update(&(self.len() as u64).to_le_bytes());
        for item in self {
            item.feed(hasher);
        }
    }
}

impl<T: Fingerprint> Fingerprint for Vec<T> {
    fn feed(&self, hasher: &mut Hasher) {
        self.as_slice().feed(hasher);
    }
}

impl<T: Fingerprint> Fingerprint for Option<T> {
    fn feed(&self, hasher: &mut Hasher) {
        match self {
            Some(value) => value.feed(hasher),
            None => hasher.tag("null"),
        }
    }
}

impl Fingerprint for Value {
    fn feed(&self, hasher: &mut Hasher) {
        match self {
            Value::Null => hasher.tag("null"),
            Value::Bool(b) => b.feed(hasher),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i.feed(hasher);
                } else if let Some(u) = n.as_u64() {
                    u.feed(hasher);
                } else {
                    n.as_f64().unwrap_or_default().feed(hasher);
                }
            }
            Value::String(s) => s.feed(hasher),
            Value::Array(items) => items.feed(hasher),
            Value::Object(map) => {
                // Keys are fed sorted, so insertion order never matters
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                hasher.tag("map");
                hasher.inner.update(&(keys.len() as u64).to_le_bytes());
                for key in keys {
                    key.feed(hasher);
                    map[key].feed(hasher);
                }
            }
        }
    }
}
