//! Key Derivation Module
//!
//! Turns an argument set into a hashable identity used to index cached
//! results. Positional values keep their order; named values are sorted
//! by name so the order they were supplied in does not matter.
//!
//! Arguments must have a consistent `Eq`/`Hash`. Values whose equality
//! changes over time (interior mutability, unordered iteration) give
//! unspecified cache behavior; the bounds below are the only check.

use std::collections::BTreeMap;
use std::hash::Hash;

// == Key Part ==
/// One component of a [`CacheKey`].
///
/// Positional and named parts are tagged differently, so `f(4)` and
/// `f(x = 4)` never share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart<V> {
    Positional(V),
    Named(String, V),
}

// == Cache Key ==
/// Composite identity of one argument combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey<V> {
    parts: Vec<KeyPart<V>>,
}

impl<V> CacheKey<V> {
    /// Concatenates the positional values, in order, with the named values
    /// sorted by name.
    ///
    /// If a name is supplied more than once, the last value wins.
    pub fn derive<N>(
        positional: impl IntoIterator<Item = V>,
        named: impl IntoIterator<Item = (N, V)>,
    ) -> Self
    where
        N: Into<String>,
    {
        let sorted: BTreeMap<String, V> = named
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .collect();

        let parts = positional
            .into_iter()
            .map(KeyPart::Positional)
            .chain(
                sorted
                    .into_iter()
                    .map(|(name, value)| KeyPart::Named(name, value)),
            )
            .collect();

        Self { parts }
    }

    pub fn parts(&self) -> &[KeyPart<V>] {
        &self.parts
    }
}

// == Args ==
/// A call-site argument set with positional and named values.
///
/// This is the argument type to use when a wrapped function takes
/// keyword-style parameters:
///
/// ```
/// use ttl_memo::key::{Args, DeriveKey};
///
/// let a = Args::new().arg(1).named("scale", 2).named("offset", 3);
/// let b = Args::new().arg(1).named("offset", 3).named("scale", 2);
/// assert_eq!(a.derive_key(), b.derive_key());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args<V> {
    positional: Vec<V>,
    named: Vec<(String, V)>,
}

impl<V> Args<V> {
    pub fn new() -> Self {
        Self {
            positional: Vec::new(),
            named: Vec::new(),
        }
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: V) -> Self {
        self.positional.push(value);
        self
    }

    /// Adds a named argument. A repeated name overrides the earlier value.
    pub fn named(mut self, name: impl Into<String>, value: V) -> Self {
        self.named.push((name.into(), value));
        self
    }

    /// Positional argument at `index`.
    pub fn get(&self, index: usize) -> Option<&V> {
        self.positional.get(index)
    }

    /// Most recently supplied value for `name`.
    pub fn get_named(&self, name: &str) -> Option<&V> {
        self.named
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn positional(&self) -> &[V] {
        &self.positional
    }
}

// == Derive Key Trait ==
/// Types that can be used as the argument set of a memoized function.
///
/// Implemented for scalars, strings, `Vec`, `Option`, tuples and [`Args`].
/// For a custom argument struct, implement it by returning a clone of the
/// fields that identify the call:
///
/// ```
/// use ttl_memo::key::DeriveKey;
///
/// struct Query { user: u64, page: u32, verbose: bool }
///
/// impl DeriveKey for Query {
///     type Key = (u64, u32);
///     fn derive_key(&self) -> Self::Key {
///         (self.user, self.page)
///     }
/// }
/// ```
pub trait DeriveKey {
    type Key: Eq + Hash + Clone + Send + Sync + 'static;

    /// Derives the lookup key. Must be deterministic for equal arguments.
    fn derive_key(&self) -> Self::Key;
}

impl<V> DeriveKey for Args<V>
where
    V: Eq + Hash + Clone + Send + Sync + 'static,
{
    type Key = CacheKey<V>;

    fn derive_key(&self) -> Self::Key {
        CacheKey::derive(self.positional.iter().cloned(), self.named.iter().cloned())
    }
}

macro_rules! derive_key_by_clone {
    ($($ty:ty),* $(,)?) => {
        $(
            impl DeriveKey for $ty {
                type Key = $ty;

                fn derive_key(&self) -> Self::Key {
                    self.clone()
                }
            }
        )*
    };
}

derive_key_by_clone!(
    (), bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, String,
    &'static str,
);

impl<T: DeriveKey> DeriveKey for Vec<T> {
    type Key = Vec<T::Key>;

    fn derive_key(&self) -> Self::Key {
        self.iter().map(DeriveKey::derive_key).collect()
    }
}

impl<T: DeriveKey> DeriveKey for Option<T> {
    type Key = Option<T::Key>;

    fn derive_key(&self) -> Self::Key {
        self.as_ref().map(DeriveKey::derive_key)
    }
}

macro_rules! derive_key_for_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: DeriveKey),+> DeriveKey for ($($name,)+) {
            type Key = ($($name::Key,)+);

            fn derive_key(&self) -> Self::Key {
                ($(self.$idx.derive_key(),)+)
            }
        }
    };
}

derive_key_for_tuple!(A: 0);
derive_key_for_tuple!(A: 0, B: 1);
derive_key_for_tuple!(A: 0, B: 1, C: 2);
derive_key_for_tuple!(A: 0, B: 1, C: 2, D: 3);
derive_key_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4);
derive_key_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
