#![forbid(unsafe_code)]

//! Typed dependency lookup for nodes.
//!
//! A [`NodeContext`] maps [`ContextKey`]s to factories. Each navigation
//! instance turns it into a [`ContextSupplier`] that resolves every factory
//! lazily, at most once, and shares the value with all nodes in the tree.
//!
//! ```
//! use kioto::context::{ContextKey, NodeContext};
//!
//! static API_URL: ContextKey<String> = ContextKey::new("api_url");
//!
//! let context = NodeContext::new().provide(&API_URL, || "https://example.org".to_string());
//! # let _ = context;
//! ```

use std::any::{Any, TypeId};
use std::cell::OnceCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use ahash::AHashMap;

/// A typed, named context key. Two keys match when both the name and the
/// value type match.
pub struct ContextKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> ContextKey<T> {
    /// Create a key. Usable in `static` items.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// The key name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    fn slot(&self) -> SlotKey {
        SlotKey {
            type_id: TypeId::of::<T>(),
            name: self.name,
        }
    }
}

impl<T> fmt::Debug for ContextKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextKey")
            .field("name", &self.name)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SlotKey {
    type_id: TypeId,
    name: &'static str,
}

type Factory = Rc<dyn Fn() -> Rc<dyn Any>>;

/// Lookup failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// No factory was provided for the key.
    Missing {
        /// Key name.
        key: &'static str,
        /// Requested value type.
        type_name: &'static str,
    },
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { key, type_name } => {
                write!(f, "no value provided for context key `{key}` ({type_name})")
            }
        }
    }
}

impl std::error::Error for ContextError {}

/// Factories for context values, keyed by [`ContextKey`].
#[derive(Clone, Default)]
pub struct NodeContext {
    factories: AHashMap<SlotKey, Factory>,
}

impl NodeContext {
    /// Empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` for `key`, replacing any previous registration.
    #[must_use]
    pub fn provide<T: 'static>(
        mut self,
        key: &ContextKey<T>,
        factory: impl Fn() -> T + 'static,
    ) -> Self {
        let factory: Factory = Rc::new(move || Rc::new(factory()) as Rc<dyn Any>);
        self.factories.insert(key.slot(), factory);
        self
    }

    /// Number of registered keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().map(|k| k.name).collect();
        names.sort_unstable();
        f.debug_struct("NodeContext").field("keys", &names).finish()
    }
}

struct Slot {
    factory: Factory,
    value: OnceCell<Rc<dyn Any>>,
}

/// Per-navigation resolver. Each value is built on first lookup.
pub struct ContextSupplier {
    slots: AHashMap<SlotKey, Slot>,
}

impl ContextSupplier {
    pub(crate) fn new(context: &NodeContext) -> Self {
        let slots = context
            .factories
            .iter()
            .map(|(key, factory)| {
                (
                    *key,
                    Slot {
                        factory: Rc::clone(factory),
                        value: OnceCell::new(),
                    },
                )
            })
            .collect();
        Self { slots }
    }

    /// Resolve `key`.
    pub fn get<T: 'static>(&self, key: &ContextKey<T>) -> Result<Rc<T>, ContextError> {
        let missing = || ContextError::Missing {
            key: key.name,
            type_name: std::any::type_name::<T>(),
        };
        let slot = self.slots.get(&key.slot()).ok_or_else(missing)?;
        let value = slot.value.get_or_init(|| {
            tracing::trace!(target: "kioto.context", key = key.name, "resolving context value");
            (slot.factory)()
        });
        // Slots are keyed by TypeId, so the value is always a `T`.
        Rc::clone(value).downcast::<T>().map_err(|_| missing())
    }
}

impl fmt::Debug for ContextSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolved = self.slots.values().filter(|s| s.value.get().is_some()).count();
        f.debug_struct("ContextSupplier")
            .field("keys", &self.slots.len())
            .field("resolved", &resolved)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    static NAME: ContextKey<String> = ContextKey::new("name");
    static COUNT: ContextKey<u32> = ContextKey::new("count");

    #[test]
    fn resolves_provided_value() {
        let supplier = ContextSupplier::new(&NodeContext::new().provide(&NAME, || "kioto".into()));
        assert_eq!(*supplier.get(&NAME).unwrap(), "kioto");
    }

    #[test]
    fn factory_runs_once_and_value_is_shared() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let context = NodeContext::new().provide(&COUNT, move || {
            counter.set(counter.get() + 1);
            7
        });
        let supplier = ContextSupplier::new(&context);
        assert_eq!(calls.get(), 0);
        let a = supplier.get(&COUNT).unwrap();
        let b = supplier.get(&COUNT).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(calls.get(), 1);

        // A second supplier resolves independently.
        let other = ContextSupplier::new(&context);
        other.get(&COUNT).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn missing_key_reports_name_and_type() {
        let supplier = ContextSupplier::new(&NodeContext::new());
        let err = supplier.get(&COUNT).unwrap_err();
        assert_eq!(
            err,
            ContextError::Missing {
                key: "count",
                type_name: "u32"
            }
        );
    }

    #[test]
    fn same_name_different_type_is_a_different_key() {
        static AS_TEXT: ContextKey<String> = ContextKey::new("count");
        let supplier = ContextSupplier::new(&NodeContext::new().provide(&COUNT, || 1));
        assert!(matches!(
            supplier.get(&AS_TEXT),
            Err(ContextError::Missing { .. })
        ));
    }

    #[test]
    fn same_name_keys_of_different_types_resolve_independently() {
        static AS_TEXT: ContextKey<String> = ContextKey::new("count");
        let context = NodeContext::new()
            .provide(&COUNT, || 3)
            .provide(&AS_TEXT, || "three".into());
        assert_eq!(context.len(), 2);
        let supplier = ContextSupplier::new(&context);
        assert_eq!(*supplier.get(&COUNT).unwrap(), 3);
        assert_eq!(*supplier.get(&AS_TEXT).unwrap(), "three");
        assert_eq!(
            ContextError::Missing {
                key: "count",
                type_name: "u32"
            }
            .to_string(),
            "no value provided for context key `count` (u32)"
        );
    }

    #[test]
    fn later_provide_wins() {
        let context = NodeContext::new().provide(&COUNT, || 1).provide(&COUNT, || 2);
        assert_eq!(context.len(), 1);
        assert_eq!(*ContextSupplier::new(&context).get(&COUNT).unwrap(), 2);
    }
}
