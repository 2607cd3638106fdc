/// Name-keyed, insert-or-overwrite registry
///
/// Entries live in a dense `Vec` and are addressed either by name or by a small
/// typed id. Ids are stable for the registry's lifetime (overwriting a name
/// keeps its id), so render objects hold ids rather than references; a
/// reference obtained from `get` is only valid until the next insert, which the
/// borrow checker enforces.

use std::marker::PhantomData;
use rustc_hash::FxHashMap;

/// Typed index into a [`NamedRegistry`]
pub trait RegistryId: Copy {
    fn from_index(index: u32) -> Self;
    fn index(self) -> u32;
}

macro_rules! define_registry_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u32);

            impl $crate::resource::RegistryId for $name {
                fn from_index(index: u32) -> Self {
                    Self(index)
                }

                fn index(self) -> u32 {
                    self.0
                }
            }
        )*
    };
}
pub(crate) use define_registry_id;

#[derive(Debug)]
pub struct NamedRegistry<I: RegistryId, T> {
    ids: FxHashMap<String, u32>,
    names: Vec<String>,
    entries: Vec<T>,
    _id: PhantomData<I>,
}

impl<I: RegistryId, T> NamedRegistry<I, T> {
    pub fn new() -> Self {
        Self {
            ids: FxHashMap::default(),
            names: Vec::new(),
            entries: Vec::new(),
            _id: PhantomData,
        }
    }

    /// Insert `value` under `name`, replacing any previous entry of that name
    ///
    /// Returns the entry's id and the value it replaced, if any.
    pub fn insert(&mut self, name: &str, value: T) -> (I, Option<T>) {
        if let Some(&index) = self.ids.get(name) {
            let old = std::mem::replace(&mut self.entries[index as usize], value);
            return (I::from_index(index), Some(old));
        }

        let index = self.entries.len() as u32;
        self.ids.insert(name.to_string(), index);
        self.names.push(name.to_string());
        self.entries.push(value);
        (I::from_index(index), None)
    }

    /// Entry registered under `name`, `None` if it was never loaded
    pub fn get(&self, name: &str) -> Option<&T> {
        self.id(name).and_then(|id| self.get_by_id(id))
    }

    pub fn id(&self, name: &str) -> Option<I> {
        self.ids.get(name).map(|&index| I::from_index(index))
    }

    pub fn get_by_id(&self, id: I) -> Option<&T> {
        self.entries.get(id.index() as usize)
    }

    pub fn name(&self, id: I) -> Option<&str> {
        self.names.get(id.index() as usize).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ids.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in id order
    pub fn iter(&self) -> impl Iterator<Item = (I, &str, &T)> {
        self.names
            .iter()
            .zip(self.entries.iter())
            .enumerate()
            .map(|(index, (name, entry))| (I::from_index(index as u32), name.as_str(), entry))
    }
}

impl<I: RegistryId, T> Default for NamedRegistry<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
