// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::CacheError;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::iter::Peekable;
use std::marker::PhantomData;

/// Committed content of a sub cache: serialized key to serialized value
pub(crate) type SubCacheEntries = BTreeMap<Vec<u8>, Vec<u8>>;

/// Uncommitted changes of a sub cache: `None` marks a removal
pub(crate) type SubCacheOverlay = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Identifier of every sub cache held by the cache
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubCacheId {
    /// accounts and their balances
    AccountState = 0,
    /// per block statistics
    BlockStatistic = 1,
    /// namespaces and their aliases
    Namespace = 2,
    /// token definitions
    Token = 3,
}

impl SubCacheId {
    /// Every sub cache in registration order
    pub const ALL: [SubCacheId; 4] = [
        SubCacheId::AccountState,
        SubCacheId::BlockStatistic,
        SubCacheId::Namespace,
        SubCacheId::Token,
    ];

    /// Position in registration order
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name used for storage files and database columns
    pub fn name(self) -> &'static str {
        match self {
            SubCacheId::AccountState => "AccountStateCache",
            SubCacheId::BlockStatistic => "BlockStatisticCache",
            SubCacheId::Namespace => "NamespaceCache",
            SubCacheId::Token => "TokenCache",
        }
    }

    /// Whether the sub cache contributes a Merkle root to the state hash
    pub fn is_verifiable(self) -> bool {
        !matches!(self, SubCacheId::BlockStatistic)
    }

    /// Whether the sub cache content lives in the cache database when it is enabled
    pub fn is_database_backed(self) -> bool {
        !matches!(self, SubCacheId::BlockStatistic)
    }

    /// Database column names of the database backed sub caches
    pub fn database_columns() -> Vec<String> {
        SubCacheId::ALL
            .iter()
            .filter(|id| id.is_database_backed())
            .map(|id| id.name().to_string())
            .collect()
    }
}

/// Typed description of a sub cache: how its keys and values are encoded
pub trait SubCacheDescriptor {
    /// Sub cache described
    const ID: SubCacheId;
    /// Key type
    type Key;
    /// Value type
    type Value: Clone;

    /// Key under which `value` is stored
    fn key_of(value: &Self::Value) -> Self::Key;

    /// Encodes a key. Byte order of encoded keys is the iteration order.
    fn serialize_key(key: &Self::Key) -> Result<Vec<u8>, CacheError>;

    /// Decodes a key
    fn deserialize_key(bytes: &[u8]) -> Result<Self::Key, CacheError>;

    /// Encodes a value
    fn serialize_value(value: &Self::Value) -> Result<Vec<u8>, CacheError>;

    /// Decodes a value
    fn deserialize_value(bytes: &[u8]) -> Result<Self::Value, CacheError>;
}

pub(crate) fn deserialization_error<D: SubCacheDescriptor>(reason: String) -> CacheError {
    CacheError::Deserialization {
        name: D::ID.name().to_string(),
        reason,
    }
}

/// Looks `key` up in the overlay first, then in the committed entries
pub(crate) fn lookup<'a>(
    base: &'a SubCacheEntries,
    overlay: Option<&'a SubCacheOverlay>,
    key: &[u8],
) -> Option<&'a [u8]> {
    match overlay.and_then(|overlay| overlay.get(key)) {
        Some(Some(value)) => Some(value.as_slice()),
        Some(None) => None,
        None => base.get(key).map(|value| value.as_slice()),
    }
}

/// Sorted iterator over the committed entries with the overlay applied
pub(crate) struct MergedEntries<'a> {
    base: Peekable<std::collections::btree_map::Iter<'a, Vec<u8>, Vec<u8>>>,
    overlay: Peekable<std::collections::btree_map::Iter<'a, Vec<u8>, Option<Vec<u8>>>>,
}

impl<'a> MergedEntries<'a> {
    pub(crate) fn new(base: &'a SubCacheEntries, overlay: &'a SubCacheOverlay) -> Self {
        MergedEntries {
            base: base.iter().peekable(),
            overlay: overlay.iter().peekable(),
        }
    }
}

impl<'a> Iterator for MergedEntries<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let order = match (self.base.peek(), self.overlay.peek()) {
                (None, None) => return None,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some((base_key, _)), Some((overlay_key, _))) => base_key.cmp(overlay_key),
            };

            match order {
                Ordering::Less => {
                    return self
                        .base
                        .next()
                        .map(|(key, value)| (key.as_slice(), value.as_slice()))
                }
                Ordering::Equal => {
                    // shadowed by the overlay
                    self.base.next();
                }
                Ordering::Greater => {}
            }
            match self.overlay.next() {
                Some((key, Some(value))) => return Some((key.as_slice(), value.as_slice())),
                Some((_, None)) => continue,
                None => return None,
            }
        }
    }
}

/// Typed read access to a sub cache of a view or a delta
pub struct SubCacheReader<'a, D: SubCacheDescriptor> {
    base: &'a SubCacheEntries,
    overlay: Option<&'a SubCacheOverlay>,
    _descriptor: PhantomData<D>,
}

impl<'a, D: SubCacheDescriptor> SubCacheReader<'a, D> {
    pub(crate) fn new(base: &'a SubCacheEntries, overlay: Option<&'a SubCacheOverlay>) -> Self {
        SubCacheReader {
            base,
            overlay,
            _descriptor: PhantomData,
        }
    }

    /// Value stored under `key`
    pub fn find(&self, key: &D::Key) -> Result<Option<D::Value>, CacheError> {
        let key = D::serialize_key(key)?;
        lookup(self.base, self.overlay, &key)
            .map(D::deserialize_value)
            .transpose()
    }

    /// Whether `key` is present
    pub fn contains(&self, key: &D::Key) -> Result<bool, CacheError> {
        let key = D::serialize_key(key)?;
        Ok(lookup(self.base, self.overlay, &key).is_some())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        match self.overlay {
            None => self.base.len(),
            Some(overlay) => MergedEntries::new(self.base, overlay).count(),
        }
    }

    /// Whether the sub cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every value, in key order
    pub fn values(&self) -> Result<Vec<D::Value>, CacheError> {
        match self.overlay {
            None => self
                .base
                .values()
                .map(|value| D::deserialize_value(value))
                .collect(),
            Some(overlay) => MergedEntries::new(self.base, overlay)
                .map(|(_, value)| D::deserialize_value(value))
                .collect(),
        }
    }
}

/// Typed write access to a sub cache of a delta
pub struct SubCacheModifier<'a, D: SubCacheDescriptor> {
    base: &'a SubCacheEntries,
    overlay: &'a mut SubCacheOverlay,
    _descriptor: PhantomData<D>,
}

impl<'a, D: SubCacheDescriptor> SubCacheModifier<'a, D> {
    pub(crate) fn new(base: &'a SubCacheEntries, overlay: &'a mut SubCacheOverlay) -> Self {
        SubCacheModifier {
            base,
            overlay,
            _descriptor: PhantomData,
        }
    }

    /// Value stored under `key`
    pub fn find(&self, key: &D::Key) -> Result<Option<D::Value>, CacheError> {
        let key = D::serialize_key(key)?;
        lookup(self.base, Some(self.overlay), &key)
            .map(D::deserialize_value)
            .transpose()
    }

    /// Whether `key` is present
    pub fn contains(&self, key: &D::Key) -> Result<bool, CacheError> {
        let key = D::serialize_key(key)?;
        Ok(lookup(self.base, Some(self.overlay), &key).is_some())
    }

    /// Inserts or replaces `value` under its key
    pub fn insert(&mut self, value: &D::Value) -> Result<(), CacheError> {
        let key = D::serialize_key(&D::key_of(value))?;
        let value = D::serialize_value(value)?;
        if self.base.get(&key) == Some(&value) {
            // restoring the committed value cancels the change
            self.overlay.remove(&key);
        } else {
            self.overlay.insert(key, Some(value));
        }
        Ok(())
    }

    /// Removes `key`, returning whether it was present
    pub fn remove(&mut self, key: &D::Key) -> Result<bool, CacheError> {
        let key = D::serialize_key(key)?;
        let present = lookup(self.base, Some(self.overlay), &key).is_some();
        if self.base.contains_key(&key) {
            self.overlay.insert(key, None);
        } else {
            self.overlay.remove(&key);
        }
        Ok(present)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(u8, u8)]) -> SubCacheEntries {
        pairs.iter().map(|(k, v)| (vec![*k], vec![*v])).collect()
    }

    #[test]
    fn merged_entries_apply_overlay_in_order() {
        let base = entries(&[(1, 10), (3, 30), (5, 50)]);
        let mut overlay = SubCacheOverlay::new();
        overlay.insert(vec![0], Some(vec![0]));
        overlay.insert(vec![3], None);
        overlay.insert(vec![5], Some(vec![55]));
        overlay.insert(vec![9], None);

        let merged: Vec<(u8, u8)> = MergedEntries::new(&base, &overlay)
            .map(|(k, v)| (k[0], v[0]))
            .collect();
        assert_eq!(merged, vec![(0, 0), (1, 10), (5, 55)]);
    }

    #[test]
    fn lookup_prefers_overlay() {
        let base = entries(&[(1, 10), (2, 20)]);
        let mut overlay = SubCacheOverlay::new();
        overlay.insert(vec![1], None);
        overlay.insert(vec![2], Some(vec![21]));
        assert_eq!(lookup(&base, Some(&overlay), &[1]), None);
        assert_eq!(lookup(&base, Some(&overlay), &[2]), Some([21u8].as_slice()));
        assert_eq!(lookup(&base, None, &[1]), Some([10u8].as_slice()));
    }
}
