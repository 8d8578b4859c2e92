// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::core_cache::{CacheDelta, CacheView, CoreCache};
use crate::error::CacheError;
use crate::sub_cache::SubCacheId;
use std::io::{Read, Write};
use tracing::debug;

/// Largest serialized key or value accepted when loading
const MAX_ENTRY_SIZE: u32 = 16 * 1024 * 1024;

/// Kind of content written by a `CacheStorage`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum StorageFormat {
    /// every entry
    Full = 0,
    /// entry count only for database backed sub caches, every entry otherwise
    Summary = 1,
}

/// Saves and loads the content of one sub cache
pub trait CacheStorage: Send + Sync {
    /// Sub cache name, used as file name stem
    fn name(&self) -> &str;

    /// Writes every entry of the sub cache in `view`
    fn save_all(&self, view: &CacheView, output: &mut dyn Write) -> Result<(), CacheError>;

    /// Writes every entry of the sub cache in `delta`, changes applied, in the `save_all` format
    fn save_all_from_delta(
        &self,
        delta: &CacheDelta,
        output: &mut dyn Write,
    ) -> Result<(), CacheError>;

    /// Writes a summary of the sub cache in `delta`
    fn save_summary(&self, delta: &CacheDelta, output: &mut dyn Write) -> Result<(), CacheError>;

    /// Loads what `save_all` or `save_summary` wrote into `cache`, `batch_size` entries at a time
    fn load_all(
        &self,
        cache: &CoreCache,
        input: &mut dyn Read,
        batch_size: usize,
    ) -> Result<(), CacheError>;
}

/// Storage of a registered sub cache
#[derive(Clone, Copy, Debug)]
pub struct SubCacheStorage {
    id: SubCacheId,
}

impl SubCacheStorage {
    /// Storage of sub cache `id`
    pub fn new(id: SubCacheId) -> Self {
        SubCacheStorage { id }
    }

    fn corrupted(&self, reason: impl Into<String>) -> CacheError {
        CacheError::CorruptedStorage {
            name: self.id.name().to_string(),
            reason: reason.into(),
        }
    }

    fn write_entries<'a>(
        output: &mut dyn Write,
        count: usize,
        entries: impl Iterator<Item = (&'a [u8], &'a [u8])>,
    ) -> Result<(), CacheError> {
        output.write_all(&(count as u64).to_le_bytes())?;
        for (key, value) in entries {
            for bytes in [key, value] {
                let len: u32 = bytes
                    .len()
                    .try_into()
                    .map_err(|_| CacheError::Serialization("entry too large".to_string()))?;
                output.write_all(&len.to_le_bytes())?;
                output.write_all(bytes)?;
            }
        }
        Ok(())
    }

    fn read_u64(input: &mut dyn Read) -> Result<u64, CacheError> {
        let mut bytes = [0u8; 8];
        input.read_exact(&mut bytes)?;
        Ok(u64::from_le_bytes(bytes))
    }

    fn read_bytes(&self, input: &mut dyn Read) -> Result<Vec<u8>, CacheError> {
        let mut len = [0u8; 4];
        input.read_exact(&mut len)?;
        let len = u32::from_le_bytes(len);
        if len > MAX_ENTRY_SIZE {
            return Err(self.corrupted(format!("entry of {} bytes", len)));
        }
        let mut bytes = vec![0u8; len as usize];
        input.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn load_from_stream(
        &self,
        cache: &CoreCache,
        input: &mut dyn Read,
        count: u64,
        batch_size: usize,
    ) -> Result<(), CacheError> {
        let batch_size = batch_size.max(1);
        let mut remaining = count;
        while remaining > 0 {
            let size = remaining.min(batch_size as u64);
            let mut batch = Vec::with_capacity(size as usize);
            for _ in 0..size {
                let key = self.read_bytes(input)?;
                let value = self.read_bytes(input)?;
                batch.push((key, value));
            }
            cache.load_entries(self.id, batch)?;
            remaining -= size;
        }
        Ok(())
    }

    fn load_from_database(
        &self,
        cache: &CoreCache,
        count: u64,
        batch_size: usize,
    ) -> Result<(), CacheError> {
        let database = cache
            .database()
            .ok_or_else(|| CacheError::DatabaseNotEnabled(self.id.name().to_string()))?;
        let entries = database.read().iterate_column(self.id.name())?;
        if entries.len() as u64 != count {
            debug!(
                "{} summary recorded {} entries, database holds {}",
                self.id.name(),
                count,
                entries.len()
            );
        }

        let mut entries = entries.into_iter().peekable();
        while entries.peek().is_some() {
            let batch: Vec<_> = entries.by_ref().take(batch_size.max(1)).collect();
            cache.load_entries(self.id, batch)?;
        }
        Ok(())
    }
}

impl CacheStorage for SubCacheStorage {
    fn name(&self) -> &str {
        self.id.name()
    }

    fn save_all(&self, view: &CacheView, output: &mut dyn Write) -> Result<(), CacheError> {
        output.write_all(&[StorageFormat::Full as u8])?;
        Self::write_entries(output, view.len(self.id), view.entries(self.id))
    }

    fn save_all_from_delta(
        &self,
        delta: &CacheDelta,
        output: &mut dyn Write,
    ) -> Result<(), CacheError> {
        output.write_all(&[StorageFormat::Full as u8])?;
        Self::write_entries(output, delta.len(self.id), delta.entries(self.id))
    }

    fn save_summary(&self, delta: &CacheDelta, output: &mut dyn Write) -> Result<(), CacheError> {
        output.write_all(&[StorageFormat::Summary as u8])?;
        let count = delta.len(self.id);
        if self.id.is_database_backed() {
            output.write_all(&(count as u64).to_le_bytes())?;
            return Ok(());
        }
        Self::write_entries(output, count, delta.entries(self.id))
    }

    fn load_all(
        &self,
        cache: &CoreCache,
        input: &mut dyn Read,
        batch_size: usize,
    ) -> Result<(), CacheError> {
        let mut format = [0u8; 1];
        input.read_exact(&mut format)?;
        let count = Self::read_u64(input)?;
        match format[0] {
            0 => self.load_from_stream(cache, input, count, batch_size),
            1 if self.id.is_database_backed() => self.load_from_database(cache, count, batch_size),
            1 => self.load_from_stream(cache, input, count, batch_size),
            other => Err(self.corrupted(format!("unknown storage format {}", other))),
        }
    }
}

impl CoreCache {
    /// Storages of every sub cache, in registration order
    pub fn storages(&self) -> Vec<Box<dyn CacheStorage>> {
        SubCacheId::ALL
            .iter()
            .map(|id| Box::new(SubCacheStorage::new(*id)) as Box<dyn CacheStorage>)
            .collect()
    }
}
