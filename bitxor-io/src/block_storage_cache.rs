// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::block_storage::{move_block_files, BlockStorage, FileBlockStorage};
use crate::error::IoError;
use bitxor_models::block::{Block, BlockElement};
use bitxor_models::height::Height;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// Shared access to a block storage: many readers or one modifier
#[derive(Clone)]
pub struct BlockStorageCache {
    storage: Arc<RwLock<Box<dyn BlockStorage>>>,
}

impl BlockStorageCache {
    /// Wraps `storage`
    pub fn new(storage: Box<dyn BlockStorage>) -> Self {
        BlockStorageCache {
            storage: Arc::new(RwLock::new(storage)),
        }
    }

    /// Read-only view, blocks modifiers while alive
    pub fn view(&self) -> BlockStorageView<'_> {
        BlockStorageView {
            guard: self.storage.read(),
        }
    }

    /// Exclusive modifier. Changes are buffered until `commit`.
    pub fn modifier(&self) -> BlockStorageModifier<'_> {
        BlockStorageModifier {
            guard: self.storage.write(),
            drop_after: None,
            pending: Vec::new(),
        }
    }

    /// Moves the blocks staged in `staging` into the storage, see `move_block_files`
    pub fn move_blocks_from(&self, staging: &mut FileBlockStorage) -> Result<Height, IoError> {
        let mut guard = self.storage.write();
        move_block_files(staging, guard.as_mut())
    }
}

/// Read-only view over a `BlockStorageCache`
pub struct BlockStorageView<'a> {
    guard: RwLockReadGuard<'a, Box<dyn BlockStorage>>,
}

impl<'a> BlockStorageView<'a> {
    /// Chain height
    pub fn chain_height(&self) -> Result<Height, IoError> {
        self.guard.chain_height()
    }

    /// Block element at `height`
    pub fn load_block_element(&self, height: Height) -> Result<BlockElement, IoError> {
        self.guard.load_block_element(height)
    }

    /// Block at `height`
    pub fn load_block(&self, height: Height) -> Result<Block, IoError> {
        self.guard.load_block(height)
    }
}

/// Buffered writer over a `BlockStorageCache`
pub struct BlockStorageModifier<'a> {
    guard: RwLockWriteGuard<'a, Box<dyn BlockStorage>>,
    drop_after: Option<Height>,
    pending: Vec<BlockElement>,
}

impl<'a> BlockStorageModifier<'a> {
    /// Chain height including buffered changes
    pub fn chain_height(&self) -> Result<Height, IoError> {
        if let Some(last) = self.pending.last() {
            return Ok(last.height());
        }
        match self.drop_after {
            Some(height) => Ok(height),
            None => self.guard.chain_height(),
        }
    }

    /// Buffers a block save. The block must extend the chain.
    pub fn save_block(&mut self, element: BlockElement) -> Result<(), IoError> {
        let chain_height = self.chain_height()?;
        if element.height() != chain_height.next() {
            return Err(IoError::InvalidBlockHeight {
                height: element.height(),
                chain_height,
            });
        }
        self.pending.push(element);
        Ok(())
    }

    /// Buffers dropping every block above `height`, discarding buffered saves above it
    pub fn drop_blocks_after(&mut self, height: Height) -> Result<(), IoError> {
        self.pending.retain(|element| element.height() <= height);
        if self.pending.is_empty() {
            let stored_height = match self.drop_after {
                Some(dropped) => dropped,
                None => self.guard.chain_height()?,
            };
            if height < stored_height {
                self.drop_after = Some(height);
            }
        }
        Ok(())
    }

    /// Applies the buffered changes to the underlying storage
    pub fn commit(mut self) -> Result<(), IoError> {
        if let Some(height) = self.drop_after.take() {
            self.guard.drop_blocks_after(height)?;
        }
        for element in self.pending.drain(..) {
            self.guard.save_block(&element)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_storage::FileBlockStorage;
    use crate::directory::Directory;
    use crate::test_exports::create_block_element;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn cache(temp: &TempDir) -> BlockStorageCache {
        BlockStorageCache::new(Box::new(FileBlockStorage::new(Directory::new(
            temp.path().join("data"),
        ))))
    }

    #[test]
    fn modifier_changes_are_invisible_until_commit() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        {
            let mut modifier = cache.modifier();
            modifier.save_block(create_block_element(1)).unwrap();
            modifier.save_block(create_block_element(2)).unwrap();
            assert_eq!(modifier.chain_height().unwrap(), Height(2));
            // dropped without commit
        }
        assert_eq!(cache.view().chain_height().unwrap(), Height(0));

        let mut modifier = cache.modifier();
        modifier.save_block(create_block_element(1)).unwrap();
        modifier.commit().unwrap();
        assert_eq!(cache.view().chain_height().unwrap(), Height(1));
        assert_eq!(
            cache.view().load_block(Height(1)).unwrap().header.height,
            Height(1)
        );
    }

    #[test]
    fn modifier_rejects_non_contiguous_blocks() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let mut modifier = cache.modifier();
        assert_matches!(
            modifier.save_block(create_block_element(2)),
            Err(IoError::InvalidBlockHeight { .. })
        );
    }

    #[test]
    fn modifier_drops_then_saves() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let mut modifier = cache.modifier();
        for height in 1..=3 {
            modifier.save_block(create_block_element(height)).unwrap();
        }
        modifier.commit().unwrap();

        let mut modifier = cache.modifier();
        modifier.drop_blocks_after(Height(1)).unwrap();
        assert_eq!(modifier.chain_height().unwrap(), Height(1));
        modifier.save_block(create_block_element(2)).unwrap();
        modifier.commit().unwrap();
        assert_eq!(cache.view().chain_height().unwrap(), Height(2));
    }

    #[test]
    fn staged_blocks_are_moved_under_the_write_lock() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let mut modifier = cache.modifier();
        modifier.save_block(create_block_element(1)).unwrap();
        modifier.commit().unwrap();

        let mut staging = FileBlockStorage::new(Directory::new(temp.path().join("staging")));
        for height in 2..=3 {
            staging.save_block(&create_block_element(height)).unwrap();
        }
        assert_eq!(cache.move_blocks_from(&mut staging).unwrap(), Height(2));
        assert_eq!(cache.view().chain_height().unwrap(), Height(3));
        assert_eq!(staging.chain_height().unwrap(), Height(0));
    }
}
