// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::directory::{purge_directory, Directory};
use crate::error::IoError;
use crate::index_file::IndexFile;
use bitxor_models::block::{
    Block, BlockElement, BlockElementDeserializer, BlockElementSerializer,
};
use bitxor_models::height::Height;
use bitxor_serialization::{deserialize_exact, Serializer};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Number of block files stored in a single group directory
pub const FILES_PER_DIRECTORY: u64 = 10_000;

/// Append-only, height indexed block storage
pub trait BlockStorage: Send + Sync {
    /// Height of the last saved block, zero when empty
    fn chain_height(&self) -> Result<Height, IoError>;

    /// Loads the block element at `height`
    fn load_block_element(&self, height: Height) -> Result<BlockElement, IoError>;

    /// Loads the block at `height`
    fn load_block(&self, height: Height) -> Result<Block, IoError> {
        Ok(self.load_block_element(height)?.block)
    }

    /// Saves a block element. Saving below the chain height overwrites the stored block.
    fn save_block(&mut self, element: &BlockElement) -> Result<(), IoError>;

    /// Forgets every block above `height`
    fn drop_blocks_after(&mut self, height: Height) -> Result<(), IoError>;

    /// Removes every stored block
    fn purge(&mut self) -> Result<(), IoError>;
}

/// File backed block storage: `<root>/<group>/<id>.dat` plus `<root>/index.dat` holding the chain height
#[derive(Debug, Clone)]
pub struct FileBlockStorage {
    root: Directory,
    index: IndexFile,
    serializer: BlockElementSerializer,
    deserializer: BlockElementDeserializer,
}

impl FileBlockStorage {
    /// Block storage rooted at `root`
    pub fn new(root: Directory) -> Self {
        let index = IndexFile::new(root.file("index.dat"));
        FileBlockStorage {
            root,
            index,
            serializer: BlockElementSerializer::new(),
            deserializer: BlockElementDeserializer::new(),
        }
    }

    /// Root directory of the storage
    pub fn root(&self) -> &Directory {
        &self.root
    }

    fn block_path(&self, height: Height) -> PathBuf {
        let group = height.0 / FILES_PER_DIRECTORY;
        let id = height.0 % FILES_PER_DIRECTORY;
        self.root
            .path()
            .join(format!("{:05}", group))
            .join(format!("{:05}.dat", id))
    }

    /// Whether a block file exists for `height`, regardless of the index
    pub fn contains_block_file(&self, height: Height) -> bool {
        self.block_path(height).is_file()
    }

    fn set_chain_height(&self, height: Height) -> Result<(), IoError> {
        self.root.create()?;
        self.index.set(height.0)
    }
}

impl BlockStorage for FileBlockStorage {
    fn chain_height(&self) -> Result<Height, IoError> {
        Ok(Height(self.index.get_or(0)?))
    }

    fn load_block_element(&self, height: Height) -> Result<BlockElement, IoError> {
        if height > self.chain_height()? || height.0 == 0 {
            return Err(IoError::BlockNotFound(height));
        }

        let path = self.block_path(height);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(IoError::BlockNotFound(height))
            }
            Err(err) => return Err(IoError::io(path, err)),
        };
        deserialize_exact(&self.deserializer, &bytes)
            .map_err(|reason| IoError::CorruptedBlock { height, reason })
    }

    fn save_block(&mut self, element: &BlockElement) -> Result<(), IoError> {
        let height = element.height();
        let chain_height = self.chain_height()?;
        if height.0 == 0 || height.0 > chain_height.0 + 1 && chain_height.0 != 0 {
            return Err(IoError::InvalidBlockHeight {
                height,
                chain_height,
            });
        }

        let path = self.block_path(height);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| IoError::io(parent, err))?;
        }
        let mut buffer = Vec::new();
        self.serializer
            .serialize(element, &mut buffer)
            .map_err(|err| IoError::Serialization(err.to_string()))?;
        fs::write(&path, buffer).map_err(|err| IoError::io(&path, err))?;

        if height > chain_height {
            self.set_chain_height(height)?;
        }
        Ok(())
    }

    fn drop_blocks_after(&mut self, height: Height) -> Result<(), IoError> {
        let chain_height = self.chain_height()?;
        for dropped in (height.0 + 1)..=chain_height.0 {
            let path = self.block_path(Height(dropped));
            if path.is_file() {
                fs::remove_file(&path).map_err(|err| IoError::io(&path, err))?;
            }
        }
        self.set_chain_height(height)
    }

    fn purge(&mut self) -> Result<(), IoError> {
        purge_directory(self.root.path())
    }
}

/// Lowest height of the contiguous run of blocks ending at the chain height of `staging`.
/// Returns zero when `staging` holds no blocks.
pub fn find_start_height(staging: &FileBlockStorage) -> Result<Height, IoError> {
    let chain_height = staging.chain_height()?;
    if chain_height.0 == 0 {
        return Ok(Height(0));
    }

    let mut start_height = chain_height;
    while start_height.0 > 1 && staging.contains_block_file(start_height.prev()) {
        start_height = start_height.prev();
    }
    Ok(start_height)
}

/// Moves every block of `staging` into `destination`, which first drops any block at or above
/// the first staged height. Staging is purged afterwards. Returns the first moved height, zero
/// when nothing was staged.
pub fn move_block_files(
    staging: &mut FileBlockStorage,
    destination: &mut dyn BlockStorage,
) -> Result<Height, IoError> {
    let start_height = find_start_height(staging)?;
    if start_height.0 == 0 {
        return Ok(start_height);
    }

    let end_height = staging.chain_height()?;
    debug!(
        "moving blocks {} to {} out of {}",
        start_height,
        end_height,
        staging.root().path().display()
    );
    destination.drop_blocks_after(start_height.prev())?;
    for height in Height::range_inclusive(start_height, end_height) {
        let element = staging.load_block_element(height)?;
        destination.save_block(&element)?;
    }
    staging.purge()?;
    Ok(start_height)
}
