// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::SpoolingError;
use bitxor_io::{IndexFile, IoError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writer index of a queue, bumped by the commit protocol for `state_change`
pub const INDEX_FILENAME: &str = "index.dat";
/// Writer index of `state_change`, bumped by the producer
pub const INDEX_SERVER_FILENAME: &str = "index_server.dat";
/// Reader index of the server cleanup consumer
pub const INDEX_SERVER_READER_FILENAME: &str = "index_server_r.dat";
/// Reader index of the broker process
pub const INDEX_BROKER_READER_FILENAME: &str = "index_broker_r.dat";

fn message_path(directory: &Path, index: u64) -> PathBuf {
    directory.join(format!("{:016X}.dat", index))
}

/// Appends messages to a queue directory
pub struct FileQueueWriter {
    directory: PathBuf,
    index: IndexFile,
    buffer: Vec<u8>,
}

impl FileQueueWriter {
    /// Writer of the queue in `directory` using `index_filename` as writer index
    pub fn new(directory: impl Into<PathBuf>, index_filename: &str) -> Result<Self, SpoolingError> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|err| IoError::io(&directory, err))?;
        let index = IndexFile::new(directory.join(index_filename));
        Ok(FileQueueWriter {
            directory,
            index,
            buffer: Vec::new(),
        })
    }

    /// Appends bytes to the pending message
    pub fn write(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Writes the pending message to its file, then publishes it by bumping the writer index
    pub fn flush(&mut self) -> Result<(), SpoolingError> {
        let index = self.index.get_or(0)?;
        let path = message_path(&self.directory, index);
        fs::write(&path, &self.buffer).map_err(|err| IoError::io(&path, err))?;
        self.buffer.clear();
        self.index.increment()?;
        Ok(())
    }
}

/// Names of the files driving a queue read
#[derive(Clone, Debug)]
pub struct QueueReadOptions {
    /// queue directory
    pub directory: PathBuf,
    /// reader index, advanced as messages are consumed
    pub reader_index_filename: String,
    /// index bounding the read
    pub writer_index_filename: String,
}

impl QueueReadOptions {
    /// Options for reading `directory` from `reader` up to `writer`
    pub fn new(directory: impl Into<PathBuf>, reader: &str, writer: &str) -> Self {
        QueueReadOptions {
            directory: directory.into(),
            reader_index_filename: reader.to_string(),
            writer_index_filename: writer.to_string(),
        }
    }
}

/// Reads messages of a queue directory between a reader and a writer index
pub struct FileQueueReader {
    directory: PathBuf,
    reader_index: IndexFile,
    writer_index: IndexFile,
}

impl FileQueueReader {
    /// Reader over the queue described by `options`
    pub fn new(options: &QueueReadOptions) -> Self {
        FileQueueReader {
            reader_index: IndexFile::new(options.directory.join(&options.reader_index_filename)),
            writer_index: IndexFile::new(options.directory.join(&options.writer_index_filename)),
            directory: options.directory.clone(),
        }
    }

    /// Number of messages that can be read
    pub fn pending(&self) -> Result<u64, SpoolingError> {
        let reader = self.reader_index.get_or(0)?;
        let writer = self.writer_index.get_or(0)?;
        Ok(writer.saturating_sub(reader))
    }

    /// Passes the next message and its index to `consumer`, then advances the reader index.
    /// Returns `false` when the reader caught up with the writer. The reader index is left
    /// untouched when `consumer` fails so the message is read again on the next attempt.
    pub fn try_read_next_message(
        &mut self,
        consumer: impl FnOnce(u64, &[u8]) -> Result<(), SpoolingError>,
    ) -> Result<bool, SpoolingError> {
        let reader = self.reader_index.get_or(0)?;
        let writer = self.writer_index.get_or(0)?;
        if reader >= writer {
            return Ok(false);
        }

        let path = message_path(&self.directory, reader);
        let bytes = fs::read(&path).map_err(|err| IoError::io(&path, err))?;
        consumer(reader, &bytes)?;
        self.reader_index.set(reader + 1)?;
        Ok(true)
    }
}

/// Replays every readable message of a queue into `subscriber`, advancing the reader index.
/// `read_next` decodes a message and forwards it. Returns the number of messages read.
pub fn read_all<S: ?Sized>(
    options: &QueueReadOptions,
    subscriber: &mut S,
    mut read_next: impl FnMut(&[u8], &mut S) -> Result<(), SpoolingError>,
) -> Result<u64, SpoolingError> {
    let mut reader = FileQueueReader::new(options);
    let mut count = 0;
    let queue = options.directory.display().to_string();
    while reader.try_read_next_message(|index, bytes| {
        read_next(bytes, subscriber).map_err(|err| match err {
            SpoolingError::Serialization(reason) => SpoolingError::CorruptedMessage {
                queue: queue.clone(),
                index,
                reason,
            },
            other => other,
        })
    })? {
        count += 1;
    }
    if count > 0 {
        debug!(
            "read {} messages from {} ({} -> {})",
            count, queue, options.reader_index_filename, options.writer_index_filename
        );
    }
    Ok(count)
}
