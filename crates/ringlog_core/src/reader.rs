//! Rendering of the whole-log view.

use crate::command::SeekTo;
use crate::error::CoreResult;
use crate::store::RecordStore;

/// Which part of the whole-log view a response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadRequest {
    /// Every retained record.
    #[default]
    WholeLog,
    /// The tail starting at a command-supplied address.
    FromCommand(SeekTo),
}

/// Produces response bytes from a borrowed store.
///
/// Holding the borrow for the duration of the read is what keeps the result
/// consistent with a single store state; [`crate::RecordLog`] takes its lock
/// around the materializer.
#[derive(Debug, Clone, Copy)]
pub struct ReadMaterializer<'a> {
    store: &'a RecordStore,
}

impl<'a> ReadMaterializer<'a> {
    /// Creates a materializer over `store`.
    pub fn new(store: &'a RecordStore) -> Self {
        Self { store }
    }

    /// Returns the whole log.
    ///
    /// # Errors
    ///
    /// Returns an allocation error if the output cannot be reserved.
    pub fn read_all(&self) -> CoreResult<Vec<u8>> {
        self.store.read_from(0)
    }

    /// Returns the log tail starting at `(record_index, intra_offset)`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::InvalidAddress`] if the address does not
    /// name a retained byte.
    pub fn read_from_command(&self, seek: SeekTo) -> CoreResult<Vec<u8>> {
        let offset = self
            .store
            .locate_by_command(seek.record_index, seek.intra_offset)?;
        self.store.read_from(offset)
    }

    /// Serves a [`ReadRequest`].
    ///
    /// # Errors
    ///
    /// See [`Self::read_all`] and [`Self::read_from_command`].
    pub fn materialize(&self, request: ReadRequest) -> CoreResult<Vec<u8>> {
        match request {
            ReadRequest::WholeLog => self.read_all(),
            ReadRequest::FromCommand(seek) => self.read_from_command(seek),
        }
    }
}
