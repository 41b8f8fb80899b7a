//! File-like access to a shared record log.
//!
//! A [`LogDevice`] exposes the log through open handles that behave like a
//! character device: each [`DeviceFile`] has its own position, reads return
//! bytes from at most one record at a time, writes accumulate until a
//! terminator completes a record, and seeks address the whole-log view.
//! Partial writes from every handle feed one device-wide pending record.

use crate::assembler::{AssemblerOutcome, WriteAssembler};
use crate::command::SeekTo;
use crate::error::{CoreError, CoreResult};
use crate::log::RecordLog;
use parking_lot::Mutex;
use std::io::{self, SeekFrom};
use std::sync::Arc;
use tracing::debug;

/// A shared log reachable through file-like handles.
#[derive(Debug)]
pub struct LogDevice {
    log: Arc<RecordLog>,
    pending: Mutex<WriteAssembler>,
}

impl LogDevice {
    /// Wraps `log` as a device.
    pub fn new(log: Arc<RecordLog>) -> Arc<Self> {
        let pending = WriteAssembler::new(log.config());
        Arc::new(Self {
            log,
            pending: Mutex::new(pending),
        })
    }

    /// Opens a handle positioned at the start of the log.
    pub fn open(self: &Arc<Self>) -> DeviceFile {
        DeviceFile {
            device: Arc::clone(self),
            position: 0,
        }
    }

    /// Returns the underlying log.
    pub fn log(&self) -> &Arc<RecordLog> {
        &self.log
    }

    /// Returns the number of bytes written but not yet terminated.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().pending_len()
    }
}

/// An open handle on a [`LogDevice`].
#[derive(Debug)]
pub struct DeviceFile {
    device: Arc<LogDevice>,
    position: u64,
}

impl DeviceFile {
    /// Returns the current file position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Reads from the current position into `buf`.
    ///
    /// Returns bytes from the single record containing the position, at most
    /// `buf.len()` of them, and advances the position. Returns 0 at the end
    /// of the log.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let position = self.position;
        let n = self.device.log.with_store(|store| {
            let chunk = store.read_chunk(position, buf.len());
            buf[..chunk.len()].copy_from_slice(chunk);
            chunk.len()
        });
        self.position += n as u64;
        n
    }

    /// Writes `data` into the device-wide pending record.
    ///
    /// Each terminator completes a record, which is appended to the log; the
    /// position advances by the length of every record committed. Returns the
    /// number of bytes accepted, which is always `data.len()` on success.
    ///
    /// # Errors
    ///
    /// Returns an allocation error if the pending record cannot grow, or a
    /// storage error if the journal rejects a completed record.
    pub fn write(&mut self, data: &[u8]) -> CoreResult<usize> {
        let mut pending = self.device.pending.lock();
        let mut outcome = pending.feed(data)?;

        while let AssemblerOutcome::RecordReady(record) = outcome {
            let len = record.len() as u64;
            self.device.log.append(record)?;
            self.position += len;
            outcome = pending.poll();
        }

        Ok(data.len())
    }

    /// Moves the file position.
    ///
    /// `SeekFrom::End` is relative to the current whole-log length.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidSeek`] if the result would be negative or
    /// overflow.
    pub fn seek(&mut self, pos: SeekFrom) -> CoreResult<u64> {
        let (base, delta) = match pos {
            SeekFrom::Start(offset) => {
                self.position = offset;
                return Ok(offset);
            }
            SeekFrom::Current(delta) => (self.position, delta),
            SeekFrom::End(delta) => (self.device.log.total_length(), delta),
        };

        let target = base.checked_add_signed(delta).ok_or_else(|| {
            CoreError::invalid_seek(format!("{base} + {delta} is not a valid position"))
        })?;
        self.position = target;
        Ok(target)
    }

    /// Positions the handle at `(record_index, intra_offset)`.
    ///
    /// Subsequent reads continue sequentially from that byte.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidAddress`] if the address does not name a
    /// retained byte; the position is then unchanged.
    pub fn seek_to(&mut self, seek: SeekTo) -> CoreResult<u64> {
        let offset = self
            .device
            .log
            .locate_by_command(seek.record_index, seek.intra_offset)?;
        debug!(%seek, offset, "device seek");
        self.position = offset;
        Ok(offset)
    }
}

impl io::Read for DeviceFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(DeviceFile::read(self, buf))
    }
}

impl io::Write for DeviceFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        DeviceFile::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.device.log.sync().map_err(io::Error::from)
    }
}

impl io::Seek for DeviceFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        DeviceFile::seek(self, pos).map_err(io::Error::from)
    }
}
