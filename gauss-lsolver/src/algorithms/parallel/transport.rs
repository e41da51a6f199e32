//! Fixed-size binary records exchanged between the coordinator and a worker.
//!
//! Records are native byte order and are only meant to cross a pipe on the
//! same host.

use std::io::{self, Read, Write};
use std::ops::Range;

use bytemuck::{Pod, Zeroable};

pub const STATUS_OK: i32 = 0;
pub const STATUS_UNKNOWN_COMMAND: i32 = 1;
pub const STATUS_INVALID_RANGE: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum Command {
    Work = 1,
    Exit = 2,
}

impl TryFrom<u64> for Command {
    type Error = u64;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Command::Work),
            2 => Ok(Command::Exit),
            other => Err(other),
        }
    }
}

/// Coordinator -> worker record.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct TaskMessage {
    pub command: u64,
    pub column: u64,
    pub start_row: u64,
    pub end_row: u64,
}

impl TaskMessage {
    /// Eliminate `column` from the half-open row range `rows`.
    pub fn work(column: usize, rows: Range<usize>) -> Self {
        Self {
            command: Command::Work as u64,
            column: column as u64,
            start_row: rows.start as u64,
            end_row: rows.end as u64,
        }
    }

    pub fn exit() -> Self {
        Self {
            command: Command::Exit as u64,
            ..Self::zeroed()
        }
    }

    pub fn command(&self) -> Result<Command, u64> {
        Command::try_from(self.command)
    }
}

/// Worker -> coordinator record. `status == 0` means success.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct AckMessage {
    pub status: i32,
}

/// Writes all of `bytes` or fails.
///
/// Interrupted writes are retried; a writer that accepts zero bytes is
/// reported as `WriteZero`.
pub fn write_full<W: Write + ?Sized>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    writer.write_all(bytes)
}

/// Fills all of `bytes` or fails.
///
/// Interrupted reads are retried; a zero-length read means the peer closed
/// the channel and is reported as `UnexpectedEof`, never as success.
pub fn read_full<R: Read + ?Sized>(reader: &mut R, bytes: &mut [u8]) -> io::Result<()> {
    reader.read_exact(bytes)
}

pub fn send_message<W: Write + ?Sized, T: Pod>(writer: &mut W, message: &T) -> io::Result<()> {
    write_full(writer, bytemuck::bytes_of(message))
}

pub fn recv_message<R: Read + ?Sized, T: Pod>(reader: &mut R) -> io::Result<T> {
    let mut message = T::zeroed();
    read_full(reader, bytemuck::bytes_of_mut(&mut message))?;
    Ok(message)
}
