//! The command loop a worker process runs until it is told to exit.
//!
//! Everything here runs in a forked child of a possibly multi-threaded
//! parent, so the loop must not allocate, log, or take locks: it only moves
//! fixed-size records over its pipes and does arithmetic on the shared rows.

use std::io::{Read, Write};
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{fence, Ordering};

use super::transport::{
    recv_message, send_message, AckMessage, Command, TaskMessage, STATUS_INVALID_RANGE,
    STATUS_OK, STATUS_UNKNOWN_COMMAND,
};
use crate::algorithms::elimination::reduce_rows;

/// Exit code after an acknowledged `Exit`.
pub const EXIT_OK: i32 = 0;
/// Exit code when the command channel is closed or returns a short record.
pub const EXIT_CHANNEL_CLOSED: i32 = 1;
/// Exit code when an ack could not be written.
pub const EXIT_ACK_FAILED: i32 = 2;

/// Row-major view of the matrix a worker eliminates in.
///
/// The view does not own the memory. Several processes (or, in tests, several
/// fake workers) hold copies of it at once; they stay sound because each
/// round hands them disjoint row ranges and the coordinator does not read the
/// buffer until every ack of the round is in.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RegionView<'a> {
    ptr: NonNull<f64>,
    rows: usize,
    width: usize,
    _marker: PhantomData<&'a [f64]>,
}

impl<'a> RegionView<'a> {
    /// Views an in-process buffer of whole rows of `width` values.
    #[cfg(test)]
    pub(crate) fn from_slice(data: &'a mut [f64], width: usize) -> Self {
        let rows = if width == 0 { 0 } else { data.len() / width };
        Self {
            ptr: NonNull::from(data).cast(),
            rows,
            width,
            _marker: PhantomData,
        }
    }

    /// # Safety
    /// `ptr` must point to `rows * width` initialised values that stay mapped
    /// for `'a`.
    pub(crate) unsafe fn from_raw(ptr: NonNull<f64>, rows: usize, width: usize) -> Self {
        Self {
            ptr,
            rows,
            width,
            _marker: PhantomData,
        }
    }

    pub(crate) fn rows(&self) -> usize {
        self.rows
    }

    /// Reads one element. Only meaningful between rounds, when no worker is
    /// writing.
    pub(crate) fn get(&self, row: usize, col: usize) -> f64 {
        assert!(row < self.rows && col < self.width, "element out of range");
        // SAFETY: bounds checked above; the memory is valid for 'a.
        unsafe { self.ptr.as_ptr().add(row * self.width + col).read() }
    }

    /// # Safety
    /// The caller must only touch rows no other holder of this view reads or
    /// writes until the slice is dropped.
    unsafe fn as_mut_slice(&self) -> &mut [f64] {
        std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.rows * self.width)
    }
}

/// Performs one `Work` task and returns the ack status.
///
/// An empty range is a no-op success. A range that is not strictly below the
/// pivot row, or that leaves the matrix, is refused with `STATUS_INVALID_RANGE`.
pub(crate) fn execute_task(task: &TaskMessage, region: &RegionView<'_>) -> i32 {
    let (Ok(column), Ok(start), Ok(end)) = (
        usize::try_from(task.column),
        usize::try_from(task.start_row),
        usize::try_from(task.end_row),
    ) else {
        return STATUS_INVALID_RANGE;
    };
    if start >= end {
        return STATUS_OK;
    }
    if column >= region.rows || start <= column || end > region.rows {
        return STATUS_INVALID_RANGE;
    }

    let width = region.width;
    // SAFETY: this task owns rows start..end for the round and only reads the
    // pivot row, which nobody writes while the round is in flight.
    let data = unsafe { region.as_mut_slice() };
    let (head, tail) = data.split_at_mut(start * width);
    let pivot_row = &head[column * width..(column + 1) * width];
    reduce_rows(pivot_row, &mut tail[..(end - start) * width], column);
    STATUS_OK
}

/// Worker loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    WaitingForTask,
    Terminated(i32),
}

/// Serves tasks from `commands` until `Exit` or a broken channel and returns
/// the process exit code.
///
/// A command record that cannot be read in full ends the loop without an ack;
/// the coordinator sees the missing ack and the nonzero exit status.
pub(crate) fn serve<R, W>(commands: &mut R, acks: &mut W, region: RegionView<'_>) -> i32
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut state = WorkerState::WaitingForTask;
    while state == WorkerState::WaitingForTask {
        let task: TaskMessage = match recv_message(commands) {
            Ok(task) => task,
            Err(_) => return EXIT_CHANNEL_CLOSED,
        };
        fence(Ordering::Acquire);

        let status = match task.command() {
            Ok(Command::Work) => execute_task(&task, &region),
            Ok(Command::Exit) => {
                state = WorkerState::Terminated(EXIT_OK);
                STATUS_OK
            }
            Err(_) => STATUS_UNKNOWN_COMMAND,
        };

        fence(Ordering::Release);
        if send_message(acks, &AckMessage { status }).is_err() {
            return EXIT_ACK_FAILED;
        }
    }

    match state {
        WorkerState::Terminated(code) => code,
        WorkerState::WaitingForTask => EXIT_CHANNEL_CLOSED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn script(tasks: &[TaskMessage]) -> Cursor<Vec<u8>> {
        Cursor::new(tasks.iter().flat_map(|t| bytemuck::bytes_of(t).to_vec()).collect())
    }

    fn statuses(acks: &[u8]) -> Vec<i32> {
        acks.chunks_exact(4)
            .map(|c| bytemuck::pod_read_unaligned::<AckMessage>(c).status)
            .collect()
    }

    fn predefined() -> Vec<f64> {
        vec![
            2.0, 1.0, -1.0, 8.0, //
            -3.0, -1.0, 2.0, -11.0, //
            -2.0, 1.0, 2.0, -3.0,
        ]
    }

    #[test]
    fn test_work_then_exit() {
        let mut data = predefined();
        let region = RegionView::from_slice(&mut data, 4);
        let mut commands = script(&[
            TaskMessage::work(0, 1..2),
            TaskMessage::work(0, 2..3),
            TaskMessage::exit(),
        ]);
        let mut acks = Vec::new();

        assert_eq!(serve(&mut commands, &mut acks, region), EXIT_OK);
        assert_eq!(statuses(&acks), vec![STATUS_OK; 3]);
        assert_eq!(data[4], 0.0);
        assert_eq!(data[8], 0.0);
        assert_eq!(&data[..4], &[2.0, 1.0, -1.0, 8.0]);
    }

    #[test]
    fn test_empty_range_is_acknowledged() {
        let mut data = predefined();
        let before = data.clone();
        let region = RegionView::from_slice(&mut data, 4);
        let mut commands = script(&[TaskMessage::work(0, 2..2), TaskMessage::exit()]);
        let mut acks = Vec::new();

        assert_eq!(serve(&mut commands, &mut acks, region), EXIT_OK);
        assert_eq!(statuses(&acks), vec![STATUS_OK, STATUS_OK]);
        assert_eq!(data, before);
    }

    #[test]
    fn test_bad_tasks_report_status_and_continue() {
        let mut data = predefined();
        let region = RegionView::from_slice(&mut data, 4);
        let unknown = TaskMessage {
            command: 7,
            ..TaskMessage::work(0, 1..2)
        };
        let mut commands = script(&[
            TaskMessage::work(1, 1..3), // overlaps the pivot row
            TaskMessage::work(0, 1..4), // past the last row
            unknown,
            TaskMessage::exit(),
        ]);
        let mut acks = Vec::new();

        assert_eq!(serve(&mut commands, &mut acks, region), EXIT_OK);
        assert_eq!(
            statuses(&acks),
            vec![
                STATUS_INVALID_RANGE,
                STATUS_INVALID_RANGE,
                STATUS_UNKNOWN_COMMAND,
                STATUS_OK
            ]
        );
    }

    #[test]
    fn test_truncated_command_exits_without_ack() {
        let mut data = predefined();
        let region = RegionView::from_slice(&mut data, 4);
        let mut bytes = bytemuck::bytes_of(&TaskMessage::work(0, 1..3)).to_vec();
        bytes.extend_from_slice(&[1, 0, 0]);
        let mut commands = Cursor::new(bytes);
        let mut acks = Vec::new();

        assert_eq!(
            serve(&mut commands, &mut acks, region),
            EXIT_CHANNEL_CLOSED
        );
        assert_eq!(statuses(&acks), vec![STATUS_OK]);
    }
}
