use std::fs::File;
use std::os::fd::{AsRawFd, RawFd};

use gauss_core::GaussCoreError;
use log::{debug, warn};
use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, pipe, ForkResult, Pid};

use super::transport::{recv_message, send_message, AckMessage, TaskMessage, STATUS_OK};
use super::worker::{self, RegionView};
use super::WorkerLink;

/// Closes every descriptor above stderr except `keep`.
///
/// Runs in the forked child: syscalls only.
fn close_inherited_fds(keep: [RawFd; 2]) {
    let (low, high) = (keep[0].min(keep[1]), keep[0].max(keep[1]));
    for (first, last) in [(3, low - 1), (low + 1, high - 1), (high + 1, RawFd::MAX)] {
        let first = first.max(3);
        if first <= last {
            close_fd_range(first, last);
        }
    }
}

fn close_fd_range(first: RawFd, last: RawFd) {
    #[cfg(target_os = "linux")]
    {
        // SAFETY: close_range only closes descriptors in the given range.
        let rc = unsafe {
            libc::syscall(
                libc::SYS_close_range,
                first as libc::c_uint,
                last as libc::c_uint,
                0 as libc::c_uint,
            )
        };
        if rc == 0 {
            return;
        }
    }

    // Kernels without close_range: walk up to the descriptor limit.
    // SAFETY: sysconf has no preconditions.
    let limit = match unsafe { libc::sysconf(libc::_SC_OPEN_MAX) } {
        n if n > 0 => n.min(65_536) as RawFd,
        _ => 1024,
    };
    for fd in first..=last.min(limit - 1) {
        // SAFETY: closing an unused or invalid descriptor has no other effect.
        unsafe {
            libc::close(fd);
        }
    }
}

/// Coordinator side of one worker process.
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    index: usize,
    pid: Pid,
    commands: File,
    acks: File,
    reaped: bool,
}

impl WorkerHandle {
    /// Waits for the process and checks it exited with status 0.
    fn join(&mut self) -> Result<(), GaussCoreError> {
        let status = loop {
            match waitpid(self.pid, None) {
                Ok(status) => break status,
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    self.reaped = true;
                    return Err(GaussCoreError::ResourceError(format!(
                        "waitpid failed for worker {}: {}",
                        self.index, e
                    )));
                }
            }
        };
        self.reaped = true;

        match status {
            WaitStatus::Exited(_, 0) => Ok(()),
            WaitStatus::Exited(_, code) => Err(GaussCoreError::WorkerFailure(format!(
                "worker {} (pid {}) exited with status {}",
                self.index, self.pid, code
            ))),
            other => Err(GaussCoreError::WorkerFailure(format!(
                "worker {} (pid {}) terminated abnormally: {:?}",
                self.index, self.pid, other
            ))),
        }
    }
}

impl WorkerLink for WorkerHandle {
    fn send(&mut self, task: &TaskMessage) -> Result<(), GaussCoreError> {
        send_message(&mut self.commands, task).map_err(|e| {
            GaussCoreError::ipc(format!("sending task to worker {}", self.index), e)
        })
    }

    fn recv_ack(&mut self) -> Result<AckMessage, GaussCoreError> {
        recv_message(&mut self.acks).map_err(|e| {
            GaussCoreError::ipc(format!("reading ack from worker {}", self.index), e)
        })
    }
}

/// The worker processes of one parallel solve.
///
/// Workers still alive when the pool is dropped (any path other than a
/// successful [`WorkerPool::shutdown`]) are killed and reaped.
#[derive(Debug)]
pub(crate) struct WorkerPool {
    workers: Vec<WorkerHandle>,
}

impl WorkerPool {
    /// Forks `count` workers that all eliminate inside `region`.
    pub(crate) fn spawn(region: RegionView<'_>, count: usize) -> Result<Self, GaussCoreError> {
        let mut pool = WorkerPool {
            workers: Vec::with_capacity(count),
        };
        for index in 0..count {
            pool.spawn_one(region, index)?;
        }
        debug!("Spawned {} worker processes", count);
        Ok(pool)
    }

    fn spawn_one(&mut self, region: RegionView<'_>, index: usize) -> Result<(), GaussCoreError> {
        let (command_rx, command_tx) = pipe()
            .map_err(|e| GaussCoreError::ResourceError(format!("pipe failed: {}", e)))?;
        let (ack_rx, ack_tx) = pipe()
            .map_err(|e| GaussCoreError::ResourceError(format!("pipe failed: {}", e)))?;

        // SAFETY: the child only closes descriptors, runs `worker::serve`
        // (syscalls and arithmetic, no allocation or locking) and `_exit`s.
        match unsafe { fork() } {
            Err(e) => Err(GaussCoreError::ResourceError(format!("fork failed: {}", e))),
            Ok(ForkResult::Child) => {
                drop(command_tx);
                drop(ack_rx);
                // Siblings' pipes, other solves' pipes and any sockets of the
                // parent belong to the parent only.
                close_inherited_fds([command_rx.as_raw_fd(), ack_tx.as_raw_fd()]);
                let mut commands = File::from(command_rx);
                let mut acks = File::from(ack_tx);
                let code = worker::serve(&mut commands, &mut acks, region);
                // SAFETY: `_exit` skips atexit handlers and stdio flushing inherited from the parent.
                unsafe { libc::_exit(code) }
            }
            Ok(ForkResult::Parent { child }) => {
                drop(command_rx);
                drop(ack_tx);
                debug!("Worker {} started with pid {}", index, child);
                self.workers.push(WorkerHandle {
                    index,
                    pid: child,
                    commands: File::from(command_tx),
                    acks: File::from(ack_rx),
                    reaped: false,
                });
                Ok(())
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.workers.len()
    }

    pub(crate) fn links(&mut self) -> &mut [WorkerHandle] {
        &mut self.workers
    }

    /// Sends `Exit` to every worker, collects every ack, then waits for each
    /// process and requires a clean exit.
    pub(crate) fn shutdown(mut self) -> Result<(), GaussCoreError> {
        for handle in &mut self.workers {
            handle.send(&TaskMessage::exit())?;
        }
        for handle in &mut self.workers {
            let ack = handle.recv_ack()?;
            if ack.status != STATUS_OK {
                return Err(GaussCoreError::WorkerFailure(format!(
                    "worker {} refused exit with status {}",
                    handle.index, ack.status
                )));
            }
        }
        for handle in &mut self.workers {
            handle.join()?;
        }
        debug!("All {} workers exited cleanly", self.workers.len());
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for handle in self.workers.iter_mut().filter(|h| !h.reaped) {
            warn!(
                "Terminating worker {} (pid {}) during unwinding",
                handle.index, handle.pid
            );
            let _ = kill(handle.pid, Signal::SIGKILL);
            while let Err(Errno::EINTR) = waitpid(handle.pid, None) {}
            handle.reaped = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    use gauss_core::EliminationPhase;
    use nix::sys::wait::WaitPidFlag;

    use super::super::drive_rounds;
    use super::super::shared_buffer::SharedBuffer;

    fn predefined() -> Vec<f64> {
        vec![
            2.0, 1.0, -1.0, 8.0, //
            -3.0, -1.0, 2.0, -11.0, //
            -2.0, 1.0, 2.0, -3.0,
        ]
    }

    fn assert_reaped(pids: &[Pid]) {
        for &pid in pids {
            assert_eq!(
                waitpid(pid, Some(WaitPidFlag::WNOHANG)),
                Err(Errno::ECHILD),
                "worker {} left behind",
                pid
            );
        }
    }

    #[test]
    fn test_clean_shutdown_after_rounds() {
        let mut buffer = SharedBuffer::from_slice(&predefined()).unwrap();
        let mut pool = WorkerPool::spawn(buffer.region(4), 2).unwrap();
        let pids: Vec<Pid> = pool.workers.iter().map(|w| w.pid).collect();

        drive_rounds(buffer.region(4), pool.links()).unwrap();
        pool.shutdown().unwrap();

        assert_reaped(&pids);
        assert!(buffer.as_slice()[4].abs() < 1e-12);
    }

    #[test]
    fn test_killed_worker_fails_shutdown() {
        let mut buffer = SharedBuffer::from_slice(&predefined()).unwrap();
        let pool = WorkerPool::spawn(buffer.region(4), 2).unwrap();
        let pids: Vec<Pid> = pool.workers.iter().map(|w| w.pid).collect();

        kill(pids[0], Signal::SIGKILL).unwrap();
        let err = pool.shutdown().unwrap_err();
        assert!(
            matches!(
                err,
                GaussCoreError::IpcError { .. } | GaussCoreError::WorkerFailure(_)
            ),
            "{:?}",
            err
        );
        assert_reaped(&pids);
    }

    #[test]
    fn test_closed_command_channel_is_a_nonzero_exit() {
        let mut buffer = SharedBuffer::from_slice(&predefined()).unwrap();
        let mut pool = WorkerPool::spawn(buffer.region(4), 1).unwrap();

        // Replacing the write end closes it; the worker reads EOF and exits 1.
        pool.workers[0].commands = File::open("/dev/null").unwrap();
        let err = pool.workers[0].join().unwrap_err();
        match err {
            GaussCoreError::WorkerFailure(message) => {
                assert!(message.contains("exited with status 1"), "{}", message)
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_singular_pivot_kills_and_reaps_workers() {
        let data = vec![
            1.0, 1.0, 1.0, 3.0, //
            1.0, 1.0, 2.0, 4.0, //
            2.0, 3.0, 1.0, 6.0,
        ];
        let mut buffer = SharedBuffer::from_slice(&data).unwrap();
        let mut pool = WorkerPool::spawn(buffer.region(4), 2).unwrap();
        let pids: Vec<Pid> = pool.workers.iter().map(|w| w.pid).collect();

        let err = drive_rounds(buffer.region(4), pool.links()).unwrap_err();
        assert!(matches!(
            err,
            GaussCoreError::SingularMatrix {
                column: 1,
                phase: EliminationPhase::ForwardElimination
            }
        ));
        drop(pool);
        assert_reaped(&pids);
    }

    #[test]
    fn test_workers_do_not_keep_unrelated_descriptors() {
        let (unrelated_rx, unrelated_tx) = pipe().unwrap();
        let mut buffer = SharedBuffer::from_slice(&predefined()).unwrap();
        let pool = WorkerPool::spawn(buffer.region(4), 1).unwrap();

        // The worker is still running; EOF means it closed its copy of the write end.
        drop(unrelated_tx);
        let mut rest = Vec::new();
        File::from(unrelated_rx).read_to_end(&mut rest).unwrap();
        assert!(rest.is_empty());

        pool.shutdown().unwrap();
    }
}
