use std::{
    io::{self, Read},
    fs,
    path::{Path, PathBuf},
    process::{Child, Command, Output},
    thread,
    time::{Duration, Instant},
};
use crate::{
    Error,
    err::{add_path, error},
};

/// Finds an executable, and returns Error, if executable is not available.
pub fn find_exe(p: impl AsRef<Path>) -> Result<PathBuf, Error> {
    which::which(p.as_ref()).map_err(|_| Error::NoExec(p.as_ref().to_owned()))
}

/// Checks that the path points to an existing, non-empty regular file.
pub fn nonempty_file(path: &Path) -> crate::Result<()> {
    let meta = fs::metadata(path).map_err(add_path!(path))?;
    if !meta.is_file() {
        Err(error!(InvalidInput, "{} is not a regular file", super::fmt::path(path)))
    } else if meta.len() == 0 {
        Err(error!(InvalidInput, "{} is empty", super::fmt::path(path)))
    } else {
        Ok(())
    }
}

/// RAII child wrapper, that kills the child if it gets dropped.
pub struct ChildGuard {
    child: Child,
    armed: bool,
}

impl ChildGuard {
    pub fn new(child: Child) -> Self {
        Self {
            child,
            armed: true,
        }
    }

    pub fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if self.armed {
            match self.child.kill() {
                // InvalidInput means that the process exited already.
                Err(e) if e.kind() != io::ErrorKind::InvalidInput =>
                    log::error!("Could not kill child process: {}", e),
                // Reap the killed process.
                _ => {
                    let _ = self.child.wait();
                }
            }
        }
    }
}

/// Reads the whole stream on a separate thread, so that the child never blocks on a full pipe.
fn drain<R: Read + Send + 'static>(mut stream: R) -> thread::JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join_drained(handle: thread::JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    // join() returns Result<io::Result<Vec<u8>>, Any>.
    // expect unwraps the outer Err, then the inner Result is returned as is.
    handle.join().expect("Stream reader thread panicked")
}

/// How often a running child is checked against the time limit.
const POLL_DELAY: Duration = Duration::from_millis(100);

/// Runs a command to completion and collects its piped streams.
/// If `limit` is set and the process runs past it, the process is killed and `Error::Timeout` is returned.
/// Exit status is returned as is: the caller decides what a failure means.
pub fn run_limited(mut command: Command, limit: Option<Duration>) -> crate::Result<Output> {
    let program = command.get_program().to_string_lossy().into_owned();
    let child = command.spawn().map_err(add_path!(command.get_program()))?;
    let mut guard = ChildGuard::new(child);
    let stdout_handle = guard.child_mut().stdout.take().map(drain);
    let stderr_handle = guard.child_mut().stderr.take().map(drain);

    let start = Instant::now();
    let status = loop {
        match guard.child_mut().try_wait().map_err(add_path!(!))? {
            Some(status) => break status,
            None => {
                if let Some(limit) = limit {
                    if start.elapsed() >= limit {
                        // Guard is still armed and kills the child on return.
                        return Err(Error::Timeout(program, limit));
                    }
                }
                thread::sleep(POLL_DELAY);
            }
        }
    };
    guard.disarm();
    Ok(Output {
        status,
        stdout: stdout_handle.map(join_drained).transpose().map_err(add_path!(!))?.unwrap_or_default(),
        stderr: stderr_handle.map(join_drained).transpose().map_err(add_path!(!))?.unwrap_or_default(),
    })
}
