//! Module with the pipe-backed redirection and its transaction engine.
//!
//! [`PipeRedirect::new`] allocates a pipe pair per redirected stream and
//! splits each pair in two: the "remote" end is moved into a [`Stdio`]
//! triple destined for the child process, the "local" end is retained for
//! the parent side. [`PipeRedirect::transact`] then drives the local ends
//! with a private event loop: it drains an input buffer into the child's
//! standard input while accumulating everything the child writes to its
//! standard output and error.

use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use log::{debug, trace};
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Registry, Token};

use crate::error::Error;
use crate::stdio::{Redirect, Stdio};
use crate::stream::{Reader, State, Writer};

/// Token used for the local end of the standard input pipe.
const STDIN: Token = Token(0);
/// Token used for the local end of the standard output pipe.
const STDOUT: Token = Token(1);
/// Token used for the local end of the standard error pipe.
const STDERR: Token = Token(2);

/// Null device, opened for standard input when it is not piped.
const DEV_NULL: &[u8] = b"/dev/null\0";

/// Input and output of a single [`transact`] call.
///
/// [`transact`]: PipeRedirect::transact
#[derive(Debug, Default)]
pub struct Transaction {
    /// Bytes sent to the child's standard input.
    pub input: Vec<u8>,
    /// Bytes collected from the child's standard output.
    pub output: Vec<u8>,
    /// Bytes collected from the child's standard error.
    pub error: Vec<u8>,
}

impl Transaction {
    /// Create a transaction that sends `input` to the child.
    pub fn with_input(input: Vec<u8>) -> Transaction {
        Transaction {
            input,
            output: Vec::new(),
            error: Vec::new(),
        }
    }
}

/// Redirection of the standard streams through pipes.
///
/// Construction wires the remote pipe ends into an embedded [`Stdio`]
/// triple, which the [`Redirect`] implementation remaps in the child; the
/// local ends stay behind for [`transact`]. The local ends are marked
/// close-on-exec, so they are never inherited by the child.
///
/// After the fork the parent must call [`close`] to release its copies of
/// the child's ends (otherwise the output streams never reach end-of-file),
/// and must keep the `PipeRedirect` alive until [`transact`] completes.
///
/// [`transact`]: PipeRedirect::transact
/// [`close`]: Redirect::close
#[derive(Debug)]
pub struct PipeRedirect {
    /// Descriptor triple destined for the child process.
    remote: Stdio,
    /// Local write end of the child's standard input pipe.
    stdin: Option<OwnedFd>,
    /// Local read end of the child's standard output pipe.
    stdout: Option<OwnedFd>,
    /// Local read end of the child's standard error pipe.
    stderr: Option<OwnedFd>,
}

impl PipeRedirect {
    /// Create a new pipe-backed redirection.
    ///
    /// A pipe pair is always created for standard output. If
    /// `combine_output` is true no standard error pipe is created, instead
    /// the child's standard error is remapped onto its standard output pipe
    /// by [`redirect`]. If `pipe_stdin` is true a pipe pair is created for
    /// standard input, otherwise the child's standard input is the null
    /// device and it sees immediate end-of-input.
    ///
    /// [`redirect`]: Redirect::redirect
    pub fn new(combine_output: bool, pipe_stdin: bool) -> Result<PipeRedirect, Error> {
        let mut remote = Stdio::new();

        // Standard output.
        let (read, write) = new_pipe()?;
        set_cloexec(&read)?;
        let stdout = Some(read);
        remote.stdout = Some(write);

        // Standard error.
        remote.combine_output = combine_output;
        let mut stderr = None;
        if !combine_output {
            let (read, write) = new_pipe()?;
            set_cloexec(&read)?;
            stderr = Some(read);
            remote.stderr = Some(write);
        }

        // Standard input.
        let mut stdin = None;
        if pipe_stdin {
            let (read, write) = new_pipe()?;
            set_cloexec(&write)?;
            stdin = Some(write);
            remote.stdin = Some(read);
        } else {
            // The child must see end-of-input, not block on a pipe that is
            // never written to.
            remote.stdin = Some(open_null()?);
        }

        Ok(PipeRedirect {
            remote,
            stdin,
            stdout,
            stderr,
        })
    }

    /// Returns the descriptor triple destined for the child process.
    pub fn remote(&mut self) -> &mut Stdio {
        &mut self.remote
    }

    /// Send `transaction.input` to the child's standard input while
    /// collecting its standard output into `transaction.output` and its
    /// standard error into `transaction.error`.
    ///
    /// This runs a private, single-threaded event loop until all local pipe
    /// ends have reached a terminal state; the call is synchronous from the
    /// caller's point of view. The local ends are consumed: a `PipeRedirect`
    /// supports a single transaction.
    ///
    /// An error is returned only when the event loop itself cannot be set
    /// up. Stream failures during the transaction are treated as
    /// end-of-stream: a child that crashes halfway through writing its
    /// output yields the same result as one that wrote exactly that much and
    /// exited cleanly, and `transaction.input` may only be partially sent.
    ///
    /// # Notes
    ///
    /// There is no timeout. If the child never closes its copies of the pipe
    /// ends, e.g. because it never exits, this call blocks indefinitely;
    /// ensuring the child terminates is the caller's responsibility.
    ///
    /// Bytes within one stream keep their order, but there is no ordering
    /// guarantee between the three streams.
    pub fn transact(&mut self, transaction: &mut Transaction) -> io::Result<()> {
        let mut poll = Poll::new()?;
        let mut events = Events::with_capacity(8);

        let mut writer = match self.stdin.take() {
            Some(fd) => {
                prepare(&poll, &fd, STDIN, Interest::WRITABLE)?;
                Some(Writer::new(PipeEnd(fd), transaction.input.clone()))
            }
            None => None,
        };
        let mut output = match self.stdout.take() {
            Some(fd) => {
                prepare(&poll, &fd, STDOUT, Interest::READABLE)?;
                Some(Reader::new(PipeEnd(fd)))
            }
            None => None,
        };
        let mut error = match self.stderr.take() {
            Some(fd) => {
                prepare(&poll, &fd, STDERR, Interest::READABLE)?;
                Some(Reader::new(PipeEnd(fd)))
            }
            None => None,
        };

        debug!(
            "running transaction event loop: input={} bytes",
            transaction.input.len()
        );
        while writer.as_ref().map_or(false, |w| w.state() != State::Done)
            || output.as_ref().map_or(false, |r| r.state() != State::Done)
            || error.as_ref().map_or(false, |r| r.state() != State::Done)
        {
            trace!("polling local pipe ends");
            poll.poll(&mut events, None)?;

            for event in events.iter() {
                match event.token() {
                    STDIN => drive_writer(poll.registry(), &mut writer),
                    STDOUT => drive_reader(poll.registry(), &mut output),
                    STDERR => drive_reader(poll.registry(), &mut error),
                    token => trace!("unexpected event: token={:?}", token),
                }
            }
        }

        transaction.output = output.map_or(Vec::new(), Reader::into_data);
        transaction.error = error.map_or(Vec::new(), Reader::into_data);
        debug!(
            "transaction done: output={} bytes, error_output={} bytes",
            transaction.output.len(),
            transaction.error.len()
        );
        Ok(())
    }
}

impl Redirect for PipeRedirect {
    fn redirect(&mut self) {
        self.remote.redirect();
    }

    fn close(&mut self) {
        self.remote.close();
    }
}

/// Drive the writer task, retiring its pipe end once it completes.
fn drive_writer(registry: &Registry, task: &mut Option<Writer<PipeEnd>>) {
    if let Some(writer) = task {
        if writer.drive() == State::Done {
            trace!("stdin writer done: sent={} bytes", writer.sent());
            // Closing the write end signals end-of-input to the child.
            retire(registry, writer.take_channel());
        }
    }
}

/// Drive a reader task, retiring its pipe end once it completes.
fn drive_reader(registry: &Registry, task: &mut Option<Reader<PipeEnd>>) {
    if let Some(reader) = task {
        if reader.drive() == State::Done {
            retire(registry, reader.take_channel());
        }
    }
}

/// Deregister `end` from the reactor and close it.
fn retire(registry: &Registry, end: Option<PipeEnd>) {
    if let Some(end) = end {
        let _ = registry.deregister(&mut SourceFd(&end.as_raw_fd()));
    }
}

/// Switch `fd` to non-blocking mode and register it with the reactor.
fn prepare(poll: &Poll, fd: &OwnedFd, token: Token, interest: Interest) -> io::Result<()> {
    set_nonblocking(fd)?;
    poll.registry()
        .register(&mut SourceFd(&fd.as_raw_fd()), token, interest)
}

/// Create a new pipe pair, returning `(read end, write end)`.
fn new_pipe() -> Result<(OwnedFd, OwnedFd), Error> {
    let mut fds: [RawFd; 2] = [-1, -1];
    if let Err(err) = syscall!(pipe(fds.as_mut_ptr())) {
        return Err(Error::create_pipe(err));
    }
    // SAFETY: `pipe(2)` returned two fresh descriptors that we now own.
    unsafe { Ok((OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1]))) }
}

/// Mark `fd` close-on-exec, preventing it from being passed across execs.
fn set_cloexec(fd: &OwnedFd) -> Result<(), Error> {
    match syscall!(fcntl(fd.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC)) {
        Ok(_) => Ok(()),
        Err(err) => Err(Error::cloexec(err)),
    }
}

/// Open the null device, read-only.
fn open_null() -> Result<OwnedFd, Error> {
    match syscall!(open(DEV_NULL.as_ptr().cast(), libc::O_RDONLY, 0)) {
        // SAFETY: `open(2)` returned a fresh descriptor that we now own.
        Ok(fd) => unsafe { Ok(OwnedFd::from_raw_fd(fd)) },
        Err(err) => Err(Error::open_null(err)),
    }
}

fn set_nonblocking(fd: &OwnedFd) -> io::Result<()> {
    let flags = syscall!(fcntl(fd.as_raw_fd(), libc::F_GETFL))?;
    if flags & libc::O_NONBLOCK == 0 {
        let _ = syscall!(fcntl(fd.as_raw_fd(), libc::F_SETFL, flags | libc::O_NONBLOCK))?;
    }
    Ok(())
}

/// Local end of a pipe, performing raw reads and writes.
#[derive(Debug)]
struct PipeEnd(OwnedFd);

impl Read for PipeEnd {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        syscall!(read(self.0.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()))
            .map(|read| read as usize)
    }
}

impl Write for PipeEnd {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        syscall!(write(self.0.as_raw_fd(), buf.as_ptr().cast(), buf.len()))
            .map(|written| written as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl AsRawFd for PipeEnd {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}
