//! Module with the [`Redirect`] trait and the [`Stdio`] descriptor triple.

use std::os::unix::io::{AsRawFd, IntoRawFd, OwnedFd};

/// Redirection of the standard streams.
///
/// Implemented by [`Stdio`] and by the types that build one from files,
/// temporary files or pipes, see the [crate documentation].
///
/// [`Stdio`]: crate::Stdio
/// [crate documentation]: crate
pub trait Redirect {
    /// Remap the held descriptors onto the standard stream slots.
    ///
    /// This must be called in a process image that is about to replace
    /// itself via `exec(2)`, i.e. between `fork(2)` and `exec(2)`.
    ///
    /// # Notes
    ///
    /// Remap failures are silently ignored: after a fork there is no safe
    /// way left to report an error. This is a documented limitation.
    fn redirect(&mut self);

    /// Close all held descriptors.
    ///
    /// Safe to call multiple times, never fails.
    fn close(&mut self);
}

/// Up to three owned descriptors destined for the standard stream slots.
///
/// A `Stdio` is usually populated by one of the redirection constructors and
/// consumed by [`redirect`]ing it in the process that is about to exec the
/// child. Each descriptor is owned exactly once: it is moved in, and either
/// remapped-and-released or closed.
///
/// [`redirect`]: Redirect::redirect
#[derive(Debug, Default)]
pub struct Stdio {
    /// Descriptor for standard input (slot 0).
    pub stdin: Option<OwnedFd>,
    /// Descriptor for standard output (slot 1).
    pub stdout: Option<OwnedFd>,
    /// Descriptor for standard error (slot 2).
    pub stderr: Option<OwnedFd>,
    /// Additionally remap `stdout` onto slot 2, if `stderr` is not set.
    pub combine_output: bool,
}

impl Stdio {
    /// Create an empty descriptor triple.
    pub fn new() -> Stdio {
        Stdio::default()
    }
}

impl Redirect for Stdio {
    fn redirect(&mut self) {
        // Standard input.
        if let Some(fd) = self.stdin.as_ref() {
            let raw = fd.as_raw_fd();
            let _ = syscall!(dup2(raw, libc::STDIN_FILENO));
            if raw <= libc::STDERR_FILENO {
                // The source already occupies a standard slot, closing it
                // would close the slot it was just remapped onto.
                release(&mut self.stdin);
            }
        }

        // Standard output.
        if let Some(fd) = self.stdout.as_ref() {
            let raw = fd.as_raw_fd();
            let _ = syscall!(dup2(raw, libc::STDOUT_FILENO));
            if self.stderr.is_none() && self.combine_output {
                let _ = syscall!(dup2(raw, libc::STDERR_FILENO));
            }
            if raw <= libc::STDERR_FILENO {
                release(&mut self.stdout);
            }
        }

        // Standard error, takes precedence over the combined remap above.
        if let Some(fd) = self.stderr.as_ref() {
            let raw = fd.as_raw_fd();
            let _ = syscall!(dup2(raw, libc::STDERR_FILENO));
            if raw <= libc::STDERR_FILENO {
                release(&mut self.stderr);
            }
        }

        self.close();
    }

    fn close(&mut self) {
        self.stdin = None;
        self.stdout = None;
        self.stderr = None;
    }
}

/// Disown the descriptor in `fd` without closing it.
fn release(fd: &mut Option<OwnedFd>) {
    if let Some(fd) = fd.take() {
        let _ = fd.into_raw_fd();
    }
}
