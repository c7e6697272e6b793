//! Module containing the redirection setup error type.

use std::path::{Path, PathBuf};
use std::{fmt, io};

/// Error returned when setting up a redirection.
///
/// This covers all failures that can happen before a child process is
/// spawned: opening an input or output file, creating a pipe, marking a pipe
/// end close-on-exec and opening the null device. A redirection that failed
/// to construct must not be used to spawn a child.
pub struct Error {
    inner: ErrorInner,
}

/// Inside of `Error` error.
enum ErrorInner {
    /// Error opening the standard input file.
    OpenInput { path: PathBuf, err: io::Error },
    /// Error opening a standard output or error file.
    OpenOutput { path: PathBuf, err: io::Error },
    /// Error creating a pipe pair.
    CreatePipe(io::Error),
    /// Error marking a local pipe end close-on-exec.
    Cloexec(io::Error),
    /// Error opening the null device for standard input.
    OpenNull(io::Error),
}

impl Error {
    pub(crate) fn open_input(path: &Path, err: io::Error) -> Error {
        Error {
            inner: ErrorInner::OpenInput {
                path: path.to_path_buf(),
                err,
            },
        }
    }

    pub(crate) fn open_output(path: &Path, err: io::Error) -> Error {
        Error {
            inner: ErrorInner::OpenOutput {
                path: path.to_path_buf(),
                err,
            },
        }
    }

    pub(crate) const fn create_pipe(err: io::Error) -> Error {
        Error {
            inner: ErrorInner::CreatePipe(err),
        }
    }

    pub(crate) const fn cloexec(err: io::Error) -> Error {
        Error {
            inner: ErrorInner::Cloexec(err),
        }
    }

    pub(crate) const fn open_null(err: io::Error) -> Error {
        Error {
            inner: ErrorInner::OpenNull(err),
        }
    }
}

/// We implement [`Debug`] by using the [`Display`] implementation because the
/// [`Termination`] trait uses `Debug` rather then `Display` when returning an
/// `Result`.
///
/// [`Termination`]: std::process::Termination
/// [`Debug`]: std::fmt::Debug
/// [`Display`]: std::fmt::Display
impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ErrorInner::*;
        match self.inner {
            OpenInput { ref path, ref err } => {
                write!(f, "error opening input file: {}: {}", path.display(), err)
            }
            OpenOutput { ref path, ref err } => {
                write!(f, "error opening output file: {}: {}", path.display(), err)
            }
            CreatePipe(ref err) => write!(f, "error creating pipe: {}", err),
            Cloexec(ref err) => write!(f, "error setting FD_CLOEXEC on pipe: {}", err),
            OpenNull(ref err) => write!(f, "error opening /dev/null: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use ErrorInner::*;
        match self.inner {
            OpenInput { ref err, .. } | OpenOutput { ref err, .. } => Some(err),
            CreatePipe(ref err) | Cloexec(ref err) | OpenNull(ref err) => Some(err),
        }
    }
}
