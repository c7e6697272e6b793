//! Module with the file-backed redirections.
//!
//! [`FileRedirect`] opens the standard streams from file paths,
//! [`TempRedirect`] substitutes pre-opened temporary files for the output
//! streams. Neither holds any parent-side state: after the fork the child
//! [`redirect`]s the descriptors and the parent simply [`close`]s them.
//!
//! [`redirect`]: crate::Redirect::redirect
//! [`close`]: crate::Redirect::close

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{FromRawFd, OwnedFd};
use std::path::Path;

use crate::error::Error;
use crate::stdio::{Redirect, Stdio};

/// Redirection of the standard streams to files opened from paths.
#[derive(Debug)]
pub struct FileRedirect {
    stdio: Stdio,
}

impl FileRedirect {
    /// Create the output file if needed and truncate it. The default flags.
    pub const FLAGS_OVERWRITE: libc::c_int = libc::O_CREAT | libc::O_WRONLY | libc::O_TRUNC;
    /// Create the output file if needed and append to it.
    pub const FLAGS_APPEND: libc::c_int = libc::O_CREAT | libc::O_WRONLY | libc::O_APPEND;
    /// Create the output file, failing if it already exists.
    pub const FLAGS_MUST_NOT_EXIST: libc::c_int = libc::O_CREAT | libc::O_WRONLY | libc::O_EXCL;

    /// All access bits set. The default mode.
    pub const MODE_ALL: libc::mode_t = 0o777;
    /// Read and write access for the owning user and group.
    pub const MODE_USER_GROUP: libc::mode_t =
        libc::S_IRUSR | libc::S_IWUSR | libc::S_IRGRP | libc::S_IWGRP;
    /// Read and write access for the owning user only.
    pub const MODE_USER: libc::mode_t = libc::S_IRUSR | libc::S_IWUSR;

    /// Create a new file-backed redirection.
    ///
    /// Standard input is opened read-only from `stdin_path`, if given.
    /// Standard output is opened from `stdout_path` with the supplied open
    /// `flags` and permission `mode`, see the `FLAGS_*` and `MODE_*`
    /// constants. If `combine_output` is true standard error is remapped
    /// onto the same file by [`redirect`].
    ///
    /// [`redirect`]: Redirect::redirect
    pub fn new(
        stdin_path: Option<&Path>,
        stdout_path: &Path,
        flags: libc::c_int,
        mode: libc::mode_t,
        combine_output: bool,
    ) -> Result<FileRedirect, Error> {
        let mut stdio = Stdio::new();
        if let Some(path) = stdin_path {
            stdio.stdin = Some(open_input(path)?);
        }
        stdio.stdout = Some(open_output(stdout_path, flags, mode)?);
        stdio.combine_output = combine_output;
        Ok(FileRedirect { stdio })
    }

    /// Create a new file-backed redirection with a separate standard error
    /// file.
    ///
    /// Same as [`new`], but standard error is opened from `stderr_path`
    /// using the same `flags` and `mode` instead of being combined with
    /// standard output.
    ///
    /// [`new`]: FileRedirect::new
    pub fn with_error_output(
        stdin_path: Option<&Path>,
        stdout_path: &Path,
        stderr_path: &Path,
        flags: libc::c_int,
        mode: libc::mode_t,
    ) -> Result<FileRedirect, Error> {
        let mut stdio = Stdio::new();
        if let Some(path) = stdin_path {
            stdio.stdin = Some(open_input(path)?);
        }
        stdio.stdout = Some(open_output(stdout_path, flags, mode)?);
        stdio.stderr = Some(open_output(stderr_path, flags, mode)?);
        Ok(FileRedirect { stdio })
    }
}

impl Redirect for FileRedirect {
    fn redirect(&mut self) {
        self.stdio.redirect();
    }

    fn close(&mut self) {
        self.stdio.close();
    }
}

/// Redirection of the standard streams to pre-opened temporary files.
///
/// Same as [`FileRedirect`], but the output descriptors are supplied by the
/// caller, e.g. from an unlinked temporary file, instead of being opened
/// from a path.
#[derive(Debug)]
pub struct TempRedirect {
    stdio: Stdio,
}

impl TempRedirect {
    /// Create a new redirection using `stdout` for the child's standard
    /// output.
    ///
    /// Standard input is opened read-only from `stdin_path`. If
    /// `combine_output` is true standard error is remapped onto `stdout` by
    /// [`redirect`].
    ///
    /// [`redirect`]: Redirect::redirect
    pub fn new(
        stdin_path: &Path,
        stdout: OwnedFd,
        combine_output: bool,
    ) -> Result<TempRedirect, Error> {
        let mut stdio = Stdio::new();
        stdio.stdin = Some(open_input(stdin_path)?);
        stdio.stdout = Some(stdout);
        stdio.combine_output = combine_output;
        Ok(TempRedirect { stdio })
    }

    /// Create a new redirection using `stdout` and `stderr` for the child's
    /// output streams.
    pub fn with_error_output(
        stdin_path: &Path,
        stdout: OwnedFd,
        stderr: OwnedFd,
    ) -> Result<TempRedirect, Error> {
        let mut stdio = Stdio::new();
        stdio.stdin = Some(open_input(stdin_path)?);
        stdio.stdout = Some(stdout);
        stdio.stderr = Some(stderr);
        Ok(TempRedirect { stdio })
    }
}

impl Redirect for TempRedirect {
    fn redirect(&mut self) {
        self.stdio.redirect();
    }

    fn close(&mut self) {
        self.stdio.close();
    }
}

/// Open the file at `path` for use as standard input.
fn open_input(path: &Path) -> Result<OwnedFd, Error> {
    open(path, libc::O_RDONLY, 0).map_err(|err| Error::open_input(path, err))
}

/// Open the file at `path` for use as standard output or error.
fn open_output(path: &Path, flags: libc::c_int, mode: libc::mode_t) -> Result<OwnedFd, Error> {
    open(path, flags, mode).map_err(|err| Error::open_output(path, err))
}

fn open(path: &Path, flags: libc::c_int, mode: libc::mode_t) -> io::Result<OwnedFd> {
    let path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains a nul byte"))?;
    let fd = syscall!(open(path.as_ptr(), flags, libc::c_uint::from(mode)))?;
    // SAFETY: `open(2)` returned a fresh descriptor that we now own.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}
