//! Redirection of a child process' standard streams.
//!
//! This crate prepares the standard input, output and error streams of a
//! process that is about to replace itself via `exec(2)` and, when those
//! streams are backed by pipes, runs an asynchronous transaction against the
//! child process: sending bytes to its standard input while collecting
//! everything it writes to standard output and standard error, without
//! deadlocking on the OS pipe buffer limits.
//!
//! ## Redirections
//!
//! All redirections implement the [`Redirect`] trait, which remaps the held
//! descriptors onto the standard stream slots between `fork(2)` and
//! `exec(2)`. Four implementations are provided:
//!
//!  * [`Stdio`] holds up to three descriptors directly.
//!  * [`FileRedirect`] opens the streams from file paths.
//!  * [`TempRedirect`] substitutes pre-opened temporary files for the output
//!    streams.
//!  * [`PipeRedirect`] backs the streams by pipes and drives a
//!    [transaction] against the child.
//!
//! [transaction]: PipeRedirect::transact
//!
//! ## Example
//!
//! Redirect the standard streams of a child process through pipes, feed it
//! input and collect its output:
//!
//! ```no_run
//! use stdio_redirect::{PipeRedirect, Redirect, Transaction};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut redirect = PipeRedirect::new(false, true)?;
//!
//! let program = std::ffi::CString::new("sort")?;
//! let argv = [program.as_ptr(), std::ptr::null()];
//! match unsafe { libc::fork() } {
//!     -1 => return Err(std::io::Error::last_os_error().into()),
//!     0 => {
//!         // In the child: remap the remote pipe ends onto the standard
//!         // stream slots and replace the process image.
//!         redirect.redirect();
//!         unsafe { libc::execvp(program.as_ptr(), argv.as_ptr()) };
//!         unsafe { libc::_exit(127) };
//!     }
//!     _child => {
//!         // In the parent: release the child's ends and run the
//!         // transaction.
//!         redirect.close();
//!         let mut transaction = Transaction::with_input(b"b\na\n".to_vec());
//!         redirect.transact(&mut transaction)?;
//!         assert_eq!(transaction.output, b"a\nb\n");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(
    anonymous_parameters,
    bare_trait_objects,
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results,
    variant_size_differences
)]
// Disallow warnings when running tests.
#![cfg_attr(test, deny(warnings))]
// Disallow warnings in examples, we want to set a good example after all.
#![doc(test(attr(deny(warnings))))]

macro_rules! syscall {
    ($fn: ident ( $($arg: expr),* $(,)* ) ) => {{
        let res = unsafe { libc::$fn($($arg, )*) };
        if res == -1 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(res)
        }
    }};
}

pub mod error;
pub mod file;
pub mod pipe;
pub mod stdio;
mod stream;

#[doc(no_inline)]
pub use error::Error;
#[doc(no_inline)]
pub use file::{FileRedirect, TempRedirect};
#[doc(no_inline)]
pub use pipe::{PipeRedirect, Transaction};
#[doc(no_inline)]
pub use stdio::{Redirect, Stdio};
