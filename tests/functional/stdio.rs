//! Tests for the `Stdio` triple remapping.

use std::fs::File;
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;

use stdio_redirect::{Redirect, Stdio};

use crate::util;

#[test]
fn combine_duplicates_stdout_onto_stderr() {
    let (read, write) = util::pipe();

    let mut stdio = Stdio::new();
    stdio.stdout = Some(write);
    stdio.combine_output = true;

    let pid = util::fork(|| {
        stdio.redirect();
        // Slots 1 and 2 now refer to the same pipe.
        unsafe {
            let _ = libc::write(1, "A".as_ptr().cast(), 1);
            let _ = libc::write(2, "B".as_ptr().cast(), 1);
        }
    });
    stdio.close();

    let mut data = Vec::new();
    let _ = File::from(read).read_to_end(&mut data).unwrap();
    util::expect_clean_exit(pid);
    assert_eq!(data, b"AB");
}

#[test]
fn stderr_takes_precedence_over_combine() {
    let (out_read, out_write) = util::pipe();
    let (err_read, err_write) = util::pipe();

    let mut stdio = Stdio::new();
    stdio.stdout = Some(out_write);
    stdio.stderr = Some(err_write);
    // Must be ignored, standard error has its own descriptor.
    stdio.combine_output = true;

    let pid = util::fork(|| {
        stdio.redirect();
        unsafe {
            let _ = libc::write(1, "A".as_ptr().cast(), 1);
            let _ = libc::write(2, "B".as_ptr().cast(), 1);
        }
    });
    stdio.close();

    let mut out = Vec::new();
    let _ = File::from(out_read).read_to_end(&mut out).unwrap();
    let mut err = Vec::new();
    let _ = File::from(err_read).read_to_end(&mut err).unwrap();
    util::expect_clean_exit(pid);
    assert_eq!(out, b"A");
    assert_eq!(err, b"B");
}

#[test]
fn redirects_stdin() {
    let (read, write) = util::pipe();
    let (result_read, result_write) = util::pipe();

    let mut stdio = Stdio::new();
    stdio.stdin = Some(read);

    let pid = util::fork(|| {
        stdio.redirect();
        // Copy a little data from the new slot 0 to prove it is the pipe.
        unsafe {
            let mut buf = [0u8; 16];
            let n = libc::read(0, buf.as_mut_ptr().cast(), buf.len());
            if n > 0 {
                let _ = libc::write(result_write.as_raw_fd(), buf.as_ptr().cast(), n as usize);
            }
        }
    });
    stdio.close();
    drop(result_write);

    let mut sink = File::from(write);
    sink.write_all(b"ping").unwrap();
    drop(sink);

    let mut data = Vec::new();
    let _ = File::from(result_read).read_to_end(&mut data).unwrap();
    util::expect_clean_exit(pid);
    assert_eq!(data, b"ping");
}
