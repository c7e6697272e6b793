//! Tests for the pipe-backed redirection and its transaction engine.

use std::ffi::CString;
use std::fs::File;
use std::io::{Read, Write};
use std::ptr;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use stdio_redirect::{PipeRedirect, Redirect, Transaction};

use crate::util;

#[test]
fn echo_round_trip() {
    util::init();
    let mut redirect = PipeRedirect::new(false, true).unwrap();

    // Stand in for the child process: echo everything read from standard
    // in back on standard out.
    let remote = redirect.remote();
    let stdin = remote.stdin.take().unwrap();
    let stdout = remote.stdout.take().unwrap();
    // The child writes nothing to standard error.
    drop(remote.stderr.take());
    let echo = thread::spawn(move || {
        let mut source = File::from(stdin);
        let mut sink = File::from(stdout);
        let mut buf = [0; 4096];
        loop {
            let n = source.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n]).unwrap();
        }
    });

    // Multiple times the default pipe buffer size, to force partial writes
    // and interleaving of the writer and reader tasks.
    let payload = util::random_payload(256 * 1024);
    let mut transaction = Transaction::with_input(payload.clone());
    redirect.transact(&mut transaction).unwrap();
    echo.join().unwrap();

    assert_eq!(transaction.output, payload);
    assert!(transaction.error.is_empty());
    // The input is left as supplied.
    assert_eq!(transaction.input, payload);
}

#[test]
fn transact_with_child_process() {
    util::init();
    let mut redirect = PipeRedirect::new(false, true).unwrap();
    let payload = util::random_payload(128 * 1024);

    let program = CString::new("cat").unwrap();
    let argv = [program.as_ptr(), ptr::null()];
    let pid = util::fork(|| {
        // In the child: wire the remote ends onto the standard slots and
        // become `cat`. The local ends are close-on-exec and disappear.
        redirect.redirect();
        unsafe { libc::execvp(program.as_ptr(), argv.as_ptr()) };
        unsafe { libc::_exit(127) };
    });

    // Release the parent's copies of the child's pipe ends.
    redirect.close();

    let mut transaction = Transaction::with_input(payload.clone());
    redirect.transact(&mut transaction).unwrap();
    util::expect_clean_exit(pid);

    assert_eq!(transaction.output, payload);
    assert!(transaction.error.is_empty());
}

#[test]
fn separate_error_stream() {
    util::init();
    let mut redirect = PipeRedirect::new(false, false).unwrap();

    let pid = util::fork(|| {
        redirect.redirect();
        unsafe {
            let _ = libc::write(1, "out".as_ptr().cast(), 3);
            let _ = libc::write(2, "err".as_ptr().cast(), 3);
        }
    });
    redirect.close();

    let mut transaction = Transaction::default();
    redirect.transact(&mut transaction).unwrap();
    util::expect_clean_exit(pid);

    assert_eq!(transaction.output, b"out");
    assert_eq!(transaction.error, b"err");
}

#[test]
fn combined_output_leaves_error_output_empty() {
    util::init();
    let mut redirect = PipeRedirect::new(true, false).unwrap();

    let pid = util::fork(|| {
        redirect.redirect();
        unsafe {
            let _ = libc::write(1, "out".as_ptr().cast(), 3);
            let _ = libc::write(2, "err".as_ptr().cast(), 3);
        }
    });
    redirect.close();

    let mut transaction = Transaction::default();
    redirect.transact(&mut transaction).unwrap();
    util::expect_clean_exit(pid);

    // Both streams arrive on standard output, in write order; no local
    // standard error stream exists at all.
    assert_eq!(transaction.output, b"outerr");
    assert!(transaction.error.is_empty());
}

#[test]
fn disabled_stdin_is_the_null_device() {
    let mut redirect = PipeRedirect::new(false, false).unwrap();

    // A child reading from its standard input sees immediate end-of-input.
    let stdin = redirect.remote().stdin.take().unwrap();
    let mut source = File::from(stdin);
    let mut buf = [0; 16];
    assert_eq!(source.read(&mut buf).unwrap(), 0);
}

#[test]
fn writer_aborts_when_peer_stops_reading() {
    util::init();
    let mut redirect = PipeRedirect::new(false, true).unwrap();

    // Stand in for a child that stops reading its input early.
    let remote = redirect.remote();
    let stdin = remote.stdin.take().unwrap();
    let stdout = remote.stdout.take().unwrap();
    drop(remote.stderr.take());
    let child = thread::spawn(move || {
        let mut source = File::from(stdin);
        let mut buf = [0; 1024];
        let n = source.read(&mut buf).unwrap();
        assert!(n > 0);
        // Closes the read end, failing the engine's writer task.
        drop(source);

        let mut sink = File::from(stdout);
        sink.write_all(b"partial").unwrap();
    });

    let mut transaction = Transaction::with_input(util::random_payload(1024 * 1024));
    redirect.transact(&mut transaction).unwrap();
    child.join().unwrap();

    // The aborted input is invisible to the caller, the output is simply
    // what the child produced.
    assert_eq!(transaction.output, b"partial");
}

#[test]
fn transact_blocks_until_the_peer_closes() {
    util::init();
    let mut redirect = PipeRedirect::new(false, false).unwrap();

    // Keep the remote standard output end open, so the engine's reader
    // never sees end-of-stream.
    let remote = redirect.remote();
    let remote_out = remote.stdout.take().unwrap();
    drop(remote.stderr.take());
    drop(remote.stdin.take());

    let (sender, receiver) = mpsc::channel();
    let handle = thread::spawn(move || {
        let mut transaction = Transaction::default();
        redirect.transact(&mut transaction).unwrap();
        sender.send(transaction.output).unwrap();
    });

    // The engine must still be waiting while the peer keeps its end open.
    // This is the documented liveness hazard, bounded here by a timeout
    // around the engine, not inside it.
    assert_eq!(
        receiver.recv_timeout(Duration::from_millis(200)),
        Err(mpsc::RecvTimeoutError::Timeout)
    );

    let mut sink = File::from(remote_out);
    sink.write_all(b"late").unwrap();
    drop(sink);

    let output = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(output, b"late");
    handle.join().unwrap();
}

#[test]
fn empty_input_closes_stdin_immediately() {
    util::init();
    let mut redirect = PipeRedirect::new(true, true).unwrap();

    let remote = redirect.remote();
    let stdin = remote.stdin.take().unwrap();
    let stdout = remote.stdout.take().unwrap();
    let child = thread::spawn(move || {
        let mut source = File::from(stdin);
        let mut buf = [0; 16];
        // End-of-input without a single byte sent.
        assert_eq!(source.read(&mut buf).unwrap(), 0);
        drop(File::from(stdout));
    });

    let mut transaction = Transaction::default();
    redirect.transact(&mut transaction).unwrap();
    child.join().unwrap();

    assert!(transaction.output.is_empty());
    assert!(transaction.error.is_empty());
}
