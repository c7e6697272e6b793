//! Per-stream tasks driven by the transaction event loop.
//!
//! A [`Writer`] drains an input buffer into its channel, a [`Reader`]
//! accumulates everything its channel produces. Both are driven by readiness
//! events: `drive` performs non-blocking operations until the channel would
//! block or the stream reaches [`State::Done`].

use std::cmp::min;
use std::io::{self, Read, Write};

/// Maximum number of bytes moved per read or write attempt.
pub(crate) const MAX_CHUNK: usize = 2048;

/// State of a stream task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum State {
    /// Not driven yet.
    Idle,
    /// Driven at least once, the channel may produce or accept more bytes.
    InProgress,
    /// The channel is exhausted, failed or was closed. Terminal.
    Done,
}

/// Stream task sending an input buffer to the child's standard input.
#[derive(Debug)]
pub(crate) struct Writer<W> {
    channel: Option<W>,
    input: Vec<u8>,
    /// Offset of the first unsent byte in `input`.
    offset: usize,
    state: State,
}

impl<W: Write> Writer<W> {
    pub(crate) fn new(channel: W, input: Vec<u8>) -> Writer<W> {
        Writer {
            channel: Some(channel),
            input,
            offset: 0,
            state: State::Idle,
        }
    }

    /// Returns the current state of the task.
    pub(crate) fn state(&self) -> State {
        self.state
    }

    /// Returns the number of bytes sent so far.
    pub(crate) fn sent(&self) -> usize {
        self.offset
    }

    /// Write until the channel would block, the input is exhausted or the
    /// channel fails.
    ///
    /// A failed write, e.g. because the peer closed its end, ends the stream
    /// the same way exhausting the input does; it is not reported.
    pub(crate) fn drive(&mut self) -> State {
        let channel = match self.channel.as_mut() {
            Some(channel) if self.state != State::Done => channel,
            _ => return State::Done,
        };
        self.state = State::InProgress;
        loop {
            if self.offset >= self.input.len() {
                break;
            }
            let end = min(self.offset + MAX_CHUNK, self.input.len());
            match channel.write(&self.input[self.offset..end]) {
                // The channel accepts no more bytes.
                Ok(0) => break,
                Ok(n) => self.offset += n,
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => return self.state,
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        self.state = State::Done;
        self.state
    }

    /// Take the channel out of the task, so it can be deregistered and
    /// closed. Returns `None` if it was already taken.
    pub(crate) fn take_channel(&mut self) -> Option<W> {
        self.channel.take()
    }
}

/// Stream task accumulating everything the child writes to one of its output
/// streams.
#[derive(Debug)]
pub(crate) struct Reader<R> {
    channel: Option<R>,
    data: Vec<u8>,
    state: State,
}

impl<R: Read> Reader<R> {
    pub(crate) fn new(channel: R) -> Reader<R> {
        Reader {
            channel: Some(channel),
            data: Vec::new(),
            state: State::Idle,
        }
    }

    /// Returns the current state of the task.
    pub(crate) fn state(&self) -> State {
        self.state
    }

    /// Read until the channel would block, reaches end-of-stream or fails.
    ///
    /// A failed read ends the stream the same way end-of-stream does; it is
    /// not reported.
    pub(crate) fn drive(&mut self) -> State {
        let channel = match self.channel.as_mut() {
            Some(channel) if self.state != State::Done => channel,
            _ => return State::Done,
        };
        self.state = State::InProgress;
        let mut buf = [0; MAX_CHUNK];
        loop {
            match channel.read(&mut buf) {
                // End-of-stream.
                Ok(0) => break,
                Ok(n) => self.data.extend_from_slice(&buf[..n]),
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => return self.state,
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        self.state = State::Done;
        self.state
    }

    /// Take the channel out of the task, so it can be deregistered and
    /// closed. Returns `None` if it was already taken.
    pub(crate) fn take_channel(&mut self) -> Option<R> {
        self.channel.take()
    }

    /// Returns the accumulated bytes.
    pub(crate) fn into_data(self) -> Vec<u8> {
        self.data
    }
}
