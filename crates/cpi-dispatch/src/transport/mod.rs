//! Byte transport between the host and a [`RequestHandler`].
//!
//! Requests and responses are newline-delimited JSON documents. The input
//! and output channels carry protocol bytes only; diagnostics travel on a
//! separate channel through the diagnostic sink.
//!
//! Two lifecycles are supported:
//!
//! - [`Transport::serve_once`] reads one request (everything up to end of
//!   input), writes one response and returns.
//! - [`Transport::serve_continuous`] handles newline-delimited requests until
//!   the input closes, strictly one at a time, so responses leave in the
//!   order requests arrived.

use std::io::{self, BufRead, Read, Write};

use tracing::{debug, warn};

use crate::dispatcher::RequestHandler;
use crate::error::{DispatchError, TransportError};

/// Maximum size of a single request payload in bytes, not counting a
/// trailing line terminator.
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Tracing target for transport operations.
const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// One request read from the input channel.
enum Frame {
    /// A complete payload within the size limit.
    Payload(Vec<u8>),
    /// A payload that exceeded the limit and was discarded.
    Oversized(usize),
}

/// Moves request and response bytes for one handler.
#[derive(Debug)]
pub struct Transport<R, W, H> {
    input: R,
    output: W,
    handler: H,
}

impl<R: BufRead, W: Write, H: RequestHandler> Transport<R, W, H> {
    /// Creates a transport over the given channels.
    #[must_use]
    pub const fn new(input: R, output: W, handler: H) -> Self {
        Self {
            input,
            output,
            handler,
        }
    }

    /// Handles exactly one request.
    ///
    /// Empty input still yields a response: a protocol error.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] only when the channels themselves fail.
    pub fn serve_once(&mut self) -> Result<(), TransportError> {
        let frame = read_to_end_bounded(&mut self.input)?;
        let response = self.respond(frame);
        self.write_response(&response)
    }

    /// Handles requests until the input closes, returning how many were
    /// answered.
    ///
    /// Blank lines between requests are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] only when the channels themselves fail.
    pub fn serve_continuous(&mut self) -> Result<usize, TransportError> {
        let mut handled = 0_usize;
        while let Some(frame) = read_line_bounded(&mut self.input)? {
            if let Frame::Payload(bytes) = &frame
                && bytes.trim_ascii().is_empty()
            {
                continue;
            }
            let response = self.respond(frame);
            self.write_response(&response)?;
            handled += 1;
        }
        debug!(target: TRANSPORT_TARGET, handled, "input closed");
        Ok(handled)
    }

    /// Returns the handler.
    #[must_use]
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    /// Consumes the transport, returning the output channel.
    #[must_use]
    pub fn into_output(self) -> W {
        self.output
    }

    fn respond(&self, frame: Frame) -> Vec<u8> {
        match frame {
            Frame::Payload(bytes) => self.handler.handle(&bytes),
            Frame::Oversized(size) => {
                warn!(
                    target: TRANSPORT_TARGET,
                    size,
                    limit = MAX_REQUEST_BYTES,
                    "request too large"
                );
                self.handler.reject(&DispatchError::protocol(format!(
                    "request of {size} bytes exceeds the {MAX_REQUEST_BYTES} byte limit"
                )))
            }
        }
    }

    fn write_response(&mut self, response: &[u8]) -> Result<(), TransportError> {
        self.output
            .write_all(response)
            .and_then(|()| self.output.write_all(b"\n"))
            .and_then(|()| self.output.flush())
            .map_err(|source| TransportError::Write { source })
    }
}

/// Longest line terminator (`\r\n`) a request may carry beyond the limit.
const TERMINATOR_ALLOWANCE: usize = 2;

/// Bytes a frame may occupy on the wire: the payload limit plus a trailing
/// terminator.
const FRAME_CAPACITY: usize = MAX_REQUEST_BYTES + TERMINATOR_ALLOWANCE;

/// Reads the whole input, keeping at most [`FRAME_CAPACITY`] bytes.
fn read_to_end_bounded<R: Read>(input: &mut R) -> Result<Frame, TransportError> {
    let mut buffer = Vec::new();
    let capacity = u64::try_from(FRAME_CAPACITY).unwrap_or(u64::MAX);
    input
        .by_ref()
        .take(capacity)
        .read_to_end(&mut buffer)
        .map_err(|source| TransportError::Read { source })?;
    let discarded = if buffer.len() < FRAME_CAPACITY {
        0
    } else {
        drain(input)?
    };
    if discarded == 0 && payload_length(&buffer) <= MAX_REQUEST_BYTES {
        return Ok(Frame::Payload(buffer));
    }
    Ok(Frame::Oversized(buffer.len().saturating_add(discarded)))
}

/// Reads one newline-terminated line, discarding the excess of an oversized
/// line. Returns `None` at end of input.
fn read_line_bounded<R: BufRead>(input: &mut R) -> Result<Option<Frame>, TransportError> {
    let mut buffer = Vec::new();
    let mut total = 0_usize;
    loop {
        let available = match input.fill_buf() {
            Ok(available) => available,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => return Err(TransportError::Read { source }),
        };
        if available.is_empty() {
            return Ok(finish_line(buffer, total));
        }

        let (chunk, complete) = match available.iter().position(|byte| *byte == b'\n') {
            Some(newline) => (available.get(..=newline).unwrap_or(available), true),
            None => (available, false),
        };
        let consumed = chunk.len();
        total = total.saturating_add(consumed);
        if total <= FRAME_CAPACITY {
            buffer.extend_from_slice(chunk);
        } else {
            buffer.clear();
        }
        input.consume(consumed);

        if complete {
            return Ok(finish_line(buffer, total));
        }
    }
}

/// Classifies a finished line. `buffer` holds the whole line whenever
/// `total` fits in [`FRAME_CAPACITY`].
fn finish_line(buffer: Vec<u8>, total: usize) -> Option<Frame> {
    if total == 0 {
        None
    } else if total <= FRAME_CAPACITY && payload_length(&buffer) <= MAX_REQUEST_BYTES {
        Some(Frame::Payload(buffer))
    } else {
        Some(Frame::Oversized(total))
    }
}

/// Length of `frame` without one trailing `\n` or `\r\n`.
fn payload_length(frame: &[u8]) -> usize {
    frame
        .strip_suffix(b"\n")
        .map_or(frame, |line| line.strip_suffix(b"\r").unwrap_or(line))
        .len()
}

fn drain<R: Read>(input: &mut R) -> Result<usize, TransportError> {
    io::copy(input, &mut io::sink())
        .map(|count| usize::try_from(count).unwrap_or(usize::MAX))
        .map_err(|source| TransportError::Read { source })
}
