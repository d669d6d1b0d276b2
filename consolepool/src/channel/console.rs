//! Line-oriented channel over a console program's stdin/stdout.

use std::time::Duration;

use bytes::BytesMut;
use log::{debug, trace};
use regex::bytes::Regex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

use super::buffer::OutputBuffer;
use super::sanitize::normalize;
use crate::error::ChannelError;

/// Time budget for one read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadBudget {
    /// Hard upper bound for the whole read.
    pub timeout: Duration,

    /// Silence after a burst of output that ends the read early.
    pub quiet_period: Duration,
}

impl ReadBudget {
    pub fn new(timeout: Duration, quiet_period: Duration) -> Self {
        Self {
            timeout,
            quiet_period,
        }
    }
}

/// Result of one read.
#[derive(Debug, Clone, Default)]
pub struct ReadOutput {
    /// Sanitized text (controls stripped, line endings and blanks normalised).
    pub text: String,

    /// Raw bytes received before sanitizing.
    pub raw_len: usize,

    /// Whether the `until` pattern was seen.
    pub matched: bool,

    /// Whether the read hit its hard timeout.
    pub timed_out: bool,

    /// Whether the program closed its output.
    pub eof: bool,

    /// Time spent reading.
    pub elapsed: Duration,
}

impl ReadOutput {
    /// True when nothing was captured, usually a sign the step failed.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

type Reader = Box<dyn AsyncRead + Send + Unpin>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// A console program's input and output ends.
///
/// Not safe for interleaved use by two scripts; callers serialize access
/// (the pool keeps each channel behind a mutex).
pub struct ConsoleChannel {
    stdin: Option<Writer>,
    stdout: Reader,
    chunk: BytesMut,
    search_depth: usize,
    eof: bool,
}

impl ConsoleChannel {
    /// Pair an input writer with an output reader.
    pub fn new(
        stdin: impl AsyncWrite + Send + Unpin + 'static,
        stdout: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            stdin: Some(Box::new(stdin)),
            stdout: Box::new(stdout),
            chunk: BytesMut::with_capacity(8192),
            search_depth: 1000,
            eof: false,
        }
    }

    /// Set how many trailing bytes are searched for `until` patterns.
    pub fn with_search_depth(mut self, search_depth: usize) -> Self {
        self.search_depth = search_depth;
        self
    }

    /// Write one line and flush. No delay is added.
    pub async fn send_line(&mut self, line: &str) -> Result<(), ChannelError> {
        let stdin = self.stdin.as_mut().ok_or(ChannelError::Closed)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Read output until `until` matches, the output goes quiet after a
    /// burst, the program closes its output, or the budget runs out.
    ///
    /// A timeout is not an error: whatever was captured is returned with
    /// `timed_out` set.
    pub async fn read(
        &mut self,
        budget: ReadBudget,
        until: Option<&Regex>,
    ) -> Result<ReadOutput, ChannelError> {
        let start = Instant::now();
        let deadline = start + budget.timeout;
        let mut buffer = OutputBuffer::new(self.search_depth);
        let mut output = ReadOutput {
            eof: self.eof,
            ..Default::default()
        };

        while !self.eof {
            let now = Instant::now();
            if now >= deadline {
                output.timed_out = true;
                break;
            }

            let quiet_deadline = now + budget.quiet_period;
            let wait_until = if output.raw_len > 0 && quiet_deadline < deadline {
                quiet_deadline
            } else {
                deadline
            };

            self.chunk.clear();
            match tokio::time::timeout_at(wait_until, self.stdout.read_buf(&mut self.chunk)).await
            {
                Ok(Ok(0)) => {
                    trace!("channel: end of output");
                    self.eof = true;
                    output.eof = true;
                }
                Ok(Ok(n)) => {
                    trace!("channel: read {} bytes", n);
                    output.raw_len += n;
                    buffer.extend(&self.chunk[..n]);

                    if let Some(pattern) = until {
                        if buffer.tail_contains(pattern) {
                            output.matched = true;
                            break;
                        }
                    }
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    output.timed_out = wait_until == deadline;
                    break;
                }
            }
        }

        output.text = normalize(&buffer.take_text());
        output.elapsed = start.elapsed();
        Ok(output)
    }

    /// Discard output that is already waiting, e.g. a menu left over from
    /// the previous call.
    pub async fn drain(&mut self, budget: ReadBudget) -> Result<usize, ChannelError> {
        let stale = self.read(budget, None).await?;
        if stale.raw_len > 0 {
            debug!("channel: drained {} stale bytes", stale.raw_len);
        }
        Ok(stale.raw_len)
    }

    /// Close the program's input. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut stdin) = self.stdin.take() {
            if let Err(e) = stdin.shutdown().await {
                debug!("channel: error closing input: {}", e);
            }
        }
    }

    /// Whether the input side has been closed.
    pub fn is_closed(&self) -> bool {
        self.stdin.is_none()
    }

    /// Whether the program has closed its output.
    pub fn is_eof(&self) -> bool {
        self.eof
    }
}

impl std::fmt::Debug for ConsoleChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleChannel")
            .field("closed", &self.is_closed())
            .field("eof", &self.eof)
            .field("search_depth", &self.search_depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader, duplex};

    fn budget(timeout_ms: u64, quiet_ms: u64) -> ReadBudget {
        ReadBudget::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(quiet_ms),
        )
    }

    #[tokio::test]
    async fn test_send_line_appends_newline() {
        let (ours, theirs) = duplex(1024);
        let (their_read, _their_write) = tokio::io::split(theirs);
        let (our_read, our_write) = tokio::io::split(ours);
        let mut channel = ConsoleChannel::new(our_write, our_read);

        channel.send_line("1").await.unwrap();
        let mut line = String::new();
        BufReader::new(their_read).read_line(&mut line).await.unwrap();
        assert_eq!(line, "1\n");
    }

    #[tokio::test]
    async fn test_read_stops_at_pattern() {
        let (ours, theirs) = duplex(1024);
        let (_their_read, mut their_write) = tokio::io::split(theirs);
        let (our_read, our_write) = tokio::io::split(ours);
        let mut channel = ConsoleChannel::new(our_write, our_read);

        their_write
            .write_all(b"\x1b[1m1. Login\x1b[0m\r\nChoose an option: ")
            .await
            .unwrap();

        let pattern = Regex::new(r"Choose an option:\s*$").unwrap();
        let out = channel.read(budget(2000, 1000), Some(&pattern)).await.unwrap();
        assert!(out.matched);
        assert!(!out.timed_out);
        assert_eq!(out.text, "1. Login\nChoose an option: ");
        assert!(out.elapsed < Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_read_stops_after_quiet_period() {
        let (ours, theirs) = duplex(1024);
        let (_their_read, mut their_write) = tokio::io::split(theirs);
        let (our_read, our_write) = tokio::io::split(ours);
        let mut channel = ConsoleChannel::new(our_write, our_read);

        their_write.write_all(b"Logged out successfully.\n").await.unwrap();

        let out = channel.read(budget(5000, 50), None).await.unwrap();
        assert_eq!(out.text, "Logged out successfully.\n");
        assert!(!out.timed_out);
        assert!(out.elapsed < Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn test_read_times_out_empty() {
        let (ours, _theirs) = duplex(1024);
        let (our_read, our_write) = tokio::io::split(ours);
        let mut channel = ConsoleChannel::new(our_write, our_read);

        let out = channel.read(budget(50, 10), None).await.unwrap();
        assert!(out.timed_out);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_read_reports_eof() {
        let (ours, theirs) = duplex(1024);
        let (our_read, our_write) = tokio::io::split(ours);
        let mut channel = ConsoleChannel::new(our_write, our_read);

        let (_r, mut w) = tokio::io::split(theirs);
        w.write_all(b"Thank you for using the Banking System!\n").await.unwrap();
        drop(w);
        drop(_r);

        let out = channel.read(budget(2000, 500), None).await.unwrap();
        assert!(out.eof);
        assert!(out.text.contains("Thank you"));
        assert!(channel.is_eof());
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (ours, _theirs) = duplex(1024);
        let (our_read, our_write) = tokio::io::split(ours);
        let mut channel = ConsoleChannel::new(our_write, our_read);

        channel.close().await;
        channel.close().await;
        assert!(channel.is_closed());
        assert!(matches!(
            channel.send_line("3").await,
            Err(ChannelError::Closed)
        ));
    }
}
