//! Newline-delimited JSON framing over the child's stdio
//!
//! The read side is a capped line reader: a line longer than
//! [`MAX_LINE_BYTES`] is discarded up to its terminating newline and surfaced
//! as a decode error, after which reading continues. The write side is a
//! single serializing writer: one record per call, the newline appended under
//! the lock, so concurrent producers never interleave bytes.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// Maximum accepted line length: 1 MiB
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Serializing writer over the child's stdin
///
/// Starts detached; the transport attaches the stdin handle at connect time
/// and detaches it at shutdown. Writes against a detached writer fail with
/// [`Error::Closed`].
pub struct RecordWriter {
    inner: Mutex<Option<Box<dyn AsyncWrite + Send + Unpin>>>,
}

impl RecordWriter {
    /// Create a detached writer
    pub fn detached() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Attach the sink all subsequent records are written to
    pub async fn attach(&self, writer: impl AsyncWrite + Send + Unpin + 'static) {
        *self.inner.lock().await = Some(Box::new(writer));
    }

    /// Write one record followed by a newline, atomically
    pub async fn write_record(&self, record: &str) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let writer = guard.as_mut().ok_or(Error::Closed)?;
        writer.write_all(record.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Shut down and detach the sink
    ///
    /// For a child stdin handle this closes the pipe, signalling end of
    /// input. Idempotent.
    pub async fn close(&self) -> Result<()> {
        if let Some(mut writer) = self.inner.lock().await.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }

    /// Whether a sink is currently attached
    pub async fn is_attached(&self) -> bool {
        self.inner.lock().await.is_some()
    }
}

/// Read the next non-empty line, capped at [`MAX_LINE_BYTES`]
///
/// Returns `Ok(None)` at end of stream. An oversize line is consumed up to
/// its newline and reported as a decode error; the next call continues with
/// the following line. Lines that are empty or whitespace-only are skipped.
pub async fn read_record_line<R>(reader: &mut R) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line: Vec<u8> = Vec::new();
    let mut overflowed = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            // End of stream; an unterminated final line still counts.
            if overflowed {
                return Err(Error::decode(
                    format!("line exceeds maximum length of {MAX_LINE_BYTES} bytes"),
                    "",
                ));
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                return Ok(None);
            }
            return finish_line(line);
        }

        match available.iter().position(|&byte| byte == b'\n') {
            Some(newline) => {
                if !overflowed {
                    if line.len() + newline > MAX_LINE_BYTES {
                        overflowed = true;
                        line.clear();
                    } else {
                        line.extend_from_slice(&available[..newline]);
                    }
                }
                reader.consume(newline + 1);

                if overflowed {
                    return Err(Error::decode(
                        format!("line exceeds maximum length of {MAX_LINE_BYTES} bytes"),
                        "",
                    ));
                }
                if line.iter().all(u8::is_ascii_whitespace) {
                    line.clear();
                    continue;
                }
                return finish_line(line);
            }
            None => {
                let length = available.len();
                if !overflowed {
                    if line.len() + length > MAX_LINE_BYTES {
                        overflowed = true;
                        line.clear();
                    } else {
                        line.extend_from_slice(available);
                    }
                }
                reader.consume(length);
            }
        }
    }
}

fn finish_line(mut line: Vec<u8>) -> Result<Option<String>> {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    match String::from_utf8(line) {
        Ok(text) => Ok(Some(text)),
        Err(err) => {
            let lossy = String::from_utf8_lossy(err.as_bytes()).into_owned();
            Err(Error::decode("line is not valid UTF-8", &lossy))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{duplex, AsyncReadExt, BufReader};

    #[tokio::test]
    async fn reads_lines_and_skips_empty_ones() {
        let (client, server) = duplex(4096);
        let writer = RecordWriter::detached();
        writer.attach(client).await;

        writer.write_record(r#"{"a":1}"#).await.unwrap();
        writer.write_record("").await.unwrap();
        writer.write_record(r#"{"b":2}"#).await.unwrap();
        writer.close().await.unwrap();

        let mut reader = BufReader::new(server);
        assert_eq!(
            read_record_line(&mut reader).await.unwrap().as_deref(),
            Some(r#"{"a":1}"#)
        );
        assert_eq!(
            read_record_line(&mut reader).await.unwrap().as_deref(),
            Some(r#"{"b":2}"#)
        );
        assert_eq!(read_record_line(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversize_line_is_discarded_and_reading_continues() {
        let (mut client, server) = duplex(64 * 1024);
        let write_task = tokio::spawn(async move {
            let big = vec![b'a'; 2 * 1024 * 1024];
            client.write_all(&big).await.unwrap();
            client.write_all(b"\n").await.unwrap();
            client.write_all(b"{\"ok\":true}\n").await.unwrap();
            client.shutdown().await.unwrap();
        });

        let mut reader = BufReader::new(server);
        let err = read_record_line(&mut reader).await.unwrap_err();
        assert!(matches!(err, Error::Decode { .. }), "got {err:?}");

        // The stream is still usable after the oversize line.
        assert_eq!(
            read_record_line(&mut reader).await.unwrap().as_deref(),
            Some(r#"{"ok":true}"#)
        );
        assert_eq!(read_record_line(&mut reader).await.unwrap(), None);
        write_task.await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_writers_never_interleave_records() {
        let (client, server) = duplex(256 * 1024);
        let writer = Arc::new(RecordWriter::detached());
        writer.attach(client).await;

        let mut tasks = Vec::new();
        for i in 0..20 {
            let writer = Arc::clone(&writer);
            tasks.push(tokio::spawn(async move {
                let record = format!(r#"{{"writer":{i},"fill":"{}"}}"#, "x".repeat(512));
                for _ in 0..20 {
                    writer.write_record(&record).await.unwrap();
                }
            }));
        }
        let read_task = tokio::spawn(async move {
            let mut reader = BufReader::new(server);
            let mut count = 0;
            while let Some(line) = read_record_line(&mut reader).await.unwrap() {
                let value: serde_json::Value = serde_json::from_str(&line).expect("torn record");
                assert!(value["writer"].is_u64());
                count += 1;
            }
            count
        });

        for task in tasks {
            task.await.unwrap();
        }
        writer.close().await.unwrap();
        assert_eq!(read_task.await.unwrap(), 400);
    }

    #[tokio::test]
    async fn write_after_close_reports_closed() {
        let (client, _server) = duplex(64);
        let writer = RecordWriter::detached();
        writer.attach(client).await;
        writer.close().await.unwrap();

        let err = writer.write_record("{}").await.unwrap_err();
        assert!(matches!(err, Error::Closed));
    }

    #[tokio::test]
    async fn unterminated_final_line_is_returned() {
        let (mut client, server) = duplex(64);
        client.write_all(b"{\"tail\":1}").await.unwrap();
        client.shutdown().await.unwrap();
        drop(client);

        let mut reader = BufReader::new(server);
        assert_eq!(
            read_record_line(&mut reader).await.unwrap().as_deref(),
            Some(r#"{"tail":1}"#)
        );
        assert_eq!(read_record_line(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn reader_sees_exactly_what_writer_framed() {
        let (client, mut server) = duplex(1024);
        let writer = RecordWriter::detached();
        writer.attach(client).await;
        writer.write_record(r#"{"n":1}"#).await.unwrap();
        writer.close().await.unwrap();

        let mut raw = Vec::new();
        server.read_to_end(&mut raw).await.unwrap();
        assert_eq!(raw, b"{\"n\":1}\n");
    }
}
