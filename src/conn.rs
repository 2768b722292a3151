//! Line-framed connection plumbing.
//!
//! [`Reader`] and [`Writer`] wrap the two halves of an already-connected
//! byte stream; [`Conn`] pairs them. This layer does not open sockets and
//! knows nothing about the protocol state machine — that is the
//! [`Client`](crate::Client)'s job.

use std::fmt;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::{ClientError, MessageParseError, Result};
use crate::message::Message;

/// Observer for raw I/O lines, without CRLF framing. Meant for debugging;
/// the output format is not guaranteed stable.
pub type DebugCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Buffered, line-framed message reader.
pub struct Reader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
    /// Invoked with every raw incoming line before it is parsed.
    pub debug_callback: Option<DebugCallback>,
}

impl<R: AsyncRead + Unpin> Reader<R> {
    /// Wrap a byte source.
    pub fn new(inner: R) -> Self {
        Reader {
            inner: BufReader::new(inner),
            buf: Vec::with_capacity(512),
            debug_callback: None,
        }
    }

    /// Read the next message from the stream.
    ///
    /// Lines are LF-delimited with trailing CR/LF stripped, so lone-LF
    /// framing is tolerated. Empty lines are silently skipped; any other
    /// parse failure surfaces as [`ClientError::InvalidMessage`]. EOF is
    /// [`ClientError::ConnectionClosed`].
    pub async fn read_message(&mut self) -> Result<Message> {
        loop {
            self.buf.clear();
            let n = self.inner.read_until(b'\n', &mut self.buf).await?;
            if n == 0 {
                return Err(ClientError::ConnectionClosed);
            }

            let line = String::from_utf8(self.buf.clone())?;
            let line = line.trim_end_matches(['\r', '\n']);

            if let Some(cb) = &self.debug_callback {
                cb(line);
            }

            match line.parse::<Message>() {
                Ok(msg) => return Ok(msg),
                Err(MessageParseError::EmptyMessage) => continue,
                Err(cause) => {
                    return Err(ClientError::InvalidMessage {
                        string: line.to_string(),
                        cause,
                    })
                }
            }
        }
    }
}

/// Line-framed message writer.
pub struct Writer<W> {
    inner: W,
    /// Invoked with every outgoing line before it is written.
    pub debug_callback: Option<DebugCallback>,
}

impl<W: AsyncWrite + Unpin> Writer<W> {
    /// Wrap a byte sink.
    pub fn new(inner: W) -> Self {
        Writer {
            inner,
            debug_callback: None,
        }
    }

    /// Write a single line. The CRLF framing goes out in the same write
    /// call, so a line is never split at the transport API boundary.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        if let Some(cb) = &self.debug_callback {
            cb(line);
        }

        let mut framed = String::with_capacity(line.len() + 2);
        framed.push_str(line);
        framed.push_str("\r\n");
        self.inner.write_all(framed.as_bytes()).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Serialize and write a message.
    pub async fn write_message(&mut self, msg: &Message) -> Result<()> {
        self.write_line(&msg.to_string()).await
    }

    /// Shut down the underlying sink.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

/// A paired [`Reader`] and [`Writer`] over one bidirectional stream.
///
/// ```no_run
/// # async fn example(stream: tokio::net::TcpStream) -> slirc_client::Result<()> {
/// use slirc_client::{Conn, Message};
///
/// let mut conn = Conn::new(stream);
/// conn.write("NICK :bot").await?;
/// let msg: Message = conn.read_message().await?;
/// # Ok(())
/// # }
/// ```
pub struct Conn<S> {
    /// The incoming half.
    pub reader: Reader<tokio::io::ReadHalf<S>>,
    /// The outgoing half.
    pub writer: Writer<tokio::io::WriteHalf<S>>,
}

impl<S: AsyncRead + AsyncWrite> Conn<S> {
    /// Split a stream into a connection pair.
    pub fn new(stream: S) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Conn {
            reader: Reader::new(read_half),
            writer: Writer::new(write_half),
        }
    }

    /// Read the next message.
    pub async fn read_message(&mut self) -> Result<Message> {
        self.reader.read_message().await
    }

    /// Write a raw line.
    pub async fn write(&mut self, line: &str) -> Result<()> {
        self.writer.write_line(line).await
    }

    /// Write a formatted line, `format_args!` style.
    pub async fn writef(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        self.writer.write_line(&args.to_string()).await
    }

    /// Serialize and write a message.
    pub async fn write_message(&mut self, msg: &Message) -> Result<()> {
        self.writer.write_message(msg).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_reader_parses_lines() {
        let (client, mut server) = tokio::io::duplex(256);
        let mut conn = Conn::new(client);

        server.write_all(b"PING :42\r\nPONG :42\n").await.unwrap();

        let msg = conn.read_message().await.unwrap();
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.params, vec!["42"]);

        // Lone LF framing is tolerated.
        let msg = conn.read_message().await.unwrap();
        assert_eq!(msg.command, "PONG");
    }

    #[tokio::test]
    async fn test_reader_skips_empty_lines() {
        let (client, mut server) = tokio::io::duplex(256);
        let mut conn = Conn::new(client);

        server.write_all(b"\r\n   \r\nPING :x\r\n").await.unwrap();

        let msg = conn.read_message().await.unwrap();
        assert_eq!(msg.command, "PING");
    }

    #[tokio::test]
    async fn test_reader_surfaces_parse_errors() {
        let (client, mut server) = tokio::io::duplex(256);
        let mut conn = Conn::new(client);

        server.write_all(b"@id=1\r\n").await.unwrap();

        let err = conn.read_message().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::InvalidMessage {
                cause: MessageParseError::MissingDataAfterTags,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_reader_eof() {
        let (client, server) = tokio::io::duplex(256);
        let mut conn = Conn::new(client);
        drop(server);

        let err = conn.read_message().await.unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_writer_appends_crlf() {
        let (client, server) = tokio::io::duplex(256);
        let mut conn = Conn::new(client);
        let (mut server_read, _server_write) = tokio::io::split(server);

        conn.write("NICK :bot").await.unwrap();
        conn.write_message(&Message::privmsg("#ch", "hello world"))
            .await
            .unwrap();
        conn.writef(format_args!("USER {} 0 * :{}", "u", "N"))
            .await
            .unwrap();

        let mut buf = vec![0u8; 256];
        let mut total = 0;
        let expected: &[u8] = b"NICK :bot\r\nPRIVMSG #ch :hello world\r\nUSER u 0 * :N\r\n";
        while total < expected.len() {
            let n = tokio::io::AsyncReadExt::read(&mut server_read, &mut buf[total..])
                .await
                .unwrap();
            assert!(n > 0);
            total += n;
        }
        assert_eq!(&buf[..total], expected);
    }

    #[tokio::test]
    async fn test_debug_callbacks_observe_raw_lines() {
        let (client, mut server) = tokio::io::duplex(256);
        let mut conn = Conn::new(client);

        let seen_in: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_out: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = seen_in.clone();
        conn.reader.debug_callback = Some(Box::new(move |line| {
            sink.lock().unwrap().push(line.to_string());
        }));
        let sink = seen_out.clone();
        conn.writer.debug_callback = Some(Box::new(move |line| {
            sink.lock().unwrap().push(line.to_string());
        }));

        server.write_all(b"PING :x\r\n").await.unwrap();
        conn.read_message().await.unwrap();
        conn.write("PONG :x").await.unwrap();

        assert_eq!(*seen_in.lock().unwrap(), vec!["PING :x".to_string()]);
        assert_eq!(*seen_out.lock().unwrap(), vec!["PONG :x".to_string()]);
    }
}
