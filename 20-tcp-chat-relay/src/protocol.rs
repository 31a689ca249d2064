use std::{io, sync::Arc};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// The single byte that ends a name line or a chat line.
pub const DELIMITER: u8 = b'\n';

/// Port the server listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 12345;

/// Text typed into the client that ends the send loop. Never sent to the server.
pub const EXIT_SENTINEL: &str = "exit";

const NAME_SEPARATOR: &[u8] = b": ";

/// One chat line on its way to the other sessions.
///
/// Built per broadcast and dropped once it has been rendered, so it only
/// borrows the sender's name and the raw line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message<'a> {
    sender: &'a str,
    line: &'a [u8],
}

impl<'a> Message<'a> {
    pub fn new(sender: &'a str, line: &'a [u8]) -> Self {
        Self { sender, line }
    }

    pub fn sender(&self) -> &str {
        self.sender
    }

    /// Renders `"<name>: <line>"`.
    ///
    /// The line keeps whatever trailing delimiter it arrived with; nothing
    /// extra is appended.
    pub fn render(&self) -> Arc<[u8]> {
        let mut out =
            Vec::with_capacity(self.sender.len() + NAME_SEPARATOR.len() + self.line.len());
        out.extend_from_slice(self.sender.as_bytes());
        out.extend_from_slice(NAME_SEPARATOR);
        out.extend_from_slice(self.line);
        out.into()
    }
}

/// Reads the next delimited line, delimiter included.
///
/// `buffer` accumulates bytes across calls: if the future is dropped midway
/// (e.g. as a `select!` branch), the partial line stays in `buffer` and the
/// next call picks up where this one stopped. Returns `Ok(None)` once the
/// peer closes; any bytes after the last delimiter are discarded.
pub async fn read_line<R>(reader: &mut R, buffer: &mut Vec<u8>) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    reader.read_until(DELIMITER, buffer).await?;
    if buffer.last() != Some(&DELIMITER) {
        buffer.clear();
        return Ok(None);
    }
    Ok(Some(std::mem::take(buffer)))
}

/// Drops the trailing delimiter, if present.
pub fn strip_delimiter(line: &[u8]) -> &[u8] {
    line.strip_suffix(&[DELIMITER]).unwrap_or(line)
}

/// Turns a name line into a display name: delimiter removed, invalid UTF-8 replaced.
pub fn parse_name(line: &[u8]) -> String {
    String::from_utf8_lossy(strip_delimiter(line)).into_owned()
}

/// Writes `text` followed by a delimiter and flushes.
pub async fn write_line<W>(writer: &mut W, text: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut encoded = Vec::with_capacity(text.len() + 1);
    encoded.extend_from_slice(text.as_bytes());
    encoded.push(DELIMITER);
    writer.write_all(&encoded).await?;
    writer.flush().await
}
