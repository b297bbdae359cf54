use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Builds a CSV upload with the standard header and `rows` valid data rows.
pub fn staff_csv(rows: usize) -> String {
    let mut csv = String::from("name,position,salary,age\n");
    for index in 0..rows {
        csv.push_str(&format!(
            "staff-{index},Engineer,{},{}\n",
            1_000 + index,
            20 + index % 40
        ));
    }
    csv
}

/// Reader over an in-memory buffer that counts the bytes handed out.
#[derive(Debug)]
pub struct CountingReader {
    data: Vec<u8>,
    position: usize,
    consumed: Arc<AtomicUsize>,
}

impl CountingReader {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            position: 0,
            consumed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter of bytes read so far.
    pub fn consumed(&self) -> Arc<AtomicUsize> {
        self.consumed.clone()
    }
}

impl AsyncRead for CountingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let remaining = &self.data[self.position..];
        let len = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..len]);

        self.position += len;
        self.consumed.fetch_add(len, Ordering::SeqCst);

        Poll::Ready(Ok(()))
    }
}

/// Reader that yields `data` and then fails, like an upload cut off mid-stream.
#[derive(Debug)]
pub struct FailingReader {
    data: Vec<u8>,
    position: usize,
}

impl FailingReader {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            position: 0,
        }
    }
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.position >= self.data.len() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "upload interrupted",
            )));
        }

        let remaining = &self.data[self.position..];
        let len = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..len]);
        self.position += len;

        Poll::Ready(Ok(()))
    }
}
