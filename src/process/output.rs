use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// Merged stdout/stderr bytes of one process.
///
/// Pipe pumps append; consumers either drain (`take`) what is available or
/// copy it (`snapshot`). Clones share the same storage. A closed buffer
/// discards its contents and every later append.
#[derive(Clone, Default, Debug)]
pub struct OutputBuffer {
    data: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
}

impl OutputBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly read bytes.
    pub fn append(&self, bytes: &[u8]) {
        if self.is_closed() {
            return;
        }
        self.data.lock().extend_from_slice(bytes);
    }

    /// Drops buffered bytes and stops accepting new ones.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.data.lock().clear();
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Removes and returns everything captured so far.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.data.lock())
    }

    /// Copies everything captured so far without consuming it.
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_drains_shared_storage() {
        let buf = OutputBuffer::new();
        let writer = buf.clone();
        writer.append(b"host 10.0.0.1\n");
        writer.append(b"host 10.0.0.2\n");
        assert_eq!(buf.len(), 28);
        assert_eq!(buf.take(), b"host 10.0.0.1\nhost 10.0.0.2\n".to_vec());
        assert!(writer.is_empty());
    }

    #[test]
    fn closed_buffer_stays_empty() {
        let buf = OutputBuffer::new();
        let writer = buf.clone();
        writer.append(b"partial");
        buf.close();
        writer.append(b"more output\n");
        assert!(writer.is_closed());
        assert!(buf.is_empty());
        assert!(buf.take().is_empty());
    }
}
