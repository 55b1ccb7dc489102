//! Cancellation and fault tracking for remote reads.
//!
//! Every byte the indexer pulls from a remote object passes through a
//! [`GuardedReader`]. The guard fails reads once its [`CancelToken`] trips and
//! remembers whether a failure came from the source itself, so that decoder
//! errors (corrupt data) are never confused with transport errors.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Caller-controlled cancellation with an optional deadline.
///
/// Clones share the cancellation flag, so a token handed to a request can be
/// cancelled from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that expires `timeout` from now. `None` never expires.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)), deadline: timeout.map(|t| Instant::now() + t) }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fails once the token is cancelled or past its deadline.
    ///
    /// Cancellation uses `ErrorKind::Other` rather than `Interrupted`, since std
    /// read loops silently retry `Interrupted`.
    pub fn check(&self) -> io::Result<()> {
        if self.is_cancelled() {
            return Err(io::Error::new(io::ErrorKind::Other, "remote read cancelled"));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "remote read deadline exceeded"));
            }
        }
        Ok(())
    }
}

/// Shared flag set when the guarded source (not a decoder above it) fails.
#[derive(Debug, Clone, Default)]
pub struct SourceFault(Arc<AtomicBool>);

impl SourceFault {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Read/Seek adapter over a remote source that honors a [`CancelToken`].
pub struct GuardedReader<R> {
    inner: R,
    token: CancelToken,
    fault: SourceFault,
    bytes_read: u64,
}

impl<R> GuardedReader<R> {
    pub fn new(inner: R, token: CancelToken) -> Self {
        Self { inner, token, fault: SourceFault::default(), bytes_read: 0 }
    }

    /// Handle to the fault flag; stays valid after the reader is moved into a decoder.
    pub fn fault(&self) -> SourceFault {
        self.fault.clone()
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    fn guard(&self) -> io::Result<()> {
        self.token.check().map_err(|e| {
            self.fault.set();
            e
        })
    }

    fn record<T>(&self, res: io::Result<T>) -> io::Result<T> {
        if let Err(e) = &res {
            if e.kind() != io::ErrorKind::Interrupted {
                self.fault.set();
            }
        }
        res
    }
}

impl<R: Read> Read for GuardedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.guard()?;
        let res = self.inner.read(buf);
        let n = self.record(res)?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}

impl<R: Seek> Seek for GuardedReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.guard()?;
        let res = self.inner.seek(pos);
        self.record(res)
    }
}

impl<R> Drop for GuardedReader<R> {
    fn drop(&mut self) {
        tracing::trace!(bytes_read = self.bytes_read, "releasing remote stream");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away"))
        }
    }

    #[test]
    fn passes_bytes_through() {
        let mut r = GuardedReader::new(Cursor::new(b"hello".to_vec()), CancelToken::new());
        let mut out = String::new();
        r.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello");
        assert_eq!(r.bytes_read(), 5);
        assert!(!r.fault().is_set());
    }

    #[test]
    fn cancelled_token_fails_reads_and_flags_fault() {
        let token = CancelToken::new();
        let mut r = GuardedReader::new(Cursor::new(vec![0u8; 16]), token.clone());
        let fault = r.fault();
        token.cancel();
        let mut buf = [0u8; 4];
        let err = r.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert!(fault.is_set());
    }

    #[test]
    fn expired_deadline_times_out() {
        let token = CancelToken::with_timeout(Some(Duration::from_secs(0)));
        let mut r = GuardedReader::new(Cursor::new(vec![0u8; 16]), token);
        let err = r.read(&mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn source_errors_are_flagged() {
        let mut r = GuardedReader::new(Broken, CancelToken::new());
        let fault = r.fault();
        assert!(r.read(&mut [0u8; 4]).is_err());
        assert!(fault.is_set());
    }
}
