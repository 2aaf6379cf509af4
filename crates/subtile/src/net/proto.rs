//! Wire protocol: newline-delimited JSON, one [`Message`] per line.
//!
//! Both sides run their sockets with a read timeout and treat a timed-out
//! read as an idle tick. [`MsgReader`] keeps partially received lines across
//! those ticks, so a slow writer never corrupts the stream.

use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};

use serde::{Deserialize, Serialize};

use crate::work::{UnitResult, WorkUnit};

#[derive(Debug)]
pub enum NetError {
    Io(io::Error),
    Json(serde_json::Error),
    /// Peer failed or refused the token exchange.
    Handshake,
    /// Unexpected message for the current state of the exchange.
    Protocol(String),
    /// Results or catalogue could not be written at the end of a run.
    Persist(crate::persist::PersistError),
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::Io(e) => write!(f, "io: {e}"),
            NetError::Json(e) => write!(f, "malformed message: {e}"),
            NetError::Handshake => write!(f, "handshake failed"),
            NetError::Protocol(what) => write!(f, "protocol violation: {what}"),
            NetError::Persist(e) => write!(f, "persist: {e}"),
        }
    }
}

impl std::error::Error for NetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NetError::Io(e) => Some(e),
            NetError::Json(e) => Some(e),
            NetError::Persist(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for NetError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for NetError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<crate::persist::PersistError> for NetError {
    fn from(e: crate::persist::PersistError) -> Self {
        Self::Persist(e)
    }
}

impl NetError {
    /// A read that merely hit the socket timeout; the caller's idle tick.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            NetError::Io(e) if matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            )
        )
    }
}

/// Everything that crosses the wire, in both directions.
///
/// The coordinator sends `Work`, `ReturnSpawn`, and `Close`; workers send
/// `Handshake`, `JobRequest`, `Result`, and `Batch`. The handshake itself is
/// echoed back as the accept acknowledgement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Handshake { token: String },
    JobRequest { count: u32 },
    Work { unit: WorkUnit },
    Result { result: UnitResult },
    /// Everything a worker holds, handed back at once: partial results for
    /// interrupted units plus the subtrees it never started.
    Batch {
        results: Vec<UnitResult>,
        new_units: Vec<WorkUnit>,
    },
    /// Stop local work and hand everything back as a `Batch`; a worker
    /// holding nothing stays silent.
    ReturnSpawn,
    Close,
}

/// Write one message and flush it.
pub fn write_msg<W: Write>(w: &mut W, msg: &Message) -> Result<(), NetError> {
    let mut line = serde_json::to_vec(msg)?;
    line.push(b'\n');
    w.write_all(&line)?;
    w.flush()?;
    Ok(())
}

/// Buffered line-framed message reader.
pub struct MsgReader<R> {
    inner: BufReader<R>,
    line: String,
}

impl<R: Read> MsgReader<R> {
    pub fn new(r: R) -> MsgReader<R> {
        MsgReader {
            inner: BufReader::new(r),
            line: String::new(),
        }
    }

    /// Next message, or `Ok(None)` on a clean end of stream.
    ///
    /// A timed-out read returns the io error untouched and keeps the bytes
    /// received so far; calling again resumes the same line.
    pub fn next_msg(&mut self) -> Result<Option<Message>, NetError> {
        let n = self.inner.read_line(&mut self.line)?;
        if n == 0 && self.line.is_empty() {
            return Ok(None);
        }
        let parsed = serde_json::from_str(self.line.trim_end());
        self.line.clear();
        Ok(Some(parsed?))
    }
}
