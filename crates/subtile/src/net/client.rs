//! Worker side of a distributed run.
//!
//! A worker dials the coordinator, requests units whenever its pool runs
//! light, and streams back one result per finished unit. Dispatched units are
//! re-rooted at their wire id, so every dispatched subtree reports exactly
//! one result no matter how often the local deadline splits it.
//!
//! Link failures are retried within the dial budget; the pool keeps running
//! across a redial and unsent results stay in the outbox until a link
//! accepts them.

use std::io;
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::config::{NetCfg, SchedulerCfg};
use crate::geom::Problem;
use crate::work::{IdAlloc, Scheduler, UnitResult, WorkUnit};

use super::proto::{write_msg, Message, MsgReader, NetError};
use super::REPORT_EVERY;

struct Link {
    reader: MsgReader<TcpStream>,
    writer: TcpStream,
}

impl Link {
    /// Dial with backoff, then exchange tokens. A refused handshake is final;
    /// io failures consume the attempt budget.
    fn connect(addr: &str, cfg: &NetCfg) -> Result<Link, NetError> {
        let mut last: Option<io::Error> = None;
        for attempt in 0..cfg.retry_attempts.max(1) {
            if attempt > 0 {
                thread::sleep(cfg.retry_backoff());
            }
            match TcpStream::connect(addr) {
                Ok(stream) => match Link::greet(stream, cfg) {
                    Ok(link) => return Ok(link),
                    Err(NetError::Io(e)) => last = Some(e),
                    Err(e) => return Err(e),
                },
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "dial failed");
                    last = Some(e);
                }
            }
        }
        match last {
            Some(e) => Err(NetError::Io(e)),
            None => Err(NetError::Handshake),
        }
    }

    fn greet(stream: TcpStream, cfg: &NetCfg) -> Result<Link, NetError> {
        stream.set_read_timeout(Some(cfg.io_timeout()))?;
        let writer = stream.try_clone()?;
        let mut link = Link {
            reader: MsgReader::new(stream),
            writer,
        };
        link.send(&Message::Handshake {
            token: cfg.token.clone(),
        })?;
        let mut ticks = 0;
        loop {
            match link.reader.next_msg() {
                Ok(Some(Message::Handshake { token })) if token == cfg.token => return Ok(link),
                Ok(Some(_)) | Ok(None) => return Err(NetError::Handshake),
                Err(e) if e.is_timeout() => {
                    ticks += 1;
                    if ticks > cfg.retry_attempts.max(1) {
                        return Err(NetError::Handshake);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn send(&mut self, msg: &Message) -> Result<(), NetError> {
        write_msg(&mut self.writer, msg)
    }
}

/// Serve a coordinator until it closes the run.
pub fn work(
    pb: Arc<Problem>,
    scfg: &SchedulerCfg,
    net: &NetCfg,
    addr: &str,
) -> Result<(), NetError> {
    let mut link = Link::connect(addr, net)?;
    let pool = Scheduler::with_ids(pb, scfg.clone(), IdAlloc::tagged());
    tracing::info!(addr, workers = scfg.workers, "serving a coordinator");

    let mut outbox: Vec<UnitResult> = Vec::new();
    let mut last_request: Option<Instant> = None;
    let mut last_report = Instant::now();

    let outcome = loop {
        let mut failed: Option<NetError> = None;

        match link.reader.next_msg() {
            Ok(Some(Message::Work { unit })) => {
                tracing::debug!(unit = unit.id, "unit received");
                // Re-root at the wire id: one result per dispatched unit.
                pool.submit_unit(WorkUnit {
                    id: unit.id,
                    root: unit.id,
                    state: unit.state,
                });
            }
            Ok(Some(Message::ReturnSpawn)) => {
                // A recall with nothing queued, running, or buffered needs no
                // answer; the coordinator only wants work that is stuck here.
                if pool.pending() + pool.running() > 0 || !outbox.is_empty() {
                    let (mut results, new_units) = pool.surrender();
                    results.append(&mut outbox);
                    tracing::info!(
                        results = results.len(),
                        units = new_units.len(),
                        "handing all work back"
                    );
                    if let Err(e) = link.send(&Message::Batch { results, new_units }) {
                        // The batch is lost with the link; the coordinator
                        // reclaims the dispatched subtrees when it sweeps.
                        failed = Some(e);
                    }
                }
            }
            Ok(Some(Message::Close)) => {
                let (results, units) = pool.surrender();
                if !results.is_empty() || !units.is_empty() {
                    tracing::info!(
                        results = results.len(),
                        units = units.len(),
                        "dropping unfinished work at close"
                    );
                }
                break Ok(());
            }
            Ok(Some(other)) => {
                break Err(NetError::Protocol(format!("unexpected {other:?}")));
            }
            Ok(None) => failed = Some(NetError::Protocol("link closed".into())),
            Err(e) if e.is_timeout() => {}
            Err(e) => failed = Some(e),
        }

        if failed.is_none() {
            outbox.extend(pool.take_finished());
            while let Some(r) = outbox.last() {
                match link.send(&Message::Result { result: r.clone() }) {
                    Ok(()) => {
                        outbox.pop();
                    }
                    Err(e) => {
                        failed = Some(e);
                        break;
                    }
                }
            }
        }

        if failed.is_none() {
            let hungry = pool.pending() + pool.running() < scfg.workers.max(1);
            let due = last_request.map_or(true, |t| t.elapsed() >= net.request_every());
            if hungry && due {
                let count = 3 * scfg.workers.max(1) as u32;
                match link.send(&Message::JobRequest { count }) {
                    Ok(()) => last_request = Some(Instant::now()),
                    Err(e) => failed = Some(e),
                }
            }
        }

        if last_report.elapsed() >= REPORT_EVERY {
            last_report = Instant::now();
            tracing::info!(
                executed = pool.executed(),
                pending = pool.pending(),
                running = pool.running(),
                unsent = outbox.len(),
                "progress"
            );
        }

        if let Some(e) = failed {
            if e.is_timeout() {
                continue;
            }
            tracing::warn!(error = %e, "link failed; redialing");
            match Link::connect(addr, net) {
                Ok(l) => link = l,
                Err(e) => break Err(e),
            }
        }
    };
    pool.shutdown();
    outcome
}
