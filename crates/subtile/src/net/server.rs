//! Coordinator side of a distributed run.
//!
//! Purpose
//! - Owns the master queue and group ledger through a local worker pool; the
//!   coordinator machine runs units like any worker.
//! - Deals pending units to connected workers on request, folds their results
//!   and returned subtrees back into the originating groups, reclaims work
//!   from dead connections, and checkpoints interim results.
//!
//! One reader thread per connection handles that worker's messages. Writes
//! from the main loop (broadcasts) and from a reader (dealt units, acks)
//! share the stream behind a mutex.
//!
//! A dispatch record pins every unit that left the machine. The run is over
//! exactly when the pool is idle, no group is open, and no record remains;
//! readers always register replacement work before they close a record, so
//! the three conditions can only hold together when the tree is exhausted.

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{NetCfg, ProblemParams, SchedulerCfg};
use crate::geom::Problem;
use crate::persist;
use crate::stats::SearchStats;
use crate::work::{self, seed_states, Scheduler, SolveReport, UnitResult, WorkUnit};

use super::proto::{write_msg, Message, MsgReader, NetError};
use super::REPORT_EVERY;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Where a serving run listens and writes its files.
#[derive(Clone, Debug)]
pub struct ServeOpts {
    pub addr: String,
    pub results_path: PathBuf,
    pub catalogue_path: Option<PathBuf>,
    /// Polled every tick; when this file appears the run checkpoints what it
    /// has and exits without finishing the tree.
    pub stop_file: Option<PathBuf>,
}

/// A unit currently out on some connection.
struct Dispatched {
    unit: WorkUnit,
    conn: u64,
}

struct Conn<'scope> {
    id: u64,
    stream: Arc<Mutex<TcpStream>>,
    reader: thread::ScopedJoinHandle<'scope, ()>,
}

/// State shared between the serve loop and the connection readers.
struct Hub {
    pool: Scheduler,
    records: Mutex<HashMap<u64, Dispatched>>,
    live: AtomicBool,
    token: String,
    io_timeout: Duration,
}

/// Token exchange on a fresh connection: verify, then echo as the ack.
pub(crate) fn greet(
    reader: &mut MsgReader<TcpStream>,
    writer: &Arc<Mutex<TcpStream>>,
    token: &str,
    live: &AtomicBool,
) -> Result<(), NetError> {
    loop {
        match reader.next_msg() {
            Ok(Some(Message::Handshake { token: t })) if t == token => {
                write_msg(&mut *lock(writer), &Message::Handshake { token: t })?;
                return Ok(());
            }
            Ok(Some(_)) | Ok(None) => {
                let _ = write_msg(&mut *lock(writer), &Message::Close);
                return Err(NetError::Handshake);
            }
            Err(e) if e.is_timeout() => {
                if !live.load(Ordering::Relaxed) {
                    return Err(NetError::Handshake);
                }
            }
            Err(e) => return Err(e),
        }
    }
}

impl Hub {
    fn serve_conn(&self, conn: u64, stream: TcpStream, writer: Arc<Mutex<TcpStream>>) {
        match self.drive_conn(conn, stream, writer) {
            Ok(()) => tracing::info!(conn, "worker disconnected"),
            Err(e) => tracing::warn!(conn, error = %e, "worker connection failed"),
        }
    }

    fn drive_conn(
        &self,
        conn: u64,
        stream: TcpStream,
        writer: Arc<Mutex<TcpStream>>,
    ) -> Result<(), NetError> {
        let mut reader = MsgReader::new(stream);
        greet(&mut reader, &writer, &self.token, &self.live)?;
        loop {
            let msg = match reader.next_msg() {
                Ok(Some(m)) => m,
                Ok(None) => return Ok(()),
                Err(e) if e.is_timeout() => {
                    if !self.live.load(Ordering::Relaxed) {
                        return Ok(());
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };
            match msg {
                Message::JobRequest { count } => self.deal(conn, count, &writer)?,
                Message::Result { result } => self.absorb(result),
                Message::Batch { results, new_units } => {
                    // Adopt replacement units while their parent records are
                    // still open, so the run cannot look finished in between.
                    for u in new_units {
                        self.adopt(u);
                    }
                    for r in results {
                        self.absorb(r);
                    }
                }
                Message::Close => return Ok(()),
                other => {
                    return Err(NetError::Protocol(format!("unexpected {other:?}")));
                }
            }
        }
    }

    /// Hand up to `count` pending units to this connection.
    fn deal(&self, conn: u64, count: u32, writer: &Arc<Mutex<TcpStream>>) -> Result<(), NetError> {
        let units = self.pool.take_pending(count as usize);
        for unit in units {
            let id = unit.id;
            lock(&self.records).insert(
                id,
                Dispatched {
                    unit: unit.clone(),
                    conn,
                },
            );
            tracing::debug!(conn, unit = id, "unit dispatched");
            let msg = Message::Work { unit };
            if let Err(e) = write_msg(&mut *lock(writer), &msg) {
                // The unit never left; put it back.
                if let Some(rec) = lock(&self.records).remove(&id) {
                    self.pool.requeue(rec.unit);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Fold a remote result into the group the dispatched unit belongs to.
    fn absorb(&self, result: UnitResult) {
        let Some(rec) = lock(&self.records).remove(&result.unit) else {
            // Late delivery for a unit the sweep already reclaimed; the rerun
            // reproduces its patches.
            tracing::warn!(unit = result.unit, "dropping result without a dispatch record");
            return;
        };
        tracing::debug!(unit = result.unit, patches = result.patches.len(), "remote result");
        self.pool.finish_external(UnitResult {
            unit: rec.unit.root,
            patches: result.patches,
            stats: result.stats,
        });
    }

    /// Requeue a subtree a worker handed back, under its original group.
    fn adopt(&self, u: WorkUnit) {
        let origin = lock(&self.records).get(&u.root).map(|rec| rec.unit.root);
        let id = self.pool.fresh_id();
        match origin {
            Some(root) => self.pool.submit_unit(WorkUnit {
                id,
                root,
                state: u.state,
            }),
            None => {
                tracing::warn!(unit = u.id, "returned subtree lost its dispatch record");
                self.pool.submit_unit(WorkUnit {
                    id,
                    root: id,
                    state: u.state,
                });
            }
        }
    }
}

fn conn_pair(
    stream: TcpStream,
    timeout: Duration,
) -> io::Result<(TcpStream, Arc<Mutex<TcpStream>>)> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(timeout))?;
    let writer = stream.try_clone()?;
    Ok((stream, Arc::new(Mutex::new(writer))))
}

pub struct Server {
    listener: TcpListener,
    pb: Arc<Problem>,
    params: ProblemParams,
    scfg: SchedulerCfg,
    net: NetCfg,
    opts: ServeOpts,
}

impl Server {
    pub fn bind(
        pb: Arc<Problem>,
        params: ProblemParams,
        scfg: SchedulerCfg,
        net: NetCfg,
        opts: ServeOpts,
    ) -> Result<Server, NetError> {
        let listener = TcpListener::bind(&opts.addr)?;
        listener.set_nonblocking(true)?;
        Ok(Server {
            listener,
            pb,
            params,
            scfg,
            net,
            opts,
        })
    }

    /// The bound address; differs from `opts.addr` when port 0 was asked.
    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until the tree is exhausted or the stop file appears, then
    /// persist results and catalogue and return the merged report.
    pub fn run(self) -> Result<SolveReport, NetError> {
        let hub = Hub {
            pool: Scheduler::new(self.pb.clone(), self.scfg.clone()),
            records: Mutex::new(HashMap::new()),
            live: AtomicBool::new(true),
            token: self.net.token.clone(),
            io_timeout: self.net.io_timeout(),
        };
        let seeds = seed_states(&self.pb);
        tracing::info!(
            addr = %self.local_addr()?,
            side = self.pb.start_side,
            seeds = seeds.len(),
            "serving"
        );
        for s in seeds {
            hub.pool.submit(s);
        }

        let mut report = SolveReport {
            patches: Vec::new(),
            stats: SearchStats::default(),
            tree: self.pb.tree.clone(),
            units: 0,
            invariant_failures: 0,
            complete: false,
        };

        let done = thread::scope(|scope| {
            let mut conns: Vec<Conn<'_>> = Vec::new();
            let mut next_conn: u64 = 1;
            let mut last_sweep = Instant::now();
            let mut last_rebalance = Instant::now();
            let mut last_ckpt = Instant::now();
            let mut last_report = Instant::now();

            let done = loop {
                for r in hub.pool.take_finished() {
                    work::merge_result(&mut report, &self.pb, r);
                }

                match self.listener.accept() {
                    Ok((stream, peer)) => match conn_pair(stream, hub.io_timeout) {
                        Ok((read_half, writer)) => {
                            let id = next_conn;
                            next_conn += 1;
                            let hub = &hub;
                            let w = writer.clone();
                            let reader =
                                scope.spawn(move || hub.serve_conn(id, read_half, w));
                            conns.push(Conn {
                                id,
                                stream: writer,
                                reader,
                            });
                            tracing::info!(conn = id, peer = %peer, "worker connected");
                        }
                        Err(e) => tracing::warn!(error = %e, "connection setup failed"),
                    },
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                }

                if last_sweep.elapsed() >= self.net.sweep_every() {
                    last_sweep = Instant::now();
                    conns.retain(|c| {
                        if !c.reader.is_finished() {
                            return true;
                        }
                        let orphaned: Vec<WorkUnit> = {
                            let mut recs = lock(&hub.records);
                            let ids: Vec<u64> = recs
                                .iter()
                                .filter(|(_, d)| d.conn == c.id)
                                .map(|(&id, _)| id)
                                .collect();
                            ids.into_iter()
                                .filter_map(|id| recs.remove(&id))
                                .map(|d| d.unit)
                                .collect()
                        };
                        if !orphaned.is_empty() {
                            tracing::info!(
                                conn = c.id,
                                reclaimed = orphaned.len(),
                                "reclaiming units from a dead connection"
                            );
                        }
                        for u in orphaned {
                            hub.pool.requeue(u);
                        }
                        false
                    });
                }

                if hub.pool.is_idle()
                    && !lock(&hub.records).is_empty()
                    && last_rebalance.elapsed() >= self.net.rebalance_every()
                {
                    last_rebalance = Instant::now();
                    tracing::info!("local pool starved; recalling dispatched work");
                    for c in &conns {
                        let _ = write_msg(&mut *lock(&c.stream), &Message::ReturnSpawn);
                    }
                }

                if let Some(every) = self.net.checkpoint_every() {
                    if last_ckpt.elapsed() >= every {
                        last_ckpt = Instant::now();
                        match persist::write_results(
                            &self.opts.results_path,
                            &self.params,
                            &report.stats,
                            &report.patches,
                            false,
                        ) {
                            Ok(()) => {
                                tracing::debug!(patches = report.patches.len(), "checkpoint")
                            }
                            Err(e) => tracing::error!(error = %e, "checkpoint failed"),
                        }
                    }
                }

                if last_report.elapsed() >= REPORT_EVERY {
                    last_report = Instant::now();
                    tracing::info!(
                        patches = report.patches.len(),
                        placed = report.stats.placed,
                        units = hub.pool.executed(),
                        pending = hub.pool.pending(),
                        dispatched = lock(&hub.records).len(),
                        workers = conns.len(),
                        "progress"
                    );
                }

                if self.opts.stop_file.as_deref().is_some_and(Path::exists) {
                    tracing::info!("stop file present; winding down");
                    break false;
                }
                if hub.pool.is_idle()
                    && hub.pool.open_groups() == 0
                    && lock(&hub.records).is_empty()
                {
                    break true;
                }
                thread::sleep(hub.io_timeout);
            };

            hub.live.store(false, Ordering::Relaxed);
            for c in &conns {
                let _ = write_msg(&mut *lock(&c.stream), &Message::Close);
            }
            for c in conns {
                let _ = c.reader.join();
            }
            if !done {
                let (partials, dropped) = hub.pool.surrender();
                for r in partials {
                    work::merge_result(&mut report, &self.pb, r);
                }
                if !dropped.is_empty() {
                    tracing::info!(
                        units = dropped.len(),
                        "unfinished subtrees dropped; a catalogue-restricted rerun recovers them"
                    );
                }
            }
            done
        });

        for r in hub.pool.take_finished() {
            work::merge_result(&mut report, &self.pb, r);
        }
        report.units = hub.pool.executed();
        report.invariant_failures = hub.pool.invariant_failures();
        report.complete = done;

        let Hub { pool, .. } = hub;
        pool.shutdown();

        persist::write_results(
            &self.opts.results_path,
            &self.params,
            &report.stats,
            &report.patches,
            done,
        )?;
        if let Some(cat) = &self.opts.catalogue_path {
            persist::write_catalogue(cat, self.params.n, &self.params.lambda, &report.tree)?;
        }
        tracing::info!(
            patches = report.patches.len(),
            units = report.units,
            complete = done,
            "serve finished"
        );
        Ok(report)
    }
}
