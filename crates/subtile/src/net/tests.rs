use std::fs;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::proto::{write_msg, Message, MsgReader};
use super::server::greet;
use super::{NetError, ServeOpts, Server};
use crate::config::{NetCfg, ProblemParams, SchedulerCfg};
use crate::geom::{GeomCfg, Problem};
use crate::persist;
use crate::search::{RunOutput, SearchState};
use crate::work::WorkUnit;

fn bisection_params() -> ProblemParams {
    ProblemParams {
        n: 4,
        prototiles: vec![[1, 1, 2]],
        lambda: vec![0, 1],
        target: 0,
        counts: None,
        start_side: Some(2),
        restrict: false,
        geom: GeomCfg::default(),
    }
}

fn fast_net(token: &str) -> NetCfg {
    NetCfg {
        token: token.to_owned(),
        retry_attempts: 20,
        retry_backoff_ms: 50,
        io_timeout_ms: 50,
        request_every_ms: 10,
        ..NetCfg::default()
    }
}

fn small_pool() -> SchedulerCfg {
    SchedulerCfg {
        workers: 2,
        ..SchedulerCfg::default()
    }
}

#[test]
fn the_coordinator_finishes_a_run_alone() {
    let dir = tempfile::tempdir().unwrap();
    let params = bisection_params();
    let pb = Arc::new(Problem::build(&params).unwrap());
    let opts = ServeOpts {
        addr: "127.0.0.1:0".into(),
        results_path: dir.path().join("results.json"),
        catalogue_path: Some(dir.path().join("catalogue.json")),
        stop_file: None,
    };
    let server =
        Server::bind(pb.clone(), params.clone(), small_pool(), fast_net("t"), opts).unwrap();
    let report = server.run().unwrap();

    assert!(report.complete);
    assert_eq!(report.patches.len(), 4);
    assert_eq!(report.stats.patches, 4);
    assert_eq!(report.invariant_failures, 0);

    let results = persist::load_results(&dir.path().join("results.json")).unwrap();
    assert!(results.complete);
    assert_eq!(results.params, params);
    assert_eq!(results.patches.len(), 4);

    // The persisted catalogue restores onto a freshly enumerated tree.
    let mut fresh = pb.tree.clone();
    assert!(persist::load_catalogue_into(
        &dir.path().join("catalogue.json"),
        params.n,
        &params.lambda,
        &mut fresh,
    )
    .unwrap());
    assert_eq!(fresh.export_witnessed(), report.tree.export_witnessed());
}

#[test]
fn a_stop_file_halts_the_run_early() {
    let dir = tempfile::tempdir().unwrap();
    let stop = dir.path().join("stop");
    fs::write(&stop, b"").unwrap();
    let params = bisection_params();
    let pb = Arc::new(Problem::build(&params).unwrap());
    let opts = ServeOpts {
        addr: "127.0.0.1:0".into(),
        results_path: dir.path().join("results.json"),
        catalogue_path: None,
        stop_file: Some(stop),
    };
    let report = Server::bind(pb, params, small_pool(), fast_net("t"), opts)
        .unwrap()
        .run()
        .unwrap();

    assert!(!report.complete);
    let results = persist::load_results(&dir.path().join("results.json")).unwrap();
    assert!(!results.complete);
}

#[test]
fn greeting_rejects_the_wrong_token() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let host = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(50)))
            .unwrap();
        let writer = Arc::new(Mutex::new(stream.try_clone().unwrap()));
        let mut reader = MsgReader::new(stream);
        let live = AtomicBool::new(true);
        greet(&mut reader, &writer, "right", &live)
    });

    let probe = TcpStream::connect(addr).unwrap();
    let mut reader = MsgReader::new(probe.try_clone().unwrap());
    let mut writer = probe;
    write_msg(
        &mut writer,
        &Message::Handshake {
            token: "wrong".into(),
        },
    )
    .unwrap();
    assert_eq!(reader.next_msg().unwrap(), Some(Message::Close));
    assert!(matches!(host.join().unwrap(), Err(NetError::Handshake)));
}

#[test]
fn greeting_echoes_the_right_token() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let host = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(50)))
            .unwrap();
        let writer = Arc::new(Mutex::new(stream.try_clone().unwrap()));
        let mut reader = MsgReader::new(stream);
        let live = AtomicBool::new(true);
        greet(&mut reader, &writer, "right", &live)
    });

    let probe = TcpStream::connect(addr).unwrap();
    let mut reader = MsgReader::new(probe.try_clone().unwrap());
    let mut writer = probe;
    write_msg(
        &mut writer,
        &Message::Handshake {
            token: "right".into(),
        },
    )
    .unwrap();
    assert_eq!(
        reader.next_msg().unwrap(),
        Some(Message::Handshake {
            token: "right".into()
        })
    );
    host.join().unwrap().unwrap();
}

#[test]
fn a_worker_serves_a_handmade_coordinator() {
    let pb = Arc::new(Problem::build(&bisection_params()).unwrap());

    // Split the seed so the dispatched unit is a genuine mid-tree state.
    let mut out = RunOutput::default();
    let armed = AtomicBool::new(true);
    let mut st = SearchState::seed(&pb, 2, 2).unwrap();
    st.run(&pb, &armed, &mut out);
    let child = out.spawned.into_iter().next().unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let net = fast_net("hmac");
    let scfg = SchedulerCfg {
        workers: 1,
        ..SchedulerCfg::default()
    };

    let worker = {
        let pb = pb.clone();
        let net = net.clone();
        let scfg = scfg.clone();
        thread::spawn(move || super::work(pb, &scfg, &net, &addr))
    };

    let (stream, _) = listener.accept().unwrap();
    let mut reader = MsgReader::new(stream.try_clone().unwrap());
    let mut writer = stream;

    match reader.next_msg().unwrap() {
        Some(Message::Handshake { token }) => {
            assert_eq!(token, "hmac");
            write_msg(&mut writer, &Message::Handshake { token }).unwrap();
        }
        other => panic!("expected a handshake, got {other:?}"),
    }

    match reader.next_msg().unwrap() {
        Some(Message::JobRequest { count }) => assert!(count >= 1),
        other => panic!("expected a job request, got {other:?}"),
    }
    write_msg(
        &mut writer,
        &Message::Work {
            unit: WorkUnit {
                id: 7,
                root: 7,
                state: child,
            },
        },
    )
    .unwrap();

    // One result per dispatched unit; the worker may keep asking for more
    // work in between.
    let result = loop {
        match reader.next_msg().unwrap() {
            Some(Message::JobRequest { .. }) => {}
            Some(Message::Result { result }) => break result,
            other => panic!("expected a result, got {other:?}"),
        }
    };
    assert_eq!(result.unit, 7);
    assert_eq!(result.patches.len(), 2);
    assert_eq!(result.stats.patches, 2);

    // An idle worker holds nothing, so the recall goes unanswered; only job
    // requests may arrive until the close ends the link.
    write_msg(&mut writer, &Message::ReturnSpawn).unwrap();
    write_msg(&mut writer, &Message::Close).unwrap();
    loop {
        match reader.next_msg().unwrap() {
            Some(Message::JobRequest { .. }) => {}
            Some(other) => panic!("idle worker answered the recall with {other:?}"),
            None => break,
        }
    }
    worker.join().unwrap().unwrap();
}

#[test]
fn a_live_worker_joins_a_real_run() {
    let dir = tempfile::tempdir().unwrap();
    let params = bisection_params();
    let pb = Arc::new(Problem::build(&params).unwrap());
    let opts = ServeOpts {
        addr: "127.0.0.1:0".into(),
        results_path: dir.path().join("results.json"),
        catalogue_path: None,
        stop_file: None,
    };
    let net = fast_net("shared");
    let server = Server::bind(pb.clone(), params, small_pool(), net.clone(), opts).unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let host = thread::spawn(move || server.run());

    // The run is short, so the worker may arrive after it is over; it must
    // come home cleanly either way.
    let scfg = SchedulerCfg {
        workers: 1,
        ..SchedulerCfg::default()
    };
    let _ = super::work(pb, &scfg, &net, &addr);

    let report = host.join().unwrap().unwrap();
    assert!(report.complete);
    assert_eq!(report.patches.len(), 4);
    assert_eq!(report.stats.patches, 4);
}
