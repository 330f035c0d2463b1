//! Integration tests against a real master on an ephemeral port,
//! exercised through the synchronous worker-side client.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;

use magpie_core::protocol::{read_frame, Response};
use magpie_core::{Client, Graph, MagpieError};
use magpie_node::master::{serve, MasterState};
use magpie_node::storage;
use magpie_node::worker::{sync_action, SyncAction};

async fn start_master(name: &str) -> (u16, Arc<MasterState>, PathBuf) {
    let path = std::env::temp_dir().join(format!("magpie-rpc-{name}-{}", std::process::id()));
    let _ = std::fs::remove_file(&path);

    let state = Arc::new(MasterState::new(path.clone()));
    state.init();

    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let serve_state = state.clone();
    tokio::spawn(async move {
        let _ = serve(listener, serve_state).await;
    });

    (port, state, path)
}

async fn blocking<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap()
}

fn sample_dna(hidden: u32, links: u32) -> Vec<u8> {
    Graph::new(2, 1, hidden, links).save().to_vec()
}

#[tokio::test]
async fn fresh_master_accepts_first_upload() {
    // S1: nonexistent file, NaN fitness, first SetGraph wins
    let (port, _state, path) = start_master("s1").await;
    let dna_x = sample_dna(0, 0);

    let fitness = blocking(move || Client::new("127.0.0.1", port).get_fitness().unwrap()).await;
    assert!(fitness.is_nan());

    let dna = dna_x.clone();
    blocking(move || Client::new("127.0.0.1", port).set_graph(0.5, &dna).unwrap()).await;

    let (fitness, dna) =
        blocking(move || Client::new("127.0.0.1", port).get_graph().unwrap()).await;
    assert_eq!(fitness, 0.5);
    assert_eq!(dna, dna_x);

    // the persisted file decodes to exactly what was accepted
    let (saved_fitness, saved_dna) = storage::read_state(&path).unwrap();
    assert_eq!(saved_fitness, 0.5);
    assert_eq!(saved_dna, dna_x);

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..2], &1i16.to_le_bytes());
    assert_eq!(&bytes[2..6], &0.5f32.to_le_bytes());
    assert_eq!(&bytes[6..10], &(dna_x.len() as i32).to_le_bytes());
    assert_eq!(&bytes[10..], &dna_x[..]);

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn weaker_upload_is_ignored() {
    // S2: a lower-fitness SetGraph succeeds but changes nothing
    let (port, _state, path) = start_master("s2").await;
    let dna_x = sample_dna(0, 0);
    let dna_y = sample_dna(1, 1);

    let dna = dna_x.clone();
    blocking(move || Client::new("127.0.0.1", port).set_graph(0.5, &dna).unwrap()).await;
    blocking(move || Client::new("127.0.0.1", port).set_graph(0.3, &dna_y).unwrap()).await;

    let (fitness, dna) =
        blocking(move || Client::new("127.0.0.1", port).get_graph().unwrap()).await;
    assert_eq!(fitness, 0.5);
    assert_eq!(dna, dna_x);

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn concurrent_uploads_keep_the_fitter() {
    // S3: racing uploads; the 0.7 submitter's DNA survives
    let (port, _state, path) = start_master("s3").await;
    let dna_6 = sample_dna(0, 0);
    let dna_7 = sample_dna(2, 2);

    let dna = dna_6.clone();
    let first = blocking(move || Client::new("127.0.0.1", port).set_graph(0.6, &dna));
    let dna = dna_7.clone();
    let second = blocking(move || Client::new("127.0.0.1", port).set_graph(0.7, &dna));
    let (a, b) = tokio::join!(first, second);
    a.unwrap();
    b.unwrap();

    let (fitness, dna) =
        blocking(move || Client::new("127.0.0.1", port).get_graph().unwrap()).await;
    assert_eq!(fitness, 0.7);
    assert_eq!(dna, dna_7);

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn get_fitness_reflects_accepted_upload() {
    let (port, _state, path) = start_master("reflect").await;
    let dna = sample_dna(0, 0);

    blocking(move || Client::new("127.0.0.1", port).set_graph(0.125, &dna).unwrap()).await;
    let fitness = blocking(move || Client::new("127.0.0.1", port).get_fitness().unwrap()).await;
    assert_eq!(fitness, 0.125);

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn worker_pulls_then_pushes() {
    // S4: NaN worker pulls from a 0.4 master, then pushes at 0.5
    let (port, _state, path) = start_master("s4").await;
    let master_dna = sample_dna(1, 1);

    let dna = master_dna.clone();
    blocking(move || Client::new("127.0.0.1", port).set_graph(0.4, &dna).unwrap()).await;

    let pulled = blocking(move || {
        let client = Client::new("127.0.0.1", port);
        let master = client.get_fitness().unwrap();
        assert_eq!(sync_action(master, f32::NAN), SyncAction::Pull);
        client.get_graph().unwrap()
    })
    .await;
    assert_eq!(pulled.0, 0.4);
    assert_eq!(pulled.1, master_dna);

    // next iteration: the worker evolved past the master
    let local_dna = sample_dna(2, 1);
    let fitness = blocking(move || {
        let client = Client::new("127.0.0.1", port);
        let master = client.get_fitness().unwrap();
        assert_eq!(sync_action(master, 0.5), SyncAction::Push);
        client.set_graph(0.5, &local_dna).unwrap();
        client.get_fitness().unwrap()
    })
    .await;
    assert_eq!(fitness, 0.5);

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn garbage_request_gets_error_envelope() {
    let (port, _state, path) = start_master("garbage").await;

    let response = blocking(move || {
        use std::io::Write;
        let mut stream = std::net::TcpStream::connect(("127.0.0.1", port)).unwrap();
        stream.write_all(&3u32.to_le_bytes()).unwrap();
        stream.write_all(&[0xFF, 0xFF, 0xFF]).unwrap();
        stream.flush().unwrap();
        read_frame::<_, Response>(&mut stream).unwrap()
    })
    .await;

    match response {
        Response::Error { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Command Not Supported");
        }
        other => panic!("expected error envelope, got {other:?}"),
    }

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn persistence_failure_becomes_error_envelope() {
    // state file in a directory that does not exist: the accept is
    // applied but the write error travels back as Error{400, ..}
    let path = PathBuf::from("/nonexistent-magpie-dir/state");
    let state = Arc::new(MasterState::new(path));
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let _ = serve(listener, state).await;
    });

    let result =
        blocking(move || Client::new("127.0.0.1", port).set_graph(0.5, &[1, 2, 3])).await;
    match result {
        Err(MagpieError::Remote { status, .. }) => assert_eq!(status, 400),
        other => panic!("expected remote error, got {other:?}"),
    }
}

#[tokio::test]
async fn master_restart_restores_state() {
    let (port, _state, path) = start_master("restart").await;
    let dna = sample_dna(1, 2);

    let upload = dna.clone();
    blocking(move || Client::new("127.0.0.1", port).set_graph(0.9, &upload).unwrap()).await;

    // a second master over the same file picks the state up
    let reborn = MasterState::new(path.clone());
    reborn.init();
    assert_eq!(reborn.fitness(), 0.9);
    assert_eq!(reborn.snapshot().1, dna);

    let _ = std::fs::remove_file(path);
}
