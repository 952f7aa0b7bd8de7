//! Server / Client Tests
//!
//! The blocking client against a live TCP server on an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use digitooldb::client::{Client, ClientError};
use digitooldb::server::Server;
use digitooldb::Engine;
use serde_json::json;
use tokio::sync::oneshot;

// =============================================================================
// Test Utilities
// =============================================================================

struct RunningServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RunningServer {
    fn start(engine: Engine) -> Self {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let listener = runtime.block_on(Server::bind("127.0.0.1:0")).unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Server::new(Arc::new(engine), 8, Duration::from_secs(5));
        let (tx, rx) = oneshot::channel::<()>();

        let thread = thread::spawn(move || {
            runtime
                .block_on(server.run(listener, async move {
                    let _ = rx.await;
                }))
                .unwrap();
        });

        Self {
            addr,
            shutdown: Some(tx),
            thread: Some(thread),
        }
    }

    fn client(&self) -> Client {
        Client::connect("127.0.0.1", self.addr.port(), Duration::from_secs(5)).unwrap()
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

/// The full document lifecycle over the wire.
#[test]
fn test_document_lifecycle() {
    let server = RunningServer::start(Engine::in_memory());
    let mut client = server.client();

    client.create_database("t").unwrap();
    client.create_collection("t", "u").unwrap();

    let inserted = client.insert("t", "u", json!({"name": "John", "age": 30})).unwrap();
    let id = inserted["_id"].as_str().unwrap().to_string();

    let found = client.find("t", "u", Some(json!({"age": {"$lt": 35}}))).unwrap();
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["_id"], json!(id));

    let summary = client
        .update("t", "u", json!({"name": "John"}), json!({"$inc": {"age": 1}}))
        .unwrap();
    assert_eq!(summary["modified"], 1);

    let one = client.find_one("t", "u", Some(json!({"_id": id}))).unwrap();
    assert_eq!(one["age"], 31);

    client.create_index("t", "u", "name").unwrap();
    assert_eq!(client.list_indices("t", "u").unwrap(), json!(["name"]));
    let reports = client.verify_indices("t", "u").unwrap();
    assert_eq!(reports[0]["consistent"], true);

    let deleted = client.delete("t", "u", json!({})).unwrap();
    assert_eq!(deleted, json!({"deleted_count": 1}));
    assert_eq!(client.find("t", "u", None).unwrap(), json!([]));
}

/// Server errors arrive with their code; the connection stays usable.
#[test]
fn test_errors_pass_through() {
    let server = RunningServer::start(Engine::in_memory());
    let mut client = server.client();

    match client.list_collections("missing") {
        Err(ClientError::Server { code, .. }) => assert_eq!(code, "NOT_FOUND"),
        other => panic!("expected NOT_FOUND, got {:?}", other),
    }

    client.create_database("t").unwrap();
    let err = client.create_database("t").unwrap_err();
    assert_eq!(err.code(), "ALREADY_EXISTS");

    let err = client.create_database("bad name").unwrap_err();
    assert_eq!(err.code(), "INVALID_NAME");

    assert_eq!(client.list_databases().unwrap(), json!(["t"]));
}

/// Several clients share one engine.
#[test]
fn test_concurrent_clients() {
    let server = RunningServer::start(Engine::in_memory());
    {
        let mut setup = server.client();
        setup.create_database("t").unwrap();
        setup.create_collection("t", "u").unwrap();
        setup.insert("t", "u", json!({"_id": "counter", "n": 0})).unwrap();
    }

    let port = server.addr.port();
    let workers: Vec<_> = (0..4)
        .map(|_| {
            thread::spawn(move || {
                let mut client = Client::connect("127.0.0.1", port, Duration::from_secs(5)).unwrap();
                for _ in 0..10 {
                    client
                        .update("t", "u", json!({"_id": "counter"}), json!({"$inc": {"n": 1}}))
                        .unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let mut client = server.client();
    let doc = client.find_one("t", "u", Some(json!({"_id": "counter"}))).unwrap();
    assert_eq!(doc["n"], 40);
}
