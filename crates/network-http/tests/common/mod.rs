#![allow(dead_code)]

use std::net::SocketAddr;

use axum::Router;
use ferry_network::{OperationKind, RequestParameters, Variables};
use serde_json::Value;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Serves `router` on an ephemeral local port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Should bind to an ephemeral port");
    let addr = listener.local_addr().expect("Should have a local address");

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("HTTP server should run");
    });

    addr
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Should bind to an ephemeral port");
    listener.local_addr().expect("Should have a local address")
}

pub fn operation(kind: OperationKind) -> RequestParameters {
    RequestParameters::new("TestOperation", kind, "query TestOperation { node { id } }")
}

pub fn variables(value: Value) -> Variables {
    match value {
        Value::Object(map) => map,
        _ => panic!("variables must be an object"),
    }
}
