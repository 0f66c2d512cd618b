//! In-process HTTP upstreams for provider tests.

use axum::Router;
use axum::body::{Body, Bytes};
use futures::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// A base URL nothing listens on.
pub fn refused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// A body that sends `head` then never finishes.
pub fn stalled_body(head: &'static str) -> Body {
    let stream = futures::stream::iter([Ok::<_, Infallible>(Bytes::from_static(head.as_bytes()))])
        .chain(futures::stream::pending());
    Body::from_stream(stream)
}

/// Sets its flag when the server stops polling the body it belongs to.
pub struct DropFlag(pub Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// An endless body emitting `line` every 20ms until the client hangs up.
pub fn endless_body(line: &'static str, dropped: Arc<AtomicBool>) -> Body {
    let stream = futures::stream::unfold(DropFlag(dropped), move |flag| async move {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        Some((Ok::<_, Infallible>(Bytes::from_static(line.as_bytes())), flag))
    });
    Body::from_stream(stream)
}

