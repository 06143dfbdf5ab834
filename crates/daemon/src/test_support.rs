// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loopback coordinator and raw protocol clients for tests

use std::net::SocketAddr;
use std::time::Duration;

use baton_core::protocol::{self, ProtocolError};
use baton_core::{CoordinatorConfig, Frame, FrameKind, ProcessId};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::engine::Coordinator;
use crate::server;

pub const WAIT: Duration = Duration::from_secs(2);

pub struct Harness {
    pub coordinator: Coordinator,
    pub addr: SocketAddr,
    pub accept: JoinHandle<()>,
    pub grants: JoinHandle<()>,
}

impl Harness {
    pub async fn start(config: CoordinatorConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let coordinator = Coordinator::new(config);

        let accept = tokio::spawn(server::accept_loop(coordinator.clone(), listener));
        let engine = coordinator.clone();
        let grants = tokio::spawn(async move { engine.run_grants().await });

        Self {
            coordinator,
            addr,
            accept,
            grants,
        }
    }

    pub async fn client(&self, id: &str) -> TestClient {
        TestClient::connect(self.addr, id, self.coordinator.config().frame_width).await
    }

    /// Wait until `id` appears in the registry
    pub async fn registered(&self, id: &str) {
        let coordinator = self.coordinator.clone();
        let id = ProcessId::new(id);
        wait_until(move || coordinator.sessions().iter().any(|s| s.id == id)).await;
    }

    /// Wait until the request queue equals `expected`
    pub async fn queue_is(&self, expected: &[&str]) {
        let coordinator = self.coordinator.clone();
        let expected: Vec<ProcessId> = expected.iter().map(|s| ProcessId::new(*s)).collect();
        wait_until(move || coordinator.queue_snapshot() == expected).await;
    }
}

/// Client speaking the raw wire protocol
pub struct TestClient {
    pub id: ProcessId,
    pub stream: TcpStream,
    width: usize,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr, id: &str, width: usize) -> Self {
        let id = ProcessId::new(id);
        let mut stream = TcpStream::connect(addr).await.unwrap();
        protocol::write_identity(&mut stream, &id, width)
            .await
            .unwrap();
        Self { id, stream, width }
    }

    pub async fn send(&mut self, kind: FrameKind) {
        let frame = Frame::new(kind, self.id.clone());
        protocol::write_frame(&mut self.stream, &frame, self.width)
            .await
            .unwrap();
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }

    pub async fn recv(&mut self) -> Result<Frame, ProtocolError> {
        tokio::time::timeout(WAIT, protocol::read_frame(&mut self.stream, self.width))
            .await
            .expect("timed out waiting for a frame")
    }

    /// Assert the next frame is `kind` addressed to this client
    pub async fn expect(&mut self, kind: FrameKind) {
        let frame = self.recv().await.unwrap();
        assert_eq!(frame.kind, kind, "unexpected frame for {}", self.id);
        assert_eq!(frame.id, self.id);
    }

    /// Assert nothing arrives within `window`
    pub async fn expect_silence(&mut self, window: Duration) {
        let read = protocol::read_frame(&mut self.stream, self.width);
        if let Ok(frame) = tokio::time::timeout(window, read).await {
            panic!("expected silence, got {:?}", frame);
        }
    }

    /// Request, take the grant, and wait for the release
    pub async fn cycle(&mut self) {
        self.send(FrameKind::Request).await;
        self.expect(FrameKind::Grant).await;
        self.expect(FrameKind::Release).await;
    }
}

pub async fn wait_until(check: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met within {:?}", WAIT);
}

pub fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig::default()
        .with_port(0)
        .with_hold(Duration::from_millis(30))
}
