//! What the responder logs while vetting and serving a client.

use framebridge_core::{HandshakeMessage, Message, MessageChannel, NodeId, Request, Window};
use framebridge_server::{Actions, ServerConfig};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::io;
use std::sync::Arc;

const HOST: &str = "http://localhost:3000";
const FRAME: &str = "http://localhost:3001";

/// Formatted log output collected in memory.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn request(id: &str, source: &str) -> Message {
    Message::from(Request {
        id: id.into(),
        source: NodeId::new(source).unwrap(),
        destination: NodeId::new("s").unwrap(),
        action: "echo".into(),
        data: json!(id),
    })
}

#[tokio::test]
async fn log_lines_are_prefixed_with_the_server_name() {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let host = Window::new(HOST);
    let frame = Window::new(FRAME);
    let evil = Window::new("http://evil.example");
    let mut actions = Actions::new();
    actions.register("echo", |v: Value| async move { anyhow::Ok(v) });
    let _server =
        framebridge_server::init(&host, ServerConfig::new("s", [FRAME], ["c"]), actions).unwrap();

    let proxy = host.reference_from(&frame);
    host.reference_from(&evil)
        .post_message(&HandshakeMessage::init("c"), HOST, vec![MessageChannel::new().port2])
        .unwrap();
    proxy
        .post_message(&HandshakeMessage::init("x"), HOST, vec![MessageChannel::new().port2])
        .unwrap();
    proxy
        .post_message(&json!({"tag": "HELLO"}), HOST, vec![])
        .unwrap();

    let channel = MessageChannel::new();
    let mut rx = channel.port1.start().unwrap();
    proxy
        .post_message(&HandshakeMessage::init("c"), HOST, vec![channel.port2])
        .unwrap();
    rx.recv().await.unwrap();

    channel.port1.post_message(&request("spoofed", "mallory")).unwrap();
    channel.port1.post_message(&request("good", "c")).unwrap();
    rx.recv().await.unwrap();

    let text = captured.text();
    for line in [
        "[s] Discarding message from untrusted origin: http://evil.example",
        "[s] Discarding message from unallowed client: x",
        "[s] Ignoring non-handshake message",
        "[s] Connection established with client: c",
        "[s] Discarding message with invalid source/destination.",
    ] {
        assert!(text.contains(line), "missing {line:?} in:\n{text}");
    }
    // Messages carry their context inline, not as key=value fields.
    assert!(!text.contains("server="), "structured field in:\n{text}");
}
