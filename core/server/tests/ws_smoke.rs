use serde_json::{json, Value};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tungstenite::{Message, WebSocket};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

struct ServerGuard {
    child: Child,
}

impl Drop for ServerGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

type Client = WebSocket<TcpStream>;

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local addr").port()
}

fn write_content(dir: &Path) {
    let scripture = json!({
        "sections": [
            {
                "index": 1,
                "name": "الفاتحة",
                "transliteratedName": "Al-Fatihah",
                "translatedName": "The Opening",
                "verseCount": 7,
                "verses": [
                    { "index": 1, "text": "بِسْمِ ٱللَّهِ ٱلرَّحْمَٰنِ ٱلرَّحِيمِ", "transliteration": "Bismillahir rahmanir rahim", "translation": "In the name of God, the Most Gracious, the Most Merciful" }
                ]
            },
            {
                "index": 2,
                "name": "البقرة",
                "transliteratedName": "Al-Baqarah",
                "translatedName": "The Cow",
                "verseCount": 286,
                "verses": [
                    { "index": 255, "text": "ٱللَّهُ لَآ إِلَٰهَ إِلَّا هُوَ ٱلْحَىُّ ٱلْقَيُّومُ", "transliteration": "Allahu la ilaha illa huwal hayyul qayyum", "translation": "God: there is no god but Him, the Ever Living, the Sustainer" }
                ]
            }
        ]
    });
    let supplications = json!({
        "supplications": [
            {
                "handle": "iftitah",
                "title": "Du'a al-Iftitah",
                "lines": [
                    { "text": "line 1" },
                    { "text": "line 2" },
                    { "text": "line 3" }
                ]
            }
        ]
    });
    std::fs::write(dir.join("scripture.json"), scripture.to_string()).expect("write scripture");
    std::fs::write(dir.join("supplications.json"), supplications.to_string())
        .expect("write supplications");
}

fn spawn_server(home: &Path, port: u16) -> ServerGuard {
    let content = home.join("content");
    std::fs::create_dir_all(&content).expect("create content dir");
    write_content(&content);

    let child = Command::new(env!("CARGO_BIN_EXE_recital-server"))
        .env("HOME", home)
        .env_remove("RUST_LOG")
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(port.to_string())
        .arg("--content-dir")
        .arg(&content)
        .arg("--static-dir")
        .arg(home.join("public"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn recital-server");
    ServerGuard { child }
}

fn wait_for_port(port: u16, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return;
        }
        sleep(Duration::from_millis(25));
    }
    panic!("Timed out waiting for recital-server on port {}", port);
}

fn connect(port: u16) -> (Client, u64) {
    let stream = TcpStream::connect(("127.0.0.1", port)).expect("connect tcp");
    stream
        .set_read_timeout(Some(READ_TIMEOUT))
        .expect("set read timeout");
    let url = format!("ws://127.0.0.1:{}/ws", port);
    let (mut client, _) = tungstenite::client::client(url.as_str(), stream).expect("ws handshake");
    let connected = recv_type(&mut client, "connected");
    let session_id = connected["sessionId"].as_u64().expect("session id");
    (client, session_id)
}

fn send(client: &mut Client, message: Value) {
    client
        .send(Message::Text(message.to_string().into()))
        .expect("send message");
}

fn recv(client: &mut Client) -> Value {
    loop {
        match client.read().expect("read message") {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("parse server message")
            }
            Message::Close(_) => panic!("server closed the socket"),
            _ => continue,
        }
    }
}

/// Reads until a message of `kind` arrives, skipping unrelated broadcasts.
fn recv_type(client: &mut Client, kind: &str) -> Value {
    loop {
        let message = recv(client);
        if message["type"] == kind {
            return message;
        }
    }
}

fn declare(client: &mut Client, role: &str) -> Value {
    send(client, json!({ "type": "declare-role", "role": role }));
    recv_type(client, "bootstrap")
}

fn http_get(port: u16, path: &str) -> Value {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect http");
    stream
        .set_read_timeout(Some(READ_TIMEOUT))
        .expect("set read timeout");
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n\r\n",
        path
    );
    stream.write_all(request.as_bytes()).expect("write request");

    let mut response = String::new();
    stream.read_to_string(&mut response).expect("read response");
    assert!(response.starts_with("HTTP/1.1 200"), "unexpected response: {}", response);
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body)
        .expect("response body");
    serde_json::from_str(body).expect("parse response JSON")
}

#[test]
fn lock_handover_and_rejection_over_websocket() {
    let home = TempDir::new().expect("Failed to create temp HOME");
    let port = free_port();
    let _guard = spawn_server(home.path(), port);
    wait_for_port(port, Duration::from_secs(5));

    let health = http_get(port, "/api/health");
    assert_eq!(health["status"], "ok");
    assert_eq!(health["lockHeld"], false);

    let (mut c1, c1_id) = connect(port);
    let bootstrap = declare(&mut c1, "controller");
    assert_eq!(bootstrap["lockStatus"]["isActiveController"], true);
    assert_eq!(bootstrap["connectionInfo"]["sessionId"], c1_id);
    assert_eq!(bootstrap["sections"].as_array().map(Vec::len), Some(2));

    let (mut viewer, _) = connect(port);
    let bootstrap = declare(&mut viewer, "viewer");
    assert_eq!(bootstrap["role"], "viewer");
    assert_eq!(bootstrap["positionState"]["scripture"]["sectionIndex"], 1);

    let (mut c2, _) = connect(port);
    let bootstrap = declare(&mut c2, "controller");
    assert_eq!(bootstrap["lockStatus"]["isActiveController"], false);
    assert_eq!(bootstrap["lockStatus"]["lockedByAnother"], true);

    send(
        &mut c1,
        json!({ "type": "set-scripture-position", "sectionIndex": 2, "subIndex": 255 }),
    );
    let update = recv_type(&mut viewer, "state-update");
    assert_eq!(update["positionState"]["scripture"]["sectionIndex"], 2);
    assert_eq!(update["positionState"]["scripture"]["subIndex"], 255);
    assert_eq!(update["contentPayload"]["missing"], false);
    recv_type(&mut c2, "state-update");

    send(
        &mut c2,
        json!({ "type": "set-scripture-position", "sectionIndex": 1, "subIndex": 1 }),
    );
    let error = recv(&mut c2);
    assert_eq!(error["type"], "error");
    assert_eq!(error["code"], "not_active_controller");
    let status = recv(&mut c2);
    assert_eq!(status["type"], "lock-status");
    assert_eq!(status["isActiveController"], false);
    assert_eq!(status["lockedByAnother"], true);

    send(&mut c2, json!({ "type": "nonsense-but-valid" }));
    send(&mut c2, json!({ "type": "request-bootstrap" }));
    let bootstrap = recv(&mut c2);
    assert_eq!(bootstrap["type"], "bootstrap");
    assert_eq!(bootstrap["positionState"]["scripture"]["subIndex"], 255);

    c2.send(Message::Text("not json".into())).expect("send garbage");
    let error = recv(&mut c2);
    assert_eq!(error["code"], "invalid_message");

    c1.close(None).expect("close c1");
    drop(c1);

    let status = recv_type(&mut c2, "lock-status");
    assert_eq!(status["isActiveController"], true);
    assert_eq!(status["lockedByAnother"], false);

    let snapshot = http_get(port, "/api/bootstrap?role=controller");
    assert_eq!(snapshot["role"], "controller");
    assert_eq!(snapshot["lockStatus"]["lockedByAnother"], true);
    assert_eq!(snapshot["positionState"]["scripture"]["subIndex"], 255);

    let health = http_get(port, "/api/health");
    assert_eq!(health["lockHeld"], true);
    assert_eq!(health["controllers"], 1);
    assert_eq!(health["viewers"], 1);
}

#[test]
fn silent_holder_times_out_and_waiting_controller_is_promoted() {
    let home = TempDir::new().expect("Failed to create temp HOME");
    let config_dir = home.path().join(".recital");
    std::fs::create_dir_all(&config_dir).expect("create config dir");
    std::fs::write(
        config_dir.join("server.toml"),
        "[control]\ncontroller_timeout_secs = 1\nliveness_interval_secs = 1\n",
    )
    .expect("write config");

    let port = free_port();
    let _guard = spawn_server(home.path(), port);
    wait_for_port(port, Duration::from_secs(5));

    let (mut c1, _) = connect(port);
    declare(&mut c1, "controller");
    let (mut c2, _) = connect(port);
    declare(&mut c2, "controller");

    let status = recv_type(&mut c2, "lock-status");
    assert_eq!(status["isActiveController"], true);

    let claimed = recv_type(&mut c1, "lock-status");
    assert_eq!(claimed["isActiveController"], true);
    let status = recv_type(&mut c1, "lock-status");
    assert_eq!(status["isActiveController"], false);
    assert_eq!(status["lockedByAnother"], true);
}
