//! End-to-end tests: a real listener, the event loop on its own thread, and
//! a frontend socket sending frames at it.
//!
//! The Wi-Fi side is `MockWifi`, so these run anywhere without privileges.
//! UDP tests bind `127.0.0.1:0` and ask the listener which port it got;
//! local-socket tests use a per-test directory under the system temp dir.

use std::net::UdpSocket;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;

use pipe_broker::application::{Broker, EventLoop, ShutdownReason};
use pipe_broker::infrastructure::transport::DatagramListener;
use pipe_broker::infrastructure::wifi::mock::{MockWifi, WifiCall};
use pipe_core::{decode_frame, encode_frame, Bssid, ConnectRequest, Frame, Psk, StatusCode};

const RECEIVE_TIMEOUT: Duration = Duration::from_millis(50);
const SCAN_TIMEOUT: Duration = Duration::from_secs(1);
const REPLY_WAIT: Duration = Duration::from_secs(2);

// ── Helpers ───────────────────────────────────────────────────────────────────

struct RunningBroker {
    handle: JoinHandle<ShutdownReason>,
    wifi: Arc<MockWifi>,
    shutdown: Arc<AtomicBool>,
}

fn spawn_loop(listener: DatagramListener, wifi: MockWifi) -> RunningBroker {
    let wifi = Arc::new(wifi);
    let shutdown = Arc::new(AtomicBool::new(false));
    let broker = Broker::new(wifi.clone(), SCAN_TIMEOUT);
    let event_loop = EventLoop::new(listener, broker, wifi.clone(), shutdown.clone());
    let handle = std::thread::spawn(move || event_loop.run());
    RunningBroker {
        handle,
        wifi,
        shutdown,
    }
}

/// Starts a broker on an ephemeral UDP port and returns a connected frontend socket.
fn start_udp(wifi: MockWifi) -> (RunningBroker, UdpSocket) {
    let listener = DatagramListener::bind_remote("127.0.0.1:0".parse().unwrap(), RECEIVE_TIMEOUT)
        .expect("bind listener");
    let addr = listener.udp_local_addr().expect("listener address");

    let frontend = UdpSocket::bind("127.0.0.1:0").expect("bind frontend");
    frontend.set_read_timeout(Some(REPLY_WAIT)).unwrap();
    frontend.connect(addr).unwrap();

    (spawn_loop(listener, wifi), frontend)
}

fn send(frontend: &UdpSocket, frame: &Frame) {
    frontend.send(&encode_frame(frame).unwrap()).unwrap();
}

fn recv_frame(frontend: &UdpSocket) -> Frame {
    let mut buf = [0u8; 128];
    let len = frontend.recv(&mut buf).expect("reply expected");
    decode_frame(&buf[..len]).expect("reply must decode")
}

fn assert_no_reply(frontend: &UdpSocket) {
    frontend
        .set_read_timeout(Some(Duration::from_millis(200)))
        .unwrap();
    let mut buf = [0u8; 128];
    assert!(frontend.recv(&mut buf).is_err(), "no reply expected");
    frontend.set_read_timeout(Some(REPLY_WAIT)).unwrap();
}

fn connect_frame(ssid: &str) -> Frame {
    Frame::Connect(ConnectRequest {
        ssid: ssid.to_string(),
        bssid: Bssid([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]),
        psk: Psk([0x5A; 32]),
    })
}

// ── UDP ───────────────────────────────────────────────────────────────────────

#[test]
fn test_sync_over_udp_replies_success_to_sender() {
    // Arrange
    let (broker, frontend) = start_udp(MockWifi::new());

    // Act
    frontend.send(&[0x01]).unwrap();
    let reply = recv_frame(&frontend);

    // Assert
    assert_eq!(reply, Frame::Status(StatusCode::Success));

    send(&frontend, &Frame::Quit);
    assert_eq!(broker.handle.join().unwrap(), ShutdownReason::Quit);
}

#[test]
fn test_sync_without_console_replies_generic_error() {
    let (broker, frontend) = start_udp(MockWifi::new().without_target());

    send(&frontend, &Frame::Sync);

    assert_eq!(recv_frame(&frontend), Frame::Status(StatusCode::GenericError));
    send(&frontend, &Frame::Quit);
    broker.handle.join().unwrap();
}

#[test]
fn test_unknown_code_is_ignored_and_loop_keeps_serving() {
    // Arrange
    let (broker, frontend) = start_udp(MockWifi::new());

    // Act
    frontend.send(&[0xFF]).unwrap();
    assert_no_reply(&frontend);
    send(&frontend, &Frame::Sync);

    // Assert
    assert_eq!(recv_frame(&frontend), Frame::Status(StatusCode::Success));
    send(&frontend, &Frame::Quit);
    broker.handle.join().unwrap();
}

#[test]
fn test_connect_is_acknowledged_and_associates() {
    let (broker, frontend) = start_udp(MockWifi::new());

    send(&frontend, &connect_frame("WiiU1234"));

    assert_eq!(recv_frame(&frontend), Frame::BindAck);
    let associated = |wifi: &MockWifi| {
        wifi.count(|c| matches!(c, WifiCall::Associate(r) if r.ssid == "WiiU1234"))
    };
    let deadline = std::time::Instant::now() + REPLY_WAIT;
    while associated(&broker.wifi) == 0 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    send(&frontend, &Frame::Quit);
    broker.handle.join().unwrap();

    assert_eq!(associated(&broker.wifi), 1);
}

#[test]
fn test_quit_closes_socket_and_cleans_up_wifi() {
    // Arrange
    let (broker, frontend) = start_udp(MockWifi::new());

    // Act
    send(&frontend, &Frame::Quit);
    let reason = broker.handle.join().unwrap();

    // Assert
    assert_eq!(reason, ShutdownReason::Quit);
    assert!(broker.shutdown.load(Ordering::Relaxed));
    assert_eq!(broker.wifi.count(|c| matches!(c, WifiCall::Cleanup)), 1);
    assert_no_reply(&frontend);
}

#[test]
fn test_shutdown_flag_stops_the_loop() {
    let (broker, _frontend) = start_udp(MockWifi::new());

    broker.shutdown.store(true, Ordering::Relaxed);

    assert_eq!(broker.handle.join().unwrap(), ShutdownReason::Signal);
    assert_eq!(broker.wifi.count(|c| matches!(c, WifiCall::Cleanup)), 1);
}

#[test]
fn test_unbind_sends_no_reply_and_disassociates() {
    let (broker, frontend) = start_udp(MockWifi::new());

    send(&frontend, &Frame::Unbind);
    assert_no_reply(&frontend);
    send(&frontend, &Frame::Quit);
    broker.handle.join().unwrap();

    assert_eq!(
        broker.wifi.count(|c| matches!(c, WifiCall::Disassociate)),
        1
    );
}

// ── Local socket ──────────────────────────────────────────────────────────────

#[cfg(unix)]
mod local {
    use super::*;
    use pipe_core::domain::transport::local_socket_path;
    use std::os::unix::net::UnixDatagram;
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "vanilla-pipe-test-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_sync_over_local_socket_replies_to_named_client() {
        // Arrange
        let dir = temp_dir("sync");
        let server_path = local_socket_path(&dir, 51000);
        let listener =
            DatagramListener::bind_local(&server_path, RECEIVE_TIMEOUT).expect("bind listener");
        let broker = spawn_loop(listener, MockWifi::new());

        let client_path = dir.join("frontend");
        let _ = std::fs::remove_file(&client_path);
        let frontend = UnixDatagram::bind(&client_path).unwrap();
        frontend.set_read_timeout(Some(REPLY_WAIT)).unwrap();

        // Act
        frontend.send_to(&[0x01], &server_path).unwrap();
        let mut buf = [0u8; 16];
        let len = frontend.recv(&mut buf).expect("reply expected");

        // Assert
        assert_eq!(
            decode_frame(&buf[..len]).unwrap(),
            Frame::Status(StatusCode::Success)
        );

        frontend
            .send_to(&encode_frame(&Frame::Quit).unwrap(), &server_path)
            .unwrap();
        broker.handle.join().unwrap();
        assert!(!server_path.exists(), "socket file removed on close");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_bind_replaces_stale_socket_file() {
        // Arrange
        let dir = temp_dir("stale");
        let path = dir.join("vanilla-pipe-51000");
        std::fs::write(&path, b"stale").unwrap();

        // Act
        let listener = DatagramListener::bind_local(&path, RECEIVE_TIMEOUT);

        // Assert
        let listener = listener.expect("stale file must not block bind");
        drop(listener);
        assert!(!path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
