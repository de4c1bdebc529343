//! # Server Integration Tests
//!
//! Real TCP clients against a server bound to an ephemeral localhost port,
//! run once per data path.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use hull_core::{DataPath, HullConfig};
use hull_monitor::Transition;
use hull_server::{RunningServer, Server};

const TIMEOUT: Duration = Duration::from_secs(5);

fn config(data_path: DataPath) -> HullConfig {
    let mut config = HullConfig::default();
    config.server.bind_address = "127.0.0.1".to_string();
    config.server.port = 0;
    config.server.data_path = data_path;
    config.server.poll_timeout_ms = 50;
    config
}

fn start(data_path: DataPath) -> (RunningServer, Receiver<Transition>) {
    start_with(&config(data_path))
}

fn start_with(config: &HullConfig) -> (RunningServer, Receiver<Transition>) {
    let (tx, rx) = mpsc::channel();
    let server = Server::bind(config).unwrap();
    let running = server
        .start(Box::new(move |t: Transition| {
            let _ = tx.send(t);
        }))
        .unwrap();
    (running, rx)
}

struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Client {
    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(TIMEOUT)).unwrap();
        let writer = stream.try_clone().unwrap();
        Self {
            reader: BufReader::new(stream),
            writer,
        }
    }

    fn send(&mut self, text: &str) {
        self.writer.write_all(text.as_bytes()).unwrap();
    }

    fn recv(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).unwrap();
        assert!(line.ends_with('\n'), "response not newline-terminated: {:?}", line);
        line.trim_end().to_string()
    }

    fn ask(&mut self, line: &str) -> String {
        self.send(&format!("{}\n", line));
        self.recv()
    }
}

/// Asks `CH` until the answer is not `BUSY`, for teardown that runs on
/// another thread after a peer closes.
fn ch_when_idle(client: &mut Client) -> String {
    for _ in 0..250 {
        let answer = client.ask("CH");
        if answer != "BUSY" {
            return answer;
        }
        thread::sleep(Duration::from_millis(20));
    }
    panic!("graph build never released");
}

fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        thread::sleep(Duration::from_millis(20));
    }
    panic!("timed out waiting for {}", what);
}

fn basic_commands(data_path: DataPath) {
    let (server, _rx) = start(data_path);
    let mut c = Client::connect(server.local_addr());

    assert_eq!(c.ask("Newpoint 0,0"), "OK");
    assert_eq!(c.ask("Newpoint 1,0"), "OK");
    assert_eq!(c.ask("Newpoint 1,1"), "OK");
    assert_eq!(c.ask("Newpoint 0,1"), "OK");
    assert_eq!(c.ask("CH"), "1");
    assert_eq!(c.ask("Removepoint 1,1"), "OK");
    assert_eq!(c.ask("CH"), "0.5");
    assert_eq!(c.ask("Frobnicate"), "ERROR: Unknown command.");
    assert_eq!(c.ask("Newgraph -1"), "ERROR: Invalid number.");
    assert_eq!(c.ask("Newpoint 1;1"), "ERROR: Invalid format.");

    server.shutdown().unwrap();
}

fn fragmented_input(data_path: DataPath) {
    let (server, _rx) = start(data_path);
    let mut c = Client::connect(server.local_addr());

    // Blank lines get no response; CRLF is accepted.
    c.send("\r\n\n  \nNewp");
    thread::sleep(Duration::from_millis(30));
    c.send("oint 2,0\r\nNewpoint 0,");
    thread::sleep(Duration::from_millis(30));
    c.send("2\nNewpoint 0,0\nCH\n");

    assert_eq!(c.recv(), "OK");
    assert_eq!(c.recv(), "OK");
    assert_eq!(c.recv(), "OK");
    assert_eq!(c.recv(), "2");

    server.shutdown().unwrap();
}

fn busy_while_building(data_path: DataPath) {
    let (server, _rx) = start(data_path);
    let mut a = Client::connect(server.local_addr());
    let mut b = Client::connect(server.local_addr());

    assert_eq!(a.ask("Newgraph 3"), "OK");
    assert_eq!(b.ask("Newpoint 5,5"), "BUSY");
    assert_eq!(b.ask("CH"), "BUSY");
    assert_eq!(a.ask("0,0"), "OK");
    assert_eq!(a.ask("not a point"), "ERROR: Invalid point format.");
    assert_eq!(a.ask("4,0"), "OK");
    assert_eq!(a.ask("0,4"), "GRAPH_LOADED");
    assert_eq!(b.ask("Newpoint 5,5"), "OK");
    assert_eq!(b.ask("CH"), "20");

    server.shutdown().unwrap();
}

fn disconnect_aborts_build(data_path: DataPath) {
    let (server, _rx) = start(data_path);
    let addr = server.local_addr();

    let mut setup = Client::connect(addr);
    for p in ["0,0", "3,0", "3,3", "0,3"] {
        assert_eq!(setup.ask(&format!("Newpoint {}", p)), "OK");
    }

    {
        let mut owner = Client::connect(addr);
        assert_eq!(owner.ask("Newgraph 2"), "OK");
        assert_eq!(owner.ask("100,100"), "OK");
    }

    let mut after = Client::connect(addr);
    assert_eq!(ch_when_idle(&mut after), "9");
    assert_eq!(server.store().session_owner(), None);

    server.shutdown().unwrap();
}

fn monitor_reports_crossing(data_path: DataPath) {
    let (server, rx) = start(data_path);
    let mut c = Client::connect(server.local_addr());

    for p in ["0,0", "20,0", "20,20", "0,20"] {
        assert_eq!(c.ask(&format!("Newpoint {}", p)), "OK");
    }
    assert_eq!(c.ask("CH"), "400");
    let t = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(t.to_string(), "At Least 100 units belongs to CH");

    assert_eq!(c.ask("Removepoint 20,20"), "OK");
    assert_eq!(c.ask("Removepoint 20,0"), "OK");
    assert_eq!(c.ask("CH"), "0");
    let t = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(t.to_string(), "At Least 100 units no longer belongs to CH");

    server.shutdown().unwrap();
}

fn slow_reader_keeps_session(data_path: DataPath) {
    const LINES: usize = 1_000_000;
    let (server, _rx) = start(data_path);
    let mut c = Client::connect(server.local_addr());
    assert_eq!(c.ask("Newgraph 2"), "OK");

    let mut writer = c.writer.try_clone().unwrap();
    let sender = thread::spawn(move || {
        let chunk = b"bogus\n".repeat(1000);
        for _ in 0..LINES / 1000 {
            writer.write_all(&chunk).unwrap();
        }
    });

    // Nobody reads for a while, so replies back up into the server.
    thread::sleep(Duration::from_millis(500));
    assert!(server.store().session_owner().is_some());
    assert_eq!(server.connection_count(), 1);

    for _ in 0..LINES {
        assert_eq!(c.recv(), "ERROR: Invalid point format.");
    }
    sender.join().unwrap();

    assert_eq!(c.ask("0,0"), "OK");
    assert_eq!(c.ask("1,1"), "GRAPH_LOADED");
    assert_eq!(server.store().len(), 2);
    server.shutdown().unwrap();
}

fn overlong_line_disconnects(data_path: DataPath) {
    let mut config = config(data_path);
    config.server.max_line_length = 64;
    let (server, _rx) = start_with(&config);
    let mut c = Client::connect(server.local_addr());

    assert_eq!(c.ask("Newgraph 3"), "OK");
    assert_eq!(c.ask("1,1"), "OK");
    c.send(&"9".repeat(1000));

    wait_until("build to be aborted", || server.store().session_owner().is_none());
    let mut rest = String::new();
    assert!(matches!(c.reader.read_line(&mut rest), Ok(0) | Err(_)));
    assert!(server.store().is_empty());
    server.shutdown().unwrap();
}

fn closed_connections_are_released(data_path: DataPath) {
    let (server, _rx) = start(data_path);
    let mut a = Client::connect(server.local_addr());
    let mut b = Client::connect(server.local_addr());
    assert_eq!(a.ask("CH"), "0");
    assert_eq!(b.ask("CH"), "0");
    assert_eq!(server.connection_count(), 2);

    drop(a);
    drop(b);
    // No further accept happens; the entries must go away on their own.
    wait_until("connections to be released", || server.connection_count() == 0);
    server.shutdown().unwrap();
}

// =============================================================================
// PROACTOR DATA PATH
// =============================================================================

#[test]
fn test_proactor_basic_commands() {
    basic_commands(DataPath::Proactor);
}

#[test]
fn test_proactor_fragmented_input() {
    fragmented_input(DataPath::Proactor);
}

#[test]
fn test_proactor_busy_while_building() {
    busy_while_building(DataPath::Proactor);
}

#[test]
fn test_proactor_disconnect_aborts_build() {
    disconnect_aborts_build(DataPath::Proactor);
}

#[test]
fn test_proactor_monitor_reports_crossing() {
    monitor_reports_crossing(DataPath::Proactor);
}

#[test]
fn test_proactor_slow_reader_keeps_session() {
    slow_reader_keeps_session(DataPath::Proactor);
}

#[test]
fn test_proactor_overlong_line_disconnects() {
    overlong_line_disconnects(DataPath::Proactor);
}

#[test]
fn test_proactor_closed_connections_are_released() {
    closed_connections_are_released(DataPath::Proactor);
}

// =============================================================================
// REACTOR DATA PATH
// =============================================================================

#[test]
fn test_reactor_basic_commands() {
    basic_commands(DataPath::Reactor);
}

#[test]
fn test_reactor_fragmented_input() {
    fragmented_input(DataPath::Reactor);
}

#[test]
fn test_reactor_busy_while_building() {
    busy_while_building(DataPath::Reactor);
}

#[test]
fn test_reactor_disconnect_aborts_build() {
    disconnect_aborts_build(DataPath::Reactor);
}

#[test]
fn test_reactor_monitor_reports_crossing() {
    monitor_reports_crossing(DataPath::Reactor);
}

#[test]
fn test_reactor_slow_reader_keeps_session() {
    slow_reader_keeps_session(DataPath::Reactor);
}

#[test]
fn test_reactor_overlong_line_disconnects() {
    overlong_line_disconnects(DataPath::Reactor);
}

#[test]
fn test_reactor_closed_connections_are_released() {
    closed_connections_are_released(DataPath::Reactor);
}

// =============================================================================
// LIFECYCLE
// =============================================================================

#[test]
fn test_many_concurrent_clients() {
    let (server, _rx) = start(DataPath::Proactor);
    let addr = server.local_addr();

    let workers: Vec<_> = (0..8)
        .map(|i| {
            thread::spawn(move || {
                let mut c = Client::connect(addr);
                for j in 0..25 {
                    assert_eq!(c.ask(&format!("Newpoint {},{}", i, j)), "OK");
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    assert_eq!(server.store().len(), 200);
    let mut c = Client::connect(addr);
    assert_eq!(c.ask("CH"), "168");
    server.shutdown().unwrap();
}

#[test]
fn test_shutdown_closes_open_connections() {
    let (server, _rx) = start(DataPath::Proactor);
    let mut c = Client::connect(server.local_addr());
    assert_eq!(c.ask("Newgraph 5"), "OK");

    let store = std::sync::Arc::clone(server.store());
    server.shutdown().unwrap();

    let mut rest = String::new();
    let n = c.reader.read_line(&mut rest).unwrap();
    assert_eq!(n, 0, "expected end of stream, got {:?}", rest);
    assert_eq!(store.session_owner(), None);
}

#[test]
fn test_monitor_can_be_disabled() {
    let mut config = config(DataPath::Proactor);
    config.monitor.enabled = false;
    let (tx, rx) = mpsc::channel();
    let server = Server::bind(&config)
        .unwrap()
        .start(Box::new(move |t: Transition| {
            let _ = tx.send(t);
        }))
        .unwrap();

    let mut c = Client::connect(server.local_addr());
    for p in ["0,0", "50,0", "0,50"] {
        assert_eq!(c.ask(&format!("Newpoint {}", p)), "OK");
    }
    assert_eq!(c.ask("CH"), "1250");
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    server.shutdown().unwrap();
}

#[test]
fn test_bind_conflict_is_reported() {
    let (server, _rx) = start(DataPath::Proactor);
    let mut config = config(DataPath::Proactor);
    config.server.port = server.local_addr().port();
    let err = Server::bind(&config).err().unwrap();
    assert!(err.to_string().starts_with("failed to bind 127.0.0.1:"), "{}", err);
    server.shutdown().unwrap();
}
