//! An in-process fake Ignite node: just enough of the handshake and a
//! handful of op-codes to drive the client against real TCP sockets
//! without a JVM. Independent of `ignite_client`'s internal wire modules —
//! a test server speaks the same contract, it doesn't reuse the client's
//! implementation of it.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use ignite_core::{codec, Stream, Value};
use uuid::Uuid;

const OP_HANDSHAKE: u8 = 1;

pub mod op_code {
    pub const RESOURCE_CLOSE: i16 = 0;
    pub const CACHE_GET: i16 = 1000;
    pub const CACHE_PUT: i16 = 1001;
    pub const CACHE_GET_NODE_PARTITIONS: i16 = 1101;
    pub const QUERY_SCAN: i16 = 2000;
    pub const QUERY_SCAN_CURSOR_GET_PAGE: i16 = 2001;
    pub const BINARY_TYPE_PUT: i16 = 3003;
    pub const CLUSTER_GET_STATE: i16 = 5000;
    pub const CLUSTER_CHANGE_STATE: i16 = 5001;
}

/// Mirrors `ignite_client::frame::STATUS_UNKNOWN_BINARY_TYPE`; this test
/// server has no dependency on the client's internals, so the value is
/// duplicated rather than imported.
pub const STATUS_UNKNOWN_BINARY_TYPE: i32 = 2;

/// A page of rows to hand back from a scan cursor, and whether more follow.
pub struct ScanPage {
    pub rows: Vec<(Value, Value)>,
    pub more: bool,
}

/// Canned behavior for one fake node. Shared (`Arc<Mutex<_>>`) between the
/// accept loop and the test that configures it, so a test can assert on
/// what the node saw after the client call returns.
#[derive(Default)]
pub struct Script {
    pub cache: HashMap<i32, Value>,
    pub refuse_connections: bool,
    pub scan_pages: Vec<ScanPage>,
    pub cluster_state: i32,
    pub handshake_version: Option<(i16, i16, i16)>,
    pub requests_seen: Vec<i16>,
    /// When set, `cache_get_node_partitions` reports every partition of
    /// every requested cache as owned by this node, so affinity routing
    /// has something deterministic to route to.
    pub partition_owner: Option<Uuid>,
    pub partition_count: i32,
    /// Simulates a dead node: the connection drops instead of answering
    /// the next request, so a failover dispatch has something to retry.
    pub drop_on_request: bool,
    /// When set, the next `CACHE_PUT` fails with `STATUS_UNKNOWN_BINARY_TYPE`
    /// instead of storing the value, then clears itself so the retry after
    /// `BINARY_TYPE_PUT` succeeds.
    pub reject_next_put_as_unknown_schema: bool,
    pub binary_type_puts_seen: Vec<i32>,
}

pub struct FakeNode {
    pub addr: std::net::SocketAddr,
    pub uuid: Uuid,
    pub script: Arc<Mutex<Script>>,
    handle: Option<JoinHandle<()>>,
}

impl FakeNode {
    /// Binds an ephemeral local port and starts serving connections on a
    /// background thread until the node is dropped.
    pub fn start() -> Self {
        Self::start_with_uuid(Uuid::new_v4())
    }

    pub fn start_with_uuid(uuid: Uuid) -> Self {
        Self::bind("127.0.0.1:0", uuid)
    }

    /// Rebinds a node on a port a prior, now-dropped node used — for tests
    /// that kill a node mid-test and bring it back to prove the client
    /// recovers the same endpoint instead of just failing over elsewhere.
    pub fn restart_on(port: u16) -> Self {
        Self::bind(&format!("127.0.0.1:{port}"), Uuid::new_v4())
    }

    fn bind(addr: &str, uuid: Uuid) -> Self {
        let listener = TcpListener::bind(addr).expect("bind fake node listener");
        let addr = listener.local_addr().unwrap();
        let script = Arc::new(Mutex::new(Script {
            cluster_state: 1,
            ..Script::default()
        }));
        let script_for_thread = script.clone();

        let handle = std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { return };
                if script_for_thread.lock().unwrap().refuse_connections {
                    drop(stream);
                    continue;
                }
                serve_connection(stream, uuid, &script_for_thread);
            }
        });

        Self {
            addr,
            uuid,
            script,
            handle: Some(handle),
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

impl Drop for FakeNode {
    fn drop(&mut self) {
        // Connecting to our own listener unblocks `accept()` so the thread
        // can observe a closed listener and exit; best-effort only, the
        // thread is daemonized for the test process either way.
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.handle.take() {
            drop(handle);
        }
    }
}

fn serve_connection(mut stream: TcpStream, uuid: Uuid, script: &Arc<Mutex<Script>>) {
    if !do_handshake(&mut stream, uuid, script) {
        return;
    }

    loop {
        let Some(body) = read_frame(&mut stream) else { return };
        let mut req = Stream::from_vec(body);
        let Ok(op) = req.read_i16_le() else { return };
        let Ok(query_id) = req.read_i64_le() else { return };
        script.lock().unwrap().requests_seen.push(op);

        if script.lock().unwrap().drop_on_request {
            return;
        }

        let response = handle_request(op, query_id, &mut req, script);
        if stream.write_all(&response).is_err() {
            return;
        }
    }
}

fn do_handshake(stream: &mut TcpStream, uuid: Uuid, script: &Arc<Mutex<Script>>) -> bool {
    let Some(body) = read_frame(stream) else { return false };
    let mut req = Stream::from_vec(body);
    let Ok(op) = req.read_u8() else { return false };
    if op != OP_HANDSHAKE {
        return false;
    }
    let Ok(major) = req.read_i16_le() else { return false };
    let Ok(minor) = req.read_i16_le() else { return false };
    let Ok(patch) = req.read_i16_le() else { return false };

    let mut resp = Stream::new();
    match script.lock().unwrap().handshake_version {
        // Reject the proposed version and steer the client to a known one.
        Some((want_major, want_minor, want_patch)) if (want_major, want_minor, want_patch) != (major, minor, patch) => {
            resp.write_u8(0);
            resp.write_i16_le(want_major);
            resp.write_i16_le(want_minor);
            resp.write_i16_le(want_patch);
            codec::encode(&mut resp, &Value::String("version mismatch".to_owned())).unwrap();
            resp.write_i32_le(1);
        }
        _ => {
            resp.write_u8(1);
            // Feature-flags byte array, present from 1.7.0 onward; the fake
            // node advertises none.
            if (major, minor, patch) >= (1, 7, 0) {
                resp.write_i32_le(0);
            }
            resp.write_bytes(uuid.as_bytes());
        }
    }

    let _ = stream.write_all(&frame(resp.into_vec()));
    true
}

fn handle_request(op: i16, query_id: i64, req: &mut Stream, script: &Arc<Mutex<Script>>) -> Vec<u8> {
    match op {
        op_code::CACHE_GET => {
            let cache_id = req.read_i32_le().unwrap();
            let _flags = req.read_u8().unwrap();
            let _key = codec::decode(req).unwrap();

            let mut resp = Stream::new();
            resp.write_i32_le(0); // topology flags
            let value = script.lock().unwrap().cache.get(&cache_id).cloned().unwrap_or(Value::Null);
            codec::encode(&mut resp, &value).unwrap();
            success(query_id, resp)
        }
        op_code::CACHE_PUT => {
            let cache_id = req.read_i32_le().unwrap();
            let _flags = req.read_u8().unwrap();
            let _key = codec::decode(req).unwrap();
            let value = codec::decode(req).unwrap();

            let mut guard = script.lock().unwrap();
            if guard.reject_next_put_as_unknown_schema {
                guard.reject_next_put_as_unknown_schema = false;
                let mut resp = Stream::new();
                codec::encode(&mut resp, &Value::String("unknown binary type".into())).unwrap();
                return error(query_id, STATUS_UNKNOWN_BINARY_TYPE, resp);
            }
            guard.cache.insert(cache_id, value);
            drop(guard);

            let mut resp = Stream::new();
            resp.write_i32_le(0);
            success(query_id, resp)
        }
        op_code::BINARY_TYPE_PUT => {
            let type_id = req.read_i32_le().unwrap();
            let _type_name = codec::decode(req).unwrap();
            let _affinity_name = codec::decode(req).unwrap();
            let field_count = req.read_i32_le().unwrap();
            for _ in 0..field_count {
                let _name = codec::decode(req).unwrap();
                let _field_id = req.read_i32_le().unwrap();
                let _type_code = req.read_u8().unwrap();
            }
            let schema_count = req.read_i32_le().unwrap();
            for _ in 0..schema_count {
                let _schema_id = req.read_i32_le().unwrap();
                let field_id_count = req.read_i32_le().unwrap();
                for _ in 0..field_id_count {
                    let _ = req.read_i32_le().unwrap();
                }
            }
            script.lock().unwrap().binary_type_puts_seen.push(type_id);
            success(query_id, Stream::new())
        }
        op_code::QUERY_SCAN => {
            let _cache_id = req.read_i32_le().unwrap();
            let _flags = req.read_u8().unwrap();
            let _partition = req.read_i32_le().unwrap();
            let _local = req.read_bool().unwrap();
            let _page_size = req.read_i32_le().unwrap();

            let mut resp = Stream::new();
            resp.write_i64_le(77); // cursor id
            write_page(&mut resp, &mut script.lock().unwrap(), 0);
            success(query_id, resp)
        }
        op_code::QUERY_SCAN_CURSOR_GET_PAGE => {
            let _cursor_id = req.read_i64_le().unwrap();
            let mut guard = script.lock().unwrap();
            let next = guard.requests_seen.iter().filter(|o| **o == op_code::QUERY_SCAN_CURSOR_GET_PAGE).count();
            let mut resp = Stream::new();
            write_page(&mut resp, &mut guard, next);
            success(query_id, resp)
        }
        op_code::RESOURCE_CLOSE => {
            let _resource_id = req.read_i64_le().unwrap();
            success(query_id, Stream::new())
        }
        op_code::CLUSTER_GET_STATE => {
            let mut resp = Stream::new();
            resp.write_i32_le(script.lock().unwrap().cluster_state);
            success(query_id, resp)
        }
        op_code::CLUSTER_CHANGE_STATE => {
            let state = req.read_i32_le().unwrap();
            script.lock().unwrap().cluster_state = state;
            success(query_id, Stream::new())
        }
        op_code::CACHE_GET_NODE_PARTITIONS => {
            let cache_count = req.read_i32_le().unwrap();
            let mut cache_ids = Vec::with_capacity(cache_count.max(0) as usize);
            for _ in 0..cache_count {
                cache_ids.push(req.read_i32_le().unwrap());
            }

            let guard = script.lock().unwrap();
            let mut resp = Stream::new();
            resp.write_i64_le(1); // version.major
            resp.write_i32_le(0); // version.minor

            match guard.partition_owner {
                Some(owner) => {
                    resp.write_i32_le(1); // one group
                    resp.write_i32_le(guard.partition_count); // partition_count
                    resp.write_i32_le(1); // one node
                    resp.write_bytes(owner.as_bytes());
                    resp.write_i32_le(guard.partition_count); // owns every partition
                    for p in 0..guard.partition_count {
                        resp.write_i32_le(p);
                    }
                    resp.write_i32_le(cache_ids.len() as i32);
                    for id in cache_ids {
                        resp.write_i32_le(id);
                        resp.write_i32_le(0); // no affinity key fields
                    }
                }
                None => resp.write_i32_le(0), // zero groups
            }
            success(query_id, resp)
        }
        other => {
            let mut resp = Stream::new();
            codec::encode(&mut resp, &Value::String(format!("fake node: unhandled op {other}"))).unwrap();
            error(query_id, 1, resp)
        }
    }
}

fn write_page(resp: &mut Stream, script: &mut Script, page_index: usize) {
    match script.scan_pages.get(page_index) {
        Some(page) => {
            resp.write_bool(page.more);
            resp.write_i32_le(page.rows.len() as i32);
            for (k, v) in &page.rows {
                codec::encode(resp, k).unwrap();
                codec::encode(resp, v).unwrap();
            }
        }
        None => {
            resp.write_bool(false);
            resp.write_i32_le(0);
        }
    }
}

fn success(query_id: i64, body: Stream) -> Vec<u8> {
    let mut resp = Stream::new();
    resp.write_i64_le(query_id);
    resp.write_i32_le(0);
    resp.write_bytes(body.as_slice());
    frame(resp.into_vec())
}

fn error(query_id: i64, status: i32, message_body: Stream) -> Vec<u8> {
    let mut resp = Stream::new();
    resp.write_i64_le(query_id);
    resp.write_i32_le(status);
    resp.write_bytes(message_body.as_slice());
    frame(resp.into_vec())
}

fn frame(body: Vec<u8>) -> Vec<u8> {
    let mut framed = Vec::with_capacity(4 + body.len());
    framed.extend_from_slice(&(body.len() as i32).to_le_bytes());
    framed.extend_from_slice(&body);
    framed
}

fn read_frame(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).ok()?;
    let len = i32::from_le_bytes(len_buf);
    if len < 0 {
        return None;
    }
    let mut body = vec![0u8; len as usize];
    stream.read_exact(&mut body).ok()?;
    Some(body)
}
