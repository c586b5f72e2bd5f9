//! In-process ecoNET module simulator
//!
//! Answers read (0x43) and write (0x29) requests over TCP. Behaviour knobs let
//! tests inject wrong sessions, wildcard sessions, line noise and silence.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use econet_protocol::constants::{FUNC_READ, FUNC_WRITE};
use econet_protocol::{Frame, Reassembler};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// How the simulator fills the session field of read responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Echo,
    Wildcard,
    Wrong,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub user: String,
    pub password: String,
    pub id: u16,
    pub value: Vec<u8>,
}

#[derive(Debug)]
struct SimState {
    values: HashMap<u16, Vec<u8>>,
    session_mode: SessionMode,
    noisy: bool,
    silent: bool,
    requests: usize,
    sessions: Vec<u16>,
    writes: Vec<RecordedWrite>,
}

pub struct BoilerSimulator {
    addr: SocketAddr,
    state: Arc<Mutex<SimState>>,
    handle: JoinHandle<()>,
}

impl BoilerSimulator {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(SimState {
            values: HashMap::new(),
            session_mode: SessionMode::Echo,
            noisy: false,
            silent: false,
            requests: 0,
            sessions: Vec::new(),
            writes: Vec::new(),
        }));

        let accept_state = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = Arc::clone(&accept_state);
                tokio::spawn(async move {
                    handle_client(stream, state).await;
                });
            }
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn set_value(&self, id: u16, data: &[u8]) {
        self.state.lock().unwrap().values.insert(id, data.to_vec());
    }

    pub fn set_session_mode(&self, mode: SessionMode) {
        self.state.lock().unwrap().session_mode = mode;
    }

    pub fn set_noisy(&self, noisy: bool) {
        self.state.lock().unwrap().noisy = noisy;
    }

    pub fn set_silent(&self, silent: bool) {
        self.state.lock().unwrap().silent = silent;
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests
    }

    pub fn sessions(&self) -> Vec<u16> {
        self.state.lock().unwrap().sessions.clone()
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.state.lock().unwrap().writes.clone()
    }
}

impl Drop for BoilerSimulator {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_client(mut stream: TcpStream, state: Arc<Mutex<SimState>>) {
    let mut reassembler = Reassembler::new();
    let mut buf = [0u8; 512];

    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        for request in reassembler.push(&buf[..n]) {
            let (reply, noisy) = {
                let mut st = state.lock().unwrap();
                st.requests += 1;
                if st.silent {
                    continue;
                }
                (respond(&mut st, &request), st.noisy)
            };
            let Some(reply) = reply else { continue };

            let mut wire = Vec::new();
            if noisy {
                // garbage, then an unrelated but valid frame, then the answer
                wire.extend_from_slice(&[0x00, 0x16, 0xFF, 0x68, 0x05, 0x00]);
                wire.extend(Frame::new(100, 1, 0x55, vec![0x01, 0x02]).encode().unwrap());
            }
            wire.extend(reply.encode().unwrap());

            if noisy {
                for chunk in wire.chunks(3) {
                    if stream.write_all(chunk).await.is_err() {
                        return;
                    }
                    stream.flush().await.ok();
                    tokio::task::yield_now().await;
                }
            } else if stream.write_all(&wire).await.is_err() {
                return;
            }
        }
    }
}

fn respond(st: &mut SimState, request: &Frame) -> Option<Frame> {
    let reply = |payload: Vec<u8>| {
        Some(Frame::new(
            request.src,
            request.dest,
            Frame::response_function(request.func),
            payload,
        ))
    };

    match request.func {
        FUNC_READ => {
            let p = &request.payload;
            let session = u16::from_le_bytes([p[0], p[1]]);
            let id = u16::from_le_bytes([p[4], p[5]]);
            st.sessions.push(session);
            let data = st.values.get(&id)?.clone();

            let echoed = match st.session_mode {
                SessionMode::Echo => session,
                SessionMode::Wildcard => 0,
                SessionMode::Wrong => session.wrapping_add(7),
            };
            let mut payload = echoed.to_le_bytes().to_vec();
            payload.extend_from_slice(&[0x01, 0x01]);
            payload.extend_from_slice(&id.to_le_bytes());
            payload.push(0x35);
            payload.extend_from_slice(&data);
            reply(payload)
        },
        FUNC_WRITE => {
            let p = &request.payload;
            let mut parts = p.splitn(3, |&b| b == 0);
            let user = String::from_utf8_lossy(parts.next()?).into_owned();
            let password = String::from_utf8_lossy(parts.next()?).into_owned();
            let rest = parts.next()?;
            if rest.len() < 3 || rest[0] != 0x01 {
                return None;
            }
            let id = u16::from_le_bytes([rest[1], rest[2]]);
            let value = rest[3..].to_vec();
            st.values.insert(id, value.clone());
            st.writes.push(RecordedWrite {
                user,
                password,
                id,
                value,
            });
            reply(vec![0x00])
        },
        _ => None,
    }
}
