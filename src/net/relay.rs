use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::net::channel::{
    ChannelNotice, ChannelPhase, PeerChannel, PeerEvent, RoomDescriptor,
};
use crate::net::NetError;

pub const DEFAULT_RELAY_ADDR: &str = "127.0.0.1:4000";

/// Bounds on the TCP connect and on waiting for the hub's greeting. A hub
/// that accepts the socket but never greets must not stall the game loop.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(3);

/// Commands sent to the relay hub, one JSON object per line.
#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
enum RelayCommand {
    JoinLobby,
    CreateRoom { code: String },
    JoinRoom { code: String },
    LeaveRoom,
    Raise { event: PeerEvent },
}

/// Replies from the relay hub. The first line after connect is `Welcome`.
#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
enum RelayReply {
    Welcome { actor_id: u64 },
    RoomList { rooms: Vec<RoomDescriptor> },
    RoomEntered { descriptor: Option<RoomDescriptor> },
    RoomLeft,
    ActorJoined { actor_id: u64 },
    ActorLeft { actor_id: u64 },
    Event { sender: u64, event: PeerEvent },
    Error { message: String },
}

/// Line-delimited JSON client for the relay hub. A listener thread owns the
/// read half and forwards decoded replies over an mpsc channel; the game
/// thread writes commands directly and drains notices once per frame.
pub struct RelayChannel {
    addr: String,
    stream: Option<TcpStream>,
    inbox: Mutex<Option<Receiver<ChannelNotice>>>,
    self_id: u64,
    phase: ChannelPhase,
}

impl RelayChannel {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            stream: None,
            inbox: Mutex::new(None),
            self_id: 0,
            phase: ChannelPhase::Disconnected,
        }
    }

    /// Dial the hub and wait for its `Welcome` line. Both steps are bounded;
    /// a silent hub fails the handshake instead of hanging the caller.
    fn handshake(&mut self) -> Result<TcpStream, NetError> {
        let addr = self
            .addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| NetError::Protocol(format!("cannot resolve {}", self.addr)))?;
        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
        stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;

        let mut reader = BufReader::new(stream.try_clone()?);
        let mut line = String::new();
        reader.read_line(&mut line)?;
        if line.is_empty() {
            return Err(NetError::Protocol("hub closed before greeting".to_string()));
        }
        match serde_json::from_str::<RelayReply>(line.trim_end())? {
            RelayReply::Welcome { actor_id } => self.self_id = actor_id,
            other => return Err(NetError::Protocol(format!("expected Welcome, got {other:?}"))),
        }

        // Back to blocking reads; the listener thread owns them from here.
        stream.set_read_timeout(None)?;
        Ok(stream)
    }

    fn send_command(&mut self, command: &RelayCommand) -> Result<(), NetError> {
        let stream = self.stream.as_mut().ok_or(NetError::NotConnected)?;
        let mut line = serde_json::to_string(command)?;
        line.push('\n');
        stream.write_all(line.as_bytes())?;
        Ok(())
    }

    fn spawn_listener(&self, stream: TcpStream) {
        let (reader_tx, rx): (Sender<ChannelNotice>, Receiver<ChannelNotice>) = mpsc::channel();
        thread::spawn(move || {
            let reader = BufReader::new(stream);
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if line.is_empty() {
                    continue;
                }
                let notice = match serde_json::from_str::<RelayReply>(&line) {
                    Ok(reply) => translate_reply(reply),
                    Err(err) => ChannelNotice::Fault(format!("bad reply: {err}")),
                };
                if reader_tx.send(notice).is_err() {
                    break;
                }
            }
            let _ = reader_tx.send(ChannelNotice::PhaseChanged(ChannelPhase::Disconnected));
        });
        *self.inbox.lock().unwrap() = Some(rx);
    }
}

fn translate_reply(reply: RelayReply) -> ChannelNotice {
    match reply {
        RelayReply::Welcome { .. } => ChannelNotice::PhaseChanged(ChannelPhase::ConnectedToHub),
        RelayReply::RoomList { rooms } => ChannelNotice::RoomList(rooms),
        RelayReply::RoomEntered { descriptor } => ChannelNotice::RoomEntered { descriptor },
        RelayReply::RoomLeft => ChannelNotice::PhaseChanged(ChannelPhase::InLobby),
        RelayReply::ActorJoined { actor_id } => ChannelNotice::ActorJoined(actor_id),
        RelayReply::ActorLeft { actor_id } => ChannelNotice::ActorLeft(actor_id),
        RelayReply::Event { sender, event } => ChannelNotice::Event { sender, event },
        RelayReply::Error { message } => ChannelNotice::Fault(message),
    }
}

impl PeerChannel for RelayChannel {
    fn connect(&mut self, region: &str) -> Result<(), NetError> {
        if self.stream.is_some() {
            return Ok(());
        }
        self.phase = ChannelPhase::ConnectingToHub;

        match self.handshake() {
            Ok(stream) => {
                self.spawn_listener(stream.try_clone()?);
                self.stream = Some(stream);
                self.phase = ChannelPhase::ConnectedToHub;
                info!(
                    "connected to relay {} (region {region}) as actor {}",
                    self.addr, self.self_id
                );
                Ok(())
            }
            Err(err) => {
                self.phase = ChannelPhase::Disconnected;
                Err(err)
            }
        }
    }

    fn join_lobby(&mut self) -> Result<(), NetError> {
        self.send_command(&RelayCommand::JoinLobby)?;
        self.phase = ChannelPhase::InLobby;
        Ok(())
    }

    fn create_room(&mut self, code: &str) -> Result<(), NetError> {
        self.send_command(&RelayCommand::CreateRoom {
            code: code.to_string(),
        })?;
        self.phase = ChannelPhase::InRoom;
        Ok(())
    }

    fn join_room(&mut self, code: &str) -> Result<(), NetError> {
        self.send_command(&RelayCommand::JoinRoom {
            code: code.to_string(),
        })?;
        self.phase = ChannelPhase::InRoom;
        Ok(())
    }

    fn leave_room(&mut self) -> Result<(), NetError> {
        self.send_command(&RelayCommand::LeaveRoom)?;
        self.phase = ChannelPhase::InLobby;
        Ok(())
    }

    fn raise_event(&mut self, event: &PeerEvent) -> Result<(), NetError> {
        if self.phase != ChannelPhase::InRoom {
            return Err(NetError::NotInRoom);
        }
        self.send_command(&RelayCommand::Raise {
            event: event.clone(),
        })
    }

    fn self_id(&self) -> u64 {
        self.self_id
    }

    fn drain_notices(&mut self) -> Vec<ChannelNotice> {
        let mut notices = Vec::new();
        {
            let guard = self.inbox.lock().unwrap();
            let Some(rx) = guard.as_ref() else {
                return notices;
            };
            while let Ok(notice) = rx.try_recv() {
                notices.push(notice);
            }
        }

        for notice in &notices {
            if let ChannelNotice::PhaseChanged(phase) = notice {
                self.phase = *phase;
            }
        }
        // Drop the dead socket and inbox so the next connect() dials afresh.
        if self.phase == ChannelPhase::Disconnected {
            self.stream = None;
            *self.inbox.lock().unwrap() = None;
        }
        notices
    }
}
