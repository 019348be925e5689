use thiserror::Error;

pub mod channel;
pub mod local;
pub mod relay;
pub mod sync;

#[derive(Error, Debug)]
pub enum NetError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("not connected to the hub")]
    NotConnected,
    #[error("not in a room")]
    NotInRoom,
    #[error("protocol violation: {0}")]
    Protocol(String),
    #[error("room {0} is full")]
    RoomFull(String),
}
