//! Discord local IPC transport.
//!
//! Frames are `opcode: u32 LE`, `length: u32 LE`, then `length` bytes of
//! JSON. The handshake (opcode 0) must be answered by a `READY` dispatch
//! before commands (opcode 1) are accepted; opcode 2 closes the connection.

use std::future::Future;
use std::io;
#[cfg(unix)]
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{ActivityPayload, PresenceConnector, PresenceTransport};
use crate::error::{Result, WorkspaceError};

const OP_HANDSHAKE: u32 = 0;
const OP_FRAME: u32 = 1;
const OP_CLOSE: u32 = 2;

const RPC_VERSION: u32 = 1;
const MAX_FRAME_LEN: u32 = 64 * 1024;
const PIPE_SLOTS: u32 = 10;

/// How long the peer gets to accept a frame or answer one
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

fn io_error(e: io::Error) -> WorkspaceError {
    WorkspaceError::Presence(e.to_string())
}

pub fn encode_frame(opcode: u32, payload: &Value) -> Vec<u8> {
    let body = payload.to_string();
    let mut frame = Vec::with_capacity(8 + body.len());
    frame.extend_from_slice(&opcode.to_le_bytes());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(body.as_bytes());
    frame
}

async fn write_frame<S>(stream: &mut S, opcode: u32, payload: &Value) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream
        .write_all(&encode_frame(opcode, payload))
        .await
        .map_err(io_error)?;
    stream.flush().await.map_err(io_error)
}

async fn read_frame<S>(stream: &mut S) -> Result<(u32, Value)>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; 8];
    stream.read_exact(&mut header).await.map_err(io_error)?;
    let opcode = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if len > MAX_FRAME_LEN {
        return Err(WorkspaceError::Presence(format!("Frame too large: {} bytes", len)));
    }

    let mut body = vec![0u8; len as usize];
    stream.read_exact(&mut body).await.map_err(io_error)?;
    Ok((opcode, serde_json::from_slice(&body)?))
}

/// Bound one exchange with the peer; a silent peer becomes an error.
async fn within<T, F>(limit: Duration, what: &str, exchange: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, exchange)
        .await
        .map_err(|_| WorkspaceError::Presence(format!("{} timed out after {:?}", what, limit)))?
}

/// Turn an `ERROR` dispatch or a close frame into an error
fn check_reply(opcode: u32, reply: &Value) -> Result<()> {
    if opcode == OP_CLOSE {
        let message = reply["message"].as_str().unwrap_or("connection closed by client");
        return Err(WorkspaceError::Presence(message.to_string()));
    }
    if reply["evt"] == "ERROR" {
        let message = reply["data"]["message"].as_str().unwrap_or("unknown error");
        return Err(WorkspaceError::Presence(message.to_string()));
    }
    Ok(())
}

/// An IPC session over any byte stream that completed the handshake
pub struct IpcTransport<S> {
    stream: S,
    nonce: u64,
    reply_timeout: Duration,
}

impl<S> IpcTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub async fn handshake(stream: S, client_id: &str) -> Result<Self> {
        Self::handshake_within(stream, client_id, REPLY_TIMEOUT).await
    }

    /// Handshake, giving up on a peer that stays silent for `reply_timeout`.
    /// The same limit then applies to every later command.
    pub async fn handshake_within(
        mut stream: S,
        client_id: &str,
        reply_timeout: Duration,
    ) -> Result<Self> {
        let hello = json!({ "v": RPC_VERSION, "client_id": client_id });
        let (opcode, reply) = within(reply_timeout, "Handshake", async {
            write_frame(&mut stream, OP_HANDSHAKE, &hello).await?;
            read_frame(&mut stream).await
        })
        .await?;

        check_reply(opcode, &reply)?;
        if reply["evt"] != "READY" {
            return Err(WorkspaceError::Presence(format!("Unexpected handshake reply: {}", reply)));
        }
        Ok(Self {
            stream,
            nonce: 0,
            reply_timeout,
        })
    }

    fn next_nonce(&mut self) -> String {
        self.nonce += 1;
        format!("{}-{}", std::process::id(), self.nonce)
    }
}

#[async_trait]
impl<S> PresenceTransport for IpcTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn set_activity(&mut self, activity: &ActivityPayload) -> Result<()> {
        let command = json!({
            "cmd": "SET_ACTIVITY",
            "args": { "pid": std::process::id(), "activity": activity },
            "nonce": self.next_nonce(),
        });
        let stream = &mut self.stream;
        let (opcode, reply) = within(self.reply_timeout, "SET_ACTIVITY", async {
            write_frame(stream, OP_FRAME, &command).await?;
            read_frame(stream).await
        })
        .await?;
        check_reply(opcode, &reply)
    }

    async fn close(&mut self) {
        let stream = &mut self.stream;
        let _ = within(self.reply_timeout, "Close", async {
            write_frame(stream, OP_CLOSE, &json!({})).await?;
            stream.shutdown().await.map_err(io_error)
        })
        .await;
    }
}

/// Directories that may hold the `discord-ipc-N` sockets
#[cfg(unix)]
fn socket_dirs() -> Vec<PathBuf> {
    let mut bases: Vec<PathBuf> = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"]
        .iter()
        .filter_map(|var| std::env::var_os(var).map(PathBuf::from))
        .collect();
    bases.push(PathBuf::from("/tmp"));

    let mut dirs = Vec::new();
    for base in bases {
        // Sandboxed installs put the socket one level down
        dirs.push(base.join("app/com.discordapp.Discord"));
        dirs.push(base.join("snap.discord"));
        dirs.push(base);
    }
    dirs
}

/// Connects to a locally running Discord client
#[derive(Debug, Default, Clone)]
pub struct DiscordIpcConnector;

#[cfg(unix)]
#[async_trait]
impl PresenceConnector for DiscordIpcConnector {
    async fn connect(&self, client_id: &str) -> Result<Box<dyn PresenceTransport>> {
        for dir in socket_dirs() {
            for slot in 0..PIPE_SLOTS {
                let path = dir.join(format!("discord-ipc-{}", slot));
                if let Ok(stream) = tokio::net::UnixStream::connect(&path).await {
                    log::debug!("[presence] Connected to {:?}", path);
                    let transport = IpcTransport::handshake(stream, client_id).await?;
                    return Ok(Box::new(transport));
                }
            }
        }
        Err(WorkspaceError::Presence("Discord IPC socket not found".into()))
    }
}

#[cfg(windows)]
#[async_trait]
impl PresenceConnector for DiscordIpcConnector {
    async fn connect(&self, client_id: &str) -> Result<Box<dyn PresenceTransport>> {
        use tokio::net::windows::named_pipe::ClientOptions;

        for slot in 0..PIPE_SLOTS {
            let name = format!(r"\\?\pipe\discord-ipc-{}", slot);
            if let Ok(pipe) = ClientOptions::new().open(&name) {
                let transport = IpcTransport::handshake(pipe, client_id).await?;
                return Ok(Box::new(transport));
            }
        }
        Err(WorkspaceError::Presence("Discord IPC pipe not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::Activity;
    use tokio::io::duplex;

    #[test]
    fn test_encode_frame_layout() {
        let frame = encode_frame(OP_FRAME, &json!({ "a": 1 }));
        assert_eq!(&frame[0..4], &1u32.to_le_bytes());
        assert_eq!(&frame[4..8], &7u32.to_le_bytes());
        assert_eq!(&frame[8..], br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_handshake_and_set_activity() {
        let (client_side, mut server_side) = duplex(4096);

        let server = tokio::spawn(async move {
            let (opcode, hello) = read_frame(&mut server_side).await.unwrap();
            assert_eq!(opcode, OP_HANDSHAKE);
            assert_eq!(hello["client_id"], "1234");
            assert_eq!(hello["v"], 1);
            write_frame(&mut server_side, OP_FRAME, &json!({ "cmd": "DISPATCH", "evt": "READY" }))
                .await
                .unwrap();

            let (opcode, command) = read_frame(&mut server_side).await.unwrap();
            assert_eq!(opcode, OP_FRAME);
            write_frame(&mut server_side, OP_FRAME, &json!({ "cmd": "SET_ACTIVITY", "evt": null }))
                .await
                .unwrap();
            command
        });

        let mut transport = IpcTransport::handshake(client_side, "1234").await.unwrap();
        transport
            .set_activity(&Activity::editing("Plan", 5).to_payload())
            .await
            .unwrap();

        let command = server.await.unwrap();
        assert_eq!(command["cmd"], "SET_ACTIVITY");
        assert_eq!(command["args"]["activity"]["state"], "Editing: Plan");
        assert_eq!(command["args"]["activity"]["instance"], false);
        assert_eq!(command["args"]["activity"]["assets"]["large_image"], "disdian-logo");
        assert!(command["nonce"].is_string());
    }

    #[tokio::test]
    async fn test_error_reply_is_reported() {
        let (client_side, mut server_side) = duplex(4096);

        tokio::spawn(async move {
            let _ = read_frame(&mut server_side).await;
            let _ = write_frame(
                &mut server_side,
                OP_CLOSE,
                &json!({ "code": 4000, "message": "Invalid Client ID" }),
            )
            .await;
        });

        let err = IpcTransport::handshake(client_side, "bad").await.err().unwrap();
        assert!(err.to_string().contains("Invalid Client ID"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_times_out_handshake() {
        let (client_side, mut server_side) = duplex(4096);

        // Reads the hello, then never answers while keeping the stream open
        let server = tokio::spawn(async move {
            let hello = read_frame(&mut server_side).await;
            std::future::pending::<()>().await;
            drop((hello, server_side));
        });

        let err = IpcTransport::handshake(client_side, "1234").await.err().unwrap();
        assert!(err.to_string().contains("timed out"), "{}", err);
        server.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_times_out_set_activity() {
        let (client_side, mut server_side) = duplex(4096);

        let server = tokio::spawn(async move {
            let _ = read_frame(&mut server_side).await;
            write_frame(&mut server_side, OP_FRAME, &json!({ "evt": "READY" }))
                .await
                .unwrap();
            // Swallow the command without replying
            let _ = read_frame(&mut server_side).await;
            std::future::pending::<()>().await;
            drop(server_side);
        });

        let mut transport = IpcTransport::handshake(client_side, "1234").await.unwrap();
        let err = transport
            .set_activity(&Activity::default().to_payload())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"), "{}", err);
        server.abort();
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut client_side, mut server_side) = duplex(64);
        tokio::spawn(async move {
            let mut header = Vec::new();
            header.extend_from_slice(&OP_FRAME.to_le_bytes());
            header.extend_from_slice(&(MAX_FRAME_LEN + 1).to_le_bytes());
            let _ = server_side.write_all(&header).await;
        });
        assert!(read_frame(&mut client_side).await.is_err());
    }
}
