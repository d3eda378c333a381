//! One viewer session: handshake, then a reader loop and a writer task.
//!
//! ```text
//! viewer ──▶ read half ──▶ decode ──▶ key/pointer ──▶ RemoteDisplayServer
//!                            │
//!                            └─ SetPixelFormat / UpdateRequest ──▶ mpsc ──┐
//!                                                                         ▼
//! viewer ◀── write half ◀── encode_region ◀── SharedFramebuffer ◀── writer task
//!                                               (watch: generation)
//! ```
//!
//! Non-incremental update requests are answered at once.  Incremental ones
//! are answered as soon as the framebuffer has been published since the
//! last update this viewer received.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinError;
use tracing::{debug, info, trace};
use vnc_core::protocol::{
    decode_client_message, encode_protocol_version, encode_raw_update, encode_region,
    encode_server_init, encoding, parse_protocol_version, security, validate_pixel_format,
    ClientMessage, PixelFormat, ProtocolError, ProtocolVersion, Rectangle, ServerInit,
    PROTOCOL_VERSION_LEN,
};
use vnc_core::ClientHandle;

use super::RfbError;
use crate::application::frame_capture::SharedFramebuffer;
use crate::application::remote_display::RemoteDisplayServer;

const READ_CHUNK: usize = 4096;
const WRITER_QUEUE: usize = 32;

/// Instructions from the reader to the writer task.
#[derive(Debug)]
enum WriterCommand {
    SetPixelFormat(PixelFormat),
    UpdateRequest { incremental: bool, region: Rectangle },
}

/// Runs a viewer session to completion.
///
/// The session is registered with `display` after the handshake and always
/// unregistered before returning.
///
/// # Errors
///
/// Returns [`RfbError`] on I/O failure, malformed client data, or an
/// unsupported security choice.  A clean viewer disconnect is `Ok(())`.
pub async fn run_session<S>(stream: S, display: Arc<RemoteDisplayServer>) -> Result<(), RfbError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let version = handshake(&mut reader, &mut writer, &display).await?;

    let handle = display.on_client_connected();
    info!(client = %handle, ?version, "RFB session established");
    let result = serve_client(reader, writer, handle, &display).await;
    display.on_client_disconnected(handle);
    result
}

// ── Handshake ─────────────────────────────────────────────────────────────────

async fn handshake<R, W>(reader: &mut R, writer: &mut W, display: &RemoteDisplayServer) -> Result<ProtocolVersion, RfbError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encode_protocol_version(ProtocolVersion::V3_8)).await?;
    let mut raw = [0u8; PROTOCOL_VERSION_LEN];
    reader.read_exact(&mut raw).await?;
    let version = parse_protocol_version(&raw)?;

    if version == ProtocolVersion::V3_3 {
        // 3.3: the server decides, no SecurityResult for None.
        writer.write_all(&u32::from(security::NONE).to_be_bytes()).await?;
    } else {
        writer.write_all(&[1, security::NONE]).await?;
        let mut chosen = [0u8; 1];
        reader.read_exact(&mut chosen).await?;
        if chosen[0] != security::NONE {
            if version == ProtocolVersion::V3_8 {
                let reason = b"only security type None is supported";
                writer.write_all(&1u32.to_be_bytes()).await?;
                writer.write_all(&(reason.len() as u32).to_be_bytes()).await?;
                writer.write_all(reason).await?;
            }
            return Err(RfbError::UnsupportedSecurity(chosen[0]));
        }
        if version == ProtocolVersion::V3_8 {
            writer.write_all(&security::RESULT_OK.to_be_bytes()).await?;
        }
    }

    // ClientInit: the shared flag is ignored, every session shares the display.
    let mut shared = [0u8; 1];
    reader.read_exact(&mut shared).await?;

    let fb = display.framebuffer();
    let init = ServerInit {
        width: fb.width(),
        height: fb.height(),
        pixel_format: PixelFormat::rgba8888(),
        name: display.desktop_name().to_string(),
    };
    writer.write_all(&encode_server_init(&init)).await?;
    writer.flush().await?;
    Ok(version)
}

// ── Session body ──────────────────────────────────────────────────────────────

async fn serve_client<R, W>(
    reader: R,
    writer: W,
    handle: ClientHandle,
    display: &RemoteDisplayServer,
) -> Result<(), RfbError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (commands, queue) = mpsc::channel(WRITER_QUEUE);
    let mut writer_task = tokio::spawn(write_updates(writer, queue, Arc::clone(display.framebuffer())));

    let read_result = tokio::select! {
        result = read_messages(reader, handle, display, commands) => result,
        joined = &mut writer_task => return flatten(joined),
    };

    // The reader dropped its sender, so the writer drains and exits.
    let write_result = flatten(writer_task.await);
    read_result.and(write_result)
}

fn flatten(joined: Result<Result<(), RfbError>, JoinError>) -> Result<(), RfbError> {
    joined?
}

async fn read_messages<R>(
    mut reader: R,
    handle: ClientHandle,
    display: &RemoteDisplayServer,
    commands: mpsc::Sender<WriterCommand>,
) -> Result<(), RfbError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        loop {
            let (msg, used) = match decode_client_message(&buf) {
                Ok(decoded) => decoded,
                Err(ProtocolError::InsufficientData { .. }) => break,
                Err(e) => return Err(e.into()),
            };
            buf.drain(..used);
            let command = match msg {
                ClientMessage::SetPixelFormat(format) => {
                    validate_pixel_format(&format)?;
                    debug!(client = %handle, ?format, "pixel format set");
                    WriterCommand::SetPixelFormat(format)
                }
                ClientMessage::FramebufferUpdateRequest {
                    incremental,
                    region,
                } => WriterCommand::UpdateRequest {
                    incremental,
                    region,
                },
                ClientMessage::SetEncodings(encodings) => {
                    if !encodings.contains(&encoding::RAW) {
                        debug!(client = %handle, "viewer did not list raw encoding; sending raw anyway");
                    }
                    debug!(client = %handle, ?encodings, "encodings set");
                    continue;
                }
                ClientMessage::KeyEvent { down, keysym } => {
                    display.on_key_event(handle, down, keysym);
                    continue;
                }
                ClientMessage::PointerEvent { button_mask, x, y } => {
                    display.on_pointer_event(handle, button_mask, x, y);
                    continue;
                }
                ClientMessage::ClientCutText(text) => {
                    debug!(client = %handle, len = text.len(), "ignoring client cut text");
                    continue;
                }
            };
            if commands.send(command).await.is_err() {
                // Writer is gone; its own result explains why.
                return Ok(());
            }
        }

        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            debug!(client = %handle, "viewer closed connection");
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

async fn write_updates<W>(
    mut writer: W,
    mut commands: mpsc::Receiver<WriterCommand>,
    framebuffer: Arc<SharedFramebuffer>,
) -> Result<(), RfbError>
where
    W: AsyncWrite + Unpin,
{
    let mut frames = framebuffer.subscribe();
    let mut format = PixelFormat::rgba8888();
    let mut pending: Option<Rectangle> = None;
    let mut dirty = false;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                None => return Ok(()),
                Some(WriterCommand::SetPixelFormat(f)) => format = f,
                Some(WriterCommand::UpdateRequest { incremental, region }) => {
                    if !incremental || dirty {
                        let region = union(pending.take(), region);
                        send_update(&mut writer, &framebuffer, &mut frames, region, &format).await?;
                        dirty = false;
                    } else {
                        pending = Some(union(pending, region));
                    }
                }
            },
            changed = frames.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                match pending.take() {
                    Some(region) => {
                        send_update(&mut writer, &framebuffer, &mut frames, region, &format).await?;
                        dirty = false;
                    }
                    None => {
                        frames.borrow_and_update();
                        dirty = true;
                    }
                }
            }
        }
    }
}

async fn send_update<W>(
    writer: &mut W,
    framebuffer: &SharedFramebuffer,
    frames: &mut watch::Receiver<u64>,
    region: Rectangle,
    format: &PixelFormat,
) -> Result<(), RfbError>
where
    W: AsyncWrite + Unpin,
{
    // Mark seen before reading so a publish during the send triggers another.
    let generation = *frames.borrow_and_update();
    let Some(region) = region.clip(framebuffer.width(), framebuffer.height()) else {
        debug!(?region, "update request outside framebuffer");
        return Ok(());
    };
    let message = {
        let pixels = framebuffer.read();
        encode_raw_update(region, &encode_region(&pixels, framebuffer.width(), region, format))
    };
    writer.write_all(&message).await?;
    writer.flush().await?;
    trace!(generation, bytes = message.len(), "update sent");
    Ok(())
}

/// Bounding box of two regions.
fn union(a: Option<Rectangle>, b: Rectangle) -> Rectangle {
    let Some(a) = a else { return b };
    let left = a.x.min(b.x);
    let top = a.y.min(b.y);
    let right = (u32::from(a.x) + u32::from(a.width)).max(u32::from(b.x) + u32::from(b.width));
    let bottom = (u32::from(a.y) + u32::from(a.height)).max(u32::from(b.y) + u32::from(b.height));
    Rectangle {
        x: left,
        y: top,
        width: (right - u32::from(left)).min(u32::from(u16::MAX)) as u16,
        height: (bottom - u32::from(top)).min(u32::from(u16::MAX)) as u16,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
