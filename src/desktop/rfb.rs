//! Minimal RFB (VNC) client: handshake, input events and raw frame capture.
//!
//! Supports protocol versions 3.3, 3.7 and 3.8 with security types None and
//! VNC authentication. Only the Raw encoding is requested, so every frame
//! update arrives as plain pixels in the format we ask for.

use super::keys::{keysym_for_char, keysym_for_name};
use super::{DesktopConnector, DesktopSession, Frame, Locator, MouseButton};
use crate::error::DesktopError;
use async_trait::async_trait;
use des::cipher::generic_array::GenericArray;
use des::cipher::{BlockEncrypt, KeyInit};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

const SECURITY_NONE: u8 = 1;
const SECURITY_VNC_AUTH: u8 = 2;

const ENCODING_RAW: i32 = 0;
const ENCODING_DESKTOP_SIZE: i32 = -223;

const MSG_SET_PIXEL_FORMAT: u8 = 0;
const MSG_SET_ENCODINGS: u8 = 2;
const MSG_FRAMEBUFFER_UPDATE_REQUEST: u8 = 3;
const MSG_KEY_EVENT: u8 = 4;
const MSG_POINTER_EVENT: u8 = 5;

const BYTES_PER_PIXEL: usize = 4;
/// Full-update requests sent per screenshot before giving up on pixel data.
const MAX_UPDATE_ROUNDS: usize = 3;
/// Upper bound for server-sent strings (reasons, names, cut text).
const MAX_STRING_LEN: u32 = 1 << 20;

/// 32bpp, depth 24, little-endian true colour with red in the lowest byte.
const PIXEL_FORMAT: [u8; 16] = [
    32, 24, 0, 1, // bpp, depth, big-endian, true-colour
    0, 255, 0, 255, 0, 255, // red/green/blue max
    0, 8, 16, // red/green/blue shift
    0, 0, 0, // padding
];

/// Opens RFB sessions over TCP.
pub struct RfbConnector {
    connect_timeout: Duration,
}

impl RfbConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl DesktopConnector for RfbConnector {
    async fn connect(&self, locator: &Locator) -> Result<Box<dyn DesktopSession>, DesktopError> {
        let addr = (locator.host.as_str(), locator.port);
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| DesktopError::Timeout)??;
        stream.set_nodelay(true)?;

        let password = locator.password.as_deref().map(str::as_bytes);
        let session = tokio::time::timeout(
            self.connect_timeout,
            RfbSession::handshake(stream, password),
        )
        .await
        .map_err(|_| DesktopError::Timeout)??;
        info!(
            target_addr = %locator,
            width = session.width,
            height = session.height,
            desktop = %session.desktop_name,
            "rfb session established"
        );
        Ok(Box::new(session))
    }
}

/// One live RFB connection.
pub struct RfbSession<S = TcpStream> {
    stream: S,
    width: u16,
    height: u16,
    desktop_name: String,
    /// Last known frame, tightly packed RGBX.
    framebuffer: Vec<u8>,
    pointer: (u16, u16),
}

impl<S> RfbSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Run the client side of the RFB handshake over an open stream.
    pub async fn handshake(mut stream: S, password: Option<&[u8]>) -> Result<Self, DesktopError> {
        let mut version = [0u8; 12];
        stream.read_exact(&mut version).await?;
        let minor = negotiate_minor(&version)?;
        stream
            .write_all(format!("RFB 003.{minor:03}\n").as_bytes())
            .await?;
        debug!(minor, "rfb version negotiated");

        let security = if minor == 3 {
            let chosen = stream.read_u32().await?;
            if chosen == 0 {
                let reason = read_string(&mut stream).await?;
                return Err(DesktopError::Protocol(format!("server refused: {reason}")));
            }
            u8::try_from(chosen)
                .map_err(|_| DesktopError::Protocol(format!("unsupported security type {chosen}")))?
        } else {
            let count = stream.read_u8().await?;
            if count == 0 {
                let reason = read_string(&mut stream).await?;
                return Err(DesktopError::Protocol(format!("server refused: {reason}")));
            }
            let mut offered = vec![0u8; usize::from(count)];
            stream.read_exact(&mut offered).await?;
            let chosen = choose_security(&offered, password.is_some())?;
            stream.write_u8(chosen).await?;
            chosen
        };

        match security {
            SECURITY_NONE => {}
            SECURITY_VNC_AUTH => {
                let mut challenge = [0u8; 16];
                stream.read_exact(&mut challenge).await?;
                let response = vnc_auth_response(password.unwrap_or_default(), &challenge);
                stream.write_all(&response).await?;
            }
            other => {
                return Err(DesktopError::Protocol(format!(
                    "unsupported security type {other}"
                )))
            }
        }

        // 3.3 and 3.7 only send a result after VNC authentication.
        if minor >= 8 || security == SECURITY_VNC_AUTH {
            let status = stream.read_u32().await?;
            if status != 0 {
                let reason = if minor >= 8 {
                    read_string(&mut stream).await.unwrap_or_default()
                } else {
                    String::new()
                };
                let reason = if reason.is_empty() {
                    "server rejected credentials".to_string()
                } else {
                    reason
                };
                return Err(DesktopError::AuthFailed(reason));
            }
        }

        // ClientInit: request a shared session.
        stream.write_u8(1).await?;

        let width = stream.read_u16().await?;
        let height = stream.read_u16().await?;
        let mut server_format = [0u8; 16];
        stream.read_exact(&mut server_format).await?;
        let desktop_name = read_string(&mut stream).await?;

        let mut setup = Vec::with_capacity(20 + 12);
        setup.extend_from_slice(&[MSG_SET_PIXEL_FORMAT, 0, 0, 0]);
        setup.extend_from_slice(&PIXEL_FORMAT);
        setup.extend_from_slice(&[MSG_SET_ENCODINGS, 0]);
        setup.extend_from_slice(&2u16.to_be_bytes());
        setup.extend_from_slice(&ENCODING_RAW.to_be_bytes());
        setup.extend_from_slice(&ENCODING_DESKTOP_SIZE.to_be_bytes());
        stream.write_all(&setup).await?;
        stream.flush().await?;

        Ok(Self {
            stream,
            width,
            height,
            desktop_name,
            framebuffer: vec![0; usize::from(width) * usize::from(height) * BYTES_PER_PIXEL],
            pointer: (0, 0),
        })
    }

    pub fn dimensions(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn desktop_name(&self) -> &str {
        &self.desktop_name
    }

    async fn key_event(&mut self, keysym: u32, down: bool) -> Result<(), DesktopError> {
        let mut msg = [0u8; 8];
        msg[0] = MSG_KEY_EVENT;
        msg[1] = u8::from(down);
        msg[4..].copy_from_slice(&keysym.to_be_bytes());
        self.stream.write_all(&msg).await?;
        Ok(())
    }

    async fn pointer_event(&mut self, mask: u8) -> Result<(), DesktopError> {
        let (x, y) = self.pointer;
        let mut msg = [0u8; 6];
        msg[0] = MSG_POINTER_EVENT;
        msg[1] = mask;
        msg[2..4].copy_from_slice(&x.to_be_bytes());
        msg[4..6].copy_from_slice(&y.to_be_bytes());
        self.stream.write_all(&msg).await?;
        Ok(())
    }

    async fn tap(&mut self, keysym: u32) -> Result<(), DesktopError> {
        self.key_event(keysym, true).await?;
        self.key_event(keysym, false).await
    }

    async fn request_full_update(&mut self) -> Result<(), DesktopError> {
        let mut msg = [0u8; 10];
        msg[0] = MSG_FRAMEBUFFER_UPDATE_REQUEST;
        msg[6..8].copy_from_slice(&self.width.to_be_bytes());
        msg[8..10].copy_from_slice(&self.height.to_be_bytes());
        self.stream.write_all(&msg).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read server messages until one framebuffer update has been applied.
    /// Returns whether the update carried pixel data.
    async fn read_until_update(&mut self) -> Result<bool, DesktopError> {
        loop {
            match self.stream.read_u8().await? {
                0 => return self.read_framebuffer_update().await,
                1 => {
                    // SetColourMapEntries: unused with true colour.
                    let mut header = [0u8; 5];
                    self.stream.read_exact(&mut header).await?;
                    let count = u16::from_be_bytes([header[3], header[4]]);
                    self.skip(u64::from(count) * 6).await?;
                }
                2 => debug!("rfb bell"),
                3 => {
                    let mut padding = [0u8; 3];
                    self.stream.read_exact(&mut padding).await?;
                    let len = self.stream.read_u32().await?;
                    self.skip(u64::from(len)).await?;
                }
                other => {
                    return Err(DesktopError::Protocol(format!(
                        "unexpected server message type {other}"
                    )))
                }
            }
        }
    }

    async fn read_framebuffer_update(&mut self) -> Result<bool, DesktopError> {
        let _padding = self.stream.read_u8().await?;
        let rects = self.stream.read_u16().await?;
        let mut painted = false;
        for _ in 0..rects {
            let x = usize::from(self.stream.read_u16().await?);
            let y = usize::from(self.stream.read_u16().await?);
            let w = usize::from(self.stream.read_u16().await?);
            let h = usize::from(self.stream.read_u16().await?);
            let encoding = self.stream.read_i32().await?;
            match encoding {
                ENCODING_RAW => {
                    let mut pixels = vec![0u8; w * h * BYTES_PER_PIXEL];
                    self.stream.read_exact(&mut pixels).await?;
                    self.blit(x, y, w, h, &pixels)?;
                    painted = true;
                }
                ENCODING_DESKTOP_SIZE => {
                    debug!(width = w, height = h, "rfb desktop resized");
                    self.width = w as u16;
                    self.height = h as u16;
                    self.framebuffer = vec![0; w * h * BYTES_PER_PIXEL];
                    painted = false;
                }
                other => {
                    return Err(DesktopError::Protocol(format!(
                        "unsupported rectangle encoding {other}"
                    )))
                }
            }
        }
        Ok(painted)
    }

    fn blit(&mut self, x: usize, y: usize, w: usize, h: usize, pixels: &[u8]) -> Result<(), DesktopError> {
        let fb_width = usize::from(self.width);
        if x + w > fb_width || y + h > usize::from(self.height) {
            return Err(DesktopError::Protocol(format!(
                "rectangle {w}x{h}+{x}+{y} exceeds {}x{} frame",
                self.width, self.height
            )));
        }
        let row_bytes = w * BYTES_PER_PIXEL;
        for row in 0..h {
            let src = &pixels[row * row_bytes..(row + 1) * row_bytes];
            let start = ((y + row) * fb_width + x) * BYTES_PER_PIXEL;
            self.framebuffer[start..start + row_bytes].copy_from_slice(src);
        }
        Ok(())
    }

    async fn skip(&mut self, len: u64) -> Result<(), DesktopError> {
        let copied = tokio::io::copy(&mut (&mut self.stream).take(len), &mut tokio::io::sink()).await?;
        if copied < len {
            return Err(DesktopError::Protocol("connection closed mid-message".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl<S> DesktopSession for RfbSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn move_to(&mut self, x: i64, y: i64) -> Result<(), DesktopError> {
        let to_coord = |v: i64| {
            u16::try_from(v)
                .map_err(|_| DesktopError::Protocol(format!("coordinate {v} outside 0..=65535")))
        };
        self.pointer = (to_coord(x)?, to_coord(y)?);
        self.pointer_event(0).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn click(&mut self, button: MouseButton) -> Result<(), DesktopError> {
        let mask = match button {
            MouseButton::Left => 1,
            MouseButton::Middle => 2,
            MouseButton::Right => 4,
        };
        self.pointer_event(mask).await?;
        self.pointer_event(0).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn write(&mut self, text: &str) -> Result<(), DesktopError> {
        for ch in text.chars() {
            self.tap(keysym_for_char(ch)).await?;
        }
        self.stream.flush().await?;
        Ok(())
    }

    async fn press(&mut self, key: &str) -> Result<(), DesktopError> {
        let keysym = keysym_for_name(key).ok_or_else(|| DesktopError::UnknownKey(key.to_string()))?;
        self.tap(keysym).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn key_down(&mut self, key: &str) -> Result<(), DesktopError> {
        let keysym = keysym_for_name(key).ok_or_else(|| DesktopError::UnknownKey(key.to_string()))?;
        self.key_event(keysym, true).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn key_up(&mut self, key: &str) -> Result<(), DesktopError> {
        let keysym = keysym_for_name(key).ok_or_else(|| DesktopError::UnknownKey(key.to_string()))?;
        self.key_event(keysym, false).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Frame, DesktopError> {
        let mut painted = false;
        for _ in 0..MAX_UPDATE_ROUNDS {
            self.request_full_update().await?;
            if self.read_until_update().await? {
                painted = true;
                break;
            }
            debug!(width = self.width, height = self.height, "update without pixels, requesting again");
        }
        if !painted {
            return Err(DesktopError::Protocol(format!(
                "no pixel data after {MAX_UPDATE_ROUNDS} framebuffer updates"
            )));
        }
        let mut rgba = self.framebuffer.clone();
        for pixel in rgba.chunks_exact_mut(BYTES_PER_PIXEL) {
            pixel[3] = 0xff;
        }
        Ok(Frame {
            width: u32::from(self.width),
            height: u32::from(self.height),
            rgba,
        })
    }

    async fn close(&mut self) -> Result<(), DesktopError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// Pick the highest minor version both sides speak.
fn negotiate_minor(banner: &[u8; 12]) -> Result<u16, DesktopError> {
    let text = std::str::from_utf8(banner)
        .map_err(|_| DesktopError::Protocol("non-ascii protocol version".into()))?;
    let parsed = text
        .strip_prefix("RFB ")
        .and_then(|rest| rest.trim_end().split_once('.'))
        .and_then(|(major, minor)| Some((major.parse::<u16>().ok()?, minor.parse::<u16>().ok()?)));
    match parsed {
        Some((3, minor)) if minor < 7 => Ok(3),
        Some((3, 7)) => Ok(7),
        Some((major, _)) if major >= 3 => Ok(8),
        _ => Err(DesktopError::Protocol(format!(
            "unrecognised protocol version {:?}",
            text.trim_end()
        ))),
    }
}

fn choose_security(offered: &[u8], have_password: bool) -> Result<u8, DesktopError> {
    if have_password && offered.contains(&SECURITY_VNC_AUTH) {
        Ok(SECURITY_VNC_AUTH)
    } else if offered.contains(&SECURITY_NONE) {
        Ok(SECURITY_NONE)
    } else if offered.contains(&SECURITY_VNC_AUTH) {
        Ok(SECURITY_VNC_AUTH)
    } else {
        Err(DesktopError::Protocol(format!(
            "no supported security type in {offered:?}"
        )))
    }
}

/// DES-encrypt the challenge with the password as key (bit-reversed bytes,
/// truncated or zero-padded to 8).
fn vnc_auth_response(password: &[u8], challenge: &[u8; 16]) -> [u8; 16] {
    let mut key = [0u8; 8];
    for (slot, byte) in key.iter_mut().zip(password) {
        *slot = byte.reverse_bits();
    }
    let cipher = des::Des::new(GenericArray::from_slice(&key));
    let mut response = *challenge;
    for block in response.chunks_exact_mut(8) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
    response
}

async fn read_string<R: AsyncRead + Unpin>(stream: &mut R) -> Result<String, DesktopError> {
    let len = stream.read_u32().await?;
    if len > MAX_STRING_LEN {
        return Err(DesktopError::Protocol(format!("string of {len} bytes too long")));
    }
    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
