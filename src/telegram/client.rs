//! [`MessagingPort`] over the Telegram Bot API.
//!
//! One connection per request (`Connection: close`), bounded by the
//! configured connect and I/O timeouts, the photo body's upload deadline
//! and the response drain deadline.  The transport is always closed before
//! returning, success or not.

use std::time::Duration;

use heapless::String as HString;
use log::{debug, info, warn};

use crate::app::ports::{InboundMessage, MessagingError, MessagingPort};
use crate::config::FirmwareConfig;
use crate::net::transport::{Endpoint, Transport, TransportError};

use super::api::{self, SendMessage};
use super::http::{self, HttpResponse, JSON_BODY_CAP, UPLOAD_TAIL_CAP, UPLOAD_TAIL_DROP};
use super::multipart::{self, PhotoForm};

/// Telegram Bot API client over any [`Transport`].
pub struct TelegramClient<T: Transport> {
    transport: T,
    host: HString<32>,
    port: u16,
    token: HString<64>,
    chat_id: HString<24>,
    connect_timeout_ms: u32,
    upload_io_timeout_ms: u32,
    upload_deadline: Duration,
    poll_io_timeout_ms: u32,
    response_deadline: Duration,
    chunk_size: usize,
    requests: u32,
}

impl<T: Transport> TelegramClient<T> {
    pub fn new(transport: T, config: &FirmwareConfig) -> Self {
        Self {
            transport,
            host: config.api_host.clone(),
            port: config.api_port,
            token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
            connect_timeout_ms: config.connect_timeout_ms,
            upload_io_timeout_ms: config.upload_io_timeout_ms,
            upload_deadline: Duration::from_millis(u64::from(config.upload_deadline_ms)),
            poll_io_timeout_ms: config.poll_io_timeout_ms,
            response_deadline: Duration::from_millis(u64::from(config.response_deadline_ms)),
            chunk_size: config.upload_chunk_size,
            requests: 0,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn path(&self, method: &str) -> String {
        format!("/bot{}/{}", self.token, method)
    }

    /// Connect, write via `send`, read the response, always close.
    fn exchange(
        &mut self,
        io_timeout_ms: u32,
        tail: (usize, usize),
        send: impl FnOnce(&mut T) -> Result<(), TransportError>,
    ) -> Result<HttpResponse, MessagingError> {
        self.requests = self.requests.wrapping_add(1);
        let endpoint = Endpoint {
            host: &self.host,
            port: self.port,
            connect_timeout_ms: self.connect_timeout_ms,
            io_timeout_ms,
        };
        if let Err(e) = self.transport.connect(&endpoint) {
            warn!("TelegramClient: connect to {} failed: {}", self.host, e);
            self.transport.close();
            return Err(MessagingError::Connect);
        }

        let result = match send(&mut self.transport) {
            Ok(()) => http::read_response(
                &mut self.transport,
                self.response_deadline,
                tail.0,
                tail.1,
            ),
            Err(TransportError::Timeout) => Err(MessagingError::Timeout),
            Err(e) => {
                warn!("TelegramClient: write failed: {}", e);
                Err(MessagingError::Write)
            }
        };
        self.transport.close();
        result
    }

    fn check_ack(resp: &HttpResponse) -> Result<(), MessagingError> {
        if resp.status != 200 {
            debug!(
                "TelegramClient: HTTP {} body tail: {}",
                resp.status,
                String::from_utf8_lossy(resp.body())
            );
            return Err(MessagingError::Http(resp.status));
        }
        if !api::is_acknowledged(&resp.tail) {
            return Err(MessagingError::NotAcknowledged);
        }
        Ok(())
    }
}

impl<T: Transport> MessagingPort for TelegramClient<T> {
    fn send_text(&mut self, text: &str) -> Result<(), MessagingError> {
        let body = serde_json::to_string(&SendMessage {
            chat_id: &self.chat_id,
            text,
        })
        .map_err(|_| MessagingError::Malformed)?;
        let head = http::request_head(
            "POST",
            &self.host,
            &self.path("sendMessage"),
            Some(("application/json", body.len())),
        );

        let resp = self.exchange(
            self.poll_io_timeout_ms,
            (UPLOAD_TAIL_CAP, UPLOAD_TAIL_DROP),
            |t| {
                t.write_all(head.as_bytes())?;
                t.write_all(body.as_bytes())
            },
        )?;
        Self::check_ack(&resp)
    }

    fn send_photo(&mut self, caption: &str, jpeg: &[u8]) -> Result<(), MessagingError> {
        let boundary = multipart::boundary(self.requests);
        let chat_id = self.chat_id.clone();
        let form = PhotoForm {
            chat_id: &chat_id,
            caption,
            boundary: &boundary,
        };
        let head = http::request_head(
            "POST",
            &self.host,
            &self.path("sendPhoto"),
            Some((&form.content_type(), form.content_length(jpeg.len()))),
        );
        let chunk = self.chunk_size;
        let deadline = self.upload_deadline;

        let resp = self.exchange(
            self.upload_io_timeout_ms,
            (UPLOAD_TAIL_CAP, UPLOAD_TAIL_DROP),
            |t| {
                t.write_all(head.as_bytes())?;
                multipart::write_body(t, &form, jpeg, chunk, deadline)
            },
        )?;
        Self::check_ack(&resp)?;
        info!("TelegramClient: photo sent ({} bytes)", jpeg.len());
        Ok(())
    }

    fn poll_one(&mut self, after: u64) -> Result<Option<InboundMessage>, MessagingError> {
        let path = format!(
            "{}?offset={}&limit=1&timeout=1",
            self.path("getUpdates"),
            after.saturating_add(1)
        );
        let head = http::request_head("GET", &self.host, &path, None);

        let resp = self.exchange(
            self.poll_io_timeout_ms,
            (JSON_BODY_CAP, JSON_BODY_CAP),
            |t| t.write_all(head.as_bytes()),
        )?;
        if resp.status != 200 {
            return Err(MessagingError::Http(resp.status));
        }
        if resp.truncated {
            return Err(MessagingError::Malformed);
        }
        let json = resp.json().ok_or(MessagingError::Malformed)?;
        api::parse_updates(json, &self.chat_id)
    }
}
