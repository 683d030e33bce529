//! Telegram Bot API client.
//!
//! ```text
//!   MessagingPort ──▶ TelegramClient<T: Transport>
//!                        │
//!                        ├─ http       request head, bounded response reader
//!                        ├─ multipart  streamed sendPhoto body
//!                        └─ api        JSON shapes (getUpdates, sendMessage)
//! ```
//!
//! The client is generic over [`Transport`](crate::net::transport::Transport)
//! so the framing is exercised on the host against scripted transports.

pub mod api;
pub mod client;
pub mod http;
pub mod multipart;

pub use client::TelegramClient;
