//! Network adapter pairing the station link with the messaging client.
//!
//! The service takes a single `&mut impl Network`; this is the concrete
//! type behind it.  Every messaging call is refused with
//! [`MessagingError::LinkDown`] while the link is down, so no socket is
//! opened without an IP.

use core::net::Ipv4Addr;

use crate::app::ports::{InboundMessage, LinkPort, MessagingError, MessagingPort};

pub struct Uplink<L, M> {
    link: L,
    messaging: M,
}

impl<L: LinkPort, M: MessagingPort> Uplink<L, M> {
    pub fn new(link: L, messaging: M) -> Self {
        Self { link, messaging }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn messaging(&self) -> &M {
        &self.messaging
    }

    pub fn messaging_mut(&mut self) -> &mut M {
        &mut self.messaging
    }

    fn require_link(&self) -> Result<(), MessagingError> {
        if self.link.is_connected() {
            Ok(())
        } else {
            Err(MessagingError::LinkDown)
        }
    }
}

impl<L: LinkPort, M> LinkPort for Uplink<L, M> {
    fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    fn rssi(&self) -> Option<i8> {
        self.link.rssi()
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        self.link.local_ip()
    }
}

impl<L: LinkPort, M: MessagingPort> MessagingPort for Uplink<L, M> {
    fn send_text(&mut self, text: &str) -> Result<(), MessagingError> {
        self.require_link()?;
        self.messaging.send_text(text)
    }

    fn send_photo(&mut self, caption: &str, jpeg: &[u8]) -> Result<(), MessagingError> {
        self.require_link()?;
        self.messaging.send_photo(caption, jpeg)
    }

    fn poll_one(&mut self, after: u64) -> Result<Option<InboundMessage>, MessagingError> {
        self.require_link()?;
        self.messaging.poll_one(after)
    }
}
