use std::result::Result;

use bytes::{BufMut, BytesMut};
use tokio::net::UdpSocket;
use tokio_util::codec::{Decoder, Encoder};
use tokio_util::udp::UdpFramed;

use super::SessionError;
use crate::message::Envelope;

pub type MessageProtocol = UdpFramed<MessageCodec, UdpSocket>;

/// One JSON-encoded message per datagram, no framing beyond the datagram
/// boundary itself.
#[derive(Debug, Default)]
pub struct MessageCodec;

impl MessageCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for MessageCodec {
    type Item = Envelope;
    type Error = SessionError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if buf.is_empty() {
            return Ok(None);
        }
        // Take the whole datagram off the buffer before parsing, so a bad
        // message is consumed instead of decoded again on the next poll
        let bytes = buf.split_to(buf.len());
        let envelope = serde_json::from_slice(&bytes)?;
        Ok(Some(envelope))
    }
}

impl Encoder<Envelope> for MessageCodec {
    type Error = SessionError;

    fn encode(&mut self, message: Envelope, buf: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes = serde_json::to_vec(&message)?;
        buf.reserve(bytes.len());
        buf.put_slice(&bytes);
        Ok(())
    }
}
