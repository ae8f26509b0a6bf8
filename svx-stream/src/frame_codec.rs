//! Byte-stream framing (§4.2): prepend `{kind, length_le16}` on egress;
//! on ingress, peek the 3-byte header, wait for the full body, then
//! dispatch. Oversized bodies and unknown kinds are both discarded and
//! the stream keeps going — the underlying transport is assumed
//! reliable, so there is nothing to resynchronize.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::Error;
use crate::frame::{Frame, FrameKind, HEADER_LEN, MAX_BODY_LEN};

#[derive(Debug, Default)]
pub struct FrameCodec;

impl FrameCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.body.len() > MAX_BODY_LEN {
            return Err(Error::protocol(format!(
                "refusing to encode a {}-byte body over the {MAX_BODY_LEN}-byte limit",
                item.body.len()
            )));
        }
        dst.reserve(HEADER_LEN + item.body.len());
        dst.put_u8(item.kind.as_u8());
        dst.put_u16_le(item.body.len() as u16);
        dst.extend_from_slice(&item.body);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.len() < HEADER_LEN {
                return Ok(None);
            }
            let kind_byte = src[0];
            let length = u16::from_le_bytes([src[1], src[2]]) as usize;

            if src.len() < HEADER_LEN + length {
                return Ok(None);
            }

            if length > MAX_BODY_LEN {
                tracing::warn!(length, "discarding oversized frame body");
                src.advance(HEADER_LEN + length);
                continue;
            }

            let kind = match FrameKind::from_u8(kind_byte) {
                Some(k) => k,
                None => {
                    tracing::warn!(kind = kind_byte, "skipping unknown frame kind");
                    src.advance(HEADER_LEN + length);
                    continue;
                }
            };

            src.advance(HEADER_LEN);
            let body = src.split_to(length).to_vec();
            return Ok(Some(Frame::new(kind, body)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_handshake_frame() {
        let frame = Frame::new(FrameKind::Handshake, vec![0xAA, 0xBB]);
        let mut buf = BytesMut::new();
        let mut codec = FrameCodec::new();
        codec.encode(frame.clone(), &mut buf).unwrap();
        let got = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(got, frame);
    }

    #[test]
    fn literal_boundary_scenario_two() {
        // {0x01, 0x02, 0x00, 0xAA, 0xBB}: handshake kind, length 2, body AA BB.
        let mut buf = BytesMut::from(&[0x01u8, 0x02, 0x00, 0xAA, 0xBB][..]);
        let mut codec = FrameCodec::new();
        let got = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(got.kind, FrameKind::Handshake);
        assert_eq!(got.body, vec![0xAA, 0xBB]);
    }

    #[test]
    fn partial_header_waits_for_more_bytes() {
        let mut buf = BytesMut::from(&[0x01u8, 0x02][..]);
        let mut codec = FrameCodec::new();
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn partial_body_waits_for_more_bytes() {
        let mut buf = BytesMut::from(&[0x02u8, 0x05, 0x00, 0x01, 0x02][..]);
        let mut codec = FrameCodec::new();
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn unknown_kind_is_skipped_and_stream_continues() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x99u8, 0x01, 0x00, 0x42]); // unknown kind, discarded
        let good = Frame::new(FrameKind::Control, vec![0xCC]);
        let mut codec = FrameCodec::new();
        codec.encode(good.clone(), &mut buf).unwrap();

        let got = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(got, good);
    }

    #[test]
    fn oversized_body_is_discarded_and_stream_continues() {
        let mut buf = BytesMut::new();
        buf.put_u8(FrameKind::Cipher.as_u8());
        buf.put_u16_le(4096);
        buf.extend_from_slice(&vec![0u8; 4096]);
        let good = Frame::new(FrameKind::Control, vec![0xDD]);
        let mut codec = FrameCodec::new();
        codec.encode(good.clone(), &mut buf).unwrap();

        let got = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(got, good);
    }

    #[test]
    fn encode_rejects_oversized_body() {
        let frame = Frame::new(FrameKind::Plaintext, vec![0u8; MAX_BODY_LEN + 1]);
        let mut buf = BytesMut::new();
        let mut codec = FrameCodec::new();
        assert!(codec.encode(frame, &mut buf).is_err());
    }

    #[test]
    fn multiple_frames_decode_one_by_one() {
        let a = Frame::new(FrameKind::Control, vec![0xCC]);
        let b = Frame::new(FrameKind::Control, vec![0xDD]);
        let mut buf = BytesMut::new();
        let mut codec = FrameCodec::new();
        codec.encode(a.clone(), &mut buf).unwrap();
        codec.encode(b.clone(), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), a);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), b);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }
}
