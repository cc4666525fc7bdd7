//! Pass-through codec
//!
//! [`RawCodec`] is what makes the proxy schema-agnostic: both halves of a
//! relayed call (the inbound server side and the outbound client side) use
//! it in place of a protobuf codec, so every message crosses the proxy as
//! an opaque [`Bytes`] frame. Encoding and decoding are identity
//! transforms; the round-trip law `decode(encode(b)) == b` holds for every
//! frame, including the empty one.
//!
//! gRPC framing (the 5-byte length prefix) stays with the transport layer;
//! this codec only ever sees the message body.

use bytes::{Buf, BufMut, Bytes};
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::Status;

/// Identity codec over raw byte frames
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl Codec for RawCodec {
    type Encode = Bytes;
    type Decode = Bytes;
    type Encoder = RawEncoder;
    type Decoder = RawDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        RawEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        RawDecoder
    }
}

/// Writes a frame's bytes to the wire unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct RawEncoder;

impl Encoder for RawEncoder {
    type Item = Bytes;
    type Error = Status;

    fn encode(&mut self, item: Bytes, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        dst.put(item);
        Ok(())
    }
}

/// Takes a framed message's bytes off the wire unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDecoder;

impl Decoder for RawDecoder {
    type Item = Bytes;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        // The transport hands us exactly one message's bytes; take them all.
        let frame = src.copy_to_bytes(src.remaining());
        Ok(Some(frame))
    }
}
