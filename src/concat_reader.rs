//! Splices a set of independently Snappy-compressed frames into a single
//! logical stream, without decompressing or recompressing any of them.
//!
//! Each frame, produced by [`snap::raw::Encoder`], already carries its own
//! uvarint-encoded decoded-length header and a self-contained sequence of
//! back-reference copies that only ever point at bytes the frame itself
//! already emitted. That means frame bodies can be concatenated verbatim;
//! only the length header needs to change, to the sum of the frames'
//! individual decoded lengths.

use std::io;

use bytes::{Buf, Bytes, BytesMut};
use prost::encoding::{decode_varint, encode_varint};

#[derive(Debug, thiserror::Error)]
pub enum ConcatReaderError {
    #[error("frame {0} has no valid uvarint length header")]
    InvalidFrame(usize),
    #[error("combined frame length overflows u64")]
    Overflow,
}

/// Pull-style reader over the concatenation of `frames`' bodies, prefixed
/// by one recomputed uvarint length header.
pub struct ConcatFramedReader {
    header: Bytes,
    header_emitted: bool,
    bodies: std::collections::VecDeque<Bytes>,
}

impl ConcatFramedReader {
    pub fn new(frames: Vec<Bytes>) -> Result<Self, ConcatReaderError> {
        let mut total: u64 = 0;
        let mut bodies = std::collections::VecDeque::with_capacity(frames.len());
        for (i, mut frame) in frames.into_iter().enumerate() {
            let decoded_len =
                decode_varint(&mut frame).map_err(|_| ConcatReaderError::InvalidFrame(i))?;
            total = total.checked_add(decoded_len).ok_or(ConcatReaderError::Overflow)?;
            bodies.push_back(frame);
        }
        let mut header = BytesMut::new();
        encode_varint(total, &mut header);
        Ok(Self { header: header.freeze(), header_emitted: false, bodies })
    }

    pub fn total_decoded_len(&self) -> u64 {
        // recomputable cheaply, but cached on the header instead to avoid
        // re-decoding; kept simple since callers rarely need it mid-stream.
        let mut buf = self.header.clone();
        decode_varint(&mut buf).unwrap_or(0)
    }

    pub fn is_eof(&self) -> bool {
        self.header_emitted && self.bodies.is_empty()
    }
}

impl io::Read for ConcatFramedReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        let mut written = 0;

        if !self.header_emitted {
            if out.len() < self.header.len() {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "buffer too small for concatenated frame header",
                ));
            }
            out[..self.header.len()].copy_from_slice(&self.header);
            written += self.header.len();
            self.header_emitted = true;
        }

        while written < out.len() {
            let Some(front) = self.bodies.front_mut() else { break };
            if front.is_empty() {
                self.bodies.pop_front();
                continue;
            }
            let take = front.len().min(out.len() - written);
            out[written..written + take].copy_from_slice(&front[..take]);
            front.advance(take);
            written += take;
            if front.is_empty() {
                self.bodies.pop_front();
            }
        }

        Ok(written)
    }
}
