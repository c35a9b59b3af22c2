use bytes::{Buf, BufMut, BytesMut};
use std::io::Cursor;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{self, Frame};

/// Default cap on how many bytes a single frame may occupy in the read buffer.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

/// Turns the bytes read from a socket into frames and frames back into bytes.
///
/// Partial frames stay in the buffer until the rest of their bytes arrive, so a frame split
/// across several reads decodes the same as one delivered in a single read.
#[derive(Debug)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> FrameCodec {
        FrameCodec { max_frame_size }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = frame::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut cursor = Cursor::new(&src[..]);
        let frame = match Frame::parse(&mut cursor) {
            Ok(frame) => frame,
            Err(frame::Error::Incomplete) => {
                if src.len() > self.max_frame_size {
                    return Err(frame::Error::FrameTooLarge {
                        size: src.len(),
                        limit: self.max_frame_size,
                    });
                }
                // Not enough data to parse a frame.
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let position = cursor.position() as usize;
        if position > self.max_frame_size {
            return Err(frame::Error::FrameTooLarge {
                size: position,
                limit: self.max_frame_size,
            });
        }

        // Remove the parsed frame from the buffer.
        src.advance(position);

        Ok(Some(frame))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = frame::Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_slice(&frame.serialize());
        Ok(())
    }
}
