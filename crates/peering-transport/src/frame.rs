use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::TransportError;

/// Size of every length prefix on the wire.
const PREFIX: usize = 4;

/// A multi-part message: an ordered list of opaque byte parts.
///
/// A frame may legitimately carry zero parts; interpreting the parts is
/// the job of the layer above.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    parts: Vec<Bytes>,
}

impl Frame {
    /// An empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame from parts, in order.
    pub fn from_parts<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Bytes>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Append a part.
    pub fn push(&mut self, part: impl Into<Bytes>) {
        self.parts.push(part.into());
    }

    /// Prepend a part.
    pub fn push_front(&mut self, part: impl Into<Bytes>) {
        self.parts.insert(0, part.into());
    }

    pub fn parts(&self) -> &[Bytes] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<Bytes> {
        self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Number of bytes this frame occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        PREFIX + self.parts.iter().map(|p| PREFIX + p.len()).sum::<usize>()
    }
}

/// Length-prefixed codec for [`Frame`]s.
///
/// Wire layout: `u32` BE part count, then per part a `u32` BE length
/// followed by the part bytes.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    fn check_size(&self, size: usize) -> Result<(), TransportError> {
        if size > self.max_frame_size {
            return Err(TransportError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }
        Ok(())
    }
}

fn read_u32(src: &[u8], at: usize) -> usize {
    let mut prefix = [0u8; PREFIX];
    prefix.copy_from_slice(&src[at..at + PREFIX]);
    u32::from_be_bytes(prefix) as usize
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, TransportError> {
        if src.len() < PREFIX {
            return Ok(None);
        }

        let count = read_u32(src, 0);
        self.check_size(PREFIX.saturating_add(count.saturating_mul(PREFIX)))?;

        // Walk the part headers without consuming until the whole frame is buffered.
        let mut end = PREFIX;
        for _ in 0..count {
            if src.len() < end + PREFIX {
                return Ok(None);
            }
            let len = read_u32(src, end);
            end = end + PREFIX + len;
            self.check_size(end)?;
            if src.len() < end {
                src.reserve(end - src.len());
                return Ok(None);
            }
        }

        let mut buf = src.split_to(end);
        buf.advance(PREFIX);
        let mut parts = Vec::with_capacity(count);
        for _ in 0..count {
            let len = buf.get_u32() as usize;
            parts.push(buf.split_to(len).freeze());
        }

        Ok(Some(Frame { parts }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = TransportError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), TransportError> {
        let size = frame.encoded_len();
        self.check_size(size)?;
        if size > u32::MAX as usize {
            return Err(TransportError::FrameTooLarge {
                size,
                max: u32::MAX as usize,
            });
        }

        dst.reserve(size);
        dst.put_u32(frame.parts.len() as u32);
        for part in &frame.parts {
            dst.put_u32(part.len() as u32);
            dst.put_slice(part);
        }
        Ok(())
    }
}
