use std::{collections::VecDeque, io};

use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{Deserialize, LEN_TYPE_SIZE, LenType, Payload, TAG_SIZE, Tag};

/// The receiving end handle of the communication.
///
/// Frames are matched by tag: receiving a tag that is not at the front of the stream
/// queues every earlier frame until someone asks for its tag.
pub struct OnoReceiver<R: AsyncRead + Unpin> {
    rx: R,
    bytes: Vec<u8>,
    pending: VecDeque<(Tag, Payload)>,
    eof: bool,
}

impl<R: AsyncRead + Unpin> OnoReceiver<R> {
    /// Creates a new `OnoReceiver` instance.
    ///
    /// # Arguments
    /// * `rx` - The underlying reader.
    pub(super) fn new(rx: R) -> Self {
        Self {
            rx,
            bytes: Vec::new(),
            pending: VecDeque::new(),
            eof: false,
        }
    }

    /// Waits to receive the earliest message sent under `tag`.
    ///
    /// # Arguments
    /// * `tag` - The tag to match.
    ///
    /// # Returns
    /// A result object that returns the message's payload on success or `io::Error` on
    /// failure, `UnexpectedEof` if the stream ends first.
    pub async fn recv(&mut self, tag: Tag) -> io::Result<Payload> {
        loop {
            self.drain_frames()?;

            if let Some(payload) = self.take(tag) {
                return Ok(payload);
            }

            if self.eof || self.rx.read_buf(&mut self.bytes).await? == 0 {
                self.eof = true;
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("stream closed while waiting for tag {tag}"),
                ));
            }
        }
    }

    /// Receives an integer buffer under `tag`.
    pub async fn recv_ints(&mut self, tag: Tag) -> io::Result<Vec<i32>> {
        self.recv(tag).await?.into_ints()
    }

    /// Receives a floating point buffer under `tag`.
    pub async fn recv_doubles(&mut self, tag: Tag) -> io::Result<Vec<f64>> {
        self.recv(tag).await?.into_doubles()
    }

    /// Receives a raw byte buffer under `tag`.
    pub async fn recv_chars(&mut self, tag: Tag) -> io::Result<Vec<u8>> {
        self.recv(tag).await?.into_chars()
    }

    /// Checks, without blocking, whether a message with `tag` can be received right away.
    ///
    /// Every byte the underlying reader has ready is consumed and kept, so calling this
    /// never loses a partially arrived frame.
    ///
    /// # Returns
    /// `UnexpectedEof` if the stream is closed and no such message is queued.
    pub fn probe(&mut self, tag: Tag) -> io::Result<bool> {
        while !self.eof {
            match self.rx.read_buf(&mut self.bytes).now_or_never() {
                Some(Ok(0)) => self.eof = true,
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }

        self.drain_frames()?;

        let found = self.pending.iter().any(|(t, _)| *t == tag);
        if !found && self.eof {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream closed while probing for tag {tag}"),
            ));
        }

        Ok(found)
    }

    fn take(&mut self, tag: Tag) -> Option<Payload> {
        let pos = self.pending.iter().position(|(t, _)| *t == tag)?;
        self.pending.remove(pos).map(|(_, payload)| payload)
    }

    fn frame_too_large(len: LenType) -> io::Error {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Received a frame length of {len} bytes, too large to buffer"),
        )
    }

    /// Moves every complete frame in the byte buffer into the pending queue.
    fn drain_frames(&mut self) -> io::Result<()> {
        let mut consumed = 0;

        loop {
            let rest = &self.bytes[consumed..];
            if rest.len() < LEN_TYPE_SIZE {
                break;
            }

            // SAFETY: `rest` is at least `LEN_TYPE_SIZE` bytes long.
            let len = LenType::from_be_bytes(rest[..LEN_TYPE_SIZE].try_into().unwrap());
            let Some(total) = usize::try_from(len)
                .ok()
                .and_then(|len| len.checked_add(LEN_TYPE_SIZE))
            else {
                return Err(Self::frame_too_large(len));
            };

            if rest.len() < total {
                let missing = total - rest.len();
                self.bytes
                    .try_reserve(missing)
                    .map_err(|_| Self::frame_too_large(len))?;
                break;
            }

            let frame = &rest[LEN_TYPE_SIZE..total];
            if frame.len() < TAG_SIZE {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Received a frame of {} bytes, too small to hold a tag", frame.len()),
                ));
            }

            let (tag_buf, body) = frame.split_at(TAG_SIZE);
            // SAFETY: We splitted the frame to be of size `TAG_SIZE` just above.
            let tag = Tag::from_be_bytes(tag_buf.try_into().unwrap());
            let payload = Payload::deserialize(body)?;

            self.pending.push_back((tag, payload));
            consumed += total;
        }

        self.bytes.drain(..consumed);
        Ok(())
    }
}
