use std::io;

use crate::{Deserialize, Serialize};

type Header = u32;
const HEADER_SIZE: usize = size_of::<Header>();

const INT_H: Header = 0;
const DOUBLE_H: Header = 1;
const CHAR_H: Header = 2;

/// The element type of a message's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Int,
    Double,
    Char,
}

impl Kind {
    fn header(self) -> Header {
        match self {
            Kind::Int => INT_H,
            Kind::Double => DOUBLE_H,
            Kind::Char => CHAR_H,
        }
    }

    fn from_header(header: Header) -> io::Result<Self> {
        match header {
            INT_H => Ok(Kind::Int),
            DOUBLE_H => Ok(Kind::Double),
            CHAR_H => Ok(Kind::Char),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Received an invalid kind header {other}"),
            )),
        }
    }

    fn elem_size(self) -> usize {
        match self {
            Kind::Int => size_of::<i32>(),
            Kind::Double => size_of::<f64>(),
            Kind::Char => size_of::<u8>(),
        }
    }
}

/// A borrowed outgoing message, written to the wire without copying its buffer.
#[derive(Debug, Clone, Copy)]
pub enum Msg<'a> {
    Int(&'a [i32]),
    Double(&'a [f64]),
    Char(&'a [u8]),
}

impl Msg<'_> {
    pub fn kind(&self) -> Kind {
        match self {
            Msg::Int(_) => Kind::Int,
            Msg::Double(_) => Kind::Double,
            Msg::Char(_) => Kind::Char,
        }
    }
}

impl<'a> Serialize<'a> for Msg<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> Option<&'a [u8]> {
        let header = self.kind().header().to_be_bytes();
        buf.extend_from_slice(&header);

        let bytes: &[u8] = match *self {
            Msg::Int(nums) => bytemuck::cast_slice(nums),
            Msg::Double(nums) => bytemuck::cast_slice(nums),
            Msg::Char(bytes) => bytes,
        };

        Some(bytes)
    }
}

/// An owned incoming message.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Int(Vec<i32>),
    Double(Vec<f64>),
    Char(Vec<u8>),
}

impl Payload {
    pub fn kind(&self) -> Kind {
        match self {
            Payload::Int(_) => Kind::Int,
            Payload::Double(_) => Kind::Double,
            Payload::Char(_) => Kind::Char,
        }
    }

    /// The amount of elements in the buffer.
    pub fn len(&self) -> usize {
        match self {
            Payload::Int(nums) => nums.len(),
            Payload::Double(nums) => nums.len(),
            Payload::Char(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unwraps an integer buffer.
    ///
    /// # Returns
    /// An `InvalidData` error if this payload holds another kind.
    pub fn into_ints(self) -> io::Result<Vec<i32>> {
        match self {
            Payload::Int(nums) => Ok(nums),
            other => Self::unexpected_kind(Kind::Int, other.kind()),
        }
    }

    /// Unwraps a floating point buffer.
    ///
    /// # Returns
    /// An `InvalidData` error if this payload holds another kind.
    pub fn into_doubles(self) -> io::Result<Vec<f64>> {
        match self {
            Payload::Double(nums) => Ok(nums),
            other => Self::unexpected_kind(Kind::Double, other.kind()),
        }
    }

    /// Unwraps a raw byte buffer.
    ///
    /// # Returns
    /// An `InvalidData` error if this payload holds another kind.
    pub fn into_chars(self) -> io::Result<Vec<u8>> {
        match self {
            Payload::Char(bytes) => Ok(bytes),
            other => Self::unexpected_kind(Kind::Char, other.kind()),
        }
    }

    fn unexpected_kind<T>(expected: Kind, got: Kind) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Expected a {expected:?} buffer, got a {got:?} buffer"),
        ))
    }

    fn buf_is_too_small<T>(size: usize) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("The given buffer is too small {size}, must at least be {HEADER_SIZE} bytes"),
        ))
    }
}

impl<'a> Deserialize<'a> for Payload {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Self::buf_is_too_small(buf.len());
        }

        let (kind_buf, rest) = buf.split_at(HEADER_SIZE);

        // SAFETY: We splitted the buffer to be of size `HEADER_SIZE` just above.
        let kind = Kind::from_header(Header::from_be_bytes(kind_buf.try_into().unwrap()))?;

        if rest.len() % kind.elem_size() != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "A {kind:?} buffer of {} bytes is not a whole amount of elements",
                    rest.len()
                ),
            ));
        }

        // The frame buffer carries no alignment guarantees, so the elements are copied out.
        let payload = match kind {
            Kind::Int => Payload::Int(bytemuck::pod_collect_to_vec(rest)),
            Kind::Double => Payload::Double(bytemuck::pod_collect_to_vec(rest)),
            Kind::Char => Payload::Char(rest.to_vec()),
        };

        Ok(payload)
    }
}
