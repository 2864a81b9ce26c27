// error.rs
//
// Copyright (c) 2026  Douglas Lau
//
use crate::chunk::ChunkType;
use std::fmt;
use std::io;

/// Errors encountered while decoding
#[derive(Debug)]
pub enum Error {
    /// A wrapped I/O error.
    Io(io::Error),
    /// PNG signature missing or invalid.
    InvalidSignature,
    /// File ends with an incomplete chunk.
    UnexpectedEndOfFile,
    /// Chunk CRC does not match its payload.
    ChecksumMismatch,
    /// [ImageHeader](chunk/struct.ImageHeader.html) chunk malformed.
    MalformedImageHeader,
    /// First chunk is not an [ImageHeader](chunk/struct.ImageHeader.html).
    MissingImageHeader,
    /// [Palette](chunk/struct.Palette.html) chunk malformed.
    MalformedPalette,
    /// [AnimationControl](chunk/struct.AnimationControl.html) chunk has
    /// invalid length.
    MalformedAnimationControl,
    /// [FrameControl](chunk/struct.FrameControl.html) chunk malformed.
    MalformedFrameControl,
    /// [FrameData](chunk/struct.FrameData.html) chunk too short to hold a
    /// sequence number.
    MalformedFrameData,
    /// No animation control chunk before the first image data chunk.
    MissingAnimationControl,
    /// File contains no image data chunks.
    MissingImageData,
    /// Chunks arranged in invalid sequence.
    InvalidChunkSequence,
    /// Critical chunk with an unrecognized type tag.
    UnknownCriticalChunk(ChunkType),
    /// Frame control / data sequence numbers have a gap or run out of
    /// order.
    CorruptFrameSequence,
    /// Frame rectangle lies outside the canvas.
    InvalidFrameDimensions,
    /// Color type / bit depth combination not allowed.
    UnsupportedColorFormat,
    /// Adam7 interlacing not supported.
    UnsupportedInterlace,
    /// Unknown row filter type.
    UnsupportedFilter(u8),
    /// Color index not present in the palette.
    InvalidColorIndex,
    /// Missing palette for an indexed image.
    MissingColorTable,
    /// Compressed image data invalid or corrupt.
    Inflate,
    /// Image data does not decompress to the expected size.
    IncompleteImageData,
    /// Image larger than specified by
    /// [max_image_sz](struct.Decoder.html#method.max_image_sz).
    TooLargeImage,
    /// Operation not allowed in the current state.
    InvalidState,
    /// Invalid raster dimensions.
    InvalidRasterDimensions,
    /// Handle already closed.
    Closed,
}

/// Flipbook result type
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(fmt),
            _ => fmt::Debug::fmt(self, fmt),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}
