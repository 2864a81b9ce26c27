// private.rs
//
// Copyright (c) 2026  Douglas Lau
//
//! Private module for top-level items
use crate::chunk::FrameControl;
use crate::decode;
use crate::error::Result;
use pix::Raster;
use pix::rgb::SRgba8;
use std::io::{BufReader, Read};
use std::time::Duration;

/// One step of an animation.
///
/// Holds an independent snapshot of the canvas after compositing one
/// frame, along with the frame's control data.
pub struct Step {
    /// Composited canvas raster
    raster: Raster<SRgba8>,
    /// Frame control for the step
    control: FrameControl,
}

impl Clone for Step {
    fn clone(&self) -> Self {
        Step {
            raster: Raster::with_raster(&self.raster),
            control: self.control,
        }
    }
}

impl Step {
    /// Create an animation step
    pub(crate) fn new(raster: Raster<SRgba8>, control: FrameControl) -> Self {
        Step { raster, control }
    }

    /// Get the composited raster
    pub fn raster(&self) -> &Raster<SRgba8> {
        &self.raster
    }

    /// Convert into the composited raster
    pub fn into_raster(self) -> Raster<SRgba8> {
        self.raster
    }

    /// Get the frame control for the step
    pub fn control(&self) -> &FrameControl {
        &self.control
    }

    /// Get the delay before the next step should be shown
    pub fn delay(&self) -> Duration {
        self.control.delay()
    }
}

/// APNG file decoder
///
/// Can be converted to one of three `Iterator`s:
/// * [into_iter] / [into_steps] for high-level composited [Step]s
/// * [into_frames] for mid-level [Frame]s
/// * [into_chunks] for low-level [Chunk]s
///
/// ## Example: Decode the steps of an APNG
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let file = std::fs::File::open("walking.png")?;
/// for step in flipbook::Decoder::new(file) {
///     // was there a decoding error?
///     let step = step?;
///     let raster = step.raster();
///     // ... work with raster
/// }
/// # Ok(())
/// # }
/// ```
///
/// [Chunk]: chunk/enum.Chunk.html
/// [Frame]: chunk/struct.Frame.html
/// [into_chunks]: struct.Decoder.html#method.into_chunks
/// [into_frames]: struct.Decoder.html#method.into_frames
/// [into_iter]: struct.Decoder.html#method.into_iter
/// [into_steps]: struct.Decoder.html#method.into_steps
/// [Step]: struct.Step.html
pub struct Decoder<R: Read> {
    /// Reader for input data
    reader: R,
    /// Maximum image size, in bytes
    max_image_sz: Option<usize>,
}

impl<R: Read> Decoder<BufReader<R>> {
    /// Create a new buffered APNG decoder.
    pub fn new(reader: R) -> Self {
        Self::new_unbuffered(BufReader::new(reader))
    }
}

impl<R: Read> Decoder<R> {
    /// Create a new unbuffered APNG decoder.
    pub fn new_unbuffered(reader: R) -> Self {
        Decoder {
            reader,
            max_image_sz: Some(1 << 25),
        }
    }

    /// Set the maximum image size (in bytes) to allow for decoding.
    pub fn max_image_sz(mut self, max_image_sz: Option<usize>) -> Self {
        self.max_image_sz = max_image_sz;
        self
    }

    /// Convert into a chunk `Iterator`.
    pub fn into_chunks(self) -> decode::Chunks<R> {
        decode::Chunks::new(self.reader, self.max_image_sz)
    }

    /// Convert into a frame `Iterator`.
    pub fn into_frames(self) -> decode::Frames<R> {
        decode::Frames::new(self.into_chunks())
    }

    /// Convert into a step `Iterator`.
    pub fn into_steps(self) -> decode::Steps<R> {
        decode::Steps::new(self.into_frames())
    }
}

impl<R: Read> IntoIterator for Decoder<R> {
    type Item = Result<Step>;
    type IntoIter = decode::Steps<R>;

    /// Convert into a step `Iterator`
    fn into_iter(self) -> Self::IntoIter {
        self.into_steps()
    }
}
