// decode.rs
//
// Copyright (c) 2026  Douglas Lau
//
//! Iterators for decoding chunks, frames and steps
use crate::chunk::*;
use crate::error::{Error, Result};
use crate::filter;
use crate::private::Step;
use crc32fast::Hasher;
use flate2::read::ZlibDecoder;
use log::{debug, warn};
use pix::Raster;
use pix::rgb::SRgba8;
use std::io::{ErrorKind, Read};

/// Read a big-endian `u32` from a buffer
fn be32(buf: &[u8], i: usize) -> u32 {
    u32::from_be_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]])
}

/// Read a big-endian `u16` from a buffer
fn be16(buf: &[u8], i: usize) -> u16 {
    u16::from_be_bytes([buf[i], buf[i + 1]])
}

/// Check whether a PNG byte stream contains an animation.
///
/// Scans chunk headers only, stopping at the animation control chunk or
/// at the first image data chunk, whichever comes first.  No pixel data
/// is touched, so the check is cheap and leaves the slice usable for a
/// full decode afterwards.
pub fn is_animated(bytes: &[u8]) -> bool {
    let mut rest = match bytes.strip_prefix(&SIGNATURE[..]) {
        Some(rest) => rest,
        None => return false,
    };
    loop {
        if rest.len() < 8 {
            return false;
        }
        let sz = u64::from(be32(rest, 0));
        let tag = [rest[4], rest[5], rest[6], rest[7]];
        match &tag {
            b"acTL" => return true,
            b"IDAT" | b"IEND" => return false,
            _ => (),
        }
        let skip = sz + 12;
        if (rest.len() as u64) < skip {
            return false;
        }
        rest = &rest[skip as usize..];
    }
}

/// Chunk `Iterator` for PNG / APNG files.
///
/// Yields every [Chunk] in the file, lazily and in order.  Build with
/// Decoder.[into_chunks].
///
/// [Chunk]: chunk/enum.Chunk.html
/// [into_chunks]: struct.Decoder.html#method.into_chunks
pub struct Chunks<R: Read> {
    /// Reader for input data
    reader: R,
    /// Maximum image size, in bytes
    max_image_sz: Option<usize>,
    /// Signature has been validated
    signature_checked: bool,
    /// Iterator finished flag
    done: bool,
}

impl<R: Read> Iterator for Chunks<R> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let res = self.next_chunk();
        if matches!(res, Ok(Chunk::ImageEnd) | Err(_)) {
            self.done = true;
        }
        Some(res)
    }
}

impl<R: Read> Chunks<R> {
    /// Create a new chunk iterator
    pub(crate) fn new(reader: R, max_image_sz: Option<usize>) -> Self {
        Chunks {
            reader,
            max_image_sz,
            signature_checked: false,
            done: false,
        }
    }

    /// Get the maximum image size, in bytes
    pub(crate) fn max_image_sz(&self) -> Option<usize> {
        self.max_image_sz
    }

    /// Read bytes, treating EOF as a format error
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reader.read_exact(buf).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                Error::UnexpectedEndOfFile
            } else {
                Error::Io(e)
            }
        })
    }

    /// Decode the next chunk
    fn next_chunk(&mut self) -> Result<Chunk> {
        if !self.signature_checked {
            let mut sig = [0u8; 8];
            self.read_exact(&mut sig)?;
            if sig != SIGNATURE {
                return Err(Error::InvalidSignature);
            }
            self.signature_checked = true;
        }
        let mut header = [0u8; 8];
        self.read_exact(&mut header)?;
        let sz = be32(&header, 0) as usize;
        let chunk_type =
            ChunkType([header[4], header[5], header[6], header[7]]);
        if let Some(max) = self.max_image_sz {
            if sz > max {
                return Err(Error::TooLargeImage);
            }
        }
        let mut payload = vec![0; sz];
        self.read_exact(&mut payload)?;
        let mut crc = [0u8; 4];
        self.read_exact(&mut crc)?;
        let mut hasher = Hasher::new();
        hasher.update(&chunk_type.0);
        hasher.update(&payload);
        if hasher.finalize() != u32::from_be_bytes(crc) {
            return Err(Error::ChecksumMismatch);
        }
        debug!("chunk: {:?} {:?}", chunk_type, sz);
        let chunk = Chunk::parse(chunk_type, payload)?;
        if let Chunk::ImageHeader(hdr) = &chunk {
            self.check_image_sz(hdr)?;
        }
        Ok(chunk)
    }

    /// Check canvas size against the maximum image size
    fn check_image_sz(&self, hdr: &ImageHeader) -> Result<()> {
        if let Some(max) = self.max_image_sz {
            let sz = u64::from(hdr.width()) * u64::from(hdr.height()) * 4;
            if sz > max as u64 {
                return Err(Error::TooLargeImage);
            }
        }
        Ok(())
    }
}

impl Chunk {
    /// Parse a chunk from its type tag and payload
    fn parse(chunk_type: ChunkType, payload: Vec<u8>) -> Result<Self> {
        Ok(match chunk_type {
            ChunkType::IMAGE_HEADER => ImageHeader::from_buf(&payload)?.into(),
            ChunkType::PALETTE => Palette::from_buf(payload)?.into(),
            ChunkType::TRANSPARENCY => Transparency::with_data(payload).into(),
            ChunkType::ANIMATION_CONTROL => {
                AnimationControl::from_buf(&payload)?.into()
            }
            ChunkType::FRAME_CONTROL => {
                FrameControl::from_buf(&payload)?.into()
            }
            ChunkType::IMAGE_DATA => ImageData::with_data(payload).into(),
            ChunkType::FRAME_DATA => FrameData::from_buf(payload)?.into(),
            ChunkType::IMAGE_END => Chunk::ImageEnd,
            _ if chunk_type.is_ancillary() => {
                Unknown::new(chunk_type, payload).into()
            }
            _ => return Err(Error::UnknownCriticalChunk(chunk_type)),
        })
    }
}

impl ImageHeader {
    /// Decode an image header chunk from a buffer
    fn from_buf(buf: &[u8]) -> Result<Self> {
        if buf.len() != 13 {
            return Err(Error::MalformedImageHeader);
        }
        let width = be32(buf, 0);
        let height = be32(buf, 4);
        let bit_depth = buf[8];
        let color_type = ColorType::from_u8(buf[9])
            .ok_or(Error::UnsupportedColorFormat)?;
        let compression = buf[10];
        let filter_method = buf[11];
        let interlaced = match buf[12] {
            0 => false,
            1 => true,
            _ => return Err(Error::MalformedImageHeader),
        };
        if width == 0 || height == 0 || compression != 0 || filter_method != 0
        {
            return Err(Error::MalformedImageHeader);
        }
        if !color_type.depth_allowed(bit_depth) {
            return Err(Error::UnsupportedColorFormat);
        }
        Ok(ImageHeader::new(width, height, bit_depth, color_type, interlaced))
    }
}

impl Palette {
    /// Decode a palette chunk from a buffer
    fn from_buf(buf: Vec<u8>) -> Result<Self> {
        let len = buf.len();
        if len == 0 || len > 768 || len % 3 != 0 {
            return Err(Error::MalformedPalette);
        }
        Ok(Palette::with_colors(buf))
    }
}

impl AnimationControl {
    /// Decode an animation control chunk from a buffer
    fn from_buf(buf: &[u8]) -> Result<Self> {
        if buf.len() != 8 {
            return Err(Error::MalformedAnimationControl);
        }
        Ok(AnimationControl::new(be32(buf, 0), be32(buf, 4)))
    }
}

impl FrameControl {
    /// Decode a frame control chunk from a buffer
    fn from_buf(buf: &[u8]) -> Result<Self> {
        if buf.len() != 26 {
            return Err(Error::MalformedFrameControl);
        }
        let sequence_number = be32(buf, 0);
        let width = be32(buf, 4);
        let height = be32(buf, 8);
        let x_offset = be32(buf, 12);
        let y_offset = be32(buf, 16);
        let delay_num = be16(buf, 20);
        let delay_den = be16(buf, 22);
        let dispose_op = match buf[24] {
            0 => DisposeOp::None,
            1 => DisposeOp::Background,
            2 => DisposeOp::Previous,
            _ => return Err(Error::MalformedFrameControl),
        };
        let blend_op = match buf[25] {
            0 => BlendOp::Source,
            1 => BlendOp::Over,
            _ => return Err(Error::MalformedFrameControl),
        };
        if width == 0 || height == 0 {
            return Err(Error::MalformedFrameControl);
        }
        Ok(FrameControl::new(
            sequence_number,
            width,
            height,
            x_offset,
            y_offset,
            delay_num,
            delay_den,
            dispose_op,
            blend_op,
        ))
    }
}

impl FrameData {
    /// Decode a frame data chunk from a buffer
    fn from_buf(mut buf: Vec<u8>) -> Result<Self> {
        if buf.len() < 4 {
            return Err(Error::MalformedFrameData);
        }
        let sequence_number = be32(&buf, 0);
        buf.drain(..4);
        Ok(FrameData::new(sequence_number, buf))
    }
}

/// Preamble chunks at the beginning of a file, before any image data
#[derive(Clone, Debug)]
pub struct Preamble {
    image_header: ImageHeader,
    palette: Option<Palette>,
    transparency: Option<Transparency>,
    animation_control: Option<AnimationControl>,
}

impl Preamble {
    /// Get the image header
    pub fn image_header(&self) -> &ImageHeader {
        &self.image_header
    }

    /// Get the palette, if present
    pub fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    /// Get the transparency data, if present
    pub fn transparency(&self) -> Option<&Transparency> {
        self.transparency.as_ref()
    }

    /// Get the animation control, if present
    ///
    /// `None` means the file is a non-animated PNG.
    pub fn animation_control(&self) -> Option<AnimationControl> {
        self.animation_control
    }
}

/// Frame decoding phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Before any image data
    Preamble,
    /// Collecting default image data
    DefaultImage,
    /// Collecting animation frame data
    AnimationFrames,
    /// After the image end chunk
    End,
}

/// Frame `Iterator` for PNG / APNG files.
///
/// Yields one [Frame] per frame control chunk, paired with the image
/// data belonging to it.  A non-animated PNG yields the default image
/// as a single full-canvas frame.  Build with Decoder.[into_frames].
///
/// [Frame]: chunk/struct.Frame.html
/// [into_frames]: struct.Decoder.html#method.into_frames
pub struct Frames<R: Read> {
    chunks: Chunks<R>,
    phase: Phase,
    image_header: Option<ImageHeader>,
    palette: Option<Palette>,
    transparency: Option<Transparency>,
    animation_control: Option<AnimationControl>,
    preamble: Option<Preamble>,
    /// Control for the frame being collected
    control: Option<FrameControl>,
    /// Compressed data for the frame being collected
    data: Vec<u8>,
    /// Next expected frame sequence number
    sequence: u32,
    /// Number of frames produced
    count: u32,
}

impl<R: Read> Iterator for Frames<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.phase != Phase::End {
            match self.chunks.next() {
                Some(Ok(chunk)) => match self.handle_chunk(chunk) {
                    Ok(Some(frame)) => return Some(Ok(frame)),
                    Ok(None) => (),
                    Err(e) => {
                        self.phase = Phase::End;
                        return Some(Err(e));
                    }
                },
                Some(Err(e)) => {
                    self.phase = Phase::End;
                    return Some(Err(e));
                }
                None => {
                    self.phase = Phase::End;
                    return Some(Err(Error::UnexpectedEndOfFile));
                }
            }
        }
        None
    }
}

impl<R: Read> Frames<R> {
    /// Create a new frame iterator
    pub(crate) fn new(chunks: Chunks<R>) -> Self {
        Frames {
            chunks,
            phase: Phase::Preamble,
            image_header: None,
            palette: None,
            transparency: None,
            animation_control: None,
            preamble: None,
            control: None,
            data: Vec::new(),
            sequence: 0,
            count: 0,
        }
    }

    /// Get the maximum image size, in bytes
    pub(crate) fn max_image_sz(&self) -> Option<usize> {
        self.chunks.max_image_sz()
    }

    /// Read the preamble chunks, before any image data.
    pub fn preamble(&mut self) -> Result<Preamble> {
        loop {
            if let Some(preamble) = &self.preamble {
                return Ok(preamble.clone());
            }
            match self.chunks.next() {
                Some(chunk) => {
                    self.handle_chunk(chunk?)?;
                }
                None => return Err(Error::UnexpectedEndOfFile),
            }
        }
    }

    /// Handle one chunk
    fn handle_chunk(&mut self, chunk: Chunk) -> Result<Option<Frame>> {
        match self.phase {
            Phase::Preamble => self.handle_preamble(chunk),
            Phase::DefaultImage => self.handle_default(chunk),
            Phase::AnimationFrames => self.handle_animation(chunk),
            Phase::End => Ok(None),
        }
    }

    /// Handle a chunk before any image data
    fn handle_preamble(&mut self, chunk: Chunk) -> Result<Option<Frame>> {
        if self.image_header.is_none()
            && !matches!(chunk, Chunk::ImageHeader(_))
        {
            return Err(Error::MissingImageHeader);
        }
        match chunk {
            Chunk::ImageHeader(hdr) => {
                if self.image_header.is_some() {
                    return Err(Error::InvalidChunkSequence);
                }
                self.image_header = Some(hdr);
            }
            Chunk::Palette(palette) => self.palette = Some(palette),
            Chunk::Transparency(trns) => self.transparency = Some(trns),
            Chunk::AnimationControl(ctl) => {
                if self.animation_control.is_none() {
                    self.animation_control = Some(ctl);
                } else {
                    debug!("ignoring duplicate animation control");
                }
            }
            Chunk::FrameControl(ctl) => {
                self.check_sequence(ctl.sequence_number())?;
                self.check_full_canvas(&ctl)?;
                self.control = Some(ctl);
                self.finish_preamble();
                self.phase = Phase::DefaultImage;
            }
            Chunk::ImageData(data) => {
                self.data.extend_from_slice(data.data());
                self.finish_preamble();
                self.phase = Phase::DefaultImage;
            }
            Chunk::FrameData(_) => return Err(Error::InvalidChunkSequence),
            Chunk::ImageEnd => {
                self.phase = Phase::End;
                return Err(Error::MissingImageData);
            }
            Chunk::Unknown(_) => (),
        }
        Ok(None)
    }

    /// Handle a chunk while collecting the default image
    fn handle_default(&mut self, chunk: Chunk) -> Result<Option<Frame>> {
        match chunk {
            Chunk::ImageData(data) => {
                self.data.extend_from_slice(data.data());
                Ok(None)
            }
            Chunk::FrameControl(ctl) => {
                self.check_sequence(ctl.sequence_number())?;
                self.check_bounds(&ctl)?;
                self.phase = Phase::AnimationFrames;
                let frame = self.take_default_frame()?;
                self.control = Some(ctl);
                Ok(frame)
            }
            Chunk::FrameData(_) => Err(Error::InvalidChunkSequence),
            Chunk::ImageEnd => {
                self.phase = Phase::End;
                let frame = self.take_final_default()?;
                Ok(Some(frame))
            }
            Chunk::AnimationControl(_) => {
                debug!("ignoring animation control after image data");
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Handle a chunk while collecting animation frames
    fn handle_animation(&mut self, chunk: Chunk) -> Result<Option<Frame>> {
        match chunk {
            Chunk::FrameData(data) => {
                self.check_sequence(data.sequence_number())?;
                self.data.extend_from_slice(data.data());
                Ok(None)
            }
            Chunk::FrameControl(ctl) => {
                self.check_sequence(ctl.sequence_number())?;
                self.check_bounds(&ctl)?;
                let frame = self.take_frame()?;
                self.control = Some(ctl);
                Ok(Some(frame))
            }
            Chunk::ImageData(_) => Err(Error::InvalidChunkSequence),
            Chunk::ImageEnd => {
                self.phase = Phase::End;
                let frame = self.take_frame()?;
                self.check_frame_count();
                Ok(Some(frame))
            }
            Chunk::AnimationControl(_) => {
                debug!("ignoring animation control after image data");
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Build the preamble once image data begins
    fn finish_preamble(&mut self) {
        if let Some(image_header) = self.image_header {
            self.preamble = Some(Preamble {
                image_header,
                palette: self.palette.clone(),
                transparency: self.transparency.clone(),
                animation_control: self.animation_control,
            });
        }
    }

    /// Check one frame sequence number
    fn check_sequence(&mut self, sequence: u32) -> Result<()> {
        if sequence != self.sequence {
            return Err(Error::CorruptFrameSequence);
        }
        self.sequence += 1;
        Ok(())
    }

    /// Check a frame rectangle against the canvas bounds
    fn check_bounds(&self, ctl: &FrameControl) -> Result<()> {
        let hdr =
            self.image_header.as_ref().ok_or(Error::MissingImageHeader)?;
        let right = u64::from(ctl.x_offset()) + u64::from(ctl.width());
        let bottom = u64::from(ctl.y_offset()) + u64::from(ctl.height());
        if right > u64::from(hdr.width()) || bottom > u64::from(hdr.height())
        {
            return Err(Error::InvalidFrameDimensions);
        }
        Ok(())
    }

    /// Check that a default image frame control covers the whole canvas
    fn check_full_canvas(&self, ctl: &FrameControl) -> Result<()> {
        let hdr =
            self.image_header.as_ref().ok_or(Error::MissingImageHeader)?;
        if ctl.x_offset() != 0
            || ctl.y_offset() != 0
            || ctl.width() != hdr.width()
            || ctl.height() != hdr.height()
        {
            return Err(Error::InvalidFrameDimensions);
        }
        Ok(())
    }

    /// Take the default image frame, if it is part of the animation
    fn take_default_frame(&mut self) -> Result<Option<Frame>> {
        let data = std::mem::take(&mut self.data);
        match self.control.take() {
            Some(control) => {
                if data.is_empty() {
                    return Err(Error::IncompleteImageData);
                }
                self.count += 1;
                Ok(Some(Frame::new(control, data)))
            }
            None => Ok(None),
        }
    }

    /// Take the default image as the only frame
    fn take_final_default(&mut self) -> Result<Frame> {
        let data = std::mem::take(&mut self.data);
        if data.is_empty() {
            return Err(Error::MissingImageData);
        }
        let control = match self.control.take() {
            Some(control) => control,
            None => {
                let hdr = self
                    .image_header
                    .as_ref()
                    .ok_or(Error::MissingImageHeader)?;
                FrameControl::with_full_canvas(hdr.width(), hdr.height())
            }
        };
        self.count += 1;
        self.check_frame_count();
        Ok(Frame::new(control, data))
    }

    /// Take a completed animation frame
    fn take_frame(&mut self) -> Result<Frame> {
        let data = std::mem::take(&mut self.data);
        match self.control.take() {
            Some(control) => {
                if data.is_empty() {
                    return Err(Error::IncompleteImageData);
                }
                self.count += 1;
                Ok(Frame::new(control, data))
            }
            None => Err(Error::InvalidChunkSequence),
        }
    }

    /// Compare the declared frame count with the frames found
    fn check_frame_count(&self) {
        if let Some(ctl) = self.animation_control {
            if ctl.num_frames() != self.count {
                warn!(
                    "animation control declared {} frames, found {}",
                    ctl.num_frames(),
                    self.count
                );
            }
        }
    }
}

/// Decode one frame's compressed image data into an RGBA raster
pub(crate) fn decode_frame(
    preamble: &Preamble,
    control: &FrameControl,
    data: &[u8],
    max_image_sz: Option<usize>,
) -> Result<Raster<SRgba8>> {
    let hdr = preamble.image_header();
    if hdr.interlaced() {
        return Err(Error::UnsupportedInterlace);
    }
    let width = control.width();
    let height = control.height();
    let row_bytes = hdr.bytes_per_row(width);
    let expected = (row_bytes + 1)
        .checked_mul(height as usize)
        .ok_or(Error::TooLargeImage)?;
    if let Some(max) = max_image_sz {
        if expected > max {
            return Err(Error::TooLargeImage);
        }
    }
    let mut raw = Vec::with_capacity(expected);
    ZlibDecoder::new(data)
        .take(expected as u64 + 1)
        .read_to_end(&mut raw)
        .map_err(|_| Error::Inflate)?;
    if raw.len() != expected {
        return Err(Error::IncompleteImageData);
    }
    filter::reconstruct(&mut raw, row_bytes, hdr.filter_bpp())?;
    let rgba =
        expand_rows(preamble, &raw, width as usize, height as usize)?;
    Ok(Raster::with_u8_buffer(width, height, rgba))
}

/// Expand reconstructed rows to 8-bit RGBA samples
fn expand_rows(
    preamble: &Preamble,
    raw: &[u8],
    width: usize,
    height: usize,
) -> Result<Vec<u8>> {
    let hdr = preamble.image_header();
    let row_bytes = hdr.bytes_per_row(width as u32);
    let stride = row_bytes + 1;
    let mut rgba = Vec::with_capacity(width * height * 4);
    for row in 0..height {
        let data = &raw[row * stride + 1..row * stride + 1 + row_bytes];
        expand_row(preamble, data, width, &mut rgba)?;
    }
    Ok(rgba)
}

/// Get one raw sample from a reconstructed row
fn sample(row: &[u8], i: usize, depth: u8) -> u16 {
    match depth {
        16 => u16::from_be_bytes([row[i * 2], row[i * 2 + 1]]),
        8 => u16::from(row[i]),
        _ => {
            let bits = depth as usize;
            let off = i * bits;
            let shift = 8 - bits - (off % 8);
            let mask = (1u16 << bits) - 1;
            (u16::from(row[off / 8]) >> shift) & mask
        }
    }
}

/// Scale a raw sample to an 8-bit value
fn scale_sample(s: u16, depth: u8) -> u8 {
    match depth {
        16 => (s >> 8) as u8,
        8 => s as u8,
        4 => (s * 17) as u8,
        2 => (s * 85) as u8,
        _ => (s * 255) as u8,
    }
}

/// Expand one row of samples to 8-bit RGBA
fn expand_row(
    preamble: &Preamble,
    row: &[u8],
    width: usize,
    rgba: &mut Vec<u8>,
) -> Result<()> {
    let hdr = preamble.image_header();
    let depth = hdr.bit_depth();
    let trns = preamble.transparency();
    match hdr.color_type() {
        ColorType::Indexed => {
            let palette =
                preamble.palette().ok_or(Error::MissingColorTable)?;
            for x in 0..width {
                let i = sample(row, x, depth) as usize;
                let (red, green, blue) =
                    palette.entry(i).ok_or(Error::InvalidColorIndex)?;
                let alpha = trns.map_or(255, |t| t.alpha(i));
                rgba.extend_from_slice(&[red, green, blue, alpha]);
            }
        }
        ColorType::Gray => {
            let key = trns.and_then(|t| t.gray_key());
            for x in 0..width {
                let s = sample(row, x, depth);
                let v = scale_sample(s, depth);
                let alpha = if key == Some(s) { 0 } else { 255 };
                rgba.extend_from_slice(&[v, v, v, alpha]);
            }
        }
        ColorType::GrayAlpha => {
            for x in 0..width {
                let v = scale_sample(sample(row, x * 2, depth), depth);
                let alpha =
                    scale_sample(sample(row, x * 2 + 1, depth), depth);
                rgba.extend_from_slice(&[v, v, v, alpha]);
            }
        }
        ColorType::Rgb => {
            let key = trns.and_then(|t| t.rgb_key());
            for x in 0..width {
                let r = sample(row, x * 3, depth);
                let g = sample(row, x * 3 + 1, depth);
                let b = sample(row, x * 3 + 2, depth);
                let alpha = if key == Some((r, g, b)) { 0 } else { 255 };
                rgba.extend_from_slice(&[
                    scale_sample(r, depth),
                    scale_sample(g, depth),
                    scale_sample(b, depth),
                    alpha,
                ]);
            }
        }
        ColorType::Rgba => {
            for x in 0..width {
                for c in 0..4 {
                    let s = sample(row, x * 4 + c, depth);
                    rgba.push(scale_sample(s, depth));
                }
            }
        }
    }
    Ok(())
}

/// Frame rectangle in canvas coordinates
fn rect(ctl: &FrameControl) -> (usize, usize, usize, usize) {
    (
        ctl.x_offset() as usize,
        ctl.y_offset() as usize,
        ctl.width() as usize,
        ctl.height() as usize,
    )
}

/// Blend a source pixel over a destination pixel with straight alpha
fn blend_over(dst: &mut [u8], src: &[u8]) {
    let sa = u32::from(src[3]);
    if sa == 255 {
        dst.copy_from_slice(src);
        return;
    }
    if sa == 0 {
        return;
    }
    let da = u32::from(dst[3]);
    let oa = sa * 255 + da * (255 - sa);
    for i in 0..3 {
        let sc = u32::from(src[i]);
        let dc = u32::from(dst[i]);
        dst[i] = ((sc * sa * 255 + dc * da * (255 - sa) + oa / 2) / oa) as u8;
    }
    dst[3] = ((oa + 127) / 255) as u8;
}

/// Persistent canvas state for compositing animation frames
pub(crate) struct Compositor {
    canvas: Raster<SRgba8>,
    /// Region saved for a `Previous` dispose
    saved: Option<Vec<u8>>,
    /// Control of the frame drawn last
    prev: Option<FrameControl>,
}

impl Compositor {
    /// Create a compositor with a transparent canvas
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Compositor {
            canvas: Raster::with_clear(width, height),
            saved: None,
            prev: None,
        }
    }

    /// Composite one frame and return a canvas snapshot
    pub(crate) fn step(
        &mut self,
        control: &FrameControl,
        frame: &Raster<SRgba8>,
    ) -> Raster<SRgba8> {
        if let Some(prev) = self.prev.take() {
            self.dispose(&prev);
        }
        if control.dispose_op() == DisposeOp::Previous {
            self.saved = Some(self.copy_region(control));
        }
        self.draw(control, frame);
        self.prev = Some(*control);
        Raster::with_raster(&self.canvas)
    }

    /// Apply the disposal operation of the previous frame
    fn dispose(&mut self, prev: &FrameControl) {
        match prev.dispose_op() {
            DisposeOp::None => (),
            DisposeOp::Background => self.clear_region(prev),
            DisposeOp::Previous => self.restore_region(prev),
        }
    }

    /// Clear a frame rectangle to fully transparent
    fn clear_region(&mut self, ctl: &FrameControl) {
        let width = self.canvas.width() as usize;
        let (x, y, w, h) = rect(ctl);
        let slice = self.canvas.as_u8_slice_mut();
        for row in y..y + h {
            let start = (row * width + x) * 4;
            slice[start..start + w * 4].fill(0);
        }
    }

    /// Copy a frame rectangle out of the canvas
    fn copy_region(&self, ctl: &FrameControl) -> Vec<u8> {
        let width = self.canvas.width() as usize;
        let (x, y, w, h) = rect(ctl);
        let slice = self.canvas.as_u8_slice();
        let mut saved = Vec::with_capacity(w * h * 4);
        for row in y..y + h {
            let start = (row * width + x) * 4;
            saved.extend_from_slice(&slice[start..start + w * 4]);
        }
        saved
    }

    /// Restore a frame rectangle from the saved copy
    fn restore_region(&mut self, ctl: &FrameControl) {
        match self.saved.take() {
            Some(saved) => {
                let width = self.canvas.width() as usize;
                let (x, y, w, h) = rect(ctl);
                let slice = self.canvas.as_u8_slice_mut();
                for (i, row) in (y..y + h).enumerate() {
                    let start = (row * width + x) * 4;
                    slice[start..start + w * 4]
                        .copy_from_slice(&saved[i * w * 4..(i + 1) * w * 4]);
                }
            }
            None => self.clear_region(ctl),
        }
    }

    /// Draw a frame into the canvas with its blend operation
    fn draw(&mut self, ctl: &FrameControl, frame: &Raster<SRgba8>) {
        let width = self.canvas.width() as usize;
        let (x, y, w, h) = rect(ctl);
        let src = frame.as_u8_slice();
        let dst = self.canvas.as_u8_slice_mut();
        for row in 0..h {
            let s = &src[row * w * 4..(row + 1) * w * 4];
            let start = ((y + row) * width + x) * 4;
            let d = &mut dst[start..start + w * 4];
            match ctl.blend_op() {
                BlendOp::Source => d.copy_from_slice(s),
                BlendOp::Over => {
                    for px in 0..w {
                        blend_over(
                            &mut d[px * 4..px * 4 + 4],
                            &s[px * 4..px * 4 + 4],
                        );
                    }
                }
            }
        }
    }
}

/// Step `Iterator` for PNG / APNG files.
///
/// Yields one composited [Step] per frame, with disposal and blending
/// applied to a persistent canvas.  Each step holds an independent
/// snapshot of the canvas.  Build with Decoder.[into_steps].
///
/// [into_steps]: struct.Decoder.html#method.into_steps
/// [Step]: struct.Step.html
pub struct Steps<R: Read> {
    frames: Frames<R>,
    preamble: Option<Preamble>,
    compositor: Option<Compositor>,
    done: bool,
}

impl<R: Read> Iterator for Steps<R> {
    type Item = Result<Step>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_step() {
            Ok(Some(step)) => Some(Ok(step)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read> Steps<R> {
    /// Create a new step iterator
    pub(crate) fn new(frames: Frames<R>) -> Self {
        Steps {
            frames,
            preamble: None,
            compositor: None,
            done: false,
        }
    }

    /// Decode and composite the next step
    fn next_step(&mut self) -> Result<Option<Step>> {
        if self.preamble.is_none() {
            let preamble = self.frames.preamble()?;
            let hdr = preamble.image_header();
            self.compositor = Some(Compositor::new(hdr.width(), hdr.height()));
            self.preamble = Some(preamble);
        }
        let frame = match self.frames.next() {
            Some(res) => res?,
            None => return Ok(None),
        };
        let max_image_sz = self.frames.max_image_sz();
        match (&self.preamble, &mut self.compositor) {
            (Some(preamble), Some(compositor)) => {
                let raster = decode_frame(
                    preamble,
                    frame.control(),
                    frame.data(),
                    max_image_sz,
                )?;
                let raster = compositor.step(frame.control(), &raster);
                Ok(Some(Step::new(raster, *frame.control())))
            }
            _ => unreachable!("preamble not read in next_step"),
        }
    }
}

#[cfg(test)]
pub(crate) mod testdata {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    /// Build one chunk with length, type tag and CRC
    pub fn chunk(ty: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(payload.len() + 12);
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(ty);
        out.extend_from_slice(payload);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(ty);
        hasher.update(payload);
        out.extend_from_slice(&hasher.finalize().to_be_bytes());
        out
    }

    pub fn ihdr(width: u32, height: u32, depth: u8, color: u8) -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(&width.to_be_bytes());
        p.extend_from_slice(&height.to_be_bytes());
        p.extend_from_slice(&[depth, color, 0, 0, 0]);
        chunk(b"IHDR", &p)
    }

    pub fn actl(frames: u32, plays: u32) -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(&frames.to_be_bytes());
        p.extend_from_slice(&plays.to_be_bytes());
        chunk(b"acTL", &p)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn fctl(
        seq: u32,
        width: u32,
        height: u32,
        x: u32,
        y: u32,
        delay: (u16, u16),
        dispose: u8,
        blend: u8,
    ) -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(&seq.to_be_bytes());
        p.extend_from_slice(&width.to_be_bytes());
        p.extend_from_slice(&height.to_be_bytes());
        p.extend_from_slice(&x.to_be_bytes());
        p.extend_from_slice(&y.to_be_bytes());
        p.extend_from_slice(&delay.0.to_be_bytes());
        p.extend_from_slice(&delay.1.to_be_bytes());
        p.extend_from_slice(&[dispose, blend]);
        chunk(b"fcTL", &p)
    }

    /// Compress raw rows, prepending a `None` filter byte to each
    pub fn compress(raw: &[u8], row_bytes: usize) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        for row in raw.chunks(row_bytes) {
            enc.write_all(&[0]).unwrap();
            enc.write_all(row).unwrap();
        }
        enc.finish().unwrap()
    }

    /// Compress pre-filtered rows (filter byte included)
    pub fn compress_filtered(rows: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(rows).unwrap();
        enc.finish().unwrap()
    }

    pub fn idat(data: &[u8]) -> Vec<u8> {
        chunk(b"IDAT", data)
    }

    /// IDAT chunk containing unfiltered RGBA rows
    pub fn idat_rgba(width: usize, rgba: &[u8]) -> Vec<u8> {
        idat(&compress(rgba, width * 4))
    }

    pub fn fdat(seq: u32, data: &[u8]) -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(&seq.to_be_bytes());
        p.extend_from_slice(data);
        chunk(b"fdAT", &p)
    }

    /// fdAT chunk containing unfiltered RGBA rows
    pub fn fdat_rgba(seq: u32, width: usize, rgba: &[u8]) -> Vec<u8> {
        fdat(seq, &compress(rgba, width * 4))
    }

    pub fn iend() -> Vec<u8> {
        chunk(b"IEND", &[])
    }

    /// Assemble a PNG byte stream from chunks
    pub fn png(parts: &[Vec<u8>]) -> Vec<u8> {
        let mut out = crate::chunk::SIGNATURE.to_vec();
        for part in parts {
            out.extend_from_slice(part);
        }
        out
    }

    pub const RED: [u8; 4] = [255, 0, 0, 255];
    pub const GREEN: [u8; 4] = [0, 255, 0, 255];
    pub const BLUE: [u8; 4] = [0, 0, 255, 255];
    pub const CLEAR: [u8; 4] = [0, 0, 0, 0];

    /// Build an RGBA pixel buffer from pixel values
    pub fn pixels(px: &[[u8; 4]]) -> Vec<u8> {
        px.iter().flatten().copied().collect()
    }
}
