// chunk.rs
//
// Copyright (c) 2026  Douglas Lau
//
//! Chunk types for PNG / APNG files
use std::fmt;
use std::time::Duration;

/// PNG file signature
pub(crate) const SIGNATURE: [u8; 8] =
    [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Four byte chunk type tag
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ChunkType(pub(crate) [u8; 4]);

impl ChunkType {
    /// Image header (IHDR)
    pub const IMAGE_HEADER: ChunkType = ChunkType(*b"IHDR");
    /// Palette (PLTE)
    pub const PALETTE: ChunkType = ChunkType(*b"PLTE");
    /// Transparency (tRNS)
    pub const TRANSPARENCY: ChunkType = ChunkType(*b"tRNS");
    /// Animation control (acTL)
    pub const ANIMATION_CONTROL: ChunkType = ChunkType(*b"acTL");
    /// Frame control (fcTL)
    pub const FRAME_CONTROL: ChunkType = ChunkType(*b"fcTL");
    /// Image data (IDAT)
    pub const IMAGE_DATA: ChunkType = ChunkType(*b"IDAT");
    /// Frame data (fdAT)
    pub const FRAME_DATA: ChunkType = ChunkType(*b"fdAT");
    /// Image end (IEND)
    pub const IMAGE_END: ChunkType = ChunkType(*b"IEND");

    /// Check if the chunk is ancillary (safe to skip)
    pub fn is_ancillary(self) -> bool {
        self.0[0] & 0x20 != 0
    }
}

impl fmt::Debug for ChunkType {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Color type from the image header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorType {
    /// Grayscale samples
    Gray,
    /// Red, green and blue samples
    Rgb,
    /// Palette indices
    Indexed,
    /// Grayscale samples with alpha
    GrayAlpha,
    /// Red, green, blue and alpha samples
    Rgba,
}

impl ColorType {
    /// Get a color type from its code
    pub(crate) fn from_u8(n: u8) -> Option<Self> {
        use self::ColorType::*;
        match n {
            0 => Some(Gray),
            2 => Some(Rgb),
            3 => Some(Indexed),
            4 => Some(GrayAlpha),
            6 => Some(Rgba),
            _ => None,
        }
    }

    /// Get the number of samples per pixel
    pub fn channels(self) -> usize {
        use self::ColorType::*;
        match self {
            Gray | Indexed => 1,
            GrayAlpha => 2,
            Rgb => 3,
            Rgba => 4,
        }
    }

    /// Check if a bit depth is allowed for the color type
    pub(crate) fn depth_allowed(self, depth: u8) -> bool {
        use self::ColorType::*;
        match self {
            Gray => matches!(depth, 1 | 2 | 4 | 8 | 16),
            Indexed => matches!(depth, 1 | 2 | 4 | 8),
            Rgb | GrayAlpha | Rgba => matches!(depth, 8 | 16),
        }
    }
}

/// Image header (IHDR) chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    width: u32,
    height: u32,
    bit_depth: u8,
    color_type: ColorType,
    interlaced: bool,
}

impl ImageHeader {
    /// Create a new image header
    pub(crate) fn new(
        width: u32,
        height: u32,
        bit_depth: u8,
        color_type: ColorType,
        interlaced: bool,
    ) -> Self {
        ImageHeader {
            width,
            height,
            bit_depth,
            color_type,
            interlaced,
        }
    }

    /// Get the canvas width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Get the canvas height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Get the bit depth per sample
    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    /// Get the color type
    pub fn color_type(&self) -> ColorType {
        self.color_type
    }

    /// Check if the image is Adam7 interlaced
    pub fn interlaced(&self) -> bool {
        self.interlaced
    }

    /// Get the number of bits per pixel
    pub(crate) fn bits_per_pixel(&self) -> usize {
        self.bit_depth as usize * self.color_type.channels()
    }

    /// Get the number of bytes in one row of the given width
    pub(crate) fn bytes_per_row(&self, width: u32) -> usize {
        (width as usize * self.bits_per_pixel() + 7) / 8
    }

    /// Get the number of bytes per pixel used for row filtering
    pub(crate) fn filter_bpp(&self) -> usize {
        (self.bits_per_pixel() / 8).max(1)
    }
}

/// Palette (PLTE) chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<u8>,
}

impl Palette {
    /// Create a palette with raw RGB triplets
    pub(crate) fn with_colors(colors: Vec<u8>) -> Self {
        Palette { colors }
    }

    /// Get the number of palette entries
    pub fn len(&self) -> usize {
        self.colors.len() / 3
    }

    /// Check if the palette is empty
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Get one palette entry as an RGB triplet
    pub fn entry(&self, i: usize) -> Option<(u8, u8, u8)> {
        let c = self.colors.get(i * 3..i * 3 + 3)?;
        Some((c[0], c[1], c[2]))
    }
}

/// Transparency (tRNS) chunk
///
/// Interpretation depends on the color type: an alpha table for indexed
/// images, or a transparent color key for gray / RGB images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transparency {
    data: Vec<u8>,
}

impl Transparency {
    /// Create transparency data
    pub(crate) fn with_data(data: Vec<u8>) -> Self {
        Transparency { data }
    }

    /// Get the alpha value for a palette index
    pub fn alpha(&self, i: usize) -> u8 {
        self.data.get(i).copied().unwrap_or(255)
    }

    /// Get the transparent gray sample, if declared
    pub fn gray_key(&self) -> Option<u16> {
        let d = self.data.get(0..2)?;
        Some(u16::from_be_bytes([d[0], d[1]]))
    }

    /// Get the transparent RGB sample, if declared
    pub fn rgb_key(&self) -> Option<(u16, u16, u16)> {
        let d = self.data.get(0..6)?;
        Some((
            u16::from_be_bytes([d[0], d[1]]),
            u16::from_be_bytes([d[2], d[3]]),
            u16::from_be_bytes([d[4], d[5]]),
        ))
    }
}

/// Animation control (acTL) chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationControl {
    num_frames: u32,
    num_plays: u32,
}

impl AnimationControl {
    /// Create a new animation control
    pub(crate) fn new(num_frames: u32, num_plays: u32) -> Self {
        AnimationControl {
            num_frames,
            num_plays,
        }
    }

    /// Get the declared number of frames
    pub fn num_frames(&self) -> u32 {
        self.num_frames
    }

    /// Get the number of plays (`0` means infinite)
    pub fn num_plays(&self) -> u32 {
        self.num_plays
    }
}

/// Frame disposal operation
///
/// Canvas cleanup applied after a frame's display time has elapsed,
/// before the next frame is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisposeOp {
    /// Leave the canvas as-is
    None,
    /// Clear the frame rectangle to fully transparent
    Background,
    /// Restore the frame rectangle to its previous contents
    Previous,
}

/// Frame blend operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOp {
    /// Overwrite the frame rectangle
    Source,
    /// Alpha-composite onto the frame rectangle
    Over,
}

/// Frame control (fcTL) chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameControl {
    sequence_number: u32,
    width: u32,
    height: u32,
    x_offset: u32,
    y_offset: u32,
    delay_num: u16,
    delay_den: u16,
    dispose_op: DisposeOp,
    blend_op: BlendOp,
}

impl Default for FrameControl {
    fn default() -> Self {
        FrameControl {
            sequence_number: 0,
            width: 0,
            height: 0,
            x_offset: 0,
            y_offset: 0,
            delay_num: 0,
            delay_den: 100,
            dispose_op: DisposeOp::None,
            blend_op: BlendOp::Source,
        }
    }
}

impl FrameControl {
    /// Create a new frame control
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        sequence_number: u32,
        width: u32,
        height: u32,
        x_offset: u32,
        y_offset: u32,
        delay_num: u16,
        delay_den: u16,
        dispose_op: DisposeOp,
        blend_op: BlendOp,
    ) -> Self {
        // delay_den of zero means one hundredth of a second
        let delay_den = if delay_den > 0 { delay_den } else { 100 };
        FrameControl {
            sequence_number,
            width,
            height,
            x_offset,
            y_offset,
            delay_num,
            delay_den,
            dispose_op,
            blend_op,
        }
    }

    /// Create an implicit control for a default image frame
    pub(crate) fn with_full_canvas(width: u32, height: u32) -> Self {
        FrameControl {
            width,
            height,
            ..FrameControl::default()
        }
    }

    /// Get the sequence number
    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    /// Get the frame width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Get the frame height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Get the X offset of the frame rectangle
    pub fn x_offset(&self) -> u32 {
        self.x_offset
    }

    /// Get the Y offset of the frame rectangle
    pub fn y_offset(&self) -> u32 {
        self.y_offset
    }

    /// Get the delay numerator
    pub fn delay_num(&self) -> u16 {
        self.delay_num
    }

    /// Get the delay denominator (never zero)
    pub fn delay_den(&self) -> u16 {
        self.delay_den
    }

    /// Get the frame delay as a `Duration`
    pub fn delay(&self) -> Duration {
        let nanos =
            u64::from(self.delay_num) * 1_000_000_000 / u64::from(self.delay_den);
        Duration::from_nanos(nanos)
    }

    /// Get the disposal operation
    pub fn dispose_op(&self) -> DisposeOp {
        self.dispose_op
    }

    /// Get the blend operation
    pub fn blend_op(&self) -> BlendOp {
        self.blend_op
    }
}

/// Image data (IDAT) chunk
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    data: Vec<u8>,
}

impl ImageData {
    /// Create image data
    pub(crate) fn with_data(data: Vec<u8>) -> Self {
        ImageData { data }
    }

    /// Get the compressed data
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "ImageData {{ {} bytes }}", self.data.len())
    }
}

/// Frame data (fdAT) chunk
#[derive(Clone, PartialEq, Eq)]
pub struct FrameData {
    sequence_number: u32,
    data: Vec<u8>,
}

impl FrameData {
    /// Create frame data
    pub(crate) fn new(sequence_number: u32, data: Vec<u8>) -> Self {
        FrameData {
            sequence_number,
            data,
        }
    }

    /// Get the sequence number
    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    /// Get the compressed data
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for FrameData {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "FrameData {{ seq: {}, {} bytes }}",
            self.sequence_number,
            self.data.len()
        )
    }
}

/// Unknown or unhandled chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unknown {
    chunk_type: ChunkType,
    data: Vec<u8>,
}

impl Unknown {
    /// Create an unknown chunk
    pub(crate) fn new(chunk_type: ChunkType, data: Vec<u8>) -> Self {
        Unknown { chunk_type, data }
    }

    /// Get the chunk type tag
    pub fn chunk_type(&self) -> ChunkType {
        self.chunk_type
    }

    /// Get the chunk payload
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A typed chunk within a PNG / APNG file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// Image header (IHDR)
    ImageHeader(ImageHeader),
    /// Palette (PLTE)
    Palette(Palette),
    /// Transparency (tRNS)
    Transparency(Transparency),
    /// Animation control (acTL)
    AnimationControl(AnimationControl),
    /// Frame control (fcTL)
    FrameControl(FrameControl),
    /// Image data (IDAT)
    ImageData(ImageData),
    /// Frame data (fdAT)
    FrameData(FrameData),
    /// Image end (IEND)
    ImageEnd,
    /// Any other chunk
    Unknown(Unknown),
}

impl From<ImageHeader> for Chunk {
    fn from(c: ImageHeader) -> Self {
        Chunk::ImageHeader(c)
    }
}

impl From<Palette> for Chunk {
    fn from(c: Palette) -> Self {
        Chunk::Palette(c)
    }
}

impl From<Transparency> for Chunk {
    fn from(c: Transparency) -> Self {
        Chunk::Transparency(c)
    }
}

impl From<AnimationControl> for Chunk {
    fn from(c: AnimationControl) -> Self {
        Chunk::AnimationControl(c)
    }
}

impl From<FrameControl> for Chunk {
    fn from(c: FrameControl) -> Self {
        Chunk::FrameControl(c)
    }
}

impl From<ImageData> for Chunk {
    fn from(c: ImageData) -> Self {
        Chunk::ImageData(c)
    }
}

impl From<FrameData> for Chunk {
    fn from(c: FrameData) -> Self {
        Chunk::FrameData(c)
    }
}

impl From<Unknown> for Chunk {
    fn from(c: Unknown) -> Self {
        Chunk::Unknown(c)
    }
}

/// One animation frame
///
/// Pairs a [FrameControl](struct.FrameControl.html) with the compressed
/// image data belonging to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    control: FrameControl,
    data: Vec<u8>,
}

impl Frame {
    /// Create a new frame
    pub(crate) fn new(control: FrameControl, data: Vec<u8>) -> Self {
        Frame { control, data }
    }

    /// Get the frame control
    pub fn control(&self) -> &FrameControl {
        &self.control
    }

    /// Get the compressed image data
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
