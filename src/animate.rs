// animate.rs
//
// Copyright (c) 2026  Douglas Lau
//
//! Animation playback handle
use crate::chunk::Frame;
use crate::decode::{Compositor, Preamble, decode_frame};
use crate::error::{Error, Result};
use crate::private::Decoder;
use pix::Raster;
use pix::rgb::SRgba8;
use std::io::Read;
use std::time::Duration;

/// Composited output for one frame of an [Animation]
///
/// [Animation]: struct.Animation.html
pub struct FrameOutput {
    raster: Raster<SRgba8>,
    delay: Duration,
    last: bool,
}

impl FrameOutput {
    /// Get the composited raster
    pub fn raster(&self) -> &Raster<SRgba8> {
        &self.raster
    }

    /// Convert into the composited raster
    pub fn into_raster(self) -> Raster<SRgba8> {
        self.raster
    }

    /// Get the delay before the next frame should be shown
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Check if this is the final frame of a play
    pub fn is_last(&self) -> bool {
        self.last
    }
}

/// Composited frame kept for later plays
struct Cached {
    raster: Raster<SRgba8>,
    delay: Duration,
}

/// Playback state for an open animation
struct Playback {
    preamble: Preamble,
    frames: Vec<Frame>,
    compositor: Compositor,
    cache: Vec<Cached>,
    /// Frame to produce next
    index: usize,
    /// Plays remaining, including the current one (`None` is infinite)
    plays_left: Option<u32>,
    /// Target output size
    target: Option<(u32, u32)>,
    /// A frame has been produced
    started: bool,
    max_image_sz: Option<usize>,
}

/// Animation playback handle for one APNG source.
///
/// Pulls composited frames one at a time, looping per the animation
/// control, and caching composited frames so later plays skip the
/// decompression work.  The caller owns playback pacing: show each
/// frame for its [delay], then pull the next.
///
/// One logical owner must drive [next_frame]; the handle does no
/// internal locking.  All blocking I/O happens in [open].
///
/// ## Example
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let file = std::fs::File::open("walking.png")?;
/// let mut animation = flipbook::Animation::open(file)?;
/// while let Some(frame) = animation.next_frame()? {
///     // ... display frame.raster(), wait frame.delay()
/// }
/// animation.close();
/// # Ok(())
/// # }
/// ```
///
/// [delay]: struct.FrameOutput.html#method.delay
/// [next_frame]: struct.Animation.html#method.next_frame
/// [open]: struct.Animation.html#method.open
pub struct Animation {
    playback: Option<Playback>,
}

impl Animation {
    /// Open an animation, reading the whole source into memory.
    ///
    /// All frame metadata is parsed up front, so structural format
    /// errors are reported here rather than during playback.  A PNG
    /// with no animation control chunk fails with
    /// [MissingAnimationControl]; use [is_animated] to route such
    /// files to a static image path instead.
    ///
    /// [is_animated]: fn.is_animated.html
    /// [MissingAnimationControl]: enum.Error.html#variant.MissingAnimationControl
    pub fn open<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let decoder = Decoder::new_unbuffered(&data[..]);
        let mut frames_iter = decoder.into_frames();
        let max_image_sz = frames_iter.max_image_sz();
        let preamble = frames_iter.preamble()?;
        let control = preamble
            .animation_control()
            .ok_or(Error::MissingAnimationControl)?;
        if preamble.image_header().interlaced() {
            return Err(Error::UnsupportedInterlace);
        }
        let mut frames = Vec::new();
        for frame in &mut frames_iter {
            frames.push(frame?);
        }
        let hdr = preamble.image_header();
        let compositor = Compositor::new(hdr.width(), hdr.height());
        let plays_left = match control.num_plays() {
            0 => None,
            n => Some(n),
        };
        Ok(Animation {
            playback: Some(Playback {
                preamble,
                frames,
                compositor,
                cache: Vec::new(),
                index: 0,
                plays_left,
                target: None,
                started: false,
                max_image_sz,
            }),
        })
    }

    /// Get the declared canvas dimensions
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        let playback = self.playback.as_ref().ok_or(Error::Closed)?;
        let hdr = playback.preamble.image_header();
        Ok((hdr.width(), hdr.height()))
    }

    /// Set a target size for frame output.
    ///
    /// All frames are resampled to the target size.  Only allowed
    /// before the first frame has been produced.
    pub fn set_target_size(&mut self, width: u32, height: u32) -> Result<()> {
        let playback = self.playback.as_mut().ok_or(Error::Closed)?;
        if playback.started {
            return Err(Error::InvalidState);
        }
        if width == 0 || height == 0 {
            return Err(Error::InvalidRasterDimensions);
        }
        playback.target = Some((width, height));
        Ok(())
    }

    /// Produce the next composited frame.
    ///
    /// Returns `None` once the final frame of the final play has been
    /// produced.  Per-frame decode errors are returned here; the
    /// caller decides whether to stop playback.
    pub fn next_frame(&mut self) -> Result<Option<FrameOutput>> {
        let playback = self.playback.as_mut().ok_or(Error::Closed)?;
        playback.started = true;
        playback.next_output()
    }

    /// Close the animation, releasing frames, cache and canvas.
    ///
    /// Idempotent.  Any later call on the handle fails with [Closed].
    ///
    /// [Closed]: enum.Error.html#variant.Closed
    pub fn close(&mut self) {
        self.playback = None;
    }
}

impl Playback {
    /// Produce output for the next frame, wrapping between plays
    fn next_output(&mut self) -> Result<Option<FrameOutput>> {
        if self.index >= self.frames.len() {
            match &mut self.plays_left {
                Some(n) if *n <= 1 => return Ok(None),
                Some(n) => {
                    *n -= 1;
                    self.index = 0;
                }
                None => self.index = 0,
            }
        }
        let index = self.index;
        if index >= self.cache.len() {
            let frame = &self.frames[index];
            let raster = decode_frame(
                &self.preamble,
                frame.control(),
                frame.data(),
                self.max_image_sz,
            )?;
            let raster = self.compositor.step(frame.control(), &raster);
            let raster = match self.target {
                Some((w, h)) if (w, h) != (raster.width(), raster.height()) => {
                    resample(&raster, w, h)
                }
                _ => raster,
            };
            self.cache.push(Cached {
                raster,
                delay: frame.control().delay(),
            });
        }
        let cached = &self.cache[index];
        self.index += 1;
        Ok(Some(FrameOutput {
            raster: Raster::with_raster(&cached.raster),
            delay: cached.delay,
            last: index + 1 == self.frames.len(),
        }))
    }
}

/// Resample a raster with bilinear filtering
fn resample(src: &Raster<SRgba8>, width: u32, height: u32) -> Raster<SRgba8> {
    let sw = u64::from(src.width());
    let sh = u64::from(src.height());
    let slice = src.as_u8_slice();
    let mut out = vec![0; width as usize * height as usize * 4];
    let mut i = 0;
    for y in 0..u64::from(height) {
        let fy = sample_pos(y, sh, u64::from(height));
        let y0 = (fy >> 16).min(sh - 1);
        let y1 = (y0 + 1).min(sh - 1);
        let dy = fy & 0xFFFF;
        for x in 0..u64::from(width) {
            let fx = sample_pos(x, sw, u64::from(width));
            let x0 = (fx >> 16).min(sw - 1);
            let x1 = (x0 + 1).min(sw - 1);
            let dx = fx & 0xFFFF;
            let p00 = ((y0 * sw + x0) * 4) as usize;
            let p01 = ((y0 * sw + x1) * 4) as usize;
            let p10 = ((y1 * sw + x0) * 4) as usize;
            let p11 = ((y1 * sw + x1) * 4) as usize;
            let w00 = (65536 - dx) * (65536 - dy);
            let w01 = dx * (65536 - dy);
            let w10 = (65536 - dx) * dy;
            let w11 = dx * dy;
            for c in 0..4 {
                let v = u64::from(slice[p00 + c]) * w00
                    + u64::from(slice[p01 + c]) * w01
                    + u64::from(slice[p10 + c]) * w10
                    + u64::from(slice[p11 + c]) * w11;
                out[i] = (v >> 32) as u8;
                i += 1;
            }
        }
    }
    Raster::with_u8_buffer(width, height, out)
}

/// Map an output coordinate to a 16.16 source position
fn sample_pos(i: u64, src_sz: u64, dst_sz: u64) -> u64 {
    let center = ((u128::from(i) * 2 + 1) * (u128::from(src_sz) << 15))
        / u128::from(dst_sz);
    (center as u64).saturating_sub(1 << 15)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::decode::testdata::*;
    use crate::private::Decoder;

    fn two_by_two(plays: u32) -> Vec<u8> {
        png(&[
            ihdr(2, 2, 8, 6),
            actl(3, plays),
            fctl(0, 2, 2, 0, 0, (1, 10), 0, 0),
            idat_rgba(2, &pixels(&[RED, RED, RED, RED])),
            fctl(1, 1, 1, 0, 0, (1, 10), 0, 0),
            fdat_rgba(2, 1, &pixels(&[GREEN])),
            fctl(3, 1, 1, 1, 1, (1, 10), 0, 0),
            fdat_rgba(4, 1, &pixels(&[BLUE])),
            iend(),
        ])
    }

    #[test]
    fn static_png_rejected() {
        let bytes =
            png(&[ihdr(1, 1, 8, 6), idat_rgba(1, &pixels(&[RED])), iend()]);
        assert!(matches!(
            Animation::open(&bytes[..]),
            Err(Error::MissingAnimationControl)
        ));
    }

    #[test]
    fn dimensions() {
        let animation = Animation::open(&two_by_two(0)[..]).unwrap();
        assert_eq!(animation.dimensions().unwrap(), (2, 2));
    }

    #[test]
    fn structural_errors_reported_at_open() {
        let bytes = png(&[
            ihdr(2, 2, 8, 6),
            actl(2, 0),
            fctl(0, 2, 2, 0, 0, (1, 10), 0, 0),
            idat_rgba(2, &pixels(&[RED, RED, RED, RED])),
            fctl(1, 2, 2, 1, 1, (1, 10), 0, 0),
            fdat_rgba(2, 2, &pixels(&[BLUE, BLUE, BLUE, BLUE])),
            iend(),
        ]);
        assert!(matches!(
            Animation::open(&bytes[..]),
            Err(Error::InvalidFrameDimensions)
        ));
    }

    #[test]
    fn two_plays_end_after_six_frames() {
        let mut animation = Animation::open(&two_by_two(2)[..]).unwrap();
        for play in 0..2 {
            for index in 0..3 {
                let frame = animation.next_frame().unwrap().unwrap();
                assert_eq!(
                    frame.is_last(),
                    index == 2,
                    "play {} frame {}",
                    play,
                    index
                );
            }
        }
        assert!(animation.next_frame().unwrap().is_none());
        assert!(animation.next_frame().unwrap().is_none());
    }

    #[test]
    fn infinite_plays_wrap() {
        let mut animation = Animation::open(&two_by_two(0)[..]).unwrap();
        let first = animation.next_frame().unwrap().unwrap();
        for _ in 0..2 {
            animation.next_frame().unwrap().unwrap();
        }
        // fourth frame wraps back to the first
        let wrapped = animation.next_frame().unwrap().unwrap();
        assert_eq!(
            first.raster().as_u8_slice(),
            wrapped.raster().as_u8_slice()
        );
        assert!(!wrapped.is_last());
    }

    #[test]
    fn composited_output() {
        let mut animation = Animation::open(&two_by_two(1)[..]).unwrap();
        let f0 = animation.next_frame().unwrap().unwrap();
        assert_eq!(
            f0.raster().as_u8_slice(),
            &pixels(&[RED, RED, RED, RED])[..]
        );
        let f1 = animation.next_frame().unwrap().unwrap();
        assert_eq!(
            f1.raster().as_u8_slice(),
            &pixels(&[GREEN, RED, RED, RED])[..]
        );
        let f2 = animation.next_frame().unwrap().unwrap();
        assert_eq!(
            f2.raster().as_u8_slice(),
            &pixels(&[GREEN, RED, RED, BLUE])[..]
        );
        assert!(animation.next_frame().unwrap().is_none());
    }

    #[test]
    fn default_image_only() {
        let bytes = png(&[
            ihdr(1, 1, 8, 6),
            actl(1, 1),
            idat_rgba(1, &pixels(&[RED])),
            iend(),
        ]);
        let mut animation = Animation::open(&bytes[..]).unwrap();
        let frame = animation.next_frame().unwrap().unwrap();
        assert_eq!(frame.raster().as_u8_slice(), &RED[..]);
        assert!(frame.is_last());
        assert!(animation.next_frame().unwrap().is_none());
    }

    #[test]
    fn animated_matches_static_decode() {
        let rgba = pixels(&[RED, BLUE, GREEN, RED]);
        let animated = png(&[
            ihdr(2, 2, 8, 6),
            actl(1, 1),
            idat_rgba(2, &rgba),
            iend(),
        ]);
        let plain = png(&[ihdr(2, 2, 8, 6), idat_rgba(2, &rgba), iend()]);
        let mut animation = Animation::open(&animated[..]).unwrap();
        let frame = animation.next_frame().unwrap().unwrap();
        let steps: crate::Result<Vec<_>> =
            Decoder::new(&plain[..]).into_iter().collect();
        let steps = steps.unwrap();
        assert_eq!(
            frame.raster().as_u8_slice(),
            steps[0].raster().as_u8_slice()
        );
    }

    #[test]
    fn delay_den_zero_normalized() {
        let bytes = png(&[
            ihdr(1, 1, 8, 6),
            actl(1, 1),
            fctl(0, 1, 1, 0, 0, (1, 0), 0, 0),
            idat_rgba(1, &pixels(&[RED])),
            iend(),
        ]);
        let mut animation = Animation::open(&bytes[..]).unwrap();
        let frame = animation.next_frame().unwrap().unwrap();
        assert_eq!(frame.delay(), Duration::from_millis(10));
    }

    #[test]
    fn target_size_fixed_at_open() {
        let mut animation = Animation::open(&two_by_two(0)[..]).unwrap();
        animation.set_target_size(4, 4).unwrap();
        let frame = animation.next_frame().unwrap().unwrap();
        assert_eq!(frame.raster().width(), 4);
        assert_eq!(frame.raster().height(), 4);
        assert!(matches!(
            animation.set_target_size(8, 8),
            Err(Error::InvalidState)
        ));
    }

    #[test]
    fn target_size_zero_rejected() {
        let mut animation = Animation::open(&two_by_two(0)[..]).unwrap();
        assert!(matches!(
            animation.set_target_size(0, 4),
            Err(Error::InvalidRasterDimensions)
        ));
    }

    #[test]
    fn close_is_idempotent() {
        let mut animation = Animation::open(&two_by_two(0)[..]).unwrap();
        animation.next_frame().unwrap().unwrap();
        animation.close();
        animation.close();
        assert!(matches!(animation.next_frame(), Err(Error::Closed)));
        assert!(matches!(animation.dimensions(), Err(Error::Closed)));
        assert!(matches!(
            animation.set_target_size(4, 4),
            Err(Error::Closed)
        ));
    }

    #[test]
    fn resample_uniform() {
        let src: Raster<SRgba8> =
            Raster::with_u8_buffer(1, 1, vec![10, 20, 30, 255]);
        let out = resample(&src, 3, 3);
        for px in out.as_u8_slice().chunks(4) {
            assert_eq!(px, &[10, 20, 30, 255]);
        }
    }

    #[test]
    fn resample_blends_neighbors() {
        let src: Raster<SRgba8> = Raster::with_u8_buffer(
            2,
            2,
            pixels(&[RED, BLUE, BLUE, RED]),
        );
        let out = resample(&src, 1, 1);
        assert_eq!(out.as_u8_slice(), &[127, 0, 127, 255]);
    }
}
