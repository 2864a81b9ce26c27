// decode.rs      flipbook benchmarks
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use flipbook::Decoder;
use std::io::Write;

/// Build one chunk with length, type tag and CRC
fn chunk(ty: &[u8; 4], payload: &[u8]) -> Vec<u8> {
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

/// Compress RGBA rows with a `None` filter byte per row
fn compress(rgba: &[u8], width: usize) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    for row in rgba.chunks(width * 4) {
        enc.write_all(&[0]).unwrap();
        enc.write_all(row).unwrap();
    }
    enc.finish().unwrap()
}

/// Build a synthetic APNG with the given size and frame count
fn make_apng(width: u32, height: u32, frames: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let mut out = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.extend_from_slice(&[8, 6, 0, 0, 0]);
    out.extend_from_slice(&chunk(b"IHDR", &ihdr));
    let mut actl = Vec::new();
    actl.extend_from_slice(&frames.to_be_bytes());
    actl.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&chunk(b"acTL", &actl));
    let mut seq = 0u32;
    for index in 0..frames {
        let mut fctl = Vec::new();
        fctl.extend_from_slice(&seq.to_be_bytes());
        seq += 1;
        fctl.extend_from_slice(&width.to_be_bytes());
        fctl.extend_from_slice(&height.to_be_bytes());
        fctl.extend_from_slice(&0u32.to_be_bytes());
        fctl.extend_from_slice(&0u32.to_be_bytes());
        fctl.extend_from_slice(&1u16.to_be_bytes());
        fctl.extend_from_slice(&30u16.to_be_bytes());
        fctl.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&chunk(b"fcTL", &fctl));
        let mut rgba = Vec::with_capacity(w * h * 4);
        for y in 0..h {
            for x in 0..w {
                let v = ((x * 7 + y * 13 + index as usize * 31) & 0xFF) as u8;
                rgba.extend_from_slice(&[v, v.wrapping_add(85), v, 255]);
            }
        }
        let data = compress(&rgba, w);
        if index == 0 {
            out.extend_from_slice(&chunk(b"IDAT", &data));
        } else {
            let mut fdat = Vec::new();
            fdat.extend_from_slice(&seq.to_be_bytes());
            seq += 1;
            fdat.extend_from_slice(&data);
            out.extend_from_slice(&chunk(b"fdAT", &fdat));
        }
    }
    out.extend_from_slice(&chunk(b"IEND", &[]));
    out
}

fn decode_steps(crit: &mut Criterion) {
    let apng = make_apng(64, 64, 8);

    crit.bench_function("decode_steps", |b| {
        b.iter(|| {
            let decoder = Decoder::new(black_box(&apng[..]));
            for step in decoder {
                black_box(step.unwrap());
            }
        })
    });
}

criterion_group!(benches, decode_steps);
criterion_main!(benches);
