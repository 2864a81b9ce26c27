// main.rs      flipbook command
//
// Copyright (c) 2026  Douglas Lau
//
#![forbid(unsafe_code)]

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use flipbook::chunk::{BlendOp, DisposeOp, Frame};
use flipbook::{Decoder, is_animated};
use std::error::Error;
use std::ffi::OsStr;
use std::fs;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Crate version
const VERSION: &str = std::env!("CARGO_PKG_VERSION");

/// Main entry point
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::builder().format_timestamp(None).init();
    let mut out = StandardStream::stdout(ColorChoice::Always);
    match create_app().get_matches().subcommand() {
        ("show", Some(matches)) => show(&mut out, matches)?,
        _ => panic!(),
    }
    out.reset()?;
    Ok(())
}

/// Create clap App
fn create_app() -> App<'static, 'static> {
    App::new("flipbook")
        .version(VERSION)
        .setting(AppSettings::GlobalVersion)
        .about("APNG file utility")
        .setting(AppSettings::ArgRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("show")
                .about("Show APNG frame table")
                .arg(
                    Arg::with_name("files")
                        .required(true)
                        .min_values(1)
                        .help("input file(s)"),
                ),
        )
}

/// Handle show subcommand
fn show(
    out: &mut StandardStream,
    matches: &ArgMatches,
) -> Result<(), Box<dyn Error>> {
    let values = matches.values_of_os("files").unwrap();
    for path in values {
        show_file(out, path)?;
    }
    Ok(())
}

/// Show one PNG / APNG file
fn show_file(
    out: &mut StandardStream,
    path: &OsStr,
) -> Result<(), Box<dyn Error>> {
    let mut magenta = ColorSpec::new();
    magenta.set_fg(Some(Color::Magenta));
    let mut bold = ColorSpec::new();
    bold.set_fg(Some(Color::White))
        .set_intense(true)
        .set_bold(true);
    let mut yellow = ColorSpec::new();
    yellow.set_fg(Some(Color::Yellow)).set_intense(true);
    let bytes = fs::read(path)?;
    out.set_color(&magenta)?;
    writeln!(out, "{}", path.to_string_lossy())?;
    let mut frame_dec = Decoder::new(&bytes[..]).into_frames();
    let preamble = frame_dec.preamble()?;
    let mut frames = vec![];
    for frame in frame_dec {
        frames.push(frame?);
    }
    let hdr = preamble.image_header();
    out.set_color(&bold)?;
    write!(
        out,
        "PNG {}x{}, {:?} depth {}",
        hdr.width(),
        hdr.height(),
        hdr.color_type(),
        hdr.bit_depth()
    )?;
    if is_animated(&bytes) {
        write!(out, ", frames: {}", frames.len())?;
        if let Some(ctl) = preamble.animation_control() {
            write!(out, ", plays: ")?;
            if ctl.num_plays() == 0 {
                write!(out, "∞")?;
            } else {
                write!(out, "{}", ctl.num_plays())?;
            }
        }
    } else {
        write!(out, ", static")?;
    }
    writeln!(out)?;
    out.set_color(&yellow)?;
    writeln!(out, " Fr#  Delay Disp  Blend      Size      X,Y")?;
    for (number, frame) in frames.iter().enumerate() {
        write_frame(out, frame, number)?;
    }
    Ok(())
}

/// Show one frame row
fn write_frame(
    out: &mut StandardStream,
    frame: &Frame,
    number: usize,
) -> Result<(), Box<dyn Error>> {
    let mut dflt = ColorSpec::new();
    dflt.set_fg(Some(Color::White));
    let mut bold = ColorSpec::new();
    bold.set_fg(Some(Color::White))
        .set_intense(true)
        .set_bold(true);
    let ctl = frame.control();
    out.set_color(&bold)?;
    write!(out, "{:>4}", number)?;
    let delay = ctl.delay().as_secs_f32();
    if delay == 0.0 {
        out.set_color(&dflt)?;
    }
    write!(out, " {:6.2}", delay)?;
    let disp = match ctl.dispose_op() {
        DisposeOp::None => "none",
        DisposeOp::Background => "bg",
        DisposeOp::Previous => "prev",
    };
    out.set_color(match ctl.dispose_op() {
        DisposeOp::None => &dflt,
        _ => &bold,
    })?;
    write!(out, " {:>4}", disp)?;
    let blend = match ctl.blend_op() {
        BlendOp::Source => "src",
        BlendOp::Over => "over",
    };
    out.set_color(match ctl.blend_op() {
        BlendOp::Source => &dflt,
        BlendOp::Over => &bold,
    })?;
    write!(out, " {:>6}", blend)?;
    out.set_color(&dflt)?;
    write!(
        out,
        " {:>9}",
        &format!("{}x{}", ctl.width(), ctl.height())
    )?;
    if ctl.x_offset() == 0 && ctl.y_offset() == 0 {
        out.set_color(&dflt)?;
    } else {
        out.set_color(&bold)?;
    }
    writeln!(
        out,
        " {:>8}",
        &format!("{},{}", ctl.x_offset(), ctl.y_offset())
    )?;
    Ok(())
}
