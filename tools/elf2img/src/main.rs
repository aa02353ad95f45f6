//! elf2img --- router image generation utility.
//!
//! Converts an ELF kernel into either a raw flat binary image or, with
//! `-m`, a self-extracting container (MZIP) image the ROM monitor can boot
//! directly. The shape of the output is derived entirely from the structure
//! of the input ELF: its loadable span, entry point, and byte order.

mod image;

use std::fs::File;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use muon_mzip::build::{build_code_segment, write_image};
use muon_mzip::{MzipHeader, HDR_SIZE};

use image::FlatImage;

/// Convert an ELF loadable object to a raw binary image or a
/// self-extracting container image.
#[derive(Parser)]
#[command(name = "elf2img", version, about)]
struct Cli {
    /// Generate a container (MZIP) image instead of a raw binary.
    #[arg(short = 'm')]
    container: bool,

    /// Input ELF file.
    input: PathBuf,

    /// Output image.
    output: PathBuf,
}

fn main() {
    // Every failure path (argument, I/O, or format) prints a diagnostic,
    // then the usage text, and exits -1.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("{err}");
            process::exit(-1);
        }
    };

    if let Err(err) = run(&cli) {
        eprintln!("error: {err:#}");
        eprintln!("{}", Cli::command().render_usage());
        process::exit(-1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let data = std::fs::read(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let flat = FlatImage::from_elf(&data)
        .with_context(|| format!("converting {}", cli.input.display()))?;

    if cli.container {
        write_container(cli, &flat)?;
    } else {
        std::fs::write(&cli.output, &flat.bytes)
            .with_context(|| format!("writing {}", cli.output.display()))?;
    }

    println!(
        "{}: {} bytes at {:#010x}, entry {:#010x}",
        cli.output.display(),
        flat.bytes.len(),
        flat.base,
        flat.entry
    );
    Ok(())
}

fn write_container(cli: &Cli, flat: &FlatImage) -> Result<()> {
    let packed = build_code_segment(&flat.bytes).context("building packed code segment")?;

    let mut hdr = MzipHeader::new();
    hdr.entry = flat.entry;
    hdr.flags1 = 1;
    hdr.flags2 = 1;
    hdr.header_size = HDR_SIZE as u32;
    hdr.loader_addr = flat.base;
    hdr.flags3 = 1;
    hdr.code_packed_size = packed.len() as u32;
    hdr.code_unpacked_size = flat.bytes.len() as u32;
    hdr.memory_image_size = flat.bytes.len() as u32;

    let mut out = File::create(&cli.output)
        .with_context(|| format!("creating {}", cli.output.display()))?;
    // The container inherits the input's byte order, so a big-endian kernel
    // yields the big-endian image the target expects.
    write_image(&mut out, &mut hdr, &packed, &[], flat.encoding)
        .with_context(|| format!("writing {}", cli.output.display()))?;

    // Every field in hex, for eyeball verification against the target.
    println!("{hdr}");
    Ok(())
}
