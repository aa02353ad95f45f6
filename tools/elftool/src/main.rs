//! elftool --- dump the structure of an ELF32 file.
//!
//! A standalone analysis tool and a workout for the structural parser: it
//! prints the file header field by field in hex, then every section header
//! with its type name and `AWX`-style flag rendering, then every program
//! header. Sections are inspection-only in this workspace (the runtime
//! loader never reads them), so this is where the section-table support
//! earns its keep.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use muon_elf::{
    machine, Elf32Header, ProgramHeader32, SectionHeader32, PHDR32_SIZE, SHDR32_SIZE,
};

/// Dump the file, section, and program headers of an ELF32 file.
#[derive(Parser)]
#[command(name = "elftool", version, about)]
struct Cli {
    /// Input ELF file.
    input: PathBuf,
}

fn main() {
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
    let hdr = Elf32Header::parse(&data)
        .with_context(|| format!("parsing {}", cli.input.display()))?;

    print_file_header(&hdr);

    let strtab = section_name_table(&data, &hdr);

    println!("\nSection headers ({}):", hdr.shnum);
    for i in 0..usize::from(hdr.shnum) {
        let off = hdr.shoff as usize + i * SHDR32_SIZE;
        let raw = data
            .get(off..off + SHDR32_SIZE)
            .context("section header table truncated")?;
        let sh = SectionHeader32::parse(raw, hdr.ident.encoding)?;
        print_section(i, &sh, strtab);
    }

    println!("\nProgram headers ({}):", hdr.phnum);
    for i in 0..usize::from(hdr.phnum) {
        let off = hdr.phoff as usize + i * PHDR32_SIZE;
        let raw = data
            .get(off..off + PHDR32_SIZE)
            .context("program header table truncated")?;
        let ph = ProgramHeader32::parse(raw, hdr.ident.encoding)?;
        print_segment(i, &ph);
    }

    Ok(())
}

fn print_file_header(hdr: &Elf32Header) {
    println!("ELF file header:");
    println!("\tClass: {:?}", hdr.ident.class);
    println!("\tEncoding: {:?}", hdr.ident.encoding);
    println!("\tType: {:#06x}", hdr.etype);
    println!(
        "\tMachine: {:#06x} ({})",
        hdr.machine,
        machine::machine_name(hdr.machine)
    );
    println!("\tVersion: {:#010x}", hdr.version);
    println!("\tEntry Point: {:#010x}", hdr.entry);
    println!("\tProgram Header Offset: {:#010x}", hdr.phoff);
    println!("\tSection Header Offset: {:#010x}", hdr.shoff);
    println!("\tFlags: {:#010x}", hdr.flags);
    println!("\tHeader Size: {} bytes", hdr.ehsize);
    println!("\tProgram Headers: {} x {} bytes", hdr.phnum, hdr.phentsize);
    println!("\tSection Headers: {} x {} bytes", hdr.shnum, hdr.shentsize);
    println!("\tString Table Index: {}", hdr.shstrndx);
}

/// Borrows the section-name string table, if the header points at a sane
/// one.
fn section_name_table<'a>(data: &'a [u8], hdr: &Elf32Header) -> Option<&'a [u8]> {
    if hdr.shstrndx == 0 || hdr.shstrndx >= hdr.shnum {
        return None;
    }
    let off = hdr.shoff as usize + usize::from(hdr.shstrndx) * SHDR32_SIZE;
    let sh = SectionHeader32::parse(data.get(off..off + SHDR32_SIZE)?, hdr.ident.encoding).ok()?;
    let end = sh.offset.checked_add(sh.size)?;
    data.get(sh.offset as usize..end as usize)
}

/// Looks a section name up in the string table.
fn section_name<'a>(strtab: Option<&'a [u8]>, index: u32) -> &'a str {
    let Some(tab) = strtab else { return "<none>" };
    let Some(rest) = tab.get(index as usize..) else {
        return "<bad index>";
    };
    let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
    std::str::from_utf8(&rest[..end]).unwrap_or("<non-utf8>")
}

/// `AWX`-style rendering of the allocate/write/execute flags.
fn render_flags(sh: &SectionHeader32) -> [char; 3] {
    [
        if sh.is_alloc() { 'A' } else { '-' },
        if sh.is_writable() { 'w' } else { '-' },
        if sh.is_executable() { 'x' } else { '-' },
    ]
}

fn print_section(index: usize, sh: &SectionHeader32, strtab: Option<&[u8]>) {
    let [a, w, x] = render_flags(sh);
    println!(
        "[{index:2}] {:<20} {:<12} {a}{w}{x} addr {:#010x} off {:#010x} size {:#010x}",
        section_name(strtab, sh.name),
        sh.type_name(),
        sh.addr,
        sh.offset,
        sh.size,
    );
    println!(
        "     link {:#010x} info {:#010x} align {:#010x} entsize {:#010x}",
        sh.link, sh.info, sh.addralign, sh.entsize
    );
}

fn print_segment(index: usize, ph: &ProgramHeader32) {
    let load = if ph.is_load() { "LOAD" } else { "    " };
    println!(
        "[{index:2}] {load} type {:#010x} off {:#010x} paddr {:#010x} filesz {:#010x} memsz {:#010x}",
        ph.ptype, ph.offset, ph.paddr, ph.filesz, ph.memsz
    );
}
