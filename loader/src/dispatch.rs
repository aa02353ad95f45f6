//! The boot dispatcher.
//!
//! A small state machine driven from the console prompt: resolve the typed
//! line into a kernel name and command line, open the file, classify its
//! format from the name and leading bytes, delegate to the matching loader,
//! and finally hand control to the image. Every failure, at any stage,
//! drops back to the prompt: a boot failure must never leave the box
//! without a console, so there is no "halt" state and the loop never exits.

use core::fmt::{self, Write as _};

use muon_elf::{Class, Ident};
use muon_mzip::MzipHeader;

use crate::dir::DirectoryFormat;
use crate::elf;
use crate::error::{FormatError, LoadError};
use crate::io::{FlashFile, Whence, NAME_MAX};
use crate::lzma::{self, LzmaDecode};
use crate::mem::LoadTarget;
use crate::transfer::{self, Handoff};
use crate::{berror, binfo, bprint};

/// Maximum command-line length, NUL terminator excluded.
pub const CMD_LINE_MAX: usize = 255;

/// Maximum prompt line length.
pub const LINE_MAX: usize = 128;

// ---------------------------------------------------------------------------
// Platform seam
// ---------------------------------------------------------------------------

/// Everything the dispatcher needs from the hardware platform.
///
/// One implementation per router family, provided by the bare-metal entry
/// crate; tests provide a synthetic one.
pub trait Platform {
    /// The flash directory entry layout for this family.
    type DirFmt: DirectoryFormat;

    /// The memory-mapped flash region.
    fn flash(&self) -> &[u8];

    /// Installed RAM, in kilobytes.
    fn memory_kb(&self) -> u32;

    /// Boot console baud rate.
    fn console_baud(&self) -> u32;

    /// Physical address the kernel command line is written at.
    fn command_line_base(&self) -> u32;

    /// Address of the resident copy stub used for staged handoffs.
    fn stage_two_addr(&self) -> u32;

    /// Address a decompressed kernel image is placed and entered at.
    fn kernel_load_addr(&self) -> u32;

    /// Reads one line from the console into `buf`, returning its length.
    fn read_line(&mut self, buf: &mut [u8]) -> usize;
}

// ---------------------------------------------------------------------------
// Resolving
// ---------------------------------------------------------------------------

/// A bounded, NUL-terminated command-line accumulator.
///
/// Writes past capacity truncate silently; a boot command line that long is
/// already wrong.
pub struct CmdLine {
    buf: [u8; CMD_LINE_MAX + 1],
    len: usize,
}

impl CmdLine {
    /// An empty command line.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: [0; CMD_LINE_MAX + 1],
            len: 0,
        }
    }

    /// The accumulated text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }

    /// The accumulated bytes including the NUL terminator, ready to be
    /// copied to the kernel's command-line address.
    #[must_use]
    pub fn bytes_with_nul(&self) -> &[u8] {
        &self.buf[..self.len + 1]
    }
}

impl Default for CmdLine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Write for CmdLine {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = CMD_LINE_MAX - self.len;
        let n = s.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        Ok(())
    }
}

/// A resolved prompt line: kernel file name plus the command line to hand
/// to it.
pub struct BootRequest {
    kernel: [u8; NAME_MAX],
    kernel_len: usize,
    /// The command line, console specification included.
    pub cmdline: CmdLine,
}

impl BootRequest {
    /// The kernel file name to look up.
    #[must_use]
    pub fn kernel(&self) -> &str {
        core::str::from_utf8(&self.kernel[..self.kernel_len]).unwrap_or("")
    }
}

/// Splits a prompt line at the first space into kernel name and command
/// line, and appends a console specification derived from the detected baud
/// rate unless the user already gave one.
#[must_use]
pub fn resolve(line: &str, baud: u32) -> BootRequest {
    let line = line.trim_end();
    let (name, rest) = match line.find(' ') {
        Some(at) => (&line[..at], &line[at + 1..]),
        None => (line, ""),
    };

    let mut kernel = [0u8; NAME_MAX];
    let kernel_len = name.len().min(NAME_MAX);
    kernel[..kernel_len].copy_from_slice(&name.as_bytes()[..kernel_len]);

    let mut cmdline = CmdLine::new();
    if rest.is_empty() {
        let _ = write!(cmdline, "console=ttyS0,{baud}");
    } else if rest.contains("console") {
        let _ = cmdline.write_str(rest);
    } else {
        let _ = write!(cmdline, "{rest} console=ttyS0,{baud}");
    }

    BootRequest {
        kernel,
        kernel_len,
        cmdline,
    }
}

// ---------------------------------------------------------------------------
// Classifying
// ---------------------------------------------------------------------------

/// What kind of image a file turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// 32-bit ELF executable.
    Elf32,
    /// 64-bit ELF executable.
    Elf64,
    /// Raw compressed kernel, recognized by naming convention.
    LzmaWrapped,
    /// Self-extracting container image.
    Container,
}

/// Classifies an open file from its name and leading bytes.
///
/// # Errors
///
/// Returns [`FormatError::UnknownImageFormat`] when nothing matches, and
/// the ELF structural errors when the magic matches but the ident block is
/// malformed.
pub fn classify(fp: &mut FlashFile<'_>) -> Result<ImageKind, LoadError> {
    if fp.name().ends_with(".lzma") {
        return Ok(ImageKind::LzmaWrapped);
    }

    let mut head = [0u8; 16];
    fp.seek(0, Whence::Set)?;
    let n = fp.read(&mut head);
    let head = &head[..n];

    if Ident::matches_magic(head) {
        let ident = Ident::parse(head)?;
        return Ok(match ident.class {
            Class::Elf32 => ImageKind::Elf32,
            Class::Elf64 => ImageKind::Elf64,
        });
    }
    if MzipHeader::matches_magic(head) {
        return Ok(ImageKind::Container);
    }
    Err(FormatError::UnknownImageFormat.into())
}

// ---------------------------------------------------------------------------
// Loading and transferring
// ---------------------------------------------------------------------------

/// Runs one load attempt end to end, up to (but not including) the jump.
///
/// On success, returns the handoff description and the physical address the
/// command line was written at. Separating the attempt from the jump is
/// what keeps the whole pipeline testable: only [`run`] ever transfers
/// control.
///
/// # Errors
///
/// Any [`LoadError`]; the caller decides whether to retry.
pub fn boot_attempt<P: Platform>(
    platform: &P,
    target: &mut impl LoadTarget,
    decoder: &mut dyn LzmaDecode,
    request: &BootRequest,
) -> Result<(Handoff, u32), LoadError> {
    let mut fp = FlashFile::open::<P::DirFmt>(platform.flash(), request.kernel())?;
    let kind = classify(&mut fp)?;

    let cmd_base = platform.command_line_base();
    target.copy_to(u64::from(cmd_base), request.cmdline.bytes_with_nul())?;

    let handoff = match kind {
        ImageKind::Elf32 => {
            let image = elf::load_elf32(&mut fp, target)?;
            staged(platform, &image)
        }
        ImageKind::Elf64 => {
            let image = elf::load_elf64(&mut fp, target)?;
            staged(platform, &image)
        }
        ImageKind::LzmaWrapped => lzma::load_lzma(
            &mut fp,
            decoder,
            target,
            u64::from(platform.kernel_load_addr()),
        )?,
        ImageKind::Container => return Err(FormatError::ContainerNotBootable.into()),
    };

    Ok((handoff, cmd_base))
}

fn staged<P: Platform>(platform: &P, image: &elf::LoadedImage) -> Handoff {
    Handoff::Staged {
        stub: platform.stage_two_addr(),
        data_offset: image.staging_addr() as u32,
        length: image.footprint as u32,
        entry: image.entry as u32,
        load_addr: image.lowest_paddr as u32,
    }
}

/// The interactive boot loop. Prompts, attempts, and on success never
/// returns; on failure logs the diagnostic and prompts again, forever.
pub fn run<P: Platform>(
    platform: &mut P,
    target: &mut impl LoadTarget,
    decoder: &mut dyn LzmaDecode,
) -> ! {
    loop {
        bprint!("\nEnter filename to boot:\n> ");

        let mut line = [0u8; LINE_MAX];
        let n = platform.read_line(&mut line);
        let Ok(line) = core::str::from_utf8(&line[..n]) else {
            berror!("unreadable input line");
            continue;
        };

        let baud = platform.console_baud();
        binfo!("boot console baud rate: {baud}");
        let request = resolve(line, baud);
        if request.kernel().is_empty() {
            continue;
        }

        binfo!("attempting to load file {}", request.kernel());
        match boot_attempt(platform, target, decoder, &request) {
            Ok((handoff, cmd_line)) => {
                binfo!("booting {}", request.kernel());
                // SAFETY: the attempt succeeded, so a complete image sits at
                // the handoff addresses and the command line is in place.
                unsafe { transfer::execute(handoff, platform.memory_kb(), cmd_line) }
            }
            Err(e) => berror!("{e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dir::tests::{emit_compact, emit_extended};
    use crate::dir::{CompactFormat, ExtendedFormat};
    use crate::elf::tests::{build_elf32, Segment};
    use crate::error::IoError;
    use crate::lzma::{PullSource, LZMA_PROPS_SIZE};
    use crate::mem::SliceTarget;
    use alloc::vec;
    use alloc::vec::Vec;

    // ---- resolve ---------------------------------------------------------

    #[test]
    fn bare_name_gets_a_console_specification() {
        let req = resolve("vmlinux\n", 9600);
        assert_eq!(req.kernel(), "vmlinux");
        assert_eq!(req.cmdline.as_str(), "console=ttyS0,9600");
        assert_eq!(req.cmdline.bytes_with_nul().last(), Some(&0));
    }

    #[test]
    fn explicit_console_is_left_alone() {
        let req = resolve("vmlinux root=/dev/sda1 console=ttyS1,115200", 9600);
        assert_eq!(req.kernel(), "vmlinux");
        assert_eq!(req.cmdline.as_str(), "root=/dev/sda1 console=ttyS1,115200");
    }

    #[test]
    fn missing_console_is_appended_after_the_user_arguments() {
        let req = resolve("vmlinux root=/dev/sda1 ro", 115_200);
        assert_eq!(
            req.cmdline.as_str(),
            "root=/dev/sda1 ro console=ttyS0,115200"
        );
    }

    #[test]
    fn overlong_command_lines_truncate_instead_of_overflowing() {
        let mut line = alloc::string::String::from("k ");
        for _ in 0..600 {
            line.push('x');
        }
        let req = resolve(&line, 9600);
        assert_eq!(req.cmdline.as_str().len(), CMD_LINE_MAX);
    }

    // ---- classify --------------------------------------------------------

    fn open_one<'a>(flash: &'a [u8], name: &str) -> FlashFile<'a> {
        FlashFile::open::<CompactFormat>(flash, name).unwrap()
    }

    #[test]
    fn classifies_by_name_and_leading_bytes() {
        let elf32 = build_elf32(
            0,
            &[Segment {
                ptype: 1,
                paddr: 0,
                data: vec![0; 4],
                memsz: 4,
            }],
        );
        let mut elf64_head = vec![0x7f, b'E', b'L', b'F', 2, 2, 1];
        elf64_head.resize(64, 0);

        let mut flash = Vec::new();
        emit_compact(&mut flash, "k32", &elf32);
        emit_compact(&mut flash, "k64", &elf64_head);
        emit_compact(&mut flash, "kernel.lzma", &[0x5d; 32]);
        emit_compact(&mut flash, "container", b"MZIP\0\0\0\x01rest");
        emit_compact(&mut flash, "noise", b"#!/bin/sh echo no");

        assert_eq!(
            classify(&mut open_one(&flash, "k32")).unwrap(),
            ImageKind::Elf32
        );
        assert_eq!(
            classify(&mut open_one(&flash, "k64")).unwrap(),
            ImageKind::Elf64
        );
        assert_eq!(
            classify(&mut open_one(&flash, "kernel.lzma")).unwrap(),
            ImageKind::LzmaWrapped
        );
        assert_eq!(
            classify(&mut open_one(&flash, "container")).unwrap(),
            ImageKind::Container
        );
        assert_eq!(
            classify(&mut open_one(&flash, "noise")),
            Err(LoadError::Format(FormatError::UnknownImageFormat))
        );
    }

    // ---- boot_attempt ----------------------------------------------------

    struct TestPlatform {
        flash: Vec<u8>,
    }

    impl Platform for TestPlatform {
        type DirFmt = CompactFormat;

        fn flash(&self) -> &[u8] {
            &self.flash
        }
        fn memory_kb(&self) -> u32 {
            32 * 1024
        }
        fn console_baud(&self) -> u32 {
            9600
        }
        fn command_line_base(&self) -> u32 {
            0x0
        }
        fn stage_two_addr(&self) -> u32 {
            0x1f00
        }
        fn kernel_load_addr(&self) -> u32 {
            0x2000
        }
        fn read_line(&mut self, _buf: &mut [u8]) -> usize {
            0
        }
    }

    /// Decoder that ignores its input and writes `out_size` 0x5a bytes.
    struct StubDecoder;

    impl LzmaDecode for StubDecoder {
        fn decode(
            &mut self,
            _props: &[u8; LZMA_PROPS_SIZE],
            src: &mut dyn PullSource,
            target: &mut dyn LoadTarget,
            dst_addr: u64,
            out_size: u32,
        ) -> Result<(), LoadError> {
            let _ = src.next_chunk()?;
            for i in 0..u64::from(out_size) {
                target.copy_to(dst_addr + i, &[0x5a])?;
            }
            Ok(())
        }
    }

    #[test]
    fn elf32_attempt_stages_the_image_and_writes_the_command_line() {
        let elf = build_elf32(
            0x100,
            &[Segment {
                ptype: 1,
                paddr: 0x100,
                data: vec![0xd0; 8],
                memsz: 8,
            }],
        );
        let mut flash = Vec::new();
        emit_compact(&mut flash, "vmlinux", &elf);
        let platform = TestPlatform { flash };

        let mut mem = vec![0u8; 0x1000];
        let mut target = SliceTarget::new(0, &mut mem);
        let request = resolve("vmlinux", platform.console_baud());

        let (handoff, cmd) =
            boot_attempt(&platform, &mut target, &mut StubDecoder, &request).unwrap();

        assert_eq!(cmd, 0);
        assert_eq!(
            handoff,
            Handoff::Staged {
                stub: 0x1f00,
                data_offset: 8 + 0x100,
                length: 8,
                entry: 0x100,
                load_addr: 0x100,
            }
        );
        // Command line at its base, segment at footprint + paddr.
        assert!(mem.starts_with(b"console=ttyS0,9600\0"));
        assert_eq!(&mem[0x108..0x110], &[0xd0; 8]);
    }

    #[test]
    fn lzma_attempt_hands_off_directly_to_the_load_address() {
        let mut file = vec![0x5d, 0, 0, 0, 1];
        file.extend_from_slice(&16u32.to_le_bytes());
        file.extend_from_slice(&[0; 4]);
        file.extend_from_slice(&[0xee; 100]);

        let mut flash = Vec::new();
        emit_compact(&mut flash, "vmlinux.lzma", &file);
        let platform = TestPlatform { flash };

        let mut mem = vec![0u8; 0x3000];
        let mut target = SliceTarget::new(0, &mut mem);
        let request = resolve("vmlinux.lzma", 9600);

        let (handoff, _) =
            boot_attempt(&platform, &mut target, &mut StubDecoder, &request).unwrap();
        assert_eq!(handoff, Handoff::Direct { entry: 0x2000 });
        assert_eq!(&mem[0x2000..0x2010], &[0x5a; 16]);
    }

    #[test]
    fn missing_file_and_garbage_magic_fail_without_loading() {
        let mut flash = Vec::new();
        emit_compact(&mut flash, "junk", b"this is not a kernel");
        let platform = TestPlatform { flash };

        let mut mem = vec![0u8; 64];
        let mut target = SliceTarget::new(0, &mut mem);

        let missing = resolve("absent", 9600);
        assert_eq!(
            boot_attempt(&platform, &mut target, &mut StubDecoder, &missing),
            Err(LoadError::Io(IoError::FileNotFound))
        );

        let garbage = resolve("junk", 9600);
        assert_eq!(
            boot_attempt(&platform, &mut target, &mut StubDecoder, &garbage),
            Err(LoadError::Format(FormatError::UnknownImageFormat))
        );
        // Classification failed before anything was placed.
        assert!(mem.iter().all(|&b| b == 0));
    }

    #[test]
    fn container_images_are_refused_with_a_format_error() {
        let mut image = vec![];
        image.extend_from_slice(b"MZIP");
        image.resize(0x80, 0);

        let mut flash = Vec::new();
        emit_compact(&mut flash, "rommon.bin", &image);
        let platform = TestPlatform { flash };

        let mut mem = vec![0u8; 64];
        let mut target = SliceTarget::new(0, &mut mem);
        let request = resolve("rommon.bin", 9600);
        assert_eq!(
            boot_attempt(&platform, &mut target, &mut StubDecoder, &request),
            Err(LoadError::Format(FormatError::ContainerNotBootable))
        );
    }

    #[test]
    fn extended_format_platforms_resolve_through_their_own_layout() {
        struct ExtPlatform {
            flash: Vec<u8>,
        }
        impl Platform for ExtPlatform {
            type DirFmt = ExtendedFormat;
            fn flash(&self) -> &[u8] {
                &self.flash
            }
            fn memory_kb(&self) -> u32 {
                64 * 1024
            }
            fn console_baud(&self) -> u32 {
                115_200
            }
            fn command_line_base(&self) -> u32 {
                0
            }
            fn stage_two_addr(&self) -> u32 {
                0
            }
            fn kernel_load_addr(&self) -> u32 {
                0x800
            }
            fn read_line(&mut self, _buf: &mut [u8]) -> usize {
                0
            }
        }

        let elf = build_elf32(
            0,
            &[Segment {
                ptype: 1,
                paddr: 0,
                data: vec![1; 4],
                memsz: 4,
            }],
        );
        let mut flash = Vec::new();
        emit_extended(&mut flash, "ios.elf", &elf);
        let platform = ExtPlatform { flash };

        let mut mem = vec![0u8; 0x100];
        let mut target = SliceTarget::new(0, &mut mem);
        let request = resolve("ios.elf", 115_200);
        boot_attempt(&platform, &mut target, &mut StubDecoder, &request).unwrap();
        assert_eq!(&mem[4..8], &[1; 4]);
    }
}
