//! Pull-callback glue around the external LZMA decoder.
//!
//! The entropy decoding itself is a black box behind [`LzmaDecode`]; this
//! module owns everything around it: the stream header (a fixed 5-byte
//! properties block, then the declared uncompressed size as 4 raw
//! little-endian bytes, then 4 ignored bytes of the 64-bit size field), the
//! bounded 512-byte refill buffer, and the coarse progress ticker on the
//! console.

use crate::error::{DecodeError, LoadError};
use crate::io::{FlashFile, Whence};
use crate::mem::LoadTarget;
use crate::transfer::Handoff;
use crate::{berror, binfo, bprint, bprintln};

/// Size of the properties block at the start of a compressed image.
pub const LZMA_PROPS_SIZE: usize = 5;

/// Size of the bounded refill buffer.
pub const CHUNK_SIZE: usize = 512;

/// Pull-style input handed to the decoder: each call returns the next chunk
/// of compressed bytes.
pub trait PullSource {
    /// Refills and returns the next chunk.
    ///
    /// # Errors
    ///
    /// Returns a data error when the decoder asks for bytes past the end of
    /// the recorded file length.
    fn next_chunk(&mut self) -> Result<&[u8], LoadError>;
}

/// The external entropy decoder.
///
/// Implementations pull compressed bytes from `src` on demand and write
/// decompressed output through `target`, starting at `dst_addr`, until
/// `out_size` bytes have been produced.
pub trait LzmaDecode {
    /// Runs the decode.
    ///
    /// # Errors
    ///
    /// Returns a decode error on a corrupt stream; whatever was already
    /// written stays written, but the caller must not execute it.
    fn decode(
        &mut self,
        props: &[u8; LZMA_PROPS_SIZE],
        src: &mut dyn PullSource,
        target: &mut dyn LoadTarget,
        dst_addr: u64,
        out_size: u32,
    ) -> Result<(), LoadError>;
}

// ---------------------------------------------------------------------------
// Progress feedback
// ---------------------------------------------------------------------------

/// One console tick of decompression progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressTick {
    /// A decade boundary: print the percentage itself.
    Percent(u32),
    /// An even-percent boundary between decades: print a dot.
    Dot,
}

/// Deduplicating progress ticker: every 10% prints the number, every 2% a
/// dot, and a percentage is never reported twice.
#[derive(Debug)]
pub struct ProgressTracker {
    total: u32,
    consumed: u32,
    last: u32,
}

impl ProgressTracker {
    /// A tracker over `total` compressed bytes.
    #[must_use]
    pub fn new(total: u32) -> Self {
        Self {
            total,
            consumed: 0,
            // Start outside the 0..=100 range so the first boundary fires.
            last: u32::MAX,
        }
    }

    /// Accounts for `n` more consumed bytes; returns the tick to print, if
    /// this step crossed a fresh boundary.
    pub fn advance(&mut self, n: u32) -> Option<ProgressTick> {
        self.consumed += n;
        if self.total == 0 {
            return None;
        }
        let done = (u64::from(self.consumed) * 100 / u64::from(self.total)) as u32;
        if done % 10 == 0 && done != self.last {
            self.last = done;
            Some(ProgressTick::Percent(done))
        } else if done != self.last && done % 2 == 0 {
            self.last = done;
            Some(ProgressTick::Dot)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// File-backed pull source
// ---------------------------------------------------------------------------

/// Refills a fixed 512-byte buffer from a [`FlashFile`], ticking progress.
pub struct FileSource<'f, 'a> {
    fp: &'f mut FlashFile<'a>,
    buffer: [u8; CHUNK_SIZE],
    progress: ProgressTracker,
}

impl<'f, 'a> FileSource<'f, 'a> {
    /// Wraps `fp` at its current position.
    pub fn new(fp: &'f mut FlashFile<'a>) -> Self {
        let total = fp.len();
        Self {
            fp,
            buffer: [0; CHUNK_SIZE],
            progress: ProgressTracker::new(total),
        }
    }
}

impl PullSource for FileSource<'_, '_> {
    fn next_chunk(&mut self) -> Result<&[u8], LoadError> {
        let remaining = self.fp.len() - self.fp.tell();
        if remaining == 0 {
            bprintln!();
            berror!("attempt to read past end of file");
            return Err(DecodeError::Data.into());
        }

        let n = (remaining as usize).min(CHUNK_SIZE);
        match self.progress.advance(n as u32) {
            Some(ProgressTick::Percent(p)) => bprint!("{p}"),
            Some(ProgressTick::Dot) => bprint!("."),
            None => {}
        }

        self.fp.read_exact(&mut self.buffer[..n])?;
        Ok(&self.buffer[..n])
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Loads a compressed kernel image: decodes the stream header, runs the
/// external decoder against the destination address, and describes the
/// direct jump to take on success.
///
/// # Errors
///
/// Fails with a decode error on bad properties or a corrupt stream, and
/// with an I/O error on a file too short to hold the stream header. No
/// partial image is ever executed.
pub fn load_lzma(
    fp: &mut FlashFile<'_>,
    decoder: &mut dyn LzmaDecode,
    target: &mut dyn LoadTarget,
    load_address: u64,
) -> Result<Handoff, LoadError> {
    fp.seek(0, Whence::Set)?;

    let mut props = [0u8; LZMA_PROPS_SIZE];
    fp.read_exact(&mut props)?;

    // Declared uncompressed size: 4 raw little-endian bytes, then the high
    // half of the 64-bit field, which is skipped.
    let mut size_raw = [0u8; 4];
    fp.read_exact(&mut size_raw)?;
    let out_size = u32::from_le_bytes(size_raw);
    fp.seek(4, Whence::Cur)?;

    let mut src = FileSource::new(fp);
    decoder.decode(&props, &mut src, target, load_address, out_size)?;

    bprintln!();
    binfo!("starting kernel at {load_address:#010x}");
    Ok(Handoff::Direct {
        entry: load_address,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dir::tests::emit_compact;
    use crate::dir::CompactFormat;
    use crate::error::IoError;
    use crate::mem::SliceTarget;
    use alloc::vec;
    use alloc::vec::Vec;

    /// Builds a compressed-image file: 5-byte properties, 8-byte size
    /// field, then `body` as the "compressed" payload.
    fn lzma_file(out_size: u32, body: &[u8]) -> Vec<u8> {
        let mut v = vec![0x5d, 0, 0, 0, 1]; // properties block
        v.extend_from_slice(&out_size.to_le_bytes());
        v.extend_from_slice(&[0; 4]); // high half of the size field
        v.extend_from_slice(body);
        v
    }

    /// A fake decoder that drains the pull source and writes a counting
    /// pattern of `out_size` bytes to the destination.
    struct DrainDecoder {
        chunks_seen: usize,
        props_seen: [u8; LZMA_PROPS_SIZE],
    }

    impl LzmaDecode for DrainDecoder {
        fn decode(
            &mut self,
            props: &[u8; LZMA_PROPS_SIZE],
            src: &mut dyn PullSource,
            target: &mut dyn LoadTarget,
            dst_addr: u64,
            out_size: u32,
        ) -> Result<(), LoadError> {
            self.props_seen = *props;
            loop {
                match src.next_chunk() {
                    Ok(_) => self.chunks_seen += 1,
                    Err(LoadError::Decode(DecodeError::Data)) => break,
                    Err(e) => return Err(e),
                }
            }
            let pattern: Vec<u8> = (0..out_size).map(|i| i as u8).collect();
            target.copy_to(dst_addr, &pattern)
        }
    }

    #[test]
    fn decodes_header_and_hands_off_to_the_load_address() {
        let file = lzma_file(64, &[0xab; 1100]);
        let mut flash = Vec::new();
        emit_compact(&mut flash, "vmlinux.lzma", &file);
        let mut fp = FlashFile::open::<CompactFormat>(&flash, "vmlinux.lzma").unwrap();

        let mut mem = vec![0u8; 256];
        let mut target = SliceTarget::new(0x4000, &mut mem);
        let mut dec = DrainDecoder {
            chunks_seen: 0,
            props_seen: [0; LZMA_PROPS_SIZE],
        };

        let handoff = load_lzma(&mut fp, &mut dec, &mut target, 0x4000).unwrap();
        assert_eq!(handoff, Handoff::Direct { entry: 0x4000 });
        assert_eq!(dec.props_seen, [0x5d, 0, 0, 0, 1]);
        // 1100 payload bytes after the stream header: 512 + 512 + 76.
        assert_eq!(dec.chunks_seen, 3);
        assert_eq!(mem[63], 63);
    }

    #[test]
    fn too_short_for_the_stream_header_is_an_io_error() {
        let mut flash = Vec::new();
        emit_compact(&mut flash, "tiny.lzma", &[1, 2, 3]);
        let mut fp = FlashFile::open::<CompactFormat>(&flash, "tiny.lzma").unwrap();

        let mut mem = [0u8; 8];
        let mut target = SliceTarget::new(0, &mut mem);
        let mut dec = DrainDecoder {
            chunks_seen: 0,
            props_seen: [0; LZMA_PROPS_SIZE],
        };
        assert_eq!(
            load_lzma(&mut fp, &mut dec, &mut target, 0),
            Err(LoadError::Io(IoError::ShortRead))
        );
    }

    /// A decoder that reports a corrupt stream after one chunk.
    struct FailingDecoder;

    impl LzmaDecode for FailingDecoder {
        fn decode(
            &mut self,
            _props: &[u8; LZMA_PROPS_SIZE],
            src: &mut dyn PullSource,
            _target: &mut dyn LoadTarget,
            _dst_addr: u64,
            _out_size: u32,
        ) -> Result<(), LoadError> {
            let _ = src.next_chunk()?;
            Err(DecodeError::Data.into())
        }
    }

    #[test]
    fn decoder_failure_aborts_the_load() {
        let file = lzma_file(16, &[0; 600]);
        let mut flash = Vec::new();
        emit_compact(&mut flash, "bad.lzma", &file);
        let mut fp = FlashFile::open::<CompactFormat>(&flash, "bad.lzma").unwrap();

        let mut mem = [0u8; 32];
        let mut target = SliceTarget::new(0, &mut mem);
        assert_eq!(
            load_lzma(&mut fp, &mut FailingDecoder, &mut target, 0),
            Err(LoadError::Decode(DecodeError::Data))
        );
    }

    // ---- Progress ticker -------------------------------------------------

    #[test]
    fn progress_prints_decades_and_even_dots_without_repeats() {
        let mut p = ProgressTracker::new(100);
        let mut ticks = Vec::new();
        for _ in 0..100 {
            if let Some(t) = p.advance(1) {
                ticks.push(t);
            }
        }

        // Ten decade marks (0 never fires because the first step is already
        // 1%), four dots between each pair of decades.
        let percents: Vec<u32> = ticks
            .iter()
            .filter_map(|t| match t {
                ProgressTick::Percent(p) => Some(*p),
                ProgressTick::Dot => None,
            })
            .collect();
        assert_eq!(percents, [10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
        let dots = ticks
            .iter()
            .filter(|t| matches!(t, ProgressTick::Dot))
            .count();
        assert_eq!(dots, 40);
    }

    #[test]
    fn progress_is_deduplicated_on_tiny_steps() {
        let mut p = ProgressTracker::new(1000);
        let mut emitted = 0;
        for _ in 0..1000 {
            if p.advance(1).is_some() {
                emitted += 1;
            }
        }
        // One tick per distinct even percentage, 0 included: the first tiny
        // step rounds down to 0%, which prints once and never again.
        assert_eq!(emitted, 51);
    }
}
