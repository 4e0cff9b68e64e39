//! Chroma subsampling of a JPEG, read from its frame header.
//!
//! `jpegtran -drop` only accepts an insert whose component count and
//! sampling factors equal the target's, so the scale-bar strip is encoded
//! with whatever the capture uses:
//!
//! ```text
//! SOFn  len:2  precision:1  height:2  width:2  ncomp:1  { id:1  HV:1  tq:1 } × ncomp
//!                                                             └─ H = HV >> 4, V = HV & 0x0f
//! ```

use super::backend::BackendError;
use jpeg_encoder::SamplingFactor;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Sampling layout of a JPEG frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    /// One component.
    Gray,
    /// Three components: luma factors `h`×`v`, both chroma planes 1×1.
    Color { h: u8, v: u8 },
}

impl Sampling {
    /// 4:2:2, used when the capture's layout cannot be reproduced.
    pub const FALLBACK: Sampling = Sampling::Color { h: 2, v: 1 };

    /// Encoder factor for a colour layout; `None` for gray or layouts the
    /// encoder cannot write.
    pub fn factor(self) -> Option<SamplingFactor> {
        match self {
            Sampling::Gray => None,
            Sampling::Color { h, v } => match (h, v) {
                (1, 1) => Some(SamplingFactor::F_1_1),
                (2, 1) => Some(SamplingFactor::F_2_1),
                (1, 2) => Some(SamplingFactor::F_1_2),
                (2, 2) => Some(SamplingFactor::F_2_2),
                (4, 1) => Some(SamplingFactor::F_4_1),
                (4, 2) => Some(SamplingFactor::F_4_2),
                _ => None,
            },
        }
    }
}

impl std::fmt::Display for Sampling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sampling::Gray => write!(f, "gray"),
            Sampling::Color { h, v } => write!(f, "{}x{}", h, v),
        }
    }
}

fn malformed(path: &Path, what: &str) -> BackendError {
    BackendError::ProcessingFailed(format!("{}: {}", path.display(), what))
}

fn read_u8(reader: &mut impl Read) -> std::io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u16(reader: &mut impl Read) -> std::io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

/// SOF0..SOF15 minus DHT (C4), JPG (C8) and DAC (CC).
fn is_frame_marker(marker: u8) -> bool {
    (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}

/// Markers without a length field.
fn is_standalone(marker: u8) -> bool {
    matches!(marker, 0x01 | 0xD0..=0xD7)
}

/// Read the sampling layout from the first frame header of `path`.
pub fn read_sampling(path: &Path) -> Result<Sampling, BackendError> {
    let mut reader = BufReader::new(File::open(path)?);
    if read_u16(&mut reader)? != 0xFFD8 {
        return Err(malformed(path, "not a JPEG (missing SOI)"));
    }

    loop {
        if read_u8(&mut reader)? != 0xFF {
            return Err(malformed(path, "expected marker"));
        }
        let mut marker = read_u8(&mut reader)?;
        while marker == 0xFF {
            marker = read_u8(&mut reader)?;
        }
        if is_standalone(marker) {
            continue;
        }
        if marker == 0xDA || marker == 0xD9 {
            return Err(malformed(path, "no frame header before scan data"));
        }

        let length = read_u16(&mut reader)?;
        if length < 2 {
            return Err(malformed(path, "segment length below 2"));
        }
        if !is_frame_marker(marker) {
            std::io::copy(
                &mut (&mut reader).take(u64::from(length - 2)),
                &mut std::io::sink(),
            )?;
            continue;
        }

        let mut header = [0u8; 6];
        reader.read_exact(&mut header)?;
        let components = header[5];
        let mut factors = Vec::with_capacity(usize::from(components));
        for _ in 0..components {
            let mut spec = [0u8; 3];
            reader.read_exact(&mut spec)?;
            factors.push((spec[1] >> 4, spec[1] & 0x0F));
        }

        return match factors.as_slice() {
            [_] => Ok(Sampling::Gray),
            [(h, v), (1, 1), (1, 1)] => Ok(Sampling::Color { h: *h, v: *v }),
            _ => Err(malformed(
                path,
                &format!("unsupported component layout {:?}", factors),
            )),
        };
    }
}
