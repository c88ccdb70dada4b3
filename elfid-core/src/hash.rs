use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ByteOrder};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512_256};

use crate::error::ElfError;
use crate::sections::Section;

/// Sections that never contribute to the content fingerprint:
/// signatures, comments, debug aids and linker scaffolding. Matched by
/// exact name, so `.debug_info` and `.note.ABI-tag` still count as
/// content.
const EXCLUDED_SECTIONS: &[&str] = &[
    ".SUNW_signature",
    ".comment",
    ".SUNW_dof",
    ".debug",
    ".plt",
    ".rela.bss",
    ".rela.plt",
    ".line",
    ".note",
    ".compcom",
];

const CHUNK_SIZE: usize = 64 * 1024;

// The digest prefixes and lengths are a wire contract with package
// consumers; they change only together with the extraction logic.
const PREFIX_SHA256: &str = "gelf:sha256:";
const PREFIX_USHA256: &str = "gelf.unsigned:sha256:";
const PREFIX_SHA512T: &str = "gelf:sha512t_256:";
const PREFIX_USHA512T: &str = "gelf.unsigned:sha512t_256:";

/// Selects which digests to compute. Each flag is independent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HashRequest {
    /// Legacy single SHA-1 digest, unprefixed.
    pub elfhash: bool,
    /// SHA-256 signed/unsigned pair.
    pub sha256: bool,
    /// SHA-512/256 signed/unsigned pair.
    pub sha512t_256: bool,
}

impl HashRequest {
    pub fn all() -> Self {
        HashRequest {
            elfhash: true,
            sha256: true,
            sha512t_256: true,
        }
    }
}

/// Hex digest strings computed over the semantically significant
/// sections. Fields are populated according to the [`HashRequest`]
/// that produced the bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashBundle {
    pub elfhash: Option<String>,
    pub hash_sha256: Option<String>,
    pub uhash_sha256: Option<String>,
    pub hash_sha512t_256: Option<String>,
    pub uhash_sha512t_256: Option<String>,
}

struct HashData {
    sha1: Option<Sha1>,
    sha256: Option<Sha256>,
    sha512: Option<Sha512_256>,
}

impl HashData {
    fn new(request: HashRequest) -> Self {
        HashData {
            sha1: request.elfhash.then(|| Sha1::new()),
            sha256: request.sha256.then(|| Sha256::new()),
            sha512: request.sha512t_256.then(|| Sha512_256::new()),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        if let Some(h) = self.sha1.as_mut() {
            h.update(bytes);
        }
        if let Some(h) = self.sha256.as_mut() {
            h.update(bytes);
        }
        if let Some(h) = self.sha512.as_mut() {
            h.update(bytes);
        }
    }
}

// A zero-fill section has no backing bytes, so its declared size
// stands in for its content. Network byte order, split into two 32-bit
// words high-first, so the fingerprint is identical across hosts.
pub(crate) fn no_bits_encoding(size: u64) -> [u8; 8] {
    let mut enc = [0u8; 8];
    BigEndian::write_u32(&mut enc[..4], (size >> 32) as u32);
    BigEndian::write_u32(&mut enc[4..], size as u32);
    enc
}

/// Streams every non-excluded section, in table order, into the
/// requested digests and renders the prefixed hex strings.
pub(crate) fn compute<R: Read + Seek>(
    reader: &mut R,
    sections: &[Section],
    request: HashRequest,
) -> Result<HashBundle, ElfError> {
    let mut hashes = HashData::new(request);
    let mut buf = [0u8; CHUNK_SIZE];

    // Index 0 is the null entry; the traversal starts past it, as
    // elf_nextscn does.
    for section in sections.iter().skip(1) {
        if EXCLUDED_SECTIONS.contains(&section.name.as_str()) {
            log::trace!("not hashing section {}", section.name);
            continue;
        }
        if section.is_no_bits() {
            hashes.update(&no_bits_encoding(section.size));
            continue;
        }
        let mut remaining = section.size;
        if remaining == 0 {
            continue;
        }
        reader.seek(SeekFrom::Start(section.offset))?;
        while remaining > 0 {
            let n = remaining.min(CHUNK_SIZE as u64) as usize;
            reader.read_exact(&mut buf[..n])?;
            hashes.update(&buf[..n]);
            remaining -= n as u64;
        }
    }

    let mut bundle = HashBundle::default();
    if let Some(h) = hashes.sha1 {
        bundle.elfhash = Some(hex_digest(h.finalize().as_slice()));
    }
    if let Some(h) = hashes.sha256 {
        // Signed and unsigned content are currently extracted
        // identically; both strings wrap one digest.
        let hex = hex_digest(h.finalize().as_slice());
        bundle.hash_sha256 = Some(format!("{PREFIX_SHA256}{hex}"));
        bundle.uhash_sha256 = Some(format!("{PREFIX_USHA256}{hex}"));
    }
    if let Some(h) = hashes.sha512 {
        let hex = hex_digest(h.finalize().as_slice());
        bundle.hash_sha512t_256 = Some(format!("{PREFIX_SHA512T}{hex}"));
        bundle.uhash_sha512t_256 = Some(format!("{PREFIX_USHA512T}{hex}"));
    }
    Ok(bundle)
}

fn hex_digest(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(
        String::with_capacity(bytes.len() * 2),
        |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        },
    )
}
