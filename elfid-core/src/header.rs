use std::io::{self, Read, Seek, SeekFrom};

use goblin::elf::header::{self, Header};

use crate::error::ElfError;

// OS ABI lives at e_ident[7]; goblin stops exposing ident indexes after
// EI_VERSION, so carry the tail ourselves.
const EI_OSABI: usize = 7;
const ELFOSABI_NONE: u8 = 0;
const ELFOSABI_LINUX: u8 = 3;
const ELFOSABI_SOLARIS: u8 = 6;

/// Object file type, reduced to the classes the packaging layer
/// distinguishes.
///
/// Reference: `e_type` in the
/// [ELF Specification v1.2](https://refspecs.linuxfoundation.org/elf/elf.pdf).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfType {
    Exec,
    Dyn,
    Core,
    Rel,
    Other,
}

impl ElfType {
    fn from_e_type(e_type: u16) -> Self {
        match e_type {
            header::ET_EXEC => ElfType::Exec,
            header::ET_DYN => ElfType::Dyn,
            header::ET_CORE => ElfType::Core,
            header::ET_REL => ElfType::Rel,
            _ => ElfType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElfType::Exec => "exe",
            ElfType::Dyn => "so",
            ElfType::Core => "core",
            ElfType::Rel => "rel",
            ElfType::Other => "other",
        }
    }
}

/// Machine architecture families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    None,
    Sparc,
    I386,
    Ppc,
    Aarch64,
    Other,
}

impl Arch {
    fn from_e_machine(e_machine: u16) -> Self {
        match e_machine {
            header::EM_NONE => Arch::None,
            header::EM_SPARC | header::EM_SPARC32PLUS | header::EM_SPARCV9 => Arch::Sparc,
            // 64-bit x86 collapses into the i386 family string.
            header::EM_386 | header::EM_X86_64 => Arch::I386,
            header::EM_PPC | header::EM_PPC64 => Arch::Ppc,
            header::EM_AARCH64 => Arch::Aarch64,
            _ => Arch::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::None => "none",
            Arch::Sparc => "sparc",
            Arch::I386 => "i386",
            Arch::Ppc => "ppc",
            Arch::Aarch64 => "aarch64",
            Arch::Other => "other",
        }
    }
}

/// Data encoding (byte order) declared in `e_ident`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataEncoding {
    Lsb,
    Msb,
    Unknown,
}

impl DataEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataEncoding::Lsb => "lsb",
            DataEncoding::Msb => "msb",
            DataEncoding::Unknown => "unknown",
        }
    }
}

/// Declared OS ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsAbi {
    None,
    Linux,
    Solaris,
    Other,
}

impl OsAbi {
    pub fn as_str(&self) -> &'static str {
        match self {
            OsAbi::None => "none",
            OsAbi::Linux => "linux",
            OsAbi::Solaris => "solaris",
            OsAbi::Other => "other",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {$(
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    )*};
}

display_as_str!(ElfType, Arch, DataEncoding, OsAbi);

/// Immutable identity record extracted from an ELF header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfHeaderInfo {
    /// Object file type (executable, shared object, ...).
    pub kind: ElfType,
    /// Word size: 32 or 64.
    pub bits: u32,
    /// Machine architecture family.
    pub arch: Arch,
    /// Declared byte order.
    pub data: DataEncoding,
    /// Declared OS ABI.
    pub osabi: OsAbi,
}

impl ElfHeaderInfo {
    pub(crate) fn from_header(h: &Header) -> Self {
        ElfHeaderInfo {
            kind: ElfType::from_e_type(h.e_type),
            bits: if h.e_ident[header::EI_CLASS] == header::ELFCLASS32 {
                32
            } else {
                64
            },
            arch: Arch::from_e_machine(h.e_machine),
            data: match h.e_ident[header::EI_DATA] {
                header::ELFDATA2LSB => DataEncoding::Lsb,
                header::ELFDATA2MSB => DataEncoding::Msb,
                _ => DataEncoding::Unknown,
            },
            osabi: match h.e_ident[EI_OSABI] {
                ELFOSABI_NONE => OsAbi::None,
                ELFOSABI_LINUX => OsAbi::Linux,
                ELFOSABI_SOLARIS => OsAbi::Solaris,
                _ => OsAbi::Other,
            },
        }
    }
}

// Reads up to N leading bytes, tolerating files shorter than the
// request; the remainder stays zeroed.
fn read_prefix<R: Read + Seek, const N: usize>(
    reader: &mut R,
) -> Result<([u8; N], usize), ElfError> {
    let mut buf = [0u8; N];
    reader.seek(SeekFrom::Start(0))?;
    let mut filled = 0;
    while filled < N {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok((buf, filled))
}

fn ident_is_elf(ident: &[u8]) -> bool {
    ident.len() >= 4 && ident.starts_with(&header::ELFMAG[..])
}

/// Cheap ident probe: true when the file starts with the ELF magic.
///
/// Classifies arbitrary files without a structured parse; only I/O can
/// fail here.
pub fn is_elf<R: Read + Seek>(reader: &mut R) -> Result<bool, ElfError> {
    let (ident, filled) = read_prefix::<_, 16>(reader)?;
    Ok(ident_is_elf(&ident[..filled]))
}

/// Like [`is_elf`], additionally requiring the 32-bit class.
pub fn is_elf32<R: Read + Seek>(reader: &mut R) -> Result<bool, ElfError> {
    let (ident, filled) = read_prefix::<_, 16>(reader)?;
    Ok(ident_is_elf(&ident[..filled])
        && filled > header::EI_CLASS
        && ident[header::EI_CLASS] == header::ELFCLASS32)
}

/// Reads the identity record out of an object's ELF header.
///
/// Only the header bytes are touched; the rest of the file is never
/// read. Fails with [`ElfError::NotElf`] when the magic is absent and
/// [`ElfError::CorruptHeader`] when the magic matched but the header
/// itself is truncated or invalid.
pub fn get_info<R: Read + Seek>(reader: &mut R) -> Result<ElfHeaderInfo, ElfError> {
    crate::ensure_init();

    // Largest header variant (ELF64) is 64 bytes.
    let (buf, filled) = read_prefix::<_, 64>(reader)?;
    let buf = &buf[..filled];
    if !ident_is_elf(buf) {
        return Err(ElfError::NotElf);
    }
    let header =
        goblin::elf::Elf::parse_header(buf).map_err(|e| ElfError::CorruptHeader(e.to_string()))?;
    Ok(ElfHeaderInfo::from_header(&header))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ident(class: u8, data: u8, osabi: u8) -> [u8; 16] {
        let mut id = [0u8; 16];
        id[..4].copy_from_slice(&header::ELFMAG[..]);
        id[header::EI_CLASS] = class;
        id[header::EI_DATA] = data;
        id[6] = 1; // EV_CURRENT
        id[EI_OSABI] = osabi;
        id
    }

    fn ehdr64(e_type: u16, e_machine: u16, data: u8, osabi: u8) -> Vec<u8> {
        let mut h = vec![0u8; 64];
        h[..16].copy_from_slice(&ident(header::ELFCLASS64, data, osabi));
        h[16..18].copy_from_slice(&e_type.to_le_bytes());
        h[18..20].copy_from_slice(&e_machine.to_le_bytes());
        h[20..24].copy_from_slice(&1u32.to_le_bytes());
        h
    }

    #[test]
    fn info_maps_header_fields() {
        let mut cur = Cursor::new(ehdr64(
            header::ET_DYN,
            header::EM_X86_64,
            header::ELFDATA2LSB,
            ELFOSABI_SOLARIS,
        ));
        let info = get_info(&mut cur).unwrap();
        assert_eq!(info.kind, ElfType::Dyn);
        assert_eq!(info.bits, 64);
        assert_eq!(info.arch, Arch::I386);
        assert_eq!(info.data, DataEncoding::Lsb);
        assert_eq!(info.osabi, OsAbi::Solaris);
    }

    #[test]
    fn display_strings_match_packaging_names() {
        assert_eq!(ElfType::Exec.to_string(), "exe");
        assert_eq!(ElfType::Dyn.to_string(), "so");
        assert_eq!(Arch::from_e_machine(header::EM_SPARCV9).to_string(), "sparc");
        assert_eq!(Arch::from_e_machine(header::EM_AARCH64).to_string(), "aarch64");
        assert_eq!(Arch::from_e_machine(0x1234).to_string(), "other");
        assert_eq!(DataEncoding::Msb.to_string(), "msb");
        assert_eq!(OsAbi::Linux.to_string(), "linux");
    }

    #[test]
    fn non_elf_is_rejected_not_errored() {
        let mut cur = Cursor::new(b"just some text, definitely not an object".to_vec());
        assert!(!is_elf(&mut cur).unwrap());
        assert!(!is_elf32(&mut cur).unwrap());
        assert!(matches!(get_info(&mut cur), Err(ElfError::NotElf)));
    }

    #[test]
    fn truncated_header_is_corrupt() {
        let mut cur = Cursor::new(header::ELFMAG.to_vec());
        assert!(matches!(get_info(&mut cur), Err(ElfError::CorruptHeader(_))));
    }

    #[test]
    fn class_probe() {
        let mut id32 = [0u8; 16];
        id32[..4].copy_from_slice(&header::ELFMAG[..]);
        id32[header::EI_CLASS] = header::ELFCLASS32;
        let mut cur = Cursor::new(id32.to_vec());
        assert!(is_elf(&mut cur).unwrap());
        assert!(is_elf32(&mut cur).unwrap());

        let mut cur = Cursor::new(ehdr64(header::ET_EXEC, header::EM_AARCH64, 1, 0));
        assert!(!is_elf32(&mut cur).unwrap());
    }
}
