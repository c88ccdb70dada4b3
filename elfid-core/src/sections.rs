use goblin::container::Ctx;
use goblin::elf::header::Header;
use goblin::elf::section_header::{self, SectionHeader};
use goblin::strtab::Strtab;

use crate::error::ElfError;

// Extended-numbering sentinel: the real string-table index is in
// section header 0's sh_link (gABI).
const SHN_XINDEX: usize = 0xffff;

/// One scanned section header with its name resolved.
#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    pub sh_type: u32,
    pub flags: u64,
    pub addr: u64,
    pub offset: u64,
    pub size: u64,
    pub link: u32,
    pub info: u32,
    pub entsize: u64,
}

impl Section {
    /// True for allocation-only sections with no backing bytes in the
    /// file (`SHT_NOBITS`).
    pub fn is_no_bits(&self) -> bool {
        self.sh_type == section_header::SHT_NOBITS
    }
}

/// Single pass over the section header table, resolving names through
/// the section-header string table. Sections keep their table order;
/// index 0 is the null entry.
pub(crate) fn scan(data: &[u8], header: &Header) -> Result<Vec<Section>, ElfError> {
    let container = header
        .container()
        .map_err(|e| ElfError::CorruptHeader(e.to_string()))?;
    let endianness = header
        .endianness()
        .map_err(|e| ElfError::CorruptHeader(e.to_string()))?;
    let ctx = Ctx::new(container, endianness);

    let shoff = header.e_shoff as usize;
    if shoff == 0 {
        return Ok(Vec::new());
    }

    // When the 16-bit header fields overflow, section header 0 carries
    // the real count and string-table index.
    let mut shnum = header.e_shnum as usize;
    let mut shstrndx = header.e_shstrndx as usize;
    if shnum == 0 || shstrndx == SHN_XINDEX {
        let zeroth = SectionHeader::parse(data, shoff, 1, ctx)
            .map_err(|e| ElfError::CorruptHeader(e.to_string()))?;
        let zeroth = zeroth
            .first()
            .ok_or_else(|| ElfError::CorruptHeader("empty section header table".into()))?;
        if shnum == 0 {
            shnum = zeroth.sh_size as usize;
        }
        if shstrndx == SHN_XINDEX {
            shstrndx = zeroth.sh_link as usize;
        }
    }

    let shentsize = if container.is_big() { 64 } else { 40 };
    match shnum.checked_mul(shentsize).and_then(|n| n.checked_add(shoff)) {
        Some(end) if end <= data.len() => {}
        _ => {
            return Err(ElfError::CorruptHeader(
                "section header table out of range".into(),
            ))
        }
    }

    let headers = SectionHeader::parse(data, shoff, shnum, ctx)
        .map_err(|e| ElfError::CorruptHeader(e.to_string()))?;

    // Index 0 means the object simply has no section-name table; names
    // resolve to "".
    let names = if shstrndx == 0 {
        None
    } else {
        let sh = headers.get(shstrndx).ok_or_else(|| {
            ElfError::CorruptHeader(format!(
                "section name string table index {} out of range",
                shstrndx
            ))
        })?;
        let strtab = Strtab::parse(data, sh.sh_offset as usize, sh.sh_size as usize, 0x0)
            .map_err(|e| ElfError::CorruptHeader(e.to_string()))?;
        Some(strtab)
    };

    let mut sections = Vec::with_capacity(headers.len());
    for sh in &headers {
        let name = names
            .as_ref()
            .and_then(|names| names.get_at(sh.sh_name))
            .unwrap_or("")
            .to_string();
        sections.push(Section {
            name,
            sh_type: sh.sh_type,
            flags: sh.sh_flags,
            addr: sh.sh_addr,
            offset: sh.sh_offset,
            size: sh.sh_size,
            link: sh.sh_link,
            info: sh.sh_info,
            entsize: sh.sh_entsize,
        });
    }
    Ok(sections)
}
