use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, LittleEndian};
use goblin::elf::header as ehdr;
use goblin::elf::section_header::{SHT_DYNAMIC, SHT_GNU_VERDEF, SHT_GNU_VERNEED};
use goblin::strtab::Strtab;

use crate::dynamic::{self, ObjectFlag};
use crate::error::ElfError;
use crate::hash::{self, HashBundle, HashRequest};
use crate::header::ElfHeaderInfo;
use crate::sections::{self, Section};
use crate::versions::{self, RawVerneed};

/// One needed library extracted from the dynamic section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryNode {
    /// Name resolved from the dynamic string table.
    pub name: String,
    /// Raw offset of the name in the dynamic string table.
    pub name_offset: u64,
    /// Marked for lazy loading by a preceding position flag.
    pub lazy: bool,
    /// Symbol versions this object requires from the library.
    pub versions: Vec<String>,
}

/// Dynamic-linking metadata for one object.
///
/// An object with no dynamic section yields the empty record rather
/// than an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynamicInfo {
    /// Needed libraries in link order, duplicates preserved.
    pub deps: Vec<LibraryNode>,
    /// Legacy `DT_RPATH` value.
    pub rpath: Option<String>,
    /// `DT_RUNPATH` value.
    pub runpath: Option<String>,
    /// PIE/kernel-module marker from `DT_FLAGS_1`.
    pub obj_type: Option<ObjectFlag>,
    /// The object's own declared version (first definition name).
    pub base_version: Option<String>,
    /// Versions this object provides beyond the base one.
    pub provided_versions: Vec<String>,
}

impl DynamicInfo {
    /// A modern RUNPATH supersedes a legacy RPATH when both are
    /// present.
    pub fn effective_runpath(&self) -> Option<&str> {
        self.runpath.as_deref().or(self.rpath.as_deref())
    }
}

/// An ELF object held open for extraction.
///
/// The reader stays owned here for the object's lifetime; extraction
/// methods borrow it, so records can be derived in any order and
/// combination over the same handle. [`ElfObject::into_reader`] hands
/// the handle back; dropping the object releases it.
pub struct ElfObject<R: Read + Seek> {
    reader: R,
    data: Vec<u8>,
    info: ElfHeaderInfo,
    little_endian: bool,
    wide: bool,
    sections: Vec<Section>,
}

impl<R: Read + Seek> ElfObject<R> {
    /// Validates the magic, buffers the file and scans the section
    /// header table.
    pub fn open(mut reader: R) -> Result<Self, ElfError> {
        crate::ensure_init();

        let len = reader.seek(SeekFrom::End(0))?;
        let mut data = Vec::new();
        data.try_reserve_exact(len as usize)?;
        reader.seek(SeekFrom::Start(0))?;
        reader.read_to_end(&mut data)?;

        if data.len() < 4 || !data.starts_with(&ehdr::ELFMAG[..]) {
            return Err(ElfError::NotElf);
        }

        let header = goblin::elf::Elf::parse_header(&data)
            .map_err(|e| ElfError::CorruptHeader(e.to_string()))?;
        let little_endian = header
            .endianness()
            .map_err(|e| ElfError::CorruptHeader(e.to_string()))?
            .is_little();
        let wide = header
            .container()
            .map_err(|e| ElfError::CorruptHeader(e.to_string()))?
            .is_big();
        let info = ElfHeaderInfo::from_header(&header);
        let sections = sections::scan(&data, &header)?;
        log::debug!(
            "opened {}-bit {} object, {} sections",
            info.bits,
            info.kind,
            sections.len()
        );

        Ok(ElfObject {
            reader,
            data,
            info,
            little_endian,
            wide,
            sections,
        })
    }

    /// The identity record read at open time.
    pub fn header_info(&self) -> ElfHeaderInfo {
        self.info
    }

    /// All scanned sections, in table order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Releases the object, handing the reader back to the caller.
    pub fn into_reader(self) -> R {
        self.reader
    }

    fn section_data(&self, section: &Section) -> Result<&[u8], ElfError> {
        if section.is_no_bits() {
            return Ok(&[]);
        }
        let start = section.offset as usize;
        (section.size as usize)
            .checked_add(start)
            .and_then(|end| self.data.get(start..end))
            .ok_or_else(|| {
                ElfError::CorruptHeader(format!("section {} data out of range", section.name))
            })
    }

    fn find_section(&self, sh_type: u32) -> Option<&Section> {
        self.sections.iter().find(|s| s.sh_type == sh_type)
    }

    /// Extracts needed libraries, search paths, the object-type flag
    /// and both sides of the symbol-version story: requirements per
    /// library and the versions this object itself defines.
    pub fn dynamic_info(&self) -> Result<DynamicInfo, ElfError> {
        let Some(dynamic) = self.find_section(SHT_DYNAMIC) else {
            log::debug!("no dynamic section, returning empty record");
            return Ok(DynamicInfo::default());
        };

        // Dynamic but no string table?
        let strndx = dynamic.link as usize;
        if strndx == 0 || strndx >= self.sections.len() {
            return Err(ElfError::MissingStringTable);
        }
        let strdata = self.section_data(&self.sections[strndx])?;
        let strtab = Strtab::parse(strdata, 0, strdata.len(), 0x0)
            .map_err(|e| ElfError::CorruptHeader(e.to_string()))?;

        let count = if dynamic.entsize > 0 {
            (dynamic.size / dynamic.entsize) as usize
        } else {
            0
        };
        let dyndata = self.section_data(dynamic)?;
        let raw = if self.little_endian {
            dynamic::decode::<LittleEndian>(dyndata, count, self.wide)
        } else {
            dynamic::decode::<BigEndian>(dyndata, count, self.wide)
        }?;

        let needs = match self.find_section(SHT_GNU_VERNEED) {
            Some(verneed) => {
                let data = self.section_data(verneed)?;
                let count = verneed.info as usize;
                if self.little_endian {
                    versions::decode_verneed::<LittleEndian>(data, count)
                } else {
                    versions::decode_verneed::<BigEndian>(data, count)
                }?
            }
            None => Vec::new(),
        };

        let (base, provided) = match self.find_section(SHT_GNU_VERDEF) {
            Some(verdef) => {
                let data = self.section_data(verdef)?;
                let count = verdef.info as usize;
                if self.little_endian {
                    versions::decode_verdef::<LittleEndian>(data, count)
                } else {
                    versions::decode_verdef::<BigEndian>(data, count)
                }?
            }
            None => (None, Vec::new()),
        };

        // Consolidate: attach each library's requirement list, resolve
        // every offset through the dynamic string table.
        let mut deps = Vec::with_capacity(raw.libs.len());
        for lib in &raw.libs {
            let versions = match needs.iter().find(|n| n.file_offset == lib.name_offset) {
                Some(RawVerneed { versions, .. }) => versions
                    .iter()
                    .map(|&off| resolve(&strtab, off))
                    .collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
            };
            deps.push(LibraryNode {
                name: resolve(&strtab, lib.name_offset)?,
                name_offset: lib.name_offset,
                lazy: lib.lazy,
                versions,
            });
        }

        let info = DynamicInfo {
            deps,
            rpath: raw.rpath.map(|off| resolve(&strtab, off)).transpose()?,
            runpath: raw.runpath.map(|off| resolve(&strtab, off)).transpose()?,
            obj_type: raw.obj_flag,
            base_version: base.map(|off| resolve(&strtab, off)).transpose()?,
            provided_versions: provided
                .iter()
                .map(|&off| resolve(&strtab, off))
                .collect::<Result<_, _>>()?,
        };
        log::debug!(
            "{} needed libraries, {} provided versions",
            info.deps.len(),
            info.provided_versions.len()
        );
        Ok(info)
    }

    /// Computes the requested content digests. Section bytes are
    /// streamed from the handle, never from the parse buffer, in the
    /// original table order.
    pub fn hashes(&mut self, request: HashRequest) -> Result<HashBundle, ElfError> {
        hash::compute(&mut self.reader, &self.sections, request)
    }
}

fn resolve(strtab: &Strtab<'_>, offset: u64) -> Result<String, ElfError> {
    strtab
        .get_at(offset as usize)
        .map(str::to_owned)
        .ok_or_else(|| ElfError::CorruptHeader(format!("bad dynamic string table offset {offset}")))
}

/// One-shot dynamic extraction; the handle is released on return.
pub fn get_dynamic<R: Read + Seek>(reader: R) -> Result<DynamicInfo, ElfError> {
    ElfObject::open(reader)?.dynamic_info()
}

/// One-shot fingerprinting; the handle is released on return.
pub fn get_hashes<R: Read + Seek>(reader: R, request: HashRequest) -> Result<HashBundle, ElfError> {
    ElfObject::open(reader)?.hashes(request)
}
