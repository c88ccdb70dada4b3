use std::fmt;

use byteorder::ByteOrder;
use goblin::elf::dynamic::{DF_1_PIE, DT_FLAGS_1, DT_NEEDED, DT_RPATH, DT_RUNPATH};

use crate::error::ElfError;

// Dynamic tags and flag bits from the Solaris side of the link-editor
// fence.
pub const DT_FILTER: u64 = 0x7fff_ffff;
pub const DT_SUNW_FILTER: u64 = 0x6000_000f;
pub const DT_POSFLAG_1: u64 = 0x6fff_fdfd;
pub const DF_P1_LAZYLOAD: u64 = 0x1;
pub const DF_P1_DEFERRED: u64 = 0x4;
pub const DF_1_KMOD: u64 = 0x1000_0000;

/// Object-type flag carried in `DT_FLAGS_1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectFlag {
    Pie,
    Kmod,
}

impl ObjectFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectFlag::Pie => "pie",
            ObjectFlag::Kmod => "kmod",
        }
    }
}

impl fmt::Display for ObjectFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Offset-level dependency entry, before string resolution.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct RawLibrary {
    pub name_offset: u64,
    pub lazy: bool,
}

/// Offset-level view of the dynamic section.
#[derive(Debug, Default)]
pub(crate) struct RawDynamic {
    pub libs: Vec<RawLibrary>,
    pub rpath: Option<u64>,
    pub runpath: Option<u64>,
    pub obj_flag: Option<ObjectFlag>,
}

/// Walks the dynamic entry array in file order.
///
/// Dependency entries (`DT_NEEDED` and the filter variants) are kept in
/// insertion order, duplicates included, since link order is
/// significant. A `DT_POSFLAG_1` entry modifies the dependency entry
/// that follows it: `LAZYLOAD` marks it lazy, `DEFERRED` skips it
/// entirely.
pub(crate) fn decode<E: ByteOrder>(
    data: &[u8],
    count: usize,
    wide: bool,
) -> Result<RawDynamic, ElfError> {
    let stride = if wide { 16 } else { 8 };
    let mut out = RawDynamic::default();
    let mut lazy = false;

    let mut t = 0;
    while t < count {
        let off = t * stride;
        let entry = data.get(off..off + stride).ok_or_else(|| {
            ElfError::CorruptHeader(format!("dynamic entry {} out of range", t))
        })?;
        let (tag, val) = if wide {
            (E::read_u64(&entry[..8]), E::read_u64(&entry[8..]))
        } else {
            (E::read_u32(&entry[..4]) as u64, E::read_u32(&entry[4..]) as u64)
        };

        match tag {
            DT_NEEDED | DT_FILTER | DT_SUNW_FILTER => {
                out.libs.push(RawLibrary {
                    name_offset: val,
                    lazy,
                });
                lazy = false;
            }
            DT_RPATH => out.rpath = Some(val),
            DT_RUNPATH => out.runpath = Some(val),
            DT_POSFLAG_1 => {
                if val & DF_P1_DEFERRED != 0 {
                    t += 1;
                }
                if val & DF_P1_LAZYLOAD != 0 {
                    lazy = true;
                }
            }
            DT_FLAGS_1 => {
                if val & DF_1_PIE != 0 {
                    out.obj_flag = Some(ObjectFlag::Pie);
                }
                if val & DF_1_KMOD != 0 {
                    out.obj_flag = Some(ObjectFlag::Kmod);
                }
            }
            _ => {}
        }
        t += 1;
    }
    Ok(out)
}
