use byteorder::ByteOrder;

use crate::error::ElfError;

// Verneed/Verdef records share one layout across both ELF classes;
// only the byte order varies.
const VERNEED_SIZE: usize = 16;
const VERNAUX_SIZE: usize = 16;
const VERDEF_SIZE: usize = 20;
const VERDAUX_SIZE: usize = 8;

/// Version requirements against one needed library, as offsets into
/// the dynamic string table.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct RawVerneed {
    pub file_offset: u64,
    pub versions: Vec<u64>,
}

fn chunk(data: &[u8], offset: usize, size: usize) -> Result<&[u8], ElfError> {
    offset
        .checked_add(size)
        .and_then(|end| data.get(offset..end))
        .ok_or(ElfError::TruncatedChain {
            offset,
            len: data.len(),
        })
}

/// Walks the version-need chain: `count` top-level nodes linked by
/// `vn_next` deltas, each owning `vn_cnt` auxiliary entries linked by
/// `vna_next` deltas. The embedded lists are converted to owned
/// sequences here; nothing downstream does offset arithmetic.
pub(crate) fn decode_verneed<E: ByteOrder>(
    data: &[u8],
    count: usize,
) -> Result<Vec<RawVerneed>, ElfError> {
    let mut out = Vec::new();
    let mut node = 0usize;
    let mut vn_next = 0usize;

    for t in 0..count {
        if t > 0 {
            node = node.saturating_add(vn_next);
        }
        let hdr = chunk(data, node, VERNEED_SIZE)?;
        let vn_cnt = E::read_u16(&hdr[2..4]) as usize;
        let vn_file = E::read_u32(&hdr[4..8]) as u64;
        let vn_aux = E::read_u32(&hdr[8..12]) as usize;
        vn_next = E::read_u32(&hdr[12..16]) as usize;

        let mut versions = Vec::new();
        let mut aux = node.saturating_add(vn_aux);
        let mut vna_next = 0usize;
        for a in 0..vn_cnt {
            if a > 0 {
                aux = aux.saturating_add(vna_next);
            }
            let ent = chunk(data, aux, VERNAUX_SIZE)?;
            versions.push(E::read_u32(&ent[8..12]) as u64);
            vna_next = E::read_u32(&ent[12..16]) as usize;
        }

        out.push(RawVerneed {
            file_offset: vn_file,
            versions,
        });
    }
    Ok(out)
}

/// Walks the version-definition chain. The first auxiliary name
/// encountered anywhere is the object's own base version; every other
/// auxiliary name is a version this object provides.
pub(crate) fn decode_verdef<E: ByteOrder>(
    data: &[u8],
    count: usize,
) -> Result<(Option<u64>, Vec<u64>), ElfError> {
    let mut base = None;
    let mut provided = Vec::new();
    let mut node = 0usize;
    let mut vd_next = 0usize;

    for t in 0..count {
        if t > 0 {
            node = node.saturating_add(vd_next);
        }
        let hdr = chunk(data, node, VERDEF_SIZE)?;
        let vd_cnt = E::read_u16(&hdr[6..8]) as usize;
        let vd_aux = E::read_u32(&hdr[12..16]) as usize;
        vd_next = E::read_u32(&hdr[16..20]) as usize;

        let mut aux = node.saturating_add(vd_aux);
        let mut vda_next = 0usize;
        for a in 0..vd_cnt {
            if a > 0 {
                aux = aux.saturating_add(vda_next);
            }
            let ent = chunk(data, aux, VERDAUX_SIZE)?;
            let vda_name = E::read_u32(&ent[..4]) as u64;
            vda_next = E::read_u32(&ent[4..8]) as usize;
            if base.is_none() {
                base = Some(vda_name);
            } else {
                provided.push(vda_name);
            }
        }
    }
    Ok((base, provided))
}
