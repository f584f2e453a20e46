//! Record identity for set operations across alignment files.

use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::RecordBuf;

use crate::core::types::IdentityMode;

/// Flag bits that take part in identity: paired, unmapped, strand, mate
/// segment and secondary/supplementary. Bits that tools commonly rewrite
/// (proper pair, mate state, QC fail, duplicate) are ignored.
pub const IDENTITY_FLAGS: u16 = 0x1 | 0x4 | 0x10 | 0x40 | 0x80 | 0x100 | 0x800;

const NO_REFERENCE: u32 = u32::MAX;

/// Fixed-width identity of one alignment record.
///
/// 28 bytes regardless of read name or sequence length, so an exclusion set
/// costs the same per record whatever the input looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    digest: [u8; 16],
    flags: u16,
    reference: u32,
    position: u32,
}

impl IdentityKey {
    /// Build a key. Unplaced records use `reference = None`, `position = None`.
    #[must_use]
    pub fn new(digest: [u8; 16], flags: u16, reference: Option<usize>, position: Option<usize>) -> Self {
        Self {
            digest,
            flags: flags & IDENTITY_FLAGS,
            reference: reference
                .and_then(|id| u32::try_from(id).ok())
                .unwrap_or(NO_REFERENCE),
            position: position
                .and_then(|p| u32::try_from(p).ok())
                .unwrap_or(0),
        }
    }

    #[must_use]
    pub fn is_placed(&self) -> bool {
        self.reference != NO_REFERENCE
    }
}

/// Computes the identity of a record.
///
/// `reference` is the record's reference id already translated into the id
/// space shared by both files, so keys from files with differently ordered
/// headers compare by reference name.
pub trait RecordIdentity {
    fn key(&self, record: &RecordBuf, reference: Option<usize>) -> IdentityKey;
}

impl RecordIdentity for IdentityMode {
    fn key(&self, record: &RecordBuf, reference: Option<usize>) -> IdentityKey {
        let name: &[u8] = record.name().map_or(&b"*"[..], |n| n.as_ref());

        let mut ctx = md5::Context::new();
        ctx.consume(name);
        if *self == IdentityMode::WithSequence {
            ctx.consume([0u8]);
            ctx.consume(record.sequence().as_ref());
            ctx.consume([0u8]);
            ctx.consume(record.quality_scores().as_ref());
        }
        let digest = ctx.compute().0;

        let flags = record.flags();
        if is_unplaced(flags, reference) {
            // Unmapped records have no meaningful placement; name and flags only.
            return IdentityKey::new(digest, flags.bits(), None, None);
        }

        IdentityKey::new(
            digest,
            flags.bits(),
            reference,
            record.alignment_start().map(usize::from),
        )
    }
}

fn is_unplaced(flags: Flags, reference: Option<usize>) -> bool {
    flags.is_unmapped() || reference.is_none()
}
