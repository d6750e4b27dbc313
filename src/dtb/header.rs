// ABOUTME: DTB header structure definition and parsing
// ABOUTME: Handles the 40-byte big-endian device tree blob header

use super::error::DtbError;
use nom::IResult;
use nom::number::complete::be_u32;
use nom::sequence::tuple;

/// The fixed 40-byte header at the start of every DTB image.
///
/// All fields are stored big-endian in the blob and returned here as native
/// integers. Offsets are relative to the start of the blob.
///
/// # Layout
///
/// ```text
/// Offset | Field              | Description
/// -------|--------------------|-----------------------------------------
/// 0x00   | magic              | Magic number (0xd00dfeed)
/// 0x04   | total_size         | Total blob size in bytes
/// 0x08   | offset_structs     | Offset to the structure block
/// 0x0C   | offset_strings     | Offset to the strings block
/// 0x10   | offset_memmap_rsvd | Offset to the memory reservation block
/// 0x14   | version            | Blob format version
/// 0x18   | last_comp_version  | Oldest compatible version
/// 0x1C   | boot_cpu_id        | Physical ID of the boot CPU
/// 0x20   | size_strings       | Strings block size in bytes
/// 0x24   | size_structs       | Structure block size in bytes
/// ```
///
/// The memory reservation block is not parsed by this crate;
/// `offset_memmap_rsvd` is exposed so a host can walk it itself.
///
/// # Examples
///
/// ```rust
/// # use dtb_arena::{FdtHeader, DtbError};
/// # fn example(blob: &[u8]) -> Result<(), DtbError> {
/// let header = FdtHeader::parse(blob)?;
/// assert_eq!(header.magic, FdtHeader::MAGIC);
/// println!("structure block: {} bytes at 0x{:x}",
///     header.size_structs, header.offset_structs);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdtHeader {
    /// Magic number identifying a DTB image (must be 0xd00dfeed).
    pub magic: u32,
    /// Total size of the blob in bytes.
    pub total_size: u32,
    /// Byte offset of the structure block.
    pub offset_structs: u32,
    /// Byte offset of the strings block.
    pub offset_strings: u32,
    /// Byte offset of the memory reservation block.
    pub offset_memmap_rsvd: u32,
    /// Blob format version (17 for modern images).
    pub version: u32,
    /// Oldest version this blob is backwards compatible with.
    pub last_comp_version: u32,
    /// Physical CPU ID of the boot processor.
    pub boot_cpu_id: u32,
    /// Size of the strings block in bytes.
    pub size_strings: u32,
    /// Size of the structure block in bytes.
    pub size_structs: u32,
}

fn header_fields(input: &[u8]) -> IResult<&[u8], FdtHeader> {
    let (rest, fields) = tuple((
        be_u32, be_u32, be_u32, be_u32, be_u32, be_u32, be_u32, be_u32, be_u32, be_u32,
    ))(input)?;
    let (
        magic,
        total_size,
        offset_structs,
        offset_strings,
        offset_memmap_rsvd,
        version,
        last_comp_version,
        boot_cpu_id,
        size_strings,
        size_structs,
    ) = fields;
    Ok((
        rest,
        FdtHeader {
            magic,
            total_size,
            offset_structs,
            offset_strings,
            offset_memmap_rsvd,
            version,
            last_comp_version,
            boot_cpu_id,
            size_strings,
            size_structs,
        },
    ))
}

impl FdtHeader {
    /// DTB magic number constant.
    pub const MAGIC: u32 = 0xd00d_feed;

    /// Header size in bytes.
    pub const SIZE: usize = 40;

    /// Parse the header from the start of a blob.
    ///
    /// # Errors
    ///
    /// Returns [`DtbError::TruncatedHeader`] if `input` holds fewer than 40
    /// bytes and [`DtbError::InvalidMagic`] if the magic number is wrong.
    pub fn parse(input: &[u8]) -> Result<Self, DtbError> {
        let (_, header) = header_fields(input).map_err(|_| DtbError::TruncatedHeader)?;
        if header.magic != Self::MAGIC {
            return Err(DtbError::InvalidMagic);
        }
        Ok(header)
    }

    /// Slice the structure and strings blocks out of the blob.
    pub(crate) fn blocks<'a>(&self, blob: &'a [u8]) -> Result<(&'a [u8], &'a [u8]), DtbError> {
        let structs = block(blob, self.offset_structs, self.size_structs)?;
        let strings = block(blob, self.offset_strings, self.size_strings)?;
        Ok((structs, strings))
    }
}

fn block(blob: &[u8], offset: u32, size: u32) -> Result<&[u8], DtbError> {
    let start = offset as usize;
    let end = start
        .checked_add(size as usize)
        .ok_or(DtbError::MalformedHeader)?;
    blob.get(start..end).ok_or(DtbError::MalformedHeader)
}
