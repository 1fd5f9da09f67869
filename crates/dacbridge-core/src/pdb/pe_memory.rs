//! # PE Images in Target Memory
//!
//! [`PeMemoryReader`] serves a module's PE image to the legacy binder
//! directly from the inspected process.
//!
//! The headers are validated with `object` before the reader is handed out:
//! a DOS header, then PE32+ or PE32 NT headers. Only the header bytes are read,
//! so an image mapped at the very end of readable memory still opens. Reads
//! are clipped to the
//! image, `SizeOfImage` for the loaded layout and the module's PE size for
//! the file layout.

use std::mem::size_of;
use std::rc::Rc;

use object::pe::{ImageDosHeader, ImageFileHeader, ImageNtHeaders32, ImageNtHeaders64};
use object::read::pe::{ImageNtHeaders, ImageOptionalHeader};
use object::LittleEndian;
use tracing::trace;

use super::native::{ImageAddressing, ImageReader};
use crate::error::{BridgeError, Result};
use crate::host::DebugHost;
use crate::types::Address;

/// Upper bound on the header bytes read to validate an image.
pub const HEADER_PAGE_SIZE: usize = 0x1000;

/// `PE\0\0` signature preceding the file header.
const NT_SIGNATURE_SIZE: usize = 4;

/// `SizeOfImage` from a PE header page.
///
/// ## Errors
///
/// - `Failed`: the page holds no valid DOS/NT header pair
pub fn parse_image_size(header: &[u8]) -> Result<u32>
{
    let dos = ImageDosHeader::parse(header).map_err(|err| BridgeError::Failed(format!("invalid DOS header: {err}")))?;

    let mut offset = u64::from(dos.nt_headers_offset());
    if let Ok((nt, _)) = ImageNtHeaders64::parse(header, &mut offset) {
        return Ok(nt.optional_header().size_of_image());
    }

    let mut offset = u64::from(dos.nt_headers_offset());
    let (nt, _) = ImageNtHeaders32::parse(header, &mut offset)
        .map_err(|err| BridgeError::Failed(format!("invalid NT headers: {err}")))?;
    Ok(nt.optional_header().size_of_image())
}

/// Read exactly the DOS and NT headers of the image at `base`.
///
/// ## Errors
///
/// - Whatever the host reports for a header read
/// - `Failed`: the DOS header is invalid or the NT headers lie past [`HEADER_PAGE_SIZE`]
pub fn read_headers(host: &dyn DebugHost, base: Address) -> Result<Vec<u8>>
{
    let dos_bytes = read_prefix(host, base, size_of::<ImageDosHeader>())?;
    let dos =
        ImageDosHeader::parse(&*dos_bytes).map_err(|err| BridgeError::Failed(format!("invalid DOS header: {err}")))?;
    let nt_offset = usize::try_from(dos.nt_headers_offset()).unwrap_or(usize::MAX);

    let file_header_end = nt_offset
        .saturating_add(NT_SIGNATURE_SIZE)
        .saturating_add(size_of::<ImageFileHeader>());
    if file_header_end > HEADER_PAGE_SIZE {
        return Err(BridgeError::Failed(format!("NT headers at 0x{nt_offset:x} are out of range")));
    }
    let prefix = read_prefix(host, base, file_header_end)?;
    let (file_header, _) = prefix
        .get(nt_offset + NT_SIGNATURE_SIZE..)
        .and_then(|bytes| object::pod::from_bytes::<ImageFileHeader>(bytes).ok())
        .ok_or_else(|| BridgeError::Failed("truncated file header".to_string()))?;

    let total = file_header_end + usize::from(file_header.size_of_optional_header.get(LittleEndian));
    read_prefix(host, base, total.min(HEADER_PAGE_SIZE))
}

fn read_prefix(host: &dyn DebugHost, base: Address, len: usize) -> Result<Vec<u8>>
{
    let mut bytes = vec![0_u8; len];
    let read = host.read_virtual(base, &mut bytes)?;
    bytes.truncate(read);
    Ok(bytes)
}

/// A module image read on demand from the target
pub struct PeMemoryReader
{
    host: Rc<dyn DebugHost>,
    base: Address,
    limit: u64,
    addressing: ImageAddressing,
}

impl PeMemoryReader
{
    /// Validate the image at `base` and create a reader for it.
    ///
    /// `pe_size` bounds file-layout reads; when it is zero the header's
    /// `SizeOfImage` is used instead.
    ///
    /// ## Errors
    ///
    /// - Whatever the host reports for the header read
    /// - `Failed`: the headers are not a valid PE image
    pub fn new(host: Rc<dyn DebugHost>, base: Address, pe_size: u64, addressing: ImageAddressing) -> Result<Self>
    {
        let header = read_headers(host.as_ref(), base)?;
        let image_size = u64::from(parse_image_size(&header)?);
        let limit = match addressing {
            ImageAddressing::FileOffset if pe_size != 0 => pe_size,
            _ => image_size,
        };
        trace!("PE image at {base}: {limit} readable bytes ({addressing:?})");

        Ok(Self {
            host,
            base,
            limit,
            addressing,
        })
    }

    /// Number of bytes reads are clipped to.
    pub fn limit(&self) -> u64
    {
        self.limit
    }
}

impl ImageReader for PeMemoryReader
{
    fn addressing(&self) -> ImageAddressing
    {
        self.addressing
    }

    fn read_at(&self, position: u64, buffer: &mut [u8]) -> Result<usize>
    {
        if position >= self.limit {
            return Ok(0);
        }
        let available = usize::try_from(self.limit - position).unwrap_or(usize::MAX);
        let len = buffer.len().min(available);

        let address = self.base.checked_add(position).ok_or_else(|| {
            BridgeError::InvalidArgument(format!("image position 0x{position:x} overflows"))
        })?;
        self.host.read_virtual(address, &mut buffer[..len])
    }
}
