//! Named files in a fixed slot table at the end of flash.
//!
//! Each slot spans whole erase sectors and starts with a header:
//!
//! | Offset | Size | Field                          |
//! |--------|------|--------------------------------|
//! | 0      | 4    | magic `GFS1`                   |
//! | 4      | 4    | content length, little-endian  |
//! | 8      | 32   | path, zero padded              |
//! | 40     | ..   | content                        |
//!
//! Writing erases the slot, programs the content, then the header, so an
//! interrupted write leaves the slot empty rather than truncated.

use alloc::string::String;
use alloc::vec;

use defmt::{debug, warn};
use embassy_rp::flash::{Blocking, Flash, ERASE_SIZE};
use embassy_rp::peripherals::FLASH;
use guitar_core::{FileStore, StorageError};

/// Total flash on the board.
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

/// Bytes reserved per file.
pub const SLOT_SIZE: usize = 4 * ERASE_SIZE;

/// Number of files that can be stored.
pub const SLOT_COUNT: usize = 8;

/// Start of the slot table, relative to the start of flash.
pub const STORAGE_OFFSET: usize = FLASH_SIZE - SLOT_COUNT * SLOT_SIZE;

const MAGIC: [u8; 4] = *b"GFS1";
const NAME_CAPACITY: usize = 32;
const HEADER_SIZE: usize = 8 + NAME_CAPACITY;

/// Largest file content a slot holds.
pub const MAX_FILE_SIZE: usize = SLOT_SIZE - HEADER_SIZE;

pub type BoardFlash = Flash<'static, FLASH, Blocking, FLASH_SIZE>;

struct SlotHeader {
    len: usize,
    name: [u8; NAME_CAPACITY],
}

impl SlotHeader {
    fn parse(raw: &[u8; HEADER_SIZE]) -> Option<Self> {
        if raw[..4] != MAGIC {
            return None;
        }
        let len = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]) as usize;
        if len > MAX_FILE_SIZE {
            return None;
        }
        let mut name = [0u8; NAME_CAPACITY];
        name.copy_from_slice(&raw[8..]);
        Some(Self { len, name })
    }

    fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut raw = [0u8; HEADER_SIZE];
        raw[..4].copy_from_slice(&MAGIC);
        raw[4..8].copy_from_slice(&(self.len as u32).to_le_bytes());
        raw[8..].copy_from_slice(&self.name);
        raw
    }
}

fn encode_name(path: &str) -> Result<[u8; NAME_CAPACITY], StorageError> {
    let bytes = path.as_bytes();
    if bytes.is_empty() || bytes.len() > NAME_CAPACITY {
        return Err(StorageError::TooLarge);
    }
    let mut name = [0u8; NAME_CAPACITY];
    name[..bytes.len()].copy_from_slice(bytes);
    Ok(name)
}

fn slot_offset(slot: usize) -> u32 {
    (STORAGE_OFFSET + slot * SLOT_SIZE) as u32
}

/// [`FileStore`] over the on-chip flash.
pub struct FlashStore {
    flash: BoardFlash,
}

impl FlashStore {
    #[must_use]
    pub fn new(flash: BoardFlash) -> Self {
        Self { flash }
    }

    /// Factory-programmed 64-bit id of the flash chip.
    pub fn unique_id(&mut self) -> Result<[u8; 8], StorageError> {
        let mut uid = [0u8; 8];
        self.flash
            .blocking_unique_id(&mut uid)
            .map_err(|_| StorageError::Io)?;
        Ok(uid)
    }

    fn header(&mut self, slot: usize) -> Result<Option<SlotHeader>, StorageError> {
        let mut raw = [0u8; HEADER_SIZE];
        self.flash
            .blocking_read(slot_offset(slot), &mut raw)
            .map_err(|_| StorageError::Io)?;
        Ok(SlotHeader::parse(&raw))
    }

    /// Slot holding `name`, and the first empty slot seen before it.
    fn find(
        &mut self,
        name: &[u8; NAME_CAPACITY],
    ) -> Result<(Option<(usize, SlotHeader)>, Option<usize>), StorageError> {
        let mut empty = None;
        for slot in 0..SLOT_COUNT {
            match self.header(slot)? {
                Some(header) if header.name == *name => return Ok((Some((slot, header)), empty)),
                Some(_) => {}
                None => {
                    empty = empty.or(Some(slot));
                }
            }
        }
        Ok((None, empty))
    }
}

impl FileStore for FlashStore {
    fn read_to_string(&mut self, path: &str) -> Result<String, StorageError> {
        let name = encode_name(path).map_err(|_| StorageError::NotFound)?;
        let (Some((slot, header)), _) = self.find(&name)? else {
            return Err(StorageError::NotFound);
        };
        let mut contents = vec![0u8; header.len];
        self.flash
            .blocking_read(slot_offset(slot) + HEADER_SIZE as u32, &mut contents)
            .map_err(|_| StorageError::Io)?;
        String::from_utf8(contents).map_err(|_| StorageError::Corrupt)
    }

    fn write(&mut self, path: &str, contents: &str) -> Result<(), StorageError> {
        let name = encode_name(path)?;
        if contents.len() > MAX_FILE_SIZE {
            warn!("{} is {} bytes, slot holds {}", path, contents.len(), MAX_FILE_SIZE);
            return Err(StorageError::TooLarge);
        }
        let slot = match self.find(&name)? {
            (Some((slot, _)), _) => slot,
            (None, Some(empty)) => empty,
            (None, None) => return Err(StorageError::NoSpace),
        };

        let offset = slot_offset(slot);
        self.flash
            .blocking_erase(offset, offset + SLOT_SIZE as u32)
            .map_err(|_| StorageError::Io)?;
        if !contents.is_empty() {
            self.flash
                .blocking_write(offset + HEADER_SIZE as u32, contents.as_bytes())
                .map_err(|_| StorageError::Io)?;
        }
        let header = SlotHeader {
            len: contents.len(),
            name,
        };
        self.flash
            .blocking_write(offset, &header.encode())
            .map_err(|_| StorageError::Io)?;

        debug!("Stored {} ({} bytes) in slot {}", path, contents.len(), slot);
        Ok(())
    }
}
