//! A RAM word that survives a soft reset.
//!
//! The application posts a request and resets; the bootloader takes it on the
//! next boot, clearing it so a later power cycle boots normally. The word must
//! sit outside every image's `RAM` region so no startup code touches it.

use core::ptr;

/// Mailbox word shared by the bootloader and the application: the last 8 bytes
/// of 128 KiB SRAM. Both images' `memory.x` must end `RAM` below it.
pub const MAILBOX_ADDR: u32 = 0x2001_FFF8;

/// Value marking a pending "stay in update mode" request.
pub const STAY_IN_UPDATE_MAGIC: u32 = 0xB007_D0F0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootRequest {
    /// Skip the update window and remain in update mode.
    StayInUpdate,
}

impl BootRequest {
    const fn magic(self) -> u32 {
        match self {
            BootRequest::StayInUpdate => STAY_IN_UPDATE_MAGIC,
        }
    }

    const fn from_magic(word: u32) -> Option<Self> {
        match word {
            STAY_IN_UPDATE_MAGIC => Some(BootRequest::StayInUpdate),
            _ => None,
        }
    }
}

pub struct Mailbox {
    word: *mut u32,
}

impl Mailbox {
    /// # Safety
    ///
    /// `word` must be valid for volatile reads and writes for the lifetime of
    /// the mailbox and not be accessed through any other path meanwhile.
    pub const unsafe fn at(word: *mut u32) -> Self {
        Self { word }
    }

    /// Reads and clears the pending request.
    ///
    /// Any value, recognised or not, is cleared.
    pub fn take(&mut self) -> Option<BootRequest> {
        // SAFETY: validity guaranteed at construction.
        let word = unsafe { ptr::read_volatile(self.word) };
        // SAFETY: as above.
        unsafe { ptr::write_volatile(self.word, 0) };
        BootRequest::from_magic(word)
    }

    pub fn post(&mut self, request: BootRequest) {
        // SAFETY: validity guaranteed at construction.
        unsafe { ptr::write_volatile(self.word, request.magic()) };
    }
}
