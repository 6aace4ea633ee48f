//! Application image inspection.
//!
//! The image starts with a Cortex-M vector table. Only the first two words are
//! interpreted here: the initial main stack pointer and the reset handler.

use core::ptr;

/// Address pattern a plausible initial stack pointer must match.
///
/// This is a cheap heuristic, not an integrity check: erased flash reads as
/// all-ones and blank flash as all-zeros, and both fail the mask test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RamWindow {
    mask: u32,
    base: u32,
}

impl RamWindow {
    /// SRAM at `0x2000_0000`, up to 128 KiB, with the bit-28 alias left free.
    pub const DEFAULT: RamWindow = RamWindow::new(0x2FFE_0000, 0x2000_0000);

    /// # Panics
    ///
    /// If `base` has bits set outside `mask`, no word could ever match.
    pub const fn new(mask: u32, base: u32) -> Self {
        assert!(base & !mask == 0, "RAM base has bits outside the mask");
        Self { mask, base }
    }

    pub const fn mask(&self) -> u32 {
        self.mask
    }

    pub const fn base(&self) -> u32 {
        self.base
    }

    /// Whether `initial_sp` points into the expected RAM region.
    pub const fn is_valid(&self, initial_sp: u32) -> bool {
        initial_sp & self.mask == self.base
    }
}

impl Default for RamWindow {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Read-only view of the first two vector table words of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VectorTable {
    pub initial_sp: u32,
    pub reset: u32,
}

impl VectorTable {
    pub const fn from_words(initial_sp: u32, reset: u32) -> Self {
        Self { initial_sp, reset }
    }

    /// Reads the table at `table` with volatile loads.
    ///
    /// # Safety
    ///
    /// `table` must be valid for reading two aligned `u32` words.
    pub unsafe fn read(table: *const u32) -> Self {
        // SAFETY: the caller guarantees two readable, aligned words.
        let initial_sp = unsafe { ptr::read_volatile(table) };
        // SAFETY: as above, the second word is in bounds.
        let reset = unsafe { ptr::read_volatile(table.add(1)) };
        Self { initial_sp, reset }
    }

    /// Validity of the image this table was read from.
    pub const fn is_valid(&self, window: &RamWindow) -> bool {
        window.is_valid(self.initial_sp)
    }
}
