//! Coarse tick source bounding the update window.

use core::fmt;

use fugit::{HertzU32, MillisDurationU32};

/// Largest value the 24-bit SysTick reload register accepts.
pub const MAX_RELOAD: u32 = 0x00FF_FFFF;

/// A periodic hardware timer, polled for overflow.
pub trait TickSource {
    /// Returns `true` exactly once per timer overflow.
    fn tick_elapsed(&mut self) -> bool;
}

/// Clock feeding the tick counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickClock {
    /// Processor clock (HCLK).
    Core,
    /// HCLK / 8, the external SysTick reference on STM32 parts.
    CoreDiv8,
}

impl TickClock {
    const fn divider(self) -> u32 {
        match self {
            TickClock::Core => 1,
            TickClock::CoreDiv8 => 8,
        }
    }
}

/// Tick source configuration errors. All of them are fatal at boot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The requested tick period is zero.
    ZeroPeriod,
    /// The period does not fit the 24-bit counter at the given clock.
    ReloadOutOfRange,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroPeriod => f.write_str("tick period must be non-zero"),
            ConfigError::ReloadOutOfRange => {
                f.write_str("tick period does not fit the 24-bit reload register")
            }
        }
    }
}

/// A validated reload value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reload(u32);

impl Reload {
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// Period and clock of the tick source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickConfig {
    pub clock: HertzU32,
    pub source: TickClock,
    pub period: MillisDurationU32,
}

impl TickConfig {
    /// Computes the counter reload for one tick period.
    ///
    /// `const` so that firmware can evaluate it in a `const` item and reject a
    /// bad configuration at build time.
    pub const fn reload(&self) -> Result<Reload, ConfigError> {
        let period_ms = self.period.ticks() as u64;
        if period_ms == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        let counter_hz = (self.clock.raw() / self.source.divider()) as u64;
        let counts = counter_hz * period_ms / 1000;
        if counts == 0 || counts - 1 > MAX_RELOAD as u64 {
            return Err(ConfigError::ReloadOutOfRange);
        }
        Ok(Reload((counts - 1) as u32))
    }
}
