//! The update window.
//!
//! A cooperative state machine that keeps the external update mechanism
//! serviced while it counts coarse ticks. It is advanced one quantum at a time
//! by [`UpdateWindow::step`], so it can be driven by a scripted clock on the
//! host as easily as by SysTick on the target.

use core::cell::Cell;

use embedded_hal::digital::OutputPin;

use crate::tick::TickSource;

/// What the update mechanism reports after servicing one unit of work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Session {
    /// No update session has started.
    Idle,
    /// A host is talking to the update class; flash may be changing.
    Active,
    /// An update finished; the mechanism owns what happens next.
    Complete,
}

/// The external update mechanism, e.g. a polled USB device stack.
pub trait UpdateMechanism {
    /// Services one bounded, non-blocking unit of pending protocol work.
    fn protocol_step(&mut self) -> Session;
}

/// Session status set by an update class from its request handlers.
///
/// Enumeration alone never touches it. It only moves forward: `Idle` to
/// `Active` to `Complete`.
pub struct SessionLatch {
    session: Cell<Session>,
}

impl SessionLatch {
    pub const fn new() -> Self {
        Self {
            session: Cell::new(Session::Idle),
        }
    }

    /// An update request reached the update interface.
    pub fn begin(&self) {
        if self.session.get() == Session::Idle {
            self.session.set(Session::Active);
        }
    }

    pub fn complete(&self) {
        self.session.set(Session::Complete);
    }

    pub fn get(&self) -> Session {
        self.session.get()
    }
}

impl Default for SessionLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Active level of the indicator pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    ActiveHigh,
    ActiveLow,
}

/// Visual "awaiting update" signal.
pub struct Indicator<P> {
    pin: P,
    polarity: Polarity,
}

impl<P: OutputPin> Indicator<P> {
    pub fn new(pin: P, polarity: Polarity) -> Self {
        Self { pin, polarity }
    }

    /// Lights the indicator.
    pub fn awaiting(&mut self) {
        match self.polarity {
            Polarity::ActiveHigh => self.pin.set_high().ok(),
            Polarity::ActiveLow => self.pin.set_low().ok(),
        };
    }

    /// Clears the indicator.
    pub fn proceeding(&mut self) {
        match self.polarity {
            Polarity::ActiveHigh => self.pin.set_low().ok(),
            Polarity::ActiveLow => self.pin.set_high().ok(),
        };
    }

    pub fn release(self) -> P {
        self.pin
    }
}

/// Number of ticks to wait before assuming no update is coming.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Deadline(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WindowState {
    Waiting,
    /// Deadline reached without update activity.
    TimedOut,
    /// The update mechanism reported a session; it keeps control from here.
    UpdateActive,
}

impl WindowState {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, WindowState::Waiting)
    }
}

pub struct UpdateWindow<T, U, P> {
    ticks: T,
    mechanism: U,
    indicator: Indicator<P>,
    deadline: Deadline,
    elapsed: u32,
    state: WindowState,
}

impl<T, U, P> UpdateWindow<T, U, P>
where
    T: TickSource,
    U: UpdateMechanism,
    P: OutputPin,
{
    /// Opens the window and lights the indicator.
    pub fn new(ticks: T, mechanism: U, mut indicator: Indicator<P>, deadline: Deadline) -> Self {
        indicator.awaiting();
        Self {
            ticks,
            mechanism,
            indicator,
            deadline,
            elapsed: 0,
            state: WindowState::Waiting,
        }
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    /// Ticks counted so far.
    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    /// Runs one scheduling quantum.
    ///
    /// The mechanism is serviced on every call, whatever the tick state, so
    /// enumeration and control transfers are never starved. Once terminal,
    /// further calls do nothing.
    pub fn step(&mut self) -> WindowState {
        if self.state.is_terminal() {
            return self.state;
        }

        match self.mechanism.protocol_step() {
            Session::Active | Session::Complete => {
                #[cfg(feature = "defmt")]
                defmt::info!("update session after {} ticks", self.elapsed);
                self.state = WindowState::UpdateActive;
                return self.state;
            }
            Session::Idle => {}
        }

        if self.ticks.tick_elapsed() {
            self.elapsed = self.elapsed.saturating_add(1);
            #[cfg(feature = "defmt")]
            defmt::trace!("tick {}/{}", self.elapsed, self.deadline.0);
        }

        if self.elapsed >= self.deadline.0 {
            #[cfg(feature = "defmt")]
            defmt::info!("update window closed after {} ticks", self.elapsed);
            self.indicator.proceeding();
            self.state = WindowState::TimedOut;
        }

        self.state
    }

    /// Busy-waits until the window reaches a terminal state.
    pub fn run(&mut self) -> WindowState {
        loop {
            let state = self.step();
            if state.is_terminal() {
                return state;
            }
        }
    }

    /// Hands back the hardware owned by the window.
    pub fn into_parts(self) -> (T, U, Indicator<P>) {
        (self.ticks, self.mechanism, self.indicator)
    }
}
