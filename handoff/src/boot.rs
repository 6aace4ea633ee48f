//! Deciding, after the update window, whether to launch the application.

use embedded_hal::digital::OutputPin;

use crate::image::{RamWindow, VectorTable};
use crate::window::{Indicator, UpdateMechanism, WindowState};

/// Whether the image check gates the handoff.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ImageGate {
    /// Only launch images whose initial stack pointer lies in RAM.
    #[default]
    Enforced,
    /// Launch whatever is flashed. For bring-up with unusual memory maps.
    Bypassed,
}

/// Why the bootloader keeps the device in update mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Residency {
    /// The application asked for update mode before resetting.
    UpdateRequested,
    /// A host started an update session during the window.
    UpdateSession,
    /// The flashed image failed the plausibility check.
    InvalidImage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Decision {
    Launch(VectorTable),
    Resident(Residency),
}

/// Maps the terminal window state and the flashed image to a decision.
///
/// # Panics
///
/// If `outcome` is [`WindowState::Waiting`]: the window must have finished.
pub fn decide(
    outcome: WindowState,
    table: VectorTable,
    ram: &RamWindow,
    gate: ImageGate,
) -> Decision {
    match outcome {
        WindowState::Waiting => panic!("update window still open"),
        WindowState::UpdateActive => Decision::Resident(Residency::UpdateSession),
        WindowState::TimedOut => match gate {
            ImageGate::Enforced if !table.is_valid(ram) => {
                #[cfg(feature = "defmt")]
                defmt::warn!(
                    "no valid image: sp={=u32:#010x}, staying in update mode",
                    table.initial_sp
                );
                Decision::Resident(Residency::InvalidImage)
            }
            _ => Decision::Launch(table),
        },
    }
}

/// Leaves the device to the update mechanism for the rest of this boot.
///
/// Nothing hands control back; leaving update mode takes a reset.
pub fn stay_resident<U, P>(mechanism: &mut U, indicator: &mut Indicator<P>) -> !
where
    U: UpdateMechanism,
    P: OutputPin,
{
    indicator.awaiting();
    loop {
        mechanism.protocol_step();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::tests::{RecordingPin, ScriptedTicks};
    use crate::window::{Deadline, Polarity, Session, SessionLatch, UpdateWindow};
    use std::boxed::Box;
    use std::panic::{self, AssertUnwindSafe};

    const VALID: VectorTable = VectorTable::from_words(0x2000_1000, 0x0800_8195);
    const ERASED: VectorTable = VectorTable::from_words(0xFFFF_FFFF, 0xFFFF_FFFF);
    const BLANK: VectorTable = VectorTable::from_words(0, 0);

    #[test]
    fn timed_out_with_valid_image_launches() {
        let d = decide(
            WindowState::TimedOut,
            VALID,
            &RamWindow::DEFAULT,
            ImageGate::Enforced,
        );
        assert_eq!(d, Decision::Launch(VALID));
    }

    #[test]
    fn enforced_gate_refuses_invalid_images() {
        for table in [ERASED, BLANK] {
            let d = decide(
                WindowState::TimedOut,
                table,
                &RamWindow::DEFAULT,
                ImageGate::Enforced,
            );
            assert_eq!(d, Decision::Resident(Residency::InvalidImage));
        }
    }

    #[test]
    fn bypassed_gate_launches_anything() {
        let d = decide(
            WindowState::TimedOut,
            ERASED,
            &RamWindow::DEFAULT,
            ImageGate::Bypassed,
        );
        assert_eq!(d, Decision::Launch(ERASED));
    }

    #[test]
    fn update_session_never_launches() {
        for gate in [ImageGate::Enforced, ImageGate::Bypassed] {
            let d = decide(WindowState::UpdateActive, VALID, &RamWindow::DEFAULT, gate);
            assert_eq!(d, Decision::Resident(Residency::UpdateSession));
        }
    }

    #[test]
    fn gate_enforced_by_default() {
        assert_eq!(ImageGate::default(), ImageGate::Enforced);
    }

    #[test]
    #[should_panic(expected = "update window still open")]
    fn open_window_is_a_bug() {
        decide(
            WindowState::Waiting,
            VALID,
            &RamWindow::DEFAULT,
            ImageGate::Enforced,
        );
    }

    /// Stands in for "serviced forever" once the step budget is spent.
    struct OutOfSteps;

    /// A USB host: enumerates the device on the second step and, if
    /// `update_at` is set, starts an update session through the latch.
    #[derive(Default)]
    struct Host {
        steps: usize,
        configured: bool,
        update_at: Option<usize>,
        halt_at: Option<usize>,
        latch: SessionLatch,
    }

    impl UpdateMechanism for Host {
        fn protocol_step(&mut self) -> Session {
            self.steps += 1;
            if self.steps == 2 {
                self.configured = true;
            }
            if self.update_at == Some(self.steps) {
                self.latch.begin();
            }
            if self.halt_at == Some(self.steps) {
                panic::resume_unwind(Box::new(OutOfSteps));
            }
            self.latch.get()
        }
    }

    const FLASHED: VectorTable = VectorTable::from_words(0x2001_FFF8, 0x0800_8195);

    fn open_window(host: Host) -> UpdateWindow<ScriptedTicks, Host, RecordingPin> {
        UpdateWindow::new(
            ScriptedTicks::every_step(),
            host,
            Indicator::new(RecordingPin::default(), Polarity::ActiveLow),
            Deadline(5),
        )
    }

    #[test]
    fn enumeration_alone_still_launches() {
        let mut window = open_window(Host::default());
        let outcome = window.run();
        assert_eq!(outcome, WindowState::TimedOut);

        let (_, host, _) = window.into_parts();
        assert!(host.configured);

        let d = decide(outcome, FLASHED, &RamWindow::DEFAULT, ImageGate::Enforced);
        assert_eq!(d, Decision::Launch(FLASHED));
    }

    #[test]
    fn update_request_keeps_device_resident() {
        let mut window = open_window(Host {
            update_at: Some(3),
            ..Default::default()
        });
        let outcome = window.run();
        assert_eq!(outcome, WindowState::UpdateActive);
        assert_eq!(window.elapsed(), 2);

        let d = decide(outcome, FLASHED, &RamWindow::DEFAULT, ImageGate::Enforced);
        assert_eq!(d, Decision::Resident(Residency::UpdateSession));
    }

    #[test]
    fn invalid_image_stays_resident_with_indicator_lit() {
        let mut window = open_window(Host::default());
        let outcome = window.run();
        let (_, mut host, mut indicator) = window.into_parts();

        let d = decide(outcome, ERASED, &RamWindow::DEFAULT, ImageGate::Enforced);
        assert_eq!(d, Decision::Resident(Residency::InvalidImage));

        let before = host.steps;
        host.halt_at = Some(before + 25);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            stay_resident(&mut host, &mut indicator);
        }));
        let payload = result.err().expect("stay_resident returned");
        assert!(payload.is::<OutOfSteps>());
        assert_eq!(host.steps - before, 25);

        // Active-low: lit, cleared at timeout, lit again for good.
        let levels = indicator.release().levels;
        assert_eq!(levels, [false, true, false]);
        assert_eq!(levels.last(), Some(&false));
    }
}
