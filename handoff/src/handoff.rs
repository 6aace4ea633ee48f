//! The one-way jump from the bootloader into the application.
//!
//! Every step here is irreversible and nothing can be reported once the branch
//! is taken. Target- and core-specific operations sit behind [`Target`] and
//! [`Processor`] so the ordering can be checked without hardware.

use crate::image::VectorTable;

/// Board hooks run while the bootloader's stack and vectors are still live.
pub trait Target {
    /// Points the vector table base at the application image.
    fn relocate_vector_table(&mut self, base: u32);

    /// Last chance to put peripherals back into the state the application
    /// expects, e.g. stopping the tick timer and detaching USB.
    fn pre_jump(&mut self);
}

/// Core operations that leave the bootloader's execution context.
pub trait Processor {
    fn mask_interrupts(&mut self);

    /// Sets the main stack pointer used from the branch onwards.
    ///
    /// # Safety
    ///
    /// Nothing after this call may rely on the bootloader's stack, other than
    /// the immediately following [`Processor::branch`].
    unsafe fn load_stack_pointer(&mut self, sp: u32);

    /// Transfers control to `entry`. Never returns.
    ///
    /// # Safety
    ///
    /// `entry` must be the address of executable code that does not expect to
    /// return.
    unsafe fn branch(&mut self, entry: u32) -> !;
}

pub struct Handoff<T, P> {
    target: T,
    processor: P,
}

impl<T: Target, P: Processor> Handoff<T, P> {
    pub fn new(target: T, processor: P) -> Self {
        Self { target, processor }
    }

    /// Relocates the vector table, runs the pre-jump hook, loads the
    /// application's stack pointer and branches to its reset handler.
    ///
    /// # Safety
    ///
    /// `base` must be the address `table` was read from, and `table` must
    /// describe an image that is actually flashed there.
    pub unsafe fn launch(mut self, base: u32, table: &VectorTable) -> ! {
        #[cfg(feature = "defmt")]
        defmt::info!(
            "handoff: base={=u32:#010x} sp={=u32:#010x} reset={=u32:#010x}",
            base,
            table.initial_sp,
            table.reset
        );

        self.target.relocate_vector_table(base);
        self.target.pre_jump();

        // The stack switch and branch must not be interrupted.
        self.processor.mask_interrupts();
        // SAFETY: only the branch follows.
        unsafe { self.processor.load_stack_pointer(table.initial_sp) };
        // SAFETY: the caller vouches for the image.
        unsafe { self.processor.branch(table.reset) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::panic::{self, AssertUnwindSafe};
    use std::rc::Rc;
    use std::vec::Vec;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Event {
        Relocate(u32),
        PreJump,
        Mask,
        StackPointer(u32),
        Branch(u32),
    }

    type Log = Rc<RefCell<Vec<Event>>>;

    struct FakeTarget(Log);

    impl Target for FakeTarget {
        fn relocate_vector_table(&mut self, base: u32) {
            self.0.borrow_mut().push(Event::Relocate(base));
        }

        fn pre_jump(&mut self) {
            self.0.borrow_mut().push(Event::PreJump);
        }
    }

    /// Branching unwinds with this payload, standing in for "gone".
    struct Branched;

    struct FakeCore(Log);

    impl Processor for FakeCore {
        fn mask_interrupts(&mut self) {
            self.0.borrow_mut().push(Event::Mask);
        }

        unsafe fn load_stack_pointer(&mut self, sp: u32) {
            self.0.borrow_mut().push(Event::StackPointer(sp));
        }

        unsafe fn branch(&mut self, entry: u32) -> ! {
            self.0.borrow_mut().push(Event::Branch(entry));
            panic::resume_unwind(std::boxed::Box::new(Branched))
        }
    }

    fn launch(base: u32, table: VectorTable) -> Vec<Event> {
        let log = Log::default();
        let handoff = Handoff::new(FakeTarget(log.clone()), FakeCore(log.clone()));
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            // SAFETY: the fake core never executes anything.
            unsafe { handoff.launch(base, &table) }
        }));
        let payload = result.err().expect("launch returned");
        assert!(payload.is::<Branched>());
        let events = log.borrow().clone();
        events
    }

    #[test]
    fn sequence_order() {
        let entry = 0x0800_8195;
        let events = launch(0x0800_8000, VectorTable::from_words(0x2000_1000, entry));
        assert_eq!(
            events,
            [
                Event::Relocate(0x0800_8000),
                Event::PreJump,
                Event::Mask,
                Event::StackPointer(0x2000_1000),
                Event::Branch(entry),
            ]
        );
    }

    #[test]
    fn nothing_runs_after_branch() {
        let events = launch(0x0800_4000, VectorTable::from_words(0x2001_FFF8, 0x0800_4101));
        assert_eq!(events.last(), Some(&Event::Branch(0x0800_4101)));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, Event::Branch(_)))
                .count(),
            1
        );
    }

    #[test]
    fn stack_pointer_set_after_hooks() {
        let events = launch(0x0800_8000, VectorTable::from_words(0x2000_1000, 0x0800_8195));
        let sp = events
            .iter()
            .position(|e| matches!(e, Event::StackPointer(_)))
            .unwrap();
        let pre_jump = events.iter().position(|e| *e == Event::PreJump).unwrap();
        let relocate = events
            .iter()
            .position(|e| matches!(e, Event::Relocate(_)))
            .unwrap();
        assert!(relocate < pre_jump && pre_jump < sp);
    }
}
