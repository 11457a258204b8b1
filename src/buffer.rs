//! Double-buffered vorton state.
//!
//! Positions and vorticities live in two parallel buffers. During a stage all
//! reads target the back buffer and all writes target the front buffer, so a
//! write made in a stage is never visible to a read in the same stage.
//! Visibility happens when the orchestrator swaps the buffers between stages:
//! the full swap at the start of each fixed step, or the vorticity-only flip
//! that chains two vorticity-writing stages within one tick.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use glam::Vec3;

/// One shareable buffer of `Vec3` slots.
///
/// Interior mutability lets worker threads write their own front-buffer slot
/// through a shared reference. Soundness rests on the stage protocol:
/// each slot index is owned by exactly one work item per stage, back-buffer
/// slots are never written while a stage is in flight, and `swap` only runs
/// between stages.
struct SlotBuffer(Box<[UnsafeCell<Vec3>]>);

// SAFETY: concurrent access is index-disjoint per the stage protocol above.
unsafe impl Sync for SlotBuffer {}

impl SlotBuffer {
    fn zeroed(n: usize) -> Self {
        Self((0..n).map(|_| UnsafeCell::new(Vec3::ZERO)).collect())
    }

    fn get(&self, i: usize) -> Vec3 {
        // SAFETY: no writer touches this slot while it is readable (back
        // buffer during a stage, or any buffer with no stage in flight).
        unsafe { *self.0[i].get() }
    }

    fn set(&self, i: usize, value: Vec3) {
        // SAFETY: this slot belongs to exactly one work item this stage.
        unsafe { *self.0[i].get() = value }
    }
}

/// Double-buffered position and vorticity arrays for a fixed vorton count.
///
/// Reads (`position`, `vorticity`) resolve against the back buffer; writes
/// (`set_position`, `set_vorticity`) land in the front buffer. Callers must
/// guarantee no stage is active when [`VortonStore::swap`] is invoked.
pub struct VortonStore {
    positions: [SlotBuffer; 2],
    vorticities: [SlotBuffer; 2],
    /// Index (0 or 1) of the front position buffer; back is `1 - front`.
    front_positions: AtomicUsize,
    /// Index (0 or 1) of the front vorticity buffer. Tracked separately so a
    /// vorticity-writing stage can publish mid-tick without disturbing
    /// positions.
    front_vorticities: AtomicUsize,
}

impl VortonStore {
    /// Allocate `n` vortons with zeroed position and vorticity in both buffers.
    pub fn new(n: usize) -> Self {
        Self {
            positions: [SlotBuffer::zeroed(n), SlotBuffer::zeroed(n)],
            vorticities: [SlotBuffer::zeroed(n), SlotBuffer::zeroed(n)],
            front_positions: AtomicUsize::new(0),
            front_vorticities: AtomicUsize::new(0),
        }
    }

    /// Number of vortons in the store. Fixed for the simulation lifetime.
    pub fn len(&self) -> usize {
        self.positions[0].0.len()
    }

    /// True if the store holds no vortons.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exchange front and back buffers for positions and vorticities as a
    /// single logical operation. Must not be interleaved with stage work.
    pub fn swap(&self) {
        self.front_positions.fetch_xor(1, Ordering::AcqRel);
        self.front_vorticities.fetch_xor(1, Ordering::AcqRel);
    }

    /// Exchange only the vorticity buffers, leaving positions untouched.
    ///
    /// When two vorticity-writing stages run in the same tick (stretch/tilt
    /// then diffusion), the first stage's front writes would otherwise be
    /// overwritten unseen: the second stage reads the back buffer and writes
    /// every slot of the front. Flipping the vorticity pair between the two
    /// stages publishes the first stage's output as the second stage's input.
    /// Same contract as `swap`: no stage may be in flight.
    pub(crate) fn swap_vorticities(&self) {
        self.front_vorticities.fetch_xor(1, Ordering::AcqRel);
    }

    /// Read vorton `i`'s position from the back buffer.
    pub fn position(&self, i: usize) -> Vec3 {
        self.positions[1 - self.front_positions.load(Ordering::Acquire)].get(i)
    }

    /// Read vorton `i`'s vorticity from the back buffer.
    pub fn vorticity(&self, i: usize) -> Vec3 {
        self.vorticities[1 - self.front_vorticities.load(Ordering::Acquire)].get(i)
    }

    /// Write vorton `i`'s position into the front buffer.
    pub fn set_position(&self, i: usize, value: Vec3) {
        self.positions[self.front_positions.load(Ordering::Acquire)].set(i, value);
    }

    /// Write vorton `i`'s vorticity into the front buffer.
    pub fn set_vorticity(&self, i: usize, value: Vec3) {
        self.vorticities[self.front_vorticities.load(Ordering::Acquire)].set(i, value);
    }

    /// Write vorton `i`'s state into *both* buffers.
    ///
    /// Setup operations (distribution, injection) initialize through this and
    /// then force a swap, so the first tick observes initialized values no
    /// matter which buffer ends up in front.
    pub fn initialize(&self, i: usize, position: Vec3, vorticity: Vec3) {
        for buf in &self.positions {
            buf.set(i, position);
        }
        for buf in &self.vorticities {
            buf.set(i, vorticity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_is_zeroed() {
        let store = VortonStore::new(4);
        assert_eq!(store.len(), 4);
        for i in 0..4 {
            assert_eq!(store.position(i), Vec3::ZERO);
            assert_eq!(store.vorticity(i), Vec3::ZERO);
        }
    }

    #[test]
    fn test_write_invisible_until_swap() {
        let store = VortonStore::new(2);
        store.set_position(0, Vec3::ONE);
        store.set_vorticity(0, Vec3::new(0.0, 1.0, 0.0));

        // Reads still target the back buffer.
        assert_eq!(store.position(0), Vec3::ZERO);
        assert_eq!(store.vorticity(0), Vec3::ZERO);

        store.swap();
        assert_eq!(store.position(0), Vec3::ONE);
        assert_eq!(store.vorticity(0), Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_initialize_visible_in_both_buffers() {
        let store = VortonStore::new(1);
        let p = Vec3::new(1.0, 2.0, 3.0);
        store.initialize(0, p, Vec3::X);

        assert_eq!(store.position(0), p);
        store.swap();
        assert_eq!(store.position(0), p);
        assert_eq!(store.vorticity(0), Vec3::X);
    }

    #[test]
    fn test_swap_vorticities_publishes_vorticity_only() {
        let store = VortonStore::new(1);
        store.set_position(0, Vec3::ONE);
        store.set_vorticity(0, Vec3::X);

        store.swap_vorticities();
        // The vorticity write is now readable; the position write is not.
        assert_eq!(store.vorticity(0), Vec3::X);
        assert_eq!(store.position(0), Vec3::ZERO);

        // A full swap afterwards publishes the position and retires the
        // vorticity back to its pre-publish buffer.
        store.swap();
        assert_eq!(store.position(0), Vec3::ONE);
        assert_eq!(store.vorticity(0), Vec3::ZERO);
    }

    #[test]
    fn test_double_swap_round_trips() {
        let store = VortonStore::new(1);
        store.set_position(0, Vec3::ONE);
        store.swap();
        store.swap();
        // The write is in front again, back buffer still holds the original.
        assert_eq!(store.position(0), Vec3::ZERO);
    }
}
