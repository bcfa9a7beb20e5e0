//! Fixed-size rotating slot set.
//!
//! "Current" and "previous" are pure functions of a monotonically increasing
//! counter, so the rotation can be replayed and checked without touching the
//! slot contents.

#[derive(Debug)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    index: u64,
}

impl<T> RingBuffer<T> {
    /// Panics if `slots` is empty.
    pub fn new(slots: Vec<T>, index: u64) -> Self {
        assert!(!slots.is_empty(), "ring buffer needs at least one slot");
        Self { slots, index }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The rotation counter.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Slot position `back` steps behind the current one.
    pub fn slot_of(&self, back: usize) -> usize {
        let len = self.slots.len() as u64;
        ((self.index + len * back as u64 - back as u64) % len) as usize
    }

    pub fn current(&self) -> &T {
        &self.slots[self.slot_of(0)]
    }

    pub fn current_mut(&mut self) -> &mut T {
        let slot = self.slot_of(0);
        &mut self.slots[slot]
    }

    /// Slot written `back` rotations ago; `previous(0)` is `current()`.
    pub fn previous(&self, back: usize) -> &T {
        &self.slots[self.slot_of(back)]
    }

    pub fn advance(&mut self) {
        self.index += 1;
    }

    /// Mutable current slot alongside the one written just before it.
    pub fn current_with_previous_mut(&mut self) -> (&mut T, &T) {
        let (current, history) = self.split_history::<1>();
        (current, history[0])
    }

    /// Mutable current slot alongside the two slots written before it.
    pub fn current_with_history_mut(&mut self) -> (&mut T, &T, &T) {
        let (current, history) = self.split_history::<2>();
        (current, history[0], history[1])
    }

    fn split_history<const N: usize>(&mut self) -> (&mut T, [&T; N]) {
        assert!(self.slots.len() > N, "ring of {} slots has no {}-deep history", self.slots.len(), N);
        let current_slot = self.slot_of(0);
        let wanted: [usize; N] = std::array::from_fn(|i| self.slot_of(i + 1));
        let mut current = None;
        let mut history: [Option<&T>; N] = [None; N];
        for (slot, value) in self.slots.iter_mut().enumerate() {
            if slot == current_slot {
                current = Some(value);
            } else if let Some(pos) = wanted.iter().position(|&w| w == slot) {
                history[pos] = Some(&*value);
            }
        }
        // slot_of(0..=N) are distinct while len > N
        let history = history.map(|h| h.unwrap_or_else(|| unreachable!("history slot aliased")));
        (current.unwrap_or_else(|| unreachable!("current slot missing")), history)
    }

    pub fn slots(&self) -> &[T] {
        &self.slots
    }
}
