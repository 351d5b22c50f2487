use crate::types::Frame;

/// Default number of retained skeleton frames (two seconds at 30 Hz).
pub const DEFAULT_CAPACITY: usize = 60;

/// Fixed-capacity ring of the most recent skeleton frames.
///
/// Slots start zeroed, so lookbacks before the ring has filled return
/// default frames (timestamp 0, nothing tracked). Callers must tolerate that.
pub struct FrameHistory {
    slots: Vec<Frame>,
    /// Index of the most recently pushed frame.
    cursor: usize,
}

impl FrameHistory {
    /// # Panics
    ///
    /// Panics if `capacity` is zero. [`EngineConfig::validate`] rejects that
    /// before an engine builds its history.
    ///
    /// [`EngineConfig::validate`]: crate::config::EngineConfig::validate
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be non-zero");
        Self {
            slots: vec![Frame::default(); capacity],
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Store a copy of `frame`, overwriting the oldest entry.
    pub fn push(&mut self, frame: &Frame) {
        self.cursor = (self.cursor + 1) % self.slots.len();
        self.slots[self.cursor] = *frame;
    }

    /// Frame `-offset` steps before the most recent push; `at(0)` is the newest.
    ///
    /// `offset` must be in `(-capacity, 0]`. Larger lookbacks wrap and return
    /// the wrong frame; this is checked in debug builds only.
    pub fn at(&self, offset: isize) -> &Frame {
        let cap = self.slots.len() as isize;
        debug_assert!(offset <= 0 && -offset < cap, "lookback {} out of range", offset);
        let index = (self.cursor as isize + offset).rem_euclid(cap);
        &self.slots[index as usize]
    }

    /// Most recently pushed frame.
    pub fn current(&self) -> &Frame {
        self.at(0)
    }
}

impl Default for FrameHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
