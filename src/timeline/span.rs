use crate::foundation::core::FrameIndex;

/// Placement of a clip on its track: `[begin, begin + duration)`, `duration >= 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FrameSpan {
    begin: u64,
    duration: u64,
}

impl FrameSpan {
    /// Build a span, clamping the duration up to one frame.
    pub fn new(begin: u64, duration: u64) -> Self {
        Self {
            begin,
            duration: duration.max(1),
        }
    }

    /// Build a span from signed input, clamping `begin >= 0` and `duration >= 1`.
    pub fn clamped(begin: i64, duration: i64) -> Self {
        Self::new(
            u64::try_from(begin).unwrap_or(0),
            u64::try_from(duration).unwrap_or(0),
        )
    }

    pub fn begin(self) -> u64 {
        self.begin
    }

    pub fn duration(self) -> u64 {
        self.duration
    }

    /// Exclusive end frame.
    pub fn end(self) -> u64 {
        self.begin.saturating_add(self.duration)
    }

    pub fn contains(self, frame: FrameIndex) -> bool {
        self.begin <= frame.0 && frame.0 < self.end()
    }

    pub fn intersects(self, other: Self) -> bool {
        self.begin < other.end() && other.begin < self.end()
    }

    pub fn offset(self, delta: i64) -> Self {
        let begin = if delta >= 0 {
            self.begin.saturating_add(delta as u64)
        } else {
            self.begin.saturating_sub(delta.unsigned_abs())
        };
        Self { begin, ..self }
    }

    pub fn with_begin(self, begin: u64) -> Self {
        Self { begin, ..self }
    }

    pub fn with_duration(self, duration: u64) -> Self {
        Self::new(self.begin, duration)
    }

    /// Smallest span covering both.
    pub fn union(self, other: Self) -> Self {
        let begin = self.begin.min(other.begin);
        let end = self.end().max(other.end());
        Self::new(begin, end - begin)
    }
}
