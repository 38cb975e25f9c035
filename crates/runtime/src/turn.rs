/// One pass of the main scheduling loop.
///
/// Every user action, agent push and fetch settlement runs in its own turn.
/// Map-surface mutations are only issued at the end of a turn, after the
/// overlay has been composed, so the renderer never sees a half-applied set.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Turn {
    /// 0-based turn index.
    pub index: u64,
}

impl Turn {
    pub fn new(index: u64) -> Self {
        Self { index }
    }

    pub fn next(self) -> Self {
        Self::new(self.index + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::Turn;

    #[test]
    fn next_advances_index() {
        let t0 = Turn::default();
        assert_eq!(t0.index, 0);
        assert_eq!(t0.next().next(), Turn::new(2));
    }
}
