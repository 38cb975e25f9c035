use crate::turn::Turn;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// A user-facing advisory produced during a turn.
///
/// Nothing in the core is fatal; failures surface here and the visible map
/// simply stays as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub turn_index: u64,
    pub level: NoticeLevel,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct NoticeBus {
    notices: Vec<Notice>,
}

impl NoticeBus {
    pub fn new() -> Self {
        Self {
            notices: Vec::new(),
        }
    }

    pub fn info(&mut self, turn: Turn, kind: &'static str, message: impl Into<String>) {
        self.push(turn, NoticeLevel::Info, kind, message.into());
    }

    pub fn warn(&mut self, turn: Turn, kind: &'static str, message: impl Into<String>) {
        self.push(turn, NoticeLevel::Warning, kind, message.into());
    }

    fn push(&mut self, turn: Turn, level: NoticeLevel, kind: &'static str, message: String) {
        self.notices.push(Notice {
            turn_index: turn.index,
            level,
            kind,
            message,
        });
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn count(&self, kind: &str) -> usize {
        self.notices.iter().filter(|n| n.kind == kind).count()
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}
