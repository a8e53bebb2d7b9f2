//! Recent chat, shared by every prompt.

use std::collections::VecDeque;

use sunny_core::ChatLine;

/// The last few lines said anywhere in the village, oldest first.
#[derive(Debug, Clone)]
pub struct ChatHistory {
    lines: VecDeque<ChatLine>,
    capacity: usize,
}

impl ChatHistory {
    /// Keep at most `capacity` lines.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a line, dropping the oldest beyond capacity.
    pub fn push(&mut self, sender: impl Into<String>, text: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        while self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(ChatLine {
            sender: sender.into(),
            text: text.into(),
        });
    }

    /// The newest `n` lines, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<ChatLine> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip).cloned().collect()
    }

    /// Lines held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether nothing has been said.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
