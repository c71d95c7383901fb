pub const DEFAULT_HISTORY_LIMIT: usize = 500;

/// Submitted commands with shell-style up/down browsing.
///
/// `cursor` is `None` while editing the live draft, otherwise an index into
/// `entries`.
#[derive(Debug, Clone)]
pub struct CommandHistory {
    entries: Vec<String>,
    cursor: Option<usize>,
    limit: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl CommandHistory {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: None,
            limit: limit.max(1),
        }
    }

    /// Record a submitted command and return to the live draft.
    pub fn push(&mut self, command: String) {
        if self.entries.len() == self.limit {
            self.entries.remove(0);
        }
        self.entries.push(command);
        self.cursor = None;
    }

    /// Step back towards older commands, stopping at the oldest.
    pub fn up(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let next = match self.cursor {
            None => self.entries.len() - 1,
            Some(i) => i.saturating_sub(1),
        };
        self.cursor = Some(next);
        Some(&self.entries[next])
    }

    /// Step forward towards newer commands. Past the newest, returns the empty
    /// draft and leaves browsing mode.
    pub fn down(&mut self) -> Option<&str> {
        let current = self.cursor?;
        let next = current + 1;
        if next >= self.entries.len() {
            self.cursor = None;
            return Some("");
        }
        self.cursor = Some(next);
        Some(&self.entries[next])
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = None;
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
