use ferry_vfs::VfsPath;

/// Visited paths of a pane. The cursor always points at an existing entry unless the
/// history is empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct History {
    entries: Vec<VfsPath>,
    cursor: usize,
}

impl History {
    pub fn entries(&self) -> &[VfsPath] {
        &self.entries
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current(&self) -> Option<&VfsPath> {
        self.entries.get(self.cursor)
    }

    pub fn get(&self, index: usize) -> Option<&VfsPath> {
        self.entries.get(index)
    }

    /// Appends after the cursor, dropping every entry ahead of it.
    pub fn push(&mut self, path: VfsPath) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }

        self.entries.push(path);
        self.cursor = self.entries.len() - 1;
    }

    /// Drops every entry ahead of the cursor.
    pub fn truncate_forward(&mut self) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
    }

    /// Index reached by moving `offset` steps from the cursor, if it exists.
    pub fn index_at(&self, offset: isize) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }

        let index = self.cursor.checked_add_signed(offset)?;
        if index < self.entries.len() {
            Some(index)
        } else {
            None
        }
    }

    pub fn set_cursor(&mut self, index: usize) -> bool {
        if index < self.entries.len() {
            self.cursor = index;
            true
        } else {
            false
        }
    }

    pub fn can_go_backward(&self) -> bool {
        !self.entries.is_empty() && self.cursor > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }
}
