use std::collections::HashSet;

use ferry_vfs::DirectoryEntry;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    names: HashSet<String>,
}

impl Selection {
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Refuses names that are not part of the listing.
    pub fn select(&mut self, name: &str, listing: &[DirectoryEntry]) -> bool {
        if !listing.iter().any(|entry| entry.name == name) {
            return false;
        }

        self.names.insert(name.to_owned());
        true
    }

    pub fn deselect(&mut self, name: &str) -> bool {
        self.names.remove(name)
    }

    pub fn select_all(&mut self, listing: &[DirectoryEntry]) {
        self.names = listing.iter().map(|entry| entry.name.clone()).collect();
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    /// Drops names that vanished from the listing.
    pub fn prune(&mut self, listing: &[DirectoryEntry]) {
        self.names
            .retain(|name| listing.iter().any(|entry| &entry.name == name));
    }

    /// Selected entries in listing order.
    pub fn entries(&self, listing: &[DirectoryEntry]) -> Vec<DirectoryEntry> {
        listing
            .iter()
            .filter(|entry| self.names.contains(&entry.name))
            .cloned()
            .collect()
    }

    pub fn names(&self, listing: &[DirectoryEntry]) -> Vec<String> {
        listing
            .iter()
            .filter(|entry| self.names.contains(&entry.name))
            .map(|entry| entry.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod test {
    use ferry_vfs::{EntryKind, VfsPath};

    use super::*;

    fn listing(names: &[&str]) -> Vec<DirectoryEntry> {
        let parent = VfsPath::memory("scratch");
        names
            .iter()
            .map(|name| DirectoryEntry::new(&parent, name, EntryKind::File, 1))
            .collect()
    }

    #[test]
    fn absent_names_are_refused() {
        let listing = listing(&["a", "b"]);
        let mut selection = Selection::default();

        assert!(selection.select("a", &listing));
        assert!(!selection.select("ghost", &listing));
        assert_eq!(vec!["a".to_owned()], selection.names(&listing));
    }

    #[test]
    fn prune_keeps_surviving_names() {
        let mut selection = Selection::default();
        selection.select_all(&listing(&["a", "b", "c"]));

        let reloaded = listing(&["a", "c"]);
        selection.prune(&reloaded);

        assert_eq!(2, selection.len());
        assert!(!selection.contains("b"));
        assert_eq!(vec!["a", "c"], selection.names(&reloaded));
    }
}
