use ferry_vfs::{DirectoryEntry, EntryKind};

const UNITS: [&str; 5] = ["KB", "MB", "GB", "TB", "PB"];

pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.1} {}", value, UNITS[unit])
}

pub fn format_entry(entry: &DirectoryEntry) -> String {
    let kind = match entry.kind {
        EntryKind::Directory => 'd',
        EntryKind::File => '-',
        EntryKind::Symlink => 'l',
    };

    let size = match entry.kind {
        EntryKind::Directory => String::new(),
        EntryKind::File | EntryKind::Symlink => format_bytes(entry.size),
    };

    let marker = if entry.is_valid { "" } else { " (stale)" };
    format!(
        "{} {:>10} {} {}{}",
        kind,
        size,
        entry.file_type.code(),
        entry.name,
        marker
    )
}

pub fn format_progress(transferred: u64, total: u64) -> String {
    let percent = if total == 0 {
        0
    } else {
        transferred.saturating_mul(100) / total
    };

    format!(
        "{:>3}% {} / {}",
        percent,
        format_bytes(transferred),
        format_bytes(total)
    )
}
