/// Remote status string → local status enum, fixed table.
/// Anything unrecognized maps to `"open"` rather than failing the sync.
pub fn map_status(remote_status: &str) -> &'static str {
    match remote_status {
        "Done" => "done",
        "In Progress" => "in_progress",
        "Blocked" => "blocked",
        "Review" => "review",
        "Backlog" => "backlog",
        "Cancelled" => "wont_do",
        _ => "open",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_statuses_map_exactly() {
        assert_eq!(map_status("Done"), "done");
        assert_eq!(map_status("In Progress"), "in_progress");
        assert_eq!(map_status("Blocked"), "blocked");
        assert_eq!(map_status("Review"), "review");
        assert_eq!(map_status("Backlog"), "backlog");
        assert_eq!(map_status("Cancelled"), "wont_do");
    }

    #[test]
    fn unknown_status_falls_back_to_open() {
        assert_eq!(map_status("Triage"), "open");
    }
}
