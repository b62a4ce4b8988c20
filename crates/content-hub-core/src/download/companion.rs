//! Usage note generated next to a downloaded plugin

pub const COMPANION_NOTE: &str = "USAGE.md";

/// Slash commands a README advertises as `/{bundle_id}:{name}` in table rows,
/// in order of first appearance.
pub fn advertised_commands(bundle_id: &str, readme: &str) -> Vec<String> {
    let marker = format!("`/{}:", bundle_id);
    let mut commands: Vec<String> = Vec::new();

    for line in readme.lines().map(str::trim).filter(|l| l.starts_with('|')) {
        let mut rest = line;
        while let Some(start) = rest.find(&marker) {
            rest = &rest[start + marker.len()..];
            let Some(end) = rest.find('`') else { break };
            let name = rest[..end].trim();
            if !name.is_empty() && !commands.iter().any(|c| c == name) {
                commands.push(name.to_string());
            }
            rest = &rest[end..];
        }
    }
    commands
}

/// Markdown note mapping each prefixed command to its short form
pub fn companion_note(bundle_id: &str, readme: Option<&str>) -> String {
    let commands = readme
        .map(|text| advertised_commands(bundle_id, text))
        .unwrap_or_default();

    let mut note = format!("# {}\n\n", bundle_id);
    if commands.is_empty() {
        note.push_str("No slash commands were found in this plugin's README.\n");
        return note;
    }

    note.push_str("Commands from this plugin are available without the plugin prefix:\n\n");
    note.push_str("| Command | Plugin form |\n|---|---|\n");
    for name in &commands {
        note.push_str(&format!("| `/{name}` | `/{bundle_id}:{name}` |\n"));
    }
    note
}

#[cfg(test)]
mod tests {
    use super::*;

    const README: &str = "\
# Review kit

| Command | What it does |
|---|---|
| `/review-kit:summarize` | Summarize a diff |
| `/review-kit:lint` and `/review-kit:summarize` | Lint |

Run `/review-kit:outside-table` anywhere.
| `/other-kit:nope` | Not ours |
";

    #[test]
    fn extracts_table_rows_only() {
        assert_eq!(
            advertised_commands("review-kit", README),
            vec!["summarize".to_string(), "lint".to_string()]
        );
    }

    #[test]
    fn note_lists_short_forms() {
        let note = companion_note("review-kit", Some(README));
        assert!(note.starts_with("# review-kit\n"));
        assert!(note.contains("| `/summarize` | `/review-kit:summarize` |"));
        assert!(note.contains("| `/lint` | `/review-kit:lint` |"));
        assert!(!note.contains("outside-table"));
    }

    #[test]
    fn placeholder_without_commands() {
        let note = companion_note("empty", None);
        assert!(note.contains("No slash commands"));
        let note = companion_note("empty", Some("# nothing here"));
        assert!(note.contains("No slash commands"));
    }
}
