//! Hierarchical path keys for tree entities.
//!
//! A path joins the names from root to node with `/`. Any `/` or `\`
//! inside a name is backslash-escaped before joining, so two different
//! name chains can never produce the same path string. Paths are derived
//! fresh on every pass and are never persisted as identity.

/// Separator between path segments.
pub const SEPARATOR: char = '/';

/// Escape one name so it can be joined unambiguously.
#[must_use]
pub fn escape_segment(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch == SEPARATOR || ch == '\\' {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Join already-ordered segments (root first) into a path key.
#[must_use]
pub fn join_path<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut path = String::new();
    for (i, segment) in segments.into_iter().enumerate() {
        if i > 0 {
            path.push(SEPARATOR);
        }
        path.push_str(&escape_segment(segment.as_ref()));
    }
    path
}

/// Compute the path key for a node from its ancestor names (root to
/// parent, in order) and its own name.
///
/// Total over well-formed trees: a node without ancestors is a root and
/// its path is just its escaped name.
#[must_use]
pub fn resolve_path(ancestors: &[String], name: &str) -> String {
    join_path(ancestors.iter().map(String::as_str).chain([name]))
}

/// Split a declared import path into raw segments.
///
/// Import files delimit segments with either `|` or `/`; `|` wins when
/// present so task names containing `/` survive pipe-delimited files.
/// Blank segments are dropped.
#[must_use]
pub fn split_import_path(raw: &str) -> Vec<String> {
    let delimiter = if raw.contains('|') { '|' } else { SEPARATOR };
    raw.split(delimiter)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn resolve_path_joins_root_to_leaf() {
        let ancestors = vec!["Clients".to_string(), "Acme".to_string()];
        assert_eq!(resolve_path(&ancestors, "Backend"), "Clients/Acme/Backend");
    }

    #[test]
    fn resolve_path_of_root_is_its_name() {
        assert_eq!(resolve_path(&[], "Internal"), "Internal");
    }

    #[test]
    fn separator_inside_names_is_escaped() {
        let ancestors = vec!["R/D".to_string()];
        assert_eq!(resolve_path(&ancestors, "Tools"), "R\\/D/Tools");

        // "A/B" under root and "B" under "A" must not collide
        let nested = resolve_path(&["A".to_string()], "B");
        let flat = resolve_path(&[], "A/B");
        assert_ne!(nested, flat);
    }

    #[test]
    fn backslash_inside_names_is_escaped() {
        assert_eq!(escape_segment("a\\b"), "a\\\\b");
    }

    #[test]
    fn split_import_path_prefers_pipes() {
        assert_eq!(split_import_path("A|B|C"), vec!["A", "B", "C"]);
        assert_eq!(split_import_path("A/B/C"), vec!["A", "B", "C"]);
        // With pipes present, slashes stay inside the segment
        assert_eq!(split_import_path("R/D|Tools"), vec!["R/D", "Tools"]);
    }

    #[test]
    fn split_import_path_drops_blank_segments() {
        assert_eq!(split_import_path(" A | |B "), vec!["A", "B"]);
        assert!(split_import_path("  ").is_empty());
    }
}
