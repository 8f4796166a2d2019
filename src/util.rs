/// Characters that cannot appear in a file name on any of the platforms we run on.
fn is_invalid_filename_char(c: char) -> bool {
    c.is_control() || matches!(c, '"' | '<' | '>' | '|' | ':' | '*' | '?' | '\\' | '/')
}

/// Letters plus ASCII digits. Letter-like numerals (`Ⅻ`) and other numeric
/// symbols (`²`) are rejected.
fn is_letter_or_digit(c: char) -> bool {
    (c.is_alphabetic() && !c.is_numeric()) || c.is_ascii_digit()
}

/// Turns a video title into a file stem. Each rejected character becomes one `_`,
/// so the result has as many characters as the title.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if is_invalid_filename_char(c) { '_' } else { c })
        .map(|c| if is_letter_or_digit(c) { c } else { '_' })
        .collect()
}

/// Everything after the first `v=`, trailing query parameters included.
pub fn video_id_from_url(url: &str) -> Option<&str> {
    url.find("v=").map(|idx| &url[idx + 2..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_id_after_v_marker() {
        assert_eq!(video_id_from_url("https://x/watch?v=ABC123"), Some("ABC123"));
    }

    #[test]
    fn keeps_trailing_parameters() {
        assert_eq!(
            video_id_from_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s"),
            Some("dQw4w9WgXcQ&t=42s")
        );
    }

    #[test]
    fn uses_first_marker_only() {
        assert_eq!(video_id_from_url("https://x/?v=one&v=two"), Some("one&v=two"));
    }

    #[test]
    fn no_marker_means_no_id() {
        assert_eq!(video_id_from_url("https://youtu.be/ABC123"), None);
    }

    #[test]
    fn sanitizes_one_underscore_per_character() {
        let title = "Song: Title?";
        let out = sanitize_title(title);
        assert_eq!(out, "Song__Title_");
        assert_eq!(out.chars().count(), title.chars().count());
        assert!(out.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    #[test]
    fn sanitizing_strips_path_separators() {
        assert_eq!(sanitize_title("../etc/passwd"), "___etc_passwd");
        assert_eq!(sanitize_title("a\\b\tc"), "a_b_c");
    }

    #[test]
    fn keeps_non_ascii_letters() {
        assert_eq!(sanitize_title("Café 2"), "Café_2");
    }

    #[test]
    fn numeric_symbols_become_underscores() {
        assert_eq!(sanitize_title("x²Ⅻ9"), "x__9");
        assert_eq!(sanitize_title("½ Beat"), "__Beat");
    }

    #[test]
    fn different_titles_can_collide() {
        assert_eq!(sanitize_title("a-b"), sanitize_title("a b"));
    }
}
