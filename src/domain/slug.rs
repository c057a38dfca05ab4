//! Lookup keys derived from post titles.
//!
//! A key is the lowercased title with every space replaced by `-`. Keys are
//! recomputed whenever the content directory is loaded and are never stored in
//! the payload. When two titles produce the same key, the later one is
//! retitled by appending [`COLLISION_MARKER`] until its key is free.

/// Character substituted for each space in a title.
pub const KEY_SEPARATOR: char = '-';

/// Text appended to a title whose key is already taken.
pub const COLLISION_MARKER: &str = "-";

/// Derive the lookup key for a title.
pub fn derive_key(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|ch| if ch == ' ' { KEY_SEPARATOR } else { ch })
        .collect()
}

/// Percent-encode a key so it can be embedded in a URL path segment.
pub fn url_escape(key: &str) -> String {
    url::form_urlencoded::byte_serialize(key.as_bytes()).collect()
}

/// Return a title whose key is not taken according to `is_taken`.
///
/// The marker is appended repeatedly, so every attempt yields a strictly
/// longer key and the loop ends once the finite set of taken keys is passed.
pub fn disambiguate_title<F>(title: &str, mut is_taken: F) -> String
where
    F: FnMut(&str) -> bool,
{
    let mut candidate = title.to_string();
    while is_taken(&derive_key(&candidate)) {
        candidate.push_str(COLLISION_MARKER);
    }
    candidate
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn lowercases_and_replaces_spaces() {
        assert_eq!(derive_key("Hello World"), "hello-world");
        assert_eq!(derive_key("Second Post"), "second-post");
    }

    #[test]
    fn every_space_becomes_a_separator() {
        assert_eq!(derive_key("a  b"), "a--b");
        assert_eq!(derive_key(" lead"), "-lead");
    }

    #[test]
    fn punctuation_and_unicode_are_preserved() {
        assert_eq!(derive_key("Café & Co?"), "café-&-co?");
    }

    #[test]
    fn url_escape_encodes_reserved_characters() {
        assert_eq!(url_escape("hello-world"), "hello-world");
        assert_eq!(url_escape("café-&-co?"), "caf%C3%A9-%26-co%3F");
    }

    #[test]
    fn disambiguate_keeps_free_titles() {
        let taken: HashSet<String> = HashSet::new();
        assert_eq!(
            disambiguate_title("Hello World", |key| taken.contains(key)),
            "Hello World"
        );
    }

    #[test]
    fn disambiguate_appends_marker_until_free() {
        let taken: HashSet<String> = ["hello-world", "hello-world-"]
            .into_iter()
            .map(String::from)
            .collect();

        let title = disambiguate_title("Hello World", |key| taken.contains(key));
        assert_eq!(title, "Hello World--");
        assert_eq!(derive_key(&title), "hello-world--");
    }
}
