/// Public link to a status, handed to the shortener.
pub fn status_url(author: &str, id: &str) -> String {
    format!("http://twitter.com/#!/{author}/status/{id}")
}

/// Append the short-link annotation to a kept text.
pub fn annotate_with_link(text: &str, short_url: &str) -> String {
    format!("{text} ( Tweet: {short_url} )")
}

/// Render a kept message as a single broadcast line: `@author text`.
///
/// Line breaks become spaces and the two entities the stream escapes are decoded.
pub fn format_kept(author: &str, text: &str) -> String {
    format!("@{author} {text}")
        .replace(['\r', '\n'], " ")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kept_line_is_flattened_and_unescaped() {
        assert_eq!(
            format_kept("alice", "a &lt;b&gt;\r\nc"),
            "@alice a <b>  c"
        );
    }

    #[test]
    fn other_entities_are_left_alone() {
        assert_eq!(format_kept("a", "x &amp; y"), "@a x &amp; y");
    }

    #[test]
    fn annotation_and_status_url_shapes() {
        assert_eq!(
            status_url("bob", "123"),
            "http://twitter.com/#!/bob/status/123"
        );
        assert_eq!(
            annotate_with_link("hi", "http://bit.ly/x"),
            "hi ( Tweet: http://bit.ly/x )"
        );
    }
}
