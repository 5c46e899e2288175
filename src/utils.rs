//! Utility functions shared by the vendor client and the dispatcher.

use chrono::Local;

/// Parse the vendor's text response into `host:port` entries.
///
/// The vendor separates entries with CRLF; plain LF is accepted too. Blank
/// lines and `#` comments are skipped.
pub(crate) fn parse_vendor_list(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                None
            } else {
                Some(line.to_string())
            }
        })
        .collect()
}

/// Prefix a user-facing status line with the local time.
pub(crate) fn with_time_string(message: &str) -> String {
    format!("{}: {}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_crlf_lists() {
        let parsed = parse_vendor_list("1.1.1.1:80\r\n2.2.2.2:8080\r\n\r\n# comment\r\n");
        assert_eq!(parsed, vec!["1.1.1.1:80", "2.2.2.2:8080"]);
    }

    #[test]
    fn status_lines_carry_the_message() {
        assert!(with_time_string("hello").ends_with(": hello"));
    }
}
