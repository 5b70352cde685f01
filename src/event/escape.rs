//! Escape tag handling for destination path templates
//!
//! A template such as `/logs/%{host}/%Y-%m-%d.log` is resolved per event.
//! `%{key}` reads an event field or attribute, `%%` is a literal percent sign
//! and any other `%x` is a time escape rendered from the event timestamp.

use super::Event;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%(\w|%)|%\{([\w.-]+)\}").expect("escape tag pattern is valid")
});

/// Whether `template` contains at least one escape tag
pub fn contains_tag(template: &str) -> bool {
    TAG_REGEX.is_match(template)
}

/// Resolve every escape tag in `template` against `event`
///
/// Unknown attributes and unknown time escapes resolve to the empty string.
pub fn escape_string(template: &str, event: &Event) -> String {
    TAG_REGEX
        .replace_all(template, |caps: &Captures<'_>| {
            if let Some(key) = caps.get(2) {
                field_value(key.as_str(), event)
            } else if let Some(c) = caps.get(1).and_then(|m| m.as_str().chars().next()) {
                shorthand_value(c, event)
            } else {
                String::new()
            }
        })
        .into_owned()
}

fn field_value(key: &str, event: &Event) -> String {
    match key {
        "host" => event.host.clone(),
        "nanos" => event.nanos.to_string(),
        "priority" => event.priority.to_string(),
        "timestamp" => event.timestamp.to_string(),
        "body" => event.body.clone(),
        other => event.attribute(other).unwrap_or_default().to_string(),
    }
}

fn shorthand_value(c: char, event: &Event) -> String {
    let dt = event.datetime();
    let pattern = match c {
        '%' => return "%".to_string(),
        's' => return (event.timestamp.div_euclid(1000)).to_string(),
        't' => return event.timestamp.to_string(),
        'a' => "%a",
        'A' => "%A",
        'b' => "%b",
        'B' => "%B",
        'c' => "%a %b %d %T %Y",
        'd' => "%d",
        'D' => "%m/%d/%y",
        'H' => "%H",
        'I' => "%I",
        'j' => "%j",
        'k' => "%-H",
        'l' => "%-I",
        'm' => "%m",
        'M' => "%M",
        'p' => "%P",
        'S' => "%S",
        'y' => "%y",
        'Y' => "%Y",
        'z' => "%z",
        _ => return String::new(),
    };
    dt.format(pattern).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2011-03-04 05:06:07.089 UTC, a Friday
    const TS: i64 = 1_299_215_167_089;

    fn event() -> Event {
        Event::new("body text")
            .with_host("web-1")
            .with_timestamp(TS)
            .with_attribute("service", "api")
    }

    #[test]
    fn test_contains_tag() {
        assert!(contains_tag("/logs/%{host}.log"));
        assert!(contains_tag("/logs/%Y/%m/%d.log"));
        assert!(contains_tag("/logs/100%%.log"));
        assert!(!contains_tag("/logs/all.log"));
        assert!(!contains_tag("/logs/%.log"));
        assert!(!contains_tag("/logs/%{}.log"));
    }

    #[test]
    fn test_escape_fields_and_attributes() {
        let e = event();
        assert_eq!(escape_string("/logs/%{host}.log", &e), "/logs/web-1.log");
        assert_eq!(escape_string("/%{service}/%{host}", &e), "/api/web-1");
        assert_eq!(escape_string("/%{priority}", &e), "/INFO");
        assert_eq!(escape_string("/%{missing}x", &e), "/x");
    }

    #[test]
    fn test_escape_time_shorthand() {
        let e = event();
        assert_eq!(escape_string("/%Y-%m-%d/%H%M%S", &e), "/2011-03-04/050607");
        assert_eq!(escape_string("%a %b %y %j", &e), "Fri Mar 11 063");
        assert_eq!(escape_string("%D", &e), "03/04/11");
        assert_eq!(escape_string("%k %l %p", &e), "5 5 am");
        assert_eq!(escape_string("%s", &e), "1299215167");
        assert_eq!(escape_string("%t", &e), "1299215167089");
        assert_eq!(escape_string("%z", &e), "+0000");
    }

    #[test]
    fn test_escape_percent_and_unknown() {
        let e = event();
        assert_eq!(escape_string("100%%", &e), "100%");
        assert_eq!(escape_string("a%Qb", &e), "ab");
        assert_eq!(escape_string("/plain/path", &e), "/plain/path");
    }
}
