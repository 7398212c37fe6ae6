// src/content/excerpt.rs
//! Excerpt pipeline: strip markup, strip shortcodes, cut at the "more"
//! marker if present, otherwise clip to the budget at a word boundary.

use once_cell::sync::OnceCell;
use regex::Regex;

pub const EXCERPT_BUDGET: usize = 200;
pub const ELLIPSIS: &str = "...";

fn more_marker() -> Option<&'static Regex> {
    static RE: OnceCell<Option<Regex>> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--more(.*?)?-->").ok())
        .as_ref()
}

fn noise() -> Option<&'static Regex> {
    static RE: OnceCell<Option<Regex>> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)<!--.*?-->|<(script|style)[^>]*>.*?</(script|style)>").ok())
        .as_ref()
}

/// Tags that separate words when rendered.
fn block_tag() -> Option<&'static Regex> {
    static RE: OnceCell<Option<Regex>> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)</?(p|div|br|hr|li|ul|ol|dl|dt|dd|h[1-6]|table|thead|tbody|tr|td|th|blockquote|pre|section|article|header|footer|figure|figcaption)\b[^>]*>",
        )
        .ok()
    })
    .as_ref()
}

fn any_tag() -> Option<&'static Regex> {
    static RE: OnceCell<Option<Regex>> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"</?[^>]+>").ok()).as_ref()
}

fn whitespace() -> Option<&'static Regex> {
    static RE: OnceCell<Option<Regex>> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").ok()).as_ref()
}

/// Derived excerpt for a body with no stored one.
pub fn truncate_body(body: &str) -> String {
    if let Some(m) = more_marker().and_then(|re| re.find(body)) {
        return html_escape::encode_text(&plain_text(&body[..m.start()])).into_owned();
    }
    let text = plain_text(body);
    html_escape::encode_text(&clip(&text, EXCERPT_BUDGET)).into_owned()
}

/// Tags, comments and shortcodes removed, entities decoded, whitespace collapsed.
pub fn plain_text(raw: &str) -> String {
    let mut out = raw.to_string();
    // Block tags become a space; inline tags vanish so `wo<b>rd</b>` stays one word.
    for (re, with) in [(noise(), " "), (block_tag(), " "), (any_tag(), "")] {
        if let Some(re) = re {
            out = re.replace_all(&out, with).into_owned();
        }
    }
    out = strip_shortcodes(&out);
    out = html_escape::decode_html_entities(&out).into_owned();
    if let Some(re) = whitespace() {
        out = re.replace_all(&out, " ").into_owned();
    }
    out.trim().to_string()
}

/// Removes `[name ...]` tokens. When a matching `[/name]` follows, the
/// enclosed text goes too.
pub fn strip_shortcodes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(open) = rest.find('[') {
        let Some(close_rel) = rest[open + 1..].find(']') else {
            break;
        };
        let close = open + 1 + close_rel;
        let inner = &rest[open + 1..close];
        if inner.trim().is_empty() {
            out.push_str(&rest[..=close]);
            rest = &rest[close + 1..];
            continue;
        }
        out.push_str(&rest[..open]);
        let after = &rest[close + 1..];
        let name = inner.split_whitespace().next().unwrap_or_default();
        let closing = format!("[/{name}]");
        rest = if name.starts_with('/') {
            after
        } else {
            match after.find(&closing) {
                Some(end) => &after[end + closing.len()..],
                None => after,
            }
        };
    }
    out.push_str(rest);
    out
}

/// At most `budget` chars plus the ellipsis, never splitting a word unless
/// the text has no whitespace at all.
pub fn clip(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let cut_at = text
        .char_indices()
        .nth(budget)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let cut = &text[..cut_at];
    let next_is_break = text[cut_at..]
        .chars()
        .next()
        .is_some_and(char::is_whitespace);

    let kept = if next_is_break {
        cut.trim_end()
    } else {
        match cut.rfind(char::is_whitespace) {
            Some(ws) => cut[..ws].trim_end(),
            None => cut,
        }
    };
    format!("{kept}{ELLIPSIS}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n_chars: usize) -> String {
        let mut s = String::new();
        let mut i = 0;
        while s.len() < n_chars {
            s.push_str(&format!("word{i} "));
            i += 1;
        }
        s.truncate(n_chars);
        s
    }

    #[test]
    fn long_plain_body_is_clipped_at_word_boundary() {
        let body = words(250);
        assert_eq!(body.chars().count(), 250);
        let out = truncate_body(&body);
        assert!(out.ends_with(ELLIPSIS));
        let core = out.trim_end_matches(ELLIPSIS);
        assert!(core.chars().count() <= EXCERPT_BUDGET);
        assert!(body.starts_with(core));
        // the cut lands on a word end
        let next = body[core.len()..].chars().next().unwrap();
        assert!(next.is_whitespace());
    }

    #[test]
    fn markup_and_shortcodes_are_stripped_first() {
        let body = format!(
            "<p>Hello <b>there</b></p>[gallery ids=\"1,2\"] [caption]pic[/caption]{}",
            words(240)
        );
        let out = truncate_body(&body);
        assert!(out.starts_with("Hello there word0"));
        assert!(!out.contains('<'));
        assert!(!out.contains('['));
        assert!(!out.contains("pic"));
        assert!(out.ends_with(ELLIPSIS));
    }

    #[test]
    fn inline_tags_do_not_split_words() {
        assert_eq!(plain_text("<p>wo<b>rd</b> <em>x</em>y</p><p>next</p>"), "word xy next");
        assert_eq!(plain_text("one<br/>two<li>three</li>"), "one two three");
    }

    #[test]
    fn more_marker_keeps_only_the_lead() {
        let body = "<p>Intro text</p><!--more Read on--><p>Rest of the story</p>";
        assert_eq!(truncate_body(body), "Intro text");
    }

    #[test]
    fn short_body_is_untouched_except_escaping() {
        assert_eq!(truncate_body("Tom &amp; Jerry"), "Tom &amp; Jerry");
        assert_eq!(truncate_body("a < b"), "a &lt; b");
    }

    #[test]
    fn single_long_token_is_hard_cut() {
        let s = "x".repeat(260);
        let out = clip(&s, 200);
        assert_eq!(out.len(), 203);
    }
}
