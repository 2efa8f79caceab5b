//! Plain-text cleanup for model output.
//!
//! Some models wrap a reply in a code fence, in quotes, in `**bold**`, or lead
//! with "Here's a reply:". [`normalize`] strips all of that. It runs to a fixed
//! point, so `normalize(normalize(x)) == normalize(x)`.

use std::sync::OnceLock;

use regex::Regex;

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)\A```[A-Za-z0-9_+-]*[ \t]*\n?(.*?)\n?[ \t]*```\z").unwrap()
    })
}

fn preamble_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\A(?:sure[,!.]?\s*)?(?:here(?:'s| is| are)|below is)\s+(?:a|an|my|the|your|some)\s+(?:[\w-]+\s+){0,3}(?:repl(?:y|ies)|responses?|comments?|answers?|messages?)\s*:[ \t]*\n*",
        )
        .unwrap()
    })
}

fn emphasis_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\*\*|__)(.+?)(\*\*|__)").unwrap())
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^#{1,6}[ \t]+").unwrap())
}

const QUOTE_PAIRS: &[(char, char)] = &[('"', '"'), ('\'', '\''), ('\u{201c}', '\u{201d}'), ('`', '`')];

/// Strip markdown and commentary wrappers from a model reply.
pub fn normalize(text: &str) -> String {
    let mut current = text.trim().to_string();
    loop {
        let next = normalize_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn normalize_once(text: &str) -> String {
    let mut s = text.trim();

    let unfenced;
    if let Some(caps) = fence_re().captures(s) {
        unfenced = caps.get(1).map_or("", |m| m.as_str()).to_string();
        s = unfenced.trim();
    }

    let without_preamble = preamble_re().replace(s, "");
    let s = without_preamble.trim();

    let s = unquote(s);

    let s = emphasis_re().replace_all(s, |caps: &regex::Captures<'_>| {
        if caps[1] == caps[3] {
            caps[2].to_string()
        } else {
            caps[0].to_string()
        }
    });
    let s = heading_re().replace_all(&s, "");
    s.trim().to_string()
}

fn unquote(s: &str) -> &str {
    for &(open, close) in QUOTE_PAIRS {
        if let Some(inner) = s.strip_prefix(open).and_then(|rest| rest.strip_suffix(close)) {
            // Only a single wrapping pair, not `"a" and "b"`
            if !inner.contains(close) || open != close {
                return inner.trim();
            }
        }
    }
    s
}
