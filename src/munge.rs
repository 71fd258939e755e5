//! Bijective mapping between Lissp symbol characters and legal host identifiers.
//!
//! `munge` escapes every character a host identifier cannot contain as an
//! `x<NAME>_` word; `demunge` is its exact inverse. The table is fixed so
//! that round-tripping is total: `demunge(munge(s)) == s` for every `&str`.

const TABLE: &[(char, &str)] = &[
    ('+', "PLUS"),
    ('-', "H"),
    ('*', "STAR"),
    ('/', "SLASH"),
    ('\\', "BSLASH"),
    ('=', "EQ"),
    ('<', "LT"),
    ('>', "GT"),
    ('!', "BANG"),
    ('?', "QUERY"),
    ('&', "ET"),
    ('\'', "APOS"),
    ('"', "QUOTE"),
    (',', "COMMA"),
    (';', "SEMI"),
    ('@', "AT"),
    ('#', "HASH"),
    ('$', "DOLR"),
    ('%', "PCENT"),
    ('^', "HAT"),
    ('~', "TILDE"),
    ('|', "BAR"),
    ('`', "GRAVE"),
    ('.', "DOT"),
    (':', "COLON"),
    (' ', "SPACE"),
];

fn escape_word_for(ch: char) -> Option<&'static str> {
    TABLE.iter().find(|(c, _)| *c == ch).map(|(_, w)| *w)
}

fn char_for_word(word: &str) -> Option<char> {
    TABLE.iter().find(|(_, w)| *w == word).map(|(c, _)| *c)
}

/// True if `ch` may appear unescaped in a munged identifier.
fn is_plain(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Munge a single symbol segment (no `.` or `..` qualification handling).
pub fn munge(s: &str) -> String {
    if !s.is_empty() && s.chars().all(is_plain) && !looks_pre_escaped(s) {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if ch == 'x' && try_decode_escape(&chars[i..]).is_some() {
            // This 'x' starts a run demunge would decode as an escape even
            // though it's plain source text; escape the 'x' itself so the
            // decoder can never resync onto it, leaving the rest of the run
            // (already legal characters) to pass through untouched.
            push_hex_escape(&mut out, 'x');
            i += 1;
            continue;
        }
        if is_plain(ch) {
            out.push(ch);
        } else if let Some(word) = escape_word_for(ch) {
            out.push('x');
            out.push_str(word);
            out.push('_');
        } else {
            push_hex_escape(&mut out, ch);
        }
        i += 1;
    }
    out
}

fn push_hex_escape(out: &mut String, ch: char) {
    out.push('x');
    for unit in ch.to_string().encode_utf16() {
        out.push_str(&format!("{unit:04X}"));
    }
    out.push('_');
}

/// A plain (already-legal) identifier is still ambiguous if some `x` inside
/// it begins a run `demunge` would decode as an escape word or hex payload
/// (e.g. `"xPLUS_"`, `"x0041_"`). Those must be routed through [`munge`]'s
/// escaping loop, which escapes just the offending `x`, rather than returned
/// verbatim, or `demunge(munge(s)) == s` would fail for them.
fn looks_pre_escaped(s: &str) -> bool {
    let chars: Vec<char> = s.chars().collect();
    (0..chars.len()).any(|i| chars[i] == 'x' && try_decode_escape(&chars[i..]).is_some())
}

/// Undo [`munge`]. Any `x<WORD>_` run whose `<WORD>` matches a known escape
/// word or a run of uppercase hex digits is replaced with the original
/// character(s); everything else passes through unchanged.
pub fn demunge(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == 'x' {
            if let Some((decoded, consumed)) = try_decode_escape(&chars[i..]) {
                out.push_str(&decoded);
                i += consumed;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn try_decode_escape(rest: &[char]) -> Option<(String, usize)> {
    // rest[0] == 'x'
    let close = rest.iter().position(|&c| c == '_')?;
    if close == 0 {
        return None;
    }
    let word: String = rest[1..close].iter().collect();
    if let Some(ch) = char_for_word(&word) {
        return Some((ch.to_string(), close + 1));
    }
    if !word.is_empty() && word.len() % 4 == 0 && word.chars().all(|c| c.is_ascii_hexdigit()) {
        let mut units = Vec::with_capacity(word.len() / 4);
        for chunk in word.as_bytes().chunks(4) {
            let hex: String = chunk.iter().map(|&b| b as char).collect();
            units.push(u16::from_str_radix(&hex, 16).ok()?);
        }
        if let Ok(decoded) = String::from_utf16(&units) {
            return Some((decoded, close + 1));
        }
    }
    None
}

/// Munge a full symbol token, preserving `..` qualification and the leading
/// `.` of a method symbol without munging those structural dots.
pub fn munge_symbol(s: &str) -> String {
    if let Some(method) = s.strip_prefix('.') {
        if !method.is_empty() && !method.contains('.') {
            return format!(".{}", munge(method));
        }
    }
    if let Some(idx) = s.find("..") {
        let (package, rest) = (&s[..idx], &s[idx + 2..]);
        let package_munged = package.split('.').map(munge).collect::<Vec<_>>().join(".");
        return format!("{package_munged}..{}", munge(rest));
    }
    munge(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_identifiers_pass_through() {
        assert_eq!(munge("foo"), "foo");
        assert_eq!(munge("foo_bar2"), "foo_bar2");
    }

    #[test]
    fn operators_munge_to_legal_identifiers() {
        assert_eq!(munge("+"), "xPLUS_");
        assert_eq!(munge("-"), "xH_");
        assert_eq!(munge("->"), "xH_xGT_");
    }

    #[test]
    fn round_trip_is_total() {
        for s in ["+", "-", "->>", "foo!", "a?b", "set!", "x y", "snake_case", "kebab-case"] {
            assert_eq!(demunge(&munge(s)), s, "round trip failed for {s:?}");
        }
    }

    #[test]
    fn demunge_is_identity_on_ordinary_identifiers() {
        assert_eq!(demunge("plain_name"), "plain_name");
    }

    #[test]
    fn munged_identifier_is_legal() {
        for s in ["+", "->>", "!?", "100%"] {
            let m = munge(s);
            assert!(
                m.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
                "munge({s:?}) = {m:?} is not a legal identifier"
            );
        }
    }

    #[test]
    fn qualified_symbol_keeps_double_dot() {
        assert_eq!(munge_symbol("pkg..name"), "pkg..name");
        assert_eq!(munge_symbol("pkg.sub..name?"), "pkg.sub..namexQUERY_");
    }

    #[test]
    fn method_symbol_keeps_leading_dot() {
        assert_eq!(munge_symbol(".upper"), ".upper");
    }

    #[test]
    fn plain_identifier_colliding_with_an_escape_word_round_trips() {
        for s in ["xPLUS_", "xH_", "x0041_", "xPLUSxH_", "axPLUS_b"] {
            assert_eq!(demunge(&munge(s)), s, "round trip failed for {s:?}");
        }
    }

    #[test]
    fn colliding_identifier_is_not_returned_verbatim() {
        assert_ne!(munge("xPLUS_"), "xPLUS_");
    }
}
