// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Token-level helpers shared by the line-oriented text parsers.
//!
//! Number parsing goes through fast-float; substring counting uses memchr's
//! SIMD `memmem` finder.

use memchr::memmem;

/// Parse one float token
#[inline]
pub fn parse_f32(token: &str) -> Option<f32> {
    fast_float::parse::<f32, _>(token).ok()
}

/// Parse the next three tokens as a 3-vector
#[inline]
pub fn parse_vec3<'a, I>(tokens: &mut I) -> Option<[f32; 3]>
where
    I: Iterator<Item = &'a str>,
{
    let x = parse_f32(tokens.next()?)?;
    let y = parse_f32(tokens.next()?)?;
    let z = parse_f32(tokens.next()?)?;
    Some([x, y, z])
}

/// Parse up to `N` float tokens, filling missing trailing components with
/// `fill`. Fails if the first token is missing or any present token is not
/// a number.
#[inline]
pub fn parse_floats<'a, I, const N: usize>(tokens: &mut I, fill: f32) -> Option<[f32; N]>
where
    I: Iterator<Item = &'a str>,
{
    let mut out = [fill; N];
    let mut read = 0;
    for slot in out.iter_mut() {
        match tokens.next() {
            Some(t) => {
                *slot = parse_f32(t)?;
                read += 1;
            }
            None => break,
        }
    }
    if read == 0 {
        None
    } else {
        Some(out)
    }
}

/// Count non-overlapping occurrences of `needle`, ignoring ASCII case
#[inline]
pub fn count_occurrences_ignore_ascii_case(haystack: &[u8], needle: &[u8]) -> usize {
    let lowered = haystack.to_ascii_lowercase();
    memmem::find_iter(&lowered, &needle.to_ascii_lowercase()).count()
}

/// Case-insensitive substring search over ASCII data
#[inline]
pub fn contains_ignore_ascii_case(haystack: &[u8], needle: &[u8]) -> bool {
    let lowered = haystack.to_ascii_lowercase();
    memmem::find(&lowered, &needle.to_ascii_lowercase()).is_some()
}

/// Split a line into its keyword and the remaining tokens
#[inline]
pub fn split_keyword(line: &str) -> Option<(&str, std::str::SplitWhitespace<'_>)> {
    let mut tokens = line.split_whitespace();
    let keyword = tokens.next()?;
    Some((keyword, tokens))
}

/// Text remaining after the first token, trimmed
#[inline]
pub fn rest_after_keyword(line: &str) -> &str {
    let line = line.trim_start();
    match line.find(char::is_whitespace) {
        Some(pos) => line[pos..].trim(),
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vec3() {
        let mut tokens = "1.5 -2 3e2 extra".split_whitespace();
        assert_eq!(parse_vec3(&mut tokens), Some([1.5, -2.0, 300.0]));
        assert_eq!(tokens.next(), Some("extra"));

        let mut short = "1 2".split_whitespace();
        assert_eq!(parse_vec3(&mut short), None);

        let mut bad = "1 x 2".split_whitespace();
        assert_eq!(parse_vec3(&mut bad), None);
    }

    #[test]
    fn test_parse_floats_fill() {
        let mut tokens = "0.5".split_whitespace();
        let out: Option<[f32; 3]> = parse_floats(&mut tokens, 0.0);
        assert_eq!(out, Some([0.5, 0.0, 0.0]));

        let mut empty = "".split_whitespace();
        let out: Option<[f32; 2]> = parse_floats(&mut empty, 0.0);
        assert_eq!(out, None);
    }

    #[test]
    fn test_count_and_search() {
        let text = b"facet normal 0 0 1\nfacet normal 0 1 0\n";
        assert_eq!(count_occurrences_ignore_ascii_case(text, b"facet normal"), 2);
        let mixed = b"FACET NORMAL 0 0 1\nFacet Normal 0 1 0\nfacet normal 1 0 0\n";
        assert_eq!(count_occurrences_ignore_ascii_case(mixed, b"facet normal"), 3);
        assert!(contains_ignore_ascii_case(b"ISO-10303-21;", b"iso-10303-21"));
        assert!(!contains_ignore_ascii_case(b"solid x", b"header;"));
    }

    #[test]
    fn test_keyword_helpers() {
        let (kw, mut rest) = split_keyword("  usemtl Red Paint").unwrap();
        assert_eq!(kw, "usemtl");
        assert_eq!(rest.next(), Some("Red"));
        assert_eq!(rest_after_keyword("  g  left wheel  "), "left wheel");
        assert_eq!(rest_after_keyword("g"), "");
        assert!(split_keyword("   ").is_none());
    }
}
