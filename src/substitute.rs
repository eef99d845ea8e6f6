//! `$N` / `${N}` placeholder expansion from regex capture groups.
//!
//! A `$` preceded by an odd number of backslashes is literal and the last
//! backslash is dropped; an even run keeps every backslash and leaves the
//! `$` active. A `$` that is not followed by digits or `{digits}` is copied
//! as is. Referencing a group that does not exist, or that did not take
//! part in the match, is an error rather than an empty string.

use crate::error::{Error, Result};

/// Capture groups of one successful match. Group 0 is the whole match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Groups(Vec<Option<String>>);

impl Groups {
    /// Groups in order, starting with group 0; `None` for a group that did
    /// not participate.
    pub fn new<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self(groups.into_iter().map(|g| g.map(Into::into)).collect())
    }

    /// Owned copy of a regex match's groups.
    pub fn from_captures(caps: &regex::Captures<'_>) -> Self {
        Self(caps.iter().map(|m| m.map(|m| m.as_str().to_owned())).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `None` when the group does not exist, `Some(None)` when it exists but
    /// did not participate.
    pub fn get(&self, index: usize) -> Option<Option<&str>> {
        self.0.get(index).map(Option::as_deref)
    }
}

/// Expand every placeholder of `template` with the values in `groups`.
pub fn substitute(template: &str, groups: &Groups) -> Result<String> {
    let bytes = template.as_bytes();
    let mut out = String::with_capacity(template.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                let start = i;
                while i < bytes.len() && bytes[i] == b'\\' {
                    i += 1;
                }
                let escapes_dollar = (i - start) % 2 == 1 && bytes.get(i) == Some(&b'$');
                if escapes_dollar {
                    out.push_str(&template[start..i - 1]);
                    out.push('$');
                    i += 1;
                } else {
                    out.push_str(&template[start..i]);
                }
            }
            b'$' => match parse_reference(&template[i + 1..]) {
                Some((digits, consumed)) => {
                    let token = &template[i..i + 1 + consumed];
                    out.push_str(lookup(template, token, digits, groups)?);
                    i += 1 + consumed;
                }
                None => {
                    out.push('$');
                    i += 1;
                }
            },
            _ => {
                let next = template[i..]
                    .find(['\\', '$'])
                    .map_or(bytes.len(), |n| i + n);
                out.push_str(&template[i..next]);
                i = next;
            }
        }
    }

    Ok(out)
}

/// Returns the group digits and how many bytes after the `$` they span.
fn parse_reference(s: &str) -> Option<(&str, usize)> {
    let digits_len = |s: &str| s.bytes().take_while(u8::is_ascii_digit).count();

    if let Some(braced) = s.strip_prefix('{') {
        let n = digits_len(braced);
        if n > 0 && braced[n..].starts_with('}') {
            return Some((&braced[..n], n + 2));
        }
        return None;
    }

    let n = digits_len(s);
    (n > 0).then(|| (&s[..n], n))
}

fn lookup<'g>(template: &str, token: &str, digits: &str, groups: &'g Groups) -> Result<&'g str> {
    digits
        .parse::<usize>()
        .ok()
        .and_then(|index| groups.get(index))
        .flatten()
        .ok_or_else(|| Error::InvalidGroupReference {
            template: template.to_owned(),
            reference: token.to_owned(),
            available: groups.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(values: &[&str]) -> Groups {
        Groups::new(values.iter().map(|v| Some(*v)))
    }

    #[test]
    fn replaces_plain_and_braced_references() {
        let g = groups(&["full", "a", "b"]);
        assert_eq!(substitute("$1-$2", &g).unwrap(), "a-b");
        assert_eq!(substitute("${1}0-${2}", &g).unwrap(), "a0-b");
        assert_eq!(substitute("all: $0", &g).unwrap(), "all: full");
    }

    #[test]
    fn template_without_dollars_is_unchanged() {
        let g = groups(&["x"]);
        assert_eq!(substitute("run/server.jar", &g).unwrap(), "run/server.jar");
        assert_eq!(substitute(r"C:\tools\bin", &g).unwrap(), r"C:\tools\bin");
    }

    #[test]
    fn odd_backslash_run_escapes_the_dollar() {
        let g = groups(&["full", "a"]);
        assert_eq!(substitute(r"\$1", &g).unwrap(), "$1");
        assert_eq!(substitute(r"\\\$1", &g).unwrap(), r"\\$1");
        assert_eq!(substitute(r"cost \${1}", &g).unwrap(), "cost ${1}");
    }

    #[test]
    fn even_backslash_run_keeps_the_dollar_active() {
        let g = groups(&["full", "a"]);
        assert_eq!(substitute(r"\\$1", &g).unwrap(), r"\\a");
        assert_eq!(substitute(r"\\\\$1", &g).unwrap(), r"\\\\a");
    }

    #[test]
    fn only_escaped_dollars_lose_one_backslash_each() {
        let g = Groups::default();
        assert_eq!(substitute(r"\$1 and \$2", &g).unwrap(), "$1 and $2");
    }

    #[test]
    fn lone_dollar_is_literal() {
        let g = groups(&["full"]);
        assert_eq!(substitute("price $ and ${x} and $", &g).unwrap(), "price $ and ${x} and $");
        assert_eq!(substitute("${12", &g).unwrap(), "${12");
    }

    #[test]
    fn multi_digit_reference_is_greedy() {
        let values: Vec<String> = (0..12).map(|i| format!("g{i}")).collect();
        let g = Groups::new(values.iter().map(|v| Some(v.as_str())));
        assert_eq!(substitute("$11", &g).unwrap(), "g11");
        assert_eq!(substitute("${1}1", &g).unwrap(), "g11");
    }

    #[test]
    fn out_of_range_group_fails() {
        let g = groups(&["full", "a"]);
        match substitute("x-$2", &g) {
            Err(Error::InvalidGroupReference {
                reference,
                available,
                ..
            }) => {
                assert_eq!(reference, "$2");
                assert_eq!(available, 2);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(substitute("$99999999999999999999999", &g).is_err());
    }

    #[test]
    fn non_participating_group_fails() {
        let re = regex::Regex::new(r"^(a)?(b)$").unwrap();
        let caps = re.captures("b").unwrap();
        let g = Groups::from_captures(&caps);
        assert_eq!(substitute("$2", &g).unwrap(), "b");
        assert!(matches!(
            substitute("$1", &g),
            Err(Error::InvalidGroupReference { .. })
        ));
    }

    #[test]
    fn non_ascii_text_survives() {
        let g = groups(&["full", "é"]);
        assert_eq!(substitute("ünïcode-$1-€", &g).unwrap(), "ünïcode-é-€");
    }
}
