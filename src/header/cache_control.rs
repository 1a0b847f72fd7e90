//! Parser for `cache-control` directive lists.
//!
//! Handles the list grammar of RFC 9111 section 5.2: comma separated
//! directives, each a token optionally followed by `=` and a token or quoted
//! string. Empty list elements are skipped. Directive names are compared
//! case-insensitively and stored lowercased.

use std::{
    fmt,
    iter::Peekable,
    str::{Chars, FromStr},
};

use super::HeaderError;

/// A single `cache-control` directive such as `no-cache` or `max-age=30`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directive {
    name: String,
    value: Option<String>,
}

impl Directive {
    /// Lowercased directive name.
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    /// Argument of the directive with any quoting removed.
    #[must_use]
    pub fn value(&self) -> Option<&str> { self.value.as_deref() }
}

/// Structured view of a `cache-control` header value.
///
/// # Examples
///
/// ```
/// use http_push::header::cache_control::CacheControl;
///
/// let mut directives = CacheControl::parse("max-age=30, No-Cache").expect("valid directives");
/// assert!(directives.remove("no-cache"));
/// assert_eq!(directives.to_string(), "max-age=30");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheControl {
    directives: Vec<Directive>,
}

impl CacheControl {
    /// Parse a header value into its directives.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::MalformedCacheControl`] for an empty directive
    /// name or value, an unterminated quoted string, or stray characters
    /// between a directive and the next comma.
    pub fn parse(value: &str) -> Result<Self, HeaderError> {
        let malformed = |reason| HeaderError::MalformedCacheControl {
            value: value.to_owned(),
            reason,
        };
        let mut chars = value.chars().peekable();
        let mut directives = Vec::new();
        loop {
            skip_whitespace(&mut chars);
            match chars.peek() {
                None => break,
                Some(',') => {
                    chars.next();
                    continue;
                }
                Some(_) => {}
            }

            let name = take_token(&mut chars);
            if name.is_empty() {
                return Err(malformed("expected directive name"));
            }
            skip_whitespace(&mut chars);

            let argument = if chars.next_if_eq(&'=').is_some() {
                skip_whitespace(&mut chars);
                if chars.next_if_eq(&'"').is_some() {
                    Some(take_quoted(&mut chars).ok_or_else(|| malformed("unterminated quoted string"))?)
                } else {
                    let token = take_token(&mut chars);
                    if token.is_empty() {
                        return Err(malformed("expected directive value"));
                    }
                    Some(token)
                }
            } else {
                None
            };

            skip_whitespace(&mut chars);
            match chars.next() {
                None | Some(',') => {}
                Some(_) => return Err(malformed("unexpected character after directive")),
            }
            directives.push(Directive {
                name: name.to_ascii_lowercase(),
                value: argument,
            });
        }
        Ok(Self { directives })
    }

    /// Returns `true` if a directive named `name` is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.directives
            .iter()
            .any(|directive| directive.name.eq_ignore_ascii_case(name))
    }

    /// Remove every directive named `name`, returning whether any was present.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.directives.len();
        self.directives
            .retain(|directive| !directive.name.eq_ignore_ascii_case(name));
        self.directives.len() != before
    }

    /// Directives in header order.
    #[must_use]
    pub fn directives(&self) -> &[Directive] { &self.directives }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.directives.is_empty() }
}

impl FromStr for CacheControl {
    type Err = HeaderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> { Self::parse(value) }
}

impl fmt::Display for CacheControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, directive) in self.directives.iter().enumerate() {
            if position > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&directive.name)?;
            match directive.value.as_deref() {
                None => {}
                Some(value) if !value.is_empty() && value.chars().all(is_token_char) => {
                    write!(f, "={value}")?;
                }
                Some(value) => {
                    f.write_str("=\"")?;
                    for c in value.chars() {
                        if matches!(c, '"' | '\\') {
                            f.write_str("\\")?;
                        }
                        write!(f, "{c}")?;
                    }
                    f.write_str("\"")?;
                }
            }
        }
        Ok(())
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.next_if(|c| matches!(c, ' ' | '\t')).is_some() {}
}

fn take_token(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut token = String::new();
    while let Some(c) = chars.next_if(|c| is_token_char(*c)) {
        token.push(c);
    }
    token
}

/// Consume a quoted string whose opening quote was already read.
fn take_quoted(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    let mut text = String::new();
    loop {
        match chars.next()? {
            '"' => return Some(text),
            '\\' => text.push(chars.next()?),
            c => text.push(c),
        }
    }
}
