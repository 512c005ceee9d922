//! Path templates with `{var}` and `{var:regex}` segments.
//!
//! A template such as `/users/{id:\d+}/posts/{slug}` compiles to one anchored
//! regex with a named group per variable. `{var}` matches a run of characters
//! other than `{`, `}` and `/`; `{var:regex}` embeds the given regex verbatim.
//! Everything outside the braces is matched literally.

use crate::PathParams;
use crate::router::RouterError;
use once_cell::sync::Lazy;
use regex::Regex;

/// A `{...}` fragment, allowing one level of nested braces for regex quantifiers.
static ROUTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[_a-zA-Z][^{}]*(?:\{[^{}]*\}[^{}]*)*\}").expect("route regex is valid"));
static DYN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\{(?P<var>[a-zA-Z][_a-zA-Z0-9]*)\}$").expect("dyn regex is valid"));
static DYN_WITH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{(?P<var>[a-zA-Z][_a-zA-Z0-9]*):(?P<re>.+)\}$").expect("dyn regex is valid"));
static NAME_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.:-]").expect("name split regex is valid"));
static NAME_PART: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("name regex is valid"));

/// Pattern of a `{var}` segment without a custom regex.
const GOOD: &str = r"[^{}/]+";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A compiled dynamic path.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    template: String,
    pattern: Regex,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Compiles `template`.
    ///
    /// # Errors
    ///
    /// - [`RouterError::InvalidPath`] for brace fragments that are not a valid variable
    /// - [`RouterError::InvalidPattern`] when the resulting regex does not compile,
    ///   e.g. a broken user regex or a variable used twice
    pub fn compile(template: &str) -> Result<Self, RouterError> {
        let mut pattern = String::from("^");
        let mut segments = Vec::new();
        let mut last = 0;

        for fragment in ROUTE_RE.find_iter(template) {
            push_literal(template, &template[last..fragment.start()], &mut pattern, &mut segments)?;
            push_variable(template, fragment.as_str(), &mut pattern, &mut segments)?;
            last = fragment.end();
        }
        push_literal(template, &template[last..], &mut pattern, &mut segments)?;
        pattern.push('$');

        let compiled = match Regex::new(&pattern) {
            Ok(compiled) => compiled,
            Err(source) => return Err(RouterError::InvalidPattern { pattern, source }),
        };
        Ok(Self { template: template.to_owned(), pattern: compiled, segments })
    }

    /// The template this was compiled from.
    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Variable(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Matches a whole path, returning every named group percent-decoded.
    pub fn captures(&self, path: &str) -> Option<PathParams> {
        let captures = self.pattern.captures(path)?;
        let mut params = PathParams::empty();
        for name in self.pattern.capture_names().flatten() {
            if let Some(value) = captures.name(name) {
                params.push(name, percent_decode(value.as_str()));
            }
        }
        Some(params)
    }

    /// Substitutes `vars` into the template.
    pub fn format(&self, vars: &[(&str, &str)]) -> Result<String, RouterError> {
        let mut url = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => url.push_str(literal),
                Segment::Variable(name) => {
                    let value = vars
                        .iter()
                        .find(|(var, _)| var == name)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| RouterError::missing_variable(name))?;
                    url.push_str(value);
                }
            }
        }
        Ok(url)
    }
}

fn push_literal(template: &str, part: &str, pattern: &mut String, segments: &mut Vec<Segment>) -> Result<(), RouterError> {
    if part.is_empty() {
        return Ok(());
    }
    if part.contains(['{', '}']) {
        return Err(RouterError::invalid_path(template, format!("unexpected brace in {part:?}")));
    }
    pattern.push_str(&regex::escape(part));
    segments.push(Segment::Literal(part.to_owned()));
    Ok(())
}

fn push_variable(template: &str, part: &str, pattern: &mut String, segments: &mut Vec<Segment>) -> Result<(), RouterError> {
    if let Some(captures) = DYN.captures(part) {
        let var = &captures["var"];
        pattern.push_str(&format!("(?P<{var}>{GOOD})"));
        segments.push(Segment::Variable(var.to_owned()));
        return Ok(());
    }

    if let Some(captures) = DYN_WITH_RE.captures(part) {
        let var = &captures["var"];
        pattern.push_str(&format!("(?P<{var}>{})", &captures["re"]));
        segments.push(Segment::Variable(var.to_owned()));
        return Ok(());
    }

    Err(RouterError::invalid_path(template, format!("invalid variable {part:?}")))
}

pub(crate) fn percent_decode(value: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(value.as_bytes())).into_owned()
}

/// Checks a resource name: every part between `.`, `:` and `-` must be an identifier.
pub(crate) fn validate_name(name: &str) -> Result<(), RouterError> {
    if NAME_SPLIT.split(name).all(|part| NAME_PART.is_match(part)) {
        Ok(())
    } else {
        Err(RouterError::InvalidName { name: name.to_owned() })
    }
}
