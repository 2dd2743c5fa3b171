//! Identity field extraction from recognized document text
//!
//! Recognized text is noisy: digits come back as look-alike letters (`O` for `0`,
//! `B` for `8`, ...). The extractors here never fail; a field that cannot be
//! recovered is simply absent.
//!
//! 1. ID number: spaced 4-4-4 group or bare 12-digit run
//! 2. Tax ID: 5 letters + 4 digits + 1 letter
//! 3. Date of birth: labeled lines first (with fuzzy digit substitution), then
//!    an unlabeled scan that skips issue/expiry dates
//! 4. Gender: literal "Male" / "Female"

use crate::models::{ExtractedIdentity, Gender};
use chrono::{Local, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;

/// Upper bound on substituted candidates generated per labeled line.
pub const MAX_FUZZY_CANDIDATES: usize = 64;

/// Characters inspected on each side of an unlabeled date.
const CONTEXT_WINDOW_CHARS: usize = 20;

pub(crate) static ID_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[0-9]{4}\s[0-9]{4}\s[0-9]{4}\b|\b[0-9]{12}\b").unwrap()
});

pub(crate) static TAX_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z]{5}[0-9]{4}[A-Z]").unwrap());

/// DOB labels; the `o` may itself come back as a zero.
static DOB_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(d[o0]b|date\s*of\s*birth|d\.[o0]\.b)\b").unwrap()
});

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{1,2}[/-][0-9]{1,2}[/-]?[0-9]{4}").unwrap());

static LOOSE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{1,2})[/-]?([0-9]{1,2})[/-]?([0-9]{4})").unwrap()
});

static NON_BIRTH_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)issue|issued|printed|valid from|expiry|exp").unwrap());

/// Runs every extractor over one recognized text.
pub fn extract_identity(text: &str) -> ExtractedIdentity {
    ExtractedIdentity {
        id_number: extract_id_number(text),
        date_of_birth: extract_date_of_birth(text),
        tax_id: extract_tax_id(text),
        gender: extract_gender(text),
    }
}

/// First spaced 4-4-4 digit group or bare 12-digit run, separators stripped.
///
/// No checksum validation is performed.
pub fn extract_id_number(text: &str) -> Option<String> {
    ID_NUMBER_RE.find(text).map(|m| {
        m.as_str()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect()
    })
}

/// First `AAAAA9999A` substring. Case-sensitive: lowercase text yields nothing.
pub fn extract_tax_id(text: &str) -> Option<String> {
    TAX_ID_RE.find(text).map(|m| m.as_str().to_string())
}

/// Literal, case-sensitive gender match. "Male" is checked before "Female".
pub fn extract_gender(text: &str) -> Option<Gender> {
    if text.contains("Male") {
        Some(Gender::Male)
    } else if text.contains("Female") {
        Some(Gender::Female)
    } else {
        None
    }
}

/// Date of birth in `DD/MM/YYYY` form.
///
/// Labeled lines are tried first; each yields fuzzy candidates in generation
/// order and the first candidate whose day and month are in range wins. When no
/// labeled line validates, the whole text is scanned for a date-shaped substring
/// that is not near an issue/print/expiry word. That fallback does not range-check.
pub fn extract_date_of_birth(text: &str) -> Option<String> {
    for line in text.lines().filter(|l| DOB_LABEL_RE.is_match(l)) {
        for (idx, candidate) in date_candidates(line).enumerate() {
            let Some(m) = DATE_RE.find(&candidate) else {
                continue;
            };
            let normalized = normalize_date(m.as_str());
            if has_valid_day_month(&normalized) {
                tracing::debug!("DOB resolved from labeled line (candidate #{})", idx);
                return Some(normalized);
            }
        }
    }

    for m in DATE_RE.find_iter(text) {
        let window = context_window(text, m.start(), m.end(), CONTEXT_WINDOW_CHARS);
        if NON_BIRTH_DATE_RE.is_match(window) {
            tracing::debug!("Skipping non-birth date near issue/expiry wording");
            continue;
        }
        return Some(normalize_date(m.as_str()));
    }

    None
}

/// Approximate adulthood check against the current local time.
///
/// Age is whole days since birth divided by 365; parse failures return false.
pub fn age_is_at_least_18(date_of_birth: &str) -> bool {
    age_is_at_least_18_on(date_of_birth, Local::now().naive_local())
}

/// Same as [`age_is_at_least_18`] evaluated at `now`.
pub fn age_is_at_least_18_on(date_of_birth: &str, now: NaiveDateTime) -> bool {
    let cleaned = date_of_birth.replace('-', "/");
    let Ok(date) = NaiveDate::parse_from_str(&cleaned, "%d/%m/%Y") else {
        return false;
    };
    let Some(born) = date.and_hms_opt(0, 0, 0) else {
        return false;
    };
    let days = (now - born).num_days();
    days.div_euclid(365) >= 18
}

/// Digits a character may have been misread from, in substitution order.
fn confusable_digits(c: char) -> Option<&'static [char]> {
    const ZERO: &[char] = &['0'];
    const ONE: &[char] = &['1'];
    const TWO: &[char] = &['2'];
    const EIGHT: &[char] = &['8'];
    const FIVE_OR_EIGHT: &[char] = &['5', '8'];
    const EIGHT_OR_SIX: &[char] = &['8', '6'];

    match c {
        'o' | 'O' => Some(ZERO),
        'b' | 'B' => Some(EIGHT),
        's' | 'S' => Some(FIVE_OR_EIGHT),
        'e' | 'E' => Some(EIGHT_OR_SIX),
        'l' | 'L' | 'i' | 'I' => Some(ONE),
        'z' | 'Z' => Some(TWO),
        _ => None,
    }
}

/// Single best-guess substitution, then everything but digits, `/`, `-` and spaces is dropped.
pub fn clean_possible_dob(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'o' | 'O' => '0',
            'b' | 'B' => '8',
            's' | 'S' => '5',
            'e' | 'E' => '6',
            'l' | 'L' | 'i' | 'I' => '1',
            'z' | 'Z' => '2',
            other => other,
        })
        .filter(|c| c.is_ascii_digit() || matches!(c, '/' | '-' | ' '))
        .collect()
}

/// Lazily generated fuzzy candidates for one line.
///
/// Walks the cartesian product of digit substitutions over every confusable
/// position (rightmost position varies fastest), stops after
/// [`MAX_FUZZY_CANDIDATES`], and always finishes with the cleaned original line.
pub struct DateCandidates<'a> {
    line: &'a str,
    chars: Vec<char>,
    positions: Vec<(usize, &'static [char])>,
    odometer: Vec<usize>,
    emitted: usize,
    product_done: bool,
    fallback_done: bool,
}

pub fn date_candidates(line: &str) -> DateCandidates<'_> {
    let chars: Vec<char> = line.chars().collect();
    let positions: Vec<(usize, &'static [char])> = chars
        .iter()
        .enumerate()
        .filter_map(|(i, c)| confusable_digits(*c).map(|digits| (i, digits)))
        .collect();
    let odometer = vec![0; positions.len()];
    let product_done = positions.is_empty();

    DateCandidates {
        line,
        chars,
        positions,
        odometer,
        emitted: 0,
        product_done,
        fallback_done: false,
    }
}

impl DateCandidates<'_> {
    fn current(&self) -> String {
        let mut chars = self.chars.clone();
        for ((pos, digits), choice) in self.positions.iter().zip(&self.odometer) {
            chars[*pos] = digits[*choice];
        }
        chars.into_iter().collect()
    }

    fn advance(&mut self) {
        let mut i = self.odometer.len();
        loop {
            if i == 0 {
                self.product_done = true;
                return;
            }
            i -= 1;
            self.odometer[i] += 1;
            if self.odometer[i] < self.positions[i].1.len() {
                return;
            }
            self.odometer[i] = 0;
        }
    }
}

impl Iterator for DateCandidates<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if !self.product_done && self.emitted < MAX_FUZZY_CANDIDATES {
            let candidate = self.current();
            self.emitted += 1;
            self.advance();
            return Some(clean_possible_dob(&candidate));
        }
        self.product_done = true;

        if !self.fallback_done {
            self.fallback_done = true;
            return Some(clean_possible_dob(self.line));
        }

        None
    }
}

/// Normalizes `D/M/YYYY`, `D-M-YYYY` or `D/MMYYYY` to `DD/MM/YYYY`.
///
/// Input that does not look like a date is returned with separators unified.
pub fn normalize_date(raw: &str) -> String {
    let unified = raw.replace('-', "/");
    let unified = unified.trim();
    let parts: Vec<&str> = unified.split('/').collect();

    let (day, month, year) = match parts.as_slice() {
        [d, m, y] => (*d, *m, *y),
        [d, rest] if rest.len() == 6 && rest.is_char_boundary(2) => (*d, &rest[..2], &rest[2..]),
        _ => match LOOSE_DATE_RE.captures(unified) {
            Some(caps) => match (caps.get(1), caps.get(2), caps.get(3)) {
                (Some(d), Some(m), Some(y)) => (d.as_str(), m.as_str(), y.as_str()),
                _ => return unified.to_string(),
            },
            None => return unified.to_string(),
        },
    };

    format!("{:0>2}/{:0>2}/{}", day, month, year)
}

fn has_valid_day_month(normalized: &str) -> bool {
    let parts: Vec<&str> = normalized.split('/').collect();
    let [day, month, _] = parts.as_slice() else {
        return false;
    };
    match (day.parse::<u32>(), month.parse::<u32>()) {
        (Ok(d), Ok(m)) => (1..=31).contains(&d) && (1..=12).contains(&m),
        _ => false,
    }
}

/// Slice of `text` spanning `radius` characters either side of `start..end`.
fn context_window(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let from = if radius == 0 {
        start
    } else {
        text[..start]
            .char_indices()
            .rev()
            .nth(radius - 1)
            .map_or(0, |(i, _)| i)
    };
    let to = text[end..]
        .char_indices()
        .nth(radius)
        .map_or(text.len(), |(i, _)| end + i);
    &text[from..to]
}
