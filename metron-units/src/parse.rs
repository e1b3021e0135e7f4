//! Unit expression grammar
//!
//! A unit expression is a space separated list of terms. Each term is a
//! unit symbol, optionally preceded by a multiplier prefix and followed by
//! `^exponent`:
//! - `m`, `kg`, `delta_K`
//! - `m^2`, `s^-1`, `m^0.5`, `s^1/3`
//! - `kg m^2 s^-2`

use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};

use crate::dimension::{add_exponents, bounded, DimensionError, Exponent, MAX_EXPONENT};
use crate::unit::UnitError;

/// One term of a unit expression: a symbol raised to an exponent
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitTerm {
    pub symbol: String,
    pub exponent: Exponent,
}

impl UnitTerm {
    pub fn new(symbol: impl Into<String>, exponent: Exponent) -> Self {
        UnitTerm {
            symbol: symbol.into(),
            exponent,
        }
    }
}

impl std::fmt::Display for UnitTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.exponent.is_one() {
            write!(f, "{}", self.symbol)
        } else {
            write!(f, "{}^{}", self.symbol, format_exponent(self.exponent))
        }
    }
}

/// Split a unit expression into its terms
pub fn parse_terms(expr: &str) -> Result<Vec<UnitTerm>, UnitError> {
    expr.split_whitespace().map(parse_term).collect()
}

/// Parse a single term like `m^2`
pub fn parse_term(term: &str) -> Result<UnitTerm, UnitError> {
    let term = term.trim();

    let (symbol, exponent) = match term.find('^') {
        Some(caret) => {
            let exp_str = &term[caret + 1..];
            let exponent = parse_exponent(exp_str).ok_or_else(|| UnitError::InvalidExponent {
                term: term.to_string(),
                exponent: exp_str.to_string(),
            })?;
            (&term[..caret], exponent)
        }
        None => (term, Exponent::one()),
    };

    if symbol.is_empty() {
        return Err(UnitError::UnknownUnit(term.to_string()));
    }

    Ok(UnitTerm::new(symbol, exponent))
}

/// Parse an exponent: integer (`-2`), decimal (`0.5`) or ratio (`1/3`).
/// Surrounding parentheses are accepted. Numerators and denominators are
/// limited to [`MAX_EXPONENT`], decimals to nine fractional digits.
pub fn parse_exponent(s: &str) -> Option<Exponent> {
    let s = s.trim();
    let s = s
        .strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
        .unwrap_or(s)
        .trim();

    if let Some((num, den)) = s.split_once('/') {
        let num = parse_bounded(num.trim())?;
        let den = parse_bounded(den.trim())?;
        if den == 0 {
            return None;
        }
        return Some(Exponent::new(num, den));
    }

    if let Some((int_part, frac_part)) = s.split_once('.') {
        return parse_decimal(int_part, frac_part);
    }

    parse_bounded(s).map(Exponent::from_integer)
}

fn parse_bounded(s: &str) -> Option<i64> {
    s.parse::<i64>()
        .ok()
        .filter(|n| n.unsigned_abs() <= MAX_EXPONENT)
}

fn parse_decimal(int_part: &str, frac_part: &str) -> Option<Exponent> {
    // 10^9 still fits under MAX_EXPONENT
    let digits_ok = frac_part.bytes().all(|b| b.is_ascii_digit());
    if frac_part.is_empty() || frac_part.len() > 9 || !digits_ok {
        return None;
    }

    let negative = int_part.starts_with('-');
    let digits = int_part.trim_start_matches(&['-', '+'][..]);
    let whole: i64 = if digits.is_empty() { 0 } else { parse_bounded(digits)? };

    let denom = 10i64.checked_pow(frac_part.len() as u32)?;
    let frac: i64 = frac_part.parse().ok()?;
    let magnitude = whole.checked_mul(denom)?.checked_add(frac)?;

    let numer = if negative { -magnitude } else { magnitude };
    bounded(Some(Exponent::new(numer, denom))).ok()
}

/// Render an exponent: integers as-is, terminating fractions as decimals,
/// anything else as `p/q`.
pub fn format_exponent(exp: Exponent) -> String {
    if exp.is_integer() {
        return exp.to_integer().to_string();
    }

    let mut den = *exp.denom();
    while den % 2 == 0 {
        den /= 2;
    }
    while den % 5 == 0 {
        den /= 5;
    }

    if den == 1 {
        (*exp.numer() as f64 / *exp.denom() as f64).to_string()
    } else {
        format!("{}/{}", exp.numer(), exp.denom())
    }
}

/// Merge like symbols (keeping first-appearance order) and drop terms whose
/// exponent cancels to zero.
pub fn condense<I>(terms: I) -> Result<Vec<UnitTerm>, DimensionError>
where
    I: IntoIterator<Item = UnitTerm>,
{
    let mut merged: Vec<UnitTerm> = Vec::new();
    for term in terms {
        match merged.iter_mut().find(|t| t.symbol == term.symbol) {
            Some(existing) => existing.exponent = add_exponents(existing.exponent, term.exponent)?,
            None => merged.push(term),
        }
    }
    merged.retain(|t| !t.exponent.is_zero());
    Ok(merged)
}

/// Render terms back into an expression string
pub fn render_terms(terms: &[UnitTerm]) -> String {
    terms
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
