//! Chilean RUT identity numbers
//! ----------------------------
//! Parsing, Módulo 11 validation and display formatting for the national identity
//! number that doubles as the login username. `clean`, `format` and `validate` are
//! total over any string; `Rut` is the validated value type built on top of them.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AppError;

/// Domain appended to canonical RUTs to form login handles.
pub const LOGIN_DOMAIN: &str = "electrix.cl";

/// Strip every `.` and `-`. Nothing else is touched (case and whitespace survive).
pub fn clean(input: &str) -> String {
    input.chars().filter(|c| *c != '.' && *c != '-').collect()
}

/// Render as `12.345.678-9`. Characters other than digits and `k`/`K` are dropped first.
pub fn format(input: &str) -> String {
    let kept: Vec<char> = input
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == 'k' || *c == 'K')
        .collect();
    let Some((last, body)) = kept.split_last() else { return String::new(); };
    let check = last.to_ascii_uppercase();
    if body.is_empty() {
        return check.to_string();
    }
    // Digits left in the current run from each position onward; only digit runs are grouped.
    let mut run = vec![0usize; body.len() + 1];
    for i in (0..body.len()).rev() {
        run[i] = if body[i].is_ascii_digit() { run[i + 1] + 1 } else { 0 };
    }
    let mut out = String::with_capacity(body.len() + body.len() / 3 + 2);
    for (i, c) in body.iter().enumerate() {
        if i > 0 && run[i] > 0 && run[i] % 3 == 0 {
            out.push('.');
        }
        out.push(*c);
    }
    out.push('-');
    out.push(check);
    out
}

/// Módulo 11 check character for a body of decimal digits.
pub fn check_character(body: &str) -> Option<char> {
    if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut sum: u32 = 0;
    let mut weight: u32 = 2;
    for b in body.bytes().rev() {
        sum = (sum + u32::from(b - b'0') * weight) % 11;
        weight = if weight == 7 { 2 } else { weight + 1 };
    }
    Some(match 11 - (sum % 11) {
        11 => '0',
        10 => 'K',
        d => char::from(b'0' + d as u8),
    })
}

pub fn validate(input: &str) -> bool {
    if input.trim().is_empty() {
        return false;
    }
    let cleaned = clean(input);
    let Some(dv) = cleaned.chars().last() else { return false; };
    let dv = dv.to_ascii_uppercase();
    let body = &cleaned[..cleaned.len() - dv.len_utf8()];
    if !(dv.is_ascii_digit() || dv == 'K') {
        return false;
    }
    check_character(body) == Some(dv)
}

/// Login handle for an identifier typed at a login or user-creation form:
/// addresses pass through untouched, anything else is cleaned and suffixed.
pub fn login_handle(identifier: &str) -> String {
    if identifier.contains('@') {
        identifier.to_string()
    } else {
        format!("{}@{}", clean(identifier), LOGIN_DOMAIN)
    }
}

/// A validated RUT, stored in canonical form with an upper-case check character.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rut {
    canonical: String,
}

impl Rut {
    pub fn parse(input: &str) -> Result<Rut, AppError> {
        if !validate(input) {
            return Err(AppError::validation("invalid_rut", "RUT inválido"));
        }
        Ok(Rut { canonical: clean(input).to_ascii_uppercase() })
    }

    pub fn canonical(&self) -> &str { &self.canonical }

    pub fn body(&self) -> &str { &self.canonical[..self.canonical.len() - 1] }

    pub fn check(&self) -> char {
        // canonical always ends in an ASCII digit or 'K'
        self.canonical.chars().last().unwrap_or('0')
    }

    pub fn login_handle(&self) -> String {
        format!("{}@{}", self.canonical, LOGIN_DOMAIN)
    }
}

impl Display for Rut {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format(&self.canonical))
    }
}

impl FromStr for Rut {
    type Err = AppError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Rut::parse(s) }
}

impl Serialize for Rut {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical)
    }
}

impl<'de> Deserialize<'de> for Rut {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Rut::parse(&raw).map_err(|e| serde::de::Error::custom(e.message().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_strips_separators_only() {
        assert_eq!(clean("12.345.678-5"), "123456785");
        assert_eq!(clean(""), "");
        assert_eq!(clean(" 12.345-k "), " 12345k ");
    }

    #[test]
    fn format_groups_body_and_uppercases_check() {
        assert_eq!(format("123456785"), "12.345.678-5");
        assert_eq!(format("9"), "9");
        assert_eq!(format(""), "");
        assert_eq!(format("abc"), "");
        assert_eq!(format("7654321k"), "7.654.321-K");
        assert_eq!(format("12"), "1-2");
        assert_eq!(format("1234"), "123-4");
        assert_eq!(format("12345"), "1.234-5");
        assert_eq!(format("rut: 12 345 678 5"), "12.345.678-5");
    }

    #[test]
    fn format_groups_each_digit_run() {
        assert_eq!(format("12k34567"), "12k3.456-7");
        assert_eq!(format("12k4567"), "12k.456-7");
        assert_eq!(format("1234k56"), "1.234k5-6");
        assert_eq!(format(&format("12k34567")), "12k3.456-7");
    }

    #[test]
    fn check_character_survives_long_bodies() {
        let body = "9".repeat(200_000);
        let dv = check_character(&body).unwrap();
        assert!(dv.is_ascii_digit() || dv == 'K');
        assert!(validate(&format!("{}{}", body, dv)));
    }

    #[test]
    fn format_is_idempotent_and_clean_round_trips() {
        for x in ["123456785", "9", "11111111", "7654321K", "1000000", "98765432k"] {
            let once = format(x);
            assert_eq!(format(&once), once, "idempotence for {x}");
            assert_eq!(clean(&once).to_ascii_uppercase(), clean(x).to_ascii_uppercase(), "round trip for {x}");
        }
        assert_eq!(clean(&format("123456785")), clean("123456785"));
    }

    #[test]
    fn validate_modulo_11() {
        assert!(validate("12345678-5"));
        assert!(validate("12.345.678-5"));
        assert!(validate("123456785"));
        assert!(!validate("12345678-9"));
        assert!(!validate("12345678-A"));
        assert!(!validate(""));
        assert!(!validate("   "));
        assert!(!validate("abc"));
        assert!(!validate("5"));
        assert!(!validate("12.34a.678-5"));
    }

    #[test]
    fn validate_handles_k_and_zero() {
        assert_eq!(check_character("6"), Some('K'));
        assert!(validate("6-k"));
        assert_eq!(validate("6-k"), validate("6-K"));
        assert_eq!(validate("12345678-k"), validate("12345678-K"));
        assert_eq!(check_character("7"), Some('8'));
        assert_eq!(check_character("0"), Some('0'));
        assert!(validate("0-0"));
        assert_eq!(check_character("14"), Some('0'));
        assert!(validate("14-0"));
        assert!(!validate("7-0"));
        assert_eq!(check_character(""), None);
        assert_eq!(check_character("12a"), None);
    }

    #[test]
    fn rut_value_type() {
        let r: Rut = "12.345.678-5".parse().unwrap();
        assert_eq!(r.canonical(), "123456785");
        assert_eq!(r.body(), "12345678");
        assert_eq!(r.check(), '5');
        assert_eq!(r.to_string(), "12.345.678-5");
        assert_eq!(r.login_handle(), "123456785@electrix.cl");
        assert_eq!(Rut::parse("6-k").unwrap().canonical(), "6K");

        let err = Rut::parse("12345678-9").unwrap_err();
        assert_eq!(err.code_str(), "invalid_rut");

        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "\"123456785\"");
        let back: Rut = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
        assert!(serde_json::from_str::<Rut>("\"12345678-9\"").is_err());
    }

    #[test]
    fn login_handle_derivation() {
        assert_eq!(login_handle("12.345.678-5"), "123456785@electrix.cl");
        assert_eq!(login_handle("2121"), "2121@electrix.cl");
        assert_eq!(login_handle("jefe@electrix.cl"), "jefe@electrix.cl");
    }
}
