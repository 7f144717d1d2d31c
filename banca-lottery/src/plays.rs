//! Sales-terminal play notation.
//!
//! A cashier types a play such as `12`, `123+`, `1234.` or `33d66`. The
//! suffix picks the bet type and generators expand a single entry into many
//! bet numbers.

use crate::error::PlayError;
use banca_core::BetType;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedPlay {
    pub bet_type: BetType,
    pub numbers: Vec<String>,
}

impl ParsedPlay {
    fn single(bet_type: BetType, number: &str) -> Self {
        Self {
            bet_type,
            numbers: vec![number.to_string()],
        }
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

pub fn parse_play(input: &str) -> Result<ParsedPlay, PlayError> {
    let play = input.trim();
    if play.is_empty() {
        return Err(PlayError::Empty);
    }
    let invalid = || PlayError::InvalidFormat(play.to_string());
    // Every notation is ASCII; the suffix slicing below relies on it
    if !play.is_ascii() {
        return Err(invalid());
    }

    if is_digits(play) {
        let bet_type = match play.len() {
            2 => BetType::Directo,
            3 => BetType::Cash3Straight,
            4 => BetType::Pale,
            5 => BetType::Pick5Straight,
            6 => BetType::Tripleta,
            _ => return Err(invalid()),
        };
        return Ok(ParsedPlay::single(bet_type, play));
    }

    if let Some(parsed) = parse_generator(play)? {
        return Ok(parsed);
    }

    // Two-character suffixes first so `123F+` is not read as `123F` + `+`
    for (suffix, len, bet_type) in [
        ("F+", 3, BetType::Cash3FrontBox),
        ("f+", 3, BetType::Cash3FrontBox),
        ("B+", 3, BetType::Cash3BackBox),
    ] {
        if let Some(digits) = play.strip_suffix(suffix) {
            if is_digits(digits) && digits.len() == len {
                return Ok(ParsedPlay::single(bet_type, digits));
            }
        }
    }

    let (digits, suffix) = play.split_at(play.len() - 1);
    if !is_digits(digits) {
        return Err(invalid());
    }
    let bet_type = match (suffix, digits.len()) {
        ("+" | "b", 3) => BetType::Cash3Box,
        ("s" | "S", 3) => BetType::Cash3Straight,
        ("F" | "f", 3) => BetType::Cash3FrontStraight,
        ("B", 3) => BetType::Cash3BackStraight,
        ("-", 4) => BetType::Play4Straight,
        ("+", 4) => BetType::Play4Box,
        ("-", 5) => BetType::Pick5Straight,
        ("+", 5) => BetType::Pick5Box,
        _ => return Err(invalid()),
    };
    Ok(ParsedPlay::single(bet_type, digits))
}

fn parse_generator(play: &str) -> Result<Option<ParsedPlay>, PlayError> {
    // NN. / NNN. / NNNN. / NNNNNN.
    if let Some(digits) = play.strip_suffix('.') {
        if !is_digits(digits) {
            return Ok(None);
        }
        let parsed = match digits.len() {
            2 => ParsedPlay {
                bet_type: BetType::Directo,
                numbers: permutations(digits),
            },
            3 => ParsedPlay {
                bet_type: BetType::Cash3Straight,
                numbers: permutations(digits),
            },
            4 => ParsedPlay {
                bet_type: BetType::Pale,
                numbers: pair_groups(digits, 2),
            },
            6 => ParsedPlay {
                bet_type: BetType::Tripleta,
                numbers: pair_groups(digits, 3),
            },
            _ => return Err(PlayError::InvalidFormat(play.to_string())),
        };
        return Ok(Some(parsed));
    }

    // NNNq / NNNNq
    if let Some(digits) = play.strip_suffix('q').or_else(|| play.strip_suffix('Q')) {
        if is_digits(digits) {
            let bet_type = match digits.len() {
                3 => BetType::Cash3Straight,
                4 => BetType::Play4Straight,
                _ => return Err(PlayError::InvalidFormat(play.to_string())),
            };
            return Ok(Some(ParsedPlay {
                bet_type,
                numbers: permutations(digits),
            }));
        }
    }

    // AAdBB
    if let Some((from, to)) = play.split_once(['d', 'D']) {
        if is_digits(from) && is_digits(to) && from.len() == 2 && to.len() == 2 {
            return doubles_sequence(play, from, to).map(Some);
        }
    }

    // NNN-10
    if let Some(digits) = play.strip_suffix("-10") {
        if is_digits(digits) && digits.len() == 3 {
            let tail = &digits[1..];
            return Ok(Some(ParsedPlay {
                bet_type: BetType::Cash3Straight,
                numbers: (0..10).map(|d| format!("{}{}", d, tail)).collect(),
            }));
        }
    }

    // XYZ+UVW
    if let Some((from, to)) = play.split_once('+') {
        if is_digits(from) && is_digits(to) && from.len() == 3 && to.len() == 3 {
            let start: u32 = from.parse().map_err(|_| PlayError::InvalidFormat(play.to_string()))?;
            let end: u32 = to.parse().map_err(|_| PlayError::InvalidFormat(play.to_string()))?;
            if start > end {
                return Err(PlayError::InvalidRange(play.to_string()));
            }
            return Ok(Some(ParsedPlay {
                bet_type: BetType::Cash3Straight,
                numbers: (start..=end).map(|n| format!("{:03}", n)).collect(),
            }));
        }
    }

    Ok(None)
}

fn doubles_sequence(play: &str, from: &str, to: &str) -> Result<ParsedPlay, PlayError> {
    let is_double = |s: &str| s.as_bytes()[0] == s.as_bytes()[1];
    if !is_double(from) || !is_double(to) {
        return Err(PlayError::NotDoubles(play.to_string()));
    }
    let start = (from.as_bytes()[0] - b'0') as u32;
    let end = (to.as_bytes()[0] - b'0') as u32;
    if start > end {
        return Err(PlayError::InvalidRange(play.to_string()));
    }
    Ok(ParsedPlay {
        bet_type: BetType::Directo,
        numbers: (start..=end).map(|d| format!("{0}{0}", d)).collect(),
    })
}

/// Distinct digit permutations in generation order.
fn permutations(digits: &str) -> Vec<String> {
    let chars: Vec<char> = digits.chars().collect();
    let mut used = vec![false; chars.len()];
    let mut current = String::with_capacity(chars.len());
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    permute(&chars, &mut used, &mut current, &mut seen, &mut out);
    out
}

fn permute(
    chars: &[char],
    used: &mut [bool],
    current: &mut String,
    seen: &mut HashSet<String>,
    out: &mut Vec<String>,
) {
    if current.len() == chars.len() {
        if seen.insert(current.clone()) {
            out.push(current.clone());
        }
        return;
    }
    for i in 0..chars.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        current.push(chars[i]);
        permute(chars, used, current, seen, out);
        current.pop();
        used[i] = false;
    }
}

/// Unordered groups of `size` distinct two-digit numbers built from every
/// digit permutation, each group written in ascending order.
fn pair_groups(digits: &str, size: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for perm in permutations(digits) {
        let mut pairs: Vec<&str> = (0..size).map(|i| &perm[i * 2..i * 2 + 2]).collect();
        pairs.sort_unstable();
        if pairs.windows(2).any(|w| w[0] == w[1]) {
            continue;
        }
        let group = pairs.concat();
        if seen.insert(group.clone()) {
            out.push(group);
        }
    }
    out
}

/// Canonical form of a bet number. Pales and tripletas are unordered, so
/// their two-digit parts are sorted; everything else is kept as typed.
pub fn canonical_number(bet_type: BetType, number: &str) -> String {
    match bet_type {
        BetType::Pale | BetType::Tripleta if number.len() % 2 == 0 && number.is_ascii() => {
            let mut pairs: Vec<&str> = (0..number.len() / 2)
                .map(|i| &number[i * 2..i * 2 + 2])
                .collect();
            pairs.sort_unstable();
            pairs.concat()
        }
        _ => number.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(play: &str) -> Vec<String> {
        parse_play(play).unwrap().numbers
    }

    #[test]
    fn test_plain_numbers_pick_bet_type_by_length() {
        assert_eq!(parse_play("12").unwrap().bet_type, BetType::Directo);
        assert_eq!(parse_play(" 123 ").unwrap().bet_type, BetType::Cash3Straight);
        assert_eq!(parse_play("1234").unwrap().bet_type, BetType::Pale);
        assert_eq!(parse_play("12345").unwrap().bet_type, BetType::Pick5Straight);
        assert_eq!(parse_play("123456").unwrap().bet_type, BetType::Tripleta);
        assert!(parse_play("1234567").is_err());
        assert_eq!(parse_play("  "), Err(PlayError::Empty));
    }

    #[test]
    fn test_suffixes() {
        let cases = [
            ("123+", BetType::Cash3Box),
            ("123b", BetType::Cash3Box),
            ("123s", BetType::Cash3Straight),
            ("123F", BetType::Cash3FrontStraight),
            ("123F+", BetType::Cash3FrontBox),
            ("123B", BetType::Cash3BackStraight),
            ("123B+", BetType::Cash3BackBox),
            ("1234-", BetType::Play4Straight),
            ("1234+", BetType::Play4Box),
            ("12345-", BetType::Pick5Straight),
            ("12345+", BetType::Pick5Box),
        ];
        for (play, expected) in cases {
            let parsed = parse_play(play).unwrap();
            assert_eq!(parsed.bet_type, expected, "{}", play);
            assert!(parsed.numbers[0].chars().all(|c| c.is_ascii_digit()));
        }
        assert!(parse_play("12x").is_err());
        assert!(parse_play("12+").is_err());
    }

    #[test]
    fn test_doubles_sequence() {
        assert_eq!(numbers("33d66"), vec!["33", "44", "55", "66"]);
        assert_eq!(numbers("00d99").len(), 10);
        assert!(matches!(parse_play("34d66"), Err(PlayError::NotDoubles(_))));
        assert!(matches!(parse_play("66d33"), Err(PlayError::InvalidRange(_))));
    }

    #[test]
    fn test_permutation_generators() {
        assert_eq!(numbers("12."), vec!["12", "21"]);
        assert_eq!(numbers("11."), vec!["11"]);
        assert_eq!(
            numbers("123."),
            vec!["123", "132", "213", "231", "312", "321"]
        );
        assert_eq!(numbers("112q"), vec!["112", "121", "211"]);
        assert_eq!(parse_play("1234q").unwrap().numbers.len(), 24);
        assert_eq!(parse_play("1234q").unwrap().bet_type, BetType::Play4Straight);
    }

    #[test]
    fn test_pale_and_tripleta_generators() {
        let pales = numbers("1234.");
        assert_eq!(pales.len(), 12);
        assert!(pales.contains(&"1234".to_string()));
        assert!(!pales.contains(&"3412".to_string()));

        // 1122 only yields pales of two different numbers
        assert_eq!(numbers("1122."), vec!["1122", "1221"]);
        assert!(numbers("1111.").is_empty());

        let triples = parse_play("123456.").unwrap();
        assert_eq!(triples.bet_type, BetType::Tripleta);
        assert!(triples.numbers.iter().all(|t| t.len() == 6));
    }

    #[test]
    fn test_ranges() {
        let ten = numbers("123-10");
        assert_eq!(ten.len(), 10);
        assert_eq!(ten[0], "023");
        assert_eq!(ten[9], "923");

        assert_eq!(numbers("098+101"), vec!["098", "099", "100", "101"]);
        assert!(matches!(parse_play("200+100"), Err(PlayError::InvalidRange(_))));
    }

    #[test]
    fn test_non_ascii_input_is_rejected() {
        for play in ["12é", "123ñ", "é", "12.€", "33d6６"] {
            assert!(
                matches!(parse_play(play), Err(PlayError::InvalidFormat(_))),
                "{}",
                play
            );
        }
    }

    #[test]
    fn test_canonical_number() {
        assert_eq!(canonical_number(BetType::Pale, "5512"), "1255");
        assert_eq!(canonical_number(BetType::Tripleta, "304010"), "103040");
        assert_eq!(canonical_number(BetType::Cash3Box, "321"), "321");
    }
}
