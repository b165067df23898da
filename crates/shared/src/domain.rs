use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_GRADE: u8 = 3;
pub const MAX_GRADE: u8 = 12;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(EventId);
id_newtype!(EventOptionId);

/// A school grade inside the registrable domain (3..=12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Grade(u8);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GradeParseError {
    #[error("Could not extract grade number from: {0}")]
    Unrecognized(String),
    #[error("Grade {0} is not in valid range (3-12)")]
    OutOfRange(i64),
}

impl Grade {
    pub fn new(value: i64) -> Option<Self> {
        if (MIN_GRADE as i64..=MAX_GRADE as i64).contains(&value) {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn group(self) -> Group {
        Group::for_grade(self)
    }

    pub fn all() -> impl Iterator<Item = Grade> {
        (MIN_GRADE..=MAX_GRADE).map(Grade)
    }
}

impl TryFrom<i64> for Grade {
    type Error = GradeParseError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Grade::new(value).ok_or(GradeParseError::OutOfRange(value))
    }
}

impl From<Grade> for i64 {
    fn from(value: Grade) -> Self {
        value.0 as i64
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Grade {}", self.0)
    }
}

const GRADE_WORDS: [(&str, i64); 10] = [
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
];

/// Parses the free-form grade labels the form may submit: `"7"`, `"Grade 7"`
/// or `"Grade Seven"`.
pub fn parse_grade_label(raw: &str) -> Result<Grade, GradeParseError> {
    let trimmed = raw.trim();
    if let Ok(number) = trimmed.parse::<i64>() {
        return Grade::try_from(number);
    }

    let digits: String = trimmed
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    let number = if !digits.is_empty() {
        digits
            .parse::<i64>()
            .map_err(|_| GradeParseError::Unrecognized(trimmed.to_string()))?
    } else {
        let lower = trimmed.to_ascii_lowercase();
        lower
            .split(|c: char| !c.is_ascii_alphabetic())
            .find_map(|word| {
                GRADE_WORDS
                    .iter()
                    .find(|(name, _)| *name == word)
                    .map(|(_, n)| *n)
            })
            .ok_or_else(|| GradeParseError::Unrecognized(trimmed.to_string()))?
    };

    Grade::try_from(number)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Group {
    A,
    B,
    C,
    D,
}

impl Group {
    pub fn for_grade(grade: Grade) -> Self {
        match grade.value() {
            3..=5 => Group::A,
            6..=8 => Group::B,
            9..=10 => Group::C,
            _ => Group::D,
        }
    }

    pub fn for_raw_grade(value: i64) -> Option<Self> {
        Grade::new(value).map(Group::for_grade)
    }

    pub fn letter(self) -> &'static str {
        match self {
            Group::A => "A",
            Group::B => "B",
            Group::C => "C",
            Group::D => "D",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Group::A => "Group A (Grade 3-5)",
            Group::B => "Group B (Grade 6-8)",
            Group::C => "Group C (Grade 9-10)",
            Group::D => "Group D (Grade 11-12)",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.letter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Individual,
    Team,
}

/// Renders a fee as taka with thousands separators, e.g. `৳1,250.00`.
pub fn format_taka(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let plain = format!("{:.2}", rounded.abs());
    let (whole, fraction) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, digit) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}৳{grouped}.{fraction}")
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
