//! Runtime values flowing between plan nodes
//!
//! Integers and floats form a single numeric domain: `Int(1)` and
//! `Float(1.0)` are equal, hash alike and sort together. Grouping and
//! `DISTINCT` rely on `Hash` agreeing with `Eq` across that domain.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::catalog::DataType;

/// A single column value
#[derive(Debug, Clone, Default)]
pub enum Datum {
    #[default]
    Null,
    Bool(bool),
    /// Every integer width widens to i64
    Int(i64),
    /// Every float width widens to f64
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Unix milliseconds
    Timestamp(i64),
}

/// Canonical numeric form used for comparison and hashing.
///
/// A float with an exact i64 value collapses to `Int`; only fractional,
/// out-of-range, infinite and NaN floats stay `Float`.
#[derive(Clone, Copy)]
enum Numeric {
    Int(i64),
    Float(f64),
}

const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

impl Numeric {
    fn from_float(v: f64) -> Self {
        if v.fract() == 0.0 && (I64_LOWER..I64_UPPER).contains(&v) {
            Numeric::Int(v as i64)
        } else {
            Numeric::Float(v)
        }
    }

    fn cmp(self, other: Numeric) -> Ordering {
        match (self, other) {
            (Numeric::Int(a), Numeric::Int(b)) => a.cmp(&b),
            (Numeric::Float(a), Numeric::Float(b)) => a.total_cmp(&b),
            (Numeric::Int(a), Numeric::Float(b)) => int_cmp_float(a, b),
            (Numeric::Float(a), Numeric::Int(b)) => int_cmp_float(b, a).reverse(),
        }
    }
}

/// Compare an integer against a float that has no exact i64 value
fn int_cmp_float(i: i64, f: f64) -> Ordering {
    if (I64_LOWER..I64_UPPER).contains(&f) {
        // `f` is fractional here, so the two are never equal
        (i as f64).total_cmp(&f)
    } else if f.is_sign_negative() {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

impl Datum {
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Rank of the value's class when comparing across types
    fn class_rank(&self) -> u8 {
        match self {
            Datum::Null => 0,
            Datum::Bool(_) => 1,
            Datum::Int(_) | Datum::Float(_) => 2,
            Datum::String(_) => 3,
            Datum::Bytes(_) => 4,
            Datum::Timestamp(_) => 5,
        }
    }

    fn numeric(&self) -> Option<Numeric> {
        match self {
            Datum::Int(i) => Some(Numeric::Int(*i)),
            Datum::Float(v) => Some(Numeric::from_float(*v)),
            _ => None,
        }
    }

    /// Column type this value reports (`None` for NULL)
    pub fn data_type(&self) -> Option<DataType> {
        let ty = match self {
            Datum::Null => return None,
            Datum::Bool(_) => DataType::Boolean,
            Datum::Int(_) => DataType::BigInt,
            Datum::Float(_) => DataType::Double,
            Datum::String(_) => DataType::Text,
            Datum::Bytes(_) => DataType::Blob,
            Datum::Timestamp(_) => DataType::Timestamp,
        };
        Some(ty)
    }

    /// Truth value of a predicate result; integers count as booleans
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Datum::Bool(b) => Some(*b),
            Datum::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Integer view; floats truncate toward zero
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Datum::Int(i) => Some(*i),
            Datum::Float(v) => Some(*v as i64),
            Datum::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Datum::Float(v) => Some(*v),
            Datum::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::String(s) => Some(s),
            _ => None,
        }
    }

    /// Unary minus. `None` when the value is not numeric.
    pub fn negate(&self) -> Option<Datum> {
        match self {
            Datum::Null => Some(Datum::Null),
            Datum::Int(i) => i.checked_neg().map(Datum::Int),
            Datum::Float(v) => Some(Datum::Float(-v)),
            _ => None,
        }
    }

    /// Three-valued NOT
    pub fn not(&self) -> Option<Datum> {
        match self {
            Datum::Null => Some(Datum::Null),
            Datum::Bool(b) => Some(Datum::Bool(!b)),
            _ => None,
        }
    }

    /// SQL `LIKE`: `%` matches any run, `_` one character, `\` escapes.
    pub fn like(&self, pattern: &Datum) -> Option<Datum> {
        match (self, pattern) {
            (Datum::Null, _) | (_, Datum::Null) => Some(Datum::Null),
            (Datum::String(s), Datum::String(p)) => {
                let text: Vec<char> = s.chars().collect();
                let pattern = LikeToken::parse(p);
                Some(Datum::Bool(like_matches(&text, &pattern)))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LikeToken {
    AnyRun,
    AnyChar,
    Char(char),
}

impl LikeToken {
    fn parse(pattern: &str) -> Vec<LikeToken> {
        let mut tokens = Vec::new();
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            let token = match c {
                '%' => LikeToken::AnyRun,
                '_' => LikeToken::AnyChar,
                // a trailing backslash matches itself
                '\\' => LikeToken::Char(chars.next().unwrap_or('\\')),
                c => LikeToken::Char(c),
            };
            // collapse runs of `%`
            if token == LikeToken::AnyRun && tokens.last() == Some(&LikeToken::AnyRun) {
                continue;
            }
            tokens.push(token);
        }
        tokens
    }
}

/// Greedy matcher that backtracks only to the most recent `%`
fn like_matches(text: &[char], pattern: &[LikeToken]) -> bool {
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(LikeToken::AnyRun) => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(LikeToken::AnyChar) => {
                t += 1;
                p += 1;
            }
            Some(LikeToken::Char(c)) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((star, consumed)) => {
                    p = star + 1;
                    t = consumed + 1;
                    backtrack = Some((star, consumed + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|tok| *tok == LikeToken::AnyRun)
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => f.write_str("NULL"),
            Datum::Bool(true) => f.write_str("TRUE"),
            Datum::Bool(false) => f.write_str("FALSE"),
            Datum::Int(i) => write!(f, "{i}"),
            Datum::Float(v) => write!(f, "{v}"),
            Datum::String(s) => f.write_str(s),
            Datum::Bytes(bytes) => {
                f.write_str("X'")?;
                bytes.iter().try_for_each(|b| write!(f, "{b:02X}"))?;
                f.write_str("'")
            }
            Datum::Timestamp(ms) => write!(f, "TIMESTAMP({ms})"),
        }
    }
}

macro_rules! datum_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Datum {
                fn from(v: $ty) -> Self {
                    Datum::$variant(v.into())
                }
            }
        )*
    };
}

datum_from! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    f64 => Float,
    &str => String,
    String => String,
}

impl<T: Into<Datum>> From<Option<T>> for Datum {
    fn from(v: Option<T>) -> Self {
        v.map_or(Datum::Null, Into::into)
    }
}

impl Ord for Datum {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Datum::Bool(a), Datum::Bool(b)) => a.cmp(b),
            (Datum::String(a), Datum::String(b)) => a.cmp(b),
            (Datum::Bytes(a), Datum::Bytes(b)) => a.cmp(b),
            (Datum::Timestamp(a), Datum::Timestamp(b)) => a.cmp(b),
            _ => match (self.numeric(), other.numeric()) {
                (Some(a), Some(b)) => a.cmp(b),
                // NULL ranks lowest
                _ => self.class_rank().cmp(&other.class_rank()),
            },
        }
    }
}

impl PartialOrd for Datum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Datum {}

impl Hash for Datum {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.class_rank().hash(state);
        match self {
            Datum::Null => {}
            Datum::Bool(b) => b.hash(state),
            Datum::Int(_) | Datum::Float(_) => match self.numeric() {
                Some(Numeric::Int(i)) => i.hash(state),
                Some(Numeric::Float(v)) => v.to_bits().hash(state),
                None => {}
            },
            Datum::String(s) => s.hash(state),
            Datum::Bytes(b) => b.hash(state),
            Datum::Timestamp(ms) => ms.hash(state),
        }
    }
}
