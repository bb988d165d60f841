use anyhow::{Result, anyhow, bail, ensure};
use logos::{Lexer, Logos};
use std::{
    cmp::Ordering,
    fmt,
    ops::{Add, Sub},
    str::FromStr,
};

/// A point on the simulated clock, in seconds.
///
/// The simulated clock is real valued: packet sizes are real valued and
/// service times are derived from them (`size * 8 / rate`), so times are
/// not constrained to a tick. [`Time`] is totally ordered (using
/// [`f64::total_cmp`]) so it can be used as the key of the event queue.
///
/// ```
/// # use flowsim_core::Time;
/// let t = Time::from_secs(1.5);
/// assert_eq!(t + 1.5, Time::from_secs(3.0));
/// assert_eq!(Time::from_secs(3.0) - t, 1.5);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Time(f64);

impl Time {
    /// The start of every simulation.
    pub const ZERO: Self = Self(0.0);

    /// A time that is never reached. This is the default stop time of a
    /// [`PacketSource`](crate::source::PacketSource).
    pub const NEVER: Self = Self(f64::INFINITY);

    #[inline]
    pub const fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    #[inline]
    pub const fn as_secs(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }
}

impl From<f64> for Time {
    fn from(secs: f64) -> Self {
        Self::from_secs(secs)
    }
}

impl From<Time> for f64 {
    fn from(time: Time) -> Self {
        time.as_secs()
    }
}

impl Add<f64> for Time {
    type Output = Time;
    fn add(self, rhs: f64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

/// elapsed seconds between two points on the clock
impl Sub<Time> for Time {
    type Output = f64;
    fn sub(self, rhs: Time) -> Self::Output {
        self.0 - rhs.0
    }
}

impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Time {}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

impl FromStr for Time {
    type Err = anyhow::Error;

    /// Parses `"1.5"`, `"1.5s"`, `"150ms"` or sums such as `"1s 500ms"`.
    /// A lone number without a unit is read as seconds; every term of a
    /// sum needs a unit.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::<'_, Token>::new(s);
        let mut tokens = Vec::new();
        while let Some(next) = lex.next() {
            let token = next.map_err(|()| anyhow!("Failed to parse: {s}"))?;
            tokens.push((token, lex.slice()));
        }

        if let [(Token::Value, slice)] = tokens.as_slice() {
            return Ok(Self(slice.parse()?));
        }
        ensure!(!tokens.is_empty(), "Cannot parse an empty time");

        let mut secs = 0.0;
        let mut tokens = tokens.into_iter();
        while let Some((token, slice)) = tokens.next() {
            ensure!(
                token == Token::Value,
                "Expecting time to start with a number. Cannot parse {s}"
            );
            let number: f64 = slice.parse()?;

            let scale = match tokens.next() {
                Some((Token::NanoSeconds, _)) => 1e-9,
                Some((Token::MicroSeconds, _)) => 1e-6,
                Some((Token::MilliSeconds, _)) => 1e-3,
                Some((Token::Seconds, _)) => 1.0,
                Some((Token::Minutes, _)) => 60.0,
                Some((Token::Value, _)) | None => {
                    bail!("Failed to parse `{s}', expecting a unit after {number}.")
                }
            };
            secs += number * scale;
        }

        Ok(Self(secs))
    }
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")] // Ignore this regex pattern between tokens
enum Token {
    #[token("ns")]
    NanoSeconds,
    #[regex("us|μs|µs")]
    MicroSeconds,
    #[token("ms")]
    MilliSeconds,
    #[token("s")]
    Seconds,
    #[token("m")]
    Minutes,

    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logos_lexer() {
        let mut lex = Token::lexer("1.5ms");

        assert_eq!(lex.next(), Some(Ok(Token::Value)));
        assert_eq!(lex.span(), 0..3);
        assert_eq!(lex.slice(), "1.5");

        assert_eq!(lex.next(), Some(Ok(Token::MilliSeconds)));
        assert_eq!(lex.span(), 3..5);
        assert_eq!(lex.slice(), "ms");
    }

    #[test]
    fn parse() {
        assert_eq!("1.5".parse::<Time>().unwrap(), Time::from_secs(1.5));
        assert_eq!("10s".parse::<Time>().unwrap(), Time::from_secs(10.0));
        assert_eq!("250ms".parse::<Time>().unwrap(), Time::from_secs(0.25));
        assert_eq!("2m".parse::<Time>().unwrap(), Time::from_secs(120.0));
        assert_eq!("1s 500ms".parse::<Time>().unwrap(), Time::from_secs(1.5));
    }

    #[test]
    fn parse_invalid_strings() {
        assert!("".parse::<Time>().is_err());
        assert!("ms".parse::<Time>().is_err());
        assert!("abc".parse::<Time>().is_err());
        assert!("1s ms".parse::<Time>().is_err());
    }

    #[test]
    fn sum_terms_need_a_unit() {
        assert!("1 2".parse::<Time>().is_err());
        assert!("1s 2".parse::<Time>().is_err());
        assert!("1 500ms".parse::<Time>().is_err());
        assert_eq!("2s 250ms".parse::<Time>().unwrap(), Time::from_secs(2.25));
    }

    #[test]
    fn ordering() {
        assert!(Time::ZERO < Time::from_secs(0.1));
        assert!(Time::from_secs(1e12) < Time::NEVER);
        assert_eq!(Time::from_secs(2.0).max(Time::from_secs(1.0)), Time::from_secs(2.0));
    }

    #[test]
    fn display() {
        assert_eq!(Time::from_secs(1.5).to_string(), "1.5s");
        assert_eq!(Time::ZERO.to_string(), "0s");
    }
}
