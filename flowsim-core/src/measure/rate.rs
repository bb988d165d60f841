use anyhow::{bail, ensure};
use logos::{Lexer, Logos};
use std::{fmt, str::FromStr};

/// The transmission [`Rate`] of a [`SwitchPort`], in bits per second.
///
/// A port serialises a packet of `size` bytes in `size * 8 / rate`
/// seconds of simulated time.
///
/// # Example
///
/// ```
/// # use flowsim_core::measure::Rate;
/// let rate: Rate = "8kbps".parse().unwrap();
/// assert_eq!(rate, Rate::new(8_000.0));
/// // 500 bytes at 8kbps
/// assert_eq!(rate.service_time(500.0), 0.5);
/// ```
///
/// [`SwitchPort`]: crate::port::SwitchPort
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Rate(f64);

const K: f64 = 1_000.0;
const M: f64 = 1_000_000.0;
const G: f64 = 1_000_000_000.0;

impl Rate {
    /// create a new [`Rate`] from a number of bits per second.
    pub const fn new(bits_per_sec: f64) -> Self {
        Self(bits_per_sec)
    }

    #[inline]
    pub const fn bits_per_sec(self) -> f64 {
        self.0
    }

    /// A rate a port can actually serve at: strictly positive and finite.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.0.is_finite() && self.0 > 0.0
    }

    /// seconds needed to serialise `size` bytes.
    #[inline]
    pub fn service_time(self, size: f64) -> f64 {
        size * 8.0 / self.0
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;

        if v >= G && (v % G) == 0.0 {
            write!(f, "{}gbps", v / G)
        } else if v >= M && (v % M) == 0.0 {
            write!(f, "{}mbps", v / M)
        } else if v >= K && (v % K) == 0.0 {
            write!(f, "{}kbps", v / K)
        } else {
            write!(f, "{v}bps")
        }
    }
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")] // Ignore this regex pattern between tokens
enum RateToken {
    #[token("bps")]
    Bps,
    #[token("kbps")]
    Kbps,
    #[token("mbps")]
    Mbps,
    #[token("gbps")]
    Gbps,

    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Value,
}

impl FromStr for Rate {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::<'_, RateToken>::new(s);

        let Some(Ok(RateToken::Value)) = lex.next() else {
            bail!("Expecting to parse a number")
        };
        let number: f64 = lex.slice().parse()?;
        let Some(Ok(token)) = lex.next() else {
            bail!("Expecting to parse a unit")
        };
        let bps = match token {
            RateToken::Bps => number,
            RateToken::Kbps => number * K,
            RateToken::Mbps => number * M,
            RateToken::Gbps => number * G,
            RateToken::Value => bail!("Expecting to parse a unit (bps, kbps, ...)"),
        };

        ensure!(
            lex.next().is_none(),
            "Not expecting any other tokens to parse a rate"
        );

        Ok(Self::new(bps))
    }
}
