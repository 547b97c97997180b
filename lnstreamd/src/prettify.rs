//! Rewrites node and transport error messages for display.
//!
//! Internal status codes are stripped, monetary amounts are rewritten into the
//! user's denomination, and messages that mean the node connection is gone are
//! flagged so the caller can raise a force-logout.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Substrings that mean the node cannot be reached from this session
const FORCE_LOGOUT_MARKERS: [&str; 5] =
    ["unavailable", "connect failed", "node offline", "connection refused", "transport error"];

/// Display unit for amounts
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Denomination {
    #[default]
    #[serde(rename = "sat")]
    Sat,
    #[serde(rename = "mBTC")]
    MBtc,
    #[serde(rename = "BTC")]
    Btc,
}

impl Denomination {
    // number of decimal digits between a millisatoshi and one unit
    fn msat_decimals(&self) -> u32 {
        match self {
            Denomination::Sat => 3,
            Denomination::MBtc => 8,
            Denomination::Btc => 11,
        }
    }

    pub fn format_msat(&self, msat: u64) -> String {
        let scale = 10u64.pow(self.msat_decimals());
        let whole = msat / scale;
        let frac = msat % scale;
        if frac == 0 {
            return format!("{} {}", whole, self);
        }
        let digits = format!("{:0width$}", frac, width = self.msat_decimals() as usize);
        format!("{}.{} {}", whole, digits.trim_end_matches('0'), self)
    }

    pub fn format_sat(&self, sat: u64) -> String {
        self.format_msat(sat.saturating_mul(1000))
    }
}

impl fmt::Display for Denomination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Denomination::Sat => "sat",
            Denomination::MBtc => "mBTC",
            Denomination::Btc => "BTC",
        };
        f.write_str(s)
    }
}

impl FromStr for Denomination {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sat" | "sats" | "satoshi" => Ok(Denomination::Sat),
            "mbtc" => Ok(Denomination::MBtc),
            "btc" => Ok(Denomination::Btc),
            _ => Err(format!("unknown denomination: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prettified {
    pub message: String,
    pub force_logout: bool,
}

fn code_prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"^(?:rpc error: code = \w+ desc = |status: \w+, message: ",
            r"|\d+ [A-Z_]+: |Error: )+"
        ))
        .expect("static regex")
    })
}

fn amount_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(\d+)\s*(msat|millisatoshis|satoshis|satoshi|sats|sat)\b")
            .expect("static regex")
    })
}

/// True when the message indicates the node connection is unrecoverable
pub fn is_force_logout(message: &str) -> bool {
    let lower = message.to_lowercase();
    FORCE_LOGOUT_MARKERS.iter().any(|m| lower.contains(m))
}

pub fn prettify(message: &str, denomination: Denomination) -> Prettified {
    let force_logout = is_force_logout(message);
    let stripped = code_prefix_regex().replace(message.trim(), "");
    let converted = amount_regex().replace_all(&stripped, |caps: &regex::Captures| {
        let value: u64 = match caps[1].parse() {
            Ok(v) => v,
            Err(_) => return caps[0].to_string(),
        };
        let msat = if caps[2].to_lowercase().starts_with('m') {
            value
        } else {
            value.saturating_mul(1000)
        };
        denomination.format_msat(msat)
    });
    let mut chars = converted.chars();
    let message = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    Prettified { message, force_logout }
}
