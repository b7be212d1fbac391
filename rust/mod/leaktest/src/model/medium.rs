use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Test medium code as printed on the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Medium {
    #[serde(rename = "OL")]
    Ol,
    #[serde(rename = "PO")]
    Po,
    #[serde(rename = "WO")]
    Wo,
    #[serde(rename = "SP")]
    Sp,
}

impl Medium {
    pub const ALL: [Medium; 4] = [Medium::Ol, Medium::Po, Medium::Wo, Medium::Sp];

    pub fn code(self) -> &'static str {
        match self {
            Medium::Ol => "OL",
            Medium::Po => "PO",
            Medium::Wo => "WO",
            Medium::Sp => "SP",
        }
    }
}

impl fmt::Display for Medium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Medium {
    type Err = String;

    /// Accepts the two-letter code in any case, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Medium::ALL
            .into_iter()
            .find(|m| m.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| format!("unknown medium {:?}, expected one of OL, PO, WO, SP", code))
    }
}
