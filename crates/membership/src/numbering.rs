//! Year-prefixed sequence numbers for requests and members.
//!
//! Both identifiers follow the `PREFIX<year>-<seq>` convention: request
//! numbers read `REQ-2025-001`, member numbers `M2025-001`. Sequences restart
//! at 1 each calendar year, are zero-padded to three digits and keep growing
//! past 999 without padding. Allocation (max-per-year + 1) is the store's
//! job — these types only carry the format. Every construction path,
//! including deserialization, goes through the same validation.

use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use medlem_core::DomainError;

macro_rules! year_seq_number {
    ($t:ident, $prefix:literal, $fmt:literal, $what:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $t {
            value: String,
            year: i32,
            seq: u32,
        }

        impl $t {
            pub fn new(year: i32, seq: u32) -> Self {
                Self {
                    value: format!($fmt, year, seq),
                    year,
                    seq,
                }
            }

            pub fn year(&self) -> i32 {
                self.year
            }

            pub fn seq(&self) -> u32 {
                self.seq
            }

            pub fn as_str(&self) -> &str {
                &self.value
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.value)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let (year, seq) = parse_year_seq(s, $prefix, $what)?;
                Ok(Self::new(year, seq))
            }
        }

        impl Serialize for $t {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.value)
            }
        }

        impl<'de> Deserialize<'de> for $t {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

// `REQ-<year>-<seq>` identifier of a membership request;
// `M<year>-<seq>` identifier of an association member.
year_seq_number!(RequestNumber, "REQ-", "REQ-{}-{:03}", "request number");
year_seq_number!(MemberNumber, "M", "M{}-{:03}", "member number");

fn parse_year_seq(s: &str, prefix: &str, what: &str) -> Result<(i32, u32), DomainError> {
    let rest = s
        .strip_prefix(prefix)
        .ok_or_else(|| DomainError::invalid_id(format!("{what} must start with '{prefix}'")))?;
    let (year, seq) = rest
        .split_once('-')
        .ok_or_else(|| DomainError::invalid_id(format!("{what} is missing the '-' separator")))?;
    let year: i32 = year
        .parse()
        .map_err(|_| DomainError::invalid_id(format!("{what} has a non-numeric year")))?;
    if seq.len() < 3 {
        return Err(DomainError::invalid_id(format!(
            "{what} sequence must be at least 3 digits"
        )));
    }
    let seq: u32 = seq
        .parse()
        .map_err(|_| DomainError::invalid_id(format!("{what} has a non-numeric sequence")))?;
    if seq == 0 {
        return Err(DomainError::invalid_id(format!("{what} sequence starts at 1")));
    }
    Ok((year, seq))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_numbers_are_zero_padded() {
        assert_eq!(RequestNumber::new(2025, 1).as_str(), "REQ-2025-001");
        assert_eq!(RequestNumber::new(2025, 42).as_str(), "REQ-2025-042");
        assert_eq!(RequestNumber::new(2025, 1234).as_str(), "REQ-2025-1234");
    }

    #[test]
    fn member_numbers_are_zero_padded() {
        assert_eq!(MemberNumber::new(2025, 7).as_str(), "M2025-007");
        assert_eq!(MemberNumber::new(2026, 1000).as_str(), "M2026-1000");
    }

    #[test]
    fn parse_round_trips() {
        let n: RequestNumber = "REQ-2025-017".parse().unwrap();
        assert_eq!(n.year(), 2025);
        assert_eq!(n.seq(), 17);

        let m: MemberNumber = "M2024-311".parse().unwrap();
        assert_eq!(m.year(), 2024);
        assert_eq!(m.seq(), 311);
    }

    #[test]
    fn rejects_malformed_numbers() {
        for bad in [
            "REQ-2025",
            "REQ-abcd-001",
            "REQ-2025-01",
            "REQ-2025-000",
            "M-2025-001",
            "2025-001",
        ] {
            assert!(bad.parse::<RequestNumber>().is_err(), "{bad:?}");
        }
        assert!("REQ2025-001".parse::<MemberNumber>().is_err());
    }

    #[test]
    fn deserialization_validates() {
        let ok: RequestNumber = serde_json::from_str("\"REQ-2025-003\"").unwrap();
        assert_eq!(ok.seq(), 3);
        assert!(serde_json::from_str::<RequestNumber>("\"garbage\"").is_err());

        let json = serde_json::to_string(&MemberNumber::new(2025, 5)).unwrap();
        assert_eq!(json, "\"M2025-005\"");
    }
}
