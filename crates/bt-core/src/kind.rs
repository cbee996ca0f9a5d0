//! Timestamp kinds as the single source of truth for the four bodyfile times.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four timestamp roles a bodyfile record carries.
///
/// The declaration order is the fan-out order used by the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimestampKind {
    Access,
    Modification,
    Change,
    Creation,
}

impl TimestampKind {
    /// All kinds, in fan-out order.
    pub const ALL: [Self; 4] = [
        Self::Access,
        Self::Modification,
        Self::Change,
        Self::Creation,
    ];

    /// Bit used for this kind in a [`KindMask`].
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::Access => 1,
            Self::Modification => 1 << 1,
            Self::Change => 1 << 2,
            Self::Creation => 1 << 3,
        }
    }

    /// Letter used in MACB notation (`m`, `a`, `c`, `b`).
    #[must_use]
    pub const fn macb_letter(self) -> char {
        match self {
            Self::Access => 'a',
            Self::Modification => 'm',
            Self::Change => 'c',
            Self::Creation => 'b',
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Modification => "modification",
            Self::Change => "change",
            Self::Creation => "creation",
        }
    }
}

impl fmt::Display for TimestampKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimestampKind {
    type Err = UnknownTimestampKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" | "atime" | "a" => Ok(Self::Access),
            "modification" | "mtime" | "m" => Ok(Self::Modification),
            "change" | "ctime" | "c" => Ok(Self::Change),
            "creation" | "crtime" | "birth" | "b" => Ok(Self::Creation),
            _ => Err(UnknownTimestampKind(s.to_string())),
        }
    }
}

impl Serialize for TimestampKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TimestampKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown timestamp kind strings.
#[derive(Debug, Clone)]
pub struct UnknownTimestampKind(String);

impl fmt::Display for UnknownTimestampKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown timestamp kind: {}", self.0)
    }
}

impl std::error::Error for UnknownTimestampKind {}

/// Set of timestamp kinds that satisfied a filter.
///
/// An empty mask means either that no filter was installed or that none of
/// the record's timestamps matched it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KindMask(u8);

impl KindMask {
    pub const EMPTY: Self = Self(0);

    #[must_use]
    pub const fn contains(self, kind: TimestampKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub const fn insert(&mut self, kind: TimestampKind) {
        self.0 |= kind.bit();
    }

    #[must_use]
    pub const fn with(mut self, kind: TimestampKind) -> Self {
        self.insert(kind);
        self
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Iterates the kinds present in the mask, in fan-out order.
    pub fn kinds(self) -> impl Iterator<Item = TimestampKind> {
        TimestampKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

impl FromIterator<TimestampKind> for KindMask {
    fn from_iter<I: IntoIterator<Item = TimestampKind>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_variants() {
        for kind in TimestampKind::ALL {
            let s = kind.to_string();
            let parsed: TimestampKind = s.parse().expect("should parse");
            assert_eq!(parsed, kind, "roundtrip failed for {kind:?}");
        }
    }

    #[test]
    fn short_aliases_parse() {
        assert_eq!(
            "crtime".parse::<TimestampKind>().unwrap(),
            TimestampKind::Creation
        );
        assert_eq!(
            "m".parse::<TimestampKind>().unwrap(),
            TimestampKind::Modification
        );
    }

    #[test]
    fn unknown_kind_errors() {
        let err = "mtime2".parse::<TimestampKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown timestamp kind: mtime2");
    }

    #[test]
    fn bits_are_distinct() {
        let all: KindMask = TimestampKind::ALL.into_iter().collect();
        assert_eq!(all.bits(), 0b1111);
    }

    #[test]
    fn mask_tracks_inserted_kinds() {
        let mut mask = KindMask::EMPTY;
        assert!(mask.is_empty());

        mask.insert(TimestampKind::Change);
        assert!(mask.contains(TimestampKind::Change));
        assert!(!mask.contains(TimestampKind::Access));
        assert_eq!(mask.kinds().collect::<Vec<_>>(), [TimestampKind::Change]);
    }

    #[test]
    fn mask_serializes_as_bits() {
        let mask = KindMask::EMPTY
            .with(TimestampKind::Access)
            .with(TimestampKind::Creation);
        assert_eq!(serde_json::to_string(&mask).unwrap(), "9");
    }
}
