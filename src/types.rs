//! Wire-level primitive types shared by every packet: protocol version,
//! packet identifiers, QoS, topic name/filter, and the byte-buffer newtype
//! used once a field has been reduced to its binary form.

use std::convert::TryFrom;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use crate::error::Error;

pub const LEVEL_SEP: char = '/';
pub const MATCH_ONE_CHAR: char = '+';
pub const MATCH_ALL_CHAR: char = '#';
pub const SYS_PREFIX: &str = "$SYS/";
pub const SHARED_PREFIX: &str = "$share/";

/// MQTT protocol version negotiated on Connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    V311,
    V500,
}

impl Version {
    pub fn level(self) -> u8 {
        match self {
            Version::V311 => 4,
            Version::V500 => 5,
        }
    }

    pub fn from_level(level: u8) -> Result<Self, Error> {
        match level {
            4 => Ok(Version::V311),
            5 => Ok(Version::V500),
            n => Err(Error::InvalidProtocolLevel(n)),
        }
    }

    pub fn is_v5(self) -> bool {
        matches!(self, Version::V500)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::V311 => write!(f, "v3.1.1"),
            Version::V500 => write!(f, "v5.0"),
        }
    }
}

/// MQTT packet identifier. Always non-zero on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(u16);

impl Pid {
    pub fn value(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for Pid {
    type Error = Error;
    fn try_from(value: u16) -> Result<Self, Error> {
        if value == 0 {
            Err(Error::ZeroPid)
        } else {
            Ok(Pid(value))
        }
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Packet delivery quality of service.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QoS {
    Level0 = 0,
    Level1 = 1,
    Level2 = 2,
}

impl QoS {
    pub fn from_u8(byte: u8) -> Result<QoS, Error> {
        match byte {
            0 => Ok(QoS::Level0),
            1 => Ok(QoS::Level1),
            2 => Ok(QoS::Level2),
            n => Err(Error::InvalidQos(n)),
        }
    }
}

/// A topic name as used in a Publish packet: no wildcards, no null byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicName(Arc<str>);

impl TopicName {
    pub fn is_invalid(value: &str) -> bool {
        if value.len() > u16::MAX as usize {
            return true;
        }
        value.contains([MATCH_ONE_CHAR, MATCH_ALL_CHAR, '\0'])
    }

    pub fn is_shared(&self) -> bool {
        self.0.starts_with(SHARED_PREFIX)
    }

    pub fn is_sys(&self) -> bool {
        self.0.starts_with(SYS_PREFIX)
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for TopicName {
    type Error = Error;
    fn try_from(value: &str) -> Result<Self, Error> {
        if TopicName::is_invalid(value) {
            Err(Error::InvalidTopicName(value.into()))
        } else {
            Ok(TopicName(value.into()))
        }
    }
}

impl TryFrom<String> for TopicName {
    type Error = Error;
    fn try_from(value: String) -> Result<Self, Error> {
        TopicName::try_from(value.as_str())
    }
}

impl Deref for TopicName {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

/// A topic filter as used in Subscribe/Unsubscribe: wildcards allowed,
/// `$share/<group>/<filter>` shared-subscription syntax recognized.
#[derive(Debug, Clone)]
pub struct TopicFilter {
    inner: Arc<str>,
    shared_filter_sep: u16,
}

impl TopicFilter {
    /// Returns `(is_invalid, shared_filter_sep)`; `shared_filter_sep` is the
    /// byte index of the `/` separating `$share/<group>` from the filter.
    pub fn is_invalid(value: &str) -> (bool, u16) {
        if value.len() > u16::MAX as usize || value.is_empty() {
            return (true, 0);
        }
        const SHARED_PREFIX_CHARS: [char; 7] = ['$', 's', 'h', 'a', 'r', 'e', '/'];

        let mut last_sep: Option<usize> = None;
        let mut has_all = false;
        let mut has_one = false;
        let mut byte_idx = 0usize;
        let mut is_shared = true;
        let mut shared_group_sep = 0u16;
        let mut shared_filter_sep = 0u16;
        for (char_idx, c) in value.chars().enumerate() {
            if c == '\0' {
                return (true, 0);
            }
            if has_all {
                return (true, 0);
            }
            if is_shared && char_idx < 7 && c != SHARED_PREFIX_CHARS[char_idx] {
                is_shared = false;
            }
            if c == LEVEL_SEP {
                if is_shared {
                    if shared_group_sep == 0 {
                        shared_group_sep = byte_idx as u16;
                    } else if shared_filter_sep == 0 {
                        shared_filter_sep = byte_idx as u16;
                    }
                }
                if has_one && Some(char_idx) != last_sep.map(|v| v + 2) && char_idx != 1 {
                    return (true, 0);
                }
                last_sep = Some(char_idx);
                has_one = false;
            } else if c == MATCH_ALL_CHAR {
                if shared_group_sep > 0 && shared_filter_sep == 0 {
                    return (true, 0);
                }
                if has_one {
                    return (true, 0);
                } else if Some(char_idx) == last_sep.map(|v| v + 1) || char_idx == 0 {
                    has_all = true;
                } else {
                    return (true, 0);
                }
            } else if c == MATCH_ONE_CHAR {
                if shared_group_sep > 0 && shared_filter_sep == 0 {
                    return (true, 0);
                }
                if has_one {
                    return (true, 0);
                } else if Some(char_idx) == last_sep.map(|v| v + 1) || char_idx == 0 {
                    has_one = true;
                } else {
                    return (true, 0);
                }
            }
            byte_idx += c.len_utf8();
        }

        if shared_filter_sep > 0 && shared_filter_sep as usize == value.len() - 1 {
            return (true, 0);
        }
        if shared_group_sep > 0 && shared_filter_sep == 0 {
            return (true, 0);
        }
        if shared_group_sep + 1 == shared_filter_sep {
            return (true, 0);
        }
        (false, shared_filter_sep)
    }

    pub fn is_shared(&self) -> bool {
        self.shared_filter_sep > 0
    }

    pub fn is_sys(&self) -> bool {
        self.inner.starts_with(SYS_PREFIX)
    }

    pub fn has_wildcards(&self) -> bool {
        self.inner.contains([MATCH_ONE_CHAR, MATCH_ALL_CHAR])
    }

    pub fn shared_group_name(&self) -> Option<&str> {
        self.is_shared()
            .then(|| &self.inner[7..self.shared_filter_sep as usize])
    }

    pub fn shared_filter(&self) -> Option<&str> {
        self.is_shared()
            .then(|| &self.inner[self.shared_filter_sep as usize + 1..])
    }
}

impl Hash for TopicFilter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl PartialEq for TopicFilter {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}
impl Eq for TopicFilter {}

impl fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl TryFrom<&str> for TopicFilter {
    type Error = Error;
    fn try_from(value: &str) -> Result<Self, Error> {
        let (is_invalid, shared_filter_sep) = TopicFilter::is_invalid(value);
        if is_invalid {
            Err(Error::InvalidTopicFilter(value.into()))
        } else {
            Ok(TopicFilter {
                inner: value.into(),
                shared_filter_sep,
            })
        }
    }
}

impl TryFrom<String> for TopicFilter {
    type Error = Error;
    fn try_from(value: String) -> Result<Self, Error> {
        TopicFilter::try_from(value.as_str())
    }
}

impl Deref for TopicFilter {
    type Target = str;
    fn deref(&self) -> &str {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_rejects_zero() {
        assert!(Pid::try_from(0u16).is_err());
        assert_eq!(Pid::try_from(7u16).unwrap().value(), 7);
    }

    #[test]
    fn topic_name_wildcards_are_invalid() {
        assert!(TopicName::is_invalid("a/+"));
        assert!(TopicName::is_invalid("a/#"));
        assert!(!TopicName::is_invalid("a/b/c"));
    }

    #[test]
    fn topic_filter_shared_subscription() {
        let f = TopicFilter::try_from("$share/group/a/b").unwrap();
        assert!(f.is_shared());
        assert_eq!(f.shared_group_name(), Some("group"));
        assert_eq!(f.shared_filter(), Some("a/b"));
    }

    #[test]
    fn topic_filter_rejects_malformed_wildcards() {
        assert!(TopicFilter::try_from("a/b#").is_err());
        assert!(TopicFilter::try_from("a++").is_err());
        assert!(TopicFilter::try_from("").is_err());
    }
}
