//! Key/value pairs and conflict resolution.
//!
//! A pair is one record owned by a storage operation. Wire layout:
//! `string key ‖ byte conflict ‖ time created ‖ date expires ‖
//! byteArrayArray values`. The cookie write time travels in the cookie
//! envelope, never in the pair payload itself.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use swift_core::codec::{CodecError, Reader, Writer, DATE_BASE};
use thiserror::Error;
use time::{Date, OffsetDateTime};

/// Errors raised while reading pairs or resolving conflicts.
#[derive(Debug, Error)]
pub enum PairError {
    /// Underlying codec failure.
    #[error("pair codec failure")]
    Codec(#[from] CodecError),

    /// The conflict byte was not a recognised policy.
    #[error("conflict byte '{0}' is not a valid policy")]
    InvalidConflict(u8),

    /// Two pairs clashed while the operation pair's flag was still the
    /// zero-initialised sentinel.
    #[error("conflict flag is not initialised")]
    UninitialisedConflict,
}

/// How two values for the same key are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Conflict {
    /// Sentinel for zero-initialised records. Never valid on the wire.
    #[default]
    Invalid = 0,
    /// The value with the earliest creation time wins.
    Oldest = 1,
    /// The value with the latest creation time wins.
    Newest = 2,
    /// Values are merged into a distinct list.
    Add = 3,
}

impl Conflict {
    /// Decodes the wire byte.
    pub fn from_byte(b: u8) -> Result<Self, PairError> {
        match b {
            0 => Ok(Conflict::Invalid),
            1 => Ok(Conflict::Oldest),
            2 => Ok(Conflict::Newest),
            3 => Ok(Conflict::Add),
            other => Err(PairError::InvalidConflict(other)),
        }
    }

    /// The policy name used in page models and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Conflict::Invalid => "invalid",
            Conflict::Oldest => "oldest",
            Conflict::Newest => "newest",
            Conflict::Add => "add",
        }
    }
}

/// One key/value record of a storage operation.
#[derive(Debug, Clone)]
pub struct Pair {
    /// Key, unique within an operation.
    pub key: String,
    /// Conflict policy applied when another copy of the key is found.
    pub conflict: Conflict,
    /// UTC instant the value was created.
    pub created: OffsetDateTime,
    /// UTC day after which the value expires.
    pub expires: Date,
    /// Ordered opaque values. Empty means the pair is a read probe.
    pub values: Vec<Vec<u8>>,
    /// When this node last committed the pair to a cookie. Transient:
    /// carried in the cookie envelope, not in the pair payload.
    pub cookie_write_time: OffsetDateTime,
}

impl Default for Pair {
    fn default() -> Self {
        Self {
            key: String::new(),
            conflict: Conflict::Invalid,
            created: OffsetDateTime::UNIX_EPOCH,
            expires: DATE_BASE,
            values: Vec::new(),
            cookie_write_time: OffsetDateTime::UNIX_EPOCH,
        }
    }
}

// Equality covers the wire fields only; the transient cookie write time is
// excluded so round-trip comparisons hold.
impl PartialEq for Pair {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.conflict == other.conflict
            && self.created == other.created
            && self.expires == other.expires
            && self.values == other.values
    }
}

impl Eq for Pair {}

impl Pair {
    /// Writes the pair's wire fields.
    pub fn write_to(&self, w: &mut Writer) -> Result<(), PairError> {
        w.write_string(&self.key)?;
        w.write_byte(self.conflict as u8);
        w.write_time(self.created)?;
        w.write_date(self.expires)?;
        w.write_byte_array_array(&self.values)?;
        Ok(())
    }

    /// Reads a pair's wire fields.
    pub fn read_from(r: &mut Reader<'_>) -> Result<Self, PairError> {
        let key = r.read_string()?;
        let conflict = Conflict::from_byte(r.read_byte()?)?;
        let created = r.read_time()?;
        let expires = r.read_date()?;
        let values = r.read_byte_array_array()?;
        Ok(Self {
            key,
            conflict,
            created,
            expires,
            values,
            cookie_write_time: OffsetDateTime::UNIX_EPOCH,
        })
    }

    /// True when the pair holds no values at all. A pair whose values are
    /// empty byte arrays is not empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True while the expiry day is still in the future.
    pub fn is_valid(&self) -> bool {
        self.expires > OffsetDateTime::now_utc().date()
    }

    /// True if the key and every value match byte for byte.
    pub fn same_value(&self, other: &Pair) -> bool {
        self.key == other.key && self.values == other.values
    }

    /// Renders the values as standard base64 joined by CRLF, the form page
    /// models and JSON consumers receive.
    pub fn value(&self) -> String {
        self.values
            .iter()
            .map(|v| STANDARD_NO_PAD.encode(v))
            .collect::<Vec<_>>()
            .join("\r\n")
    }
}

/// Distinct union of the values in both pairs, `o`'s values first.
/// Assumes `o` itself holds no duplicates.
pub fn merge_values(o: &Pair, c: &Pair) -> Vec<Vec<u8>> {
    let mut v: Vec<Vec<u8>> = Vec::with_capacity(o.values.len() + c.values.len());
    v.extend(o.values.iter().cloned());
    for a in &c.values {
        if !v.iter().any(|b| b == a) {
            v.push(a.clone());
        }
    }
    v
}

fn merge_pairs(o: &Pair, c: &Pair) -> Pair {
    if o.values == c.values {
        return c.clone();
    }
    Pair {
        key: o.key.clone(),
        conflict: Conflict::Add,
        created: OffsetDateTime::now_utc(),
        expires: o.expires.max(c.expires),
        values: merge_values(o, c),
        cookie_write_time: OffsetDateTime::UNIX_EPOCH,
    }
}

fn resolve_newest<'a>(o: &'a Pair, c: &'a Pair) -> &'a Pair {
    if o.created > c.created {
        return o;
    }
    if c.created > o.created {
        return c;
    }
    if o.cookie_write_time > c.cookie_write_time {
        return o;
    }
    c
}

fn resolve_oldest<'a>(o: &'a Pair, c: &'a Pair) -> &'a Pair {
    if o.created < c.created {
        return o;
    }
    if c.created < o.created {
        return c;
    }
    if o.cookie_write_time > c.cookie_write_time {
        return o;
    }
    c
}

/// Determines which pair to carry forward for a key.
///
/// `o` is the pair from the storage operation, `c` the pair stored in the
/// current node's cookie. The operation pair's policy governs.
pub fn resolve_conflict(o: Option<&Pair>, c: Option<&Pair>) -> Result<Pair, PairError> {
    match (o, c) {
        (None, None) => Ok(Pair::default()),
        (Some(o), None) => Ok(o.clone()),
        (None, Some(c)) => Ok(c.clone()),
        (Some(o), Some(c)) => match o.conflict {
            Conflict::Invalid => Err(PairError::UninitialisedConflict),
            Conflict::Newest => Ok(resolve_newest(o, c).clone()),
            Conflict::Oldest => Ok(resolve_oldest(o, c).clone()),
            Conflict::Add => Ok(merge_pairs(o, c)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn pair(key: &str, conflict: Conflict, created: OffsetDateTime, values: &[&[u8]]) -> Pair {
        Pair {
            key: key.to_owned(),
            conflict,
            created,
            expires: date!(2099 - 12 - 31),
            values: values.iter().map(|v| v.to_vec()).collect(),
            cookie_write_time: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn wire_roundtrip() {
        let p = pair(
            "email",
            Conflict::Newest,
            datetime!(2023-04-01 10:20:30.000000456 UTC),
            &[b"a@example.com", b""],
        );
        let mut w = Writer::new();
        p.write_to(&mut w).unwrap();

        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        let back = Pair::read_from(&mut r).unwrap();
        assert_eq!(back, p);
        assert_eq!(back.conflict, Conflict::Newest);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn invalid_conflict_byte_rejected() {
        let mut w = Writer::new();
        w.write_string("k").unwrap();
        w.write_byte(9);
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        assert!(matches!(
            Pair::read_from(&mut r),
            Err(PairError::InvalidConflict(9))
        ));
    }

    #[test]
    fn empty_means_no_values() {
        let t = datetime!(2023-01-01 0:00 UTC);
        assert!(pair("k", Conflict::Add, t, &[]).is_empty());
        // One empty byte array is still a value.
        assert!(!pair("k", Conflict::Add, t, &[b""]).is_empty());
    }

    #[test]
    fn resolve_nothing_yields_empty() {
        let p = resolve_conflict(None, None).unwrap();
        assert!(p.is_empty());
        assert_eq!(p.conflict, Conflict::Invalid);
    }

    #[test]
    fn resolve_single_sides() {
        let t = datetime!(2023-01-01 0:00 UTC);
        let o = pair("k", Conflict::Newest, t, &[b"o"]);
        let c = pair("k", Conflict::Newest, t, &[b"c"]);
        assert_eq!(resolve_conflict(Some(&o), None).unwrap(), o);
        assert_eq!(resolve_conflict(None, Some(&c)).unwrap(), c);
    }

    #[test]
    fn newest_wins_by_created() {
        let older = pair("k", Conflict::Newest, datetime!(2023-01-01 0:00 UTC), &[b"old"]);
        let newer = pair("k", Conflict::Newest, datetime!(2023-01-02 0:00 UTC), &[b"new"]);
        assert_eq!(
            resolve_conflict(Some(&older), Some(&newer)).unwrap().values,
            newer.values
        );
        assert_eq!(
            resolve_conflict(Some(&newer), Some(&older)).unwrap().values,
            newer.values
        );
    }

    #[test]
    fn oldest_wins_by_created() {
        let older = pair("k", Conflict::Oldest, datetime!(2023-01-01 0:00 UTC), &[b"old"]);
        let newer = pair("k", Conflict::Oldest, datetime!(2023-01-02 0:00 UTC), &[b"new"]);
        assert_eq!(
            resolve_conflict(Some(&older), Some(&newer)).unwrap().values,
            older.values
        );
    }

    #[test]
    fn created_tie_breaks_on_cookie_write_time() {
        let t = datetime!(2023-01-01 0:00 UTC);
        let mut a = pair("k", Conflict::Newest, t, &[b"a"]);
        let mut b = pair("k", Conflict::Newest, t, &[b"b"]);
        a.cookie_write_time = datetime!(2023-01-05 0:00 UTC);
        b.cookie_write_time = datetime!(2023-01-04 0:00 UTC);
        assert_eq!(
            resolve_conflict(Some(&a), Some(&b)).unwrap().values,
            a.values
        );
        // Later cookie write on the cookie side wins too.
        a.cookie_write_time = datetime!(2023-01-03 0:00 UTC);
        assert_eq!(
            resolve_conflict(Some(&a), Some(&b)).unwrap().values,
            b.values
        );
    }

    #[test]
    fn add_merges_distinct_union_operation_first() {
        let o = pair("k", Conflict::Add, datetime!(2023-01-01 0:00 UTC), &[b"1", b"2"]);
        let c = pair("k", Conflict::Add, datetime!(2023-01-02 0:00 UTC), &[b"2", b"3"]);
        let merged = resolve_conflict(Some(&o), Some(&c)).unwrap();
        assert_eq!(merged.conflict, Conflict::Add);
        assert_eq!(
            merged.values,
            vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]
        );
        assert_eq!(merged.expires, o.expires.max(c.expires));
        assert!(merged.created > o.created);
    }

    #[test]
    fn add_with_equal_values_keeps_cookie_pair() {
        let o = pair("k", Conflict::Add, datetime!(2023-01-01 0:00 UTC), &[b"1"]);
        let mut c = pair("k", Conflict::Add, datetime!(2023-01-02 0:00 UTC), &[b"1"]);
        c.cookie_write_time = datetime!(2023-01-03 0:00 UTC);
        let resolved = resolve_conflict(Some(&o), Some(&c)).unwrap();
        assert_eq!(resolved.created, c.created);
    }

    #[test]
    fn uninitialised_conflict_is_an_error() {
        let t = datetime!(2023-01-01 0:00 UTC);
        let o = pair("k", Conflict::Invalid, t, &[b"x"]);
        let c = pair("k", Conflict::Newest, t, &[b"y"]);
        assert!(matches!(
            resolve_conflict(Some(&o), Some(&c)),
            Err(PairError::UninitialisedConflict)
        ));
    }

    #[test]
    fn value_renders_base64_lines() {
        let t = datetime!(2023-01-01 0:00 UTC);
        let p = pair("k", Conflict::Add, t, &[b"hi", b"yo"]);
        assert_eq!(p.value(), "aGk\r\neW8");
    }
}
