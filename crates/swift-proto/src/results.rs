//! Results returned to the calling application.
//!
//! After the final hop the resolved pairs are packed into a results
//! payload, sealed by the access node and appended to the return URL.
//! Layout: `time expires ‖ string joined-state ‖ html ‖ byte pairCount ‖
//! (string key ‖ date created ‖ date expires ‖ byteArrayArray values)*`.

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use swift_core::codec::{CodecError, Reader, Writer};
use swift_core::STATE_SEPARATOR;
use thiserror::Error;
use time::{Date, OffsetDateTime};

use crate::html::Html;
use crate::operation::split_state;

/// Errors raised while encoding or decoding results.
#[derive(Debug, Error)]
pub enum ResultsError {
    /// Underlying codec failure.
    #[error("results codec failure")]
    Codec(#[from] CodecError),

    /// More pairs than the single count byte can express.
    #[error("{0} pairs exceed the 255 pair limit")]
    TooManyPairs(usize),

    /// The payload's expiry has passed.
    #[error("results expired and can no longer be used")]
    Expired,
}

/// One returned key/value record. Day granularity is enough for the
/// caller, so both instants travel as dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultPair {
    /// The pair's key.
    pub key: String,
    /// Day the value was created.
    #[serde(with = "date_serde")]
    pub created: Date,
    /// Day the value expires.
    #[serde(with = "date_serde")]
    pub expires: Date,
    /// The values, serialised as standard base64 strings.
    #[serde(serialize_with = "values_as_base64")]
    pub values: Vec<Vec<u8>>,
}

/// Sealed reply for one storage operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Results {
    /// Instant after which the payload must be rejected.
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
    /// Caller state carried through the bounce.
    pub state: Vec<String>,
    /// User-interface model the caller supplied.
    #[serde(skip)]
    pub html: Html,
    /// The resolved pairs.
    pub pairs: Vec<ResultPair>,
}

impl Results {
    /// True while the payload has not expired.
    pub fn is_time_stamp_valid(&self) -> bool {
        OffsetDateTime::now_utc() < self.expires
    }

    /// Returns the pair for the key, if present.
    pub fn get(&self, key: &str) -> Option<&ResultPair> {
        self.pairs.iter().find(|p| p.key == key)
    }

    /// Serialises the results payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ResultsError> {
        if self.pairs.len() > u8::MAX as usize {
            return Err(ResultsError::TooManyPairs(self.pairs.len()));
        }
        let mut w = Writer::new();
        w.write_time(self.expires)?;
        w.write_string(&self.state.join(STATE_SEPARATOR))?;
        self.html.write_to(&mut w)?;
        w.write_byte(self.pairs.len() as u8);
        for p in &self.pairs {
            w.write_string(&p.key)?;
            w.write_date(p.created)?;
            w.write_date(p.expires)?;
            w.write_byte_array_array(&p.values)?;
        }
        Ok(w.into_vec())
    }

    /// Rebuilds a results payload.
    pub fn from_bytes(d: &[u8]) -> Result<Self, ResultsError> {
        let mut r = Reader::new(d);
        let expires = r.read_time()?;
        let state = split_state(&r.read_string()?);
        let html = Html::read_from(&mut r)?;
        let count = r.read_byte()?;
        let mut pairs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            pairs.push(ResultPair {
                key: r.read_string()?,
                created: r.read_date()?,
                expires: r.read_date()?,
                values: r.read_byte_array_array()?,
            });
        }
        Ok(Self {
            expires,
            state,
            html,
            pairs,
        })
    }
}

fn values_as_base64<S: Serializer>(values: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
    use base64::engine::general_purpose::STANDARD_NO_PAD;
    use base64::Engine;
    let mut seq = s.serialize_seq(Some(values.len()))?;
    for v in values {
        seq.serialize_element(&STANDARD_NO_PAD.encode(v))?;
    }
    seq.end()
}

mod date_serde {
    use serde::Serializer;
    use time::format_description::well_known::Rfc3339;
    use time::{Date, OffsetDateTime, Time, UtcOffset};

    pub fn serialize<S: Serializer>(d: &Date, s: S) -> Result<S::Ok, S::Error> {
        let dt = OffsetDateTime::new_in_offset(*d, Time::MIDNIGHT, UtcOffset::UTC);
        s.serialize_str(&dt.format(&Rfc3339).map_err(serde::ser::Error::custom)?)
    }
}
