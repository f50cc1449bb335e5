//! Character record type and its binary codec.
//!
//! Record layout (all integers little-endian):
//!
//! ```text
//! +--------+----------+-------------+----------+-------------+-------+
//! | id     | name_len | name        | sur_len  | surname     | age   |
//! | 4 bytes| 2 bytes  | name_len    | 2 bytes  | sur_len     | 1 byte|
//! +--------+----------+-------------+----------+-------------+-------+
//! | img_len | image   | bio_len | bio     |
//! | 2 bytes | img_len | 2 bytes | bio_len |
//! +---------+---------+---------+---------+
//! ```
//!
//! The image field pair is only present in [`Layout::Portrait`]. Lists are
//! records concatenated back-to-back with no count prefix.

use crate::error::ProtocolError;
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder bio given to records created without one.
pub const DEFAULT_BIO: &str = "no bio yet";

/// Maximum length of a length-prefixed field.
pub const MAX_FIELD_LEN: usize = u16::MAX as usize;

/// Wire layout revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Original layout without portraits.
    Classic,
    /// Layout with a length-prefixed image between `age` and `bio`.
    #[default]
    Portrait,
}

impl Layout {
    pub fn has_image(self) -> bool {
        matches!(self, Layout::Portrait)
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Classic => write!(f, "classic"),
            Layout::Portrait => write!(f, "portrait"),
        }
    }
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "classic" => Ok(Layout::Classic),
            "portrait" => Ok(Layout::Portrait),
            other => Err(format!(
                "unknown layout '{}' (expected 'classic' or 'portrait')",
                other
            )),
        }
    }
}

/// A character record exchanged with the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRecord {
    /// Server-assigned id; 0 until the server allocates one.
    pub id: i32,
    pub name: String,
    pub surname: String,
    pub age: u8,
    pub bio: String,
    /// Portrait bytes. Empty when absent or when the layout has no image.
    #[serde(default, with = "image_hex", skip_serializing_if = "Vec::is_empty")]
    pub image: Vec<u8>,
}

impl CharacterRecord {
    /// Creates an unsaved record with the placeholder bio and no image.
    pub fn new(name: impl Into<String>, surname: impl Into<String>, age: u8) -> Self {
        Self {
            id: 0,
            name: name.into(),
            surname: surname.into(),
            age,
            bio: DEFAULT_BIO.to_string(),
            image: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: i32) -> Self {
        self.id = id;
        self
    }

    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = bio.into();
        self
    }

    pub fn with_image(mut self, image: impl Into<Vec<u8>>) -> Self {
        self.image = image.into();
        self
    }

    /// Returns whether the server has assigned an id.
    pub fn is_assigned(&self) -> bool {
        self.id > 0
    }

    /// Number of bytes this record occupies on the wire.
    pub fn encoded_len(&self, layout: Layout) -> usize {
        let image = if layout.has_image() {
            2 + self.image.len()
        } else {
            0
        };
        4 + 2 + self.name.len() + 2 + self.surname.len() + 1 + image + 2 + self.bio.len()
    }

    /// Encodes the record into a new buffer.
    pub fn encode(&self, layout: Layout) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::with_capacity(self.encoded_len(layout));
        self.encode_into(&mut buf, layout)?;
        Ok(buf)
    }

    /// Appends the encoded record to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut, layout: Layout) -> Result<(), ProtocolError> {
        // Validate every field before writing so a failure leaves `buf` untouched.
        check_len("name", self.name.len())?;
        check_len("surname", self.surname.len())?;
        check_len("bio", self.bio.len())?;
        if layout.has_image() {
            check_len("image", self.image.len())?;
        }

        buf.reserve(self.encoded_len(layout));
        buf.put_i32_le(self.id);
        put_field(buf, self.name.as_bytes());
        put_field(buf, self.surname.as_bytes());
        buf.put_u8(self.age);
        if layout.has_image() {
            put_field(buf, &self.image);
        }
        put_field(buf, self.bio.as_bytes());
        Ok(())
    }

    /// Decodes exactly one record. Extra bytes after the record are an error.
    pub fn decode(data: &[u8], layout: Layout) -> Result<Self, ProtocolError> {
        let (record, consumed) = Self::decode_prefix(data, layout)?;
        if consumed != data.len() {
            return Err(ProtocolError::TrailingBytes {
                offset: consumed,
                len: data.len(),
            });
        }
        Ok(record)
    }

    /// Decodes one record from the start of `data`, returning it together with
    /// the number of bytes consumed.
    pub fn decode_prefix(data: &[u8], layout: Layout) -> Result<(Self, usize), ProtocolError> {
        let mut reader = FieldReader::new(data);

        let id = i32::from_le_bytes(reader.array("id")?);
        let name = reader.text("name")?;
        let surname = reader.text("surname")?;
        let [age] = reader.array::<1>("age")?;
        let image = if layout.has_image() {
            reader.field("image")?.to_vec()
        } else {
            Vec::new()
        };
        let bio = reader.text("bio")?;

        Ok((
            Self {
                id,
                name,
                surname,
                age,
                bio,
                image,
            },
            reader.pos,
        ))
    }
}

/// Encodes records back-to-back.
pub fn encode_list(records: &[CharacterRecord], layout: Layout) -> Result<BytesMut, ProtocolError> {
    let total = records.iter().map(|r| r.encoded_len(layout)).sum();
    let mut buf = BytesMut::with_capacity(total);
    for record in records {
        record.encode_into(&mut buf, layout)?;
    }
    Ok(buf)
}

/// Decodes back-to-back records until the buffer is exhausted.
///
/// A trailing partial record fails the whole decode; nothing is truncated.
pub fn decode_list(data: &[u8], layout: Layout) -> Result<Vec<CharacterRecord>, ProtocolError> {
    let mut records = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        let (record, consumed) =
            CharacterRecord::decode_prefix(&data[offset..], layout).map_err(|e| {
                ProtocolError::MalformedRecord {
                    field: "record",
                    detail: format!("record {} at offset {}: {}", records.len(), offset, e),
                }
            })?;
        records.push(record);
        offset += consumed;
    }

    Ok(records)
}

fn check_len(field: &'static str, len: usize) -> Result<(), ProtocolError> {
    if len > MAX_FIELD_LEN {
        return Err(ProtocolError::FieldTooLong {
            field,
            len,
            max: MAX_FIELD_LEN,
        });
    }
    Ok(())
}

fn put_field(buf: &mut BytesMut, value: &[u8]) {
    buf.put_u16_le(value.len() as u16);
    buf.put_slice(value);
}

/// Bounds-checked cursor over a record buffer.
struct FieldReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, field: &'static str, n: usize) -> Result<&'a [u8], ProtocolError> {
        let available = self.data.len() - self.pos;
        if n > available {
            return Err(ProtocolError::short(field, n, available));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(field, N)?);
        Ok(out)
    }

    fn field(&mut self, field: &'static str) -> Result<&'a [u8], ProtocolError> {
        let len = u16::from_le_bytes(self.array(field)?) as usize;
        self.take(field, len)
    }

    fn text(&mut self, field: &'static str) -> Result<String, ProtocolError> {
        let bytes = self.field(field)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| ProtocolError::MalformedRecord {
            field,
            detail: format!("invalid UTF-8: {}", e),
        })
    }
}

/// Serializes image bytes as a hex string.
mod image_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(image: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(image))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ann() -> CharacterRecord {
        CharacterRecord::new("Ann", "Lee", 30)
            .with_id(5)
            .with_bio("hi")
    }

    #[test]
    fn test_known_portrait_encoding() {
        let encoded = ann().encode(Layout::Portrait).unwrap();
        assert_eq!(encoded.len(), 21);
        assert_eq!(
            &encoded[..],
            &[
                0x05, 0x00, 0x00, 0x00, // id
                0x03, 0x00, b'A', b'n', b'n', // name
                0x03, 0x00, b'L', b'e', b'e', // surname
                30,   // age
                0x00, 0x00, // image
                0x02, 0x00, b'h', b'i', // bio
            ][..]
        );

        let decoded = CharacterRecord::decode(&encoded, Layout::Portrait).unwrap();
        assert_eq!(decoded, ann());
    }

    #[test]
    fn test_classic_layout_has_no_image() {
        let record = ann().with_image(vec![1, 2, 3]);
        let encoded = record.encode(Layout::Classic).unwrap();
        assert_eq!(encoded.len(), 19);

        let decoded = CharacterRecord::decode(&encoded, Layout::Classic).unwrap();
        assert!(decoded.image.is_empty());
        assert_eq!(decoded.bio, "hi");
    }

    #[test]
    fn test_encoded_len_matches() {
        let record = ann().with_image(vec![0xAB; 300]);
        for layout in [Layout::Classic, Layout::Portrait] {
            assert_eq!(
                record.encode(layout).unwrap().len(),
                record.encoded_len(layout)
            );
        }
    }

    #[test]
    fn test_negative_id_is_little_endian() {
        let record = ann().with_id(-2);
        let encoded = record.encode(Layout::Classic).unwrap();
        assert_eq!(&encoded[..4], &[0xFE, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_empty_fields() {
        let record = CharacterRecord {
            id: 0,
            name: String::new(),
            surname: String::new(),
            age: 0,
            bio: String::new(),
            image: Vec::new(),
        };
        let encoded = record.encode(Layout::Portrait).unwrap();
        assert_eq!(encoded.len(), 4 + 2 + 2 + 1 + 2 + 2);
        assert_eq!(
            CharacterRecord::decode(&encoded, Layout::Portrait).unwrap(),
            record
        );
    }

    #[test]
    fn test_decode_short_input() {
        let encoded = ann().encode(Layout::Portrait).unwrap();
        for cut in 0..encoded.len() {
            let result = CharacterRecord::decode(&encoded[..cut], Layout::Portrait);
            assert!(
                matches!(result, Err(ProtocolError::MalformedRecord { .. })),
                "cut at {} should be malformed",
                cut
            );
        }
    }

    #[test]
    fn test_decode_reports_field() {
        // id + name length claiming 10 bytes with only 2 present
        let data = [5, 0, 0, 0, 10, 0, b'A', b'n'];
        match CharacterRecord::decode(&data, Layout::Portrait) {
            Err(ProtocolError::MalformedRecord { field, .. }) => assert_eq!(field, "name"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let data = [1, 0, 0, 0, 1, 0, 0xFF, 0, 0, 9, 0, 0, 0, 0];
        let result = CharacterRecord::decode(&data, Layout::Portrait);
        assert!(matches!(
            result,
            Err(ProtocolError::MalformedRecord { field: "name", .. })
        ));
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut encoded = ann().encode(Layout::Portrait).unwrap();
        encoded.put_u8(0);
        let result = CharacterRecord::decode(&encoded, Layout::Portrait);
        assert!(matches!(
            result,
            Err(ProtocolError::TrailingBytes { offset: 21, len: 22 })
        ));
    }

    #[test]
    fn test_field_too_long() {
        let record = ann().with_bio("x".repeat(MAX_FIELD_LEN + 1));
        let mut buf = BytesMut::new();
        let result = record.encode_into(&mut buf, Layout::Portrait);
        assert!(matches!(
            result,
            Err(ProtocolError::FieldTooLong { field: "bio", .. })
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_oversized_image_ignored_by_classic() {
        let record = ann().with_image(vec![0; MAX_FIELD_LEN + 1]);
        assert!(record.encode(Layout::Classic).is_ok());
        assert!(record.encode(Layout::Portrait).is_err());
    }

    #[test]
    fn test_list_empty() {
        let encoded = encode_list(&[], Layout::Portrait).unwrap();
        assert!(encoded.is_empty());
        assert!(decode_list(&encoded, Layout::Portrait).unwrap().is_empty());
    }

    #[test]
    fn test_list_trailing_partial_record() {
        let records = vec![ann(), ann().with_id(6)];
        let encoded = encode_list(&records, Layout::Portrait).unwrap();
        let truncated = &encoded[..encoded.len() - 1];

        match decode_list(truncated, Layout::Portrait) {
            Err(ProtocolError::MalformedRecord { detail, .. }) => {
                assert!(detail.contains("record 1 at offset 21"), "{}", detail);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_list_layout_mismatch_is_detected() {
        let records = vec![ann(), ann().with_id(6)];
        let encoded = encode_list(&records, Layout::Classic).unwrap();
        assert!(decode_list(&encoded, Layout::Portrait).is_err());
    }

    #[test]
    fn test_new_record_defaults() {
        let record = CharacterRecord::new("Bob", "Smith", 40);
        assert_eq!(record.id, 0);
        assert!(!record.is_assigned());
        assert_eq!(record.bio, DEFAULT_BIO);
        assert!(record.image.is_empty());
        assert!(record.with_id(3).is_assigned());
    }

    #[test]
    fn test_layout_parse() {
        assert_eq!("classic".parse::<Layout>().unwrap(), Layout::Classic);
        assert_eq!("Portrait".parse::<Layout>().unwrap(), Layout::Portrait);
        assert!("round".parse::<Layout>().is_err());
        assert_eq!(Layout::default(), Layout::Portrait);
        assert_eq!(Layout::Classic.to_string(), "classic");
    }

    #[test]
    fn test_record_json_image_as_hex() {
        let record = ann().with_image(vec![0xDE, 0xAD]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["image"], "dead");

        let parsed: CharacterRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);

        let json = serde_json::to_value(ann()).unwrap();
        assert!(json.get("image").is_none());
    }

    fn arb_record() -> impl Strategy<Value = CharacterRecord> {
        (
            any::<i32>(),
            ".{0,24}",
            ".{0,24}",
            any::<u8>(),
            ".{0,64}",
            proptest::collection::vec(any::<u8>(), 0..128),
        )
            .prop_map(|(id, name, surname, age, bio, image)| CharacterRecord {
                id,
                name,
                surname,
                age,
                bio,
                image,
            })
    }

    proptest! {
        #[test]
        fn prop_record_roundtrip(record in arb_record()) {
            let encoded = record.encode(Layout::Portrait).unwrap();
            prop_assert_eq!(encoded.len(), record.encoded_len(Layout::Portrait));
            let decoded = CharacterRecord::decode(&encoded, Layout::Portrait).unwrap();
            prop_assert_eq!(decoded, record);
        }

        #[test]
        fn prop_list_roundtrip(records in proptest::collection::vec(arb_record(), 0..8)) {
            let encoded = encode_list(&records, Layout::Portrait).unwrap();
            let decoded = decode_list(&encoded, Layout::Portrait).unwrap();
            prop_assert_eq!(decoded, records);
        }
    }
}
