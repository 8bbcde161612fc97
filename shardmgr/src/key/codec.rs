//! Canonical big-endian byte encoding for each [`super::ShardKeyType`].
//!
//! Every encoder preserves natural ordering in byte-lex order (spec.md §4.A
//! invariant). Signed integers and the time-based kinds use the classic
//! "flip the sign bit" bias so two's-complement negative numbers still sort
//! before positive ones byte-lexically.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use uuid::Uuid;

pub fn encode_i32(value: i32) -> Vec<u8> {
    ((value as u32) ^ 0x8000_0000).to_be_bytes().to_vec()
}

pub fn decode_i32(bytes: &[u8]) -> i32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    (u32::from_be_bytes(buf) ^ 0x8000_0000) as i32
}

pub fn encode_i64(value: i64) -> Vec<u8> {
    ((value as u64) ^ 0x8000_0000_0000_0000)
        .to_be_bytes()
        .to_vec()
}

pub fn decode_i64(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    (u64::from_be_bytes(buf) ^ 0x8000_0000_0000_0000) as i64
}

/// GUIDs encode as their 16 raw bytes: `Uuid`'s big-endian byte layout
/// already sorts the same way SQL Server / Postgres compare UUIDs
/// byte-for-byte, so no bias is required.
pub fn encode_guid(value: Uuid) -> Vec<u8> {
    value.as_bytes().to_vec()
}

pub fn decode_guid(bytes: &[u8]) -> Uuid {
    let mut buf = [0u8; 16];
    buf.copy_from_slice(bytes);
    Uuid::from_bytes(buf)
}

/// Raw bytes encode as themselves; byte-lex order is the natural order for
/// a byte string.
pub fn encode_bytes(value: &[u8]) -> Vec<u8> {
    value.to_vec()
}

pub fn decode_bytes(bytes: &[u8]) -> Vec<u8> {
    bytes.to_vec()
}

/// Ticks (100ns units, matching the .NET epoch the original store uses)
/// since `0001-01-01T00:00:00Z`.
fn ticks_epoch() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("0001-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
}

fn ticks_from_naive(value: NaiveDateTime) -> i64 {
    let delta = value.signed_duration_since(ticks_epoch());
    delta.num_seconds() * 10_000_000 + (delta.subsec_nanos() as i64) / 100
}

fn naive_from_ticks(ticks: i64) -> NaiveDateTime {
    let seconds = ticks.div_euclid(10_000_000);
    let remainder_ticks = ticks.rem_euclid(10_000_000);
    ticks_epoch() + chrono::Duration::seconds(seconds) + chrono::Duration::nanoseconds(remainder_ticks * 100)
}

pub fn encode_datetime(value: NaiveDateTime) -> Vec<u8> {
    encode_i64(ticks_from_naive(value))
}

pub fn decode_datetime(bytes: &[u8]) -> NaiveDateTime {
    naive_from_ticks(decode_i64(bytes))
}

pub fn encode_datetime_offset(value: DateTime<FixedOffset>) -> Vec<u8> {
    encode_i64(ticks_from_naive(value.with_timezone(&Utc).naive_utc()))
}

pub fn decode_datetime_offset(bytes: &[u8]) -> DateTime<FixedOffset> {
    let naive = naive_from_ticks(decode_i64(bytes));
    Utc.from_utc_datetime(&naive).with_timezone(&FixedOffset::east_opt(0).unwrap())
}

pub fn encode_timespan(value: chrono::Duration) -> Vec<u8> {
    let ticks = value.num_seconds() * 10_000_000 + (value.num_nanoseconds().unwrap_or(0) % 1_000_000_000) / 100;
    encode_i64(ticks)
}

pub fn decode_timespan(bytes: &[u8]) -> chrono::Duration {
    let ticks = decode_i64(bytes);
    chrono::Duration::seconds(ticks / 10_000_000)
        + chrono::Duration::nanoseconds((ticks % 10_000_000) * 100)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_i32_roundtrip_and_order() {
        let values = [i32::MIN, -100, -1, 0, 1, 100, i32::MAX];
        let mut encoded: Vec<_> = values.iter().map(|v| encode_i32(*v)).collect();
        for (v, e) in values.iter().zip(encoded.iter()) {
            assert_eq!(decode_i32(e), *v);
        }
        let sorted_values = {
            let mut v = values.to_vec();
            v.sort();
            v
        };
        encoded.sort();
        let decoded: Vec<_> = encoded.iter().map(|e| decode_i32(e)).collect();
        assert_eq!(decoded, sorted_values);
    }

    #[test]
    fn test_i64_roundtrip_and_order() {
        let values = [i64::MIN, -1, 0, 1, i64::MAX];
        for v in values {
            assert_eq!(decode_i64(&encode_i64(v)), v);
        }
        assert!(encode_i64(-1) < encode_i64(0));
        assert!(encode_i64(0) < encode_i64(1));
        assert!(encode_i64(i64::MIN) < encode_i64(i64::MAX));
    }

    #[test]
    fn test_guid_roundtrip() {
        let id = Uuid::new_v4();
        assert_eq!(decode_guid(&encode_guid(id)), id);
    }

    #[test]
    fn test_bytes_roundtrip_and_order() {
        assert!(encode_bytes(b"a") < encode_bytes(b"b"));
        assert_eq!(decode_bytes(&encode_bytes(b"hello")), b"hello");
    }

    #[test]
    fn test_datetime_roundtrip() {
        let dt = NaiveDateTime::parse_from_str("2024-06-15 12:30:45", "%Y-%m-%d %H:%M:%S").unwrap();
        let encoded = encode_datetime(dt);
        assert_eq!(decode_datetime(&encoded), dt);
    }

    #[test]
    fn test_datetime_order() {
        let earlier = NaiveDateTime::parse_from_str("2020-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let later = NaiveDateTime::parse_from_str("2024-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert!(encode_datetime(earlier) < encode_datetime(later));
    }

    #[test]
    fn test_timespan_roundtrip() {
        let span = chrono::Duration::seconds(3661);
        assert_eq!(decode_timespan(&encode_timespan(span)), span);
    }
}
