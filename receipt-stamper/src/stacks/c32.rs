//! Crockford base32 ("c32") and the c32check encoding used by Stacks
//! addresses.

use sha2::{Digest, Sha256};
use thiserror::Error;

const C32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const CHECKSUM_LEN: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum C32Error {
    #[error("invalid c32 character {0:?}")]
    InvalidCharacter(char),
    #[error("c32check version {0} does not fit in one c32 digit")]
    InvalidVersion(u8),
    #[error("c32check string is too short")]
    TooShort,
    #[error("c32check checksum mismatch")]
    BadChecksum,
}

/// Encodes `data` as a big-endian number in base 32. Every leading zero
/// byte of the input becomes one leading `0` digit.
pub fn encode(data: &[u8]) -> String {
    let mut digits: Vec<u8> = Vec::with_capacity(data.len() * 8 / 5 + 1);
    let mut buffer: u32 = 0;
    let mut bits = 0;

    for byte in data.iter().rev() {
        buffer |= u32::from(*byte) << bits;
        bits += 8;
        while bits >= 5 {
            digits.push(C32_ALPHABET[(buffer & 0x1f) as usize]);
            buffer >>= 5;
            bits -= 5;
        }
    }
    if bits > 0 {
        digits.push(C32_ALPHABET[(buffer & 0x1f) as usize]);
    }

    // `digits` is least significant first here.
    while digits.last() == Some(&b'0') {
        digits.pop();
    }
    let leading_zero_bytes = data.iter().take_while(|byte| **byte == 0).count();
    digits.extend(std::iter::repeat(b'0').take(leading_zero_bytes));

    digits.iter().rev().map(|digit| char::from(*digit)).collect()
}

pub fn decode(input: &str) -> Result<Vec<u8>, C32Error> {
    let values = input
        .chars()
        .map(digit_value)
        .collect::<Result<Vec<u8>, _>>()?;

    let mut bytes = Vec::with_capacity(values.len() * 5 / 8 + 1);
    let mut buffer: u32 = 0;
    let mut bits = 0;

    for value in values.iter().rev() {
        buffer |= u32::from(*value) << bits;
        bits += 5;
        if bits >= 8 {
            bytes.push((buffer & 0xff) as u8);
            buffer >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 {
        bytes.push((buffer & 0xff) as u8);
    }

    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    let leading_zero_digits = values.iter().take_while(|value| **value == 0).count();
    bytes.extend(std::iter::repeat(0).take(leading_zero_digits));
    bytes.reverse();

    Ok(bytes)
}

/// `version` digit followed by c32 of `data ‖ checksum`.
pub fn check_encode(version: u8, data: &[u8]) -> Result<String, C32Error> {
    if version >= 32 {
        return Err(C32Error::InvalidVersion(version));
    }

    let mut payload = Vec::with_capacity(data.len() + CHECKSUM_LEN);
    payload.extend_from_slice(data);
    payload.extend_from_slice(&checksum(version, data));

    let mut encoded = String::with_capacity(payload.len() * 8 / 5 + 2);
    encoded.push(char::from(C32_ALPHABET[version as usize]));
    encoded.push_str(&encode(&payload));
    Ok(encoded)
}

pub fn check_decode(input: &str) -> Result<(u8, Vec<u8>), C32Error> {
    let mut chars = input.chars();
    let version = chars.next().map(digit_value).ok_or(C32Error::TooShort)??;

    let mut payload = decode(chars.as_str())?;
    if payload.len() < CHECKSUM_LEN {
        return Err(C32Error::TooShort);
    }
    let expected = payload.split_off(payload.len() - CHECKSUM_LEN);
    if checksum(version, &payload)[..] != expected[..] {
        return Err(C32Error::BadChecksum);
    }

    Ok((version, payload))
}

fn checksum(version: u8, data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Sha256::new();
    hasher.update([version]);
    hasher.update(data);
    let second = Sha256::digest(hasher.finalize());

    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&second[..CHECKSUM_LEN]);
    out
}

fn digit_value(c: char) -> Result<u8, C32Error> {
    let normalized = match c.to_ascii_uppercase() {
        'O' => '0',
        'I' | 'L' => '1',
        other => other,
    };
    C32_ALPHABET
        .iter()
        .position(|digit| char::from(*digit) == normalized)
        .map(|position| position as u8)
        .ok_or(C32Error::InvalidCharacter(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "a46ff88886c2ef9762d970b4d2c63678835bd39d";

    #[test]
    fn encodes_known_vector() {
        let data = hex::decode(HASH).unwrap();

        assert_eq!(encode(&data), "MHQZH246RBQSERPSE2TD5HHPF21NQMWX");
        assert_eq!(
            check_encode(22, &data).unwrap(),
            "P2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7"
        );
    }

    #[test]
    fn leading_zero_bytes_survive_a_round_trip() {
        let data = [0u8, 0, 1, 0x80, 0];

        let encoded = encode(&data);

        assert!(encoded.starts_with("00"));
        assert_eq!(decode(&encoded).unwrap(), data);
    }

    #[test]
    fn check_decode_rejects_a_corrupted_digit() {
        let data = hex::decode(HASH).unwrap();
        let mut encoded = check_encode(22, &data).unwrap();
        encoded.replace_range(5..6, if &encoded[5..6] == "A" { "B" } else { "A" });

        assert_eq!(check_decode(&encoded), Err(C32Error::BadChecksum));
    }

    #[test]
    fn decode_accepts_lowercase_and_ambiguous_letters() {
        assert_eq!(decode("o1").unwrap(), decode("01").unwrap());
        assert_eq!(decode("l").unwrap(), decode("1").unwrap());
        assert_eq!(decode("u"), Err(C32Error::InvalidCharacter('u')));
    }

    #[test]
    fn version_must_fit_in_one_digit() {
        assert_eq!(check_encode(32, &[1]), Err(C32Error::InvalidVersion(32)));
    }
}
