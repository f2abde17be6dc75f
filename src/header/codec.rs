//! ASCII encoding of [`Header`] values.

use std::io::Write;

use uuid::Uuid;

use super::{Header, HeaderError, MAX_HEADER_LENGTH, PayloadType};

const TYPE_OFFSET: usize = 0;
const TYPE_DELIMITER_OFFSET: usize = 1;
const LENGTH_OFFSET: usize = 2;
const LENGTH_LENGTH: usize = 6;
const LENGTH_DELIMITER_OFFSET: usize = 8;
const ID_OFFSET: usize = 9;
const ID_LENGTH: usize = 36;
const ID_DELIMITER_OFFSET: usize = 45;
const END_OFFSET: usize = 46;
const TERMINATOR_OFFSET: usize = 47;

const DELIMITER: u8 = b'.';
const TERMINATOR: u8 = b'\n';

/// Encode `header` into `buffer`.
///
/// # Errors
///
/// Returns [`HeaderError::BufferSize`] if `buffer` is not exactly
/// [`MAX_HEADER_LENGTH`] bytes long, or [`HeaderError::LengthOutOfRange`] if
/// the length does not fit the six-digit field.
pub fn serialize(header: &Header, buffer: &mut [u8]) -> Result<(), HeaderError> {
    if buffer.len() != MAX_HEADER_LENGTH {
        return Err(HeaderError::BufferSize {
            expected: MAX_HEADER_LENGTH,
            actual: buffer.len(),
        });
    }

    buffer[TYPE_OFFSET] = header.payload_type().as_byte();
    buffer[TYPE_DELIMITER_OFFSET] = DELIMITER;

    let mut length_field = &mut buffer[LENGTH_OFFSET..LENGTH_OFFSET + LENGTH_LENGTH];
    write!(length_field, "{:06}", header.payload_length()).map_err(|_| {
        HeaderError::LengthOutOfRange {
            length: header.payload_length(),
            max: super::MAX_LENGTH,
        }
    })?;
    buffer[LENGTH_DELIMITER_OFFSET] = DELIMITER;

    header
        .id()
        .hyphenated()
        .encode_lower(&mut buffer[ID_OFFSET..ID_OFFSET + ID_LENGTH]);
    buffer[ID_DELIMITER_OFFSET] = DELIMITER;

    buffer[END_OFFSET] = if header.end() { b'1' } else { b'0' };
    buffer[TERMINATOR_OFFSET] = TERMINATOR;
    Ok(())
}

/// Decode a header from exactly [`MAX_HEADER_LENGTH`] bytes.
///
/// # Errors
///
/// Returns a [`HeaderError`] describing the first malformed field.
pub fn deserialize(buffer: &[u8]) -> Result<Header, HeaderError> {
    if buffer.len() != MAX_HEADER_LENGTH {
        return Err(HeaderError::BufferSize {
            expected: MAX_HEADER_LENGTH,
            actual: buffer.len(),
        });
    }

    expect_byte(buffer, TYPE_DELIMITER_OFFSET, DELIMITER)?;
    expect_byte(buffer, LENGTH_DELIMITER_OFFSET, DELIMITER)?;
    expect_byte(buffer, ID_DELIMITER_OFFSET, DELIMITER)?;
    expect_byte(buffer, TERMINATOR_OFFSET, TERMINATOR)?;

    let payload_type = PayloadType::from_byte(buffer[TYPE_OFFSET])?;
    let payload_length = parse_length(&buffer[LENGTH_OFFSET..LENGTH_OFFSET + LENGTH_LENGTH])?;
    let id_field = &buffer[ID_OFFSET..ID_OFFSET + ID_LENGTH];
    let id = Uuid::try_parse_ascii(id_field)
        .map_err(|_| HeaderError::InvalidId(String::from_utf8_lossy(id_field).into_owned()))?;
    let end = match buffer[END_OFFSET] {
        b'1' => true,
        b'0' => false,
        other => return Err(HeaderError::InvalidEnd(other)),
    };

    Header::new(payload_type, payload_length, id, end)
}

fn expect_byte(buffer: &[u8], offset: usize, expected: u8) -> Result<(), HeaderError> {
    let found = buffer[offset];
    if found == expected {
        Ok(())
    } else {
        Err(HeaderError::Delimiter {
            offset,
            expected: char::from(expected),
            found,
        })
    }
}

fn parse_length(field: &[u8]) -> Result<usize, HeaderError> {
    field.iter().try_fold(0usize, |acc, byte| {
        if byte.is_ascii_digit() {
            Ok(acc * 10 + usize::from(byte - b'0'))
        } else {
            Err(HeaderError::InvalidLength)
        }
    })
}
