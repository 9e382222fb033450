use super::BencodeValue;
use crate::error::{BittorrentError, Result};
use std::collections::BTreeMap;

/// Nesting deeper than this is rejected instead of recursing further.
const MAX_DEPTH: usize = 64;

/// Decode exactly one bencoded value; trailing bytes are an error.
pub fn decode(data: &[u8]) -> Result<BencodeValue> {
    let mut decoder = Decoder { data, pos: 0 };
    let value = decoder.value(0)?;

    if decoder.pos != data.len() {
        return Err(malformed(format!(
            "{} trailing bytes after value",
            data.len() - decoder.pos
        )));
    }

    Ok(value)
}

fn malformed(reason: impl Into<String>) -> BittorrentError {
    BittorrentError::BencodeError(reason.into())
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

/// ASCII digits only, no sign, no leading zero unless the number is zero.
fn is_canonical_digits(text: &str) -> bool {
    !text.is_empty()
        && text.bytes().all(|b| b.is_ascii_digit())
        && !(text.len() > 1 && text.starts_with('0'))
}

impl<'a> Decoder<'a> {
    fn peek(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| malformed("Unexpected end of input"))
    }

    fn value(&mut self, depth: usize) -> Result<BencodeValue> {
        if depth > MAX_DEPTH {
            return Err(malformed("Nesting too deep"));
        }

        match self.peek()? {
            b'i' => self.integer(),
            b'l' => self.list(depth),
            b'd' => self.dict(depth),
            b'0'..=b'9' => self.bytes().map(BencodeValue::Bytes),
            c => Err(malformed(format!("Invalid bencode token: {}", c as char))),
        }
    }

    /// Digits up to `terminator`, consuming the terminator.
    fn digits_until(&mut self, terminator: u8) -> Result<&'a str> {
        let start = self.pos;
        let end = self.data[start..]
            .iter()
            .position(|&b| b == terminator)
            .map(|offset| start + offset)
            .ok_or_else(|| malformed(format!("Missing '{}'", terminator as char)))?;

        self.pos = end + 1;
        std::str::from_utf8(&self.data[start..end]).map_err(|_| malformed("Non-ASCII number"))
    }

    fn integer(&mut self) -> Result<BencodeValue> {
        self.pos += 1;
        let text = self.digits_until(b'e')?;

        let unsigned = text.strip_prefix('-').unwrap_or(text);
        if !is_canonical_digits(unsigned) || text == "-0" {
            return Err(malformed(format!("Invalid integer: {:?}", text)));
        }

        text.parse::<i64>()
            .map(BencodeValue::Integer)
            .map_err(|_| malformed(format!("Invalid integer: {:?}", text)))
    }

    fn bytes(&mut self) -> Result<Vec<u8>> {
        let text = self.digits_until(b':')?;
        if !is_canonical_digits(text) {
            return Err(malformed(format!("Invalid string length: {:?}", text)));
        }
        let len = text
            .parse::<usize>()
            .map_err(|_| malformed("Invalid string length"))?;

        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| malformed("String length exceeds data"))?;

        let bytes = self.data[self.pos..end].to_vec();
        self.pos = end;
        Ok(bytes)
    }

    fn list(&mut self, depth: usize) -> Result<BencodeValue> {
        self.pos += 1;
        let mut items = Vec::new();

        while self.peek()? != b'e' {
            items.push(self.value(depth + 1)?);
        }

        self.pos += 1;
        Ok(BencodeValue::List(items))
    }

    fn dict(&mut self, depth: usize) -> Result<BencodeValue> {
        self.pos += 1;
        let mut entries = BTreeMap::new();

        while self.peek()? != b'e' {
            if !self.peek()?.is_ascii_digit() {
                return Err(malformed("Dictionary key must be a string"));
            }
            let key = self.bytes()?;
            let value = self.value(depth + 1)?;
            entries.insert(key, value);
        }

        self.pos += 1;
        Ok(BencodeValue::Dict(entries))
    }
}
