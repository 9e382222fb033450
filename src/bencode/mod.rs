//! Ordered key/value codec used for `.torrent` files.

mod decoder;
mod encoder;
mod value;

pub use decoder::decode;
pub use encoder::encode;
pub use value::BencodeValue;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dict_keys_are_sorted() {
        let value = BencodeValue::dict().with("foo", 42i64).with("bar", "spam");
        assert_eq!(encode(&value), b"d3:bar4:spam3:fooi42ee");
    }

    #[test]
    fn test_nested_torrent_shape() {
        let info = BencodeValue::dict()
            .with("name", "a.txt")
            .with("length", 3i64)
            .with("pieces", vec![0u8; 20]);
        let value = BencodeValue::dict().with("peer_list", "http://t/peer_list").with("info", info);

        let decoded = decode(&encode(&value)).unwrap();
        assert_eq!(decoded.get("info").and_then(|i| i.get("length")), Some(&BencodeValue::Integer(3)));
        assert_eq!(decoded.get("peer_list").and_then(|p| p.as_str()), Some("http://t/peer_list"));
    }

    #[test]
    fn test_rejects_truncated_input() {
        assert!(decode(b"d4:name5:a.tx").is_err());
        assert!(decode(b"l4:spam").is_err());
        assert!(decode(b"i42").is_err());
        assert!(decode(b"").is_err());
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        assert!(decode(b"i1ei2e").is_err());
    }

    #[test]
    fn test_rejects_malformed_integers() {
        assert!(decode(b"i03e").is_err());
        assert!(decode(b"i-0e").is_err());
        assert!(decode(b"ie").is_err());
        assert_eq!(decode(b"i-7e").unwrap(), BencodeValue::Integer(-7));
        assert!(decode(b"i+5e").is_err());
        assert!(decode(b"i-+5e").is_err());
        assert!(decode(b"i 5e").is_err());
    }

    #[test]
    fn test_rejects_non_canonical_string_lengths() {
        assert!(decode(b"03:abc").is_err());
        assert!(decode(b"00:").is_err());
        assert!(decode(b"+3:abc").is_err());
        assert!(decode(b"d03:keyi1ee").is_err());
        assert_eq!(decode(b"0:").unwrap(), BencodeValue::Bytes(Vec::new()));
        assert_eq!(decode(b"3:abc").unwrap(), BencodeValue::Bytes(b"abc".to_vec()));
    }

    #[test]
    fn test_rejects_non_string_keys() {
        assert!(decode(b"di1ei2ee").is_err());
    }
}
