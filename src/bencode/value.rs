use std::collections::BTreeMap;

/// A decoded bencode node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BencodeValue {
    /// i<number>e
    Integer(i64),
    /// <length>:<contents>
    Bytes(Vec<u8>),
    /// l<values>e
    List(Vec<BencodeValue>),
    /// d<key-value pairs>e, keys kept sorted so encoding is canonical
    Dict(BTreeMap<Vec<u8>, BencodeValue>),
}

impl BencodeValue {
    /// An empty dictionary, to be filled with [`BencodeValue::with`]
    pub fn dict() -> Self {
        BencodeValue::Dict(BTreeMap::new())
    }

    /// Builder-style insert; a no-op on anything but a dictionary.
    pub fn with(mut self, key: &str, value: impl Into<BencodeValue>) -> Self {
        if let BencodeValue::Dict(entries) = &mut self {
            entries.insert(key.as_bytes().to_vec(), value.into());
        }
        self
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            BencodeValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            BencodeValue::Bytes(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, BencodeValue>> {
        match self {
            BencodeValue::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&BencodeValue> {
        self.as_dict()?.get(key.as_bytes())
    }
}

impl From<i64> for BencodeValue {
    fn from(value: i64) -> Self {
        BencodeValue::Integer(value)
    }
}

impl From<&str> for BencodeValue {
    fn from(value: &str) -> Self {
        BencodeValue::Bytes(value.as_bytes().to_vec())
    }
}

impl From<String> for BencodeValue {
    fn from(value: String) -> Self {
        BencodeValue::Bytes(value.into_bytes())
    }
}

impl From<Vec<u8>> for BencodeValue {
    fn from(value: Vec<u8>) -> Self {
        BencodeValue::Bytes(value)
    }
}
