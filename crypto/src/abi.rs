//! Ethereum ABI encoding.
//!
//! Only the subset the protocol needs: static words (address, uint, bytes32,
//! bool), dynamic `string`/`bytes` in argument lists, and the read side for
//! values returned by `eth_call`.

use phonelink_types::Address;

use crate::{keccak256, CryptoError};

const WORD: usize = 32;

/// One ABI value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(u128),
    Bytes32([u8; 32]),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        matches!(self, Token::String(_) | Token::Bytes(_))
    }
}

fn uint_word(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn static_word(token: &Token) -> [u8; 32] {
    match token {
        Token::Address(addr) => {
            let mut word = [0u8; 32];
            word[12..].copy_from_slice(addr.as_bytes());
            word
        }
        Token::Uint(v) => uint_word(*v),
        Token::Bytes32(b) => *b,
        Token::Bool(b) => uint_word(u128::from(*b)),
        Token::String(_) | Token::Bytes(_) => [0u8; 32],
    }
}

fn append_padded(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&uint_word(data.len() as u128));
    out.extend_from_slice(data);
    let rem = data.len() % WORD;
    if rem != 0 {
        out.extend(std::iter::repeat(0u8).take(WORD - rem));
    }
}

/// `abi.encode(tokens...)`.
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&uint_word((head_len + tail.len()) as u128));
            match token {
                Token::String(s) => append_padded(&mut tail, s.as_bytes()),
                Token::Bytes(b) => append_padded(&mut tail, b),
                _ => unreachable!("only string and bytes are dynamic"),
            }
        } else {
            head.extend_from_slice(&static_word(token));
        }
    }

    head.extend_from_slice(&tail);
    head
}

/// First four bytes of the Keccak-256 hash of a function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Call data for `signature` with the given arguments.
pub fn encode_call(signature: &str, tokens: &[Token]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend_from_slice(&encode(tokens));
    data
}

/// Bounds-checked reader over ABI-encoded return data.
///
/// Offsets are byte positions into the buffer the decoder was built from.
pub struct Decoder<'a> {
    data: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn word(&self, offset: usize) -> Result<&'a [u8], CryptoError> {
        let end = offset
            .checked_add(WORD)
            .ok_or_else(|| CryptoError::AbiDecode("offset overflow".into()))?;
        self.data.get(offset..end).ok_or_else(|| {
            CryptoError::AbiDecode(format!(
                "word at {offset} out of bounds (len {})",
                self.data.len()
            ))
        })
    }

    /// A uint word that must fit in 128 bits.
    pub fn uint(&self, offset: usize) -> Result<u128, CryptoError> {
        let word = self.word(offset)?;
        if word[..16].iter().any(|b| *b != 0) {
            return Err(CryptoError::AbiDecode(format!(
                "uint at {offset} exceeds 128 bits"
            )));
        }
        let mut buf = [0u8; 16];
        buf.copy_from_slice(&word[16..]);
        Ok(u128::from_be_bytes(buf))
    }

    /// A uint word used as an offset or length.
    pub fn usize(&self, offset: usize) -> Result<usize, CryptoError> {
        let v = self.uint(offset)?;
        usize::try_from(v).map_err(|_| CryptoError::AbiDecode(format!("{v} is not a valid size")))
    }

    pub fn bool(&self, offset: usize) -> Result<bool, CryptoError> {
        Ok(self.uint(offset)? != 0)
    }

    pub fn address(&self, offset: usize) -> Result<Address, CryptoError> {
        let word = self.word(offset)?;
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word[12..]);
        Ok(Address::new(bytes))
    }

    /// A dynamic byte string whose length word sits at `offset`.
    pub fn bytes(&self, offset: usize) -> Result<&'a [u8], CryptoError> {
        let len = self.usize(offset)?;
        let start = offset
            .checked_add(WORD)
            .ok_or_else(|| CryptoError::AbiDecode("offset overflow".into()))?;
        let end = start
            .checked_add(len)
            .ok_or_else(|| CryptoError::AbiDecode("length overflow".into()))?;
        self.data
            .get(start..end)
            .ok_or_else(|| CryptoError::AbiDecode(format!("bytes at {offset} out of bounds")))
    }

    pub fn string(&self, offset: usize) -> Result<String, CryptoError> {
        let raw = self.bytes(offset)?;
        String::from_utf8(raw.to_vec()).map_err(|e| CryptoError::AbiDecode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_tuple_is_one_word_per_token() {
        let encoded = encode(&[
            Token::Bytes32([1; 32]),
            Token::Address(Address::new([0xff; 20])),
            Token::Uint(7),
        ]);
        assert_eq!(encoded.len(), 96);
        assert_eq!(&encoded[..32], &[1u8; 32]);
        assert_eq!(&encoded[32..44], &[0u8; 12]);
        assert_eq!(&encoded[44..64], &[0xffu8; 20]);
        assert_eq!(encoded[95], 7);
    }

    #[test]
    fn two_strings_layout() {
        let encoded = encode(&[Token::String("ab".into()), Token::String("c".into())]);
        // head: two offsets; tail: (len, data) per string
        assert_eq!(encoded.len(), 32 * 6);
        assert_eq!(encoded[31], 0x40);
        assert_eq!(encoded[63], 0x80);
        assert_eq!(encoded[95], 2);
        assert_eq!(&encoded[96..98], b"ab");
        assert_eq!(encoded[159], 1);
        assert_eq!(encoded[160], b'c');
    }

    #[test]
    fn string_exactly_one_word_has_no_padding() {
        let s = "x".repeat(32);
        let encoded = encode(&[Token::String(s)]);
        assert_eq!(encoded.len(), 96);
    }

    #[test]
    fn decoder_reads_back_static_words() {
        let addr = Address::new([0x11; 20]);
        let encoded = encode(&[Token::Address(addr), Token::Uint(42), Token::Bool(true)]);
        let d = Decoder::new(&encoded);
        assert_eq!(d.address(0).unwrap(), addr);
        assert_eq!(d.uint(32).unwrap(), 42);
        assert!(d.bool(64).unwrap());
    }

    #[test]
    fn decoder_reads_dynamic_string() {
        let encoded = encode(&[Token::Uint(1), Token::String("http://node:7080".into())]);
        let d = Decoder::new(&encoded);
        let offset = d.usize(32).unwrap();
        assert_eq!(d.string(offset).unwrap(), "http://node:7080");
    }

    #[test]
    fn decoder_rejects_out_of_bounds() {
        let d = Decoder::new(&[0u8; 31]);
        assert!(d.word(0).is_err());
        let mut huge = [0u8; 32];
        huge[0] = 1;
        let d = Decoder::new(&huge);
        assert!(d.uint(0).is_err());
    }

    #[test]
    fn call_data_starts_with_selector() {
        let data = encode_call("nonceOf(address)", &[Token::Address(Address::ZERO)]);
        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &selector("nonceOf(address)"));
    }
}
