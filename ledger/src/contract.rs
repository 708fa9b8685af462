//! Call data and return-value decoding for the phone-link registry contract.

use phonelink_crypto::abi::{encode_call, Decoder, Token};
use phonelink_types::{Address, RecoverableSignature, RequestId};

use crate::{LedgerError, ValidatorEntry, VoteCountStatus};

pub const NONCE_OF: &str = "nonceOf(address)";
pub const IS_AVAILABLE: &str = "isAvailable(bytes32)";
pub const GET_VALIDATORS: &str = "getValidators()";
pub const ADD_REQUEST: &str = "addRequest(bytes32,bytes32,address,bytes)";
pub const VOTE_REQUEST: &str = "voteRequest(bytes32)";
pub const COUNT_VOTE: &str = "countVote(bytes32)";
pub const CAN_COUNT_VOTE: &str = "canCountVote(bytes32)";
pub const UPDATE_ENDPOINT: &str = "updateEndpoint(string)";

// Each validator tuple is (address validator, uint256 index, string endpoint, uint8 status).
const VALIDATOR_TUPLE_WORDS: usize = 4;

fn decode_err(e: phonelink_crypto::CryptoError) -> LedgerError {
    LedgerError::InvalidResponse(e.to_string())
}

pub fn nonce_of(address: &Address) -> Vec<u8> {
    encode_call(NONCE_OF, &[Token::Address(*address)])
}

pub fn is_available(id: &RequestId) -> Vec<u8> {
    encode_call(IS_AVAILABLE, &[Token::Bytes32(*id.as_bytes())])
}

pub fn get_validators() -> Vec<u8> {
    encode_call(GET_VALIDATORS, &[])
}

pub fn add_request(
    id: &RequestId,
    phone_hash: &[u8; 32],
    address: &Address,
    signature: &RecoverableSignature,
) -> Vec<u8> {
    encode_call(
        ADD_REQUEST,
        &[
            Token::Bytes32(*id.as_bytes()),
            Token::Bytes32(*phone_hash),
            Token::Address(*address),
            Token::Bytes(signature.as_bytes().to_vec()),
        ],
    )
}

pub fn vote_request(id: &RequestId) -> Vec<u8> {
    encode_call(VOTE_REQUEST, &[Token::Bytes32(*id.as_bytes())])
}

pub fn count_vote(id: &RequestId) -> Vec<u8> {
    encode_call(COUNT_VOTE, &[Token::Bytes32(*id.as_bytes())])
}

pub fn can_count_vote(id: &RequestId) -> Vec<u8> {
    encode_call(CAN_COUNT_VOTE, &[Token::Bytes32(*id.as_bytes())])
}

pub fn update_endpoint(endpoint: &str) -> Vec<u8> {
    encode_call(UPDATE_ENDPOINT, &[Token::String(endpoint.to_string())])
}

pub fn decode_u64(data: &[u8]) -> Result<u64, LedgerError> {
    let value = Decoder::new(data).uint(0).map_err(decode_err)?;
    u64::try_from(value)
        .map_err(|_| LedgerError::InvalidResponse(format!("{value} does not fit in u64")))
}

pub fn decode_bool(data: &[u8]) -> Result<bool, LedgerError> {
    Decoder::new(data).bool(0).map_err(decode_err)
}

pub fn decode_vote_count_status(data: &[u8]) -> Result<VoteCountStatus, LedgerError> {
    let raw = Decoder::new(data).uint(0).map_err(decode_err)?;
    Ok(VoteCountStatus::from_raw(raw))
}

/// `base + rel`, refusing offsets that overflow.
fn offset(base: usize, rel: usize) -> Result<usize, LedgerError> {
    base.checked_add(rel)
        .ok_or_else(|| LedgerError::InvalidResponse(format!("offset {base} + {rel} overflows")))
}

/// Decode the `getValidators()` return value, a dynamic array of tuples.
///
/// Every offset comes from the response itself and is bounds-checked.
pub fn decode_validators(data: &[u8]) -> Result<Vec<ValidatorEntry>, LedgerError> {
    let d = Decoder::new(data);
    let array_offset = d.usize(0).map_err(decode_err)?;
    let len = d.usize(array_offset).map_err(decode_err)?;
    let base = offset(array_offset, 32)?;

    if len > data.len() / (32 * VALIDATOR_TUPLE_WORDS) {
        return Err(LedgerError::InvalidResponse(format!(
            "validator count {len} exceeds response size"
        )));
    }

    let mut entries = Vec::with_capacity(len);
    for i in 0..len {
        let head = offset(base, i * 32)?;
        let tuple = offset(base, d.usize(head).map_err(decode_err)?)?;
        let validator = d.address(tuple).map_err(decode_err)?;
        let index = d.uint(offset(tuple, 32)?).map_err(decode_err)?;
        let endpoint_offset = d.usize(offset(tuple, 64)?).map_err(decode_err)?;
        let endpoint = d.string(offset(tuple, endpoint_offset)?).map_err(decode_err)?;
        let status = d.uint(offset(tuple, 96)?).map_err(decode_err)?;

        entries.push(ValidatorEntry {
            validator,
            index: u32::try_from(index).map_err(|_| {
                LedgerError::InvalidResponse(format!("validator index {index} out of range"))
            })?,
            endpoint,
            status: u8::try_from(status).unwrap_or(u8::MAX),
        });
    }
    Ok(entries)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use phonelink_crypto::abi::{encode, selector};

    pub(crate) fn encode_validators(entries: &[ValidatorEntry]) -> Vec<u8> {
        let tuples: Vec<Vec<u8>> = entries
            .iter()
            .map(|e| {
                encode(&[
                    Token::Address(e.validator),
                    Token::Uint(u128::from(e.index)),
                    Token::String(e.endpoint.clone()),
                    Token::Uint(u128::from(e.status)),
                ])
            })
            .collect();

        let mut out = encode(&[Token::Uint(0x20), Token::Uint(entries.len() as u128)]);
        let mut offset = entries.len() * 32;
        for t in &tuples {
            out.extend_from_slice(&encode(&[Token::Uint(offset as u128)]));
            offset += t.len();
        }
        for t in tuples {
            out.extend_from_slice(&t);
        }
        out
    }

    fn entry(byte: u8, index: u32, endpoint: &str) -> ValidatorEntry {
        ValidatorEntry {
            validator: Address::new([byte; 20]),
            index,
            endpoint: endpoint.to_string(),
            status: 1,
        }
    }

    #[test]
    fn decodes_validator_array() {
        let entries = vec![
            entry(1, 0, "http://127.0.0.1:7080"),
            entry(2, 1, ""),
            entry(3, 2, &format!("http://{}.example:7080", "long".repeat(12))),
        ];
        let decoded = decode_validators(&encode_validators(&entries)).unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn empty_validator_array() {
        assert!(decode_validators(&encode_validators(&[])).unwrap().is_empty());
    }

    #[test]
    fn truncated_response_is_an_error() {
        let mut data = encode_validators(&[entry(1, 0, "http://a")]);
        data.truncate(data.len() - 40);
        assert!(decode_validators(&data).is_err());
    }

    #[test]
    fn absurd_length_is_rejected() {
        let data = encode(&[Token::Uint(0x20), Token::Uint(1_000_000)]);
        assert!(decode_validators(&data).is_err());
    }

    #[test]
    fn overflowing_offsets_are_errors_not_panics() {
        let valid = encode_validators(&[entry(1, 0, "http://a")]);

        // Tuple offset word pointing past usize::MAX.
        let mut data = valid.clone();
        data[64..96].copy_from_slice(&[0; 32]);
        data[96 - 8..96].copy_from_slice(&u64::MAX.to_be_bytes());
        assert!(matches!(
            decode_validators(&data),
            Err(LedgerError::InvalidResponse(_))
        ));

        // Array offset at the very end of the address space.
        let mut data = valid.clone();
        data[..32].copy_from_slice(&[0; 32]);
        data[32 - 8..32].copy_from_slice(&(u64::MAX - 16).to_be_bytes());
        assert!(decode_validators(&data).is_err());

        // Endpoint offset inside the tuple overflowing.
        let mut data = valid;
        let endpoint_word = 96 + 64;
        data[endpoint_word + 24..endpoint_word + 32].copy_from_slice(&u64::MAX.to_be_bytes());
        assert!(matches!(
            decode_validators(&data),
            Err(LedgerError::InvalidResponse(_))
        ));
    }

    #[test]
    fn call_data_layout() {
        let id = RequestId::new([7; 32]);
        let data = add_request(
            &id,
            &[8; 32],
            &Address::new([9; 20]),
            &RecoverableSignature::new([1; 65]),
        );
        assert_eq!(&data[..4], &selector(ADD_REQUEST));
        // 4 head words, then the 65-byte signature padded to 96 plus its length word
        assert_eq!(data.len(), 4 + 4 * 32 + 32 + 96);
        assert_eq!(&data[4..36], &[7u8; 32]);
    }

    #[test]
    fn scalar_decoders() {
        assert_eq!(decode_u64(&encode(&[Token::Uint(42)])).unwrap(), 42);
        assert!(decode_bool(&encode(&[Token::Bool(true)])).unwrap());
        assert_eq!(
            decode_vote_count_status(&encode(&[Token::Uint(2)])).unwrap(),
            VoteCountStatus::NotYet
        );
        assert!(decode_u64(&[]).is_err());
    }
}
