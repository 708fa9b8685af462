//! EIP-155 legacy transactions, RLP-encoded and signed locally.

use phonelink_crypto::{keccak256, sign_prehash, ValidatorKey};
use phonelink_types::Address;
use rlp::RlpStream;

use crate::LedgerError;

/// A contract call to be signed by the validator's own key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: u128,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

/// Big-endian bytes with leading zeros removed (RLP integer form).
fn trimmed(bytes: &[u8]) -> Vec<u8> {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

fn uint(value: u128) -> Vec<u8> {
    trimmed(&value.to_be_bytes())
}

impl LegacyTransaction {
    fn append_body(&self, stream: &mut RlpStream) {
        stream.append(&uint(u128::from(self.nonce)));
        stream.append(&uint(self.gas_price));
        stream.append(&uint(u128::from(self.gas_limit)));
        stream.append(&self.to.as_bytes().to_vec());
        stream.append(&uint(self.value));
        stream.append(&self.data);
    }

    /// `rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0])`
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(9);
        self.append_body(&mut stream);
        stream.append(&uint(u128::from(self.chain_id)));
        stream.append(&Vec::<u8>::new());
        stream.append(&Vec::<u8>::new());
        stream.as_raw().to_vec()
    }

    pub fn signing_hash(&self) -> [u8; 32] {
        keccak256(&self.signing_payload())
    }

    /// The raw signed transaction for `eth_sendRawTransaction`.
    pub fn sign(&self, key: &ValidatorKey) -> Result<Vec<u8>, LedgerError> {
        let (rs, recid) = sign_prehash(key.signing_key(), &self.signing_hash())?;
        let v = u128::from(self.chain_id) * 2 + 35 + u128::from(recid);

        let mut stream = RlpStream::new_list(9);
        self.append_body(&mut stream);
        stream.append(&uint(v));
        stream.append(&trimmed(&rs[..32]));
        stream.append(&trimmed(&rs[32..]));
        Ok(stream.as_raw().to_vec())
    }
}
