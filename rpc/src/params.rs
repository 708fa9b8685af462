//! Request bodies and their field checks.
//!
//! Bodies are deserialised loosely (every field optional, strings or numbers
//! accepted) and then checked field by field, so a bad request is answered
//! with the full list of offending fields rather than the first parse error.

use phonelink_types::{Address, PhoneRequest, RecoverableSignature, RequestId, SubmitData, Transaction};
use serde::Deserialize;
use serde_json::Value;

use crate::{FieldError, RpcError};

#[derive(Debug, Default, Deserialize)]
pub struct RequestBody {
    pub phone: Option<Value>,
    pub address: Option<Value>,
    pub signature: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RelayedRequestBody {
    pub phone: Option<Value>,
    pub address: Option<Value>,
    pub nonce: Option<Value>,
    pub signature: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastBody {
    pub request: Option<RelayedRequestBody>,
    pub request_id: Option<Value>,
    pub receiver: Option<Value>,
    pub signature: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBody {
    pub request_id: Option<Value>,
    pub code: Option<Value>,
    pub receiver: Option<Value>,
    pub signature: Option<Value>,
}

/// A checked `/request` body.
#[derive(Debug)]
pub struct NewRequest {
    pub phone: String,
    pub address: Address,
    pub signature: RecoverableSignature,
}

/// A checked `/submit` body.
#[derive(Debug)]
pub struct Submit {
    pub request_id: RequestId,
    pub code: String,
}

#[derive(Default)]
struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    fn text(&mut self, param: &str, value: &Option<Value>) -> Option<String> {
        let text = match value {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        if text.is_empty() {
            self.errors.push(FieldError::new(param, "Invalid value"));
            return None;
        }
        Some(text)
    }

    fn parsed<T: std::str::FromStr>(&mut self, param: &str, value: &Option<Value>) -> Option<T> {
        let text = self.text(param, value)?;
        match text.parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                self.errors.push(FieldError::new(param, "Invalid value"));
                None
            }
        }
    }

    fn digits(&mut self, param: &str, value: &Option<Value>) -> Option<String> {
        let text = self.text(param, value)?;
        if text.bytes().all(|b| b.is_ascii_digit()) {
            Some(text)
        } else {
            self.errors.push(FieldError::new(param, "Invalid value"));
            None
        }
    }

    fn nonce(&mut self, param: &str, value: &Option<Value>) -> Option<u64> {
        let text = self.digits(param, value)?;
        match text.parse() {
            Ok(nonce) => Some(nonce),
            Err(_) => {
                self.errors.push(FieldError::new(param, "Out of range"));
                None
            }
        }
    }

    fn finish<T>(self, value: Option<T>) -> Result<T, RpcError> {
        match value {
            Some(v) if self.errors.is_empty() => Ok(v),
            _ => Err(RpcError::InvalidParameters(self.errors)),
        }
    }
}

impl RequestBody {
    pub fn check(&self) -> Result<NewRequest, RpcError> {
        let mut c = Checker::default();
        let phone = c.text("phone", &self.phone);
        let address = c.parsed("address", &self.address);
        let signature = c.parsed("signature", &self.signature);
        let checked = match (phone, address, signature) {
            (Some(phone), Some(address), Some(signature)) => Some(NewRequest {
                phone,
                address,
                signature,
            }),
            _ => None,
        };
        c.finish(checked)
    }
}

impl BroadcastBody {
    pub fn check(&self) -> Result<Transaction, RpcError> {
        let mut c = Checker::default();
        let empty = RelayedRequestBody::default();
        let request = match &self.request {
            Some(request) => request,
            None => {
                c.errors.push(FieldError::new("request", "Invalid value"));
                &empty
            }
        };
        let phone = c.text("request.phone", &request.phone);
        let address: Option<Address> = c.parsed("request.address", &request.address);
        let nonce = c.nonce("request.nonce", &request.nonce);
        let request_signature: Option<RecoverableSignature> =
            c.parsed("request.signature", &request.signature);
        let request_id: Option<RequestId> = c.parsed("requestId", &self.request_id);
        let receiver: Option<Address> = c.parsed("receiver", &self.receiver);
        let signature: Option<RecoverableSignature> = c.parsed("signature", &self.signature);

        let checked = (|| {
            Some(Transaction {
                request: PhoneRequest {
                    phone: phone?,
                    address: address?,
                    nonce: nonce?,
                    signature: request_signature?,
                },
                request_id: request_id?,
                receiver: receiver?,
                signature: signature?,
            })
        })();
        c.finish(checked)
    }
}

impl SubmitBody {
    pub fn check_submit(&self) -> Result<Submit, RpcError> {
        let mut c = Checker::default();
        let request_id = c.parsed("requestId", &self.request_id);
        let code = c.digits("code", &self.code);
        let checked = match (request_id, code) {
            (Some(request_id), Some(code)) => Some(Submit { request_id, code }),
            _ => None,
        };
        c.finish(checked)
    }

    pub fn check_relayed(&self) -> Result<SubmitData, RpcError> {
        let mut c = Checker::default();
        let request_id = c.parsed("requestId", &self.request_id);
        let code = c.digits("code", &self.code);
        let receiver = c.parsed("receiver", &self.receiver);
        let signature = c.parsed("signature", &self.signature);
        let checked = match (request_id, code, receiver, signature) {
            (Some(request_id), Some(code), Some(receiver), Some(signature)) => Some(SubmitData {
                request_id,
                code,
                receiver,
                signature,
            }),
            _ => None,
        };
        c.finish(checked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signature() -> String {
        format!("0x{}", "ab".repeat(65))
    }

    fn params(err: RpcError) -> Vec<String> {
        match err {
            RpcError::InvalidParameters(fields) => fields.into_iter().map(|f| f.param).collect(),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn request_body() {
        let body: RequestBody = serde_json::from_value(json!({
            "phone": " +82 10-1234-1000 ",
            "address": format!("0x{}", "AB".repeat(20)),
            "signature": signature(),
        }))
        .unwrap();
        let checked = body.check().unwrap();
        assert_eq!(checked.phone, "+82 10-1234-1000");
        assert_eq!(checked.address, Address::new([0xab; 20]));
    }

    #[test]
    fn request_body_reports_every_bad_field() {
        let body: RequestBody = serde_json::from_value(json!({
            "address": "0x1234",
            "signature": "0xzz",
        }))
        .unwrap();
        assert_eq!(
            params(body.check().unwrap_err()),
            vec!["phone", "address", "signature"]
        );
    }

    #[test]
    fn broadcast_body() {
        let body: BroadcastBody = serde_json::from_value(json!({
            "request": {
                "phone": "+82 10-1234-1000",
                "address": format!("0x{}", "01".repeat(20)),
                "nonce": 3,
                "signature": signature(),
            },
            "requestId": format!("0x{}", "02".repeat(32)),
            "receiver": format!("0x{}", "03".repeat(20)),
            "signature": signature(),
        }))
        .unwrap();
        let tx = body.check().unwrap();
        assert_eq!(tx.request.nonce, 3);
        assert_eq!(tx.request_id, RequestId::new([2; 32]));
        assert_eq!(tx.receiver, Address::new([3; 20]));
    }

    #[test]
    fn broadcast_without_request() {
        let body: BroadcastBody = serde_json::from_value(json!({
            "requestId": format!("0x{}", "02".repeat(32)),
            "receiver": format!("0x{}", "03".repeat(20)),
            "signature": signature(),
        }))
        .unwrap();
        let fields = params(body.check().unwrap_err());
        assert_eq!(fields[0], "request");
        assert!(fields.contains(&"request.nonce".to_string()));
    }

    #[test]
    fn nonce_must_be_digits() {
        let mut c = Checker::default();
        assert_eq!(c.nonce("n", &Some(json!("12"))), Some(12));
        assert_eq!(c.nonce("n", &Some(json!("-1"))), None);
        assert_eq!(c.nonce("n", &Some(json!("99999999999999999999999"))), None);
        assert_eq!(c.errors.len(), 2);
    }

    #[test]
    fn submit_code_must_be_numeric() {
        let body: SubmitBody = serde_json::from_value(json!({
            "requestId": format!("0x{}", "02".repeat(32)),
            "code": "12a4",
        }))
        .unwrap();
        assert_eq!(params(body.check_submit().unwrap_err()), vec!["code"]);

        let body: SubmitBody = serde_json::from_value(json!({
            "requestId": format!("0x{}", "02".repeat(32)),
            "code": 102,
        }))
        .unwrap();
        assert_eq!(body.check_submit().unwrap().code, "102");
    }

    #[test]
    fn relayed_submit_needs_provenance() {
        let body: SubmitBody = serde_json::from_value(json!({
            "requestId": format!("0x{}", "02".repeat(32)),
            "code": "000102",
        }))
        .unwrap();
        assert_eq!(
            params(body.check_relayed().unwrap_err()),
            vec!["receiver", "signature"]
        );
    }
}
