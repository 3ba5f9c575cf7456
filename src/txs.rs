use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cosmos_sdk_proto::cosmos::tx::v1beta1::TxBody;
use sha2::{Digest, Sha256};

use crate::msg::Msg;

pub fn generate_tx_body(msgs: &[Msg], memo: &str) -> TxBody {
    TxBody {
        messages: msgs.iter().map(Msg::to_any).collect(),
        memo: memo.into(),
        ..Default::default()
    }
}

/// Uppercase hex SHA-256 of the signed `TxRaw` bytes, the hash nodes index by.
pub fn tx_hash(signed_tx: &[u8]) -> String {
    Sha256::digest(signed_tx)
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect()
}

pub fn encode_tx_bytes(signed_tx: &[u8]) -> String {
    STANDARD.encode(signed_tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg::{compose, fixtures, TransactionIntent};

    #[test]
    fn body_carries_messages_in_order() {
        let intent = TransactionIntent::WithdrawAllAcrossValidators {
            delegator: fixtures::delegator(),
            validators: vec![fixtures::validator(1), fixtures::validator(2)],
        };
        let msgs = compose(&intent, "uatom").unwrap();
        let body = generate_tx_body(&msgs, "from deck");

        assert_eq!(body.memo, "from deck");
        assert_eq!(body.messages.len(), 2);
        assert_eq!(body.messages[1], msgs[1].to_any());
        assert_eq!(body.timeout_height, 0);
    }

    #[test]
    fn hash_is_uppercase_sha256() {
        assert_eq!(
            tx_hash(b""),
            "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855"
        );
    }

    #[test]
    fn tx_bytes_are_standard_base64() {
        assert_eq!(encode_tx_bytes(&[0xfb, 0xff]), "+/8=");
    }
}
