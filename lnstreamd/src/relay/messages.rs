//! JSON messages exchanged with the invoice relay.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelayMessage {
    /// Challenge sent by the relay when a socket opens
    UnauthorizedConnection,
    ConnectRequest {
        identity: String,
    },
    SignMessageRequest {
        nonce: String,
    },
    SignMessageResponse {
        signature: String,
    },
    SignMessageSuccess,
    /// Ask the node identified by `destination` for an invoice of `amount` satoshi
    AddInvoiceRemoteRequest {
        key: String,
        destination: String,
        amount: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        memo: Option<String>,
        /// identity of the requesting node, filled in by the relay
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender: Option<String>,
    },
    AddInvoiceRemoteResponse {
        key: String,
        invoice: String,
        amount: u64,
        /// the original requester, so the relay can route the response
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination: Option<String>,
    },
    Error {
        #[serde(default)]
        message: String,
    },
}

impl RelayMessage {
    pub fn to_json(&self) -> String {
        // a tagged enum of strings and integers always serializes
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;
    use serde_json::json;

    #[test]
    fn wire_format_test() {
        let msg = RelayMessage::ConnectRequest { identity: "02ab".to_string() };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "CONNECT_REQUEST", "identity": "02ab"})
        );
        assert_eq!(
            RelayMessage::UnauthorizedConnection.to_json(),
            r#"{"type":"UNAUTHORIZED_CONNECTION"}"#
        );

        let request = RelayMessage::AddInvoiceRemoteRequest {
            key: "k1".to_string(),
            destination: "03cd".to_string(),
            amount: 10,
            memo: None,
            sender: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "type": "ADD_INVOICE_REMOTE_REQUEST",
                "key": "k1",
                "destination": "03cd",
                "amount": 10
            })
        );
    }

    #[test]
    fn parse_test() {
        let msg = RelayMessage::from_json(
            r#"{"type":"ADD_INVOICE_REMOTE_RESPONSE","key":"k1","invoice":"lnbc1","amount":10}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            RelayMessage::AddInvoiceRemoteResponse {
                key: "k1".to_string(),
                invoice: "lnbc1".to_string(),
                amount: 10,
                destination: None,
            }
        );
        assert_eq!(
            RelayMessage::from_json(r#"{"type":"ERROR"}"#).unwrap(),
            RelayMessage::Error { message: String::new() }
        );
        assert!(RelayMessage::from_json(r#"{"type":"PING"}"#).is_err());
    }
}
