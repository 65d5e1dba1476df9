use serde::Deserialize;

pub type MessageId = String;
pub type PageToken = String;

/// Search expression sent to the list RPC.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query(String);

impl Query {
    pub fn from_address(address: &str) -> Self {
        Self(format!("from:{address}"))
    }

    pub fn to_address(address: &str) -> Self {
        Self(format!("to:{address}"))
    }

    /// The `from:` query first, then the `to:` query.
    pub fn pair_for(address: &str) -> [Query; 2] {
        [Self::from_address(address), Self::to_address(address)]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of a message listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub ids: Vec<MessageId>,
    pub next_page_token: Option<PageToken>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct MessagePartBody {
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(rename = "attachmentId", default)]
    pub attachment_id: Option<String>,
}

/// A node of a message's MIME tree as the Gmail API structures it.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct MessagePart {
    #[serde(rename = "mimeType", default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: MessagePartBody,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl MessagePart {
    pub fn leaf(mime_type: &str, headers: &[(&str, &str)], body: MessagePartBody) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            headers: headers
                .iter()
                .map(|(name, value)| Header {
                    name: name.to_string(),
                    value: value.to_string(),
                })
                .collect(),
            body,
            parts: Vec::new(),
        }
    }

    pub fn with_parts(mut self, parts: Vec<MessagePart>) -> Self {
        self.parts = parts;
        self
    }
}

impl MessagePartBody {
    pub fn inline(data: &str) -> Self {
        Self {
            size: data.len() as u64,
            data: Some(data.to_string()),
            attachment_id: None,
        }
    }

    pub fn attachment(id: &str, size: u64) -> Self {
        Self {
            size,
            data: None,
            attachment_id: Some(id.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_for_address_are_from_then_to() {
        let [from, to] = Query::pair_for("a@x.com");
        assert_eq!(from.as_str(), "from:a@x.com");
        assert_eq!(to.as_str(), "to:a@x.com");
    }

    #[test]
    fn message_part_deserializes_gmail_shape() {
        let json = r#"{
            "partId": "",
            "mimeType": "multipart/mixed",
            "headers": [{"name": "Subject", "value": "X"}],
            "body": {"size": 0},
            "parts": [
                {"mimeType": "text/plain", "body": {"size": 5, "data": "aGVsbG8="}},
                {"mimeType": "application/pdf", "filename": "a.pdf",
                 "body": {"size": 1024, "attachmentId": "ANGjdJ"}}
            ]
        }"#;
        let part: MessagePart = serde_json::from_str(json).unwrap();
        assert_eq!(part.mime_type, "multipart/mixed");
        assert_eq!(part.headers.len(), 1);
        assert_eq!(part.parts.len(), 2);
        assert!(part.parts[0].headers.is_empty());
        assert_eq!(part.parts[1].body.attachment_id.as_deref(), Some("ANGjdJ"));
    }
}
