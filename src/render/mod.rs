//! Linearizes a message's MIME tree into flat text.
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::types::{MessagePart, MessagePartBody};

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
// Gmail encodes bodies with the URL-safe alphabet.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// Renders `root` depth-first in pre-order: headers, a blank line, the body,
/// then every child in sequence with no separators in between.
pub fn render(root: &MessagePart) -> String {
    let mut out = String::new();
    let mut stack = vec![root];

    while let Some(part) = stack.pop() {
        render_headers(part, &mut out);
        render_body(&part.mime_type, &part.body, &mut out);
        stack.extend(part.parts.iter().rev());
    }

    out
}

fn render_headers(part: &MessagePart, out: &mut String) {
    for header in &part.headers {
        out.push_str(&format!("{}: {}\n", header.name, header.value));
    }
    out.push('\n');
}

fn render_body(mime_type: &str, body: &MessagePartBody, out: &mut String) {
    if body.size == 0 {
        return;
    }

    if let Some(attachment_id) = &body.attachment_id {
        out.push_str(&format!("Attachment ID: {attachment_id}\n"));
        return;
    }

    let data = body.data.as_deref().unwrap_or_default();
    if mime_type == "text/plain" {
        if let Some(text) = decode_text(data) {
            out.push_str(&text);
            out.push('\n');
            return;
        }
    }
    out.push_str(&format!("{mime_type} Body Data: {data}\n"));
}

fn decode_text(data: &str) -> Option<String> {
    let bytes = URL_SAFE_LENIENT
        .decode(data)
        .or_else(|_| STANDARD_LENIENT.decode(data))
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
