//! Revert reason decoding
//!
//! RPC nodes report reverts as error text. Pull out the human-readable reason so it can
//! be shown to the user instead of the raw JSON-RPC payload.

use alloy::hex;

/// `Error(string)` selector
const ERROR_STRING_SELECTOR: &str = "0x08c379a0";

/// Selector + offset word + length word, hex encoded with `0x` prefix
const ERROR_STRING_HEADER_LEN: usize = 2 + 8 + 64 + 64;

/// Parse revert reason from RPC error message
pub fn parse_revert_reason(error: &str) -> String {
    if !error.contains("execution reverted") && !error.contains(ERROR_STRING_SELECTOR) {
        return error.to_string();
    }

    // Plain-text reason: "execution reverted: revert: Only owner"
    if let Some(start) = error.find("revert: ") {
        let reason = &error[start + "revert: ".len()..];
        let reason = reason.split('"').next().unwrap_or(reason);
        return reason.trim().to_string();
    }

    // ABI-encoded Error(string) payload
    if let Some(start) = error.find(ERROR_STRING_SELECTOR) {
        let tail = &error[start..];
        let end = tail
            .char_indices()
            .skip(2)
            .find(|(_, c)| !c.is_ascii_hexdigit())
            .map(|(i, _)| i)
            .unwrap_or(tail.len());
        let data = &tail[..end];

        if data.len() > ERROR_STRING_HEADER_LEN {
            if let Ok(decoded) = hex::decode(&data[ERROR_STRING_HEADER_LEN..]) {
                let filtered: Vec<u8> = decoded.into_iter().filter(|&b| b != 0).collect();
                if let Ok(s) = String::from_utf8(filtered) {
                    return s;
                }
            }
        }
        return format!("Reverted with data: {}", data);
    }

    if let Some(start) = error.find("execution reverted: ") {
        return error[start + "execution reverted: ".len()..].trim().to_string();
    }

    "execution reverted".to_string()
}
