use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::AppError;

/// ASCII unit separator. Sortable text (titles) is rejected on write when it
/// contains control characters, so it never occurs inside a part.
const DELIMITER: char = '\u{1f}';

/// Separates the sort field from the listing scope in the first part.
const SCOPE_SEPARATOR: char = ':';

/// Decoded pagination cursor. Never stored server-side.
///
/// `scope` fingerprints the order and filters of the listing that minted
/// the cursor; the planner refuses it anywhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorData {
    pub sort_field: String,
    pub scope: String,
    pub sort_value: String,
    pub id: i64,
}

pub fn encode(cursor: &CursorData) -> String {
    let raw = format!(
        "{}{s}{}{d}{}{d}{}",
        cursor.sort_field,
        cursor.scope,
        cursor.sort_value,
        cursor.id,
        s = SCOPE_SEPARATOR,
        d = DELIMITER
    );
    URL_SAFE_NO_PAD.encode(raw.as_bytes())
}

/// Decode a client-supplied cursor. The empty string means "first page".
///
/// Only the shape is checked here; whether the sort field and scope match
/// the request and the value parses for it is the planner's call.
pub fn decode(token: &str) -> Result<Option<CursorData>, AppError> {
    if token.is_empty() {
        return Ok(None);
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(token.as_bytes())
        .map_err(|e| AppError::InvalidCursor(format!("cursor is not valid base64: {}", e)))?;
    let raw = String::from_utf8(bytes)
        .map_err(|_| AppError::InvalidCursor("cursor is not valid UTF-8".to_string()))?;

    let parts: Vec<&str> = raw.split(DELIMITER).collect();
    if parts.len() != 3 {
        return Err(AppError::InvalidCursor(format!(
            "cursor must have 3 parts, found {}",
            parts.len()
        )));
    }

    let (sort_field, scope) = parts[0]
        .split_once(SCOPE_SEPARATOR)
        .ok_or_else(|| AppError::InvalidCursor("cursor has no listing scope".to_string()))?;

    let id = parts[2]
        .parse::<i64>()
        .map_err(|_| AppError::InvalidCursor("cursor id is not an integer".to_string()))?;

    Ok(Some(CursorData {
        sort_field: sort_field.to_string(),
        scope: scope.to_string(),
        sort_value: parts[1].to_string(),
        id,
    }))
}
