use super::format::DateFormatter;
use super::record::RawValue;
use super::NormalizeError;

/// Separator between path segments in flattened keys (`author.name`, `links.0.href`).
pub const KEY_DELIMITER: &str = ".";

/// Collapses a raw record into `(path, leaf)` pairs.
///
/// Leaves are scalars, dates and *empty* containers; every non-empty map or list is
/// expanded into its children. List elements are keyed by 0-based index. The walk
/// uses an explicit stack so deeply nested input cannot overflow the call stack.
///
/// # Errors
///
/// Returns [`NormalizeError::MalformedRecord`] if the root is not a map.
pub fn flatten(record: &RawValue) -> Result<Vec<(String, &RawValue)>, NormalizeError> {
    let RawValue::Map(root) = record else {
        return Err(NormalizeError::MalformedRecord {
            key: String::new(),
            detail: "record root is not a map".to_string(),
        });
    };

    let mut leaves = Vec::new();
    let mut stack: Vec<(String, &RawValue)> = root
        .iter()
        .rev()
        .map(|(key, value)| (key.clone(), value))
        .collect();

    while let Some((path, value)) = stack.pop() {
        match value {
            RawValue::Map(map) if !map.is_empty() => {
                for (key, child) in map.iter().rev() {
                    stack.push((join_key(&path, key), child));
                }
            }
            RawValue::List(items) if !items.is_empty() => {
                for (index, child) in items.iter().enumerate().rev() {
                    stack.push((join_key(&path, &index.to_string()), child));
                }
            }
            _ => leaves.push((path, value)),
        }
    }

    Ok(leaves)
}

fn join_key(prefix: &str, segment: &str) -> String {
    let mut key = String::with_capacity(prefix.len() + KEY_DELIMITER.len() + segment.len());
    key.push_str(prefix);
    key.push_str(KEY_DELIMITER);
    key.push_str(segment);
    key
}

/// Turns one flattened leaf into its stored string form.
///
/// Returns `Ok(None)` when the value is dropped (falsy, blank after trimming, or an
/// empty container).
///
/// # Errors
///
/// A non-empty map or list reaching this stage means flattening was bypassed; that
/// is reported as [`NormalizeError::MalformedRecord`] naming the offending key.
pub fn coerce(
    key: &str,
    value: &RawValue,
    formatter: &DateFormatter,
) -> Result<Option<String>, NormalizeError> {
    if value.is_falsy() {
        return Ok(None);
    }

    match value {
        RawValue::String(s) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        RawValue::Date(date) => Ok(Some(formatter.format(date))),
        RawValue::Map(map) if map.is_empty() => Ok(None),
        RawValue::Map(map) => Err(NormalizeError::MalformedRecord {
            key: key.to_string(),
            detail: format!("map with {} entries survived flattening", map.len()),
        }),
        RawValue::List(items) if items.is_empty() => Ok(None),
        RawValue::List(items) => Err(NormalizeError::MalformedRecord {
            key: key.to_string(),
            detail: format!("list with {} items survived flattening", items.len()),
        }),
        RawValue::Bool(b) => Ok(Some(b.to_string())),
        RawValue::Number(n) => Ok(Some(n.to_string())),
        RawValue::Null => Ok(None),
    }
}
