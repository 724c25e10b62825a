//! Key layout on the key-value store.
//!
//! - record: `doc:{collection}:{internal_id}`
//! - record scan pattern: `doc:{collection}:*`
//! - collection index hash: `idx:{collection}`

const DOCUMENT_PREFIX: &str = "doc";
const INDEX_PREFIX: &str = "idx";

/// Key under which a document record is stored.
pub fn document_key(collection: &str, id: &str) -> String {
    format!("{DOCUMENT_PREFIX}:{collection}:{id}")
}

/// Scan pattern matching every record key of a collection.
///
/// Glob metacharacters in the collection name are escaped so they match literally.
pub fn document_pattern(collection: &str) -> String {
    format!("{DOCUMENT_PREFIX}:{}:*", escape_glob(collection))
}

/// Key of the hash tracking a collection's members.
pub fn index_key(collection: &str) -> String {
    format!("{INDEX_PREFIX}:{collection}")
}

/// Extracts the document id from a record key of the given collection.
pub fn id_from_key<'a>(collection: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(DOCUMENT_PREFIX)?
        .strip_prefix(':')?
        .strip_prefix(collection)?
        .strip_prefix(':')
        .filter(|id| !id.is_empty())
}

fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());

    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}
