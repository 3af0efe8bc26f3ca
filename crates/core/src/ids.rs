//! Entity id generation

use uuid::Uuid;

/// First `len` hex characters of a fresh v4 uuid, uppercased
pub fn short_uuid(len: usize) -> String {
    let simple = Uuid::new_v4().simple().to_string().to_uppercase();
    simple[..len.min(simple.len())].to_string()
}

/// New entity id of the form `PREFIX-XXXXXXXXXXXX`
pub fn new_entity_id(prefix: &str) -> String {
    format!("{}-{}", prefix, short_uuid(12))
}
