// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Validates endpoint strings with the endpoint parser while the file is loaded.

use crate::runtime::{RuntimeKind, parse_unix};
use serde::Deserialize;
use std::collections::HashMap;

pub fn deserialize_socket<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        None => Ok(None),
        Some(socket) => {
            parse_unix(&socket).map_err(serde::de::Error::custom)?;
            Ok(Some(socket))
        }
    }
}

pub fn deserialize_endpoints<'de, D>(
    deserializer: D,
) -> Result<HashMap<RuntimeKind, Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let map: HashMap<RuntimeKind, Vec<String>> = HashMap::deserialize(deserializer)?;
    for (kind, endpoints) in &map {
        for endpoint in endpoints {
            parse_unix(endpoint)
                .map_err(|e| serde::de::Error::custom(format!("{} endpoint: {}", kind, e)))?;
        }
    }
    Ok(map)
}
