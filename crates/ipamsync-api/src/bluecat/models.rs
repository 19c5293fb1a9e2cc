// Bluecat v1 wire types
//
// Entities come back as `{id, name, type, properties}` where `properties`
// is a flat `key=value|key=value|` string. Pipes and backslashes inside
// values are backslash-escaped.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

use crate::error::Error;

/// One object as returned by `getEntities` / `getEntityById`.
///
/// Bluecat answers "no such entity" with an all-empty object whose id is 0;
/// see [`is_empty`](Self::is_empty).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiEntity {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub object_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_properties")]
    pub properties: BTreeMap<String, String>,
}

impl ApiEntity {
    pub fn is_empty(&self) -> bool {
        self.id == 0
    }
}

fn deserialize_properties<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        Some(raw) => parse_properties(&raw).map_err(serde::de::Error::custom),
        None => Ok(BTreeMap::new()),
    }
}

/// Decode a Bluecat properties string into a map.
///
/// The first unescaped `=` of each pair separates key from value, so values
/// may contain further `=` characters (base64, URLs). A trailing `|` is
/// optional.
pub fn parse_properties(raw: &str) -> Result<BTreeMap<String, String>, Error> {
    let mut map = BTreeMap::new();
    let mut pair = Pair::default();
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next().ok_or_else(|| {
                    Error::MalformedProperties(format!("dangling escape at end of {raw:?}"))
                })?;
                pair.push(escaped);
            }
            '=' if !pair.in_value => pair.in_value = true,
            '|' => pair.finish_into(&mut map, raw)?,
            c => pair.push(c),
        }
    }
    pair.finish_into(&mut map, raw)?;

    Ok(map)
}

#[derive(Default)]
struct Pair {
    key: String,
    value: String,
    in_value: bool,
}

impl Pair {
    fn push(&mut self, c: char) {
        if self.in_value {
            self.value.push(c);
        } else {
            self.key.push(c);
        }
    }

    fn finish_into(&mut self, map: &mut BTreeMap<String, String>, raw: &str) -> Result<(), Error> {
        let pair = std::mem::take(self);
        if !pair.in_value {
            if pair.key.is_empty() {
                return Ok(());
            }
            return Err(Error::MalformedProperties(format!(
                "property {:?} has no value in {raw:?}",
                pair.key
            )));
        }
        map.insert(pair.key, pair.value);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_network_properties() {
        let props = parse_properties("CIDR=10.0.0.0/24|allowDuplicateHost=disable|").unwrap();
        assert_eq!(props.get("CIDR").map(String::as_str), Some("10.0.0.0/24"));
        assert_eq!(
            props.get("allowDuplicateHost").map(String::as_str),
            Some("disable")
        );
        assert_eq!(props.len(), 2);
    }

    #[test]
    fn value_may_contain_equals_sign() {
        let props = parse_properties("comment=a=b|").unwrap();
        assert_eq!(props["comment"], "a=b");
    }

    #[test]
    fn escaped_pipe_stays_in_value() {
        let props = parse_properties(r"comment=left\|right|state=STATIC|").unwrap();
        assert_eq!(props["comment"], "left|right");
        assert_eq!(props["state"], "STATIC");
    }

    #[test]
    fn empty_value_is_kept() {
        let props = parse_properties("location=|").unwrap();
        assert_eq!(props["location"], "");
    }

    #[test]
    fn missing_trailing_pipe_is_accepted() {
        let props = parse_properties("address=10.0.0.5").unwrap();
        assert_eq!(props["address"], "10.0.0.5");
    }

    #[test]
    fn key_without_value_is_rejected() {
        assert!(parse_properties("CIDR|").is_err());
    }

    #[test]
    fn dangling_escape_is_rejected() {
        assert!(parse_properties("comment=abc\\").is_err());
    }

    #[test]
    fn entity_with_null_properties_deserializes() {
        let entity: ApiEntity =
            serde_json::from_str(r#"{"id": 7, "name": null, "type": "IP4Block", "properties": null}"#)
                .unwrap();
        assert_eq!(entity.id, 7);
        assert!(entity.name.is_none());
        assert!(entity.properties.is_empty());
    }

    #[test]
    fn empty_entity_is_detected() {
        let entity: ApiEntity =
            serde_json::from_str(r#"{"id": 0, "name": null, "type": null, "properties": null}"#)
                .unwrap();
        assert!(entity.is_empty());
    }
}
