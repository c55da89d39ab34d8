use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One class of protective equipment, identified by the detector's class id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PpeTag(u16);

#[derive(Debug, Clone, Copy)]
pub struct TagInfo {
    pub tag: PpeTag,
    pub key: &'static str,
    pub name: &'static str,
}

pub const HELMET: PpeTag = PpeTag(0);
pub const SHIELD: PpeTag = PpeTag(1);
pub const JACKET: PpeTag = PpeTag(2);
pub const DUST_MASK: PpeTag = PpeTag(3);
pub const EYE_WEAR: PpeTag = PpeTag(4);
pub const GLOVE: PpeTag = PpeTag(5);
pub const BOOTS: PpeTag = PpeTag(6);

pub const CATALOG: &[TagInfo] = &[
    TagInfo {
        tag: HELMET,
        key: "helmet",
        name: "Protective Helmet",
    },
    TagInfo {
        tag: SHIELD,
        key: "shield",
        name: "Shield",
    },
    TagInfo {
        tag: JACKET,
        key: "jacket",
        name: "Jacket",
    },
    TagInfo {
        tag: DUST_MASK,
        key: "dust-mask",
        name: "Dust Mask",
    },
    TagInfo {
        tag: EYE_WEAR,
        key: "eye-wear",
        name: "Eye Wear",
    },
    TagInfo {
        tag: GLOVE,
        key: "glove",
        name: "Glove",
    },
    TagInfo {
        tag: BOOTS,
        key: "boots",
        name: "Protective Boots",
    },
];

impl PpeTag {
    pub const fn from_class(class_id: u16) -> Self {
        Self(class_id)
    }

    pub fn class_id(&self) -> u16 {
        self.0
    }

    pub fn info(&self) -> Option<&'static TagInfo> {
        CATALOG.iter().find(|info| info.tag == *self)
    }

    /// Catalog key, if the class is one the deployed model is known to emit.
    pub fn key(&self) -> Option<&'static str> {
        self.info().map(|info| info.key)
    }

    pub fn name(&self) -> Option<&'static str> {
        self.info().map(|info| info.name)
    }
}

impl fmt::Display for PpeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key() {
            Some(key) => f.write_str(key),
            None => write!(f, "class-{}", self.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown PPE tag '{0}' (expected a catalog key or a numeric class id)")]
pub struct UnknownTag(pub String);

impl FromStr for PpeTag {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(class_id) = trimmed.parse::<u16>() {
            return Ok(PpeTag(class_id));
        }
        let normalized = trimmed.to_ascii_lowercase().replace(['_', ' '], "-");
        CATALOG
            .iter()
            .find(|info| info.key == normalized)
            .map(|info| info.tag)
            .ok_or_else(|| UnknownTag(s.to_string()))
    }
}

impl Serialize for PpeTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.key() {
            Some(key) => serializer.serialize_str(key),
            None => serializer.serialize_u16(self.0),
        }
    }
}

impl<'de> Deserialize<'de> for PpeTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Id(u16),
            Key(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Id(id) => Ok(PpeTag(id)),
            Raw::Key(key) => key.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keys_and_ids() {
        assert_eq!("helmet".parse::<PpeTag>(), Ok(HELMET));
        assert_eq!("Dust_Mask".parse::<PpeTag>(), Ok(DUST_MASK));
        assert_eq!("6".parse::<PpeTag>(), Ok(BOOTS));
        assert_eq!("42".parse::<PpeTag>(), Ok(PpeTag::from_class(42)));
        assert!("hat".parse::<PpeTag>().is_err());
    }

    #[test]
    fn unknown_classes_stay_opaque() {
        let tag = PpeTag::from_class(17);
        assert_eq!(tag.name(), None);
        assert_eq!(tag.to_string(), "class-17");
    }

    #[test]
    fn serde_uses_catalog_key_when_known() {
        let json = serde_json::to_string(&[GLOVE, PpeTag::from_class(9)]).unwrap();
        assert_eq!(json, r#"["glove",9]"#);
        let back: Vec<PpeTag> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![GLOVE, PpeTag::from_class(9)]);
    }
}
