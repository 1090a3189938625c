use std::str::FromStr;

use serde::{Deserialize, Serialize, de::Visitor};

use crate::Version;

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct VersionVisitor;

        impl Visitor<'_> for VersionVisitor {
            type Value = Version;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(formatter, "a valid Major.Minor.Patch version")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Version::from_str(v).map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_str(VersionVisitor)
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize() {
        let version: Version = serde_yaml::from_str("7.14.0-SNAPSHOT").expect("version is valid");
        assert_eq!(version.to_string(), "7.14.0-SNAPSHOT");
    }

    #[test]
    fn deserialize_invalid() {
        serde_yaml::from_str::<Version>("7.x").expect_err("version is invalid");
    }

    #[test]
    fn serialize() {
        let version = Version::from_str("8.15.0").expect("version is valid");
        assert_eq!(
            "8.15.0\n",
            serde_yaml::to_string(&version).expect("version must serialize")
        );
    }
}
