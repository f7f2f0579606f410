//! Jupiter 接口里以字符串传输的数值与地址字段。

pub mod field_as_string {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.trim()
            .parse()
            .map_err(|err| de::Error::custom(format!("无法解析 `{raw}`: {err}")))
    }
}

pub mod option_field_as_string {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        match value {
            Some(inner) => serializer.collect_str(inner),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|err| de::Error::custom(format!("无法解析 `{raw}`: {err}"))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use solana_sdk::pubkey::Pubkey;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        #[serde(with = "super::field_as_string")]
        amount: u64,
        #[serde(with = "super::option_field_as_string", default)]
        account: Option<Pubkey>,
    }

    #[test]
    fn numbers_travel_as_strings() {
        let sample = Sample {
            amount: 42,
            account: None,
        };
        let encoded = serde_json::to_string(&sample).expect("encode");
        assert_eq!(encoded, r#"{"amount":"42","account":null}"#);

        let decoded: Sample =
            serde_json::from_str(r#"{"amount":" 7 ","account":""}"#).expect("decode");
        assert_eq!(decoded.amount, 7);
        assert!(decoded.account.is_none());

        assert!(serde_json::from_str::<Sample>(r#"{"amount":"x"}"#).is_err());
    }
}
