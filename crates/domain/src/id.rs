//! Typed identifiers.
//!
//! Ids are random UUIDs. Their text form carries a short kind prefix
//! (`obs-…`, `ntf-…`) so log lines stay unambiguous; the JSON form is the
//! bare UUID.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[must_use]
            pub fn as_uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", Self::PREFIX, self.0)
            }
        }

        /// Accepts the prefixed text form as well as a bare UUID.
        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bare = s
                    .strip_prefix(Self::PREFIX)
                    .and_then(|rest| rest.strip_prefix('-'))
                    .unwrap_or(s);
                Uuid::parse_str(bare).map(Self)
            }
        }
    };
}

typed_id!(
    /// A connected realtime observer.
    ObserverId,
    "obs"
);

typed_id!(
    /// A [`Notification`](crate::notification::Notification).
    NotificationId,
    "ntf"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_generate_unique_ids_when_called_twice() {
        assert_ne!(ObserverId::new(), ObserverId::new());
    }

    #[test]
    fn should_prefix_text_form_with_kind() {
        let id = ObserverId::new();
        assert!(id.to_string().starts_with("obs-"));
        assert_eq!(id.to_string().parse::<ObserverId>().unwrap(), id);
    }

    #[test]
    fn should_parse_bare_uuid() {
        let id = NotificationId::new();
        let parsed: NotificationId = id.as_uuid().to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn should_serialize_as_bare_uuid() {
        let id = NotificationId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::json!(id.as_uuid().to_string()));
    }

    #[test]
    fn should_return_error_when_parsing_invalid_id() {
        assert!(ObserverId::from_str("obs-not-a-uuid").is_err());
        assert!(ObserverId::from_str("").is_err());
    }
}
