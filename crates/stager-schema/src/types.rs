//! Newtype wrappers for string identifiers that cross crate boundaries.
//!
//! All newtypes serialize/deserialize as plain strings so they can sit inside
//! wire documents without changing the JSON shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Identifier of one staging attempt. Doubles as the scheduler task guid.
    StagingGuid
);

string_newtype!(
    /// Name of a preloaded root filesystem stack, e.g. `cflinuxfs2`.
    StackName
);

impl StackName {
    /// Root filesystem reference understood by the scheduler.
    pub fn preloaded_rootfs(&self) -> String {
        format!("preloaded:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_guid_display_and_as_ref() {
        let guid = StagingGuid::new("app-guid-task-guid");
        assert_eq!(guid.to_string(), "app-guid-task-guid");
        assert_eq!(guid.as_str(), "app-guid-task-guid");
        assert_eq!(AsRef::<str>::as_ref(&guid), "app-guid-task-guid");
    }

    #[test]
    fn staging_guid_serializes_as_plain_string() {
        let guid = StagingGuid::new("deadbeef");
        let json = serde_json::to_string(&guid).unwrap();
        assert_eq!(json, "\"deadbeef\"");
    }

    #[test]
    fn stack_rootfs_reference() {
        assert_eq!(
            StackName::from("lucid64").preloaded_rootfs(),
            "preloaded:lucid64"
        );
    }

    #[test]
    fn stack_compares_with_str() {
        let stack = StackName::from(String::from("penguin"));
        assert_eq!(stack, "penguin");
        assert!(StackName::default().is_empty());
    }
}
