//! Identity: this node's name and group on the presence network.
//!
//! The name doubles as the device topic segment (`/device/<name>`), so it may
//! not contain topic separators or wildcards.

use crate::protocol::topics;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("Device name must not be empty")]
    EmptyName,
    #[error("Device group must not be empty")]
    EmptyGroup,
    #[error("Invalid character {found:?} in {field}: {value}")]
    InvalidCharacter {
        field: &'static str,
        value: String,
        found: char,
    },
}

/// Stable identity of this node, set once at startup.
///
/// # Examples
/// ```
/// use presence_core::Identity;
///
/// let me = Identity::new("host1", "demo").unwrap();
/// assert!(me.is_self("host1"));
/// assert_eq!(me.device_topic(), "/device/host1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    name: String,
    group: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Result<Self, IdentityError> {
        let name = name.into();
        let group = group.into();

        if name.is_empty() {
            return Err(IdentityError::EmptyName);
        }
        if group.is_empty() {
            return Err(IdentityError::EmptyGroup);
        }
        check_topic_segment("name", &name)?;
        check_topic_segment("group", &group)?;

        Ok(Self { name, group })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Whether a device name refers to this node.
    pub fn is_self(&self, device_name: &str) -> bool {
        self.name == device_name
    }

    /// Our own direct topic.
    pub fn device_topic(&self) -> String {
        topics::device_topic(&self.name)
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.group)
    }
}

fn check_topic_segment(field: &'static str, value: &str) -> Result<(), IdentityError> {
    match value.chars().find(|c| matches!(c, '/' | '+' | '#')) {
        Some(found) => Err(IdentityError::InvalidCharacter {
            field,
            value: value.to_string(),
            found,
        }),
        None => Ok(()),
    }
}
