// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Opaque identifier newtypes.
//!
//! `UserId` and `ProjectId` are supplied by the caller (the auth layer that
//! sits outside this crate's scope) rather than generated here, so they're
//! plain string wrappers rather than nanoid-backed ids.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
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

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

id_newtype!(
    /// Identifies the authenticated end user that owns a workspace.
    UserId
);
id_newtype!(
    /// Identifies a project — one mobile-app "project" maps to one workspace.
    ProjectId
);
id_newtype!(
    /// Identifies a running container, as returned by the container runtime.
    ContainerId
);
id_newtype!(
    /// Identifies a container-runtime host in a multi-host deployment.
    ServerId
);

/// Composite key under which session records are stored: `(userId, projectId)`
/// kept as a dedicated type rather than a bare tuple so registry call sites
/// read `SessionKey::new(user, project)` instead of an anonymous pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub user_id: UserId,
    pub project_id: ProjectId,
}

impl SessionKey {
    pub fn new(user_id: impl Into<UserId>, project_id: impl Into<ProjectId>) -> Self {
        Self { user_id: user_id.into(), project_id: project_id.into() }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.project_id)
    }
}

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
