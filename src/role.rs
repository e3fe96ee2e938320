//! Roles and the capability table.
//!
//! DESIGN
//! ======
//! Every role comparison in the clinic goes through this module. Route
//! allow-lists hold `Role` values, and role-specific controls (cancel an
//! appointment, upload a lab result) ask `Capability::permits` instead of
//! comparing role strings in each view.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// ROLE
// =============================================================================

/// The closed set of clinic roles stored on a user's profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[serde(alias = "medico")]
    Doctor,
    #[serde(alias = "paciente")]
    Patient,
}

impl Role {
    pub const ALL: [Self; 3] = [Self::Admin, Self::Doctor, Self::Patient];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Doctor => "doctor",
            Self::Patient => "patient",
        }
    }

    /// Parse a stored role token. Accepts the legacy `medico` / `paciente`
    /// tokens written by older profile documents.
    #[must_use]
    pub fn parse_token(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "doctor" | "medico" => Some(Self::Doctor),
            "patient" | "paciente" => Some(Self::Patient),
            _ => None,
        }
    }

    /// Whether this role holds `capability`.
    #[must_use]
    pub fn can(self, capability: Capability) -> bool {
        capability.allowed_roles().contains(&self)
    }

    /// Post-login home route for this role.
    #[must_use]
    pub fn home_path(self, uid: &str) -> String {
        match self {
            Self::Admin => "/".to_owned(),
            Self::Doctor => "/agenda".to_owned(),
            Self::Patient => format!("/pacientes/{uid}"),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_token(s).ok_or_else(|| UnknownRole(s.to_owned()))
    }
}

/// Deserialize an optional role, mapping unrecognised tokens to `None`.
///
/// A profile with a garbage role must still load so the session can resolve
/// to "role unknown" instead of failing the whole lookup.
///
/// # Errors
///
/// Returns an error only when the field is not a string or null.
pub fn lenient_role<'de, D>(deserializer: D) -> Result<Option<Role>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Role::parse_token))
}

// =============================================================================
// CAPABILITIES
// =============================================================================

/// Role-gated controls rendered inside otherwise shared views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    CancelAppointment,
    WritePrescription,
    UploadLabResult,
    ScheduleAppointment,
    ManageDoctors,
    ViewOwnLabResults,
}

impl Capability {
    pub const ALL: [Self; 6] = [
        Self::CancelAppointment,
        Self::WritePrescription,
        Self::UploadLabResult,
        Self::ScheduleAppointment,
        Self::ManageDoctors,
        Self::ViewOwnLabResults,
    ];

    #[must_use]
    pub fn allowed_roles(self) -> &'static [Role] {
        match self {
            Self::CancelAppointment | Self::WritePrescription | Self::UploadLabResult => {
                &[Role::Doctor, Role::Admin]
            }
            Self::ScheduleAppointment => &[Role::Admin, Role::Patient],
            Self::ManageDoctors => &[Role::Admin],
            Self::ViewOwnLabResults => &[Role::Patient],
        }
    }

    /// Check an optional role. An unknown role holds no capabilities.
    #[must_use]
    pub fn permits(self, role: Option<Role>) -> bool {
        role.is_some_and(|r| r.can(self))
    }
}

#[cfg(test)]
#[path = "role_test.rs"]
mod tests;
