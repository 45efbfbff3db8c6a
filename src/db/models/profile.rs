//! Medical profile models.
//!
//! A user owns at most one profile row. All medical fields are optional
//! free-text strings; a save overwrites the whole field set rather than
//! merging with what was stored before.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MedicalProfile {
    pub id: i64,
    pub user_id: i64,
    pub full_name: Option<String>,
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub medical_conditions: Option<String>,
    pub vital_medications: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Incoming field set for a profile save. Absent fields are stored as NULL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicalDataRequest {
    pub full_name: Option<String>,
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub medical_conditions: Option<String>,
    pub vital_medications: Option<String>,
}

/// Profile as returned to the owning user: the medical fields and
/// timestamps, without row ids.
#[derive(Debug, Serialize)]
pub struct MedicalProfileResponse {
    pub full_name: Option<String>,
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub medical_conditions: Option<String>,
    pub vital_medications: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<MedicalProfile> for MedicalProfileResponse {
    fn from(profile: MedicalProfile) -> Self {
        Self {
            full_name: profile.full_name,
            blood_type: profile.blood_type,
            allergies: profile.allergies,
            emergency_contact_name: profile.emergency_contact_name,
            emergency_contact_phone: profile.emergency_contact_phone,
            medical_conditions: profile.medical_conditions,
            vital_medications: profile.vital_medications,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

/// Reduced field set accepted by the legacy device-data endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceDataRequest {
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    pub emergency_contact: Option<String>,
    pub medications: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub success: bool,
    pub message: String,
}
