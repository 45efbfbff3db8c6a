//! Profile store: at most one medical profile row per user.

use chrono::Utc;

use super::{is_unique_violation, DbPool, DeviceDataRequest, MedicalDataRequest, MedicalProfile, StoreError};

#[derive(Clone)]
pub struct ProfileStore {
    pool: DbPool,
}

impl ProfileStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert-or-update the profile for a user.
    ///
    /// The whole field set is overwritten on update; fields absent from the
    /// request become NULL rather than keeping their previous value. The
    /// existence check and the following write are two separate statements,
    /// so two racing first-time saves can collide on the UNIQUE constraint.
    /// That surfaces as a `Conflict`, never as a corrupt row.
    pub async fn upsert(
        &self,
        user_id: i64,
        data: &MedicalDataRequest,
    ) -> Result<MedicalProfile, StoreError> {
        let now = Utc::now().to_rfc3339();

        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM medical_profiles WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        if existing.is_some() {
            sqlx::query(
                r#"
                UPDATE medical_profiles SET
                    full_name = ?, blood_type = ?, allergies = ?,
                    emergency_contact_name = ?, emergency_contact_phone = ?,
                    medical_conditions = ?, vital_medications = ?,
                    updated_at = ?
                WHERE user_id = ?
                "#,
            )
            .bind(&data.full_name)
            .bind(&data.blood_type)
            .bind(&data.allergies)
            .bind(&data.emergency_contact_name)
            .bind(&data.emergency_contact_phone)
            .bind(&data.medical_conditions)
            .bind(&data.vital_medications)
            .bind(&now)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query(
                r#"
                INSERT INTO medical_profiles
                    (user_id, full_name, blood_type, allergies,
                     emergency_contact_name, emergency_contact_phone,
                     medical_conditions, vital_medications, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(user_id)
            .bind(&data.full_name)
            .bind(&data.blood_type)
            .bind(&data.allergies)
            .bind(&data.emergency_contact_name)
            .bind(&data.emergency_contact_phone)
            .bind(&data.medical_conditions)
            .bind(&data.vital_medications)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict("Profile already exists for this user".to_string())
                } else {
                    StoreError::Database(e)
                }
            })?;
        }

        let profile = sqlx::query_as("SELECT * FROM medical_profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(profile)
    }

    pub async fn get(&self, user_id: i64) -> Result<Option<MedicalProfile>, StoreError> {
        let profile = sqlx::query_as("SELECT * FROM medical_profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    /// Legacy save path: a plain INSERT of the reduced field set with no
    /// existence check. A second save for the same user therefore hits the
    /// UNIQUE constraint and returns `Conflict` instead of updating. This
    /// mirrors the original device-data endpoint and is kept as-is for
    /// backward compatibility.
    pub async fn insert_reduced(
        &self,
        user_id: i64,
        data: &DeviceDataRequest,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO medical_profiles
                (user_id, blood_type, allergies, emergency_contact_phone,
                 vital_medications, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(&data.blood_type)
        .bind(&data.allergies)
        .bind(&data.emergency_contact)
        .bind(&data.medications)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict("Profile already exists for this user".to_string())
            } else {
                StoreError::Database(e)
            }
        })?;
        Ok(())
    }
}
