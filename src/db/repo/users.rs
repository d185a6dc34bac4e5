//! User rows. Registration writes the profile; the withdrawal listing joins
//! it back for display.

use crate::domain::User;

use super::Repository;

impl Repository {
    /// Insert or replace a user row.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub async fn upsert_user(&self, user: &User) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO users (id, full_name, email, phone, role, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                full_name = excluded.full_name,
                email = excluded.email,
                phone = excluded.phone,
                role = excluded.role
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(user.phone.as_deref())
        .bind(user.role.as_str())
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
