//! Registration repository.

use chrono::{DateTime, Utc};
use domain::models::{NewRegistration, PaymentStatus, Registration};
use serde_json::json;
use uuid::Uuid;

use crate::entities::RegistrationEntity;
use crate::store::{
    decode_row, timestamp_value, Filter, Row, Select, SharedStore, StoreError, StoreErrorKind,
    Table,
};

/// Insert payload layouts, from the current schema down to the oldest.
///
/// Each shape names a different set of optional columns so one of them fits
/// whichever registrations schema version the store runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationShape {
    /// Date of birth and `has_health_issue` / `health_issue_details`.
    Full,
    /// Date of birth and `uses_controlled_medication` / `medication_details`.
    LegacyHealthWithBirthDate,
    /// Health-issue columns without date of birth.
    HealthWithoutBirthDate,
    /// Legacy medication columns without date of birth.
    LegacyHealthWithoutBirthDate,
    /// Identity, contact and form fields only.
    Base,
}

impl RegistrationShape {
    /// Shapes in the order they are attempted.
    pub const ALL: [RegistrationShape; 5] = [
        RegistrationShape::Full,
        RegistrationShape::LegacyHealthWithBirthDate,
        RegistrationShape::HealthWithoutBirthDate,
        RegistrationShape::LegacyHealthWithoutBirthDate,
        RegistrationShape::Base,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationShape::Full => "full",
            RegistrationShape::LegacyHealthWithBirthDate => "legacy_health_with_birth_date",
            RegistrationShape::HealthWithoutBirthDate => "health_without_birth_date",
            RegistrationShape::LegacyHealthWithoutBirthDate => "legacy_health_without_birth_date",
            RegistrationShape::Base => "base",
        }
    }

    fn includes_birth_date(&self) -> bool {
        matches!(
            self,
            RegistrationShape::Full | RegistrationShape::LegacyHealthWithBirthDate
        )
    }

    /// Builds the insert row for this shape.
    pub fn payload(&self, registration: &NewRegistration) -> Row {
        let mut row = Row::new();
        row.insert("retreat_id".into(), json!(registration.retreat_id));
        row.insert("full_name".into(), json!(registration.full_name));
        row.insert("phone".into(), json!(registration.phone));
        row.insert("email".into(), json!(registration.email));
        row.insert("parish".into(), json!(registration.parish));
        row.insert("shirt_size".into(), json!(registration.shirt_size));
        row.insert(
            "emergency_contact_name".into(),
            json!(registration.emergency_contact_name),
        );
        row.insert(
            "emergency_contact_phone".into(),
            json!(registration.emergency_contact_phone),
        );
        row.insert(
            "payment_status".into(),
            json!(registration.payment_status().as_str()),
        );
        row.insert("terms_accepted".into(), json!(true));
        row.insert(
            "terms_accepted_at".into(),
            timestamp_value(registration.terms_accepted_at),
        );

        if self.includes_birth_date() {
            row.insert("date_of_birth".into(), json!(registration.date_of_birth));
        }

        match self {
            RegistrationShape::Full | RegistrationShape::HealthWithoutBirthDate => {
                row.insert("has_health_issue".into(), json!(registration.has_health_issue));
                row.insert(
                    "health_issue_details".into(),
                    json!(registration.health_issue_details),
                );
            }
            RegistrationShape::LegacyHealthWithBirthDate
            | RegistrationShape::LegacyHealthWithoutBirthDate => {
                row.insert(
                    "uses_controlled_medication".into(),
                    json!(registration.has_health_issue),
                );
                row.insert(
                    "medication_details".into(),
                    json!(registration.health_issue_details),
                );
            }
            RegistrationShape::Base => {}
        }

        row
    }
}

/// Repository for registration rows.
#[derive(Clone)]
pub struct RegistrationRepository {
    store: SharedStore,
}

impl RegistrationRepository {
    /// Creates a new RegistrationRepository over the given store.
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Insert a registration using one payload shape.
    pub async fn insert_shape(
        &self,
        registration: &NewRegistration,
        shape: RegistrationShape,
    ) -> Result<Registration, StoreError> {
        let rows = self
            .store
            .insert(Table::Registrations, vec![shape.payload(registration)])
            .await?;
        match rows.into_iter().next() {
            Some(row) => decode(row),
            None => Err(StoreError::new(
                StoreErrorKind::Other,
                "insert returned no rows",
            )),
        }
    }

    /// Find a registration by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Registration>, StoreError> {
        self.store
            .select_one(Table::Registrations, Filter::new().eq_ser("id", id))
            .await?
            .map(decode)
            .transpose()
    }

    /// List registrations of a retreat, newest first.
    pub async fn list_by_retreat(&self, retreat_id: Uuid) -> Result<Vec<Registration>, StoreError> {
        let query = Select::new(Filter::new().eq_ser("retreat_id", retreat_id))
            .order_by("registered_at", true);
        self.store
            .select(Table::Registrations, &query)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Persist payment instructions and move to `link_sent`.
    ///
    /// Applies only while the row is still in `from`; returns `None` otherwise.
    pub async fn mark_link_sent(
        &self,
        id: Uuid,
        from: PaymentStatus,
        payment_link: &str,
    ) -> Result<Option<Registration>, StoreError> {
        let mut changes = Row::new();
        changes.insert("payment_link".into(), json!(payment_link));
        changes.insert(
            "payment_status".into(),
            json!(PaymentStatus::LinkSent.as_str()),
        );
        self.update_from(id, from, changes).await
    }

    /// Move to `paid`, stamping the confirmation time and snapshotting the group link.
    ///
    /// Applies only while the row is still in `from`; returns `None` otherwise.
    pub async fn mark_paid(
        &self,
        id: Uuid,
        from: PaymentStatus,
        whatsapp_group_link: &str,
        confirmed_at: DateTime<Utc>,
    ) -> Result<Option<Registration>, StoreError> {
        let mut changes = Row::new();
        changes.insert("payment_status".into(), json!(PaymentStatus::Paid.as_str()));
        changes.insert("payment_confirmed_at".into(), timestamp_value(confirmed_at));
        changes.insert("whatsapp_group_link".into(), json!(whatsapp_group_link));
        self.update_from(id, from, changes).await
    }

    /// Hard-delete a registration. Returns whether a row was removed.
    pub async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let rows = self
            .store
            .delete(Table::Registrations, &Filter::new().eq_ser("id", id))
            .await?;
        Ok(!rows.is_empty())
    }

    async fn update_from(
        &self,
        id: Uuid,
        from: PaymentStatus,
        changes: Row,
    ) -> Result<Option<Registration>, StoreError> {
        let filter = Filter::new()
            .eq_ser("id", id)
            .eq("payment_status", from.as_str());
        let rows = self
            .store
            .update(Table::Registrations, &filter, changes)
            .await?;
        rows.into_iter().next().map(decode).transpose()
    }
}

fn decode(row: Row) -> Result<Registration, StoreError> {
    decode_row::<RegistrationEntity>(Table::Registrations, row).map(Registration::from)
}
