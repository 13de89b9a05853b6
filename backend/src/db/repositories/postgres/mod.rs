//! Postgres repository implementation using Diesel.
//!
//! Entities are stored as JSONB documents with the columns needed for
//! lookups, ordering and uniqueness promoted next to them. Uniqueness
//! violations surface as `RepositoryError::Conflict`. Connection settings
//! come from the `[postgres]` table (see [`PostgresSettings`]).

use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use serde_json::Value;
use std::time::Duration;
use tokio::task;
use uuid::Uuid;

use crate::db::repo_config::PostgresSettings;
use crate::db::repository::supply::ensure_unit_available;
use crate::db::repository::{
    BrokerRepository, CertificateRepository, ComplianceRepository, ErrorContext,
    RepositoryError, RepositoryResult, SupplyRepository,
};
use crate::models::{
    BrokerLevel, BrokerLevelTag, BrokerProfile, CapacitySnapshot, CertificateId,
    CertificateProduct, CertificateVoucher, Commission, ConfirmedReservation, ConsentRecord,
    ContactRequest, EvidenceId, EvidenceRecord, PaymentRecord, ProductId, ProductSpec,
    PropertyId, ReferralAttribution, ReferralEdge, RequestId, ReservationRequest,
    SupplyProperty, Testimonial, TestimonialId, TestimonialStatus, UserAccount,
    UserCertificate, UserId, VoucherId, WaitlistEntry, WaitlistStatus,
};
use crate::services::commissions::default_levels;

mod models;
mod schema;

use models::*;
use schema::*;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// Diesel-backed repository for Postgres.
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    max_retries: u32,
    retry_delay_ms: u64,
}

impl PostgresRepository {
    /// Build the pool, run pending migrations and seed the broker levels.
    pub fn new(settings: &PostgresSettings) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&settings.database_url);

        let pool = Pool::builder()
            .max_size(settings.max_connections)
            .min_idle(Some(settings.min_connections))
            .connection_timeout(Duration::from_secs(settings.connect_timeout))
            .idle_timeout(Some(Duration::from_secs(settings.idle_timeout)))
            .test_on_check_out(true)
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", settings.max_connections)),
                )
            })?;

        {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("get_connection_for_migrations"),
                )
            })?;
            conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
                RepositoryError::internal_with_context(
                    format!("Migration failed: {}", e),
                    ErrorContext::new("run_migrations"),
                )
            })?;
            Self::seed_broker_levels(&mut conn)?;
        }

        Ok(Self {
            pool,
            max_retries: settings.max_retries,
            retry_delay_ms: settings.retry_delay_ms,
        })
    }

    /// Insert the default level table when none is stored.
    fn seed_broker_levels(conn: &mut PgConnection) -> RepositoryResult<()> {
        let stored: i64 = broker_levels::table
            .count()
            .get_result(conn)
            .map_err(map_diesel_error)?;
        if stored > 0 {
            return Ok(());
        }

        let rows = default_levels()
            .iter()
            .map(BrokerLevelRow::from_model)
            .collect::<RepositoryResult<Vec<_>>>()?;
        diesel::insert_into(broker_levels::table)
            .values(&rows)
            .on_conflict_do_nothing()
            .execute(conn)
            .map_err(map_diesel_error)?;
        log::info!("Seeded {} broker levels", rows.len());
        Ok(())
    }

    /// Run `f` on a pooled connection off the async runtime, retrying
    /// retryable failures with a doubling delay.
    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.pool.clone();
        let max_retries = self.max_retries;
        let mut retry_delay = Duration::from_millis(self.retry_delay_ms);

        task::spawn_blocking(move || {
            let mut last_error = None;
            for attempt in 0..=max_retries {
                if attempt > 0 {
                    std::thread::sleep(retry_delay);
                    retry_delay *= 2;
                }

                let mut conn = match pool.get() {
                    Ok(c) => c,
                    Err(e) => {
                        last_error = Some(RepositoryError::connection_with_context(
                            e.to_string(),
                            ErrorContext::new("get_connection")
                                .with_details(format!("attempt={}", attempt + 1))
                                .retryable(),
                        ));
                        continue;
                    }
                };

                match f.clone()(&mut conn) {
                    Ok(result) => return Ok(result),
                    Err(e) if e.is_retryable() => {
                        log::warn!("Retryable database error on attempt {}: {}", attempt + 1, e);
                        last_error = Some(e);
                    }
                    Err(e) => return Err(e),
                }
            }

            Err(last_error.unwrap_or_else(|| {
                RepositoryError::internal("Max retries exceeded with no error captured")
            }))
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }
}

fn map_diesel_error(err: diesel::result::Error) -> RepositoryError {
    RepositoryError::from(err)
}

/// Load, mutate and store a broker profile inside one transaction.
fn modify_broker_profile<F>(
    conn: &mut PgConnection,
    user_id: UserId,
    operation: &str,
    apply: F,
) -> RepositoryResult<()>
where
    F: FnOnce(&mut BrokerProfile),
{
    conn.transaction(|tx| {
        let data: Value = broker_profiles::table
            .find(user_id.value())
            .select(broker_profiles::data)
            .for_update()
            .first(tx)
            .optional()
            .map_err(map_diesel_error)?
            .ok_or_else(|| {
                RepositoryError::missing("broker_profile", user_id).with_operation(operation)
            })?;
        let mut profile: BrokerProfile = from_doc(data)?;
        apply(&mut profile);
        let row = BrokerProfileRow::from_model(&profile)?;
        diesel::update(broker_profiles::table.find(user_id.value()))
            .set(&row)
            .execute(tx)
            .map_err(map_diesel_error)?;
        Ok(())
    })
}

#[async_trait]
impl SupplyRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(|conn| {
            sql_query("SELECT 1")
                .execute(conn)
                .map(|_| true)
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn upsert_property(&self, property: &SupplyProperty) -> RepositoryResult<()> {
        let row = PropertyRow::from_model(property)?;
        self.with_conn(move |conn| {
            diesel::insert_into(supply_properties::table)
                .values(&row)
                .on_conflict(supply_properties::id)
                .do_update()
                .set(&row)
                .execute(conn)
                .map(|_| ())
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn get_property(&self, id: PropertyId) -> RepositoryResult<SupplyProperty> {
        self.with_conn(move |conn| {
            let data: Option<Value> = supply_properties::table
                .find(id.value())
                .select(supply_properties::data)
                .first(conn)
                .optional()
                .map_err(map_diesel_error)?;
            data.map(from_doc)
                .unwrap_or_else(|| Err(RepositoryError::missing("property", id)))
        })
        .await
    }

    async fn list_properties(&self) -> RepositoryResult<Vec<SupplyProperty>> {
        self.with_conn(|conn| {
            let rows: Vec<Value> = supply_properties::table
                .select(supply_properties::data)
                .order((supply_properties::name.asc(), supply_properties::id.asc()))
                .load(conn)
                .map_err(map_diesel_error)?;
            from_docs(rows)
        })
        .await
    }

    async fn insert_confirmed_reservation(
        &self,
        reservation: &ConfirmedReservation,
    ) -> RepositoryResult<()> {
        let row = ConfirmedReservationRow::from_model(reservation)?;
        self.with_conn(move |conn| {
            diesel::insert_into(confirmed_reservations::table)
                .values(&row)
                .execute(conn)
                .map(|_| ())
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn list_confirmed_reservations(&self) -> RepositoryResult<Vec<ConfirmedReservation>> {
        self.with_conn(|conn| {
            let rows: Vec<Value> = confirmed_reservations::table
                .select(confirmed_reservations::data)
                .order(confirmed_reservations::created_at.asc())
                .load(conn)
                .map_err(map_diesel_error)?;
            from_docs(rows)
        })
        .await
    }

    async fn insert_capacity_snapshot(&self, snapshot: &CapacitySnapshot) -> RepositoryResult<()> {
        let row = CapacityRow::from_model(snapshot)?;
        self.with_conn(move |conn| {
            diesel::insert_into(capacity_status::table)
                .values(&row)
                .execute(conn)
                .map(|_| ())
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn latest_capacity_snapshot(&self) -> RepositoryResult<Option<CapacitySnapshot>> {
        self.with_conn(|conn| {
            let data: Option<Value> = capacity_status::table
                .select(capacity_status::data)
                .order((
                    capacity_status::calculated_at.desc(),
                    capacity_status::seq.desc(),
                ))
                .first(conn)
                .optional()
                .map_err(map_diesel_error)?;
            data.map(from_doc).transpose()
        })
        .await
    }

    async fn upsert_product(&self, product: &CertificateProduct) -> RepositoryResult<()> {
        let row = ProductRow::from_model(product)?;
        self.with_conn(move |conn| {
            diesel::insert_into(certificate_products::table)
                .values(&row)
                .on_conflict(certificate_products::id)
                .do_update()
                .set(&row)
                .execute(conn)
                .map(|_| ())
                .map_err(|e| {
                    map_diesel_error(e).with_operation("upsert_product")
                })
        })
        .await
    }

    async fn get_product(&self, id: ProductId) -> RepositoryResult<CertificateProduct> {
        self.with_conn(move |conn| {
            let data: Option<Value> = certificate_products::table
                .find(id.value())
                .select(certificate_products::data)
                .first(conn)
                .optional()
                .map_err(map_diesel_error)?;
            data.map(from_doc)
                .unwrap_or_else(|| Err(RepositoryError::missing("certificate_product", id)))
        })
        .await
    }

    async fn find_product_by_spec(
        &self,
        spec: ProductSpec,
    ) -> RepositoryResult<Option<CertificateProduct>> {
        let max_pax = i16::from(spec.max_pax.guests());
        let estancias = i16::from(spec.estancias);
        self.with_conn(move |conn| {
            let data: Option<Value> = certificate_products::table
                .filter(certificate_products::max_pax.eq(max_pax))
                .filter(certificate_products::estancias.eq(estancias))
                .select(certificate_products::data)
                .first(conn)
                .optional()
                .map_err(map_diesel_error)?;
            data.map(from_doc).transpose()
        })
        .await
    }

    async fn list_products(&self) -> RepositoryResult<Vec<CertificateProduct>> {
        self.with_conn(|conn| {
            let rows: Vec<Value> = certificate_products::table
                .select(certificate_products::data)
                .order((
                    certificate_products::max_pax.asc(),
                    certificate_products::estancias.asc(),
                ))
                .load(conn)
                .map_err(map_diesel_error)?;
            from_docs(rows)
        })
        .await
    }

    async fn claim_product_unit(
        &self,
        id: ProductId,
        total_cap: u32,
    ) -> RepositoryResult<CertificateProduct> {
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                // Lock the whole catalog so the global total cannot move underneath.
                let rows: Vec<Value> = certificate_products::table
                    .select(certificate_products::data)
                    .order(certificate_products::id.asc())
                    .for_update()
                    .load(tx)
                    .map_err(map_diesel_error)?;
                let mut catalog: Vec<CertificateProduct> = from_docs(rows)?;
                let total_sold: u32 = catalog.iter().map(|p| p.sold_count).sum();
                let product = catalog
                    .iter_mut()
                    .find(|p| p.id == id)
                    .ok_or_else(|| RepositoryError::missing("certificate_product", id))?;
                ensure_unit_available(product, total_sold, total_cap)?;
                product.sold_count += 1;
                let row = ProductRow::from_model(product)?;
                diesel::update(certificate_products::table.find(id.value()))
                    .set(&row)
                    .execute(tx)
                    .map_err(map_diesel_error)?;
                Ok(product.clone())
            })
        })
        .await
    }

    async fn release_product_unit(&self, id: ProductId) -> RepositoryResult<CertificateProduct> {
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                let data: Value = certificate_products::table
                    .find(id.value())
                    .select(certificate_products::data)
                    .for_update()
                    .first(tx)
                    .optional()
                    .map_err(map_diesel_error)?
                    .ok_or_else(|| RepositoryError::missing("certificate_product", id))?;
                let mut product: CertificateProduct = from_doc(data)?;
                product.sold_count = product.sold_count.saturating_sub(1);
                let row = ProductRow::from_model(&product)?;
                diesel::update(certificate_products::table.find(id.value()))
                    .set(&row)
                    .execute(tx)
                    .map_err(map_diesel_error)?;
                Ok(product)
            })
        })
        .await
    }

    async fn insert_waitlist_entry(&self, entry: &WaitlistEntry) -> RepositoryResult<()> {
        let row = WaitlistRow::from_model(entry)?;
        self.with_conn(move |conn| {
            diesel::insert_into(waitlist_entries::table)
                .values(&row)
                .execute(conn)
                .map(|_| ())
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn count_waiting(&self) -> RepositoryResult<u32> {
        self.with_conn(|conn| {
            let count: i64 = waitlist_entries::table
                .filter(waitlist_entries::status.eq(WaitlistStatus::Waiting.as_str()))
                .count()
                .get_result(conn)
                .map_err(map_diesel_error)?;
            Ok(count as u32)
        })
        .await
    }
}

#[async_trait]
impl CertificateRepository for PostgresRepository {
    async fn upsert_user(&self, user: &UserAccount) -> RepositoryResult<()> {
        let row = UserRow::from_model(user)?;
        self.with_conn(move |conn| {
            diesel::insert_into(users::table)
                .values(&row)
                .on_conflict(users::id)
                .do_update()
                .set(&row)
                .execute(conn)
                .map(|_| ())
                .map_err(|e| map_diesel_error(e).with_operation("upsert_user"))
        })
        .await
    }

    async fn get_user(&self, id: UserId) -> RepositoryResult<UserAccount> {
        self.with_conn(move |conn| {
            let data: Option<Value> = users::table
                .find(id.value())
                .select(users::data)
                .first(conn)
                .optional()
                .map_err(map_diesel_error)?;
            data.map(from_doc)
                .unwrap_or_else(|| Err(RepositoryError::missing("user", id)))
        })
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> RepositoryResult<Option<UserAccount>> {
        let email = email.trim().to_lowercase();
        self.with_conn(move |conn| {
            let data: Option<Value> = users::table
                .filter(users::email.eq(&email))
                .select(users::data)
                .first(conn)
                .optional()
                .map_err(map_diesel_error)?;
            data.map(from_doc).transpose()
        })
        .await
    }

    async fn reset_referral_counters(&self) -> RepositoryResult<usize> {
        self.with_conn(|conn| {
            conn.transaction(|tx| {
                let rows: Vec<Value> = users::table
                    .filter(users::referrals_this_month.gt(0))
                    .select(users::data)
                    .for_update()
                    .load(tx)
                    .map_err(map_diesel_error)?;
                let accounts: Vec<UserAccount> = from_docs(rows)?;
                for mut account in accounts.iter().cloned() {
                    account.referrals_this_month = 0;
                    let row = UserRow::from_model(&account)?;
                    diesel::update(users::table.find(account.id.value()))
                        .set(&row)
                        .execute(tx)
                        .map_err(map_diesel_error)?;
                }
                Ok(accounts.len())
            })
        })
        .await
    }

    async fn insert_certificate(&self, certificate: &UserCertificate) -> RepositoryResult<()> {
        let row = CertificateRow::from_model(certificate)?;
        self.with_conn(move |conn| {
            diesel::insert_into(user_certificates::table)
                .values(&row)
                .execute(conn)
                .map(|_| ())
                .map_err(|e| map_diesel_error(e).with_operation("insert_certificate"))
        })
        .await
    }

    async fn get_certificate(&self, id: CertificateId) -> RepositoryResult<UserCertificate> {
        self.with_conn(move |conn| {
            let data: Option<Value> = user_certificates::table
                .find(id.value())
                .select(user_certificates::data)
                .first(conn)
                .optional()
                .map_err(map_diesel_error)?;
            data.map(from_doc)
                .unwrap_or_else(|| Err(RepositoryError::missing("certificate", id)))
        })
        .await
    }

    async fn update_certificate(&self, certificate: &UserCertificate) -> RepositoryResult<()> {
        let id = certificate.id;
        let row = CertificateRow::from_model(certificate)?;
        self.with_conn(move |conn| {
            let updated = diesel::update(user_certificates::table.find(id.value()))
                .set(&row)
                .execute(conn)
                .map_err(map_diesel_error)?;
            if updated == 0 {
                return Err(RepositoryError::missing("certificate", id));
            }
            Ok(())
        })
        .await
    }

    async fn list_certificates(&self) -> RepositoryResult<Vec<UserCertificate>> {
        self.with_conn(|conn| {
            let rows: Vec<Value> = user_certificates::table
                .select(user_certificates::data)
                .order((
                    user_certificates::created_at.asc(),
                    user_certificates::id.asc(),
                ))
                .load(conn)
                .map_err(map_diesel_error)?;
            from_docs(rows)
        })
        .await
    }

    async fn list_certificates_for_user(
        &self,
        user_id: UserId,
    ) -> RepositoryResult<Vec<UserCertificate>> {
        self.with_conn(move |conn| {
            let rows: Vec<Value> = user_certificates::table
                .filter(user_certificates::user_id.eq(user_id.value()))
                .select(user_certificates::data)
                .order((
                    user_certificates::created_at.asc(),
                    user_certificates::id.asc(),
                ))
                .load(conn)
                .map_err(map_diesel_error)?;
            from_docs(rows)
        })
        .await
    }

    async fn insert_voucher(&self, voucher: &CertificateVoucher) -> RepositoryResult<()> {
        let row = VoucherRow::from_model(voucher)?;
        self.with_conn(move |conn| {
            diesel::insert_into(certificate_vouchers::table)
                .values(&row)
                .execute(conn)
                .map(|_| ())
                .map_err(|e| map_diesel_error(e).with_operation("insert_voucher"))
        })
        .await
    }

    async fn find_voucher_by_code(
        &self,
        code: &str,
    ) -> RepositoryResult<Option<CertificateVoucher>> {
        let code = code.trim().to_uppercase();
        self.with_conn(move |conn| {
            let data: Option<Value> = certificate_vouchers::table
                .filter(certificate_vouchers::voucher_code.eq(&code))
                .select(certificate_vouchers::data)
                .first(conn)
                .optional()
                .map_err(map_diesel_error)?;
            data.map(from_doc).transpose()
        })
        .await
    }

    async fn find_voucher_for_certificate(
        &self,
        certificate_id: CertificateId,
    ) -> RepositoryResult<Option<CertificateVoucher>> {
        self.with_conn(move |conn| {
            let data: Option<Value> = certificate_vouchers::table
                .filter(certificate_vouchers::certificate_id.eq(certificate_id.value()))
                .select(certificate_vouchers::data)
                .first(conn)
                .optional()
                .map_err(map_diesel_error)?;
            data.map(from_doc).transpose()
        })
        .await
    }

    async fn update_voucher(&self, voucher: &CertificateVoucher) -> RepositoryResult<()> {
        let id = voucher.id;
        let row = VoucherRow::from_model(voucher)?;
        self.with_conn(move |conn| {
            let updated = diesel::update(certificate_vouchers::table.find(id.value()))
                .set(&row)
                .execute(conn)
                .map_err(map_diesel_error)?;
            if updated == 0 {
                return Err(RepositoryError::missing("certificate_voucher", id));
            }
            Ok(())
        })
        .await
    }

    async fn insert_payments(&self, records: &[PaymentRecord]) -> RepositoryResult<()> {
        let rows = records
            .iter()
            .map(PaymentRow::from_model)
            .collect::<RepositoryResult<Vec<_>>>()?;
        self.with_conn(move |conn| {
            diesel::insert_into(payments::table)
                .values(&rows)
                .execute(conn)
                .map(|_| ())
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn list_payments_for_order(
        &self,
        order_id: &str,
    ) -> RepositoryResult<Vec<PaymentRecord>> {
        let order_id = order_id.to_string();
        self.with_conn(move |conn| {
            let rows: Vec<Value> = payments::table
                .filter(payments::order_id.eq(&order_id))
                .select(payments::data)
                .load(conn)
                .map_err(map_diesel_error)?;
            from_docs(rows)
        })
        .await
    }

    async fn list_payments_for_voucher(
        &self,
        voucher_id: VoucherId,
    ) -> RepositoryResult<Vec<PaymentRecord>> {
        self.with_conn(move |conn| {
            let rows: Vec<Value> = payments::table
                .filter(payments::voucher_id.eq(voucher_id.value()))
                .select(payments::data)
                .order(payments::sequence.asc())
                .load(conn)
                .map_err(map_diesel_error)?;
            from_docs(rows)
        })
        .await
    }

    async fn update_payment(&self, payment: &PaymentRecord) -> RepositoryResult<()> {
        let id = payment.id;
        let row = PaymentRow::from_model(payment)?;
        self.with_conn(move |conn| {
            let updated = diesel::update(payments::table.find(id.value()))
                .set(&row)
                .execute(conn)
                .map_err(map_diesel_error)?;
            if updated == 0 {
                return Err(RepositoryError::missing("payment", id));
            }
            Ok(())
        })
        .await
    }

    async fn insert_reservation_request(
        &self,
        request: &ReservationRequest,
    ) -> RepositoryResult<()> {
        let row = RequestRow::from_model(request)?;
        self.with_conn(move |conn| {
            diesel::insert_into(reservation_requests::table)
                .values(&row)
                .execute(conn)
                .map(|_| ())
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn get_reservation_request(&self, id: RequestId) -> RepositoryResult<ReservationRequest> {
        self.with_conn(move |conn| {
            let data: Option<Value> = reservation_requests::table
                .find(id.value())
                .select(reservation_requests::data)
                .first(conn)
                .optional()
                .map_err(map_diesel_error)?;
            data.map(from_doc)
                .unwrap_or_else(|| Err(RepositoryError::missing("reservation_request", id)))
        })
        .await
    }

    async fn update_reservation_request(
        &self,
        request: &ReservationRequest,
    ) -> RepositoryResult<()> {
        let id = request.id;
        let row = RequestRow::from_model(request)?;
        self.with_conn(move |conn| {
            let updated = diesel::update(reservation_requests::table.find(id.value()))
                .set(&row)
                .execute(conn)
                .map_err(map_diesel_error)?;
            if updated == 0 {
                return Err(RepositoryError::missing("reservation_request", id));
            }
            Ok(())
        })
        .await
    }

    async fn list_requests_for_certificate(
        &self,
        certificate_id: CertificateId,
    ) -> RepositoryResult<Vec<ReservationRequest>> {
        self.with_conn(move |conn| {
            let rows: Vec<Value> = reservation_requests::table
                .filter(reservation_requests::certificate_id.eq(certificate_id.value()))
                .select(reservation_requests::data)
                .order(reservation_requests::created_at.asc())
                .load(conn)
                .map_err(map_diesel_error)?;
            from_docs(rows)
        })
        .await
    }
}

#[async_trait]
impl BrokerRepository for PostgresRepository {
    async fn upsert_broker_profile(&self, profile: &BrokerProfile) -> RepositoryResult<()> {
        let row = BrokerProfileRow::from_model(profile)?;
        self.with_conn(move |conn| {
            diesel::insert_into(broker_profiles::table)
                .values(&row)
                .on_conflict(broker_profiles::user_id)
                .do_update()
                .set(&row)
                .execute(conn)
                .map(|_| ())
                .map_err(|e| map_diesel_error(e).with_operation("upsert_broker_profile"))
        })
        .await
    }

    async fn get_broker_profile(&self, user_id: UserId) -> RepositoryResult<Option<BrokerProfile>> {
        self.with_conn(move |conn| {
            let data: Option<Value> = broker_profiles::table
                .find(user_id.value())
                .select(broker_profiles::data)
                .first(conn)
                .optional()
                .map_err(map_diesel_error)?;
            data.map(from_doc).transpose()
        })
        .await
    }

    async fn find_broker_by_code(&self, code: &str) -> RepositoryResult<Option<BrokerProfile>> {
        let code = code.trim().to_uppercase();
        self.with_conn(move |conn| {
            let data: Option<Value> = broker_profiles::table
                .filter(broker_profiles::referral_code.eq(&code))
                .select(broker_profiles::data)
                .first(conn)
                .optional()
                .map_err(map_diesel_error)?;
            data.map(from_doc).transpose()
        })
        .await
    }

    async fn list_broker_levels(&self) -> RepositoryResult<Vec<BrokerLevel>> {
        self.with_conn(|conn| {
            let rows: Vec<Value> = broker_levels::table
                .select(broker_levels::data)
                .order(broker_levels::level_number.asc())
                .load(conn)
                .map_err(map_diesel_error)?;
            from_docs(rows)
        })
        .await
    }

    async fn update_broker_level(
        &self,
        user_id: UserId,
        tag: BrokerLevelTag,
    ) -> RepositoryResult<()> {
        self.with_conn(move |conn| {
            modify_broker_profile(conn, user_id, "update_broker_level", |p| p.level_tag = tag)
        })
        .await
    }

    async fn add_weeks_sold(&self, user_id: UserId, weeks: u32) -> RepositoryResult<()> {
        self.with_conn(move |conn| {
            modify_broker_profile(conn, user_id, "add_weeks_sold", |p| {
                p.total_weeks_sold += weeks
            })
        })
        .await
    }

    async fn referral_chain(&self, user_id: UserId) -> RepositoryResult<Vec<ReferralEdge>> {
        self.with_conn(move |conn| {
            let rows: Vec<ReferralEdgeRow> = referral_edges::table
                .filter(referral_edges::referred_user_id.eq(user_id.value()))
                .select((
                    referral_edges::broker_id,
                    referral_edges::referred_user_id,
                    referral_edges::level,
                ))
                .order((referral_edges::level.asc(), referral_edges::broker_id.asc()))
                .load(conn)
                .map_err(map_diesel_error)?;
            Ok(rows.into_iter().map(ReferralEdge::from).collect())
        })
        .await
    }

    async fn insert_referral_edges(&self, edges: &[ReferralEdge]) -> RepositoryResult<()> {
        if edges.is_empty() {
            return Ok(());
        }
        let rows: Vec<ReferralEdgeRow> = edges.iter().map(ReferralEdgeRow::from).collect();
        self.with_conn(move |conn| {
            diesel::insert_into(referral_edges::table)
                .values(&rows)
                .on_conflict_do_nothing()
                .execute(conn)
                .map(|_| ())
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn list_referred(&self, broker_id: UserId, level: u8) -> RepositoryResult<Vec<UserId>> {
        let level = i16::from(level);
        self.with_conn(move |conn| {
            let ids: Vec<Uuid> = referral_edges::table
                .filter(referral_edges::broker_id.eq(broker_id.value()))
                .filter(referral_edges::level.eq(level))
                .select(referral_edges::referred_user_id)
                .load(conn)
                .map_err(map_diesel_error)?;
            Ok(ids.into_iter().map(UserId::from).collect())
        })
        .await
    }

    async fn insert_commissions(&self, commissions: &[Commission]) -> RepositoryResult<()> {
        if commissions.is_empty() {
            return Ok(());
        }
        let rows = commissions
            .iter()
            .map(CommissionRow::from_model)
            .collect::<RepositoryResult<Vec<_>>>()?;
        self.with_conn(move |conn| {
            diesel::insert_into(commissions::table)
                .values(&rows)
                .execute(conn)
                .map(|_| ())
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn list_commissions_for_broker(
        &self,
        broker_id: UserId,
    ) -> RepositoryResult<Vec<Commission>> {
        self.with_conn(move |conn| {
            let rows: Vec<Value> = commissions::table
                .filter(commissions::broker_id.eq(broker_id.value()))
                .select(commissions::data)
                .order(commissions::created_at.desc())
                .load(conn)
                .map_err(map_diesel_error)?;
            from_docs(rows)
        })
        .await
    }

    async fn insert_attribution(&self, attribution: &ReferralAttribution) -> RepositoryResult<()> {
        let row = AttributionRow::from_model(attribution)?;
        self.with_conn(move |conn| {
            diesel::insert_into(referral_attributions::table)
                .values(&row)
                .execute(conn)
                .map(|_| ())
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn list_attributions_for_lead(
        &self,
        user_id: Option<UserId>,
        email: Option<&str>,
    ) -> RepositoryResult<Vec<ReferralAttribution>> {
        let user_id = user_id.map(|id| id.value());
        let email = email.map(|e| e.trim().to_lowercase());
        if user_id.is_none() && email.is_none() {
            return Ok(Vec::new());
        }
        self.with_conn(move |conn| {
            let mut query = referral_attributions::table
                .select(referral_attributions::data)
                .into_boxed();
            query = match (user_id, email) {
                (Some(id), Some(email)) => query.filter(
                    referral_attributions::lead_user_id
                        .eq(id)
                        .or(referral_attributions::lead_email.eq(email)),
                ),
                (Some(id), None) => query.filter(referral_attributions::lead_user_id.eq(id)),
                (None, Some(email)) => query.filter(referral_attributions::lead_email.eq(email)),
                (None, None) => query,
            };
            let rows: Vec<Value> = query.load(conn).map_err(map_diesel_error)?;
            from_docs(rows)
        })
        .await
    }
}

#[async_trait]
impl ComplianceRepository for PostgresRepository {
    async fn insert_consent(&self, consent: &ConsentRecord) -> RepositoryResult<()> {
        let row = ConsentRow::from_model(consent)?;
        self.with_conn(move |conn| {
            diesel::insert_into(legal_consents::table)
                .values(&row)
                .execute(conn)
                .map(|_| ())
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn list_consents_for_user(
        &self,
        user_id: UserId,
    ) -> RepositoryResult<Vec<ConsentRecord>> {
        self.with_conn(move |conn| {
            let rows: Vec<Value> = legal_consents::table
                .filter(legal_consents::user_id.eq(user_id.value()))
                .select(legal_consents::data)
                .order(legal_consents::accepted_at.asc())
                .load(conn)
                .map_err(map_diesel_error)?;
            from_docs(rows)
        })
        .await
    }

    async fn insert_evidence(&self, record: &EvidenceRecord) -> RepositoryResult<()> {
        let row = EvidenceRow::from_model(record)?;
        self.with_conn(move |conn| {
            diesel::insert_into(legal_evidence::table)
                .values(&row)
                .execute(conn)
                .map(|_| ())
                .map_err(|e| map_diesel_error(e).with_operation("insert_evidence"))
        })
        .await
    }

    async fn get_evidence(&self, id: EvidenceId) -> RepositoryResult<EvidenceRecord> {
        self.with_conn(move |conn| {
            let data: Option<Value> = legal_evidence::table
                .find(id.value())
                .select(legal_evidence::data)
                .first(conn)
                .optional()
                .map_err(map_diesel_error)?;
            data.map(from_doc)
                .unwrap_or_else(|| Err(RepositoryError::missing("evidence", id)))
        })
        .await
    }

    async fn insert_contact_request(&self, request: &ContactRequest) -> RepositoryResult<()> {
        let row = ContactRow::from_model(request)?;
        self.with_conn(move |conn| {
            diesel::insert_into(contact_requests::table)
                .values(&row)
                .execute(conn)
                .map(|_| ())
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn list_contact_requests(&self) -> RepositoryResult<Vec<ContactRequest>> {
        self.with_conn(|conn| {
            let rows: Vec<Value> = contact_requests::table
                .select(contact_requests::data)
                .order(contact_requests::created_at.desc())
                .load(conn)
                .map_err(map_diesel_error)?;
            from_docs(rows)
        })
        .await
    }
    async fn insert_testimonial(&self, testimonial: &Testimonial) -> RepositoryResult<()> {
        let row = TestimonialRow::from_model(testimonial)?;
        self.with_conn(move |conn| {
            diesel::insert_into(testimonials::table)
                .values(&row)
                .execute(conn)
                .map(|_| ())
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn get_testimonial(&self, id: TestimonialId) -> RepositoryResult<Testimonial> {
        self.with_conn(move |conn| {
            let data: Value = testimonials::table
                .find(id.value())
                .select(testimonials::data)
                .first(conn)
                .optional()
                .map_err(map_diesel_error)?
                .ok_or_else(|| RepositoryError::missing("testimonial", id))?;
            from_doc(data)
        })
        .await
    }

    async fn update_testimonial(&self, testimonial: &Testimonial) -> RepositoryResult<()> {
        let id = testimonial.id;
        let row = TestimonialRow::from_model(testimonial)?;
        self.with_conn(move |conn| {
            let updated = diesel::update(testimonials::table.find(id.value()))
                .set(&row)
                .execute(conn)
                .map_err(map_diesel_error)?;
            if updated == 0 {
                return Err(RepositoryError::missing("testimonial", id));
            }
            Ok(())
        })
        .await
    }

    async fn list_testimonials(
        &self,
        status: Option<TestimonialStatus>,
    ) -> RepositoryResult<Vec<Testimonial>> {
        self.with_conn(move |conn| {
            let mut query = testimonials::table
                .select(testimonials::data)
                .order(testimonials::created_at.desc())
                .into_boxed();
            if let Some(status) = status {
                query = query.filter(testimonials::status.eq(status.as_str()));
            }
            let rows: Vec<Value> = query.load(conn).map_err(map_diesel_error)?;
            from_docs(rows)
        })
        .await
    }
}
