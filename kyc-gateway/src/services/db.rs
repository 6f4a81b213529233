//! Persistence adapter: parameterised queries over a pooled
//! `sqlx::PgPool`, hand-written rather than `query!` macros so the crate
//! builds without a live `DATABASE_URL`.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::*;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ---- users ----------------------------------------------------

    pub async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_user(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
        display_name: &str,
        org_id: Uuid,
        org_role: OrgRole,
        is_platform_admin: bool,
    ) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, email, password_hash, display_name, org_id, org_role, current_org_id, is_platform_admin, status, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $5, $7, 'active', now(), now())
               RETURNING *"#,
        )
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .bind(display_name)
        .bind(org_id)
        .bind(org_role)
        .bind(is_platform_admin)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn touch_last_login(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---- organizations ---------------------------------------------

    pub async fn find_org(&self, id: Uuid) -> Result<Option<Organization>, AppError> {
        let org = sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(org)
    }

    pub async fn insert_org(&self, id: Uuid, name: &str, billing_email: &str) -> Result<Organization, AppError> {
        let org = sqlx::query_as::<_, Organization>(
            r#"INSERT INTO organizations (id, name, plan, billing_email, status, created_at, updated_at)
               VALUES ($1, $2, 'starter', $3, 'active', now(), now())
               RETURNING *"#,
        )
        .bind(id)
        .bind(name)
        .bind(billing_email)
        .fetch_one(&self.pool)
        .await?;
        Ok(org)
    }

    pub async fn update_org_plan(&self, org_id: Uuid, plan: Plan) -> Result<Organization, AppError> {
        let org = sqlx::query_as::<_, Organization>(
            "UPDATE organizations SET plan = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(org_id)
        .bind(plan)
        .fetch_one(&self.pool)
        .await?;
        Ok(org)
    }

    pub async fn find_active_member(&self, org_id: Uuid, user_id: Uuid) -> Result<Option<OrganizationMember>, AppError> {
        let member = sqlx::query_as::<_, OrganizationMember>(
            "SELECT * FROM organization_members WHERE org_id = $1 AND user_id = $2 AND status = 'active'",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    pub async fn list_members(&self, org_id: Uuid) -> Result<Vec<OrganizationMember>, AppError> {
        let rows = sqlx::query_as::<_, OrganizationMember>(
            "SELECT * FROM organization_members WHERE org_id = $1 AND status = 'active' ORDER BY created_at",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn insert_member(&self, org_id: Uuid, user_id: Uuid, role: OrgRole) -> Result<OrganizationMember, AppError> {
        let member = sqlx::query_as::<_, OrganizationMember>(
            r#"INSERT INTO organization_members (id, org_id, user_id, role, status, last_active_at, created_at)
               VALUES ($1, $2, $3, $4, 'active', now(), now())
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;
        Ok(member)
    }

    // ---- api keys ----------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_api_key(
        &self,
        id: Uuid,
        user_id: Uuid,
        org_id: Uuid,
        name: &str,
        prefix: &str,
        secret_hash: &str,
        scopes: &[String],
        ip_whitelist: &[String],
    ) -> Result<ApiKey, AppError> {
        let key = sqlx::query_as::<_, ApiKey>(
            r#"INSERT INTO api_keys (id, user_id, org_id, name, prefix, secret_hash, scopes, status, ip_whitelist, rolling_total, rolling_success, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, 'active', $8, 0, 0, now())
               RETURNING *"#,
        )
        .bind(id)
        .bind(user_id)
        .bind(org_id)
        .bind(name)
        .bind(prefix)
        .bind(secret_hash)
        .bind(scopes)
        .bind(ip_whitelist)
        .fetch_one(&self.pool)
        .await?;
        Ok(key)
    }

    pub async fn find_api_key_by_hash(&self, secret_hash: &str) -> Result<Option<ApiKey>, AppError> {
        let key = sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys WHERE secret_hash = $1")
            .bind(secret_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(key)
    }

    pub async fn list_user_api_keys(&self, user_id: Uuid) -> Result<Vec<ApiKey>, AppError> {
        let keys = sqlx::query_as::<_, ApiKey>(
            "SELECT * FROM api_keys WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    pub async fn list_org_api_keys(&self, org_id: Uuid) -> Result<Vec<ApiKey>, AppError> {
        let keys = sqlx::query_as::<_, ApiKey>(
            "SELECT * FROM api_keys WHERE org_id = $1 ORDER BY created_at DESC",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    pub async fn find_api_key(&self, id: Uuid) -> Result<Option<ApiKey>, AppError> {
        let key = sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(key)
    }

    /// One-way transition; rate-limit denial must never call this.
    pub async fn revoke_api_key(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE api_keys SET status = 'revoked' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn touch_api_key_usage(&self, id: Uuid, success: bool) -> Result<(), AppError> {
        if success {
            sqlx::query(
                "UPDATE api_keys SET rolling_total = rolling_total + 1, rolling_success = rolling_success + 1, last_used_at = now() WHERE id = $1",
            )
        } else {
            sqlx::query(
                "UPDATE api_keys SET rolling_total = rolling_total + 1, last_error = 'request failed', last_error_at = now(), last_used_at = now() WHERE id = $1",
            )
        }
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---- oauth clients ------------------------------------------------

    pub async fn find_oauth_client(&self, client_id: &str) -> Result<Option<OAuthClient>, AppError> {
        let client = sqlx::query_as::<_, OAuthClient>("SELECT * FROM oauth_clients WHERE client_id = $1")
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(client)
    }

    pub async fn find_oauth_client_by_id(&self, id: Uuid) -> Result<Option<OAuthClient>, AppError> {
        let client = sqlx::query_as::<_, OAuthClient>("SELECT * FROM oauth_clients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(client)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_oauth_client(
        &self,
        id: Uuid,
        client_id: &str,
        client_secret_hash: &str,
        org_id: Uuid,
        name: &str,
        redirect_uris: &[String],
        scopes: &[String],
        token_ttl_secs: i64,
    ) -> Result<OAuthClient, AppError> {
        let client = sqlx::query_as::<_, OAuthClient>(
            r#"INSERT INTO oauth_clients (id, client_id, client_secret_hash, org_id, name, redirect_uris, scopes, status, token_ttl_secs, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, 'active', $8, now())
               RETURNING *"#,
        )
        .bind(id)
        .bind(client_id)
        .bind(client_secret_hash)
        .bind(org_id)
        .bind(name)
        .bind(redirect_uris)
        .bind(scopes)
        .bind(token_ttl_secs)
        .fetch_one(&self.pool)
        .await?;
        Ok(client)
    }

    pub async fn list_oauth_clients(&self, org_id: Uuid) -> Result<Vec<OAuthClient>, AppError> {
        let clients = sqlx::query_as::<_, OAuthClient>(
            "SELECT * FROM oauth_clients WHERE org_id = $1 ORDER BY created_at DESC",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(clients)
    }

    pub async fn revoke_oauth_client(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE oauth_clients SET status = 'revoked' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---- quota (C9) ----------------------------------------------------

    /// Atomic check-and-consume under a row lock: no over-consumption
    /// under concurrent requests. Lazily creates the row on first use.
    pub async fn check_and_consume_quota(
        &self,
        org_id: Uuid,
        service_type: ServiceType,
    ) -> Result<OrganizationQuota, AppError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, OrganizationQuota>(
            "SELECT * FROM organization_quotas WHERE org_id = $1 AND service_type = $2 FOR UPDATE",
        )
        .bind(org_id)
        .bind(service_type)
        .fetch_optional(&mut *tx)
        .await?;

        let quota = match existing {
            Some(q) => q,
            None => {
                sqlx::query_as::<_, OrganizationQuota>(
                    r#"INSERT INTO organization_quotas (id, org_id, service_type, "limit", consumed, reset_at, created_at)
                       VALUES ($1, $2, $3, $4, 0, $5, now())
                       RETURNING *"#,
                )
                .bind(Uuid::new_v4())
                .bind(org_id)
                .bind(service_type)
                .bind(default_limit(service_type))
                .bind(start_of_next_month(Utc::now()))
                .fetch_one(&mut *tx)
                .await?
            }
        };

        let now = Utc::now();
        let quota = if quota.reset_at <= now {
            sqlx::query_as::<_, OrganizationQuota>(
                "UPDATE organization_quotas SET consumed = 0, reset_at = $2 WHERE id = $1 RETURNING *",
            )
            .bind(quota.id)
            .bind(start_of_next_month(now))
            .fetch_one(&mut *tx)
            .await?
        } else {
            quota
        };

        if quota.consumed >= quota.limit {
            tx.commit().await?;
            return Err(AppError::QuotaExceeded);
        }

        let updated = sqlx::query_as::<_, OrganizationQuota>(
            "UPDATE organization_quotas SET consumed = consumed + 1 WHERE id = $1 RETURNING *",
        )
        .bind(quota.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    pub async fn reset_due_quotas(&self) -> Result<u64, AppError> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE organization_quotas SET consumed = 0, reset_at = $1 WHERE reset_at <= $2",
        )
        .bind(start_of_next_month(now))
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // ---- kyc requests ---------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_kyc_request(
        &self,
        id: Uuid,
        org_id: Uuid,
        request_type: KycRequestType,
        client_ip: &str,
        user_agent: Option<&str>,
    ) -> Result<KycRequest, AppError> {
        let req = sqlx::query_as::<_, KycRequest>(
            r#"INSERT INTO kyc_requests (id, org_id, request_type, status, client_ip, user_agent, created_at, updated_at)
               VALUES ($1, $2, $3, 'processing', $4, $5, now(), now())
               RETURNING *"#,
        )
        .bind(id)
        .bind(org_id)
        .bind(request_type)
        .bind(client_ip)
        .bind(user_agent)
        .fetch_one(&self.pool)
        .await?;
        Ok(req)
    }

    pub async fn complete_kyc_request(
        &self,
        id: Uuid,
        status: KycRequestStatus,
        error_message: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE kyc_requests SET status = $2, error_message = $3, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status)
            .bind(error_message)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Stores the sealed PII triple for a `FullVerify` request. Kept
    /// separate from `insert_kyc_request` so OCR/face/liveness requests
    /// never carry unused NULL columns through the common insert path.
    pub async fn attach_kyc_pii(
        &self,
        id: Uuid,
        idcard_sealed: &str,
        idcard_index_hash: &str,
        name_sealed: &str,
        phone_sealed: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"UPDATE kyc_requests
               SET idcard_sealed = $2, idcard_index_hash = $3, name_sealed = $4, phone_sealed = $5, updated_at = now()
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(idcard_sealed)
        .bind(idcard_index_hash)
        .bind(name_sealed)
        .bind(phone_sealed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_kyc_request(&self, id: Uuid, org_id: Uuid) -> Result<Option<KycRequest>, AppError> {
        let req = sqlx::query_as::<_, KycRequest>(
            "SELECT * FROM kyc_requests WHERE id = $1 AND org_id = $2",
        )
        .bind(id)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(req)
    }

    // ---- usage logs / aggregates (C11) -----------------------------

    pub async fn insert_usage_logs(&self, events: &[UsageEvent]) -> Result<(), AppError> {
        if events.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for e in events {
            sqlx::query(
                r#"INSERT INTO usage_logs (id, org_id, api_key_id, user_id, oauth_client_id, endpoint, status_code, request_id, created_at)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
            )
            .bind(e.id)
            .bind(e.org_id)
            .bind(e.api_key_id)
            .bind(e.actor_user_id.or(e.user_id))
            .bind(e.oauth_client_id)
            .bind(&e.endpoint)
            .bind(e.status_code as i32)
            .bind(&e.request_id)
            .bind(e.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn bump_usage_metrics(&self, org_id: Uuid, success: i64, failed: i64) -> Result<(), AppError> {
        sqlx::query(
            r#"INSERT INTO usage_metrics (org_id, success_total, failed_total, total)
               VALUES ($1, $2, $3, $2 + $3)
               ON CONFLICT (org_id) DO UPDATE SET
                 success_total = usage_metrics.success_total + EXCLUDED.success_total,
                 failed_total = usage_metrics.failed_total + EXCLUDED.failed_total,
                 total = usage_metrics.total + EXCLUDED.total"#,
        )
        .bind(org_id)
        .bind(success)
        .bind(failed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Generic additive upsert shared by every `usage_daily*` target
    /// table. `key_cols`/`key_vals` must line up positionally;
    /// `day`/`success`/`failed` are always the last three bind
    /// parameters.
    pub async fn upsert_daily_bucket(
        &self,
        table: &str,
        key_cols: &[&str],
        key_vals: Vec<DailyKeyVal>,
        day: NaiveDate,
        success: i64,
        failed: i64,
    ) -> Result<(), AppError> {
        let mut cols: Vec<String> = key_cols.iter().map(|s| s.to_string()).collect();
        cols.push("day".into());
        cols.push("success".into());
        cols.push("failed".into());
        cols.push("total".into());

        let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("${i}")).collect();
        let total_idx = cols.len();
        let conflict_cols = cols[..key_cols.len() + 1].join(", ");

        let sql = format!(
            r#"INSERT INTO {table} ({cols}) VALUES ({placeholders})
               ON CONFLICT ({conflict_cols}) DO UPDATE SET
                 success = {table}.success + EXCLUDED.success,
                 failed = {table}.failed + EXCLUDED.failed,
                 total = {table}.total + EXCLUDED.total"#,
            cols = cols.join(", "),
            placeholders = placeholders.join(", "),
            total_idx = total_idx,
        );

        let mut q = sqlx::query(&sql);
        for v in &key_vals {
            q = v.bind(q);
        }
        q = q.bind(day).bind(success).bind(failed).bind(success + failed);
        q.execute(&self.pool).await?;
        Ok(())
    }

    // ---- audit (C14) ---------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_audit_log(
        &self,
        request_id: &str,
        user_id: Option<Uuid>,
        org_id: Option<Uuid>,
        action: &str,
        resource: &str,
        client_ip: &str,
        user_agent: Option<&str>,
        status: &str,
        message: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"INSERT INTO audit_logs (id, request_id, user_id, org_id, action, resource, client_ip, user_agent, status, message, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now())"#,
        )
        .bind(Uuid::new_v4())
        .bind(request_id)
        .bind(user_id)
        .bind(org_id)
        .bind(action)
        .bind(resource)
        .bind(client_ip)
        .bind(user_agent)
        .bind(status)
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_audit_logs(&self, limit: i64, offset: i64) -> Result<Vec<AuditLog>, AppError> {
        let rows = sqlx::query_as::<_, AuditLog>(
            "SELECT * FROM audit_logs ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ---- request journal (C10) -----------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_request_log(
        &self,
        org_id: Option<Uuid>,
        user_id: Option<Uuid>,
        api_key_id: Option<Uuid>,
        api_key_name: Option<&str>,
        method: &str,
        path: &str,
        status: i32,
        latency_ms: i64,
        client_ip: &str,
        request_body: Option<serde_json::Value>,
        response_body: Option<serde_json::Value>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"INSERT INTO api_request_logs (id, org_id, user_id, api_key_id, api_key_name, method, path, status, latency_ms, client_ip, request_body, response_body, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, now())"#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(user_id)
        .bind(api_key_id)
        .bind(api_key_name)
        .bind(method)
        .bind(path)
        .bind(status)
        .bind(latency_ms)
        .bind(client_ip)
        .bind(request_body)
        .bind(response_body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---- admin listings -------------------------------------------------

    pub async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn list_orgs(&self, limit: i64, offset: i64) -> Result<Vec<Organization>, AppError> {
        let rows = sqlx::query_as::<_, Organization>(
            "SELECT * FROM organizations ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ---- face search asset rewriting (C13) -----------------------------

    /// Maps a vendor-returned picture path to an internal asset id,
    /// creating the mapping on first sight so the same vendor path
    /// always resolves to the same internal id.
    pub async fn get_or_create_face_image_ref(&self, org_id: Uuid, vendor_picture_path: &str) -> Result<FaceImageRef, AppError> {
        if let Some(existing) = sqlx::query_as::<_, FaceImageRef>(
            "SELECT * FROM face_image_refs WHERE org_id = $1 AND vendor_picture_path = $2",
        )
        .bind(org_id)
        .bind(vendor_picture_path)
        .fetch_optional(&self.pool)
        .await?
        {
            return Ok(existing);
        }

        let created = sqlx::query_as::<_, FaceImageRef>(
            r#"INSERT INTO face_image_refs (id, org_id, vendor_picture_path, internal_asset_id, created_at)
               VALUES ($1, $2, $3, $4, now())
               ON CONFLICT (org_id, vendor_picture_path) DO UPDATE SET vendor_picture_path = EXCLUDED.vendor_picture_path
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(vendor_picture_path)
        .bind(Uuid::new_v4())
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    // ---- invitations --------------------------------------------------

    pub async fn insert_invitation(
        &self,
        org_id: Uuid,
        email: &str,
        role: OrgRole,
        token_hash: &str,
        invited_by: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<Invitation, AppError> {
        let inv = sqlx::query_as::<_, Invitation>(
            r#"INSERT INTO invitations (id, org_id, email, role, token_hash, status, invited_by, expires_at, created_at)
               VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7, now())
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(email)
        .bind(role)
        .bind(token_hash)
        .bind(invited_by)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(inv)
    }
}

/// One key column/value pair used by [`Database::upsert_daily_bucket`].
pub enum DailyKeyVal {
    Uuid(Uuid),
    OptUuid(Option<Uuid>),
    Text(String),
}

impl DailyKeyVal {
    fn bind<'q>(
        &'q self,
        q: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
        match self {
            DailyKeyVal::Uuid(v) => q.bind(v),
            DailyKeyVal::OptUuid(v) => q.bind(v),
            DailyKeyVal::Text(v) => q.bind(v),
        }
    }
}

fn default_limit(service_type: ServiceType) -> i64 {
    match service_type {
        ServiceType::Ocr => 1000,
        ServiceType::Face => 1000,
        ServiceType::Liveness => 500,
    }
}
