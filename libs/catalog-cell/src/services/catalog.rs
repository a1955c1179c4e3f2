use chrono::Utc;
use rusqlite::{params, Connection, Row};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::rows::{fmt_dt, parse_dt, parse_uuid};
use shared_database::Db;

use crate::models::{
    AdminOverrideRefund, BookingPolicySetting, CancellationPolicy, Coupon, CreateCouponRequest,
    CreateExtraRequest, CreatePolicyRequest, CreatePricingTierRequest, CreateServiceRequest,
    CatalogError, DiscountType, Extra, PricingTier, Service,
};

pub struct CatalogService {
    db: Db,
}

impl CatalogService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    // ==========================================================================
    // SERVICES AND PRICING TIERS
    // ==========================================================================

    pub fn get_service(&self, service_id: Uuid) -> Result<Service, CatalogError> {
        let conn = self.db.conn();
        let service = conn
            .query_row(
                "SELECT id, name, duration_minutes, base_price, is_active, created_at, updated_at
                 FROM services WHERE id = ?1",
                params![service_id.to_string()],
                service_from_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => CatalogError::NotFound("service"),
                other => CatalogError::DatabaseError(other.to_string()),
            })?;
        Ok(service)
    }

    pub fn list_services(&self, include_inactive: bool) -> Result<Vec<Service>, CatalogError> {
        let conn = self.db.conn();
        let sql = if include_inactive {
            "SELECT id, name, duration_minutes, base_price, is_active, created_at, updated_at
             FROM services ORDER BY name ASC"
        } else {
            "SELECT id, name, duration_minutes, base_price, is_active, created_at, updated_at
             FROM services WHERE is_active = 1 ORDER BY name ASC"
        };
        let mut stmt = conn.prepare(sql)?;
        let services = stmt
            .query_map([], service_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(services)
    }

    pub fn create_service(&self, request: CreateServiceRequest) -> Result<Service, CatalogError> {
        if request.duration_minutes <= 0 {
            return Err(CatalogError::ValidationError(
                "Service duration must be positive".to_string(),
            ));
        }
        if request.base_price < 0.0 {
            return Err(CatalogError::ValidationError(
                "Service price cannot be negative".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let now = fmt_dt(Utc::now());
        self.db.conn().execute(
            "INSERT INTO services (id, name, duration_minutes, base_price, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
            params![id.to_string(), request.name, request.duration_minutes, request.base_price, now],
        )?;

        info!("service {} created ({})", id, request.name);
        self.get_service(id)
    }

    pub fn get_pricing_tier(&self, tier_id: Uuid) -> Result<PricingTier, CatalogError> {
        let conn = self.db.conn();
        let tier = conn
            .query_row(
                "SELECT id, service_id, name, duration_minutes, price, is_active
                 FROM pricing_tiers WHERE id = ?1",
                params![tier_id.to_string()],
                tier_from_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => CatalogError::NotFound("pricing tier"),
                other => CatalogError::DatabaseError(other.to_string()),
            })?;
        Ok(tier)
    }

    pub fn list_pricing_tiers(&self, service_id: Uuid) -> Result<Vec<PricingTier>, CatalogError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT id, service_id, name, duration_minutes, price, is_active
             FROM pricing_tiers WHERE service_id = ?1 AND is_active = 1 ORDER BY price ASC",
        )?;
        let tiers = stmt
            .query_map(params![service_id.to_string()], tier_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tiers)
    }

    pub fn create_pricing_tier(
        &self,
        request: CreatePricingTierRequest,
    ) -> Result<PricingTier, CatalogError> {
        if request.duration_minutes <= 0 {
            return Err(CatalogError::ValidationError(
                "Tier duration must be positive".to_string(),
            ));
        }
        // The tier must belong to an existing service.
        self.get_service(request.service_id)?;

        let id = Uuid::new_v4();
        self.db.conn().execute(
            "INSERT INTO pricing_tiers (id, service_id, name, duration_minutes, price, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, 1)",
            params![
                id.to_string(),
                request.service_id.to_string(),
                request.name,
                request.duration_minutes,
                request.price
            ],
        )?;
        self.get_pricing_tier(id)
    }

    // ==========================================================================
    // EXTRAS
    // ==========================================================================

    pub fn get_extra(&self, extra_id: Uuid) -> Result<Extra, CatalogError> {
        let conn = self.db.conn();
        let extra = conn
            .query_row(
                "SELECT id, name, duration_hours, duration_minutes, price, max_quantity, is_active
                 FROM extras WHERE id = ?1",
                params![extra_id.to_string()],
                extra_from_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => CatalogError::NotFound("extra"),
                other => CatalogError::DatabaseError(other.to_string()),
            })?;
        Ok(extra)
    }

    pub fn list_extras(&self) -> Result<Vec<Extra>, CatalogError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, duration_hours, duration_minutes, price, max_quantity, is_active
             FROM extras WHERE is_active = 1 ORDER BY name ASC",
        )?;
        let extras = stmt
            .query_map([], extra_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(extras)
    }

    pub fn create_extra(&self, request: CreateExtraRequest) -> Result<Extra, CatalogError> {
        if request.duration_hours < 0 || request.duration_minutes < 0 {
            return Err(CatalogError::ValidationError(
                "Extra duration cannot be negative".to_string(),
            ));
        }
        if request.max_quantity < 1 {
            return Err(CatalogError::ValidationError(
                "Extra max quantity must be at least 1".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        self.db.conn().execute(
            "INSERT INTO extras (id, name, duration_hours, duration_minutes, price, max_quantity, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)",
            params![
                id.to_string(),
                request.name,
                request.duration_hours,
                request.duration_minutes,
                request.price,
                request.max_quantity
            ],
        )?;
        self.get_extra(id)
    }

    // ==========================================================================
    // COUPONS
    // ==========================================================================

    pub fn get_coupon(&self, code: &str) -> Result<Coupon, CatalogError> {
        let conn = self.db.conn();
        let coupon = conn
            .query_row(
                "SELECT code, discount_type, value, minimum_amount, maximum_discount,
                        usage_limit, per_user_limit, used_count, valid_from, valid_until,
                        applicable_services, is_active
                 FROM coupons WHERE code = ?1",
                params![code],
                coupon_from_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => CatalogError::NotFound("coupon"),
                other => CatalogError::DatabaseError(other.to_string()),
            })?;
        Ok(coupon)
    }

    pub fn create_coupon(&self, request: CreateCouponRequest) -> Result<Coupon, CatalogError> {
        if request.value <= 0.0 {
            return Err(CatalogError::ValidationError(
                "Coupon value must be positive".to_string(),
            ));
        }
        if request.valid_from >= request.valid_until {
            return Err(CatalogError::ValidationError(
                "Coupon validity window is empty".to_string(),
            ));
        }

        let applicable = request.applicable_services.as_ref().map(|ids| {
            ids.iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",")
        });

        self.db.conn().execute(
            "INSERT INTO coupons
                 (code, discount_type, value, minimum_amount, maximum_discount,
                  usage_limit, per_user_limit, used_count, valid_from, valid_until,
                  applicable_services, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9, ?10, 1)",
            params![
                request.code,
                request.discount_type.as_str(),
                request.value,
                request.minimum_amount.unwrap_or(0.0),
                request.maximum_discount,
                request.usage_limit,
                request.per_user_limit,
                fmt_dt(request.valid_from),
                fmt_dt(request.valid_until),
                applicable,
            ],
        )?;

        info!("coupon {} created", request.code);
        self.get_coupon(&request.code)
    }

    // ==========================================================================
    // BOOKING POLICIES
    // ==========================================================================

    pub fn get_policy(&self, policy_id: Uuid) -> Result<BookingPolicySetting, CatalogError> {
        let conn = self.db.conn();
        let policy = conn
            .query_row(
                &format!("{} WHERE id = ?1", POLICY_SELECT),
                params![policy_id.to_string()],
                policy_from_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => CatalogError::NotFound("booking policy"),
                other => CatalogError::DatabaseError(other.to_string()),
            })?;
        Ok(policy)
    }

    /// The policy snapshotted onto new bookings.
    pub fn active_policy(&self) -> Result<BookingPolicySetting, CatalogError> {
        let conn = self.db.conn();
        let policy = conn
            .query_row(
                &format!("{} WHERE is_active = 1 ORDER BY rowid DESC LIMIT 1", POLICY_SELECT),
                [],
                policy_from_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => CatalogError::NotFound("booking policy"),
                other => CatalogError::DatabaseError(other.to_string()),
            })?;
        Ok(policy)
    }

    /// Publishing a new policy deactivates the previous one rather than
    /// editing it, so bookings placed under the old rules keep their snapshot.
    pub fn create_policy(
        &self,
        request: CreatePolicyRequest,
    ) -> Result<BookingPolicySetting, CatalogError> {
        if request.cancellation_window_hours < 0 || request.reschedule_window_hours < 0 {
            return Err(CatalogError::ValidationError(
                "Policy windows cannot be negative".to_string(),
            ));
        }
        if request.max_reschedule_attempts < 0 {
            return Err(CatalogError::ValidationError(
                "Max reschedule attempts cannot be negative".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        {
            let mut conn = self.db.conn();
            let tx = conn.transaction().map_err(CatalogError::from)?;
            tx.execute("UPDATE booking_policies SET is_active = 0 WHERE is_active = 1", [])?;
            tx.execute(
                "INSERT INTO booking_policies
                     (id, name, cancellation_policy, cancellation_window_hours, late_cancellation_fee,
                      reschedule_window_hours, reschedule_fee, max_reschedule_attempts,
                      reschedule_advance_notice_hours, no_show_minutes,
                      notify_on_cancellation, notify_on_reschedule, admin_override_refund, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 1)",
                params![
                    id.to_string(),
                    request.name,
                    request.cancellation_policy.as_str(),
                    request.cancellation_window_hours,
                    request.late_cancellation_fee,
                    request.reschedule_window_hours,
                    request.reschedule_fee,
                    request.max_reschedule_attempts,
                    request.reschedule_advance_notice_hours,
                    request.no_show_minutes,
                    request.notify_on_cancellation.unwrap_or(true),
                    request.notify_on_reschedule.unwrap_or(true),
                    request
                        .admin_override_refund
                        .unwrap_or(AdminOverrideRefund::Formula)
                        .as_str(),
                ],
            )?;
            tx.commit().map_err(CatalogError::from)?;
        }

        debug!("booking policy {} published", id);
        self.get_policy(id)
    }
}

const POLICY_SELECT: &str =
    "SELECT id, name, cancellation_policy, cancellation_window_hours, late_cancellation_fee,
            reschedule_window_hours, reschedule_fee, max_reschedule_attempts,
            reschedule_advance_notice_hours, no_show_minutes,
            notify_on_cancellation, notify_on_reschedule, admin_override_refund, is_active
     FROM booking_policies";

// ==============================================================================
// ROW MAPPING
// ==============================================================================

fn service_from_row(row: &Row<'_>) -> rusqlite::Result<Service> {
    Ok(Service {
        id: parse_uuid(0, row.get(0)?)?,
        name: row.get(1)?,
        duration_minutes: row.get(2)?,
        base_price: row.get(3)?,
        is_active: row.get(4)?,
        created_at: parse_dt(5, row.get(5)?)?,
        updated_at: parse_dt(6, row.get(6)?)?,
    })
}

fn tier_from_row(row: &Row<'_>) -> rusqlite::Result<PricingTier> {
    Ok(PricingTier {
        id: parse_uuid(0, row.get(0)?)?,
        service_id: parse_uuid(1, row.get(1)?)?,
        name: row.get(2)?,
        duration_minutes: row.get(3)?,
        price: row.get(4)?,
        is_active: row.get(5)?,
    })
}

fn extra_from_row(row: &Row<'_>) -> rusqlite::Result<Extra> {
    Ok(Extra {
        id: parse_uuid(0, row.get(0)?)?,
        name: row.get(1)?,
        duration_hours: row.get(2)?,
        duration_minutes: row.get(3)?,
        price: row.get(4)?,
        max_quantity: row.get(5)?,
        is_active: row.get(6)?,
    })
}

fn coupon_from_row(row: &Row<'_>) -> rusqlite::Result<Coupon> {
    let discount_type: String = row.get(1)?;
    let applicable: Option<String> = row.get(10)?;
    let applicable_services = applicable
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| Uuid::parse_str(s.trim()).ok())
        .collect();

    Ok(Coupon {
        code: row.get(0)?,
        discount_type: DiscountType::parse(&discount_type),
        value: row.get(2)?,
        minimum_amount: row.get(3)?,
        maximum_discount: row.get(4)?,
        usage_limit: row.get(5)?,
        per_user_limit: row.get(6)?,
        used_count: row.get(7)?,
        valid_from: parse_dt(8, row.get(8)?)?,
        valid_until: parse_dt(9, row.get(9)?)?,
        applicable_services,
        is_active: row.get(11)?,
    })
}

fn policy_from_row(row: &Row<'_>) -> rusqlite::Result<BookingPolicySetting> {
    let cancellation_policy: String = row.get(2)?;
    let admin_override: String = row.get(12)?;
    Ok(BookingPolicySetting {
        id: parse_uuid(0, row.get(0)?)?,
        name: row.get(1)?,
        cancellation_policy: CancellationPolicy::parse(&cancellation_policy),
        cancellation_window_hours: row.get(3)?,
        late_cancellation_fee: row.get(4)?,
        reschedule_window_hours: row.get(5)?,
        reschedule_fee: row.get(6)?,
        max_reschedule_attempts: row.get(7)?,
        reschedule_advance_notice_hours: row.get(8)?,
        no_show_minutes: row.get(9)?,
        notify_on_cancellation: row.get(10)?,
        notify_on_reschedule: row.get(11)?,
        admin_override_refund: AdminOverrideRefund::parse(&admin_override),
        is_active: row.get(13)?,
    })
}
