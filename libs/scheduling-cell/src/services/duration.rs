use std::collections::HashSet;

use tracing::debug;
use uuid::Uuid;

use catalog_cell::models::{Extra, PricingTier, Service};
use catalog_cell::services::catalog::CatalogService;

use crate::models::{ExtraSelection, SchedulingError};

/// A booking selection resolved against the catalog: the service (or tier)
/// that supplies the base duration and price, plus priced extras. Both the
/// slot computation and the invoice calculation work from this one value so
/// they can never disagree.
#[derive(Debug, Clone)]
pub struct ResolvedSelection {
    pub service: Service,
    pub tier: Option<PricingTier>,
    pub extras: Vec<(Extra, i64)>,
    pub total_minutes: i64,
}

impl ResolvedSelection {
    pub fn base_minutes(&self) -> i64 {
        self.tier
            .as_ref()
            .map(|t| t.duration_minutes)
            .unwrap_or(self.service.duration_minutes)
    }

    pub fn base_price(&self) -> f64 {
        self.tier
            .as_ref()
            .map(|t| t.price)
            .unwrap_or(self.service.base_price)
    }

    pub fn extras_price(&self) -> f64 {
        self.extras
            .iter()
            .map(|(extra, quantity)| extra.price * *quantity as f64)
            .sum()
    }
}

pub struct DurationResolver {
    catalog: CatalogService,
    max_extras_per_booking: usize,
}

impl DurationResolver {
    pub fn new(catalog: CatalogService, max_extras_per_booking: usize) -> Self {
        Self {
            catalog,
            max_extras_per_booking,
        }
    }

    /// Total required minutes for a requested booking: tier duration (when a
    /// tier is selected) or the service base duration, plus each extra's
    /// hours/minutes normalized to minutes and multiplied by quantity.
    pub fn resolve(
        &self,
        service_id: Uuid,
        pricing_tier_id: Option<Uuid>,
        selections: &[ExtraSelection],
    ) -> Result<ResolvedSelection, SchedulingError> {
        let service = self.catalog.get_service(service_id)?;
        if !service.is_active {
            return Err(SchedulingError::NotFound("service"));
        }

        let tier = match pricing_tier_id {
            Some(tier_id) => {
                let tier = self.catalog.get_pricing_tier(tier_id)?;
                if tier.service_id != service.id {
                    return Err(SchedulingError::ValidationError(
                        "Pricing tier does not belong to the selected service".to_string(),
                    ));
                }
                if !tier.is_active {
                    return Err(SchedulingError::NotFound("pricing tier"));
                }
                Some(tier)
            }
            None => None,
        };

        let base_minutes = tier
            .as_ref()
            .map(|t| t.duration_minutes)
            .unwrap_or(service.duration_minutes);
        if base_minutes <= 0 {
            return Err(SchedulingError::InvalidDuration(
                "Base service duration must be positive".to_string(),
            ));
        }

        if selections.len() > self.max_extras_per_booking {
            return Err(SchedulingError::InvalidDuration(format!(
                "At most {} distinct extras per booking",
                self.max_extras_per_booking
            )));
        }

        let mut seen = HashSet::new();
        let mut total_minutes = base_minutes;
        let mut extras = Vec::with_capacity(selections.len());
        for selection in selections {
            if !seen.insert(selection.extra_id) {
                return Err(SchedulingError::InvalidDuration(
                    "Duplicate extra in selection".to_string(),
                ));
            }
            let extra = self.catalog.get_extra(selection.extra_id)?;
            if !extra.is_active {
                return Err(SchedulingError::NotFound("extra"));
            }
            if selection.quantity < 1 || selection.quantity > extra.max_quantity {
                return Err(SchedulingError::InvalidDuration(format!(
                    "Quantity for '{}' must be between 1 and {}",
                    extra.name, extra.max_quantity
                )));
            }
            total_minutes += extra.total_duration_minutes() * selection.quantity;
            extras.push((extra, selection.quantity));
        }

        debug!(
            "resolved duration for service {}: {} minutes ({} extras)",
            service_id,
            total_minutes,
            extras.len()
        );

        Ok(ResolvedSelection {
            service,
            tier,
            extras,
            total_minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_database::Db;
    use shared_utils::test_utils::{seed_extra, seed_pricing_tier, seed_service};

    fn setup() -> (Db, DurationResolver) {
        let db = Db::open_in_memory().unwrap();
        let resolver = DurationResolver::new(CatalogService::new(db.clone()), 3);
        (db, resolver)
    }

    #[test]
    fn base_service_duration_used_without_tier() {
        let (db, resolver) = setup();
        let service_id = seed_service(&db, "Home nursing", 60, 800.0);

        let resolved = resolver.resolve(service_id, None, &[]).unwrap();
        assert_eq!(resolved.total_minutes, 60);
        assert_eq!(resolved.base_price(), 800.0);
    }

    #[test]
    fn tier_duration_replaces_base() {
        let (db, resolver) = setup();
        let service_id = seed_service(&db, "Home nursing", 60, 800.0);
        let tier_id = seed_pricing_tier(&db, service_id, "Extended", 90, 1100.0);

        let resolved = resolver.resolve(service_id, Some(tier_id), &[]).unwrap();
        assert_eq!(resolved.total_minutes, 90);
        assert_eq!(resolved.base_price(), 1100.0);
    }

    #[test]
    fn extras_normalize_hours_and_minutes() {
        let (db, resolver) = setup();
        let service_id = seed_service(&db, "Home nursing", 60, 800.0);
        // 1h30m stored as separate hour/minute fields.
        let extra_id = seed_extra(&db, "Physio session", 1, 30, 400.0, 2);

        let resolved = resolver
            .resolve(
                service_id,
                None,
                &[ExtraSelection { extra_id, quantity: 2 }],
            )
            .unwrap();
        assert_eq!(resolved.total_minutes, 60 + 90 * 2);
        assert_eq!(resolved.extras_price(), 800.0);
    }

    #[test]
    fn rejects_quantity_above_extra_max() {
        let (db, resolver) = setup();
        let service_id = seed_service(&db, "Home nursing", 60, 800.0);
        let extra_id = seed_extra(&db, "Physio session", 0, 30, 400.0, 2);

        let result = resolver.resolve(
            service_id,
            None,
            &[ExtraSelection { extra_id, quantity: 3 }],
        );
        assert!(matches!(result, Err(SchedulingError::InvalidDuration(_))));
    }

    #[test]
    fn rejects_too_many_distinct_extras() {
        let (db, resolver) = setup();
        let service_id = seed_service(&db, "Home nursing", 60, 800.0);
        let selections: Vec<ExtraSelection> = (0..4)
            .map(|i| ExtraSelection {
                extra_id: seed_extra(&db, &format!("Extra {}", i), 0, 15, 100.0, 1),
                quantity: 1,
            })
            .collect();

        let result = resolver.resolve(service_id, None, &selections);
        assert!(matches!(result, Err(SchedulingError::InvalidDuration(_))));
    }

    #[test]
    fn rejects_duplicate_extras() {
        let (db, resolver) = setup();
        let service_id = seed_service(&db, "Home nursing", 60, 800.0);
        let extra_id = seed_extra(&db, "Physio session", 0, 30, 400.0, 5);
        let selection = ExtraSelection { extra_id, quantity: 1 };

        let result = resolver.resolve(service_id, None, &[selection.clone(), selection]);
        assert!(matches!(result, Err(SchedulingError::InvalidDuration(_))));
    }

    #[test]
    fn rejects_tier_from_other_service() {
        let (db, resolver) = setup();
        let service_a = seed_service(&db, "Home nursing", 60, 800.0);
        let service_b = seed_service(&db, "Elder care", 120, 1500.0);
        let tier_b = seed_pricing_tier(&db, service_b, "Long", 180, 2000.0);

        let result = resolver.resolve(service_a, Some(tier_b), &[]);
        assert!(matches!(result, Err(SchedulingError::ValidationError(_))));
    }
}
