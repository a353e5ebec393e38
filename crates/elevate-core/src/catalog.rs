//! Plan Catalog
//!
//! Static reference data for the three subscription plans, cross-referenced
//! at runtime with live pricing fetched from the payments platform. The
//! catalog owns only identity and presentation; amounts always come live.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::state::PlanFields;

/// Visual variant tag for a plan card
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanVariant {
    Green,
    Pink,
    Gray,
}

/// One selectable plan (read-only reference data)
#[derive(Clone, Copy, Debug)]
pub struct PlanCatalogEntry {
    pub id: &'static str,
    pub price_id: &'static str,
    pub variant: PlanVariant,
    pub discount: Option<&'static str>,
    pub description: &'static str,
}

/// The three live plans, cheapest commitment first
pub const PLAN_CATALOG: [PlanCatalogEntry; 3] = [
    PlanCatalogEntry {
        id: "mensuel",
        price_id: "price_1SJbhV1H0zcejTt5FrRJtZzQ",
        variant: PlanVariant::Green,
        discount: None,
        description: "Facturé mensuellement.",
    },
    PlanCatalogEntry {
        id: "semestriel",
        price_id: "price_1SJbjH1H0zcejTt5LCoNTjUM",
        variant: PlanVariant::Pink,
        discount: Some("12% de réduction"),
        description: "Facturé semestriellement.",
    },
    PlanCatalogEntry {
        id: "annuel",
        price_id: "price_1SJbjr1H0zcejTt5bnVqtmJJ",
        variant: PlanVariant::Gray,
        discount: Some("30% de réduction"),
        description: "Facturé annuellement.",
    },
];

/// Plan pre-selected when the chooser opens
pub const DEFAULT_PLAN_ID: &str = "annuel";

pub fn plan_by_id(id: &str) -> Option<&'static PlanCatalogEntry> {
    PLAN_CATALOG.iter().find(|p| p.id == id)
}

pub fn plan_by_price_id(price_id: &str) -> Option<&'static PlanCatalogEntry> {
    PLAN_CATALOG.iter().find(|p| p.price_id == price_id)
}

/// Guard used by the server to reject price ids outside the catalog
pub fn is_known_price_id(price_id: &str) -> bool {
    plan_by_price_id(price_id).is_some()
}

/// Recurrence interval of a live price
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceInterval {
    Month,
    Year,
}

/// Live pricing for one plan, as served by the `stripe/prices` endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivePrice {
    pub id: String,
    /// Total per billing period, minor currency unit (cents)
    pub amount: i64,
    pub currency: String,
    pub interval: PriceInterval,
    pub interval_count: u32,
    pub product_name: String,
    pub product_id: String,
}

impl LivePrice {
    /// Billing period length in months (a yearly interval counts ×12)
    pub fn billing_period_months(&self) -> u32 {
        match self.interval {
            PriceInterval::Year => self.interval_count * 12,
            PriceInterval::Month => self.interval_count,
        }
    }

    /// Total per billing period in major units
    pub fn total_price(&self) -> Decimal {
        Decimal::from(self.amount) / Decimal::ONE_HUNDRED
    }

    /// Per-month price, rounded half-up to 2 decimals
    pub fn price_per_month(&self) -> Decimal {
        (self.total_price() / Decimal::from(self.billing_period_months()))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Display string for a plan card, e.g. `1.42€/mois`
    pub fn display_price(&self) -> String {
        format!("{:.2}€/mois", self.price_per_month())
    }
}

/// Merge a catalog entry with its live price into the step-2 answer fields
pub fn resolve_plan(entry: &PlanCatalogEntry, live: &LivePrice) -> PlanFields {
    PlanFields {
        plan_id: entry.id.to_string(),
        plan_name: live.product_name.clone(),
        plan_price: live.total_price(),
        price_id: live.id.clone(),
        billing_period_months: live.billing_period_months(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn yearly_1699() -> LivePrice {
        LivePrice {
            id: "price_1SJbjr1H0zcejTt5bnVqtmJJ".into(),
            amount: 1699,
            currency: "eur".into(),
            interval: PriceInterval::Year,
            interval_count: 1,
            product_name: "Plan Annuel".into(),
            product_id: "prod_annuel".into(),
        }
    }

    #[test]
    fn test_yearly_per_month_display() {
        // 1699 cents / 12 months = 1.4158…, half-up to 1.42
        let live = yearly_1699();
        assert_eq!(live.billing_period_months(), 12);
        assert_eq!(live.price_per_month(), dec!(1.42));
        assert_eq!(live.display_price(), "1.42€/mois");
    }

    #[test]
    fn test_rounding_is_half_up() {
        let live = LivePrice {
            amount: 1830, // 18.30 / 12 = 1.525 → 1.53
            ..yearly_1699()
        };
        assert_eq!(live.price_per_month(), dec!(1.53));
    }

    #[test]
    fn test_monthly_price_is_total() {
        let live = LivePrice {
            amount: 599,
            interval: PriceInterval::Month,
            interval_count: 1,
            ..yearly_1699()
        };
        assert_eq!(live.billing_period_months(), 1);
        assert_eq!(live.price_per_month(), dec!(5.99));
    }

    #[test]
    fn test_catalog_lookups() {
        let entry = plan_by_id("annuel").unwrap();
        assert_eq!(plan_by_price_id(entry.price_id).unwrap().id, "annuel");
        assert!(is_known_price_id(entry.price_id));
        assert!(!is_known_price_id("price_unknown"));
        assert!(plan_by_id(DEFAULT_PLAN_ID).is_some());
    }

    #[test]
    fn test_resolve_plan() {
        let entry = plan_by_id("annuel").unwrap();
        let fields = resolve_plan(entry, &yearly_1699());

        assert_eq!(fields.plan_id, "annuel");
        assert_eq!(fields.plan_price, dec!(16.99));
        assert_eq!(fields.billing_period_months, 12);
        assert!(crate::validate::validate_plan(&fields).is_ok());
    }
}
