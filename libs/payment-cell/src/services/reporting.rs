use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate};
use reqwest::Method;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;

use crate::models::{
    MethodRevenue, PaymentError, PaymentStatus, RevenueQuery, RevenueSummary, StatusCounts,
};
use crate::services::processing::round_cents;

#[derive(Debug, Deserialize)]
struct RevenueRow {
    payment_method_id: Uuid,
    processing_fee: f64,
    total_amount: f64,
    status: PaymentStatus,
}

#[derive(Debug, Deserialize)]
struct MethodTypeRow {
    id: Uuid,
    method_type: String,
}

/// Revenue roll-up over a creation-date range. Counts cover every
/// status; the money columns and the per-method breakdown cover
/// completed payments only, so pending and refunded rows never inflate
/// collected revenue.
pub struct RevenueService {
    db: PostgrestClient,
}

impl RevenueService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: PostgrestClient::new(config),
        }
    }

    pub async fn summarize(
        &self,
        query: &RevenueQuery,
        auth_token: &str,
    ) -> Result<RevenueSummary, PaymentError> {
        let mut path = String::from(
            "/rest/v1/payments?select=payment_method_id,processing_fee,total_amount,status",
        );
        if let Some(from) = query.from {
            path.push_str(&format!("&created_at=gte.{}", from));
        }
        if let Some(to) = query.to {
            // Inclusive of the whole `to` day.
            path.push_str(&format!("&created_at=lt.{}", to + Duration::days(1)));
        }

        let rows: Vec<RevenueRow> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        let methods: Vec<MethodTypeRow> = self
            .db
            .request(
                Method::GET,
                "/rest/v1/payment_methods?select=id,method_type",
                Some(auth_token),
                None,
            )
            .await
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        let type_by_id: HashMap<Uuid, String> = methods
            .into_iter()
            .map(|m| (m.id, m.method_type))
            .collect();

        debug!(rows = rows.len(), "Summarizing payments");
        Ok(build_summary(query.from, query.to, &rows, &type_by_id))
    }
}

fn build_summary(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    rows: &[RevenueRow],
    type_by_id: &HashMap<Uuid, String>,
) -> RevenueSummary {
    let mut counts = StatusCounts::default();
    let mut total_collected = 0.0;
    let mut total_fees = 0.0;
    let mut by_method: BTreeMap<String, (usize, f64)> = BTreeMap::new();

    for row in rows {
        match row.status {
            PaymentStatus::Pending => counts.pending += 1,
            PaymentStatus::Completed => counts.completed += 1,
            PaymentStatus::Failed => counts.failed += 1,
            PaymentStatus::Refunded => counts.refunded += 1,
        }

        if row.status.is_completed() {
            total_collected += row.total_amount;
            total_fees += row.processing_fee;

            let label = type_by_id
                .get(&row.payment_method_id)
                .cloned()
                .unwrap_or_else(|| "unknown".to_string());
            let entry = by_method.entry(label).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += row.total_amount;
        }
    }

    RevenueSummary {
        from,
        to,
        total_collected: round_cents(total_collected),
        total_fees: round_cents(total_fees),
        net_revenue: round_cents(total_collected - total_fees),
        counts,
        by_method: by_method
            .into_iter()
            .map(|(method_type, (count, total))| MethodRevenue {
                method_type,
                count,
                total: round_cents(total),
            })
            .collect(),
    }
}
