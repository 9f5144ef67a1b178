use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Membership, MembershipType, BASE_BOOKING_FEE};

/// What the patient pays to place the booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeDecision {
    pub booking_fee: i64,
    pub uses_free_credit: bool,
}

/// Flat fee unless the member is an active premium with a free credit
/// left. Consultation fees never enter this amount.
pub fn booking_fee_for(membership: Option<&Membership>) -> FeeDecision {
    let free = membership.is_some_and(|m| {
        m.is_active
            && m.membership_type == MembershipType::Premium
            && m.free_bookings_remaining > 0
    });

    if free {
        FeeDecision {
            booking_fee: 0,
            uses_free_credit: true,
        }
    } else {
        FeeDecision {
            booking_fee: BASE_BOOKING_FEE,
            uses_free_credit: false,
        }
    }
}

pub struct MembershipStore {
    supabase: Arc<SupabaseClient>,
}

impl MembershipStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// The user's active membership, if any. Absence just means the flat
    /// fee applies, so lookup failures degrade to `None` with a warning.
    pub async fn get_active_membership(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Option<Membership> {
        let path = format!(
            "/rest/v1/memberships?user_id=eq.{}&is_active=eq.true",
            user_id
        );

        let result: Result<Vec<Membership>, _> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await;

        match result {
            Ok(memberships) => memberships.into_iter().next(),
            Err(e) => {
                warn!("Membership lookup failed for user {}: {}", user_id, e);
                None
            }
        }
    }

    /// Decrement the free-booking credit, guarded by the predicate so a
    /// concurrent spend can never push the count below zero. Returns
    /// whether a credit was actually consumed.
    pub async fn consume_free_credit(
        &self,
        membership: &Membership,
        auth_token: &str,
    ) -> Result<bool, String> {
        let path = format!(
            "/rest/v1/memberships?user_id=eq.{}&free_bookings_remaining=gte.1",
            membership.user_id
        );
        let body = json!({
            "free_bookings_remaining": membership.free_bookings_remaining - 1
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let updated: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(body), Some(headers))
            .await
            .map_err(|e| e.to_string())?;

        // An empty result means the predicate matched no row: someone
        // else spent the last credit first.
        let consumed = !updated.is_empty();
        debug!(
            "Free credit for user {}: consumed={}",
            membership.user_id, consumed
        );
        Ok(consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(membership_type: MembershipType, is_active: bool, credits: i32) -> Membership {
        Membership {
            user_id: Uuid::new_v4(),
            membership_type,
            is_active,
            free_bookings_remaining: credits,
        }
    }

    #[test]
    fn no_membership_pays_base_fee() {
        let decision = booking_fee_for(None);
        assert_eq!(decision.booking_fee, BASE_BOOKING_FEE);
        assert!(!decision.uses_free_credit);
    }

    #[test]
    fn premium_with_credits_is_free() {
        let m = membership(MembershipType::Premium, true, 3);
        let decision = booking_fee_for(Some(&m));
        assert_eq!(decision.booking_fee, 0);
        assert!(decision.uses_free_credit);
    }

    #[test]
    fn premium_without_credits_pays_base_fee() {
        let m = membership(MembershipType::Premium, true, 0);
        let decision = booking_fee_for(Some(&m));
        assert_eq!(decision.booking_fee, BASE_BOOKING_FEE);
        assert!(!decision.uses_free_credit);
    }

    #[test]
    fn inactive_premium_pays_base_fee() {
        let m = membership(MembershipType::Premium, false, 3);
        assert_eq!(booking_fee_for(Some(&m)).booking_fee, BASE_BOOKING_FEE);
    }

    #[test]
    fn basic_membership_pays_base_fee() {
        let m = membership(MembershipType::Basic, true, 3);
        assert_eq!(booking_fee_for(Some(&m)).booking_fee, BASE_BOOKING_FEE);
    }
}
