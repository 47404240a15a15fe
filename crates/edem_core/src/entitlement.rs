//! crates/edem_core/src/entitlement.rs
//!
//! Tier resolution and the message-quota policy. The checker itself is
//! read-only: the caller counts prior user messages through the storage port
//! and records the new message only after a successful turn.

use chrono::{DateTime, Datelike, TimeZone, Utc};

use crate::domain::{Profile, SubscriptionTier};

/// Which window of prior messages counts against the allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaScope {
    Lifetime,
    CalendarMonth,
}

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed { remaining: u64 },
    Exhausted { allowance: u64 },
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaDecision::Allowed { .. })
    }
}

/// Message allowances per tier, injected from configuration.
#[derive(Debug, Clone, Copy)]
pub struct QuotaPolicy {
    pub free_message_allowance: u64,
    pub paid_monthly_allowance: u64,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            free_message_allowance: 2,
            paid_monthly_allowance: 500,
        }
    }
}

impl QuotaPolicy {
    /// Free accounts burn a small lifetime budget; paid accounts reset
    /// monthly.
    pub fn scope_for(&self, tier: SubscriptionTier) -> QuotaScope {
        if tier.is_paid() {
            QuotaScope::CalendarMonth
        } else {
            QuotaScope::Lifetime
        }
    }

    pub fn allowance_for(&self, tier: SubscriptionTier) -> u64 {
        if tier.is_paid() {
            self.paid_monthly_allowance
        } else {
            self.free_message_allowance
        }
    }

    /// `prior_count` is the number of user-role messages already recorded in
    /// the tier's scope. At or above the allowance the turn is rejected.
    pub fn check(&self, tier: SubscriptionTier, prior_count: u64) -> QuotaDecision {
        let allowance = self.allowance_for(tier);
        if prior_count >= allowance {
            QuotaDecision::Exhausted { allowance }
        } else {
            QuotaDecision::Allowed {
                remaining: allowance - prior_count,
            }
        }
    }
}

/// Resolves the tier a request is actually entitled to. A missing profile
/// or an expired paid subscription both read as free; a paid tier with no
/// recorded expiry stays valid (manual grant).
pub fn effective_tier(profile: Option<&Profile>, now: DateTime<Utc>) -> SubscriptionTier {
    let Some(profile) = profile else {
        return SubscriptionTier::Free;
    };
    if profile.tier.is_paid() {
        if let Some(expires_at) = profile.expires_at {
            if expires_at <= now {
                return SubscriptionTier::Free;
            }
        }
    }
    profile.tier
}

/// First instant of the current calendar month, the lower bound for paid
/// quota counting.
pub fn start_of_current_month(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn profile(tier: SubscriptionTier, expires_at: Option<DateTime<Utc>>) -> Profile {
        Profile {
            user_id: Uuid::new_v4(),
            tier,
            expires_at,
        }
    }

    #[test]
    fn free_user_at_ceiling_is_rejected() {
        let policy = QuotaPolicy::default();
        // Scenario: 2 prior user messages against a ceiling of 2.
        assert_eq!(
            policy.check(SubscriptionTier::Free, 2),
            QuotaDecision::Exhausted { allowance: 2 }
        );
        assert_eq!(
            policy.check(SubscriptionTier::Free, 3),
            QuotaDecision::Exhausted { allowance: 2 }
        );
    }

    #[test]
    fn free_user_one_below_ceiling_is_allowed() {
        let policy = QuotaPolicy::default();
        assert_eq!(
            policy.check(SubscriptionTier::Free, 1),
            QuotaDecision::Allowed { remaining: 1 }
        );
    }

    #[test]
    fn paid_user_gets_the_monthly_allowance() {
        let policy = QuotaPolicy::default();
        assert!(policy.check(SubscriptionTier::Pro, 499).is_allowed());
        assert!(!policy.check(SubscriptionTier::Pro, 500).is_allowed());
        assert_eq!(policy.scope_for(SubscriptionTier::Pro), QuotaScope::CalendarMonth);
        assert_eq!(policy.scope_for(SubscriptionTier::Free), QuotaScope::Lifetime);
    }

    #[test]
    fn missing_profile_resolves_to_free() {
        assert_eq!(effective_tier(None, Utc::now()), SubscriptionTier::Free);
    }

    #[test]
    fn expired_paid_subscription_resolves_to_free() {
        let now = Utc::now();
        let expired = profile(SubscriptionTier::Pro, Some(now - Duration::days(1)));
        assert_eq!(effective_tier(Some(&expired), now), SubscriptionTier::Free);
    }

    #[test]
    fn active_paid_subscription_keeps_its_tier() {
        let now = Utc::now();
        let active = profile(SubscriptionTier::Basic, Some(now + Duration::days(10)));
        assert_eq!(effective_tier(Some(&active), now), SubscriptionTier::Basic);
    }

    #[test]
    fn paid_subscription_without_expiry_stays_valid() {
        let granted = profile(SubscriptionTier::Pro, None);
        assert_eq!(
            effective_tier(Some(&granted), Utc::now()),
            SubscriptionTier::Pro
        );
    }

    #[test]
    fn month_start_is_the_first_at_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 15, 30, 0).unwrap();
        let start = start_of_current_month(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap());
    }
}
