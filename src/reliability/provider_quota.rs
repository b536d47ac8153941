//! Combines a tenant-scoped and a provider-scoped [`QuotaManager`] behind
//! one enforcement point (spec.md §4.6 : quotas apply at both the tenant
//! and provider boundary, independently).

mod private
{
  use core::time::Duration;
  use std::collections::HashMap;
  use std::sync::Mutex;
  use std::time::Instant;
  use crate::error::Error;
  use crate::reliability::quota::{ QuotaManager, QuotaPolicy };

  /// Enforces a tenant quota and a provider quota as two independent
  /// checks, both of which must pass, plus a provider-level suspension
  /// driven by observed upstream rate-limit responses (spec.md §4.7 :
  /// "on observing a rate-limit response, the provider is marked
  /// suspended for a retry-after duration").
  #[ derive( Debug ) ]
  pub struct QuotaEnforcer
  {
    tenant_quota : QuotaManager,
    provider_quota : QuotaManager,
    suspended_until : Mutex< HashMap< String, Instant > >,
  }

  impl QuotaEnforcer
  {
    /// Construct an enforcer applying `tenant_policy` per tenant id and
    /// `provider_policy` per provider id.
    #[ must_use ]
    pub fn new( tenant_policy : QuotaPolicy, provider_policy : QuotaPolicy ) -> Self
    {
      Self
      {
        tenant_quota : QuotaManager::new( tenant_policy ),
        provider_quota : QuotaManager::new( provider_policy ),
        suspended_until : Mutex::new( HashMap::new() ),
      }
    }

    /// Whether `provider_id` currently has quota available, i.e. is not
    /// suspended by a prior rate-limit response (spec.md §4.7 `HasQuota`).
    ///
    /// # Panics
    ///
    /// Panics if an internal lock is poisoned.
    #[ must_use ]
    pub fn has_quota( &self, provider_id : &str ) -> bool
    {
      match self.suspended_until.lock().unwrap().get( provider_id )
      {
        Some( until ) => Instant::now() >= *until,
        None => true,
      }
    }

    /// Mark `provider_id` suspended for `retry_after`, called when an
    /// invocation observes a rate-limit response (spec.md §4.7).
    ///
    /// # Panics
    ///
    /// Panics if an internal lock is poisoned.
    pub fn mark_rate_limited( &self, provider_id : &str, retry_after : Duration )
    {
      self.suspended_until.lock().unwrap().insert( provider_id.to_string(), Instant::now() + retry_after );
    }

    /// Check and consume one unit from both the tenant's and the
    /// provider's quota. If the provider check fails after the tenant
    /// check succeeded, the tenant's consumed unit is not refunded :
    /// quota consumption reflects an attempted dispatch, not a
    /// successful one (spec.md §4.6). A provider currently suspended by
    /// [`QuotaEnforcer::mark_rate_limited`] is reported as over quota
    /// regardless of its token bucket (spec.md §4.7).
    ///
    /// # Errors
    ///
    /// Returns [`Error::QuotaExceeded`] naming whichever entity is over
    /// quota or currently rate-limit-suspended.
    pub fn check_and_increment( &self, tenant_id : &str, provider_id : &str ) -> Result< (), Error >
    {
      self.tenant_quota.check_and_increment( tenant_id )?;
      if !self.has_quota( provider_id )
      {
        return Err( Error::QuotaExceeded( format!( "provider {provider_id} is suspended after a rate-limit response" ) ) );
      }
      self.provider_quota.check_and_increment( provider_id )?;
      Ok( () )
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use core::time::Duration;
    use crate::reliability::quota::QuotaAlgorithm;

    fn policy( limit : u32 ) -> QuotaPolicy
    {
      QuotaPolicy { algorithm : QuotaAlgorithm::TokenBucket, limit, period : Duration::from_secs( 60 ) }
    }

    #[ test ]
    fn both_quotas_must_pass()
    {
      let enforcer = QuotaEnforcer::new( policy( 10 ), policy( 1 ) );
      assert!( enforcer.check_and_increment( "tenant-a", "provider-a" ).is_ok() );
      assert!( enforcer.check_and_increment( "tenant-a", "provider-a" ).is_err() );
    }

    #[ test ]
    fn provider_quota_shared_across_tenants()
    {
      let enforcer = QuotaEnforcer::new( policy( 10 ), policy( 1 ) );
      assert!( enforcer.check_and_increment( "tenant-a", "provider-a" ).is_ok() );
      assert!( enforcer.check_and_increment( "tenant-b", "provider-a" ).is_err() );
    }

    #[ test ]
    fn rate_limited_provider_has_no_quota_until_retry_after_elapses()
    {
      let enforcer = QuotaEnforcer::new( policy( 10 ), policy( 10 ) );
      assert!( enforcer.has_quota( "provider-a" ) );

      enforcer.mark_rate_limited( "provider-a", Duration::from_millis( 30 ) );
      assert!( !enforcer.has_quota( "provider-a" ) );
      assert!( enforcer.check_and_increment( "tenant-a", "provider-a" ).is_err() );

      std::thread::sleep( Duration::from_millis( 40 ) );
      assert!( enforcer.has_quota( "provider-a" ) );
      assert!( enforcer.check_and_increment( "tenant-a", "provider-a" ).is_ok() );
    }

    #[ test ]
    fn rate_limit_suspension_is_scoped_per_provider()
    {
      let enforcer = QuotaEnforcer::new( policy( 10 ), policy( 10 ) );
      enforcer.mark_rate_limited( "provider-a", Duration::from_secs( 60 ) );
      assert!( enforcer.has_quota( "provider-b" ) );
      assert!( enforcer.check_and_increment( "tenant-a", "provider-b" ).is_ok() );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::QuotaEnforcer;
}
