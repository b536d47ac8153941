//! Routing decisions and the `preferredProvider`-unavailable policy
//! (spec.md Design Notes §9 Open Question 4, resolved in `DESIGN.md`).

mod private
{
  /// What the router should do when a request names a
  /// `preferred_provider` that turns out to be unavailable (circuit-open,
  /// unregistered, or excluded by device affinity).
  ///
  /// Resolves spec.md's open question on `preferredProvider` semantics :
  /// see `DESIGN.md` for the rationale.
  #[ derive( Debug, Clone, Copy, PartialEq, Eq, Default ) ]
  pub enum PreferredProviderPolicy
  {
    /// Treat an unavailable preference as a hard failure : the caller
    /// asked for a specific provider and nothing else will do.
    UserSelected,
    /// Fall back to scoring among the remaining candidates, honoring the
    /// preference only as a scoring bonus (the default).
    #[ default ]
    Failover,
  }

  /// The provider a request was routed to, plus the runner-up ordering
  /// the failover manager consults if the chosen provider fails
  /// mid-flight (spec.md §4.10).
  #[ derive( Debug, Clone ) ]
  pub struct RoutingDecision
  {
    /// Provider id chosen for the primary attempt.
    pub chosen_provider_id : String,
    /// Remaining candidates, best-scored first, available as fallback
    /// hops.
    pub fallback_provider_ids : Vec< String >,
    /// The raw score the chosen provider received.
    pub score : f64,
  }

  impl RoutingDecision
  {
    /// The next fallback hop, if any remain.
    #[ must_use ]
    pub fn next_fallback( &self ) -> Option< &str >
    {
      self.fallback_provider_ids.first().map( String::as_str )
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::PreferredProviderPolicy;
  exposed use private::RoutingDecision;
}
