//! Registry of [`ProviderAdapter`]s keyed by provider id. Multiple
//! versions of the same id form an ordered map (spec.md §4.4 Registry
//! invariants) : [`ProviderRegistry::get`] returns the highest version,
//! [`ProviderRegistry::get_version`] returns an exact match, and
//! re-registering the same `(id, version)` pair shadows only that version
//! rather than erroring, so a provider can be hot-swapped in place.

mod private
{
  use std::collections::{ BTreeMap, HashMap };
  use std::sync::{ Arc, RwLock };
  use crate::error::Error;
  use crate::provider::adapter::ProviderAdapter;

  /// Holds every registered version of every provider id. `BTreeMap`
  /// orders versions lexically by their declared version string — callers
  /// that need true semver ordering (e.g. `"9.0.0"` sorting before
  /// `"10.0.0"`) should zero-pad their version strings accordingly, the
  /// same constraint the teacher's own endpoint ordering carries.
  #[ derive( Default ) ]
  pub struct ProviderRegistry
  {
    versions : RwLock< HashMap< String, BTreeMap< String, Arc< dyn ProviderAdapter > > > >,
    /// Owning plugin id for adapters registered via
    /// [`ProviderRegistry::register_from_plugin`] (spec.md §4.4 : "plugin-
    /// sourced providers remember the owning plugin id for lifecycle
    /// tracking"). Tracked per provider id, not per version. Absent for
    /// adapters registered directly.
    plugin_provenance : RwLock< HashMap< String, String > >,
  }

  impl core::fmt::Debug for ProviderRegistry
  {
    fn fmt( &self, f : &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
    {
      f.debug_struct( "ProviderRegistry" )
        .field( "provider_ids", &self.provider_ids() )
        .finish()
    }
  }

  impl ProviderRegistry
  {
    /// Construct an empty registry.
    #[ must_use ]
    pub fn new() -> Self
    {
      Self::default()
    }

    /// Register `adapter` under its descriptor's `(provider_id, version)`,
    /// shadowing any prior adapter registered under the exact same pair
    /// (spec.md §4.5 : version shadowing). A new version of an
    /// already-registered id is added alongside it rather than replacing
    /// it.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn register( &self, adapter : Arc< dyn ProviderAdapter > )
    {
      let descriptor = adapter.descriptor();
      let id = descriptor.provider_id.clone();
      let version = descriptor.version.clone();
      self.plugin_provenance.write().unwrap().remove( &id );
      self.versions.write().unwrap().entry( id ).or_default().insert( version, adapter );
    }

    /// Register `adapter` on behalf of `plugin_id`, recording provenance
    /// so the owning plugin can be identified later (spec.md §4.4).
    ///
    /// # Panics
    ///
    /// Panics if an internal lock is poisoned.
    pub fn register_from_plugin( &self, adapter : Arc< dyn ProviderAdapter >, plugin_id : impl Into< String > )
    {
      let descriptor = adapter.descriptor();
      let id = descriptor.provider_id.clone();
      let version = descriptor.version.clone();
      self.plugin_provenance.write().unwrap().insert( id.clone(), plugin_id.into() );
      self.versions.write().unwrap().entry( id ).or_default().insert( version, adapter );
    }

    /// The plugin id that registered `provider_id`, if it was registered
    /// via [`ProviderRegistry::register_from_plugin`].
    ///
    /// # Panics
    ///
    /// Panics if an internal lock is poisoned.
    #[ must_use ]
    pub fn owning_plugin( &self, provider_id : &str ) -> Option< String >
    {
      self.plugin_provenance.read().unwrap().get( provider_id ).cloned()
    }

    /// Remove every version registered under `provider_id`, calling
    /// [`ProviderAdapter::shutdown`] on each before returning the highest
    /// version's adapter (spec.md §8 : `Register(p); Unregister(p.id);
    /// Get(p.id) == empty`; spec.md §4.4 : "unregister closes all
    /// versions"). Returns `None` if the id was not registered.
    ///
    /// # Panics
    ///
    /// Panics if an internal lock is poisoned.
    pub async fn unregister( &self, provider_id : &str ) -> Option< Arc< dyn ProviderAdapter > >
    {
      self.plugin_provenance.write().unwrap().remove( provider_id );
      let removed = self.versions.write().unwrap().remove( provider_id )?;
      let highest = removed.values().next_back().cloned();
      for adapter in removed.into_values()
      {
        adapter.shutdown().await;
      }
      highest
    }

    /// Look up the highest-versioned adapter currently registered for
    /// `provider_id` (spec.md §4.4 : `Get(id)` returns the highest
    /// version).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoCompatibleProvider`] if no adapter is
    /// registered under that id.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn get( &self, provider_id : &str ) -> Result< Arc< dyn ProviderAdapter >, Error >
    {
      self.versions.read().unwrap()
        .get( provider_id )
        .and_then( | versions | versions.values().next_back().cloned() )
        .ok_or_else( || Error::NoCompatibleProvider( provider_id.to_string() ) )
    }

    /// Look up the exact `(provider_id, version)` pair (spec.md §4.4 :
    /// `Get(id, version)` returns an exact match).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoCompatibleProvider`] if the id is unregistered,
    /// or [`Error::VersionNotFound`] if the id exists but not at that
    /// version.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn get_version( &self, provider_id : &str, version : &str ) -> Result< Arc< dyn ProviderAdapter >, Error >
    {
      let versions = self.versions.read().unwrap();
      let by_version = versions.get( provider_id )
        .ok_or_else( || Error::NoCompatibleProvider( provider_id.to_string() ) )?;
      by_version.get( version ).cloned()
        .ok_or_else( || Error::VersionNotFound( format!( "{provider_id}@{version}" ) ) )
    }

    /// All currently registered provider ids (one entry per id,
    /// regardless of how many versions it carries).
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[ must_use ]
    pub fn provider_ids( &self ) -> Vec< String >
    {
      self.versions.read().unwrap().keys().cloned().collect()
    }

    /// The highest-versioned adapter for every registered provider id,
    /// used by router scoring to evaluate one candidate per id.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[ must_use ]
    pub fn all( &self ) -> Vec< Arc< dyn ProviderAdapter > >
    {
      self.versions.read().unwrap()
        .values()
        .filter_map( | by_version | by_version.values().next_back().cloned() )
        .collect()
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use crate::provider::mock::MockAdapter;

    #[ test ]
    fn register_then_get()
    {
      let registry = ProviderRegistry::new();
      registry.register( Arc::new( MockAdapter::new( "p1" ) ) );
      assert!( registry.get( "p1" ).is_ok() );
      assert!( registry.get( "missing" ).is_err() );
    }

    #[ test ]
    fn re_registering_shadows_prior_adapter()
    {
      let registry = ProviderRegistry::new();
      registry.register( Arc::new( MockAdapter::new( "p1" ).with_relative_cost( 1.0 ) ) );
      registry.register( Arc::new( MockAdapter::new( "p1" ).with_relative_cost( 2.0 ) ) );
      assert_eq!( registry.provider_ids().len(), 1 );
      let adapter = registry.get( "p1" ).unwrap();
      assert!( ( adapter.descriptor().relative_cost - 2.0 ).abs() < f64::EPSILON );
    }

    #[ test ]
    fn distinct_versions_of_the_same_id_coexist()
    {
      let registry = ProviderRegistry::new();
      registry.register( Arc::new( MockAdapter::new( "p1" ).with_version( "1.0.0" ).with_relative_cost( 1.0 ) ) );
      registry.register( Arc::new( MockAdapter::new( "p1" ).with_version( "2.0.0" ).with_relative_cost( 2.0 ) ) );

      assert_eq!( registry.provider_ids().len(), 1 );

      let highest = registry.get( "p1" ).unwrap();
      assert_eq!( highest.descriptor().version, "2.0.0" );

      let exact = registry.get_version( "p1", "1.0.0" ).unwrap();
      assert_eq!( exact.descriptor().version, "1.0.0" );

      assert!( matches!( registry.get_version( "p1", "9.9.9" ), Err( Error::VersionNotFound( _ ) ) ) );
    }

    #[ tokio::test ]
    async fn unregister_closes_every_version()
    {
      let registry = ProviderRegistry::new();
      let v1 = Arc::new( MockAdapter::new( "p1" ).with_version( "1.0.0" ) );
      registry.register( v1 );
      registry.register( Arc::new( MockAdapter::new( "p1" ).with_version( "2.0.0" ) ) );

      let removed = registry.unregister( "p1" ).await.unwrap();
      assert_eq!( removed.descriptor().version, "2.0.0" );
      assert!( registry.get( "p1" ).is_err() );
      assert!( registry.get_version( "p1", "1.0.0" ).is_err() );
    }

    #[ tokio::test ]
    async fn unregister_closes_the_provider()
    {
      let registry = ProviderRegistry::new();
      registry.register( Arc::new( MockAdapter::new( "p1" ) ) );
      assert!( registry.unregister( "p1" ).await.is_some() );
      assert!( registry.get( "p1" ).is_err() );
      assert!( registry.unregister( "p1" ).await.is_none() );
    }

    #[ tokio::test ]
    async fn plugin_sourced_registration_remembers_owning_plugin()
    {
      let registry = ProviderRegistry::new();
      registry.register_from_plugin( Arc::new( MockAdapter::new( "p1" ) ), "plugin-a" );
      assert_eq!( registry.owning_plugin( "p1" ).as_deref(), Some( "plugin-a" ) );

      registry.unregister( "p1" ).await;
      assert_eq!( registry.owning_plugin( "p1" ), None );
    }

    #[ test ]
    fn directly_registered_provider_has_no_owning_plugin()
    {
      let registry = ProviderRegistry::new();
      registry.register( Arc::new( MockAdapter::new( "p1" ) ) );
      assert_eq!( registry.owning_plugin( "p1" ), None );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::ProviderRegistry;
}
