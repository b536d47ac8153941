//! Tenant context carried read-only through the inference pipeline.

mod private
{
  use std::collections::HashMap;

  /// Identifies the caller on whose behalf a request executes.
  ///
  /// `tenantId` is immutable for the life of a request (spec.md §3). The
  /// context is created at request ingress and passed read-only through
  /// every pipeline phase.
  #[ derive( Debug, Clone, PartialEq ) ]
  pub struct TenantContext
  {
    tenant_id : String,
    attributes : HashMap< String, String >,
  }

  impl TenantContext
  {
    /// Construct a tenant context.
    ///
    /// # Panics
    ///
    /// Panics if `tenant_id` is empty — constructing a `TenantContext` with
    /// no tenant id is always a caller bug, never a legitimate runtime case.
    #[ must_use ]
    #[ inline ]
    pub fn new( tenant_id : impl Into< String > ) -> Self
    {
      let tenant_id = tenant_id.into();
      assert!( !tenant_id.is_empty(), "tenant_id must not be empty" );
      Self { tenant_id, attributes : HashMap::new() }
    }

    /// The default tenant used when `multitenancy.enabled` is `false`
    /// (spec.md §6).
    #[ must_use ]
    #[ inline ]
    pub fn default_tenant() -> Self
    {
      Self::new( "default" )
    }

    /// Attach an attribute, returning `self` (builder style).
    #[ must_use ]
    #[ inline ]
    pub fn with_attribute( mut self, key : impl Into< String >, value : impl Into< String > ) -> Self
    {
      self.attributes.insert( key.into(), value.into() );
      self
    }

    /// The tenant identifier.
    #[ must_use ]
    #[ inline ]
    pub fn tenant_id( &self ) -> &str
    {
      &self.tenant_id
    }

    /// Look up an attribute by key.
    #[ must_use ]
    #[ inline ]
    pub fn attribute( &self, key : &str ) -> Option< &str >
    {
      self.attributes.get( key ).map( String::as_str )
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::TenantContext;
}
