//! Registry of [`PipelinePlugin`]s, with a lazily-built phase -> plugins
//! cache guarded by a mutex (spec.md §4.1, Design Notes §9 : avoid
//! recomputing the phase index on every request).

mod private
{
  use std::collections::HashMap;
  use std::sync::{ Arc, Mutex };
  use crate::context::Phase;
  use crate::error::Error;
  use crate::pipeline::plugin::PipelinePlugin;

  /// Holds registered plugins and a cached, sorted `phase -> plugin`
  /// index rebuilt only when the plugin set changes.
  pub struct PluginRegistry
  {
    plugins : Vec< Arc< dyn PipelinePlugin > >,
    cache : Mutex< Option< HashMap< Phase, Vec< Arc< dyn PipelinePlugin > > > > >,
  }

  impl core::fmt::Debug for PluginRegistry
  {
    fn fmt( &self, f : &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
    {
      f.debug_struct( "PluginRegistry" )
        .field( "plugins", &self.plugins.iter().map( | p | p.name() ).collect::< Vec< _ > >() )
        .finish()
    }
  }

  impl Default for PluginRegistry
  {
    fn default() -> Self
    {
      Self::new()
    }
  }

  impl PluginRegistry
  {
    /// Construct an empty registry.
    #[ must_use ]
    pub fn new() -> Self
    {
      Self { plugins : Vec::new(), cache : Mutex::new( None ) }
    }

    /// Register a plugin, invalidating the phase cache.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if a plugin with the same
    /// name is already registered.
    pub fn register( &mut self, plugin : Arc< dyn PipelinePlugin > ) -> Result< (), Error >
    {
      if self.plugins.iter().any( | existing | existing.name() == plugin.name() )
      {
        return Err( Error::ConfigurationError( format!( "duplicate plugin name : {}", plugin.name() ) ) );
      }
      self.plugins.push( plugin );
      *self.cache.lock().unwrap() = None;
      Ok( () )
    }

    /// Plugins bound to `phase`, sorted by priority then registration
    /// order. Built lazily and cached across calls.
    ///
    /// # Panics
    ///
    /// Panics if the internal cache lock is poisoned.
    #[ must_use ]
    pub fn plugins_for( &self, phase : Phase ) -> Vec< Arc< dyn PipelinePlugin > >
    {
      let mut cache = self.cache.lock().unwrap();
      if cache.is_none()
      {
        *cache = Some( self.build_index() );
      }
      cache.as_ref().unwrap().get( &phase ).cloned().unwrap_or_default()
    }

    fn build_index( &self ) -> HashMap< Phase, Vec< Arc< dyn PipelinePlugin > > >
    {
      let mut index : HashMap< Phase, Vec< Arc< dyn PipelinePlugin > > > = HashMap::new();
      for plugin in &self.plugins
      {
        for &phase in plugin.phases()
        {
          index.entry( phase ).or_default().push( Arc::clone( plugin ) );
        }
      }
      for bucket in index.values_mut()
      {
        bucket.sort_by_key( | p | p.priority() );
      }
      index
    }

    /// Total registered plugin count.
    #[ must_use ]
    #[ inline ]
    pub fn len( &self ) -> usize
    {
      self.plugins.len()
    }

    /// Whether no plugins are registered.
    #[ must_use ]
    #[ inline ]
    pub fn is_empty( &self ) -> bool
    {
      self.plugins.is_empty()
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use crate::context::InferenceContext;
    use crate::pipeline::plugin::Outcome;
    use crate::request::{ InferenceRequest, Message, Role };

    struct NoOpPlugin { name : String, phases : Vec< Phase >, priority : i32 }

    impl PipelinePlugin for NoOpPlugin
    {
      fn name( &self ) -> &str { &self.name }
      fn phases( &self ) -> &[ Phase ] { &self.phases }
      fn priority( &self ) -> i32 { self.priority }
      fn execute( &self, _context : &mut InferenceContext, _phase : Phase ) -> Result< Outcome, Error >
      {
        Ok( Outcome::Continue )
      }
    }

    fn sample_request() -> InferenceRequest
    {
      InferenceRequest
      {
        request_id : "r1".into(),
        model : "m1".into(),
        messages : vec![ Message { role : Role::User, content : "hi".into(), name : None, tool_call_id : None } ],
        parameters : Default::default(),
        streaming : false,
        priority : 0,
        timeout : None,
        preferred_provider : None,
        device_hint : None,
        metadata : Default::default(),
      }
    }

    #[ test ]
    fn plugins_sorted_by_priority()
    {
      let mut registry = PluginRegistry::new();
      registry.register( Arc::new( NoOpPlugin { name : "b".into(), phases : vec![ Phase::Validation ], priority : 5 } ) ).unwrap();
      registry.register( Arc::new( NoOpPlugin { name : "a".into(), phases : vec![ Phase::Validation ], priority : 1 } ) ).unwrap();

      let bound = registry.plugins_for( Phase::Validation );
      assert_eq!( bound.len(), 2 );
      assert_eq!( bound[ 0 ].name(), "a" );
      assert_eq!( bound[ 1 ].name(), "b" );
    }

    #[ test ]
    fn duplicate_name_rejected()
    {
      let mut registry = PluginRegistry::new();
      registry.register( Arc::new( NoOpPlugin { name : "a".into(), phases : vec![ Phase::Validation ], priority : 0 } ) ).unwrap();
      let result = registry.register( Arc::new( NoOpPlugin { name : "a".into(), phases : vec![ Phase::Validation ], priority : 0 } ) );
      assert!( result.is_err() );
    }

    #[ test ]
    fn cache_reflects_new_registrations()
    {
      let mut registry = PluginRegistry::new();
      registry.register( Arc::new( NoOpPlugin { name : "a".into(), phases : vec![ Phase::Validation ], priority : 0 } ) ).unwrap();
      assert_eq!( registry.plugins_for( Phase::Validation ).len(), 1 );
      registry.register( Arc::new( NoOpPlugin { name : "b".into(), phases : vec![ Phase::Validation ], priority : 0 } ) ).unwrap();
      assert_eq!( registry.plugins_for( Phase::Validation ).len(), 2 );
    }

    #[ test ]
    fn unbound_phase_returns_empty()
    {
      let mut registry = PluginRegistry::new();
      registry.register( Arc::new( NoOpPlugin { name : "a".into(), phases : vec![ Phase::Validation ], priority : 0 } ) ).unwrap();
      assert!( registry.plugins_for( Phase::PostProcessing ).is_empty() );
    }

    #[ test ]
    fn noop_plugin_executes_against_context()
    {
      let plugin = NoOpPlugin { name : "a".into(), phases : vec![ Phase::Validation ], priority : 0 };
      let mut ctx = InferenceContext::new( sample_request(), "default" );
      assert_eq!( plugin.execute( &mut ctx, Phase::Validation ).unwrap(), Outcome::Continue );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::PluginRegistry;
}
