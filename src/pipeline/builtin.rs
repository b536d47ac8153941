//! Built-in plugins shipped with the gateway : structural validation, a
//! policy-deny example, and a pass-through pre/post-processing pair usable
//! as a starting point for tenant-supplied plugins.

mod private
{
  use std::collections::HashSet;
  use crate::context::{ InferenceContext, Phase };
  use crate::error::Error;
  use crate::pipeline::plugin::{ Outcome, PipelinePlugin };

  /// Validates `context.request` via [`crate::request::InferenceRequest::validate`]
  /// and aborts the pipeline on failure (spec.md §4.1 `VALIDATION` phase).
  #[ derive( Debug, Default ) ]
  pub struct RequestValidationPlugin;

  impl PipelinePlugin for RequestValidationPlugin
  {
    fn name( &self ) -> &str
    {
      "builtin.request_validation"
    }

    fn phases( &self ) -> &[ Phase ]
    {
      &[ Phase::Validation ]
    }

    fn priority( &self ) -> i32
    {
      i32::MIN
    }

    fn execute( &self, context : &mut InferenceContext, _phase : Phase ) -> Result< Outcome, Error >
    {
      match context.request.validate()
      {
        Ok( () ) => Ok( Outcome::Continue ),
        Err( error ) => Ok( Outcome::Abort( error.to_string() ) ),
      }
    }
  }

  /// Denies requests for a configured set of model ids (spec.md §4.1 :
  /// "`PolicyDenied` when a policy plugin denies"). Runs after
  /// [`RequestValidationPlugin`] in the `VALIDATION` phase, so a denylisted
  /// model is still reported as `PolicyDenied`, not `ValidationError`, even
  /// though both plugins share a phase. A template for tenant-supplied
  /// allow-list, budget, or content-policy plugins.
  #[ derive( Debug, Default ) ]
  pub struct ModelDenylistPolicyPlugin
  {
    denied : HashSet< String >,
  }

  impl ModelDenylistPolicyPlugin
  {
    /// Build a policy plugin that denies the given model ids outright.
    #[ must_use ]
    pub fn new( denied : impl IntoIterator< Item = String > ) -> Self
    {
      Self { denied : denied.into_iter().collect() }
    }
  }

  impl PipelinePlugin for ModelDenylistPolicyPlugin
  {
    fn name( &self ) -> &str
    {
      "builtin.model_denylist_policy"
    }

    fn phases( &self ) -> &[ Phase ]
    {
      &[ Phase::Validation ]
    }

    fn execute( &self, context : &mut InferenceContext, _phase : Phase ) -> Result< Outcome, Error >
    {
      if self.denied.contains( &context.request.model )
      {
        return Ok( Outcome::Deny( format!( "model '{}' is denied by tenant policy", context.request.model ) ) );
      }
      Ok( Outcome::Continue )
    }
  }

  /// Stamps `context.attributes["gateway.trace"]` so downstream phases and
  /// tests can observe that pre-processing ran. A template for tenant
  /// prompt-templating or PII-scrubbing plugins.
  #[ derive( Debug, Default ) ]
  pub struct PassThroughPreProcessingPlugin;

  impl PipelinePlugin for PassThroughPreProcessingPlugin
  {
    fn name( &self ) -> &str
    {
      "builtin.pass_through_pre_processing"
    }

    fn phases( &self ) -> &[ Phase ]
    {
      &[ Phase::PreProcessing ]
    }

    fn execute( &self, context : &mut InferenceContext, _phase : Phase ) -> Result< Outcome, Error >
    {
      context.attributes.insert( "gateway.trace".to_string(), "pre_processing".to_string() );
      Ok( Outcome::Continue )
    }
  }

  /// Records token usage into `context.attributes` for audit consumers. A
  /// template for tenant response-redaction or logging plugins.
  #[ derive( Debug, Default ) ]
  pub struct PassThroughPostProcessingPlugin;

  impl PipelinePlugin for PassThroughPostProcessingPlugin
  {
    fn name( &self ) -> &str
    {
      "builtin.pass_through_post_processing"
    }

    fn phases( &self ) -> &[ Phase ]
    {
      &[ Phase::PostProcessing ]
    }

    fn execute( &self, context : &mut InferenceContext, _phase : Phase ) -> Result< Outcome, Error >
    {
      if let Some( response ) = &context.response
      {
        context.attributes.insert( "gateway.tokens_used".to_string(), response.tokens_used.to_string() );
      }
      Ok( Outcome::Continue )
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use crate::request::{ InferenceRequest, Message, Role };

    fn empty_messages_request() -> InferenceRequest
    {
      InferenceRequest
      {
        request_id : "r1".into(),
        model : "m1".into(),
        messages : vec![],
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
    fn validation_plugin_aborts_on_empty_messages()
    {
      let plugin = RequestValidationPlugin;
      let mut ctx = InferenceContext::new( empty_messages_request(), "default" );
      let outcome = plugin.execute( &mut ctx, Phase::Validation ).unwrap();
      assert!( matches!( outcome, Outcome::Abort( _ ) ) );
    }

    #[ test ]
    fn policy_plugin_denies_listed_model()
    {
      let plugin = ModelDenylistPolicyPlugin::new( vec![ "banned-model".to_string() ] );
      let mut ctx = InferenceContext::new(
        InferenceRequest
        {
          request_id : "r1".into(),
          model : "banned-model".into(),
          messages : vec![ Message { role : Role::User, content : "hi".into(), name : None, tool_call_id : None } ],
          parameters : Default::default(),
          streaming : false,
          priority : 0,
          timeout : None,
          preferred_provider : None,
          device_hint : None,
          metadata : Default::default(),
        },
        "default",
      );
      let outcome = plugin.execute( &mut ctx, Phase::Validation ).unwrap();
      assert!( matches!( outcome, Outcome::Deny( _ ) ) );
    }

    #[ test ]
    fn policy_plugin_allows_other_models()
    {
      let plugin = ModelDenylistPolicyPlugin::new( vec![ "banned-model".to_string() ] );
      let mut ctx = InferenceContext::new(
        InferenceRequest
        {
          request_id : "r1".into(),
          model : "allowed-model".into(),
          messages : vec![ Message { role : Role::User, content : "hi".into(), name : None, tool_call_id : None } ],
          parameters : Default::default(),
          streaming : false,
          priority : 0,
          timeout : None,
          preferred_provider : None,
          device_hint : None,
          metadata : Default::default(),
        },
        "default",
      );
      let outcome = plugin.execute( &mut ctx, Phase::Validation ).unwrap();
      assert_eq!( outcome, Outcome::Continue );
    }

    #[ test ]
    fn pre_processing_plugin_stamps_trace()
    {
      let plugin = PassThroughPreProcessingPlugin;
      let mut ctx = InferenceContext::new(
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
        },
        "default",
      );
      plugin.execute( &mut ctx, Phase::PreProcessing ).unwrap();
      assert_eq!( ctx.attributes.get( "gateway.trace" ).map( String::as_str ), Some( "pre_processing" ) );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::RequestValidationPlugin;
  exposed use private::ModelDenylistPolicyPlugin;
  exposed use private::PassThroughPreProcessingPlugin;
  exposed use private::PassThroughPostProcessingPlugin;
}
