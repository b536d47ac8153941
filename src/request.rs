//! Provider-neutral inbound request shape (spec.md §6).

mod private
{
  use core::time::Duration;
  use std::collections::HashMap;
  use serde::{ Deserialize, Serialize };

  /// Role of a message in a conversation.
  #[ derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize ) ]
  #[ serde( rename_all = "lowercase" ) ]
  pub enum Role
  {
    /// System-level instruction.
    System,
    /// End-user message.
    User,
    /// Model-generated message.
    Assistant,
    /// Tool execution result fed back to the model.
    Tool,
  }

  /// A single chat message.
  #[ derive( Debug, Clone, PartialEq, Serialize, Deserialize ) ]
  pub struct Message
  {
    /// Speaker role.
    pub role : Role,
    /// Message text.
    pub content : String,
    /// Optional participant name (for `tool`/multi-agent transcripts).
    #[ serde( default, skip_serializing_if = "Option::is_none" ) ]
    pub name : Option< String >,
    /// Tool call this message answers, if `role == Tool`.
    #[ serde( default, skip_serializing_if = "Option::is_none" ) ]
    pub tool_call_id : Option< String >,
  }

  /// Free-form generation parameters forwarded to the provider largely
  /// untouched; the gateway only inspects a handful of keys (e.g.
  /// `max.retries`) for its own control flow.
  pub type Parameters = HashMap< String, serde_json::Value >;

  /// A single inference request (spec.md §3 `InferenceRequest`).
  ///
  /// Immutable after construction; `requestId` is unique per tenant.
  #[ derive( Debug, Clone, PartialEq, Serialize, Deserialize ) ]
  pub struct InferenceRequest
  {
    /// Caller-visible request id, unique per tenant.
    pub request_id : String,
    /// Logical model identifier to resolve via the model repository.
    pub model : String,
    /// Ordered, nonempty conversation history.
    pub messages : Vec< Message >,
    /// Generation parameters (temperature, max_tokens, tools, ...).
    #[ serde( default ) ]
    pub parameters : Parameters,
    /// Whether the caller wants a streamed response.
    #[ serde( default ) ]
    pub streaming : bool,
    /// Scheduling priority hint; higher runs first within a batch.
    #[ serde( default ) ]
    pub priority : i32,
    /// Caller-supplied timeout; clamped against policy and engine defaults.
    #[ serde( default, skip_serializing_if = "Option::is_none" ) ]
    pub timeout : Option< Duration >,
    /// Provider the caller prefers, consulted by the router scoring.
    #[ serde( default, skip_serializing_if = "Option::is_none" ) ]
    pub preferred_provider : Option< String >,
    /// Device hint (e.g. `"cuda"`, `"cpu"`) consulted by the router scoring.
    #[ serde( default, skip_serializing_if = "Option::is_none" ) ]
    pub device_hint : Option< String >,
    /// Free-form request metadata (`X-Tenant-ID`, `X-Request-ID`, ...).
    #[ serde( default ) ]
    pub metadata : HashMap< String, String >,
  }

  impl InferenceRequest
  {
    /// Validate the structural invariants spec.md §3 requires : a nonempty
    /// request id, a nonempty model, and at least one message.
    pub fn validate( &self ) -> Result< (), crate::error::Error >
    {
      if self.request_id.is_empty()
      {
        return Err( crate::error::Error::ValidationError( "request_id must not be empty".to_string() ) );
      }
      if self.model.is_empty()
      {
        return Err( crate::error::Error::ValidationError( "model must not be empty".to_string() ) );
      }
      if self.messages.is_empty()
      {
        return Err( crate::error::Error::ValidationError( "messages must not be empty".to_string() ) );
      }
      Ok( () )
    }

    /// `max.retries` override from request metadata, clamped to `[1, 5]`
    /// per spec.md §4.2.
    #[ must_use ]
    pub fn max_retries_override( &self ) -> Option< u32 >
    {
      self.parameters
        .get( "max.retries" )
        .and_then( serde_json::Value::as_u64 )
        .map( | v | v.clamp( 1, 5 ) as u32 )
    }

    /// Whether the request declares tool/function definitions (`tools` or
    /// `functions`, spec.md §6), consulted by the router's
    /// feature-compatibility scoring factor.
    #[ must_use ]
    pub fn requires_tool_use( &self ) -> bool
    {
      self.parameters.get( "tools" ).or_else( || self.parameters.get( "functions" ) )
        .is_some_and( | value | value.as_array().map_or( true, | arr | !arr.is_empty() ) )
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    fn base_request() -> InferenceRequest
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
    fn max_retries_override_clamps_into_range()
    {
      let mut request = base_request();
      request.parameters.insert( "max.retries".to_string(), serde_json::json!( 9 ) );
      assert_eq!( request.max_retries_override(), Some( 5 ) );

      request.parameters.insert( "max.retries".to_string(), serde_json::json!( 0 ) );
      assert_eq!( request.max_retries_override(), Some( 1 ) );
    }

    #[ test ]
    fn max_retries_override_absent_by_default()
    {
      assert_eq!( base_request().max_retries_override(), None );
    }

    #[ test ]
    fn requires_tool_use_detects_nonempty_tools_array()
    {
      let mut request = base_request();
      assert!( !request.requires_tool_use() );

      request.parameters.insert( "tools".to_string(), serde_json::json!( [] ) );
      assert!( !request.requires_tool_use() );

      request.parameters.insert( "tools".to_string(), serde_json::json!( [ { "name" : "lookup" } ] ) );
      assert!( request.requires_tool_use() );
    }

    #[ test ]
    fn requires_tool_use_honors_functions_alias()
    {
      let mut request = base_request();
      request.parameters.insert( "functions".to_string(), serde_json::json!( [ { "name" : "lookup" } ] ) );
      assert!( request.requires_tool_use() );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::Role;
  exposed use private::Message;
  exposed use private::Parameters;
  exposed use private::InferenceRequest;
}
