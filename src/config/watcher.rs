//! Hot-reloading of a serialized [`GatewayConfig`] snapshot from disk,
//! gated behind the `dynamic_configuration` feature (spec.md Design
//! Notes §9 ambient expansion), in the style of the teacher's
//! file-watching config reloaders.

#[ cfg( feature = "dynamic_configuration" ) ]
mod private
{
  use std::path::{ Path, PathBuf };
  use std::sync::Arc;
  use parking_lot::RwLock;
  use notify::{ Event, RecommendedWatcher, RecursiveMode, Watcher };
  use crate::config::GatewayConfig;
  use crate::error::Error;

  #[ cfg( feature = "logging" ) ]
  use tracing::{ error, info };

  /// Something that can turn a config file's bytes into a validated
  /// [`GatewayConfig`]. Kept as a trait rather than hard-coding a
  /// serialization format, since the gateway's config is assembled from
  /// typed Rust structs rather than a single serde-derived shape.
  pub trait ConfigLoader : Send + Sync
  {
    /// Parse and validate a configuration snapshot from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if the file cannot be read
    /// or fails validation.
    fn load( &self, path : &Path ) -> Result< GatewayConfig, Error >;
  }

  /// Watches `config_path`'s parent directory and reloads on write
  /// events, applying the new configuration only if it validates.
  #[ derive( Debug ) ]
  pub struct ConfigWatcher
  {
    config : Arc< RwLock< GatewayConfig > >,
    config_path : PathBuf,
    _watcher : RecommendedWatcher,
  }

  impl ConfigWatcher
  {
    /// Start watching `config_path`, using `loader` to parse reloads and
    /// `initial` until the first successful reload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if the underlying file
    /// watcher cannot be installed.
    pub fn new(
      config_path : PathBuf,
      initial : GatewayConfig,
      loader : Arc< dyn ConfigLoader >,
    ) -> Result< Self, Error >
    {
      let config = Arc::new( RwLock::new( initial ) );
      let config_for_callback = Arc::clone( &config );
      let path_for_callback = config_path.clone();
      let loader_for_callback = Arc::clone( &loader );

      let mut watcher = notify::recommended_watcher( move | event : Result< Event, notify::Error > |
      {
        let Ok( event ) = event else { return };
        if !event.kind.is_modify() || !event.paths.iter().any( | p | p == &path_for_callback )
        {
          return;
        }
        match loader_for_callback.load( &path_for_callback )
        {
          Ok( reloaded ) =>
          {
            *config_for_callback.write() = reloaded;

            #[ cfg( feature = "logging" ) ]
            info!( path = %path_for_callback.display(), "reloaded gateway configuration" );
          }
          Err( _error ) =>
          {
            #[ cfg( feature = "logging" ) ]
            error!( path = %path_for_callback.display(), error = %_error, "rejected invalid configuration reload, keeping prior config" );
          }
        }
      } )
      .map_err( | error | Error::ConfigurationError( format!( "failed to install config watcher : {error}" ) ) )?;

      let watch_target = config_path.parent().unwrap_or( &config_path ).to_path_buf();
      watcher.watch( &watch_target, RecursiveMode::NonRecursive )
        .map_err( | error | Error::ConfigurationError( format!( "failed to watch {} : {error}", watch_target.display() ) ) )?;

      Ok( Self { config, config_path, _watcher : watcher } )
    }

    /// Current configuration snapshot.
    #[ must_use ]
    pub fn config( &self ) -> GatewayConfig
    {
      self.config.read().clone()
    }

    /// Path being watched.
    #[ must_use ]
    pub fn config_path( &self ) -> &Path
    {
      &self.config_path
    }
  }
}

#[ cfg( feature = "dynamic_configuration" ) ]
::mod_interface::mod_interface!
{
  exposed use private::ConfigLoader;
  exposed use private::ConfigWatcher;
}
