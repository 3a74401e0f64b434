use std::env;
use tracing::warn;

/// Which backing implementation the store gateways are constructed with.
///
/// Selected once at startup and passed down explicitly; services never
/// consult a mutable global to decide where their data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// PostgREST-style hosted relational store.
    Live,
    /// Mutex-guarded in-process maps, used by tests and demo mode.
    InMemory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub store_backend: StoreBackend,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let supabase_url = env::var("SUPABASE_URL").unwrap_or_else(|_| {
            warn!("SUPABASE_URL not set, using empty value");
            String::new()
        });
        let supabase_anon_key = env::var("SUPABASE_ANON_PUBLIC_KEY").unwrap_or_else(|_| {
            warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
            String::new()
        });
        let supabase_jwt_secret = env::var("SUPABASE_JWT_SECRET").unwrap_or_else(|_| {
            warn!("SUPABASE_JWT_SECRET not set, using empty value");
            String::new()
        });

        let store_backend = match env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => StoreBackend::InMemory,
            Ok("live") => StoreBackend::Live,
            Ok(other) => {
                warn!("Unknown STORE_BACKEND '{}', falling back to live", other);
                StoreBackend::Live
            }
            Err(_) => {
                if supabase_url.is_empty() || supabase_anon_key.is_empty() {
                    warn!("Store connection not configured, using in-memory backend");
                    StoreBackend::InMemory
                } else {
                    StoreBackend::Live
                }
            }
        };

        let config = Self {
            supabase_url,
            supabase_anon_key,
            supabase_jwt_secret,
            store_backend,
        };

        if !config.is_configured() && config.store_backend == StoreBackend::Live {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}
