use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    /// Direct edge-function URL used as the fallback channel when the
    /// functions gateway is unreachable. Derived from `supabase_url` when
    /// not set explicitly.
    pub supabase_functions_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let supabase_url = env::var("SUPABASE_URL").unwrap_or_else(|_| {
            warn!("SUPABASE_URL not set, using empty value");
            String::new()
        });

        let config = Self {
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            supabase_functions_url: env::var("SUPABASE_FUNCTIONS_URL")
                .unwrap_or_else(|_| Self::derive_functions_url(&supabase_url)),
            supabase_url,
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    /// Supabase projects expose edge functions both behind the project URL
    /// (`<ref>.supabase.co/functions/v1`) and on a dedicated host
    /// (`<ref>.functions.supabase.co`). The dedicated host is the fallback
    /// channel for remote invocations.
    pub fn derive_functions_url(supabase_url: &str) -> String {
        if supabase_url.is_empty() {
            return String::new();
        }
        supabase_url.replacen(".supabase.co", ".functions.supabase.co", 1)
    }
}
