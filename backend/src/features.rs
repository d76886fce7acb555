//! Feature flags: per-environment defaults with `FF_*` overrides.

use taskdeck_shared::FeatureFlags;

use crate::config::{parse_bool, ConfigError, Environment};

pub fn defaults(environment: Environment) -> FeatureFlags {
    match environment {
        Environment::Development | Environment::Production => FeatureFlags::default(),
        Environment::Test => FeatureFlags {
            ai_suggestions: false,
            ..FeatureFlags::default()
        },
    }
}

/// Applies `FF_AI_SUGGESTIONS`, `FF_CATEGORIES`, `FF_EMAIL_NOTIFICATIONS` and
/// `FF_DARK_MODE` on top of the environment defaults.
pub fn resolve<F>(environment: Environment, lookup: F) -> Result<FeatureFlags, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut flags = defaults(environment);
    let overrides: [(&'static str, &mut bool); 4] = [
        ("FF_AI_SUGGESTIONS", &mut flags.ai_suggestions),
        ("FF_CATEGORIES", &mut flags.categories),
        ("FF_EMAIL_NOTIFICATIONS", &mut flags.email_notifications),
        ("FF_DARK_MODE", &mut flags.dark_mode),
    ];
    for (name, slot) in overrides {
        if let Some(raw) = lookup(name) {
            *slot = parse_bool(name, &raw)?;
        }
    }
    Ok(flags)
}
