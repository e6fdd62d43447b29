//! Loading [`RoverSettings`] from a TOML file and the environment

use anyhow::Context;
use core_rv::messages::settings::RoverSettings;
use std::path::Path;

/// Overrides `http.bind`
pub const BIND_ENV: &str = "ROVER_BIND";

/// Read settings from `path`, or use the defaults, then apply environment overrides and validate
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<RoverSettings> {
    let settings = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            parse_settings(&text).with_context(|| format!("invalid settings in {}", path.display()))?
        }
        None => RoverSettings::default(),
    };
    let settings = apply_env_overrides(settings, |key| std::env::var(key).ok());
    settings.validate()?;
    Ok(settings)
}

pub fn parse_settings(text: &str) -> Result<RoverSettings, toml::de::Error> {
    toml::from_str(text)
}

pub fn apply_env_overrides(
    mut settings: RoverSettings,
    var: impl Fn(&str) -> Option<String>,
) -> RoverSettings {
    if let Some(bind) = var(BIND_ENV).filter(|bind| !bind.trim().is_empty()) {
        settings.http.bind = bind;
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_rv::avoidance::AvoidancePolicy;
    use core_rv::drive::TurnStyle;

    #[test]
    fn sample_file_is_valid() {
        let settings = parse_settings(include_str!("../../rover.toml")).unwrap();
        assert_eq!(settings.validate(), Ok(()));
        assert_eq!(settings, RoverSettings::default());
    }

    #[test]
    fn partial_file() {
        let settings = parse_settings(
            r#"
            [drive]
            turn_style = "spin"

            [avoidance]
            policy = "stop_on_any"

            [pins]
            us_left = { trigger = 17, echo = 27 }
            "#,
        )
        .unwrap();
        assert_eq!(settings.drive.turn_style, TurnStyle::Spin);
        assert_eq!(settings.avoidance.policy, AvoidancePolicy::StopOnAny);
        assert_eq!(settings.pins.us_left.map(|p| p.echo), Some(27));
        assert_eq!(settings.pins.in1, 26);
    }

    #[test]
    fn unknown_values_are_rejected() {
        assert!(parse_settings("[drive]\nturn_style = \"drift\"").is_err());
    }

    #[test]
    fn bind_override() {
        let settings = apply_env_overrides(RoverSettings::default(), |key| {
            (key == BIND_ENV).then(|| "127.0.0.1:9000".to_string())
        });
        assert_eq!(settings.http.bind, "127.0.0.1:9000");

        let settings = apply_env_overrides(RoverSettings::default(), |_| Some(" ".into()));
        assert_eq!(settings.http.bind, "0.0.0.0:8000");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_settings(Some(Path::new("/nonexistent/rover.toml"))).is_err());
    }
}
