use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use dacplay::config::EngineConfig;

use crate::cli::command::EngineOverrides;

/// Engine settings from the optional YAML file, with command-line overrides
/// applied on top and the result validated.
pub fn load_engine_config(path: Option<&Path>, overrides: &EngineOverrides) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => {
            let yaml = fs::read_to_string(path)
                .with_context(|| format!("Cannot read config file {}", path.display()))?;
            parse_engine_config(&yaml)
                .with_context(|| format!("Invalid config file {}", path.display()))?
        }
        None => EngineConfig::default(),
    };

    apply_overrides(&mut config, overrides);
    config.validate()?;
    log::debug!("Engine config: {config:?}");
    Ok(config)
}

/// Parses a YAML document; missing fields keep their defaults.
pub fn parse_engine_config(yaml: &str) -> Result<EngineConfig> {
    if yaml.trim().is_empty() {
        return Ok(EngineConfig::default());
    }
    Ok(serde_yaml_ng::from_str(yaml)?)
}

pub fn apply_overrides(config: &mut EngineConfig, overrides: &EngineOverrides) {
    if let Some(volume) = overrides.volume {
        config.volume = volume;
    }
    if let Some(sample_rate) = overrides.sample_rate {
        config.sample_rate = sample_rate;
    }
    if let Some(channels) = overrides.channels {
        config.channels = channels;
    }
    if let Some(buffer_samples) = overrides.buffer_samples {
        config.buffer_samples = buffer_samples;
    }
    if let Some(dac_bits) = overrides.dac_bits {
        config.dac_bits = dac_bits;
    }
    if let Some(end_of_track) = overrides.end_of_track {
        config.end_of_track = end_of_track.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::command::EndOfTrack;
    use dacplay::config::EndOfTrackPolicy;

    #[test]
    fn yaml_fills_missing_fields_with_defaults() -> Result<()> {
        let config = parse_engine_config(
            "sample_rate: 16000\nend_of_track: stop\nbuffer_samples: 1152\n",
        )?;
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.end_of_track, EndOfTrackPolicy::Stop);
        assert_eq!(config.buffer_samples, 1152);
        assert_eq!(config.dac_bits, EngineConfig::default().dac_bits);

        assert_eq!(parse_engine_config("")?, EngineConfig::default());
        assert!(parse_engine_config("end_of_track: rewind\n").is_err());
        Ok(())
    }

    #[test]
    fn overrides_take_precedence() -> Result<()> {
        let mut config = parse_engine_config("volume: 20\nsample_rate: 16000\n")?;
        let overrides = EngineOverrides {
            volume: Some(75),
            end_of_track: Some(EndOfTrack::Stop),
            ..Default::default()
        };
        apply_overrides(&mut config, &overrides);

        assert_eq!(config.volume, 75);
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.end_of_track, EndOfTrackPolicy::Stop);
        Ok(())
    }

    #[test]
    fn invalid_result_is_rejected() {
        let overrides = EngineOverrides {
            sample_rate: Some(0),
            ..Default::default()
        };
        assert!(load_engine_config(None, &overrides).is_err());
    }
}
