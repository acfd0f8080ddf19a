use std::path::PathBuf;
use tradegene::config::{AppConfig, ConfigManager, ConfigSection, EvolutionConfig, SelectionMethod};
use tradegene::engines::generation::parser::ParseMode;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("tradegene-{}-{}", std::process::id(), name))
}

#[test]
fn test_defaults_validate() {
    assert!(AppConfig::default().validate().is_ok());
    assert_eq!(EvolutionConfig::section_name(), "evolution");
}

#[test]
fn test_invalid_sections_are_rejected() {
    let bad = [
        EvolutionConfig { population_size: 1, ..Default::default() },
        EvolutionConfig { elitism_count: 50, ..Default::default() },
        EvolutionConfig { mutation_rate: f64::NAN, ..Default::default() },
        EvolutionConfig { tournament_size: 0, ..Default::default() },
        EvolutionConfig { constant_min: 5.0, constant_max: 5.0, ..Default::default() },
    ];
    for config in bad {
        assert!(config.validate().is_err(), "accepted {:?}", config);
    }
}

#[test]
fn test_update_keeps_previous_config_on_error() {
    let manager = ConfigManager::new();
    manager.update(|c| c.evolution.population_size = 80).unwrap();
    assert_eq!(manager.get().unwrap().evolution.population_size, 80);

    assert!(manager.update(|c| c.evolution.crossover_rate = 2.0).is_err());
    assert_eq!(manager.get().unwrap().evolution.crossover_rate, 0.7);
}

#[test]
fn test_toml_save_and_load() {
    let path = temp_path("roundtrip.toml");
    let manager = ConfigManager::new();
    manager
        .update(|c| {
            c.evolution.seed = Some(1234);
            c.evolution.selection_method = SelectionMethod::Roulette;
            c.parser.mode = ParseMode::Strict;
        })
        .unwrap();
    manager.save_to_file(&path).unwrap();

    let loaded = ConfigManager::new();
    loaded.load_from_file(&path).unwrap();
    let config = loaded.get().unwrap();
    assert_eq!(config.evolution.seed, Some(1234));
    assert_eq!(config.evolution.selection_method, SelectionMethod::Roulette);
    assert_eq!(config.parser.mode, ParseMode::Strict);

    let _ = std::fs::remove_file(path);
}

#[test]
fn test_partial_file_uses_defaults() {
    let path = temp_path("partial.toml");
    std::fs::write(&path, "[evolution]\npopulation_size = 12\n\n[protocol]\ncompat_mode = \"strict\"\n").unwrap();

    let manager = ConfigManager::new();
    manager.load_from_file(&path).unwrap();
    let config = manager.get().unwrap();
    assert_eq!(config.evolution.population_size, 12);
    assert_eq!(config.evolution.num_generations, 30);
    assert_eq!(config.protocol.compat_mode, ParseMode::Strict);
    assert_eq!(config.protocol.default_author, "anonymous");

    let _ = std::fs::remove_file(path);
}

#[test]
fn test_layered_environment_overrides_file() {
    let path = temp_path("layered.toml");
    std::fs::write(&path, "[evolution]\npopulation_size = 12\nnum_generations = 4\n").unwrap();

    std::env::set_var("TRADEGENE__EVOLUTION__NUM_GENERATIONS", "9");
    let manager = ConfigManager::new();
    let result = manager.load_layered(Some(&path));
    std::env::remove_var("TRADEGENE__EVOLUTION__NUM_GENERATIONS");
    result.unwrap();

    let config = manager.get().unwrap();
    assert_eq!(config.evolution.population_size, 12);
    assert_eq!(config.evolution.num_generations, 9);

    let _ = std::fs::remove_file(path);
}
