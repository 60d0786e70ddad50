//! Unit tests for provider resolution and invocation plans

use signalyst::ai::ProviderSpec;
use signalyst::config::{AiConfig, ConfigError, DeliveryMode};

#[test]
fn test_default_config_resolves_builtin() {
    let ai = AiConfig::default();
    let provider = ProviderSpec::resolve(&ai).unwrap();
    assert_eq!(provider.id(), "claude");

    let plan = provider.plan("analyze the market");
    assert_eq!(plan.program, "claude");
    assert_eq!(plan.args[0], "-p");
    assert_eq!(plan.args[1], "analyze the market");
    assert!(plan.args.contains(&"--allowedTools".to_string()));
    assert!(plan.stdin.is_none());
}

#[test]
fn test_builtin_piped_delivery_moves_prompt_to_stdin() {
    let mut ai = AiConfig::default();
    ai.claude.delivery = DeliveryMode::Piped;
    let provider = ProviderSpec::resolve(&ai).unwrap();

    let plan = provider.plan("analyze the market");
    assert_eq!(plan.program, "claude");
    assert!(!plan.args.iter().any(|a| a.contains("analyze")));
    assert_eq!(plan.stdin.as_deref(), Some("analyze the market"));
}

#[test]
fn test_custom_shell_template_renders_prompt() {
    let mut ai = AiConfig::default();
    ai.provider = "custom".to_string();
    ai.custom.template = "mycli --run '{prompt}'".to_string();
    ai.custom.shell = true;
    let provider = ProviderSpec::resolve(&ai).unwrap();

    let plan = provider.plan("hello");
    assert_eq!(plan.program, "sh");
    assert_eq!(plan.args[0], "-c");
    assert_eq!(plan.args[1], "mycli --run 'hello'");
    assert!(plan.stdin.is_none());
}

#[test]
fn test_custom_argv_template_substitutes_token_whole() {
    let mut ai = AiConfig::default();
    ai.provider = "custom".to_string();
    ai.custom.template = "mycli --run {prompt} --json".to_string();
    ai.custom.shell = false;
    let provider = ProviderSpec::resolve(&ai).unwrap();

    // The prompt stays one argv entry even with whitespace inside.
    let plan = provider.plan("a prompt with spaces");
    assert_eq!(plan.program, "mycli");
    assert_eq!(
        plan.args,
        vec!["--run", "a prompt with spaces", "--json"]
    );
}

#[test]
fn test_custom_piped_delivery() {
    let mut ai = AiConfig::default();
    ai.provider = "custom".to_string();
    ai.custom.template = "mycli --stdin".to_string();
    ai.custom.shell = false;
    ai.custom.delivery = DeliveryMode::Piped;
    let provider = ProviderSpec::resolve(&ai).unwrap();

    let plan = provider.plan("body");
    assert_eq!(plan.program, "mycli");
    assert_eq!(plan.args, vec!["--stdin"]);
    assert_eq!(plan.stdin.as_deref(), Some("body"));
}

#[test]
fn test_unknown_provider_rejected_at_load() {
    let mut ai = AiConfig::default();
    ai.provider = "gemini".to_string();
    assert!(matches!(
        ProviderSpec::resolve(&ai),
        Err(ConfigError::UnknownProvider(p)) if p == "gemini"
    ));
}

#[test]
fn test_custom_without_template_rejected_at_load() {
    let mut ai = AiConfig::default();
    ai.provider = "custom".to_string();
    assert!(matches!(
        ProviderSpec::resolve(&ai),
        Err(ConfigError::EmptyTemplate)
    ));
}
