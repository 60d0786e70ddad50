//! Provider descriptors for the external reasoning command.
//!
//! Provider configuration is resolved exactly once at load time into a
//! closed descriptor; an unknown provider id is a config error, never an
//! invocation-time surprise.

use crate::config::{AiConfig, ConfigError, DeliveryMode};

/// Closed set of invocation shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSpec {
    /// A known CLI with a prompt flag and fixed extra arguments.
    Builtin {
        id: String,
        command: String,
        prompt_flag: String,
        extra_args: Vec<String>,
        delivery: DeliveryMode,
    },
    /// An arbitrary command template; `{prompt}` marks the substitution
    /// point in argument mode.
    Custom {
        template: String,
        delivery: DeliveryMode,
        shell: bool,
    },
}

/// A concrete command ready to execute: program, argv, optional stdin body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationPlan {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl ProviderSpec {
    /// Resolve the configured provider id. Rejects unknown ids and empty
    /// custom templates here, at load time.
    pub fn resolve(ai: &AiConfig) -> Result<Self, ConfigError> {
        match ai.provider.as_str() {
            "claude" => Ok(ProviderSpec::Builtin {
                id: "claude".to_string(),
                command: ai.claude.command.clone(),
                prompt_flag: ai.claude.prompt_flag.clone(),
                extra_args: ai.claude.extra_args.clone(),
                delivery: ai.claude.delivery,
            }),
            "custom" => {
                if ai.custom.template.trim().is_empty() {
                    return Err(ConfigError::EmptyTemplate);
                }
                Ok(ProviderSpec::Custom {
                    template: ai.custom.template.clone(),
                    delivery: ai.custom.delivery,
                    shell: ai.custom.shell,
                })
            }
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ProviderSpec::Builtin { id, .. } => id,
            ProviderSpec::Custom { .. } => "custom",
        }
    }

    /// Build the concrete command for one prompt.
    pub fn plan(&self, prompt: &str) -> InvocationPlan {
        match self {
            ProviderSpec::Builtin {
                command,
                prompt_flag,
                extra_args,
                delivery,
                ..
            } => match delivery {
                DeliveryMode::Piped => InvocationPlan {
                    program: command.clone(),
                    args: extra_args.clone(),
                    stdin: Some(prompt.to_string()),
                },
                DeliveryMode::Argument => {
                    let mut args = Vec::with_capacity(extra_args.len() + 2);
                    if prompt_flag.is_empty() {
                        args.push(prompt.to_string());
                    } else {
                        args.push(prompt_flag.clone());
                        args.push(prompt.to_string());
                    }
                    args.extend(extra_args.iter().cloned());
                    InvocationPlan {
                        program: command.clone(),
                        args,
                        stdin: None,
                    }
                }
            },
            ProviderSpec::Custom {
                template,
                delivery,
                shell,
            } => {
                let piped = *delivery == DeliveryMode::Piped;
                if *shell {
                    let rendered = if piped {
                        template.clone()
                    } else {
                        template.replace("{prompt}", prompt)
                    };
                    InvocationPlan {
                        program: "sh".to_string(),
                        args: vec!["-c".to_string(), rendered],
                        stdin: piped.then(|| prompt.to_string()),
                    }
                } else {
                    // Token substitution keeps prompts with whitespace
                    // intact; the template itself splits on whitespace.
                    let mut tokens = template.split_whitespace().map(|t| {
                        if t == "{prompt}" && !piped {
                            prompt.to_string()
                        } else {
                            t.to_string()
                        }
                    });
                    let program = tokens.next().unwrap_or_default();
                    InvocationPlan {
                        program,
                        args: tokens.collect(),
                        stdin: piped.then(|| prompt.to_string()),
                    }
                }
            }
        }
    }
}
