//! Agent command resolution.
//!
//! Picks the agent CLI from the configured model (unless a command is set
//! explicitly) and expands argument templates for one task.

use std::collections::HashMap;

use crate::domain::models::AgentConfig;

/// Agent CLI family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Claude,
    Codex,
}

impl AgentKind {
    /// Route a model name to the CLI that serves it. Unknown models go to
    /// Claude.
    pub fn for_model(model: &str) -> Self {
        let model = model.trim().to_lowercase();
        let is_openai_reasoning = model.len() > 1
            && model.starts_with('o')
            && model[1..].starts_with(|c: char| c.is_ascii_digit());

        if model.starts_with("gpt-") || model.contains("codex") || is_openai_reasoning {
            Self::Codex
        } else {
            Self::Claude
        }
    }

    pub fn program(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
        }
    }
}

/// A resolved agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInvocation {
    pub program: String,
    pub args: Vec<String>,
}

/// Build the command line for a task.
///
/// Without configured args the agent gets `--model <model> <objective>`.
/// Configured args have `{task_id}`, `{branch}`, `{objective}` and
/// `{model}` substituted.
pub fn resolve_invocation(
    config: &AgentConfig,
    task_id: &str,
    branch: &str,
    objective: &str,
) -> AgentInvocation {
    let program = config
        .command
        .clone()
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| AgentKind::for_model(&config.model).program().to_string());

    let args = if config.args.is_empty() {
        vec![
            "--model".to_string(),
            config.model.clone(),
            objective.to_string(),
        ]
    } else {
        let vars: HashMap<&str, &str> = [
            ("task_id", task_id),
            ("branch", branch),
            ("objective", objective),
            ("model", config.model.as_str()),
        ]
        .into();
        config.args.iter().map(|arg| substitute(arg, &vars)).collect()
    };

    AgentInvocation { program, args }
}

fn substitute(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}
