//! Prompt templates for Ponder.
//!
//! Prompts can be customized by placing an `agent.toml` file in the custom
//! prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub agent: AgentPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts used by the orchestration loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPrompts {
    /// System prompt. `{{now}}` and `{{tools}}` are filled in per request.
    pub system: String,
    /// Feedback sent when a reply is neither a command nor an answer.
    pub reprompt: String,
    /// Final text used when the turn budget runs out with nothing to show.
    pub depth_exhausted: String,
}

impl Default for AgentPrompts {
    fn default() -> Self {
        Self {
            system: r#"You help the user answer their question using the available tools.
Now is: {{now}}

Your output MUST be exactly one tag based on these available tools:
{{tools}}

MANDATORY:
- Only return one tag per interaction
- Tool arguments go inside the tag as a JSON object
- You may add a confidence attribute to any tag, e.g. <final_answer confidence="high">
- If you have a source for the information, link it in the final answer
- The final answer must be in markdown format
- Answer using the same language as the question"#
                .to_string(),

            reprompt: "Your previous reply contained neither a tool tag nor a final answer. \
Reply with exactly one tool tag, or wrap your answer in <final_answer></final_answer>."
                .to_string(),

            depth_exhausted: "Max recursion depth exceeded before a final answer was produced."
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let agent_path = custom_path.join("agent.toml");
            if agent_path.exists() {
                let content = std::fs::read_to_string(&agent_path)?;
                prompts.agent = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// Render the system prompt for a request made at `now`.
    pub fn system_prompt(&self, now: chrono::DateTime<chrono::Local>, tools: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("now".to_string(), now.format("%Y-%m-%d %H:%M:%S").to_string());
        vars.insert("tools".to_string(), tools.to_string());
        self.render_with_custom(&self.agent.system, &vars)
    }
}
