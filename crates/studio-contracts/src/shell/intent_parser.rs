use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, NO_ARG_COMMANDS, RAW_ARG_COMMANDS, SINGLE_PATH_COMMANDS,
};

/// One parsed line of studio shell input.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub prompt: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            command_args: BTreeMap::new(),
        }
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.command_args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

fn find_spec(command: &str, specs: &'static [CommandSpec]) -> Option<&'static CommandSpec> {
    specs.iter().find(|spec| spec.command == command)
}

fn parse_single_path_arg(arg: &str) -> String {
    if arg.trim().is_empty() {
        return String::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect::<Vec<String>>()
            .join(" "),
        Err(_) => arg.trim().to_string(),
    }
}

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(spec) = find_spec(&command, RAW_ARG_COMMANDS) {
                let mut intent = Intent::new(spec.action, text);
                intent
                    .command_args
                    .insert(spec.arg_key.to_string(), Value::String(arg.to_string()));
                return intent;
            }

            if let Some(spec) = find_spec(&command, SINGLE_PATH_COMMANDS) {
                let mut intent = Intent::new(spec.action, text);
                intent.command_args.insert(
                    spec.arg_key.to_string(),
                    Value::String(parse_single_path_arg(arg)),
                );
                return intent;
            }

            if let Some(spec) = find_spec(&command, NO_ARG_COMMANDS) {
                return Intent::new(spec.action, text);
            }

            let mut intent = Intent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    let mut intent = Intent::new("generate", text);
    intent.prompt = Some(raw_trimmed.to_string());
    intent
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_intent;

    #[test]
    fn plain_text_is_a_generate_prompt() {
        let intent = parse_intent("  a red cube on a marble floor ");
        assert_eq!(intent.action, "generate");
        assert_eq!(intent.prompt.as_deref(), Some("a red cube on a marble floor"));
    }

    #[test]
    fn blank_line_is_noop() {
        assert_eq!(parse_intent("   ").action, "noop");
    }

    #[test]
    fn upload_keeps_quoted_path_with_spaces() {
        let intent = parse_intent("/upload \"/tmp/my photo.png\"");
        assert_eq!(intent.action, "upload");
        assert_eq!(intent.command_args["path"], json!("/tmp/my photo.png"));
        assert_eq!(intent.arg_str("path"), Some("/tmp/my photo.png"));
    }

    #[test]
    fn save_without_name_has_empty_filename() {
        let intent = parse_intent("/save");
        assert_eq!(intent.action, "save");
        assert_eq!(intent.arg_str("filename"), None);
    }

    #[test]
    fn option_commands_store_raw_values() {
        let ratio = parse_intent("/ratio 9:16");
        assert_eq!(ratio.action, "set_aspect_ratio");
        assert_eq!(ratio.command_args["value"], json!("9:16"));

        let resolution = parse_intent("/Resolution 1080p");
        assert_eq!(resolution.action, "set_resolution");
        assert_eq!(resolution.command_args["value"], json!("1080p"));

        let model = parse_intent("/video_model veo-3.1-generate-preview");
        assert_eq!(model.action, "set_video_model");
        assert_eq!(
            model.command_args["model"],
            json!("veo-3.1-generate-preview")
        );
    }

    #[test]
    fn surface_switches_and_no_arg_commands() {
        assert_eq!(parse_intent("/image").action, "switch_image");
        assert_eq!(parse_intent("/video").action, "switch_video");
        assert_eq!(parse_intent("/enhance").action, "enhance");
        assert_eq!(parse_intent("/clear").action, "clear_source");
        assert_eq!(parse_intent("/key").action, "select_key");
        assert_eq!(parse_intent("/exit").action, "quit");
    }

    #[test]
    fn unknown_command_keeps_name_and_arg() {
        let intent = parse_intent("/magic foo bar");
        assert_eq!(intent.action, "unknown");
        assert_eq!(intent.command_args["command"], json!("magic"));
        assert_eq!(intent.command_args["arg"], json!("foo bar"));
    }
}
