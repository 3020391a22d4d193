//! `option name ... type ...` declarations from the UCI handshake.

use serde::{Deserialize, Serialize};

/// The declared kind of an option. Kinds outside the five UCI ones are kept
/// verbatim so stored declarations survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OptionType {
    Spin,
    Check,
    Combo,
    String,
    Button,
    Other(String),
}

impl OptionType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Spin => "spin",
            Self::Check => "check",
            Self::Combo => "combo",
            Self::String => "string",
            Self::Button => "button",
            Self::Other(token) => token,
        }
    }
}

impl From<&str> for OptionType {
    fn from(token: &str) -> Self {
        match token {
            "spin" => Self::Spin,
            "check" => Self::Check,
            "combo" => Self::Combo,
            "string" => Self::String,
            "button" => Self::Button,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for OptionType {
    fn from(token: String) -> Self {
        Self::from(token.as_str())
    }
}

impl From<OptionType> for String {
    fn from(option_type: OptionType) -> Self {
        match option_type {
            OptionType::Other(token) => token,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared default, typed by the option's kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionDefault {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl std::fmt::Display for OptionDefault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptionDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub option_type: OptionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<OptionDefault>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(default, rename = "var")]
    pub vars: Vec<String>,
}

/// Parse `option name <words…> type <type> [default <v>] [min <v>] [max <v>] [var <v>]*`.
///
/// The name runs up to the first `type` token, so a name containing the word
/// "type" is cut short there. Returns `None` when `name` or `type` is missing.
pub fn parse_option_declaration(line: &str) -> Option<EngineOptionDeclaration> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.first() != Some(&"option") {
        return None;
    }

    let name_start = tokens.iter().position(|t| *t == "name")? + 1;
    let type_at = name_start + tokens[name_start..].iter().position(|t| *t == "type")?;
    if type_at == name_start {
        return None;
    }
    let name = tokens[name_start..type_at].join(" ");
    let option_type = OptionType::from(*tokens.get(type_at + 1)?);

    let mut declaration = EngineOptionDeclaration {
        name,
        option_type,
        default: None,
        min: None,
        max: None,
        vars: Vec::new(),
    };

    let mut i = type_at + 2;
    while i < tokens.len() {
        let Some(value) = tokens.get(i + 1) else {
            break;
        };
        match tokens[i] {
            "default" => {
                declaration.default = Some(typed_default(&declaration.option_type, value))
            }
            "min" => declaration.min = value.parse().ok(),
            "max" => declaration.max = value.parse().ok(),
            "var" => declaration.vars.push(value.to_string()),
            _ => {
                i += 1;
                continue;
            }
        }
        i += 2;
    }

    Some(declaration)
}

fn typed_default(option_type: &OptionType, value: &str) -> OptionDefault {
    match option_type {
        OptionType::Spin => value
            .parse()
            .map(OptionDefault::Int)
            .unwrap_or_else(|_| OptionDefault::Text(value.to_string())),
        OptionType::Check => OptionDefault::Bool(value.eq_ignore_ascii_case("true")),
        _ => OptionDefault::Text(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hash_spin() {
        let decl =
            parse_option_declaration("option name Hash type spin default 16 min 1 max 33554432")
                .unwrap();
        assert_eq!(decl.name, "Hash");
        assert_eq!(decl.option_type, OptionType::Spin);
        assert_eq!(decl.default, Some(OptionDefault::Int(16)));
        assert_eq!(decl.min, Some(1));
        assert_eq!(decl.max, Some(33554432));
        assert!(decl.vars.is_empty());

        let json = serde_json::to_value(&decl).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "Hash",
                "type": "spin",
                "default": 16,
                "min": 1,
                "max": 33554432,
                "var": []
            })
        );
    }

    #[test]
    fn test_parse_multi_word_name() {
        let decl =
            parse_option_declaration("option name Skill Level type spin default 20 min 0 max 20")
                .unwrap();
        assert_eq!(decl.name, "Skill Level");
    }

    #[test]
    fn test_parse_check() {
        let decl = parse_option_declaration("option name Ponder type check default false").unwrap();
        assert_eq!(decl.option_type, OptionType::Check);
        assert_eq!(decl.default, Some(OptionDefault::Bool(false)));
    }

    #[test]
    fn test_parse_combo_vars() {
        let decl = parse_option_declaration(
            "option name Style type combo default Normal var Solid var Normal var Risky",
        )
        .unwrap();
        assert_eq!(decl.option_type, OptionType::Combo);
        assert_eq!(decl.default, Some(OptionDefault::Text("Normal".to_string())));
        assert_eq!(decl.vars, vec!["Solid", "Normal", "Risky"]);
    }

    #[test]
    fn test_parse_button_and_empty_string_default() {
        let decl = parse_option_declaration("option name Clear Hash type button").unwrap();
        assert_eq!(decl.option_type, OptionType::Button);
        assert_eq!(decl.default, None);

        let decl =
            parse_option_declaration("option name Debug Log File type string default").unwrap();
        assert_eq!(decl.option_type, OptionType::String);
        assert_eq!(decl.default, None);
    }

    #[test]
    fn test_non_integer_bounds_are_dropped() {
        let decl =
            parse_option_declaration("option name Odd type spin default x min a max 10").unwrap();
        assert_eq!(decl.default, Some(OptionDefault::Text("x".to_string())));
        assert_eq!(decl.min, None);
        assert_eq!(decl.max, Some(10));
    }

    #[test]
    fn test_missing_name_or_type() {
        assert!(parse_option_declaration("option type spin default 1").is_none());
        assert!(parse_option_declaration("option name Hash default 16").is_none());
        assert!(parse_option_declaration("option name Hash type").is_none());
        assert!(parse_option_declaration("option name type spin").is_none());
        assert!(parse_option_declaration("info depth 1").is_none());
    }

    #[test]
    fn test_unknown_type_is_kept() {
        let decl =
            parse_option_declaration("option name Contempt type slider default 24").unwrap();
        assert_eq!(decl.option_type, OptionType::Other("slider".to_string()));
        assert_eq!(decl.default, Some(OptionDefault::Text("24".to_string())));

        let json = serde_json::to_value(&decl).unwrap();
        assert_eq!(json["type"], "slider");
        let back: EngineOptionDeclaration = serde_json::from_value(json).unwrap();
        assert_eq!(back, decl);
    }

    #[test]
    fn test_name_containing_type_is_cut() {
        let decl =
            parse_option_declaration("option name Eval type Tuning type spin default 1").unwrap();
        // The name ends at the first `type`.
        assert_eq!(decl.name, "Eval");
        assert_eq!(decl.option_type, OptionType::Other("Tuning".to_string()));
    }
}
