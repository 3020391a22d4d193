//! Inspecting engines and editing stored task parameters.

use std::time::Duration;

use analysis::params::logical_cpus;
use analysis::{
    validate_parameters, JsonParameterStore, ParameterMap, ParameterStore, Severity, Task,
    TaskParameters,
};
use anyhow::{bail, Context};
use engine::{validate_engine, EngineOptionDeclaration, UciChannel};
use serde_json::Value;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

pub fn parse_task(s: &str) -> Result<Task, String> {
    Task::ALL
        .into_iter()
        .find(|task| task.as_str() == s)
        .ok_or_else(|| {
            let known: Vec<_> = Task::ALL.iter().map(Task::as_str).collect();
            format!("unknown task {s:?}, expected one of {}", known.join(", "))
        })
}

/// Handshake with the engine, print what it declares and optionally store
/// the option declarations.
pub async fn show_options(engine: &str, store: &JsonParameterStore, save: bool) -> anyhow::Result<()> {
    let mut channel = UciChannel::new(engine, "options");
    let identity = validate_engine(&mut channel, HANDSHAKE_TIMEOUT)
        .await
        .with_context(|| format!("{engine} is not a usable UCI engine"))?;

    println!(
        "{} by {} (version {})",
        identity.name.as_deref().unwrap_or("unknown"),
        identity.author.as_deref().unwrap_or("unknown"),
        identity.version().unwrap_or_else(|| "unknown".to_string())
    );
    for option in &identity.options {
        println!("  {}", format_option(option));
    }

    if save {
        store
            .set_engine_options(engine, identity.options)
            .context("failed to save engine options")?;
        println!("Saved to {}", store.path().display());
    }
    Ok(())
}

pub fn format_option(option: &EngineOptionDeclaration) -> String {
    let mut out = format!("{} ({})", option.name, option.option_type);
    if let Some(default) = &option.default {
        out.push_str(&format!(" default {default}"));
    }
    match (option.min, option.max) {
        (Some(min), Some(max)) => out.push_str(&format!(" range {min}..={max}")),
        (Some(min), None) => out.push_str(&format!(" min {min}")),
        (None, Some(max)) => out.push_str(&format!(" max {max}")),
        (None, None) => {}
    }
    if !option.vars.is_empty() {
        out.push_str(&format!(" [{}]", option.vars.join(", ")));
    }
    out
}

/// Apply `key=value` assignments to the stored parameters of one engine and
/// task. An empty value removes the key. Returns the resulting map.
pub fn edit_params(
    store: &JsonParameterStore,
    engine: &str,
    task: Task,
    assignments: &[String],
) -> anyhow::Result<ParameterMap> {
    let mut stored = store.task_parameters(engine, task).unwrap_or_default();
    if assignments.is_empty() {
        return Ok(stored);
    }

    for assignment in assignments {
        match parse_assignment(assignment)? {
            (key, Some(value)) => {
                stored.insert(key, value);
            }
            (key, None) => {
                stored.remove(&key);
            }
        }
    }
    store
        .set_task_parameters(engine, task, stored.clone())
        .context("failed to save parameters")?;
    Ok(stored)
}

pub fn print_params(engine: &str, task: Task, stored: &ParameterMap) -> anyhow::Result<()> {
    let cpus = logical_cpus();
    let params = TaskParameters::resolve(Some(stored), TaskParameters::recommended_for_cpus(task, cpus));

    println!("{engine} / {task}");
    println!("stored: {}", serde_json::to_string_pretty(&Value::Object(stored.clone()))?);
    println!(
        "effective: threads {} depth {} movetime {} ms",
        params.threads, params.depth, params.movetime_ms
    );
    for (name, value) in &params.options {
        println!("  {name} = {value}");
    }
    for issue in validate_parameters(task, &params, cpus) {
        let label = match issue.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        println!("{label}: {}", issue.message);
    }
    Ok(())
}

/// `key=value`, with numbers and booleans stored as JSON numbers and
/// booleans.
pub fn parse_assignment(text: &str) -> anyhow::Result<(String, Option<Value>)> {
    let Some((key, value)) = text.split_once('=') else {
        bail!("expected key=value, got {text:?}");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("missing parameter name in {text:?}");
    }

    let value = value.trim();
    let value = if value.is_empty() {
        None
    } else if let Ok(n) = value.parse::<i64>() {
        Some(Value::from(n))
    } else if let Ok(b) = value.parse::<bool>() {
        Some(Value::Bool(b))
    } else {
        Some(Value::String(value.to_string()))
    };
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::parse_option_declaration;
    use serde_json::json;

    #[test]
    fn test_parse_task() {
        assert_eq!(parse_task("manual_analysis"), Ok(Task::ManualAnalysis));
        assert_eq!(parse_task("game_analysis"), Ok(Task::GameAnalysis));
        assert!(parse_task("blitz").is_err());
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("Hash=256").unwrap(),
            ("Hash".to_string(), Some(json!(256)))
        );
        assert_eq!(
            parse_assignment("Ponder = false").unwrap(),
            ("Ponder".to_string(), Some(json!(false)))
        );
        assert_eq!(
            parse_assignment("SyzygyPath=/tb").unwrap(),
            ("SyzygyPath".to_string(), Some(json!("/tb")))
        );
        assert_eq!(parse_assignment("depth=").unwrap(), ("depth".to_string(), None));
        assert!(parse_assignment("Hash").is_err());
        assert!(parse_assignment("=5").is_err());
    }

    #[test]
    fn test_edit_params_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine_parameters.json");
        let store = JsonParameterStore::load(&path);

        let stored = edit_params(
            &store,
            "/opt/sf",
            Task::Evaluation,
            &["threads=2".to_string(), "Hash=128".to_string()],
        )
        .unwrap();
        assert_eq!(stored.get("Hash"), Some(&json!(128)));

        let stored = edit_params(&store, "/opt/sf", Task::Evaluation, &["Hash=".to_string()]).unwrap();
        assert!(stored.get("Hash").is_none());

        let reloaded = JsonParameterStore::load(&path);
        let params = reloaded.task_parameters("/opt/sf", Task::Evaluation).unwrap();
        assert_eq!(params.get("threads"), Some(&json!(2)));
        assert!(params.get("Hash").is_none());
    }

    #[test]
    fn test_format_option() {
        let hash = parse_option_declaration("option name Hash type spin default 16 min 1 max 33554432").unwrap();
        assert_eq!(format_option(&hash), "Hash (spin) default 16 range 1..=33554432");

        let style = parse_option_declaration(
            "option name Style type combo default Normal var Solid var Normal var Risky",
        )
        .unwrap();
        assert_eq!(
            format_option(&style),
            "Style (combo) default Normal [Solid, Normal, Risky]"
        );

        let clear = parse_option_declaration("option name Clear Hash type button").unwrap();
        assert_eq!(format_option(&clear), "Clear Hash (button)");
    }
}
