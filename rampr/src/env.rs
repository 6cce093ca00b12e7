use std::collections::BTreeMap;
use std::ffi::OsString;

use anyhow::Context as _;

pub(crate) type EnvVars = BTreeMap<String, String>;

/// Process env with `--env KEY=VALUE` overrides applied on top.
pub(crate) fn merged_env(overrides: &[String]) -> anyhow::Result<EnvVars> {
    let mut map = utf8_vars(std::env::vars_os());

    for raw in overrides {
        let (k, v) = parse_env_override(raw)?;
        map.insert(k, v);
    }

    Ok(map)
}

/// Variables whose name or value is not UTF-8 cannot be referenced and are skipped.
fn utf8_vars(vars: impl IntoIterator<Item = (OsString, OsString)>) -> EnvVars {
    vars.into_iter()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

fn parse_env_override(s: &str) -> anyhow::Result<(String, String)> {
    let (k, v) = s
        .split_once('=')
        .with_context(|| format!("invalid --env (expected KEY=VALUE): {s}"))?;
    if k.is_empty() {
        anyhow::bail!("invalid --env (empty KEY): {s}");
    }
    Ok((k.to_string(), v.to_string()))
}

/// Replaces every `${NAME}` in `input`. Unknown names are an error.
pub(crate) fn expand(input: &str, env: &EnvVars) -> anyhow::Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .with_context(|| format!("unterminated `${{` in `{input}`"))?;

        let name = after[..end].trim();
        if name.is_empty() {
            anyhow::bail!("empty variable name in `{input}`");
        }
        let value = env
            .get(name)
            .with_context(|| format!("undefined variable `{name}` (set it or pass --env {name}=...)"))?;
        out.push_str(value);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}
