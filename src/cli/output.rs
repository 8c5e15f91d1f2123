//! Output formatting for CLI commands.
//!
//! Every command produces one output value that renders either as text or,
//! under the global `--json` flag, as pretty-printed JSON.

use serde::Serialize;

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;
    fn to_json(&self) -> serde_json::Value;
}

/// Print `result` on the channel selected by `json_mode`.
pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        let rendered = serde_json::to_string_pretty(&result.to_json()).unwrap_or_default();
        println!("{rendered}");
    } else {
        println!("{}", result.to_human());
    }
}
