use playbooks_core::api_key::Permission;
use playbooks_core::playbook::Playbook;
use playbooks_core::Store;
use serde_json::Value;

pub mod canvas;
pub mod memory;

/// A built-in MCP tool operating on one playbook.
pub trait PlaybookTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn schema(&self) -> Value;
    /// Scope the caller must hold to invoke this tool.
    fn permission(&self) -> Permission;
    fn call(&self, args: Value, store: &Store, playbook: &Playbook) -> Result<Value, String>;
}

pub fn builtin_tools() -> Vec<Box<dyn PlaybookTool>> {
    vec![
        Box::new(memory::ReadMemoryTool),
        Box::new(memory::WriteMemoryTool),
        Box::new(memory::SearchMemoryTool),
        Box::new(memory::DeleteMemoryTool),
        Box::new(canvas::ListCanvasTool),
        Box::new(canvas::ReadCanvasTool),
        Box::new(canvas::UpdateCanvasSectionTool),
    ]
}

pub(crate) fn required_str<'a>(args: &'a Value, name: &str) -> Result<&'a str, String> {
    args[name]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| format!("missing required argument: {name}"))
}
