//! Converts a source file's path, relative to the project root, into the
//! dotted module name `RuleContext::dotted_module` and layer resolution
//! both key off (e.g. `use_cases/order.py` -> `use_cases.order`).

use std::path::Path;

pub fn dotted_module(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut segments: Vec<String> = relative
        .components()
        .filter_map(|c| c.as_os_str().to_str().map(str::to_string))
        .collect();

    if let Some(last) = segments.last_mut() {
        if let Some(stem) = Path::new(last).file_stem().and_then(|s| s.to_str()) {
            *last = stem.to_string();
        }
    }
    if segments.last().map(String::as_str) == Some("__init__") {
        segments.pop();
    }

    segments.join(".")
}
