//! Remote command payload builder.
//!
//! A commit flushes all buffered style changes as one executable script
//! embedding a JSON structure `{add: [{id, css}], remove: [id, ...]}`. The
//! script is idempotent: adds are skipped when a node with the same id
//! already exists, removes are skipped when the node is gone, so re-sending
//! the same script on retry is safe.

use serde::Serialize;

use crate::error::Result;

/// Shared marker class carried by every injected style node. The clear-all
/// script removes by this class rather than by individual ids.
pub const STYLE_CLASS: &str = "veneer-style";

#[derive(Debug, Serialize)]
pub struct AddEntry {
    pub id: String,
    pub css: String,
}

#[derive(Debug, Serialize)]
pub struct StylePatch {
    pub add: Vec<AddEntry>,
    pub remove: Vec<String>,
}

impl StylePatch {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Build the single idempotent script applying `patch` on the remote surface.
pub fn commit_script(patch: &StylePatch) -> Result<String> {
    let data = serde_json::to_string(patch)?;

    Ok(format!(
        r#"
        (function() {{
            let patch = {data};

            patch.add.forEach(entry => {{
                if (document.getElementById(entry.id) !== null) {{
                    return;
                }}

                let style = document.createElement('style');
                style.id = entry.id;
                style.classList.add('{STYLE_CLASS}');
                document.head.append(style);
                style.textContent = entry.css;
            }});

            patch.remove.forEach(id => {{
                let style = document.getElementById(id);
                style?.parentNode.removeChild(style);
            }});
        }})()
        "#
    ))
}

/// Build the script removing every previously injected style node, matched by
/// the shared marker class regardless of id tracking.
pub fn clear_script() -> String {
    format!(
        r#"
        (function() {{
            document.querySelectorAll('.{STYLE_CLASS}').forEach(style => style.remove());
        }})()
        "#
    )
}
