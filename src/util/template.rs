//! Minimal `{{key}}` interpolation for prompt templates

use std::collections::HashMap;

/// Replaces every `{{key}}` in `template` with its value from `values`.
///
/// Unknown placeholders are left in place.
///
/// ```
/// use plugwright::util::interpolate;
/// use std::collections::HashMap;
///
/// let mut values = HashMap::new();
/// values.insert("preset", "macos".to_string());
/// assert_eq!(interpolate("Preset: {{preset}} {{other}}", &values), "Preset: macos {{other}}");
/// ```
pub fn interpolate(template: &str, values: &HashMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                match values.get(key) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}
