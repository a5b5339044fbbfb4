//! Text rendering for diagnostics.
//!
//! Type names coming out of [`std::any::type_name`] are long and fully
//! qualified. These helpers shorten them, join resolution chains, lay out
//! registration listings and pick "did you mean" candidates.

/// Joins a resolution chain with arrows.
///
/// # Examples
/// ```
/// use khazin_support::rendering::render_chain;
///
/// let chain = vec!["Engine", "Renderer", "Window", "Engine"];
/// assert_eq!(render_chain(&chain), "Engine → Renderer → Window → Engine");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    let mut out = String::new();
    for (i, link) in chain.iter().enumerate() {
        if i > 0 {
            out.push_str(" → ");
        }
        out.push_str(link.as_ref());
    }
    out
}

/// Drops module paths from every segment of a type name.
///
/// ```
/// use khazin_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("game::gfx::Window"), "Window");
/// assert_eq!(
///     shorten_type_name("alloc::sync::Arc<dyn game::gfx::Renderer>"),
///     "Arc<dyn Renderer>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut out = String::with_capacity(full_name.len());
    let mut segment_start = 0;

    for (i, ch) in full_name.char_indices() {
        match ch {
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                out.push_str(last_path_segment(&full_name[segment_start..i]));
                out.push(ch);
                segment_start = i + ch.len_utf8();
            }
            _ => {}
        }
    }

    out.push_str(last_path_segment(&full_name[segment_start..]));
    out
}

fn last_path_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// One line of a registration listing.
#[derive(Debug, Clone)]
pub struct RegistrationRow {
    /// Lifetime label, e.g. `Singleton`
    pub lifetime: String,
    /// Value type produced by the registration
    pub type_name: String,
    /// Explicit key, if any
    pub key: Option<String>,
    /// Number of declared dependencies
    pub dependencies: usize,
}

/// Renders registrations as aligned lines.
///
/// ```text
/// [Singleton] Window
/// [Scoped]    Engine  deps=1
/// [Transient] Frame   key="hud"
/// ```
pub fn render_registrations(rows: &[RegistrationRow]) -> String {
    let label_width = rows.iter().map(|r| r.lifetime.len() + 2).max().unwrap_or(0);
    let name_width = rows
        .iter()
        .map(|r| shorten_type_name(&r.type_name).len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for row in rows {
        let label = format!("[{}]", row.lifetime);
        let mut line = format!(
            "{label:<label_width$} {:<name_width$}",
            shorten_type_name(&row.type_name)
        );
        if let Some(ref key) = row.key {
            line.push_str(&format!("  key={key:?}"));
        }
        if row.dependencies > 0 {
            line.push_str(&format!("  deps={}", row.dependencies));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Picks up to `limit` entries of `available` that look like `requested`.
///
/// Substring matches on the full name rank first, then matches on the
/// shortened name, then names sharing a prefix of three characters or more.
pub fn suggest_similar(requested: &str, available: &[&str], limit: usize) -> Vec<String> {
    let wanted_full = requested.to_lowercase();
    let wanted_short = shorten_type_name(requested).to_lowercase();

    let mut ranked: Vec<(usize, &str)> = available
        .iter()
        .filter_map(|&candidate| {
            let full = candidate.to_lowercase();
            let short = shorten_type_name(candidate).to_lowercase();

            let score = if full.contains(&wanted_full) || wanted_full.contains(&full) {
                100
            } else if short.contains(&wanted_short) || wanted_short.contains(&short) {
                80
            } else {
                let prefix = short
                    .chars()
                    .zip(wanted_short.chars())
                    .take_while(|(a, b)| a == b)
                    .count();
                if prefix < 3 {
                    return None;
                }
                prefix * 10
            };
            Some((score, candidate))
        })
        .collect();

    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    ranked
        .into_iter()
        .take(limit)
        .map(|(_, name)| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_of_one_and_none() {
        assert_eq!(render_chain(&vec!["Window"]), "Window");
        let empty: Vec<&str> = vec![];
        assert_eq!(render_chain(&empty), "");
    }

    #[test]
    fn shorten_nested_generics() {
        assert_eq!(
            shorten_type_name("core::option::Option<alloc::boxed::Box<game::Window>>"),
            "Option<Box<Window>>"
        );
        assert_eq!(
            shorten_type_name("(game::A, game::B)"),
            "(A, B)"
        );
    }

    #[test]
    fn shorten_without_path() {
        assert_eq!(shorten_type_name("u32"), "u32");
    }

    #[test]
    fn suggest_close_names() {
        let available = ["game::Window", "game::WindowConfig", "game::Engine"];
        let suggestions = suggest_similar("game::Windw", &available[..], 3);
        assert!(!suggestions.is_empty());
        assert!(suggestions[0].contains("Window"));
        assert!(!suggestions.iter().any(|s| s.contains("Engine")));
    }

    #[test]
    fn suggest_nothing_for_unrelated() {
        let suggestions = suggest_similar("XyzQwe", &vec!["game::Engine"], 3);
        assert!(suggestions.is_empty());
    }

    #[test]
    fn registration_listing() {
        let rows = vec![
            RegistrationRow {
                lifetime: "Singleton".into(),
                type_name: "game::Window".into(),
                key: None,
                dependencies: 0,
            },
            RegistrationRow {
                lifetime: "Scoped".into(),
                type_name: "game::Engine".into(),
                key: Some("main".into()),
                dependencies: 1,
            },
        ];

        let text = render_registrations(&rows);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "[Singleton] Window");
        assert_eq!(lines[1], "[Scoped]    Engine  key=\"main\"  deps=1");
    }
}
