//! Navigation menu for the signed-in user.
//!
//! Visibility is derived from the route table's guards, so a menu entry is
//! shown exactly when following it would render.

use serde::Serialize;

use crate::routes::authorizer::permits;
use crate::routes::{Guard, RouteTable, normalize_path};
use crate::session::{Session, SessionView};

/// `(label, route name)` in display order.
const MENU: &[(&str, &str)] = &[
    ("Home", "patients_home"),
    ("Book appointment", "book_appointment"),
    ("Agenda", "agenda"),
    ("Doctors", "doctors"),
    ("Patients", "patients"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    pub label: &'static str,
    pub href: &'static str,
    /// True for the entry the user is currently on.
    pub current: bool,
}

/// Menu entries visible to `session`, with the one matching `current_path`
/// marked. Empty while loading or signed out.
#[must_use]
pub fn menu_for(table: &RouteTable, session: &Session, current_path: &str) -> Vec<MenuEntry> {
    let SessionView::Authenticated { role, .. } = session.view() else {
        return Vec::new();
    };
    let current_path = normalize_path(current_path);

    MENU.iter()
        .filter_map(|(label, name)| table.by_name(name).map(|route| (*label, route)))
        .filter(|(_, route)| route.guard != Guard::Public && permits(route.guard, role))
        .map(|(label, route)| MenuEntry { label, href: route.pattern, current: is_current(route.pattern, &current_path) })
        .collect()
}

/// Exact match for `/`; prefix match on a segment boundary otherwise.
fn is_current(href: &str, path: &str) -> bool {
    if href == "/" {
        return path == "/";
    }
    path.strip_prefix(href).is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

#[cfg(test)]
#[path = "nav_test.rs"]
mod tests;
