use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};
use std::sync::OnceLock;

use crate::app::{App, InputPurpose, Pane, Popup, Scope};
use crate::lists::Item;
use crate::lock::format_remaining;
use crate::theme::Theme;

static THEME: OnceLock<Theme> = OnceLock::new();

fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::load)
}

fn accent() -> Color { theme().accent }
fn accent_bright() -> Color { theme().accent_bright }
fn inactive() -> Color { theme().inactive }
fn success() -> Color { theme().success }
fn warning() -> Color { theme().warning }
fn danger() -> Color { theme().danger }
fn text() -> Color { theme().text }
fn text_dim() -> Color { theme().text_dim }
fn bg_selected() -> Color { theme().bg_selected }
fn header() -> Color { theme().header }

pub fn draw(f: &mut Frame, app: &App) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(1), // Info line
            Constraint::Min(8),    // Lists / items
            Constraint::Length(1), // Footer
        ])
        .split(area);

    // Narrow terminals stack the item pane under the lists
    let body = Layout::default()
        .direction(if area.width < 70 { Direction::Vertical } else { Direction::Horizontal })
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[1]);

    let sections_height = (app.sections().len() as u16 + 3).min(body[0].height / 2).max(4);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(4), Constraint::Length(sections_height)])
        .split(body[0]);

    draw_info_line(f, app, chunks[0]);
    draw_lists_box(f, app, left[0]);
    draw_sections_box(f, app, left[1]);
    draw_items_box(f, app, body[1]);
    draw_footer(f, app, chunks[2]);

    // Draw popups on top
    match app.popup {
        Popup::None => {}
        Popup::Input => draw_input_popup(f, app),
        Popup::Pin => draw_pin_popup(f, app),
        Popup::Confirm => draw_confirm_popup(f, app),
        Popup::Admin => draw_admin_popup(f, app),
        Popup::Stats => draw_stats_popup(f, app),
        Popup::Help => draw_help_popup(f),
    }
}

fn pane_block(title: String, is_active: bool) -> Block<'static> {
    let border_color = if is_active { accent() } else { inactive() };
    let title_style = if is_active {
        Style::default().fg(accent()).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(inactive())
    };

    Block::default()
        .title(Span::styled(title, title_style))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
}

fn row_style(selected: bool) -> Style {
    if selected {
        Style::default().bg(bg_selected()).fg(text())
    } else {
        Style::default()
    }
}

fn draw_info_line(f: &mut Frame, app: &App, area: Rect) {
    let warning_time = app.vault.lock.session().settings().warning_time;

    // Priority: status message > section about to lock > scope summary
    let about_to_lock = app
        .sections()
        .iter()
        .zip(&app.countdowns)
        .find(|&(_, &ms)| ms > 0 && ms <= warning_time);

    let line = if let Some(ref status) = app.status_message {
        Line::from(vec![Span::styled(status, Style::default().fg(warning()))])
    } else if let Some((section, &ms)) = about_to_lock {
        Line::from(vec![
            Span::styled("󰔟 ", Style::default().fg(danger())),
            Span::styled(section, Style::default().fg(text())),
            Span::styled(" locks in ", Style::default().fg(text_dim())),
            Span::styled(format_remaining(ms), Style::default().fg(danger()).add_modifier(Modifier::BOLD)),
            Span::styled(" │ any key keeps it open", Style::default().fg(text_dim())),
        ])
    } else {
        let role = app.vault.lock.session().role();
        let role_color = if app.vault.lock.session().is_admin() { accent_bright() } else { text_dim() };
        Line::from(vec![
            Span::styled(app.scope_title(), Style::default().fg(text())),
            Span::styled(" │ ", Style::default().fg(text_dim())),
            Span::styled(role.label(), Style::default().fg(role_color)),
        ])
    };

    let info = Paragraph::new(line).alignment(Alignment::Center);
    f.render_widget(info, area);
}

fn draw_lists_box(f: &mut Frame, app: &App, area: Rect) {
    let is_active = app.pane == Pane::Lists;
    let mut title = format!(" {} · {} ", app.scope_title(), app.list_sort.label());
    if !app.filter.is_empty() {
        title.push_str(&format!("/{} ", app.filter));
    }
    let block = pane_block(title, is_active);

    let Some(store) = app.active_lists() else {
        let locked = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled("  󰌾 Locked", Style::default().fg(danger()))),
            Line::from(Span::styled("  Unlock it from Sections, or v for the library", Style::default().fg(text_dim()))),
        ])
        .block(block)
        .wrap(Wrap { trim: false });
        f.render_widget(locked, area);
        return;
    };

    let visible = app.visible_lists();
    let rows: Vec<Row> = if visible.is_empty() {
        let hint = if store.lists().is_empty() { "  No lists yet, n creates one" } else { "  Nothing matches the filter" };
        vec![Row::new(vec![Span::styled(hint, Style::default().fg(text_dim()))])]
    } else {
        visible
            .iter()
            .enumerate()
            .filter_map(|(pos, &i)| store.get(i).map(|list| (pos, list)))
            .map(|(pos, list)| {
                let star = if list.favorite { "★" } else { " " };
                Row::new(vec![
                    Span::styled(star, Style::default().fg(accent_bright())),
                    Span::styled(list.name.clone(), Style::default().fg(text())),
                    Span::styled(list.items.len().to_string(), Style::default().fg(text_dim())),
                ])
                .style(row_style(pos == app.selected_list && is_active))
            })
            .collect()
    };

    let widths = [Constraint::Length(2), Constraint::Min(10), Constraint::Length(5)];
    let table = Table::new(rows, widths).block(block);
    f.render_widget(table, area);
}

fn item_year(item: &Item) -> Option<String> {
    match item {
        Item::PlainTitle(_) => None,
        Item::RichItem { metadata, .. } => metadata
            .get("year")
            .or_else(|| metadata.get("release_date"))
            .map(|v| match v {
                serde_json::Value::String(s) => s.chars().take(4).collect(),
                other => other.to_string(),
            }),
    }
}

fn draw_items_box(f: &mut Frame, app: &App, area: Rect) {
    let is_active = app.pane == Pane::Items;

    let selected = app
        .selected_list_index()
        .and_then(|i| app.active_lists()?.get(i));

    let title = match selected {
        Some(list) => format!(" {} · {} ", list.name, app.item_sort.label()),
        None => " Items ".to_string(),
    };
    let block = pane_block(title, is_active);

    let Some(list) = selected else {
        let empty = Paragraph::new(Span::styled("  Select a list", Style::default().fg(text_dim()))).block(block);
        f.render_widget(empty, area);
        return;
    };

    let visible = app.visible_items();
    let rows: Vec<Row> = if visible.is_empty() {
        vec![Row::new(vec![Span::styled("  Empty, a adds a title", Style::default().fg(text_dim()))])]
    } else {
        visible
            .iter()
            .enumerate()
            .filter_map(|(pos, &i)| list.items.get(i).map(|item| (pos, item)))
            .map(|(pos, item)| {
                Row::new(vec![
                    Span::styled(item.title().to_string(), Style::default().fg(text())),
                    Span::styled(item_year(item).unwrap_or_default(), Style::default().fg(text_dim())),
                ])
                .style(row_style(pos == app.selected_item && is_active))
            })
            .collect()
    };

    let header = Row::new(vec![
        Span::styled("Title", Style::default().fg(header())),
        Span::styled("Year", Style::default().fg(header())),
    ]);

    let table = Table::new(rows, [Constraint::Min(10), Constraint::Length(6)])
        .header(header)
        .block(block);
    f.render_widget(table, area);
}

fn draw_sections_box(f: &mut Frame, app: &App, area: Rect) {
    let is_active = app.pane == Pane::Sections;
    let block = pane_block(" Sections ".to_string(), is_active);
    let warning_time = app.vault.lock.session().settings().warning_time;
    let auto_lock = app.vault.lock.session().settings().enabled;

    let rows: Vec<Row> = if app.sections().is_empty() {
        vec![Row::new(vec![Span::styled("  No protected sections", Style::default().fg(text_dim()))])]
    } else {
        app.sections()
            .iter()
            .enumerate()
            .map(|(i, section)| {
                let unlocked = app.vault.lock.is_unlocked(section);
                let (icon, state, color) = if unlocked {
                    ("󰌿", "Open", success())
                } else if app.vault.lock.has_pin(section) {
                    ("󰌾", "Locked", danger())
                } else {
                    ("󰌾", "No PIN", text_dim())
                };

                let remaining = app.countdowns.get(i).copied().unwrap_or(0);
                let (timer, timer_color) = if !unlocked {
                    (String::new(), text_dim())
                } else if !auto_lock {
                    ("∞".to_string(), text_dim())
                } else if remaining <= warning_time {
                    (format_remaining(remaining), danger())
                } else {
                    (format_remaining(remaining), text_dim())
                };

                let marker = if app.scope == Scope::Section(i) { " ●" } else { "" };

                Row::new(vec![
                    Span::styled(icon, Style::default().fg(color)),
                    Span::styled(format!("{}{}", section, marker), Style::default().fg(text())),
                    Span::styled(state, Style::default().fg(color)),
                    Span::styled(timer, Style::default().fg(timer_color)),
                ])
                .style(row_style(i == app.selected_section && is_active))
            })
            .collect()
    };

    let widths = [
        Constraint::Length(2),
        Constraint::Min(8),
        Constraint::Length(7),
        Constraint::Length(6),
    ];
    let table = Table::new(rows, widths).block(block);
    f.render_widget(table, area);
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let hints: Vec<(&str, &str)> = match app.pane {
        Pane::Lists => vec![
            ("n", "New"),
            ("r", "Rename"),
            ("f", "Fav"),
            ("c", "Copy"),
            ("d", "Del"),
            ("/", "Filter"),
            ("s", "Sort"),
            ("Tab", "Next"),
            ("h", "Help"),
        ],
        Pane::Items => vec![
            ("a", "Add"),
            ("d", "Remove"),
            ("J/K", "Move"),
            ("o", "Order"),
            ("x", "Clear"),
            ("Tab", "Next"),
            ("h", "Help"),
        ],
        Pane::Sections => vec![
            ("Enter", "Open"),
            ("l", "Lock"),
            ("L", "Lock all"),
            ("v", "Library"),
            ("A", "Admin"),
            ("h", "Help"),
        ],
    };

    // Responsive: show fewer hints on narrow terminals
    let max_hints = if area.width < 60 { 4 } else if area.width < 80 { 6 } else { hints.len() };

    let hint_spans: Vec<Span> = hints
        .iter()
        .take(max_hints)
        .flat_map(|(key, action)| {
            vec![
                Span::styled(*key, Style::default().fg(accent())),
                Span::styled(format!(" {} │ ", action), Style::default().fg(text_dim())),
            ]
        })
        .collect();

    let footer = Paragraph::new(Line::from(hint_spans)).alignment(Alignment::Center);
    f.render_widget(footer, area);
}

fn draw_input_popup(f: &mut Frame, app: &App) {
    let area = centered_rect(if f.area().width < 80 { 90 } else { 50 }, 20, f.area());
    let popup_area = Rect { height: area.height.max(3).min(5), ..area };

    f.render_widget(Clear, popup_area);

    let hint = match app.input_purpose {
        InputPurpose::Filter => "Esc clears",
        _ => "Enter saves │ Esc cancels",
    };

    let input = Paragraph::new(vec![
        Line::from(Span::styled(format!("{}_", app.input_buffer), Style::default().fg(text()))),
        Line::from(Span::styled(hint, Style::default().fg(text_dim()))),
    ])
    .block(
        Block::default()
            .title(Span::styled(app.input_purpose.title(), Style::default().fg(accent())))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(accent())),
    );

    f.render_widget(input, popup_area);
}

fn draw_pin_popup(f: &mut Frame, app: &App) {
    let popup_area = centered_rect(40, 25, f.area());
    f.render_widget(Clear, popup_area);

    let prompt = app
        .pin_purpose
        .as_ref()
        .map(|p| p.prompt(app.sections()))
        .unwrap_or_default();

    let dots: String = (0..crate::lock::pin::PIN_DIGITS)
        .map(|i| if i < app.pin_buffer.len() { "● " } else { "○ " })
        .collect();

    let pin = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(prompt, Style::default().fg(text()))),
        Line::from(""),
        Line::from(Span::styled(dots, Style::default().fg(accent()).add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(Span::styled("Enter confirms │ Esc cancels", Style::default().fg(text_dim()))),
    ])
    .block(
        Block::default()
            .title(Span::styled(" 󰌾 PIN ", Style::default().fg(accent())))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(accent())),
    )
    .alignment(Alignment::Center);

    f.render_widget(pin, popup_area);
}

fn draw_admin_popup(f: &mut Frame, app: &App) {
    let popup_area = centered_rect(if f.area().width < 80 { 90 } else { 55 }, 60, f.area());
    f.render_widget(Clear, popup_area);

    let session = app.vault.lock.session();
    let settings = session.settings();
    let section = app.sections().get(app.selected_section).cloned().unwrap_or_default();

    let key = |k: &'static str| Span::styled(format!("  {:<6}", k), Style::default().fg(accent()));
    let value = |label: &str, v: String| {
        Line::from(vec![
            Span::styled(format!("  {:<20}", label), Style::default().fg(text_dim())),
            Span::styled(v, Style::default().fg(text())),
        ])
    };

    let mut lines = vec![
        value("Role", session.role().label().to_string()),
        value("Auto-lock", if settings.enabled { "On".to_string() } else { "Off".to_string() }),
        value("Inactivity timeout", format_remaining(settings.inactivity_timeout)),
        value("Session timeout", format_remaining(settings.session_timeout)),
        value("Warning", format_remaining(settings.warning_time)),
        value("Selected section", section),
        Line::from(""),
    ];

    let admin_only = if session.is_admin() { text() } else { inactive() };
    lines.extend([
        Line::from(vec![
            key("r"),
            Span::raw(if session.is_admin() { "Switch to user" } else { "Log in as admin" }),
        ]),
        Line::from(vec![key("p"), Span::styled("Set PIN for selected section", Style::default().fg(admin_only))]),
        Line::from(vec![key("x"), Span::styled("Clear PIN for selected section", Style::default().fg(admin_only))]),
        Line::from(vec![key("c"), Span::styled("Change admin PIN", Style::default().fg(admin_only))]),
        Line::from(vec![key("t"), Span::styled("Toggle auto-lock", Style::default().fg(admin_only))]),
        Line::from(vec![key("+/-"), Span::styled("Inactivity timeout ±1 min", Style::default().fg(admin_only))]),
        Line::from(vec![key("]/["), Span::styled("Session timeout ±5 min", Style::default().fg(admin_only))]),
        Line::from(""),
        Line::from(Span::styled("  Esc closes", Style::default().fg(text_dim()))),
    ]);

    let admin = Paragraph::new(lines)
        .block(
            Block::default()
                .title(Span::styled(" Admin ", Style::default().fg(accent())))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent())),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(admin, popup_area);
}

fn draw_stats_popup(f: &mut Frame, app: &App) {
    let popup_area = centered_rect(if f.area().width < 80 { 90 } else { 50 }, 50, f.area());
    f.render_widget(Clear, popup_area);

    let lines = match app.active_lists() {
        Some(store) => {
            let stats = store.stats();
            let row = |label: &str, v: String| {
                Line::from(vec![
                    Span::styled(format!("  {:<18}", label), Style::default().fg(text_dim())),
                    Span::styled(v, Style::default().fg(text())),
                ])
            };
            let largest = stats
                .largest
                .map(|(name, n)| format!("{} ({})", name, n))
                .unwrap_or_else(|| "-".to_string());
            vec![
                row("Lists", stats.lists.to_string()),
                row("Favorites", stats.favorites.to_string()),
                row("Empty lists", stats.empty_lists.to_string()),
                row("Titles", stats.items.to_string()),
                row("Distinct titles", stats.distinct_titles.to_string()),
                row("Largest", largest),
            ]
        }
        None => vec![Line::from(Span::styled("  Locked", Style::default().fg(danger())))],
    };

    let stats = Paragraph::new(lines).block(
        Block::default()
            .title(Span::styled(format!(" {} ", app.scope_title()), Style::default().fg(accent())))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(accent())),
    );

    f.render_widget(stats, popup_area);
}

fn help_heading(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        format!("═══ {} ═══", title),
        Style::default().fg(header()).add_modifier(Modifier::BOLD),
    ))
}

fn help_entry(key: &'static str, action: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<10}", key), Style::default().fg(accent())),
        Span::raw(action),
    ])
}

fn draw_help_popup(f: &mut Frame) {
    let area = f.area();
    let popup_area = centered_rect(
        if area.width < 80 { 95 } else { 70 },
        if area.height < 40 { 95 } else { 85 },
        area,
    );

    f.render_widget(Clear, popup_area);

    let help_text = vec![
        help_heading("Navigation"),
        help_entry("Tab", "Switch panes (Lists → Items → Sections)"),
        help_entry("↑/↓ j/k", "Move up/down"),
        help_entry("v", "Back to the library"),
        Line::from(""),
        help_heading("Lists"),
        help_entry("n / r", "New list / rename"),
        help_entry("c", "Duplicate list"),
        help_entry("f", "Toggle favorite"),
        help_entry("d", "Delete list (asks first)"),
        help_entry("/", "Filter by name"),
        help_entry("s", "Cycle list order"),
        help_entry("e / i", "Export / import this collection"),
        Line::from(""),
        help_heading("Items"),
        help_entry("a", "Add a title (duplicates are ignored)"),
        help_entry("d", "Remove title"),
        help_entry("J / K", "Move title down / up"),
        help_entry("o", "Cycle item order"),
        help_entry("x", "Clear list"),
        Line::from(""),
        help_heading("Sections"),
        help_entry("Enter", "Unlock with PIN, or open if unlocked"),
        help_entry("l / L", "Lock section / lock all"),
        help_entry("A", "Admin: role, PINs, auto-lock"),
        help_entry("S", "Stats"),
        Line::from(vec![Span::raw(
            "            Unlocked sections lock after inactivity or when the session runs out",
        )]),
        Line::from(""),
        help_heading("Command line"),
        help_entry("--status", "JSON status for scripts"),
        help_entry("--watch", "Auto-lock in the background"),
        help_entry("--lock-all", "Lock every section"),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", Style::default().fg(text_dim())),
            Span::styled("h", Style::default().fg(accent())),
            Span::styled("/", Style::default().fg(text_dim())),
            Span::styled("?", Style::default().fg(accent())),
            Span::styled("/", Style::default().fg(text_dim())),
            Span::styled("Esc", Style::default().fg(accent())),
            Span::styled(" to close", Style::default().fg(text_dim())),
        ]),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(Span::styled(" 󰋖 cinevault Help ", Style::default().fg(accent())))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent())),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(help, popup_area);
}

fn draw_confirm_popup(f: &mut Frame, app: &App) {
    let popup_area = centered_rect(40, 20, f.area());

    f.render_widget(Clear, popup_area);

    let confirm = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(app.confirm_message.as_str(), Style::default().fg(warning()))),
        Line::from(""),
        Line::from(vec![
            Span::styled("  y", Style::default().fg(success()).add_modifier(Modifier::BOLD)),
            Span::raw(" Yes   "),
            Span::styled("n", Style::default().fg(danger()).add_modifier(Modifier::BOLD)),
            Span::raw(" No"),
        ]),
    ])
    .block(
        Block::default()
            .title(Span::styled(" Confirm ", Style::default().fg(warning())))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(warning())),
    )
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });

    f.render_widget(confirm, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect_stays_inside() {
        let outer = Rect::new(0, 0, 100, 40);
        let inner = centered_rect(50, 50, outer);
        assert_eq!(inner.width, 50);
        assert_eq!(inner.height, 20);
        assert!(inner.x >= outer.x && inner.right() <= outer.right());
        assert!(inner.y >= outer.y && inner.bottom() <= outer.bottom());
    }

    #[test]
    fn test_year_from_metadata() {
        let item: Item = serde_json::from_value(serde_json::json!({ "title": "Heat", "release_date": "1995-12-15" })).unwrap();
        assert_eq!(item_year(&item), Some("1995".to_string()));
        assert_eq!(item_year(&Item::plain("Heat")), None);
    }
}
