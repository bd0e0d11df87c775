use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::Instant;

use crate::error::Outcome;
use crate::lists::view::{ordered_indices, ordered_item_indices};
use crate::lists::{AddOutcome, Direction, Item, ItemSort, ListSort, ListStore};
use crate::lock::pin::PIN_DIGITS;
use crate::lock::AutoLockSettings;
use crate::vault::Vault;

/// Status messages clear after this many seconds
const STATUS_SECONDS: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Lists,
    Items,
    Sections,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popup {
    None,
    Input,
    Pin,
    Confirm,
    Admin,
    Stats,
    Help,
}

/// Which collection the lists/items panes show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Library,
    Section(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputPurpose {
    NewList,
    RenameList,
    AddItem,
    Filter,
}

impl InputPurpose {
    pub fn title(self) -> &'static str {
        match self {
            InputPurpose::NewList => " New List ",
            InputPurpose::RenameList => " Rename List ",
            InputPurpose::AddItem => " Add Title ",
            InputPurpose::Filter => " Filter Lists ",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinPurpose {
    Unlock(usize),
    SetSectionPin(usize),
    AdminLogin,
    ChangeAdminCurrent,
    ChangeAdminNew { current: String },
}

impl PinPurpose {
    pub fn prompt(&self, sections: &[String]) -> String {
        let name = |i: &usize| sections.get(*i).cloned().unwrap_or_default();
        match self {
            PinPurpose::Unlock(i) => format!("Enter PIN for {}", name(i)),
            PinPurpose::SetSectionPin(i) => format!("New PIN for {}", name(i)),
            PinPurpose::AdminLogin => "Enter admin PIN".to_string(),
            PinPurpose::ChangeAdminCurrent => "Current admin PIN".to_string(),
            PinPurpose::ChangeAdminNew { .. } => "New admin PIN".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    DeleteList(usize),
    ClearItems(usize),
    ResetPin(usize),
    Import,
}

pub struct App {
    pub vault: Vault,
    pub pane: Pane,
    pub popup: Popup,
    pub scope: Scope,

    // Selections are positions in the displayed (filtered, sorted) order
    pub selected_list: usize,
    pub selected_item: usize,
    pub selected_section: usize,

    pub filter: String,
    pub list_sort: ListSort,
    pub item_sort: ItemSort,

    // Popup state
    pub input_buffer: String,
    pub input_purpose: InputPurpose,
    pub pin_buffer: String,
    pub pin_purpose: Option<PinPurpose>,
    pub confirm: Option<ConfirmAction>,
    pub confirm_message: String,

    // Status message (shown in info line, auto-clears after timeout)
    pub status_message: Option<String>,
    pub status_message_time: Option<Instant>,

    /// Remaining auto-lock time per section, refreshed on the countdown interval
    pub countdowns: Vec<u64>,
    pub last_countdown: Instant,
    pub last_auto_lock_check: Instant,
}

impl App {
    pub fn new(vault: Vault) -> Self {
        let mut app = Self {
            vault,
            pane: Pane::Lists,
            popup: Popup::None,
            scope: Scope::Library,

            selected_list: 0,
            selected_item: 0,
            selected_section: 0,

            filter: String::new(),
            list_sort: ListSort::default(),
            item_sort: ItemSort::default(),

            input_buffer: String::new(),
            input_purpose: InputPurpose::NewList,
            pin_buffer: String::new(),
            pin_purpose: None,
            confirm: None,
            confirm_message: String::new(),

            status_message: None,
            status_message_time: None,

            countdowns: Vec::new(),
            last_countdown: Instant::now(),
            last_auto_lock_check: Instant::now(),
        };
        app.refresh_countdowns();
        app
    }

    /// Set a status message (auto-clears after a few seconds)
    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_message_time = Some(Instant::now());
    }

    fn show(&mut self, outcome: Outcome) {
        self.set_status(outcome.message);
    }

    pub fn sections(&self) -> &[String] {
        self.vault.sections()
    }

    /// Lists of the current scope; `None` while a section scope is locked
    pub fn active_lists(&self) -> Option<&ListStore> {
        match self.scope {
            Scope::Library => Some(&self.vault.library),
            Scope::Section(i) => {
                let section = self.vault.sections().get(i)?;
                if self.vault.lock.is_unlocked(section) {
                    self.vault.section_lists.get(i)
                } else {
                    None
                }
            }
        }
    }

    fn active_lists_mut(&mut self) -> Option<&mut ListStore> {
        match self.scope {
            Scope::Library => Some(&mut self.vault.library),
            Scope::Section(i) => {
                let unlocked = self
                    .vault
                    .sections()
                    .get(i)
                    .map(|s| self.vault.lock.is_unlocked(s))
                    .unwrap_or(false);
                if unlocked {
                    self.vault.section_lists.get_mut(i)
                } else {
                    None
                }
            }
        }
    }

    pub fn scope_title(&self) -> String {
        match self.scope {
            Scope::Library => "Library".to_string(),
            Scope::Section(i) => self.sections().get(i).cloned().unwrap_or_default(),
        }
    }

    /// Collection indices of the lists on screen, in display order
    pub fn visible_lists(&self) -> Vec<usize> {
        self.active_lists()
            .map(|store| ordered_indices(store.lists(), &self.filter, self.list_sort))
            .unwrap_or_default()
    }

    pub fn selected_list_index(&self) -> Option<usize> {
        self.visible_lists().get(self.selected_list).copied()
    }

    /// Item positions of the selected list, in display order
    pub fn visible_items(&self) -> Vec<usize> {
        match (self.active_lists(), self.selected_list_index()) {
            (Some(store), Some(i)) => store
                .get(i)
                .map(|list| ordered_item_indices(list, self.item_sort))
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    fn selected_item_index(&self) -> Option<usize> {
        self.visible_items().get(self.selected_item).copied()
    }

    fn clamp_selection(&mut self) {
        let lists = self.visible_lists().len();
        self.selected_list = self.selected_list.min(lists.saturating_sub(1));
        let items = self.visible_items().len();
        self.selected_item = self.selected_item.min(items.saturating_sub(1));
        let sections = self.sections().len();
        self.selected_section = self.selected_section.min(sections.saturating_sub(1));
    }

    /// Put the selection on the list at collection index `index`
    fn select_list(&mut self, index: usize) {
        if let Some(pos) = self.visible_lists().iter().position(|&i| i == index) {
            self.selected_list = pos;
            self.selected_item = 0;
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        // A timed-out section must not be revived by this key press
        self.enforce_auto_lock()?;
        self.vault.record_activity()?;

        // Handle popups first
        if self.popup != Popup::None {
            return self.handle_popup_key(key);
        }

        // Handle normal key input
        self.handle_normal_key(key)
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Tab => {
                self.pane = match self.pane {
                    Pane::Lists => Pane::Items,
                    Pane::Items => Pane::Sections,
                    Pane::Sections => Pane::Lists,
                };
            }
            KeyCode::BackTab => {
                self.pane = match self.pane {
                    Pane::Lists => Pane::Sections,
                    Pane::Items => Pane::Lists,
                    Pane::Sections => Pane::Items,
                };
            }

            // Item reordering (shift) before plain navigation
            KeyCode::Char('K') if self.pane == Pane::Items => self.move_selected_item(Direction::Up)?,
            KeyCode::Char('J') if self.pane == Pane::Items => self.move_selected_item(Direction::Down)?,

            KeyCode::Char('j') | KeyCode::Down => self.move_down(),
            KeyCode::Char('k') | KeyCode::Up => self.move_up(),

            KeyCode::Enter | KeyCode::Char(' ') => match self.pane {
                Pane::Lists => {
                    if self.selected_list_index().is_some() {
                        self.pane = Pane::Items;
                        self.selected_item = 0;
                    }
                }
                Pane::Sections => self.open_selected_section(),
                Pane::Items => {}
            },

            KeyCode::Char('n') if self.pane == Pane::Lists => self.start_input(InputPurpose::NewList),
            KeyCode::Char('r') if self.pane == Pane::Lists => {
                if let Some(list) = self.selected_list_index().and_then(|i| self.active_lists()?.get(i)) {
                    let name = list.name.clone();
                    self.start_input(InputPurpose::RenameList);
                    self.input_buffer = name;
                }
            }
            KeyCode::Char('a') if self.pane != Pane::Sections => {
                if self.selected_list_index().is_some() {
                    self.start_input(InputPurpose::AddItem);
                } else {
                    self.set_status("Create a list first (n)");
                }
            }
            KeyCode::Char('/') => {
                self.start_input(InputPurpose::Filter);
                self.input_buffer = self.filter.clone();
            }
            KeyCode::Char('c') if self.pane == Pane::Lists => self.duplicate_selected()?,
            KeyCode::Char('f') if self.pane == Pane::Lists => self.toggle_favorite_selected()?,
            KeyCode::Char('s') => {
                self.list_sort = self.list_sort.next();
                self.set_status(format!("Lists: {}", self.list_sort.label()));
            }
            KeyCode::Char('o') => {
                self.item_sort = self.item_sort.next();
                self.set_status(format!("Items: {}", self.item_sort.label()));
            }
            KeyCode::Char('x') if self.pane != Pane::Sections => {
                if let Some(i) = self.selected_list_index() {
                    self.ask_confirm(ConfirmAction::ClearItems(i), "Remove every title from this list?");
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => self.delete_selection()?,

            // Sections
            KeyCode::Char('l') => self.lock_selected_section()?,
            KeyCode::Char('L') => {
                let sections = self.sections().to_vec();
                self.vault.lock.lock_all(&sections)?;
                self.scope = Scope::Library;
                self.clamp_selection();
                self.set_status("All sections locked");
            }
            KeyCode::Char('v') => {
                self.scope = Scope::Library;
                self.selected_list = 0;
                self.selected_item = 0;
                self.set_status("Library");
            }

            KeyCode::Char('e') => self.export_to_file()?,
            KeyCode::Char('i') => self.ask_confirm(ConfirmAction::Import, "Replace these lists with the export file?"),

            KeyCode::Char('A') => self.popup = Popup::Admin,
            KeyCode::Char('S') => self.popup = Popup::Stats,
            KeyCode::Char('?') | KeyCode::Char('h') => self.popup = Popup::Help,

            _ => {}
        }
        Ok(())
    }

    fn handle_popup_key(&mut self, key: KeyEvent) -> Result<()> {
        match self.popup {
            Popup::Input => self.handle_input_key(key),
            Popup::Pin => self.handle_pin_key(key),
            Popup::Admin => self.handle_admin_key(key),
            Popup::Help | Popup::Stats => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::Enter | KeyCode::Char('q') | KeyCode::Char('S')) {
                    self.popup = Popup::None;
                }
                Ok(())
            }
            Popup::Confirm => {
                match key.code {
                    KeyCode::Char('y') | KeyCode::Enter => {
                        self.popup = Popup::None;
                        self.confirm_action()?;
                    }
                    KeyCode::Char('n') | KeyCode::Esc => {
                        self.popup = Popup::None;
                        self.confirm = None;
                    }
                    _ => {}
                }
                Ok(())
            }
            Popup::None => Ok(()),
        }
    }

    fn move_down(&mut self) {
        match self.pane {
            Pane::Lists => {
                if self.selected_list + 1 < self.visible_lists().len() {
                    self.selected_list += 1;
                    self.selected_item = 0;
                }
            }
            Pane::Items => {
                if self.selected_item + 1 < self.visible_items().len() {
                    self.selected_item += 1;
                }
            }
            Pane::Sections => {
                if self.selected_section + 1 < self.sections().len() {
                    self.selected_section += 1;
                }
            }
        }
    }

    fn move_up(&mut self) {
        match self.pane {
            Pane::Lists => {
                if self.selected_list > 0 {
                    self.selected_list -= 1;
                    self.selected_item = 0;
                }
            }
            Pane::Items => self.selected_item = self.selected_item.saturating_sub(1),
            Pane::Sections => self.selected_section = self.selected_section.saturating_sub(1),
        }
    }

    fn start_input(&mut self, purpose: InputPurpose) {
        self.input_purpose = purpose;
        self.input_buffer.clear();
        self.popup = Popup::Input;
    }

    fn start_pin(&mut self, purpose: PinPurpose) {
        self.pin_purpose = Some(purpose);
        self.pin_buffer.clear();
        self.popup = Popup::Pin;
    }

    fn ask_confirm(&mut self, action: ConfirmAction, message: &str) {
        self.confirm = Some(action);
        self.confirm_message = message.to_string();
        self.popup = Popup::Confirm;
    }

    fn handle_input_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => {
                if self.input_purpose == InputPurpose::Filter {
                    self.filter.clear();
                    self.clamp_selection();
                }
                self.popup = Popup::None;
                self.input_buffer.clear();
            }
            KeyCode::Enter => self.submit_input()?,
            KeyCode::Backspace => {
                self.input_buffer.pop();
                if self.input_purpose == InputPurpose::Filter {
                    self.filter = self.input_buffer.clone();
                    self.clamp_selection();
                }
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                if !c.is_control() {
                    self.input_buffer.push(c);
                }
                // Filter applies while typing
                if self.input_purpose == InputPurpose::Filter {
                    self.filter = self.input_buffer.clone();
                    self.selected_list = 0;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn submit_input(&mut self) -> Result<()> {
        let text = std::mem::take(&mut self.input_buffer);
        let purpose = self.input_purpose;
        if purpose == InputPurpose::Filter {
            self.popup = Popup::None;
            self.filter = text;
            self.clamp_selection();
            return Ok(());
        }

        let selected = self.selected_list_index();
        let Some(store) = self.active_lists_mut() else {
            self.popup = Popup::None;
            self.set_status("Section is locked");
            return Ok(());
        };

        let outcome = match purpose {
            InputPurpose::NewList => match store.create_list(&text) {
                Ok(index) => {
                    self.popup = Popup::None;
                    self.select_list(index);
                    Outcome::ok(format!("Created '{}'", text.trim()))
                }
                Err(e) => Outcome::failed(e.to_string()),
            },
            InputPurpose::RenameList => match selected {
                Some(index) => {
                    let result = store.rename_list(index, &text);
                    if result.is_ok() {
                        self.popup = Popup::None;
                        self.select_list(index);
                    }
                    Outcome::from_result(result, format!("Renamed to '{}'", text.trim()))
                }
                None => Outcome::failed("No list selected"),
            },
            InputPurpose::AddItem => match selected {
                Some(index) => match store.add_item(index, Item::plain(text.trim())) {
                    Ok(AddOutcome::Added) => {
                        self.popup = Popup::None;
                        Outcome::ok(format!("Added '{}'", text.trim()))
                    }
                    Ok(AddOutcome::AlreadyPresent) => {
                        self.popup = Popup::None;
                        Outcome::ok(format!("'{}' is already in this list", text.trim()))
                    }
                    Err(e) => Outcome::failed(e.to_string()),
                },
                None => Outcome::failed("No list selected"),
            },
            InputPurpose::Filter => return Ok(()),
        };

        // Keep the text on failure so it can be corrected
        if self.popup == Popup::Input {
            self.input_buffer = text;
        }
        self.clamp_selection();
        self.show(outcome);
        Ok(())
    }

    fn handle_pin_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => {
                self.popup = Popup::None;
                self.pin_buffer.clear();
                self.pin_purpose = None;
            }
            KeyCode::Backspace => {
                self.pin_buffer.pop();
            }
            KeyCode::Char(c) if c.is_ascii_digit() && self.pin_buffer.len() < PIN_DIGITS => {
                self.pin_buffer.push(c);
            }
            KeyCode::Enter => {
                if self.pin_buffer.len() == PIN_DIGITS {
                    self.submit_pin()?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn submit_pin(&mut self) -> Result<()> {
        let pin = std::mem::take(&mut self.pin_buffer);
        let Some(purpose) = self.pin_purpose.take() else {
            self.popup = Popup::None;
            return Ok(());
        };
        self.popup = Popup::None;

        let outcome = match purpose {
            PinPurpose::Unlock(i) => {
                let section = self.sections().get(i).cloned().unwrap_or_default();
                let result = self.vault.lock.unlock(&section, &pin);
                if result.is_ok() {
                    self.scope = Scope::Section(i);
                    self.selected_list = 0;
                    self.selected_item = 0;
                    self.pane = Pane::Lists;
                }
                Outcome::from_result(result, format!("{} unlocked", section))
            }
            PinPurpose::SetSectionPin(i) => {
                let section = self.sections().get(i).cloned().unwrap_or_default();
                let result = self.vault.lock.set_pin(&section, &pin);
                Outcome::from_result(result, format!("PIN set for {}", section))
            }
            PinPurpose::AdminLogin => {
                let result = self.vault.lock.switch_role(Some(&pin));
                Outcome::from_result(result, "Admin mode")
            }
            PinPurpose::ChangeAdminCurrent => {
                if self.vault.lock.session().verify_admin_pin(&pin) {
                    self.start_pin(PinPurpose::ChangeAdminNew { current: pin });
                    return Ok(());
                }
                Outcome::failed("Current admin PIN is incorrect")
            }
            PinPurpose::ChangeAdminNew { current } => {
                let result = self.vault.lock.change_admin_pin(&current, &pin);
                Outcome::from_result(result, "Admin PIN changed")
            }
        };
        self.refresh_countdowns();
        self.show(outcome);
        Ok(())
    }

    fn handle_admin_key(&mut self, key: KeyEvent) -> Result<()> {
        let section = self.selected_section;
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('A') => self.popup = Popup::None,
            KeyCode::Char('r') => {
                if self.vault.lock.session().is_admin() {
                    let result = self.vault.lock.switch_role(None);
                    self.show(Outcome::from_result(result, "User mode"));
                } else {
                    self.start_pin(PinPurpose::AdminLogin);
                }
            }
            KeyCode::Char('p') => {
                if self.vault.lock.session().is_admin() {
                    self.start_pin(PinPurpose::SetSectionPin(section));
                } else {
                    self.set_status("Permission denied: only an admin can set section PINs");
                }
            }
            KeyCode::Char('x') => {
                if self.vault.lock.session().is_admin() {
                    self.ask_confirm(ConfirmAction::ResetPin(section), "Clear this section's PIN?");
                } else {
                    self.set_status("Permission denied: only an admin can reset section PINs");
                }
            }
            KeyCode::Char('c') => {
                if self.vault.lock.session().is_admin() {
                    self.start_pin(PinPurpose::ChangeAdminCurrent);
                } else {
                    self.set_status("Permission denied: only an admin can change the admin PIN");
                }
            }
            KeyCode::Char('t') => {
                let current = self.vault.lock.session().settings();
                self.update_settings(AutoLockSettings { enabled: !current.enabled, ..current });
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.adjust_inactivity(60_000, true),
            KeyCode::Char('-') => self.adjust_inactivity(60_000, false),
            KeyCode::Char(']') => self.adjust_session(5 * 60_000, true),
            KeyCode::Char('[') => self.adjust_session(5 * 60_000, false),
            _ => {}
        }
        Ok(())
    }

    fn adjust_inactivity(&mut self, step: u64, increase: bool) {
        let current = self.vault.lock.session().settings();
        let inactivity_timeout = if increase {
            current.inactivity_timeout + step
        } else {
            current.inactivity_timeout.saturating_sub(step)
        };
        self.update_settings(AutoLockSettings { inactivity_timeout, ..current });
    }

    fn adjust_session(&mut self, step: u64, increase: bool) {
        let current = self.vault.lock.session().settings();
        let session_timeout = if increase {
            current.session_timeout + step
        } else {
            current.session_timeout.saturating_sub(step)
        };
        self.update_settings(AutoLockSettings { session_timeout, ..current });
    }

    fn update_settings(&mut self, settings: AutoLockSettings) {
        let result = self.vault.lock.update_auto_lock_settings(settings);
        self.show(Outcome::from_result(result, "Auto-lock settings saved"));
        self.refresh_countdowns();
    }

    fn move_selected_item(&mut self, direction: Direction) -> Result<()> {
        if self.item_sort != ItemSort::InsertionOrder {
            self.set_status("Switch item order to 'added' (o) to reorder");
            return Ok(());
        }
        let (Some(list), Some(item)) = (self.selected_list_index(), self.selected_item_index()) else {
            return Ok(());
        };
        if let Some(store) = self.active_lists_mut() {
            let position = store.move_item(list, item, direction)?;
            self.selected_item = position;
        }
        Ok(())
    }

    fn duplicate_selected(&mut self) -> Result<()> {
        let Some(index) = self.selected_list_index() else {
            return Ok(());
        };
        if let Some(store) = self.active_lists_mut() {
            let copy = store.duplicate_list(index)?;
            let name = store.get(copy).map(|l| l.name.clone()).unwrap_or_default();
            self.select_list(copy);
            self.set_status(format!("Created '{}'", name));
        }
        Ok(())
    }

    fn toggle_favorite_selected(&mut self) -> Result<()> {
        let Some(index) = self.selected_list_index() else {
            return Ok(());
        };
        if let Some(store) = self.active_lists_mut() {
            let favorite = store.toggle_favorite(index)?;
            self.select_list(index);
            self.set_status(if favorite { "Marked favorite" } else { "Unmarked favorite" });
        }
        Ok(())
    }

    fn delete_selection(&mut self) -> Result<()> {
        match self.pane {
            Pane::Lists => {
                if let Some(list) = self.selected_list_index().and_then(|i| self.active_lists()?.get(i)) {
                    let message = format!("Delete '{}'? This cannot be undone.", list.name);
                    if let Some(i) = self.selected_list_index() {
                        self.ask_confirm(ConfirmAction::DeleteList(i), &message);
                    }
                }
            }
            Pane::Items => {
                let (Some(list), Some(item)) = (self.selected_list_index(), self.selected_item_index()) else {
                    return Ok(());
                };
                if let Some(store) = self.active_lists_mut() {
                    let removed = store.remove_item(list, item)?;
                    self.clamp_selection();
                    self.set_status(format!("Removed '{}'", removed.title()));
                }
            }
            Pane::Sections => {}
        }
        Ok(())
    }

    fn confirm_action(&mut self) -> Result<()> {
        let Some(action) = self.confirm.take() else {
            return Ok(());
        };

        match action {
            ConfirmAction::ResetPin(i) => {
                let section = self.sections().get(i).cloned().unwrap_or_default();
                let result = self.vault.lock.reset_pin(&section);
                if result.is_ok() && self.scope == Scope::Section(i) {
                    self.scope = Scope::Library;
                }
                self.show(Outcome::from_result(result, format!("PIN cleared for {}", section)));
            }
            ConfirmAction::Import => self.import_from_file()?,
            ConfirmAction::DeleteList(index) => {
                if let Some(store) = self.active_lists_mut() {
                    let removed = store.delete_list(index)?;
                    self.set_status(format!("Deleted '{}'", removed.name));
                }
            }
            ConfirmAction::ClearItems(index) => {
                if let Some(store) = self.active_lists_mut() {
                    store.clear_items(index)?;
                    self.set_status("List cleared");
                }
            }
        }
        self.clamp_selection();
        Ok(())
    }

    fn open_selected_section(&mut self) {
        let i = self.selected_section;
        let Some(section) = self.sections().get(i).cloned() else {
            return;
        };

        if self.vault.lock.is_unlocked(&section) {
            self.scope = Scope::Section(i);
            self.selected_list = 0;
            self.selected_item = 0;
            self.pane = Pane::Lists;
        } else if !self.vault.lock.has_pin(&section) {
            self.set_status(format!("{} has no PIN yet; an admin must set one", section));
        } else {
            self.start_pin(PinPurpose::Unlock(i));
        }
    }

    fn lock_selected_section(&mut self) -> Result<()> {
        let i = self.selected_section;
        let Some(section) = self.sections().get(i).cloned() else {
            return Ok(());
        };
        self.vault.lock.lock(&section)?;
        if self.scope == Scope::Section(i) {
            self.scope = Scope::Library;
        }
        self.clamp_selection();
        self.refresh_countdowns();
        self.set_status(format!("{} locked", section));
        Ok(())
    }

    fn export_path(&self) -> Result<std::path::PathBuf> {
        let file = match self.scope {
            Scope::Library => "lists-export.json".to_string(),
            Scope::Section(i) => format!("section-{}-export.json", i),
        };
        Ok(self.vault.config.data_dir()?.join(file))
    }

    fn export_to_file(&mut self) -> Result<()> {
        let path = self.export_path()?;
        let Some(store) = self.active_lists() else {
            self.set_status("Section is locked");
            return Ok(());
        };
        let blob = store.export_all()?;
        std::fs::write(&path, blob)?;
        self.set_status(format!("Exported to {}", path.display()));
        Ok(())
    }

    fn import_from_file(&mut self) -> Result<()> {
        let path = self.export_path()?;
        let blob = match std::fs::read_to_string(&path) {
            Ok(blob) => blob,
            Err(e) => {
                self.set_status(format!("Cannot read {}: {}", path.display(), e));
                return Ok(());
            }
        };
        let Some(store) = self.active_lists_mut() else {
            self.set_status("Section is locked");
            return Ok(());
        };
        let result = store.import_all(&blob);
        let message = match &result {
            Ok(count) => format!("Imported {} lists", count),
            Err(_) => String::new(),
        };
        self.selected_list = 0;
        self.selected_item = 0;
        self.show(Outcome::from_result(result, message));
        Ok(())
    }

    fn refresh_countdowns(&mut self) {
        self.countdowns = self
            .vault
            .sections()
            .iter()
            .map(|s| self.vault.lock.remaining_time(s))
            .collect();
        self.last_countdown = Instant::now();
    }

    /// Lock timed-out sections and leave their scope
    fn enforce_auto_lock(&mut self) -> Result<()> {
        let sections = self.sections().to_vec();
        let locked = self.vault.lock.check_all(&sections)?;
        self.after_auto_lock(locked);
        Ok(())
    }

    fn after_auto_lock(&mut self, locked: Vec<String>) {
        if locked.is_empty() {
            return;
        }
        if let Scope::Section(i) = self.scope {
            if self.sections().get(i).map(|s| locked.contains(s)).unwrap_or(false) {
                self.scope = Scope::Library;
                if self.popup == Popup::Input || self.popup == Popup::Confirm {
                    self.popup = Popup::None;
                }
            }
        }
        if self.vault.config.notifications {
            for section in &locked {
                crate::notify_locked(section);
            }
        }
        self.clamp_selection();
        self.refresh_countdowns();
        self.set_status(format!("Auto-locked: {}", locked.join(", ")));
    }

    pub fn tick(&mut self) -> Result<()> {
        // Clear status message after a few seconds
        if let Some(time) = self.status_message_time {
            if time.elapsed().as_secs() >= STATUS_SECONDS {
                self.status_message = None;
                self.status_message_time = None;
            }
        }

        // Authoritative auto-lock check, also picks up changes from other processes
        if self.last_auto_lock_check.elapsed().as_millis() as u64 >= self.vault.config.auto_lock_check_interval_ms {
            self.last_auto_lock_check = Instant::now();
            let locked = self.vault.poll()?;
            self.after_auto_lock(locked);
            self.clamp_selection();
        }

        // Countdown display
        if self.last_countdown.elapsed().as_millis() as u64 >= self.vault.config.countdown_interval_ms {
            self.refresh_countdowns();
        }

        Ok(())
    }
}
