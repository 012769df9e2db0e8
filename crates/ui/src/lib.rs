//! Terminal front-end for Libris.

mod panels;

use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::Context as _;
use chrono::Utc;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{event, terminal};
use libris_application::{AppContext, DiskFile, FileSource, NoticeKind};
use libris_core::{BookRecord, CUSTOM_THEME_NAME, Rgb, Theme};
use libris_engine::wrap_text;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Clear, HighlightSpacing, List, ListItem, ListState, Paragraph, Wrap,
};

use panels::{
    ConfirmAction, HistoryPanel, InfoPanel, PromptAction, PromptPanel, SETTINGS_MENU_ADD_THEME,
    SETTINGS_MENU_CUSTOM_COLORS, SETTINGS_MENU_DELETE_THEME, SETTINGS_MENU_FONT_FAMILY,
    SETTINGS_MENU_FONT_SIZE, SETTINGS_MENU_ITEM_COUNT, SETTINGS_MENU_KEEP_FORMAT,
    SETTINGS_MENU_RESET, SETTINGS_MENU_SORT, SETTINGS_MENU_THEME, SettingsPanel, TocPanel,
    format_bytes, format_last_opened, parse_color_input, parse_font_family_input,
    parse_import_paths, parse_theme_input, text_columns, truncate_to_width,
};

const FONT_STEP: i32 = 2;

pub struct Ui {
    ctx: AppContext,
    toc_panel: TocPanel,
    history_panel: HistoryPanel,
    info_panel: InfoPanel,
    settings_panel: SettingsPanel,
    prompt: Option<PromptPanel>,
    confirm: Option<ConfirmAction>,
}

impl Ui {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            toc_panel: TocPanel::default(),
            history_panel: HistoryPanel::default(),
            info_panel: InfoPanel::default(),
            settings_panel: SettingsPanel::default(),
            prompt: None,
            confirm: None,
        }
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        let mut terminal = setup_terminal()?;
        terminal.clear().ok();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.event_loop(&mut terminal)
        }));
        let restore_result = restore_terminal(&mut terminal);

        if self.settings_panel.dirty {
            self.ctx.commit_settings();
        }
        self.ctx.close_book();

        match (result, restore_result) {
            (Ok(Ok(())), Ok(())) => Ok(()),
            (Ok(Err(err)), _) => Err(err),
            (Ok(Ok(())), Err(err)) => Err(err),
            (Err(panic), Ok(())) => Err(anyhow::anyhow!(panic_to_string(panic))),
            (Err(panic), Err(err)) => Err(anyhow::anyhow!(
                "{}\n(additionally failed to restore terminal: {err})",
                panic_to_string(panic)
            )),
        }
    }

    fn chrome(&self) -> &Theme {
        self.ctx.settings.preferences().app_theme()
    }

    fn base_style(&self) -> Style {
        let theme = self.chrome();
        Style::default().fg(to_color(theme.text)).bg(to_color(theme.bg))
    }

    fn border_style(&self) -> Style {
        Style::default().fg(to_color(self.chrome().border))
    }

    fn highlight_style(&self) -> Style {
        let theme = self.chrome();
        Style::default()
            .fg(to_color(theme.bg))
            .bg(to_color(theme.text))
            .add_modifier(Modifier::BOLD)
    }

    fn block(&self, title: impl Into<String>) -> Block<'static> {
        Block::default()
            .borders(Borders::ALL)
            .border_style(self.border_style())
            .style(self.base_style())
            .title(Span::styled(
                title.into(),
                Style::default().add_modifier(Modifier::BOLD),
            ))
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ) -> anyhow::Result<()> {
        let tick_rate = Duration::from_millis(250);
        let mut needs_redraw = true;

        loop {
            if needs_redraw {
                terminal.draw(|frame| self.draw(frame.area(), frame))?;
                needs_redraw = false;
            }

            if !event::poll(tick_rate)? {
                continue;
            }

            match event::read()? {
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Release {
                        continue;
                    }
                    needs_redraw = true;
                    if self.handle_key(key) {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }

    /// Routes a key to the topmost overlay. Returns true to quit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.ctx.notice().is_some() {
            self.ctx.take_notice();
            return false;
        }
        if self.confirm.is_some() {
            self.handle_confirm_key(key);
            return false;
        }
        if self.prompt.is_some() {
            self.handle_prompt_key(key);
            return false;
        }
        if self.settings_panel.open {
            self.handle_settings_panel_key(key);
            return false;
        }
        if self.ctx.session.is_open() {
            if self.toc_panel.open {
                self.handle_toc_panel_key(key);
            } else if self.info_panel.open {
                self.handle_info_panel_key(key);
            } else {
                self.handle_reader_key(key);
            }
            return false;
        }
        if self.history_panel.open {
            self.handle_history_panel_key(key);
            return false;
        }
        self.handle_main_key(key)
    }

    fn handle_main_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return true,
            KeyCode::Down | KeyCode::Char('j') => self.ctx.select_next(),
            KeyCode::Up | KeyCode::Char('k') => self.ctx.select_prev(),
            KeyCode::Enter => {
                self.open_selected();
            }
            KeyCode::Char('i') => {
                self.prompt = Some(PromptPanel::new(PromptAction::Import, String::new()));
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(book) = self.ctx.selected_book() {
                    self.confirm = Some(ConfirmAction::DeleteBook {
                        id: book.id.clone(),
                        title: book.title.clone(),
                    });
                }
            }
            KeyCode::Char('h') => {
                self.history_panel.open = true;
                self.history_panel.selected = 0;
            }
            KeyCode::Char('o') => self.ctx.cycle_sort_order(),
            KeyCode::Char('r') => self.ctx.refresh(),
            KeyCode::Char('R') => self.confirm = Some(ConfirmAction::ResetAll),
            KeyCode::Char('s') => self.open_settings_panel(),
            _ => {}
        }
        false
    }

    fn open_selected(&mut self) {
        if self.ctx.open_selected() {
            self.toc_panel = TocPanel::default();
            self.info_panel.open = false;
        }
    }

    fn open_settings_panel(&mut self) {
        self.settings_panel.open = true;
        self.settings_panel.selected = 0;
        self.settings_panel.dirty = false;
    }

    fn handle_reader_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => {
                self.ctx.close_book();
                self.toc_panel.open = false;
                self.info_panel.open = false;
            }
            KeyCode::Right | KeyCode::Char('l') | KeyCode::Char(' ') | KeyCode::PageDown => {
                self.ctx.next_page();
            }
            KeyCode::Left | KeyCode::Char('h') | KeyCode::PageUp => self.ctx.prev_page(),
            KeyCode::Char('t') => {
                self.toc_panel.open = true;
                self.toc_panel.query.clear();
                self.toc_panel.selected = 0;
            }
            KeyCode::Char('i') => self.info_panel.open = true,
            KeyCode::Char('s') => self.open_settings_panel(),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.ctx.step_font_size(FONT_STEP);
                self.ctx.commit_settings();
            }
            KeyCode::Char('-') => {
                self.ctx.step_font_size(-FONT_STEP);
                self.ctx.commit_settings();
            }
            _ => {}
        }
    }

    fn handle_toc_panel_key(&mut self, key: KeyEvent) {
        let visible = self.ctx.session.filtered_toc(&self.toc_panel.query).len();
        match key.code {
            KeyCode::Esc => self.toc_panel.open = false,
            KeyCode::Up => {
                self.toc_panel.selected = self.toc_panel.selected.saturating_sub(1);
            }
            KeyCode::Down => {
                if visible > 0 {
                    self.toc_panel.selected = (self.toc_panel.selected + 1).min(visible - 1);
                }
            }
            KeyCode::Enter => {
                let href = self
                    .ctx
                    .session
                    .filtered_toc(&self.toc_panel.query)
                    .get(self.toc_panel.selected)
                    .map(|(_, item)| item.href.clone());
                if let Some(href) = href {
                    self.ctx.go_to(&href);
                    self.toc_panel.open = false;
                }
            }
            KeyCode::Backspace => {
                self.toc_panel.query.pop();
                self.toc_panel.selected = 0;
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.toc_panel.query.clear();
                self.toc_panel.selected = 0;
            }
            KeyCode::Char(ch) => {
                if !ch.is_control() {
                    self.toc_panel.query.push(ch);
                    self.toc_panel.selected = 0;
                }
            }
            _ => {}
        }
    }

    fn handle_info_panel_key(&mut self, key: KeyEvent) {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('i') | KeyCode::Enter) {
            self.info_panel.open = false;
        }
    }

    fn handle_history_panel_key(&mut self, key: KeyEvent) {
        let len = self.ctx.books.len();
        match key.code {
            KeyCode::Esc | KeyCode::Char('h') => self.history_panel.open = false,
            KeyCode::Up => {
                self.history_panel.selected = self.history_panel.selected.saturating_sub(1);
            }
            KeyCode::Down => {
                if len > 0 {
                    self.history_panel.selected = (self.history_panel.selected + 1).min(len - 1);
                }
            }
            KeyCode::Enter => {
                let id = self
                    .ctx
                    .history()
                    .get(self.history_panel.selected)
                    .map(|b| b.id.clone());
                if let Some(id) = id {
                    self.history_panel.open = false;
                    if self.ctx.open_book(&id) {
                        self.toc_panel = TocPanel::default();
                    }
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                let action = self
                    .ctx
                    .history()
                    .get(self.history_panel.selected)
                    .map(|book| ConfirmAction::DeleteBook {
                        id: book.id.clone(),
                        title: book.title.clone(),
                    });
                if let Some(action) = action {
                    self.confirm = Some(action);
                }
            }
            _ => {}
        }
    }

    fn handle_settings_panel_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('s') => {
                if self.settings_panel.dirty {
                    self.ctx.commit_settings();
                    self.settings_panel.dirty = false;
                }
                self.settings_panel.open = false;
            }
            KeyCode::Up => {
                self.settings_panel.selected = self.settings_panel.selected.saturating_sub(1);
            }
            KeyCode::Down => {
                self.settings_panel.selected = (self.settings_panel.selected + 1)
                    .min(SETTINGS_MENU_ITEM_COUNT.saturating_sub(1));
            }
            KeyCode::Left => self.adjust_setting(-1),
            KeyCode::Right => self.adjust_setting(1),
            KeyCode::Enter => self.activate_setting(),
            _ => {}
        }
    }

    fn adjust_setting(&mut self, direction: i32) {
        match self.settings_panel.selected {
            SETTINGS_MENU_THEME => self.step_theme(direction),
            SETTINGS_MENU_FONT_SIZE => {
                self.ctx.step_font_size(direction * FONT_STEP);
                self.settings_panel.dirty = true;
            }
            SETTINGS_MENU_FONT_FAMILY => self.ctx.cycle_font_family(),
            SETTINGS_MENU_SORT => self.ctx.cycle_sort_order(),
            SETTINGS_MENU_KEEP_FORMAT => self.ctx.toggle_keep_original_format(),
            _ => {}
        }
    }

    fn activate_setting(&mut self) {
        let prefs = self.ctx.settings.preferences();
        match self.settings_panel.selected {
            SETTINGS_MENU_CUSTOM_COLORS => {
                let current = format!("{} {}", prefs.custom_colors.bg, prefs.custom_colors.text);
                self.prompt = Some(PromptPanel::new(PromptAction::CustomColors, current));
            }
            SETTINGS_MENU_FONT_FAMILY => {
                let current = prefs.font_family.clone();
                self.prompt = Some(PromptPanel::new(PromptAction::FontFamily, current));
            }
            SETTINGS_MENU_ADD_THEME => {
                self.prompt = Some(PromptPanel::new(PromptAction::AddTheme, String::new()));
            }
            SETTINGS_MENU_DELETE_THEME => {
                let name = prefs.active_theme_name.clone();
                if prefs.theme(&name).is_some_and(|t| t.is_custom) {
                    self.confirm = Some(ConfirmAction::DeleteTheme(name));
                } else {
                    self.ctx.delete_theme(&name);
                }
            }
            SETTINGS_MENU_RESET => self.confirm = Some(ConfirmAction::ResetAll),
            _ => self.adjust_setting(1),
        }
    }

    /// Moves the active theme through the saved themes, then `custom`.
    fn step_theme(&mut self, direction: i32) {
        let prefs = self.ctx.settings.preferences();
        let mut names: Vec<String> = prefs.themes.iter().map(|t| t.name.clone()).collect();
        names.push(CUSTOM_THEME_NAME.to_string());
        let len = names.len() as i32;
        let current = names
            .iter()
            .position(|n| *n == prefs.active_theme_name)
            .map(|i| i as i32)
            .unwrap_or(-1);
        let next = (current + direction).rem_euclid(len) as usize;
        let name = names[next].clone();
        self.ctx.select_theme(&name);
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) {
        let Some(prompt) = self.prompt.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.prompt = None,
            KeyCode::Enter => self.submit_prompt(),
            KeyCode::Backspace => {
                prompt.input.pop();
                prompt.error = None;
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                prompt.input.clear();
                prompt.error = None;
            }
            KeyCode::Char(ch) => {
                if !ch.is_control() {
                    prompt.input.push(ch);
                    prompt.error = None;
                }
            }
            _ => {}
        }
    }

    fn submit_prompt(&mut self) {
        let Some(prompt) = self.prompt.as_mut() else {
            return;
        };
        let input = prompt.input.clone();
        let action = prompt.action;
        match action {
            PromptAction::Import => {
                self.prompt = None;
                self.import_paths(&parse_import_paths(&input));
            }
            PromptAction::CustomColors => match parse_color_input(&input) {
                Some((bg, text)) => {
                    self.prompt = None;
                    self.ctx.set_custom_colors(&bg, &text);
                }
                None => prompt.error = Some("Enter a background and a text colour".to_string()),
            },
            PromptAction::FontFamily => match parse_font_family_input(&input) {
                Some(family) => {
                    self.prompt = None;
                    self.ctx.set_font_family(&family);
                }
                None => prompt.error = Some("Enter a font family".to_string()),
            },
            PromptAction::AddTheme => match parse_theme_input(&input) {
                Some((name, bg, text)) => {
                    self.prompt = None;
                    self.ctx.add_custom_theme(&name, &bg, &text);
                }
                None => prompt.error = Some("Enter a name and two colours".to_string()),
            },
        }
    }

    fn import_paths(&mut self, paths: &[String]) {
        let mut files = Vec::new();
        let mut missing = Vec::new();
        for path in paths {
            match DiskFile::open(path) {
                Ok(file) => files.push(file),
                Err(err) => missing.push(format!("{err:#}")),
            }
        }
        let sources: Vec<&dyn FileSource> = files.iter().map(|f| f as &dyn FileSource).collect();
        self.ctx.import_files(&sources);

        if !missing.is_empty() {
            let mut message = self
                .ctx
                .take_notice()
                .map(|n| n.message)
                .unwrap_or_default();
            for line in missing {
                if !message.is_empty() {
                    message.push('\n');
                }
                message.push_str(&line);
            }
            self.ctx.notify_error(message);
        }
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                if let Some(action) = self.confirm.take() {
                    self.apply_confirmed(action);
                }
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => self.confirm = None,
            _ => {}
        }
    }

    fn apply_confirmed(&mut self, action: ConfirmAction) {
        match action {
            ConfirmAction::DeleteBook { id, .. } => {
                self.ctx.delete_book(&id);
                self.history_panel.selected = self
                    .history_panel
                    .selected
                    .min(self.ctx.books.len().saturating_sub(1));
            }
            ConfirmAction::DeleteTheme(name) => self.ctx.delete_theme(&name),
            ConfirmAction::ResetAll => {
                self.ctx.reset_all();
                self.settings_panel = SettingsPanel::default();
                self.toc_panel = TocPanel::default();
                self.info_panel.open = false;
            }
        }
    }

    fn draw(&mut self, area: Rect, frame: &mut ratatui::Frame) {
        frame.render_widget(Clear, area);
        frame.render_widget(Block::default().style(self.base_style()), area);

        if self.ctx.session.is_open() {
            self.draw_reader(area, frame);
            if self.toc_panel.open {
                self.draw_toc_panel(area, frame);
            }
            if self.info_panel.open {
                self.draw_info_panel(area, frame);
            }
        } else {
            self.draw_main(area, frame);
            if self.history_panel.open {
                self.draw_history_panel(area, frame);
            }
        }

        if self.settings_panel.open {
            self.draw_settings_panel(area, frame);
        }
        if let Some(prompt) = &self.prompt {
            self.draw_prompt(prompt, area, frame);
        }
        if let Some(action) = &self.confirm {
            self.draw_confirm(action, area, frame);
        }
        if self.ctx.notice().is_some() {
            self.draw_notice(area, frame);
        }
    }

    fn draw_main(&self, area: Rect, frame: &mut ratatui::Frame) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(0),
                Constraint::Length(2),
            ])
            .split(area);

        let prefs = self.ctx.settings.preferences();
        let header = Paragraph::new(Line::from(vec![
            Span::styled("Libris", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!(
                " · {} book(s) · sorted by {}",
                self.ctx.books.len(),
                prefs.sort_order.label()
            )),
        ]))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(self.border_style()),
        );
        frame.render_widget(header, layout[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(layout[1]);
        self.draw_library(frame, body[0]);
        self.draw_details(frame, body[1]);

        let footer = Paragraph::new(key_hints(&[
            ("Enter", "open"),
            ("i", "import"),
            ("d", "delete"),
            ("h", "history"),
            ("o", "sort"),
            ("s", "settings"),
            ("R", "reset"),
            ("q", "quit"),
        ]))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(self.border_style()),
        );
        frame.render_widget(footer, layout[2]);
    }

    fn draw_library(&self, frame: &mut ratatui::Frame, area: Rect) {
        let block = self.block("Library");

        if self.ctx.books.is_empty() {
            let lines = vec![
                Line::raw("No books yet."),
                Line::raw(""),
                Line::raw("Press i to import .txt or .epub files."),
            ];
            let paragraph = Paragraph::new(Text::from(lines))
                .block(block)
                .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, area);
            return;
        }

        let max_title_width = area.width.saturating_sub(12) as usize;
        let items: Vec<ListItem> = self
            .ctx
            .books
            .iter()
            .map(|book| {
                ListItem::new(Line::from(vec![
                    Span::raw(truncate_to_width(&book.title, max_title_width.max(8))),
                    Span::styled(
                        format!("  {}", book.format),
                        Style::default().add_modifier(Modifier::DIM),
                    ),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(self.highlight_style())
            .highlight_symbol("> ")
            .highlight_spacing(HighlightSpacing::Always);

        let mut state = ListState::default();
        state.select(Some(self.ctx.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_details(&self, frame: &mut ratatui::Frame, area: Rect) {
        let block = self.block("Details");
        let Some(book) = self.ctx.selected_book() else {
            frame.render_widget(block, area);
            return;
        };
        let width = block.inner(area).width as usize;
        let paragraph = Paragraph::new(Text::from(book_detail_lines(book, width)))
            .block(block)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn draw_reader(&mut self, area: Rect, frame: &mut ratatui::Frame) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(area);

        let keep_original = self.ctx.settings.preferences().keep_original_format;
        let style = self
            .ctx
            .session
            .rendition()
            .and_then(|r| r.active_style())
            .cloned();
        let page_style = match (&style, keep_original) {
            (Some(rules), false) => {
                let bg = rules.get("body", "background").and_then(|v| v.parse::<Rgb>().ok());
                let fg = rules.get("p", "color").and_then(|v| v.parse::<Rgb>().ok());
                let mut page = Style::default();
                if let Some(bg) = bg {
                    page = page.bg(to_color(bg));
                }
                if let Some(fg) = fg {
                    page = page.fg(to_color(fg));
                }
                page
            }
            _ => Style::default(),
        };

        let body = layout[1];
        let inner = Rect {
            x: body.x.saturating_add(2),
            y: body.y.saturating_add(1),
            width: body.width.saturating_sub(4),
            height: body.height.saturating_sub(1),
        };
        let columns = text_columns(style.as_ref(), inner.width);
        let text_area = Rect {
            x: inner.x + (inner.width - columns) / 2,
            width: columns,
            ..inner
        };
        self.ctx.session.resize(text_area.width, text_area.height);

        let title = self.ctx.session.current_title().unwrap_or_default().to_string();
        let Some(rendition) = self.ctx.session.rendition() else {
            return;
        };
        let chapter = rendition.chapter_label().unwrap_or_default();
        let header = Paragraph::new(Line::from(vec![
            Span::styled(
                truncate_to_width(&title, area.width.saturating_sub(4) as usize / 2),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(if chapter.is_empty() {
                String::new()
            } else {
                format!(" · {chapter}")
            }),
        ]))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(self.border_style()),
        );
        frame.render_widget(header, layout[0]);

        frame.render_widget(Block::default().style(page_style), body);
        let lines: Vec<Line> = rendition.visible_lines().into_iter().map(Line::raw).collect();
        frame.render_widget(Paragraph::new(Text::from(lines)).style(page_style), text_area);

        let prefs = self.ctx.settings.preferences();
        let status = format!(
            "{:.0}% · {} {}px · {}",
            rendition.progress_percent(),
            prefs.font_family,
            prefs.font_size,
            if keep_original {
                "original formatting".to_string()
            } else {
                prefs.active_theme_name.clone()
            }
        );
        let mut footer = vec![Span::styled(status, Style::default().add_modifier(Modifier::DIM))];
        footer.push(Span::raw("   "));
        footer.extend(key_hints(&[
            ("←/→", "page"),
            ("t", "contents"),
            ("i", "info"),
            ("+/-", "size"),
            ("s", "settings"),
            ("Esc", "library"),
        ]).spans);
        frame.render_widget(
            Paragraph::new(Line::from(footer)).alignment(Alignment::Center),
            layout[2],
        );
    }

    fn draw_toc_panel(&self, area: Rect, frame: &mut ratatui::Frame) {
        let popup_area = centered_rect(80, 70, area);
        frame.render_widget(Clear, popup_area);

        let total = self.ctx.session.filtered_toc("").len();
        let visible = self.ctx.session.filtered_toc(&self.toc_panel.query);
        let title = if self.toc_panel.query.trim().is_empty() {
            format!("Contents · {total}")
        } else {
            format!("Contents · {}/{total}", visible.len())
        };
        let block = self.block(title);
        frame.render_widget(block.clone(), popup_area);

        let inner = block.inner(popup_area);
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(inner);

        let header_lines = vec![
            Line::raw("Type to filter. ↑/↓ select, Enter jump."),
            Line::from(vec![
                Span::styled("Filter: ", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(self.toc_panel.query.clone()),
            ]),
        ];
        frame.render_widget(Paragraph::new(Text::from(header_lines)), sections[0]);

        let items: Vec<ListItem> = if total == 0 {
            vec![ListItem::new(Line::raw("(no table of contents)"))]
        } else if visible.is_empty() {
            vec![ListItem::new(Line::raw("(no matches)"))]
        } else {
            visible
                .iter()
                .map(|(depth, item)| {
                    let indent = "  ".repeat((*depth).min(12));
                    ListItem::new(Line::raw(format!("{indent}{}", item.label.trim())))
                })
                .collect()
        };

        let list = List::new(items)
            .highlight_style(self.highlight_style())
            .highlight_symbol("> ")
            .highlight_spacing(HighlightSpacing::Always);
        let mut state = ListState::default();
        if !visible.is_empty() {
            state.select(Some(self.toc_panel.selected.min(visible.len() - 1)));
        }
        frame.render_stateful_widget(list, sections[1], &mut state);

        frame.render_widget(
            Paragraph::new(key_hints(&[("Esc", "close"), ("Enter", "jump"), ("Ctrl+u", "clear")]))
                .alignment(Alignment::Center),
            sections[2],
        );
    }

    fn draw_info_panel(&self, area: Rect, frame: &mut ratatui::Frame) {
        let popup_area = centered_rect(70, 70, area);
        frame.render_widget(Clear, popup_area);
        let block = self.block("Book information");
        let book = self
            .ctx
            .session
            .current_id()
            .and_then(|id| self.ctx.books.iter().find(|b| b.id == *id));
        let lines = match book {
            Some(book) => book_detail_lines(book, block.inner(popup_area).width as usize),
            None => vec![Line::raw("No information available.")],
        };
        frame.render_widget(
            Paragraph::new(Text::from(lines))
                .block(block)
                .wrap(Wrap { trim: false }),
            popup_area,
        );
    }

    fn draw_history_panel(&self, area: Rect, frame: &mut ratatui::Frame) {
        let popup_area = centered_rect(70, 70, area);
        frame.render_widget(Clear, popup_area);

        let now = Utc::now();
        let history = self.ctx.history();
        let items: Vec<ListItem> = if history.is_empty() {
            vec![ListItem::new(Line::raw("(nothing read yet)"))]
        } else {
            history
                .iter()
                .map(|book| {
                    ListItem::new(Line::from(vec![
                        Span::raw(truncate_to_width(
                            &book.title,
                            popup_area.width.saturating_sub(20) as usize,
                        )),
                        Span::styled(
                            format!("  {}", format_last_opened(book.last_opened_at, now)),
                            Style::default().add_modifier(Modifier::DIM),
                        ),
                    ]))
                })
                .collect()
        };

        let block = self.block("History");
        frame.render_widget(block.clone(), popup_area);
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(block.inner(popup_area));

        let list = List::new(items)
            .highlight_style(self.highlight_style())
            .highlight_symbol("> ")
            .highlight_spacing(HighlightSpacing::Always);
        let mut state = ListState::default();
        if !history.is_empty() {
            state.select(Some(self.history_panel.selected.min(history.len() - 1)));
        }
        frame.render_stateful_widget(list, sections[0], &mut state);
        frame.render_widget(
            Paragraph::new(key_hints(&[("Enter", "open"), ("d", "delete"), ("Esc", "close")])),
            sections[1],
        );
    }

    fn draw_settings_panel(&self, area: Rect, frame: &mut ratatui::Frame) {
        let popup_area = centered_rect(60, 60, area);
        frame.render_widget(Clear, popup_area);

        let block = self.block("Settings");
        frame.render_widget(block.clone(), popup_area);

        let inner = block.inner(popup_area);
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(2)])
            .split(inner);

        let prefs = self.ctx.settings.preferences();
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let theme_label = if prefs.active_theme_name == CUSTOM_THEME_NAME {
            format!(
                "custom ({} on {})",
                prefs.custom_colors.text, prefs.custom_colors.bg
            )
        } else {
            prefs.active_theme_name.clone()
        };
        let items = vec![
            setting_row("Theme", theme_label, bold),
            setting_row("Font size", format!("{}px", prefs.font_size), bold),
            setting_row("Font", prefs.font_family.clone(), bold),
            setting_row("Sort library by", prefs.sort_order.label().to_string(), bold),
            setting_row(
                "Keep original formatting",
                if prefs.keep_original_format { "on" } else { "off" }.to_string(),
                bold,
            ),
            ListItem::new(Line::raw("Set custom colours…")),
            ListItem::new(Line::raw("Add theme…")),
            ListItem::new(Line::raw("Delete active theme")),
            ListItem::new(Line::styled(
                "Reset all data",
                Style::default().fg(Color::Red),
            )),
        ];

        let list = List::new(items)
            .highlight_style(self.highlight_style())
            .highlight_symbol("> ")
            .highlight_spacing(HighlightSpacing::Always);
        let mut state = ListState::default();
        state.select(Some(
            self.settings_panel
                .selected
                .min(SETTINGS_MENU_ITEM_COUNT.saturating_sub(1)),
        ));
        frame.render_stateful_widget(list, sections[0], &mut state);

        let help = Paragraph::new(key_hints(&[
            ("↑/↓", "select"),
            ("←/→", "adjust"),
            ("Enter", "edit/toggle"),
            ("Esc", "close"),
        ]))
        .wrap(Wrap { trim: true });
        frame.render_widget(help, sections[1]);
    }

    fn draw_prompt(&self, prompt: &PromptPanel, area: Rect, frame: &mut ratatui::Frame) {
        let popup_area = centered_rect(70, 30, area);
        frame.render_widget(Clear, popup_area);

        let mut lines = vec![
            Line::raw(prompt.action.hint()),
            Line::raw(""),
            Line::from(vec![
                Span::styled("> ", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(prompt.input.clone()),
                Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
            ]),
        ];
        if let Some(err) = &prompt.error {
            lines.push(Line::raw(""));
            lines.push(Line::styled(
                err.clone(),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ));
        }
        lines.push(Line::raw(""));
        lines.push(key_hints(&[("Enter", "confirm"), ("Esc", "cancel"), ("Ctrl+u", "clear")]));

        frame.render_widget(
            Paragraph::new(Text::from(lines))
                .block(self.block(prompt.action.title()))
                .wrap(Wrap { trim: false }),
            popup_area,
        );
    }

    fn draw_confirm(&self, action: &ConfirmAction, area: Rect, frame: &mut ratatui::Frame) {
        let popup_area = centered_rect(50, 25, area);
        frame.render_widget(Clear, popup_area);
        let lines = vec![
            Line::raw(action.message()),
            Line::raw(""),
            key_hints(&[("y", "yes"), ("n", "no")]),
        ];
        frame.render_widget(
            Paragraph::new(Text::from(lines))
                .block(self.block("Confirm"))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true }),
            popup_area,
        );
    }

    fn draw_notice(&self, area: Rect, frame: &mut ratatui::Frame) {
        let Some(notice) = self.ctx.notice() else {
            return;
        };
        let popup_area = centered_rect(60, 35, area);
        frame.render_widget(Clear, popup_area);

        let (title, accent) = match notice.kind {
            NoticeKind::Info => ("Notice", Style::default().add_modifier(Modifier::BOLD)),
            NoticeKind::Error => (
                "Error",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
        };
        let mut lines: Vec<Line> = notice
            .message
            .lines()
            .map(|l| Line::styled(l.to_string(), accent))
            .collect();
        lines.push(Line::raw(""));
        lines.push(Line::styled(
            "Press any key",
            Style::default().add_modifier(Modifier::DIM),
        ));
        frame.render_widget(
            Paragraph::new(Text::from(lines))
                .block(self.block(title))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true }),
            popup_area,
        );
    }
}

fn setting_row(label: &str, value: String, bold: Style) -> ListItem<'static> {
    ListItem::new(Line::from(vec![
        Span::styled(format!("{label}: "), bold),
        Span::raw(value),
    ]))
}

fn book_detail_lines(book: &BookRecord, width: usize) -> Vec<Line<'static>> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let field = |label: &str, value: String| {
        Line::from(vec![Span::styled(format!("{label}: "), bold), Span::raw(value)])
    };

    let mut lines = vec![field("Title", book.title.clone())];
    let meta = book.metadata.clone().unwrap_or_default();
    for (label, value) in [
        ("Author", meta.creator),
        ("Publisher", meta.publisher),
        ("Published", meta.pubdate),
        ("Language", meta.language),
    ] {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            lines.push(field(label, value));
        }
    }
    lines.push(field("Format", book.format.to_string()));
    lines.push(field("Size", format_bytes(book.size())));
    lines.push(field(
        "Last opened",
        format_last_opened(book.last_opened_at, Utc::now()),
    ));
    lines.push(field(
        "Cover",
        if book.cover_image.is_some() { "embedded" } else { "none" }.to_string(),
    ));
    if let Some(description) = meta.description.filter(|d| !d.trim().is_empty()) {
        lines.push(Line::raw(""));
        for line in wrap_text(description.trim(), width.max(8)) {
            lines.push(Line::raw(line));
        }
    }
    lines
}

fn key_hints(hints: &[(&str, &str)]) -> Line<'static> {
    let mut spans = Vec::new();
    for (idx, (key, action)) in hints.iter().enumerate() {
        if idx > 0 {
            spans.push(Span::raw("  "));
        }
        spans.push(Span::styled(
            key.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(format!(" {action}")));
    }
    Line::from(spans)
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

fn setup_terminal() -> anyhow::Result<Terminal<CrosstermBackend<Stdout>>> {
    terminal::enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen).context("enter alt screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("create terminal")
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    terminal::disable_raw_mode().context("disable raw mode")?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("leave alt screen")?;
    Ok(())
}

fn panic_to_string(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic: (unknown payload)".to_string()
    }
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
