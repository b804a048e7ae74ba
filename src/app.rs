use crate::assistant::{AssistantClient, OpenAiAssistant};
use crate::assistant::openai::OpenAiConfig;
use crate::chat::{ChatSession, Role};
use crate::config::AppConfig;
use crate::error::WorkspaceError;
use crate::event::AppEvent;
use crate::export::{self, ExportKind};
use crate::project::BufferKind;
use crate::selection::SelectionController;
use crate::snapshot::SnapshotStore;
use crate::theme::Theme;
use crate::usage::UsageTotals;
use crate::workspace::WorkspaceState;
use eframe::egui::{self, RichText, ScrollArea};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Preview,
    Buffer(BufferKind),
}

impl Tab {
    const ALL: [Tab; 4] = [
        Tab::Preview,
        Tab::Buffer(BufferKind::Markup),
        Tab::Buffer(BufferKind::Style),
        Tab::Buffer(BufferKind::Script),
    ];

    fn label(self) -> &'static str {
        match self {
            Tab::Preview => "Preview",
            Tab::Buffer(BufferKind::Markup) => "Elements",
            Tab::Buffer(BufferKind::Style) => "Styles",
            Tab::Buffer(BufferKind::Script) => "Code",
        }
    }
}

enum PanelAction {
    Select(usize),
    ToggleEdit,
    CommitRename,
    CancelRename,
}

#[derive(Default)]
struct KeyDialog {
    input: String,
    checking: bool,
    verified: bool,
}

#[derive(Clone)]
struct StatusLine {
    text: String,
    is_error: bool,
}

pub struct PagesmithApp {
    rx: Receiver<AppEvent>,
    assistant: AssistantClient,
    config: AppConfig,
    store: SnapshotStore,
    workspace: WorkspaceState,
    selection: SelectionController,
    chat: ChatSession,
    usage: UsageTotals,
    theme: Theme,
    theme_applied: bool,
    active_tab: Tab,
    input_buffer: String,
    show_saved_states: bool,
    save_prompt: Option<String>,
    confirm_delete: Option<String>,
    key_dialog: KeyDialog,
    status: Option<StatusLine>,
    diagnostics_log: Vec<String>,
    scroll_to_bottom: bool,
}

impl PagesmithApp {
    pub fn new(
        rx: Receiver<AppEvent>,
        assistant: AssistantClient,
        config: AppConfig,
        store: SnapshotStore,
        warnings: Vec<String>,
    ) -> Self {
        let mut app = Self {
            rx,
            assistant,
            config,
            store,
            workspace: WorkspaceState::new(),
            selection: SelectionController::new(),
            chat: ChatSession::new(),
            usage: UsageTotals::default(),
            theme: Theme::default(),
            theme_applied: false,
            active_tab: Tab::Preview,
            input_buffer: String::new(),
            show_saved_states: true,
            save_prompt: None,
            confirm_delete: None,
            key_dialog: KeyDialog::default(),
            status: None,
            diagnostics_log: Vec::new(),
            scroll_to_bottom: false,
        };

        for warning in warnings {
            app.log_diagnostic(warning);
        }
        if let Some(api_key) = app.config.api_key.clone() {
            app.check_api_key(api_key);
        }

        app
    }

    fn timestamp() -> String {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(duration) => duration.as_secs().to_string(),
            Err(_) => "0".to_string(),
        }
    }

    fn log_diagnostic(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.diagnostics_log
            .push(format!("[{}] {}", Self::timestamp(), message));
    }

    fn report_error(&mut self, err: &WorkspaceError) {
        let text = match err {
            WorkspaceError::NameConflict(name) if name.is_empty() => {
                "Please provide a valid name for the saved state.".to_string()
            }
            WorkspaceError::NameConflict(name) => {
                format!("The name \"{name}\" is already taken. Please choose a different name.")
            }
            other => other.to_string(),
        };
        self.log_diagnostic(format!("action failed: {err}"));
        self.status = Some(StatusLine {
            text,
            is_error: true,
        });
    }

    fn report_info(&mut self, text: impl Into<String>) {
        self.status = Some(StatusLine {
            text: text.into(),
            is_error: false,
        });
    }

    fn check_api_key(&mut self, api_key: String) {
        let api_key = api_key.trim().to_string();
        if api_key.is_empty() {
            return;
        }
        match OpenAiAssistant::new(OpenAiConfig::from_app_config(&self.config, api_key.clone())) {
            Ok(candidate) => {
                self.key_dialog.checking = true;
                self.assistant.verify_and_install(api_key, Arc::new(candidate));
            }
            Err(err) => self.report_error(&WorkspaceError::from(err)),
        }
    }

    fn drain_events(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.apply_event(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.log_diagnostic("event channel disconnected");
                    break;
                }
            }
        }
    }

    fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::GenerationFinished {
                request_id,
                outcome,
            } => {
                let result = self.chat.complete(
                    request_id,
                    outcome,
                    &mut self.workspace,
                    &mut self.usage,
                );
                if let Err(err) = result {
                    self.report_error(&err);
                }
                self.scroll_to_bottom = true;
            }
            AppEvent::ApiKeyChecked { api_key, result } => {
                self.key_dialog.checking = false;
                match result {
                    Ok(()) => {
                        self.key_dialog.verified = true;
                        self.key_dialog.input.clear();
                        if self.config.api_key.as_deref() != Some(api_key.as_str()) {
                            if let Err(err) = self.config.save_api_key(&api_key) {
                                self.log_diagnostic(format!("failed to save api key: {err}"));
                            }
                        }
                    }
                    Err(err) => {
                        self.key_dialog.verified = false;
                        match self.config.forget_api_key(&api_key) {
                            Ok(true) => self.log_diagnostic("removed rejected api key from settings"),
                            Ok(false) => {}
                            Err(io_err) => self
                                .log_diagnostic(format!("failed to remove api key: {io_err}")),
                        }
                        self.report_error(&WorkspaceError::from(err));
                    }
                }
            }
        }
    }

    fn submit_prompt(&mut self) {
        match self
            .chat
            .append_user_message(&self.input_buffer, self.workspace.project())
        {
            Ok(request) => {
                self.assistant.send(request);
                self.input_buffer.clear();
                self.scroll_to_bottom = true;
            }
            Err(err) => self.report_error(&err),
        }
    }

    fn apply_panel_action(&mut self, action: PanelAction) {
        let result = match action {
            PanelAction::Select(index) => {
                self.selection
                    .select_index(&mut self.store, &mut self.workspace, index)
            }
            PanelAction::ToggleEdit => {
                self.selection.toggle_edit(&self.store, &self.workspace);
                Ok(())
            }
            PanelAction::CommitRename => self
                .selection
                .commit_rename(&mut self.store, &self.workspace),
            PanelAction::CancelRename => {
                self.selection.cancel_rename();
                Ok(())
            }
        };
        if let Err(err) = result {
            self.report_error(&err);
        }
    }

    fn copy_active_tab(&mut self, ctx: &egui::Context) {
        let project = self.workspace.project();
        let content = match self.active_tab {
            Tab::Preview => export::embedded_document(project),
            Tab::Buffer(kind) => project.buffer(kind).to_string(),
        };
        ctx.copy_text(content);
        self.report_info(format!("Copied {} to the clipboard", self.active_tab.label()));
    }

    fn export(&mut self, kind: ExportKind) {
        match export::write_export(&self.config.export_dir, kind, self.workspace.project()) {
            Ok(path) => self.report_info(format!("Exported {}", path.display())),
            Err(err) => {
                self.log_diagnostic(format!("export failed: {err}"));
                self.status = Some(StatusLine {
                    text: format!("Export failed: {err}"),
                    is_error: true,
                });
            }
        }
    }

    fn render_key_dialog(&mut self, ctx: &egui::Context) {
        if self.key_dialog.verified {
            return;
        }
        let mut submit = false;
        egui::Window::new("Provide your OpenAI API key")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label("Provide your own OpenAI API key to use the assistant.");
                ui.add_space(12.0);
                let response = ui.add_enabled(
                    !self.key_dialog.checking,
                    egui::TextEdit::singleline(&mut self.key_dialog.input)
                        .password(true)
                        .hint_text("sk-..."),
                );
                if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    submit = true;
                }
                ui.horizontal(|ui| {
                    if self.key_dialog.checking {
                        ui.add(egui::Spinner::new());
                        ui.label("Checking key...");
                    } else if ui.button("Save").clicked() {
                        submit = true;
                    }
                });
            });

        if submit && !self.key_dialog.checking {
            let key = self.key_dialog.input.clone();
            self.check_api_key(key);
        }
    }

    fn render_save_prompt(&mut self, ctx: &egui::Context) {
        let Some(mut name) = self.save_prompt.take() else {
            return;
        };
        let mut keep_open = true;
        let mut confirmed = false;
        egui::Window::new("Save state")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label("Enter a name for the saved state:");
                let response = ui.text_edit_singleline(&mut name);
                response.request_focus();
                if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    confirmed = true;
                }
                ui.horizontal(|ui| {
                    if ui.button("Save").clicked() {
                        confirmed = true;
                    }
                    if ui.button("Cancel").clicked() {
                        keep_open = false;
                    }
                });
            });

        if confirmed {
            match self
                .selection
                .save_as(&mut self.store, &self.workspace, &name)
            {
                Ok(()) => {
                    self.report_info(format!("Saved \"{}\"", name.trim()));
                    keep_open = false;
                }
                Err(err) => self.report_error(&err),
            }
        }
        if keep_open {
            self.save_prompt = Some(name);
        }
    }

    fn render_delete_confirm(&mut self, ctx: &egui::Context) {
        let Some(name) = self.confirm_delete.clone() else {
            return;
        };
        let mut decision = None;
        egui::Window::new("Delete state")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(format!("Are you sure you want to delete the state \"{name}\"?"));
                ui.horizontal(|ui| {
                    if ui.button("Delete").clicked() {
                        decision = Some(true);
                    }
                    if ui.button("Cancel").clicked() {
                        decision = Some(false);
                    }
                });
            });

        match decision {
            Some(true) => {
                self.confirm_delete = None;
                match self
                    .selection
                    .delete_selected(&mut self.store, &mut self.workspace)
                {
                    Ok(removed) => self.report_info(format!("State \"{removed}\" deleted")),
                    Err(err) => self.report_error(&err),
                }
            }
            Some(false) => self.confirm_delete = None,
            None => {}
        }
    }

    fn render_sidebar(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("sidebar")
            .resizable(false)
            .exact_width(44.0)
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    let toggle = if self.show_saved_states { "◀" } else { "▶" };
                    if ui.button(toggle).on_hover_text("Saved states").clicked() {
                        self.show_saved_states = !self.show_saved_states;
                    }
                    if ui.button("⟲").on_hover_text("Reset").clicked() {
                        self.selection.reset(&mut self.workspace);
                        self.report_info("Workspace reset");
                    }
                    if ui.button("⎘").on_hover_text("Copy").clicked() {
                        self.copy_active_tab(ctx);
                    }
                });
            });
    }

    fn render_saved_states(&mut self, ctx: &egui::Context) {
        if !self.show_saved_states {
            return;
        }
        let mut action = None;
        egui::SidePanel::left("saved_states")
            .resizable(true)
            .default_width(200.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    if ui.button("Save").clicked() {
                        self.save_prompt = Some(String::new());
                    }
                    let selected_name = self
                        .workspace
                        .bound_name(&self.store)
                        .map(str::to_string);
                    let delete = ui.add_enabled(selected_name.is_some(), egui::Button::new("Delete"));
                    if delete.clicked() {
                        self.confirm_delete = selected_name;
                    }
                });
                ui.separator();

                let selected = self.selection.selected(&self.workspace);
                let editing = self.selection.edit_mode().is_editing;
                ScrollArea::vertical()
                    .id_salt("saved_states_list")
                    .show(ui, |ui| {
                        for (index, snapshot) in self.store.list().iter().enumerate() {
                            let is_selected = selected == Some(index);
                            ui.horizontal(|ui| {
                                if is_selected && editing {
                                    let response = ui
                                        .text_edit_singleline(self.selection.pending_name_mut());
                                    if self.selection.take_focus_request() {
                                        response.request_focus();
                                    } else if response.lost_focus() {
                                        action = if ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                                            Some(PanelAction::CommitRename)
                                        } else {
                                            Some(PanelAction::CancelRename)
                                        };
                                    }
                                } else if ui
                                    .selectable_label(is_selected, &snapshot.name)
                                    .clicked()
                                {
                                    action = Some(PanelAction::Select(index));
                                }
                                if is_selected && ui.small_button("✏").clicked() {
                                    action = Some(PanelAction::ToggleEdit);
                                }
                            });
                        }
                        if self.store.is_empty() {
                            ui.label(RichText::new("No saved states").color(self.theme.text_muted));
                        }
                    });
            });

        if let Some(action) = action {
            self.apply_panel_action(action);
        }
    }

    fn render_chat_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("chat_panel")
            .resizable(true)
            .default_width(420.0)
            .show(ctx, |ui| {
                ui.heading("Chat");
                ui.separator();

                let transcript_height = (ui.available_height() - 150.0).max(120.0);
                ScrollArea::vertical()
                    .id_salt("chat_transcript")
                    .max_height(transcript_height)
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for message in self.chat.transcript() {
                            let from_user = message.role == Role::User;
                            self.theme.message_frame(from_user).show(ui, |ui| {
                                ui.set_width(ui.available_width());
                                let who = if from_user { "You" } else { "Assistant" };
                                ui.label(RichText::new(who).small().color(self.theme.text_muted));
                                ui.label(&message.text);
                            });
                        }
                        if self.chat.is_busy() {
                            ui.horizontal(|ui| {
                                ui.add(egui::Spinner::new());
                                ui.label("Generating...");
                            });
                        }
                        if self.scroll_to_bottom {
                            ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
                        }
                    });
                self.scroll_to_bottom = false;

                ui.separator();
                ui.label(
                    RichText::new(format!(
                        "Tokens: {}   Cost: ${}",
                        self.usage.units_label(),
                        self.usage.cost_label()
                    ))
                    .small()
                    .color(self.theme.text_muted),
                );

                let input_enabled = self.key_dialog.verified && !self.chat.is_busy();
                let hint = if !self.key_dialog.verified {
                    "API key required"
                } else if self.chat.is_busy() {
                    "Waiting for response..."
                } else {
                    "Describe the change you want..."
                };

                let mut send_now = false;
                self.theme.composer_frame().show(ui, |ui| {
                    ui.horizontal(|ui| {
                        let response = ui.add_enabled(
                            input_enabled,
                            egui::TextEdit::singleline(&mut self.input_buffer)
                                .desired_width(ui.available_width() - 60.0)
                                .hint_text(hint),
                        );
                        if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                            send_now = true;
                        }
                        let clicked = ui
                            .add_enabled(
                                input_enabled && !self.input_buffer.trim().is_empty(),
                                egui::Button::new("Send"),
                            )
                            .clicked();
                        send_now |= clicked;
                    });
                });
                if send_now && input_enabled {
                    self.submit_prompt();
                }

                egui::CollapsingHeader::new("Diagnostics")
                    .default_open(false)
                    .show(ui, |ui| {
                        ScrollArea::vertical()
                            .id_salt("diagnostics_log")
                            .max_height(90.0)
                            .stick_to_bottom(true)
                            .show(ui, |ui| {
                                for entry in &self.diagnostics_log {
                                    ui.label(RichText::new(entry).small());
                                }
                            });
                    });
            });
    }

    fn render_center_panel(&mut self, ctx: &egui::Context) {
        let mut export_choice = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                for tab in Tab::ALL {
                    if ui
                        .selectable_label(self.active_tab == tab, tab.label())
                        .clicked()
                    {
                        self.active_tab = tab;
                    }
                }
                ui.separator();
                ui.menu_button("Download", |ui| {
                    for kind in ExportKind::ALL {
                        if ui.button(kind.label()).clicked() {
                            export_choice = Some(kind);
                            ui.close_menu();
                        }
                    }
                });
                if let Some(name) = self.workspace.bound_name(&self.store) {
                    ui.separator();
                    ui.label(RichText::new(name).color(self.theme.accent_primary));
                }
            });

            if let Some(status) = self.status.clone() {
                let color = if status.is_error {
                    self.theme.danger
                } else {
                    self.theme.success
                };
                ui.horizontal(|ui| {
                    ui.label(RichText::new(&status.text).color(color));
                    if ui.small_button("✕").clicked() {
                        self.status = None;
                    }
                });
            }
            ui.separator();

            ScrollArea::both().id_salt("editor_area").show(ui, |ui| {
                match self.active_tab {
                    Tab::Preview => {
                        let mut document = export::embedded_document(self.workspace.project());
                        ui.add_enabled(
                            false,
                            egui::TextEdit::multiline(&mut document)
                                .code_editor()
                                .desired_width(f32::INFINITY)
                                .desired_rows(30),
                        );
                    }
                    Tab::Buffer(kind) => {
                        ui.label(
                            RichText::new(format!("{} ({})", kind.label(), kind.language()))
                                .small()
                                .color(self.theme.text_muted),
                        );
                        ui.add(
                            egui::TextEdit::multiline(self.workspace.buffer_mut(kind))
                                .code_editor()
                                .desired_width(f32::INFINITY)
                                .desired_rows(30),
                        );
                    }
                }
            });
        });

        if let Some(kind) = export_choice {
            self.export(kind);
        }
    }
}

impl eframe::App for PagesmithApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if !self.theme_applied {
            self.theme.apply_visuals(ctx);
            self.theme_applied = true;
        }
        self.drain_events();
        if self.chat.is_busy() || self.key_dialog.checking {
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        self.render_sidebar(ctx);
        self.render_saved_states(ctx);
        self.render_chat_panel(ctx);
        self.render_center_panel(ctx);
        self.render_key_dialog(ctx);
        self.render_save_prompt(ctx);
        self.render_delete_confirm(ctx);
    }
}
