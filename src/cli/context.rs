//! Shell state, dispatch, and the error type shared by every command handler.

use std::env;

use chrono::Duration;
use dialoguer::{theme::ColorfulTheme, Confirm, Password};
use estate_config::{Config, ConfigError, ConfigManager};
use estate_core::{
    AccessService, AuthPolicy, AuthService, Clock, CoreError, ServiceResult, Session, SystemClock,
};
use estate_domain::{Permission, Workspace};
use estate_storage_json::JsonWorkspaceStorage;
use strsim::levenshtein;
use thiserror::Error;

use crate::{
    core::{LoadReport, WorkspaceManager},
    errors::{CliError, EstateError},
    utils::paths,
};

use super::{
    commands::{self, CommandDefinition, CommandRegistry},
    output::{self, OutputPreferences},
};

pub const SCRIPT_ENV: &str = "ESTATE_CLI_SCRIPT";
pub const DEVICE_ENV: &str = "ESTATE_DEVICE_ID";
const DEFAULT_DEVICE: &str = "cli";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliMode {
    Interactive,
    Script,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopControl {
    Continue,
    Exit,
}

/// Recoverable failure of a single command; the shell reports it and keeps running.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    InvalidArguments(String),
    #[error("no workspace is open")]
    WorkspaceNotOpen,
    #[error("not logged in")]
    NotLoggedIn,
    #[error("exit requested")]
    ExitRequested,
    #[error(transparent)]
    App(EstateError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),
}

impl CommandError {
    pub fn usage(message: impl Into<String>) -> Self {
        CommandError::InvalidArguments(message.into())
    }
}

impl From<CoreError> for CommandError {
    fn from(err: CoreError) -> Self {
        EstateError::from(err).into()
    }
}

impl From<EstateError> for CommandError {
    fn from(err: EstateError) -> Self {
        match err {
            EstateError::Core(CoreError::WorkspaceNotLoaded) => CommandError::WorkspaceNotOpen,
            other => CommandError::App(other),
        }
    }
}

impl From<ConfigError> for CommandError {
    fn from(err: ConfigError) -> Self {
        EstateError::from(err).into()
    }
}

pub type CommandResult = Result<(), CommandError>;

pub struct ShellContext {
    pub mode: CliMode,
    pub registry: CommandRegistry,
    pub manager: WorkspaceManager,
    /// Same storage the manager writes through, used for catalog listings.
    pub catalog: JsonWorkspaceStorage,
    pub config_manager: ConfigManager,
    pub config: Config,
    pub clock: Box<dyn Clock>,
    pub device_id: String,
    token: Option<String>,
    pub last_command: Option<String>,
    pub running: bool,
}

impl ShellContext {
    pub fn new(mode: CliMode) -> Result<Self, CliError> {
        let config_manager = ConfigManager::with_base_dir(paths::app_home())?;
        let config = config_manager.load()?;
        Self::with_parts(mode, config_manager, config)
    }

    pub fn with_parts(
        mode: CliMode,
        config_manager: ConfigManager,
        config: Config,
    ) -> Result<Self, CliError> {
        let storage =
            JsonWorkspaceStorage::with_retention(paths::storage_paths(&config), config.backup_retention)?;
        output::set_preferences(OutputPreferences {
            plain: mode == CliMode::Script || !config.theme.uses_color(),
        });
        let device_id = env::var(DEVICE_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DEVICE.to_string());

        let mut context = ShellContext {
            mode,
            registry: CommandRegistry::new(commands::all_definitions()),
            manager: WorkspaceManager::new(Box::new(storage.clone())),
            catalog: storage,
            config_manager,
            config,
            clock: Box::new(SystemClock),
            device_id,
            token: None,
            last_command: None,
            running: true,
        };
        context.auto_open_default();
        Ok(context)
    }

    fn auto_open_default(&mut self) {
        if self.mode != CliMode::Interactive {
            return;
        }
        let Some(name) = self.config.default_workspace.clone() else {
            return;
        };
        match self.manager.load(&name) {
            Ok(report) => {
                self.report_load(&report);
                output::success(format!("Opened default workspace `{}`.", name));
            }
            Err(err) => output::warning(format!("Could not open default workspace `{}`: {}", name, err)),
        }
    }

    /// Command names paired with their subcommands, for tab completion.
    pub fn completion_table(&self) -> Vec<(&'static str, Vec<&'static str>)> {
        self.registry
            .iter()
            .map(|definition| (definition.name, definition.subcommands()))
            .collect()
    }

    pub(crate) fn command(&self, name: &str) -> Option<&CommandDefinition> {
        self.registry.get(name)
    }

    pub fn prompt(&self) -> String {
        let workspace = self.manager.current_name().unwrap_or("no workspace");
        let user = self
            .session()
            .ok()
            .and_then(|session| {
                self.manager
                    .with_current(|ws| ws.user(session.user_id).map(|user| user.email.clone()))
                    .ok()
                    .flatten()
            });
        match user {
            Some(email) => format!("estate [{} as {}]> ", workspace, email),
            None => format!("estate [{}]> ", workspace),
        }
    }

    pub(crate) fn dispatch(
        &mut self,
        command: &str,
        raw: &str,
        args: &[&str],
    ) -> Result<LoopControl, CommandError> {
        let Some(handler) = self.registry.get(command).map(|definition| definition.handler) else {
            self.suggest_command(raw);
            return Ok(LoopControl::Continue);
        };
        match handler(self, args) {
            Ok(()) => Ok(LoopControl::Continue),
            Err(CommandError::ExitRequested) => Ok(LoopControl::Exit),
            Err(err) => Err(err),
        }
    }

    pub(crate) fn suggest_command(&self, input: &str) {
        output::warning(format!(
            "Unknown command `{}`. Type `help` to see available commands.",
            input
        ));
        let best = self
            .registry
            .names()
            .map(|name| (levenshtein(name, &input.to_lowercase()), name))
            .min_by_key(|(distance, _)| *distance);
        if let Some((distance, name)) = best {
            if distance <= 3 {
                output::hint(format!("Did you mean `{}`?", name));
            }
        }
    }

    pub(crate) fn report_error(&self, err: CommandError) {
        match err {
            CommandError::ExitRequested => {}
            CommandError::InvalidArguments(message) => {
                output::error(message);
                output::hint("Use `help <command>` for usage details.");
            }
            CommandError::WorkspaceNotOpen => {
                output::error("No workspace is open.");
                output::hint("Use `workspace new <name> <admin-email> <password>` or `workspace open <name>`.");
            }
            CommandError::NotLoggedIn => {
                output::error("Not logged in.");
                output::hint("Use `login <email> <password>`.");
            }
            other => output::error(other),
        }
    }

    pub(crate) fn report_load(&self, report: &LoadReport) {
        for warning in &report.warnings {
            output::warning(warning);
        }
    }

    pub fn policy(&self) -> AuthPolicy {
        AuthPolicy {
            token_ttl: Duration::minutes(self.config.auth.token_ttl_minutes),
            require_device_approval: self.config.auth.require_device_approval,
        }
    }

    pub(crate) fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Re-validates the stored token against the open workspace on every call.
    pub(crate) fn session(&self) -> Result<Session, CommandError> {
        let token = self.token.as_deref().ok_or(CommandError::NotLoggedIn)?;
        let policy = self.policy();
        let session = self
            .manager
            .with_current(|ws| AuthService::authenticate(ws, token, &policy, self.clock.as_ref()))??;
        Ok(session)
    }

    pub(crate) fn authorize(&self, permission: Permission) -> Result<Session, CommandError> {
        let session = self.session()?;
        self.manager
            .with_current(|ws| AccessService::authorize(ws, &session, permission))??;
        Ok(session)
    }

    /// Runs a read-only query after checking `permission`.
    pub(crate) fn read<T>(
        &self,
        permission: Permission,
        f: impl FnOnce(&Workspace, &Session) -> Result<T, CommandError>,
    ) -> Result<T, CommandError> {
        let session = self.authorize(permission)?;
        self.manager.with_current(|ws| f(ws, &session))?
    }

    /// Runs a service mutation after checking `permission`, then saves the workspace.
    pub(crate) fn mutate<T>(
        &mut self,
        permission: Permission,
        f: impl FnOnce(&mut Workspace, &Session, &dyn Clock) -> ServiceResult<T>,
    ) -> Result<T, CommandError> {
        let session = self.authorize(permission)?;
        self.mutate_as(&session, f)
    }

    /// Mutation without a permission gate; callers establish their own rules.
    pub(crate) fn mutate_as<T>(
        &mut self,
        session: &Session,
        f: impl FnOnce(&mut Workspace, &Session, &dyn Clock) -> ServiceResult<T>,
    ) -> Result<T, CommandError> {
        let clock = self.clock.as_ref();
        let value = self.manager.with_current_mut(|ws| f(ws, session, clock))??;
        self.manager.save()?;
        Ok(value)
    }

    /// Mutation open to anyone holding the workspace file (bootstrap, login, invites).
    pub(crate) fn mutate_open<T>(
        &mut self,
        f: impl FnOnce(&mut Workspace, &dyn Clock) -> ServiceResult<T>,
    ) -> Result<T, CommandError> {
        let clock = self.clock.as_ref();
        let value = self.manager.with_current_mut(|ws| f(ws, clock))??;
        self.manager.save()?;
        Ok(value)
    }

    /// Uses `provided` when given, otherwise asks for it without echo in interactive mode.
    pub(crate) fn secret(&self, provided: Option<&str>, label: &str) -> Result<String, CommandError> {
        if let Some(value) = provided {
            return Ok(value.to_string());
        }
        if self.mode != CliMode::Interactive {
            return Err(CommandError::usage(format!("missing <{}>", label)));
        }
        Ok(Password::with_theme(&ColorfulTheme::default())
            .with_prompt(label)
            .interact()?)
    }

    /// Scripts never block on a question; the answer is taken as yes.
    pub(crate) fn confirm(&self, prompt: &str) -> Result<bool, CommandError> {
        if self.mode != CliMode::Interactive {
            return Ok(true);
        }
        Ok(Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()?)
    }

    pub(crate) fn currency(&self) -> String {
        self.manager
            .with_current(|ws| ws.base_currency.clone())
            .unwrap_or_else(|_| self.config.currency.clone())
    }

    pub(crate) fn persist_config(&self) -> CommandResult {
        self.config_manager.save(&self.config)?;
        output::set_preferences(OutputPreferences {
            plain: self.mode == CliMode::Script || !self.config.theme.uses_color(),
        });
        Ok(())
    }
}
