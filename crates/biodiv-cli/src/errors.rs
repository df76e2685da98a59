use biodiv_core::BiodivError;
use console::style;
use std::fmt;

/// Error with context and suggestions, printed in red on stderr
pub struct CliError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
    pub help_command: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
            help_command: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_help(mut self, command: impl Into<String>) -> Self {
        self.help_command = Some(command.into());
        self
    }

    pub fn display(&self) {
        eprintln!("{} {}\n", style("✗").red().bold(), style(&self.message).red().bold());

        if let Some(ref context) = self.context {
            eprintln!("{}", context);
            eprintln!();
        }

        if !self.suggestions.is_empty() {
            eprintln!("{}", style("To fix this:").yellow().bold());
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, suggestion);
            }
            eprintln!();
        }

        if let Some(ref help_cmd) = self.help_command {
            eprintln!("{} {}", style("Need help?").cyan(), style(help_cmd).cyan().bold());
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Create error for workspace not found
pub fn workspace_not_found() -> CliError {
    let current_dir = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    CliError::new("Not in a biodiv workspace")
        .with_context(format!(
            "No .biodiv directory found here or in any parent.\n\nCurrent directory: {}",
            current_dir
        ))
        .with_suggestion("Initialize a workspace: biodiv init")
        .with_suggestion("Or navigate to an existing workspace")
        .with_help("Run: biodiv init --help")
}

/// Create error for database connection failure
pub fn database_connection_failed(error: &str) -> CliError {
    CliError::new("Cannot connect to PostgreSQL")
        .with_context(format!("DATABASE_URL is not set or connection failed.\n\nError: {}", error))
        .with_suggestion("Set DATABASE_URL: export DATABASE_URL=\"postgresql://localhost/geonature\"")
        .with_suggestion(
            "Or add to .biodiv/config.toml:\n  [postgres]\n  database_url = \"postgresql://localhost/geonature\"",
        )
        .with_suggestion("Preview the SQL without a database: biodiv --dry-run run ...")
        .with_help("Run: biodiv status")
}

/// Create error for an empty lookup cache
pub fn lookups_empty() -> CliError {
    CliError::new("No cached filter choices")
        .with_context("The lookup cache has not been refreshed yet.")
        .with_suggestion("Fetch choices from the database: biodiv refresh")
        .with_help("Run: biodiv refresh --help")
}

/// Create error for a layer missing from the project
pub fn layer_not_found(name: &str) -> CliError {
    CliError::new(format!("Layer not found: {}", name))
        .with_suggestion("List project layers: biodiv layers")
        .with_suggestion("Or create it: biodiv run <analysis> --layer-name ...")
}

/// Create error for invalid configuration
pub fn invalid_config(key: &str, reason: &str) -> CliError {
    CliError::new(format!("Invalid configuration: {}", key))
        .with_context(format!("Configuration value is invalid.\n\nReason: {}", reason))
        .with_suggestion("Check .biodiv/config.toml for syntax errors")
        .with_suggestion("Or reinitialize: biodiv init --force")
        .with_help("Run: biodiv status")
}

/// Exit status: 2 when the request was rejected before reaching the
/// database, 1 for every other failure
pub fn exit_status(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<BiodivError>() {
        Some(domain) if domain.is_validation() => 2,
        _ => 1,
    }
}

/// Convert anyhow::Error to CliError with context
pub fn from_anyhow(error: anyhow::Error) -> CliError {
    if let Some(domain) = error.downcast_ref::<BiodivError>() {
        return from_domain(domain);
    }

    let message = format!("{:#}", error);
    if message.contains("No such file or directory") {
        CliError::new("File not found")
            .with_context(format!("Error: {}", message))
            .with_suggestion("Check the file path and try again")
    } else if message.contains("Connection refused") || message.contains("could not connect") {
        database_connection_failed(&message)
    } else if message.contains("permission denied") {
        CliError::new("Permission denied")
            .with_context(format!("Error: {}", message))
            .with_suggestion("Check file permissions")
    } else {
        CliError::new(message)
    }
}

fn from_domain(error: &BiodivError) -> CliError {
    match error {
        BiodivError::WorkspaceNotFound { .. } => workspace_not_found(),
        BiodivError::WorkspaceExists { .. } => CliError::new(error.to_string())
            .with_suggestion("Use --force to rewrite the configuration"),
        BiodivError::LayerNotFound { name } => layer_not_found(name),
        BiodivError::ConfigInvalid { key, reason } => invalid_config(key, reason),
        BiodivError::Database(message) if message.contains("connect") => {
            database_connection_failed(message)
        }
        BiodivError::Database(message) => CliError::new("Database query failed")
            .with_context(message.clone())
            .with_suggestion("Inspect the generated SQL: biodiv --dry-run run ..."),
        BiodivError::InvalidCoordinateSystem { .. } => CliError::new(error.to_string())
            .with_suggestion("Reproject the study area or declare its EPSG code in the GeoJSON crs member"),
        BiodivError::MissingOutputDestination { artifact } => CliError::new(error.to_string())
            .with_suggestion(format!("Give a destination file for the {}", artifact)),
        BiodivError::UnboundedInterval { .. } => CliError::new(error.to_string())
            .with_suggestion("Choose a period: --period this-year, --period last-5-years or --period range"),
        other => CliError::new(other.to_string()),
    }
}
